use clap::Parser;
use ctrlpay::application::processor::PaymentProcessor;
use ctrlpay::domain::ports::{OrderStoreBox, PaymentStoreBox, ProductStoreBox, UnitOfWorkBox};
use ctrlpay::infrastructure::in_memory::InMemoryStore;
#[cfg(feature = "storage-rocksdb")]
use ctrlpay::infrastructure::rocksdb::RocksDbStore;
use ctrlpay::infrastructure::simulator::SimulatedGateway;
use ctrlpay::interfaces::csv::attempt_reader::AttemptReader;
use ctrlpay::interfaces::csv::fixture_reader::{OrderReader, ProductReader};
use ctrlpay::interfaces::csv::receipt_writer::ReceiptWriter;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Payment attempts CSV file
    attempts: PathBuf,

    /// Product catalog CSV file
    #[arg(long)]
    products: PathBuf,

    /// Orders CSV file, one line item per row
    #[arg(long)]
    orders: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = &cli.db_path {
        // Use persistent storage (RocksDB)
        let store = RocksDbStore::open(db_path).into_diagnostic()?;
        return run(
            &cli,
            Box::new(store.clone()),
            Box::new(store.clone()),
            Box::new(store.clone()),
            Box::new(store),
        )
        .await;
    }

    // Use in-memory storage
    let store = InMemoryStore::new();
    run(
        &cli,
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store),
    )
    .await
}

async fn run(
    cli: &Cli,
    orders: OrderStoreBox,
    products: ProductStoreBox,
    payments: PaymentStoreBox,
    unit_of_work: UnitOfWorkBox,
) -> Result<()> {
    // Seed the catalog and orders, keeping rows a previous run already wrote.
    let file = File::open(&cli.products).into_diagnostic()?;
    for product in ProductReader::new(file).products() {
        let product = product.into_diagnostic()?;
        if products.get(product.id).await.into_diagnostic()?.is_none() {
            products.insert(product).await.into_diagnostic()?;
        }
    }
    let file = File::open(&cli.orders).into_diagnostic()?;
    for order in OrderReader::new(file).orders().into_diagnostic()? {
        if orders.get(order.id).await.into_diagnostic()?.is_none() {
            orders.insert(order).await.into_diagnostic()?;
        }
    }

    let processor = PaymentProcessor::new(orders, payments, unit_of_work, Box::new(SimulatedGateway));

    // Process attempts, one receipt row per settled payment.
    let file = File::open(&cli.attempts).into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = ReceiptWriter::new(stdout.lock());
    for attempt in AttemptReader::new(file).attempts() {
        match attempt {
            Ok(attempt) => match processor.process_payment(attempt.order, attempt.card).await {
                Ok(outcome) => writer.write_payment(outcome.payment()).into_diagnostic()?,
                Err(e) => {
                    eprintln!("Error processing payment: {}", e);
                }
            },
            Err(e) => {
                eprintln!("Error reading attempt: {}", e);
            }
        }
    }
    writer.flush().into_diagnostic()?;

    Ok(())
}
