#![cfg(feature = "storage-rocksdb")]

use ctrlpay::application::processor::{PaymentOutcome, PaymentProcessor};
use ctrlpay::domain::card::CardInput;
use ctrlpay::domain::money::Amount;
use ctrlpay::domain::order::{Order, OrderItem, OrderStatus};
use ctrlpay::domain::ports::{OrderStore, PaymentStore, ProductStore};
use ctrlpay::domain::product::Product;
use ctrlpay::infrastructure::rocksdb::RocksDbStore;
use ctrlpay::infrastructure::simulator::SimulatedGateway;
use rust_decimal_macros::dec;
use tempfile::tempdir;

fn processor(store: &RocksDbStore) -> PaymentProcessor {
    PaymentProcessor::new(
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(SimulatedGateway),
    )
}

fn card() -> CardInput {
    CardInput {
        cardholder_name: "Ada Lovelace".to_string(),
        number: "4111111111111111".to_string(),
        expiry: "12/99".to_string(),
        cvv: "123".to_string(),
    }
}

async fn seed(store: &RocksDbStore) {
    let price = Amount::new(dec!(150000)).unwrap();
    ProductStore::insert(
        store,
        Product {
            id: 1,
            name: "Mechanical Keyboard".to_string(),
            price,
            stock_quantity: 5,
        },
    )
    .await
    .unwrap();
    OrderStore::insert(
        store,
        Order::new(
            1,
            1,
            vec![OrderItem {
                product: 1,
                quantity: 3,
                unit_price: price,
            }],
        )
        .unwrap(),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_capture_survives_reopen_and_replays_idempotently() {
    let dir = tempdir().unwrap();

    let captured_id = {
        let store = RocksDbStore::open(dir.path()).unwrap();
        seed(&store).await;
        let processor = processor(&store);
        let outcome = processor.process_payment(1, card()).await.unwrap();
        assert!(matches!(outcome, PaymentOutcome::Approved { .. }));
        outcome.payment().id
        // Store handles drop here, releasing the database.
    };

    let store = RocksDbStore::open(dir.path()).unwrap();
    let product = ProductStore::get(&store, 1).await.unwrap().unwrap();
    assert_eq!(product.stock_quantity, 2);
    let order = OrderStore::get(&store, 1).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    let payment = store.captured_for_order(1).await.unwrap().unwrap();
    assert_eq!(payment.id, captured_id);

    // Reprocessing after the restart resolves to the same payment without
    // touching stock again.
    let processor = processor(&store);
    let outcome = processor.process_payment(1, card()).await.unwrap();
    assert!(matches!(outcome, PaymentOutcome::AlreadyPaid { .. }));
    assert_eq!(outcome.payment().id, captured_id);
    let product = ProductStore::get(&store, 1).await.unwrap().unwrap();
    assert_eq!(product.stock_quantity, 2);
}

#[tokio::test]
async fn test_failed_attempt_is_kept_as_audit_trail() {
    let dir = tempdir().unwrap();

    {
        let store = RocksDbStore::open(dir.path()).unwrap();
        seed(&store).await;
        let processor = processor(&store);
        let outcome = processor
            .process_payment(
                1,
                CardInput {
                    number: "4700000000000005".to_string(),
                    ..card()
                },
            )
            .await
            .unwrap();
        assert!(matches!(outcome, PaymentOutcome::Declined { .. }));
    }

    let store = RocksDbStore::open(dir.path()).unwrap();
    let payment = store.latest_for_order(1).await.unwrap().unwrap();
    assert_eq!(payment.error_code.as_deref(), Some("insufficient_funds"));
    let product = ProductStore::get(&store, 1).await.unwrap().unwrap();
    assert_eq!(product.stock_quantity, 5);
    let order = OrderStore::get(&store, 1).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
}
