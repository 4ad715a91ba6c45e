use crate::domain::order::{Order, OrderId};
use crate::domain::payment::{NewPayment, Payment, PaymentId};
use crate::domain::ports::{
    CheckoutTx, CheckoutUnitOfWork, OrderStore, PaymentStore, ProductStore,
};
use crate::domain::product::{Product, ProductId};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamilyDescriptor, DB, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Column Family for order rows.
pub const CF_ORDERS: &str = "orders";
/// Column Family for product rows.
pub const CF_PRODUCTS: &str = "products";
/// Column Family for payment rows.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for store metadata (payment id counter).
pub const CF_META: &str = "meta";

const NEXT_PAYMENT_ID_KEY: &[u8] = b"next_payment_id";

/// A persistent store implementation using RocksDB.
///
/// Orders, products and payments live in separate Column Families with
/// JSON-encoded values. Checkout transactions stage their writes in memory
/// under a store-wide lock and commit them as a single `WriteBatch`, so a
/// crash mid-capture never leaves stock decremented without the matching
/// payment and order writes.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    tx_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_ORDERS, CF_PRODUCTS, CF_PAYMENTS, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            tx_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            PaymentError::InternalError(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        let handle = self.cf_handle(cf)?;
        match self.db.get_cf(handle, key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| PaymentError::InternalError(Box::new(e)))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        let handle = self.cf_handle(cf)?;
        let bytes =
            serde_json::to_vec(value).map_err(|e| PaymentError::InternalError(Box::new(e)))?;
        self.db.put_cf(handle, key, bytes)?;
        Ok(())
    }

    fn next_payment_id(&self) -> Result<PaymentId> {
        let current: PaymentId = self.get_json(CF_META, NEXT_PAYMENT_ID_KEY)?.unwrap_or(0);
        let next = current + 1;
        self.put_json(CF_META, NEXT_PAYMENT_ID_KEY, &next)?;
        Ok(next)
    }

    fn scan_payments_rev<F>(&self, mut predicate: F) -> Result<Option<Payment>>
    where
        F: FnMut(&Payment) -> bool,
    {
        let handle = self.cf_handle(CF_PAYMENTS)?;
        for item in self.db.iterator_cf(handle, rocksdb::IteratorMode::End) {
            let (_key, value) = item?;
            let payment: Payment = serde_json::from_slice(&value)
                .map_err(|e| PaymentError::InternalError(Box::new(e)))?;
            if predicate(&payment) {
                return Ok(Some(payment));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl OrderStore for RocksDbStore {
    async fn insert(&self, order: Order) -> Result<()> {
        self.put_json(CF_ORDERS, &order.id.to_be_bytes(), &order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        self.get_json(CF_ORDERS, &id.to_be_bytes())
    }
}

#[async_trait]
impl ProductStore for RocksDbStore {
    async fn insert(&self, product: Product) -> Result<()> {
        self.put_json(CF_PRODUCTS, &product.id.to_be_bytes(), &product)
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        self.get_json(CF_PRODUCTS, &id.to_be_bytes())
    }
}

#[async_trait]
impl PaymentStore for RocksDbStore {
    async fn create(&self, draft: NewPayment) -> Result<Payment> {
        // The id counter shares the transaction lock so concurrent creates
        // cannot race it.
        let _guard = self.tx_lock.lock().await;
        let id = self.next_payment_id()?;
        let payment = draft.into_payment(id, Utc::now());
        self.put_json(CF_PAYMENTS, &payment.id.to_be_bytes(), &payment)?;
        Ok(payment)
    }

    async fn update(&self, payment: &Payment) -> Result<()> {
        let key = payment.id.to_be_bytes();
        if self.get_json::<Payment>(CF_PAYMENTS, &key)?.is_none() {
            return Err(PaymentError::PaymentNotFound(payment.id));
        }
        self.put_json(CF_PAYMENTS, &key, payment)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.get_json(CF_PAYMENTS, &id.to_be_bytes())
    }

    async fn latest_for_order(&self, order: OrderId) -> Result<Option<Payment>> {
        // Keys are big-endian ids, so reverse iteration yields the most
        // recent attempt first.
        self.scan_payments_rev(|p| p.order == order)
    }

    async fn captured_for_order(&self, order: OrderId) -> Result<Option<Payment>> {
        self.scan_payments_rev(|p| p.order == order && p.is_captured())
    }
}

#[async_trait]
impl CheckoutUnitOfWork for RocksDbStore {
    async fn begin(&self) -> Result<Box<dyn CheckoutTx>> {
        let guard = self.tx_lock.clone().lock_owned().await;
        Ok(Box::new(RocksDbTx {
            store: self.clone(),
            _guard: guard,
            stage: Stage::default(),
        }))
    }
}

#[derive(Default)]
struct Stage {
    orders: HashMap<OrderId, Order>,
    products: HashMap<ProductId, Product>,
    payments: HashMap<PaymentId, Payment>,
}

/// Transaction over the RocksDB store.
///
/// The store-wide lock stands in for row-level locks; reads see staged writes
/// first. `commit` flushes the stage as one `WriteBatch`; dropping without
/// committing discards it.
struct RocksDbTx {
    store: RocksDbStore,
    _guard: OwnedMutexGuard<()>,
    stage: Stage,
}

#[async_trait]
impl CheckoutTx for RocksDbTx {
    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        if let Some(order) = self.stage.orders.get(&id) {
            return Ok(Some(order.clone()));
        }
        self.store.get_json(CF_ORDERS, &id.to_be_bytes())
    }

    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<Product>> {
        if let Some(product) = self.stage.products.get(&id) {
            return Ok(Some(product.clone()));
        }
        self.store.get_json(CF_PRODUCTS, &id.to_be_bytes())
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<()> {
        let mut product = self
            .product_for_update(id)
            .await?
            .ok_or(PaymentError::ProductNotFound(id))?;
        product.stock_quantity = product
            .stock_quantity
            .checked_sub(quantity)
            .ok_or(PaymentError::StockUnderflow(id))?;
        self.stage.products.insert(id, product);
        Ok(())
    }

    async fn save_order(&mut self, order: &Order) -> Result<()> {
        self.stage.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn save_payment(&mut self, payment: &Payment) -> Result<()> {
        self.stage.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut batch = WriteBatch::default();
        for (id, order) in &self.stage.orders {
            let bytes = serde_json::to_vec(order)
                .map_err(|e| PaymentError::InternalError(Box::new(e)))?;
            batch.put_cf(self.store.cf_handle(CF_ORDERS)?, id.to_be_bytes(), bytes);
        }
        for (id, product) in &self.stage.products {
            let bytes = serde_json::to_vec(product)
                .map_err(|e| PaymentError::InternalError(Box::new(e)))?;
            batch.put_cf(self.store.cf_handle(CF_PRODUCTS)?, id.to_be_bytes(), bytes);
        }
        for (id, payment) in &self.stage.payments {
            let bytes = serde_json::to_vec(payment)
                .map_err(|e| PaymentError::InternalError(Box::new(e)))?;
            batch.put_cf(self.store.cf_handle(CF_PAYMENTS)?, id.to_be_bytes(), bytes);
        }
        self.store.db.write(batch)?;
        Ok(())
    }
}
