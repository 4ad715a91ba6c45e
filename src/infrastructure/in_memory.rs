use crate::domain::order::{Order, OrderId};
use crate::domain::payment::{NewPayment, Payment, PaymentId};
use crate::domain::ports::{
    CheckoutTx, CheckoutUnitOfWork, OrderStore, PaymentStore, ProductStore,
};
use crate::domain::product::{Product, ProductId};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    products: HashMap<ProductId, Product>,
    payments: BTreeMap<PaymentId, Payment>,
    next_payment_id: PaymentId,
}

/// Shared in-memory storage backing every port.
///
/// `Clone` shares the underlying state, so one store can be handed to the
/// processor as several boxed ports. A checkout transaction takes the state
/// mutex for its whole lifetime, which stands in for row-level exclusive
/// locks.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let mut state = self.state.lock().await;
        state.orders.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.get(&id).cloned())
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn insert(&self, product: Product) -> Result<()> {
        let mut state = self.state.lock().await;
        state.products.insert(product.id, product);
        Ok(())
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        let state = self.state.lock().await;
        Ok(state.products.get(&id).cloned())
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn create(&self, draft: NewPayment) -> Result<Payment> {
        let mut state = self.state.lock().await;
        state.next_payment_id += 1;
        let payment = draft.into_payment(state.next_payment_id, Utc::now());
        state.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn update(&self, payment: &Payment) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.payments.contains_key(&payment.id) {
            return Err(PaymentError::PaymentNotFound(payment.id));
        }
        state.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        let state = self.state.lock().await;
        Ok(state.payments.get(&id).cloned())
    }

    async fn latest_for_order(&self, order: OrderId) -> Result<Option<Payment>> {
        let state = self.state.lock().await;
        // Ids are assigned monotonically, so the highest id is the most
        // recent attempt.
        Ok(state
            .payments
            .values()
            .rev()
            .find(|p| p.order == order)
            .cloned())
    }

    async fn captured_for_order(&self, order: OrderId) -> Result<Option<Payment>> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .values()
            .rev()
            .find(|p| p.order == order && p.is_captured())
            .cloned())
    }
}

#[async_trait]
impl CheckoutUnitOfWork for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn CheckoutTx>> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(InMemoryTx {
            guard,
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

/// Transaction over the in-memory store.
///
/// Holds the state lock for its whole lifetime and collects writes in a
/// stage. `commit` applies the stage; dropping without committing discards
/// it, which is the rollback.
struct InMemoryTx {
    guard: OwnedMutexGuard<State>,
    stage: Stage,
}

#[async_trait]
impl CheckoutTx for InMemoryTx {
    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self
            .stage
            .orders
            .get(&id)
            .or_else(|| self.guard.orders.get(&id))
            .cloned())
    }

    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self
            .stage
            .products
            .get(&id)
            .or_else(|| self.guard.products.get(&id))
            .cloned())
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<()> {
        let mut product = self
            .stage
            .products
            .get(&id)
            .or_else(|| self.guard.products.get(&id))
            .cloned()
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
        let InMemoryTx { mut guard, stage } = *self;
        guard.orders.extend(stage.orders);
        guard.products.extend(stage.products);
        guard.payments.extend(stage.payments);
        Ok(())
    }
}
