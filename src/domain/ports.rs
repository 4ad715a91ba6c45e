use crate::domain::card::CardNumber;
use crate::domain::money::Amount;
use crate::domain::order::{Order, OrderId};
use crate::domain::payment::{NewPayment, Payment, PaymentId};
use crate::domain::product::{Product, ProductId};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: Order) -> Result<()>;
    async fn get(&self, id: OrderId) -> Result<Option<Order>>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn insert(&self, product: Product) -> Result<()>;
    async fn get(&self, id: ProductId) -> Result<Option<Product>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persists a new payment in the `initiated` state, assigning its id.
    async fn create(&self, draft: NewPayment) -> Result<Payment>;
    /// Writes back a settled payment. The row must already exist.
    async fn update(&self, payment: &Payment) -> Result<()>;
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>>;
    /// Most recent payment recorded for the order, any status.
    async fn latest_for_order(&self, order: OrderId) -> Result<Option<Payment>>;
    /// Most recent captured payment for the order, used for idempotent
    /// replays and confirmation rendering.
    async fn captured_for_order(&self, order: OrderId) -> Result<Option<Payment>>;
}

/// One atomic storage transaction with `SELECT ... FOR UPDATE` semantics.
///
/// Rows read through the `*_for_update` methods stay exclusively locked until
/// the transaction ends. Writes are staged and only become visible on
/// `commit`; dropping the transaction without committing rolls everything
/// back.
#[async_trait]
pub trait CheckoutTx: Send {
    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>>;
    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<Product>>;
    /// Atomic per-row `stock_quantity -= quantity`; underflow is an error and
    /// aborts the transaction.
    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<()>;
    async fn save_order(&mut self, order: &Order) -> Result<()>;
    async fn save_payment(&mut self, payment: &Payment) -> Result<()>;
    async fn commit(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait CheckoutUnitOfWork: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn CheckoutTx>>;
}

/// Authorization decision returned by a gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Approved {
        auth_code: String,
    },
    Declined {
        error_code: String,
        message: String,
    },
}

#[async_trait]
pub trait AuthorizationGateway: Send + Sync {
    async fn authorize(
        &self,
        number: &CardNumber,
        amount: Amount,
        currency: &str,
    ) -> Result<AuthDecision>;
}

pub type OrderStoreBox = Box<dyn OrderStore>;
pub type ProductStoreBox = Box<dyn ProductStore>;
pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type UnitOfWorkBox = Box<dyn CheckoutUnitOfWork>;
pub type GatewayBox = Box<dyn AuthorizationGateway>;
