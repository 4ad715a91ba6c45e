use crate::domain::card::CardRejection;
use crate::domain::order::{OrderId, OrderStatus};
use crate::domain::payment::PaymentId;
use crate::domain::product::ProductId;
use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PaymentError>;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    CardRejected(#[from] CardRejection),
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Decimal),
    #[error("order {0} has no items")]
    EmptyOrder(OrderId),
    #[error("order item quantity must be positive (product {0})")]
    InvalidQuantity(ProductId),
    #[error("order {0} not found")]
    OrderNotFound(OrderId),
    #[error("order {order} cannot be paid while {status}")]
    OrderNotPayable { order: OrderId, status: OrderStatus },
    #[error("product {0} not found")]
    ProductNotFound(ProductId),
    #[error("payment {0} not found")]
    PaymentNotFound(PaymentId),
    #[error("order {0} is marked paid but has no captured payment recorded")]
    PaymentMissing(OrderId),
    #[error("payment {0} is already settled")]
    PaymentSettled(PaymentId),
    #[error("stock underflow for product {0}")]
    StockUnderflow(ProductId),
    #[cfg(feature = "storage-rocksdb")]
    #[error("database error: {0}")]
    DatabaseError(#[from] rocksdb::Error),
    #[error("internal storage error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}
