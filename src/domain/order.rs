use crate::domain::money::Amount;
use crate::domain::product::ProductId;
use crate::error::PaymentError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type OrderId = u64;
pub type UserId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Canceled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Canceled => "canceled",
        };
        write!(f, "{}", name)
    }
}

/// One order line: product reference, quantity, and the unit price captured
/// when the order was placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product: ProductId,
    pub quantity: u32,
    pub unit_price: Amount,
}

impl OrderItem {
    pub fn line_total(&self) -> Amount {
        self.unit_price.times(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user: UserId,
    pub status: OrderStatus,
    /// Total snapshot computed from the line items at creation time.
    pub total_amount: Amount,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Builds a pending order; quantities must be positive and the item list
    /// non-empty so the total stays a valid amount.
    pub fn new(id: OrderId, user: UserId, items: Vec<OrderItem>) -> Result<Self, PaymentError> {
        if items.is_empty() {
            return Err(PaymentError::EmptyOrder(id));
        }
        for item in &items {
            if item.quantity == 0 {
                return Err(PaymentError::InvalidQuantity(item.product));
            }
        }
        let total_amount = items
            .iter()
            .skip(1)
            .fold(items[0].line_total(), |acc, item| acc + item.line_total());
        Ok(Self {
            id,
            user,
            status: OrderStatus::Pending,
            total_amount,
            items,
        })
    }

    /// Pending -> paid; any other starting state is rejected.
    pub fn mark_paid(&mut self) -> Result<(), PaymentError> {
        if self.status != OrderStatus::Pending {
            return Err(PaymentError::OrderNotPayable {
                order: self.id,
                status: self.status,
            });
        }
        self.status = OrderStatus::Paid;
        Ok(())
    }

    /// Pending -> canceled; paid orders cannot be canceled here.
    pub fn cancel(&mut self) -> Result<(), PaymentError> {
        if self.status != OrderStatus::Pending {
            return Err(PaymentError::OrderNotPayable {
                order: self.id,
                status: self.status,
            });
        }
        self.status = OrderStatus::Canceled;
        Ok(())
    }

    /// Units required per product, aggregated over line items and returned in
    /// ascending product id order. The stable ordering doubles as the lock
    /// acquisition order during capture.
    pub fn stock_requirements(&self) -> Vec<(ProductId, u32)> {
        let mut requirements: BTreeMap<ProductId, u32> = BTreeMap::new();
        for item in &self.items {
            *requirements.entry(item.product).or_insert(0) += item.quantity;
        }
        requirements.into_iter().collect()
    }
}
