use crate::domain::money::Amount;
use serde::{Deserialize, Serialize};

pub type ProductId = u64;

/// Catalog product with the shared stock counter.
///
/// Stock is only mutated by the inventory-decrement step of a successful
/// capture, always under an exclusive row lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Amount,
    pub stock_quantity: u32,
}

impl Product {
    pub fn can_fulfill(&self, quantity: u32) -> bool {
        self.stock_quantity >= quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_can_fulfill() {
        let product = Product {
            id: 1,
            name: "Keyboard".to_string(),
            price: Amount::new(dec!(150000)).unwrap(),
            stock_quantity: 5,
        };
        assert!(product.can_fulfill(5));
        assert!(product.can_fulfill(3));
        assert!(!product.can_fulfill(6));
    }
}
