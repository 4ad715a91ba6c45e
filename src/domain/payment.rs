use crate::domain::card::CardBrand;
use crate::domain::money::Amount;
use crate::domain::order::OrderId;
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type PaymentId = u64;

pub const DEFAULT_CURRENCY: &str = "COP";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Initiated,
    Captured,
    Failed,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initiated => "initiated",
            Self::Captured => "captured",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
}

/// One payment attempt against an order.
///
/// Created in `initiated` and settled exactly once, to `captured` or `failed`;
/// it never reverts. Only safe derivatives of the instrument are stored: brand
/// and last four digits, never the PAN or CVV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order: OrderId,
    /// Snapshot of the order total at attempt time.
    pub amount: Amount,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub brand: CardBrand,
    pub last4: String,
    pub auth_code: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Draft for a payment row; the store assigns the id and timestamps.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order: OrderId,
    pub amount: Amount,
    pub currency: String,
    pub method: PaymentMethod,
    pub brand: CardBrand,
    pub last4: String,
}

impl NewPayment {
    pub fn into_payment(self, id: PaymentId, now: DateTime<Utc>) -> Payment {
        Payment {
            id,
            order: self.order,
            amount: self.amount,
            currency: self.currency,
            method: self.method,
            status: PaymentStatus::Initiated,
            brand: self.brand,
            last4: self.last4,
            auth_code: None,
            error_code: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Payment {
    /// Settles the payment as captured, recording the gateway auth code and
    /// clearing any error fields.
    pub fn capture(&mut self, auth_code: &str) -> Result<(), PaymentError> {
        if self.status != PaymentStatus::Initiated {
            return Err(PaymentError::PaymentSettled(self.id));
        }
        self.status = PaymentStatus::Captured;
        self.auth_code = Some(auth_code.to_string());
        self.error_code = None;
        self.error_message = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Settles the payment as failed with the given code and user-facing
    /// message.
    pub fn fail(&mut self, error_code: &str, message: &str) -> Result<(), PaymentError> {
        if self.status != PaymentStatus::Initiated {
            return Err(PaymentError::PaymentSettled(self.id));
        }
        self.status = PaymentStatus::Failed;
        self.error_code = Some(error_code.to_string());
        self.error_message = Some(message.to_string());
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_captured(&self) -> bool {
        self.status == PaymentStatus::Captured
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft() -> NewPayment {
        NewPayment {
            order: 1,
            amount: Amount::new(dec!(450000)).unwrap(),
            currency: DEFAULT_CURRENCY.to_string(),
            method: PaymentMethod::Card,
            brand: CardBrand::Visa,
            last4: "1111".to_string(),
        }
    }

    #[test]
    fn test_starts_initiated() {
        let payment = draft().into_payment(1, Utc::now());
        assert_eq!(payment.status, PaymentStatus::Initiated);
        assert_eq!(payment.auth_code, None);
        assert_eq!(payment.error_code, None);
    }

    #[test]
    fn test_capture_is_terminal() {
        let mut payment = draft().into_payment(1, Utc::now());
        payment.capture("A1111OK").unwrap();
        assert!(payment.is_captured());
        assert_eq!(payment.auth_code.as_deref(), Some("A1111OK"));

        assert!(matches!(
            payment.capture("A1111OK"),
            Err(PaymentError::PaymentSettled(1))
        ));
        assert!(matches!(
            payment.fail("do_not_honor", "declined"),
            Err(PaymentError::PaymentSettled(1))
        ));
    }

    #[test]
    fn test_fail_records_code_and_message() {
        let mut payment = draft().into_payment(2, Utc::now());
        payment
            .fail("insufficient_funds", "Insufficient funds.")
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.error_code.as_deref(), Some("insufficient_funds"));
        assert_eq!(payment.error_message.as_deref(), Some("Insufficient funds."));
        assert!(matches!(
            payment.capture("A0000OK"),
            Err(PaymentError::PaymentSettled(2))
        ));
    }
}
