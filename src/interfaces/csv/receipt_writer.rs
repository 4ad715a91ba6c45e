use crate::domain::card::CardBrand;
use crate::domain::payment::{Payment, PaymentStatus};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ReceiptRow {
    order: u64,
    payment: u64,
    status: PaymentStatus,
    brand: CardBrand,
    last4: String,
    auth_code: Option<String>,
    error_code: Option<String>,
}

/// Writes one receipt row per processed payment
/// (`order, payment, status, brand, last4, auth_code, error_code`).
pub struct ReceiptWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReceiptWriter<W> {
    pub fn new(dest: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(dest),
        }
    }

    pub fn write_payment(&mut self, payment: &Payment) -> Result<()> {
        self.writer.serialize(ReceiptRow {
            order: payment.order,
            payment: payment.id,
            status: payment.status,
            brand: payment.brand,
            last4: payment.last4.clone(),
            auth_code: payment.auth_code.clone(),
            error_code: payment.error_code.clone(),
        })?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
