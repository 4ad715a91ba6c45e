use crate::domain::card::CardInput;
use crate::domain::order::OrderId;
use crate::error::{PaymentError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Deserialize)]
struct AttemptRow {
    order: u64,
    cardholder: String,
    number: String,
    expiry: String,
    cvv: String,
}

/// One payment attempt read from the input: the target order plus the raw
/// card fields, still unvalidated.
#[derive(Debug)]
pub struct PaymentAttempt {
    pub order: OrderId,
    pub card: CardInput,
}

/// Reads payment attempts from a CSV source
/// (`order, cardholder, number, expiry, cvv`).
pub struct AttemptReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> AttemptReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads attempts; card fields are passed
    /// through untouched for the validator to judge.
    pub fn attempts(self) -> impl Iterator<Item = Result<PaymentAttempt>> {
        self.reader.into_deserialize().map(|result| {
            let row: AttemptRow = result.map_err(PaymentError::from)?;
            Ok(PaymentAttempt {
                order: row.order,
                card: CardInput {
                    cardholder_name: row.cardholder,
                    number: row.number,
                    expiry: row.expiry,
                    cvv: row.cvv,
                },
            })
        })
    }
}
