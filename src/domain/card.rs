use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single failed check on a card form field.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardError {
    #[error("cardholder name is required")]
    CardholderRequired,
    #[error("cardholder name is too long")]
    CardholderTooLong,
    #[error("card number must contain only digits")]
    NumberNotDigits,
    #[error("card number must be between 13 and 19 digits")]
    NumberLength,
    #[error("invalid card number")]
    LuhnCheckFailed,
    #[error("expiry must use the MM/YY format")]
    ExpiryFormat,
    #[error("invalid expiry month")]
    ExpiryMonthOutOfRange,
    #[error("invalid expiry year")]
    ExpiryYearOutOfRange,
    #[error("card is expired")]
    Expired,
    #[error("CVV is required")]
    CvvRequired,
    #[error("CVV must contain only digits")]
    CvvNotDigits,
    #[error("CVV must have 4 digits for Amex")]
    CvvLengthAmex,
    #[error("CVV must have 3 digits")]
    CvvLength,
}

/// Rejection of a card form, carrying every field-level failure found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRejection(Vec<CardError>);

impl CardRejection {
    pub fn errors(&self) -> &[CardError] {
        &self.0
    }

    pub fn contains(&self, error: CardError) -> bool {
        self.0.contains(&error)
    }
}

impl fmt::Display for CardRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}", error)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for CardRejection {}

/// Card network, detected from the leading digits of the PAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
    Discover,
    /// Fallback when no known prefix matches.
    Card,
}

impl CardBrand {
    /// Prefix-based brand classification. Total: every digit string maps to
    /// exactly one brand, with `Card` as the fallback.
    pub fn detect(number: &str) -> Self {
        if number.starts_with('4') {
            return Self::Visa;
        }
        let first2 = number.get(..2).and_then(|s| s.parse::<u32>().ok());
        let first4 = number.get(..4).and_then(|s| s.parse::<u32>().ok());
        if matches!(first2, Some(51..=55)) || matches!(first4, Some(2221..=2720)) {
            return Self::Mastercard;
        }
        if number.starts_with("34") || number.starts_with("37") {
            return Self::Amex;
        }
        if number.starts_with("6011") || number.starts_with("65") {
            return Self::Discover;
        }
        Self::Card
    }

    pub fn cvv_length(self) -> usize {
        match self {
            Self::Amex => 4,
            _ => 3,
        }
    }
}

impl fmt::Display for CardBrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Visa => "visa",
            Self::Mastercard => "mastercard",
            Self::Amex => "amex",
            Self::Discover => "discover",
            Self::Card => "card",
        };
        write!(f, "{}", name)
    }
}

/// Mod-10 checksum catching card number typos: double every second digit from
/// the right, subtract 9 from results over 9, and require the sum to end in 0.
pub fn luhn_check(digits: &str) -> bool {
    let mut sum = 0u32;
    for (i, b) in digits.bytes().rev().enumerate() {
        if !b.is_ascii_digit() {
            return false;
        }
        let mut d = u32::from(b - b'0');
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}

/// Validates an already-normalized digit string as a card number.
pub fn validate_card_number(number: &str) -> Result<(), CardError> {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CardError::NumberNotDigits);
    }
    if !(13..=19).contains(&number.len()) {
        return Err(CardError::NumberLength);
    }
    if !luhn_check(number) {
        return Err(CardError::LuhnCheckFailed);
    }
    Ok(())
}

/// CVV format check; the expected length depends on the brand.
pub fn validate_cvv(cvv: &str, brand: CardBrand) -> Result<(), CardError> {
    if cvv.is_empty() {
        return Err(CardError::CvvRequired);
    }
    if !cvv.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CardError::CvvNotDigits);
    }
    if cvv.len() != brand.cvv_length() {
        return Err(match brand {
            CardBrand::Amex => CardError::CvvLengthAmex,
            _ => CardError::CvvLength,
        });
    }
    Ok(())
}

/// A validated, normalized card number.
///
/// Held in memory only for the duration of an authorization attempt; the
/// `Debug` output never reveals more than the last four digits.
#[derive(Clone, PartialEq, Eq)]
pub struct CardNumber(String);

impl CardNumber {
    /// Strips separators (spaces, dashes) and validates the digit string.
    pub fn parse(raw: &str) -> Result<Self, CardError> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        validate_card_number(&digits)?;
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn last4(&self) -> &str {
        // Validation guarantees at least 13 digits.
        &self.0[self.0.len() - 4..]
    }
}

impl fmt::Debug for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CardNumber(****{})", self.last4())
    }
}

/// Card expiry, year normalized to four digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    pub month: u32,
    pub year: i32,
}

impl Expiry {
    /// Two-digit years are taken to mean 20xx.
    pub fn new(month: u32, year: i32) -> Self {
        let year = if year < 100 { year + 2000 } else { year };
        Self { month, year }
    }

    /// Accepts `MM/YY` and `MMYY`; surrounding spaces are ignored.
    pub fn parse(raw: &str) -> Result<Self, CardError> {
        let raw = raw.trim().replace(' ', "");
        let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        let (mm, yy) = if raw.len() == 5 && raw.contains('/') {
            raw.split_once('/').ok_or(CardError::ExpiryFormat)?
        } else if raw.len() == 4 && !raw.contains('/') {
            if !all_digits(&raw) {
                return Err(CardError::ExpiryFormat);
            }
            raw.split_at(2)
        } else {
            return Err(CardError::ExpiryFormat);
        };
        if !all_digits(mm) || !all_digits(yy) {
            return Err(CardError::ExpiryFormat);
        }
        let month: u32 = mm.parse().map_err(|_| CardError::ExpiryFormat)?;
        let year: i32 = yy.parse().map_err(|_| CardError::ExpiryFormat)?;
        Ok(Self::new(month, year))
    }

    /// Range checks plus the expiry rule: a card whose (year, month) is
    /// strictly before `today`'s is expired.
    pub fn validate_at(&self, today: NaiveDate) -> Result<(), CardError> {
        if !(2000..=2100).contains(&self.year) {
            return Err(CardError::ExpiryYearOutOfRange);
        }
        if !(1..=12).contains(&self.month) {
            return Err(CardError::ExpiryMonthOutOfRange);
        }
        if (self.year, self.month) < (today.year(), today.month()) {
            return Err(CardError::Expired);
        }
        Ok(())
    }
}

/// Raw card form fields as entered by the customer.
#[derive(Clone, PartialEq, Eq)]
pub struct CardInput {
    pub cardholder_name: String,
    pub number: String,
    pub expiry: String,
    pub cvv: String,
}

impl CardInput {
    /// Validates against the current wall-clock date.
    pub fn validate(&self) -> Result<CardDetails, CardRejection> {
        self.validate_at(Utc::now().date_naive())
    }

    /// Field-level validation. Number and expiry are checked independently so
    /// a form can report both failures at once; the brand-dependent CVV check
    /// only runs once both have parsed, since it needs the detected brand.
    pub fn validate_at(&self, today: NaiveDate) -> Result<CardDetails, CardRejection> {
        let mut errors = Vec::new();

        if self.cardholder_name.trim().is_empty() {
            errors.push(CardError::CardholderRequired);
        } else if self.cardholder_name.len() > 120 {
            errors.push(CardError::CardholderTooLong);
        }

        let number = match CardNumber::parse(&self.number) {
            Ok(number) => Some(number),
            Err(e) => {
                errors.push(e);
                None
            }
        };
        let expiry = match Expiry::parse(&self.expiry).and_then(|expiry| {
            expiry.validate_at(today)?;
            Ok(expiry)
        }) {
            Ok(expiry) => Some(expiry),
            Err(e) => {
                errors.push(e);
                None
            }
        };

        if let (Some(number), Some(expiry)) = (number, expiry) {
            let brand = CardBrand::detect(number.as_str());
            if let Err(e) = validate_cvv(&self.cvv, brand) {
                errors.push(e);
            }
            if errors.is_empty() {
                return Ok(CardDetails {
                    number,
                    brand,
                    expiry,
                });
            }
        }

        Err(CardRejection(errors))
    }
}

impl fmt::Debug for CardInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardInput")
            .field("cardholder_name", &self.cardholder_name)
            .field("number", &"<redacted>")
            .field("expiry", &self.expiry)
            .field("cvv", &"<redacted>")
            .finish()
    }
}

/// Outcome of a successful card validation.
///
/// Carries only what the authorization step needs; the CVV is checked and
/// dropped, it never leaves the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDetails {
    pub number: CardNumber,
    pub brand: CardBrand,
    pub expiry: Expiry,
}

impl CardDetails {
    pub fn last4(&self) -> &str {
        self.number.last4()
    }
}
