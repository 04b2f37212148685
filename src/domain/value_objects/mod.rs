//! Value objects for user-entered storefront values

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const OTP_LENGTH: usize = 6;

/// Six-digit one-time password assembled from the entry fields
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OtpCode(String);

impl OtpCode {
    pub fn from_digits<S: AsRef<str>>(digits: &[S]) -> Result<Self, OtpError> {
        let joined: String = digits.iter().map(|d| d.as_ref().trim()).collect();
        Self::new(joined)
    }
    pub fn new(value: impl Into<String>) -> Result<Self, OtpError> {
        let value = value.into();
        if value.chars().count() != OTP_LENGTH { return Err(OtpError::Incomplete); }
        if !value.chars().all(|c| c.is_ascii_digit()) { return Err(OtpError::NotNumeric); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OtpError { Incomplete, NotNumeric }
impl std::error::Error for OtpError {}
impl fmt::Display for OtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Incomplete => write!(f, "Please enter all 6 digits of the OTP"), Self::NotNumeric => write!(f, "OTP must contain digits only") }
    }
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn inr(amount: Decimal) -> Self { Self::new(amount, "INR") }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn covers(&self, other: &Money) -> bool { self.currency == other.currency && self.amount >= other.amount }
    pub fn at_least(&self, minimum: Decimal) -> Result<&Self, MoneyError> {
        if self.amount < minimum { Err(MoneyError::BelowMinimum(minimum)) } else { Ok(self) }
    }

    /// Parses what a user typed into an amount box: optional `₹`/`$` sign,
    /// thousands separators and surrounding spaces are tolerated.
    pub fn parse_input(raw: &str, currency: &str) -> Result<Self, MoneyError> {
        let cleaned: String = raw.trim().trim_start_matches(['₹', '$']).chars().filter(|c| *c != ',').collect();
        if cleaned.trim().is_empty() { return Err(MoneyError::Missing); }
        let amount = Decimal::from_str(cleaned.trim()).map_err(|_| MoneyError::Malformed(raw.trim().to_string()))?;
        if amount.is_sign_negative() { return Err(MoneyError::Negative); }
        Ok(Self::new(amount, currency))
    }
}

impl Default for Money { fn default() -> Self { Self::zero("INR") } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.currency.as_str() {
            "INR" => write!(f, "₹ {:.2}", self.amount),
            other => write!(f, "{} {:.2}", other, self.amount),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { Missing, Malformed(String), Negative, BelowMinimum(Decimal) }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "Please enter an amount"),
            Self::Malformed(raw) => write!(f, "'{}' is not a valid amount", raw),
            Self::Negative => write!(f, "Amount cannot be negative"),
            Self::BelowMinimum(min) => write!(f, "Please enter an amount of at least ₹{}", min),
        }
    }
}
