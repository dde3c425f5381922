//! Value Objects for the back-office

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > 50 { return Err(SkuError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Sku {
    type Error = SkuError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self { sku.0 }
}

#[derive(Debug, Clone, Error)]
pub enum SkuError {
    #[error("SKU empty")]
    Empty,
    #[error("SKU too long")]
    TooLong,
}

/// ISO-3166 alpha-2 destination country.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    /// Accepts two-letter codes in any case plus the Dutch names the shop
    /// historically stored ("Nederland", "België", ...).
    pub fn parse(value: &str) -> Result<Self, CountryError> {
        let trimmed = value.trim();
        let code = match trimmed.to_lowercase().as_str() {
            "nederland" | "netherlands" => "NL",
            "belgië" | "belgie" | "belgium" => "BE",
            "duitsland" | "germany" => "DE",
            "frankrijk" | "france" => "FR",
            _ => trimmed,
        };
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CountryError(value.to_string()));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for CountryCode {
    type Error = CountryError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::parse(&value) }
}

impl From<CountryCode> for String {
    fn from(c: CountryCode) -> Self { c.0 }
}

#[derive(Debug, Clone, Error)]
#[error("unknown country code: {0}")]
pub struct CountryError(pub String);

/// Shipment weight in grams.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grams(pub u32);

impl Grams {
    pub fn value(self) -> u32 { self.0 }
    pub fn times(self, qty: u32) -> Grams { Grams(self.0.saturating_mul(qty)) }
}

impl std::ops::Add for Grams {
    type Output = Grams;
    fn add(self, rhs: Grams) -> Grams { Grams(self.0.saturating_add(rhs.0)) }
}

/// Euro amounts: stored as integer cents, computed as exact decimals.
pub mod money {
    use super::*;

    /// Largest amount accepted at the API boundary: one trillion euro.
    pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

    pub fn from_cents(cents: i64) -> Decimal { Decimal::new(cents, 2) }

    /// Cents are rounded half-up; amounts beyond i64 cents saturate.
    pub fn to_cents(amount: Decimal) -> i64 {
        round(amount)
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|cents| cents.to_i64())
            .unwrap_or(if amount.is_sign_negative() { i64::MIN } else { i64::MAX })
    }

    /// Half-up rounding to two decimals, applied only to final outputs.
    pub fn round(amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_sku() { let sku = Sku::new("prod-001").unwrap(); assert_eq!(sku.as_str(), "PROD-001"); }
    #[test]
    fn test_sku_rejects_blank() { assert!(matches!(Sku::new("   "), Err(SkuError::Empty))); }
    #[test]
    fn test_country_aliases() {
        assert_eq!(CountryCode::parse("nl").unwrap().as_str(), "NL");
        assert_eq!(CountryCode::parse("Nederland").unwrap().as_str(), "NL");
        assert_eq!(CountryCode::parse("België").unwrap().as_str(), "BE");
        assert!(CountryCode::parse("Narnia").is_err());
    }
    #[test]
    fn test_money_cents() {
        assert_eq!(money::from_cents(595), Decimal::new(595, 2));
        assert_eq!(money::to_cents(Decimal::new(12345, 3)), 1235);
        assert_eq!(money::round(Decimal::new(5, 3)), Decimal::new(1, 2));
    }
    #[test]
    fn test_money_cents_saturate() {
        assert_eq!(money::to_cents(Decimal::MAX), i64::MAX);
        assert_eq!(money::to_cents(Decimal::MIN), i64::MIN);
        assert_eq!(money::MAX_AMOUNT, Decimal::from(1_000_000_000_000_i64));
    }
}
