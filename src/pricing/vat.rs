//! VAT rates and conversions between amounts excluding and including VAT.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::PricingError;
use crate::domain::value_objects::{money, CountryCode};

/// Rate lookup: product category override, then destination country, then
/// the standard rate. Rates are fractions (0.21 = 21%).
#[derive(Clone, Debug)]
pub struct TaxTable {
    standard_rate: Decimal,
    countries: HashMap<String, Decimal>,
    categories: HashMap<String, Decimal>,
}

impl TaxTable {
    pub fn new(standard_rate: Decimal) -> Self {
        Self { standard_rate, countries: HashMap::new(), categories: HashMap::new() }
    }

    pub fn with_country(mut self, country: &str, rate: Decimal) -> Self {
        self.countries.insert(country.to_ascii_uppercase(), rate);
        self
    }

    pub fn with_category(mut self, category: &str, rate: Decimal) -> Self {
        self.categories.insert(category.to_lowercase(), rate);
        self
    }

    /// Layers an active stored rule over the configured rates.
    pub fn with_rule(self, rule: &TaxRule) -> Self {
        match (rule.active, rule.kind) {
            (false, _) => self,
            (true, TaxRuleKind::Country) => self.with_country(&rule.key, rule.rate),
            (true, TaxRuleKind::Category) => self.with_category(&rule.key, rule.rate),
        }
    }

    pub fn standard_rate(&self) -> Decimal { self.standard_rate }

    pub fn rate_for(&self, country: Option<&CountryCode>, category: Option<&str>) -> Decimal {
        category
            .and_then(|c| self.categories.get(&c.to_lowercase()))
            .or_else(|| country.and_then(|c| self.countries.get(c.as_str())))
            .copied()
            .unwrap_or(self.standard_rate)
    }
}

impl Default for TaxTable {
    /// Dutch standard rate with the neighbouring markets the shop ships to.
    fn default() -> Self {
        Self::new(Decimal::new(21, 2))
            .with_country("NL", Decimal::new(21, 2))
            .with_country("BE", Decimal::new(21, 2))
            .with_country("DE", Decimal::new(19, 2))
            .with_country("FR", Decimal::new(20, 2))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxRuleKind { Country, Category }

impl TaxRuleKind {
    pub fn as_str(&self) -> &'static str { match self { Self::Country => "country", Self::Category => "category" } }
    pub fn parse(s: &str) -> Option<Self> { match s { "country" => Some(Self::Country), "category" => Some(Self::Category), _ => None } }
}

/// A stored VAT override for one country or product category.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaxRule {
    pub id: Uuid,
    pub kind: TaxRuleKind,
    pub key: String,
    pub rate: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VatAmounts {
    pub amount_excl: Decimal,
    pub rate: Decimal,
    pub vat_amount: Decimal,
    pub amount_incl: Decimal,
}

impl VatAmounts {
    pub fn rounded(self) -> Self {
        let amount_excl = money::round(self.amount_excl);
        let amount_incl = money::round(self.amount_incl);
        Self { amount_excl, rate: self.rate, vat_amount: amount_incl - amount_excl, amount_incl }
    }
}

const OVERFLOW: PricingError = PricingError::AmountOutOfRange("VAT amount");

pub(crate) fn check_rate(rate: Decimal) -> Result<(), PricingError> {
    if rate.is_sign_negative() || rate > Decimal::ONE { return Err(PricingError::InvalidRate(rate)); }
    Ok(())
}

/// `amount_incl = amount_excl × (1 + rate)`, unrounded.
pub fn add_vat(amount_excl: Decimal, rate: Decimal) -> Result<VatAmounts, PricingError> {
    check_rate(rate)?;
    let vat_amount = amount_excl.checked_mul(rate).ok_or(OVERFLOW)?;
    let amount_incl = amount_excl.checked_add(vat_amount).ok_or(OVERFLOW)?;
    Ok(VatAmounts { amount_excl, rate, vat_amount, amount_incl })
}

/// `amount_excl = amount_incl / (1 + rate)`, unrounded.
pub fn remove_vat(amount_incl: Decimal, rate: Decimal) -> Result<VatAmounts, PricingError> {
    check_rate(rate)?;
    let amount_excl = amount_incl.checked_div(Decimal::ONE + rate).ok_or(OVERFLOW)?;
    let vat_amount = amount_incl.checked_sub(amount_excl).ok_or(OVERFLOW)?;
    Ok(VatAmounts { amount_excl, rate, vat_amount, amount_incl })
}
