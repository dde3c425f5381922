//! Weight-banded shipping rules.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::PricingError;
use crate::domain::value_objects::{money, CountryCode, Grams};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceTier { #[default] Standard, Express }

impl ServiceTier {
    pub fn as_str(&self) -> &'static str { match self { Self::Standard => "standard", Self::Express => "express" } }
    pub fn parse(s: &str) -> Option<Self> { match s { "standard" => Some(Self::Standard), "express" => Some(Self::Express), _ => None } }
}

/// Price for shipments to `country` weighing `[min_weight, max_weight)` grams.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShippingRule {
    pub id: Uuid,
    pub name: String,
    pub country: CountryCode,
    pub min_weight: Grams,
    pub max_weight: Grams,
    pub price: Decimal,
    pub service: ServiceTier,
    pub free_shipping_threshold: Option<Decimal>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl ShippingRule {
    pub fn covers(&self, country: &CountryCode, weight: Grams) -> bool {
        self.active && &self.country == country && self.min_weight <= weight && weight < self.max_weight
    }
}

/// Package size in centimetres.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct Dimensions {
    #[validate(custom = "side_length")]
    pub length: Decimal,
    #[validate(custom = "side_length")]
    pub width: Decimal,
    #[validate(custom = "side_length")]
    pub height: Decimal,
}

/// Longest side a parcel carrier accepts, in centimetres.
pub const MAX_SIDE_CM: i64 = 1000;

fn side_length(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO || *value > Decimal::from(MAX_SIDE_CM) {
        return Err(ValidationError::new("side_length"));
    }
    Ok(())
}

impl Dimensions {
    /// `L·W·H / divisor` kilograms, rounded up to the next gram.
    pub fn volumetric_weight(&self, divisor: u32) -> Result<Grams, PricingError> {
        if self.validate().is_err() {
            return Err(PricingError::InvalidDimensions("each side must be above 0 and at most 1000 cm"));
        }
        if divisor == 0 { return Ok(Grams(0)); }
        let grams = self
            .length
            .checked_mul(self.width)
            .and_then(|v| v.checked_mul(self.height))
            .and_then(|v| v.checked_mul(Decimal::from(1000)))
            .and_then(|v| v.checked_div(Decimal::from(divisor)))
            .ok_or(PricingError::InvalidDimensions("volume out of range"))?;
        grams.ceil().to_u32().map(Grams).ok_or(PricingError::InvalidDimensions("volumetric weight out of range"))
    }
}

#[derive(Clone, Debug)]
pub struct ShipmentQuery {
    pub destination: CountryCode,
    pub weight: Grams,
    pub dimensions: Option<Dimensions>,
    pub order_value: Option<Decimal>,
    pub service: Option<ServiceTier>,
}

impl ShipmentQuery {
    pub fn new(destination: CountryCode, weight: Grams) -> Self {
        Self { destination, weight, dimensions: None, order_value: None, service: None }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShippingQuote {
    pub cost: Decimal,
    pub free_shipping: bool,
    pub rule_id: Uuid,
    pub rule: String,
    pub service: ServiceTier,
    pub billable_weight: Grams,
    pub amount_for_free_shipping: Option<Decimal>,
}

#[derive(Clone, Debug, Default)]
pub struct ShippingTable {
    rules: Vec<ShippingRule>,
    volumetric_divisor: u32,
}

impl ShippingTable {
    pub fn new(mut rules: Vec<ShippingRule>, volumetric_divisor: u32) -> Self {
        rules.sort_by(|a, b| (a.min_weight, a.service, a.created_at).cmp(&(b.min_weight, b.service, b.created_at)));
        Self { rules, volumetric_divisor }
    }

    pub fn billable_weight(&self, query: &ShipmentQuery) -> Result<Grams, PricingError> {
        match query.dimensions {
            Some(d) => Ok(query.weight.max(d.volumetric_weight(self.volumetric_divisor)?)),
            None => Ok(query.weight),
        }
    }

    /// First active rule whose band contains the billable weight. A destination
    /// without a matching band is a configuration error, never a default price.
    pub fn resolve(&self, query: &ShipmentQuery) -> Result<ShippingQuote, PricingError> {
        let weight = self.billable_weight(query)?;
        let rule = self
            .rules
            .iter()
            .filter(|r| query.service.map_or(true, |s| r.service == s))
            .find(|r| r.covers(&query.destination, weight))
            .ok_or_else(|| PricingError::NoShippingRule { destination: query.destination.to_string(), weight: weight.value() })?;

        let value = query.order_value.unwrap_or(Decimal::ZERO);
        let free = matches!(rule.free_shipping_threshold, Some(t) if query.order_value.is_some() && value >= t);
        let amount_for_free_shipping = match rule.free_shipping_threshold {
            Some(t) if !free => Some(money::round((t - value).max(Decimal::ZERO))),
            _ => None,
        };
        Ok(ShippingQuote {
            cost: if free { Decimal::ZERO } else { money::round(rule.price) },
            free_shipping: free,
            rule_id: rule.id,
            rule: rule.name.clone(),
            service: rule.service,
            billable_weight: weight,
            amount_for_free_shipping,
        })
    }
}
