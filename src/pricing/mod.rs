//! Profit, VAT and shipping calculations.
//!
//! Everything in here is pure: callers load rules, products and ledgers from
//! the store and hand them in.

pub mod fixed_costs;
pub mod profit;
pub mod shipping;
pub mod vat;

use rust_decimal::Decimal;
use thiserror::Error;

pub use fixed_costs::{BillingCycle, FixedCost};
pub use profit::{CostLine, ProfitBreakdown, ProfitInput, ProfitStatus};
pub use shipping::{Dimensions, ServiceTier, ShipmentQuery, ShippingQuote, ShippingRule, ShippingTable};
pub use vat::{TaxRule, TaxRuleKind, TaxTable, VatAmounts};

#[derive(Debug, Clone, Error)]
pub enum PricingError {
    #[error("No shipping rule for {destination} at {weight} g")]
    NoShippingRule { destination: String, weight: u32 },
    #[error("Product {product} has no {field}")]
    IncompleteProductData { product: String, field: &'static str },
    #[error("VAT rate must be a fraction between 0 and 1, got {0}")]
    InvalidRate(Decimal),
    #[error("Invalid package dimensions: {0}")]
    InvalidDimensions(&'static str),
    #[error("Amount out of range: {0}")]
    AmountOutOfRange(&'static str),
}
