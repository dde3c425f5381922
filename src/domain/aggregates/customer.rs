//! Customer Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::CountryCode;

#[derive(Clone, Debug, Serialize)]
pub struct Customer {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: CountryCode,
    pub status: CustomerStatus,
    pub notes: Option<String>,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus { #[default] New, Active, Inactive, Vip }

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::New => "new", Self::Active => "active", Self::Inactive => "inactive", Self::Vip => "vip" }
    }
    pub fn parse(s: &str) -> Option<Self> {
        match s { "new" => Some(Self::New), "active" => Some(Self::Active), "inactive" => Some(Self::Inactive), "vip" => Some(Self::Vip), _ => None }
    }
}

impl Customer {
    pub fn full_name(&self) -> String { format!("{} {}", self.first_name, self.last_name) }
}

/// Customer plus the spend figures derived from their orders.
#[derive(Clone, Debug, Serialize)]
pub struct CustomerSummary {
    #[serde(flatten)]
    pub customer: Customer,
    pub total_orders: i64,
    pub total_spent: Decimal,
    pub is_vip: bool,
}

impl CustomerSummary {
    /// VIP by explicit status or by lifetime spend reaching the threshold.
    pub fn new(customer: Customer, total_orders: i64, total_spent: Decimal, vip_threshold: Decimal) -> Self {
        let is_vip = customer.status == CustomerStatus::Vip || total_spent >= vip_threshold;
        Self { customer, total_orders, total_spent, is_vip }
    }
}

/// Normalized form used for uniqueness checks.
pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(status: CustomerStatus) -> Customer {
        Customer {
            id: Uuid::new_v4(), email: "jan@example.nl".into(), first_name: "Jan".into(), last_name: "Jansen".into(),
            phone: None, address: None, city: None, postal_code: None, country: CountryCode::parse("NL").unwrap(),
            status, notes: None, password_hash: None, created_at: Utc::now(), updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_vip_by_spend_or_status() {
        let threshold = Decimal::new(1000, 0);
        assert!(CustomerSummary::new(customer(CustomerStatus::Active), 3, Decimal::new(1000, 0), threshold).is_vip);
        assert!(!CustomerSummary::new(customer(CustomerStatus::Active), 3, Decimal::new(99999, 2), threshold).is_vip);
        assert!(CustomerSummary::new(customer(CustomerStatus::Vip), 0, Decimal::ZERO, threshold).is_vip);
    }

    #[test]
    fn test_summary_hides_password() {
        let mut c = customer(CustomerStatus::New);
        c.password_hash = Some("secret".into());
        let json = serde_json::to_value(CustomerSummary::new(c, 0, Decimal::ZERO, Decimal::ONE)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "jan@example.nl");
        assert_eq!(normalize_email("  Jan@Example.NL "), "jan@example.nl");
    }
}
