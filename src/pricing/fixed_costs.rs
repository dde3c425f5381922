//! Recurring overhead (rent, subscriptions, insurance) spread over a period.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::money;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle { #[default] Monthly, Quarterly, Yearly, OneTime }

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Monthly => "monthly", Self::Quarterly => "quarterly", Self::Yearly => "yearly", Self::OneTime => "one_time" }
    }
    pub fn parse(s: &str) -> Option<Self> {
        match s { "monthly" => Some(Self::Monthly), "quarterly" => Some(Self::Quarterly), "yearly" => Some(Self::Yearly), "one_time" => Some(Self::OneTime), _ => None }
    }

    /// Average length of one cycle in days; `None` for one-off costs.
    fn days(&self) -> Option<Decimal> {
        match self {
            Self::Monthly => Some(Decimal::new(3044, 2)),
            Self::Quarterly => Some(Decimal::new(9131, 2)),
            Self::Yearly => Some(Decimal::new(36525, 2)),
            Self::OneTime => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixedCost {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub amount: Decimal,
    pub billing_cycle: BillingCycle,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl FixedCost {
    /// Share of this cost that falls in `[start, end]` (both inclusive), unrounded.
    pub fn allocate(&self, start: NaiveDate, end: NaiveDate) -> Decimal {
        if !self.active || end < start { return Decimal::ZERO; }
        let Some(cycle_days) = self.billing_cycle.days() else {
            return if self.start_date >= start && self.start_date <= end { self.amount } else { Decimal::ZERO };
        };
        let from = start.max(self.start_date);
        let to = self.end_date.map_or(end, |e| e.min(end));
        if to < from { return Decimal::ZERO; }
        let days = Decimal::from((to - from).num_days() + 1);
        self.amount * days / cycle_days
    }

    /// Normalized monthly amount (one-off costs count as zero).
    pub fn monthly_amount(&self) -> Decimal {
        if !self.active { return Decimal::ZERO; }
        match self.billing_cycle {
            BillingCycle::Monthly => self.amount,
            BillingCycle::Quarterly => self.amount / Decimal::from(3),
            BillingCycle::Yearly => self.amount / Decimal::from(12),
            BillingCycle::OneTime => Decimal::ZERO,
        }
    }
}

/// Total of all costs allocated to the period, rounded.
pub fn allocate_all(costs: &[FixedCost], start: NaiveDate, end: NaiveDate) -> Decimal {
    money::round(costs.iter().map(|c| c.allocate(start, end)).sum())
}
