//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::{money, CountryCode};
use crate::domain::events::{DomainEvent, OrderEvent};

#[derive(Clone, Debug, Serialize)]
pub struct Order {
    id: Uuid,
    order_number: String,
    customer_id: Uuid,
    destination: CountryCode,
    status: OrderStatus,
    items: Vec<LineItem>,
    /// Shipping price resolved from the rule table when the items were last set.
    shipping_cost: Decimal,
    tracking_number: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// A product reference with the sale price captured at checkout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem { pub id: Uuid, pub product_id: Uuid, pub product_name: String, pub quantity: u32, pub unit_price: Decimal }

impl LineItem {
    pub fn new(product_id: Uuid, product_name: impl Into<String>, quantity: u32, unit_price: Decimal) -> Self {
        Self { id: Uuid::new_v4(), product_id, product_name: product_name.into(), quantity, unit_price }
    }
    pub fn total(&self) -> Decimal { self.unit_price * Decimal::from(self.quantity) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Processing, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [Self::Pending, Self::Processing, Self::Shipped, Self::Delivered, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// pending → processing → shipped → delivered; cancelled only before shipping.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Shipped)
                | (Self::Shipped, Self::Delivered)
                | (Self::Pending | Self::Processing, Self::Cancelled)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.as_str() == s).ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

impl Order {
    pub fn create(order_number: impl Into<String>, customer_id: Uuid, destination: CountryCode, items: Vec<LineItem>) -> Result<Self, OrderError> {
        validate_items(&items)?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut order = Self {
            id, order_number: order_number.into(), customer_id, destination,
            status: OrderStatus::Pending, items, shipping_cost: Decimal::ZERO,
            tracking_number: None, notes: None, created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Created { order_id: id, customer_id, revenue: order.revenue() }));
        Ok(order)
    }

    /// Rebuilds an order from persisted state without raising events.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid, order_number: String, customer_id: Uuid, destination: CountryCode, status: OrderStatus,
        items: Vec<LineItem>, shipping_cost: Decimal, tracking_number: Option<String>, notes: Option<String>,
        created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
    ) -> Self {
        Self { id, order_number, customer_id, destination, status, items, shipping_cost, tracking_number, notes, created_at, updated_at, events: vec![] }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn customer_id(&self) -> Uuid { self.customer_id }
    pub fn destination(&self) -> &CountryCode { &self.destination }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn shipping_cost(&self) -> Decimal { self.shipping_cost }
    pub fn tracking_number(&self) -> Option<&str> { self.tracking_number.as_deref() }
    pub fn notes(&self) -> Option<&str> { self.notes.as_deref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Gross revenue (ex. VAT) from the price snapshots.
    pub fn revenue(&self) -> Decimal { self.items.iter().map(LineItem::total).sum() }

    pub fn set_notes(&mut self, notes: Option<String>) { self.notes = notes; self.touch(); }

    pub fn set_shipping_cost(&mut self, cost: Decimal) { self.shipping_cost = cost; self.touch(); }

    /// Items may only change while the order has not left the warehouse.
    pub fn replace_items(&mut self, items: Vec<LineItem>, destination: CountryCode) -> Result<(), OrderError> {
        if !matches!(self.status, OrderStatus::Pending | OrderStatus::Processing) {
            return Err(OrderError::NotEditable(self.status));
        }
        validate_items(&items)?;
        self.items = items;
        self.destination = destination;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::ItemsReplaced { order_id: self.id, revenue: self.revenue() }));
        Ok(())
    }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.status, to: next });
        }
        let from = self.status;
        self.status = next;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to: next }));
        Ok(())
    }

    pub fn ship(&mut self, tracking: impl Into<String>) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::Shipped)?;
        let tracking = tracking.into();
        self.tracking_number = Some(tracking.clone());
        self.raise_event(DomainEvent::Order(OrderEvent::Shipped { order_id: self.id, tracking }));
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), OrderError> { self.transition_to(OrderStatus::Cancelled) }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

fn validate_items(items: &[LineItem]) -> Result<(), OrderError> {
    if items.is_empty() { return Err(OrderError::NoItems); }
    if items.iter().any(|i| i.quantity == 0) { return Err(OrderError::InvalidQuantity); }
    if items.iter().any(|i| i.unit_price.is_sign_negative()) { return Err(OrderError::NegativePrice); }
    let revenue = items
        .iter()
        .try_fold(Decimal::ZERO, |sum, i| i.unit_price.checked_mul(Decimal::from(i.quantity)).and_then(|t| sum.checked_add(t)));
    if !revenue.is_some_and(|r| r <= money::MAX_AMOUNT) { return Err(OrderError::TotalTooLarge(money::MAX_AMOUNT)); }
    Ok(())
}

#[derive(Debug, Clone, Error)]
pub enum OrderError {
    #[error("Order has no items")]
    NoItems,
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Unit price cannot be negative")]
    NegativePrice,
    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Order is {0} and can no longer be edited")]
    NotEditable(OrderStatus),
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
    #[error("Order total exceeds {0}")]
    TotalTooLarge(Decimal),
}
