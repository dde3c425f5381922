//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::OrderStatus;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "aggregate", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
    Customer(CustomerEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: Uuid, sku: String },
    PriceChanged { product_id: Uuid, price: Decimal, cost_price: Option<Decimal> },
    Archived { product_id: Uuid },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: Uuid, customer_id: Uuid, revenue: Decimal },
    ItemsReplaced { order_id: Uuid, revenue: Decimal },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
    Shipped { order_id: Uuid, tracking: String },
    Deleted { order_id: Uuid },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CustomerEvent {
    Registered { customer_id: Uuid, email: String },
    Deleted { customer_id: Uuid },
}

impl DomainEvent {
    /// NATS subject, e.g. `backoffice.order.status_changed`.
    pub fn subject(&self) -> String {
        let (aggregate, name) = match self {
            Self::Product(e) => ("product", match e {
                ProductEvent::Created { .. } => "created",
                ProductEvent::PriceChanged { .. } => "price_changed",
                ProductEvent::Archived { .. } => "archived",
            }),
            Self::Order(e) => ("order", match e {
                OrderEvent::Created { .. } => "created",
                OrderEvent::ItemsReplaced { .. } => "items_replaced",
                OrderEvent::StatusChanged { .. } => "status_changed",
                OrderEvent::Shipped { .. } => "shipped",
                OrderEvent::Deleted { .. } => "deleted",
            }),
            Self::Customer(e) => ("customer", match e {
                CustomerEvent::Registered { .. } => "registered",
                CustomerEvent::Deleted { .. } => "deleted",
            }),
        };
        format!("backoffice.{aggregate}.{name}")
    }
}
