//! Order workflows that touch more than one table.
//!
//! Stock moves, shipping resolution and the order write share one transaction,
//! so a failure anywhere leaves products and orders untouched.

use rand::Rng;
use rust_decimal::Decimal;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::db;
use crate::domain::aggregates::{LineItem, Order, OrderError, OrderStatus};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{CountryCode, Grams};
use crate::error::{AppError, AppResult};
use crate::pricing::{PricingError, ShipmentQuery, ShippingTable, TaxTable};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct ItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub customer_id: Uuid,
    pub order_number: Option<String>,
    /// Falls back to the customer's country.
    pub destination: Option<CountryCode>,
    pub items: Vec<ItemRequest>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOrder {
    pub items: Option<Vec<ItemRequest>>,
    pub destination: Option<CountryCode>,
    pub notes: Option<String>,
    pub status: Option<OrderStatus>,
    pub tracking_number: Option<String>,
}

pub async fn place(state: &AppState, cmd: PlaceOrder) -> AppResult<Order> {
    let customer = db::customers::find(&state.db, cmd.customer_id).await?.ok_or_else(|| AppError::not_found("Customer"))?;
    let destination = cmd.destination.unwrap_or(customer.country);
    let table = shipping_table(state).await?;

    let mut tx = state.db.begin().await?;
    let order_number = match cmd.order_number.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
        Some(number) => {
            if db::orders::number_exists(&mut tx, &number).await? {
                return Err(AppError::conflict(format!("Order number {number} already exists")));
            }
            number
        }
        None => generate_order_number(&mut tx).await?,
    };
    let (items, weight) = reserve(&mut tx, &cmd.items).await?;
    let mut order = Order::create(order_number, customer.id, destination, items)?;
    order.set_shipping_cost(quote_shipping(&table, &order, weight)?);
    order.set_notes(cmd.notes);
    db::orders::insert(&mut tx, &order).await?;
    tx.commit().await?;

    tracing::info!(order_id = %order.id(), order_number = %order.order_number(), revenue = %order.revenue(), "order placed");
    state.events.publish(order.take_events()).await;
    Ok(order)
}

pub async fn update(state: &AppState, id: Uuid, cmd: UpdateOrder) -> AppResult<Order> {
    let table = shipping_table(state).await?;
    let mut tx = state.db.begin().await?;
    let mut order = db::orders::find(&mut tx, id).await?.ok_or_else(|| AppError::not_found("Order"))?;

    if cmd.items.is_some() || cmd.destination.is_some() {
        let requests = cmd.items.unwrap_or_else(|| {
            order.items().iter().map(|i| ItemRequest { product_id: i.product_id, quantity: i.quantity }).collect()
        });
        let destination = cmd.destination.unwrap_or_else(|| order.destination().clone());
        if !matches!(order.status(), OrderStatus::Pending | OrderStatus::Processing) {
            return Err(OrderError::NotEditable(order.status()).into());
        }
        restock(&mut tx, order.items()).await?;
        let (items, weight) = reserve(&mut tx, &requests).await?;
        order.replace_items(items, destination)?;
        let cost = quote_shipping(&table, &order, weight)?;
        order.set_shipping_cost(cost);
    }
    if let Some(notes) = cmd.notes {
        order.set_notes(Some(notes).filter(|n| !n.trim().is_empty()));
    }
    if let Some(next) = cmd.status {
        apply_status(&mut tx, &mut order, next, cmd.tracking_number).await?;
    }
    db::orders::update(&mut tx, &order).await?;
    tx.commit().await?;

    state.events.publish(order.take_events()).await;
    Ok(order)
}

/// Moves the order along its state machine; cancelling puts the items back in stock.
pub async fn transition(state: &AppState, id: Uuid, next: OrderStatus, tracking_number: Option<String>) -> AppResult<Order> {
    let mut tx = state.db.begin().await?;
    let mut order = db::orders::find(&mut tx, id).await?.ok_or_else(|| AppError::not_found("Order"))?;
    apply_status(&mut tx, &mut order, next, tracking_number).await?;
    db::orders::update(&mut tx, &order).await?;
    tx.commit().await?;

    tracing::info!(order_id = %id, status = %next, "order status changed");
    state.events.publish(order.take_events()).await;
    Ok(order)
}

/// Cancels an order on behalf of its customer. Someone else's order is reported as missing.
pub async fn cancel_for_customer(state: &AppState, customer_id: Uuid, id: Uuid) -> AppResult<Order> {
    match db::orders::get(&state.db, id).await? {
        Some(order) if order.customer_id() == customer_id => transition(state, id, OrderStatus::Cancelled, None).await,
        _ => Err(AppError::not_found("Order")),
    }
}

/// Hard delete. Items of an order that never shipped return to stock.
pub async fn delete(state: &AppState, id: Uuid) -> AppResult<()> {
    let mut tx = state.db.begin().await?;
    let order = db::orders::find(&mut tx, id).await?.ok_or_else(|| AppError::not_found("Order"))?;
    if matches!(order.status(), OrderStatus::Pending | OrderStatus::Processing) {
        restock(&mut tx, order.items()).await?;
    }
    db::orders::delete(&mut tx, id).await?;
    tx.commit().await?;

    tracing::info!(order_id = %id, order_number = %order.order_number(), "order deleted");
    state.events.publish(vec![DomainEvent::Order(OrderEvent::Deleted { order_id: id })]).await;
    Ok(())
}

async fn apply_status(conn: &mut SqliteConnection, order: &mut Order, next: OrderStatus, tracking: Option<String>) -> AppResult<()> {
    match (next, tracking) {
        (OrderStatus::Shipped, Some(tracking)) => order.ship(tracking)?,
        (OrderStatus::Cancelled, _) => {
            order.cancel()?;
            restock(conn, order.items()).await?;
        }
        _ => order.transition_to(next)?,
    }
    Ok(())
}

pub(crate) async fn shipping_table(state: &AppState) -> AppResult<ShippingTable> {
    Ok(ShippingTable::new(db::shipping_rules::list(&state.db).await?, state.settings.volumetric_divisor))
}

/// Configured VAT rates with the stored overrides layered on top.
pub(crate) async fn tax_table(state: &AppState) -> AppResult<TaxTable> {
    let rules = db::tax_rules::list(&state.db).await?;
    Ok(rules.iter().fold(TaxTable::clone(&state.tax), |table, rule| table.with_rule(rule)))
}

fn quote_shipping(table: &ShippingTable, order: &Order, weight: Grams) -> Result<Decimal, PricingError> {
    let query = ShipmentQuery { order_value: Some(order.revenue()), ..ShipmentQuery::new(order.destination().clone(), weight) };
    Ok(table.resolve(&query)?.cost)
}

/// Takes the requested quantities out of stock and snapshots name and price.
async fn reserve(conn: &mut SqliteConnection, requests: &[ItemRequest]) -> AppResult<(Vec<LineItem>, Grams)> {
    let mut items = Vec::with_capacity(requests.len());
    let mut weight = Grams::default();
    for request in requests {
        let mut product = db::products::find(conn, request.product_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Product {}", request.product_id)))?;
        if !product.is_orderable() {
            return Err(AppError::conflict(format!("Product {} is archived", product.sku())));
        }
        let unit_weight = product
            .weight()
            .ok_or_else(|| PricingError::IncompleteProductData { product: product.sku().to_string(), field: "weight" })?;
        product.remove_stock(request.quantity)?;
        db::products::update(conn, &product).await?;
        weight = weight + unit_weight.times(request.quantity);
        items.push(LineItem::new(product.id(), product.name(), request.quantity, product.price()));
    }
    Ok((items, weight))
}

async fn restock(conn: &mut SqliteConnection, items: &[LineItem]) -> AppResult<()> {
    for item in items {
        // Products are archived, never deleted, but tolerate a missing row.
        let Some(mut product) = db::products::find(conn, item.product_id).await? else {
            tracing::warn!(product_id = %item.product_id, "restock skipped, product missing");
            continue;
        };
        product.add_stock(item.quantity);
        db::products::update(conn, &product).await?;
    }
    Ok(())
}

async fn generate_order_number(conn: &mut SqliteConnection) -> AppResult<String> {
    for _ in 0..10 {
        let number = format!("ORD-{:08}", rand::thread_rng().gen_range(0..100_000_000u32));
        if !db::orders::number_exists(conn, &number).await? {
            return Ok(number);
        }
    }
    Err(AppError::Internal("could not allocate a unique order number".into()))
}
