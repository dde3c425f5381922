use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{corrupt, like, non_negative, order_clause, Page};
use crate::domain::aggregates::{LineItem, Order, OrderStatus};
use crate::domain::value_objects::{money, CountryCode};
use crate::error::{AppError, AppResult};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    customer_id: Uuid,
    destination: String,
    status: String,
    shipping_cost_cents: i64,
    tracking_number: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: i64,
    unit_price_cents: i64,
}

impl TryFrom<ItemRow> for LineItem {
    type Error = crate::error::AppError;
    fn try_from(r: ItemRow) -> Result<Self, Self::Error> {
        Ok(LineItem {
            id: r.id,
            product_id: r.product_id,
            product_name: r.product_name,
            quantity: non_negative("item quantity", r.quantity)?,
            unit_price: money::from_cents(r.unit_price_cents),
        })
    }
}

async fn hydrate(conn: &mut SqliteConnection, r: OrderRow) -> AppResult<Order> {
    let items = sqlx::query_as::<_, ItemRow>(
        "SELECT id, product_id, product_name, quantity, unit_price_cents FROM order_items WHERE order_id = ?1 ORDER BY position",
    )
    .bind(r.id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(LineItem::try_from)
    .collect::<AppResult<Vec<_>>>()?;
    let destination = CountryCode::parse(&r.destination).map_err(|_| corrupt("order destination", &r.destination))?;
    let status = r.status.parse::<OrderStatus>().map_err(|_| corrupt("order status", &r.status))?;
    Ok(Order::restore(
        r.id, r.order_number, r.customer_id, destination, status, items,
        money::from_cents(r.shipping_cost_cents), r.tracking_number, r.notes, r.created_at, r.updated_at,
    ))
}

async fn hydrate_all(pool: &SqlitePool, rows: Vec<OrderRow>) -> AppResult<Vec<Order>> {
    let mut conn = pool.acquire().await?;
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        orders.push(hydrate(&mut conn, row).await?);
    }
    Ok(orders)
}

const FILTER: &str = "WHERE (?1 IS NULL OR o.order_number LIKE ?1 OR c.email LIKE ?1 OR c.last_name LIKE ?1) \
    AND (?2 IS NULL OR o.status = ?2) AND (?3 IS NULL OR o.customer_id = ?3) \
    AND (?4 IS NULL OR o.created_at >= ?4) AND (?5 IS NULL OR o.created_at < ?5)";

const SORTS: &[(&str, &str)] = &[("created_at", "o.created_at"), ("order_number", "o.order_number"), ("status", "o.status")];

#[derive(Debug, Default)]
pub struct OrderFilter {
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
    pub customer_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub sort: Option<String>,
    pub descending: bool,
}

pub async fn list(pool: &SqlitePool, filter: &OrderFilter, page: Page) -> AppResult<(Vec<Order>, i64)> {
    let search = like(filter.search.as_deref());
    let status = filter.status.map(|s| s.as_str());
    let sql = format!(
        "SELECT o.* FROM orders o JOIN customers c ON c.id = o.customer_id {FILTER} {} LIMIT ?6 OFFSET ?7",
        order_clause(filter.sort.as_deref(), filter.descending, SORTS, "o.created_at")
    );
    let rows = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(&search)
        .bind(status)
        .bind(filter.customer_id)
        .bind(filter.from)
        .bind(filter.until)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;
    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM orders o JOIN customers c ON c.id = o.customer_id {FILTER}"))
        .bind(&search)
        .bind(status)
        .bind(filter.customer_id)
        .bind(filter.from)
        .bind(filter.until)
        .fetch_one(pool)
        .await?;
    Ok((hydrate_all(pool, rows).await?, total.0))
}

/// Non-cancelled orders created in `[from, until)`.
pub async fn list_in_period(pool: &SqlitePool, from: DateTime<Utc>, until: DateTime<Utc>) -> AppResult<Vec<Order>> {
    let rows = sqlx::query_as::<_, OrderRow>(
        "SELECT * FROM orders WHERE status != 'cancelled' AND created_at >= ?1 AND created_at < ?2 ORDER BY created_at",
    )
    .bind(from)
    .bind(until)
    .fetch_all(pool)
    .await?;
    hydrate_all(pool, rows).await
}

/// Gross revenue of non-cancelled orders created in `[from, until)`.
pub async fn revenue_in_period(pool: &SqlitePool, from: DateTime<Utc>, until: DateTime<Utc>) -> AppResult<Decimal> {
    let per_order: Vec<(i64,)> = sqlx::query_as(
        "SELECT SUM(oi.quantity * oi.unit_price_cents) FROM order_items oi JOIN orders o ON o.id = oi.order_id \
         WHERE o.status != 'cancelled' AND o.created_at >= ?1 AND o.created_at < ?2 GROUP BY o.id",
    )
    .bind(from)
    .bind(until)
    .fetch_all(pool)
    .await?;
    per_order.into_iter().try_fold(Decimal::ZERO, |sum, (cents,)| add_cents(sum, cents))
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusCount {
    pub status: String,
    pub orders: i64,
    pub revenue: Decimal,
}

/// Order count and gross revenue per status, ordered by status name.
pub async fn status_counts(pool: &SqlitePool) -> AppResult<Vec<StatusCount>> {
    let per_order: Vec<(String, i64)> = sqlx::query_as(
        "SELECT o.status, COALESCE(SUM(oi.quantity * oi.unit_price_cents), 0) \
         FROM orders o LEFT JOIN order_items oi ON oi.order_id = o.id GROUP BY o.id",
    )
    .fetch_all(pool)
    .await?;
    let mut by_status: BTreeMap<String, (i64, Decimal)> = BTreeMap::new();
    for (status, cents) in per_order {
        let entry = by_status.entry(status).or_default();
        entry.0 += 1;
        entry.1 = add_cents(entry.1, cents)?;
    }
    Ok(by_status.into_iter().map(|(status, (orders, revenue))| StatusCount { status, orders, revenue }).collect())
}

/// Single orders fit in i64 cents; totals across orders are summed as decimals.
fn add_cents(sum: Decimal, cents: i64) -> AppResult<Decimal> {
    sum.checked_add(money::from_cents(cents)).ok_or_else(|| AppError::Internal("revenue total out of range".into()))
}

pub async fn find(conn: &mut SqliteConnection, id: Uuid) -> AppResult<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = ?1").bind(id).fetch_optional(&mut *conn).await?;
    match row {
        Some(r) => Ok(Some(hydrate(conn, r).await?)),
        None => Ok(None),
    }
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> AppResult<Option<Order>> {
    let mut conn = pool.acquire().await?;
    find(&mut conn, id).await
}

pub async fn number_exists(conn: &mut SqliteConnection, number: &str) -> AppResult<bool> {
    let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM orders WHERE order_number = ?1").bind(number).fetch_optional(conn).await?;
    Ok(found.is_some())
}

pub async fn insert(conn: &mut SqliteConnection, o: &Order) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO orders (id, order_number, customer_id, destination, status, shipping_cost_cents, tracking_number, notes, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )
    .bind(o.id())
    .bind(o.order_number())
    .bind(o.customer_id())
    .bind(o.destination().as_str())
    .bind(o.status().as_str())
    .bind(money::to_cents(o.shipping_cost()))
    .bind(o.tracking_number())
    .bind(o.notes())
    .bind(o.created_at())
    .bind(o.updated_at())
    .execute(&mut *conn)
    .await?;
    insert_items(conn, o).await
}

/// Saves the header and rewrites the line items.
pub async fn update(conn: &mut SqliteConnection, o: &Order) -> AppResult<()> {
    sqlx::query(
        "UPDATE orders SET destination = ?2, status = ?3, shipping_cost_cents = ?4, tracking_number = ?5, notes = ?6, updated_at = ?7 WHERE id = ?1",
    )
    .bind(o.id())
    .bind(o.destination().as_str())
    .bind(o.status().as_str())
    .bind(money::to_cents(o.shipping_cost()))
    .bind(o.tracking_number())
    .bind(o.notes())
    .bind(o.updated_at())
    .execute(&mut *conn)
    .await?;
    sqlx::query("DELETE FROM order_items WHERE order_id = ?1").bind(o.id()).execute(&mut *conn).await?;
    insert_items(conn, o).await
}

async fn insert_items(conn: &mut SqliteConnection, o: &Order) -> AppResult<()> {
    for (position, item) in o.items().iter().enumerate() {
        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_id, product_name, quantity, unit_price_cents, position) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(item.id)
        .bind(o.id())
        .bind(item.product_id)
        .bind(&item.product_name)
        .bind(i64::from(item.quantity))
        .bind(money::to_cents(item.unit_price))
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM orders WHERE id = ?1").bind(id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}
