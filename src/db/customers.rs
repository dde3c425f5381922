use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{corrupt, like, order_clause, Page};
use crate::domain::aggregates::{normalize_email, Customer, CustomerStatus, CustomerSummary};
use crate::domain::value_objects::{money, CountryCode};
use crate::error::AppResult;

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    address: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
    country: String,
    status: String,
    notes: Option<String>,
    password_hash: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    #[sqlx(flatten)]
    customer: CustomerRow,
    total_orders: i64,
    total_spent_cents: i64,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = crate::error::AppError;
    fn try_from(r: CustomerRow) -> Result<Self, Self::Error> {
        Ok(Customer {
            country: CountryCode::parse(&r.country).map_err(|_| corrupt("customer country", &r.country))?,
            status: CustomerStatus::parse(&r.status).ok_or_else(|| corrupt("customer status", &r.status))?,
            id: r.id, email: r.email, first_name: r.first_name, last_name: r.last_name, phone: r.phone,
            address: r.address, city: r.city, postal_code: r.postal_code, notes: r.notes,
            password_hash: r.password_hash, created_at: r.created_at, updated_at: r.updated_at,
        })
    }
}

const SUMMARY_SELECT: &str = "SELECT c.*, \
    (SELECT COUNT(*) FROM orders o WHERE o.customer_id = c.id) AS total_orders, \
    (SELECT COALESCE(SUM(oi.quantity * oi.unit_price_cents), 0) FROM order_items oi JOIN orders o ON o.id = oi.order_id \
     WHERE o.customer_id = c.id AND o.status != 'cancelled') AS total_spent_cents \
    FROM customers c";

const FILTER: &str = "WHERE (?1 IS NULL OR c.email LIKE ?1 OR c.first_name LIKE ?1 OR c.last_name LIKE ?1 OR c.city LIKE ?1) \
    AND (?2 IS NULL OR c.status = ?2)";

const SORTS: &[(&str, &str)] = &[
    ("created_at", "c.created_at"),
    ("email", "c.email"),
    ("last_name", "c.last_name"),
    ("total_spent", "total_spent_cents"),
    ("total_orders", "total_orders"),
];

#[derive(Debug, Default)]
pub struct CustomerFilter {
    pub search: Option<String>,
    pub status: Option<CustomerStatus>,
    pub sort: Option<String>,
    pub descending: bool,
}

fn summarize(row: SummaryRow, vip_threshold: Decimal) -> AppResult<CustomerSummary> {
    Ok(CustomerSummary::new(row.customer.try_into()?, row.total_orders, money::from_cents(row.total_spent_cents), vip_threshold))
}

pub async fn list(pool: &SqlitePool, filter: &CustomerFilter, page: Page, vip_threshold: Decimal) -> AppResult<(Vec<CustomerSummary>, i64)> {
    let search = like(filter.search.as_deref());
    let status = filter.status.map(|s| s.as_str());
    let sql = format!(
        "{SUMMARY_SELECT} {FILTER} {} LIMIT ?3 OFFSET ?4",
        order_clause(filter.sort.as_deref(), filter.descending, SORTS, "c.created_at")
    );
    let rows = sqlx::query_as::<_, SummaryRow>(&sql)
        .bind(&search)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;
    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM customers c {FILTER}"))
        .bind(&search)
        .bind(status)
        .fetch_one(pool)
        .await?;
    let customers = rows.into_iter().map(|r| summarize(r, vip_threshold)).collect::<AppResult<Vec<_>>>()?;
    Ok((customers, total.0))
}

pub async fn find(pool: &SqlitePool, id: Uuid) -> AppResult<Option<Customer>> {
    sqlx::query_as::<_, CustomerRow>("SELECT * FROM customers WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(Customer::try_from)
        .transpose()
}

pub async fn find_summary(pool: &SqlitePool, id: Uuid, vip_threshold: Decimal) -> AppResult<Option<CustomerSummary>> {
    sqlx::query_as::<_, SummaryRow>(&format!("{SUMMARY_SELECT} WHERE c.id = ?1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(|r| summarize(r, vip_threshold))
        .transpose()
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<Customer>> {
    sqlx::query_as::<_, CustomerRow>("SELECT * FROM customers WHERE email = ?1")
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?
        .map(Customer::try_from)
        .transpose()
}

/// Customers that are VIP by status or by spend, highest spend first.
pub async fn list_vip(pool: &SqlitePool, vip_threshold: Decimal, limit: i64) -> AppResult<Vec<CustomerSummary>> {
    let sql = format!("SELECT * FROM ({SUMMARY_SELECT}) WHERE status = 'vip' OR total_spent_cents >= ?1 ORDER BY total_spent_cents DESC LIMIT ?2");
    let rows = sqlx::query_as::<_, SummaryRow>(&sql)
        .bind(money::to_cents(vip_threshold))
        .bind(limit)
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(|r| summarize(r, vip_threshold)).collect()
}

pub async fn insert(pool: &SqlitePool, c: &Customer) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO customers (id, email, first_name, last_name, phone, address, city, postal_code, country, status, notes, password_hash, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
    )
    .bind(c.id).bind(normalize_email(&c.email)).bind(&c.first_name).bind(&c.last_name).bind(&c.phone)
    .bind(&c.address).bind(&c.city).bind(&c.postal_code).bind(c.country.as_str()).bind(c.status.as_str())
    .bind(&c.notes).bind(&c.password_hash).bind(c.created_at).bind(c.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update(pool: &SqlitePool, c: &Customer) -> AppResult<()> {
    sqlx::query(
        "UPDATE customers SET email = ?2, first_name = ?3, last_name = ?4, phone = ?5, address = ?6, city = ?7, postal_code = ?8, \
         country = ?9, status = ?10, notes = ?11, password_hash = ?12, updated_at = ?13 WHERE id = ?1",
    )
    .bind(c.id).bind(normalize_email(&c.email)).bind(&c.first_name).bind(&c.last_name).bind(&c.phone)
    .bind(&c.address).bind(&c.city).bind(&c.postal_code).bind(c.country.as_str()).bind(c.status.as_str())
    .bind(&c.notes).bind(&c.password_hash).bind(c.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_password(pool: &SqlitePool, id: Uuid, password_hash: &str) -> AppResult<()> {
    sqlx::query("UPDATE customers SET password_hash = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn count_orders(pool: &SqlitePool, id: Uuid) -> AppResult<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE customer_id = ?1").bind(id).fetch_one(pool).await?;
    Ok(count.0)
}

pub async fn delete(pool: &SqlitePool, id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM customers WHERE id = ?1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
