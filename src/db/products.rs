use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{corrupt, like, non_negative, order_clause, Page};
use crate::domain::aggregates::{Product, ProductDetails, ProductStatus};
use crate::domain::value_objects::{money, Grams, Sku};
use crate::error::{AppError, AppResult};

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    sku: String,
    name: String,
    description: Option<String>,
    category: Option<String>,
    price_cents: i64,
    cost_price_cents: Option<i64>,
    weight_grams: Option<i64>,
    stock: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = AppError;
    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        let sku = Sku::new(r.sku.clone()).map_err(|_| corrupt("product sku", &r.sku))?;
        let status = ProductStatus::parse(&r.status).ok_or_else(|| corrupt("product status", &r.status))?;
        let weight = r.weight_grams.map(|w| non_negative("product weight", w).map(Grams)).transpose()?;
        let details = ProductDetails {
            name: r.name,
            description: r.description,
            category: r.category,
            price: money::from_cents(r.price_cents),
            cost_price: r.cost_price_cents.map(money::from_cents),
            weight,
            stock: non_negative("product stock", r.stock)?,
        };
        Ok(Product::restore(r.id, sku, details, status, r.created_at, r.updated_at))
    }
}

const FILTER: &str = "WHERE (?1 IS NULL OR p.name LIKE ?1 OR p.sku LIKE ?1 OR p.description LIKE ?1) \
    AND (?2 IS NULL OR p.category = ?2) AND (?3 IS NULL OR p.status = ?3)";

const SORTS: &[(&str, &str)] = &[
    ("created_at", "p.created_at"),
    ("name", "p.name"),
    ("sku", "p.sku"),
    ("price", "p.price_cents"),
    ("stock", "p.stock"),
];

#[derive(Debug, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<ProductStatus>,
    pub sort: Option<String>,
    pub descending: bool,
}

pub async fn list(pool: &SqlitePool, filter: &ProductFilter, page: Page) -> AppResult<(Vec<Product>, i64)> {
    let search = like(filter.search.as_deref());
    let status = filter.status.map(|s| s.as_str());
    let sql = format!(
        "SELECT p.* FROM products p {FILTER} {} LIMIT ?4 OFFSET ?5",
        order_clause(filter.sort.as_deref(), filter.descending, SORTS, "p.created_at")
    );
    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(&search)
        .bind(&filter.category)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;
    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM products p {FILTER}"))
        .bind(&search)
        .bind(&filter.category)
        .bind(status)
        .fetch_one(pool)
        .await?;
    let products = rows.into_iter().map(Product::try_from).collect::<AppResult<Vec<_>>>()?;
    Ok((products, total.0))
}

pub async fn list_active(pool: &SqlitePool) -> AppResult<Vec<Product>> {
    sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE status = 'active' ORDER BY name")
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Product::try_from)
        .collect()
}

pub async fn find(conn: &mut SqliteConnection, id: Uuid) -> AppResult<Option<Product>> {
    sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = ?1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .map(Product::try_from)
        .transpose()
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> AppResult<Option<Product>> {
    let mut conn = pool.acquire().await?;
    find(&mut conn, id).await
}

pub async fn sku_exists(pool: &SqlitePool, sku: &Sku) -> AppResult<bool> {
    let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE sku = ?1").bind(sku.as_str()).fetch_optional(pool).await?;
    Ok(found.is_some())
}

pub async fn categories(pool: &SqlitePool) -> AppResult<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT category FROM products WHERE category IS NOT NULL AND category != '' AND status = 'active' ORDER BY category",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}

pub async fn insert(pool: &SqlitePool, p: &Product) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO products (id, sku, name, description, category, price_cents, cost_price_cents, weight_grams, stock, status, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )
    .bind(p.id())
    .bind(p.sku().as_str())
    .bind(p.name())
    .bind(p.description())
    .bind(p.category())
    .bind(money::to_cents(p.price()))
    .bind(p.cost_price().map(money::to_cents))
    .bind(p.weight().map(|w| i64::from(w.value())))
    .bind(i64::from(p.stock()))
    .bind(p.status().as_str())
    .bind(p.created_at())
    .bind(p.updated_at())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update(conn: &mut SqliteConnection, p: &Product) -> AppResult<()> {
    sqlx::query(
        "UPDATE products SET name = ?2, description = ?3, category = ?4, price_cents = ?5, cost_price_cents = ?6, \
         weight_grams = ?7, stock = ?8, status = ?9, updated_at = ?10 WHERE id = ?1",
    )
    .bind(p.id())
    .bind(p.name())
    .bind(p.description())
    .bind(p.category())
    .bind(money::to_cents(p.price()))
    .bind(p.cost_price().map(money::to_cents))
    .bind(p.weight().map(|w| i64::from(w.value())))
    .bind(i64::from(p.stock()))
    .bind(p.status().as_str())
    .bind(p.updated_at())
    .execute(conn)
    .await?;
    Ok(())
}
