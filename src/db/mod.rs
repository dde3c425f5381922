//! SQLite persistence.
//!
//! One module per table. Rows map onto `sqlx::FromRow` structs and convert
//! into domain types; cents become decimals at this boundary.

pub mod ad_spend;
pub mod customers;
pub mod fixed_costs;
pub mod orders;
pub mod products;
pub mod shipping_rules;
pub mod tax_rules;
pub mod users;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::auth::hash_password;
use crate::config::Config;
use crate::error::AppError;

pub async fn connect(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true).foreign_keys(true);
    SqlitePoolOptions::new().max_connections(10).connect_with(options).await
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Creates the configured admin account and the default shipping table when absent.
pub async fn seed(pool: &SqlitePool, config: &Config) -> Result<(), AppError> {
    match &config.admin_password {
        Some(password) if users::find_by_email(pool, &config.admin_email).await?.is_none() => {
            let hash = hash_password(password).map_err(|e| AppError::Internal(e.to_string()))?;
            users::insert(pool, &config.admin_email, "Administrator", &hash).await?;
            tracing::info!(email = %config.admin_email, "seeded admin account");
        }
        Some(_) => {}
        None => tracing::warn!("ADMIN_PASSWORD not set, no admin account seeded"),
    }
    let seeded = shipping_rules::seed_defaults(pool).await?;
    if seeded > 0 {
        tracing::info!(rules = seeded, "seeded default shipping rules");
    }
    Ok(())
}

/// 1-based page with a capped page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page: page.unwrap_or(1).max(1), per_page: per_page.unwrap_or(20).clamp(1, 100) }
    }
    pub fn limit(&self) -> i64 { i64::from(self.per_page) }
    pub fn offset(&self) -> i64 { i64::from(self.page - 1) * i64::from(self.per_page) }
}

impl Default for Page {
    fn default() -> Self { Self::new(None, None) }
}

/// Builds an `ORDER BY` clause from a whitelisted column; anything else falls back to the default.
pub(crate) fn order_clause(sort: Option<&str>, descending: bool, allowed: &[(&str, &str)], default: &str) -> String {
    let column = sort.and_then(|s| allowed.iter().find(|(name, _)| *name == s)).map_or(default, |(_, col)| *col);
    format!("ORDER BY {column} {}", if descending { "DESC" } else { "ASC" })
}

/// `%term%` for LIKE filters, `None` when blank.
pub(crate) fn like(term: Option<&str>) -> Option<String> {
    term.map(str::trim).filter(|t| !t.is_empty()).map(|t| format!("%{t}%"))
}

pub(crate) fn corrupt(what: &str, value: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("stored {what} is invalid: {value}"))
}

pub(crate) fn non_negative(what: &str, value: i64) -> Result<u32, AppError> {
    u32::try_from(value).map_err(|_| corrupt(what, value))
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
    migrate(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        assert_eq!(Page::new(Some(0), Some(500)), Page { page: 1, per_page: 100 });
        assert_eq!(Page::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn test_order_clause_whitelist() {
        let allowed = [("name", "p.name"), ("price", "p.price_cents")];
        assert_eq!(order_clause(Some("price"), false, &allowed, "p.created_at"), "ORDER BY p.price_cents ASC");
        assert_eq!(order_clause(Some("1; DROP TABLE x"), true, &allowed, "p.created_at"), "ORDER BY p.created_at DESC");
    }

    #[tokio::test]
    async fn test_migrations_and_seed() {
        let pool = test_pool().await;
        let mut config = crate::state::tests::test_config();
        config.admin_password = Some("s3cret-pass".into());
        seed(&pool, &config).await.unwrap();
        seed(&pool, &config).await.unwrap();
        assert!(users::find_by_email(&pool, &config.admin_email).await.unwrap().is_some());
        assert!(!shipping_rules::list(&pool).await.unwrap().is_empty());
    }
}
