use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{corrupt, non_negative};
use crate::domain::value_objects::{money, CountryCode, Grams};
use crate::error::{AppError, AppResult};
use crate::pricing::{ServiceTier, ShippingRule};

#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    id: Uuid,
    name: String,
    country: String,
    min_weight_grams: i64,
    max_weight_grams: i64,
    price_cents: i64,
    service: String,
    free_shipping_threshold_cents: Option<i64>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<RuleRow> for ShippingRule {
    type Error = AppError;
    fn try_from(r: RuleRow) -> Result<Self, Self::Error> {
        Ok(ShippingRule {
            country: CountryCode::parse(&r.country).map_err(|_| corrupt("rule country", &r.country))?,
            service: ServiceTier::parse(&r.service).ok_or_else(|| corrupt("rule service", &r.service))?,
            min_weight: Grams(non_negative("rule min weight", r.min_weight_grams)?),
            max_weight: Grams(non_negative("rule max weight", r.max_weight_grams)?),
            price: money::from_cents(r.price_cents),
            free_shipping_threshold: r.free_shipping_threshold_cents.map(money::from_cents),
            id: r.id,
            name: r.name,
            active: r.active,
            created_at: r.created_at,
        })
    }
}

pub async fn list(pool: &SqlitePool) -> AppResult<Vec<ShippingRule>> {
    sqlx::query_as::<_, RuleRow>("SELECT * FROM shipping_rules ORDER BY country, service, min_weight_grams, created_at")
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(ShippingRule::try_from)
        .collect()
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> AppResult<Option<ShippingRule>> {
    sqlx::query_as::<_, RuleRow>("SELECT * FROM shipping_rules WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(ShippingRule::try_from)
        .transpose()
}

pub async fn insert(pool: &SqlitePool, r: &ShippingRule) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO shipping_rules (id, name, country, min_weight_grams, max_weight_grams, price_cents, service, free_shipping_threshold_cents, active, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )
    .bind(r.id)
    .bind(&r.name)
    .bind(r.country.as_str())
    .bind(i64::from(r.min_weight.value()))
    .bind(i64::from(r.max_weight.value()))
    .bind(money::to_cents(r.price))
    .bind(r.service.as_str())
    .bind(r.free_shipping_threshold.map(money::to_cents))
    .bind(r.active)
    .bind(r.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update(pool: &SqlitePool, r: &ShippingRule) -> AppResult<()> {
    sqlx::query(
        "UPDATE shipping_rules SET name = ?2, country = ?3, min_weight_grams = ?4, max_weight_grams = ?5, price_cents = ?6, \
         service = ?7, free_shipping_threshold_cents = ?8, active = ?9 WHERE id = ?1",
    )
    .bind(r.id)
    .bind(&r.name)
    .bind(r.country.as_str())
    .bind(i64::from(r.min_weight.value()))
    .bind(i64::from(r.max_weight.value()))
    .bind(money::to_cents(r.price))
    .bind(r.service.as_str())
    .bind(r.free_shipping_threshold.map(money::to_cents))
    .bind(r.active)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM shipping_rules WHERE id = ?1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// DHL parcel bands for the home market and its neighbours, in cents.
const DEFAULT_BANDS: &[(&str, u32, u32, i64)] = &[
    ("NL", 0, 1_000, 595),
    ("NL", 1_000, 10_000, 895),
    ("NL", 10_000, 31_500, 1_395),
    ("BE", 0, 1_000, 895),
    ("BE", 1_000, 10_000, 1_195),
    ("BE", 10_000, 31_500, 1_795),
    ("DE", 0, 1_000, 995),
    ("DE", 1_000, 10_000, 1_295),
    ("DE", 10_000, 31_500, 1_895),
    ("FR", 0, 1_000, 1_195),
    ("FR", 1_000, 10_000, 1_495),
    ("FR", 10_000, 31_500, 2_195),
];

/// Inserts the default bands into an empty table; returns how many were added.
pub async fn seed_defaults(pool: &SqlitePool) -> AppResult<usize> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM shipping_rules").fetch_one(pool).await?;
    if count.0 > 0 {
        return Ok(0);
    }
    for &(country, min, max, cents) in DEFAULT_BANDS {
        let rule = ShippingRule {
            id: Uuid::new_v4(),
            name: format!("DHL {country} {}-{} kg", Decimal::new(i64::from(min), 3).normalize(), Decimal::new(i64::from(max), 3).normalize()),
            country: CountryCode::parse(country)?,
            min_weight: Grams(min),
            max_weight: Grams(max),
            price: money::from_cents(cents),
            service: ServiceTier::Standard,
            free_shipping_threshold: None,
            active: true,
            created_at: Utc::now(),
        };
        insert(pool, &rule).await?;
    }
    Ok(DEFAULT_BANDS.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::pricing::{ShipmentQuery, ShippingTable};

    #[tokio::test]
    async fn test_seeded_table_resolves_reference_case() {
        let pool = test_pool().await;
        assert_eq!(seed_defaults(&pool).await.unwrap(), DEFAULT_BANDS.len());
        assert_eq!(seed_defaults(&pool).await.unwrap(), 0);
        let table = ShippingTable::new(list(&pool).await.unwrap(), 5000);
        let quote = table.resolve(&ShipmentQuery::new(CountryCode::parse("NL").unwrap(), Grams(500))).unwrap();
        assert_eq!(quote.cost, Decimal::new(595, 2));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let pool = test_pool().await;
        seed_defaults(&pool).await.unwrap();
        let mut rule = list(&pool).await.unwrap().remove(0);
        rule.free_shipping_threshold = Some(Decimal::from(75));
        rule.active = false;
        update(&pool, &rule).await.unwrap();
        let stored = get(&pool, rule.id).await.unwrap().unwrap();
        assert_eq!(stored.free_shipping_threshold, Some(Decimal::from(75)));
        assert!(!stored.active);
        assert!(delete(&pool, rule.id).await.unwrap());
        assert!(!delete(&pool, rule.id).await.unwrap());
    }
}
