use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::corrupt;
use crate::error::{AppError, AppResult};
use crate::pricing::{TaxRule, TaxRuleKind};

#[derive(Debug, sqlx::FromRow)]
struct TaxRuleRow {
    id: Uuid,
    kind: String,
    key: String,
    rate_bp: i64,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<TaxRuleRow> for TaxRule {
    type Error = AppError;
    fn try_from(r: TaxRuleRow) -> Result<Self, Self::Error> {
        Ok(TaxRule {
            kind: TaxRuleKind::parse(&r.kind).ok_or_else(|| corrupt("tax rule kind", &r.kind))?,
            rate: Decimal::new(r.rate_bp, 4).normalize(),
            id: r.id,
            key: r.key,
            active: r.active,
            created_at: r.created_at,
        })
    }
}

/// Rates are stored in basis points; anything finer is rounded half-up.
fn basis_points(rate: Decimal) -> AppResult<i64> {
    (rate * Decimal::from(10_000))
        .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| AppError::bad_request(format!("rate {rate} is out of range")))
}

pub async fn list(pool: &SqlitePool) -> AppResult<Vec<TaxRule>> {
    sqlx::query_as::<_, TaxRuleRow>("SELECT * FROM tax_rules ORDER BY kind, key")
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(TaxRule::try_from)
        .collect()
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> AppResult<Option<TaxRule>> {
    sqlx::query_as::<_, TaxRuleRow>("SELECT * FROM tax_rules WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(TaxRule::try_from)
        .transpose()
}

pub async fn insert(pool: &SqlitePool, r: &TaxRule) -> AppResult<()> {
    sqlx::query("INSERT INTO tax_rules (id, kind, key, rate_bp, active, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)")
        .bind(r.id)
        .bind(r.kind.as_str())
        .bind(&r.key)
        .bind(basis_points(r.rate)?)
        .bind(r.active)
        .bind(r.created_at)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update(pool: &SqlitePool, r: &TaxRule) -> AppResult<()> {
    sqlx::query("UPDATE tax_rules SET kind = ?2, key = ?3, rate_bp = ?4, active = ?5 WHERE id = ?1")
        .bind(r.id)
        .bind(r.kind.as_str())
        .bind(&r.key)
        .bind(basis_points(r.rate)?)
        .bind(r.active)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM tax_rules WHERE id = ?1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn rule(kind: TaxRuleKind, key: &str, rate: Decimal) -> TaxRule {
        TaxRule { id: Uuid::new_v4(), kind, key: key.into(), rate, active: true, created_at: Utc::now() }
    }

    #[tokio::test]
    async fn test_rate_survives_storage() {
        let pool = test_pool().await;
        let reduced = rule(TaxRuleKind::Country, "FR", Decimal::new(55, 3));
        insert(&pool, &reduced).await.unwrap();
        let stored = get(&pool, reduced.id).await.unwrap().unwrap();
        assert_eq!(stored.rate, Decimal::new(55, 3));
        assert_eq!(stored.kind, TaxRuleKind::Country);
    }

    #[tokio::test]
    async fn test_one_rule_per_key() {
        let pool = test_pool().await;
        insert(&pool, &rule(TaxRuleKind::Category, "books", Decimal::new(9, 2))).await.unwrap();
        let err = insert(&pool, &rule(TaxRuleKind::Category, "books", Decimal::new(21, 2))).await.unwrap_err();
        assert_eq!(err.code(), "conflict");
        // The same key under the other kind is a different rule.
        insert(&pool, &rule(TaxRuleKind::Country, "books", Decimal::new(21, 2))).await.unwrap();
        assert_eq!(list(&pool).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let pool = test_pool().await;
        let mut r = rule(TaxRuleKind::Country, "DE", Decimal::new(19, 2));
        insert(&pool, &r).await.unwrap();
        r.rate = Decimal::new(7, 2);
        r.active = false;
        update(&pool, &r).await.unwrap();
        let stored = get(&pool, r.id).await.unwrap().unwrap();
        assert_eq!(stored.rate, Decimal::new(7, 2));
        assert!(!stored.active);
        assert!(delete(&pool, r.id).await.unwrap());
        assert!(get(&pool, r.id).await.unwrap().is_none());
    }
}
