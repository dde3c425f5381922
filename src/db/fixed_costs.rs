use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::corrupt;
use crate::domain::value_objects::money;
use crate::error::{AppError, AppResult};
use crate::pricing::{BillingCycle, FixedCost};

#[derive(Debug, sqlx::FromRow)]
struct CostRow {
    id: Uuid,
    name: String,
    category: String,
    amount_cents: i64,
    billing_cycle: String,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<CostRow> for FixedCost {
    type Error = AppError;
    fn try_from(r: CostRow) -> Result<Self, Self::Error> {
        Ok(FixedCost {
            billing_cycle: BillingCycle::parse(&r.billing_cycle).ok_or_else(|| corrupt("billing cycle", &r.billing_cycle))?,
            amount: money::from_cents(r.amount_cents),
            id: r.id,
            name: r.name,
            category: r.category,
            start_date: r.start_date,
            end_date: r.end_date,
            active: r.active,
            created_at: r.created_at,
        })
    }
}

pub async fn list(pool: &SqlitePool, active_only: bool) -> AppResult<Vec<FixedCost>> {
    sqlx::query_as::<_, CostRow>("SELECT * FROM fixed_costs WHERE (?1 = 0 OR active = 1) ORDER BY category, name")
        .bind(active_only)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(FixedCost::try_from)
        .collect()
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> AppResult<Option<FixedCost>> {
    sqlx::query_as::<_, CostRow>("SELECT * FROM fixed_costs WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(FixedCost::try_from)
        .transpose()
}

pub async fn insert(pool: &SqlitePool, c: &FixedCost) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO fixed_costs (id, name, category, amount_cents, billing_cycle, start_date, end_date, active, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(c.id)
    .bind(&c.name)
    .bind(&c.category)
    .bind(money::to_cents(c.amount))
    .bind(c.billing_cycle.as_str())
    .bind(c.start_date)
    .bind(c.end_date)
    .bind(c.active)
    .bind(c.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update(pool: &SqlitePool, c: &FixedCost) -> AppResult<()> {
    sqlx::query(
        "UPDATE fixed_costs SET name = ?2, category = ?3, amount_cents = ?4, billing_cycle = ?5, start_date = ?6, end_date = ?7, active = ?8 WHERE id = ?1",
    )
    .bind(c.id)
    .bind(&c.name)
    .bind(&c.category)
    .bind(money::to_cents(c.amount))
    .bind(c.billing_cycle.as_str())
    .bind(c.start_date)
    .bind(c.end_date)
    .bind(c.active)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM fixed_costs WHERE id = ?1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_crud_and_active_filter() {
        let pool = test_pool().await;
        let mut cost = FixedCost {
            id: Uuid::new_v4(), name: "Shopify plan".into(), category: "software".into(), amount: Decimal::new(3900, 2),
            billing_cycle: BillingCycle::Monthly, start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), end_date: None,
            active: true, created_at: Utc::now(),
        };
        insert(&pool, &cost).await.unwrap();
        assert_eq!(get(&pool, cost.id).await.unwrap().unwrap().amount, Decimal::new(3900, 2));

        cost.active = false;
        update(&pool, &cost).await.unwrap();
        assert!(list(&pool, true).await.unwrap().is_empty());
        assert_eq!(list(&pool, false).await.unwrap().len(), 1);
        assert!(delete(&pool, cost.id).await.unwrap());
    }
}
