//! Daily advertising spend per campaign, the ledger profit attribution reads.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::corrupt;
use crate::domain::value_objects::money;
use crate::error::{AppError, AppResult};
use crate::integrations::AdPlatformKind;

#[derive(Debug, Clone, Serialize)]
pub struct AdSpendEntry {
    pub id: Uuid,
    pub platform: AdPlatformKind,
    pub campaign_id: String,
    pub campaign_name: String,
    pub date: NaiveDate,
    pub spend: Decimal,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub conversion_value: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SpendRow {
    id: Uuid,
    platform: String,
    campaign_id: String,
    campaign_name: String,
    spend_date: NaiveDate,
    spend_cents: i64,
    impressions: i64,
    clicks: i64,
    conversions: i64,
    conversion_value_cents: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<SpendRow> for AdSpendEntry {
    type Error = AppError;
    fn try_from(r: SpendRow) -> Result<Self, Self::Error> {
        Ok(AdSpendEntry {
            platform: AdPlatformKind::parse(&r.platform).ok_or_else(|| corrupt("ad platform", &r.platform))?,
            spend: money::from_cents(r.spend_cents),
            conversion_value: money::from_cents(r.conversion_value_cents),
            date: r.spend_date,
            id: r.id,
            campaign_id: r.campaign_id,
            campaign_name: r.campaign_name,
            impressions: r.impressions,
            clicks: r.clicks,
            conversions: r.conversions,
            created_at: r.created_at,
        })
    }
}

/// Inserts an entry, replacing an existing one for the same campaign and day.
pub async fn upsert(pool: &SqlitePool, e: &AdSpendEntry) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO ad_spend (id, platform, campaign_id, campaign_name, spend_date, spend_cents, impressions, clicks, conversions, conversion_value_cents, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
         ON CONFLICT (platform, campaign_id, spend_date) DO UPDATE SET campaign_name = excluded.campaign_name, \
         spend_cents = excluded.spend_cents, impressions = excluded.impressions, clicks = excluded.clicks, \
         conversions = excluded.conversions, conversion_value_cents = excluded.conversion_value_cents",
    )
    .bind(e.id)
    .bind(e.platform.as_str())
    .bind(&e.campaign_id)
    .bind(&e.campaign_name)
    .bind(e.date)
    .bind(money::to_cents(e.spend))
    .bind(e.impressions)
    .bind(e.clicks)
    .bind(e.conversions)
    .bind(money::to_cents(e.conversion_value))
    .bind(e.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Entries dated within `[start, end]`.
pub async fn list(pool: &SqlitePool, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<AdSpendEntry>> {
    sqlx::query_as::<_, SpendRow>("SELECT * FROM ad_spend WHERE spend_date >= ?1 AND spend_date <= ?2 ORDER BY spend_date DESC, platform")
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(AdSpendEntry::try_from)
        .collect()
}

pub async fn total(pool: &SqlitePool, start: NaiveDate, end: NaiveDate) -> AppResult<Decimal> {
    let cents: (i64,) = sqlx::query_as("SELECT COALESCE(SUM(spend_cents), 0) FROM ad_spend WHERE spend_date >= ?1 AND spend_date <= ?2")
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await?;
    Ok(money::from_cents(cents.0))
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlatformTotals {
    pub platform: String,
    pub spend_cents: i64,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub conversion_value_cents: i64,
}

pub async fn totals_by_platform(pool: &SqlitePool, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<PlatformTotals>> {
    Ok(sqlx::query_as::<_, PlatformTotals>(
        "SELECT platform, SUM(spend_cents) AS spend_cents, SUM(impressions) AS impressions, SUM(clicks) AS clicks, \
         SUM(conversions) AS conversions, SUM(conversion_value_cents) AS conversion_value_cents \
         FROM ad_spend WHERE spend_date >= ?1 AND spend_date <= ?2 GROUP BY platform ORDER BY platform",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?)
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CampaignTotals {
    pub platform: String,
    pub campaign_id: String,
    pub campaign_name: String,
    pub spend_cents: i64,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub conversion_value_cents: i64,
}

/// Per-campaign sums, highest spend first. The latest name recorded for a campaign wins.
pub async fn totals_by_campaign(pool: &SqlitePool, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<CampaignTotals>> {
    Ok(sqlx::query_as::<_, CampaignTotals>(
        "SELECT platform, campaign_id, \
         (SELECT a2.campaign_name FROM ad_spend a2 WHERE a2.platform = a.platform AND a2.campaign_id = a.campaign_id ORDER BY a2.spend_date DESC LIMIT 1) AS campaign_name, \
         SUM(spend_cents) AS spend_cents, SUM(impressions) AS impressions, SUM(clicks) AS clicks, \
         SUM(conversions) AS conversions, SUM(conversion_value_cents) AS conversion_value_cents \
         FROM ad_spend a WHERE spend_date >= ?1 AND spend_date <= ?2 GROUP BY platform, campaign_id ORDER BY spend_cents DESC, campaign_id",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?)
}
