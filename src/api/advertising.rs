use axum::{extract::State, http::StatusCode, routing::{get, post}, Router};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{money_amount, Json, Path, PeriodParams, Query};
use crate::auth::AdminUser;
use crate::db::{self, ad_spend::{AdSpendEntry, CampaignTotals}};
use crate::domain::value_objects::money;
use crate::error::{AppError, AppResult};
use crate::integrations::{AdPlatformKind, Campaign};
use crate::services::profit::Period;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/campaigns", get(list_campaigns))
        .route("/sync/:platform", post(sync_platform))
        .route("/overview", get(overview))
        .route("/compare", get(compare_campaigns))
        .route("/spend", get(list_spend).post(record_spend))
}

#[derive(Debug, Deserialize)]
pub struct CampaignParams { pub platform: Option<String> }

#[derive(Debug, Serialize)]
pub struct CampaignView {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub ctr: Decimal,
    pub cpc: Decimal,
    pub roas: Decimal,
}

impl From<Campaign> for CampaignView {
    fn from(campaign: Campaign) -> Self {
        Self { ctr: campaign.ctr(), cpc: campaign.cpc(), roas: campaign.roas(), campaign }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncResult { pub platform: AdPlatformKind, pub date: NaiveDate, pub campaigns: usize, pub spend: Decimal }

#[derive(Debug, Serialize)]
pub struct PlatformOverview {
    pub platform: String,
    pub spend: Decimal,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub conversion_value: Decimal,
    pub roas: Decimal,
}

#[derive(Debug, Serialize)]
pub struct Overview { pub period: Period, pub total_spend: Decimal, pub total_conversion_value: Decimal, pub roas: Decimal, pub platforms: Vec<PlatformOverview> }

#[derive(Debug, Deserialize, Validate)]
pub struct SpendRequest {
    pub platform: AdPlatformKind,
    #[validate(length(min = 1, max = 100))]
    pub campaign_id: String,
    #[validate(length(min = 1, max = 200))]
    pub campaign_name: String,
    pub date: NaiveDate,
    #[validate(custom = "money_amount")]
    pub spend: Decimal,
    #[serde(default)]
    pub impressions: u32,
    #[serde(default)]
    pub clicks: u32,
    #[serde(default)]
    pub conversions: u32,
    #[serde(default)]
    #[validate(custom = "money_amount")]
    pub conversion_value: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    /// Comma-separated campaign ids.
    pub campaign_ids: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct CampaignPerformance {
    pub platform: String,
    pub campaign_id: String,
    pub campaign_name: String,
    pub spend: Decimal,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub conversion_value: Decimal,
    pub ctr: Decimal,
    pub cpc: Decimal,
    pub cpa: Decimal,
    pub roas: Decimal,
}

impl From<CampaignTotals> for CampaignPerformance {
    fn from(t: CampaignTotals) -> Self {
        let spend = money::from_cents(t.spend_cents);
        let conversion_value = money::from_cents(t.conversion_value_cents);
        Self {
            ctr: ratio(Decimal::from(t.clicks) * Decimal::ONE_HUNDRED, Decimal::from(t.impressions)),
            cpc: ratio(spend, Decimal::from(t.clicks)),
            cpa: ratio(spend, Decimal::from(t.conversions)),
            roas: roas(conversion_value, spend),
            platform: t.platform,
            campaign_id: t.campaign_id,
            campaign_name: t.campaign_name,
            spend,
            impressions: t.impressions,
            clicks: t.clicks,
            conversions: t.conversions,
            conversion_value,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CampaignComparison { pub period: Period, pub campaigns: Vec<CampaignPerformance> }

#[derive(Debug, Serialize)]
pub struct SpendLedger { pub period: Period, pub total: Decimal, pub entries: Vec<AdSpendEntry> }

fn parse_platform(raw: &str) -> AppResult<AdPlatformKind> {
    AdPlatformKind::parse(raw).ok_or_else(|| AppError::bad_request(format!("Unknown ad platform: {raw}")))
}

fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() { Decimal::ZERO } else { money::round(numerator / denominator) }
}

fn roas(value: Decimal, spend: Decimal) -> Decimal { ratio(value, spend) }

async fn list_campaigns(State(s): State<AppState>, _: AdminUser, Query(p): Query<CampaignParams>) -> AppResult<Json<Vec<CampaignView>>> {
    let kinds = match p.platform.as_deref() {
        Some(raw) => vec![parse_platform(raw)?],
        None => AdPlatformKind::ALL.to_vec(),
    };
    let mut campaigns = Vec::new();
    for kind in kinds {
        campaigns.extend(s.integrations.ad_platform(kind).fetch_campaigns().await?.into_iter().map(CampaignView::from));
    }
    Ok(Json(campaigns))
}

/// Records today's spend per campaign; re-syncing the same day overwrites.
async fn sync_platform(State(s): State<AppState>, _: AdminUser, Path(platform): Path<String>) -> AppResult<Json<SyncResult>> {
    let kind = parse_platform(&platform)?;
    let campaigns = s.integrations.ad_platform(kind).fetch_campaigns().await?;
    let date = Utc::now().date_naive();
    let mut spend = Decimal::ZERO;
    for c in &campaigns {
        let entry = AdSpendEntry {
            id: Uuid::new_v4(),
            platform: kind,
            campaign_id: c.id.clone(),
            campaign_name: c.name.clone(),
            date,
            spend: c.cost,
            impressions: c.impressions,
            clicks: c.clicks,
            conversions: c.conversions,
            conversion_value: c.conversions_value,
            created_at: Utc::now(),
        };
        db::ad_spend::upsert(&s.db, &entry).await?;
        spend += c.cost;
    }
    tracing::info!(platform = kind.as_str(), campaigns = campaigns.len(), %spend, "ad spend synced");
    Ok(Json(SyncResult { platform: kind, date, campaigns: campaigns.len(), spend: money::round(spend) }))
}

async fn overview(State(s): State<AppState>, _: AdminUser, Query(p): Query<PeriodParams>) -> AppResult<Json<Overview>> {
    let period = p.period(Utc::now().date_naive(), 30)?;
    let platforms: Vec<PlatformOverview> = db::ad_spend::totals_by_platform(&s.db, period.start, period.end)
        .await?
        .into_iter()
        .map(|t| {
            let spend = money::from_cents(t.spend_cents);
            let conversion_value = money::from_cents(t.conversion_value_cents);
            PlatformOverview {
                platform: t.platform,
                roas: roas(conversion_value, spend),
                spend,
                impressions: t.impressions,
                clicks: t.clicks,
                conversions: t.conversions,
                conversion_value,
            }
        })
        .collect();
    let total_spend: Decimal = platforms.iter().map(|p| p.spend).sum();
    let total_conversion_value: Decimal = platforms.iter().map(|p| p.conversion_value).sum();
    Ok(Json(Overview { period, total_spend, total_conversion_value, roas: roas(total_conversion_value, total_spend), platforms }))
}

/// Side-by-side performance of the requested campaigns from the spend ledger.
async fn compare_campaigns(State(s): State<AppState>, _: AdminUser, Query(p): Query<CompareParams>) -> AppResult<Json<CampaignComparison>> {
    let ids: Vec<&str> = p.campaign_ids.as_deref().unwrap_or_default().split(',').map(str::trim).filter(|id| !id.is_empty()).collect();
    if ids.is_empty() {
        return Err(AppError::bad_request("campaign_ids is required"));
    }
    let period = PeriodParams { start: p.start, end: p.end }.period(Utc::now().date_naive(), 30)?;
    let campaigns = db::ad_spend::totals_by_campaign(&s.db, period.start, period.end)
        .await?
        .into_iter()
        .filter(|t| ids.contains(&t.campaign_id.as_str()))
        .map(CampaignPerformance::from)
        .collect();
    Ok(Json(CampaignComparison { period, campaigns }))
}

async fn record_spend(State(s): State<AppState>, _: AdminUser, Json(r): Json<SpendRequest>) -> AppResult<(StatusCode, Json<AdSpendEntry>)> {
    r.validate()?;
    let entry = AdSpendEntry {
        id: Uuid::new_v4(),
        platform: r.platform,
        campaign_id: r.campaign_id,
        campaign_name: r.campaign_name,
        date: r.date,
        spend: money::round(r.spend),
        impressions: i64::from(r.impressions),
        clicks: i64::from(r.clicks),
        conversions: i64::from(r.conversions),
        conversion_value: money::round(r.conversion_value),
        created_at: Utc::now(),
    };
    db::ad_spend::upsert(&s.db, &entry).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_spend(State(s): State<AppState>, _: AdminUser, Query(p): Query<PeriodParams>) -> AppResult<Json<SpendLedger>> {
    let period = p.period(Utc::now().date_naive(), 30)?;
    let entries = db::ad_spend::list(&s.db, period.start, period.end).await?;
    let total = db::ad_spend::total(&s.db, period.start, period.end).await?;
    Ok(Json(SpendLedger { period, total, entries }))
}
