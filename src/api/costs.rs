use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{positive, Json, Path, Query};
use crate::auth::AdminUser;
use crate::db;
use crate::domain::value_objects::money;
use crate::error::{AppError, AppResult};
use crate::pricing::{BillingCycle, FixedCost};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_costs).post(create_cost))
        .route("/summary", get(summary))
        .route("/:id", get(get_cost).put(update_cost).delete(delete_cost))
}

#[derive(Debug, Deserialize)]
pub struct CostParams { #[serde(default)] pub active: bool }

#[derive(Debug, Deserialize, Validate)]
pub struct CostRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    #[validate(custom = "positive")]
    pub amount: Decimal,
    #[serde(default)]
    pub billing_cycle: BillingCycle,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub active: Option<bool>,
}

impl CostRequest {
    fn check_dates(&self, start: NaiveDate) -> AppResult<()> {
        match self.end_date {
            Some(end) if end < start => Err(AppError::bad_request("end_date must not be before start_date")),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryTotals { pub category: String, pub count: usize, pub monthly: Decimal, pub yearly: Decimal }

#[derive(Debug, Serialize)]
pub struct CostSummary { pub total_monthly: Decimal, pub total_yearly: Decimal, pub categories: Vec<CategoryTotals> }

async fn list_costs(State(s): State<AppState>, _: AdminUser, Query(p): Query<CostParams>) -> AppResult<Json<Vec<FixedCost>>> {
    Ok(Json(db::fixed_costs::list(&s.db, p.active).await?))
}

async fn get_cost(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<Json<FixedCost>> {
    db::fixed_costs::get(&s.db, id).await?.map(Json).ok_or_else(|| AppError::not_found("Fixed cost"))
}

async fn create_cost(State(s): State<AppState>, _: AdminUser, Json(r): Json<CostRequest>) -> AppResult<(StatusCode, Json<FixedCost>)> {
    r.validate()?;
    let start_date = r.start_date.unwrap_or_else(|| Utc::now().date_naive());
    r.check_dates(start_date)?;
    let cost = FixedCost {
        id: Uuid::new_v4(),
        name: r.name.trim().to_string(),
        category: r.category.trim().to_lowercase(),
        amount: money::round(r.amount),
        billing_cycle: r.billing_cycle,
        start_date,
        end_date: r.end_date,
        active: r.active.unwrap_or(true),
        created_at: Utc::now(),
    };
    db::fixed_costs::insert(&s.db, &cost).await?;
    tracing::info!(cost_id = %cost.id, category = %cost.category, amount = %cost.amount, "fixed cost created");
    Ok((StatusCode::CREATED, Json(cost)))
}

async fn update_cost(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>, Json(r): Json<CostRequest>) -> AppResult<Json<FixedCost>> {
    r.validate()?;
    let existing = db::fixed_costs::get(&s.db, id).await?.ok_or_else(|| AppError::not_found("Fixed cost"))?;
    let start_date = r.start_date.unwrap_or(existing.start_date);
    r.check_dates(start_date)?;
    let cost = FixedCost {
        name: r.name.trim().to_string(),
        category: r.category.trim().to_lowercase(),
        amount: money::round(r.amount),
        billing_cycle: r.billing_cycle,
        start_date,
        end_date: r.end_date,
        active: r.active.unwrap_or(existing.active),
        ..existing
    };
    db::fixed_costs::update(&s.db, &cost).await?;
    Ok(Json(cost))
}

async fn delete_cost(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    if !db::fixed_costs::delete(&s.db, id).await? {
        return Err(AppError::not_found("Fixed cost"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Active recurring costs normalized to a month and a year, per category.
async fn summary(State(s): State<AppState>, _: AdminUser) -> AppResult<Json<CostSummary>> {
    Ok(Json(summarize(&db::fixed_costs::list(&s.db, true).await?)))
}

fn summarize(costs: &[FixedCost]) -> CostSummary {
    let mut by_category: BTreeMap<&str, (usize, Decimal)> = BTreeMap::new();
    for cost in costs {
        let entry = by_category.entry(cost.category.as_str()).or_default();
        entry.0 += 1;
        entry.1 += cost.monthly_amount();
    }
    let categories: Vec<CategoryTotals> = by_category
        .into_iter()
        .map(|(category, (count, monthly))| CategoryTotals {
            category: category.to_string(),
            count,
            monthly: money::round(monthly),
            yearly: money::round(monthly * Decimal::from(12)),
        })
        .collect();
    let monthly: Decimal = costs.iter().map(FixedCost::monthly_amount).sum();
    CostSummary { total_monthly: money::round(monthly), total_yearly: money::round(monthly * Decimal::from(12)), categories }
}
