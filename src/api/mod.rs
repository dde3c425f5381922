//! HTTP surface. One sub-router per resource, merged under `/api`.

mod advertising;
mod ai;
mod auth;
mod costs;
mod customers;
mod emails;
mod orders;
mod portal;
mod products;
mod profit;
mod shipping;

#[cfg(test)]
mod tests;

use axum::{
    extract::{FromRequest, FromRequestParts, State},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;
use validator::ValidationError;

use crate::db::Page;
use crate::domain::value_objects::money;
use crate::error::{AppError, AppResult};
use crate::services::profit::Period;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/auth", auth::router())
        .nest("/api/customers", customers::router())
        .nest("/api/orders", orders::router())
        .nest("/api/products", products::router())
        .nest("/api/advertising", advertising::router())
        .nest("/api/shipping", shipping::router())
        .nest("/api/ai", ai::router())
        .nest("/api/profit", profit::router())
        .nest("/api/costs", costs::router())
        .nest("/api/emails", emails::router())
        .nest("/api/portal", portal::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(s): State<AppState>) -> Json<Value> {
    let database = sqlx::query("SELECT 1").execute(&s.db).await.is_ok();
    Json(json!({
        "status": if database { "healthy" } else { "degraded" },
        "service": "webshop-backoffice",
        "database": database,
        "events": s.events.is_connected(),
    }))
}

/// `axum::Json` whose rejections render as a structured 400.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response { axum::Json(self.0).into_response() }
}

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

/// Query string shared by the list endpoints; each resource reads the filters it knows.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub sort: Option<String>,
    /// `asc` or `desc`; newest first when neither a sort nor an order is given.
    pub order: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub customer_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

impl ListParams {
    pub fn page(&self) -> Page { Page::new(self.page, self.per_page) }

    pub fn descending(&self) -> bool {
        match self.order.as_deref() {
            Some(o) => o.eq_ignore_ascii_case("desc"),
            None => self.sort.is_none(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: i64, pub page: u32, pub per_page: u32 }

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: i64, page: Page) -> Self {
        Self { data, total, page: page.page, per_page: page.per_page }
    }
}

/// `?start&end` date range; missing bounds fall back to a trailing window ending today.
#[derive(Debug, Default, Deserialize)]
pub struct PeriodParams { pub start: Option<NaiveDate>, pub end: Option<NaiveDate> }

impl PeriodParams {
    pub fn period(&self, today: NaiveDate, default_days: i64) -> AppResult<Period> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Period::new(start, end),
            (Some(start), None) => Period::new(start, today),
            (None, Some(end)) => Period::trailing(end, default_days),
            (None, None) => Period::trailing(today, default_days),
        }
    }
}

/// Euro amount between zero and `money::MAX_AMOUNT`.
pub(crate) fn money_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        return Err(ValidationError::new("non_negative"));
    }
    if *value > money::MAX_AMOUNT {
        return Err(ValidationError::new("amount_too_large"));
    }
    Ok(())
}

pub(crate) fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("positive"));
    }
    money_amount(value)
}
