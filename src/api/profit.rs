use axum::{extract::State, routing::{get, post}, Router};
use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{money_amount, Json, PeriodParams, Query};
use crate::auth::AdminUser;
use crate::domain::value_objects::{CountryCode, Grams};
use crate::error::{AppError, AppResult};
use crate::pricing::{profit as calc, CostLine, Dimensions, ProfitBreakdown, ProfitInput, ShipmentQuery, ShippingQuote};
use crate::services::orders::{shipping_table, tax_table};
use crate::services::profit::{self, BreakEven, Dashboard, PeriodAnalysis, PeriodComparison};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/calculate", post(calculate))
        .route("/analysis", get(analysis))
        .route("/comparison", get(comparison))
        .route("/break-even", get(break_even))
        .route("/dashboard", get(dashboard))
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CalculatorItem {
    #[validate(custom = "money_amount")]
    pub unit_price: Decimal,
    #[validate(custom = "money_amount")]
    pub unit_cost: Decimal,
    #[validate(range(min = 1))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CalculateRequest {
    #[validate(length(min = 1, max = 500))]
    pub items: Vec<CalculatorItem>,
    pub destination: Option<CountryCode>,
    /// Total shipment weight in grams.
    pub weight: Grams,
    pub dimensions: Option<Dimensions>,
    #[validate(custom = "money_amount")]
    pub ad_spend: Option<Decimal>,
    pub vat_category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CalculateResponse {
    #[serde(flatten)]
    pub breakdown: ProfitBreakdown,
    pub vat_rate: Decimal,
    pub shipping: ShippingQuote,
}

#[derive(Debug, Deserialize)]
pub struct ComparisonParams {
    pub current_start: Option<NaiveDate>,
    pub current_end: Option<NaiveDate>,
    pub previous_start: Option<NaiveDate>,
    pub previous_end: Option<NaiveDate>,
}

async fn calculate(State(s): State<AppState>, _: AdminUser, Json(r): Json<CalculateRequest>) -> AppResult<Json<CalculateResponse>> {
    r.validate()?;
    for item in &r.items {
        item.validate()?;
    }
    if let Some(d) = &r.dimensions {
        d.validate()?;
    }
    let destination = r.destination.unwrap_or_else(|| s.settings.default_country.clone());
    let vat_rate = tax_table(&s).await?.rate_for(Some(&destination), r.vat_category.as_deref());
    let lines: Vec<CostLine> = r
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| CostLine {
            product_id: None,
            label: format!("item {}", i + 1),
            unit_price: Some(item.unit_price),
            unit_cost: Some(item.unit_cost),
            quantity: item.quantity,
            vat_rate,
        })
        .collect();
    let order_value = lines.iter().filter_map(|l| l.unit_price.map(|p| p * Decimal::from(l.quantity))).sum();

    let query = ShipmentQuery { destination, weight: r.weight, dimensions: r.dimensions, order_value: Some(order_value), service: None };
    let shipping = shipping_table(&s).await?.resolve(&query)?;
    let input = ProfitInput { lines, shipping_cost: shipping.cost, ad_spend: r.ad_spend.unwrap_or_default() };
    let breakdown = calc::calculate(&input)?;
    Ok(Json(CalculateResponse { breakdown, vat_rate, shipping }))
}

async fn analysis(State(s): State<AppState>, _: AdminUser, Query(p): Query<PeriodParams>) -> AppResult<Json<PeriodAnalysis>> {
    let period = p.period(Utc::now().date_naive(), 30)?;
    Ok(Json(profit::analyze(&s, period).await?))
}

/// Without explicit bounds: the last 30 days against the 30 days before them.
async fn comparison(State(s): State<AppState>, _: AdminUser, Query(p): Query<ComparisonParams>) -> AppResult<Json<PeriodComparison>> {
    let today = Utc::now().date_naive();
    let current = PeriodParams { start: p.current_start, end: p.current_end }.period(today, 30)?;
    let before = current.start.checked_sub_days(Days::new(1)).ok_or_else(|| AppError::bad_request("current_start is out of range"))?;
    let previous = PeriodParams { start: p.previous_start, end: p.previous_end }.period(before, current.days())?;
    Ok(Json(profit::compare(&s, current, previous).await?))
}

async fn break_even(State(s): State<AppState>, _: AdminUser) -> AppResult<Json<BreakEven>> {
    Ok(Json(profit::break_even(&s, Utc::now().date_naive()).await?))
}

async fn dashboard(State(s): State<AppState>, _: AdminUser) -> AppResult<Json<Dashboard>> {
    Ok(Json(profit::dashboard(&s, Utc::now().date_naive()).await?))
}
