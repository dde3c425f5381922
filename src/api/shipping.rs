//! Shipping quotes, VAT conversions, the rule table and carrier labels.

use axum::{extract::State, http::StatusCode, routing::{get, post, put}, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{money_amount, Json, Path, Query};
use crate::auth::AdminUser;
use crate::db;
use crate::domain::value_objects::{CountryCode, Grams};
use crate::error::{AppError, AppResult};
use crate::pricing::{vat, Dimensions, ServiceTier, ShipmentQuery, ShippingQuote, ShippingRule, TaxRule, TaxRuleKind, VatAmounts};
use crate::services::{labels::{self, ShipmentResult}, orders::{shipping_table, tax_table}};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/calculate", post(calculate))
        .route("/vat", post(add_vat))
        .route("/vat/reverse", post(remove_vat))
        .route("/vat/rate", get(vat_rate))
        .route("/rules", get(list_rules).post(create_rule))
        .route("/rules/:id", put(update_rule).delete(delete_rule))
        .route("/tax-rules", get(list_tax_rules).post(create_tax_rule))
        .route("/tax-rules/:id", put(update_tax_rule).delete(delete_tax_rule))
        .route("/labels/:order_id", post(create_label))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CalculateRequest {
    /// Grams.
    pub weight: Grams,
    pub destination: CountryCode,
    pub dimensions: Option<Dimensions>,
    #[validate(custom = "money_amount")]
    pub order_value: Option<Decimal>,
    pub service: Option<ServiceTier>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VatRequest {
    #[validate(custom = "money_amount")]
    pub amount_excl: Decimal,
    /// Fraction; the standard rate when absent.
    pub rate: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReverseVatRequest {
    #[validate(custom = "money_amount")]
    pub amount_incl: Decimal,
    pub rate: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct RateParams { pub country: Option<CountryCode>, pub category: Option<String> }

#[derive(Debug, Serialize)]
pub struct RateResponse { pub country: Option<CountryCode>, pub category: Option<String>, pub rate: Decimal }

#[derive(Debug, Deserialize, Validate)]
pub struct RuleRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub country: CountryCode,
    pub min_weight: Grams,
    pub max_weight: Grams,
    #[validate(custom = "money_amount")]
    pub price: Decimal,
    #[serde(default)]
    pub service: ServiceTier,
    #[validate(custom = "money_amount")]
    pub free_shipping_threshold: Option<Decimal>,
    pub active: Option<bool>,
}

impl RuleRequest {
    fn check_band(&self) -> AppResult<()> {
        if self.min_weight >= self.max_weight {
            return Err(AppError::bad_request("min_weight must be below max_weight"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct TaxRuleRequest {
    pub kind: TaxRuleKind,
    #[validate(length(min = 1, max = 100))]
    pub key: String,
    /// Fraction, e.g. `0.09`.
    pub rate: Decimal,
    pub active: Option<bool>,
}

impl TaxRuleRequest {
    /// Validated key in its stored form.
    fn checked_key(&self) -> AppResult<String> {
        vat::check_rate(self.rate)?;
        match self.kind {
            TaxRuleKind::Country => Ok(CountryCode::parse(&self.key)?.as_str().to_string()),
            TaxRuleKind::Category if self.key.trim().is_empty() => Err(AppError::bad_request("key must not be blank")),
            TaxRuleKind::Category => Ok(self.key.trim().to_lowercase()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LabelRequestBody { #[serde(default)] pub service: ServiceTier }

async fn calculate(State(s): State<AppState>, _: AdminUser, Json(r): Json<CalculateRequest>) -> AppResult<Json<ShippingQuote>> {
    r.validate()?;
    if let Some(d) = &r.dimensions {
        d.validate()?;
    }
    let table = shipping_table(&s).await?;
    let query = ShipmentQuery { destination: r.destination, weight: r.weight, dimensions: r.dimensions, order_value: r.order_value, service: r.service };
    Ok(Json(table.resolve(&query)?))
}

async fn add_vat(State(s): State<AppState>, _: AdminUser, Json(r): Json<VatRequest>) -> AppResult<Json<VatAmounts>> {
    r.validate()?;
    let rate = r.rate.unwrap_or(s.tax.standard_rate());
    Ok(Json(vat::add_vat(r.amount_excl, rate)?.rounded()))
}

async fn remove_vat(State(s): State<AppState>, _: AdminUser, Json(r): Json<ReverseVatRequest>) -> AppResult<Json<VatAmounts>> {
    r.validate()?;
    let rate = r.rate.unwrap_or(s.tax.standard_rate());
    Ok(Json(vat::remove_vat(r.amount_incl, rate)?.rounded()))
}

async fn vat_rate(State(s): State<AppState>, _: AdminUser, Query(p): Query<RateParams>) -> AppResult<Json<RateResponse>> {
    let rate = tax_table(&s).await?.rate_for(p.country.as_ref(), p.category.as_deref());
    Ok(Json(RateResponse { country: p.country, category: p.category, rate }))
}

async fn list_rules(State(s): State<AppState>, _: AdminUser) -> AppResult<Json<Vec<ShippingRule>>> {
    Ok(Json(db::shipping_rules::list(&s.db).await?))
}

async fn create_rule(State(s): State<AppState>, _: AdminUser, Json(r): Json<RuleRequest>) -> AppResult<(StatusCode, Json<ShippingRule>)> {
    r.validate()?;
    r.check_band()?;
    let rule = ShippingRule {
        id: Uuid::new_v4(),
        name: r.name.trim().to_string(),
        country: r.country,
        min_weight: r.min_weight,
        max_weight: r.max_weight,
        price: r.price,
        service: r.service,
        free_shipping_threshold: r.free_shipping_threshold,
        active: r.active.unwrap_or(true),
        created_at: Utc::now(),
    };
    db::shipping_rules::insert(&s.db, &rule).await?;
    tracing::info!(rule_id = %rule.id, country = %rule.country, "shipping rule created");
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn update_rule(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>, Json(r): Json<RuleRequest>) -> AppResult<Json<ShippingRule>> {
    r.validate()?;
    r.check_band()?;
    let existing = db::shipping_rules::get(&s.db, id).await?.ok_or_else(|| AppError::not_found("Shipping rule"))?;
    let rule = ShippingRule {
        name: r.name.trim().to_string(),
        country: r.country,
        min_weight: r.min_weight,
        max_weight: r.max_weight,
        price: r.price,
        service: r.service,
        free_shipping_threshold: r.free_shipping_threshold,
        active: r.active.unwrap_or(existing.active),
        ..existing
    };
    db::shipping_rules::update(&s.db, &rule).await?;
    Ok(Json(rule))
}

async fn delete_rule(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    if !db::shipping_rules::delete(&s.db, id).await? {
        return Err(AppError::not_found("Shipping rule"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_tax_rules(State(s): State<AppState>, _: AdminUser) -> AppResult<Json<Vec<TaxRule>>> {
    Ok(Json(db::tax_rules::list(&s.db).await?))
}

async fn create_tax_rule(State(s): State<AppState>, _: AdminUser, Json(r): Json<TaxRuleRequest>) -> AppResult<(StatusCode, Json<TaxRule>)> {
    r.validate()?;
    let rule = TaxRule { id: Uuid::new_v4(), key: r.checked_key()?, kind: r.kind, rate: r.rate, active: r.active.unwrap_or(true), created_at: Utc::now() };
    db::tax_rules::insert(&s.db, &rule).await?;
    tracing::info!(rule_id = %rule.id, kind = rule.kind.as_str(), key = %rule.key, rate = %rule.rate, "tax rule created");
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn update_tax_rule(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>, Json(r): Json<TaxRuleRequest>) -> AppResult<Json<TaxRule>> {
    r.validate()?;
    let key = r.checked_key()?;
    let existing = db::tax_rules::get(&s.db, id).await?.ok_or_else(|| AppError::not_found("Tax rule"))?;
    let rule = TaxRule { key, kind: r.kind, rate: r.rate, active: r.active.unwrap_or(existing.active), ..existing };
    db::tax_rules::update(&s.db, &rule).await?;
    Ok(Json(rule))
}

async fn delete_tax_rule(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    if !db::tax_rules::delete(&s.db, id).await? {
        return Err(AppError::not_found("Tax rule"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn create_label(
    State(s): State<AppState>,
    _: AdminUser,
    Path(order_id): Path<Uuid>,
    body: Option<Json<LabelRequestBody>>,
) -> AppResult<(StatusCode, Json<ShipmentResult>)> {
    let service = body.map(|Json(b)| b.service).unwrap_or_default();
    Ok((StatusCode::CREATED, Json(labels::ship_order(&s, order_id, service).await?)))
}
