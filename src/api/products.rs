use axum::{extract::State, http::StatusCode, routing::{get, put}, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{money_amount, Json, ListParams, PaginatedResponse, Path, Query};
use crate::auth::AdminUser;
use crate::db::{self, products::ProductFilter};
use crate::domain::aggregates::{Product, ProductDetails, ProductStatus};
use crate::domain::value_objects::{CountryCode, Grams, Sku};
use crate::error::{AppError, AppResult};
use crate::services::profit::{self, ProductProfit};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/meta/categories", get(list_categories))
        .route("/bulk/purchase-prices", put(bulk_purchase_prices))
        .route("/:id", get(get_product).put(update_product).delete(archive_product))
        .route("/:id/profit", get(product_profit))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 50))]
    pub sku: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    #[validate(custom = "money_amount")]
    pub price: Decimal,
    #[validate(custom = "money_amount")]
    pub cost_price: Option<Decimal>,
    /// Grams.
    pub weight: Option<Grams>,
    #[serde(default)]
    pub stock: u32,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[validate(custom = "money_amount")]
    pub price: Option<Decimal>,
    #[validate(custom = "money_amount")]
    pub cost_price: Option<Decimal>,
    pub weight: Option<Grams>,
    pub stock: Option<u32>,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PurchasePriceUpdate {
    pub id: Uuid,
    #[validate(custom = "money_amount")]
    pub cost_price: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkPurchasePriceRequest {
    #[validate(length(min = 1, max = 500))]
    pub updates: Vec<PurchasePriceUpdate>,
}

#[derive(Debug, Serialize)]
pub struct BulkUpdateResult { pub updated_count: usize }

#[derive(Debug, Deserialize)]
pub struct ProfitParams { pub country: Option<CountryCode>, pub quantity: Option<u32>, pub ad_spend: Option<Decimal> }

async fn list_products(State(s): State<AppState>, _: AdminUser, Query(p): Query<ListParams>) -> AppResult<Json<PaginatedResponse<Product>>> {
    let status = p
        .status
        .as_deref()
        .map(|st| ProductStatus::parse(st).ok_or_else(|| AppError::bad_request(format!("Unknown product status: {st}"))))
        .transpose()?;
    let filter = ProductFilter { search: p.search.clone(), category: p.category.clone(), status, sort: p.sort.clone(), descending: p.descending() };
    let page = p.page();
    let (products, total) = db::products::list(&s.db, &filter, page).await?;
    Ok(Json(PaginatedResponse::new(products, total, page)))
}

async fn list_categories(State(s): State<AppState>, _: AdminUser) -> AppResult<Json<Vec<String>>> {
    Ok(Json(db::products::categories(&s.db).await?))
}

async fn get_product(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<Json<Product>> {
    db::products::get(&s.db, id).await?.map(Json).ok_or_else(|| AppError::not_found("Product"))
}

async fn create_product(State(s): State<AppState>, _: AdminUser, Json(r): Json<CreateProductRequest>) -> AppResult<(StatusCode, Json<Product>)> {
    r.validate()?;
    let sku = Sku::new(r.sku)?;
    if db::products::sku_exists(&s.db, &sku).await? {
        return Err(AppError::conflict(format!("SKU {sku} already exists")));
    }
    let details = ProductDetails {
        name: r.name.trim().to_string(),
        description: r.description,
        category: r.category,
        price: r.price,
        cost_price: r.cost_price,
        weight: r.weight,
        stock: r.stock,
    };
    let mut product = Product::create(sku, details)?;
    db::products::insert(&s.db, &product).await?;
    tracing::info!(product_id = %product.id(), sku = %product.sku(), "product created");
    s.events.publish(product.take_events()).await;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(s): State<AppState>,
    _: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<UpdateProductRequest>,
) -> AppResult<Json<Product>> {
    r.validate()?;
    let mut conn = s.db.acquire().await?;
    let mut product = db::products::find(&mut conn, id).await?.ok_or_else(|| AppError::not_found("Product"))?;
    let details = ProductDetails {
        name: r.name.map_or_else(|| product.name().to_string(), |n| n.trim().to_string()),
        description: r.description.or_else(|| product.description().map(str::to_string)),
        category: r.category.or_else(|| product.category().map(str::to_string)),
        price: r.price.unwrap_or(product.price()),
        cost_price: r.cost_price.or(product.cost_price()),
        weight: r.weight.or(product.weight()),
        stock: r.stock.unwrap_or(product.stock()),
    };
    product.update(details)?;
    match r.status {
        Some(ProductStatus::Archived) => product.archive(),
        Some(ProductStatus::Active) => product.activate(),
        None => {}
    }
    db::products::update(&mut conn, &product).await?;
    s.events.publish(product.take_events()).await;
    Ok(Json(product))
}

/// Updates cost prices in one transaction; an unknown id rolls back the whole batch.
async fn bulk_purchase_prices(State(s): State<AppState>, _: AdminUser, Json(r): Json<BulkPurchasePriceRequest>) -> AppResult<Json<BulkUpdateResult>> {
    r.validate()?;
    for update in &r.updates {
        update.validate()?;
    }
    let mut tx = s.db.begin().await?;
    let mut events = Vec::new();
    for update in &r.updates {
        let mut product = db::products::find(&mut tx, update.id).await?.ok_or_else(|| AppError::not_found(format!("Product {}", update.id)))?;
        product.set_cost_price(update.cost_price)?;
        db::products::update(&mut tx, &product).await?;
        events.extend(product.take_events());
    }
    tx.commit().await?;
    tracing::info!(products = r.updates.len(), "purchase prices updated");
    s.events.publish(events).await;
    Ok(Json(BulkUpdateResult { updated_count: r.updates.len() }))
}

/// Products referenced by orders are never removed, only archived.
async fn archive_product(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    let mut conn = s.db.acquire().await?;
    let mut product = db::products::find(&mut conn, id).await?.ok_or_else(|| AppError::not_found("Product"))?;
    product.archive();
    db::products::update(&mut conn, &product).await?;
    tracing::info!(product_id = %id, "product archived");
    s.events.publish(product.take_events()).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn product_profit(
    State(s): State<AppState>,
    _: AdminUser,
    Path(id): Path<Uuid>,
    Query(p): Query<ProfitParams>,
) -> AppResult<Json<ProductProfit>> {
    let quantity = p.quantity.unwrap_or(1);
    if quantity == 0 {
        return Err(AppError::bad_request("quantity must be at least 1"));
    }
    let ad_spend = p.ad_spend.unwrap_or_default();
    if money_amount(&ad_spend).is_err() {
        return Err(AppError::bad_request("ad_spend must be between 0 and 1000000000000"));
    }
    Ok(Json(profit::product_profit(&s, id, p.country, quantity, ad_spend).await?))
}
