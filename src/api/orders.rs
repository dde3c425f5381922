use axum::{extract::State, http::StatusCode, routing::{get, put}, Router};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{Json, ListParams, PaginatedResponse, Path, Query};
use crate::auth::AdminUser;
use crate::db::{self, orders::OrderFilter};
use crate::domain::aggregates::{Order, OrderStatus};
use crate::domain::value_objects::{money, CountryCode};
use crate::error::{AppError, AppResult};
use crate::services::orders::{self as order_service, ItemRequest, PlaceOrder, UpdateOrder};
use crate::services::profit::{self, OrderProfit, StatusSummary};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/stats/summary", get(stats_summary))
        .route("/:id", get(get_order).put(update_order).delete(delete_order))
        .route("/:id/status", put(update_status))
        .route("/:id/profit", get(order_profit))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemRequest { pub product_id: Uuid, pub quantity: u32 }

impl From<OrderItemRequest> for ItemRequest {
    fn from(r: OrderItemRequest) -> Self { Self { product_id: r.product_id, quantity: r.quantity } }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    #[validate(length(min = 1, max = 50))]
    pub order_number: Option<String>,
    pub destination: Option<CountryCode>,
    #[validate(length(min = 1))]
    pub items: Vec<OrderItemRequest>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateOrderRequest {
    #[validate(length(min = 1))]
    pub items: Option<Vec<OrderItemRequest>>,
    pub destination: Option<CountryCode>,
    pub notes: Option<String>,
    pub status: Option<OrderStatus>,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest { pub status: OrderStatus, pub tracking_number: Option<String> }

/// An order with its derived totals.
#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub revenue: Decimal,
    pub total: Decimal,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        let revenue = money::round(order.revenue());
        // Item totals and shipping prices are both capped at `money::MAX_AMOUNT`.
        Self { total: revenue.saturating_add(order.shipping_cost()), revenue, order }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderStats { pub total_orders: i64, pub total_revenue: Decimal, pub by_status: Vec<StatusSummary> }

fn day_start(date: NaiveDate) -> DateTime<Utc> { date.and_time(NaiveTime::MIN).and_utc() }

async fn list_orders(State(s): State<AppState>, _: AdminUser, Query(p): Query<ListParams>) -> AppResult<Json<PaginatedResponse<OrderView>>> {
    let status = p.status.as_deref().map(str::parse::<OrderStatus>).transpose()?;
    let filter = OrderFilter {
        search: p.search.clone(),
        status,
        customer_id: p.customer_id,
        from: p.from.map(day_start),
        until: p.until.and_then(|d| d.checked_add_days(Days::new(1))).map(day_start),
        sort: p.sort.clone(),
        descending: p.descending(),
    };
    let page = p.page();
    let (orders, total) = db::orders::list(&s.db, &filter, page).await?;
    Ok(Json(PaginatedResponse::new(orders.into_iter().map(OrderView::from).collect(), total, page)))
}

async fn get_order(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<Json<OrderView>> {
    db::orders::get(&s.db, id).await?.map(|o| Json(o.into())).ok_or_else(|| AppError::not_found("Order"))
}

async fn create_order(State(s): State<AppState>, _: AdminUser, Json(r): Json<CreateOrderRequest>) -> AppResult<(StatusCode, Json<OrderView>)> {
    r.validate()?;
    let cmd = PlaceOrder {
        customer_id: r.customer_id,
        order_number: r.order_number,
        destination: r.destination,
        items: r.items.into_iter().map(Into::into).collect(),
        notes: r.notes,
    };
    let order = order_service::place(&s, cmd).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

async fn update_order(
    State(s): State<AppState>,
    _: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<UpdateOrderRequest>,
) -> AppResult<Json<OrderView>> {
    r.validate()?;
    let cmd = UpdateOrder {
        items: r.items.map(|items| items.into_iter().map(Into::into).collect()),
        destination: r.destination,
        notes: r.notes,
        status: r.status,
        tracking_number: r.tracking_number,
    };
    Ok(Json(order_service::update(&s, id, cmd).await?.into()))
}

async fn update_status(
    State(s): State<AppState>,
    _: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<StatusRequest>,
) -> AppResult<Json<OrderView>> {
    let tracking = r.tracking_number.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
    Ok(Json(order_service::transition(&s, id, r.status, tracking).await?.into()))
}

async fn delete_order(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    order_service::delete(&s, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn order_profit(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<Json<OrderProfit>> {
    let order = db::orders::get(&s.db, id).await?.ok_or_else(|| AppError::not_found("Order"))?;
    Ok(Json(profit::order_profit(&s, &order).await?))
}

async fn stats_summary(State(s): State<AppState>, _: AdminUser) -> AppResult<Json<OrderStats>> {
    let by_status: Vec<StatusSummary> = db::orders::status_counts(&s.db)
        .await?
        .into_iter()
        .map(|c| StatusSummary { status: c.status, orders: c.orders, revenue: c.revenue })
        .collect();
    let total_orders = by_status.iter().map(|c| c.orders).sum();
    let total_revenue = by_status
        .iter()
        .filter(|c| c.status != OrderStatus::Cancelled.as_str())
        .map(|c| c.revenue)
        .sum();
    Ok(Json(OrderStats { total_orders, total_revenue, by_status }))
}
