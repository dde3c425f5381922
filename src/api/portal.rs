//! Self-service for logged-in customers. Every query is scoped to the token's customer.

use axum::{extract::State, http::StatusCode, routing::{get, post}, Router};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::customers::UpdateCustomerRequest;
use super::orders::{OrderItemRequest, OrderView};
use super::{Json, ListParams, PaginatedResponse, Path, Query};
use crate::auth::CustomerUser;
use crate::db::{self, orders::OrderFilter};
use crate::domain::aggregates::{CustomerSummary, OrderStatus};
use crate::domain::value_objects::CountryCode;
use crate::error::{AppError, AppResult};
use crate::services::orders::{self as order_service, PlaceOrder};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_profile).put(update_profile))
        .route("/orders", get(list_orders).post(place_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel_order))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<CountryCode>,
}

impl From<ProfileRequest> for UpdateCustomerRequest {
    fn from(r: ProfileRequest) -> Self {
        Self {
            first_name: r.first_name,
            last_name: r.last_name,
            phone: r.phone,
            address: r.address,
            city: r.city,
            postal_code: r.postal_code,
            country: r.country,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1))]
    pub items: Vec<OrderItemRequest>,
    pub destination: Option<CountryCode>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

async fn summary(s: &AppState, id: Uuid) -> AppResult<CustomerSummary> {
    db::customers::find_summary(&s.db, id, s.settings.vip_threshold).await?.ok_or_else(|| AppError::not_found("Customer"))
}

async fn get_profile(State(s): State<AppState>, CustomerUser(user): CustomerUser) -> AppResult<Json<CustomerSummary>> {
    Ok(Json(summary(&s, user.id).await?))
}

async fn update_profile(State(s): State<AppState>, CustomerUser(user): CustomerUser, Json(r): Json<ProfileRequest>) -> AppResult<Json<CustomerSummary>> {
    r.validate()?;
    let mut customer = db::customers::find(&s.db, user.id).await?.ok_or_else(|| AppError::not_found("Customer"))?;
    UpdateCustomerRequest::from(r).apply(&mut customer);
    db::customers::update(&s.db, &customer).await?;
    Ok(Json(summary(&s, user.id).await?))
}

async fn list_orders(
    State(s): State<AppState>,
    CustomerUser(user): CustomerUser,
    Query(p): Query<ListParams>,
) -> AppResult<Json<PaginatedResponse<OrderView>>> {
    let status = p.status.as_deref().map(str::parse::<OrderStatus>).transpose()?;
    let filter = OrderFilter { customer_id: Some(user.id), status, descending: true, ..Default::default() };
    let page = p.page();
    let (orders, total) = db::orders::list(&s.db, &filter, page).await?;
    Ok(Json(PaginatedResponse::new(orders.into_iter().map(OrderView::from).collect(), total, page)))
}

async fn get_order(State(s): State<AppState>, CustomerUser(user): CustomerUser, Path(id): Path<Uuid>) -> AppResult<Json<OrderView>> {
    match db::orders::get(&s.db, id).await? {
        Some(order) if order.customer_id() == user.id => Ok(Json(order.into())),
        _ => Err(AppError::not_found("Order")),
    }
}

async fn place_order(
    State(s): State<AppState>,
    CustomerUser(user): CustomerUser,
    Json(r): Json<CheckoutRequest>,
) -> AppResult<(StatusCode, Json<OrderView>)> {
    r.validate()?;
    let cmd = PlaceOrder {
        customer_id: user.id,
        order_number: None,
        destination: r.destination,
        items: r.items.into_iter().map(Into::into).collect(),
        notes: r.notes,
    };
    let order = order_service::place(&s, cmd).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

async fn cancel_order(State(s): State<AppState>, CustomerUser(user): CustomerUser, Path(id): Path<Uuid>) -> AppResult<Json<OrderView>> {
    let order = order_service::cancel_for_customer(&s, user.id, id).await?;
    tracing::info!(order_id = %id, customer_id = %user.id, "order cancelled by customer");
    Ok(Json(order.into()))
}
