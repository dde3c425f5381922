use axum::{extract::State, http::StatusCode, routing::get, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{Json, ListParams, PaginatedResponse, Path, Query};
use crate::auth::AdminUser;
use crate::db::{self, customers::CustomerFilter, orders::OrderFilter, Page};
use crate::domain::aggregates::{normalize_email, Customer, CustomerStatus, CustomerSummary, Order};
use crate::domain::events::{CustomerEvent, DomainEvent};
use crate::domain::value_objects::CountryCode;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route("/:id", get(get_customer).put(update_customer).delete(delete_customer))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<CountryCode>,
    pub status: Option<CustomerStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCustomerRequest {
    #[validate(email)]
    pub email: Option<String>,
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
    pub status: Option<CustomerStatus>,
    pub notes: Option<String>,
}

impl UpdateCustomerRequest {
    /// Applies the present fields; shared with the customer portal.
    pub(crate) fn apply(self, c: &mut Customer) {
        if let Some(email) = self.email { c.email = normalize_email(&email); }
        if let Some(first_name) = self.first_name { c.first_name = first_name.trim().to_string(); }
        if let Some(last_name) = self.last_name { c.last_name = last_name.trim().to_string(); }
        if let Some(phone) = self.phone { c.phone = Some(phone); }
        if let Some(address) = self.address { c.address = Some(address); }
        if let Some(city) = self.city { c.city = Some(city); }
        if let Some(postal_code) = self.postal_code { c.postal_code = Some(postal_code); }
        if let Some(country) = self.country { c.country = country; }
        if let Some(status) = self.status { c.status = status; }
        if let Some(notes) = self.notes { c.notes = Some(notes); }
        c.updated_at = Utc::now();
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub summary: CustomerSummary,
    pub recent_orders: Vec<Order>,
}

async fn list_customers(State(s): State<AppState>, _: AdminUser, Query(p): Query<ListParams>) -> AppResult<Json<PaginatedResponse<CustomerSummary>>> {
    let status = p
        .status
        .as_deref()
        .map(|st| CustomerStatus::parse(st).ok_or_else(|| AppError::bad_request(format!("Unknown customer status: {st}"))))
        .transpose()?;
    let filter = CustomerFilter { search: p.search.clone(), status, sort: p.sort.clone(), descending: p.descending() };
    let page = p.page();
    let (customers, total) = db::customers::list(&s.db, &filter, page, s.settings.vip_threshold).await?;
    Ok(Json(PaginatedResponse::new(customers, total, page)))
}

async fn get_customer(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<Json<CustomerDetail>> {
    let summary = db::customers::find_summary(&s.db, id, s.settings.vip_threshold).await?.ok_or_else(|| AppError::not_found("Customer"))?;
    let filter = OrderFilter { customer_id: Some(id), descending: true, ..Default::default() };
    let (recent_orders, _) = db::orders::list(&s.db, &filter, Page::new(Some(1), Some(10))).await?;
    Ok(Json(CustomerDetail { summary, recent_orders }))
}

async fn create_customer(State(s): State<AppState>, _: AdminUser, Json(r): Json<CreateCustomerRequest>) -> AppResult<(StatusCode, Json<CustomerSummary>)> {
    r.validate()?;
    if db::customers::find_by_email(&s.db, &r.email).await?.is_some() {
        return Err(AppError::conflict("A customer with this email already exists"));
    }
    let now = Utc::now();
    let customer = Customer {
        id: Uuid::new_v4(),
        email: normalize_email(&r.email),
        first_name: r.first_name.trim().to_string(),
        last_name: r.last_name.trim().to_string(),
        phone: r.phone,
        address: r.address,
        city: r.city,
        postal_code: r.postal_code,
        country: r.country.unwrap_or_else(|| s.settings.default_country.clone()),
        status: r.status.unwrap_or_default(),
        notes: r.notes,
        password_hash: None,
        created_at: now,
        updated_at: now,
    };
    db::customers::insert(&s.db, &customer).await?;
    tracing::info!(customer_id = %customer.id, "customer created");
    s.events
        .publish(vec![DomainEvent::Customer(CustomerEvent::Registered { customer_id: customer.id, email: customer.email.clone() })])
        .await;
    Ok((StatusCode::CREATED, Json(CustomerSummary::new(customer, 0, Default::default(), s.settings.vip_threshold))))
}

async fn update_customer(
    State(s): State<AppState>,
    _: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<UpdateCustomerRequest>,
) -> AppResult<Json<CustomerSummary>> {
    r.validate()?;
    let mut customer = db::customers::find(&s.db, id).await?.ok_or_else(|| AppError::not_found("Customer"))?;
    r.apply(&mut customer);
    db::customers::update(&s.db, &customer).await?;
    let summary = db::customers::find_summary(&s.db, id, s.settings.vip_threshold).await?.ok_or_else(|| AppError::not_found("Customer"))?;
    Ok(Json(summary))
}

async fn delete_customer(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    let orders = db::customers::count_orders(&s.db, id).await?;
    if orders > 0 {
        return Err(AppError::conflict(format!("Customer has {orders} orders and cannot be deleted")));
    }
    if !db::customers::delete(&s.db, id).await? {
        return Err(AppError::not_found("Customer"));
    }
    tracing::info!(customer_id = %id, "customer deleted");
    s.events.publish(vec![DomainEvent::Customer(CustomerEvent::Deleted { customer_id: id })]).await;
    Ok(StatusCode::NO_CONTENT)
}
