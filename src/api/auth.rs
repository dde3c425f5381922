//! Login and registration for both roles.

use axum::{extract::State, http::StatusCode, routing::{get, post, put}, Router};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::Json;

use crate::auth::{hash_password, CurrentUser, Principal, Role};
use crate::db;
use crate::domain::aggregates::{normalize_email, Customer, CustomerStatus};
use crate::domain::events::{CustomerEvent, DomainEvent};
use crate::domain::value_objects::CountryCode;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(admin_login))
        .route("/customer/login", post(customer_login))
        .route("/customer/register", post(register))
        .route("/me", get(me))
        .route("/change-password", put(change_password))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<CountryCode>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse { pub token: String, pub expires_in: i64, pub user: Principal }

fn issue(s: &AppState, user: Principal) -> AppResult<AuthResponse> {
    let token = s.jwt.generate_token(user.id, &user.email, user.role)?;
    Ok(AuthResponse { token, expires_in: s.jwt.expiration_minutes() * 60, user })
}

async fn login(s: &AppState, role: Role, r: LoginRequest) -> AppResult<Json<AuthResponse>> {
    r.validate()?;
    let Some(user) = s.auth.authenticate(role, &r.email, &r.password).await? else {
        tracing::warn!(email = %normalize_email(&r.email), role = role.as_str(), "failed login");
        return Err(AppError::InvalidCredentials);
    };
    tracing::info!(user_id = %user.id, role = role.as_str(), "login");
    Ok(Json(issue(s, user)?))
}

async fn admin_login(State(s): State<AppState>, Json(r): Json<LoginRequest>) -> AppResult<Json<AuthResponse>> {
    login(&s, Role::Admin, r).await
}

async fn customer_login(State(s): State<AppState>, Json(r): Json<LoginRequest>) -> AppResult<Json<AuthResponse>> {
    login(&s, Role::Customer, r).await
}

async fn register(State(s): State<AppState>, Json(r): Json<RegisterRequest>) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    r.validate()?;
    if db::customers::find_by_email(&s.db, &r.email).await?.is_some() {
        return Err(AppError::conflict("Email already registered"));
    }
    let hash = hash_password(&r.password).map_err(|e| AppError::Internal(e.to_string()))?;
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
        status: CustomerStatus::New,
        notes: None,
        password_hash: Some(hash),
        created_at: now,
        updated_at: now,
    };
    db::customers::insert(&s.db, &customer).await?;
    tracing::info!(customer_id = %customer.id, "customer registered");
    s.events
        .publish(vec![DomainEvent::Customer(CustomerEvent::Registered { customer_id: customer.id, email: customer.email.clone() })])
        .await;

    let user = Principal { id: customer.id, email: customer.email.clone(), name: customer.full_name(), role: Role::Customer };
    Ok((StatusCode::CREATED, Json(issue(&s, user)?)))
}

async fn me(State(s): State<AppState>, user: CurrentUser) -> AppResult<Json<Principal>> {
    s.auth
        .lookup(user.role, user.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".into()))
}

async fn change_password(State(s): State<AppState>, user: CurrentUser, Json(r): Json<ChangePasswordRequest>) -> AppResult<StatusCode> {
    r.validate()?;
    if !s.auth.change_password(user.role, user.id, &r.current_password, &r.new_password).await? {
        tracing::warn!(user_id = %user.id, role = user.role.as_str(), "password change with wrong current password");
        return Err(AppError::InvalidCredentials);
    }
    tracing::info!(user_id = %user.id, role = user.role.as_str(), "password changed");
    Ok(StatusCode::NO_CONTENT)
}
