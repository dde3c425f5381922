//! Unified error handling for the HTTP layer.
//!
//! Every handler returns `Result<_, AppError>`; the layer errors fold in via
//! `From` so handlers can use `?` throughout.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::auth::JwtError;
use crate::domain::aggregates::{OrderError, ProductError};
use crate::domain::value_objects::{CountryError, SkuError};
use crate::integrations::IntegrationError;
use crate::pricing::PricingError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Request body failed field validation.
    #[error("Validation failed")]
    Validation(#[from] validator::ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    InsufficientStock(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("Integration error: {0}")]
    Integration(#[from] IntegrationError),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self { Self::NotFound(what.into()) }
    pub fn bad_request(msg: impl Into<String>) -> Self { Self::BadRequest(msg.into()) }
    pub fn conflict(msg: impl Into<String>) -> Self { Self::Conflict(msg.into()) }
    pub fn forbidden(msg: impl Into<String>) -> Self { Self::Forbidden(msg.into()) }
    pub fn unauthorized() -> Self { Self::Unauthorized("Authentication required".into()) }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::InvalidTransition(_) | Self::InsufficientStock(_) => StatusCode::CONFLICT,
            Self::Pricing(PricingError::InvalidRate(_) | PricingError::InvalidDimensions(_) | PricingError::AmountOutOfRange(_)) => StatusCode::BAD_REQUEST,
            Self::Pricing(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Integration(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => "validation_error",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::InsufficientStock(_) => "insufficient_stock",
            Self::Pricing(PricingError::NoShippingRule { .. }) => "no_shipping_rule",
            Self::Pricing(PricingError::IncompleteProductData { .. }) => "incomplete_product_data",
            Self::Pricing(PricingError::InvalidRate(_) | PricingError::InvalidDimensions(_) | PricingError::AmountOutOfRange(_)) => "validation_error",
            Self::Integration(_) => "integration_error",
            Self::Database(_) | Self::Internal(_) => "internal_error",
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::Validation(errors) => serde_json::to_value(errors.field_errors()).ok(),
            Self::Pricing(PricingError::NoShippingRule { destination, weight }) => Some(json!({ "destination": destination, "weight": weight })),
            Self::Pricing(PricingError::IncompleteProductData { product, field }) => Some(json!({ "product": product, "field": field })),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        } else {
            tracing::debug!(error = %self, code = self.code(), "request rejected");
        }

        // Internal failures are logged above, never echoed to the client.
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };
        let mut error = json!({ "code": self.code(), "message": message });
        if let Some(details) = self.details() {
            error["details"] = details;
        }
        (status, Json(json!({ "error": error }))).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("Record".into()),
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict("Record already exists".into()),
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => Self::Conflict("Record is still referenced".into()),
            _ => Self::Database(err),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidTransition { .. } => Self::InvalidTransition(err.to_string()),
            OrderError::NotEditable(_) => Self::Conflict(err.to_string()),
            _ => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::InsufficientStock { .. } => Self::InsufficientStock(err.to_string()),
            _ => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<SkuError> for AppError {
    fn from(err: SkuError) -> Self { Self::BadRequest(err.to_string()) }
}

impl From<CountryError> for AppError {
    fn from(err: CountryError) -> Self { Self::BadRequest(err.to_string()) }
}

impl From<JwtError> for AppError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Generation(_) => Self::Internal(err.to_string()),
            _ => Self::Unauthorized(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::OrderStatus;

    fn status_of(err: AppError) -> StatusCode { err.into_response().status() }

    #[test]
    fn test_status_codes() {
        assert_eq!(status_of(AppError::not_found("Order")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AppError::forbidden("admins only")), StatusCode::FORBIDDEN);
        assert_eq!(status_of(PricingError::NoShippingRule { destination: "NL".into(), weight: 1 }.into()), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_of(PricingError::InvalidRate(rust_decimal::Decimal::from(21)).into()), StatusCode::BAD_REQUEST);
        let err: AppError = PricingError::InvalidDimensions("volume out of range").into();
        assert_eq!(err.code(), "validation_error");
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(IntegrationError::Upstream { service: "dhl", status: 500 }.into()), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_domain_errors_map_to_conflicts() {
        let err: AppError = OrderError::InvalidTransition { from: OrderStatus::Delivered, to: OrderStatus::Pending }.into();
        assert_eq!(err.code(), "invalid_transition");
        assert_eq!(err.status(), StatusCode::CONFLICT);
        let err: AppError = ProductError::InsufficientStock { sku: "A".into(), available: 0 }.into();
        assert_eq!(err.code(), "insufficient_stock");
        let err: AppError = OrderError::NoItems.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Internal("secret connection string".into());
        assert_eq!(err.code(), "internal_error");
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(AppError::from(sqlx::Error::RowNotFound).status(), StatusCode::NOT_FOUND);
    }
}
