//! Request extractors that validate the bearer token.
//!
//! `CurrentUser` accepts either role; `AdminUser` and `CustomerUser` narrow it
//! and reject the other role with 403.

use axum::{async_trait, extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use uuid::Uuid;

use super::{Claims, JwtError, JwtService, Role};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl TryFrom<Claims> for CurrentUser {
    type Error = uuid::Error;
    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self { id: claims.sub.parse()?, email: claims.email, role: claims.role })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let header = parts.headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());
        let Some(token) = header.and_then(JwtService::extract_from_header) else {
            tracing::debug!(uri = %parts.uri, "missing bearer token");
            return Err(AppError::unauthorized());
        };

        let claims = state.jwt.validate_token(token).map_err(|e| {
            tracing::warn!(uri = %parts.uri, error = %e, "token rejected");
            match e {
                JwtError::ExpiredToken => AppError::Unauthorized("Token expired".into()),
                _ => AppError::Unauthorized("Invalid token".into()),
            }
        })?;
        let user = CurrentUser::try_from(claims).map_err(|_| AppError::Unauthorized("Malformed token subject".into()))?;
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// Admin-only routes.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            tracing::warn!(user_id = %user.id, uri = %parts.uri, "customer token used on admin route");
            return Err(AppError::forbidden("Admin access required"));
        }
        Ok(Self(user))
    }
}

/// Customer portal routes.
#[derive(Debug, Clone)]
pub struct CustomerUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for CustomerUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != Role::Customer {
            tracing::warn!(user_id = %user.id, uri = %parts.uri, "admin token used on customer portal");
            return Err(AppError::forbidden("Customer access required"));
        }
        Ok(Self(user))
    }
}
