//! JWT token service
//!
//! Issues and validates HS256 tokens for both roles.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role { Admin, Customer }

impl Role {
    pub fn as_str(&self) -> &'static str { match self { Self::Admin => "admin", Self::Customer => "customer" } }
}

/// Claims stored in the token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User or customer id
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Token expired")]
    ExpiredToken,
    #[error("Token generation failed: {0}")]
    Generation(String),
}

pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            config,
        }
    }

    pub fn expiration_minutes(&self) -> i64 { self.config.expiration_minutes }

    pub fn generate_token(&self, id: Uuid, email: &str, role: Role) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: id.to_string(),
            email: email.to_string(),
            role,
            exp: (now + Duration::minutes(self.config.expiration_minutes)).timestamp(),
            iat: now.timestamp(),
            iss: self.config.issuer.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| JwtError::Generation(e.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                _ => JwtError::InvalidToken(e.to_string()),
            })
    }

    /// Extracts the token from `Bearer <token>`
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(issuer: &str, minutes: i64) -> JwtConfig {
        JwtConfig { secret: "a-test-secret-that-is-long-enough-for-hs256".into(), expiration_minutes: minutes, issuer: issuer.into() }
    }

    #[test]
    fn test_round_trip() {
        let svc = JwtService::new(config("backoffice", 60));
        let id = Uuid::new_v4();
        let token = svc.generate_token(id, "admin@example.nl", Role::Admin).unwrap();
        let claims = svc.validate_token(&token).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_expired_and_foreign_issuer() {
        let svc = JwtService::new(config("backoffice", -5));
        let token = svc.generate_token(Uuid::new_v4(), "a@b.nl", Role::Customer).unwrap();
        assert!(matches!(svc.validate_token(&token), Err(JwtError::ExpiredToken)));

        let other = JwtService::new(config("someone-else", 60));
        let token = other.generate_token(Uuid::new_v4(), "a@b.nl", Role::Customer).unwrap();
        assert!(matches!(JwtService::new(config("backoffice", 60)).validate_token(&token), Err(JwtError::InvalidToken(_))));
    }

    #[test]
    fn test_extract_from_header() {
        assert_eq!(JwtService::extract_from_header("Bearer abc"), Some("abc"));
        assert_eq!(JwtService::extract_from_header("Basic abc"), None);
        assert_eq!(JwtService::extract_from_header("Bearer "), None);
    }
}
