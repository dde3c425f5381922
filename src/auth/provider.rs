use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{password, Role};
use crate::db;
use crate::domain::aggregates::normalize_email;
use crate::error::{AppError, AppResult};

/// An authenticated account of either role.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

/// Credential checks, injected through `AppState`.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// `None` for an unknown account or a wrong password.
    async fn authenticate(&self, role: Role, email: &str, password: &str) -> AppResult<Option<Principal>>;

    async fn lookup(&self, role: Role, id: Uuid) -> AppResult<Option<Principal>>;

    /// Replaces the password after checking the current one. `false` when the
    /// account is gone or `current` does not match.
    async fn change_password(&self, role: Role, id: Uuid, current: &str, new: &str) -> AppResult<bool>;
}

pub struct DbAuthProvider {
    pool: SqlitePool,
}

impl DbAuthProvider {
    pub fn new(pool: SqlitePool) -> Self { Self { pool } }
}

#[async_trait]
impl AuthProvider for DbAuthProvider {
    async fn authenticate(&self, role: Role, email: &str, password: &str) -> AppResult<Option<Principal>> {
        let email = normalize_email(email);
        let found = match role {
            Role::Admin => db::users::find_by_email(&self.pool, &email)
                .await?
                .map(|u| (Principal { id: u.id, email: u.email, name: u.name, role }, Some(u.password_hash))),
            Role::Customer => db::customers::find_by_email(&self.pool, &email)
                .await?
                .map(|c| (Principal { id: c.id, email: c.email.clone(), name: c.full_name(), role }, c.password_hash)),
        };
        Ok(found.and_then(|(principal, hash)| {
            hash.filter(|h| password::verify_password(password, h)).map(|_| principal)
        }))
    }

    async fn lookup(&self, role: Role, id: Uuid) -> AppResult<Option<Principal>> {
        Ok(match role {
            Role::Admin => db::users::find(&self.pool, id).await?.map(|u| Principal { id: u.id, email: u.email, name: u.name, role }),
            Role::Customer => db::customers::find(&self.pool, id)
                .await?
                .map(|c| Principal { id: c.id, email: c.email.clone(), name: c.full_name(), role }),
        })
    }

    async fn change_password(&self, role: Role, id: Uuid, current: &str, new: &str) -> AppResult<bool> {
        let stored = match role {
            Role::Admin => db::users::find(&self.pool, id).await?.map(|u| u.password_hash),
            Role::Customer => db::customers::find(&self.pool, id).await?.and_then(|c| c.password_hash),
        };
        if !stored.is_some_and(|h| password::verify_password(current, &h)) {
            return Ok(false);
        }
        let hash = password::hash_password(new).map_err(|e| AppError::Internal(e.to_string()))?;
        match role {
            Role::Admin => db::users::update_password(&self.pool, id, &hash).await?,
            Role::Customer => db::customers::update_password(&self.pool, id, &hash).await?,
        }
        Ok(true)
    }
}
