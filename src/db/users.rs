use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::aggregates::normalize_email;
use crate::error::AppResult;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdminAccount {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<AdminAccount>> {
    Ok(sqlx::query_as::<_, AdminAccount>("SELECT * FROM admin_users WHERE email = ?1")
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?)
}

pub async fn find(pool: &SqlitePool, id: Uuid) -> AppResult<Option<AdminAccount>> {
    Ok(sqlx::query_as::<_, AdminAccount>("SELECT * FROM admin_users WHERE id = ?1").bind(id).fetch_optional(pool).await?)
}

pub async fn insert(pool: &SqlitePool, email: &str, name: &str, password_hash: &str) -> AppResult<AdminAccount> {
    Ok(sqlx::query_as::<_, AdminAccount>(
        "INSERT INTO admin_users (id, email, name, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(normalize_email(email))
    .bind(name)
    .bind(password_hash)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?)
}

pub async fn update_password(pool: &SqlitePool, id: Uuid, password_hash: &str) -> AppResult<()> {
    sqlx::query("UPDATE admin_users SET password_hash = ?2 WHERE id = ?1").bind(id).bind(password_hash).execute(pool).await?;
    Ok(())
}
