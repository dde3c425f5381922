use rust_decimal::Decimal;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::{AuthProvider, DbAuthProvider, JwtService};
use crate::config::Config;
use crate::domain::value_objects::CountryCode;
use crate::events::EventPublisher;
use crate::integrations::Integrations;
use crate::pricing::TaxTable;

/// Business settings handlers read on every request.
#[derive(Debug, Clone)]
pub struct Settings {
    pub default_country: CountryCode,
    pub vip_threshold: Decimal,
    pub volumetric_divisor: u32,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            default_country: config.default_country.clone(),
            vip_threshold: config.vip_threshold,
            volumetric_divisor: config.volumetric_divisor,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub jwt: Arc<JwtService>,
    pub auth: Arc<dyn AuthProvider>,
    pub integrations: Integrations,
    pub tax: Arc<TaxTable>,
    pub settings: Arc<Settings>,
    pub events: EventPublisher,
}

impl AppState {
    pub fn new(db: SqlitePool, config: &Config, integrations: Integrations, events: EventPublisher) -> Self {
        Self {
            auth: Arc::new(DbAuthProvider::new(db.clone())),
            jwt: Arc::new(JwtService::new(config.jwt.clone())),
            tax: Arc::new(config.vat_categories.iter().fold(TaxTable::default(), |t, (c, r)| t.with_category(c, *r))),
            settings: Arc::new(Settings::from(config)),
            db,
            integrations,
            events,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{IntegrationsConfig, JwtConfig};
    use crate::db;

    pub fn test_config() -> Config {
        Config {
            database_url: "sqlite::memory:".into(),
            port: 0,
            jwt: JwtConfig { secret: "test-secret-key-that-is-at-least-32-chars".into(), expiration_minutes: 60, issuer: "webshop-backoffice".into() },
            admin_email: "admin@webshop.test".into(),
            admin_password: None,
            default_country: CountryCode::parse("NL").unwrap(),
            vip_threshold: Decimal::from(1000),
            volumetric_divisor: 5000,
            vat_categories: Vec::new(),
            nats_url: None,
            integrations: IntegrationsConfig::default(),
        }
    }

    /// In-memory store with the default shipping table and every integration mocked.
    pub async fn test_state() -> AppState {
        let pool = db::test_pool().await;
        db::shipping_rules::seed_defaults(&pool).await.unwrap();
        AppState::new(pool, &test_config(), Integrations::mock(), EventPublisher::default())
    }
}
