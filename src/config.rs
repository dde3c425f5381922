//! Service configuration, read once from the environment at startup.

use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::value_objects::CountryCode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("{0} must be at least 32 characters long")]
    WeakSecret(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt: JwtConfig,
    /// Seeded admin account; seeding is skipped without a password.
    pub admin_email: String,
    pub admin_password: Option<String>,
    pub default_country: CountryCode,
    /// Lifetime spend from which a customer counts as VIP.
    pub vip_threshold: Decimal,
    pub volumetric_divisor: u32,
    /// Per-category VAT overrides from `VAT_CATEGORY_RATES=books=0.09,food=0.09`.
    pub vat_categories: Vec<(String, Decimal)>,
    pub nats_url: Option<String>,
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_minutes: i64,
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self { secret: random_secret(), expiration_minutes: 1440, issuer: "webshop-backoffice".into() }
    }
}

/// Credentials for each outbound integration. A `None` slot runs on the mock.
#[derive(Debug, Clone, Default)]
pub struct IntegrationsConfig {
    pub google_ads: Option<AdsConfig>,
    pub meta_ads: Option<AdsConfig>,
    pub carrier: Option<CarrierConfig>,
    pub mailer: Option<MailerConfig>,
}

#[derive(Debug, Clone)]
pub enum AdsConfig {
    GoogleAds { developer_token: String, customer_id: String, access_token: String },
    MetaAds { access_token: String, ad_account_id: String },
}

#[derive(Debug, Clone)]
pub enum CarrierConfig {
    Dhl { base_url: String, api_key: String, api_secret: String, account_number: String },
}

#[derive(Debug, Clone)]
pub enum MailerConfig {
    Smtp { host: String, port: u16, username: String, password: String, from: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt = JwtConfig {
            secret: match var("JWT_SECRET") {
                Some(s) if s.len() < 32 => return Err(ConfigError::WeakSecret("JWT_SECRET")),
                Some(s) => s,
                None => {
                    tracing::warn!("JWT_SECRET not set, using a random key; tokens will not survive a restart");
                    random_secret()
                }
            },
            expiration_minutes: parse_or("JWT_EXPIRATION_MINUTES", 1440)?,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "webshop-backoffice".into()),
        };
        let default_country = match var("DEFAULT_COUNTRY") {
            Some(c) => CountryCode::parse(&c).map_err(|_| ConfigError::Invalid { name: "DEFAULT_COUNTRY", value: c })?,
            None => CountryCode::parse("NL").map_err(|_| ConfigError::Invalid { name: "DEFAULT_COUNTRY", value: "NL".into() })?,
        };

        Ok(Self {
            database_url: var("DATABASE_URL").unwrap_or_else(|| "sqlite://backoffice.db?mode=rwc".into()),
            port: parse_or("PORT", 8083)?,
            jwt,
            admin_email: var("ADMIN_EMAIL").unwrap_or_else(|| "admin@webshop.local".into()),
            admin_password: var("ADMIN_PASSWORD"),
            default_country,
            vip_threshold: parse_or("VIP_THRESHOLD", Decimal::from(1000))?,
            volumetric_divisor: parse_or("VOLUMETRIC_DIVISOR", 5000)?,
            vat_categories: var("VAT_CATEGORY_RATES").map(|v| parse_rates(&v)).transpose()?.unwrap_or_default(),
            nats_url: var("NATS_URL"),
            integrations: IntegrationsConfig::from_env()?,
        })
    }
}

impl IntegrationsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let google_ads = match (var("GOOGLE_ADS_DEVELOPER_TOKEN"), var("GOOGLE_ADS_CUSTOMER_ID"), var("GOOGLE_ADS_ACCESS_TOKEN")) {
            (Some(developer_token), Some(customer_id), Some(access_token)) => Some(AdsConfig::GoogleAds { developer_token, customer_id, access_token }),
            _ => None,
        };
        let meta_ads = match (var("META_ADS_ACCESS_TOKEN"), var("META_ADS_AD_ACCOUNT_ID")) {
            (Some(access_token), Some(ad_account_id)) => Some(AdsConfig::MetaAds { access_token, ad_account_id }),
            _ => None,
        };
        let carrier = match (var("DHL_API_KEY"), var("DHL_API_SECRET")) {
            (Some(api_key), Some(api_secret)) => Some(CarrierConfig::Dhl {
                base_url: var("DHL_API_URL").unwrap_or_else(|| "https://api-gw.dhlparcel.nl".into()),
                api_key,
                api_secret,
                account_number: var("DHL_ACCOUNT_NUMBER").unwrap_or_default(),
            }),
            _ => None,
        };
        let mailer = match (var("SMTP_HOST"), var("SMTP_USERNAME"), var("SMTP_PASSWORD")) {
            (Some(host), Some(username), Some(password)) => Some(MailerConfig::Smtp {
                host,
                port: parse_or("SMTP_PORT", 587)?,
                from: var("SMTP_FROM").unwrap_or_else(|| username.clone()),
                username,
                password,
            }),
            _ => None,
        };
        Ok(Self { google_ads, meta_ads, carrier, mailer })
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match var(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

fn parse_rates(raw: &str) -> Result<Vec<(String, Decimal)>, ConfigError> {
    let invalid = || ConfigError::Invalid { name: "VAT_CATEGORY_RATES", value: raw.to_string() };
    raw.split(',')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            let (category, rate) = pair.split_once('=').ok_or_else(invalid)?;
            let rate: Decimal = rate.trim().parse().map_err(|_| invalid())?;
            if rate.is_sign_negative() || rate > Decimal::ONE {
                return Err(invalid());
            }
            Ok((category.trim().to_lowercase(), rate))
        })
        .collect()
}

fn random_secret() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(64).map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_secret_is_strong() {
        let a = JwtConfig::default();
        assert_eq!(a.secret.len(), 64);
        assert_ne!(a.secret, JwtConfig::default().secret);
    }

    #[test]
    fn test_parse_or_default_and_invalid() {
        assert_eq!(parse_or("WEBSHOP_TEST_UNSET_VAR", 42u16).unwrap(), 42);
        std::env::set_var("WEBSHOP_TEST_BAD_PORT", "eighty");
        assert!(matches!(parse_or::<u16>("WEBSHOP_TEST_BAD_PORT", 1), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_vat_category_rates() {
        let rates = parse_rates("Books=0.09, food = 0.09").unwrap();
        assert_eq!(rates, vec![("books".to_string(), Decimal::new(9, 2)), ("food".to_string(), Decimal::new(9, 2))]);
        assert!(parse_rates("books=21").is_err());
        assert!(parse_rates("books").is_err());
    }
}
