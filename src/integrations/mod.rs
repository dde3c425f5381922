//! Outbound integrations: advertising platforms, the parcel carrier and mail.
//!
//! Each capability is a trait with a live client and a deterministic mock.
//! `Integrations::from_config` picks the live client for every slot whose
//! credentials are configured. A failing live client surfaces as
//! `IntegrationError`; it never falls back to mock data.

pub mod dhl;
pub mod google_ads;
pub mod meta_ads;
pub mod mock;
pub mod smtp;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{AdsConfig, CarrierConfig, IntegrationsConfig, MailerConfig};
use crate::domain::value_objects::{money, CountryCode, Grams};
use crate::pricing::{Dimensions, ServiceTier};

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{service} responded with status {status}")]
    Upstream { service: &'static str, status: u16 },
    #[error("{service} returned an unexpected response: {reason}")]
    Unexpected { service: &'static str, reason: String },
    #[error("SMTP error: {0}")]
    Smtp(String),
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdPlatformKind { GoogleAds, MetaAds }

impl AdPlatformKind {
    pub const ALL: [AdPlatformKind; 2] = [Self::GoogleAds, Self::MetaAds];
    pub fn as_str(&self) -> &'static str { match self { Self::GoogleAds => "google_ads", Self::MetaAds => "meta_ads" } }
    pub fn parse(s: &str) -> Option<Self> {
        match s { "google_ads" | "google" => Some(Self::GoogleAds), "meta_ads" | "meta" | "facebook" => Some(Self::MetaAds), _ => None }
    }
}

/// Campaign with its lifetime metrics as reported by the platform.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub platform: AdPlatformKind,
    pub status: String,
    pub cost: Decimal,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub conversions_value: Decimal,
}

impl Campaign {
    /// Click-through rate in percent.
    pub fn ctr(&self) -> Decimal {
        if self.impressions == 0 { return Decimal::ZERO; }
        money::round(Decimal::from(self.clicks) / Decimal::from(self.impressions) * Decimal::ONE_HUNDRED)
    }
    pub fn cpc(&self) -> Decimal {
        if self.clicks == 0 { return Decimal::ZERO; }
        money::round(self.cost / Decimal::from(self.clicks))
    }
    /// Conversion value per euro spent.
    pub fn roas(&self) -> Decimal {
        if self.cost.is_zero() { return Decimal::ZERO; }
        money::round(self.conversions_value / self.cost)
    }
}

#[derive(Clone, Debug)]
pub struct LabelRequest {
    pub order_number: String,
    pub recipient_name: String,
    pub recipient_email: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: CountryCode,
    pub weight: Grams,
    pub dimensions: Option<Dimensions>,
    pub declared_value: Decimal,
    pub service: ServiceTier,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShippingLabel {
    pub carrier: String,
    pub tracking_number: String,
    pub label_url: String,
    pub estimated_delivery: NaiveDate,
    /// Carrier charge, when the carrier reports one.
    pub cost: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmailPayload {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    #[serde(default)]
    pub html_body: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EmailReceipt {
    pub message_id: String,
    pub mocked: bool,
}

#[async_trait]
pub trait AdPlatform: Send + Sync {
    fn kind(&self) -> AdPlatformKind;
    fn is_live(&self) -> bool;
    async fn fetch_campaigns(&self) -> Result<Vec<Campaign>, IntegrationError>;
}

#[async_trait]
pub trait LabelCarrier: Send + Sync {
    fn is_live(&self) -> bool;
    async fn create_label(&self, request: &LabelRequest) -> Result<ShippingLabel, IntegrationError>;
}

#[async_trait]
pub trait Mailer: Send + Sync {
    fn is_live(&self) -> bool;
    async fn send_email(&self, email: &EmailPayload) -> Result<EmailReceipt, IntegrationError>;
}

#[derive(Clone)]
pub struct Integrations {
    pub google_ads: Arc<dyn AdPlatform>,
    pub meta_ads: Arc<dyn AdPlatform>,
    pub carrier: Arc<dyn LabelCarrier>,
    pub mailer: Arc<dyn Mailer>,
}

impl Integrations {
    pub fn from_config(config: &IntegrationsConfig) -> Result<Self, IntegrationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(concat!("webshop-backoffice/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let ads = |slot: Option<&AdsConfig>, kind: AdPlatformKind| -> Arc<dyn AdPlatform> {
            match slot {
                Some(AdsConfig::GoogleAds { developer_token, customer_id, access_token }) => Arc::new(
                    google_ads::GoogleAdsClient::new(http.clone(), developer_token.clone(), customer_id.clone(), access_token.clone()),
                ),
                Some(AdsConfig::MetaAds { access_token, ad_account_id }) => {
                    Arc::new(meta_ads::MetaAdsClient::new(http.clone(), access_token.clone(), ad_account_id.clone()))
                }
                None => Arc::new(mock::MockAdPlatform::new(kind)),
            }
        };
        let carrier: Arc<dyn LabelCarrier> = match &config.carrier {
            Some(CarrierConfig::Dhl { base_url, api_key, api_secret, account_number }) => Arc::new(dhl::DhlClient::new(
                http.clone(), base_url.clone(), api_key.clone(), api_secret.clone(), account_number.clone(),
            )),
            None => Arc::new(mock::MockCarrier),
        };
        let mailer: Arc<dyn Mailer> = match &config.mailer {
            Some(MailerConfig::Smtp { host, port, username, password, from }) => {
                Arc::new(smtp::SmtpMailer::new(host, *port, username.clone(), password.clone(), from.clone())?)
            }
            None => Arc::new(mock::MockMailer::default()),
        };

        let integrations = Self {
            google_ads: ads(config.google_ads.as_ref(), AdPlatformKind::GoogleAds),
            meta_ads: ads(config.meta_ads.as_ref(), AdPlatformKind::MetaAds),
            carrier,
            mailer,
        };
        tracing::info!(
            google_ads = integrations.google_ads.is_live(),
            meta_ads = integrations.meta_ads.is_live(),
            dhl = integrations.carrier.is_live(),
            smtp = integrations.mailer.is_live(),
            "integrations configured (true = live)"
        );
        Ok(integrations)
    }

    /// Every slot on its mock.
    pub fn mock() -> Self {
        Self {
            google_ads: Arc::new(mock::MockAdPlatform::new(AdPlatformKind::GoogleAds)),
            meta_ads: Arc::new(mock::MockAdPlatform::new(AdPlatformKind::MetaAds)),
            carrier: Arc::new(mock::MockCarrier),
            mailer: Arc::new(mock::MockMailer::default()),
        }
    }

    pub fn ad_platform(&self, kind: AdPlatformKind) -> &Arc<dyn AdPlatform> {
        match kind {
            AdPlatformKind::GoogleAds => &self.google_ads,
            AdPlatformKind::MetaAds => &self.meta_ads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campaign_metrics() {
        let c = Campaign {
            id: "1".into(), name: "Brand".into(), platform: AdPlatformKind::GoogleAds, status: "ENABLED".into(),
            cost: Decimal::from(50), impressions: 2000, clicks: 40, conversions: 3, conversions_value: Decimal::from(150),
        };
        assert_eq!(c.ctr(), Decimal::from(2));
        assert_eq!(c.cpc(), Decimal::new(125, 2));
        assert_eq!(c.roas(), Decimal::from(3));
    }

    #[test]
    fn test_unconfigured_slots_use_mocks() {
        let integrations = Integrations::from_config(&IntegrationsConfig::default()).unwrap();
        assert!(!integrations.carrier.is_live());
        assert!(!integrations.mailer.is_live());
        assert_eq!(integrations.ad_platform(AdPlatformKind::MetaAds).kind(), AdPlatformKind::MetaAds);
    }

    #[test]
    fn test_platform_aliases() {
        assert_eq!(AdPlatformKind::parse("google"), Some(AdPlatformKind::GoogleAds));
        assert_eq!(AdPlatformKind::parse("facebook"), Some(AdPlatformKind::MetaAds));
        assert_eq!(AdPlatformKind::parse("tiktok"), None);
    }
}
