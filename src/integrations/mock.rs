//! Deterministic stand-ins used when an integration has no credentials.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Mutex;

use super::{AdPlatform, AdPlatformKind, Campaign, EmailPayload, EmailReceipt, IntegrationError, LabelCarrier, LabelRequest, Mailer, ShippingLabel};

pub struct MockAdPlatform {
    kind: AdPlatformKind,
}

impl MockAdPlatform {
    pub fn new(kind: AdPlatformKind) -> Self { Self { kind } }
}

#[async_trait]
impl AdPlatform for MockAdPlatform {
    fn kind(&self) -> AdPlatformKind { self.kind }
    fn is_live(&self) -> bool { false }

    async fn fetch_campaigns(&self) -> Result<Vec<Campaign>, IntegrationError> {
        let campaign = |id: &str, name: &str, cost: i64, impressions: i64, clicks: i64, conversions: i64, value: i64| Campaign {
            id: id.into(), name: name.into(), platform: self.kind, status: "ENABLED".into(), cost: Decimal::new(cost, 2),
            impressions, clicks, conversions, conversions_value: Decimal::new(value, 2),
        };
        Ok(match self.kind {
            AdPlatformKind::GoogleAds => vec![
                campaign("g-1001", "Search - Brand", 12_450, 8_200, 410, 18, 98_600),
                campaign("g-1002", "Shopping - All products", 38_920, 41_500, 1_245, 22, 121_000),
                campaign("g-1003", "Display - Remarketing", 9_800, 52_000, 260, 2, 6_400),
            ],
            AdPlatformKind::MetaAds => vec![
                campaign("m-2001", "Prospecting - Lookalike", 25_000, 96_000, 1_150, 9, 41_500),
                campaign("m-2002", "Retargeting - Cart abandoners", 7_500, 18_400, 520, 11, 56_300),
            ],
        })
    }
}

/// DHL-shaped labels: 6.95 base, +2.00 over 2 kg, +1.50 over 10 000 cm³.
pub struct MockCarrier;

impl MockCarrier {
    fn cost(request: &LabelRequest) -> Decimal {
        let mut cost = Decimal::new(695, 2);
        if request.weight.value() > 2000 {
            cost += Decimal::from(2);
        }
        if request.dimensions.is_some_and(|d| d.length * d.width * d.height > Decimal::from(10_000)) {
            cost += Decimal::new(150, 2);
        }
        cost
    }

    fn transit_days(country: &str) -> i64 {
        match country { "NL" => 1, "BE" | "DE" => 2, _ => 3 }
    }
}

#[async_trait]
impl LabelCarrier for MockCarrier {
    fn is_live(&self) -> bool { false }

    async fn create_label(&self, request: &LabelRequest) -> Result<ShippingLabel, IntegrationError> {
        let digits: String = request.order_number.chars().filter(char::is_ascii_alphanumeric).collect::<String>().to_uppercase();
        let tracking_number = format!("3SMOCK{digits}");
        tracing::info!(order = %request.order_number, tracking = %tracking_number, "mock DHL label created");
        Ok(ShippingLabel {
            carrier: "DHL".into(),
            label_url: format!("https://labels.invalid/dhl/{tracking_number}.pdf"),
            estimated_delivery: Utc::now().date_naive() + Duration::days(Self::transit_days(request.country.as_str())),
            cost: Some(Self::cost(request)),
            tracking_number,
        })
    }
}

/// Logs instead of sending; keeps every message for inspection.
#[derive(Default)]
pub struct MockMailer {
    outbox: Mutex<Vec<EmailPayload>>,
}

impl MockMailer {
    pub fn sent(&self) -> Vec<EmailPayload> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    fn is_live(&self) -> bool { false }

    async fn send_email(&self, email: &EmailPayload) -> Result<EmailReceipt, IntegrationError> {
        if !email.to.contains('@') {
            return Err(IntegrationError::InvalidAddress(email.to.clone()));
        }
        tracing::info!(to = %email.to, subject = %email.subject, "mock email sent");
        let count = match self.outbox.lock() {
            Ok(mut outbox) => {
                outbox.push(email.clone());
                outbox.len()
            }
            Err(_) => 0,
        };
        Ok(EmailReceipt { message_id: format!("mock-{count}"), mocked: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{CountryCode, Grams};
    use crate::pricing::{Dimensions, ServiceTier};

    fn request(grams: u32, dimensions: Option<Dimensions>) -> LabelRequest {
        LabelRequest {
            order_number: "ORD-00001234".into(), recipient_name: "Anna".into(), recipient_email: "anna@example.nl".into(),
            address: None, city: None, postal_code: None, country: CountryCode::parse("BE").unwrap(), weight: Grams(grams),
            dimensions, declared_value: Decimal::from(40), service: ServiceTier::Standard,
        }
    }

    #[tokio::test]
    async fn test_label_is_deterministic() {
        let a = MockCarrier.create_label(&request(500, None)).await.unwrap();
        let b = MockCarrier.create_label(&request(500, None)).await.unwrap();
        assert_eq!(a.tracking_number, "3SMOCKORD00001234");
        assert_eq!(a, b);
        assert_eq!(a.cost, Some(Decimal::new(695, 2)));
    }

    #[tokio::test]
    async fn test_label_surcharges() {
        let big = Dimensions { length: Decimal::from(40), width: Decimal::from(30), height: Decimal::from(20) };
        let label = MockCarrier.create_label(&request(2500, Some(big))).await.unwrap();
        assert_eq!(label.cost, Some(Decimal::new(1045, 2)));
    }

    #[tokio::test]
    async fn test_mailer_keeps_outbox() {
        let mailer = MockMailer::default();
        let email = EmailPayload { to: "anna@example.nl".into(), subject: "Hi".into(), text_body: "Hello".into(), html_body: None };
        assert!(mailer.send_email(&email).await.unwrap().mocked);
        assert_eq!(mailer.sent(), vec![email.clone()]);
        let bad = EmailPayload { to: "nobody".into(), ..email };
        assert!(matches!(mailer.send_email(&bad).await, Err(IntegrationError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_mock_campaigns_are_fixed() {
        let google = MockAdPlatform::new(AdPlatformKind::GoogleAds).fetch_campaigns().await.unwrap();
        assert_eq!(google.len(), 3);
        assert!(google.iter().all(|c| c.platform == AdPlatformKind::GoogleAds));
        assert!(google[2].roas() < Decimal::ONE);
    }
}
