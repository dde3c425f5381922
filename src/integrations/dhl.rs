//! DHL Parcel label client.
//!
//! Authenticates with the API key pair, caches the access token until shortly
//! before it expires and creates one label per shipment.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::instrument;
use uuid::Uuid;

use super::{IntegrationError, LabelCarrier, LabelRequest, ShippingLabel};
use crate::domain::value_objects::Grams;

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

pub struct DhlClient {
    http: reqwest::Client,
    base_url: String,
    user_id: String,
    key: String,
    account_id: String,
    token: RwLock<Option<CachedToken>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthRequest<'a> {
    user_id: &'a str,
    key: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    access_token: String,
    /// Unix seconds
    access_token_expiration: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LabelBody<'a> {
    label_id: Uuid,
    order_reference: &'a str,
    parcel_type_key: &'static str,
    account_id: &'a str,
    receiver: Receiver<'a>,
    pieces: [Piece; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Receiver<'a> {
    name: &'a str,
    email: &'a str,
    address: Address<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Address<'a> {
    country_code: &'a str,
    postal_code: &'a str,
    city: &'a str,
    street: &'a str,
    is_business: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Piece {
    parcel_type: &'static str,
    quantity: u32,
    weight: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabelResponse {
    label_id: Uuid,
    tracker_code: String,
}

/// DHL parcel size class by weight.
fn parcel_type(weight: Grams) -> &'static str {
    match weight.value() {
        0..=2_000 => "SMALL",
        2_001..=10_000 => "MEDIUM",
        _ => "LARGE",
    }
}

impl DhlClient {
    pub fn new(http: reqwest::Client, base_url: String, user_id: String, key: String, account_id: String) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_string(), user_id, key, account_id, token: RwLock::new(None) }
    }

    async fn access_token(&self) -> Result<String, IntegrationError> {
        if let Some(token) = self.token.read().await.as_ref() {
            if token.expires_at > Utc::now() + Duration::seconds(60) {
                return Ok(token.value.clone());
            }
        }
        let response = self
            .http
            .post(format!("{}/authenticate/api-key", self.base_url))
            .json(&AuthRequest { user_id: &self.user_id, key: &self.key })
            .send()
            .await?;
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "DHL authentication failed");
            return Err(IntegrationError::Upstream { service: "dhl", status: response.status().as_u16() });
        }
        let auth: AuthResponse = response.json().await.map_err(|e| IntegrationError::Unexpected { service: "dhl", reason: e.to_string() })?;
        let expires_at = DateTime::from_timestamp(auth.access_token_expiration, 0).unwrap_or_else(Utc::now);
        let value = auth.access_token.clone();
        *self.token.write().await = Some(CachedToken { value: auth.access_token, expires_at });
        Ok(value)
    }
}

#[async_trait]
impl LabelCarrier for DhlClient {
    fn is_live(&self) -> bool { true }

    #[instrument(skip(self, request), fields(order = %request.order_number))]
    async fn create_label(&self, request: &LabelRequest) -> Result<ShippingLabel, IntegrationError> {
        let token = self.access_token().await?;
        let parcel = parcel_type(request.weight);
        let body = LabelBody {
            label_id: Uuid::new_v4(),
            order_reference: &request.order_number,
            parcel_type_key: parcel,
            account_id: &self.account_id,
            receiver: Receiver {
                name: &request.recipient_name,
                email: &request.recipient_email,
                address: Address {
                    country_code: request.country.as_str(),
                    postal_code: request.postal_code.as_deref().unwrap_or_default(),
                    city: request.city.as_deref().unwrap_or_default(),
                    street: request.address.as_deref().unwrap_or_default(),
                    is_business: false,
                },
            },
            pieces: [Piece { parcel_type: parcel, quantity: 1, weight: Decimal::new(i64::from(request.weight.value()), 3) }],
        };
        let response = self.http.post(format!("{}/labels", self.base_url)).bearer_auth(token).json(&body).send().await?;
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "DHL label request failed");
            return Err(IntegrationError::Upstream { service: "dhl", status: response.status().as_u16() });
        }
        let label: LabelResponse = response.json().await.map_err(|e| IntegrationError::Unexpected { service: "dhl", reason: e.to_string() })?;
        let transit_days = if request.country.as_str() == "NL" { 1 } else { 3 };
        Ok(ShippingLabel {
            carrier: "DHL".into(),
            label_url: format!("{}/labels/{}", self.base_url, label.label_id),
            tracking_number: label.tracker_code,
            estimated_delivery: Utc::now().date_naive() + Duration::days(transit_days),
            cost: None,
        })
    }
}
