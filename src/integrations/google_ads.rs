//! Google Ads REST client (GAQL search).

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use super::{AdPlatform, AdPlatformKind, Campaign, IntegrationError};

const API_BASE: &str = "https://googleads.googleapis.com/v16";

const CAMPAIGN_QUERY: &str = "SELECT campaign.id, campaign.name, campaign.status, metrics.cost_micros, metrics.impressions, \
    metrics.clicks, metrics.conversions, metrics.conversions_value FROM campaign WHERE campaign.status != 'REMOVED' \
    ORDER BY metrics.cost_micros DESC";

pub struct GoogleAdsClient {
    http: reqwest::Client,
    developer_token: String,
    customer_id: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchRow>,
}

#[derive(Debug, Deserialize)]
struct SearchRow {
    campaign: CampaignField,
    #[serde(default)]
    metrics: Metrics,
}

#[derive(Debug, Deserialize)]
struct CampaignField {
    id: String,
    name: String,
    #[serde(default)]
    status: String,
}

// The REST API encodes int64 fields as strings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Metrics {
    #[serde(default)]
    cost_micros: Option<String>,
    #[serde(default)]
    impressions: Option<String>,
    #[serde(default)]
    clicks: Option<String>,
    #[serde(default)]
    conversions: Option<f64>,
    #[serde(default)]
    conversions_value: Option<f64>,
}

fn int(value: Option<&str>) -> i64 { value.and_then(|v| v.parse().ok()).unwrap_or(0) }

fn decimal(value: Option<f64>) -> Decimal { value.and_then(|v| Decimal::try_from(v).ok()).unwrap_or_default() }

impl GoogleAdsClient {
    pub fn new(http: reqwest::Client, developer_token: String, customer_id: String, access_token: String) -> Self {
        Self { http, developer_token, customer_id: customer_id.replace('-', ""), access_token }
    }

    fn to_campaign(row: SearchRow) -> Campaign {
        let m = row.metrics;
        Campaign {
            id: row.campaign.id,
            name: row.campaign.name,
            platform: AdPlatformKind::GoogleAds,
            status: row.campaign.status,
            cost: Decimal::new(int(m.cost_micros.as_deref()), 6),
            impressions: int(m.impressions.as_deref()),
            clicks: int(m.clicks.as_deref()),
            conversions: decimal(m.conversions).round().to_i64().unwrap_or(0),
            conversions_value: decimal(m.conversions_value),
        }
    }
}

#[async_trait]
impl AdPlatform for GoogleAdsClient {
    fn kind(&self) -> AdPlatformKind { AdPlatformKind::GoogleAds }
    fn is_live(&self) -> bool { true }

    #[instrument(skip(self), fields(customer_id = %self.customer_id))]
    async fn fetch_campaigns(&self) -> Result<Vec<Campaign>, IntegrationError> {
        let response = self
            .http
            .post(format!("{API_BASE}/customers/{}/googleAds:search", self.customer_id))
            .bearer_auth(&self.access_token)
            .header("developer-token", &self.developer_token)
            .json(&serde_json::json!({ "query": CAMPAIGN_QUERY }))
            .send()
            .await?;
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Google Ads search failed");
            return Err(IntegrationError::Upstream { service: "google_ads", status: response.status().as_u16() });
        }
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| IntegrationError::Unexpected { service: "google_ads", reason: e.to_string() })?;
        Ok(body.results.into_iter().map(Self::to_campaign).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_search_rows() {
        let body: SearchResponse = serde_json::from_value(serde_json::json!({
            "results": [{
                "campaign": { "id": "42", "name": "Brand", "status": "ENABLED" },
                "metrics": { "costMicros": "12500000", "impressions": "1000", "clicks": "25", "conversions": 2.0, "conversionsValue": 60.5 }
            }]
        }))
        .unwrap();
        let campaign = GoogleAdsClient::to_campaign(body.results.into_iter().next().unwrap());
        assert_eq!(campaign.cost, Decimal::new(125, 1));
        assert_eq!(campaign.clicks, 25);
        assert_eq!(campaign.conversions, 2);
        assert_eq!(campaign.conversions_value, Decimal::new(605, 1));
    }
}
