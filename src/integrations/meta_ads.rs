//! Meta Marketing (Graph) API client.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::instrument;

use super::{AdPlatform, AdPlatformKind, Campaign, IntegrationError};

const GRAPH_BASE: &str = "https://graph.facebook.com/v18.0";
const CAMPAIGN_FIELDS: &str = "id,name,status,insights{spend,impressions,clicks,actions,action_values}";

pub struct MetaAdsClient {
    http: reqwest::Client,
    access_token: String,
    ad_account_id: String,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct CampaignNode {
    id: String,
    name: String,
    #[serde(default)]
    status: String,
    insights: Option<Page<Insights>>,
}

// Graph returns every number as a string.
#[derive(Debug, Default, Deserialize)]
struct Insights {
    spend: Option<String>,
    impressions: Option<String>,
    clicks: Option<String>,
    #[serde(default)]
    actions: Vec<Action>,
    #[serde(default)]
    action_values: Vec<Action>,
}

#[derive(Debug, Deserialize)]
struct Action {
    action_type: String,
    value: String,
}

fn purchase(actions: &[Action]) -> Option<&str> {
    actions.iter().find(|a| a.action_type == "purchase").map(|a| a.value.as_str())
}

fn dec(value: Option<&str>) -> Decimal { value.and_then(|v| Decimal::from_str(v).ok()).unwrap_or_default() }

fn int(value: Option<&str>) -> i64 { value.and_then(|v| v.parse().ok()).unwrap_or(0) }

impl MetaAdsClient {
    pub fn new(http: reqwest::Client, access_token: String, ad_account_id: String) -> Self {
        let ad_account_id = ad_account_id.trim_start_matches("act_").to_string();
        Self { http, access_token, ad_account_id }
    }

    fn to_campaign(node: CampaignNode) -> Campaign {
        let insights = node.insights.and_then(|p| p.data.into_iter().next()).unwrap_or_default();
        Campaign {
            id: node.id,
            name: node.name,
            platform: AdPlatformKind::MetaAds,
            status: node.status,
            cost: dec(insights.spend.as_deref()),
            impressions: int(insights.impressions.as_deref()),
            clicks: int(insights.clicks.as_deref()),
            conversions: int(purchase(&insights.actions)),
            conversions_value: dec(purchase(&insights.action_values)),
        }
    }
}

#[async_trait]
impl AdPlatform for MetaAdsClient {
    fn kind(&self) -> AdPlatformKind { AdPlatformKind::MetaAds }
    fn is_live(&self) -> bool { true }

    #[instrument(skip(self), fields(ad_account = %self.ad_account_id))]
    async fn fetch_campaigns(&self) -> Result<Vec<Campaign>, IntegrationError> {
        let response = self
            .http
            .get(format!("{GRAPH_BASE}/act_{}/campaigns", self.ad_account_id))
            .query(&[("access_token", self.access_token.as_str()), ("fields", CAMPAIGN_FIELDS), ("limit", "100")])
            .send()
            .await?;
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Meta campaigns request failed");
            return Err(IntegrationError::Upstream { service: "meta_ads", status: response.status().as_u16() });
        }
        let page: Page<CampaignNode> = response
            .json()
            .await
            .map_err(|e| IntegrationError::Unexpected { service: "meta_ads", reason: e.to_string() })?;
        Ok(page.data.into_iter().map(Self::to_campaign).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_purchase_actions() {
        let page: Page<CampaignNode> = serde_json::from_value(serde_json::json!({
            "data": [{
                "id": "238", "name": "Lookalike", "status": "ACTIVE",
                "insights": { "data": [{
                    "spend": "40.25", "impressions": "12000", "clicks": "300",
                    "actions": [{ "action_type": "link_click", "value": "300" }, { "action_type": "purchase", "value": "4" }],
                    "action_values": [{ "action_type": "purchase", "value": "161.00" }]
                }]}
            }, { "id": "239", "name": "Paused", "status": "PAUSED" }]
        }))
        .unwrap();
        let campaigns: Vec<_> = page.data.into_iter().map(MetaAdsClient::to_campaign).collect();
        assert_eq!(campaigns[0].cost, Decimal::new(4025, 2));
        assert_eq!(campaigns[0].conversions, 4);
        assert_eq!(campaigns[0].roas(), Decimal::from(4));
        assert_eq!(campaigns[1].cost, Decimal::ZERO);
    }
}
