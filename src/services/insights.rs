//! Rule-based business insights.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::profit::{self, Period};
use crate::db;
use crate::domain::aggregates::Product;
use crate::error::AppResult;
use crate::integrations::{AdPlatformKind, Campaign};
use crate::pricing::ProfitStatus;
use crate::state::AppState;

/// Product gross margin below this percentage is flagged.
const LOW_MARGIN: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind { LowMargin, MissingCost, UnprofitableCampaign, VipCustomer, ProfitStatus }

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity { Critical, Warning, Info }

#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    /// Product, campaign or customer the insight is about.
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightsReport {
    pub generated_at: DateTime<Utc>,
    pub period: Period,
    pub profit_status: ProfitStatus,
    pub margin_percentage: Decimal,
    pub insights: Vec<Insight>,
}

fn product_insight(product: &Product) -> Option<Insight> {
    let subject = Some(product.sku().to_string());
    let Some(cost) = product.cost_price() else {
        return Some(Insight {
            kind: InsightKind::MissingCost,
            severity: Severity::Warning,
            title: format!("{} has no cost price", product.name()),
            message: "Profit for orders containing this product cannot be calculated until a cost price is set.".into(),
            subject,
        });
    };
    let margin = crate::pricing::profit::margin(product.price() - cost, product.price());
    (margin < Decimal::from(LOW_MARGIN)).then(|| Insight {
        kind: InsightKind::LowMargin,
        severity: if margin <= Decimal::ZERO { Severity::Critical } else { Severity::Warning },
        title: format!("{} has a {margin}% margin", product.name()),
        message: format!("Gross margin is below {LOW_MARGIN}%. Review the sale price ({}) or the cost price ({cost}).", product.price()),
        subject,
    })
}

fn campaign_insight(campaign: &Campaign) -> Option<Insight> {
    (campaign.cost > Decimal::ZERO && campaign.roas() < Decimal::ONE).then(|| Insight {
        kind: InsightKind::UnprofitableCampaign,
        severity: Severity::Critical,
        title: format!("{} returns less than it costs", campaign.name),
        message: format!(
            "{} campaign spent {} for {} in conversion value (ROAS {}).",
            campaign.platform.as_str(), campaign.cost, campaign.conversions_value, campaign.roas()
        ),
        subject: Some(campaign.id.clone()),
    })
}

fn status_message(status: ProfitStatus) -> &'static str {
    match status {
        ProfitStatus::Excellent => "Net margin is 50% or more.",
        ProfitStatus::Good => "Net margin is between 30% and 50%.",
        ProfitStatus::Average => "Net margin is between 15% and 30%.",
        ProfitStatus::Low => "Net margin is between 5% and 15%; check shipping and ad costs.",
        ProfitStatus::Loss => "Net margin is below 5%; the shop is close to or below break-even.",
    }
}

pub async fn generate(state: &AppState, today: NaiveDate) -> AppResult<InsightsReport> {
    let period = Period::trailing(today, 30)?;
    let analysis = profit::analyze(state, period).await?;
    let status = analysis.breakdown.status;

    let mut insights = vec![Insight {
        kind: InsightKind::ProfitStatus,
        severity: match status {
            ProfitStatus::Loss => Severity::Critical,
            ProfitStatus::Low => Severity::Warning,
            _ => Severity::Info,
        },
        title: format!("Profit status: {}", status.as_str()),
        message: status_message(status).into(),
        subject: None,
    }];

    insights.extend(db::products::list_active(&state.db).await?.iter().filter_map(product_insight));
    for kind in AdPlatformKind::ALL {
        let campaigns = state.integrations.ad_platform(kind).fetch_campaigns().await?;
        insights.extend(campaigns.iter().filter_map(campaign_insight));
    }
    for vip in db::customers::list_vip(&state.db, state.settings.vip_threshold, 10).await? {
        insights.push(Insight {
            kind: InsightKind::VipCustomer,
            severity: Severity::Info,
            title: format!("{} is a VIP customer", vip.customer.full_name()),
            message: format!("{} orders, {} spent in total.", vip.total_orders, vip.total_spent),
            subject: Some(vip.customer.id.to_string()),
        });
    }
    insights.sort_by_key(|i| i.severity);

    Ok(InsightsReport {
        generated_at: Utc::now(),
        period,
        profit_status: status,
        margin_percentage: analysis.breakdown.margin_percentage,
        insights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::orders::tests::product;
    use crate::state::tests::test_state;

    #[tokio::test]
    async fn test_flags_margin_cost_and_campaigns() {
        let state = test_state().await;
        product(&state, "THIN", 1000, Some(900), Some(100), 1).await;
        product(&state, "NOCOST", 1000, None, Some(100), 1).await;
        product(&state, "HEALTHY", 1000, Some(400), Some(100), 1).await;

        let report = generate(&state, Utc::now().date_naive()).await.unwrap();
        let subjects = |kind| report.insights.iter().filter(|i| i.kind == kind).filter_map(|i| i.subject.clone()).collect::<Vec<_>>();
        assert_eq!(subjects(InsightKind::LowMargin), vec!["THIN".to_string()]);
        assert_eq!(subjects(InsightKind::MissingCost), vec!["NOCOST".to_string()]);
        assert_eq!(subjects(InsightKind::UnprofitableCampaign), vec!["g-1003".to_string()]);
        assert_eq!(report.profit_status, ProfitStatus::Loss);
        assert_eq!(report.insights[0].severity, Severity::Critical);
    }
}
