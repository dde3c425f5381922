//! Order and product profit.
//!
//! Components are summed with exact decimals and rounded once each at the
//! output; the net profit is then derived from the rounded components so that
//! `net = revenue − cogs − shipping − ad_spend` holds to the cent.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::PricingError;
use crate::domain::value_objects::money;

/// One order line as the calculator sees it.
#[derive(Clone, Debug)]
pub struct CostLine {
    pub product_id: Option<Uuid>,
    pub label: String,
    pub unit_price: Option<Decimal>,
    pub unit_cost: Option<Decimal>,
    pub quantity: u32,
    pub vat_rate: Decimal,
}

#[derive(Clone, Debug, Default)]
pub struct ProfitInput {
    pub lines: Vec<CostLine>,
    pub shipping_cost: Decimal,
    pub ad_spend: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProfitBreakdown {
    pub revenue: Decimal,
    pub cost_of_goods: Decimal,
    pub shipping_cost: Decimal,
    pub vat_amount: Decimal,
    pub ad_spend: Decimal,
    pub gross_profit: Decimal,
    pub net_profit: Decimal,
    pub margin_percentage: Decimal,
    pub status: ProfitStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfitStatus { Excellent, Good, Average, Low, Loss }

impl ProfitStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Excellent => "excellent", Self::Good => "good", Self::Average => "average", Self::Low => "low", Self::Loss => "loss" }
    }

    pub fn from_margin(margin: Decimal) -> Self {
        if margin >= Decimal::from(50) { Self::Excellent }
        else if margin >= Decimal::from(30) { Self::Good }
        else if margin >= Decimal::from(15) { Self::Average }
        else if margin >= Decimal::from(5) { Self::Low }
        else { Self::Loss }
    }
}

const OVERFLOW: PricingError = PricingError::AmountOutOfRange("order totals");

/// Totals above this cannot be combined without overflowing a `Decimal`.
const LIMIT: Decimal = Decimal::from_parts(0, 0, 1 << 28, false, 0);

pub fn calculate(input: &ProfitInput) -> Result<ProfitBreakdown, PricingError> {
    let mut revenue = Decimal::ZERO;
    let mut cogs = Decimal::ZERO;
    let mut vat = Decimal::ZERO;
    for line in &input.lines {
        let incomplete = |field| PricingError::IncompleteProductData { product: line.label.clone(), field };
        let price = line.unit_price.ok_or_else(|| incomplete("price"))?;
        let cost = line.unit_cost.ok_or_else(|| incomplete("cost price"))?;
        let qty = Decimal::from(line.quantity);
        let line_revenue = price.checked_mul(qty).ok_or(OVERFLOW)?;
        revenue = revenue.checked_add(line_revenue).ok_or(OVERFLOW)?;
        cogs = cost.checked_mul(qty).and_then(|c| cogs.checked_add(c)).ok_or(OVERFLOW)?;
        vat = line_revenue.checked_mul(line.vat_rate).and_then(|v| vat.checked_add(v)).ok_or(OVERFLOW)?;
    }
    // Leave headroom for the subtractions and the margin in `breakdown`.
    for total in [revenue, cogs, vat, input.shipping_cost, input.ad_spend] {
        if total.abs() > LIMIT {
            return Err(OVERFLOW);
        }
    }
    Ok(breakdown(revenue, cogs, input.shipping_cost, vat, input.ad_spend))
}

/// Rounds each component once and derives profit and margin from them.
pub fn breakdown(revenue: Decimal, cogs: Decimal, shipping: Decimal, vat: Decimal, ad_spend: Decimal) -> ProfitBreakdown {
    let revenue = money::round(revenue);
    let cost_of_goods = money::round(cogs);
    let shipping_cost = money::round(shipping);
    let ad_spend = money::round(ad_spend);
    let gross_profit = revenue - cost_of_goods;
    let net_profit = gross_profit - shipping_cost - ad_spend;
    let margin_percentage = margin(net_profit, revenue);
    ProfitBreakdown {
        revenue, cost_of_goods, shipping_cost, vat_amount: money::round(vat), ad_spend,
        gross_profit, net_profit, margin_percentage, status: ProfitStatus::from_margin(margin_percentage),
    }
}

/// `profit / revenue × 100`, two decimals; zero revenue has zero margin.
/// Ratios too large for a `Decimal` saturate.
pub fn margin(profit: Decimal, revenue: Decimal) -> Decimal {
    if revenue.is_zero() { return Decimal::ZERO; }
    match profit.checked_div(revenue).and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED)) {
        Some(m) => money::round(m),
        None if profit.is_sign_negative() != revenue.is_sign_negative() => Decimal::MIN,
        None => Decimal::MAX,
    }
}

/// Proportional share of the period's ad spend for one order.
pub fn attribute_ad_spend(order_revenue: Decimal, period_revenue: Decimal, period_ad_spend: Decimal) -> Decimal {
    if period_revenue <= Decimal::ZERO { return Decimal::ZERO; }
    order_revenue / period_revenue * period_ad_spend
}

/// Monthly revenue needed to cover fixed costs and ad spend at the given gross margin.
pub fn break_even_revenue(monthly_costs: Decimal, gross_margin_percentage: Decimal) -> Option<Decimal> {
    if gross_margin_percentage <= Decimal::ZERO { return None; }
    Some(money::round(monthly_costs / (gross_margin_percentage / Decimal::ONE_HUNDRED)))
}

/// Relative change in percent; `None` when the baseline is zero.
pub fn percentage_change(current: Decimal, previous: Decimal) -> Option<Decimal> {
    if previous.is_zero() { return None; }
    Some(money::round((current - previous) / previous.abs() * Decimal::ONE_HUNDRED))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, cost: Option<i64>, qty: u32) -> CostLine {
        CostLine {
            product_id: None, label: "Widget".into(), unit_price: Some(Decimal::new(price, 2)),
            unit_cost: cost.map(|c| Decimal::new(c, 2)), quantity: qty, vat_rate: Decimal::new(21, 2),
        }
    }

    #[test]
    fn test_reference_scenario() {
        let input = ProfitInput { lines: vec![line(10000, Some(6000), 1)], shipping_cost: Decimal::new(595, 2), ad_spend: Decimal::new(10, 0) };
        let b = calculate(&input).unwrap();
        assert_eq!(b.net_profit, Decimal::new(2405, 2));
        assert_eq!(b.margin_percentage, Decimal::new(2405, 2));
        assert_eq!(b.vat_amount, Decimal::new(21, 0));
        assert_eq!(b.gross_profit, Decimal::new(40, 0));
        assert_eq!(b.status, ProfitStatus::Average);
    }

    #[test]
    fn test_identity_holds_with_fractional_ad_share() {
        let share = attribute_ad_spend(Decimal::new(3335, 2), Decimal::new(100, 0), Decimal::new(10, 0));
        let input = ProfitInput { lines: vec![line(3335, Some(1000), 1)], shipping_cost: Decimal::new(495, 2), ad_spend: share };
        let b = calculate(&input).unwrap();
        assert_eq!(b.net_profit, b.revenue - b.cost_of_goods - b.shipping_cost - b.ad_spend);
        assert_eq!(b.ad_spend, Decimal::new(334, 2));
    }

    #[test]
    fn test_missing_cost_fails_whole_calculation() {
        let input = ProfitInput { lines: vec![line(1000, Some(500), 1), line(2000, None, 2)], ..Default::default() };
        let err = calculate(&input).unwrap_err();
        assert!(matches!(err, PricingError::IncompleteProductData { field: "cost price", .. }));
    }

    #[test]
    fn test_no_per_line_rounding() {
        // 3 × 0.335 = 1.005 → 1.01 once; per-line rounding would give 1.02.
        let input = ProfitInput { lines: vec![CostLine { unit_cost: Some(Decimal::new(335, 3)), ..line(200, None, 3) }], ..Default::default() };
        assert_eq!(calculate(&input).unwrap().cost_of_goods, Decimal::new(101, 2));
    }

    #[test]
    fn test_oversized_totals_are_errors() {
        let huge = CostLine { unit_price: Some(Decimal::new(5, 0) * Decimal::from(10_i64.pow(18)) * Decimal::from(10_000_000_000_i64)), ..line(100, Some(1), 2) };
        let err = calculate(&ProfitInput { lines: vec![huge], ..Default::default() }).unwrap_err();
        assert!(matches!(err, PricingError::AmountOutOfRange(_)));
        let input = ProfitInput { lines: vec![line(100, Some(50), u32::MAX)], ..Default::default() };
        assert!(calculate(&input).is_ok());
    }

    #[test]
    fn test_attribution_and_margin_edges() {
        assert_eq!(attribute_ad_spend(Decimal::ONE, Decimal::ZERO, Decimal::from(100)), Decimal::ZERO);
        assert_eq!(attribute_ad_spend(Decimal::from(25), Decimal::from(100), Decimal::from(80)), Decimal::from(20));
        assert_eq!(margin(Decimal::from(5), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(margin(-Decimal::MAX, Decimal::new(1, 2)), Decimal::MIN);
        assert_eq!(ProfitStatus::from_margin(Decimal::from(-3)), ProfitStatus::Loss);
        assert_eq!(break_even_revenue(Decimal::from(1000), Decimal::from(40)), Some(Decimal::from(2500)));
        assert_eq!(percentage_change(Decimal::from(150), Decimal::from(100)), Some(Decimal::from(50)));
        assert_eq!(percentage_change(Decimal::from(150), Decimal::ZERO), None);
    }
}
