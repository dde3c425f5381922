//! Profit analytics over stored orders.
//!
//! Everything is computed on read from the line items, the current product
//! cost prices, the snapshotted shipping cost and the ad-spend ledger.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::db;
use crate::domain::aggregates::{Order, OrderStatus, Product};
use crate::domain::value_objects::{money, CountryCode, Grams};
use crate::error::{AppError, AppResult};
use crate::pricing::{self, profit, CostLine, PricingError, ProfitBreakdown, ProfitInput, ProfitStatus, ShipmentQuery, TaxTable};
use crate::state::AppState;

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// Years a reporting period may span.
    pub const YEARS: std::ops::RangeInclusive<i32> = 1970..=9999;

    pub fn new(start: NaiveDate, end: NaiveDate) -> AppResult<Self> {
        for date in [start, end] {
            if !Self::YEARS.contains(&date.year()) {
                return Err(AppError::bad_request(format!("date {date} is outside years {}..={}", Self::YEARS.start(), Self::YEARS.end())));
            }
        }
        if end < start {
            return Err(AppError::bad_request("end must not be before start"));
        }
        Ok(Self { start, end })
    }

    /// The `days` days up to and including `today`.
    pub fn trailing(today: NaiveDate, days: i64) -> AppResult<Self> {
        let back = u64::try_from(days.max(1) - 1).unwrap_or_default();
        let start = today.checked_sub_days(Days::new(back)).ok_or_else(|| AppError::bad_request(format!("date {today} is out of range")))?;
        Self::new(start, today)
    }

    /// Calendar month containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        let start = date.with_day(1).unwrap_or(date);
        let next = if start.month() == 12 {
            NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
        };
        Self { start, end: next.and_then(|n| n.pred_opt()).unwrap_or(date) }
    }

    pub fn days(&self) -> i64 { (self.end - self.start).num_days() + 1 }

    /// Half-open timestamp bounds `[start 00:00, day after end 00:00)`.
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let from = self.start.and_time(NaiveTime::MIN).and_utc();
        let until = self.end.checked_add_days(Days::new(1)).map_or(DateTime::<Utc>::MAX_UTC, |d| d.and_time(NaiveTime::MIN).and_utc());
        (from, until)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderProfit {
    pub order_id: Uuid,
    pub order_number: String,
    pub order_status: OrderStatus,
    #[serde(flatten)]
    pub breakdown: ProfitBreakdown,
    /// Month whose ad spend was shared out over its orders.
    pub attribution_period: Period,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductProfit {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub destination: CountryCode,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub unit_cost: Decimal,
    pub shipping_per_unit: Decimal,
    pub vat_rate: Decimal,
    pub profit_per_unit: Decimal,
    #[serde(flatten)]
    pub breakdown: ProfitBreakdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryRevenue {
    pub category: String,
    pub revenue: Decimal,
    pub units: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodAnalysis {
    pub period: Period,
    pub order_count: usize,
    #[serde(flatten)]
    pub breakdown: ProfitBreakdown,
    pub fixed_costs: Decimal,
    pub operating_profit: Decimal,
    pub average_order_value: Decimal,
    pub revenue_by_category: Vec<CategoryRevenue>,
    /// Lines whose product has no cost price; they count with zero cost.
    pub lines_missing_cost: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricChange {
    pub current: Decimal,
    pub previous: Decimal,
    pub absolute: Decimal,
    pub percentage: Option<Decimal>,
}

impl MetricChange {
    fn new(current: Decimal, previous: Decimal) -> Self {
        Self { current, previous, absolute: current - previous, percentage: profit::percentage_change(current, previous) }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodComparison {
    pub current: PeriodAnalysis,
    pub previous: PeriodAnalysis,
    pub changes: BTreeMap<&'static str, MetricChange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakEven {
    pub monthly_fixed_costs: Decimal,
    pub average_monthly_ad_spend: Decimal,
    pub average_gross_margin: Decimal,
    /// `None` while the gross margin is not positive.
    pub break_even_revenue: Option<Decimal>,
    pub average_monthly_revenue: Decimal,
    pub covered: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub status: String,
    pub orders: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub period: Period,
    pub orders: usize,
    pub revenue: Decimal,
    pub net_profit: Decimal,
    pub margin_percentage: Decimal,
    pub profit_status: ProfitStatus,
    pub customers: i64,
    pub active_products: i64,
    pub orders_by_status: Vec<StatusSummary>,
}

/// Loads every product the orders reference, archived ones included.
async fn products_for(state: &AppState, orders: &[Order]) -> AppResult<HashMap<Uuid, Product>> {
    let mut products = HashMap::new();
    let mut conn = state.db.acquire().await?;
    for item in orders.iter().flat_map(Order::items) {
        if products.contains_key(&item.product_id) {
            continue;
        }
        if let Some(p) = db::products::find(&mut conn, item.product_id).await? {
            products.insert(item.product_id, p);
        }
    }
    Ok(products)
}

fn cost_lines(order: &Order, products: &HashMap<Uuid, Product>, tax: &TaxTable) -> Vec<CostLine> {
    order
        .items()
        .iter()
        .map(|item| {
            let product = products.get(&item.product_id);
            CostLine {
                product_id: Some(item.product_id),
                label: product.map_or_else(|| item.product_name.clone(), |p| p.sku().to_string()),
                unit_price: Some(item.unit_price),
                unit_cost: product.and_then(Product::cost_price),
                quantity: item.quantity,
                vat_rate: tax.rate_for(Some(order.destination()), product.and_then(Product::category)),
            }
        })
        .collect()
}

/// Profit of one order with its share of the month's ad spend.
pub async fn order_profit(state: &AppState, order: &Order) -> AppResult<OrderProfit> {
    let products = products_for(state, std::slice::from_ref(order)).await?;
    let period = Period::month_of(order.created_at().date_naive());
    let ad_spend = if order.status() == OrderStatus::Cancelled {
        Decimal::ZERO
    } else {
        let (from, until) = period.bounds();
        let period_revenue = db::orders::revenue_in_period(&state.db, from, until).await?;
        let period_ad_spend = db::ad_spend::total(&state.db, period.start, period.end).await?;
        profit::attribute_ad_spend(order.revenue(), period_revenue, period_ad_spend)
    };
    let tax = super::orders::tax_table(state).await?;
    let input = ProfitInput { lines: cost_lines(order, &products, &tax), shipping_cost: order.shipping_cost(), ad_spend };
    Ok(OrderProfit {
        order_id: order.id(),
        order_number: order.order_number().to_string(),
        order_status: order.status(),
        breakdown: profit::calculate(&input)?,
        attribution_period: period,
    })
}

/// Profit of selling `quantity` units shipped one by one to `destination`.
pub async fn product_profit(
    state: &AppState,
    id: Uuid,
    destination: Option<CountryCode>,
    quantity: u32,
    ad_spend: Decimal,
) -> AppResult<ProductProfit> {
    let product = db::products::get(&state.db, id).await?.ok_or_else(|| AppError::not_found("Product"))?;
    let destination = destination.unwrap_or_else(|| state.settings.default_country.clone());
    let incomplete = |field| PricingError::IncompleteProductData { product: product.sku().to_string(), field };
    let unit_cost = product.cost_price().ok_or_else(|| incomplete("cost price"))?;
    let weight: Grams = product.weight().ok_or_else(|| incomplete("weight"))?;
    let quantity = quantity.max(1);

    let table = super::orders::shipping_table(state).await?;
    let shipping_per_unit = table.resolve(&ShipmentQuery::new(destination.clone(), weight))?.cost;
    let vat_rate = super::orders::tax_table(state).await?.rate_for(Some(&destination), product.category());
    let line = CostLine {
        product_id: Some(product.id()),
        label: product.sku().to_string(),
        unit_price: Some(product.price()),
        unit_cost: Some(unit_cost),
        quantity,
        vat_rate,
    };
    let input = ProfitInput { lines: vec![line], shipping_cost: shipping_per_unit * Decimal::from(quantity), ad_spend };
    let breakdown = profit::calculate(&input)?;
    Ok(ProductProfit {
        product_id: product.id(),
        sku: product.sku().to_string(),
        name: product.name().to_string(),
        destination,
        quantity,
        unit_price: product.price(),
        unit_cost,
        shipping_per_unit,
        vat_rate,
        profit_per_unit: money::round(breakdown.net_profit / Decimal::from(quantity)),
        breakdown,
    })
}

pub async fn analyze(state: &AppState, period: Period) -> AppResult<PeriodAnalysis> {
    let (from, until) = period.bounds();
    let orders = db::orders::list_in_period(&state.db, from, until).await?;
    let products = products_for(state, &orders).await?;
    let tax = super::orders::tax_table(state).await?;

    let (mut revenue, mut cogs, mut vat, mut shipping) = (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
    let mut missing = 0;
    let mut categories: BTreeMap<String, (Decimal, u64)> = BTreeMap::new();
    for order in &orders {
        shipping += order.shipping_cost();
        for line in cost_lines(order, &products, &tax) {
            let qty = Decimal::from(line.quantity);
            let line_revenue = line.unit_price.unwrap_or_default() * qty;
            revenue += line_revenue;
            vat += line_revenue * line.vat_rate;
            match line.unit_cost {
                Some(cost) => cogs += cost * qty,
                None => missing += 1,
            }
            let category = line
                .product_id
                .and_then(|id| products.get(&id))
                .and_then(Product::category)
                .unwrap_or("uncategorized")
                .to_string();
            let entry = categories.entry(category).or_default();
            entry.0 += line_revenue;
            entry.1 += u64::from(line.quantity);
        }
    }
    if missing > 0 {
        tracing::warn!(lines = missing, start = %period.start, end = %period.end, "order lines without cost price counted at zero cost");
    }

    let ad_spend = db::ad_spend::total(&state.db, period.start, period.end).await?;
    let breakdown = profit::breakdown(revenue, cogs, shipping, vat, ad_spend);
    let fixed_costs = pricing::fixed_costs::allocate_all(&db::fixed_costs::list(&state.db, true).await?, period.start, period.end);
    let mut revenue_by_category: Vec<_> = categories
        .into_iter()
        .map(|(category, (revenue, units))| CategoryRevenue { category, revenue: money::round(revenue), units })
        .collect();
    revenue_by_category.sort_by(|a, b| b.revenue.cmp(&a.revenue));

    Ok(PeriodAnalysis {
        period,
        order_count: orders.len(),
        average_order_value: if orders.is_empty() { Decimal::ZERO } else { money::round(breakdown.revenue / Decimal::from(orders.len())) },
        operating_profit: breakdown.net_profit - fixed_costs,
        fixed_costs,
        breakdown,
        revenue_by_category,
        lines_missing_cost: missing,
    })
}

pub async fn compare(state: &AppState, current: Period, previous: Period) -> AppResult<PeriodComparison> {
    let current = analyze(state, current).await?;
    let previous = analyze(state, previous).await?;
    let metrics: [(&'static str, fn(&PeriodAnalysis) -> Decimal); 7] = [
        ("revenue", |a| a.breakdown.revenue),
        ("cost_of_goods", |a| a.breakdown.cost_of_goods),
        ("ad_spend", |a| a.breakdown.ad_spend),
        ("net_profit", |a| a.breakdown.net_profit),
        ("operating_profit", |a| a.operating_profit),
        ("margin_percentage", |a| a.breakdown.margin_percentage),
        ("order_count", |a| Decimal::from(a.order_count)),
    ];
    let changes = metrics.into_iter().map(|(name, get)| (name, MetricChange::new(get(&current), get(&previous)))).collect();
    Ok(PeriodComparison { current, previous, changes })
}

/// Monthly revenue needed to cover fixed costs and the average ad budget,
/// based on the last three months.
pub async fn break_even(state: &AppState, today: NaiveDate) -> AppResult<BreakEven> {
    let window = Period::trailing(today, 90)?;
    let months = Decimal::from(3);
    let analysis = analyze(state, window).await?;
    let monthly_fixed_costs = money::round(db::fixed_costs::list(&state.db, true).await?.iter().map(|c| c.monthly_amount()).sum());
    let average_monthly_ad_spend = money::round(analysis.breakdown.ad_spend / months);
    let average_gross_margin = profit::margin(analysis.breakdown.gross_profit, analysis.breakdown.revenue);
    let break_even_revenue = profit::break_even_revenue(monthly_fixed_costs + average_monthly_ad_spend, average_gross_margin);
    let average_monthly_revenue = money::round(analysis.breakdown.revenue / months);
    Ok(BreakEven {
        covered: break_even_revenue.is_some_and(|b| average_monthly_revenue >= b),
        monthly_fixed_costs,
        average_monthly_ad_spend,
        average_gross_margin,
        break_even_revenue,
        average_monthly_revenue,
    })
}

pub async fn dashboard(state: &AppState, today: NaiveDate) -> AppResult<Dashboard> {
    let period = Period::trailing(today, 30)?;
    let analysis = analyze(state, period).await?;
    let (_, customers) = db::customers::list(&state.db, &Default::default(), db::Page::new(Some(1), Some(1)), state.settings.vip_threshold).await?;
    let active = db::products::ProductFilter { status: Some(crate::domain::aggregates::ProductStatus::Active), ..Default::default() };
    let (_, active_products) = db::products::list(&state.db, &active, db::Page::new(Some(1), Some(1))).await?;
    let orders_by_status = db::orders::status_counts(&state.db)
        .await?
        .into_iter()
        .map(|s| StatusSummary { status: s.status, orders: s.orders, revenue: s.revenue })
        .collect();
    Ok(Dashboard {
        period,
        orders: analysis.order_count,
        revenue: analysis.breakdown.revenue,
        net_profit: analysis.breakdown.net_profit,
        margin_percentage: analysis.breakdown.margin_percentage,
        profit_status: analysis.breakdown.status,
        customers,
        active_products,
        orders_by_status,
    })
}
