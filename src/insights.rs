//! Domain detection, heuristic insight bundles and suggested charts.
//!
//! Everything here is keyword driven: columns are located with
//! [`crate::resolver::resolve`] and a metric is left out whenever the column it
//! needs cannot be found or holds no usable values.

use chrono::Datelike;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::chart_data::{Aggregate, ChartSpec, ChartType};
use crate::dataset::{Catalog, Row};
use crate::resolver::{keywords, resolve};
use crate::schema::parse_naive_datetime_str;
use crate::statistics::{self, format_currency};
use crate::value::Value;

const TOP_N: usize = 5;
const GENERAL_AVERAGED_COLUMNS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Ecommerce,
    Financial,
    Hr,
    General,
}

impl Domain {
    /// Heading shown with the domain's insight bundle.
    pub fn title(&self) -> &'static str {
        match self {
            Domain::Ecommerce => "E-commerce Analytics",
            Domain::Financial => "Financial Portfolio Analytics",
            Domain::Hr => "Human Resources Analytics",
            Domain::General => "General Data Analytics",
        }
    }

    pub fn recommendations(&self) -> &'static [&'static str] {
        match self {
            Domain::Ecommerce => &[
                "Focus on top-performing product categories for inventory planning",
                "Analyze customer demographics for targeted marketing campaigns",
                "Monitor monthly revenue trends for seasonal patterns",
                "Optimize payment methods based on customer preferences",
            ],
            Domain::Financial => &[
                "Diversify portfolio across different asset classes",
                "Monitor return performance regularly",
                "Rebalance portfolio based on risk tolerance",
            ],
            Domain::Hr => &[
                "Focus on employee development programs",
                "Analyze performance trends by department",
                "Review compensation structures for fairness",
            ],
            Domain::General => &[
                "Explore relationships between numeric variables",
                "Analyze categorical data distributions",
                "Look for patterns and outliers in the data",
            ],
        }
    }
}

/// Detection keywords per domain, in priority order.
const DOMAIN_RULES: &[(Domain, &[&str])] = &[
    (
        Domain::Ecommerce,
        &[
            "revenue", "price", "product", "customer", "order", "sales", "quantity", "payment",
            "rating", "discount",
        ],
    ),
    (
        Domain::Financial,
        &[
            "portfolio",
            "investment",
            "return",
            "dividend",
            "stock",
            "bond",
            "asset",
            "balance",
        ],
    ),
    (
        Domain::Hr,
        &[
            "employee",
            "performance",
            "salary",
            "department",
            "manager",
            "hire",
            "evaluation",
        ],
    ),
];

/// Classify a dataset by its column names. The first domain with any keyword
/// hit wins; domains are never combined.
pub fn detect_domain(catalog: &Catalog) -> Domain {
    let joined = catalog
        .names()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");
    DOMAIN_RULES
        .iter()
        .find(|(_, words)| words.iter().any(|w| joined.contains(w)))
        .map(|(domain, _)| *domain)
        .unwrap_or(Domain::General)
}

/// Category breakdown: revenue sums when a revenue column exists, else counts.
///
/// `Count` is listed first so stored counts read back as counts; revenue sums
/// always serialize as floats and never match it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryPerformance {
    Count(IndexMap<String, usize>),
    Revenue(IndexMap<String, f64>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EcommerceMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_revenue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_order_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_products: Option<IndexMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_performance: Option<CategoryPerformance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_customer_age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_gender_distribution: Option<IndexMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_locations: Option<IndexMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_growth_rate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_methods: Option<IndexMap<String, usize>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_portfolio_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_allocation: Option<IndexMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_return: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HrMetrics {
    pub total_employees: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_distribution: Option<IndexMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_performance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_salary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneralMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_columns: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categorical_columns: Option<usize>,
    /// `<column>_average` for the leading numeric columns.
    #[serde(flatten)]
    pub column_averages: IndexMap<String, String>,
}

/// Metrics computed for one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainMetrics {
    Ecommerce(EcommerceMetrics),
    Financial(FinancialMetrics),
    Hr(HrMetrics),
    General(GeneralMetrics),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trends {
    /// Revenue per `YYYY-MM`, oldest month first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_revenue: Option<IndexMap<String, f64>>,
}

/// Insight bundle computed once at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    /// Domain heading, e.g. "E-commerce Analytics".
    #[serde(rename = "domain")]
    pub title: String,
    pub key_metrics: DomainMetrics,
    pub trends: Trends,
    pub recommendations: Vec<String>,
}

/// Build the insight bundle for `domain`.
pub fn generate_insights(rows: &[Row], catalog: &Catalog, domain: Domain) -> Insights {
    let mut trends = Trends::default();
    let key_metrics = if rows.is_empty() {
        empty_metrics(domain)
    } else {
        match domain {
            Domain::Ecommerce => {
                DomainMetrics::Ecommerce(ecommerce_metrics(rows, catalog, &mut trends))
            }
            Domain::Financial => DomainMetrics::Financial(financial_metrics(rows, catalog)),
            Domain::Hr => DomainMetrics::Hr(hr_metrics(rows, catalog)),
            Domain::General => DomainMetrics::General(general_metrics(rows, catalog)),
        }
    };
    debug!(?domain, rows = rows.len(), "generated insights");

    Insights {
        title: domain.title().to_string(),
        key_metrics,
        trends,
        recommendations: domain
            .recommendations()
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

fn empty_metrics(domain: Domain) -> DomainMetrics {
    match domain {
        Domain::Ecommerce => DomainMetrics::Ecommerce(EcommerceMetrics::default()),
        Domain::Financial => DomainMetrics::Financial(FinancialMetrics::default()),
        Domain::Hr => DomainMetrics::Hr(HrMetrics::default()),
        Domain::General => DomainMetrics::General(GeneralMetrics::default()),
    }
}

/// Mean of the numeric cells of `column`, if it has any.
fn column_mean(rows: &[Row], column: &str) -> Option<f64> {
    statistics::mean(&statistics::numeric_values(rows, column))
}

/// Sum of the numeric cells of `column`, if it has any.
fn column_sum(rows: &[Row], column: &str) -> Option<f64> {
    let values = statistics::numeric_values(rows, column);
    (!values.is_empty()).then(|| statistics::sum(&values))
}

/// Non-missing value counts keyed by display text, optionally truncated.
fn counts(rows: &[Row], column: &str, top: Option<usize>) -> Option<IndexMap<String, usize>> {
    let counted: IndexMap<String, usize> = statistics::value_counts(rows, column)
        .into_iter()
        .filter(|(value, _)| !value.is_missing())
        .take(top.unwrap_or(usize::MAX))
        .map(|(value, n)| (value.to_string(), n))
        .collect();
    (!counted.is_empty()).then_some(counted)
}

fn ecommerce_metrics(rows: &[Row], catalog: &Catalog, trends: &mut Trends) -> EcommerceMetrics {
    let mut metrics = EcommerceMetrics::default();

    let revenue = resolve(catalog, keywords::REVENUE);
    if let Some(col) = revenue {
        metrics.total_revenue = column_sum(rows, col).map(format_currency);
        metrics.average_order_value = column_mean(rows, col).map(|v| format!("${:.2}", v));
    }

    if let Some(col) = resolve(catalog, keywords::PRODUCT) {
        metrics.top_products = counts(rows, col, Some(TOP_N));
    }

    if let Some(col) = resolve(catalog, keywords::CATEGORY) {
        metrics.category_performance = match revenue {
            Some(rev) => {
                let mut sums = statistics::grouped_sum(rows, col, rev);
                sums.retain(|(key, _)| !key.is_empty());
                sums.sort_by(|a, b| b.1.total_cmp(&a.1));
                let top: IndexMap<String, f64> = sums.into_iter().take(TOP_N).collect();
                (!top.is_empty()).then_some(CategoryPerformance::Revenue(top))
            }
            None => counts(rows, col, Some(TOP_N)).map(CategoryPerformance::Count),
        };
    }

    if let Some(col) = resolve(catalog, keywords::AGE) {
        metrics.average_customer_age = column_mean(rows, col).map(|v| format!("{:.1} years", v));
    }
    if let Some(col) = resolve(catalog, keywords::GENDER) {
        metrics.customer_gender_distribution = counts(rows, col, None);
    }
    if let Some(col) = resolve(catalog, keywords::LOCATION) {
        metrics.top_locations = counts(rows, col, Some(TOP_N));
    }

    if let (Some(date_col), Some(rev)) = (resolve(catalog, keywords::DATE), revenue) {
        if let Some(monthly) = monthly_totals(rows, date_col, rev) {
            metrics.revenue_growth_rate = growth_rate(&monthly).map(|g| format!("{:.1}%", g));
            trends.monthly_revenue = Some(monthly);
        }
    }

    if let Some(col) = resolve(catalog, keywords::RATING) {
        metrics.average_rating = column_mean(rows, col).map(|v| format!("{:.2}/5", v));
    }
    if let Some(col) = resolve(catalog, keywords::PAYMENT) {
        metrics.payment_methods = counts(rows, col, None);
    }

    metrics
}

/// Sum `value_column` per calendar month of `date_column`.
///
/// Rows with an empty date are skipped. Returns None if any other date fails
/// to parse, since the bucketing would be incomplete.
fn monthly_totals(
    rows: &[Row],
    date_column: &str,
    value_column: &str,
) -> Option<IndexMap<String, f64>> {
    let mut months: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for row in rows {
        let Some(date) = row.get(date_column).filter(|v| !v.is_missing()) else {
            continue;
        };
        let parsed = parse_naive_datetime_str(&date.to_string())?;
        let amount = row
            .get(value_column)
            .and_then(Value::as_number)
            .unwrap_or(0.0);
        *months.entry((parsed.year(), parsed.month())).or_insert(0.0) += amount;
    }
    if months.is_empty() {
        return None;
    }
    Some(
        months
            .into_iter()
            .map(|((year, month), total)| (format!("{:04}-{:02}", year, month), total))
            .collect(),
    )
}

/// Percent change from the first to the last month.
fn growth_rate(monthly: &IndexMap<String, f64>) -> Option<f64> {
    if monthly.len() < 2 {
        return None;
    }
    let (_, first) = monthly.first()?;
    let (_, last) = monthly.last()?;
    if *first == 0.0 {
        return None;
    }
    Some((last - first) / first * 100.0)
}

fn financial_metrics(rows: &[Row], catalog: &Catalog) -> FinancialMetrics {
    let mut metrics = FinancialMetrics::default();

    let value = resolve(catalog, keywords::PORTFOLIO_VALUE);
    if let Some(col) = value {
        metrics.total_portfolio_value = column_sum(rows, col).map(format_currency);
    }
    if let (Some(asset), Some(value)) = (resolve(catalog, keywords::ASSET), value) {
        let allocation: IndexMap<String, f64> = statistics::grouped_sum(rows, asset, value)
            .into_iter()
            .filter(|(key, _)| !key.is_empty())
            .collect();
        metrics.asset_allocation = (!allocation.is_empty()).then_some(allocation);
    }
    if let Some(col) = resolve(catalog, keywords::RETURN) {
        metrics.average_return = column_mean(rows, col).map(|v| format!("{:.2}%", v));
    }

    metrics
}

fn hr_metrics(rows: &[Row], catalog: &Catalog) -> HrMetrics {
    let mut metrics = HrMetrics {
        total_employees: rows.len(),
        ..HrMetrics::default()
    };

    if let Some(col) = resolve(catalog, keywords::DEPARTMENT) {
        metrics.department_distribution = counts(rows, col, None);
    }
    if let Some(col) = resolve(catalog, keywords::PERFORMANCE) {
        metrics.average_performance = column_mean(rows, col).map(|v| format!("{:.2}", v));
    }
    if let Some(col) = resolve(catalog, keywords::SALARY) {
        metrics.average_salary = column_mean(rows, col).map(format_currency);
    }

    metrics
}

fn general_metrics(rows: &[Row], catalog: &Catalog) -> GeneralMetrics {
    let mut metrics = GeneralMetrics::default();

    let numeric: Vec<&str> = catalog.numeric().map(|c| c.name.as_str()).collect();
    if !numeric.is_empty() {
        metrics.numeric_columns = Some(numeric.len());
        for col in numeric.iter().take(GENERAL_AVERAGED_COLUMNS) {
            if let Some(mean) = column_mean(rows, col) {
                metrics
                    .column_averages
                    .insert(format!("{}_average", col), format!("{:.2}", mean));
            }
        }
    }

    let categorical = catalog.categorical().count();
    if categorical > 0 {
        metrics.categorical_columns = Some(categorical);
    }

    metrics
}

/// A chart proposed for a freshly ingested dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedChart {
    pub title: String,
    #[serde(flatten)]
    pub spec: ChartSpec,
}

impl SuggestedChart {
    fn new(title: &str, spec: ChartSpec) -> Self {
        Self {
            title: title.to_string(),
            spec,
        }
    }
}

/// Domain-specific chart candidates whose columns all resolve, in fixed order.
pub fn suggested_charts(domain: Domain, catalog: &Catalog) -> Vec<SuggestedChart> {
    let mut suggestions = Vec::new();

    match domain {
        Domain::Ecommerce => {
            let revenue = resolve(catalog, keywords::REVENUE);
            if let (Some(date), Some(rev)) = (resolve(catalog, keywords::CHART_DATE), revenue) {
                suggestions.push(SuggestedChart::new(
                    "Revenue Trends Over Time",
                    ChartSpec::new(ChartType::Line, date)
                        .with_y_axis(rev)
                        .with_aggregate(Aggregate::Sum),
                ));
            }
            if let (Some(category), Some(rev)) = (resolve(catalog, keywords::CATEGORY), revenue) {
                suggestions.push(SuggestedChart::new(
                    "Revenue by Product Category",
                    ChartSpec::new(ChartType::Bar, category)
                        .with_y_axis(rev)
                        .with_aggregate(Aggregate::Sum),
                ));
            }
            if let Some(location) = resolve(catalog, keywords::CHART_LOCATION) {
                suggestions.push(SuggestedChart::new(
                    "Customer Distribution by Location",
                    ChartSpec::new(ChartType::Pie, location),
                ));
            }
            if let Some(payment) = resolve(catalog, keywords::PAYMENT) {
                suggestions.push(SuggestedChart::new(
                    "Payment Method Distribution",
                    ChartSpec::new(ChartType::Pie, payment),
                ));
            }
        }
        Domain::Financial => {
            if let (Some(asset), Some(value)) = (
                resolve(catalog, keywords::ASSET),
                resolve(catalog, keywords::CHART_VALUE),
            ) {
                suggestions.push(SuggestedChart::new(
                    "Portfolio Asset Allocation",
                    ChartSpec::new(ChartType::Pie, asset)
                        .with_y_axis(value)
                        .with_aggregate(Aggregate::Sum),
                ));
            }
        }
        Domain::Hr => {
            if let Some(department) = resolve(catalog, keywords::CHART_DEPARTMENT) {
                suggestions.push(SuggestedChart::new(
                    "Employee Distribution by Department",
                    ChartSpec::new(ChartType::Bar, department),
                ));
            }
        }
        Domain::General => {}
    }

    suggestions
}
