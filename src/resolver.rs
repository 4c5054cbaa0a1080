//! Keyword-based column lookup used by the domain heuristics.

use crate::dataset::Catalog;

/// Keyword lists, highest priority first.
pub mod keywords {
    pub const REVENUE: &[&str] = &["revenue", "total", "amount"];
    pub const PRODUCT: &[&str] = &["product", "item"];
    pub const CATEGORY: &[&str] = &["category", "type"];
    pub const CUSTOMER: &[&str] = &["customer", "user"];
    pub const AGE: &[&str] = &["age"];
    pub const GENDER: &[&str] = &["gender", "sex"];
    pub const LOCATION: &[&str] = &["location", "city", "state", "region"];
    pub const DATE: &[&str] = &["date", "time", "created"];
    pub const RATING: &[&str] = &["rating", "score", "review"];
    pub const PAYMENT: &[&str] = &["payment", "method"];

    pub const PORTFOLIO_VALUE: &[&str] = &["value", "amount", "balance"];
    pub const ASSET: &[&str] = &["asset", "type", "category"];
    pub const RETURN: &[&str] = &["return", "yield", "performance"];

    pub const DEPARTMENT: &[&str] = &["department", "team", "division"];
    pub const PERFORMANCE: &[&str] = &["performance", "rating", "score"];
    pub const SALARY: &[&str] = &["salary", "compensation", "pay"];

    // Suggested charts use narrower lists than the insight metrics.
    pub const CHART_DATE: &[&str] = &["date", "time"];
    pub const CHART_LOCATION: &[&str] = &["location", "city", "state"];
    pub const CHART_VALUE: &[&str] = &["value", "amount"];
    pub const CHART_DEPARTMENT: &[&str] = &["department", "team"];
}

/// Return the first column whose lowercased name contains a keyword.
///
/// Keywords are tried in order; for each keyword the catalog is scanned in
/// column order, so an earlier keyword always beats an earlier column.
pub fn resolve<'a>(catalog: &'a Catalog, keywords: &[&str]) -> Option<&'a str> {
    let lowered: Vec<(String, &str)> = catalog
        .names()
        .map(|name| (name.to_lowercase(), name))
        .collect();
    keywords.iter().find_map(|keyword| {
        lowered
            .iter()
            .find(|(lower, _)| lower.contains(keyword))
            .map(|(_, name)| *name)
    })
}
