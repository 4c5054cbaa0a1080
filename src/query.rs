//! Row pipeline: filter, search, sort and paginate.
//!
//! Every stage is a pure function over an ordered row sequence. [`execute`]
//! runs them in the fixed order filter → search → sort → paginate.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::dataset::{Catalog, Dataset, Row};
use crate::error::EngineError;
use crate::value::Value;

pub use tabviz_cli::SortOrder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Ne,
    Contains,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Contains => "contains",
            FilterOperator::Gt => "gt",
            FilterOperator::Lt => "lt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lte => "lte",
            FilterOperator::In => "in",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eq" => Ok(FilterOperator::Eq),
            "ne" => Ok(FilterOperator::Ne),
            "contains" => Ok(FilterOperator::Contains),
            "gt" => Ok(FilterOperator::Gt),
            "lt" => Ok(FilterOperator::Lt),
            "gte" => Ok(FilterOperator::Gte),
            "lte" => Ok(FilterOperator::Lte),
            "in" => Ok(FilterOperator::In),
            other => Err(format!(
                "unknown filter operator '{}'; expected eq, ne, contains, gt, lt, gte, lte or in",
                other
            )),
        }
    }
}

/// Right-hand side of a filter: one scalar, or a list for `in`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    List(Vec<Value>),
    Scalar(Value),
}

impl FilterValue {
    fn items(&self) -> &[Value] {
        match self {
            FilterValue::List(items) => items,
            FilterValue::Scalar(value) => std::slice::from_ref(value),
        }
    }

    /// Lowercased text of the value; lists join their items with commas.
    fn folded(&self) -> String {
        match self {
            FilterValue::Scalar(value) => value.folded(),
            FilterValue::List(items) => items
                .iter()
                .map(Value::folded)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            FilterValue::Scalar(value) => value.as_number(),
            FilterValue::List(_) => None,
        }
    }
}

impl From<Value> for FilterValue {
    fn from(value: Value) -> Self {
        FilterValue::Scalar(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(column: impl Into<String>, operator: FilterOperator, value: impl Into<FilterValue>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    /// Parse a `COLUMN:OP:VALUE` expression. `in` splits its value on commas.
    pub fn parse_expr(expr: &str) -> Result<Self, String> {
        let mut parts = expr.splitn(3, ':');
        let (column, op, raw) = match (parts.next(), parts.next(), parts.next()) {
            (Some(c), Some(o), Some(v)) if !c.is_empty() => (c, o, v),
            _ => return Err(format!("invalid filter '{}'; expected COLUMN:OP:VALUE", expr)),
        };
        let operator = FilterOperator::from_str(op)?;
        let value = if operator == FilterOperator::In {
            FilterValue::List(raw.split(',').map(Value::from).collect())
        } else {
            FilterValue::Scalar(Value::from(raw))
        };
        Ok(Self::new(column, operator, value))
    }

    /// Whether `row` satisfies this filter. A row without the column is
    /// treated as holding the empty sentinel.
    pub fn matches(&self, row: &Row) -> bool {
        let missing = Value::missing();
        let cell = row.get(&self.column).unwrap_or(&missing);
        match self.operator {
            FilterOperator::Eq => cell.folded() == self.value.folded(),
            FilterOperator::Ne => cell.folded() != self.value.folded(),
            FilterOperator::Contains => cell.folded().contains(&self.value.folded()),
            FilterOperator::In => {
                let folded = cell.folded();
                self.value.items().iter().any(|item| item.folded() == folded)
            }
            FilterOperator::Gt => self.compare(cell, |o| o == Ordering::Greater),
            FilterOperator::Lt => self.compare(cell, |o| o == Ordering::Less),
            FilterOperator::Gte => self.compare(cell, |o| o != Ordering::Less),
            FilterOperator::Lte => self.compare(cell, |o| o != Ordering::Greater),
        }
    }

    /// Numeric comparison; a missing cell counts as 0, anything unparsable excludes the row.
    fn compare(&self, cell: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
        let lhs = if cell.is_missing() {
            Some(0.0)
        } else {
            cell.as_number()
        };
        match (lhs, self.value.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).is_some_and(accept),
            _ => false,
        }
    }
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    10
}

/// A row query. Range checks on page and limit are the caller's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            sort_by: None,
            sort_order: SortOrder::Asc,
            search: None,
            filters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub data: Vec<Row>,
    pub pagination: Pagination,
}

/// Keep the rows that satisfy every filter.
pub fn apply_filters(rows: &[Row], filters: &[Filter]) -> Vec<Row> {
    rows.iter()
        .filter(|row| filters.iter().all(|f| f.matches(row)))
        .cloned()
        .collect()
}

/// Keep the rows where any value contains `term`, case-insensitively.
pub fn apply_search(rows: Vec<Row>, term: &str) -> Vec<Row> {
    if term.is_empty() {
        return rows;
    }
    let term = term.to_lowercase();
    rows.into_iter()
        .filter(|row| row.values().any(|v| v.folded().contains(&term)))
        .collect()
}

/// Sort keys for a set of values: numeric when every value is numeric
/// (missing counts as 0), otherwise the display text of each value.
pub(crate) enum SortKeys {
    Numeric(Vec<f64>),
    Lexical(Vec<String>),
}

impl SortKeys {
    pub(crate) fn build<'a>(values: impl Iterator<Item = Option<&'a Value>> + Clone) -> Self {
        let numeric: Option<Vec<f64>> = values
            .clone()
            .map(|value| match value {
                None => Some(0.0),
                Some(v) if v.is_missing() => Some(0.0),
                Some(v) => v.as_number(),
            })
            .collect();
        match numeric {
            Some(keys) => SortKeys::Numeric(keys),
            None => SortKeys::Lexical(
                values
                    .map(|value| value.map(Value::to_string).unwrap_or_default())
                    .collect(),
            ),
        }
    }

    pub(crate) fn compare(&self, a: usize, b: usize) -> Ordering {
        match self {
            SortKeys::Numeric(keys) => keys[a].total_cmp(&keys[b]),
            SortKeys::Lexical(keys) => keys[a].cmp(&keys[b]),
        }
    }

    /// Indices `0..len` in stable ascending key order.
    pub(crate) fn ascending_order(&self) -> Vec<usize> {
        let len = match self {
            SortKeys::Numeric(keys) => keys.len(),
            SortKeys::Lexical(keys) => keys.len(),
        };
        let mut order: Vec<usize> = (0..len).collect();
        order.sort_by(|&a, &b| self.compare(a, b));
        order
    }
}

/// Stable sort on `column`. Rows are returned unchanged when the set is empty
/// or the first row has no such column.
pub fn sort_rows(rows: Vec<Row>, column: &str, order: SortOrder) -> Vec<Row> {
    match rows.first() {
        Some(first) if first.contains_key(column) => {}
        _ => return rows,
    }
    let keys = SortKeys::build(rows.iter().map(|row| row.get(column)));
    let mut indices: Vec<usize> = (0..rows.len()).collect();
    match order {
        SortOrder::Asc => indices.sort_by(|&a, &b| keys.compare(a, b)),
        SortOrder::Desc => indices.sort_by(|&a, &b| keys.compare(b, a)),
    }
    let mut slots: Vec<Option<Row>> = rows.into_iter().map(Some).collect();
    indices
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect()
}

/// Slice page `page` (1-based) of `limit` rows; out-of-range pages are empty.
pub fn paginate(rows: Vec<Row>, page: usize, limit: usize) -> Page {
    let total = rows.len();
    let pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
    let start = page.saturating_sub(1).saturating_mul(limit);
    let data = rows.into_iter().skip(start).take(limit).collect();
    Page {
        data,
        pagination: Pagination {
            page,
            limit,
            total,
            pages,
        },
    }
}

/// Check that every filter names a cataloged column.
pub fn validate_filters(catalog: &Catalog, filters: &[Filter]) -> Result<(), EngineError> {
    for filter in filters {
        catalog.require(&filter.column)?;
    }
    Ok(())
}

/// Run the full pipeline over a dataset.
pub fn execute(dataset: &Dataset, query: &Query) -> Result<Page, EngineError> {
    validate_filters(&dataset.catalog, &query.filters)?;
    let mut rows = apply_filters(&dataset.rows, &query.filters);
    if let Some(term) = query.search.as_deref() {
        rows = apply_search(rows, term);
    }
    if let Some(column) = query.sort_by.as_deref() {
        rows = sort_rows(rows, column, query.sort_order);
    }
    Ok(paginate(rows, query.page, query.limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn people() -> Vec<Row> {
        vec![
            row(&[("name", "Ann".into()), ("age", Value::Int(34)), ("city", "Paris".into())]),
            row(&[("name", "bob".into()), ("age", Value::Int(9)), ("city", "paris".into())]),
            row(&[("name", "Cy".into()), ("age", Value::missing()), ("city", "Oslo".into())]),
            row(&[("name", "Di".into()), ("age", "n/a".into()), ("city", "Rome".into())]),
        ]
    }

    fn names(rows: &[Row]) -> Vec<String> {
        rows.iter().map(|r| r["name"].to_string()).collect()
    }

    #[test]
    fn test_string_operators_ignore_case() {
        let rows = people();
        let eq = apply_filters(&rows, &[Filter::new("city", FilterOperator::Eq, Value::from("PARIS"))]);
        assert_eq!(names(&eq), vec!["Ann", "bob"]);

        let ne = apply_filters(&rows, &[Filter::new("city", FilterOperator::Ne, Value::from("paris"))]);
        assert_eq!(names(&ne), vec!["Cy", "Di"]);

        let contains = apply_filters(&rows, &[Filter::new("name", FilterOperator::Contains, Value::from("B"))]);
        assert_eq!(names(&contains), vec!["bob"]);
    }

    #[test]
    fn test_in_operator() {
        let rows = people();
        let list = FilterValue::List(vec!["oslo".into(), "Rome".into()]);
        let found = apply_filters(&rows, &[Filter::new("city", FilterOperator::In, list)]);
        assert_eq!(names(&found), vec!["Cy", "Di"]);

        let scalar = apply_filters(&rows, &[Filter::new("city", FilterOperator::In, Value::from("oslo"))]);
        assert_eq!(names(&scalar), vec!["Cy"]);
    }

    #[test]
    fn test_numeric_operators() {
        let rows = people();
        let gt = apply_filters(&rows, &[Filter::new("age", FilterOperator::Gt, Value::from("10"))]);
        assert_eq!(names(&gt), vec!["Ann"]);

        // missing counts as 0, "n/a" is excluded
        let lte = apply_filters(&rows, &[Filter::new("age", FilterOperator::Lte, Value::Int(9))]);
        assert_eq!(names(&lte), vec!["bob", "Cy"]);

        let gte = apply_filters(&rows, &[Filter::new("age", FilterOperator::Gte, Value::Int(0))]);
        assert_eq!(names(&gte), vec!["Ann", "bob", "Cy"]);
    }

    #[test]
    fn test_non_numeric_filter_value_excludes_everything() {
        let rows = people();
        let lt = apply_filters(&rows, &[Filter::new("age", FilterOperator::Lt, Value::from("abc"))]);
        assert!(lt.is_empty());
    }

    #[test]
    fn test_filters_conjoin() {
        let rows = people();
        let filters = vec![
            Filter::new("city", FilterOperator::Eq, Value::from("paris")),
            Filter::new("age", FilterOperator::Gt, Value::Int(10)),
        ];
        assert_eq!(names(&apply_filters(&rows, &filters)), vec!["Ann"]);
    }

    #[test]
    fn test_search() {
        let rows = people();
        assert_eq!(names(&apply_search(rows.clone(), "PAR")), vec!["Ann", "bob"]);
        assert_eq!(apply_search(rows.clone(), "").len(), 4);
        assert_eq!(names(&apply_search(rows, "34")), vec!["Ann"]);
    }

    #[test]
    fn test_sort_numeric_then_lexical_fallback() {
        let rows = vec![
            row(&[("n", "10".into())]),
            row(&[("n", "9".into())]),
            row(&[("n", Value::missing())]),
        ];
        let sorted = sort_rows(rows.clone(), "n", SortOrder::Asc);
        let keys: Vec<String> = sorted.iter().map(|r| r["n"].to_string()).collect();
        assert_eq!(keys, vec!["", "9", "10"]);

        let mut mixed = rows;
        mixed.push(row(&[("n", "x".into())]));
        let sorted = sort_rows(mixed, "n", SortOrder::Asc);
        let keys: Vec<String> = sorted.iter().map(|r| r["n"].to_string()).collect();
        assert_eq!(keys, vec!["", "10", "9", "x"]);
    }

    #[test]
    fn test_sort_desc_keeps_ties_in_input_order() {
        let rows = vec![
            row(&[("k", Value::Int(1)), ("id", "a".into())]),
            row(&[("k", Value::Int(2)), ("id", "b".into())]),
            row(&[("k", Value::Int(1)), ("id", "c".into())]),
        ];
        let sorted = sort_rows(rows, "k", SortOrder::Desc);
        let ids: Vec<String> = sorted.iter().map(|r| r["id"].to_string()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_sort_unknown_column_is_passthrough() {
        let rows = people();
        assert_eq!(sort_rows(rows.clone(), "salary", SortOrder::Desc), rows);
        assert!(sort_rows(Vec::new(), "name", SortOrder::Asc).is_empty());
    }

    #[test]
    fn test_paginate() {
        let rows: Vec<Row> = (0..25).map(|i| row(&[("i", Value::Int(i))])).collect();
        let page = paginate(rows.clone(), 3, 10);
        assert_eq!(page.data.len(), 5);
        assert_eq!(
            page.pagination,
            Pagination {
                page: 3,
                limit: 10,
                total: 25,
                pages: 3
            }
        );
        assert!(paginate(rows, 4, 10).data.is_empty());
    }

    #[test]
    fn test_parse_expr() {
        let f = Filter::parse_expr("amount:gte:10.5").unwrap();
        assert_eq!(f.column, "amount");
        assert_eq!(f.operator, FilterOperator::Gte);
        assert_eq!(f.value, FilterValue::Scalar(Value::from("10.5")));

        let f = Filter::parse_expr("city:in:Oslo,Rome").unwrap();
        assert_eq!(
            f.value,
            FilterValue::List(vec![Value::from("Oslo"), Value::from("Rome")])
        );

        // the value may itself contain colons
        let f = Filter::parse_expr("time:eq:10:30").unwrap();
        assert_eq!(f.value, FilterValue::Scalar(Value::from("10:30")));

        assert!(Filter::parse_expr("city:like:x").is_err());
        assert!(Filter::parse_expr("city").is_err());
    }

    #[test]
    fn test_query_json_defaults() {
        let query: Query = serde_json::from_str(
            r#"{"filters":[{"column":"city","operator":"in","value":["a","b"]}]}"#,
        )
        .unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 10);
        assert_eq!(query.sort_order, SortOrder::Asc);
        assert_eq!(query.filters[0].operator, FilterOperator::In);
        assert!(matches!(query.filters[0].value, FilterValue::List(_)));
    }
}
