//! Column reductions shared by the chart aggregator and insight generator.

use indexmap::IndexMap;

use crate::dataset::Row;
use crate::value::Value;

/// Numeric values of `column`, skipping missing and non-numeric cells.
pub fn numeric_values(rows: &[Row], column: &str) -> Vec<f64> {
    rows.iter()
        .filter_map(|row| row.get(column))
        .filter_map(Value::as_number)
        .collect()
}

pub fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(sum(values) / values.len() as f64)
    }
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Occurrence count of each distinct value of `column`, most frequent first.
/// Values are distinct by display text; ties keep first-seen order and absent
/// cells count as the empty value.
pub fn value_counts(rows: &[Row], column: &str) -> Vec<(Value, usize)> {
    let mut counts: IndexMap<String, (Value, usize)> = IndexMap::new();
    for row in rows {
        let value = row.get(column).cloned().unwrap_or_else(Value::missing);
        counts.entry(value.to_string()).or_insert((value, 0)).1 += 1;
    }
    let mut counts: Vec<(Value, usize)> = counts.into_values().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Sum of the numeric values of `value_column` per distinct `key_column`
/// value, in first-seen key order.
pub fn grouped_sum(rows: &[Row], key_column: &str, value_column: &str) -> Vec<(String, f64)> {
    let mut sums: IndexMap<String, f64> = IndexMap::new();
    for row in rows {
        let key = row.get(key_column).map(Value::to_string).unwrap_or_default();
        let amount = row
            .get(value_column)
            .and_then(Value::as_number)
            .unwrap_or(0.0);
        *sums.entry(key).or_insert(0.0) += amount;
    }
    sums.into_iter().collect()
}

/// Format as dollars with thousands separators: `$1,234.56`.
pub fn format_currency(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, frac)
}
