//! Chart aggregation: group and reduce rows into chart-ready series.
//!
//! Output follows the labels/datasets layout consumed by Chart.js style
//! front ends. Colors come from a fixed palette cycled in series order.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::config::parse_hex;
use crate::dataset::{Catalog, Row};
use crate::error::EngineError;
use crate::query::SortKeys;
use crate::statistics;
use crate::value::Value;

pub use tabviz_cli::{Aggregate, ChartType};

pub const DEFAULT_PALETTE: [&str; 15] = [
    "#3B82F6", "#EF4444", "#10B981", "#F59E0B", "#8B5CF6", "#06B6D4", "#F97316", "#84CC16",
    "#EC4899", "#6366F1", "#F43F5E", "#14B8A6", "#F97316", "#8B5CF6", "#06B6D4",
];

/// Alpha suffix for line fills.
const LINE_FILL_ALPHA: &str = "20";
/// Alpha suffix for scatter point fills.
const SCATTER_FILL_ALPHA: &str = "60";
const BORDER_WIDTH: u32 = 2;

static MISSING: Value = Value::Text(String::new());

/// Reduce one group's y values. An empty group reduces to 0.
fn reduce_values(aggregate: Aggregate, values: &[f64]) -> f64 {
    match aggregate {
        Aggregate::Count => values.len() as f64,
        Aggregate::Sum => statistics::sum(values),
        Aggregate::Avg => statistics::mean(values).unwrap_or(0.0),
        Aggregate::Min => statistics::min(values).unwrap_or(0.0),
        Aggregate::Max => statistics::max(values).unwrap_or(0.0),
    }
}

/// What to chart. Empty `y_axis`/`group_by` strings count as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub chart_type: ChartType,
    pub x_axis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_axis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
    #[serde(default)]
    pub aggregate: Aggregate,
}

impl ChartSpec {
    pub fn new(chart_type: ChartType, x_axis: impl Into<String>) -> Self {
        Self {
            chart_type,
            x_axis: x_axis.into(),
            y_axis: None,
            group_by: None,
            aggregate: Aggregate::Count,
        }
    }

    pub fn with_y_axis(mut self, y_axis: impl Into<String>) -> Self {
        self.y_axis = Some(y_axis.into());
        self
    }

    pub fn with_group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = Some(group_by.into());
        self
    }

    pub fn with_aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = aggregate;
        self
    }

    fn y(&self) -> Option<&str> {
        self.y_axis.as_deref().filter(|s| !s.is_empty())
    }

    fn group(&self) -> Option<&str> {
        self.group_by.as_deref().filter(|s| !s.is_empty())
    }

    /// Check every referenced column against the catalog.
    pub fn validate(&self, catalog: &Catalog) -> Result<(), EngineError> {
        catalog.require(&self.x_axis)?;
        if let Some(y) = self.y() {
            catalog.require(y)?;
        }
        if let Some(group) = self.group() {
            catalog.require(group)?;
        }
        Ok(())
    }
}

/// Ordered display colors, cycled when more colors are needed than defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<String>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Palette {
    /// Build a palette from `#rrggbb` strings.
    pub fn new(colors: Vec<String>) -> Result<Self> {
        if colors.is_empty() {
            return Err(eyre!("Palette must contain at least one color"));
        }
        for color in &colors {
            parse_hex(color)?;
        }
        Ok(Self { colors })
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn color(&self, index: usize) -> &str {
        &self.colors[index % self.colors.len()]
    }

    /// First `count` colors, cycling.
    pub fn colors(&self, count: usize) -> Vec<String> {
        (0..count).map(|i| self.color(i).to_string()).collect()
    }
}

/// A fill or border that is either one color or one color per data point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Paint {
    Solid(String),
    PerPoint(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieDataset {
    pub data: Vec<usize>,
    pub background_color: Vec<String>,
}

/// One bar or line series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesDataset {
    pub label: String,
    pub data: Vec<f64>,
    pub background_color: Paint,
    pub border_color: Paint,
    pub border_width: u32,
    pub fill: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScatterDataset {
    pub label: String,
    pub data: Vec<Point>,
    pub background_color: String,
    pub border_color: String,
    pub border_width: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Datasets {
    Pie(Vec<PieDataset>),
    Series(Vec<SeriesDataset>),
    Scatter(Vec<ScatterDataset>),
}

impl Datasets {
    pub fn len(&self) -> usize {
        match self {
            Datasets::Pie(d) => d.len(),
            Datasets::Series(d) => d.len(),
            Datasets::Scatter(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartResult {
    pub labels: Vec<Value>,
    pub datasets: Datasets,
}

impl ChartResult {
    pub fn empty() -> Self {
        Self {
            labels: Vec::new(),
            datasets: Datasets::Series(Vec::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.datasets.is_empty()
    }
}

/// Aggregate `rows` per `spec` using the default palette.
pub fn aggregate(rows: &[Row], catalog: &Catalog, spec: &ChartSpec) -> Result<ChartResult, EngineError> {
    aggregate_with_palette(rows, catalog, spec, &Palette::default())
}

/// Aggregate `rows` per `spec`. Unknown columns fail before any row is read.
pub fn aggregate_with_palette(
    rows: &[Row],
    catalog: &Catalog,
    spec: &ChartSpec,
    palette: &Palette,
) -> Result<ChartResult, EngineError> {
    spec.validate(catalog)?;
    if rows.is_empty() {
        return Ok(ChartResult::empty());
    }
    let result = match spec.chart_type {
        ChartType::Pie => pie_chart(rows, &spec.x_axis, palette),
        ChartType::Bar | ChartType::Line => match spec.group() {
            Some(group) => grouped_series_chart(rows, spec, group, palette),
            None => series_chart(rows, spec, palette),
        },
        ChartType::Scatter => scatter_chart(rows, spec, palette),
    };
    debug!(
        chart_type = ?spec.chart_type,
        x_axis = %spec.x_axis,
        labels = result.labels.len(),
        datasets = result.datasets.len(),
        "aggregated chart"
    );
    Ok(result)
}

fn cell<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&MISSING)
}

/// Distinct values of a column in ascending order, with a lookup from
/// display text to label position.
struct LabelIndex {
    labels: Vec<Value>,
    positions: HashMap<String, usize>,
}

impl LabelIndex {
    fn build(rows: &[Row], column: &str) -> Self {
        let mut distinct: IndexMap<String, Value> = IndexMap::new();
        for row in rows {
            let value = cell(row, column);
            distinct
                .entry(value.to_string())
                .or_insert_with(|| value.clone());
        }
        let values: Vec<Value> = distinct.into_values().collect();
        let keys = SortKeys::build(values.iter().map(Some));
        let labels: Vec<Value> = keys
            .ascending_order()
            .into_iter()
            .map(|idx| values[idx].clone())
            .collect();
        let positions = labels
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.to_string(), idx))
            .collect();
        Self { labels, positions }
    }

    fn position(&self, value: &Value) -> usize {
        // every row value was indexed in build
        self.positions.get(&value.to_string()).copied().unwrap_or(0)
    }
}

/// Per-label accumulation of row counts and numeric y values.
#[derive(Clone, Default)]
struct Bucket {
    rows: usize,
    values: Vec<f64>,
}

impl Bucket {
    fn add(&mut self, y: Option<&Value>) {
        self.rows += 1;
        if let Some(n) = y.and_then(Value::as_number) {
            self.values.push(n);
        }
    }

    fn reduce(&self, aggregate: Aggregate) -> f64 {
        match aggregate {
            Aggregate::Count => self.rows as f64,
            other => reduce_values(other, &self.values),
        }
    }
}

/// Count aggregation is used whenever there is no y column to reduce.
fn effective_aggregate(spec: &ChartSpec) -> Aggregate {
    match spec.y() {
        Some(_) => spec.aggregate,
        None => Aggregate::Count,
    }
}

fn pie_chart(rows: &[Row], x_axis: &str, palette: &Palette) -> ChartResult {
    let counts = statistics::value_counts(rows, x_axis);
    let (labels, data): (Vec<Value>, Vec<usize>) = counts.into_iter().unzip();
    let background_color = palette.colors(labels.len());
    ChartResult {
        labels,
        datasets: Datasets::Pie(vec![PieDataset {
            data,
            background_color,
        }]),
    }
}

fn series_chart(rows: &[Row], spec: &ChartSpec, palette: &Palette) -> ChartResult {
    let index = LabelIndex::build(rows, &spec.x_axis);
    let aggregate = effective_aggregate(spec);
    let y_axis = spec.y();

    let mut buckets = vec![Bucket::default(); index.labels.len()];
    for row in rows {
        let pos = index.position(cell(row, &spec.x_axis));
        buckets[pos].add(y_axis.map(|y| cell(row, y)));
    }
    let data: Vec<f64> = buckets.iter().map(|b| b.reduce(aggregate)).collect();

    let n = index.labels.len();
    let is_line = spec.chart_type == ChartType::Line;
    let (background_color, border_color) = if is_line {
        let base = palette.color(0);
        (
            Paint::PerPoint(vec![format!("{}{}", base, LINE_FILL_ALPHA); n]),
            Paint::Solid(base.to_string()),
        )
    } else {
        (
            Paint::PerPoint(palette.colors(n)),
            Paint::PerPoint(palette.colors(n)),
        )
    };

    ChartResult {
        labels: index.labels,
        datasets: Datasets::Series(vec![SeriesDataset {
            label: format!("{} of {}", aggregate.title(), y_axis.unwrap_or("Count")),
            data,
            background_color,
            border_color,
            border_width: BORDER_WIDTH,
            fill: is_line,
        }]),
    }
}

fn grouped_series_chart(rows: &[Row], spec: &ChartSpec, group_by: &str, palette: &Palette) -> ChartResult {
    let index = LabelIndex::build(rows, &spec.x_axis);
    let aggregate = effective_aggregate(spec);
    let y_axis = spec.y();
    let n = index.labels.len();

    // one series per group value, in first-seen order
    let mut series: IndexMap<String, Vec<Bucket>> = IndexMap::new();
    for row in rows {
        let pos = index.position(cell(row, &spec.x_axis));
        let buckets = series
            .entry(cell(row, group_by).to_string())
            .or_insert_with(|| vec![Bucket::default(); n]);
        buckets[pos].add(y_axis.map(|y| cell(row, y)));
    }

    let is_line = spec.chart_type == ChartType::Line;
    let datasets = series
        .into_iter()
        .enumerate()
        .map(|(i, (label, buckets))| {
            let color = palette.color(i);
            let background = if is_line {
                format!("{}{}", color, LINE_FILL_ALPHA)
            } else {
                color.to_string()
            };
            SeriesDataset {
                label,
                // combinations with no rows reduce to 0 for every aggregate
                data: buckets.iter().map(|b| b.reduce(aggregate)).collect(),
                background_color: Paint::Solid(background),
                border_color: Paint::Solid(color.to_string()),
                border_width: BORDER_WIDTH,
                fill: is_line,
            }
        })
        .collect();

    ChartResult {
        labels: index.labels,
        datasets: Datasets::Series(datasets),
    }
}

fn scatter_chart(rows: &[Row], spec: &ChartSpec, palette: &Palette) -> ChartResult {
    let Some(y_axis) = spec.y() else {
        return ChartResult::empty();
    };
    let points: Vec<Point> = rows
        .iter()
        .filter_map(|row| {
            let x = cell(row, &spec.x_axis).as_number()?;
            let y = cell(row, y_axis).as_number()?;
            Some(Point { x, y })
        })
        .collect();
    if points.is_empty() {
        return ChartResult::empty();
    }
    let color = palette.color(0);
    ChartResult {
        labels: Vec::new(),
        datasets: Datasets::Scatter(vec![ScatterDataset {
            label: format!("{} vs {}", y_axis, spec.x_axis),
            data: points,
            background_color: format!("{}{}", color, SCATTER_FILL_ALPHA),
            border_color: color.to_string(),
            border_width: BORDER_WIDTH,
        }]),
    }
}
