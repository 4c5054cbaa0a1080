//! In-memory dataset model: column catalog, rows and derived metadata.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::value::Value;

/// One row, keyed by column name in catalog order.
pub type Row = IndexMap<String, Value>;

/// Inferred primitive kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == ColumnKind::Numeric
    }
}

/// Ordered column catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    columns: Vec<Column>,
}

impl Catalog {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Catalog of categorical columns, for callers that only have names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            names
                .into_iter()
                .map(|n| Column::new(n, ColumnKind::Categorical))
                .collect(),
        )
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column, failing with `UnknownColumn` when absent.
    pub fn require(&self, name: &str) -> Result<&Column, EngineError> {
        self.get(name)
            .ok_or_else(|| EngineError::UnknownColumn(name.to_string()))
    }

    pub fn numeric(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_numeric())
    }

    pub fn categorical(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.is_numeric())
    }
}

/// A parsed, immutable table plus the metadata computed at ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub catalog: Catalog,
    pub rows: Vec<Row>,
    /// Missing-cell count per column, counted before values were normalized.
    pub missing_values: IndexMap<String, usize>,
    /// Declared storage type per column: int64, float64, bool, datetime or str.
    pub data_types: IndexMap<String, String>,
}

impl Dataset {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn stats(&self) -> DatasetStats {
        DatasetStats {
            total_rows: self.rows.len(),
            total_columns: self.catalog.len(),
            numeric_columns: self.catalog.numeric().map(|c| c.name.clone()).collect(),
            categorical_columns: self
                .catalog
                .categorical()
                .map(|c| c.name.clone())
                .collect(),
            missing_values: self.missing_values.clone(),
            data_types: self.data_types.clone(),
        }
    }
}

/// Summary statistics reported for a stored dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_rows: usize,
    pub total_columns: usize,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub missing_values: IndexMap<String, usize>,
    pub data_types: IndexMap<String, String>,
}
