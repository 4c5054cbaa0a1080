//! Tabular query-and-aggregation engine.
//!
//! Uploaded CSV/TSV/Excel bytes are typed into a [`Dataset`]; stored datasets
//! can then be filtered, searched, sorted and paginated ([`query`]), reduced
//! to chart series ([`chart_data`]) and summarized by domain heuristics
//! ([`insights`]). [`DatasetService`] ties these to a [`Datastore`].

pub mod chart_data;
pub mod config;
pub mod dataset;
pub mod error;
pub mod error_display;
pub mod insights;
pub mod logging;
pub mod query;
pub mod resolver;
pub mod schema;
pub mod service;
pub mod source;
pub mod statistics;
pub mod store;
pub mod value;

pub use chart_data::{Aggregate, ChartResult, ChartSpec, ChartType, Palette};
pub use config::{AppConfig, ConfigManager};
pub use dataset::{Catalog, Column, ColumnKind, Dataset, DatasetStats, Row};
pub use error::{EngineError, StoreError};
pub use insights::{Domain, Insights, SuggestedChart};
pub use query::{Filter, FilterOperator, FilterValue, Page, Pagination, Query, SortOrder};
pub use service::{DatasetService, InsightReport, NewDataset};
pub use source::{FileFormat, LoadOptions};
pub use store::{DatasetRecord, DatasetSummary, Datastore, FsDatastore, MemoryDatastore};
pub use tabviz_cli::Args;
pub use value::Value;

/// Application name used for config and data directories
pub const APP_NAME: &str = "tabviz";
