//! Dataset lifecycle on top of a [`Datastore`]: ingest, list, inspect, query,
//! chart and delete.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tracing::info;

use crate::chart_data::{aggregate_with_palette, ChartResult, ChartSpec, Palette};
use crate::config::{AppConfig, MAX_PAGE_LIMIT};
use crate::dataset::DatasetStats;
use crate::error::StoreError;
use crate::insights::{
    detect_domain, generate_insights, suggested_charts, Domain, Insights, SuggestedChart,
};
use crate::query::{execute, Page, Query};
use crate::schema::infer_with_options;
use crate::source::LoadOptions;
use crate::store::{generate_id, DatasetRecord, DatasetSummary, Datastore};

/// An upload waiting to be ingested.
#[derive(Debug, Clone)]
pub struct NewDataset {
    pub name: String,
    pub description: Option<String>,
    /// Original filename; its extension selects the parser.
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl NewDataset {
    pub fn new(name: impl Into<String>, filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            description: None,
            filename: filename.into(),
            bytes,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Stored insights plus the charts proposed at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightReport {
    pub domain: Domain,
    pub insights: Insights,
    pub suggested_charts: Vec<SuggestedChart>,
}

pub struct DatasetService<S: Datastore> {
    store: S,
    palette: Palette,
    load_options: LoadOptions,
    max_file_size: Option<u64>,
    default_limit: usize,
    max_limit: usize,
}

impl<S: Datastore> DatasetService<S> {
    /// Service with the built-in palette, a 10 row page and no upload cap.
    pub fn new(store: S) -> Self {
        Self {
            store,
            palette: Palette::default(),
            load_options: LoadOptions::default(),
            max_file_size: None,
            default_limit: 10,
            max_limit: MAX_PAGE_LIMIT,
        }
    }

    pub fn from_config(store: S, config: &AppConfig) -> Result<Self> {
        let palette = match &config.chart.palette {
            Some(colors) => Palette::new(colors.clone())?,
            None => Palette::default(),
        };
        Ok(Self {
            store,
            palette,
            load_options: LoadOptions::from(&config.file_loading),
            max_file_size: config.file_loading.max_file_size_bytes(),
            default_limit: config.query.default_limit,
            max_limit: config.query.max_limit,
        })
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn load_options(&self) -> &LoadOptions {
        &self.load_options
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Ingest with the configured load options.
    pub fn upload(&mut self, upload: NewDataset) -> Result<DatasetRecord> {
        let options = self.load_options.clone();
        self.upload_with_options(upload, &options)
    }

    /// Parse, analyze and store an upload.
    pub fn upload_with_options(
        &mut self,
        upload: NewDataset,
        options: &LoadOptions,
    ) -> Result<DatasetRecord> {
        let file_size = upload.bytes.len() as u64;
        if let Some(limit) = self.max_file_size {
            if file_size > limit {
                return Err(StoreError::TooLarge {
                    size: file_size,
                    limit,
                }
                .into());
            }
        }

        let dataset = infer_with_options(&upload.bytes, &upload.filename, options)?;
        let domain = detect_domain(&dataset.catalog);
        let insights = generate_insights(&dataset.rows, &dataset.catalog, domain);
        let suggested_charts = suggested_charts(domain, &dataset.catalog);

        let created = SystemTime::now();
        let record = DatasetRecord {
            id: generate_id(&upload.name, created),
            name: upload.name,
            description: upload.description,
            filename: upload.filename,
            file_size,
            created,
            dataset,
            domain,
            insights,
            suggested_charts,
        };
        self.store.insert(&record)?;

        info!(
            id = %record.id,
            rows = record.dataset.row_count(),
            columns = record.dataset.catalog.len(),
            ?domain,
            "ingested dataset"
        );
        Ok(record)
    }

    /// Summaries of every stored dataset, newest first.
    pub fn list(&self) -> Result<Vec<DatasetSummary>> {
        let mut summaries: Vec<DatasetSummary> =
            self.store.list()?.iter().map(DatasetRecord::summary).collect();
        summaries.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.name.cmp(&b.name)));
        Ok(summaries)
    }

    pub fn get(&self, id: &str) -> Result<DatasetRecord> {
        self.store
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()).into())
    }

    pub fn stats(&self, id: &str) -> Result<DatasetStats> {
        Ok(self.get(id)?.dataset.stats())
    }

    pub fn insights(&self, id: &str) -> Result<InsightReport> {
        let record = self.get(id)?;
        Ok(InsightReport {
            domain: record.domain,
            insights: record.insights,
            suggested_charts: record.suggested_charts,
        })
    }

    /// Run a row query. Page must be at least 1 and limit within the configured range.
    pub fn query(&self, id: &str, query: &Query) -> Result<Page> {
        if query.page == 0 {
            return Err(eyre!("page must be at least 1"));
        }
        if query.limit == 0 || query.limit > self.max_limit {
            return Err(eyre!(
                "limit must be between 1 and {}, got {}",
                self.max_limit,
                query.limit
            ));
        }
        let record = self.get(id)?;
        Ok(execute(&record.dataset, query)?)
    }

    pub fn chart(&self, id: &str, spec: &ChartSpec) -> Result<ChartResult> {
        let record = self.get(id)?;
        Ok(aggregate_with_palette(
            &record.dataset.rows,
            &record.dataset.catalog,
            spec,
            &self.palette,
        )?)
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        if !self.store.delete(id)? {
            return Err(StoreError::NotFound(id.to_string()).into());
        }
        info!(%id, "deleted dataset");
        Ok(())
    }
}
