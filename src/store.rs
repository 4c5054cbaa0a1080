//! Dataset persistence.
//!
//! A stored record bundles the parsed dataset with everything computed at
//! ingestion (domain, insights, suggested charts) so reads never recompute them.

use color_eyre::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::dataset::Dataset;
use crate::insights::{Domain, Insights, SuggestedChart};

// Custom serialization for SystemTime (convert to/from seconds since epoch)
mod time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time.duration_since(UNIX_EPOCH).map_err(|e| {
            serde::ser::Error::custom(format!("Failed to serialize SystemTime: {}", e))
        })?;
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + std::time::Duration::from_secs(secs))
    }
}

/// One uploaded dataset and its ingestion-time analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub filename: String,
    pub file_size: u64,
    #[serde(with = "time_serde")]
    pub created: SystemTime,
    pub dataset: Dataset,
    pub domain: Domain,
    pub insights: Insights,
    #[serde(default)]
    pub suggested_charts: Vec<SuggestedChart>,
}

impl DatasetRecord {
    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            filename: self.filename.clone(),
            file_size: self.file_size,
            columns: self
                .dataset
                .catalog
                .names()
                .map(str::to_string)
                .collect(),
            row_count: self.dataset.row_count(),
            domain: self.domain,
            created: self
                .created
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        }
    }
}

/// Listing entry: record metadata without rows or insights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub filename: String,
    pub file_size: u64,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub domain: Domain,
    /// Seconds since the Unix epoch.
    pub created: u64,
}

/// Storage for dataset records, keyed by id.
pub trait Datastore {
    fn insert(&mut self, record: &DatasetRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<DatasetRecord>>;
    /// All records, in no particular order.
    fn list(&self) -> Result<Vec<DatasetRecord>>;
    /// Remove a record; returns whether it existed.
    fn delete(&mut self, id: &str) -> Result<bool>;
}

/// Id derived from the dataset name and the creation time, as 16 hex digits.
pub fn generate_id(name: &str, created: SystemTime) -> String {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    created
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Stores each record as pretty JSON in `<dir>/dataset_<id>.json`.
pub struct FsDatastore {
    dir: PathBuf,
}

impl FsDatastore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for `id`, or None when the id could escape the store directory.
    fn record_path(&self, id: &str) -> Option<PathBuf> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(self.dir.join(format!("dataset_{}.json", id)))
    }
}

impl Datastore for FsDatastore {
    fn insert(&mut self, record: &DatasetRecord) -> Result<()> {
        let file_path = self
            .record_path(&record.id)
            .ok_or_else(|| color_eyre::eyre::eyre!("Invalid dataset id: {}", record.id))?;
        fs::create_dir_all(&self.dir)?;

        let json = serde_json::to_string_pretty(record)?;

        // Use file locking to prevent race conditions
        use fs2::FileExt;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&file_path)?;

        file.lock_exclusive()?;
        file.write_all(json.as_bytes())?;
        file.flush()?;
        file.unlock()?;

        debug!(path = %file_path.display(), "wrote dataset record");
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<DatasetRecord>> {
        let Some(file_path) = self.record_path(id) else {
            return Ok(None);
        };
        if !file_path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&file_path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn list(&self) -> Result<Vec<DatasetRecord>> {
        let mut records = Vec::new();
        if !self.dir.exists() {
            return Ok(records);
        }

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str::<DatasetRecord>(&content) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable dataset file"),
                },
                Err(e) => warn!(path = %path.display(), error = %e, "could not read dataset file"),
            }
        }

        Ok(records)
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        match self.record_path(id) {
            Some(file_path) if file_path.exists() => {
                fs::remove_file(&file_path)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// In-process store, for tests and embedding.
#[derive(Default)]
pub struct MemoryDatastore {
    records: IndexMap<String, DatasetRecord>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Datastore for MemoryDatastore {
    fn insert(&mut self, record: &DatasetRecord) -> Result<()> {
        self.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<DatasetRecord>> {
        Ok(self.records.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<DatasetRecord>> {
        Ok(self.records.values().cloned().collect())
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        Ok(self.records.shift_remove(id).is_some())
    }
}
