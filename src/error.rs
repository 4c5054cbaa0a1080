use thiserror::Error;

/// Failures raised by ingestion, querying and chart aggregation.
///
/// Per-row data-quality problems (unparsable numbers, bad dates) never surface
/// here; those rows are dropped or skipped where they occur.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("could not parse {format} data: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    #[error("column '{0}' not found")]
    UnknownColumn(String),
}

impl EngineError {
    pub(crate) fn parse(format: &'static str, message: impl ToString) -> Self {
        EngineError::Parse {
            format,
            message: message.to_string(),
        }
    }
}

/// Failures raised by the dataset store and service.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dataset '{0}' not found")]
    NotFound(String),

    #[error("file is {size} bytes, larger than the {limit} byte upload limit")]
    TooLarge { size: u64, limit: u64 },
}
