//! Upload format detection and load options.

use std::path::Path;

use crate::config::FileLoadingConfig;
use crate::error::EngineError;
pub use tabviz_cli::FileFormat;

/// Options applied when parsing uploaded bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Skip extension detection and parse as this format.
    pub format: Option<FileFormat>,
    /// Override the format's default delimiter (delimited text only).
    pub delimiter: Option<u8>,
    /// Sheet to read from a workbook: 0-based index or sheet name.
    pub excel_sheet: Option<String>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_excel_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.excel_sheet = Some(sheet.into());
        self
    }

    /// Resolve the format for `filename`, preferring an explicit override.
    pub fn resolve_format(&self, filename: &str) -> Result<FileFormat, EngineError> {
        match self.format {
            Some(format) => Ok(format),
            None => detect_format(filename),
        }
    }
}

impl From<&FileLoadingConfig> for LoadOptions {
    fn from(config: &FileLoadingConfig) -> Self {
        Self {
            format: None,
            delimiter: config.delimiter,
            excel_sheet: config.excel_sheet.clone(),
        }
    }
}

/// Detect the upload format from a filename hint (case-insensitive extension).
pub fn detect_format(filename: &str) -> Result<FileFormat, EngineError> {
    FileFormat::from_path(Path::new(filename)).ok_or_else(|| {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_else(|| "no extension".to_string());
        EngineError::UnsupportedFormat(format!(
            "{} ({}); expected .csv, .tsv, .xls, .xlsx, .xlsm or .xlsb",
            filename, ext
        ))
    })
}
