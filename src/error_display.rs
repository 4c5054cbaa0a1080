//! User-facing error message formatting.
//!
//! Uses typed error matching (EngineError, StoreError, PolarsError variants,
//! io::ErrorKind) rather than string parsing to produce short, actionable messages.

use polars::prelude::PolarsError;
use std::io;
use std::path::Path;

use crate::error::{EngineError, StoreError};

/// Format a PolarsError as a user-facing message by matching on its variant.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!("Column not found: {}", msg),
        PE::Duplicate(msg) => format!("Duplicate column: {}", msg),
        PE::IO { error, msg } => {
            user_message_from_io(error.as_ref(), msg.as_ref().map(|m| m.as_ref()))
        }
        PE::NoData(msg) => format!("No data: {}", msg),
        PE::SchemaMismatch(msg) => format!("Schema mismatch: {}", msg),
        PE::ShapeMismatch(msg) => format!("Row shape mismatch: {}", msg),
        PE::InvalidOperation(msg) => format!("Operation not allowed: {}", msg),
        PE::OutOfBounds(msg) => format!("Index or row out of bounds: {}", msg),
        PE::ComputeError(msg) => simplify_compute_message(msg),
        PE::Context { error, msg } => {
            let inner = user_message_from_polars(error);
            format!("{}: {}", msg, inner)
        }
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error, context: Option<&str>) -> String {
    use std::io::ErrorKind;

    let base: String = match err.kind() {
        ErrorKind::NotFound => "File or directory not found.".to_string(),
        ErrorKind::PermissionDenied => "Permission denied. Check read access.".to_string(),
        ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            "Invalid or corrupted data.".to_string()
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        ErrorKind::OutOfMemory => "Out of memory.".to_string(),
        ErrorKind::Other => {
            let msg = err.to_string();
            if msg.contains("No space left") || msg.contains("space left") {
                return "No space left on device. Free up disk space and try again.".to_string();
            }
            if msg.contains("Is a directory") {
                return "Path is a directory, not a file.".to_string();
            }
            return if context.is_some() {
                format!("I/O error: {}", msg)
            } else {
                msg
            };
        }
        _ => err.to_string(),
    };

    match context {
        Some(ctx) if !ctx.is_empty() => format!("{} {}", base, ctx),
        _ => base,
    }
}

/// Format an engine failure, adding a hint where one helps.
pub fn user_message_from_engine(err: &EngineError) -> String {
    match err {
        EngineError::UnsupportedFormat(name) => format!("Unsupported file format: {}", name),
        EngineError::Parse { format, message } => {
            format!("Could not read {} data: {}", format, message)
        }
        EngineError::UnknownColumn(name) => format!(
            "Column not found: {}. Run `tabviz stats <ID>` to list columns.",
            name
        ),
    }
}

/// Format a store failure.
pub fn user_message_from_store(err: &StoreError) -> String {
    match err {
        StoreError::NotFound(id) => format!(
            "Dataset not found: {}. Run `tabviz list` to see stored datasets.",
            id
        ),
        StoreError::TooLarge { size, limit } => format!(
            "File too large: {} MB exceeds the {} MB upload limit.",
            size.div_ceil(1024 * 1024),
            limit / (1024 * 1024)
        ),
    }
}

/// Format a color_eyre Report by downcasting to known error types.
/// Walks the cause chain to find an engine, store, polars or io error.
pub fn user_message_from_report(report: &color_eyre::eyre::Report, path: Option<&Path>) -> String {
    let with_path = |msg: String| match path {
        Some(p) => format!("Failed to load {}: {}", p.display(), msg),
        None => msg,
    };

    for cause in report.chain() {
        if let Some(err) = cause.downcast_ref::<EngineError>() {
            return with_path(user_message_from_engine(err));
        }
        if let Some(err) = cause.downcast_ref::<StoreError>() {
            return user_message_from_store(err);
        }
        if let Some(pe) = cause.downcast_ref::<PolarsError>() {
            return with_path(user_message_from_polars(pe));
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return with_path(user_message_from_io(io_err, None));
        }
    }

    // Fallback: use first line of display to avoid long tracebacks
    let display = report.to_string();
    let first_line = display.lines().next().unwrap_or("An error occurred");
    with_path(first_line.trim().to_string())
}

/// Light cleanup for ComputeError messages: keep the first line only.
fn simplify_compute_message(msg: &str) -> String {
    msg.lines().next().unwrap_or(msg).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::{eyre, Report};
    use std::path::PathBuf;

    #[test]
    fn test_user_message_from_io_not_found() {
        let err = io::Error::new(io::ErrorKind::NotFound, "No such file");
        let msg = user_message_from_io(&err, None);
        assert!(
            msg.contains("not found"),
            "expected 'not found', got: {}",
            msg
        );
    }

    #[test]
    fn test_user_message_from_io_permission_denied() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied");
        let msg = user_message_from_io(&err, None);
        assert!(
            msg.to_lowercase().contains("permission"),
            "expected 'permission', got: {}",
            msg
        );
    }

    #[test]
    fn test_report_finds_engine_error_through_context() {
        let report = Report::new(EngineError::UnknownColumn("amt".to_string()))
            .wrap_err("chart failed");
        let msg = user_message_from_report(&report, None);
        assert!(msg.starts_with("Column not found: amt"), "got: {}", msg);
    }

    #[test]
    fn test_report_store_not_found_ignores_path() {
        let report = Report::new(StoreError::NotFound("abc".to_string()));
        let msg = user_message_from_report(&report, Some(&PathBuf::from("x.csv")));
        assert!(msg.starts_with("Dataset not found: abc"), "got: {}", msg);
    }

    #[test]
    fn test_report_prefixes_path_for_load_errors() {
        let report = Report::new(EngineError::UnsupportedFormat("notes.txt".to_string()));
        let msg = user_message_from_report(&report, Some(&PathBuf::from("notes.txt")));
        assert!(msg.starts_with("Failed to load notes.txt: Unsupported file format"));
    }

    #[test]
    fn test_report_fallback_first_line() {
        let report = eyre!("first line\nsecond line");
        assert_eq!(user_message_from_report(&report, None), "first line");
    }

    #[test]
    fn test_too_large_in_megabytes() {
        let err = StoreError::TooLarge {
            size: 60 * 1024 * 1024,
            limit: 50 * 1024 * 1024,
        };
        assert_eq!(
            user_message_from_store(&err),
            "File too large: 60 MB exceeds the 50 MB upload limit."
        );
    }
}
