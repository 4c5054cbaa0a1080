//! Logging setup for the `tabviz` binary.
//!
//! Library code only emits `tracing` events; installing a subscriber is left to
//! the binary so embedding applications keep control of their own output.
//! Logs go to stderr so JSON results on stdout stay machine readable.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use tracing_subscriber::EnvFilter;

/// Build the level filter. `RUST_LOG` wins over the configured level.
pub fn env_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| eyre!("Invalid log level '{}': {}", level, e))
}

/// Install the global subscriber, as plain text or JSON lines.
pub fn init(level: &str, json: bool) -> Result<()> {
    let filter = env_filter(level)?;
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| eyre!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_accepts_levels() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        for level in ["error", "warn", "info", "debug", "trace", "tabviz=debug"] {
            assert!(env_filter(level).is_ok(), "level {} rejected", level);
        }
    }
}
