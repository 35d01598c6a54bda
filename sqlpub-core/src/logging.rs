//! Shared logging setup for the SQLPub binary and embedders.
//!
//! Logs always go to stderr: stdout carries discovered shapes and streamed
//! records.

use crate::Result;

/// Maps CLI verbosity flags to a tracing level.
///
/// `quiet` wins over any verbosity: only errors are shown.
pub fn level_for(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}

/// Initializes structured logging based on verbosity level.
///
/// # Arguments
/// * `verbose` - Verbosity level (0=INFO, 1=DEBUG, 2+=TRACE)
/// * `quiet` - If true, only show ERROR level logs
/// * `json` - Emit one JSON object per event instead of human-readable lines
///
/// # Example
/// ```rust,no_run
/// use sqlpub_core::logging::init_logging;
///
/// init_logging(1, false, true).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool, json: bool) -> Result<()> {
    let level = level_for(verbose, quiet);

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| {
        crate::error::ConnectorError::configuration(format!(
            "Failed to initialize logging: {}",
            e
        ))
    })
}
