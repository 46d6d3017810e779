/*!
 * Logging and tracing initialization
 *
 * Installing a subscriber is the host application's choice; the engine only
 * emits `tracing` events and never sets one up implicitly.
 */

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::error::{CustodyError, Result};

/// Initialize compact stdout logging for hosts that want it
pub fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("custody={}", level)))
        .map_err(|e| CustodyError::Planning(format!("failed to create log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| CustodyError::Planning(format!("failed to install subscriber: {}", e)))?;

    Ok(())
}

/// Initialize JSON logging to a file (one event per line)
pub fn init_file_logging(log_path: &Path) -> Result<()> {
    let file = File::create(log_path)
        .map_err(|e| CustodyError::Planning(format!("failed to create log file: {}", e)))?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("custody=info"));

    let fmt_layer = fmt::layer()
        .with_writer(Arc::new(file))
        .with_target(true)
        .with_thread_ids(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| CustodyError::Planning(format!("failed to install subscriber: {}", e)))?;

    Ok(())
}

/// Initialize logging for tests; safe to call from multiple tests
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("custody=debug"));

        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok();
    });
}
