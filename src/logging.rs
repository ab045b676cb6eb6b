//! Log setup for the deskcoach binary.
//!
//! Two modes:
//! - **Session** ([`init_session`]): JSON file layer (daily rotation) + console layer
//! - **CLI** ([`init_cli`]): stderr only, for `grade`, `scenarios`, `reference` and `check`

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::CoachError;

/// Keeps the session log writer alive.
///
/// Drop it last: dropping flushes buffered entries to the log file.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// Initialise logging for the interactive `practice` subcommand.
///
/// Writes JSON logs to `{logs_dir}/deskcoach.log.YYYY-MM-DD` with daily
/// rotation. Console output goes to stderr at `error` unless `RUST_LOG`
/// says otherwise; failures the loop already renders stay in the file.
///
/// Hold the returned [`LoggingGuard`] until the session ends.
///
/// # Errors
///
/// Returns [`CoachError::Config`] if the logs directory cannot be created.
pub fn init_session(logs_dir: &Path) -> Result<LoggingGuard, CoachError> {
    std::fs::create_dir_all(logs_dir).map_err(|e| {
        CoachError::config(format!(
            "failed to create logs directory {}: {e}",
            logs_dir.display()
        ))
    })?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, "deskcoach.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"));

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(file_filter);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    // A subscriber may already be installed (tests); file logging is best effort then.
    let _ = tracing_subscriber::registry()
        .with(json_layer)
        .with(console_layer)
        .try_init();

    Ok(LoggingGuard { _guard: guard })
}

/// Initialise minimal logging for one-shot subcommands.
///
/// Plain text on stderr, so stdout stays clean for `--json` output.
/// Controlled by `RUST_LOG` (default: `warn`).
pub fn init_cli() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
