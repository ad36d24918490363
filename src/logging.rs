//! Tracing subscriber setup for binaries embedding pathwatch

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "pathwatch=info";

/// Install logging to stdout and, when `log_dir` is given, a daily-rolling file
///
/// The returned guard flushes the file writer on drop and must be kept alive.
/// A subscriber that is already installed is left in place.
pub fn init_logging(log_dir: Option<&Path>) -> std::io::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(rolling::daily(dir, "pathwatch.log"));
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init();

    if installed.is_ok() {
        tracing::info!(file_logging = guard.is_some(), "Logging initialized");
    }
    Ok(guard)
}
