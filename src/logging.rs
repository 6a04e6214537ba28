use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_PREFIX: &str = "room-calendar.log";

pub fn default_log_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("room-calendar"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Installs a global subscriber writing to a daily rolling file in
/// `log_dir`. Filtering follows `RUST_LOG`, defaulting to `info`.
///
/// Keep the returned guard alive for as long as logs should be flushed.
/// Returns `None` if a global subscriber is already installed.
pub fn init_file_logging(log_dir: &Path) -> Option<WorkerGuard> {
    std::fs::create_dir_all(log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .is_ok();

    if !installed {
        return None;
    }

    tracing::info!("room-calendar logging started in {}", log_dir.display());
    Some(guard)
}
