//! Logging setup for the `datainsight` binary.
//!
//! Console output is always on. When a log directory is configured, two daily-rotating
//! files are written there as well:
//!
//! - `datainsight.<date>.log`: everything the env filter lets through
//! - `error.<date>.log`: warnings and errors only
//!
//! The level defaults to `info` and can be overridden with `RUST_LOG`.
//!
//! ```no_run
//! datainsight::logging::init(None).expect("Failed to initialize logging");
//! tracing::info!("ready");
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

const MAX_LOG_FILES: usize = 10;

/// Creates `dir` if needed and returns it as an owned path
pub fn prepare_log_dir(dir: &Path) -> Result<PathBuf> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
    }
    Ok(dir.to_path_buf())
}

fn file_appender(dir: &Path, prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(dir)
        .with_context(|| format!("Failed to create {prefix} file appender"))
}

fn env_filter() -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns error if the log directory cannot be created or the file appenders fail.
pub fn init(log_dir: Option<&Path>) -> Result<()> {
    // Console goes to stderr so JSON results on stdout stay machine-readable.
    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    let Some(dir) = log_dir else {
        tracing_subscriber::registry()
            .with(env_filter()?)
            .with(stderr_layer)
            .init();
        return Ok(());
    };

    let dir = prepare_log_dir(dir)?;

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(file_appender(&dir, "datainsight")?);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(file_appender(&dir, "error")?)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter()?)
        .with(stderr_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .init();

    tracing::info!("Logging initialized, log directory: {}", dir.display());
    Ok(())
}
