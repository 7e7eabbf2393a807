use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{ProjectPaths, APP_NAME};

/// Initialize console and file logging for a component.
///
/// - `component_name`: Name of the component (e.g., "cli", a supervisor name)
/// - `log_dir`: Directory for the log file, the data directory's `logs` if `None`
/// - `debug`: Log at debug level instead of info
///
/// Returns a guard that must be kept alive for the duration of the program.
pub fn init_logging(
    component_name: &str,
    log_dir: Option<&Path>,
    debug: bool,
) -> io::Result<WorkerGuard> {
    let log_dir = match log_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_log_directory()?,
    };
    fs::create_dir_all(&log_dir)?;

    let log_path = log_dir.join(log_file_name(component_name, chrono::Local::now()));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    let (non_blocking_file, guard) = tracing_appender::non_blocking(BufWriter::new(file));

    let default_level = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(io::stdout).with_ansi(true))
        .with(
            fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))?;

    tracing::info!("Logging to file: {}", log_path.display());
    Ok(guard)
}

/// `runewarden-log-<component>-<timestamp>.txt`
pub fn log_file_name(component_name: &str, at: chrono::DateTime<chrono::Local>) -> String {
    format!(
        "{}-log-{}-{}.txt",
        APP_NAME,
        component_name,
        at.format("%Y-%m-%d-%H-%M-%S")
    )
}

fn default_log_directory() -> io::Result<PathBuf> {
    let paths = ProjectPaths::new(APP_NAME)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "Failed to find home directory"))?;
    Ok(paths.log_dir())
}
