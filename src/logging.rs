//! Tracing setup for binaries that embed the engine.
//!
//! Logs always go to stdout. Set `ENABLE_FILE_LOGS=true` to also write a
//! daily-rotated `adaptive-engine.log` under `LOG_DIR` (default `./logs`).

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE_PREFIX: &str = "adaptive-engine.log";
const DEFAULT_LOG_DIR: &str = "./logs";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Keeps the non-blocking file writer alive; drop it last to flush.
pub struct FileLogGuard {
    _guard: WorkerGuard,
    pub log_dir: PathBuf,
}

fn flag_enabled(value: &str) -> bool {
    value == "true" || value == "1"
}

pub fn file_logging_enabled() -> bool {
    std::env::var("ENABLE_FILE_LOGS")
        .map(|v| flag_enabled(&v))
        .unwrap_or(false)
}

/// `RUST_LOG` first, then `ADAPTIVE_LOG_LEVEL`, then `info`.
pub fn log_level_from_env() -> String {
    std::env::var("RUST_LOG")
        .or_else(|_| std::env::var("ADAPTIVE_LOG_LEVEL"))
        .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
}

/// Installs the global subscriber. A second call is a no-op, so tests can
/// call this freely.
pub fn init_tracing(log_level: &str) -> Option<FileLogGuard> {
    let env_filter =
        EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    let stdout_layer = fmt::layer().with_target(true);

    if file_logging_enabled() {
        let log_dir = PathBuf::from(
            std::env::var("LOG_DIR").unwrap_or_else(|_| DEFAULT_LOG_DIR.to_string()),
        );
        if let Err(err) = std::fs::create_dir_all(&log_dir) {
            eprintln!("failed to create log directory {}: {err}", log_dir.display());
        } else {
            let file_appender =
                RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(true);

            if tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .with(file_layer)
                .try_init()
                .is_err()
            {
                return None;
            }

            return Some(FileLogGuard { _guard: guard, log_dir });
        }
    }

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .try_init();

    None
}
