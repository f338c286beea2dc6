use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogSettings;

const LOG_FILE_PREFIX: &str = "learning-engine.log";

/// Keeps the background log writer alive; dropping it flushes the file.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

fn file_writer(dir: &Path) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}

/// Logs go to stderr so the report on stdout stays machine readable. A file
/// that cannot be opened downgrades to stderr only.
pub fn init_tracing(settings: &LogSettings) -> Option<FileLogGuard> {
    let env_filter = EnvFilter::try_new(&settings.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match settings.file_dir.as_deref().map(|dir| (dir, file_writer(dir))) {
        Some((_, Ok((writer, guard)))) => (
            Some(fmt::layer().with_writer(writer).with_ansi(false).with_target(true)),
            Some(FileLogGuard { _guard: guard }),
        ),
        Some((dir, Err(err))) => {
            eprintln!("failed to open log directory {}: {err}", dir.display());
            (None, None)
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(file_layer)
        .init();

    guard
}
