use std::path::{Path, PathBuf};

use crate::analytics::EngineConfig;
use crate::db;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub learner_id: String,
    pub logging: LogSettings,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    /// Directory for the daily rolling log file; `None` keeps logs on stderr only.
    pub file_dir: Option<PathBuf>,
}

impl LogSettings {
    /// File logs default to a `logs` directory next to the database.
    pub fn resolve(
        level: Option<String>,
        enable_file_logs: Option<String>,
        log_dir: Option<String>,
        db_path: &Path,
    ) -> Self {
        let enabled = enable_file_logs.is_some_and(|v| v == "true" || v == "1");
        let file_dir = enabled.then(|| {
            non_empty(log_dir).map(PathBuf::from).unwrap_or_else(|| {
                db_path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."))
                    .join("logs")
            })
        });

        Self {
            level: non_empty(level).unwrap_or_else(|| "info".to_string()),
            file_dir,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        let db_path = non_empty(std::env::var("LEARNING_ENGINE_DB").ok())
            .map(PathBuf::from)
            .unwrap_or_else(db::default_db_path);

        let learner_id = non_empty(std::env::var("LEARNER_ID").ok()).unwrap_or_else(|| "local".to_string());

        let logging = LogSettings::resolve(
            std::env::var("RUST_LOG").ok(),
            std::env::var("ENABLE_FILE_LOGS").ok(),
            std::env::var("LOG_DIR").ok(),
            &db_path,
        );

        Self {
            db_path,
            learner_id,
            logging,
            engine: EngineConfig::from_env(),
        }
    }
}
