use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use danci_learning_engine::analytics::{EngineState, EngineStore, LearningEngine};
use danci_learning_engine::config::Config;
use danci_learning_engine::snapshot::{self, LearnerSnapshot};
use danci_learning_engine::{db, logging};

#[derive(Parser)]
#[command(name = "danci-learning-engine")]
#[command(about = "Runs a learner snapshot through the adaptive learning engine", long_about = None)]
struct Cli {
    /// Clear the learner's stored state before processing
    #[arg(long)]
    reset: bool,
    /// JSON snapshot with cards, progress, mistakes and new sessions
    snapshot: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = logging::init_tracing(&config.logging);

    let snapshot = match LearnerSnapshot::load(&cli.snapshot).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::error!(error = %e, "cannot read learner snapshot");
            std::process::exit(1);
        }
    };

    let store = match db::init_pool(&config.db_path).await {
        Ok(pool) => Some(Arc::new(EngineStore::new(pool))),
        Err(e) => {
            tracing::warn!(error = %e, path = %config.db_path.display(), "store unavailable, running in memory");
            None
        }
    };

    let mut state = EngineState::default();
    if let Some(store) = &store {
        if cli.reset {
            match store.clear(&config.learner_id).await {
                Ok(rows) => tracing::info!(learner_id = %config.learner_id, rows, "learner state cleared"),
                Err(e) => tracing::warn!(error = %e, "failed to clear learner state"),
            }
        }
        match store.load_state(&config.learner_id).await {
            Ok(Some(loaded)) => state = loaded,
            Ok(None) => tracing::info!(learner_id = %config.learner_id, "no stored state, starting fresh"),
            Err(e) => tracing::warn!(error = %e, "failed to load learner state"),
        }
    }

    let max_persisted = config.engine.history.max_persisted_records;
    let mut engine = LearningEngine::from_state(config.learner_id.clone(), config.engine.clone(), state);
    let report = snapshot::process(&mut engine, &snapshot);

    if let Some(store) = &store {
        if let Err(e) = store.save_state(engine.learner_id(), engine.state(), max_persisted).await {
            tracing::warn!(error = %e, "failed to save learner state");
        }
    }

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!(error = %e, "failed to render report");
            std::process::exit(1);
        }
    }
}
