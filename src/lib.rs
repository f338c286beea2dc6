pub mod analytics;
pub mod config;
pub mod db;
pub mod logging;
pub mod snapshot;

pub use analytics::{EngineConfig, EngineStore, LearningEngine};
