pub mod aggregator;
pub mod config;
pub mod difficulty;
pub mod engine;
pub mod insights;
pub mod persistence;
pub mod recommendation;
pub mod recorder;
pub mod state;
pub mod style;
pub mod types;
pub mod weak_spots;

pub use config::EngineConfig;
pub use engine::LearningEngine;
pub use persistence::EngineStore;
pub use state::{EngineState, StateKey};
pub use types::*;
