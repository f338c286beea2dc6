use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analytics::types::{
    CardProgress, ConfusionPair, DailyRecommendation, DifficultyAdjustment, DifficultyProfile,
    Flashcard, LearningInsight, LearningStyleProfile, MistakeRecord, PerformanceTrends,
    SessionComposition, SessionMetrics, StudyMode, WeakSpot,
};
use crate::analytics::LearningEngine;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid snapshot {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One learner's inputs for a batch run: completed sessions plus the
/// current card, progress and mistake snapshots.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearnerSnapshot {
    pub cards: Vec<Flashcard>,
    pub progress: Vec<CardProgress>,
    pub mistakes: Vec<MistakeRecord>,
    pub confusion_pairs: Vec<ConfusionPair>,
    pub sessions: Vec<SessionMetrics>,
    pub perfect_streak: u32,
    pub target_cards: Option<u32>,
    pub card_needs_typing: bool,
}

impl LearnerSnapshot {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub async fn load(path: &Path) -> Result<Self, SnapshotError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|source| SnapshotError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| SnapshotError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineReport {
    pub learner_id: String,
    pub recorded_sessions: usize,
    pub total_sessions: usize,
    pub reanalyzed: bool,
    pub analysis_version: u64,
    pub adjustments: Vec<DifficultyAdjustment>,
    pub difficulty: DifficultyProfile,
    pub learning_style: LearningStyleProfile,
    pub weak_spots: Vec<WeakSpot>,
    pub trends: PerformanceTrends,
    pub recommendations: DailyRecommendation,
    pub session_composition: SessionComposition,
    pub recommended_mode: StudyMode,
    pub active_insights: Vec<LearningInsight>,
}

/// Feeds a snapshot through the engine the way a client would after each
/// session, then builds today's plan.
pub fn process(engine: &mut LearningEngine, snapshot: &LearnerSnapshot) -> EngineReport {
    let mut adjustments = Vec::new();
    for metrics in &snapshot.sessions {
        engine.record_session(metrics);
        adjustments.extend(engine.check_and_adjust_difficulty(snapshot.perfect_streak));
    }

    let reanalyzed = engine.should_reanalyze() || !snapshot.sessions.is_empty();
    if reanalyzed {
        engine.analyze_performance(
            &snapshot.cards,
            &snapshot.progress,
            &snapshot.mistakes,
            &snapshot.confusion_pairs,
        );
    }

    let recommendations = engine.refresh_recommendations(&snapshot.cards, &snapshot.progress);
    let session_composition =
        engine.get_session_composition(&snapshot.cards, &snapshot.progress, snapshot.target_cards);

    EngineReport {
        learner_id: engine.learner_id().to_string(),
        recorded_sessions: snapshot.sessions.len(),
        total_sessions: engine.history().len(),
        reanalyzed,
        analysis_version: engine.state().analysis_version,
        adjustments,
        difficulty: engine.difficulty_profile().clone(),
        learning_style: engine.learning_style().clone(),
        weak_spots: engine.weak_spots().to_vec(),
        trends: engine.performance_trends().clone(),
        recommendations,
        session_composition,
        recommended_mode: engine.get_recommended_mode(snapshot.card_needs_typing),
        active_insights: engine.get_active_insights(),
    }
}
