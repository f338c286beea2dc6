use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::analytics::types::{
    CategoryPerformance, DailyRecommendation, DifficultyProfile, LearningInsight,
    LearningStyleProfile, PerformanceTrends, SessionPerformanceRecord, TimePerformance, WeakSpot,
};

/// Everything the engine derives for one learner. Collections are replaced
/// wholesale by each pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineState {
    pub history: VecDeque<SessionPerformanceRecord>,
    pub trends: PerformanceTrends,
    pub categories: Vec<CategoryPerformance>,
    pub time_buckets: Vec<TimePerformance>,
    pub weak_spots: Vec<WeakSpot>,
    pub difficulty: DifficultyProfile,
    pub style: LearningStyleProfile,
    pub daily: Option<DailyRecommendation>,
    pub insights: Vec<LearningInsight>,
    pub last_analysis_at: Option<DateTime<Utc>>,
    pub analysis_version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    DifficultyProfile,
    LearningStyleProfile,
    CategoryPerformance,
    TimePerformance,
    WeakSpots,
    Insights,
    Recommendations,
    PerformanceHistory,
    PerformanceTrends,
    LastAnalysisAt,
    AnalysisVersion,
}

impl StateKey {
    pub const ALL: [StateKey; 11] = [
        Self::DifficultyProfile,
        Self::LearningStyleProfile,
        Self::CategoryPerformance,
        Self::TimePerformance,
        Self::WeakSpots,
        Self::Insights,
        Self::Recommendations,
        Self::PerformanceHistory,
        Self::PerformanceTrends,
        Self::LastAnalysisAt,
        Self::AnalysisVersion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DifficultyProfile => "difficulty_profile",
            Self::LearningStyleProfile => "learning_style_profile",
            Self::CategoryPerformance => "category_performance",
            Self::TimePerformance => "time_performance",
            Self::WeakSpots => "weak_spots",
            Self::Insights => "insights",
            Self::Recommendations => "recommendations",
            Self::PerformanceHistory => "performance_history",
            Self::PerformanceTrends => "performance_trends",
            Self::LastAnalysisAt => "last_analysis_at",
            Self::AnalysisVersion => "analysis_version",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }
}

impl EngineState {
    /// Serializes each persisted key. History is trimmed to the newest
    /// `max_persisted_records`, oldest first.
    pub fn to_entries(&self, max_persisted_records: usize) -> Result<Vec<(StateKey, String)>, serde_json::Error> {
        let skip = self.history.len().saturating_sub(max_persisted_records);
        let history: Vec<&SessionPerformanceRecord> = self.history.iter().skip(skip).collect();

        Ok(vec![
            (StateKey::DifficultyProfile, serde_json::to_string(&self.difficulty)?),
            (StateKey::LearningStyleProfile, serde_json::to_string(&self.style)?),
            (StateKey::CategoryPerformance, serde_json::to_string(&self.categories)?),
            (StateKey::TimePerformance, serde_json::to_string(&self.time_buckets)?),
            (StateKey::WeakSpots, serde_json::to_string(&self.weak_spots)?),
            (StateKey::Insights, serde_json::to_string(&self.insights)?),
            (StateKey::Recommendations, serde_json::to_string(&self.daily)?),
            (StateKey::PerformanceHistory, serde_json::to_string(&history)?),
            (StateKey::PerformanceTrends, serde_json::to_string(&self.trends)?),
            (StateKey::LastAnalysisAt, serde_json::to_string(&self.last_analysis_at)?),
            (StateKey::AnalysisVersion, serde_json::to_string(&self.analysis_version)?),
        ])
    }

    /// Applies one persisted value. A value that fails to parse leaves the
    /// field at its default and is reported as `false`.
    pub fn apply_entry(&mut self, key: StateKey, raw: &str) -> bool {
        match key {
            StateKey::DifficultyProfile => restore(key, raw, &mut self.difficulty),
            StateKey::LearningStyleProfile => restore(key, raw, &mut self.style),
            StateKey::CategoryPerformance => restore(key, raw, &mut self.categories),
            StateKey::TimePerformance => restore(key, raw, &mut self.time_buckets),
            StateKey::WeakSpots => restore(key, raw, &mut self.weak_spots),
            StateKey::Insights => restore(key, raw, &mut self.insights),
            StateKey::Recommendations => restore(key, raw, &mut self.daily),
            StateKey::PerformanceHistory => restore_history(raw, &mut self.history),
            StateKey::PerformanceTrends => restore(key, raw, &mut self.trends),
            StateKey::LastAnalysisAt => restore(key, raw, &mut self.last_analysis_at),
            StateKey::AnalysisVersion => restore(key, raw, &mut self.analysis_version),
        }
    }
}

fn restore<T: DeserializeOwned + Default>(key: StateKey, raw: &str, slot: &mut T) -> bool {
    match serde_json::from_str::<T>(raw) {
        Ok(value) => {
            *slot = value;
            true
        }
        Err(e) => {
            tracing::warn!(key = key.as_str(), error = %e, "malformed persisted value, using default");
            *slot = T::default();
            false
        }
    }
}

/// History is restored record by record so one bad session does not cost
/// the learner the rest of their history.
fn restore_history(raw: &str, slot: &mut VecDeque<SessionPerformanceRecord>) -> bool {
    let values = match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(
                key = StateKey::PerformanceHistory.as_str(),
                error = %e,
                "malformed persisted value, using default"
            );
            slot.clear();
            return false;
        }
    };

    let total = values.len();
    let mut restored = VecDeque::with_capacity(total);
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<SessionPerformanceRecord>(value) {
            Ok(record) => restored.push_back(record),
            Err(e) => tracing::warn!(index, error = %e, "skipping malformed session record"),
        }
    }

    let clean = restored.len() == total;
    *slot = restored;
    clean
}
