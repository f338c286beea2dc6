use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::analytics::config::EngineConfig;
use crate::analytics::persistence::EngineStore;
use crate::analytics::recommendation::RecommendationContext;
use crate::analytics::state::EngineState;
use crate::analytics::types::*;
use crate::analytics::weak_spots::DetectionInput;
use crate::analytics::{
    aggregator, difficulty, insights, recommendation, recorder, style, weak_spots,
};
use crate::db::StoreError;

/// Per-learner adaptive engine. Owns all derived state; callers read it
/// through the accessors and hand in fresh snapshots for each pass.
pub struct LearningEngine {
    learner_id: String,
    config: EngineConfig,
    state: EngineState,
    persistence: Option<StateWriter>,
    last_mistakes: Vec<MistakeRecord>,
}

/// Background saver for one engine. A single task drains a watch channel,
/// so saves land in mutation order and a burst collapses to its last state.
struct StateWriter {
    store: Arc<EngineStore>,
    latest: Option<watch::Sender<Option<EngineState>>>,
}

impl LearningEngine {
    pub fn new(learner_id: impl Into<String>, config: EngineConfig) -> Self {
        Self::from_state(learner_id, config, EngineState::default())
    }

    pub fn from_state(learner_id: impl Into<String>, config: EngineConfig, mut state: EngineState) -> Self {
        while state.history.len() > config.history.max_history_records.max(1) {
            state.history.pop_front();
        }
        state.difficulty.level = difficulty::clamp_level(&config.difficulty, state.difficulty.level as f64);

        Self {
            learner_id: learner_id.into(),
            config,
            state,
            persistence: None,
            last_mistakes: Vec::new(),
        }
    }

    /// Loads persisted state, starting fresh when nothing is stored or the
    /// store cannot be read.
    pub async fn load(learner_id: impl Into<String>, config: EngineConfig, store: Arc<EngineStore>) -> Self {
        let learner_id = learner_id.into();
        let state = match store.load_state(&learner_id).await {
            Ok(Some(state)) => state,
            Ok(None) => EngineState::default(),
            Err(e) => {
                tracing::warn!(learner_id = %learner_id, error = %e, "failed to load engine state");
                EngineState::default()
            }
        };
        Self::from_state(learner_id, config, state).with_persistence(store)
    }

    pub fn with_persistence(mut self, store: Arc<EngineStore>) -> Self {
        self.persistence = Some(StateWriter { store, latest: None });
        self
    }

    // ========== Sessions & difficulty ==========

    pub fn record_session(&mut self, metrics: &SessionMetrics) -> SessionPerformanceRecord {
        let now = Utc::now();
        let bucket = TimeOfDay::of(&chrono::Local::now());
        self.record_session_at(metrics, now, bucket)
    }

    pub fn record_session_at(
        &mut self,
        metrics: &SessionMetrics,
        now: DateTime<Utc>,
        time_of_day: TimeOfDay,
    ) -> SessionPerformanceRecord {
        let record = recorder::build_record(metrics, now, time_of_day);
        recorder::append_record(
            &mut self.state.history,
            record.clone(),
            self.config.history.max_history_records,
        );
        self.state.trends = recorder::compute_trends(&self.state.history, &self.config.history, now.date_naive());

        tracing::debug!(
            learner_id = %self.learner_id,
            session_id = %record.id,
            accuracy = record.accuracy,
            history = self.state.history.len(),
            "session recorded"
        );
        self.schedule_persist();
        record
    }

    pub fn check_and_adjust_difficulty(&mut self, perfect_streak: u32) -> Option<DifficultyAdjustment> {
        self.check_and_adjust_difficulty_at(perfect_streak, Utc::now())
    }

    pub fn check_and_adjust_difficulty_at(
        &mut self,
        perfect_streak: u32,
        now: DateTime<Utc>,
    ) -> Option<DifficultyAdjustment> {
        let before = self.state.difficulty.category_levels.clone();
        let adjustment = difficulty::check_and_adjust(
            &self.config.difficulty,
            &mut self.state.difficulty,
            &self.state.history,
            perfect_streak,
            now,
        );
        if adjustment.is_some() || before != self.state.difficulty.category_levels {
            self.schedule_persist();
        }
        adjustment
    }

    pub fn set_difficulty_level(&mut self, level: i64) -> DifficultyAdjustment {
        let adjustment = difficulty::set_level(&self.config.difficulty, &mut self.state.difficulty, level, Utc::now());
        self.schedule_persist();
        adjustment
    }

    // ========== Analysis ==========

    pub fn should_reanalyze(&self) -> bool {
        self.should_reanalyze_at(Utc::now())
    }

    pub fn should_reanalyze_at(&self, now: DateTime<Utc>) -> bool {
        match self.state.last_analysis_at {
            None => true,
            Some(last) => now - last >= self.config.reanalysis_interval(),
        }
    }

    pub fn analyze_performance(
        &mut self,
        cards: &[Flashcard],
        progress: &[CardProgress],
        mistakes: &[MistakeRecord],
        confusion_pairs: &[ConfusionPair],
    ) {
        self.analyze_performance_at(cards, progress, mistakes, confusion_pairs, Utc::now());
    }

    pub fn analyze_performance_at(
        &mut self,
        cards: &[Flashcard],
        progress: &[CardProgress],
        mistakes: &[MistakeRecord],
        confusion_pairs: &[ConfusionPair],
        now: DateTime<Utc>,
    ) {
        let aggregates = aggregator::aggregate(&self.config, &self.state.history, cards, progress, mistakes, now);

        let detected = weak_spots::detect(
            &self.config.weak_spots,
            &DetectionInput {
                categories: &aggregates.categories,
                time_buckets: &aggregates.time_buckets,
                history: &self.state.history,
                cards,
                progress,
                mistakes,
                confusion_pairs,
                previous: &self.state.weak_spots,
            },
            now,
        );

        if let Some(profile) = style::classify(&self.config.style, &self.state.history, now) {
            self.state.style = profile;
        }

        self.state.categories = aggregates.categories;
        self.state.time_buckets = aggregates.time_buckets;
        self.state.weak_spots = detected;
        self.state.last_analysis_at = Some(now);
        self.state.analysis_version += 1;
        self.last_mistakes = mistakes.to_vec();

        insights::reconcile(
            &self.config.insights,
            &mut self.state.insights,
            &self.state.weak_spots,
            self.state.daily.as_ref(),
            now,
        );

        tracing::info!(
            learner_id = %self.learner_id,
            version = self.state.analysis_version,
            categories = self.state.categories.len(),
            weak_spots = self.state.weak_spots.len(),
            "performance analyzed"
        );
        self.schedule_persist();
    }

    // ========== Recommendations ==========

    fn recommendation_context<'a>(
        &'a self,
        cards: &'a [Flashcard],
        progress: &'a [CardProgress],
    ) -> RecommendationContext<'a> {
        RecommendationContext {
            history: &self.state.history,
            weak_spots: &self.state.weak_spots,
            time_buckets: &self.state.time_buckets,
            style: &self.state.style,
            difficulty: &self.state.difficulty,
            cards,
            progress,
            mistakes: &self.last_mistakes,
        }
    }

    pub fn refresh_recommendations(&mut self, cards: &[Flashcard], progress: &[CardProgress]) -> DailyRecommendation {
        self.refresh_recommendations_at(cards, progress, Utc::now())
    }

    pub fn refresh_recommendations_at(
        &mut self,
        cards: &[Flashcard],
        progress: &[CardProgress],
        now: DateTime<Utc>,
    ) -> DailyRecommendation {
        let daily = recommendation::generate_daily(&self.config, &self.recommendation_context(cards, progress), now);
        self.state.daily = Some(daily.clone());

        insights::reconcile(
            &self.config.insights,
            &mut self.state.insights,
            &self.state.weak_spots,
            self.state.daily.as_ref(),
            now,
        );

        tracing::debug!(
            learner_id = %self.learner_id,
            recommendations = daily.recommendations.len(),
            minutes = daily.suggested_total_minutes,
            "recommendations refreshed"
        );
        self.schedule_persist();
        daily
    }

    pub fn get_session_composition(
        &self,
        cards: &[Flashcard],
        progress: &[CardProgress],
        target_cards: Option<u32>,
    ) -> SessionComposition {
        self.get_session_composition_at(cards, progress, target_cards, Utc::now())
    }

    pub fn get_session_composition_at(
        &self,
        cards: &[Flashcard],
        progress: &[CardProgress],
        target_cards: Option<u32>,
        now: DateTime<Utc>,
    ) -> SessionComposition {
        recommendation::compose_session(&self.config, &self.recommendation_context(cards, progress), target_cards, now)
    }

    pub fn get_recommended_mode(&self, card_needs_typing: bool) -> StudyMode {
        style::recommended_mode(&self.config.style, &self.state.style, card_needs_typing)
    }

    // ========== Insights ==========

    pub fn get_active_insights(&self) -> Vec<LearningInsight> {
        self.get_active_insights_at(Utc::now())
    }

    pub fn get_active_insights_at(&self, now: DateTime<Utc>) -> Vec<LearningInsight> {
        insights::active(&self.state.insights, now)
    }

    pub fn dismiss_insight(&mut self, id: &str) -> bool {
        let found = insights::dismiss(&mut self.state.insights, id);
        if found {
            self.schedule_persist();
        }
        found
    }

    pub fn mark_insight_action_taken(&mut self, id: &str) -> bool {
        let found = insights::mark_action_taken(&mut self.state.insights, id);
        if found {
            self.schedule_persist();
        }
        found
    }

    pub fn get_critical_weak_spots(&self) -> Vec<WeakSpot> {
        self.state
            .weak_spots
            .iter()
            .filter(|s| s.severity == Severity::Critical)
            .cloned()
            .collect()
    }

    // ========== Accessors ==========

    pub fn learner_id(&self) -> &str {
        &self.learner_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn history(&self) -> &VecDeque<SessionPerformanceRecord> {
        &self.state.history
    }

    pub fn performance_trends(&self) -> &PerformanceTrends {
        &self.state.trends
    }

    pub fn category_performance(&self) -> &[CategoryPerformance] {
        &self.state.categories
    }

    pub fn time_performance(&self) -> &[TimePerformance] {
        &self.state.time_buckets
    }

    pub fn weak_spots(&self) -> &[WeakSpot] {
        &self.state.weak_spots
    }

    pub fn difficulty_profile(&self) -> &DifficultyProfile {
        &self.state.difficulty
    }

    pub fn learning_style(&self) -> &LearningStyleProfile {
        &self.state.style
    }

    pub fn daily_recommendation(&self) -> Option<&DailyRecommendation> {
        self.state.daily.as_ref()
    }

    pub fn insights(&self) -> &[LearningInsight] {
        &self.state.insights
    }

    // ========== Persistence ==========

    pub async fn persist_now(&self) -> Result<(), StoreError> {
        let Some(writer) = &self.persistence else {
            return Ok(());
        };
        writer
            .store
            .save_state(&self.learner_id, &self.state, self.config.history.max_persisted_records)
            .await
    }

    fn schedule_persist(&mut self) {
        let Some(writer) = self.persistence.as_mut() else {
            return;
        };

        if let Some(latest) = &writer.latest {
            if latest.send(Some(self.state.clone())).is_ok() {
                return;
            }
            // The writer's runtime is gone; start a new one below.
            writer.latest = None;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::debug!(learner_id = %self.learner_id, "no async runtime, skipping state save");
                return;
            }
        };

        let (latest, pending) = watch::channel(None);
        handle.spawn(write_latest(
            writer.store.clone(),
            self.learner_id.clone(),
            self.config.history.max_persisted_records,
            pending,
        ));
        latest.send_replace(Some(self.state.clone()));
        writer.latest = Some(latest);
    }
}

async fn write_latest(
    store: Arc<EngineStore>,
    learner_id: String,
    max_records: usize,
    mut pending: watch::Receiver<Option<EngineState>>,
) {
    while pending.changed().await.is_ok() {
        let latest = pending.borrow_and_update().clone();
        let Some(state) = latest else {
            continue;
        };
        if let Err(e) = store.save_state(&learner_id, &state, max_records).await {
            tracing::warn!(learner_id = %learner_id, error = %e, "failed to persist engine state");
        }
    }
    tracing::debug!(learner_id = %learner_id, "state writer stopped");
}
