use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryParams {
    pub max_history_records: usize,
    pub max_persisted_records: usize,
    pub trend_window_days: i64,
    pub trend_change_points: f64,
    pub speed_change_ratio: f64,
    pub mastery_accuracy: f64,
    pub max_mastery_horizon_days: i64,
}

impl Default for HistoryParams {
    fn default() -> Self {
        Self {
            max_history_records: 100,
            max_persisted_records: 50,
            trend_window_days: 7,
            trend_change_points: 5.0,
            speed_change_ratio: 0.1,
            mastery_accuracy: 90.0,
            max_mastery_horizon_days: 365,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationParams {
    pub confidence_sample_curve: f64,
    pub mastered_interval_days: u32,
    pub mastered_ease_factor: f64,
    pub struggling_ease_factor: f64,
    pub category_trend_change_ratio: f64,
    pub speed_baseline_ms: f64,
    pub volume_baseline_cards: f64,
}

impl Default for AggregationParams {
    fn default() -> Self {
        Self {
            confidence_sample_curve: 50.0,
            mastered_interval_days: 21,
            mastered_ease_factor: 2.5,
            struggling_ease_factor: 1.8,
            category_trend_change_ratio: 0.2,
            speed_baseline_ms: 10_000.0,
            volume_baseline_cards: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeakSpotParams {
    pub min_samples_for_analysis: u32,
    pub min_category_samples: u32,
    pub min_time_bucket_sessions: u32,
    pub min_confusion_count: u32,
    pub weak_ease_factor_threshold: f64,
    pub min_ease_factor: f64,
    pub weak_accuracy_threshold: f64,
    pub accuracy_floor: f64,
    pub ease_deficit_weight: f64,
    pub accuracy_deficit_weight: f64,
    pub critical_severity_threshold: f64,
    pub warning_severity_threshold: f64,
    pub error_type_dominance_threshold: f64,
    pub direction_asymmetry_threshold: f64,
    pub time_accuracy_difference_threshold: f64,
    pub recency_weight_factor: f64,
    pub recent_mistake_window_days: i64,
}

impl Default for WeakSpotParams {
    fn default() -> Self {
        Self {
            min_samples_for_analysis: 10,
            min_category_samples: 10,
            min_time_bucket_sessions: 2,
            min_confusion_count: 3,
            weak_ease_factor_threshold: 2.2,
            min_ease_factor: 1.3,
            weak_accuracy_threshold: 70.0,
            accuracy_floor: 30.0,
            ease_deficit_weight: 0.5,
            accuracy_deficit_weight: 0.5,
            critical_severity_threshold: 65.0,
            warning_severity_threshold: 35.0,
            error_type_dominance_threshold: 0.4,
            direction_asymmetry_threshold: 15.0,
            time_accuracy_difference_threshold: 15.0,
            recency_weight_factor: 1.5,
            recent_mistake_window_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyParams {
    pub min_level: u8,
    pub max_level: u8,
    pub default_level: u8,
    pub min_sessions_for_adjustment: usize,
    pub min_category_samples: u32,
    pub recent_sessions_window: usize,
    pub increase_accuracy_threshold: f64,
    pub decrease_accuracy_threshold: f64,
    pub fast_response_ms: f64,
    pub slow_response_ms: f64,
    pub perfect_streak_threshold: u32,
    pub smoothing_factor: f64,
    pub max_adjustment_history: usize,
}

impl Default for DifficultyParams {
    fn default() -> Self {
        Self {
            min_level: 1,
            max_level: 10,
            default_level: 5,
            min_sessions_for_adjustment: 3,
            min_category_samples: 10,
            recent_sessions_window: 5,
            increase_accuracy_threshold: 90.0,
            decrease_accuracy_threshold: 60.0,
            fast_response_ms: 3_000.0,
            slow_response_ms: 8_000.0,
            perfect_streak_threshold: 10,
            smoothing_factor: 0.5,
            max_adjustment_history: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleParams {
    pub min_sessions_for_style: usize,
    pub min_mode_samples: u32,
    pub accuracy_weight: f64,
    pub retention_weight: f64,
    pub quality_weight: f64,
    pub engagement_weight: f64,
    pub max_response_time_ms: f64,
    pub secondary_style_margin: f64,
    pub full_confidence_sessions: f64,
}

impl Default for StyleParams {
    fn default() -> Self {
        Self {
            min_sessions_for_style: 5,
            min_mode_samples: 3,
            accuracy_weight: 0.4,
            retention_weight: 0.25,
            quality_weight: 0.2,
            engagement_weight: 0.15,
            max_response_time_ms: 30_000.0,
            secondary_style_margin: 10.0,
            full_confidence_sessions: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationParams {
    pub max_daily_recommendations: usize,
    pub seconds_per_card_estimate: f64,
    pub max_session_duration_minutes: u32,
    pub new_card_ratio_beginner: f64,
    pub new_card_ratio_advanced: f64,
    pub advanced_experience_cards: u32,
    pub low_coverage_threshold: f64,
    pub effective_mode_threshold: f64,
    pub underused_mode_share: f64,
    pub streak_risk_threshold_days: i64,
    pub weakness_card_ratio: f64,
    pub default_session_cards: u32,
    pub max_new_cards_per_day: u32,
}

impl Default for RecommendationParams {
    fn default() -> Self {
        Self {
            max_daily_recommendations: 5,
            seconds_per_card_estimate: 15.0,
            max_session_duration_minutes: 30,
            new_card_ratio_beginner: 0.3,
            new_card_ratio_advanced: 0.15,
            advanced_experience_cards: 500,
            low_coverage_threshold: 0.3,
            effective_mode_threshold: 70.0,
            underused_mode_share: 0.15,
            streak_risk_threshold_days: 2,
            weakness_card_ratio: 0.2,
            default_session_cards: 20,
            max_new_cards_per_day: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightParams {
    pub insight_expiry_hours: i64,
    pub max_new_insights_per_pass: usize,
}

impl Default for InsightParams {
    fn default() -> Self {
        Self {
            insight_expiry_hours: 24,
            max_new_insights_per_pass: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub history: HistoryParams,
    pub aggregation: AggregationParams,
    pub weak_spots: WeakSpotParams,
    pub difficulty: DifficultyParams,
    pub style: StyleParams,
    pub recommendation: RecommendationParams,
    pub insights: InsightParams,
    pub reanalysis_interval_ms: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history: HistoryParams::default(),
            aggregation: AggregationParams::default(),
            weak_spots: WeakSpotParams::default(),
            difficulty: DifficultyParams::default(),
            style: StyleParams::default(),
            recommendation: RecommendationParams::default(),
            insights: InsightParams::default(),
            reanalysis_interval_ms: 30 * 60 * 1000,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(val) = env_parse::<i64>("ENGINE_REANALYSIS_INTERVAL_MINUTES") {
            config.reanalysis_interval_ms = val.max(0) * 60 * 1000;
        }
        if let Some(val) = env_parse::<f64>("ENGINE_SMOOTHING_FACTOR") {
            config.difficulty.smoothing_factor = val.clamp(0.0, 1.0);
        }
        if let Some(val) = env_parse::<usize>("ENGINE_MAX_DAILY_RECOMMENDATIONS") {
            config.recommendation.max_daily_recommendations = val;
        }
        if let Some(val) = env_parse::<u32>("ENGINE_MAX_SESSION_MINUTES") {
            config.recommendation.max_session_duration_minutes = val.max(1);
        }
        if let Some(val) = env_parse::<i64>("ENGINE_INSIGHT_EXPIRY_HOURS") {
            config.insights.insight_expiry_hours = val.max(1);
        }

        config
    }

    pub fn reanalysis_interval(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.reanalysis_interval_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
