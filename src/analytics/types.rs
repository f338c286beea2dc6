use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ========== Enumerations ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    #[default]
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 4] = [Self::Morning, Self::Afternoon, Self::Evening, Self::Night];

    /// Night wraps past midnight: 21:00 through 05:59.
    pub fn from_hour(hour: u32) -> Self {
        let hour = hour % 24;
        if hour >= 21 || hour < 6 {
            Self::Night
        } else if hour < 12 {
            Self::Morning
        } else if hour < 17 {
            Self::Afternoon
        } else {
            Self::Evening
        }
    }

    pub fn of<Tz: chrono::TimeZone>(timestamp: &DateTime<Tz>) -> Self {
        use chrono::Timelike;
        Self::from_hour(timestamp.hour())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyMode {
    #[default]
    Flashcards,
    MultipleChoice,
    Typing,
    Listening,
    Matching,
    Picture,
}

// Unknown modes fall back to `Flashcards`. Hand-written because
// `#[serde(other)]` is only allowed on the last variant, and reordering the
// variants would change the derived `Ord`.
impl<'de> Deserialize<'de> for StudyMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == raw)
            .unwrap_or(Self::Flashcards))
    }
}

impl StudyMode {
    pub const ALL: [StudyMode; 6] = [
        Self::Flashcards,
        Self::MultipleChoice,
        Self::Typing,
        Self::Listening,
        Self::Matching,
        Self::Picture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flashcards => "flashcards",
            Self::MultipleChoice => "multiple_choice",
            Self::Typing => "typing",
            Self::Listening => "listening",
            Self::Matching => "matching",
            Self::Picture => "picture",
        }
    }

    /// Fixed mode to style table used by the style classifier.
    pub fn styles(&self) -> &'static [LearningStyle] {
        match self {
            Self::Flashcards => &[LearningStyle::Visual, LearningStyle::Reading],
            Self::MultipleChoice => &[LearningStyle::Reading],
            Self::Typing => &[LearningStyle::Kinesthetic, LearningStyle::Reading],
            Self::Listening => &[LearningStyle::Auditory],
            Self::Matching => &[LearningStyle::Visual, LearningStyle::Kinesthetic],
            Self::Picture => &[LearningStyle::Visual],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyDirection {
    #[default]
    FrontToBack,
    BackToFront,
}

impl StudyDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FrontToBack => "front_to_back",
            Self::BackToFront => "back_to_front",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::FrontToBack => Self::BackToFront,
            Self::BackToFront => Self::FrontToBack,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MistakeType {
    Gender,
    Spelling,
    Meaning,
    Plural,
    #[default]
    #[serde(other)]
    Other,
}

impl MistakeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gender => "gender",
            Self::Spelling => "spelling",
            Self::Meaning => "meaning",
            Self::Plural => "plural",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningStyle {
    Visual,
    Auditory,
    Kinesthetic,
    Reading,
}

impl LearningStyle {
    pub const ALL: [LearningStyle; 4] = [
        Self::Visual,
        Self::Auditory,
        Self::Kinesthetic,
        Self::Reading,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visual => "visual",
            Self::Auditory => "auditory",
            Self::Kinesthetic => "kinesthetic",
            Self::Reading => "reading",
        }
    }

    /// The mode that best exercises this style, used as a fallback pick.
    pub fn preferred_mode(&self) -> StudyMode {
        match self {
            Self::Visual => StudyMode::Picture,
            Self::Auditory => StudyMode::Listening,
            Self::Kinesthetic => StudyMode::Typing,
            Self::Reading => StudyMode::MultipleChoice,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    #[default]
    Stable,
    Declining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyTrend {
    Up,
    Down,
    #[default]
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeakSpotType {
    Category,
    ErrorType,
    Direction,
    TimeBased,
    Mode,
}

impl WeakSpotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::ErrorType => "error_type",
            Self::Direction => "direction",
            Self::TimeBased => "time_based",
            Self::Mode => "mode",
        }
    }
}

// ========== Input snapshots ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: String,
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardProgress {
    pub card_id: String,
    #[serde(default)]
    pub direction: StudyDirection,
    pub ease_factor: f64,
    #[serde(default)]
    pub interval_days: u32,
    #[serde(default)]
    pub repetitions: u32,
    #[serde(default)]
    pub next_review: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_review: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MistakeRecord {
    pub card_id: String,
    #[serde(default)]
    pub mistake_type: MistakeType,
    #[serde(default)]
    pub direction: StudyDirection,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfusionPair {
    pub word1: String,
    pub word2: String,
    pub confusion_count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryStat {
    pub count: u32,
    pub accuracy: f64,
}

/// Raw outcome of one completed study session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionMetrics {
    pub duration_seconds: u32,
    pub cards_reviewed: u32,
    pub planned_cards: Option<u32>,
    pub new_cards: Option<u32>,
    pub accuracy: f64,
    pub average_quality: f64,
    pub average_response_time_ms: f64,
    pub study_mode: StudyMode,
    pub category_breakdown: BTreeMap<String, CategoryStat>,
    pub mistake_counts: BTreeMap<MistakeType, u32>,
}

// ========== History ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionPerformanceRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub time_of_day: TimeOfDay,
    pub duration_seconds: u32,
    pub cards_reviewed: u32,
    pub new_cards: u32,
    pub accuracy: f64,
    pub average_quality: f64,
    pub average_response_time_ms: f64,
    pub study_mode: StudyMode,
    pub category_breakdown: BTreeMap<String, CategoryStat>,
    pub mistake_counts: BTreeMap<MistakeType, u32>,
    pub completion_rate: f64,
}

impl Default for SessionPerformanceRecord {
    fn default() -> Self {
        Self {
            id: String::new(),
            timestamp: DateTime::<Utc>::default(),
            time_of_day: TimeOfDay::default(),
            duration_seconds: 0,
            cards_reviewed: 0,
            new_cards: 0,
            accuracy: 0.0,
            average_quality: 3.0,
            average_response_time_ms: 0.0,
            study_mode: StudyMode::default(),
            category_breakdown: BTreeMap::new(),
            mistake_counts: BTreeMap::new(),
            completion_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub period: String,
    pub start_date: NaiveDate,
    pub sessions: u32,
    pub accuracy: f64,
    pub cards_reviewed: u32,
    pub study_seconds: u32,
    pub average_response_time_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OverallTrend {
    pub accuracy_trend: TrendDirection,
    pub speed_trend: TrendDirection,
    pub consistency_score: f64,
    pub predicted_mastery_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceTrends {
    pub daily: Vec<TrendPoint>,
    pub weekly: Vec<TrendPoint>,
    pub monthly: Vec<TrendPoint>,
    pub overall: OverallTrend,
}

// ========== Aggregates ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryPerformance {
    pub category: String,
    pub subcategory: Option<String>,
    pub total_reviewed: u32,
    pub total_correct: u32,
    pub total_incorrect: u32,
    pub accuracy: f64,
    pub average_ease_factor: f64,
    pub average_response_time_ms: f64,
    pub mastered_count: u32,
    pub struggling_count: u32,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub error_distribution: BTreeMap<MistakeType, u32>,
    pub trend: TrendDirection,
    pub confidence: f64,
    pub card_ids: Vec<String>,
}

impl Default for CategoryPerformance {
    fn default() -> Self {
        Self {
            category: String::new(),
            subcategory: None,
            total_reviewed: 0,
            total_correct: 0,
            total_incorrect: 0,
            accuracy: 0.0,
            average_ease_factor: 2.5,
            average_response_time_ms: 0.0,
            mastered_count: 0,
            struggling_count: 0,
            last_reviewed: None,
            error_distribution: BTreeMap::new(),
            trend: TrendDirection::Stable,
            confidence: 0.0,
            card_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TimePerformance {
    pub time_of_day: TimeOfDay,
    pub session_count: u32,
    pub average_accuracy: f64,
    pub average_response_time_ms: f64,
    pub average_cards_per_session: f64,
    pub optimal_score: f64,
}

// ========== Weak spots ==========

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeakSpot {
    pub id: String,
    #[serde(rename = "type")]
    pub spot_type: WeakSpotType,
    pub target: String,
    pub severity: Severity,
    pub score: f64,
    pub description: String,
    pub suggested_action: String,
    #[serde(default)]
    pub affected_card_ids: Vec<String>,
    pub detected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WeakSpot {
    pub fn stable_id(spot_type: WeakSpotType, target: &str) -> String {
        format!("{}:{}", spot_type.as_str(), slug(target))
    }
}

/// Lowercased identifier fragment; anything but letters and digits becomes `-`.
pub fn slug(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect()
}

// ========== Difficulty ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    HighAccuracy,
    LowAccuracy,
    FastResponses,
    SlowResponses,
    PerfectStreak,
    Mixed,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerMetrics {
    pub recent_accuracy: f64,
    pub recent_response_time_ms: f64,
    pub perfect_streak: u32,
    pub target_level: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyAdjustment {
    pub previous_level: u8,
    pub new_level: u8,
    pub reason: AdjustmentReason,
    #[serde(default)]
    pub metrics: TriggerMetrics,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DifficultyProfile {
    pub level: u8,
    pub category_levels: BTreeMap<String, u8>,
    pub recent_trend: DifficultyTrend,
    pub last_adjustment: Option<DateTime<Utc>>,
    pub history: Vec<DifficultyAdjustment>,
}

impl Default for DifficultyProfile {
    fn default() -> Self {
        Self {
            level: 5,
            category_levels: BTreeMap::new(),
            recent_trend: DifficultyTrend::Stable,
            last_adjustment: None,
            history: Vec::new(),
        }
    }
}

// ========== Learning style ==========

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ModeEffectiveness {
    pub sessions: u32,
    pub cards_reviewed: u32,
    pub average_accuracy: f64,
    pub average_quality: f64,
    pub retention_rate: f64,
    pub average_response_time_ms: f64,
    pub engagement: f64,
    pub confidence: f64,
    pub effectiveness_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleScores {
    pub visual: f64,
    pub auditory: f64,
    pub kinesthetic: f64,
    pub reading: f64,
}

impl Default for StyleScores {
    fn default() -> Self {
        Self {
            visual: 50.0,
            auditory: 50.0,
            kinesthetic: 50.0,
            reading: 50.0,
        }
    }
}

impl StyleScores {
    pub fn get(&self, style: LearningStyle) -> f64 {
        match style {
            LearningStyle::Visual => self.visual,
            LearningStyle::Auditory => self.auditory,
            LearningStyle::Kinesthetic => self.kinesthetic,
            LearningStyle::Reading => self.reading,
        }
    }

    pub fn set(&mut self, style: LearningStyle, value: f64) {
        let value = value.clamp(0.0, 100.0);
        match style {
            LearningStyle::Visual => self.visual = value,
            LearningStyle::Auditory => self.auditory = value,
            LearningStyle::Kinesthetic => self.kinesthetic = value,
            LearningStyle::Reading => self.reading = value,
        }
    }

    /// Styles ordered by score, ties broken by declaration order.
    pub fn ranked(&self) -> Vec<(LearningStyle, f64)> {
        let mut ranked: Vec<(LearningStyle, f64)> =
            LearningStyle::ALL.iter().map(|s| (*s, self.get(*s))).collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LearningStyleProfile {
    pub primary_style: Option<LearningStyle>,
    pub secondary_style: Option<LearningStyle>,
    pub scores: StyleScores,
    pub mode_effectiveness: BTreeMap<StudyMode, ModeEffectiveness>,
    pub confidence: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

// ========== Recommendations ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    StreakAtRisk,
    ReviewDue,
    WeaknessDrill,
    FocusErrorType,
    CategoryFocus,
    NewCards,
    ModePractice,
}

impl RecommendationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StreakAtRisk => "streak_at_risk",
            Self::ReviewDue => "review_due",
            Self::WeaknessDrill => "weakness_drill",
            Self::FocusErrorType => "focus_error_type",
            Self::CategoryFocus => "category_focus",
            Self::NewCards => "new_cards",
            Self::ModePractice => "mode_practice",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyRecommendation {
    pub id: String,
    #[serde(rename = "type")]
    pub recommendation_type: RecommendationType,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    pub priority: u32,
    pub priority_score: f64,
    pub suggested_card_count: u32,
    pub estimated_time_minutes: u32,
    #[serde(default)]
    pub card_ids: Vec<String>,
    #[serde(default)]
    pub study_mode: Option<StudyMode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyRecommendation {
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub recommendations: Vec<StudyRecommendation>,
    pub focus_areas: Vec<String>,
    pub suggested_total_minutes: u32,
    pub optimal_time_slots: Vec<TimeOfDay>,
}

impl Default for DailyRecommendation {
    fn default() -> Self {
        Self {
            date: NaiveDate::default(),
            generated_at: DateTime::<Utc>::default(),
            recommendations: Vec::new(),
            focus_areas: Vec::new(),
            suggested_total_minutes: 0,
            optimal_time_slots: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyDistribution {
    pub easy: u32,
    pub medium: u32,
    pub hard: u32,
}

impl DifficultyDistribution {
    pub fn total(&self) -> u32 {
        self.easy + self.medium + self.hard
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionComposition {
    pub total_cards: u32,
    pub new_cards: u32,
    pub review_cards: u32,
    pub weakness_cards: u32,
    pub category_breakdown: BTreeMap<String, u32>,
    pub mode_breakdown: BTreeMap<StudyMode, u32>,
    pub estimated_minutes: u32,
    pub difficulty_distribution: DifficultyDistribution,
}

// ========== Insights ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    WeakSpot,
    Recommendation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningInsight {
    pub id: String,
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    #[serde(default)]
    pub source_key: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub dismissed: bool,
    #[serde(default)]
    pub action_taken: bool,
}

impl LearningInsight {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.dismissed && !self.is_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn night_bucket_wraps_past_midnight() {
        for hour in [21, 22, 23, 0, 1, 5] {
            assert_eq!(TimeOfDay::from_hour(hour), TimeOfDay::Night, "hour {hour}");
        }
        assert_eq!(TimeOfDay::from_hour(6), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(11), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(20), TimeOfDay::Evening);
    }

    #[test]
    fn unknown_mistake_type_falls_back_to_other() {
        let parsed: MistakeType = serde_json::from_str("\"article\"").unwrap();
        assert_eq!(parsed, MistakeType::Other);
        let parsed: MistakeType = serde_json::from_str("\"gender\"").unwrap();
        assert_eq!(parsed, MistakeType::Gender);
    }

    #[test]
    fn weak_spot_ids_are_stable_slugs() {
        assert_eq!(WeakSpot::stable_id(WeakSpotType::Category, "Verbs"), "category:verbs");
        assert_eq!(
            WeakSpot::stable_id(WeakSpotType::TimeBased, " Night Owl "),
            "time_based:night-owl"
        );
    }

    #[test]
    fn style_ranking_breaks_ties_by_declaration_order() {
        let scores = StyleScores::default();
        let ranked = scores.ranked();
        assert_eq!(ranked[0].0, LearningStyle::Visual);
        assert_eq!(ranked[3].0, LearningStyle::Reading);
    }

    #[test]
    fn malformed_record_rehydrates_with_defaults() {
        let record: SessionPerformanceRecord =
            serde_json::from_str(r#"{"accuracy": 80.0, "studyMode": "typing"}"#).unwrap();
        assert_eq!(record.accuracy, 80.0);
        assert_eq!(record.study_mode, StudyMode::Typing);
        assert_eq!(record.cards_reviewed, 0);
        assert_eq!(record.completion_rate, 1.0);
    }
}
