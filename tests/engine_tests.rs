//! Integration tests for LearningEngine driven through its public API.

mod common;

use chrono::Duration;

use common::{card, days_ago, fixed_now, mistake, progress, session};
use danci_learning_engine::analytics::types::{
    AdjustmentReason, LearningStyle, MistakeType, RecommendationType, Severity, StudyMode,
    TimeOfDay, WeakSpotType,
};
use danci_learning_engine::analytics::{EngineConfig, LearningEngine};

fn engine() -> LearningEngine {
    LearningEngine::new("learner-test", EngineConfig::default())
}

fn verbs_fixture() -> (Vec<danci_learning_engine::analytics::Flashcard>, Vec<danci_learning_engine::analytics::CardProgress>) {
    let cards: Vec<_> = (0..8).map(|i| card(&format!("verb-{i}"), "Verbs")).collect();
    let progress: Vec<_> = cards.iter().map(|c| progress(&c.id, 1.8, 2)).collect();
    (cards, progress)
}

// ============================================================================
// Session recording
// ============================================================================

#[test]
fn history_keeps_most_recent_sessions_in_order() {
    let mut config = EngineConfig::default();
    config.history.max_history_records = 5;
    let mut engine = LearningEngine::new("learner-test", config);

    let mut ids = Vec::new();
    for i in 0..8 {
        let record = engine.record_session_at(
            &session("Verbs", 10, 50.0 + i as f64, 4000.0),
            days_ago(8 - i),
            TimeOfDay::Morning,
        );
        ids.push(record.id);
    }

    let kept: Vec<String> = engine.history().iter().map(|r| r.id.clone()).collect();
    assert_eq!(kept, ids[3..].to_vec());
}

#[test]
fn trends_follow_recorded_sessions() {
    let mut engine = engine();
    for (i, accuracy) in [60.0, 65.0, 70.0, 80.0, 85.0, 90.0].iter().enumerate() {
        engine.record_session_at(
            &session("Verbs", 10, *accuracy, 4000.0),
            fixed_now() - Duration::days(5 - i as i64),
            TimeOfDay::Evening,
        );
    }
    let trends = engine.performance_trends();
    assert_eq!(trends.daily.len(), 6);
    assert_eq!(
        trends.overall.accuracy_trend,
        danci_learning_engine::analytics::TrendDirection::Improving
    );
}

// ============================================================================
// Weak spots
// ============================================================================

#[test]
fn struggling_verbs_produce_one_category_weak_spot() {
    let mut engine = engine();
    let (cards, progress) = verbs_fixture();
    for i in 0..12 {
        engine.record_session_at(&session("Verbs", 10, 55.0, 5000.0), days_ago(12 - i), TimeOfDay::Morning);
    }

    engine.analyze_performance_at(&cards, &progress, &[], &[], fixed_now());

    let spots = engine.weak_spots();
    assert_eq!(spots.len(), 1, "unexpected spots: {spots:?}");
    assert_eq!(spots[0].spot_type, WeakSpotType::Category);
    assert_eq!(spots[0].target, "Verbs");
    assert!(spots[0].severity >= Severity::Warning);
    assert_eq!(spots[0].affected_card_ids.len(), 8);
}

#[test]
fn weak_spot_detection_is_deterministic() {
    let (cards, progress) = verbs_fixture();
    let mistakes: Vec<_> = (0..12)
        .map(|i| mistake(&format!("verb-{}", i % 8), MistakeType::Gender, days_ago(i)))
        .collect();

    let run = || {
        let mut engine = engine();
        for i in 0..12 {
            engine.record_session_at(&session("Verbs", 10, 55.0, 5000.0), days_ago(12 - i), TimeOfDay::Morning);
        }
        engine.analyze_performance_at(&cards, &progress, &mistakes, &[], fixed_now());
        engine.weak_spots().to_vec()
    };

    assert_eq!(run(), run());
}

#[test]
fn unreviewed_categories_never_become_weak_spots() {
    let mut engine = engine();
    let cards = vec![card("n1", "Nouns"), card("n2", "Nouns")];
    engine.analyze_performance_at(&cards, &[], &[], &[], fixed_now());
    assert!(engine
        .weak_spots()
        .iter()
        .all(|s| s.spot_type != WeakSpotType::Category || s.target != "Nouns"));
}

fn morning_and_night_sessions(engine: &mut LearningEngine) {
    for i in 0..4 {
        engine.record_session_at(&session("Verbs", 10, 95.0, 3000.0), days_ago(6 - i), TimeOfDay::Morning);
    }
    for i in 0..2 {
        engine.record_session_at(&session("Verbs", 10, 40.0, 6000.0), days_ago(2 - i), TimeOfDay::Night);
    }
}

#[test]
fn night_weakness_lists_cards_missed_at_night() {
    let mut engine = engine();
    morning_and_night_sessions(&mut engine);
    let late = fixed_now() + Duration::hours(13) - Duration::days(1);
    let mistakes = vec![
        mistake("verb-1", MistakeType::Meaning, late),
        mistake("verb-2", MistakeType::Spelling, late - Duration::days(1)),
        mistake("verb-3", MistakeType::Meaning, days_ago(1)),
    ];

    engine.analyze_performance_at(&[], &[], &mistakes, &[], fixed_now());

    let night = engine
        .weak_spots()
        .iter()
        .find(|s| s.id == "time_based:night")
        .expect("night spot");
    assert_eq!(night.affected_card_ids, vec!["verb-1".to_string(), "verb-2".to_string()]);
}

#[test]
fn weak_spots_always_name_cards_to_practice() {
    let mut engine = engine();
    morning_and_night_sessions(&mut engine);

    engine.analyze_performance_at(&[], &[], &[], &[], fixed_now());

    assert!(engine.weak_spots().iter().all(|s| s.spot_type != WeakSpotType::TimeBased));
    assert!(engine.weak_spots().iter().all(|s| !s.affected_card_ids.is_empty()));
}

// ============================================================================
// Difficulty
// ============================================================================

#[test]
fn strong_recent_sessions_raise_difficulty() {
    let mut engine = engine();
    for i in 0..5 {
        engine.record_session_at(&session("Verbs", 10, 95.0, 2000.0), days_ago(5 - i), TimeOfDay::Morning);
    }
    assert_eq!(engine.difficulty_profile().level, 5);

    let adjustment = engine.check_and_adjust_difficulty_at(0, fixed_now()).unwrap();
    assert!(adjustment.new_level > 5);
    assert_eq!(engine.difficulty_profile().level, adjustment.new_level);
}

#[test]
fn manual_level_is_clamped_and_recorded() {
    let mut engine = engine();
    let adjustment = engine.set_difficulty_level(0);
    assert_eq!(adjustment.new_level, 1);
    assert_eq!(adjustment.reason, AdjustmentReason::Manual);
    assert_eq!(engine.difficulty_profile().history.len(), 1);
}

// ============================================================================
// Learning style
// ============================================================================

#[test]
fn no_sessions_keeps_default_style_profile() {
    let mut engine = engine();
    engine.analyze_performance_at(&[], &[], &[], &[], fixed_now());
    let style = engine.learning_style();
    assert!(style.primary_style.is_none());
    assert_eq!(style.confidence, 0.0);
    for s in LearningStyle::ALL {
        assert_eq!(style.scores.get(s), 50.0);
    }
    assert_eq!(engine.get_recommended_mode(false), StudyMode::Flashcards);
    assert_eq!(engine.get_recommended_mode(true), StudyMode::Typing);
}

#[test]
fn listening_learner_is_classified_auditory() {
    let mut engine = engine();
    for i in 0..6 {
        let mut metrics = session("Nouns", 10, 92.0, 3000.0);
        metrics.study_mode = StudyMode::Listening;
        metrics.average_quality = 4.5;
        engine.record_session_at(&metrics, days_ago(6 - i), TimeOfDay::Afternoon);
    }
    engine.analyze_performance_at(&[], &[], &[], &[], fixed_now());
    assert_eq!(engine.learning_style().primary_style, Some(LearningStyle::Auditory));
    assert_eq!(engine.get_recommended_mode(false), StudyMode::Listening);
}

// ============================================================================
// Reanalysis gating
// ============================================================================

#[test]
fn reanalysis_waits_for_interval() {
    let mut engine = engine();
    assert!(engine.should_reanalyze_at(fixed_now()));

    engine.analyze_performance_at(&[], &[], &[], &[], fixed_now());
    assert_eq!(engine.state().analysis_version, 1);
    assert!(!engine.should_reanalyze_at(fixed_now() + Duration::minutes(29)));
    assert!(engine.should_reanalyze_at(fixed_now() + Duration::minutes(30)));
}

// ============================================================================
// Recommendations & insights
// ============================================================================

#[test]
fn recommendations_and_composition_from_weak_verbs() {
    let mut engine = engine();
    let (mut cards, progress) = verbs_fixture();
    cards.extend((0..20).map(|i| card(&format!("noun-{i}"), "Nouns")));
    for i in 0..12 {
        engine.record_session_at(&session("Verbs", 10, 55.0, 5000.0), days_ago(12 - i), TimeOfDay::Morning);
    }
    engine.analyze_performance_at(&cards, &progress, &[], &[], fixed_now());

    let daily = engine.refresh_recommendations_at(&cards, &progress, fixed_now());
    assert!(!daily.recommendations.is_empty());
    assert!(daily.recommendations.len() <= 5);
    assert!(daily
        .recommendations
        .iter()
        .any(|r| r.recommendation_type == RecommendationType::WeaknessDrill));
    assert_eq!(daily.focus_areas, vec!["Verbs".to_string()]);
    assert_eq!(daily.optimal_time_slots, vec![TimeOfDay::Morning]);

    let composition = engine.get_session_composition_at(&cards, &progress, Some(25), fixed_now());
    assert_eq!(composition.total_cards, 25);
    assert_eq!(
        composition.new_cards + composition.review_cards + composition.weakness_cards,
        25
    );
    assert_eq!(composition.category_breakdown.values().sum::<u32>(), 25);
    assert_eq!(composition.difficulty_distribution.total(), 25);
}

#[test]
fn insights_lifecycle() {
    let mut engine = engine();
    let (cards, progress) = verbs_fixture();
    for i in 0..12 {
        engine.record_session_at(&session("Verbs", 10, 55.0, 5000.0), days_ago(12 - i), TimeOfDay::Morning);
    }
    engine.analyze_performance_at(&cards, &progress, &[], &[], fixed_now());
    engine.refresh_recommendations_at(&cards, &progress, fixed_now());

    let active = engine.get_active_insights_at(fixed_now());
    assert!(!active.is_empty());
    let id = active[0].id.clone();

    assert!(engine.mark_insight_action_taken(&id));
    assert!(engine.dismiss_insight(&id));
    assert!(engine.dismiss_insight(&id));
    assert!(!engine.dismiss_insight("no-such-insight"));
    assert!(engine.get_active_insights_at(fixed_now()).iter().all(|i| i.id != id));

    let later = fixed_now() + Duration::hours(24) + Duration::seconds(1);
    assert!(engine.get_active_insights_at(later).is_empty());
    assert_eq!(engine.insights().len(), active.len());
}

#[test]
fn critical_weak_spots_filter() {
    let mut engine = engine();
    let cards: Vec<_> = (0..4).map(|i| card(&format!("g{i}"), "Grammar")).collect();
    let progress: Vec<_> = cards.iter().map(|c| progress(&c.id, 1.3, 1)).collect();
    for i in 0..5 {
        engine.record_session_at(&session("Grammar", 10, 20.0, 9000.0), days_ago(5 - i), TimeOfDay::Night);
    }
    engine.analyze_performance_at(&cards, &progress, &[], &[], fixed_now());

    let critical = engine.get_critical_weak_spots();
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].target, "Grammar");
}
