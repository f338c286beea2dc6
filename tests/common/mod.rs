#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};

use danci_learning_engine::analytics::types::{
    CardProgress, CategoryStat, Flashcard, MistakeRecord, MistakeType, SessionMetrics,
    StudyDirection, StudyMode,
};

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 15, 10, 0, 0).unwrap()
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    fixed_now() - Duration::days(days)
}

pub fn card(id: &str, category: &str) -> Flashcard {
    Flashcard {
        id: id.to_string(),
        category: category.to_string(),
        subcategory: None,
        gender: None,
        front: format!("{id}-front"),
        back: format!("{id}-back"),
    }
}

pub fn progress(card_id: &str, ease_factor: f64, repetitions: u32) -> CardProgress {
    CardProgress {
        card_id: card_id.to_string(),
        direction: StudyDirection::FrontToBack,
        ease_factor,
        interval_days: 3,
        repetitions,
        next_review: Some(fixed_now() + Duration::days(2)),
        last_review: Some(days_ago(1)),
    }
}

pub fn mistake(card_id: &str, mistake_type: MistakeType, at: DateTime<Utc>) -> MistakeRecord {
    MistakeRecord {
        card_id: card_id.to_string(),
        mistake_type,
        direction: StudyDirection::FrontToBack,
        timestamp: at,
    }
}

pub fn session(category: &str, cards: u32, accuracy: f64, response_ms: f64) -> SessionMetrics {
    let mut category_breakdown = BTreeMap::new();
    category_breakdown.insert(category.to_string(), CategoryStat { count: cards, accuracy });
    SessionMetrics {
        duration_seconds: cards * 15,
        cards_reviewed: cards,
        planned_cards: Some(cards),
        new_cards: None,
        accuracy,
        average_quality: 3.5,
        average_response_time_ms: response_ms,
        study_mode: StudyMode::Flashcards,
        category_breakdown,
        mistake_counts: BTreeMap::new(),
    }
}
