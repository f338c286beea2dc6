use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};

use crate::analytics::config::StyleParams;
use crate::analytics::types::{
    LearningStyle, LearningStyleProfile, ModeEffectiveness, SessionPerformanceRecord, StudyMode,
    StyleScores,
};

#[derive(Default)]
struct ModeAccumulator {
    sessions: u32,
    cards_reviewed: u32,
    accuracy_sum: f64,
    quality_sum: f64,
    response_sum: f64,
    completion_sum: f64,
    retention_sum: f64,
    retention_samples: u32,
}

/// Classifies the learner's style from session history. Returns `None` when
/// there are too few sessions, in which case the caller keeps its profile.
pub fn classify(
    params: &StyleParams,
    history: &VecDeque<SessionPerformanceRecord>,
    now: DateTime<Utc>,
) -> Option<LearningStyleProfile> {
    if history.len() < params.min_sessions_for_style.max(1) {
        return None;
    }

    let mode_effectiveness = mode_effectiveness(params, history);

    let mut scores = StyleScores::default();
    let mut evidenced: Vec<LearningStyle> = Vec::new();
    for style in LearningStyle::ALL {
        let mut weighted = 0.0;
        let mut weights = 0.0;
        for (mode, eff) in &mode_effectiveness {
            if mode.styles().contains(&style) {
                weighted += eff.confidence * eff.effectiveness_score;
                weights += eff.confidence;
            }
        }
        if weights > 0.0 {
            scores.set(style, weighted / weights);
            evidenced.push(style);
        }
    }

    let ranked: Vec<(LearningStyle, f64)> = scores
        .ranked()
        .into_iter()
        .filter(|(style, _)| evidenced.contains(style))
        .collect();
    let primary_style = ranked.first().map(|(s, _)| *s);
    let secondary_style = match (ranked.first(), ranked.get(1)) {
        (Some((_, top)), Some((runner, score))) if top - score <= params.secondary_style_margin => {
            Some(*runner)
        }
        _ => None,
    };

    let confidence = if params.full_confidence_sessions > 0.0 {
        (100.0 * history.len() as f64 / params.full_confidence_sessions).min(100.0)
    } else {
        100.0
    };

    tracing::debug!(
        sessions = history.len(),
        primary = ?primary_style,
        confidence,
        "learning style classified"
    );

    Some(LearningStyleProfile {
        primary_style,
        secondary_style,
        scores,
        mode_effectiveness,
        confidence,
        last_updated: Some(now),
    })
}

fn mode_effectiveness(
    params: &StyleParams,
    history: &VecDeque<SessionPerformanceRecord>,
) -> BTreeMap<StudyMode, ModeEffectiveness> {
    let mut accumulators: BTreeMap<StudyMode, ModeAccumulator> = BTreeMap::new();

    for (i, record) in history.iter().enumerate() {
        let acc = accumulators.entry(record.study_mode).or_default();
        acc.sessions += 1;
        acc.cards_reviewed += record.cards_reviewed;
        acc.accuracy_sum += record.accuracy.clamp(0.0, 100.0);
        acc.quality_sum += record.average_quality.clamp(1.0, 5.0);
        acc.response_sum += record.average_response_time_ms.clamp(0.0, params.max_response_time_ms);
        acc.completion_sum += record.completion_rate.clamp(0.0, 1.0);

        if let Some(follow_up) = next_cross_mode_session(history, i) {
            acc.retention_sum += follow_up.accuracy.clamp(0.0, 100.0);
            acc.retention_samples += 1;
        }
    }

    accumulators
        .into_iter()
        .map(|(mode, acc)| {
            let n = acc.sessions as f64;
            let average_accuracy = acc.accuracy_sum / n;
            let average_quality = acc.quality_sum / n;
            let engagement = acc.completion_sum / n;
            let retention_rate = if acc.retention_samples > 0 {
                acc.retention_sum / acc.retention_samples as f64
            } else {
                average_accuracy
            };
            let confidence = if params.min_mode_samples > 0 {
                (acc.sessions as f64 / params.min_mode_samples as f64).min(1.0)
            } else {
                1.0
            };

            let effectiveness_score = 100.0
                * (params.accuracy_weight * average_accuracy / 100.0
                    + params.retention_weight * retention_rate / 100.0
                    + params.quality_weight * (average_quality - 1.0) / 4.0
                    + params.engagement_weight * engagement);

            (
                mode,
                ModeEffectiveness {
                    sessions: acc.sessions,
                    cards_reviewed: acc.cards_reviewed,
                    average_accuracy,
                    average_quality,
                    retention_rate,
                    average_response_time_ms: acc.response_sum / n,
                    engagement,
                    confidence,
                    effectiveness_score: effectiveness_score.clamp(0.0, 100.0),
                },
            )
        })
        .collect()
}

/// The first later session in another mode that practised any of the same categories.
fn next_cross_mode_session(
    history: &VecDeque<SessionPerformanceRecord>,
    index: usize,
) -> Option<&SessionPerformanceRecord> {
    let record = history.get(index)?;
    history.iter().skip(index + 1).find(|later| {
        later.study_mode != record.study_mode
            && later
                .category_breakdown
                .keys()
                .any(|cat| record.category_breakdown.contains_key(cat))
    })
}

/// Best mode for the next card: typing when the card demands it, otherwise
/// the most effective well-sampled mode, then the primary style's mode.
pub fn recommended_mode(
    params: &StyleParams,
    profile: &LearningStyleProfile,
    card_needs_typing: bool,
) -> StudyMode {
    if card_needs_typing {
        return StudyMode::Typing;
    }

    let best = profile
        .mode_effectiveness
        .iter()
        .filter(|(_, eff)| eff.sessions >= params.min_mode_samples)
        .max_by(|a, b| {
            a.1.effectiveness_score
                .partial_cmp(&b.1.effectiveness_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.cmp(a.0))
        })
        .map(|(mode, _)| *mode);

    best.or_else(|| profile.primary_style.map(|s| s.preferred_mode()))
        .unwrap_or(StudyMode::Flashcards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::types::CategoryStat;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap()
    }

    fn record(mode: StudyMode, accuracy: f64) -> SessionPerformanceRecord {
        let mut breakdown = BTreeMap::new();
        breakdown.insert("Nouns".to_string(), CategoryStat { count: 10, accuracy });
        SessionPerformanceRecord {
            study_mode: mode,
            accuracy,
            average_quality: 4.0,
            category_breakdown: breakdown,
            ..Default::default()
        }
    }

    #[test]
    fn too_little_history_keeps_defaults() {
        let history: VecDeque<_> = (0..4).map(|_| record(StudyMode::Listening, 90.0)).collect();
        assert!(classify(&StyleParams::default(), &history, now()).is_none());

        let profile = LearningStyleProfile::default();
        assert!(profile.primary_style.is_none());
        assert_eq!(profile.scores.get(LearningStyle::Visual), 50.0);
        assert_eq!(profile.confidence, 0.0);
    }

    #[test]
    fn strongest_mode_drives_primary_style() {
        let mut history = VecDeque::new();
        for _ in 0..4 {
            history.push_back(record(StudyMode::Listening, 95.0));
            history.push_back(record(StudyMode::Typing, 50.0));
        }
        let profile = classify(&StyleParams::default(), &history, now()).unwrap();

        assert_eq!(profile.primary_style, Some(LearningStyle::Auditory));
        assert!(profile.scores.auditory > profile.scores.kinesthetic);
        assert_eq!(profile.mode_effectiveness.len(), 2);
        assert!(profile.confidence > 0.0 && profile.confidence <= 100.0);
    }

    #[test]
    fn retention_uses_following_cross_mode_session() {
        let history: VecDeque<_> = vec![
            record(StudyMode::Flashcards, 80.0),
            record(StudyMode::Typing, 40.0),
            record(StudyMode::Flashcards, 80.0),
            record(StudyMode::Typing, 60.0),
            record(StudyMode::Flashcards, 80.0),
        ]
        .into();
        let profile = classify(&StyleParams::default(), &history, now()).unwrap();
        let flashcards = &profile.mode_effectiveness[&StudyMode::Flashcards];
        assert!((flashcards.retention_rate - 50.0).abs() < 1e-9);
        let typing = &profile.mode_effectiveness[&StudyMode::Typing];
        assert!((typing.retention_rate - 80.0).abs() < 1e-9);
    }

    #[test]
    fn recommended_mode_fallbacks() {
        let params = StyleParams::default();
        let mut profile = LearningStyleProfile::default();
        assert_eq!(recommended_mode(&params, &profile, true), StudyMode::Typing);
        assert_eq!(recommended_mode(&params, &profile, false), StudyMode::Flashcards);

        profile.primary_style = Some(LearningStyle::Auditory);
        assert_eq!(recommended_mode(&params, &profile, false), StudyMode::Listening);
    }
}
