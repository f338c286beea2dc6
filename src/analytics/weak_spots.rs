use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use crate::analytics::config::WeakSpotParams;
use crate::analytics::types::{
    CardProgress, CategoryPerformance, ConfusionPair, Flashcard, MistakeRecord, MistakeType,
    SessionPerformanceRecord, Severity, StudyDirection, TimeOfDay, TimePerformance, WeakSpot,
    WeakSpotType,
};

/// Everything one detection pass reads. Built by the engine from its
/// freshly aggregated state and the caller's snapshots.
pub struct DetectionInput<'a> {
    pub categories: &'a [CategoryPerformance],
    pub time_buckets: &'a [TimePerformance],
    pub history: &'a VecDeque<SessionPerformanceRecord>,
    pub cards: &'a [Flashcard],
    pub progress: &'a [CardProgress],
    pub mistakes: &'a [MistakeRecord],
    pub confusion_pairs: &'a [ConfusionPair],
    pub previous: &'a [WeakSpot],
}

struct Finding {
    spot_type: WeakSpotType,
    target: String,
    score: f64,
    description: String,
    suggested_action: String,
    affected_card_ids: BTreeSet<String>,
}

pub fn detect(params: &WeakSpotParams, input: &DetectionInput<'_>, now: DateTime<Utc>) -> Vec<WeakSpot> {
    let recent_cutoff = now - Duration::days(params.recent_mistake_window_days.max(0));

    let mut findings = Vec::new();
    findings.extend(category_rule(params, input, recent_cutoff));
    findings.extend(error_type_rule(params, input, recent_cutoff));
    findings.extend(direction_rule(params, input, recent_cutoff));
    findings.extend(time_rule(params, input, recent_cutoff));
    findings.extend(confusion_rule(params, input, recent_cutoff));

    let previous: HashMap<&str, &WeakSpot> =
        input.previous.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut by_id: BTreeMap<String, WeakSpot> = BTreeMap::new();
    for finding in findings {
        // Nothing to practice means nothing to surface.
        if finding.affected_card_ids.is_empty() {
            continue;
        }
        let id = WeakSpot::stable_id(finding.spot_type, &finding.target);
        let score = finding.score.clamp(0.0, 100.0);
        if by_id.get(&id).is_some_and(|existing| existing.score >= score) {
            continue;
        }
        let detected_at = previous.get(id.as_str()).map_or(now, |p| p.detected_at);
        by_id.insert(
            id.clone(),
            WeakSpot {
                id,
                spot_type: finding.spot_type,
                target: finding.target,
                severity: severity_for(params, score),
                score,
                description: finding.description,
                suggested_action: finding.suggested_action,
                affected_card_ids: finding.affected_card_ids.into_iter().collect(),
                detected_at,
                updated_at: now,
            },
        );
    }

    let mut spots: Vec<WeakSpot> = by_id.into_values().collect();
    spots.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    spots
}

pub fn severity_for(params: &WeakSpotParams, score: f64) -> Severity {
    if score >= params.critical_severity_threshold {
        Severity::Critical
    } else if score >= params.warning_severity_threshold {
        Severity::Warning
    } else {
        Severity::Info
    }
}

/// Scales a rule score by the share of its mistakes that are recent.
fn recency_adjusted(params: &WeakSpotParams, score: f64, mistakes: &[&MistakeRecord], cutoff: DateTime<Utc>) -> f64 {
    if mistakes.is_empty() {
        return score.min(100.0);
    }
    let recent = mistakes.iter().filter(|m| m.timestamp >= cutoff).count() as f64;
    let share = recent / mistakes.len() as f64;
    (score * (1.0 + (params.recency_weight_factor - 1.0) * share)).min(100.0)
}

fn recency_weight(params: &WeakSpotParams, mistake: &MistakeRecord, cutoff: DateTime<Utc>) -> f64 {
    if mistake.timestamp >= cutoff {
        params.recency_weight_factor
    } else {
        1.0
    }
}

fn normalized_deficit(value: f64, threshold: f64, floor: f64) -> f64 {
    let span = threshold - floor;
    if span <= 0.0 {
        return if value < threshold { 1.0 } else { 0.0 };
    }
    ((threshold - value) / span).clamp(0.0, 1.0)
}

fn category_rule(
    params: &WeakSpotParams,
    input: &DetectionInput<'_>,
    cutoff: DateTime<Utc>,
) -> Vec<Finding> {
    input
        .categories
        .iter()
        .filter(|c| c.total_reviewed > 0 && c.total_reviewed >= params.min_category_samples)
        .filter(|c| {
            c.average_ease_factor < params.weak_ease_factor_threshold
                || c.accuracy < params.weak_accuracy_threshold
        })
        .map(|c| {
            let ease_deficit = normalized_deficit(
                c.average_ease_factor,
                params.weak_ease_factor_threshold,
                params.min_ease_factor,
            );
            let accuracy_deficit =
                normalized_deficit(c.accuracy, params.weak_accuracy_threshold, params.accuracy_floor);
            let base = 100.0
                * (params.ease_deficit_weight * ease_deficit
                    + params.accuracy_deficit_weight * accuracy_deficit);

            let card_ids: BTreeSet<&str> = c.card_ids.iter().map(String::as_str).collect();
            let scoped: Vec<&MistakeRecord> = input
                .mistakes
                .iter()
                .filter(|m| card_ids.contains(m.card_id.as_str()))
                .collect();

            Finding {
                spot_type: WeakSpotType::Category,
                target: c.category.clone(),
                score: recency_adjusted(params, base, &scoped, cutoff),
                description: format!(
                    "{} accuracy is {:.0}% with an average ease of {:.2}",
                    c.category, c.accuracy, c.average_ease_factor
                ),
                suggested_action: format!("Review the struggling cards in {} daily", c.category),
                affected_card_ids: c.card_ids.iter().cloned().collect(),
            }
        })
        .collect()
}

fn error_type_rule(
    params: &WeakSpotParams,
    input: &DetectionInput<'_>,
    cutoff: DateTime<Utc>,
) -> Vec<Finding> {
    if (input.mistakes.len() as u32) < params.min_samples_for_analysis {
        return Vec::new();
    }

    let mut weights: BTreeMap<MistakeType, f64> = BTreeMap::new();
    let mut total = 0.0;
    for m in input.mistakes {
        let w = recency_weight(params, m, cutoff);
        *weights.entry(m.mistake_type).or_insert(0.0) += w;
        total += w;
    }
    if total <= 0.0 {
        return Vec::new();
    }

    weights
        .into_iter()
        .filter(|(kind, _)| *kind != MistakeType::Other)
        .filter_map(|(kind, weight)| {
            let share = weight / total;
            if share <= params.error_type_dominance_threshold {
                return None;
            }
            let scoped: Vec<&MistakeRecord> =
                input.mistakes.iter().filter(|m| m.mistake_type == kind).collect();
            Some(Finding {
                spot_type: WeakSpotType::ErrorType,
                target: kind.as_str().to_string(),
                score: recency_adjusted(params, share * 100.0, &scoped, cutoff),
                description: format!(
                    "{:.0}% of recent mistakes are {} errors",
                    share * 100.0,
                    kind.as_str()
                ),
                suggested_action: match kind {
                    MistakeType::Gender => "Drill articles together with each noun".to_string(),
                    MistakeType::Spelling => "Practice with typing mode".to_string(),
                    MistakeType::Plural => "Review plural forms alongside singulars".to_string(),
                    _ => "Revisit the meaning of the affected cards".to_string(),
                },
                affected_card_ids: scoped.iter().map(|m| m.card_id.clone()).collect(),
            })
        })
        .collect()
}

fn direction_rule(
    params: &WeakSpotParams,
    input: &DetectionInput<'_>,
    cutoff: DateTime<Utc>,
) -> Vec<Finding> {
    let attempts = |direction: StudyDirection| -> (u32, u32) {
        let correct: u32 = input
            .progress
            .iter()
            .filter(|p| p.direction == direction)
            .map(|p| p.repetitions)
            .sum();
        let wrong = input.mistakes.iter().filter(|m| m.direction == direction).count() as u32;
        (correct + wrong, correct)
    };

    let (forward_total, forward_correct) = attempts(StudyDirection::FrontToBack);
    let (backward_total, backward_correct) = attempts(StudyDirection::BackToFront);
    if forward_total < params.min_samples_for_analysis || backward_total < params.min_samples_for_analysis {
        return Vec::new();
    }

    let forward_accuracy = forward_correct as f64 / forward_total as f64 * 100.0;
    let backward_accuracy = backward_correct as f64 / backward_total as f64 * 100.0;
    let gap = (forward_accuracy - backward_accuracy).abs();
    if gap <= params.direction_asymmetry_threshold {
        return Vec::new();
    }

    let weaker = if forward_accuracy < backward_accuracy {
        StudyDirection::FrontToBack
    } else {
        StudyDirection::BackToFront
    };
    let scoped: Vec<&MistakeRecord> = input.mistakes.iter().filter(|m| m.direction == weaker).collect();

    vec![Finding {
        spot_type: WeakSpotType::Direction,
        target: weaker.as_str().to_string(),
        score: recency_adjusted(params, gap * 2.0, &scoped, cutoff),
        description: format!(
            "Accuracy {} is {:.0} points below the {} direction",
            weaker.as_str(),
            gap,
            weaker.opposite().as_str()
        ),
        suggested_action: format!("Schedule extra reviews in the {} direction", weaker.as_str()),
        affected_card_ids: scoped.iter().map(|m| m.card_id.clone()).collect(),
    }]
}

fn time_rule(
    params: &WeakSpotParams,
    input: &DetectionInput<'_>,
    cutoff: DateTime<Utc>,
) -> Vec<Finding> {
    if input.history.is_empty() {
        return Vec::new();
    }
    let overall = input.history.iter().map(|r| r.accuracy).sum::<f64>() / input.history.len() as f64;

    input
        .time_buckets
        .iter()
        .filter(|t| t.session_count >= params.min_time_bucket_sessions)
        .filter_map(|t| {
            let gap = overall - t.average_accuracy;
            if gap <= params.time_accuracy_difference_threshold {
                return None;
            }
            let scoped: Vec<&MistakeRecord> = input
                .mistakes
                .iter()
                .filter(|m| TimeOfDay::of(&m.timestamp) == t.time_of_day)
                .collect();
            Some(Finding {
                spot_type: WeakSpotType::TimeBased,
                target: t.time_of_day.as_str().to_string(),
                score: recency_adjusted(params, gap * 2.0, &scoped, cutoff),
                description: format!(
                    "{} sessions average {:.0}% against {:.0}% overall",
                    t.time_of_day.as_str(),
                    t.average_accuracy,
                    overall
                ),
                suggested_action: format!(
                    "Move demanding reviews out of the {}",
                    t.time_of_day.as_str()
                ),
                affected_card_ids: scoped.iter().map(|m| m.card_id.clone()).collect(),
            })
        })
        .collect()
}

fn confusion_rule(
    params: &WeakSpotParams,
    input: &DetectionInput<'_>,
    cutoff: DateTime<Utc>,
) -> Vec<Finding> {
    let find_cards = |word: &str| -> Vec<&Flashcard> {
        let word = word.trim().to_lowercase();
        input
            .cards
            .iter()
            .filter(|c| c.front.trim().to_lowercase() == word || c.back.trim().to_lowercase() == word)
            .collect()
    };

    input
        .confusion_pairs
        .iter()
        .filter(|p| p.confusion_count >= params.min_confusion_count)
        .map(|pair| {
            let first = find_cards(&pair.word1);
            let second = find_cards(&pair.word2);
            let affected: BTreeSet<String> =
                first.iter().chain(second.iter()).map(|c| c.id.clone()).collect();

            let shared_category = first
                .iter()
                .map(|c| c.category.as_str())
                .find(|cat| second.iter().any(|c| c.category == *cat));

            let scoped: Vec<&MistakeRecord> = input
                .mistakes
                .iter()
                .filter(|m| affected.contains(&m.card_id))
                .collect();
            let score = recency_adjusted(params, pair.confusion_count as f64 * 10.0, &scoped, cutoff);
            let label = format!("{} / {}", pair.word1, pair.word2);

            match shared_category {
                Some(category) => Finding {
                    spot_type: WeakSpotType::Category,
                    target: label.clone(),
                    score,
                    description: format!(
                        "{} are confused {} times within {}",
                        label, pair.confusion_count, category
                    ),
                    suggested_action: format!("Review {} side by side", label),
                    affected_card_ids: affected,
                },
                None => Finding {
                    spot_type: WeakSpotType::Mode,
                    target: label.clone(),
                    score,
                    description: format!("{} are confused {} times", label, pair.confusion_count),
                    suggested_action: "Use matching mode to practice telling them apart".to_string(),
                    affected_card_ids: affected,
                },
            }
        })
        .collect()
}
