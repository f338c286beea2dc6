use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use crate::analytics::config::EngineConfig;
use crate::analytics::types::{
    CardProgress, CategoryPerformance, Flashcard, MistakeRecord, SessionPerformanceRecord,
    TimeOfDay, TimePerformance, TrendDirection,
};

const DEFAULT_EASE_FACTOR: f64 = 2.5;

#[derive(Debug, Clone, Default)]
pub struct PerformanceAggregates {
    pub categories: Vec<CategoryPerformance>,
    pub time_buckets: Vec<TimePerformance>,
}

/// Lookup tables shared by the aggregator, the detector and the recommender.
pub struct SnapshotIndex<'a> {
    pub cards: HashMap<&'a str, &'a Flashcard>,
    pub progress_by_card: HashMap<&'a str, Vec<&'a CardProgress>>,
    pub mistakes_by_card: HashMap<&'a str, Vec<&'a MistakeRecord>>,
}

impl<'a> SnapshotIndex<'a> {
    pub fn new(
        cards: &'a [Flashcard],
        progress: &'a [CardProgress],
        mistakes: &'a [MistakeRecord],
    ) -> Self {
        let cards = cards.iter().map(|c| (c.id.as_str(), c)).collect();

        let mut progress_by_card: HashMap<&str, Vec<&CardProgress>> = HashMap::new();
        for p in progress {
            progress_by_card.entry(p.card_id.as_str()).or_default().push(p);
        }

        let mut mistakes_by_card: HashMap<&str, Vec<&MistakeRecord>> = HashMap::new();
        for m in mistakes {
            mistakes_by_card.entry(m.card_id.as_str()).or_default().push(m);
        }

        Self {
            cards,
            progress_by_card,
            mistakes_by_card,
        }
    }

    pub fn category_of(&self, card_id: &str) -> Option<&'a str> {
        self.cards.get(card_id).copied().map(|c| c.category.as_str())
    }

    pub fn mistake_count(&self, card_id: &str) -> usize {
        self.mistakes_by_card.get(card_id).map_or(0, |m| m.len())
    }
}

#[derive(Default)]
struct CategoryAccumulator<'a> {
    card_ids: BTreeSet<&'a str>,
    subcategories: BTreeSet<&'a str>,
    history_reviewed: u32,
    history_correct: f64,
    response_weighted_sum: f64,
    last_reviewed: Option<DateTime<Utc>>,
}

pub fn aggregate(
    config: &EngineConfig,
    history: &VecDeque<SessionPerformanceRecord>,
    cards: &[Flashcard],
    progress: &[CardProgress],
    mistakes: &[MistakeRecord],
    now: DateTime<Utc>,
) -> PerformanceAggregates {
    let index = SnapshotIndex::new(cards, progress, mistakes);

    PerformanceAggregates {
        categories: aggregate_categories(config, history, &index, cards, now),
        time_buckets: aggregate_time_buckets(config, history),
    }
}

fn aggregate_categories(
    config: &EngineConfig,
    history: &VecDeque<SessionPerformanceRecord>,
    index: &SnapshotIndex<'_>,
    cards: &[Flashcard],
    now: DateTime<Utc>,
) -> Vec<CategoryPerformance> {
    let params = &config.aggregation;
    let mut accumulators: BTreeMap<&str, CategoryAccumulator> = BTreeMap::new();

    for card in cards {
        let acc = accumulators.entry(card.category.as_str()).or_default();
        acc.card_ids.insert(card.id.as_str());
        if let Some(sub) = card.subcategory.as_deref() {
            acc.subcategories.insert(sub);
        }
    }

    for record in history {
        for (category, stat) in &record.category_breakdown {
            if stat.count == 0 {
                continue;
            }
            let acc = accumulators.entry(category.as_str()).or_default();
            acc.history_reviewed += stat.count;
            acc.history_correct += stat.count as f64 * stat.accuracy.clamp(0.0, 100.0) / 100.0;
            acc.response_weighted_sum += record.average_response_time_ms * stat.count as f64;
            acc.last_reviewed = acc.last_reviewed.max(Some(record.timestamp));
        }
    }

    accumulators
        .into_iter()
        .map(|(category, acc)| {
            let mut ease_sum = 0.0;
            let mut ease_count = 0u32;
            let mut repetitions = 0u32;
            let mut mastered_count = 0u32;
            let mut struggling_count = 0u32;
            let mut last_reviewed = acc.last_reviewed;
            let mut category_mistakes: Vec<&MistakeRecord> = Vec::new();

            for card_id in &acc.card_ids {
                let entries = index.progress_by_card.get(card_id).map(Vec::as_slice).unwrap_or(&[]);
                for p in entries {
                    ease_sum += p.ease_factor;
                    ease_count += 1;
                    repetitions += p.repetitions;
                    last_reviewed = last_reviewed.max(p.last_review);
                }
                if !entries.is_empty() {
                    if entries.iter().any(|p| p.ease_factor < params.struggling_ease_factor) {
                        struggling_count += 1;
                    } else if entries.iter().all(|p| {
                        p.interval_days >= params.mastered_interval_days
                            && p.ease_factor >= params.mastered_ease_factor
                    }) {
                        mastered_count += 1;
                    }
                }
                if let Some(ms) = index.mistakes_by_card.get(card_id) {
                    category_mistakes.extend(ms.iter().copied());
                }
            }

            let (total_reviewed, total_correct) = if acc.history_reviewed > 0 {
                let correct = (acc.history_correct.round() as u32).min(acc.history_reviewed);
                (acc.history_reviewed, correct)
            } else {
                let incorrect = category_mistakes.len() as u32;
                let reviewed = repetitions + incorrect;
                (reviewed, reviewed - incorrect)
            };
            let total_incorrect = total_reviewed - total_correct;

            let accuracy = if total_reviewed > 0 {
                total_correct as f64 / total_reviewed as f64 * 100.0
            } else {
                0.0
            };
            let average_response_time_ms = if acc.history_reviewed > 0 {
                acc.response_weighted_sum / acc.history_reviewed as f64
            } else {
                0.0
            };

            let mut error_distribution = BTreeMap::new();
            for m in &category_mistakes {
                *error_distribution.entry(m.mistake_type).or_insert(0u32) += 1;
            }

            let subcategory = if acc.subcategories.len() == 1 {
                acc.subcategories.iter().next().map(|s| s.to_string())
            } else {
                None
            };

            CategoryPerformance {
                category: category.to_string(),
                subcategory,
                total_reviewed,
                total_correct,
                total_incorrect,
                accuracy,
                average_ease_factor: if ease_count > 0 {
                    ease_sum / ease_count as f64
                } else {
                    DEFAULT_EASE_FACTOR
                },
                average_response_time_ms,
                mastered_count,
                struggling_count,
                last_reviewed,
                error_distribution,
                trend: mistake_trend(
                    &category_mistakes,
                    config.weak_spots.recent_mistake_window_days,
                    params.category_trend_change_ratio,
                    now,
                ),
                confidence: sample_confidence(total_reviewed, params.confidence_sample_curve),
                card_ids: acc.card_ids.iter().map(|s| s.to_string()).collect(),
            }
        })
        .collect()
}

/// Saturating confidence in `[0, 100]`, monotonic in sample size.
pub fn sample_confidence(samples: u32, curve: f64) -> f64 {
    if curve <= 0.0 {
        return 100.0;
    }
    (100.0 * samples as f64 / curve).min(100.0)
}

/// Compares mistake density in the recent window against the window before it.
pub fn mistake_trend(
    mistakes: &[&MistakeRecord],
    window_days: i64,
    change_ratio: f64,
    now: DateTime<Utc>,
) -> TrendDirection {
    let window = Duration::days(window_days.max(1));
    let recent_start = now - window;
    let previous_start = recent_start - window;

    let recent = mistakes
        .iter()
        .filter(|m| m.timestamp > recent_start && m.timestamp <= now)
        .count() as f64;
    let previous = mistakes
        .iter()
        .filter(|m| m.timestamp > previous_start && m.timestamp <= recent_start)
        .count() as f64;

    if previous == 0.0 {
        return if recent > 0.0 {
            TrendDirection::Declining
        } else {
            TrendDirection::Stable
        };
    }

    let change = (recent - previous) / previous;
    if change < -change_ratio {
        TrendDirection::Improving
    } else if change > change_ratio {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

fn aggregate_time_buckets(
    config: &EngineConfig,
    history: &VecDeque<SessionPerformanceRecord>,
) -> Vec<TimePerformance> {
    let params = &config.aggregation;

    TimeOfDay::ALL
        .iter()
        .filter_map(|bucket| {
            let records: Vec<&SessionPerformanceRecord> =
                history.iter().filter(|r| r.time_of_day == *bucket).collect();
            if records.is_empty() {
                return None;
            }

            let n = records.len() as f64;
            let average_accuracy = records.iter().map(|r| r.accuracy).sum::<f64>() / n;
            let average_response_time_ms =
                records.iter().map(|r| r.average_response_time_ms).sum::<f64>() / n;
            let average_cards_per_session =
                records.iter().map(|r| r.cards_reviewed as f64).sum::<f64>() / n;

            let speed_score = if params.speed_baseline_ms > 0.0 {
                (1.0 - average_response_time_ms / params.speed_baseline_ms).clamp(0.0, 1.0) * 100.0
            } else {
                0.0
            };
            let volume_score = if params.volume_baseline_cards > 0.0 {
                (average_cards_per_session / params.volume_baseline_cards).min(1.0) * 100.0
            } else {
                0.0
            };

            Some(TimePerformance {
                time_of_day: *bucket,
                session_count: records.len() as u32,
                average_accuracy,
                average_response_time_ms,
                average_cards_per_session,
                optimal_score: average_accuracy * 0.6 + speed_score * 0.2 + volume_score * 0.2,
            })
        })
        .collect()
}
