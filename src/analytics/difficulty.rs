use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};

use crate::analytics::config::DifficultyParams;
use crate::analytics::types::{
    AdjustmentReason, DifficultyAdjustment, DifficultyProfile, DifficultyTrend,
    SessionPerformanceRecord, TriggerMetrics,
};

#[derive(Debug, Clone, Copy)]
struct Delta {
    amount: f64,
    reason: AdjustmentReason,
}

pub fn clamp_level(params: &DifficultyParams, level: f64) -> u8 {
    let lo = params.min_level.min(params.max_level);
    let hi = params.max_level.max(params.min_level);
    if !level.is_finite() {
        return params.default_level.clamp(lo, hi);
    }
    (level.round().clamp(lo as f64, hi as f64)) as u8
}

/// Moves `old` a fraction of the way toward `target`, landing on an integer
/// level. Half steps round away from `old` in either direction.
pub fn smooth(params: &DifficultyParams, old: u8, target: f64) -> u8 {
    let target = target.clamp(params.min_level as f64, params.max_level as f64);
    let factor = params.smoothing_factor.clamp(0.0, 1.0);
    let step = factor * (target - old as f64);
    clamp_level(params, old as f64 + step.signum() * step.abs().round())
}

fn accuracy_delta(params: &DifficultyParams, accuracy: f64) -> Option<Delta> {
    if accuracy >= params.increase_accuracy_threshold {
        Some(Delta { amount: 1.0, reason: AdjustmentReason::HighAccuracy })
    } else if accuracy < params.decrease_accuracy_threshold {
        Some(Delta { amount: -1.0, reason: AdjustmentReason::LowAccuracy })
    } else {
        None
    }
}

fn response_delta(params: &DifficultyParams, response_ms: f64) -> Option<Delta> {
    if response_ms <= 0.0 {
        None
    } else if response_ms < params.fast_response_ms {
        Some(Delta { amount: 0.5, reason: AdjustmentReason::FastResponses })
    } else if response_ms > params.slow_response_ms {
        Some(Delta { amount: -0.5, reason: AdjustmentReason::SlowResponses })
    } else {
        None
    }
}

fn reason_for(deltas: &[Delta]) -> AdjustmentReason {
    match deltas {
        [only] => only.reason,
        _ => AdjustmentReason::Mixed,
    }
}

/// Re-evaluates the global and per-category levels from the most recent
/// sessions. Returns the adjustment appended to the profile history, if the
/// global level changed.
pub fn check_and_adjust(
    params: &DifficultyParams,
    profile: &mut DifficultyProfile,
    history: &VecDeque<SessionPerformanceRecord>,
    perfect_streak: u32,
    now: DateTime<Utc>,
) -> Option<DifficultyAdjustment> {
    profile.level = clamp_level(params, profile.level as f64);
    if history.len() < params.min_sessions_for_adjustment.max(1) {
        return None;
    }

    let window = params.recent_sessions_window.max(1);
    let recent: Vec<&SessionPerformanceRecord> = history.iter().rev().take(window).collect();
    let n = recent.len() as f64;
    let recent_accuracy = recent.iter().map(|r| r.accuracy).sum::<f64>() / n;
    let recent_response_time_ms = recent.iter().map(|r| r.average_response_time_ms).sum::<f64>() / n;

    adjust_categories(params, profile, &recent);

    let mut deltas = Vec::new();
    deltas.extend(accuracy_delta(params, recent_accuracy));
    deltas.extend(response_delta(params, recent_response_time_ms));
    if perfect_streak >= params.perfect_streak_threshold {
        deltas.push(Delta { amount: 1.0, reason: AdjustmentReason::PerfectStreak });
    }
    if deltas.is_empty() {
        return None;
    }

    let previous_level = profile.level;
    let target_level = (previous_level as f64 + deltas.iter().map(|d| d.amount).sum::<f64>())
        .clamp(params.min_level as f64, params.max_level as f64);
    let new_level = smooth(params, previous_level, target_level);

    if new_level == previous_level {
        tracing::debug!(level = previous_level, target_level, "difficulty unchanged after smoothing");
        return None;
    }

    let adjustment = DifficultyAdjustment {
        previous_level,
        new_level,
        reason: reason_for(&deltas),
        metrics: TriggerMetrics {
            recent_accuracy,
            recent_response_time_ms,
            perfect_streak,
            target_level,
        },
        timestamp: now,
    };
    apply(params, profile, adjustment.clone());

    tracing::info!(
        previous_level,
        new_level,
        reason = ?adjustment.reason,
        recent_accuracy,
        "difficulty adjusted"
    );
    Some(adjustment)
}

fn adjust_categories(
    params: &DifficultyParams,
    profile: &mut DifficultyProfile,
    recent: &[&SessionPerformanceRecord],
) {
    let mut totals: BTreeMap<&str, (u32, f64)> = BTreeMap::new();
    for record in recent {
        for (category, stat) in &record.category_breakdown {
            let entry = totals.entry(category.as_str()).or_insert((0, 0.0));
            entry.0 += stat.count;
            entry.1 += stat.count as f64 * stat.accuracy;
        }
    }

    for (category, (count, weighted)) in totals {
        if count == 0 || count < params.min_category_samples {
            continue;
        }
        let accuracy = weighted / count as f64;
        let current = profile
            .category_levels
            .get(category)
            .copied()
            .unwrap_or(profile.level);
        let current = clamp_level(params, current as f64);
        let level = match accuracy_delta(params, accuracy) {
            Some(delta) => smooth(params, current, current as f64 + delta.amount),
            None => current,
        };
        profile.category_levels.insert(category.to_string(), level);
    }
}

/// Manual override; always recorded, even when the level is unchanged.
pub fn set_level(
    params: &DifficultyParams,
    profile: &mut DifficultyProfile,
    level: i64,
    now: DateTime<Utc>,
) -> DifficultyAdjustment {
    let previous_level = clamp_level(params, profile.level as f64);
    let new_level = clamp_level(params, level as f64);
    let adjustment = DifficultyAdjustment {
        previous_level,
        new_level,
        reason: AdjustmentReason::Manual,
        metrics: TriggerMetrics {
            target_level: new_level as f64,
            ..TriggerMetrics::default()
        },
        timestamp: now,
    };
    apply(params, profile, adjustment.clone());
    adjustment
}

fn apply(params: &DifficultyParams, profile: &mut DifficultyProfile, adjustment: DifficultyAdjustment) {
    profile.level = clamp_level(params, adjustment.new_level as f64);
    profile.recent_trend = match adjustment.new_level.cmp(&adjustment.previous_level) {
        std::cmp::Ordering::Greater => DifficultyTrend::Up,
        std::cmp::Ordering::Less => DifficultyTrend::Down,
        std::cmp::Ordering::Equal => DifficultyTrend::Stable,
    };
    profile.last_adjustment = Some(adjustment.timestamp);
    profile.history.push(adjustment);

    let cap = params.max_adjustment_history.max(1);
    if profile.history.len() > cap {
        let excess = profile.history.len() - cap;
        profile.history.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::types::CategoryStat;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap()
    }

    fn sessions(n: usize, accuracy: f64, response_ms: f64) -> VecDeque<SessionPerformanceRecord> {
        (0..n)
            .map(|_| {
                let mut breakdown = BTreeMap::new();
                breakdown.insert("Verbs".to_string(), CategoryStat { count: 4, accuracy });
                SessionPerformanceRecord {
                    accuracy,
                    average_response_time_ms: response_ms,
                    category_breakdown: breakdown,
                    ..Default::default()
                }
            })
            .collect()
    }

    #[test]
    fn high_accuracy_and_fast_responses_raise_level() {
        let params = DifficultyParams::default();
        let mut profile = DifficultyProfile::default();
        let adjustment =
            check_and_adjust(&params, &mut profile, &sessions(5, 95.0, 2000.0), 0, now()).unwrap();

        assert_eq!(adjustment.previous_level, 5);
        assert_eq!(adjustment.new_level, 6);
        assert_eq!(adjustment.reason, AdjustmentReason::Mixed);
        assert_eq!(profile.level, 6);
        assert_eq!(profile.recent_trend, DifficultyTrend::Up);
        assert_eq!(profile.history.len(), 1);
    }

    #[test]
    fn too_few_sessions_is_noop() {
        let params = DifficultyParams::default();
        let mut profile = DifficultyProfile::default();
        assert!(check_and_adjust(&params, &mut profile, &sessions(2, 20.0, 9000.0), 0, now()).is_none());
        assert_eq!(profile.level, 5);
        assert!(profile.history.is_empty());
    }

    #[test]
    fn low_accuracy_lowers_level_and_stays_in_bounds() {
        let params = DifficultyParams::default();
        let mut profile = DifficultyProfile { level: 1, ..Default::default() };
        let history = sessions(5, 30.0, 9000.0);
        assert!(check_and_adjust(&params, &mut profile, &history, 0, now()).is_none());
        assert_eq!(profile.level, 1);

        profile.level = 4;
        let adjustment = check_and_adjust(&params, &mut profile, &history, 0, now()).unwrap();
        assert_eq!(adjustment.new_level, 3);
        assert_eq!(profile.recent_trend, DifficultyTrend::Down);
    }

    #[test]
    fn category_levels_track_category_accuracy() {
        let params = DifficultyParams::default();
        let mut profile = DifficultyProfile::default();
        check_and_adjust(&params, &mut profile, &sessions(5, 50.0, 5000.0), 0, now());
        assert_eq!(profile.category_levels.get("Verbs"), Some(&4));
    }

    fn with_category_count(mut history: VecDeque<SessionPerformanceRecord>, count: u32) -> VecDeque<SessionPerformanceRecord> {
        for record in history.iter_mut() {
            if let Some(stat) = record.category_breakdown.get_mut("Verbs") {
                stat.count = count;
            }
        }
        history
    }

    #[test]
    fn category_level_needs_enough_recent_samples() {
        let params = DifficultyParams::default();

        // 3 sessions of 3 cards: 9 samples, one short.
        let mut profile = DifficultyProfile::default();
        check_and_adjust(&params, &mut profile, &with_category_count(sessions(3, 50.0, 5000.0), 3), 0, now());
        assert!(profile.category_levels.is_empty());
        assert_eq!(profile.level, 4);

        // 5 sessions of 2 cards: exactly 10.
        let mut profile = DifficultyProfile::default();
        check_and_adjust(&params, &mut profile, &with_category_count(sessions(5, 50.0, 5000.0), 2), 0, now());
        assert_eq!(profile.category_levels.get("Verbs"), Some(&4));
    }

    #[test]
    fn category_window_ignores_older_sessions() {
        let params = DifficultyParams::default();
        let mut history = with_category_count(sessions(5, 50.0, 5000.0), 20);
        for record in history.iter_mut() {
            record.category_breakdown.clear();
        }
        let mut older = with_category_count(sessions(3, 50.0, 5000.0), 20);
        older.extend(history);

        let mut profile = DifficultyProfile::default();
        check_and_adjust(&params, &mut profile, &older, 0, now());
        assert!(profile.category_levels.is_empty());
    }

    #[test]
    fn smoothing_is_symmetric_around_half_steps() {
        let params = DifficultyParams::default();
        assert_eq!(smooth(&params, 5, 6.0), 6);
        assert_eq!(smooth(&params, 5, 4.0), 4);
        assert_eq!(smooth(&params, 5, 5.5), 5);
    }

    #[test]
    fn manual_override_clamps_and_records() {
        let params = DifficultyParams::default();
        let mut profile = DifficultyProfile::default();
        let adjustment = set_level(&params, &mut profile, 42, now());
        assert_eq!(adjustment.new_level, 10);
        assert_eq!(adjustment.reason, AdjustmentReason::Manual);
        assert_eq!(profile.level, 10);

        set_level(&params, &mut profile, -3, now());
        assert_eq!(profile.level, 1);
    }

    #[test]
    fn history_is_bounded() {
        let params = DifficultyParams::default();
        let mut profile = DifficultyProfile::default();
        for i in 0..50 {
            set_level(&params, &mut profile, (i % 10) + 1, now());
        }
        assert_eq!(profile.history.len(), params.max_adjustment_history);
        assert_eq!(profile.history.last().unwrap().new_level, 10);
    }
}
