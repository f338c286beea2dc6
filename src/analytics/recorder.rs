use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::analytics::config::HistoryParams;
use crate::analytics::types::{
    OverallTrend, PerformanceTrends, SessionMetrics, SessionPerformanceRecord, TimeOfDay,
    TrendDirection, TrendPoint,
};

const WEEKLY_POINTS: usize = 4;
const MONTHLY_POINTS: usize = 3;
const MIN_DAYS_FOR_PREDICTION: usize = 3;

pub fn build_record(
    metrics: &SessionMetrics,
    timestamp: DateTime<Utc>,
    time_of_day: TimeOfDay,
) -> SessionPerformanceRecord {
    let completion_rate = match metrics.planned_cards {
        Some(planned) if planned > 0 => (metrics.cards_reviewed as f64 / planned as f64).min(1.0),
        _ => 1.0,
    };

    SessionPerformanceRecord {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp,
        time_of_day,
        duration_seconds: metrics.duration_seconds,
        cards_reviewed: metrics.cards_reviewed,
        new_cards: metrics.new_cards.unwrap_or(0),
        accuracy: metrics.accuracy.clamp(0.0, 100.0),
        average_quality: metrics.average_quality.clamp(1.0, 5.0),
        average_response_time_ms: metrics.average_response_time_ms.max(0.0),
        study_mode: metrics.study_mode,
        category_breakdown: metrics.category_breakdown.clone(),
        mistake_counts: metrics.mistake_counts.clone(),
        completion_rate,
    }
}

/// Appends and evicts from the front once `cap` is exceeded.
pub fn append_record(
    history: &mut VecDeque<SessionPerformanceRecord>,
    record: SessionPerformanceRecord,
    cap: usize,
) {
    history.push_back(record);
    while history.len() > cap.max(1) {
        history.pop_front();
    }
}

#[derive(Default)]
struct PeriodAccumulator {
    sessions: u32,
    accuracy_sum: f64,
    cards: u32,
    seconds: u32,
    response_sum: f64,
}

impl PeriodAccumulator {
    fn add(&mut self, record: &SessionPerformanceRecord) {
        self.sessions += 1;
        self.accuracy_sum += record.accuracy;
        self.cards += record.cards_reviewed;
        self.seconds += record.duration_seconds;
        self.response_sum += record.average_response_time_ms;
    }

    fn into_point(self, period: String, start_date: NaiveDate) -> TrendPoint {
        let n = self.sessions.max(1) as f64;
        TrendPoint {
            period,
            start_date,
            sessions: self.sessions,
            accuracy: self.accuracy_sum / n,
            cards_reviewed: self.cards,
            study_seconds: self.seconds,
            average_response_time_ms: self.response_sum / n,
        }
    }
}

fn group_points<'a, I, F>(records: I, key: F) -> Vec<TrendPoint>
where
    I: Iterator<Item = &'a SessionPerformanceRecord>,
    F: Fn(NaiveDate) -> (NaiveDate, String),
{
    let mut buckets: BTreeMap<NaiveDate, (String, PeriodAccumulator)> = BTreeMap::new();
    for record in records {
        let (start, label) = key(record.timestamp.date_naive());
        buckets
            .entry(start)
            .or_insert_with(|| (label, PeriodAccumulator::default()))
            .1
            .add(record);
    }
    buckets
        .into_iter()
        .map(|(start, (label, acc))| acc.into_point(label, start))
        .collect()
}

fn keep_last(mut points: Vec<TrendPoint>, n: usize) -> Vec<TrendPoint> {
    if points.len() > n {
        points.drain(..points.len() - n);
    }
    points
}

pub fn compute_trends(
    history: &VecDeque<SessionPerformanceRecord>,
    params: &HistoryParams,
    today: NaiveDate,
) -> PerformanceTrends {
    let window_start = today - Duration::days(params.trend_window_days.max(1) - 1);

    let daily = group_points(
        history.iter().filter(|r| {
            let date = r.timestamp.date_naive();
            date >= window_start && date <= today
        }),
        |date| (date, date.format("%Y-%m-%d").to_string()),
    );

    let weekly = keep_last(
        group_points(history.iter(), |date| {
            let start = date - Duration::days(date.weekday().num_days_from_monday() as i64);
            let week = date.iso_week();
            (start, format!("{}-W{:02}", week.year(), week.week()))
        }),
        WEEKLY_POINTS,
    );

    let monthly = keep_last(
        group_points(history.iter(), |date| {
            let start = date.with_day(1).unwrap_or(date);
            (start, start.format("%Y-%m").to_string())
        }),
        MONTHLY_POINTS,
    );

    let overall = overall_trend(&daily, params, today);

    PerformanceTrends {
        daily,
        weekly,
        monthly,
        overall,
    }
}

fn overall_trend(daily: &[TrendPoint], params: &HistoryParams, today: NaiveDate) -> OverallTrend {
    let accuracies: Vec<f64> = daily.iter().map(|p| p.accuracy).collect();
    let response_times: Vec<f64> = daily.iter().map(|p| p.average_response_time_ms).collect();

    let accuracy_trend = match split_halves(&accuracies) {
        Some((first, second)) => {
            let change = second - first;
            if change > params.trend_change_points {
                TrendDirection::Improving
            } else if change < -params.trend_change_points {
                TrendDirection::Declining
            } else {
                TrendDirection::Stable
            }
        }
        None => TrendDirection::Stable,
    };

    let speed_trend = match split_halves(&response_times) {
        Some((first, second)) if first > 0.0 => {
            let change = (second - first) / first;
            if change < -params.speed_change_ratio {
                TrendDirection::Improving
            } else if change > params.speed_change_ratio {
                TrendDirection::Declining
            } else {
                TrendDirection::Stable
            }
        }
        _ => TrendDirection::Stable,
    };

    let consistency_score = if accuracies.is_empty() {
        0.0
    } else {
        (100.0 - variance(&accuracies).sqrt()).max(0.0)
    };

    OverallTrend {
        accuracy_trend,
        speed_trend,
        consistency_score,
        predicted_mastery_date: predict_mastery_date(daily, params, today),
    }
}

fn split_halves(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let mid = values.len() / 2;
    Some((mean(&values[..mid]), mean(&values[mid..])))
}

fn predict_mastery_date(
    daily: &[TrendPoint],
    params: &HistoryParams,
    today: NaiveDate,
) -> Option<NaiveDate> {
    let last = daily.last()?;
    if last.accuracy >= params.mastery_accuracy {
        return Some(today);
    }
    if daily.len() < MIN_DAYS_FOR_PREDICTION {
        return None;
    }

    let first_date = daily[0].start_date;
    let points: Vec<(f64, f64)> = daily
        .iter()
        .map(|p| ((p.start_date - first_date).num_days() as f64, p.accuracy))
        .collect();
    let slope = least_squares_slope(&points);
    if slope <= 0.0 {
        return None;
    }

    let days = ((params.mastery_accuracy - last.accuracy) / slope).ceil() as i64;
    if days > params.max_mastery_horizon_days {
        return None;
    }
    Some(last.start_date + Duration::days(days))
}

pub(crate) fn least_squares_slope(points: &[(f64, f64)]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();
    let sum_xx: f64 = points.iter().map(|(x, _)| x.powi(2)).sum();

    let denominator = n * sum_xx - sum_x.powi(2);
    if denominator.abs() < 1e-10 {
        return 0.0;
    }

    (n * sum_xy - sum_x * sum_y) / denominator
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record_on(day: u32, accuracy: f64, response_ms: f64) -> SessionPerformanceRecord {
        SessionPerformanceRecord {
            id: format!("r{day}"),
            timestamp: Utc.with_ymd_and_hms(2026, 3, day, 10, 0, 0).unwrap(),
            accuracy,
            cards_reviewed: 20,
            duration_seconds: 300,
            average_response_time_ms: response_ms,
            ..Default::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()
    }

    #[test]
    fn append_evicts_oldest_past_cap() {
        let mut history = VecDeque::new();
        for day in 1..=5 {
            append_record(&mut history, record_on(day, 80.0, 2000.0), 3);
        }
        let ids: Vec<&str> = history.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r3", "r4", "r5"]);
    }

    #[test]
    fn build_record_derives_completion_rate() {
        let metrics = SessionMetrics {
            cards_reviewed: 15,
            planned_cards: Some(20),
            accuracy: 120.0,
            average_quality: 4.0,
            ..Default::default()
        };
        let record = build_record(&metrics, Utc::now(), TimeOfDay::Evening);
        assert!((record.completion_rate - 0.75).abs() < 1e-9);
        assert_eq!(record.accuracy, 100.0);
        assert_eq!(record.time_of_day, TimeOfDay::Evening);
    }

    #[test]
    fn improving_accuracy_is_detected() {
        let history: VecDeque<_> = vec![
            record_on(2, 60.0, 3000.0),
            record_on(3, 62.0, 3000.0),
            record_on(5, 75.0, 3000.0),
            record_on(6, 80.0, 3000.0),
        ]
        .into();
        let trends = compute_trends(&history, &HistoryParams::default(), today());
        assert_eq!(trends.daily.len(), 4);
        assert_eq!(trends.overall.accuracy_trend, TrendDirection::Improving);
        assert_eq!(trends.overall.speed_trend, TrendDirection::Stable);
    }

    #[test]
    fn declining_speed_means_slower_responses() {
        let history: VecDeque<_> = vec![
            record_on(4, 80.0, 2000.0),
            record_on(5, 80.0, 2000.0),
            record_on(6, 80.0, 3000.0),
            record_on(7, 80.0, 3000.0),
        ]
        .into();
        let trends = compute_trends(&history, &HistoryParams::default(), today());
        assert_eq!(trends.overall.accuracy_trend, TrendDirection::Stable);
        assert_eq!(trends.overall.speed_trend, TrendDirection::Declining);
        assert!((trends.overall.consistency_score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn records_outside_window_are_not_daily_points() {
        let mut old = record_on(1, 50.0, 3000.0);
        old.timestamp = Utc.with_ymd_and_hms(2026, 2, 20, 10, 0, 0).unwrap();
        let history: VecDeque<_> = vec![old, record_on(6, 90.0, 3000.0)].into();
        let trends = compute_trends(&history, &HistoryParams::default(), today());
        assert_eq!(trends.daily.len(), 1);
        assert_eq!(trends.monthly.len(), 2);
        assert_eq!(trends.monthly[1].sessions, 1);
        assert_eq!(trends.monthly[0].period, "2026-02");
    }

    #[test]
    fn mastery_date_extrapolates_positive_slope() {
        let history: VecDeque<_> = vec![
            record_on(3, 70.0, 3000.0),
            record_on(4, 75.0, 3000.0),
            record_on(5, 80.0, 3000.0),
        ]
        .into();
        let trends = compute_trends(&history, &HistoryParams::default(), today());
        assert_eq!(
            trends.overall.predicted_mastery_date,
            Some(NaiveDate::from_ymd_opt(2026, 3, 7).unwrap())
        );
    }

    #[test]
    fn slope_of_flat_series_is_zero() {
        let points = vec![(0.0, 5.0), (1.0, 5.0), (2.0, 5.0)];
        assert!(least_squares_slope(&points).abs() < 1e-10);
    }
}
