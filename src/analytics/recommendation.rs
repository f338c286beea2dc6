use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};

use crate::analytics::aggregator::SnapshotIndex;
use crate::analytics::config::{EngineConfig, RecommendationParams};
use crate::analytics::style;
use crate::analytics::types::{
    slug, CardProgress, DailyRecommendation, DifficultyDistribution, DifficultyProfile, Flashcard,
    LearningStyleProfile, MistakeRecord, RecommendationType, SessionComposition,
    SessionPerformanceRecord, Severity, StudyMode, StudyRecommendation, TimePerformance, WeakSpot,
    WeakSpotType,
};

const OPTIMAL_SLOT_COUNT: usize = 2;
const MAX_FOCUS_AREAS: usize = 3;
const NEW_CARD_DIFFICULTY: f64 = 0.5;
const EASY_CUTOFF: f64 = 0.33;
const HARD_CUTOFF: f64 = 0.66;
const UNCATEGORIZED: &str = "uncategorized";

/// Read-only view of the engine state the generator works from.
pub struct RecommendationContext<'a> {
    pub history: &'a VecDeque<SessionPerformanceRecord>,
    pub weak_spots: &'a [WeakSpot],
    pub time_buckets: &'a [TimePerformance],
    pub style: &'a LearningStyleProfile,
    pub difficulty: &'a DifficultyProfile,
    pub cards: &'a [Flashcard],
    pub progress: &'a [CardProgress],
    pub mistakes: &'a [MistakeRecord],
}

pub fn due_card_ids(progress: &[CardProgress], now: DateTime<Utc>) -> BTreeSet<String> {
    progress
        .iter()
        .filter(|p| p.next_review.is_some_and(|due| due <= now))
        .map(|p| p.card_id.clone())
        .collect()
}

/// Cards due more than a day ago.
pub fn overdue_card_ids(progress: &[CardProgress], now: DateTime<Utc>) -> BTreeSet<String> {
    let cutoff = now - Duration::days(1);
    progress
        .iter()
        .filter(|p| p.next_review.is_some_and(|due| due < cutoff))
        .map(|p| p.card_id.clone())
        .collect()
}

pub fn new_card_ids(cards: &[Flashcard], progress: &[CardProgress]) -> BTreeSet<String> {
    let studied: HashSet<&str> = progress.iter().map(|p| p.card_id.as_str()).collect();
    cards
        .iter()
        .filter(|c| !studied.contains(c.id.as_str()))
        .map(|c| c.id.clone())
        .collect()
}

fn is_experienced(params: &RecommendationParams, history: &VecDeque<SessionPerformanceRecord>) -> bool {
    let reviewed: u32 = history.iter().map(|r| r.cards_reviewed).sum();
    reviewed >= params.advanced_experience_cards
}

fn new_card_ratio(params: &RecommendationParams, history: &VecDeque<SessionPerformanceRecord>) -> f64 {
    if is_experienced(params, history) {
        params.new_card_ratio_advanced
    } else {
        params.new_card_ratio_beginner
    }
}

pub fn estimate_minutes(params: &RecommendationParams, cards: u32) -> u32 {
    let minutes = (cards as f64 * params.seconds_per_card_estimate / 60.0).ceil() as u32;
    minutes.min(params.max_session_duration_minutes)
}

struct Candidate {
    kind: RecommendationType,
    title: String,
    description: String,
    target: Option<String>,
    severity: Severity,
    score: f64,
    card_ids: Vec<String>,
    card_count: u32,
    study_mode: Option<StudyMode>,
}

pub fn generate_daily(
    config: &EngineConfig,
    ctx: &RecommendationContext<'_>,
    now: DateTime<Utc>,
) -> DailyRecommendation {
    let params = &config.recommendation;
    let mut candidates = Vec::new();

    candidates.extend(streak_candidate(params, ctx, now));
    candidates.extend(review_candidate(ctx, now));
    candidates.extend(weakness_candidates(params, ctx, now));
    candidates.extend(coverage_candidates(params, ctx));
    candidates.extend(new_card_candidate(params, ctx));
    candidates.extend(mode_candidates(params, ctx));

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.target.cmp(&b.target))
    });
    candidates.truncate(params.max_daily_recommendations);

    let recommendations: Vec<StudyRecommendation> = candidates
        .into_iter()
        .enumerate()
        .map(|(i, c)| StudyRecommendation {
            id: match &c.target {
                Some(target) => format!("{}:{}", c.kind.as_str(), slug(target)),
                None => c.kind.as_str().to_string(),
            },
            recommendation_type: c.kind,
            title: c.title,
            description: c.description,
            target: c.target,
            severity: c.severity,
            priority: i as u32 + 1,
            priority_score: c.score,
            suggested_card_count: c.card_count,
            estimated_time_minutes: estimate_minutes(params, c.card_count),
            card_ids: c.card_ids,
            study_mode: c.study_mode,
        })
        .collect();

    let focus_areas = ctx
        .weak_spots
        .iter()
        .filter(|s| s.severity >= Severity::Warning)
        .take(MAX_FOCUS_AREAS)
        .map(|s| s.target.clone())
        .collect();

    let suggested_total_minutes = recommendations
        .iter()
        .map(|r| r.estimated_time_minutes)
        .sum::<u32>()
        .min(params.max_session_duration_minutes);

    let mut slots: Vec<&TimePerformance> = ctx.time_buckets.iter().collect();
    slots.sort_by(|a, b| {
        b.optimal_score
            .partial_cmp(&a.optimal_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    DailyRecommendation {
        date: now.date_naive(),
        generated_at: now,
        recommendations,
        focus_areas,
        suggested_total_minutes,
        optimal_time_slots: slots.iter().take(OPTIMAL_SLOT_COUNT).map(|t| t.time_of_day).collect(),
    }
}

fn streak_candidate(
    params: &RecommendationParams,
    ctx: &RecommendationContext<'_>,
    now: DateTime<Utc>,
) -> Option<Candidate> {
    let last = ctx.history.iter().map(|r| r.timestamp).max()?;
    let days_since = (now.date_naive() - last.date_naive()).num_days();
    if days_since < params.streak_risk_threshold_days - 1 {
        return None;
    }
    let card_count = params.default_session_cards / 2;
    Some(Candidate {
        kind: RecommendationType::StreakAtRisk,
        title: "Keep your streak alive".to_string(),
        description: format!("Last study session was {days_since} day(s) ago"),
        target: None,
        severity: Severity::Warning,
        score: 90.0 + (days_since as f64).min(10.0),
        card_ids: Vec::new(),
        card_count: card_count.max(1),
        study_mode: None,
    })
}

fn review_candidate(ctx: &RecommendationContext<'_>, now: DateTime<Utc>) -> Option<Candidate> {
    let due = due_card_ids(ctx.progress, now);
    if due.is_empty() {
        return None;
    }
    let overdue = overdue_card_ids(ctx.progress, now);
    let count = due.len() as u32;
    Some(Candidate {
        kind: RecommendationType::ReviewDue,
        title: "Review due cards".to_string(),
        description: format!("{} cards are due, {} overdue", due.len(), overdue.len()),
        target: None,
        severity: if overdue.is_empty() { Severity::Info } else { Severity::Warning },
        score: 70.0 + (count as f64 / 2.0).min(20.0) + if overdue.is_empty() { 0.0 } else { 5.0 },
        card_ids: due.into_iter().collect(),
        card_count: count,
        study_mode: None,
    })
}

fn weakness_candidates(
    params: &RecommendationParams,
    ctx: &RecommendationContext<'_>,
    now: DateTime<Utc>,
) -> Vec<Candidate> {
    let session_cap = params.default_session_cards.max(1);
    ctx.weak_spots
        .iter()
        .filter(|s| s.severity >= Severity::Warning && !s.affected_card_ids.is_empty())
        .map(|spot| {
            let severity_bonus = if spot.severity == Severity::Critical { 15.0 } else { 0.0 };
            let recency_bonus = if now - spot.detected_at <= Duration::days(7) { 5.0 } else { 0.0 };
            let count = (spot.affected_card_ids.len() as u32).min(session_cap);
            let (kind, title, study_mode) = if spot.spot_type == WeakSpotType::ErrorType {
                let mode = (spot.target == "spelling").then_some(StudyMode::Typing);
                (RecommendationType::FocusErrorType, format!("Focus on {} errors", spot.target), mode)
            } else {
                (RecommendationType::WeaknessDrill, format!("Drill {}", spot.target), None)
            };
            Candidate {
                kind,
                title,
                description: spot.suggested_action.clone(),
                target: Some(spot.target.clone()),
                severity: spot.severity,
                score: 40.0 + spot.score * 0.4 + severity_bonus + recency_bonus,
                card_ids: spot.affected_card_ids.iter().take(count as usize).cloned().collect(),
                card_count: count,
                study_mode,
            }
        })
        .collect()
}

fn coverage_candidates(params: &RecommendationParams, ctx: &RecommendationContext<'_>) -> Vec<Candidate> {
    let studied: HashSet<&str> = ctx.progress.iter().map(|p| p.card_id.as_str()).collect();
    let mut by_category: BTreeMap<&str, (u32, Vec<&str>)> = BTreeMap::new();
    for card in ctx.cards {
        let entry = by_category.entry(card.category.as_str()).or_default();
        entry.0 += 1;
        if !studied.contains(card.id.as_str()) {
            entry.1.push(card.id.as_str());
        }
    }

    by_category
        .into_iter()
        .filter_map(|(category, (total, unstudied))| {
            let coverage = (total - unstudied.len() as u32) as f64 / total as f64;
            if coverage >= params.low_coverage_threshold {
                return None;
            }
            let count = (unstudied.len() as u32).min(params.default_session_cards.max(1));
            let gap = if params.low_coverage_threshold > 0.0 {
                1.0 - coverage / params.low_coverage_threshold
            } else {
                0.0
            };
            Some(Candidate {
                kind: RecommendationType::CategoryFocus,
                title: format!("Explore {category}"),
                description: format!("Only {:.0}% of {category} has been studied", coverage * 100.0),
                target: Some(category.to_string()),
                severity: Severity::Info,
                score: 45.0 + 20.0 * gap,
                card_ids: unstudied.iter().take(count as usize).map(|s| s.to_string()).collect(),
                card_count: count,
                study_mode: None,
            })
        })
        .collect()
}

fn new_card_candidate(params: &RecommendationParams, ctx: &RecommendationContext<'_>) -> Option<Candidate> {
    let backlog = new_card_ids(ctx.cards, ctx.progress);
    if backlog.is_empty() {
        return None;
    }
    let ratio = new_card_ratio(params, ctx.history);
    let count = ((backlog.len() as f64 * ratio).round() as u32)
        .clamp(1, params.max_new_cards_per_day.max(1));
    Some(Candidate {
        kind: RecommendationType::NewCards,
        title: "Learn new cards".to_string(),
        description: format!("{} new cards waiting", backlog.len()),
        target: None,
        severity: Severity::Info,
        score: 40.0,
        card_ids: backlog.into_iter().take(count as usize).collect(),
        card_count: count,
        study_mode: None,
    })
}

fn mode_candidates(params: &RecommendationParams, ctx: &RecommendationContext<'_>) -> Vec<Candidate> {
    let total_sessions = ctx.history.len();
    if total_sessions == 0 {
        return Vec::new();
    }
    ctx.style
        .mode_effectiveness
        .iter()
        .filter(|(_, eff)| eff.effectiveness_score >= params.effective_mode_threshold)
        .filter(|(_, eff)| (eff.sessions as f64 / total_sessions as f64) < params.underused_mode_share)
        .map(|(mode, eff)| Candidate {
            kind: RecommendationType::ModePractice,
            title: format!("Try more {} sessions", mode.as_str()),
            description: format!(
                "{} scores {:.0} effectiveness but is rarely used",
                mode.as_str(),
                eff.effectiveness_score
            ),
            target: Some(mode.as_str().to_string()),
            severity: Severity::Info,
            score: 30.0 + eff.effectiveness_score * 0.1,
            card_ids: Vec::new(),
            card_count: params.default_session_cards.max(1) / 2,
            study_mode: Some(*mode),
        })
        .collect()
}

/// Largest remainder apportionment. Non-empty `weights` always yield parts
/// summing to `total`; non-positive weight sets are split evenly.
pub fn apportion(total: u32, weights: &[f64]) -> Vec<u32> {
    if weights.is_empty() {
        return Vec::new();
    }
    let clean: Vec<f64> = weights
        .iter()
        .map(|w| if w.is_finite() && *w > 0.0 { *w } else { 0.0 })
        .collect();
    let sum: f64 = clean.iter().sum();
    let clean = if sum > 0.0 { clean } else { vec![1.0; weights.len()] };
    let sum: f64 = clean.iter().sum();

    let quotas: Vec<f64> = clean.iter().map(|w| total as f64 * w / sum).collect();
    let mut parts: Vec<u32> = quotas.iter().map(|q| q.floor() as u32).collect();
    let assigned: u32 = parts.iter().sum();
    let mut remaining = total.saturating_sub(assigned);

    let mut order: Vec<usize> = (0..quotas.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = quotas[a] - quotas[a].floor();
        let fb = quotas[b] - quotas[b].floor();
        fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b))
    });
    for i in order.iter().cycle() {
        if remaining == 0 {
            break;
        }
        parts[*i] += 1;
        remaining -= 1;
    }
    parts
}

/// Card difficulty in `[0, 1]` from ease and mistake rate.
pub fn card_difficulty(index: &SnapshotIndex<'_>, card_id: &str) -> f64 {
    let Some(entries) = index.progress_by_card.get(card_id).filter(|e| !e.is_empty()) else {
        return NEW_CARD_DIFFICULTY;
    };
    let ease = entries.iter().map(|p| p.ease_factor).sum::<f64>() / entries.len() as f64;
    let ease_difficulty = ((2.5 - ease) / (2.5 - 1.3)).clamp(0.0, 1.0);

    let mistakes = index.mistake_count(card_id) as f64;
    let repetitions: f64 = entries.iter().map(|p| p.repetitions as f64).sum();
    let attempts = mistakes + repetitions;
    let mistake_rate = if attempts > 0.0 { mistakes / attempts } else { 0.0 };

    0.6 * ease_difficulty + 0.4 * mistake_rate
}

pub fn compose_session(
    config: &EngineConfig,
    ctx: &RecommendationContext<'_>,
    target_cards: Option<u32>,
    now: DateTime<Utc>,
) -> SessionComposition {
    let params = &config.recommendation;
    let index = SnapshotIndex::new(ctx.cards, ctx.progress, ctx.mistakes);

    let max_cards = if params.seconds_per_card_estimate > 0.0 {
        (params.max_session_duration_minutes as f64 * 60.0 / params.seconds_per_card_estimate).floor() as u32
    } else {
        u32::MAX
    };
    let total_cards = target_cards.unwrap_or(params.default_session_cards).min(max_cards);

    let weak_pool: BTreeSet<&str> = ctx
        .weak_spots
        .iter()
        .filter(|s| s.severity >= Severity::Warning)
        .flat_map(|s| s.affected_card_ids.iter().map(String::as_str))
        .collect();
    let new_pool = new_card_ids(ctx.cards, ctx.progress);
    let due_pool = due_card_ids(ctx.progress, now);

    let weakness_ratio = params.weakness_card_ratio.clamp(0.0, 1.0);
    let weakness_cards = ((total_cards as f64 * weakness_ratio).round() as u32)
        .min(weak_pool.len() as u32)
        .min(total_cards);
    let rest = total_cards - weakness_cards;
    let new_ratio = new_card_ratio(params, ctx.history).clamp(0.0, 1.0);
    let new_cards = ((rest as f64 * new_ratio).round() as u32)
        .min(new_pool.len() as u32)
        .min(params.max_new_cards_per_day)
        .min(rest);
    let review_cards = rest - new_cards;

    let pool: BTreeSet<&str> = weak_pool
        .iter()
        .copied()
        .chain(new_pool.iter().map(String::as_str))
        .chain(due_pool.iter().map(String::as_str))
        .collect();

    let mut category_weights: BTreeMap<&str, f64> = BTreeMap::new();
    for id in &pool {
        if let Some(category) = index.category_of(id) {
            *category_weights.entry(category).or_insert(0.0) += 1.0;
        }
    }
    if category_weights.is_empty() {
        for card in ctx.cards {
            *category_weights.entry(card.category.as_str()).or_insert(0.0) += 1.0;
        }
    }
    let category_breakdown: BTreeMap<String, u32> = if category_weights.is_empty() {
        BTreeMap::from([(UNCATEGORIZED.to_string(), total_cards)])
    } else {
        let weights: Vec<f64> = category_weights.values().copied().collect();
        category_weights
            .keys()
            .zip(apportion(total_cards, &weights))
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    };

    let sampled: Vec<(StudyMode, f64)> = ctx
        .style
        .mode_effectiveness
        .iter()
        .filter(|(_, eff)| eff.sessions >= config.style.min_mode_samples)
        .map(|(mode, eff)| (*mode, eff.effectiveness_score))
        .collect();
    let mode_breakdown: BTreeMap<StudyMode, u32> = if sampled.is_empty() {
        BTreeMap::from([(style::recommended_mode(&config.style, ctx.style, false), total_cards)])
    } else {
        let weights: Vec<f64> = sampled.iter().map(|(_, w)| *w).collect();
        sampled
            .iter()
            .map(|(m, _)| *m)
            .zip(apportion(total_cards, &weights))
            .collect()
    };

    let mut buckets = [0.0f64; 3];
    for id in &pool {
        let d = card_difficulty(&index, id);
        if d < EASY_CUTOFF {
            buckets[0] += 1.0;
        } else if d > HARD_CUTOFF {
            buckets[2] += 1.0;
        } else {
            buckets[1] += 1.0;
        }
    }
    if pool.is_empty() {
        let level = ctx.difficulty.level.clamp(config.difficulty.min_level, config.difficulty.max_level) as f64;
        let span = config.difficulty.max_level.saturating_sub(config.difficulty.min_level).max(1) as f64;
        let hard_share = (level - config.difficulty.min_level as f64) / span;
        buckets = [1.0 - hard_share, 1.0, hard_share];
    }
    let split = apportion(total_cards, &buckets);

    SessionComposition {
        total_cards,
        new_cards,
        review_cards,
        weakness_cards,
        category_breakdown,
        mode_breakdown,
        estimated_minutes: estimate_minutes(params, total_cards),
        difficulty_distribution: DifficultyDistribution {
            easy: split[0],
            medium: split[1],
            hard: split[2],
        },
    }
}
