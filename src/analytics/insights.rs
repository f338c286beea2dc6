use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use crate::analytics::config::InsightParams;
use crate::analytics::types::{
    DailyRecommendation, InsightType, LearningInsight, Severity, WeakSpot,
};

struct Source {
    key: String,
    insight_type: InsightType,
    title: String,
    description: String,
    severity: Severity,
    payload: serde_json::Value,
}

fn weak_spot_sources(weak_spots: &[WeakSpot]) -> impl Iterator<Item = Source> + '_ {
    weak_spots
        .iter()
        .filter(|s| s.severity >= Severity::Warning)
        .map(|spot| Source {
            key: format!("weak_spot:{}", spot.id),
            insight_type: InsightType::WeakSpot,
            title: format!("Weak spot: {}", spot.target),
            description: format!("{} {}", spot.description, spot.suggested_action),
            severity: spot.severity,
            payload: json!({
                "weakSpotId": spot.id,
                "type": spot.spot_type,
                "target": spot.target,
                "score": spot.score,
                "affectedCardIds": spot.affected_card_ids,
            }),
        })
}

fn recommendation_source(daily: Option<&DailyRecommendation>) -> Option<Source> {
    let top = daily?.recommendations.first()?;
    Some(Source {
        key: format!("recommendation:{}", top.id),
        insight_type: InsightType::Recommendation,
        title: top.title.clone(),
        description: top.description.clone(),
        severity: top.severity,
        payload: json!({
            "recommendationId": top.id,
            "type": top.recommendation_type,
            "suggestedCardCount": top.suggested_card_count,
            "estimatedTimeMinutes": top.estimated_time_minutes,
        }),
    })
}

/// Adds insights for sources not already covered by an unexpired insight.
/// Existing insights are never removed. Returns how many were created.
pub fn reconcile(
    params: &InsightParams,
    insights: &mut Vec<LearningInsight>,
    weak_spots: &[WeakSpot],
    daily: Option<&DailyRecommendation>,
    now: DateTime<Utc>,
) -> usize {
    let lifetime = Duration::hours(params.insight_expiry_hours.max(1));
    let mut created = 0;

    // The top recommendation goes first so a busy pass cannot crowd it out.
    let sources = recommendation_source(daily)
        .into_iter()
        .chain(weak_spot_sources(weak_spots));
    for source in sources {
        if created >= params.max_new_insights_per_pass {
            break;
        }
        let covered = insights
            .iter()
            .any(|i| i.source_key == source.key && !i.is_expired(now));
        if covered {
            continue;
        }

        insights.push(LearningInsight {
            id: uuid::Uuid::new_v4().to_string(),
            insight_type: source.insight_type,
            source_key: source.key,
            title: source.title,
            description: source.description,
            severity: source.severity,
            payload: source.payload,
            created_at: now,
            expires_at: now + lifetime,
            dismissed: false,
            action_taken: false,
        });
        created += 1;
    }

    if created > 0 {
        tracing::debug!(created, total = insights.len(), "insights reconciled");
    }
    created
}

pub fn active(insights: &[LearningInsight], now: DateTime<Utc>) -> Vec<LearningInsight> {
    insights.iter().filter(|i| i.is_active(now)).cloned().collect()
}

pub fn dismiss(insights: &mut [LearningInsight], id: &str) -> bool {
    match insights.iter_mut().find(|i| i.id == id) {
        Some(insight) => {
            insight.dismissed = true;
            true
        }
        None => false,
    }
}

pub fn mark_action_taken(insights: &mut [LearningInsight], id: &str) -> bool {
    match insights.iter_mut().find(|i| i.id == id) {
        Some(insight) => {
            insight.action_taken = true;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::types::{RecommendationType, StudyRecommendation, WeakSpotType};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap()
    }

    fn spot(target: &str, severity: Severity) -> WeakSpot {
        WeakSpot {
            id: WeakSpot::stable_id(WeakSpotType::Category, target),
            spot_type: WeakSpotType::Category,
            target: target.to_string(),
            severity,
            score: 70.0,
            description: "low accuracy.".to_string(),
            suggested_action: "Drill it.".to_string(),
            affected_card_ids: vec!["c1".to_string()],
            detected_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn reconcile_does_not_duplicate_live_sources() {
        let params = InsightParams::default();
        let spots = vec![spot("Verbs", Severity::Critical), spot("Nouns", Severity::Info)];
        let mut insights = Vec::new();

        assert_eq!(reconcile(&params, &mut insights, &spots, None, now()), 1);
        assert_eq!(reconcile(&params, &mut insights, &spots, None, now()), 0);

        let id = insights[0].id.clone();
        assert!(dismiss(&mut insights, &id));
        assert_eq!(reconcile(&params, &mut insights, &spots, None, now()), 0);

        let tomorrow = now() + Duration::hours(25);
        assert_eq!(reconcile(&params, &mut insights, &spots, None, tomorrow), 1);
        assert_eq!(insights.len(), 2);
    }

    #[test]
    fn reconcile_respects_per_pass_limit() {
        let params = InsightParams::default();
        let spots: Vec<WeakSpot> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|t| spot(t, Severity::Warning))
            .collect();
        let mut insights = Vec::new();
        assert_eq!(reconcile(&params, &mut insights, &spots, None, now()), 3);
    }

    #[test]
    fn top_recommendation_survives_a_full_pass() {
        let params = InsightParams::default();
        let spots: Vec<WeakSpot> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|t| spot(t, Severity::Warning))
            .collect();
        let daily = DailyRecommendation {
            recommendations: vec![StudyRecommendation {
                id: "review_due".to_string(),
                recommendation_type: RecommendationType::ReviewDue,
                title: "Review due cards".to_string(),
                description: "12 cards are due".to_string(),
                target: None,
                severity: Severity::Info,
                priority: 1,
                priority_score: 76.0,
                suggested_card_count: 12,
                estimated_time_minutes: 3,
                card_ids: Vec::new(),
                study_mode: None,
            }],
            ..Default::default()
        };
        let mut insights = Vec::new();

        assert_eq!(reconcile(&params, &mut insights, &spots, Some(&daily), now()), 3);
        assert_eq!(insights[0].insight_type, InsightType::Recommendation);
        assert_eq!(insights[0].source_key, "recommendation:review_due");
        assert_eq!(insights[0].payload["suggestedCardCount"], 12);

        assert_eq!(reconcile(&params, &mut insights, &spots, Some(&daily), now()), 3);
        let weak: Vec<&str> = insights
            .iter()
            .filter(|i| i.insight_type == InsightType::WeakSpot)
            .map(|i| i.source_key.as_str())
            .collect();
        assert_eq!(weak.len(), 5);
    }

    #[test]
    fn expired_and_dismissed_are_not_active() {
        let params = InsightParams::default();
        let spots = vec![spot("Verbs", Severity::Critical), spot("Nouns", Severity::Warning)];
        let mut insights = Vec::new();
        reconcile(&params, &mut insights, &spots, None, now());
        insights[0].expires_at = now() - Duration::seconds(1);

        let active_now = active(&insights, now());
        assert_eq!(active_now.len(), 1);

        let id = active_now[0].id.clone();
        assert!(dismiss(&mut insights, &id));
        assert!(dismiss(&mut insights, &id));
        assert!(active(&insights, now()).is_empty());
        assert!(!dismiss(&mut insights, "missing"));
    }

    #[test]
    fn action_taken_flag_is_idempotent() {
        let params = InsightParams::default();
        let mut insights = Vec::new();
        reconcile(&params, &mut insights, &[spot("Verbs", Severity::Critical)], None, now());
        let id = insights[0].id.clone();
        assert!(mark_action_taken(&mut insights, &id));
        assert!(mark_action_taken(&mut insights, &id));
        assert!(insights[0].action_taken);
        assert!(!mark_action_taken(&mut insights, "missing"));
    }
}
