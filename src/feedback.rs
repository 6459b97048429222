use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

use crate::intervention::{MIN_ATTEMPTS, STRUGGLE_THRESHOLD};
use crate::models::{AdaptiveFeedback, StandardProgress, MASTERY_THRESHOLD};

/// Only standards practiced within this window are considered.
pub const FEEDBACK_WINDOW_DAYS: i64 = 30;
/// Partially mastered standards untouched for longer than this need review.
pub const REVIEW_AFTER_DAYS: i64 = 7;

/// Classifies recently practiced standards and derives advice for the student.
pub fn adaptive_feedback(attempted: &[StandardProgress], now: DateTime<Utc>) -> AdaptiveFeedback {
    let window_start = now - Duration::days(FEEDBACK_WINDOW_DAYS);
    let review_cutoff = now - Duration::days(REVIEW_AFTER_DAYS);

    let mut struggling = BTreeSet::new();
    let mut ready = BTreeSet::new();
    let mut needs_review = BTreeSet::new();
    let mut struggling_areas = BTreeSet::new();
    let mut strength_areas = BTreeSet::new();

    for row in attempted {
        let Some(mastery) = row.mastery.as_ref() else {
            continue;
        };
        if mastery.last_attempt_at <= window_start {
            continue;
        }

        let level = mastery.mastery_level;
        if level < STRUGGLE_THRESHOLD && mastery.attempts >= MIN_ATTEMPTS {
            struggling.insert(row.standard.id);
            struggling_areas.insert(row.domain_name.clone());
        }
        if level >= MASTERY_THRESHOLD {
            ready.insert(row.standard.id);
            strength_areas.insert(row.domain_name.clone());
        }
        if (STRUGGLE_THRESHOLD..MASTERY_THRESHOLD).contains(&level)
            && mastery.last_attempt_at < review_cutoff
        {
            needs_review.insert(row.standard.id);
        }
    }

    let mut recommendations = Vec::new();
    if !struggling.is_empty() {
        recommendations
            .push("Consider reviewing fundamental concepts before attempting new material".to_string());
        recommendations.push("Use visual aids and manipulatives for better understanding".to_string());
    }
    if !ready.is_empty() {
        recommendations.push("Ready for more challenging problems in strong areas".to_string());
        recommendations.push("Consider enrichment activities to deepen understanding".to_string());
    }
    if !needs_review.is_empty() {
        recommendations.push("Schedule review sessions for recently learned concepts".to_string());
    }

    AdaptiveFeedback {
        needs_review: needs_review.into_iter().collect(),
        ready_for_advancement: ready.into_iter().collect(),
        struggling_areas: struggling_areas.into_iter().collect(),
        strength_areas: strength_areas.into_iter().collect(),
        recommendations,
    }
}
