use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::MasteryError;
use crate::models::{SessionInput, StudentMastery, MASTERY_THRESHOLD};

/// Weight kept from the previous mastery when a session scores below it.
const BLEND_RETAIN: f64 = 0.7;
/// Weight given to a session score that is below the current mastery.
const BLEND_NEW: f64 = 0.3;

/// How a new session score is merged into an existing mastery level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Mastery never decreases: `max(current, score)`.
    Max,
    /// Higher scores overwrite, lower scores pull mastery down by 30% of the gap.
    #[default]
    Blended,
}

impl MergePolicy {
    pub fn merge(self, current: f64, score: f64) -> f64 {
        match self {
            MergePolicy::Max => current.max(score),
            MergePolicy::Blended => {
                if score > current {
                    score
                } else {
                    current * BLEND_RETAIN + score * BLEND_NEW
                }
            }
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergePolicy::Max => f.write_str("max"),
            MergePolicy::Blended => f.write_str("blended"),
        }
    }
}

impl FromStr for MergePolicy {
    type Err = MasteryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "max" => Ok(MergePolicy::Max),
            "blended" | "blend" => Ok(MergePolicy::Blended),
            other => Err(MasteryError::validation(format!(
                "unknown merge policy '{other}' (expected 'max' or 'blended')"
            ))),
        }
    }
}

/// Rejects sessions whose score or duration is outside the accepted range.
pub fn validate_session(input: &SessionInput) -> Result<(), MasteryError> {
    if !input.score.is_finite() || !(0.0..=1.0).contains(&input.score) {
        return Err(MasteryError::validation(format!(
            "score must be within [0, 1], got {}",
            input.score
        )));
    }
    if input.time_spent_minutes < 0 {
        return Err(MasteryError::validation(format!(
            "time spent must be non-negative, got {}",
            input.time_spent_minutes
        )));
    }
    Ok(())
}

/// Mastery row for a student's first session on a standard.
pub fn first_session(id: i32, input: &SessionInput, now: DateTime<Utc>) -> StudentMastery {
    StudentMastery {
        id,
        student_id: input.student_id,
        standard_id: input.standard_id,
        mastery_level: input.score,
        attempts: 1,
        first_attempt_at: now,
        last_attempt_at: now,
        mastered_at: (input.score >= MASTERY_THRESHOLD).then_some(now),
        time_spent_minutes: input.time_spent_minutes,
        created_at: now,
        updated_at: now,
    }
}

/// Folds one more session into an existing mastery row.
///
/// `mastered_at` is sealed the first time the merged level reaches the
/// threshold and is never cleared afterwards.
pub fn apply_session(
    current: &StudentMastery,
    input: &SessionInput,
    policy: MergePolicy,
    now: DateTime<Utc>,
) -> StudentMastery {
    let mastery_level = policy.merge(current.mastery_level, input.score);
    let mastered_at = current
        .mastered_at
        .or_else(|| (mastery_level >= MASTERY_THRESHOLD).then_some(now));

    StudentMastery {
        mastery_level,
        attempts: current.attempts + 1,
        last_attempt_at: now,
        mastered_at,
        time_spent_minutes: current.time_spent_minutes + input.time_spent_minutes,
        updated_at: now,
        ..current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn session(score: f64, minutes: i32) -> SessionInput {
        SessionInput {
            student_id: 7,
            standard_id: 42,
            score,
            time_spent_minutes: minutes,
        }
    }

    fn existing(level: f64, attempts: i32) -> StudentMastery {
        let mut row = first_session(1, &session(level, 10), Utc::now() - Duration::days(2));
        row.attempts = attempts;
        row
    }

    #[test]
    fn first_session_seeds_row_from_score() {
        let now = Utc::now();
        let row = first_session(1, &session(0.9, 10), now);
        assert_eq!(row.mastery_level, 0.9);
        assert_eq!(row.attempts, 1);
        assert_eq!(row.first_attempt_at, now);
        assert_eq!(row.last_attempt_at, now);
        assert_eq!(row.mastered_at, Some(now));
        assert_eq!(row.time_spent_minutes, 10);
    }

    #[test]
    fn first_low_session_is_not_mastered() {
        let row = first_session(1, &session(0.4, 3), Utc::now());
        assert_eq!(row.mastered_at, None);
    }

    #[test]
    fn blended_pulls_down_partially_on_low_score() {
        let now = Utc::now();
        let row = apply_session(&existing(0.6, 2), &session(0.3, 5), MergePolicy::Blended, now);
        assert!((row.mastery_level - 0.51).abs() < 1e-9);
        assert_eq!(row.attempts, 3);
        assert_eq!(row.mastered_at, None);
        assert_eq!(row.time_spent_minutes, 15);
        assert_eq!(row.last_attempt_at, now);
    }

    #[test]
    fn blended_overwrites_on_higher_score() {
        let row = apply_session(&existing(0.4, 1), &session(0.7, 5), MergePolicy::Blended, Utc::now());
        assert_eq!(row.mastery_level, 0.7);
    }

    #[test]
    fn max_policy_keeps_best_score() {
        let row = apply_session(&existing(0.6, 2), &session(0.3, 5), MergePolicy::Max, Utc::now());
        assert_eq!(row.mastery_level, 0.6);
        let row = apply_session(&row, &session(0.85, 5), MergePolicy::Max, Utc::now());
        assert_eq!(row.mastery_level, 0.85);
        assert!(row.mastered_at.is_some());
    }

    #[test]
    fn first_attempt_timestamp_is_preserved() {
        let before = existing(0.5, 1);
        let row = apply_session(&before, &session(0.5, 1), MergePolicy::Blended, Utc::now());
        assert_eq!(row.first_attempt_at, before.first_attempt_at);
        assert_eq!(row.created_at, before.created_at);
    }

    #[test]
    fn mastered_at_survives_a_later_drop() {
        let sealed_at = Utc::now() - Duration::hours(1);
        let mastered = apply_session(&existing(0.5, 1), &session(0.9, 5), MergePolicy::Blended, sealed_at);
        assert_eq!(mastered.mastered_at, Some(sealed_at));

        let mut row = mastered;
        for _ in 0..5 {
            row = apply_session(&row, &session(0.0, 1), MergePolicy::Blended, Utc::now());
        }
        assert!(row.mastery_level < MASTERY_THRESHOLD);
        assert_eq!(row.mastered_at, Some(sealed_at));
    }

    #[test]
    fn mastered_at_uses_the_merged_level() {
        // 0.85 blended with 0.8 stays above the threshold even though it is not a new high.
        let mut row = existing(0.85, 1);
        row.mastered_at = None;
        let now = Utc::now();
        let row = apply_session(&row, &session(0.8, 1), MergePolicy::Blended, now);
        assert_eq!(row.mastered_at, Some(now));
    }

    #[test]
    fn rejects_out_of_range_scores() {
        assert!(validate_session(&session(1.2, 1)).is_err());
        assert!(validate_session(&session(-0.1, 1)).is_err());
        assert!(validate_session(&session(f64::NAN, 1)).is_err());
        assert!(validate_session(&session(0.5, -1)).is_err());
        assert!(validate_session(&session(0.0, 0)).is_ok());
        assert!(validate_session(&session(1.0, 0)).is_ok());
    }

    #[test]
    fn parses_policy_names() {
        assert_eq!("max".parse::<MergePolicy>().ok(), Some(MergePolicy::Max));
        assert_eq!(" Blended ".parse::<MergePolicy>().ok(), Some(MergePolicy::Blended));
        assert!("average".parse::<MergePolicy>().is_err());
        assert_eq!(MergePolicy::default(), MergePolicy::Blended);
    }

    fn arb_score() -> impl Strategy<Value = f64> {
        (0u32..=1000u32).prop_map(|v| f64::from(v) / 1000.0)
    }

    fn arb_policy() -> impl Strategy<Value = MergePolicy> {
        prop_oneof![Just(MergePolicy::Max), Just(MergePolicy::Blended)]
    }

    proptest! {
        #[test]
        fn mastery_stays_in_unit_interval(
            scores in proptest::collection::vec(arb_score(), 1..40),
            policy in arb_policy(),
        ) {
            let now = Utc::now();
            let mut row = first_session(1, &session(scores[0], 1), now);
            for score in &scores[1..] {
                row = apply_session(&row, &session(*score, 1), policy, now);
                prop_assert!((0.0..=1.0).contains(&row.mastery_level));
            }
            prop_assert_eq!(row.attempts as usize, scores.len());
            prop_assert_eq!(row.time_spent_minutes as usize, scores.len());
        }

        #[test]
        fn max_policy_never_decreases(
            scores in proptest::collection::vec(arb_score(), 1..40),
        ) {
            let now = Utc::now();
            let mut row = first_session(1, &session(scores[0], 1), now);
            for score in &scores[1..] {
                let next = apply_session(&row, &session(*score, 1), MergePolicy::Max, now);
                prop_assert!(next.mastery_level >= row.mastery_level);
                row = next;
            }
        }

        #[test]
        fn mastered_at_is_set_once(
            scores in proptest::collection::vec(arb_score(), 1..40),
            policy in arb_policy(),
        ) {
            let start = Utc::now();
            let mut row = first_session(1, &session(scores[0], 1), start);
            let mut sealed = row.mastered_at;
            for (i, score) in scores[1..].iter().enumerate() {
                let now = start + Duration::minutes(i as i64 + 1);
                row = apply_session(&row, &session(*score, 1), policy, now);
                if sealed.is_some() {
                    prop_assert_eq!(row.mastered_at, sealed);
                } else if row.mastery_level >= MASTERY_THRESHOLD {
                    prop_assert_eq!(row.mastered_at, Some(now));
                    sealed = row.mastered_at;
                } else {
                    prop_assert_eq!(row.mastered_at, None);
                }
            }
        }
    }
}
