//! Practice activity over a trailing window, bucketed by day and by ISO week.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::error::MasteryError;
use crate::models::{DailyActivity, EngagementAnalytics, StandardProgress, WeeklyTrend};

pub const DEFAULT_WINDOW_DAYS: i64 = 30;
const MAX_WINDOW_DAYS: i64 = 366;

#[derive(Default)]
struct Bucket {
    standards: BTreeSet<i32>,
    minutes: i64,
    mastery_sum: f64,
    rows: usize,
}

impl Bucket {
    fn add(&mut self, row: &StandardProgress) {
        self.standards.insert(row.standard.id);
        self.minutes += row.time_spent_minutes();
        self.mastery_sum += row.mastery_level();
        self.rows += 1;
    }

    fn average(&self) -> f64 {
        if self.rows == 0 {
            0.0
        } else {
            self.mastery_sum / self.rows as f64
        }
    }
}

pub fn validate_window(days: i64) -> Result<(), MasteryError> {
    if (1..=MAX_WINDOW_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(MasteryError::validation(format!(
            "window must be between 1 and {MAX_WINDOW_DAYS} days, got {days}"
        )))
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Each mastery row is counted on the day it was last practiced.
pub fn engagement(
    student_id: i32,
    attempted: &[StandardProgress],
    days: i64,
    now: DateTime<Utc>,
) -> EngagementAnalytics {
    let window_start = now - Duration::days(days);
    let mut daily: BTreeMap<NaiveDate, Bucket> = BTreeMap::new();
    let mut weekly: BTreeMap<NaiveDate, Bucket> = BTreeMap::new();

    for row in attempted {
        let Some(mastery) = row.mastery.as_ref() else {
            continue;
        };
        if mastery.last_attempt_at <= window_start {
            continue;
        }
        let date = mastery.last_attempt_at.date_naive();
        daily.entry(date).or_default().add(row);
        weekly.entry(week_start(date)).or_default().add(row);
    }

    EngagementAnalytics {
        student_id,
        days,
        daily_activity: daily
            .into_iter()
            .map(|(activity_date, bucket)| DailyActivity {
                activity_date,
                standards_worked: bucket.standards.len() as i64,
                total_minutes: bucket.minutes,
                average_mastery: bucket.average(),
            })
            .collect(),
        weekly_trends: weekly
            .into_iter()
            .map(|(week_start, bucket)| WeeklyTrend {
                week_start,
                standards_worked: bucket.standards.len() as i64,
                total_minutes: bucket.minutes,
                average_mastery: bucket.average(),
            })
            .collect(),
    }
}
