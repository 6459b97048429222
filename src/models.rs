use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Mastery level at or above which a standard counts as mastered.
pub const MASTERY_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentMastery {
    pub id: i32,
    pub student_id: i32,
    pub standard_id: i32,
    pub mastery_level: f64,
    pub attempts: i32,
    pub first_attempt_at: DateTime<Utc>,
    pub last_attempt_at: DateTime<Utc>,
    pub mastered_at: Option<DateTime<Utc>>,
    pub time_spent_minutes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Standard {
    pub id: i32,
    pub cluster_id: i32,
    pub code: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<String>,
    pub prerequisite_standards: Vec<i32>,
    pub complexity_level: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeLevel {
    pub id: i32,
    pub code: String,
    pub name: String,
    pub display_order: i32,
    pub age_range: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub id: i32,
    pub code: String,
    pub name: String,
    pub description: String,
}

/// A standard of the student's grade joined with the student's mastery row, if any.
#[derive(Debug, Clone)]
pub struct StandardProgress {
    pub standard: Standard,
    pub domain_code: String,
    pub domain_name: String,
    pub mastery: Option<StudentMastery>,
}

impl StandardProgress {
    pub fn mastery_level(&self) -> f64 {
        self.mastery.as_ref().map_or(0.0, |m| m.mastery_level)
    }

    pub fn attempts(&self) -> i32 {
        self.mastery.as_ref().map_or(0, |m| m.attempts)
    }

    pub fn time_spent_minutes(&self) -> i64 {
        self.mastery
            .as_ref()
            .map_or(0, |m| i64::from(m.time_spent_minutes))
    }

    pub fn is_mastered(&self) -> bool {
        self.mastery_level() >= MASTERY_THRESHOLD
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardMetrics {
    pub standard_id: i32,
    pub standard_code: String,
    pub standard_title: String,
    pub domain_code: String,
    pub domain_name: String,
    pub mastery_level: f64,
    pub attempts: i32,
    pub time_spent_minutes: i64,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub mastered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainProgress {
    pub domain_code: String,
    pub domain_name: String,
    pub total_standards: i64,
    pub attempted_standards: i64,
    pub mastered_standards: i64,
    pub average_mastery: f64,
    pub time_spent_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeProgress {
    pub grade_code: String,
    pub grade_name: String,
    pub total_standards: i64,
    pub attempted_standards: i64,
    pub mastered_standards: i64,
    pub average_mastery: f64,
    pub time_spent_minutes: i64,
    pub domains: Vec<DomainProgress>,
}

/// One practice session, as submitted by a client.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInput {
    pub student_id: i32,
    pub standard_id: i32,
    pub score: f64,
    pub time_spent_minutes: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub mastery: StudentMastery,
    pub intervention_created: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Intervention {
    pub id: i32,
    pub student_id: i32,
    pub standard_id: i32,
    pub intervention_type: String,
    pub priority: String,
    pub message: String,
    pub recommended_actions: serde_json::Value,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewIntervention {
    pub student_id: i32,
    pub standard_id: i32,
    pub intervention_type: &'static str,
    pub priority: &'static str,
    pub message: &'static str,
    pub recommended_actions: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: i32,
    pub standard_id: i32,
    pub problem_type: String,
    pub question_text: String,
    pub correct_answer: serde_json::Value,
    pub explanation: Option<String>,
    pub points: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProblemAttempt {
    pub student_id: i32,
    pub problem_id: i32,
    pub student_answer: serde_json::Value,
    pub is_correct: bool,
    pub points_earned: i32,
    pub time_spent_seconds: i32,
    pub hints_used: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedAttempt {
    pub id: i32,
    pub attempt_number: i32,
    pub attempted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub is_correct: bool,
    pub points_earned: i32,
    pub explanation: Option<String>,
    pub attempt_number: i32,
    pub attempt_id: i32,
    pub attempted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveFeedback {
    pub needs_review: Vec<i32>,
    pub ready_for_advancement: Vec<i32>,
    pub struggling_areas: Vec<String>,
    pub strength_areas: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPath {
    pub student_id: i32,
    pub recommended_standards: Vec<i32>,
    pub reasoning: String,
    pub current_level: String,
    pub next_milestones: Vec<String>,
}

/// Raw class-wide inputs for one grade: enrolled students, the grade's
/// standards and every mastery row those students hold on them.
#[derive(Debug, Clone, Default)]
pub struct GradeSnapshot {
    pub total_students: i64,
    pub total_standards: i64,
    pub progress: Vec<StudentMastery>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeStats {
    pub grade_code: String,
    pub total_students: i64,
    pub total_standards: i64,
    pub average_mastery: f64,
    pub total_masteries: i64,
    /// Number of (student, standard) mastery rows, not the sum of their attempt counters.
    pub total_attempts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
    pub activity_date: NaiveDate,
    pub standards_worked: i64,
    pub total_minutes: i64,
    pub average_mastery: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyTrend {
    pub week_start: NaiveDate,
    pub standards_worked: i64,
    pub total_minutes: i64,
    pub average_mastery: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementAnalytics {
    pub student_id: i32,
    pub days: i64,
    pub daily_activity: Vec<DailyActivity>,
    pub weekly_trends: Vec<WeeklyTrend>,
}
