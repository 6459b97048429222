use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::MasteryError;
use crate::mastery::MergePolicy;
use crate::models::{
    Domain, GradeLevel, GradeSnapshot, Intervention, NewProblemAttempt, Problem, RecordedAttempt,
    SessionInput, SessionOutcome, Standard, StandardProgress,
};

/// Durable curriculum and mastery state.
///
/// Implementations must apply [`ProgressStore::record_session`] atomically:
/// the mastery upsert and the conditional remediation flag either both land
/// or neither does.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Merges one session into the (student, standard) mastery row and opens a
    /// remediation flag when the updated row calls for one and none is open.
    async fn record_session(
        &self,
        input: &SessionInput,
        policy: MergePolicy,
        now: DateTime<Utc>,
    ) -> Result<SessionOutcome, MasteryError>;

    async fn student_grade(&self, student_id: i32) -> Result<Option<GradeLevel>, MasteryError>;

    async fn grade_by_code(&self, code: &str) -> Result<Option<GradeLevel>, MasteryError>;

    /// Every standard of the student's current grade with the student's mastery row, if any.
    async fn grade_standards(&self, student_id: i32) -> Result<Vec<StandardProgress>, MasteryError>;

    /// Every standard the student has a mastery row for, across all grades.
    async fn attempted_standards(&self, student_id: i32) -> Result<Vec<StandardProgress>, MasteryError>;

    /// Class-wide mastery rows for everyone currently enrolled in `grade`.
    async fn grade_snapshot(&self, grade: &GradeLevel) -> Result<GradeSnapshot, MasteryError>;

    async fn list_grades(&self) -> Result<Vec<GradeLevel>, MasteryError>;

    async fn domains_for_grade(&self, grade_code: &str) -> Result<Vec<Domain>, MasteryError>;

    async fn standards_for(
        &self,
        grade_code: &str,
        domain_code: &str,
    ) -> Result<Vec<Standard>, MasteryError>;

    /// Moves a student to another grade. Returns `false` when the student does not exist.
    async fn set_student_grade(&self, student_id: i32, grade: &GradeLevel) -> Result<bool, MasteryError>;

    /// The student's remediation flags, newest first.
    async fn interventions(&self, student_id: i32) -> Result<Vec<Intervention>, MasteryError>;

    /// Closes an open flag. Returns `false` when no open flag has that id.
    async fn resolve_intervention(&self, intervention_id: i32, now: DateTime<Utc>) -> Result<bool, MasteryError>;

    async fn problem(&self, problem_id: i32) -> Result<Option<Problem>, MasteryError>;

    /// Stores a graded attempt, numbering it after the student's previous attempts on the problem.
    async fn record_attempt(
        &self,
        attempt: &NewProblemAttempt,
        now: DateTime<Utc>,
    ) -> Result<RecordedAttempt, MasteryError>;
}
