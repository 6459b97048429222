use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::access::{self, validate_domain_code, validate_grade_code};
use crate::answers::{self, ExpectedAnswer};
use crate::engagement;
use crate::error::MasteryError;
use crate::feedback;
use crate::mastery::{self, MergePolicy};
use crate::models::{
    AdaptiveFeedback, AnswerResult, Domain, EngagementAnalytics, GradeLevel, GradeProgress, GradeStats,
    Intervention, LearningPath, NewProblemAttempt, SessionInput, SessionOutcome, Standard, StandardMetrics,
    StandardProgress,
};
use crate::progress;
use crate::recommend;
use crate::store::ProgressStore;

/// A student's answer to one problem, as submitted by a client.
#[derive(Debug, Clone)]
pub struct AnswerSubmission {
    pub student_id: i32,
    pub problem_id: i32,
    pub answer: serde_json::Value,
    pub time_spent_seconds: i32,
    pub hints_used: i32,
}

/// Entry point for every mastery operation. Holds no state besides the store handle.
pub struct MasteryEngine<S> {
    store: S,
    policy: MergePolicy,
}

impl<S: ProgressStore> MasteryEngine<S> {
    pub fn new(store: S, policy: MergePolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    #[instrument(skip(self), fields(policy = %self.policy))]
    pub async fn record_session(&self, input: SessionInput) -> Result<SessionOutcome, MasteryError> {
        mastery::validate_session(&input)?;

        let outcome = self.store.record_session(&input, self.policy, Utc::now()).await?;
        info!(
            student_id = input.student_id,
            standard_id = input.standard_id,
            mastery_level = outcome.mastery.mastery_level,
            attempts = outcome.mastery.attempts,
            "session recorded"
        );
        if outcome.intervention_created {
            warn!(
                student_id = input.student_id,
                standard_id = input.standard_id,
                "remediation intervention opened"
            );
        }
        Ok(outcome)
    }

    async fn current_grade(&self, student_id: i32) -> Result<(GradeLevel, Vec<StandardProgress>), MasteryError> {
        let grade = self
            .store
            .student_grade(student_id)
            .await?
            .ok_or_else(|| MasteryError::not_found(format!("grade for student {student_id}")))?;
        let standards = self.store.grade_standards(student_id).await?;
        Ok((grade, standards))
    }

    pub async fn grade_progress(&self, student_id: i32) -> Result<GradeProgress, MasteryError> {
        let (grade, standards) = self.current_grade(student_id).await?;
        Ok(progress::summarize_grade(&grade, &standards))
    }

    pub async fn standard_metrics(
        &self,
        student_id: i32,
        domain_code: Option<&str>,
    ) -> Result<Vec<StandardMetrics>, MasteryError> {
        if let Some(code) = domain_code {
            validate_domain_code(code)?;
        }
        let (_, standards) = self.current_grade(student_id).await?;
        Ok(progress::standard_metrics(&standards, domain_code))
    }

    pub async fn recommend(&self, student_id: i32, limit: usize) -> Result<Vec<Standard>, MasteryError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let (_, standards) = self.current_grade(student_id).await?;
        let picks = recommend::select(&standards, limit);
        debug!(student_id, limit, returned = picks.len(), "recommendations computed");
        Ok(picks)
    }

    pub async fn learning_path(&self, student_id: i32) -> Result<LearningPath, MasteryError> {
        let (_, standards) = self.current_grade(student_id).await?;
        Ok(recommend::learning_path(student_id, &standards))
    }

    pub async fn adaptive_feedback(&self, student_id: i32) -> Result<AdaptiveFeedback, MasteryError> {
        let attempted = self.store.attempted_standards(student_id).await?;
        Ok(feedback::adaptive_feedback(&attempted, Utc::now()))
    }

    pub async fn engagement(&self, student_id: i32, days: i64) -> Result<EngagementAnalytics, MasteryError> {
        engagement::validate_window(days)?;
        let attempted = self.store.attempted_standards(student_id).await?;
        Ok(engagement::engagement(student_id, &attempted, days, Utc::now()))
    }

    pub async fn grade_stats(&self, grade_code: &str) -> Result<GradeStats, MasteryError> {
        validate_grade_code(grade_code)?;
        let grade = self
            .store
            .grade_by_code(grade_code)
            .await?
            .ok_or_else(|| MasteryError::not_found(format!("grade level {grade_code}")))?;
        let snapshot = self.store.grade_snapshot(&grade).await?;
        Ok(progress::grade_stats(&grade, &snapshot))
    }

    /// Unknown students or grade codes are denied rather than reported as errors.
    pub async fn can_access_grade(&self, student_id: i32, target_grade_code: &str) -> Result<bool, MasteryError> {
        let student_grade = self.store.student_grade(student_id).await?;
        let target_grade = self.store.grade_by_code(target_grade_code).await?;
        Ok(access::can_access(student_grade.as_ref(), target_grade.as_ref()))
    }

    pub async fn grades(&self) -> Result<Vec<GradeLevel>, MasteryError> {
        self.store.list_grades().await
    }

    pub async fn domains_for_grade(&self, grade_code: &str) -> Result<Vec<Domain>, MasteryError> {
        validate_grade_code(grade_code)?;
        self.store.domains_for_grade(grade_code).await
    }

    pub async fn standards_for(&self, grade_code: &str, domain_code: &str) -> Result<Vec<Standard>, MasteryError> {
        validate_grade_code(grade_code)?;
        validate_domain_code(domain_code)?;
        self.store.standards_for(grade_code, domain_code).await
    }

    pub async fn set_student_grade(&self, student_id: i32, grade_code: &str) -> Result<bool, MasteryError> {
        validate_grade_code(grade_code)?;
        let grade = self
            .store
            .grade_by_code(grade_code)
            .await?
            .ok_or_else(|| MasteryError::not_found(format!("grade level {grade_code}")))?;
        let updated = self.store.set_student_grade(student_id, &grade).await?;
        if updated {
            info!(student_id, grade = %grade.code, "student grade changed");
        }
        Ok(updated)
    }

    pub async fn interventions(&self, student_id: i32, open_only: bool) -> Result<Vec<Intervention>, MasteryError> {
        let mut interventions = self.store.interventions(student_id).await?;
        if open_only {
            interventions.retain(|intervention| !intervention.is_resolved);
        }
        Ok(interventions)
    }

    pub async fn resolve_intervention(&self, intervention_id: i32) -> Result<(), MasteryError> {
        if !self.store.resolve_intervention(intervention_id, Utc::now()).await? {
            return Err(MasteryError::not_found(format!("open intervention {intervention_id}")));
        }
        info!(intervention_id, "intervention resolved");
        Ok(())
    }

    pub async fn submit_answer(&self, submission: AnswerSubmission) -> Result<AnswerResult, MasteryError> {
        if submission.time_spent_seconds < 0 || submission.hints_used < 0 {
            return Err(MasteryError::validation("time spent and hints used must be non-negative"));
        }
        let problem = self
            .store
            .problem(submission.problem_id)
            .await?
            .ok_or_else(|| MasteryError::not_found(format!("problem {}", submission.problem_id)))?;

        let expected = ExpectedAnswer::from_problem(&problem.problem_type, &problem.correct_answer)?;
        let is_correct = expected.check(&submission.answer);
        let points_earned = answers::points_earned(is_correct, problem.points);

        let attempt = NewProblemAttempt {
            student_id: submission.student_id,
            problem_id: problem.id,
            student_answer: submission.answer,
            is_correct,
            points_earned,
            time_spent_seconds: submission.time_spent_seconds,
            hints_used: submission.hints_used,
        };
        let recorded = self.store.record_attempt(&attempt, Utc::now()).await?;
        info!(
            student_id = attempt.student_id,
            problem_id = attempt.problem_id,
            is_correct,
            attempt_number = recorded.attempt_number,
            "answer graded"
        );

        Ok(AnswerResult {
            is_correct,
            points_earned,
            explanation: problem.explanation,
            attempt_number: recorded.attempt_number,
            attempt_id: recorded.id,
            attempted_at: recorded.attempted_at,
        })
    }
}
