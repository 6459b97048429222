//! In-process [`ProgressStore`] used by the engine and import tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::MasteryError;
use crate::intervention::{self, InterventionState};
use crate::mastery::{self, MergePolicy};
use crate::models::{
    Domain, GradeLevel, GradeSnapshot, Intervention, NewProblemAttempt, Problem, RecordedAttempt,
    SessionInput, SessionOutcome, Standard, StandardProgress, StudentMastery,
};
use crate::store::ProgressStore;

struct StoredStandard {
    standard: Standard,
    domain_id: i32,
    grade_id: i32,
}

#[derive(Default)]
struct State {
    grades: Vec<GradeLevel>,
    domains: Vec<Domain>,
    grade_domains: Vec<(i32, i32)>,
    standards: Vec<StoredStandard>,
    students: HashMap<i32, Option<i32>>,
    progress: HashMap<(i32, i32), StudentMastery>,
    interventions: Vec<Intervention>,
    problems: Vec<Problem>,
    attempts: Vec<(i32, i32)>,
    next_id: i32,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn domain(&self, domain_id: i32) -> Option<&Domain> {
        self.domains.iter().find(|d| d.id == domain_id)
    }

    fn with_progress(&self, stored: &StoredStandard, student_id: i32) -> StandardProgress {
        let domain = self.domain(stored.domain_id);
        StandardProgress {
            standard: stored.standard.clone(),
            domain_code: domain.map(|d| d.code.clone()).unwrap_or_default(),
            domain_name: domain.map(|d| d.name.clone()).unwrap_or_default(),
            mastery: self.progress.get(&(student_id, stored.standard.id)).cloned(),
        }
    }
}

pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Grades K-8, five domains, a handful of grade 1 standards plus one grade 2
    /// standard (id 42), student 7 in grade 1, student 8 in kindergarten and
    /// three problems on standard 1.
    pub fn with_sample_curriculum() -> Self {
        let created_at = Utc::now();
        let mut state = State {
            next_id: 1000,
            ..State::default()
        };

        for (order, code) in ["K", "1", "2", "3", "4", "5", "6", "7", "8"].into_iter().enumerate() {
            let display_order = order as i32;
            state.grades.push(GradeLevel {
                id: display_order + 1,
                code: code.to_string(),
                name: if code == "K" {
                    "Kindergarten".to_string()
                } else {
                    format!("Grade {code}")
                },
                display_order,
                age_range: format!("{}-{}", display_order + 5, display_order + 6),
            });
        }

        for (id, code, name) in [
            (1, "CC", "Counting and Cardinality"),
            (2, "OA", "Operations and Algebraic Thinking"),
            (3, "NBT", "Number and Operations in Base Ten"),
            (4, "MD", "Measurement and Data"),
            (5, "G", "Geometry"),
        ] {
            state.domains.push(Domain {
                id,
                code: code.to_string(),
                name: name.to_string(),
                description: String::new(),
            });
        }
        state.grade_domains = vec![(1, 1), (1, 2), (2, 2), (2, 3), (2, 4), (2, 5), (3, 2), (3, 3)];

        for (id, code, domain_id, grade_id, complexity_level) in [
            (1, "1.OA.A.1", 2, 2, 1),
            (2, "1.OA.B.3", 2, 2, 2),
            (3, "1.NBT.A.1", 3, 2, 1),
            (4, "1.NBT.B.2", 3, 2, 2),
            (5, "1.MD.A.1", 4, 2, 1),
            (6, "1.G.A.1", 5, 2, 3),
            (10, "K.CC.A.1", 1, 1, 1),
            (42, "2.OA.A.1", 2, 3, 1),
        ] {
            state.standards.push(StoredStandard {
                standard: Standard {
                    id,
                    cluster_id: domain_id * 10 + grade_id,
                    code: code.to_string(),
                    title: format!("Standard {code}"),
                    description: String::new(),
                    examples: None,
                    prerequisite_standards: Vec::new(),
                    complexity_level,
                    created_at,
                },
                domain_id,
                grade_id,
            });
        }

        state.students.insert(7, Some(2));
        state.students.insert(8, Some(1));

        for (id, problem_type, correct_answer, points) in [
            (1, "multiple_choice", serde_json::json!({"correct": "B"}), 2),
            (2, "open_ended", serde_json::json!({"answer": 4.5}), 3),
            (3, "interactive", serde_json::json!({"sequence": [1, 2, 3]}), 1),
        ] {
            state.problems.push(Problem {
                id,
                standard_id: 1,
                problem_type: problem_type.to_string(),
                question_text: format!("Problem {id}"),
                correct_answer,
                explanation: Some("Count on from the larger number.".to_string()),
                points,
            });
        }

        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory store lock poisoned")
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn record_session(
        &self,
        input: &SessionInput,
        policy: MergePolicy,
        now: DateTime<Utc>,
    ) -> Result<SessionOutcome, MasteryError> {
        let mut state = self.lock();
        if !state.standards.iter().any(|s| s.standard.id == input.standard_id) {
            return Err(MasteryError::not_found(format!("standard {}", input.standard_id)));
        }
        if !state.students.contains_key(&input.student_id) {
            return Err(MasteryError::not_found(format!("student {}", input.student_id)));
        }

        let key = (input.student_id, input.standard_id);
        let current = state.progress.get(&key).cloned();
        let mastery = match &current {
            Some(current) => mastery::apply_session(current, input, policy, now),
            None => mastery::first_session(state.next_id + 1, input, now),
        };

        let latest = state
            .interventions
            .iter()
            .filter(|i| {
                i.student_id == input.student_id
                    && i.standard_id == input.standard_id
                    && i.intervention_type == intervention::REMEDIATION
            })
            .max_by_key(|i| (i.created_at, i.id));
        let flag = if InterventionState::of(latest).opens_flag(&mastery) {
            Some(intervention::remediation_for(&mastery)?)
        } else {
            None
        };

        // Nothing is written until every fallible step has succeeded.
        if current.is_none() {
            state.next_id();
        }
        state.progress.insert(key, mastery.clone());
        let intervention_created = flag.is_some();
        if let Some(new) = flag {
            let id = state.next_id();
            state.interventions.push(Intervention {
                id,
                student_id: new.student_id,
                standard_id: new.standard_id,
                intervention_type: new.intervention_type.to_string(),
                priority: new.priority.to_string(),
                message: new.message.to_string(),
                recommended_actions: new.recommended_actions,
                is_resolved: false,
                created_at: now,
                resolved_at: None,
            });
        }

        Ok(SessionOutcome {
            mastery,
            intervention_created,
        })
    }

    async fn student_grade(&self, student_id: i32) -> Result<Option<GradeLevel>, MasteryError> {
        let state = self.lock();
        let grade_id = state.students.get(&student_id).copied().flatten();
        Ok(grade_id.and_then(|id| state.grades.iter().find(|g| g.id == id).cloned()))
    }

    async fn grade_by_code(&self, code: &str) -> Result<Option<GradeLevel>, MasteryError> {
        Ok(self.lock().grades.iter().find(|g| g.code == code).cloned())
    }

    async fn grade_standards(&self, student_id: i32) -> Result<Vec<StandardProgress>, MasteryError> {
        let state = self.lock();
        let Some(grade_id) = state.students.get(&student_id).copied().flatten() else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<_> = state
            .standards
            .iter()
            .filter(|s| s.grade_id == grade_id)
            .map(|s| state.with_progress(s, student_id))
            .collect();
        rows.sort_by(|a, b| a.standard.code.cmp(&b.standard.code));
        Ok(rows)
    }

    async fn attempted_standards(&self, student_id: i32) -> Result<Vec<StandardProgress>, MasteryError> {
        let state = self.lock();
        let mut rows: Vec<_> = state
            .standards
            .iter()
            .filter(|s| state.progress.contains_key(&(student_id, s.standard.id)))
            .map(|s| state.with_progress(s, student_id))
            .collect();
        rows.sort_by(|a, b| a.standard.code.cmp(&b.standard.code));
        Ok(rows)
    }

    async fn grade_snapshot(&self, grade: &GradeLevel) -> Result<GradeSnapshot, MasteryError> {
        let state = self.lock();
        let students: Vec<i32> = state
            .students
            .iter()
            .filter(|(_, grade_id)| **grade_id == Some(grade.id))
            .map(|(student_id, _)| *student_id)
            .collect();
        let standards: Vec<i32> = state
            .standards
            .iter()
            .filter(|s| s.grade_id == grade.id)
            .map(|s| s.standard.id)
            .collect();
        let progress = state
            .progress
            .values()
            .filter(|m| students.contains(&m.student_id) && standards.contains(&m.standard_id))
            .cloned()
            .collect();

        Ok(GradeSnapshot {
            total_students: students.len() as i64,
            total_standards: standards.len() as i64,
            progress,
        })
    }

    async fn list_grades(&self) -> Result<Vec<GradeLevel>, MasteryError> {
        let mut grades = self.lock().grades.clone();
        grades.sort_by_key(|g| g.display_order);
        Ok(grades)
    }

    async fn domains_for_grade(&self, grade_code: &str) -> Result<Vec<Domain>, MasteryError> {
        let state = self.lock();
        let Some(grade) = state.grades.iter().find(|g| g.code == grade_code) else {
            return Ok(Vec::new());
        };
        let mut domains: Vec<_> = state
            .grade_domains
            .iter()
            .filter(|(grade_id, _)| *grade_id == grade.id)
            .filter_map(|(_, domain_id)| state.domain(*domain_id).cloned())
            .collect();
        domains.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(domains)
    }

    async fn standards_for(
        &self,
        grade_code: &str,
        domain_code: &str,
    ) -> Result<Vec<Standard>, MasteryError> {
        let state = self.lock();
        let grade_id = state.grades.iter().find(|g| g.code == grade_code).map(|g| g.id);
        let domain_id = state.domains.iter().find(|d| d.code == domain_code).map(|d| d.id);
        let mut standards: Vec<_> = state
            .standards
            .iter()
            .filter(|s| Some(s.grade_id) == grade_id && Some(s.domain_id) == domain_id)
            .map(|s| s.standard.clone())
            .collect();
        standards.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(standards)
    }

    async fn set_student_grade(&self, student_id: i32, grade: &GradeLevel) -> Result<bool, MasteryError> {
        let mut state = self.lock();
        match state.students.get_mut(&student_id) {
            Some(current) => {
                *current = Some(grade.id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn interventions(&self, student_id: i32) -> Result<Vec<Intervention>, MasteryError> {
        let mut interventions: Vec<_> = self
            .lock()
            .interventions
            .iter()
            .filter(|i| i.student_id == student_id)
            .cloned()
            .collect();
        interventions.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(interventions)
    }

    async fn resolve_intervention(&self, intervention_id: i32, now: DateTime<Utc>) -> Result<bool, MasteryError> {
        let mut state = self.lock();
        match state
            .interventions
            .iter_mut()
            .find(|i| i.id == intervention_id && !i.is_resolved)
        {
            Some(open) => {
                open.is_resolved = true;
                open.resolved_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn problem(&self, problem_id: i32) -> Result<Option<Problem>, MasteryError> {
        Ok(self.lock().problems.iter().find(|p| p.id == problem_id).cloned())
    }

    async fn record_attempt(
        &self,
        attempt: &NewProblemAttempt,
        now: DateTime<Utc>,
    ) -> Result<RecordedAttempt, MasteryError> {
        let mut state = self.lock();
        if !state.students.contains_key(&attempt.student_id) {
            return Err(MasteryError::not_found(format!("student {}", attempt.student_id)));
        }
        let previous = state
            .attempts
            .iter()
            .filter(|(student_id, problem_id)| {
                *student_id == attempt.student_id && *problem_id == attempt.problem_id
            })
            .count();
        state.attempts.push((attempt.student_id, attempt.problem_id));
        let id = state.next_id();

        Ok(RecordedAttempt {
            id,
            attempt_number: previous as i32 + 1,
            attempted_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(student_id: i32, standard_id: i32, score: f64) -> SessionInput {
        SessionInput {
            student_id,
            standard_id,
            score,
            time_spent_minutes: 5,
        }
    }

    #[tokio::test]
    async fn failed_session_writes_nothing() {
        let store = MemoryStore::with_sample_curriculum();
        let now = Utc::now();
        assert!(store.record_session(&session(7, 999, 0.2), MergePolicy::Blended, now).await.is_err());
        assert!(store.record_session(&session(404, 1, 0.2), MergePolicy::Blended, now).await.is_err());
        assert!(store.attempted_standards(7).await.unwrap().is_empty());
        assert!(store.interventions(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn flag_lands_with_the_row_that_triggered_it() {
        let store = MemoryStore::with_sample_curriculum();
        let mut outcomes = Vec::new();
        for score in [0.2, 0.3, 0.4] {
            outcomes.push(store.record_session(&session(7, 1, score), MergePolicy::Blended, Utc::now()).await.unwrap());
        }
        let last = outcomes.pop().unwrap();
        assert!(last.intervention_created);
        assert!(outcomes.iter().all(|o| o.mastery.id == last.mastery.id));

        let rows = store.attempted_standards(7).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].mastery.as_ref(), Some(&last.mastery));
        let flags = store.interventions(7).await.unwrap();
        assert_eq!(flags.len(), 1);
    }

    #[tokio::test]
    async fn snapshot_covers_enrolled_students_only() {
        let store = MemoryStore::with_sample_curriculum();
        let now = Utc::now();
        store.record_session(&session(7, 1, 0.9), MergePolicy::Blended, now).await.unwrap();
        store.record_session(&session(7, 42, 0.5), MergePolicy::Blended, now).await.unwrap();
        store.record_session(&session(8, 1, 0.3), MergePolicy::Blended, now).await.unwrap();

        let grade_one = store.grade_by_code("1").await.unwrap().unwrap();
        let snapshot = store.grade_snapshot(&grade_one).await.unwrap();
        assert_eq!(snapshot.total_students, 1);
        assert_eq!(snapshot.total_standards, 6);
        assert_eq!(snapshot.progress.len(), 1);
        assert_eq!(snapshot.progress[0].standard_id, 1);
    }
}
