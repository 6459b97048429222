use std::collections::HashMap;
use std::io::Read;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Connection, PgConnection, PgPool, Row};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::MasteryEngine;
use crate::error::{sql_state, MasteryError, FOREIGN_KEY_VIOLATION, UNIQUE_VIOLATION};
use crate::intervention::{self, InterventionState};
use crate::mastery::{self, MergePolicy};
use crate::models::{
    Domain, GradeLevel, GradeSnapshot, Intervention, NewIntervention, NewProblemAttempt, Problem,
    RecordedAttempt, SessionInput, SessionOutcome, Standard, StandardProgress, StudentMastery,
};
use crate::store::ProgressStore;

pub async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const STANDARD_COLUMNS: &str = "s.id, s.cluster_id, s.code, s.title, s.description, s.examples, \
     s.prerequisite_standards, s.complexity_level, s.created_at";

const PROGRESS_COLUMNS: &str = "d.code AS domain_code, d.name AS domain_name, \
     sp.id AS progress_id, sp.student_id, sp.standard_id, sp.mastery_level, sp.attempts, \
     sp.first_attempt_at, sp.last_attempt_at, sp.mastered_at, sp.time_spent_minutes, \
     sp.created_at AS progress_created_at, sp.updated_at AS progress_updated_at";

const MASTERY_COLUMNS: &str = "id, student_id, standard_id, mastery_level, attempts, \
     first_attempt_at, last_attempt_at, mastered_at, time_spent_minutes, created_at, updated_at";

fn grade_from_row(row: &PgRow) -> Result<GradeLevel, sqlx::Error> {
    Ok(GradeLevel {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        display_order: row.try_get("display_order")?,
        age_range: row.try_get("age_range")?,
    })
}

fn standard_from_row(row: &PgRow) -> Result<Standard, sqlx::Error> {
    Ok(Standard {
        id: row.try_get("id")?,
        cluster_id: row.try_get("cluster_id")?,
        code: row.try_get("code")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        examples: row.try_get("examples")?,
        prerequisite_standards: row.try_get("prerequisite_standards")?,
        complexity_level: row.try_get("complexity_level")?,
        created_at: row.try_get("created_at")?,
    })
}

fn mastery_from_row(row: &PgRow) -> Result<StudentMastery, sqlx::Error> {
    Ok(StudentMastery {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        standard_id: row.try_get("standard_id")?,
        mastery_level: row.try_get("mastery_level")?,
        attempts: row.try_get("attempts")?,
        first_attempt_at: row.try_get("first_attempt_at")?,
        last_attempt_at: row.try_get("last_attempt_at")?,
        mastered_at: row.try_get("mastered_at")?,
        time_spent_minutes: row.try_get("time_spent_minutes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const INTERVENTION_COLUMNS: &str = "id, student_id, standard_id, intervention_type, priority, \
     message, recommended_actions, is_resolved, created_at, resolved_at";

fn intervention_from_row(row: &PgRow) -> Result<Intervention, sqlx::Error> {
    Ok(Intervention {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        standard_id: row.try_get("standard_id")?,
        intervention_type: row.try_get("intervention_type")?,
        priority: row.try_get("priority")?,
        message: row.try_get("message")?,
        recommended_actions: row.try_get("recommended_actions")?,
        is_resolved: row.try_get("is_resolved")?,
        created_at: row.try_get("created_at")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

fn standard_progress_from_row(row: &PgRow) -> Result<StandardProgress, sqlx::Error> {
    let progress_id: Option<i32> = row.try_get("progress_id")?;
    let mastery = match progress_id {
        Some(id) => Some(StudentMastery {
            id,
            student_id: row.try_get("student_id")?,
            standard_id: row.try_get("standard_id")?,
            mastery_level: row.try_get("mastery_level")?,
            attempts: row.try_get("attempts")?,
            first_attempt_at: row.try_get("first_attempt_at")?,
            last_attempt_at: row.try_get("last_attempt_at")?,
            mastered_at: row.try_get("mastered_at")?,
            time_spent_minutes: row.try_get("time_spent_minutes")?,
            created_at: row.try_get("progress_created_at")?,
            updated_at: row.try_get("progress_updated_at")?,
        }),
        None => None,
    };

    Ok(StandardProgress {
        standard: standard_from_row(row)?,
        domain_code: row.try_get("domain_code")?,
        domain_name: row.try_get("domain_name")?,
        mastery,
    })
}

/// Postgres-backed [`ProgressStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_mastery(
        conn: &mut PgConnection,
        student_id: i32,
        standard_id: i32,
    ) -> Result<Option<StudentMastery>, MasteryError> {
        let row = sqlx::query(&format!(
            "SELECT {MASTERY_COLUMNS} FROM math_mastery.student_progress \
             WHERE student_id = $1 AND standard_id = $2 FOR UPDATE"
        ))
        .bind(student_id)
        .bind(standard_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.as_ref().map(mastery_from_row).transpose()?)
    }

    /// Inserts a first-session row. Returns `None` when a concurrent writer created it first.
    async fn insert_mastery(
        conn: &mut PgConnection,
        row: &StudentMastery,
    ) -> Result<Option<StudentMastery>, MasteryError> {
        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO math_mastery.student_progress (
                student_id, standard_id, mastery_level, attempts,
                first_attempt_at, last_attempt_at, mastered_at, time_spent_minutes,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (student_id, standard_id) DO NOTHING
            RETURNING {MASTERY_COLUMNS}
            "#
        ))
        .bind(row.student_id)
        .bind(row.standard_id)
        .bind(row.mastery_level)
        .bind(row.attempts)
        .bind(row.first_attempt_at)
        .bind(row.last_attempt_at)
        .bind(row.mastered_at)
        .bind(row.time_spent_minutes)
        .bind(row.created_at)
        .bind(row.updated_at)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|err| match sql_state(&err).as_deref() {
            Some(FOREIGN_KEY_VIOLATION) => MasteryError::not_found(format!("student {}", row.student_id)),
            _ => err.into(),
        })?;

        Ok(inserted.as_ref().map(mastery_from_row).transpose()?)
    }

    async fn update_mastery(conn: &mut PgConnection, row: &StudentMastery) -> Result<(), MasteryError> {
        sqlx::query(
            r#"
            UPDATE math_mastery.student_progress
            SET mastery_level = $2, attempts = $3, last_attempt_at = $4, mastered_at = $5,
                time_spent_minutes = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(row.id)
        .bind(row.mastery_level)
        .bind(row.attempts)
        .bind(row.last_attempt_at)
        .bind(row.mastered_at)
        .bind(row.time_spent_minutes)
        .bind(row.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Inserts the flag inside a savepoint so a concurrent duplicate only undoes this insert.
    async fn open_intervention(
        conn: &mut PgConnection,
        new: &NewIntervention,
        now: DateTime<Utc>,
    ) -> Result<(), MasteryError> {
        let mut savepoint = conn.begin().await?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO math_mastery.interventions
            (student_id, standard_id, intervention_type, priority, message, recommended_actions, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(new.student_id)
        .bind(new.standard_id)
        .bind(new.intervention_type)
        .bind(new.priority)
        .bind(new.message)
        .bind(&new.recommended_actions)
        .bind(now)
        .execute(&mut *savepoint)
        .await;

        match inserted {
            Ok(_) => {
                savepoint.commit().await?;
                Ok(())
            }
            Err(err) if sql_state(&err).as_deref() == Some(UNIQUE_VIOLATION) => {
                savepoint.rollback().await?;
                Err(MasteryError::Conflict(format!(
                    "open {} intervention for student {} on standard {}",
                    new.intervention_type, new.student_id, new.standard_id
                )))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl ProgressStore for PgStore {
    async fn record_session(
        &self,
        input: &SessionInput,
        policy: MergePolicy,
        now: DateTime<Utc>,
    ) -> Result<SessionOutcome, MasteryError> {
        let mut tx = self.pool.begin().await?;

        let standard_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM math_mastery.standards WHERE id = $1)")
                .bind(input.standard_id)
                .fetch_one(&mut *tx)
                .await?;
        if !standard_exists {
            return Err(MasteryError::not_found(format!("standard {}", input.standard_id)));
        }

        // The row lock serializes concurrent sessions for the same pair.
        let mastery = match Self::lock_mastery(&mut tx, input.student_id, input.standard_id).await? {
            Some(current) => {
                let next = mastery::apply_session(&current, input, policy, now);
                Self::update_mastery(&mut tx, &next).await?;
                next
            }
            None => match Self::insert_mastery(&mut tx, &mastery::first_session(0, input, now)).await? {
                Some(inserted) => inserted,
                None => {
                    let current = Self::lock_mastery(&mut tx, input.student_id, input.standard_id)
                        .await?
                        .ok_or_else(|| {
                            MasteryError::Conflict(format!(
                                "mastery row for student {} on standard {} vanished",
                                input.student_id, input.standard_id
                            ))
                        })?;
                    let next = mastery::apply_session(&current, input, policy, now);
                    Self::update_mastery(&mut tx, &next).await?;
                    next
                }
            },
        };

        let latest = sqlx::query(&format!(
            "SELECT {INTERVENTION_COLUMNS} FROM math_mastery.interventions \
             WHERE student_id = $1 AND standard_id = $2 AND intervention_type = $3 \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(mastery.student_id)
        .bind(mastery.standard_id)
        .bind(intervention::REMEDIATION)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| intervention_from_row(&row))
        .transpose()?;

        let mut intervention_created = false;
        if InterventionState::of(latest.as_ref()).opens_flag(&mastery) {
            let new = intervention::remediation_for(&mastery)?;
            match Self::open_intervention(&mut tx, &new, now).await {
                Ok(()) => intervention_created = true,
                Err(MasteryError::Conflict(reason)) => {
                    debug!(%reason, "remediation already open");
                }
                Err(err) => return Err(err),
            }
        }

        tx.commit().await?;

        Ok(SessionOutcome {
            mastery,
            intervention_created,
        })
    }

    async fn student_grade(&self, student_id: i32) -> Result<Option<GradeLevel>, MasteryError> {
        let row = sqlx::query(
            r#"
            SELECT gl.id, gl.code, gl.name, gl.display_order, gl.age_range
            FROM math_mastery.grade_levels gl
            JOIN math_mastery.users u ON u.current_grade_id = gl.id
            WHERE u.id = $1
            "#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(grade_from_row).transpose()?)
    }

    async fn grade_by_code(&self, code: &str) -> Result<Option<GradeLevel>, MasteryError> {
        let row = sqlx::query(
            "SELECT id, code, name, display_order, age_range FROM math_mastery.grade_levels WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(grade_from_row).transpose()?)
    }

    async fn grade_standards(&self, student_id: i32) -> Result<Vec<StandardProgress>, MasteryError> {
        let query = format!(
            "SELECT {STANDARD_COLUMNS}, {PROGRESS_COLUMNS} \
             FROM math_mastery.users u \
             JOIN math_mastery.clusters c ON c.grade_id = u.current_grade_id \
             JOIN math_mastery.standards s ON s.cluster_id = c.id \
             JOIN math_mastery.domains d ON d.id = c.domain_id \
             LEFT JOIN math_mastery.student_progress sp \
                 ON sp.standard_id = s.id AND sp.student_id = u.id \
             WHERE u.id = $1 \
             ORDER BY s.code"
        );
        let rows = sqlx::query(&query).bind(student_id).fetch_all(&self.pool).await?;

        let mut standards = Vec::with_capacity(rows.len());
        for row in rows {
            standards.push(standard_progress_from_row(&row)?);
        }
        Ok(standards)
    }

    async fn attempted_standards(&self, student_id: i32) -> Result<Vec<StandardProgress>, MasteryError> {
        let query = format!(
            "SELECT {STANDARD_COLUMNS}, {PROGRESS_COLUMNS} \
             FROM math_mastery.student_progress sp \
             JOIN math_mastery.standards s ON s.id = sp.standard_id \
             JOIN math_mastery.clusters c ON c.id = s.cluster_id \
             JOIN math_mastery.domains d ON d.id = c.domain_id \
             WHERE sp.student_id = $1 \
             ORDER BY s.code"
        );
        let rows = sqlx::query(&query).bind(student_id).fetch_all(&self.pool).await?;

        let mut standards = Vec::with_capacity(rows.len());
        for row in rows {
            standards.push(standard_progress_from_row(&row)?);
        }
        Ok(standards)
    }

    async fn grade_snapshot(&self, grade: &GradeLevel) -> Result<GradeSnapshot, MasteryError> {
        let total_students: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM math_mastery.users WHERE current_grade_id = $1")
                .bind(grade.id)
                .fetch_one(&self.pool)
                .await?;
        let total_standards: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM math_mastery.standards s \
             JOIN math_mastery.clusters c ON c.id = s.cluster_id \
             WHERE c.grade_id = $1",
        )
        .bind(grade.id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(
            r#"
            SELECT sp.id, sp.student_id, sp.standard_id, sp.mastery_level, sp.attempts,
                   sp.first_attempt_at, sp.last_attempt_at, sp.mastered_at, sp.time_spent_minutes,
                   sp.created_at, sp.updated_at
            FROM math_mastery.student_progress sp
            JOIN math_mastery.users u ON u.id = sp.student_id
            JOIN math_mastery.standards s ON s.id = sp.standard_id
            JOIN math_mastery.clusters c ON c.id = s.cluster_id
            WHERE u.current_grade_id = $1 AND c.grade_id = $1
            "#,
        )
        .bind(grade.id)
        .fetch_all(&self.pool)
        .await?;

        let mut progress = Vec::with_capacity(rows.len());
        for row in rows {
            progress.push(mastery_from_row(&row)?);
        }
        Ok(GradeSnapshot {
            total_students,
            total_standards,
            progress,
        })
    }

    async fn list_grades(&self) -> Result<Vec<GradeLevel>, MasteryError> {
        let rows = sqlx::query(
            "SELECT id, code, name, display_order, age_range FROM math_mastery.grade_levels ORDER BY display_order",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut grades = Vec::with_capacity(rows.len());
        for row in rows {
            grades.push(grade_from_row(&row)?);
        }
        Ok(grades)
    }

    async fn domains_for_grade(&self, grade_code: &str) -> Result<Vec<Domain>, MasteryError> {
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.code, d.name, d.description
            FROM math_mastery.domains d
            JOIN math_mastery.grade_domains gd ON gd.domain_id = d.id
            JOIN math_mastery.grade_levels gl ON gl.id = gd.grade_id
            WHERE gl.code = $1
            ORDER BY d.code
            "#,
        )
        .bind(grade_code)
        .fetch_all(&self.pool)
        .await?;

        let mut domains = Vec::with_capacity(rows.len());
        for row in rows {
            domains.push(Domain {
                id: row.try_get("id")?,
                code: row.try_get("code")?,
                name: row.try_get("name")?,
                description: row.try_get("description")?,
            });
        }
        Ok(domains)
    }

    async fn standards_for(
        &self,
        grade_code: &str,
        domain_code: &str,
    ) -> Result<Vec<Standard>, MasteryError> {
        let query = format!(
            "SELECT {STANDARD_COLUMNS} \
             FROM math_mastery.standards s \
             JOIN math_mastery.clusters c ON c.id = s.cluster_id \
             JOIN math_mastery.domains d ON d.id = c.domain_id \
             JOIN math_mastery.grade_levels gl ON gl.id = c.grade_id \
             WHERE gl.code = $1 AND d.code = $2 \
             ORDER BY s.code"
        );
        let rows = sqlx::query(&query)
            .bind(grade_code)
            .bind(domain_code)
            .fetch_all(&self.pool)
            .await?;

        let mut standards = Vec::with_capacity(rows.len());
        for row in rows {
            standards.push(standard_from_row(&row)?);
        }
        Ok(standards)
    }

    async fn set_student_grade(&self, student_id: i32, grade: &GradeLevel) -> Result<bool, MasteryError> {
        let result = sqlx::query(
            "UPDATE math_mastery.users SET current_grade_id = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(grade.id)
        .bind(student_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn interventions(&self, student_id: i32) -> Result<Vec<Intervention>, MasteryError> {
        let rows = sqlx::query(&format!(
            "SELECT {INTERVENTION_COLUMNS} FROM math_mastery.interventions \
             WHERE student_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        let mut interventions = Vec::with_capacity(rows.len());
        for row in rows {
            interventions.push(intervention_from_row(&row)?);
        }
        Ok(interventions)
    }

    async fn resolve_intervention(&self, intervention_id: i32, now: DateTime<Utc>) -> Result<bool, MasteryError> {
        let result = sqlx::query(
            "UPDATE math_mastery.interventions SET is_resolved = TRUE, resolved_at = $2 \
             WHERE id = $1 AND is_resolved = FALSE",
        )
        .bind(intervention_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn problem(&self, problem_id: i32) -> Result<Option<Problem>, MasteryError> {
        let row = sqlx::query(
            r#"
            SELECT id, standard_id, problem_type, question_text, correct_answer, explanation, points
            FROM math_mastery.problems
            WHERE id = $1
            "#,
        )
        .bind(problem_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Problem {
            id: row.try_get("id")?,
            standard_id: row.try_get("standard_id")?,
            problem_type: row.try_get("problem_type")?,
            question_text: row.try_get("question_text")?,
            correct_answer: row.try_get("correct_answer")?,
            explanation: row.try_get("explanation")?,
            points: row.try_get("points")?,
        }))
    }

    async fn record_attempt(
        &self,
        attempt: &NewProblemAttempt,
        now: DateTime<Utc>,
    ) -> Result<RecordedAttempt, MasteryError> {
        let row = sqlx::query(
            r#"
            INSERT INTO math_mastery.problem_attempts
            (student_id, problem_id, student_answer, is_correct, points_earned,
             time_spent_seconds, hints_used, attempt_number, attempted_at)
            SELECT $1, $2, $3, $4, $5, $6, $7, COUNT(*)::INTEGER + 1, $8
            FROM math_mastery.problem_attempts
            WHERE student_id = $1 AND problem_id = $2
            RETURNING id, attempt_number, attempted_at
            "#,
        )
        .bind(attempt.student_id)
        .bind(attempt.problem_id)
        .bind(&attempt.student_answer)
        .bind(attempt.is_correct)
        .bind(attempt.points_earned)
        .bind(attempt.time_spent_seconds)
        .bind(attempt.hints_used)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match sql_state(&err).as_deref() {
            Some(FOREIGN_KEY_VIOLATION) => {
                MasteryError::not_found(format!("student {}", attempt.student_id))
            }
            _ => err.into(),
        })?;

        Ok(RecordedAttempt {
            id: row.try_get("id")?,
            attempt_number: row.try_get("attempt_number")?,
            attempted_at: row.try_get("attempted_at")?,
        })
    }
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let grades = [
        ("K", "Kindergarten", 0, "5-6"),
        ("1", "Grade 1", 1, "6-7"),
        ("2", "Grade 2", 2, "7-8"),
        ("3", "Grade 3", 3, "8-9"),
        ("4", "Grade 4", 4, "9-10"),
        ("5", "Grade 5", 5, "10-11"),
        ("6", "Grade 6", 6, "11-12"),
        ("7", "Grade 7", 7, "12-13"),
        ("8", "Grade 8", 8, "13-14"),
    ];

    let mut grade_ids: HashMap<&str, i32> = HashMap::new();
    for (code, name, display_order, age_range) in grades {
        let id: i32 = sqlx::query(
            r#"
            INSERT INTO math_mastery.grade_levels (code, name, display_order, age_range)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO UPDATE
            SET name = EXCLUDED.name, age_range = EXCLUDED.age_range, updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(code)
        .bind(name)
        .bind(display_order)
        .bind(age_range)
        .fetch_one(pool)
        .await?
        .try_get("id")?;
        grade_ids.insert(code, id);
    }

    let domains = [
        ("CC", "Counting and Cardinality", "Knowing number names and the count sequence", &["K"][..]),
        ("OA", "Operations and Algebraic Thinking", "Representing and solving problems with operations", &["K", "1", "2", "3", "4", "5"][..]),
        ("NBT", "Number and Operations in Base Ten", "Place value and multi-digit arithmetic", &["K", "1", "2", "3", "4", "5"][..]),
        ("NF", "Number and Operations - Fractions", "Understanding fractions as numbers", &["3", "4", "5"][..]),
        ("MD", "Measurement and Data", "Measuring, telling time, and representing data", &["K", "1", "2", "3", "4", "5"][..]),
        ("G", "Geometry", "Reasoning with shapes and their attributes", &["K", "1", "2", "3", "4", "5"][..]),
    ];

    let mut domain_ids: HashMap<&str, i32> = HashMap::new();
    for (code, name, description, grade_codes) in domains {
        let domain_id: i32 = sqlx::query(
            r#"
            INSERT INTO math_mastery.domains (code, name, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (code) DO UPDATE
            SET name = EXCLUDED.name, description = EXCLUDED.description
            RETURNING id
            "#,
        )
        .bind(code)
        .bind(name)
        .bind(description)
        .fetch_one(pool)
        .await?
        .try_get("id")?;
        domain_ids.insert(code, domain_id);

        for grade_code in grade_codes {
            let grade_id = grade_ids
                .get(grade_code)
                .copied()
                .with_context(|| format!("unknown grade {grade_code}"))?;
            sqlx::query(
                "INSERT INTO math_mastery.grade_domains (grade_id, domain_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(grade_id)
            .bind(domain_id)
            .execute(pool)
            .await?;
        }
    }

    // (standard code, title, complexity)
    let standards = [
        ("K.CC.A.1", "Count to 100 by ones and by tens", 1),
        ("K.CC.B.4", "Connect counting to cardinality", 2),
        ("K.OA.A.1", "Represent addition and subtraction with objects", 1),
        ("K.G.A.2", "Name shapes regardless of orientation or size", 1),
        ("1.OA.A.1", "Solve addition and subtraction word problems within 20", 2),
        ("1.OA.B.3", "Apply properties of operations to add and subtract", 3),
        ("1.OA.C.6", "Add and subtract within 20", 2),
        ("1.NBT.A.1", "Count to 120 starting at any number", 1),
        ("1.NBT.B.2", "Understand the two digits of a two-digit number", 2),
        ("1.MD.A.1", "Order three objects by length", 1),
        ("1.G.A.1", "Distinguish defining attributes of shapes", 1),
        ("2.OA.A.1", "Solve one- and two-step word problems within 100", 2),
        ("2.NBT.A.1", "Understand the digits of a three-digit number", 2),
        ("2.MD.C.7", "Tell and write time to the nearest five minutes", 2),
        ("2.G.A.1", "Recognize and draw shapes with given attributes", 1),
    ];

    let mut standard_ids: HashMap<&str, i32> = HashMap::new();
    for (code, title, complexity_level) in standards {
        let mut parts = code.split('.');
        let (Some(grade_code), Some(domain_code), Some(cluster_letter)) =
            (parts.next(), parts.next(), parts.next())
        else {
            anyhow::bail!("malformed standard code {code}");
        };
        let grade_id = grade_ids
            .get(grade_code)
            .copied()
            .with_context(|| format!("unknown grade {grade_code}"))?;
        let domain_id = domain_ids
            .get(domain_code)
            .copied()
            .with_context(|| format!("unknown domain {domain_code}"))?;
        let cluster_code = format!("{grade_code}.{domain_code}.{cluster_letter}");

        let cluster_id: i32 = sqlx::query(
            r#"
            INSERT INTO math_mastery.clusters (domain_id, grade_id, code, title)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO UPDATE SET title = EXCLUDED.title
            RETURNING id
            "#,
        )
        .bind(domain_id)
        .bind(grade_id)
        .bind(&cluster_code)
        .bind(format!("Cluster {cluster_code}"))
        .fetch_one(pool)
        .await?
        .try_get("id")?;

        let standard_id: i32 = sqlx::query(
            r#"
            INSERT INTO math_mastery.standards (cluster_id, code, title, description, complexity_level)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (code) DO UPDATE
            SET title = EXCLUDED.title, complexity_level = EXCLUDED.complexity_level
            RETURNING id
            "#,
        )
        .bind(cluster_id)
        .bind(code)
        .bind(title)
        .bind(title)
        .bind(complexity_level)
        .fetch_one(pool)
        .await?
        .try_get("id")?;
        standard_ids.insert(code, standard_id);
    }

    let students = [
        ("avery.lee", "Avery Lee", "1"),
        ("jules.moreno", "Jules Moreno", "2"),
        ("kiara.patel", "Kiara Patel", "K"),
    ];
    for (username, full_name, grade_code) in students {
        let grade_id = grade_ids
            .get(grade_code)
            .copied()
            .with_context(|| format!("unknown grade {grade_code}"))?;
        sqlx::query(
            r#"
            INSERT INTO math_mastery.users (username, full_name, current_grade_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (username) DO UPDATE
            SET full_name = EXCLUDED.full_name, current_grade_id = EXCLUDED.current_grade_id
            "#,
        )
        .bind(username)
        .bind(full_name)
        .bind(grade_id)
        .execute(pool)
        .await?;
    }

    let problems = [
        (
            "1.OA.C.6",
            "multiple_choice",
            "What is 8 + 5? (A) 12 (B) 13 (C) 14",
            json!({"correct": "B"}),
            "Make a ten: 8 + 2 = 10, then 10 + 3 = 13.",
            2,
        ),
        (
            "1.OA.C.6",
            "open_ended",
            "14 - 5 = ?",
            json!({"answer": 9}),
            "Count back from 14 by five.",
            2,
        ),
        (
            "1.NBT.B.2",
            "interactive",
            "Put 31, 13 and 23 in order from least to greatest.",
            json!({"sequence": [13, 23, 31]}),
            "Compare the tens digits first.",
            3,
        ),
    ];
    for (standard_code, problem_type, question_text, correct_answer, explanation, points) in problems {
        let standard_id = standard_ids
            .get(standard_code)
            .copied()
            .with_context(|| format!("unknown standard {standard_code}"))?;
        sqlx::query(
            r#"
            INSERT INTO math_mastery.problems
            (standard_id, problem_type, question_text, correct_answer, explanation, points)
            SELECT $1, $2, $3, $4, $5, $6
            WHERE NOT EXISTS (
                SELECT 1 FROM math_mastery.problems WHERE standard_id = $1 AND question_text = $3
            )
            "#,
        )
        .bind(standard_id)
        .bind(problem_type)
        .bind(question_text)
        .bind(&correct_answer)
        .bind(explanation)
        .bind(points)
        .execute(pool)
        .await?;
    }

    info!(
        grades = grade_ids.len(),
        domains = domain_ids.len(),
        standards = standard_ids.len(),
        "seed data applied"
    );
    Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub recorded: usize,
    pub rejected: usize,
    pub interventions: usize,
}

pub async fn import_csv<S: ProgressStore>(
    engine: &MasteryEngine<S>,
    csv_path: &std::path::Path,
) -> anyhow::Result<ImportSummary> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    import_sessions(engine, file).await
}

/// Replays session results (`student_id,standard_id,score,time_spent_minutes`) in file order.
///
/// Rows naming unknown students or standards, or carrying out-of-range values,
/// are skipped; store failures abort the import.
pub async fn import_sessions<S: ProgressStore, R: Read>(
    engine: &MasteryEngine<S>,
    source: R,
) -> anyhow::Result<ImportSummary> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_id: i32,
        standard_id: i32,
        score: f64,
        time_spent_minutes: i32,
    }

    let mut reader = csv::Reader::from_reader(source);
    let mut summary = ImportSummary::default();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("malformed CSV record {}", line + 1))?;
        let input = SessionInput {
            student_id: row.student_id,
            standard_id: row.standard_id,
            score: row.score,
            time_spent_minutes: row.time_spent_minutes,
        };

        match engine.record_session(input).await {
            Ok(outcome) => {
                summary.recorded += 1;
                if outcome.intervention_created {
                    summary.interventions += 1;
                }
            }
            Err(err) if err.is_client_error() => {
                warn!(record = line + 1, error = %err, "skipping session");
                summary.rejected += 1;
            }
            Err(err) => return Err(err).context("import aborted"),
        }
    }

    Ok(summary)
}
