use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

mod access;
mod answers;
mod config;
mod db;
mod engagement;
mod engine;
mod error;
mod feedback;
mod grade_config;
mod intervention;
mod logging;
mod mastery;
#[cfg(test)]
mod memory_store;
mod models;
mod progress;
mod recommend;
mod report;
mod store;

use crate::config::Config;
use crate::engine::{AnswerSubmission, MasteryEngine};
use crate::models::SessionInput;

#[derive(Parser)]
#[command(name = "math-mastery")]
#[command(about = "Standards-based math mastery tracker for K-8 students", long_about = None)]
struct Cli {
    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load the grade, domain and standard catalog plus sample students
    Seed,
    /// Replay practice sessions from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record one practice session
    Record {
        #[arg(long)]
        student: i32,
        #[arg(long)]
        standard: i32,
        #[arg(long)]
        score: f64,
        #[arg(long, default_value_t = 0)]
        minutes: i32,
    },
    /// Summarize a student's progress through their current grade
    Progress {
        #[arg(long)]
        student: i32,
    },
    /// Per-standard progress for a student's current grade
    Standards {
        #[arg(long)]
        student: i32,
        #[arg(long)]
        domain: Option<String>,
    },
    /// Suggest the next standards to practice
    Recommend {
        #[arg(long)]
        student: i32,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Build a learning path for a student
    Path {
        #[arg(long)]
        student: i32,
    },
    /// Adaptive feedback from the last 30 days of practice
    Feedback {
        #[arg(long)]
        student: i32,
    },
    /// Check whether a student may open a grade's content
    CanAccess {
        #[arg(long)]
        student: i32,
        #[arg(long)]
        grade: String,
    },
    /// List grade levels
    Grades,
    /// List domains taught in a grade, or a domain's standards with --domain
    Domains {
        #[arg(long)]
        grade: String,
        #[arg(long)]
        domain: Option<String>,
    },
    /// Move a student to another grade
    SetGrade {
        #[arg(long)]
        student: i32,
        #[arg(long)]
        grade: String,
    },
    /// Grade an answer to a problem
    Answer {
        #[arg(long)]
        student: i32,
        #[arg(long)]
        problem: i32,
        /// JSON value; anything that does not parse is sent as a string
        #[arg(long)]
        answer: String,
        #[arg(long, default_value_t = 0)]
        seconds: i32,
        #[arg(long, default_value_t = 0)]
        hints: i32,
    },
    /// List a student's remediation flags
    Interventions {
        #[arg(long)]
        student: i32,
        /// Include resolved flags
        #[arg(long)]
        all: bool,
    },
    /// Close an open remediation flag
    Resolve {
        #[arg(long)]
        id: i32,
    },
    /// Class-wide mastery statistics for a grade
    GradeStats {
        #[arg(long)]
        grade: String,
    },
    /// Daily and weekly practice activity for a student
    Engagement {
        #[arg(long)]
        student: i32,
        #[arg(long, default_value_t = engagement::DEFAULT_WINDOW_DAYS)]
        days: i64,
    },
    /// Show the UI settings for a grade
    UiConfig {
        #[arg(long)]
        grade: String,
    },
    /// Generate a markdown progress report
    Report {
        #[arg(long)]
        student: i32,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Needs no database, so it runs before configuration is loaded.
fn show_ui_config(grade: &str, json: bool) -> anyhow::Result<()> {
    let config = grade_config::ui_config(grade)
        .with_context(|| format!("no UI configuration for grade {grade}"))?;
    if json {
        return print_json(config);
    }

    println!("Grade {} UI:", config.grade_level);
    println!(
        "- theme {} on {}, font {}",
        config.theme.primary_color, config.theme.background_color, config.theme.font_size
    );
    println!(
        "- audio {}, animations {}, drag and drop {}",
        config.interactions.has_audio, config.interactions.has_animations, config.interactions.drag_and_drop
    );
    println!(
        "- breadcrumbs {}, menu depth {}, auto advance {}",
        config.navigation.show_breadcrumbs, config.navigation.max_menu_depth, config.navigation.auto_advance
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Commands::UiConfig { grade } = &cli.command {
        return show_ui_config(grade, cli.json);
    }

    let config = Config::from_env()?;
    logging::init_tracing(&config.log_level);

    let pool = db::connect(&config).await?;
    let engine = MasteryEngine::new(db::PgStore::new(pool.clone()), config.merge_policy);
    info!(policy = %engine.policy(), "mastery engine ready");

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let summary = db::import_csv(&engine, &csv).await?;
            println!(
                "Recorded {} sessions from {} ({} rejected, {} interventions opened).",
                summary.recorded,
                csv.display(),
                summary.rejected,
                summary.interventions
            );
        }
        Commands::Record {
            student,
            standard,
            score,
            minutes,
        } => {
            let outcome = engine
                .record_session(SessionInput {
                    student_id: student,
                    standard_id: standard,
                    score,
                    time_spent_minutes: minutes,
                })
                .await
                .context("failed to record session")?;

            if cli.json {
                print_json(&outcome.mastery)?;
            } else {
                let mastery = &outcome.mastery;
                println!(
                    "Standard {} mastery {:.2} after {} attempts ({} minutes).",
                    mastery.standard_id,
                    mastery.mastery_level,
                    mastery.attempts,
                    mastery.time_spent_minutes
                );
                if let Some(mastered_at) = mastery.mastered_at {
                    println!("Mastered on {}.", mastered_at.date_naive());
                }
                if outcome.intervention_created {
                    println!("Remediation intervention opened.");
                }
            }
        }
        Commands::Progress { student } => {
            let progress = engine.grade_progress(student).await?;
            if cli.json {
                print_json(&progress)?;
                return Ok(());
            }

            println!(
                "{}: {}/{} standards mastered, average {:.1}%, {} minutes.",
                progress.grade_name,
                progress.mastered_standards,
                progress.total_standards,
                progress.average_mastery * 100.0,
                progress.time_spent_minutes
            );
            for domain in progress.domains.iter() {
                println!(
                    "- {} ({}): {}/{} mastered, {} attempted, average {:.1}%",
                    domain.domain_name,
                    domain.domain_code,
                    domain.mastered_standards,
                    domain.total_standards,
                    domain.attempted_standards,
                    domain.average_mastery * 100.0
                );
            }
        }
        Commands::Standards { student, domain } => {
            let metrics = engine.standard_metrics(student, domain.as_deref()).await?;
            if cli.json {
                print_json(&metrics)?;
                return Ok(());
            }

            if metrics.is_empty() {
                println!("No standards found.");
            }
            for row in metrics.iter() {
                println!(
                    "- {} {}: mastery {:.2}, {} attempts, {} minutes",
                    row.standard_code,
                    row.standard_title,
                    row.mastery_level,
                    row.attempts,
                    row.time_spent_minutes
                );
            }
        }
        Commands::Recommend { student, limit } => {
            let standards = engine.recommend(student, limit).await?;
            if cli.json {
                print_json(&standards)?;
                return Ok(());
            }

            if standards.is_empty() {
                println!("Nothing left to recommend.");
                return Ok(());
            }
            println!("Recommended standards:");
            for standard in standards.iter() {
                println!(
                    "- {} {} (complexity {})",
                    standard.code, standard.title, standard.complexity_level
                );
            }
        }
        Commands::Path { student } => {
            let path = engine.learning_path(student).await?;
            if cli.json {
                print_json(&path)?;
                return Ok(());
            }

            println!("{}", path.reasoning);
            println!("Current level: {}", path.current_level);
            println!("Standards: {:?}", path.recommended_standards);
            for milestone in path.next_milestones.iter() {
                println!("- {milestone}");
            }
        }
        Commands::Feedback { student } => {
            let feedback = engine.adaptive_feedback(student).await?;
            if cli.json {
                print_json(&feedback)?;
                return Ok(());
            }

            if feedback.recommendations.is_empty() {
                println!("No practice in the last 30 days.");
            }
            for advice in feedback.recommendations.iter() {
                println!("- {advice}");
            }
        }
        Commands::CanAccess { student, grade } => {
            let allowed = engine.can_access_grade(student, &grade).await?;
            if cli.json {
                print_json(&allowed)?;
            } else if allowed {
                println!("Student {student} may access grade {grade}.");
            } else {
                println!("Student {student} may not access grade {grade}.");
            }
        }
        Commands::Grades => {
            let grades = engine.grades().await?;
            if cli.json {
                print_json(&grades)?;
                return Ok(());
            }

            for grade in grades.iter() {
                println!("- {} {} (ages {})", grade.code, grade.name, grade.age_range);
            }
        }
        Commands::Domains {
            grade,
            domain: Some(domain),
        } => {
            let standards = engine.standards_for(&grade, &domain).await?;
            if cli.json {
                print_json(&standards)?;
                return Ok(());
            }

            for standard in standards.iter() {
                println!("- {} {}", standard.code, standard.title);
            }
        }
        Commands::Domains { grade, domain: None } => {
            let domains = engine.domains_for_grade(&grade).await?;
            if cli.json {
                print_json(&domains)?;
                return Ok(());
            }

            for domain in domains.iter() {
                println!("- {} {}", domain.code, domain.name);
            }
        }
        Commands::SetGrade { student, grade } => {
            if engine.set_student_grade(student, &grade).await? {
                println!("Student {student} moved to grade {grade}.");
            } else {
                println!("Student {student} not found.");
            }
        }
        Commands::Answer {
            student,
            problem,
            answer,
            seconds,
            hints,
        } => {
            let answer = serde_json::from_str(&answer).unwrap_or(serde_json::Value::String(answer));
            let result = engine
                .submit_answer(AnswerSubmission {
                    student_id: student,
                    problem_id: problem,
                    answer,
                    time_spent_seconds: seconds,
                    hints_used: hints,
                })
                .await?;

            if cli.json {
                print_json(&result)?;
                return Ok(());
            }

            let verdict = if result.is_correct { "Correct" } else { "Incorrect" };
            println!(
                "{verdict}: {} points on attempt {}.",
                result.points_earned, result.attempt_number
            );
            if let Some(explanation) = result.explanation {
                println!("{explanation}");
            }
        }
        Commands::Interventions { student, all } => {
            let interventions = engine.interventions(student, !all).await?;
            if cli.json {
                print_json(&interventions)?;
                return Ok(());
            }

            if interventions.is_empty() {
                println!("No interventions.");
            }
            for intervention in interventions.iter() {
                let status = if intervention.is_resolved { "resolved" } else { "open" };
                println!(
                    "- #{} standard {} [{}] {}",
                    intervention.id, intervention.standard_id, status, intervention.message
                );
            }
        }
        Commands::Resolve { id } => {
            engine.resolve_intervention(id).await?;
            println!("Intervention {id} resolved.");
        }
        Commands::GradeStats { grade } => {
            let stats = engine.grade_stats(&grade).await?;
            if cli.json {
                print_json(&stats)?;
                return Ok(());
            }

            println!(
                "Grade {}: {} students, {} standards, {} progress records, {} mastered, average {:.1}%.",
                stats.grade_code,
                stats.total_students,
                stats.total_standards,
                stats.total_attempts,
                stats.total_masteries,
                stats.average_mastery * 100.0
            );
        }
        Commands::Engagement { student, days } => {
            let analytics = engine.engagement(student, days).await?;
            if cli.json {
                print_json(&analytics)?;
                return Ok(());
            }

            if analytics.daily_activity.is_empty() {
                println!("No practice in the last {days} days.");
                return Ok(());
            }
            println!("Daily activity:");
            for day in analytics.daily_activity.iter() {
                println!(
                    "- {}: {} standards, {} minutes, average {:.2}",
                    day.activity_date, day.standards_worked, day.total_minutes, day.average_mastery
                );
            }
            println!("Weekly trends:");
            for week in analytics.weekly_trends.iter() {
                println!(
                    "- week of {}: {} standards, {} minutes, average {:.2}",
                    week.week_start, week.standards_worked, week.total_minutes, week.average_mastery
                );
            }
        }
        Commands::UiConfig { grade } => show_ui_config(&grade, cli.json)?,
        Commands::Report { student, out } => {
            let progress = engine.grade_progress(student).await?;
            let recommendations = engine.recommend(student, 5).await?;
            let feedback = engine.adaptive_feedback(student).await?;
            let open = engine.interventions(student, true).await?;
            let report = report::build_report(
                student,
                Utc::now(),
                &progress,
                &recommendations,
                &feedback,
                &open,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
