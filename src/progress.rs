use std::collections::BTreeMap;

use crate::models::{
    DomainProgress, GradeLevel, GradeProgress, GradeSnapshot, GradeStats, StandardMetrics, StandardProgress,
    MASTERY_THRESHOLD,
};

#[derive(Default)]
struct DomainTally {
    name: String,
    total: i64,
    attempted: i64,
    mastered: i64,
    mastery_sum: f64,
    minutes: i64,
}

/// Rolls per-standard mastery of one grade up into domain and grade summaries.
///
/// Unattempted standards count as mastery 0 in the domain average. The grade
/// average is the mean of the domain averages, not weighted by domain size.
pub fn summarize_grade(grade: &GradeLevel, standards: &[StandardProgress]) -> GradeProgress {
    let mut tallies: BTreeMap<&str, DomainTally> = BTreeMap::new();

    for row in standards {
        let tally = tallies
            .entry(row.domain_code.as_str())
            .or_insert_with(|| DomainTally {
                name: row.domain_name.clone(),
                ..DomainTally::default()
            });
        tally.total += 1;
        if row.attempts() > 0 {
            tally.attempted += 1;
        }
        if row.is_mastered() {
            tally.mastered += 1;
        }
        tally.mastery_sum += row.mastery_level();
        tally.minutes += row.time_spent_minutes();
    }

    let domains: Vec<DomainProgress> = tallies
        .into_iter()
        .map(|(code, tally)| DomainProgress {
            domain_code: code.to_string(),
            domain_name: tally.name,
            total_standards: tally.total,
            attempted_standards: tally.attempted,
            mastered_standards: tally.mastered,
            average_mastery: if tally.total == 0 {
                0.0
            } else {
                tally.mastery_sum / tally.total as f64
            },
            time_spent_minutes: tally.minutes,
        })
        .collect();

    let average_mastery = if domains.is_empty() {
        0.0
    } else {
        domains.iter().map(|d| d.average_mastery).sum::<f64>() / domains.len() as f64
    };

    GradeProgress {
        grade_code: grade.code.clone(),
        grade_name: grade.name.clone(),
        total_standards: domains.iter().map(|d| d.total_standards).sum(),
        attempted_standards: domains.iter().map(|d| d.attempted_standards).sum(),
        mastered_standards: domains.iter().map(|d| d.mastered_standards).sum(),
        average_mastery,
        time_spent_minutes: domains.iter().map(|d| d.time_spent_minutes).sum(),
        domains,
    }
}

/// Per-standard detail rows, sorted by standard code, optionally limited to one domain.
pub fn standard_metrics(standards: &[StandardProgress], domain_code: Option<&str>) -> Vec<StandardMetrics> {
    let mut metrics: Vec<StandardMetrics> = standards
        .iter()
        .filter(|row| domain_code.map_or(true, |code| row.domain_code == code))
        .map(|row| StandardMetrics {
            standard_id: row.standard.id,
            standard_code: row.standard.code.clone(),
            standard_title: row.standard.title.clone(),
            domain_code: row.domain_code.clone(),
            domain_name: row.domain_name.clone(),
            mastery_level: row.mastery_level(),
            attempts: row.attempts(),
            time_spent_minutes: row.time_spent_minutes(),
            last_attempt_at: row.mastery.as_ref().map(|m| m.last_attempt_at),
            mastered_at: row.mastery.as_ref().and_then(|m| m.mastered_at),
        })
        .collect();

    metrics.sort_by(|a, b| a.standard_code.cmp(&b.standard_code));
    metrics
}

/// Class-wide figures for a grade. The average is taken over mastery rows, so
/// standards nobody has practiced do not pull it down.
pub fn grade_stats(grade: &GradeLevel, snapshot: &GradeSnapshot) -> GradeStats {
    let rows = snapshot.progress.len() as i64;
    let average_mastery = if rows == 0 {
        0.0
    } else {
        snapshot.progress.iter().map(|m| m.mastery_level).sum::<f64>() / rows as f64
    };

    GradeStats {
        grade_code: grade.code.clone(),
        total_students: snapshot.total_students,
        total_standards: snapshot.total_standards,
        average_mastery,
        total_masteries: snapshot
            .progress
            .iter()
            .filter(|m| m.mastery_level >= MASTERY_THRESHOLD)
            .count() as i64,
        total_attempts: rows,
    }
}
