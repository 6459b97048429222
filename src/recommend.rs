use std::collections::BTreeSet;

use crate::models::{LearningPath, Standard, StandardProgress, MASTERY_THRESHOLD};

/// Number of standards a learning path proposes.
pub const PATH_LENGTH: usize = 10;
const MILESTONE_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Proficiency {
    NotStarted,
    Beginning,
    Developing,
    Mastered,
}

impl Proficiency {
    pub fn from_level(level: f64) -> Self {
        if level >= MASTERY_THRESHOLD {
            Proficiency::Mastered
        } else if level >= 0.6 {
            Proficiency::Developing
        } else if level >= 0.3 {
            Proficiency::Beginning
        } else {
            Proficiency::NotStarted
        }
    }

    /// Learning paths take standards the student has begun first, then untouched
    /// ones, then those nearly mastered.
    fn path_rank(self) -> u8 {
        match self {
            Proficiency::Beginning => 1,
            Proficiency::NotStarted => 2,
            Proficiency::Developing => 3,
            Proficiency::Mastered => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Proficiency::NotStarted => "not_started",
            Proficiency::Beginning => "beginning",
            Proficiency::Developing => "developing",
            Proficiency::Mastered => "mastered",
        }
    }
}

/// Unmastered standards, easiest first; among equal complexity the ones closest to mastery lead.
fn ranked(standards: &[StandardProgress]) -> Vec<&StandardProgress> {
    let mut candidates: Vec<&StandardProgress> =
        standards.iter().filter(|row| !row.is_mastered()).collect();

    candidates.sort_by(|a, b| {
        a.standard
            .complexity_level
            .cmp(&b.standard.complexity_level)
            .then_with(|| b.mastery_level().total_cmp(&a.mastery_level()))
            .then_with(|| a.standard.code.cmp(&b.standard.code))
    });
    candidates
}

/// Picks up to `limit` next standards from a snapshot of the student's grade.
pub fn select(standards: &[StandardProgress], limit: usize) -> Vec<Standard> {
    ranked(standards)
        .into_iter()
        .take(limit)
        .map(|row| row.standard.clone())
        .collect()
}

fn reasoning_for(average_mastery: f64) -> String {
    let focus = if average_mastery < 0.3 {
        "Focus on fundamental concepts and building basic skills."
    } else if average_mastery < 0.6 {
        "Continue practicing core concepts with some new challenges."
    } else if average_mastery < MASTERY_THRESHOLD {
        "Ready for more advanced problems and application."
    } else {
        "Mastery achieved, ready for enrichment and next grade preparation."
    };
    format!("Based on current progress: {focus}")
}

pub fn learning_path(student_id: i32, standards: &[StandardProgress]) -> LearningPath {
    let next_milestones: Vec<String> = standards
        .iter()
        .filter(|row| !row.is_mastered())
        .map(|row| row.domain_name.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .take(MILESTONE_COUNT)
        .map(|name| format!("Master {name} concepts"))
        .collect();

    let mut picks: Vec<&StandardProgress> = standards.iter().filter(|row| !row.is_mastered()).collect();
    picks.sort_by(|a, b| {
        Proficiency::from_level(a.mastery_level())
            .path_rank()
            .cmp(&Proficiency::from_level(b.mastery_level()).path_rank())
            .then_with(|| a.standard.complexity_level.cmp(&b.standard.complexity_level))
            .then_with(|| a.standard.code.cmp(&b.standard.code))
    });
    picks.truncate(PATH_LENGTH);
    // Presented easiest first once chosen.
    picks.sort_by(|a, b| {
        a.standard
            .complexity_level
            .cmp(&b.standard.complexity_level)
            .then_with(|| a.standard.code.cmp(&b.standard.code))
    });

    if picks.is_empty() {
        let (reasoning, current_level) = if standards.is_empty() {
            (
                "No suitable standards found for current grade level".to_string(),
                "unknown".to_string(),
            )
        } else {
            (reasoning_for(1.0), Proficiency::Mastered.as_str().to_string())
        };
        return LearningPath {
            student_id,
            recommended_standards: Vec::new(),
            reasoning,
            current_level,
            next_milestones,
        };
    }

    let average = picks.iter().map(|row| row.mastery_level()).sum::<f64>() / picks.len() as f64;
    let current_level = picks
        .iter()
        .map(|row| Proficiency::from_level(row.mastery_level()).as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(", ");

    LearningPath {
        student_id,
        recommended_standards: picks.iter().map(|row| row.standard.id).collect(),
        reasoning: reasoning_for(average),
        current_level,
        next_milestones,
    }
}
