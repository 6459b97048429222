//! Remediation flags raised when a student keeps scoring low on a standard.

use serde::Serialize;

use crate::models::{Intervention, NewIntervention, StudentMastery};

pub const REMEDIATION: &str = "remediation";

/// Attempts required before a low mastery counts as struggling.
pub const MIN_ATTEMPTS: i32 = 3;
/// Mastery below which a repeatedly attempted standard is flagged.
pub const STRUGGLE_THRESHOLD: f64 = 0.5;

const PRIORITY: &str = "high";
const MESSAGE: &str = "Student is struggling with this concept after multiple attempts";

/// Lifecycle of a remediation flag for one (student, standard) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterventionState {
    NoIntervention,
    Flagged,
    /// Closed by a teacher; never reopened. A later struggle opens a new flag.
    Resolved,
}

impl InterventionState {
    /// State of the pair given its most recent intervention, if any.
    pub fn of(latest: Option<&Intervention>) -> Self {
        match latest {
            None => InterventionState::NoIntervention,
            Some(intervention) if intervention.is_resolved => InterventionState::Resolved,
            Some(_) => InterventionState::Flagged,
        }
    }

    /// Whether a fresh flag must be opened after `mastery` was written.
    pub fn opens_flag(self, mastery: &StudentMastery) -> bool {
        match self {
            InterventionState::NoIntervention | InterventionState::Resolved => {
                needs_remediation(mastery)
            }
            InterventionState::Flagged => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RemediationPlan {
    pub actions: Vec<&'static str>,
    pub suggested_resources: Vec<&'static str>,
}

impl Default for RemediationPlan {
    fn default() -> Self {
        Self {
            actions: vec!["review_prerequisites", "use_manipulatives", "teacher_assistance"],
            suggested_resources: vec!["visual_aids", "step_by_step_tutorials"],
        }
    }
}

pub fn needs_remediation(mastery: &StudentMastery) -> bool {
    mastery.attempts >= MIN_ATTEMPTS && mastery.mastery_level < STRUGGLE_THRESHOLD
}

pub fn remediation_for(mastery: &StudentMastery) -> Result<NewIntervention, serde_json::Error> {
    Ok(NewIntervention {
        student_id: mastery.student_id,
        standard_id: mastery.standard_id,
        intervention_type: REMEDIATION,
        priority: PRIORITY,
        message: MESSAGE,
        recommended_actions: serde_json::to_value(RemediationPlan::default())?,
    })
}
