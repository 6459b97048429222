use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{AdaptiveFeedback, GradeProgress, Intervention, Standard};

fn percent(level: f64) -> f64 {
    level * 100.0
}

pub fn build_report(
    student_id: i32,
    generated_at: DateTime<Utc>,
    progress: &GradeProgress,
    recommendations: &[Standard],
    feedback: &AdaptiveFeedback,
    open_interventions: &[Intervention],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Student Mastery Report");
    let _ = writeln!(
        output,
        "Student {} in {} (generated {})",
        student_id,
        progress.grade_name,
        generated_at.date_naive()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Grade Summary");
    let _ = writeln!(
        output,
        "- Mastered {} of {} standards ({} attempted)",
        progress.mastered_standards, progress.total_standards, progress.attempted_standards
    );
    let _ = writeln!(
        output,
        "- Average mastery {:.1}% over {} minutes of practice",
        percent(progress.average_mastery),
        progress.time_spent_minutes
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Domains");

    if progress.domains.is_empty() {
        let _ = writeln!(output, "No standards defined for this grade.");
    } else {
        for domain in progress.domains.iter() {
            let _ = writeln!(
                output,
                "- {} ({}): {:.1}% average, {}/{} mastered, {} attempted",
                domain.domain_name,
                domain.domain_code,
                percent(domain.average_mastery),
                domain.mastered_standards,
                domain.total_standards,
                domain.attempted_standards
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Next Standards");

    if recommendations.is_empty() {
        let _ = writeln!(output, "Every standard in this grade is mastered.");
    } else {
        for standard in recommendations.iter() {
            let _ = writeln!(
                output,
                "- {} {} (complexity {})",
                standard.code, standard.title, standard.complexity_level
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Feedback");

    if feedback.recommendations.is_empty() {
        let _ = writeln!(output, "No practice in the last 30 days.");
    } else {
        if !feedback.strength_areas.is_empty() {
            let _ = writeln!(output, "- Strengths: {}", feedback.strength_areas.join(", "));
        }
        if !feedback.struggling_areas.is_empty() {
            let _ = writeln!(output, "- Struggling: {}", feedback.struggling_areas.join(", "));
        }
        for advice in feedback.recommendations.iter() {
            let _ = writeln!(output, "- {advice}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Open Interventions");

    if open_interventions.is_empty() {
        let _ = writeln!(output, "No open interventions.");
    } else {
        for intervention in open_interventions.iter() {
            let _ = writeln!(
                output,
                "- #{} standard {} ({} priority) since {}: {}",
                intervention.id,
                intervention.standard_id,
                intervention.priority,
                intervention.created_at.date_naive(),
                intervention.message
            );
        }
    }

    output
}
