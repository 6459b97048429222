use crate::error::MasteryError;
use crate::models::GradeLevel;

/// Students may open their own grade and every earlier one; unknown grades are closed.
pub fn can_access(student_grade: Option<&GradeLevel>, target_grade: Option<&GradeLevel>) -> bool {
    match (student_grade, target_grade) {
        (Some(student), Some(target)) => target.display_order <= student.display_order,
        _ => false,
    }
}

/// Grade codes are `K` or a number; anything else is rejected before touching the store.
pub fn validate_grade_code(code: &str) -> Result<(), MasteryError> {
    let trimmed = code.trim();
    let valid = trimmed == "K"
        || (!trimmed.is_empty() && trimmed.len() <= 2 && trimmed.chars().all(|c| c.is_ascii_digit()));
    if valid {
        Ok(())
    } else {
        Err(MasteryError::validation(format!("malformed grade code '{code}'")))
    }
}

/// Domain codes are short upper-case abbreviations such as `OA` or `NBT`.
pub fn validate_domain_code(code: &str) -> Result<(), MasteryError> {
    let valid = !code.is_empty()
        && code.len() <= 8
        && code.chars().all(|c| c.is_ascii_uppercase() || c == '.');
    if valid {
        Ok(())
    } else {
        Err(MasteryError::validation(format!("malformed domain code '{code}'")))
    }
}
