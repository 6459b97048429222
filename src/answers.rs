//! Answer checking for curriculum problems.
//!
//! The stored correct answer is JSON whose shape depends on the problem type.
//! It is decoded once into [`ExpectedAnswer`] and each variant has its own
//! comparison.

use std::str::FromStr;

use serde_json::Value;

use crate::error::MasteryError;

/// Numeric answers within this distance of the key are accepted.
pub const NUMERIC_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemType {
    MultipleChoice,
    DragDrop,
    OpenEnded,
    Interactive,
}

impl FromStr for ProblemType {
    type Err = MasteryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "multiple_choice" => Ok(ProblemType::MultipleChoice),
            "drag_drop" => Ok(ProblemType::DragDrop),
            "open_ended" => Ok(ProblemType::OpenEnded),
            "interactive" => Ok(ProblemType::Interactive),
            other => Err(MasteryError::validation(format!("unknown problem type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpectedAnswer {
    MultipleChoice { correct: Value },
    Sequence { sequence: Vec<Value> },
    Numeric { answer: f64 },
    Exact { value: Value },
}

impl ExpectedAnswer {
    /// Decodes the stored key of a problem. Keys stored as JSON text are parsed first.
    pub fn from_problem(problem_type: &str, stored: &Value) -> Result<Self, MasteryError> {
        let problem_type: ProblemType = problem_type.parse()?;
        let key = match stored {
            Value::String(text) => serde_json::from_str(text).unwrap_or_else(|_| stored.clone()),
            other => other.clone(),
        };

        let expected = match problem_type {
            ProblemType::MultipleChoice => ExpectedAnswer::MultipleChoice {
                correct: key.get("correct").cloned().unwrap_or(key),
            },
            ProblemType::Interactive => match (key.get("sequence"), key.get("answer")) {
                (Some(Value::Array(sequence)), _) => ExpectedAnswer::Sequence {
                    sequence: sequence.clone(),
                },
                (_, Some(answer)) => ExpectedAnswer::Exact {
                    value: answer.clone(),
                },
                _ => ExpectedAnswer::Exact { value: key },
            },
            ProblemType::OpenEnded => match key.get("answer") {
                Some(answer) => match as_number(answer) {
                    Some(answer) => ExpectedAnswer::Numeric { answer },
                    None => ExpectedAnswer::Exact {
                        value: answer.clone(),
                    },
                },
                None => ExpectedAnswer::Exact { value: key },
            },
            ProblemType::DragDrop => ExpectedAnswer::Exact { value: key },
        };
        Ok(expected)
    }

    /// Accepts either the bare answer or the client's wrapped form (`{"selected": …}`, `{"answer": …}`).
    pub fn check(&self, given: &Value) -> bool {
        match self {
            ExpectedAnswer::MultipleChoice { correct } => {
                given == correct || given.get("selected") == Some(correct)
            }
            ExpectedAnswer::Sequence { sequence } => {
                let given = given.get("sequence").unwrap_or(given);
                given.as_array() == Some(sequence)
            }
            ExpectedAnswer::Numeric { answer } => {
                let given = given.get("answer").unwrap_or(given);
                as_number(given).is_some_and(|value| (value - answer).abs() < NUMERIC_TOLERANCE)
            }
            ExpectedAnswer::Exact { value } => {
                given == value || given.get("answer") == Some(value)
            }
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Full points when correct, half (rounded down) as partial credit otherwise.
pub fn points_earned(is_correct: bool, points: i32) -> i32 {
    if is_correct {
        points
    } else {
        points.max(0) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn multiple_choice_accepts_bare_or_selected() {
        let expected = ExpectedAnswer::from_problem("multiple_choice", &json!({"correct": "B"})).unwrap();
        assert!(expected.check(&json!("B")));
        assert!(expected.check(&json!({"selected": "B"})));
        assert!(!expected.check(&json!({"selected": "C"})));
    }

    #[test]
    fn sequence_must_match_in_order() {
        let expected =
            ExpectedAnswer::from_problem("interactive", &json!({"sequence": [1, 2, 3]})).unwrap();
        assert!(matches!(expected, ExpectedAnswer::Sequence { .. }));
        assert!(expected.check(&json!({"sequence": [1, 2, 3]})));
        assert!(expected.check(&json!([1, 2, 3])));
        assert!(!expected.check(&json!({"sequence": [3, 2, 1]})));
    }

    #[test]
    fn numeric_uses_tolerance() {
        let expected = ExpectedAnswer::from_problem("open_ended", &json!({"answer": 0.75})).unwrap();
        assert!(expected.check(&json!({"answer": 0.755})));
        assert!(expected.check(&json!("0.75")));
        assert!(!expected.check(&json!({"answer": 0.77})));
        assert!(!expected.check(&json!({"answer": "three quarters"})));
    }

    #[test]
    fn stored_json_text_is_decoded() {
        let stored = Value::String(r#"{"correct": 4}"#.to_string());
        let expected = ExpectedAnswer::from_problem("multiple_choice", &stored).unwrap();
        assert!(expected.check(&json!({"selected": 4})));
    }

    #[test]
    fn interactive_answer_is_exact() {
        let expected = ExpectedAnswer::from_problem("interactive", &json!({"answer": 12})).unwrap();
        assert!(expected.check(&json!({"answer": 12})));
        assert!(expected.check(&json!(12)));
        assert!(!expected.check(&json!(12.001)));
    }

    #[test]
    fn drag_drop_compares_whole_payload() {
        let key = json!({"bins": {"even": [2, 4], "odd": [1, 3]}});
        let expected = ExpectedAnswer::from_problem("drag_drop", &key).unwrap();
        assert!(expected.check(&key));
        assert!(!expected.check(&json!({"bins": {"even": [1], "odd": [2]}})));
    }

    #[test]
    fn unknown_problem_type_is_rejected() {
        assert!(ExpectedAnswer::from_problem("essay", &json!({})).is_err());
    }

    #[test]
    fn partial_credit_rounds_down() {
        assert_eq!(points_earned(true, 5), 5);
        assert_eq!(points_earned(false, 5), 2);
        assert_eq!(points_earned(false, 0), 0);
    }
}
