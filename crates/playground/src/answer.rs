use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::{PlaygroundError, RangeError};

/// A value the program passed to the answer builtin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl AnswerValue {
    pub fn kind(&self) -> AnswerKind {
        match self {
            AnswerValue::Number(_) => AnswerKind::Number,
            AnswerValue::Text(_) => AnswerKind::Text,
            AnswerValue::Boolean(_) => AnswerKind::Boolean,
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Number(value) if value.is_finite() && value.fract() == 0.0 => {
                write!(f, "{}", *value as i64)
            }
            AnswerValue::Number(value) => write!(f, "{value}"),
            AnswerValue::Text(value) => f.write_str(value),
            AnswerValue::Boolean(true) => f.write_str("True"),
            AnswerValue::Boolean(false) => f.write_str("False"),
        }
    }
}

impl From<f64> for AnswerValue {
    fn from(value: f64) -> Self {
        AnswerValue::Number(value)
    }
}

impl From<i32> for AnswerValue {
    fn from(value: i32) -> Self {
        AnswerValue::Number(f64::from(value))
    }
}

impl From<bool> for AnswerValue {
    fn from(value: bool) -> Self {
        AnswerValue::Boolean(value)
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Text(value.to_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerKind {
    Number,
    Text,
    Boolean,
}

/// Expected answer of a case: one kind, an ordered list of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum AnswerExpectation {
    Number(Vec<f64>),
    Text(Vec<String>),
    Boolean(Vec<bool>),
}

impl AnswerExpectation {
    pub fn expected_count(&self) -> usize {
        match self {
            AnswerExpectation::Number(values) => values.len(),
            AnswerExpectation::Text(values) => values.len(),
            AnswerExpectation::Boolean(values) => values.len(),
        }
    }

    pub fn kind(&self) -> AnswerKind {
        match self {
            AnswerExpectation::Number(_) => AnswerKind::Number,
            AnswerExpectation::Text(_) => AnswerKind::Text,
            AnswerExpectation::Boolean(_) => AnswerKind::Boolean,
        }
    }

    /// A value of the wrong kind never matches.
    pub fn matches(&self, index: usize, value: &AnswerValue) -> bool {
        match (self, value) {
            (AnswerExpectation::Number(expected), AnswerValue::Number(actual)) => {
                expected.get(index) == Some(actual)
            }
            (AnswerExpectation::Text(expected), AnswerValue::Text(actual)) => {
                expected.get(index) == Some(actual)
            }
            (AnswerExpectation::Boolean(expected), AnswerValue::Boolean(actual)) => {
                expected.get(index) == Some(actual)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GradingError {
    #[error("the current case does not expect an answer")]
    AnswerNotRequired,
    #[error("too few values in the answer: expected {expected}, got {got}")]
    TooFewAnswers { expected: usize, got: usize },
    #[error("too many values in the answer: expected {expected}, got {got}")]
    TooManyAnswers { expected: usize, got: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub all_correct: bool,
    pub transcript: String,
}

/// `"a, b, c."`, the form shown in the answer bubble.
pub fn transcript(values: &[AnswerValue]) -> String {
    let joined = values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("{joined}.")
}

pub fn grade(
    expected: Option<&AnswerExpectation>,
    values: &[AnswerValue],
) -> Result<Verdict, GradingError> {
    let expected = match expected {
        Some(expectation) if expectation.expected_count() > 0 => expectation,
        _ => return Err(GradingError::AnswerNotRequired),
    };

    let want = expected.expected_count();
    let got = values.len();
    if got < want {
        return Err(GradingError::TooFewAnswers {
            expected: want,
            got,
        });
    }
    if got > want {
        return Err(GradingError::TooManyAnswers {
            expected: want,
            got,
        });
    }

    let all_correct = values
        .iter()
        .enumerate()
        .all(|(index, value)| expected.matches(index, value));
    Ok(Verdict {
        all_correct,
        transcript: transcript(values),
    })
}

/// A graded submission whose verdict is not yet revealed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingGrade {
    pub submitted: Vec<AnswerValue>,
    pub verdict: Verdict,
    pub created_at: Duration,
    pub run_id: u64,
    pub line: usize,
}

#[derive(Debug, Default)]
pub struct AnswerGrader {
    expectation: Option<AnswerExpectation>,
    pending: Option<PendingGrade>,
    answered_in_run: bool,
}

impl AnswerGrader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_expectation(&mut self, expectation: Option<AnswerExpectation>) {
        self.expectation = expectation;
    }

    pub fn expectation(&self) -> Option<&AnswerExpectation> {
        self.expectation.as_ref()
    }

    pub fn requires_answer(&self) -> bool {
        self.expectation
            .as_ref()
            .is_some_and(|expectation| expectation.expected_count() > 0)
    }

    pub fn begin_run(&mut self) {
        self.answered_in_run = false;
    }

    pub fn answered_in_run(&self) -> bool {
        self.answered_in_run
    }

    /// Grades immediately and parks the verdict until it is revealed.
    pub fn submit(
        &mut self,
        values: Vec<AnswerValue>,
        now: Duration,
        run_id: u64,
        line: usize,
    ) -> Result<&PendingGrade, PlaygroundError> {
        if self.pending.is_some() {
            return Err(RangeError::GradeAlreadyPending.into());
        }

        let verdict = grade(self.expectation.as_ref(), &values)?;
        debug!(
            run_id,
            line,
            correct = verdict.all_correct,
            transcript = %verdict.transcript,
            "answer_graded"
        );
        self.answered_in_run = true;
        Ok(&*self.pending.insert(PendingGrade {
            submitted: values,
            verdict,
            created_at: now,
            run_id,
            line,
        }))
    }

    pub fn take_pending(&mut self) -> Option<PendingGrade> {
        self.pending.take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(values: &[f64]) -> AnswerExpectation {
        AnswerExpectation::Number(values.to_vec())
    }

    #[test]
    fn transcript_joins_with_comma_and_ends_with_period() {
        let values = vec![
            AnswerValue::from(7),
            AnswerValue::from(2.5),
            AnswerValue::from("ja"),
            AnswerValue::from(true),
        ];
        assert_eq!(transcript(&values), "7, 2.5, ja, True.");
        assert_eq!(transcript(&[AnswerValue::from(-3)]), "-3.");
    }

    #[test]
    fn arity_mismatch_is_reported_before_values() {
        let expected = numbers(&[1.0]);
        let err = grade(Some(&expected), &[1.into(), 2.into()]).expect_err("too many");
        assert_eq!(
            err,
            GradingError::TooManyAnswers {
                expected: 1,
                got: 2
            }
        );

        let expected = numbers(&[1.0, 2.0]);
        let err = grade(Some(&expected), &[1.into()]).expect_err("too few");
        assert_eq!(
            err,
            GradingError::TooFewAnswers {
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn zero_expected_means_answer_not_required() {
        assert_eq!(
            grade(None, &[1.into()]),
            Err(GradingError::AnswerNotRequired)
        );
        assert_eq!(
            grade(Some(&numbers(&[])), &[]),
            Err(GradingError::AnswerNotRequired)
        );
    }

    #[test]
    fn values_compare_positionally() {
        let expected = numbers(&[1.0, 2.0]);
        assert!(grade(Some(&expected), &[1.into(), 2.into()]).expect("grade").all_correct);
        assert!(!grade(Some(&expected), &[2.into(), 1.into()]).expect("grade").all_correct);
    }

    #[test]
    fn kind_mismatch_counts_as_incorrect() {
        let expected = AnswerExpectation::Text(vec!["42".to_owned()]);
        let verdict = grade(Some(&expected), &[42.into()]).expect("grade");
        assert!(!verdict.all_correct);
        assert_eq!(verdict.transcript, "42.");
    }

    #[test]
    fn second_submission_is_rejected_while_pending() {
        let mut grader = AnswerGrader::new();
        grader.set_expectation(Some(numbers(&[42.0])));
        grader.begin_run();
        assert!(!grader.answered_in_run());

        grader
            .submit(vec![42.into()], Duration::ZERO, 1, 3)
            .expect("first submission");
        let err = grader
            .submit(vec![42.into()], Duration::ZERO, 1, 3)
            .expect_err("second submission");
        assert!(matches!(
            err,
            PlaygroundError::Range(RangeError::GradeAlreadyPending)
        ));

        let pending = grader.take_pending().expect("pending grade");
        assert!(pending.verdict.all_correct);
        assert_eq!(pending.line, 3);
        assert!(grader.answered_in_run());
    }

    #[test]
    fn expectation_deserializes_from_tagged_json() {
        let raw = r#"{ "type": "text", "values": ["a", "b"] }"#;
        let parsed: AnswerExpectation = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed.kind(), AnswerKind::Text);
        assert_eq!(parsed.expected_count(), 2);
    }
}
