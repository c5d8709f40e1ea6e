use thiserror::Error;

use crate::answer::AnswerValue;

/// Result of asking the interpreter to execute one unit of the program.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// One unit ran; `line` is where the line marker should sit.
    Advanced { line: usize },
    /// The unit called the answer builtin with `values`.
    Answered {
        line: usize,
        values: Vec<AnswerValue>,
    },
    /// Nothing left to execute. No unit ran.
    ReachedEnd,
}

impl StepOutcome {
    pub fn line(&self) -> Option<usize> {
        match self {
            StepOutcome::Advanced { line } | StepOutcome::Answered { line, .. } => Some(*line),
            StepOutcome::ReachedEnd => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct InterpreterFault {
    pub line: Option<usize>,
    pub message: String,
}

impl InterpreterFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            line: None,
            message: message.into(),
        }
    }

    pub fn at_line(line: usize, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
        }
    }
}

/// Seam to the external program interpreter.
///
/// The playground never parses or evaluates code. It decides when `load`
/// and `execute_one_unit` may be called: `load` once per run activation,
/// `execute_one_unit` at most once per tick while the run is active and
/// the walker is not cooling down.
pub trait Interpreter {
    fn load(&mut self, code: &str) -> Result<(), InterpreterFault>;

    fn execute_one_unit(&mut self) -> Result<StepOutcome, InterpreterFault>;
}

impl<T: Interpreter + ?Sized> Interpreter for Box<T> {
    fn load(&mut self, code: &str) -> Result<(), InterpreterFault> {
        (**self).load(code)
    }

    fn execute_one_unit(&mut self) -> Result<StepOutcome, InterpreterFault> {
        (**self).execute_one_unit()
    }
}
