use thiserror::Error;

use crate::answer::GradingError;
use crate::interpreter::InterpreterFault;
use crate::level::ConfigurationError;
use crate::progress::ProgressError;

#[derive(Debug, Error)]
pub enum PlaygroundError {
    #[error("runtime error: {0}")]
    Runtime(#[from] InterpreterFault),
    #[error("task error: {message}")]
    Task { message: String },
    #[error(transparent)]
    Grading(#[from] GradingError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}

impl PlaygroundError {
    /// Errors that end the current run but leave the session usable.
    pub fn is_run_scoped(&self) -> bool {
        matches!(
            self,
            PlaygroundError::Runtime(_) | PlaygroundError::Task { .. } | PlaygroundError::Grading(_)
        )
    }
}

/// Contract violations by a caller. Reported immediately, never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RangeError {
    #[error("level index {index} is out of range (level count {count})")]
    LevelIndexOutOfRange { index: usize, count: usize },
    #[error("unlocked level {index} is out of range (level count {count})")]
    UnlockedLevelOutOfRange { index: usize, count: usize },
    #[error("case index {index} is out of range (case count {count})")]
    CaseIndexOutOfRange { index: usize, count: usize },
    #[error("row limit must be positive, got {0}")]
    NonPositiveRowLimit(i64),
    #[error("walker step time {0} is not a usable duration")]
    InvalidStepDuration(f32),
    #[error("an answer is already waiting to be graded")]
    GradeAlreadyPending,
    #[error("answers can only be submitted while a program is running")]
    NoActiveRun,
    #[error("no level has been started")]
    NoLevelLoaded,
}
