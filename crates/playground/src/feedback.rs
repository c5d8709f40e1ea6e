use crate::cases::ButtonState;

/// Presentation directive for whatever front end renders the playground.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackCommand {
    LineMarker { line: usize },
    HideLineMarker,
    ErrorMarker { line: Option<usize>, message: String },
    AnswerBubble { line: usize, text: String },
    HideAnswerBubble,
    PositiveMessage(String),
    HideTaskFeedback,
    TaskError(String),
    TaskDescription { header: String, body: String },
    CaseButton { case: usize, state: ButtonState },
    SandboxButton(ButtonState),
    CaseButtonsLayout { visible: bool, case_count: usize },
    /// Banner naming the case about to run. `run_after` is set when the run
    /// starts once the flash finishes.
    CaseFlash { case: usize, run_after: bool },
    HideCaseFlash,
}

/// Ordered outbox of presentation commands, drained by the front end.
#[derive(Debug, Default)]
pub struct Feedback {
    pending: Vec<FeedbackCommand>,
}

impl Feedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: FeedbackCommand) {
        self.pending.push(command);
    }

    pub fn drain(&mut self) -> Vec<FeedbackCommand> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &[FeedbackCommand] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
