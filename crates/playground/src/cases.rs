use tracing::{debug, info};

use crate::events::{EventBus, PlaygroundEvent};
use crate::feedback::{Feedback, FeedbackCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonState {
    Default,
    Active,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelMode {
    Sandbox,
    Case,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasePhase {
    Awaiting,
    Running,
    Succeeded,
    Failed,
    AllCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseProgress {
    pub current_case: usize,
    pub is_running_cases: bool,
    pub all_cases_completed: bool,
}

/// How execution of a case should begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDirective {
    StartNow,
    /// Start once the case flash finishes.
    AfterFlash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Next(usize),
    LevelCompleted,
    /// Every case passed again after the level already reported completion.
    AlreadyCompleted,
}

/// Sequences the graded cases of one level.
///
/// `current_case` stays in `[0, case_count]`; reaching `case_count` ends the
/// sequence. Level completion is reported at most once per handler, and a
/// fresh handler is built on every level load.
#[derive(Debug)]
pub struct CaseHandler {
    case_count: usize,
    has_sandbox: bool,
    current_case: usize,
    is_running_cases: bool,
    all_cases_completed: bool,
    completion_reported: bool,
    phase: CasePhase,
    buttons: Vec<ButtonState>,
}

impl CaseHandler {
    pub fn new(case_count: usize, has_sandbox: bool) -> Self {
        Self {
            case_count,
            has_sandbox,
            current_case: 0,
            is_running_cases: false,
            all_cases_completed: false,
            completion_reported: false,
            phase: CasePhase::Awaiting,
            buttons: vec![ButtonState::Default; case_count],
        }
    }

    pub fn layout_command(&self) -> FeedbackCommand {
        FeedbackCommand::CaseButtonsLayout {
            visible: self.case_count > 1 || self.has_sandbox,
            case_count: self.case_count,
        }
    }

    pub fn select_case(
        &mut self,
        case: usize,
        feedback: &mut Feedback,
        bus: &mut EventBus,
    ) -> usize {
        self.select(case, true, feedback, bus)
    }

    fn select(
        &mut self,
        case: usize,
        flash: bool,
        feedback: &mut Feedback,
        bus: &mut EventBus,
    ) -> usize {
        let case = case.min(self.case_count);
        if case != self.current_case {
            let previous = self.current_case;
            self.set_button(previous, ButtonState::Default, feedback);
            self.current_case = case;
            feedback.push(FeedbackCommand::HideCaseFlash);
            if flash && self.case_count > 1 && case < self.case_count {
                feedback.push(FeedbackCommand::CaseFlash {
                    case,
                    run_after: false,
                });
            }
        }

        self.set_button(case, ButtonState::Active, feedback);
        debug!(case, case_count = self.case_count, "case_selected");
        bus.publish(&PlaygroundEvent::CaseSwitched(case));
        case
    }

    /// Returns `None` when `case` does not name a graded case.
    pub fn run(
        &mut self,
        case: usize,
        feedback: &mut Feedback,
        bus: &mut EventBus,
    ) -> Option<RunDirective> {
        if case >= self.case_count {
            return None;
        }

        if case == self.current_case {
            self.set_button(case, ButtonState::Active, feedback);
        } else {
            self.select(case, false, feedback, bus);
        }
        self.is_running_cases = true;
        self.phase = CasePhase::Running;
        feedback.push(FeedbackCommand::HideCaseFlash);
        info!(case, case_count = self.case_count, "case_run");

        if self.case_count > 1 {
            feedback.push(FeedbackCommand::CaseFlash {
                case,
                run_after: true,
            });
            Some(RunDirective::AfterFlash)
        } else {
            Some(RunDirective::StartNow)
        }
    }

    /// First half of a success: the positive message shown during the delay.
    pub fn begin_success(&mut self, feedback: &mut Feedback) {
        self.phase = CasePhase::Succeeded;
        let message = if self.case_count == 1 {
            "Good job!".to_owned()
        } else {
            format!("Test {} passed!", self.current_case + 1)
        };
        feedback.push(FeedbackCommand::PositiveMessage(message));
    }

    /// Second half of a success, after the delay.
    pub fn finish_success(&mut self, feedback: &mut Feedback, bus: &mut EventBus) -> Advance {
        feedback.push(FeedbackCommand::HideAnswerBubble);
        feedback.push(FeedbackCommand::HideTaskFeedback);
        let finished = self.current_case;
        self.set_button(finished, ButtonState::Completed, feedback);
        self.current_case = (finished + 1).min(self.case_count);

        if self.current_case < self.case_count {
            self.phase = CasePhase::Awaiting;
            return Advance::Next(self.current_case);
        }

        self.is_running_cases = false;
        self.all_cases_completed = true;
        self.phase = CasePhase::AllCompleted;
        if self.completion_reported {
            return Advance::AlreadyCompleted;
        }

        self.completion_reported = true;
        info!(case_count = self.case_count, "level_cases_completed");
        bus.publish(&PlaygroundEvent::LevelCompleted);
        Advance::LevelCompleted
    }

    /// Drops a success whose delay was voided; the index stays put.
    pub fn cancel_success(&mut self) {
        if self.phase == CasePhase::Succeeded {
            self.phase = CasePhase::Awaiting;
        }
    }

    pub fn fail(&mut self, feedback: &mut Feedback) {
        self.is_running_cases = false;
        self.phase = CasePhase::Failed;
        let case = self.current_case;
        self.set_button(case, ButtonState::Failed, feedback);
        info!(case, "case_failed");
    }

    pub fn reset(&mut self, feedback: &mut Feedback, bus: &mut EventBus) {
        for case in 0..self.case_count {
            self.set_button(case, ButtonState::Default, feedback);
        }
        self.is_running_cases = false;
        self.all_cases_completed = false;
        self.phase = CasePhase::Awaiting;
        self.select_case(0, feedback, bus);
    }

    /// Clears the current indicator when the sandbox takes over.
    pub fn deselect(&mut self, feedback: &mut Feedback) {
        let case = self.current_case;
        self.set_button(case, ButtonState::Default, feedback);
    }

    /// Ends the sequence without touching indicators.
    pub fn abandon_run(&mut self) {
        self.is_running_cases = false;
        if self.phase == CasePhase::Running {
            self.phase = CasePhase::Awaiting;
        }
    }

    fn set_button(&mut self, case: usize, state: ButtonState, feedback: &mut Feedback) {
        if let Some(button) = self.buttons.get_mut(case) {
            *button = state;
            feedback.push(FeedbackCommand::CaseButton { case, state });
        }
    }

    pub fn progress(&self) -> CaseProgress {
        CaseProgress {
            current_case: self.current_case,
            is_running_cases: self.is_running_cases,
            all_cases_completed: self.all_cases_completed,
        }
    }

    pub fn phase(&self) -> CasePhase {
        self.phase
    }

    pub fn current_case(&self) -> usize {
        self.current_case
    }

    pub fn case_count(&self) -> usize {
        self.case_count
    }

    pub fn has_sandbox(&self) -> bool {
        self.has_sandbox
    }

    pub fn button_states(&self) -> &[ButtonState] {
        &self.buttons
    }
}
