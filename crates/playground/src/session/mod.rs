use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::answer::{transcript, AnswerExpectation, AnswerGrader, AnswerValue};
use crate::cases::{
    Advance, ButtonState, CaseHandler, CasePhase, CaseProgress, LevelMode, RunDirective,
};
use crate::compiler::{Compiler, RunState, StopReason};
use crate::deferred::DeferredQueue;
use crate::error::{PlaygroundError, RangeError};
use crate::events::{EventBus, PlaygroundEvent, PlaygroundObserver, SubscriptionId};
use crate::feedback::{Feedback, FeedbackCommand};
use crate::interpreter::{Interpreter, StepOutcome};
use crate::level::{resolve_settings, GameCatalog, ResolvedSettings};
use crate::progress::{GameProgress, ProgressStore};
use crate::speed::{SpeedController, DEFAULT_SPEED};
use crate::walker::{Walker, DEFAULT_BASE_STEP_DURATION, DEFAULT_MARKER_HIDE_FRACTION};

#[cfg(test)]
mod tests;

pub const NO_ANSWER_MESSAGE: &str = "No answer was given";

#[derive(Debug, Clone, PartialEq)]
pub struct PlaygroundConfig {
    /// Step duration used when no scene, level or case overrides it.
    pub base_step_duration: Duration,
    pub initial_speed: f32,
    /// Base wait between an answer and its verdict, scaled by `1 - speed`.
    pub answer_delay: Duration,
    /// Base wait between a passed case and the next one, scaled by `1 - speed`.
    pub success_delay: Duration,
    pub case_flash_duration: Duration,
    pub marker_hide_fraction: f32,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            base_step_duration: DEFAULT_BASE_STEP_DURATION,
            initial_speed: DEFAULT_SPEED,
            answer_delay: Duration::from_secs(3),
            success_delay: Duration::from_secs(3),
            case_flash_duration: Duration::from_millis(1500),
            marker_hide_fraction: DEFAULT_MARKER_HIDE_FRACTION,
        }
    }
}

/// What became of a submitted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Graded; the verdict is revealed after the answer delay.
    Pending { transcript: String },
    /// Shown only. Sandbox answers are never graded.
    Ungraded { transcript: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeferredAction {
    CaseFlashFinished,
    GradeResolved,
    SuccessResolved,
    ResumeWalker { run_id: u64 },
}

#[derive(Debug, Clone)]
struct LoadedLevel {
    index: usize,
    id: String,
}

/// The execution and grading context of one player session.
///
/// Owns every component and drives them from [`Playground::tick`]. All
/// suspension points (answer delay, success delay, case flash) live in one
/// deferred queue. Every authoritative stop drains that queue through the
/// abort paths, so a suspension never outlives the run that scheduled it.
pub struct Playground<I: Interpreter> {
    config: PlaygroundConfig,
    clock: Duration,
    speed: SpeedController,
    walker: Walker,
    compiler: Compiler,
    cases: CaseHandler,
    grader: AnswerGrader,
    deferred: DeferredQueue<DeferredAction>,
    bus: EventBus,
    feedback: Feedback,
    interpreter: I,
    mode: LevelMode,
    catalog: GameCatalog,
    store: Box<dyn ProgressStore>,
    progress: GameProgress,
    level: Option<LoadedLevel>,
    main_code: String,
    settings: ResolvedSettings,
    row_limit: Option<u32>,
    total_steps: u64,
}

impl<I: Interpreter> Playground<I> {
    pub fn new(
        config: PlaygroundConfig,
        interpreter: I,
        catalog: GameCatalog,
        mut store: Box<dyn ProgressStore>,
    ) -> Result<Self, PlaygroundError> {
        let mut progress = store.load(catalog.game_id())?;
        let last_level = catalog.level_count().saturating_sub(1);
        if progress.unlocked_level > last_level {
            warn!(
                unlocked_level = progress.unlocked_level,
                level_count = catalog.level_count(),
                "stored_unlocked_level_clamped"
            );
            progress.unlocked_level = last_level;
        }

        let speed = SpeedController::new(config.initial_speed);
        let walker = Walker::new(config.base_step_duration, speed.speed())
            .with_marker_hide_fraction(config.marker_hide_fraction);
        info!(
            game_id = catalog.game_id(),
            level_count = catalog.level_count(),
            speed = speed.speed(),
            "playground_created"
        );

        Ok(Self {
            config,
            clock: Duration::ZERO,
            speed,
            walker,
            compiler: Compiler::new(),
            cases: CaseHandler::new(0, false),
            grader: AnswerGrader::new(),
            deferred: DeferredQueue::new(),
            bus: EventBus::new(),
            feedback: Feedback::new(),
            interpreter,
            mode: LevelMode::Case,
            catalog,
            store,
            progress,
            level: None,
            main_code: String::new(),
            settings: ResolvedSettings::default(),
            row_limit: None,
            total_steps: 0,
        })
    }

    /// Advances the session clock by `dt`: at most one interpreter unit,
    /// then every deferred action that came due.
    pub fn tick(&mut self, dt: Duration) -> Result<(), PlaygroundError> {
        self.clock = self.clock.saturating_add(dt);
        if self.compiler.is_running() {
            self.tick_walker(dt)?;
        }

        while let Some(action) = self.deferred.pop_due(self.clock) {
            self.resume(action)?;
        }
        Ok(())
    }

    fn tick_walker(&mut self, dt: Duration) -> Result<(), PlaygroundError> {
        let report = match self.walker.tick(dt, &mut self.interpreter) {
            Ok(report) => report,
            Err(fault) => {
                error!(line = ?fault.line, error = %fault, "runtime_error");
                self.feedback.push(FeedbackCommand::ErrorMarker {
                    line: fault.line,
                    message: fault.message.clone(),
                });
                self.stop_compiler_with(StopReason::RuntimeError);
                return Err(fault.into());
            }
        };

        let mut answered = None;
        match report.step {
            Some(StepOutcome::Advanced { line }) => {
                self.total_steps = self.total_steps.saturating_add(1);
                self.feedback.push(FeedbackCommand::LineMarker { line });
            }
            Some(StepOutcome::Answered { line, values }) => {
                self.total_steps = self.total_steps.saturating_add(1);
                self.feedback.push(FeedbackCommand::LineMarker { line });
                answered = Some((line, values));
            }
            Some(StepOutcome::ReachedEnd) | None => {}
        }
        if report.hide_marker {
            self.feedback.push(FeedbackCommand::HideLineMarker);
        }
        if let Some((line, values)) = answered {
            self.submit_answer_at(line, values)?;
        }
        if report.finished
            && self.stop_compiler_with(StopReason::Finished)
            && self.answer_missing()
        {
            self.raise_task_error(NO_ANSWER_MESSAGE);
            return Err(PlaygroundError::Task {
                message: NO_ANSWER_MESSAGE.to_owned(),
            });
        }
        Ok(())
    }

    fn resume(&mut self, action: DeferredAction) -> Result<(), PlaygroundError> {
        debug!(
            action = ?action,
            clock_ms = self.clock.as_millis() as u64,
            "deferred_action_resumed"
        );
        match action {
            DeferredAction::CaseFlashFinished => {
                self.feedback.push(FeedbackCommand::HideCaseFlash);
                self.start_compiler()?;
            }
            DeferredAction::GradeResolved => self.resolve_grade(),
            DeferredAction::SuccessResolved => self.advance_after_success()?,
            DeferredAction::ResumeWalker { run_id } => {
                if self.compiler.is_running() && self.compiler.run_id() == run_id {
                    self.walker.release();
                }
            }
        }
        Ok(())
    }

    fn abort_deferred(&mut self) {
        for action in self.deferred.abort_all() {
            self.abort(action);
        }
    }

    /// The run a suspension belonged to was stopped; void its decision.
    fn abort(&mut self, action: DeferredAction) {
        debug!(action = ?action, "deferred_action_aborted");
        match action {
            DeferredAction::CaseFlashFinished => {
                self.feedback.push(FeedbackCommand::HideCaseFlash);
                self.reset_running_cases();
            }
            DeferredAction::GradeResolved => {
                self.grader.take_pending();
                self.feedback.push(FeedbackCommand::HideAnswerBubble);
                self.reset_running_cases();
            }
            DeferredAction::SuccessResolved => {
                self.feedback.push(FeedbackCommand::HideTaskFeedback);
                self.cases.cancel_success();
                self.reset_running_cases();
            }
            DeferredAction::ResumeWalker { .. } => {}
        }
    }

    fn reset_running_cases(&mut self) {
        if self.mode == LevelMode::Case && self.cases.progress().is_running_cases {
            self.cases.reset(&mut self.feedback, &mut self.bus);
        }
    }

    fn resolve_grade(&mut self) {
        let Some(pending) = self.grader.take_pending() else {
            return;
        };
        if !self.compiler.is_running() || pending.run_id != self.compiler.run_id() {
            self.feedback.push(FeedbackCommand::HideAnswerBubble);
            self.reset_running_cases();
            return;
        }

        let case = self.cases.current_case();
        let transcript = pending.verdict.transcript;
        if pending.verdict.all_correct {
            info!(case, transcript = %transcript, "answer_correct");
            self.bus.publish(&PlaygroundEvent::CorrectAnswer(transcript));
            self.succeed_case();
        } else {
            info!(case, transcript = %transcript, "answer_wrong");
            self.cases.fail(&mut self.feedback);
            self.bus.publish(&PlaygroundEvent::WrongAnswer(transcript));
            self.stop_compiler_with(StopReason::TaskError);
        }
    }

    fn succeed_case(&mut self) {
        if self.cases.phase() == CasePhase::Succeeded {
            debug!(case = self.cases.current_case(), "case_already_succeeding");
            return;
        }
        self.stop_compiler_with(StopReason::CodeForced);
        self.cases.begin_success(&mut self.feedback);
        let delay = self.speed.scale(self.config.success_delay);
        self.deferred
            .schedule(self.clock, delay, DeferredAction::SuccessResolved);
    }

    fn advance_after_success(&mut self) -> Result<(), PlaygroundError> {
        match self.cases.finish_success(&mut self.feedback, &mut self.bus) {
            Advance::Next(case) => {
                self.enter_case(case)?;
                self.run_current_case()?;
            }
            Advance::LevelCompleted => self.on_level_completed(),
            Advance::AlreadyCompleted => {}
        }
        Ok(())
    }

    fn on_level_completed(&mut self) {
        let Some(level) = &self.level else {
            return;
        };
        let next = level.index + 1;
        self.progress.level_mut(&level.id).completed = true;
        if next < self.catalog.level_count() && next > self.progress.unlocked_level {
            self.progress.unlocked_level = next;
        }
        info!(
            level_id = %level.id,
            unlocked_level = self.progress.unlocked_level,
            "level_completed"
        );
        self.persist_progress();
    }

    fn run_current_case(&mut self) -> Result<(), PlaygroundError> {
        let case = self.cases.current_case();
        match self.cases.run(case, &mut self.feedback, &mut self.bus) {
            Some(RunDirective::StartNow) => self.start_compiler(),
            Some(RunDirective::AfterFlash) => {
                let delay = self.speed.scale(self.config.case_flash_duration);
                self.deferred
                    .schedule(self.clock, delay, DeferredAction::CaseFlashFinished);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn start_compiler(&mut self) -> Result<(), PlaygroundError> {
        let code = self.full_code();
        match self
            .compiler
            .start(&mut self.walker, &mut self.interpreter, &code, &mut self.bus)
        {
            Ok(true) => {
                self.grader.begin_run();
                Ok(())
            }
            Ok(false) => {
                debug!(run_id = self.compiler.run_id(), "compiler_already_running");
                Ok(())
            }
            Err(fault) => {
                error!(line = ?fault.line, error = %fault, "program_load_failed");
                self.feedback.push(FeedbackCommand::ErrorMarker {
                    line: fault.line,
                    message: fault.message.clone(),
                });
                self.on_stopped(StopReason::RuntimeError);
                Err(fault.into())
            }
        }
    }

    fn stop_compiler_with(&mut self, reason: StopReason) -> bool {
        let stopped = self
            .compiler
            .stop(reason, &mut self.walker, &mut self.bus);
        if stopped {
            self.on_stopped(reason);
        }
        stopped
    }

    fn on_stopped(&mut self, reason: StopReason) {
        self.abort_deferred();
        self.feedback.push(FeedbackCommand::HideLineMarker);
        if self.grader.take_pending().is_some() {
            self.feedback.push(FeedbackCommand::HideAnswerBubble);
        }

        if reason == StopReason::UserForced {
            self.reset_running_cases();
        }
    }

    fn answer_missing(&self) -> bool {
        self.mode == LevelMode::Case
            && self.grader.requires_answer()
            && !self.grader.answered_in_run()
    }

    /// Shows a task error, fails the current case and stops any run with
    /// [`StopReason::TaskError`].
    pub fn raise_task_error(&mut self, message: &str) {
        warn!(
            task_message = message,
            case = self.cases.current_case(),
            "task_error"
        );
        self.feedback
            .push(FeedbackCommand::TaskError(message.to_owned()));
        if self.mode == LevelMode::Case {
            self.cases.fail(&mut self.feedback);
        }
        self.stop_compiler_with(StopReason::TaskError);
    }

    /// Run button. Returns `false` when something is already in flight.
    pub fn run_code(&mut self) -> Result<bool, PlaygroundError> {
        self.require_level()?;
        if self.is_busy() {
            return Ok(false);
        }

        self.save_main_code();
        self.feedback.push(FeedbackCommand::HideTaskFeedback);
        self.feedback.push(FeedbackCommand::HideAnswerBubble);
        match self.mode {
            LevelMode::Sandbox => self.start_compiler()?,
            LevelMode::Case => {
                if self.cases.case_count() == 0 {
                    return Ok(false);
                }
                self.cases.reset(&mut self.feedback, &mut self.bus);
                self.install_case()?;
                self.run_current_case()?;
            }
        }
        Ok(true)
    }

    /// Runs one case without resetting the others; the retry path after a
    /// failed case.
    pub fn run_case(&mut self, case: usize) -> Result<bool, PlaygroundError> {
        self.require_level()?;
        let case_count = self.cases.case_count();
        if case >= case_count {
            return Err(RangeError::CaseIndexOutOfRange {
                index: case,
                count: case_count,
            }
            .into());
        }
        if self.is_busy() {
            return Ok(false);
        }

        self.save_main_code();
        self.feedback.push(FeedbackCommand::HideTaskFeedback);
        self.leave_sandbox();
        if case == self.cases.current_case() {
            self.install_case()?;
        } else {
            self.enter_case(case)?;
        }
        self.run_current_case()?;
        Ok(true)
    }

    /// Pauses or resumes a running program, otherwise behaves like
    /// [`Playground::run_code`].
    pub fn toggle_run(&mut self) -> Result<bool, PlaygroundError> {
        if self.compiler.is_running() {
            let paused = !self.walker.is_user_paused();
            return Ok(self.set_user_paused(paused));
        }
        self.run_code()
    }

    /// Stop button.
    pub fn stop_compiler_via_user(&mut self) -> bool {
        let stopped = self.stop_compiler_with(StopReason::UserForced);
        if !stopped {
            self.abort_deferred();
        }
        if !stopped && self.mode == LevelMode::Case && self.cases.progress().is_running_cases {
            self.feedback.push(FeedbackCommand::HideCaseFlash);
            self.feedback.push(FeedbackCommand::HideTaskFeedback);
            self.feedback.push(FeedbackCommand::HideAnswerBubble);
            self.cases.reset(&mut self.feedback, &mut self.bus);
        }
        stopped
    }

    /// Programmatic stop.
    pub fn stop_compiler(&mut self) -> bool {
        self.stop_compiler_with(StopReason::CodeForced)
    }

    /// Returns `true` only on an actual transition of a running program.
    pub fn set_user_paused(&mut self, paused: bool) -> bool {
        if !self.compiler.is_running() || !self.walker.set_user_paused(paused) {
            return false;
        }
        info!(paused, run_id = self.compiler.run_id(), "user_pause_changed");
        let event = if paused {
            PlaygroundEvent::UserPaused
        } else {
            PlaygroundEvent::UserUnpaused
        };
        self.bus.publish(&event);
        true
    }

    /// Returns `true` when the stored speed changed.
    pub fn set_speed(&mut self, speed: f32) -> bool {
        let Some(speed) = self.speed.set_speed(speed) else {
            return false;
        };
        self.walker.set_speed(speed);
        debug!(
            speed,
            step_interval_ms = self.walker.step_interval().as_millis() as u64,
            "speed_changed"
        );
        self.bus.publish(&PlaygroundEvent::SpeedChanged(speed));
        true
    }

    /// Overrides the base step duration until settings are next applied.
    pub fn set_walker_step_time(&mut self, base: Duration) {
        self.walker.set_base_step_duration(base);
    }

    /// User case switch. Refused while a run or a delayed decision is in flight.
    pub fn switch_case(&mut self, case: usize) -> Result<bool, PlaygroundError> {
        self.require_level()?;
        let case_count = self.cases.case_count();
        if case >= case_count {
            return Err(RangeError::CaseIndexOutOfRange {
                index: case,
                count: case_count,
            }
            .into());
        }
        if self.is_busy() {
            return Ok(false);
        }

        self.deferred.clear();
        self.feedback.push(FeedbackCommand::HideAnswerBubble);
        self.cases.abandon_run();
        self.leave_sandbox();
        self.enter_case(case)?;
        Ok(true)
    }

    pub fn switch_to_sandbox(&mut self) -> Result<bool, PlaygroundError> {
        self.require_level()?;
        if !self.cases.has_sandbox() || self.is_busy() {
            return Ok(false);
        }
        if self.mode == LevelMode::Sandbox {
            return Ok(true);
        }

        self.deferred.clear();
        self.feedback.push(FeedbackCommand::HideAnswerBubble);
        self.cases.abandon_run();
        self.cases.deselect(&mut self.feedback);
        self.enter_sandbox()?;
        Ok(true)
    }

    fn enter_sandbox(&mut self) -> Result<(), PlaygroundError> {
        self.mode = LevelMode::Sandbox;
        self.grader.set_expectation(None);
        self.feedback
            .push(FeedbackCommand::SandboxButton(ButtonState::Active));
        self.apply_settings()?;
        info!("switched_to_sandbox");
        self.bus.publish(&PlaygroundEvent::SwitchedToSandbox);
        Ok(())
    }

    fn leave_sandbox(&mut self) {
        if self.mode == LevelMode::Sandbox {
            self.mode = LevelMode::Case;
            self.feedback
                .push(FeedbackCommand::SandboxButton(ButtonState::Default));
        }
    }

    fn enter_case(&mut self, case: usize) -> Result<(), PlaygroundError> {
        self.cases
            .select_case(case, &mut self.feedback, &mut self.bus);
        self.install_case()
    }

    /// Installs the current case's answer and settings and records it.
    fn install_case(&mut self) -> Result<(), PlaygroundError> {
        let level = self.level.as_ref().ok_or(RangeError::NoLevelLoaded)?;
        let case = self.cases.current_case();
        let entry = self.catalog.level(level.index)?;
        self.grader
            .set_expectation(entry.case_answer(case).cloned());
        self.progress.level_mut(&level.id).current_case = case;
        self.apply_settings()
    }

    fn apply_settings(&mut self) -> Result<(), PlaygroundError> {
        let level = self.level.as_ref().ok_or(RangeError::NoLevelLoaded)?;
        let entry = self.catalog.level(level.index)?;
        let settings = resolve_settings(&entry, self.mode, self.cases.current_case())?;

        self.walker.set_base_step_duration(
            settings
                .step_duration
                .unwrap_or(self.config.base_step_duration),
        );
        if let Some(limit) = settings.row_limit {
            self.row_limit = Some(limit);
        }
        let description = settings.task_description.clone().unwrap_or_default();
        self.feedback.push(FeedbackCommand::TaskDescription {
            header: description.header,
            body: description.body,
        });
        debug!(
            mode = ?self.mode,
            case = self.cases.current_case(),
            base_step_ms = self.walker.base_step_duration().as_millis() as u64,
            precode_len = settings.precode.len(),
            "settings_applied"
        );
        self.settings = settings;
        Ok(())
    }

    pub fn start_game(&mut self) -> Result<(), PlaygroundError> {
        self.start_level(0)
    }

    /// Unloads the current level and loads level `index` of the catalog.
    pub fn start_level(&mut self, index: usize) -> Result<(), PlaygroundError> {
        let entry = self.catalog.level(index)?;
        let id = entry.id().to_owned();
        let case_count = entry.case_count();
        let has_sandbox = entry.has_sandbox();

        if self.level.is_some() {
            self.save_main_code();
        }
        self.bus.publish(&PlaygroundEvent::LevelUnloading);
        self.deferred.clear();
        self.stop_compiler_with(StopReason::CodeForced);
        self.grader.take_pending();
        self.grader.set_expectation(None);
        self.row_limit = None;
        for command in [
            FeedbackCommand::HideLineMarker,
            FeedbackCommand::HideAnswerBubble,
            FeedbackCommand::HideTaskFeedback,
            FeedbackCommand::HideCaseFlash,
        ] {
            self.feedback.push(command);
        }

        self.cases = CaseHandler::new(case_count, has_sandbox);
        self.feedback.push(self.cases.layout_command());
        self.level = Some(LoadedLevel {
            index,
            id: id.clone(),
        });

        if has_sandbox {
            self.enter_sandbox()?;
        } else {
            self.mode = LevelMode::Case;
            self.cases.reset(&mut self.feedback, &mut self.bus);
            let saved_case = self.progress.level(&id).map_or(0, |level| level.current_case);
            if saved_case > 0 && saved_case < case_count {
                self.enter_case(saved_case)?;
            } else {
                self.install_case()?;
            }
        }
        self.load_main_code();

        info!(
            level_index = index,
            level_id = %id,
            case_count,
            has_sandbox,
            mode = ?self.mode,
            "level_started"
        );
        self.bus.publish(&PlaygroundEvent::LevelChanged);
        Ok(())
    }

    fn load_main_code(&mut self) {
        let Some(level) = &self.level else {
            return;
        };
        let record = self.progress.level_mut(&level.id);
        if record.is_started {
            self.main_code = record.main_code.clone();
        } else {
            record.is_started = true;
            record.main_code = self.settings.start_code.clone();
            self.main_code = self.settings.start_code.clone();
        }
        self.persist_progress();
    }

    fn persist_progress(&mut self) {
        if let Err(error) = self.store.save(&self.progress) {
            warn!(error = %error, "progress_save_failed");
        }
    }

    /// Submits an answer on the current line.
    pub fn submit_answer(
        &mut self,
        values: Vec<AnswerValue>,
    ) -> Result<Submission, PlaygroundError> {
        let line = self.walker.current_line();
        self.submit_answer_at(line, values)
    }

    /// Grades `values` now and reveals the verdict after the answer delay.
    /// Arity errors are raised immediately and end the run.
    pub fn submit_answer_at(
        &mut self,
        line: usize,
        values: Vec<AnswerValue>,
    ) -> Result<Submission, PlaygroundError> {
        if !self.compiler.is_running() {
            return Err(RangeError::NoActiveRun.into());
        }

        let run_id = self.compiler.run_id();
        let delay = self.speed.scale(self.config.answer_delay);
        if self.mode == LevelMode::Sandbox {
            let transcript = transcript(&values);
            info!(line, transcript = %transcript, "sandbox_answer");
            self.show_answer(line, &transcript);
            self.deferred
                .schedule(self.clock, delay, DeferredAction::ResumeWalker { run_id });
            return Ok(Submission::Ungraded { transcript });
        }

        let submitted = self
            .grader
            .submit(values, self.clock, run_id, line)
            .map(|pending| pending.verdict.transcript.clone());
        let transcript = match submitted {
            Ok(transcript) => transcript,
            Err(PlaygroundError::Grading(grading)) => {
                warn!(line, error = %grading, "answer_rejected");
                self.feedback.push(FeedbackCommand::ErrorMarker {
                    line: Some(line),
                    message: grading.to_string(),
                });
                self.stop_compiler_with(StopReason::RuntimeError);
                return Err(grading.into());
            }
            Err(other) => return Err(other),
        };

        self.show_answer(line, &transcript);
        self.deferred
            .schedule(self.clock, delay, DeferredAction::GradeResolved);
        Ok(Submission::Pending { transcript })
    }

    fn show_answer(&mut self, line: usize, transcript: &str) {
        self.feedback.push(FeedbackCommand::AnswerBubble {
            line,
            text: format!("Answer: {transcript}"),
        });
        self.walker.hold();
    }

    /// Marks the current case passed, as a correct answer would.
    pub fn set_case_completed(&mut self) -> Result<(), PlaygroundError> {
        self.require_level()?;
        if self.mode == LevelMode::Sandbox
            || self.cases.current_case() >= self.cases.case_count()
            || self.has_pending_work()
        {
            debug!(mode = ?self.mode, "case_completion_ignored");
            return Ok(());
        }
        self.succeed_case();
        Ok(())
    }

    /// Replaces the expected answer of the current case.
    pub fn set_case_answer(&mut self, expectation: AnswerExpectation) {
        self.grader.set_expectation(Some(expectation));
    }

    pub fn set_unlocked_level(&mut self, index: usize) -> Result<(), RangeError> {
        let count = self.catalog.level_count();
        if index >= count {
            return Err(RangeError::UnlockedLevelOutOfRange { index, count });
        }
        self.progress.unlocked_level = index;
        self.persist_progress();
        Ok(())
    }

    pub fn set_row_limit(&mut self, limit: i64) -> Result<(), RangeError> {
        if limit <= 0 {
            return Err(RangeError::NonPositiveRowLimit(limit));
        }
        self.row_limit = Some(u32::try_from(limit).unwrap_or(u32::MAX));
        Ok(())
    }

    pub fn main_code(&self) -> &str {
        &self.main_code
    }

    pub fn set_main_code(&mut self, code: impl Into<String>) {
        self.main_code = code.into();
    }

    /// Stores the current main code in the level's progress record.
    pub fn save_main_code(&mut self) {
        let Some(level) = &self.level else {
            return;
        };
        self.progress.level_mut(&level.id).main_code = self.main_code.clone();
        self.persist_progress();
    }

    pub fn full_code(&self) -> String {
        self.settings.full_code(&self.main_code)
    }

    pub fn subscribe(&mut self, observer: Box<dyn PlaygroundObserver>) -> SubscriptionId {
        self.bus.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn drain_feedback(&mut self) -> Vec<FeedbackCommand> {
        self.feedback.drain()
    }

    fn require_level(&self) -> Result<(), RangeError> {
        self.level
            .as_ref()
            .map(|_| ())
            .ok_or(RangeError::NoLevelLoaded)
    }

    fn is_busy(&self) -> bool {
        self.compiler.is_running() || self.has_pending_work()
    }

    /// A delayed decision (flash, verdict, success) is still to come.
    pub fn has_pending_work(&self) -> bool {
        !self.deferred.is_empty() || self.grader.has_pending()
    }

    pub fn case_progress(&self) -> CaseProgress {
        self.cases.progress()
    }

    pub fn case_button_states(&self) -> &[ButtonState] {
        self.cases.button_states()
    }

    pub fn case_count(&self) -> usize {
        self.cases.case_count()
    }

    pub fn run_state(&self) -> RunState {
        self.compiler.run_state(&self.walker)
    }

    pub fn is_compiler_running(&self) -> bool {
        self.compiler.is_running()
    }

    pub fn is_user_paused(&self) -> bool {
        self.walker.is_user_paused()
    }

    pub fn mode(&self) -> LevelMode {
        self.mode
    }

    pub fn speed(&self) -> f32 {
        self.speed.speed()
    }

    pub fn step_interval(&self) -> Duration {
        self.walker.step_interval()
    }

    pub fn settings(&self) -> &ResolvedSettings {
        &self.settings
    }

    pub fn row_limit(&self) -> Option<u32> {
        self.row_limit
    }

    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut I {
        &mut self.interpreter
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn clock(&self) -> Duration {
        self.clock
    }

    pub fn current_level_index(&self) -> Option<usize> {
        self.level.as_ref().map(|level| level.index)
    }

    pub fn current_level_id(&self) -> Option<&str> {
        self.level.as_ref().map(|level| level.id.as_str())
    }

    pub fn level_count(&self) -> usize {
        self.catalog.level_count()
    }

    pub fn unlocked_level(&self) -> usize {
        self.progress.unlocked_level
    }

    pub fn progress(&self) -> &GameProgress {
        &self.progress
    }
}
