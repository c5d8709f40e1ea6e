use tracing::{info, warn};

use crate::events::{EventBus, PlaygroundEvent};
use crate::interpreter::{Interpreter, InterpreterFault};
use crate::walker::Walker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The user pressed stop.
    UserForced,
    /// The playground stopped the run, e.g. after a correct answer.
    CodeForced,
    /// The program ran to completion.
    Finished,
    RuntimeError,
    TaskError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    UserPaused,
}

/// Owns the running flag of the execution session.
///
/// Every stop path goes through [`Compiler::stop`], which emits at most one
/// `CompilerStopped` per run.
#[derive(Debug, Default)]
pub struct Compiler {
    running: bool,
    run_id: u64,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Ok(false)` without side effects when a run is already active.
    pub fn start(
        &mut self,
        walker: &mut Walker,
        interpreter: &mut dyn Interpreter,
        code: &str,
        bus: &mut EventBus,
    ) -> Result<bool, InterpreterFault> {
        if self.running {
            return Ok(false);
        }

        self.running = true;
        self.run_id = self.run_id.wrapping_add(1);
        info!(run_id = self.run_id, code_len = code.len(), "compiler_started");
        bus.publish(&PlaygroundEvent::CompilerStarted);

        if let Err(fault) = walker.activate(interpreter, code) {
            warn!(run_id = self.run_id, error = %fault, "compiler_load_failed");
            self.stop(StopReason::RuntimeError, walker, bus);
            return Err(fault);
        }
        Ok(true)
    }

    /// Returns `true` if a running session was stopped and the event emitted.
    /// When idle the walker is still hard-stopped but nothing is emitted.
    pub fn stop(&mut self, reason: StopReason, walker: &mut Walker, bus: &mut EventBus) -> bool {
        walker.hard_stop();
        if !self.running {
            return false;
        }

        self.running = false;
        info!(run_id = self.run_id, reason = ?reason, "compiler_stopped");
        bus.publish(&PlaygroundEvent::CompilerStopped(reason));
        true
    }

    pub fn run_state(&self, walker: &Walker) -> RunState {
        match (self.running, walker.is_user_paused()) {
            (false, _) => RunState::Idle,
            (true, true) => RunState::UserPaused,
            (true, false) => RunState::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }
}
