use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::compiler::StopReason;

/// Notification fanned out to subscribers in registration order.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaygroundEvent {
    CompilerStarted,
    CompilerStopped(StopReason),
    UserPaused,
    UserUnpaused,
    SpeedChanged(f32),
    CaseSwitched(usize),
    SwitchedToSandbox,
    CorrectAnswer(String),
    WrongAnswer(String),
    LevelUnloading,
    LevelChanged,
    LevelCompleted,
}

/// Subscriber capabilities. Implement only the hooks you care about; the
/// rest default to no-ops. `on_event` sees every notification.
pub trait PlaygroundObserver {
    fn on_event(&mut self, _event: &PlaygroundEvent) {}

    fn on_compiler_started(&mut self) {}

    fn on_compiler_stopped(&mut self, _reason: StopReason) {}

    fn on_user_paused(&mut self) {}

    fn on_user_unpaused(&mut self) {}

    fn on_speed_changed(&mut self, _speed: f32) {}

    fn on_case_switched(&mut self, _case: usize) {}

    fn on_switched_to_sandbox(&mut self) {}

    fn on_correct_answer(&mut self, _transcript: &str) {}

    fn on_wrong_answer(&mut self, _transcript: &str) {}

    fn on_level_unloading(&mut self) {}

    fn on_level_changed(&mut self) {}

    fn on_level_completed(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct EventBus {
    observers: Vec<(SubscriptionId, Box<dyn PlaygroundObserver>)>,
    next_id: u64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("observer_count", &self.observers.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Box<dyn PlaygroundObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.observers.push((id, observer));
        id
    }

    /// Returns `false` if `id` was never registered or already removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn publish(&mut self, event: &PlaygroundEvent) {
        for (_, observer) in &mut self.observers {
            observer.on_event(event);
            dispatch(observer.as_mut(), event);
        }
    }
}

fn dispatch(observer: &mut dyn PlaygroundObserver, event: &PlaygroundEvent) {
    match event {
        PlaygroundEvent::CompilerStarted => observer.on_compiler_started(),
        PlaygroundEvent::CompilerStopped(reason) => observer.on_compiler_stopped(*reason),
        PlaygroundEvent::UserPaused => observer.on_user_paused(),
        PlaygroundEvent::UserUnpaused => observer.on_user_unpaused(),
        PlaygroundEvent::SpeedChanged(speed) => observer.on_speed_changed(*speed),
        PlaygroundEvent::CaseSwitched(case) => observer.on_case_switched(*case),
        PlaygroundEvent::SwitchedToSandbox => observer.on_switched_to_sandbox(),
        PlaygroundEvent::CorrectAnswer(transcript) => observer.on_correct_answer(transcript),
        PlaygroundEvent::WrongAnswer(transcript) => observer.on_wrong_answer(transcript),
        PlaygroundEvent::LevelUnloading => observer.on_level_unloading(),
        PlaygroundEvent::LevelChanged => observer.on_level_changed(),
        PlaygroundEvent::LevelCompleted => observer.on_level_completed(),
    }
}

/// Collects every event into a shared log. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    log: Rc<RefCell<Vec<PlaygroundEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PlaygroundEvent> {
        self.log.borrow().clone()
    }

    pub fn take(&self) -> Vec<PlaygroundEvent> {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    pub fn count(&self, predicate: impl Fn(&PlaygroundEvent) -> bool) -> usize {
        self.log.borrow().iter().filter(|event| predicate(event)).count()
    }
}

impl PlaygroundObserver for EventRecorder {
    fn on_event(&mut self, event: &PlaygroundEvent) {
        self.log.borrow_mut().push(event.clone());
    }
}

/// Logs every event at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PlaygroundObserver for TracingObserver {
    fn on_event(&mut self, event: &PlaygroundEvent) {
        debug!(event = ?event, "playground_event");
    }
}
