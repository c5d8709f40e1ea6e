use std::process::ExitCode;

use playground::{
    resolve_app_paths, run_headless, FeedbackCommand, GameCatalog, Interpreter,
    JsonFileProgressStore, LevelMode, LoopControl, LoopExit, MetricsHandle, Playground,
    PlaygroundError, TracingObserver,
};
use tracing::{debug, error, info, warn};

use super::bootstrap::AppWiring;
use super::ScriptedInterpreter;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let app_paths = match resolve_app_paths() {
        Ok(paths) => paths,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };
    info!(
        root = %app_paths.root.display(),
        assets_dir = %app_paths.assets_dir.display(),
        cache_dir = %app_paths.cache_dir.display(),
        "startup"
    );

    let catalog = match GameCatalog::load(&app_paths.game_definition_path()) {
        Ok(catalog) => catalog,
        Err(err) => {
            error!(error = %err, "game_definition_invalid");
            return ExitCode::FAILURE;
        }
    };
    let store = JsonFileProgressStore::new(app_paths.progress_file_path());
    let mut playground = match Playground::new(
        app.playground_config,
        ScriptedInterpreter::new(),
        catalog,
        Box::new(store),
    ) {
        Ok(playground) => playground,
        Err(err) => {
            error!(error = %err, "playground_init_failed");
            return ExitCode::FAILURE;
        }
    };
    playground.subscribe(Box::new(TracingObserver));

    let metrics_handle = MetricsHandle::default();
    let mut driver = LevelDriver::default();
    let report = match run_headless(
        &mut playground,
        &app.loop_config,
        &metrics_handle,
        |playground| driver.step(playground),
    ) {
        Ok(report) => report,
        Err(err) => {
            error!(error = %err, "loop_failed");
            return ExitCode::FAILURE;
        }
    };

    info!(
        exit = ?report.exit,
        ticks = report.ticks,
        elapsed_ms = report.elapsed.as_millis() as u64,
        levels_passed = driver.passed,
        levels_failed = driver.failed,
        unlocked_level = playground.unlocked_level(),
        "shutdown"
    );
    match report.exit {
        LoopExit::Completed => ExitCode::SUCCESS,
        LoopExit::DeadlineReached => ExitCode::FAILURE,
    }
}

/// Plays every active level once: start it, press run, wait until nothing
/// is in flight, then move on.
#[derive(Debug, Default)]
struct LevelDriver {
    next_level: usize,
    attempted: bool,
    passed: usize,
    failed: usize,
}

impl LevelDriver {
    fn step<I: Interpreter>(
        &mut self,
        playground: &mut Playground<I>,
    ) -> Result<LoopControl, PlaygroundError> {
        report_feedback(playground.drain_feedback());
        if playground.is_compiler_running() || playground.has_pending_work() {
            return Ok(LoopControl::Continue);
        }

        if self.attempted {
            self.record_outcome(playground);
        }
        if self.next_level >= playground.level_count() {
            return Ok(LoopControl::Exit);
        }

        playground.start_level(self.next_level)?;
        self.next_level += 1;
        self.attempted = match playground.run_code() {
            Ok(started) => started,
            Err(err) if err.is_run_scoped() => {
                warn!(error = %err, "run_failed");
                true
            }
            Err(err) => return Err(err),
        };
        Ok(LoopControl::Continue)
    }

    fn record_outcome<I: Interpreter>(&mut self, playground: &Playground<I>) {
        self.attempted = false;
        let level_id = playground.current_level_id().unwrap_or("-");
        let progress = playground.case_progress();
        let passed = playground.mode() == LevelMode::Sandbox || progress.all_cases_completed;
        if passed {
            self.passed += 1;
            info!(level_id, mode = ?playground.mode(), "level_passed");
        } else {
            self.failed += 1;
            warn!(
                level_id,
                case = progress.current_case,
                case_count = playground.case_count(),
                "level_failed"
            );
        }
    }
}

fn report_feedback(commands: Vec<FeedbackCommand>) {
    for command in commands {
        match command {
            FeedbackCommand::TaskDescription { header, body } if !header.is_empty() => {
                info!(header = %header, body = %body, "task_description");
            }
            FeedbackCommand::AnswerBubble { line, text } => {
                info!(line, text = %text, "answer_bubble");
            }
            FeedbackCommand::PositiveMessage(message) => {
                info!(text = %message, "positive_feedback");
            }
            FeedbackCommand::TaskError(message) => warn!(text = %message, "task_feedback"),
            FeedbackCommand::ErrorMarker { line, message } => {
                warn!(line = ?line, text = %message, "error_marker");
            }
            other => debug!(command = ?other, "feedback"),
        }
    }
}
