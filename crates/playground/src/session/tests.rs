use std::collections::VecDeque;
use std::time::Duration;

use super::*;
use crate::answer::GradingError;
use crate::events::EventRecorder;
use crate::interpreter::InterpreterFault;
use crate::progress::MemoryProgressStore;

const TICK: Duration = Duration::from_millis(250);

const GAME: &str = r#"{
    "gameId": "session-test",
    "activeLevels": [
        { "sceneName": "s", "levelId": "single" },
        { "sceneName": "s", "levelId": "pair" },
        { "sceneName": "s", "levelId": "triple" },
        { "sceneName": "s", "levelId": "sandbox" },
        { "sceneName": "s", "levelId": "mixed" }
    ],
    "scenes": [{
        "name": "s",
        "levels": [
            {
                "id": "single",
                "levelSettings": { "precode": "x = 1", "startCode": "answer(42)" },
                "cases": [{ "expectedAnswer": { "type": "number", "values": [42] } }]
            },
            {
                "id": "pair",
                "cases": [
                    { "expectedAnswer": { "type": "number", "values": [42] } },
                    { "expectedAnswer": { "type": "number", "values": [7] } }
                ]
            },
            {
                "id": "triple",
                "cases": [
                    { "expectedAnswer": { "type": "number", "values": [1] } },
                    { "expectedAnswer": { "type": "number", "values": [2] } },
                    { "expectedAnswer": { "type": "number", "values": [3] } }
                ]
            },
            {
                "id": "sandbox",
                "sandbox": { "sandboxSettings": { "precode": "y = 2" } }
            },
            {
                "id": "mixed",
                "sandbox": {},
                "cases": [
                    { "expectedAnswer": { "type": "text", "values": ["hi"] } },
                    { "expectedAnswer": { "type": "boolean", "values": [true] } }
                ]
            }
        ]
    }]
}"#;

const SINGLE: usize = 0;
const PAIR: usize = 1;
const TRIPLE: usize = 2;
const SANDBOX: usize = 3;
const MIXED: usize = 4;

type Step = Result<StepOutcome, InterpreterFault>;

/// Plays one queued script per `load`; an exhausted script reports the end.
#[derive(Debug, Default)]
struct ScriptedFake {
    scripts: VecDeque<Vec<Step>>,
    current: VecDeque<Step>,
    loads: Vec<String>,
}

impl ScriptedFake {
    fn with_scripts(scripts: Vec<Vec<Step>>) -> Self {
        Self {
            scripts: scripts.into(),
            ..Self::default()
        }
    }
}

impl Interpreter for ScriptedFake {
    fn load(&mut self, code: &str) -> Result<(), InterpreterFault> {
        self.loads.push(code.to_owned());
        self.current = self.scripts.pop_front().unwrap_or_default().into();
        Ok(())
    }

    fn execute_one_unit(&mut self) -> Result<StepOutcome, InterpreterFault> {
        self.current.pop_front().unwrap_or(Ok(StepOutcome::ReachedEnd))
    }
}

fn advanced(line: usize) -> Step {
    Ok(StepOutcome::Advanced { line })
}

fn answer(line: usize, values: &[f64]) -> Step {
    Ok(StepOutcome::Answered {
        line,
        values: values.iter().copied().map(AnswerValue::from).collect(),
    })
}

fn test_config() -> PlaygroundConfig {
    PlaygroundConfig {
        base_step_duration: Duration::from_secs(1),
        initial_speed: 0.0,
        answer_delay: Duration::from_secs(1),
        success_delay: Duration::from_secs(1),
        case_flash_duration: Duration::from_secs(1),
        ..PlaygroundConfig::default()
    }
}

fn playground(scripts: Vec<Vec<Step>>) -> (Playground<ScriptedFake>, EventRecorder) {
    let catalog = GameCatalog::from_json_str(GAME).expect("catalog");
    let mut playground = Playground::new(
        test_config(),
        ScriptedFake::with_scripts(scripts),
        catalog,
        Box::new(MemoryProgressStore::new()),
    )
    .expect("playground");
    let recorder = EventRecorder::new();
    playground.subscribe(Box::new(recorder.clone()));
    (playground, recorder)
}

fn at_level(level: usize, scripts: Vec<Vec<Step>>) -> (Playground<ScriptedFake>, EventRecorder) {
    let (mut playground, recorder) = playground(scripts);
    playground.start_level(level).expect("start level");
    playground.drain_feedback();
    recorder.take();
    (playground, recorder)
}

fn advance(playground: &mut Playground<ScriptedFake>, total: Duration) {
    let mut elapsed = Duration::ZERO;
    while elapsed < total {
        playground.tick(TICK).expect("tick");
        elapsed += TICK;
    }
}

fn correct_answers(recorder: &EventRecorder) -> usize {
    recorder.count(|event| matches!(event, PlaygroundEvent::CorrectAnswer(_)))
}

fn verdicts(recorder: &EventRecorder) -> usize {
    recorder.count(|event| {
        matches!(
            event,
            PlaygroundEvent::CorrectAnswer(_) | PlaygroundEvent::WrongAnswer(_)
        )
    })
}

fn stops(recorder: &EventRecorder) -> Vec<StopReason> {
    recorder
        .events()
        .into_iter()
        .filter_map(|event| match event {
            PlaygroundEvent::CompilerStopped(reason) => Some(reason),
            _ => None,
        })
        .collect()
}

#[test]
fn single_case_correct_answer_completes_level() {
    let (mut playground, recorder) = at_level(SINGLE, vec![vec![advanced(1), answer(2, &[42.0])]]);

    assert!(playground.run_code().expect("run"));
    assert_eq!(playground.interpreter().loads, vec!["x = 1\nanswer(42)".to_owned()]);

    advance(&mut playground, Duration::from_millis(1250));
    assert!(playground.has_pending_work());
    assert!(playground
        .drain_feedback()
        .contains(&FeedbackCommand::AnswerBubble {
            line: 2,
            text: "Answer: 42.".to_owned()
        }));
    assert_eq!(verdicts(&recorder), 0);

    advance(&mut playground, Duration::from_secs(1));
    assert!(recorder
        .events()
        .contains(&PlaygroundEvent::CorrectAnswer("42.".to_owned())));
    assert_eq!(stops(&recorder), vec![StopReason::CodeForced]);
    assert!(playground
        .drain_feedback()
        .contains(&FeedbackCommand::PositiveMessage("Good job!".to_owned())));

    advance(&mut playground, Duration::from_secs(1));
    assert_eq!(
        playground.case_progress(),
        CaseProgress {
            current_case: 1,
            is_running_cases: false,
            all_cases_completed: true,
        }
    );
    assert_eq!(recorder.count(|event| *event == PlaygroundEvent::LevelCompleted), 1);
    assert_eq!(playground.case_button_states(), &[ButtonState::Completed]);
    assert_eq!(playground.unlocked_level(), 1);
    assert!(playground.progress().level("single").expect("record").completed);
}

#[test]
fn passing_first_case_auto_runs_the_second() {
    let (mut playground, recorder) = at_level(
        PAIR,
        vec![vec![answer(1, &[42.0])], vec![answer(1, &[7.0])]],
    );

    assert!(playground.run_code().expect("run"));
    assert!(!playground.is_compiler_running());

    // flash 1s, answer at 1.25s, verdict at 2.25s, success delay until 3.25s
    advance(&mut playground, Duration::from_millis(3250));
    assert_eq!(correct_answers(&recorder), 1);
    assert_eq!(playground.case_progress().current_case, 1);
    assert!(playground.case_progress().is_running_cases);
    assert_eq!(
        playground.case_button_states(),
        &[ButtonState::Completed, ButtonState::Active]
    );

    advance(&mut playground, Duration::from_secs(4));
    assert_eq!(correct_answers(&recorder), 2);
    assert_eq!(recorder.count(|event| *event == PlaygroundEvent::CompilerStarted), 2);
    assert!(playground.case_progress().all_cases_completed);
    assert_eq!(recorder.count(|event| *event == PlaygroundEvent::LevelCompleted), 1);
}

#[test]
fn three_cases_finish_past_the_last_index_once() {
    let (mut playground, recorder) = at_level(
        TRIPLE,
        vec![
            vec![answer(1, &[1.0])],
            vec![answer(1, &[2.0])],
            vec![answer(1, &[3.0])],
        ],
    );

    playground.run_code().expect("run");
    advance(&mut playground, Duration::from_secs(15));

    assert_eq!(
        playground.case_progress(),
        CaseProgress {
            current_case: 3,
            is_running_cases: false,
            all_cases_completed: true,
        }
    );
    assert_eq!(correct_answers(&recorder), 3);
    assert_eq!(recorder.count(|event| *event == PlaygroundEvent::LevelCompleted), 1);
    assert!(!playground.has_pending_work());
}

#[test]
fn user_stop_during_grade_delay_voids_the_verdict() {
    let (mut playground, recorder) = at_level(SINGLE, vec![vec![answer(1, &[42.0])]]);

    playground.run_code().expect("run");
    advance(&mut playground, Duration::from_millis(500));
    assert!(playground.has_pending_work());

    assert!(playground.stop_compiler_via_user());
    advance(&mut playground, Duration::from_secs(3));

    assert_eq!(verdicts(&recorder), 0);
    assert_eq!(stops(&recorder), vec![StopReason::UserForced]);
    assert_eq!(
        playground.case_progress(),
        CaseProgress {
            current_case: 0,
            is_running_cases: false,
            all_cases_completed: false,
        }
    );
    assert_eq!(recorder.count(|event| *event == PlaygroundEvent::LevelCompleted), 0);
    assert!(!playground.has_pending_work());
}

#[test]
fn user_stop_during_success_delay_resets_instead_of_advancing() {
    let (mut playground, recorder) = at_level(PAIR, vec![vec![answer(1, &[42.0])]]);

    playground.run_code().expect("run");
    advance(&mut playground, Duration::from_millis(2500));
    assert_eq!(correct_answers(&recorder), 1);
    assert!(!playground.is_compiler_running());

    assert!(!playground.stop_compiler_via_user());
    advance(&mut playground, Duration::from_secs(3));

    assert_eq!(playground.case_progress().current_case, 0);
    assert!(!playground.case_progress().is_running_cases);
    assert_eq!(recorder.count(|event| *event == PlaygroundEvent::CompilerStarted), 1);
}

#[test]
fn wrong_arity_fails_immediately_without_touching_progress() {
    let (mut playground, recorder) = at_level(SINGLE, vec![vec![answer(1, &[1.0, 2.0])]]);

    playground.run_code().expect("run");
    let before = playground.case_progress();

    let err = playground.tick(TICK).expect_err("arity error");
    assert!(matches!(
        err,
        PlaygroundError::Grading(GradingError::TooManyAnswers {
            expected: 1,
            got: 2
        })
    ));
    assert_eq!(playground.case_progress(), before);
    assert_eq!(stops(&recorder), vec![StopReason::RuntimeError]);
    assert!(!playground.has_pending_work());

    advance(&mut playground, Duration::from_secs(3));
    assert_eq!(verdicts(&recorder), 0);
}

#[test]
fn starting_while_running_is_a_no_op() {
    let (mut playground, recorder) = at_level(SINGLE, vec![vec![advanced(1), advanced(2)]]);

    assert!(playground.run_code().expect("first run"));
    playground.tick(TICK).expect("tick");
    let progress = playground.case_progress();

    assert!(!playground.run_code().expect("second run"));
    assert!(!playground.run_case(0).expect("run case"));
    assert_eq!(playground.case_progress(), progress);
    assert_eq!(recorder.count(|event| *event == PlaygroundEvent::CompilerStarted), 1);
    assert_eq!(playground.interpreter().loads.len(), 1);
}

#[test]
fn wrong_answer_fails_the_case_and_allows_retry() {
    let (mut playground, recorder) = at_level(
        SINGLE,
        vec![vec![answer(1, &[41.0])], vec![answer(1, &[42.0])]],
    );

    playground.run_code().expect("run");
    advance(&mut playground, Duration::from_millis(1250));

    assert!(recorder
        .events()
        .contains(&PlaygroundEvent::WrongAnswer("41.".to_owned())));
    assert_eq!(stops(&recorder), vec![StopReason::TaskError]);
    assert_eq!(playground.case_button_states(), &[ButtonState::Failed]);
    assert_eq!(playground.case_progress().current_case, 0);
    assert!(!playground.case_progress().is_running_cases);

    assert!(playground.run_case(0).expect("retry"));
    advance(&mut playground, Duration::from_secs(3));
    assert_eq!(correct_answers(&recorder), 1);
    assert!(playground.case_progress().all_cases_completed);
}

#[test]
fn finishing_without_an_answer_raises_a_task_error() {
    let (mut playground, recorder) = at_level(SINGLE, vec![vec![advanced(1)]]);

    playground.run_code().expect("run");
    advance(&mut playground, Duration::from_millis(1250));

    let err = playground.tick(TICK).expect_err("task error");
    assert!(matches!(
        err,
        PlaygroundError::Task { ref message } if message == NO_ANSWER_MESSAGE
    ));
    assert!(!playground.is_compiler_running());
    assert_eq!(stops(&recorder), vec![StopReason::Finished]);
    assert!(playground
        .drain_feedback()
        .contains(&FeedbackCommand::TaskError(NO_ANSWER_MESSAGE.to_owned())));
    assert_eq!(playground.case_button_states(), &[ButtonState::Failed]);
    assert!(!playground.case_progress().is_running_cases);
}

#[test]
fn runtime_fault_stops_the_run_and_marks_the_line() {
    let fault = InterpreterFault::at_line(3, "name 'z' is not defined");
    let (mut playground, recorder) = at_level(SINGLE, vec![vec![Err(fault.clone())]]);

    playground.run_code().expect("run");
    let before = playground.case_progress();
    let err = playground.tick(TICK).expect_err("runtime error");

    assert!(matches!(err, PlaygroundError::Runtime(ref inner) if *inner == fault));
    assert_eq!(stops(&recorder), vec![StopReason::RuntimeError]);
    assert_eq!(playground.case_progress(), before);
    assert!(playground
        .drain_feedback()
        .contains(&FeedbackCommand::ErrorMarker {
            line: Some(3),
            message: "name 'z' is not defined".to_owned()
        }));
}

#[test]
fn user_pause_freezes_the_step_cooldown() {
    let (mut playground, recorder) = at_level(
        SINGLE,
        vec![vec![advanced(1), advanced(2), advanced(3)]],
    );

    playground.run_code().expect("run");
    playground.tick(TICK).expect("tick");
    assert_eq!(playground.total_steps(), 1);

    assert!(playground.toggle_run().expect("pause"));
    assert_eq!(playground.run_state(), RunState::UserPaused);
    assert!(!playground.set_user_paused(true));
    advance(&mut playground, Duration::from_secs(5));
    assert_eq!(playground.total_steps(), 1);

    assert!(playground.set_user_paused(false));
    advance(&mut playground, Duration::from_secs(1));
    assert_eq!(playground.total_steps(), 2);
    assert_eq!(recorder.count(|event| *event == PlaygroundEvent::UserPaused), 1);
    assert_eq!(recorder.count(|event| *event == PlaygroundEvent::UserUnpaused), 1);
}

#[test]
fn speed_change_mid_wait_uses_the_new_interval() {
    let (mut playground, recorder) = at_level(
        SINGLE,
        vec![vec![advanced(1), advanced(2), advanced(3)]],
    );

    playground.run_code().expect("run");
    playground.tick(TICK).expect("tick");

    assert!(playground.set_speed(0.5));
    assert!(!playground.set_speed(0.5));
    assert_eq!(playground.step_interval(), Duration::from_millis(500));

    playground.tick(TICK).expect("tick");
    playground.tick(TICK).expect("tick");
    assert_eq!(playground.total_steps(), 2);
    assert_eq!(
        recorder.count(|event| *event == PlaygroundEvent::SpeedChanged(0.5)),
        1
    );
}

#[test]
fn sandbox_answers_are_shown_but_not_graded() {
    let (mut playground, recorder) = at_level(
        SANDBOX,
        vec![vec![answer(1, &[5.0]), advanced(2)]],
    );
    assert_eq!(playground.mode(), LevelMode::Sandbox);
    assert_eq!(playground.case_count(), 0);

    playground.run_code().expect("run");
    assert_eq!(playground.interpreter().loads, vec!["y = 2\n".to_owned()]);
    playground.tick(TICK).expect("tick");
    assert!(playground
        .drain_feedback()
        .contains(&FeedbackCommand::AnswerBubble {
            line: 1,
            text: "Answer: 5.".to_owned()
        }));

    advance(&mut playground, Duration::from_secs(5));
    assert_eq!(playground.total_steps(), 2);
    assert_eq!(verdicts(&recorder), 0);
    assert_eq!(stops(&recorder), vec![StopReason::Finished]);
    assert!(!playground
        .drain_feedback()
        .iter()
        .any(|command| matches!(command, FeedbackCommand::TaskError(_))));
}

#[test]
fn submitting_while_idle_is_rejected() {
    let (mut playground, _recorder) = at_level(SINGLE, Vec::new());

    let err = playground
        .submit_answer(vec![AnswerValue::from(42)])
        .expect_err("idle submission");
    assert!(matches!(err, PlaygroundError::Range(RangeError::NoActiveRun)));
}

#[test]
fn case_switching_between_sandbox_and_cases() {
    let (mut playground, recorder) = at_level(MIXED, vec![vec![advanced(1)]]);
    assert_eq!(playground.mode(), LevelMode::Sandbox);

    assert!(playground.switch_case(1).expect("switch"));
    assert_eq!(playground.mode(), LevelMode::Case);
    assert_eq!(playground.case_progress().current_case, 1);
    assert!(recorder.events().contains(&PlaygroundEvent::CaseSwitched(1)));
    assert!(matches!(
        playground.switch_case(2),
        Err(PlaygroundError::Range(RangeError::CaseIndexOutOfRange { index: 2, count: 2 }))
    ));

    playground.run_case(1).expect("run case");
    advance(&mut playground, Duration::from_millis(1250));
    assert!(playground.is_compiler_running());
    assert!(!playground.switch_case(0).expect("refused while running"));
    assert!(!playground.switch_to_sandbox().expect("refused while running"));

    playground.stop_compiler_via_user();
    assert!(playground.switch_to_sandbox().expect("sandbox"));
    assert_eq!(playground.mode(), LevelMode::Sandbox);
    assert_eq!(
        recorder.count(|event| *event == PlaygroundEvent::SwitchedToSandbox),
        1
    );
}

#[test]
fn level_navigation_restores_saved_code() {
    let (mut playground, recorder) = playground(Vec::new());
    assert!(matches!(
        playground.run_code(),
        Err(PlaygroundError::Range(RangeError::NoLevelLoaded))
    ));

    playground.start_game().expect("start game");
    assert_eq!(playground.current_level_id(), Some("single"));
    assert_eq!(playground.main_code(), "answer(42)");
    assert!(playground.progress().level("single").expect("record").is_started);

    playground.set_main_code("answer(6 * 7)");
    playground.start_level(PAIR).expect("pair");
    assert_eq!(playground.main_code(), "");
    playground.start_level(SINGLE).expect("single again");
    assert_eq!(playground.main_code(), "answer(6 * 7)");

    assert_eq!(recorder.count(|event| *event == PlaygroundEvent::LevelChanged), 3);
    assert_eq!(
        recorder.count(|event| *event == PlaygroundEvent::LevelUnloading),
        3
    );
    assert!(matches!(
        playground.start_level(9),
        Err(PlaygroundError::Range(RangeError::LevelIndexOutOfRange { index: 9, count: 5 }))
    ));
}

#[test]
fn level_change_stops_a_running_program() {
    let (mut playground, recorder) = at_level(SINGLE, vec![vec![answer(1, &[42.0])]]);

    playground.run_code().expect("run");
    playground.tick(TICK).expect("tick");
    assert!(playground.has_pending_work());

    playground.start_level(PAIR).expect("pair");
    advance(&mut playground, Duration::from_secs(3));

    assert_eq!(stops(&recorder), vec![StopReason::CodeForced]);
    assert_eq!(verdicts(&recorder), 0);
    assert!(!playground.has_pending_work());
    assert_eq!(playground.case_progress().current_case, 0);
}

#[test]
fn unlocked_level_and_row_limit_are_range_checked() {
    let (mut playground, _recorder) = at_level(SINGLE, Vec::new());

    assert_eq!(
        playground.set_unlocked_level(5),
        Err(RangeError::UnlockedLevelOutOfRange { index: 5, count: 5 })
    );
    playground.set_unlocked_level(3).expect("unlock");
    assert_eq!(playground.unlocked_level(), 3);

    assert_eq!(
        playground.set_row_limit(0),
        Err(RangeError::NonPositiveRowLimit(0))
    );
    playground.set_row_limit(12).expect("row limit");
    assert_eq!(playground.row_limit(), Some(12));
}

#[test]
fn unsubscribed_observer_stops_receiving_events() {
    let (mut playground, _recorder) = at_level(SINGLE, Vec::new());
    let late = EventRecorder::new();
    let id = playground.subscribe(Box::new(late.clone()));

    playground.set_speed(0.25);
    assert!(playground.unsubscribe(id));
    playground.set_speed(0.75);

    assert_eq!(late.events(), vec![PlaygroundEvent::SpeedChanged(0.25)]);
}

#[test]
fn restart_after_stop_is_graded_despite_the_voided_verdict() {
    let (mut playground, recorder) = at_level(
        SINGLE,
        vec![vec![answer(1, &[42.0])], vec![answer(1, &[42.0])]],
    );

    playground.run_code().expect("run");
    advance(&mut playground, Duration::from_millis(500));
    assert!(playground.stop_compiler_via_user());
    assert!(!playground.has_pending_work());

    // The restarted run answers before the voided verdict would have come due.
    assert!(playground.run_code().expect("restart"));
    advance(&mut playground, Duration::from_millis(500));
    assert!(playground.has_pending_work());

    advance(&mut playground, Duration::from_secs(10));
    assert_eq!(verdicts(&recorder), 1);
    assert_eq!(correct_answers(&recorder), 1);
    assert!(!playground.is_compiler_running());
    assert!(playground.case_progress().all_cases_completed);
    assert_eq!(recorder.count(|event| *event == PlaygroundEvent::LevelCompleted), 1);
}

#[test]
fn restart_after_stop_in_success_delay_keeps_running_cases() {
    let (mut playground, recorder) = at_level(
        PAIR,
        vec![
            vec![answer(1, &[42.0])],
            vec![answer(1, &[42.0])],
            vec![answer(1, &[7.0])],
        ],
    );

    playground.run_code().expect("run");
    advance(&mut playground, Duration::from_millis(2500));
    assert_eq!(correct_answers(&recorder), 1);
    assert!(!playground.stop_compiler_via_user());
    assert!(playground.run_code().expect("restart"));

    // Past the deadline of the voided success delay.
    advance(&mut playground, Duration::from_millis(750));
    assert!(playground.case_progress().is_running_cases);
    assert_eq!(playground.case_progress().current_case, 0);
    assert_eq!(
        playground.case_button_states(),
        &[ButtonState::Active, ButtonState::Default]
    );

    advance(&mut playground, Duration::from_secs(7));
    assert_eq!(correct_answers(&recorder), 3);
    assert!(playground.case_progress().all_cases_completed);
    assert_eq!(recorder.count(|event| *event == PlaygroundEvent::LevelCompleted), 1);
}

#[test]
fn repeated_case_completion_advances_one_case() {
    let (mut playground, _recorder) = at_level(TRIPLE, Vec::new());

    playground.set_case_completed().expect("complete");
    playground.set_case_completed().expect("ignored while pending");
    advance(&mut playground, Duration::from_millis(1250));

    assert_eq!(playground.case_progress().current_case, 1);
    assert_eq!(
        &playground.case_button_states()[..2],
        &[ButtonState::Completed, ButtonState::Active]
    );
    assert_ne!(playground.case_button_states()[2], ButtonState::Completed);
}

#[test]
fn voided_case_completion_can_be_repeated() {
    let (mut playground, _recorder) = at_level(TRIPLE, Vec::new());

    playground.set_case_completed().expect("complete");
    playground.stop_compiler_via_user();
    assert!(!playground.has_pending_work());
    advance(&mut playground, Duration::from_millis(1250));
    assert_eq!(playground.case_progress().current_case, 0);

    playground.set_case_completed().expect("complete again");
    advance(&mut playground, Duration::from_millis(1250));
    assert_eq!(playground.case_progress().current_case, 1);
}
