use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod answer;
pub mod app;
mod atomic_io;
pub mod cases;
pub mod compiler;
pub mod deferred;
pub mod error;
pub mod events;
pub mod feedback;
pub mod interpreter;
pub mod level;
pub mod progress;
pub mod session;
pub mod speed;
pub mod walker;

pub use answer::{
    grade, transcript, AnswerExpectation, AnswerGrader, AnswerKind, AnswerValue, GradingError,
    PendingGrade, Verdict,
};
pub use app::{
    run_headless, LoopConfig, LoopControl, LoopExit, LoopMetricsSnapshot, LoopPacing, LoopReport,
    MetricsHandle,
};
pub use cases::{
    Advance, ButtonState, CaseHandler, CasePhase, CaseProgress, LevelMode, RunDirective,
};
pub use compiler::{Compiler, RunState, StopReason};
pub use deferred::DeferredQueue;
pub use error::{PlaygroundError, RangeError};
pub use events::{
    EventBus, EventRecorder, PlaygroundEvent, PlaygroundObserver, SubscriptionId, TracingObserver,
};
pub use feedback::{Feedback, FeedbackCommand};
pub use interpreter::{Interpreter, InterpreterFault, StepOutcome};
pub use level::{ConfigurationError, GameCatalog, GameDefinition, LevelEntry, ResolvedSettings};
pub use progress::{
    GameProgress, JsonFileProgressStore, LevelProgress, MemoryProgressStore, ProgressError,
    ProgressStore,
};
pub use session::{Playground, PlaygroundConfig, Submission, NO_ANSWER_MESSAGE};
pub use speed::{scale_by_speed, SpeedController, DEFAULT_SPEED};
pub use walker::{Walker, WalkerReport, DEFAULT_BASE_STEP_DURATION};

pub const ROOT_ENV_VAR: &str = "PLAYGROUND_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl AppPaths {
    pub fn game_definition_path(&self) -> PathBuf {
        self.assets_dir.join("game.json")
    }

    pub fn progress_file_path(&self) -> PathBuf {
        self.cache_dir.join("progress.json")
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create cache directory at {path}: {source}")]
    CreateCacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "PLAYGROUND_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/playground\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

/// Locates the data root and makes sure its cache directory exists.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    app_paths_at(root)
}

fn app_paths_at(root: PathBuf) -> Result<AppPaths, StartupError> {
    let assets_dir = root.join("assets");
    let cache_dir = root.join("cache");

    fs::create_dir_all(&cache_dir).map_err(|source| StartupError::CreateCacheDir {
        path: cache_dir.clone(),
        source,
    })?;

    Ok(AppPaths {
        root,
        assets_dir,
        cache_dir,
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(Path::new(&value));
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            exe_dir
                .ancestors()
                .find(|candidate| is_repo_marker(candidate))
                .map(normalize_path)
                .ok_or_else(|| StartupError::RootNotFound {
                    start_dir: normalize_path(&exe_dir),
                    env_var: ROOT_ENV_VAR,
                })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
