use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::atomic_io::write_text_atomic;

pub const PROGRESS_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    #[serde(default)]
    pub is_started: bool,
    #[serde(default)]
    pub main_code: String,
    #[serde(default)]
    pub current_case: usize,
    #[serde(default)]
    pub completed: bool,
}

/// Per-user progress for one game, keyed by level id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameProgress {
    pub version: u32,
    pub game_id: String,
    #[serde(default)]
    pub unlocked_level: usize,
    #[serde(default)]
    pub levels: BTreeMap<String, LevelProgress>,
}

impl GameProgress {
    pub fn new(game_id: impl Into<String>) -> Self {
        Self {
            version: PROGRESS_VERSION,
            game_id: game_id.into(),
            unlocked_level: 0,
            levels: BTreeMap::new(),
        }
    }

    pub fn level(&self, level_id: &str) -> Option<&LevelProgress> {
        self.levels.get(level_id)
    }

    pub fn level_mut(&mut self, level_id: &str) -> &mut LevelProgress {
        self.levels.entry(level_id.to_owned()).or_default()
    }
}

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("failed to read progress file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse progress file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("failed to encode progress")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write progress file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("progress file version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },
}

/// Key-value persistence boundary for user progress.
pub trait ProgressStore {
    fn load(&mut self, game_id: &str) -> Result<GameProgress, ProgressError>;

    fn save(&mut self, progress: &GameProgress) -> Result<(), ProgressError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryProgressStore {
    saved: Option<GameProgress>,
    save_count: usize,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(progress: GameProgress) -> Self {
        Self {
            saved: Some(progress),
            save_count: 0,
        }
    }

    pub fn saved(&self) -> Option<&GameProgress> {
        self.saved.as_ref()
    }

    pub fn save_count(&self) -> usize {
        self.save_count
    }
}

impl ProgressStore for MemoryProgressStore {
    fn load(&mut self, game_id: &str) -> Result<GameProgress, ProgressError> {
        Ok(self
            .saved
            .as_ref()
            .filter(|progress| progress.game_id == game_id)
            .cloned()
            .unwrap_or_else(|| GameProgress::new(game_id)))
    }

    fn save(&mut self, progress: &GameProgress) -> Result<(), ProgressError> {
        self.saved = Some(progress.clone());
        self.save_count += 1;
        Ok(())
    }
}

/// Pretty JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileProgressStore {
    path: PathBuf,
}

impl JsonFileProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, raw: &str) -> Result<GameProgress, ProgressError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize::<_, GameProgress>(&mut deserializer).map_err(|error| {
            let at = error.path().to_string();
            let source = error.into_inner();
            let message = if at.is_empty() || at == "." {
                source.to_string()
            } else {
                format!("at {at}: {source}")
            };
            ProgressError::Parse {
                path: self.path.clone(),
                message,
            }
        })
    }
}

impl ProgressStore for JsonFileProgressStore {
    fn load(&mut self, game_id: &str) -> Result<GameProgress, ProgressError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "progress_file_missing");
                return Ok(GameProgress::new(game_id));
            }
            Err(source) => {
                return Err(ProgressError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let progress = self.parse(&raw)?;
        if progress.version != PROGRESS_VERSION {
            return Err(ProgressError::VersionMismatch {
                expected: PROGRESS_VERSION,
                actual: progress.version,
            });
        }
        if progress.game_id != game_id {
            warn!(
                path = %self.path.display(),
                stored_game_id = %progress.game_id,
                game_id,
                "progress_game_mismatch"
            );
            return Ok(GameProgress::new(game_id));
        }

        info!(
            path = %self.path.display(),
            level_count = progress.levels.len(),
            unlocked_level = progress.unlocked_level,
            "progress_loaded"
        );
        Ok(progress)
    }

    fn save(&mut self, progress: &GameProgress) -> Result<(), ProgressError> {
        let json = serde_json::to_string_pretty(progress).map_err(ProgressError::Encode)?;
        write_text_atomic(&self.path, &json).map_err(|source| ProgressError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "progress_saved");
        Ok(())
    }
}
