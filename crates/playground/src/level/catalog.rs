use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::answer::AnswerExpectation;
use crate::error::RangeError;

use super::definition::{
    parse_game_definition, CaseDefinition, GameDefinition, LevelDefinition, SceneDefinition,
};

/// Malformed content. Raised while loading, never retried.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to read game definition {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse game definition {path}: {message}")]
    Parse { path: String, message: String },
    #[error("game definition has no active levels")]
    NoActiveLevels,
    #[error("there is more than one scene named '{0}'")]
    DuplicateScene(String),
    #[error("there is no scene named '{0}'")]
    UnknownScene(String),
    #[error("scene '{scene}' has more than one level with id '{level_id}'")]
    DuplicateLevel { scene: String, level_id: String },
    #[error("scene '{scene}' has no level with id '{level_id}'")]
    UnknownLevel { scene: String, level_id: String },
    #[error("guide bubble {index} of level '{level_id}' is missing its target or text")]
    InvalidGuideBubble { level_id: String, index: usize },
    #[error("level '{level_id}' has no case {case} (case count {case_count})")]
    CaseOutOfRange {
        level_id: String,
        case: usize,
        case_count: usize,
    },
}

/// Validated game content: every active level resolves to exactly one
/// scene and one level definition.
#[derive(Debug, Clone)]
pub struct GameCatalog {
    definition: GameDefinition,
    active: Vec<(usize, usize)>,
}

impl GameCatalog {
    pub fn from_definition(definition: GameDefinition) -> Result<Self, ConfigurationError> {
        if definition.active_levels.is_empty() {
            return Err(ConfigurationError::NoActiveLevels);
        }

        let mut active = Vec::with_capacity(definition.active_levels.len());
        for entry in &definition.active_levels {
            let scene_index = find_unique_scene(&definition.scenes, &entry.scene_name)?;
            let scene = &definition.scenes[scene_index];
            let level_index = find_unique_level(scene, &entry.level_id)?;
            validate_guides(&scene.levels[level_index])?;
            active.push((scene_index, level_index));
        }

        info!(
            game_id = %definition.game_id,
            level_count = active.len(),
            scene_count = definition.scenes.len(),
            "game_catalog_loaded"
        );
        Ok(Self { definition, active })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigurationError> {
        Self::parse_labeled(raw, "<inline>")
    }

    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigurationError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_labeled(&raw, &path.display().to_string())
    }

    fn parse_labeled(raw: &str, label: &str) -> Result<Self, ConfigurationError> {
        let definition =
            parse_game_definition(raw).map_err(|message| ConfigurationError::Parse {
                path: label.to_owned(),
                message,
            })?;
        Self::from_definition(definition)
    }

    pub fn game_id(&self) -> &str {
        &self.definition.game_id
    }

    pub fn level_count(&self) -> usize {
        self.active.len()
    }

    pub fn level(&self, index: usize) -> Result<LevelEntry<'_>, RangeError> {
        let (scene_index, level_index) =
            self.active
                .get(index)
                .copied()
                .ok_or(RangeError::LevelIndexOutOfRange {
                    index,
                    count: self.active.len(),
                })?;
        let scene = &self.definition.scenes[scene_index];
        Ok(LevelEntry {
            index,
            scene,
            level: &scene.levels[level_index],
        })
    }
}

fn find_unique_scene(scenes: &[SceneDefinition], name: &str) -> Result<usize, ConfigurationError> {
    let mut matches = scenes
        .iter()
        .enumerate()
        .filter(|(_, scene)| scene.name == name)
        .map(|(index, _)| index);
    let first = matches
        .next()
        .ok_or_else(|| ConfigurationError::UnknownScene(name.to_owned()))?;
    if matches.next().is_some() {
        return Err(ConfigurationError::DuplicateScene(name.to_owned()));
    }
    Ok(first)
}

fn find_unique_level(scene: &SceneDefinition, level_id: &str) -> Result<usize, ConfigurationError> {
    let mut matches = scene
        .levels
        .iter()
        .enumerate()
        .filter(|(_, level)| level.id == level_id)
        .map(|(index, _)| index);
    let first = matches
        .next()
        .ok_or_else(|| ConfigurationError::UnknownLevel {
            scene: scene.name.clone(),
            level_id: level_id.to_owned(),
        })?;
    if matches.next().is_some() {
        return Err(ConfigurationError::DuplicateLevel {
            scene: scene.name.clone(),
            level_id: level_id.to_owned(),
        });
    }
    Ok(first)
}

fn validate_guides(level: &LevelDefinition) -> Result<(), ConfigurationError> {
    for (index, bubble) in level.guide_bubbles.iter().enumerate() {
        if bubble.target.is_none() || bubble.text.is_empty() {
            return Err(ConfigurationError::InvalidGuideBubble {
                level_id: level.id.clone(),
                index,
            });
        }
    }
    Ok(())
}

/// One active level, borrowed from the catalog.
#[derive(Debug, Clone, Copy)]
pub struct LevelEntry<'a> {
    index: usize,
    scene: &'a SceneDefinition,
    level: &'a LevelDefinition,
}

impl<'a> LevelEntry<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> &'a str {
        &self.level.id
    }

    pub fn scene(&self) -> &'a SceneDefinition {
        self.scene
    }

    pub fn definition(&self) -> &'a LevelDefinition {
        self.level
    }

    pub fn has_sandbox(&self) -> bool {
        self.level.sandbox.is_some()
    }

    /// Graded case count. A level with neither cases nor a sandbox still has
    /// one implicit case.
    pub fn case_count(&self) -> usize {
        match (self.level.cases.len(), self.has_sandbox()) {
            (0, false) => 1,
            (count, _) => count,
        }
    }

    pub fn case(&self, case: usize) -> Option<&'a CaseDefinition> {
        self.level.cases.get(case)
    }

    pub fn case_answer(&self, case: usize) -> Option<&'a AnswerExpectation> {
        self.case(case)?.expected_answer.as_ref()
    }

    pub fn start_code(&self) -> &'a str {
        self.level
            .level_settings
            .as_ref()
            .map_or("", |settings| settings.start_code.as_str())
    }
}
