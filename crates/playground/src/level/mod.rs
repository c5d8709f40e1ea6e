mod catalog;
mod definition;
mod settings;

pub use catalog::{ConfigurationError, GameCatalog, LevelEntry};
pub use definition::{
    parse_game_definition, ActiveLevel, CaseDefinition, GameDefinition, GuideBubble,
    LevelDefinition, LevelSettings, Sandbox, SceneDefinition, SceneSettings, StepSettings,
    TaskDescription,
};
pub use settings::{resolve_settings, ResolvedSettings};
