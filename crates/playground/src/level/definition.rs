use serde::{Deserialize, Serialize};

use crate::answer::AnswerExpectation;

/// Root of the bundled game content file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDefinition {
    pub game_id: String,
    #[serde(default)]
    pub active_levels: Vec<ActiveLevel>,
    #[serde(default)]
    pub scenes: Vec<SceneDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveLevel {
    pub scene_name: String,
    pub level_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDefinition {
    pub name: String,
    #[serde(default)]
    pub scene_settings: Option<SceneSettings>,
    #[serde(default)]
    pub levels: Vec<LevelDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSettings {
    /// Seconds; values `<= 0` leave the base step duration untouched.
    #[serde(default)]
    pub walker_step_time: f32,
    #[serde(default)]
    pub available_functions: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDefinition {
    pub id: String,
    #[serde(default)]
    pub guide_bubbles: Vec<GuideBubble>,
    #[serde(default)]
    pub level_settings: Option<LevelSettings>,
    #[serde(default)]
    pub sandbox: Option<Sandbox>,
    #[serde(default)]
    pub cases: Vec<CaseDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideBubble {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSettings {
    #[serde(default)]
    pub precode: String,
    #[serde(default)]
    pub start_code: String,
    #[serde(default)]
    pub example_solution_code: Option<String>,
    /// Values `<= 0` mean no limit is configured.
    #[serde(default)]
    pub row_limit: i32,
    #[serde(default)]
    pub task_description: Option<TaskDescription>,
    #[serde(default)]
    pub available_functions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescription {
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sandbox {
    #[serde(default)]
    pub sandbox_settings: Option<StepSettings>,
}

/// Per-case or sandbox overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSettings {
    #[serde(default)]
    pub precode: String,
    #[serde(default)]
    pub walker_step_time: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseDefinition {
    #[serde(default)]
    pub case_settings: Option<StepSettings>,
    #[serde(default)]
    pub expected_answer: Option<AnswerExpectation>,
}

/// Parses raw JSON, reporting the path of the offending field on failure.
pub fn parse_game_definition(raw: &str) -> Result<GameDefinition, String> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, GameDefinition>(&mut deserializer) {
        Ok(definition) => Ok(definition),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(format!("{source}"))
            } else {
                Err(format!("at {path}: {source}"))
            }
        }
    }
}
