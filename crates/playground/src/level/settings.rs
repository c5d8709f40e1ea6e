use std::time::Duration;

use crate::cases::LevelMode;
use crate::error::{PlaygroundError, RangeError};

use super::catalog::{ConfigurationError, LevelEntry};
use super::definition::{StepSettings, TaskDescription};

/// Effective settings for the active level, mode and case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSettings {
    pub precode: String,
    pub start_code: String,
    /// `None` restores the configured default base step duration.
    pub step_duration: Option<Duration>,
    pub task_description: Option<TaskDescription>,
    pub row_limit: Option<u32>,
    pub available_functions: Vec<String>,
}

impl ResolvedSettings {
    /// Program handed to the interpreter: precode, a newline, then the main code.
    pub fn full_code(&self, main_code: &str) -> String {
        if self.precode.is_empty() {
            main_code.to_owned()
        } else {
            format!("{}\n{}", self.precode, main_code)
        }
    }
}

/// Applies scene, then level, then case or sandbox settings. Later non-empty
/// precode and positive step times win.
pub fn resolve_settings(
    entry: &LevelEntry<'_>,
    mode: LevelMode,
    case: usize,
) -> Result<ResolvedSettings, PlaygroundError> {
    let mut resolved = ResolvedSettings::default();

    if let Some(scene) = &entry.scene().scene_settings {
        resolved.step_duration = step_time(scene.walker_step_time)?;
        if let Some(functions) = &scene.available_functions {
            resolved.available_functions = functions.clone();
        }
    }

    if let Some(level) = &entry.definition().level_settings {
        if !level.precode.is_empty() {
            resolved.precode = level.precode.clone();
        }
        resolved.start_code = level.start_code.clone();
        resolved.task_description = level.task_description.clone();
        if level.row_limit > 0 {
            resolved.row_limit = u32::try_from(level.row_limit).ok();
        }
        if let Some(functions) = &level.available_functions {
            resolved.available_functions.extend(functions.iter().cloned());
        }
    }

    let overrides = match mode {
        LevelMode::Sandbox => entry
            .definition()
            .sandbox
            .as_ref()
            .and_then(|sandbox| sandbox.sandbox_settings.as_ref()),
        LevelMode::Case if entry.definition().cases.is_empty() => None,
        LevelMode::Case => {
            let definition = entry.case(case).ok_or_else(|| ConfigurationError::CaseOutOfRange {
                level_id: entry.id().to_owned(),
                case,
                case_count: entry.definition().cases.len(),
            })?;
            definition.case_settings.as_ref()
        }
    };
    if let Some(overrides) = overrides {
        apply_step_settings(&mut resolved, overrides)?;
    }

    Ok(resolved)
}

fn apply_step_settings(
    resolved: &mut ResolvedSettings,
    settings: &StepSettings,
) -> Result<(), RangeError> {
    if !settings.precode.is_empty() {
        resolved.precode = settings.precode.clone();
    }
    if let Some(duration) = step_time(settings.walker_step_time)? {
        resolved.step_duration = Some(duration);
    }
    Ok(())
}

fn step_time(seconds: f32) -> Result<Option<Duration>, RangeError> {
    if seconds.is_nan() {
        return Err(RangeError::InvalidStepDuration(seconds));
    }
    if seconds <= 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f32(seconds)
        .map(Some)
        .map_err(|_| RangeError::InvalidStepDuration(seconds))
}
