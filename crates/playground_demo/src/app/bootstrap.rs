use std::env;
use std::time::Duration;

use playground::{LoopConfig, LoopPacing, PlaygroundConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SPEED_ENV_VAR: &str = "PLAYGROUND_SPEED";
const PACING_ENV_VAR: &str = "PLAYGROUND_PACING";
const DEMO_DEADLINE: Duration = Duration::from_secs(300);

pub(crate) struct AppWiring {
    pub(crate) loop_config: LoopConfig,
    pub(crate) playground_config: PlaygroundConfig,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== Playground Startup ===");

    let mut playground_config = PlaygroundConfig::default();
    if let Some(speed) = read_env(SPEED_ENV_VAR, parse_speed) {
        playground_config.initial_speed = speed;
    }
    let pacing = read_env(PACING_ENV_VAR, parse_pacing).unwrap_or(LoopPacing::RealTime);

    AppWiring {
        loop_config: LoopConfig {
            deadline: Some(DEMO_DEADLINE),
            pacing,
            ..LoopConfig::default()
        },
        playground_config,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn read_env<T>(var: &'static str, parse: fn(&str) -> Option<T>) -> Option<T> {
    match env::var(var) {
        Ok(value) => {
            let parsed = parse(value.trim());
            if parsed.is_none() {
                warn!(
                    env_var = var,
                    value = value.as_str(),
                    "invalid env var value; falling back to default"
                );
            }
            parsed
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(
                env_var = var,
                error = %err,
                "unable to read env var; falling back to default"
            );
            None
        }
    }
}

fn parse_speed(raw: &str) -> Option<f32> {
    raw.parse::<f32>()
        .ok()
        .filter(|speed| (0.0..=1.0).contains(speed))
}

fn parse_pacing(raw: &str) -> Option<LoopPacing> {
    match raw.to_ascii_lowercase().as_str() {
        "realtime" | "real-time" => Some(LoopPacing::RealTime),
        "simulated" => Some(LoopPacing::Simulated),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_must_lie_in_unit_range() {
        assert_eq!(parse_speed("0.75"), Some(0.75));
        assert_eq!(parse_speed("1"), Some(1.0));
        assert_eq!(parse_speed("1.5"), None);
        assert_eq!(parse_speed("fast"), None);
    }

    #[test]
    fn pacing_names_are_case_insensitive() {
        assert_eq!(parse_pacing("Simulated"), Some(LoopPacing::Simulated));
        assert_eq!(parse_pacing("realtime"), Some(LoopPacing::RealTime));
        assert_eq!(parse_pacing("turbo"), None);
    }
}
