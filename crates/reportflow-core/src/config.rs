use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::ReportError;

const DEFAULT_CONFIG_PATH: &str = "reportflow.toml";
const CONFIG_PATH_ENV: &str = "REPORTFLOW_CONFIG";

/// Hard cap on planned sections ("fewer than 3").
pub const MAX_PLAN_SECTIONS: usize = 2;

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub planner: PlannerConfig,
    pub workers: WorkerConfig,
    pub aggregation: AggregationConfig,
    pub logging: LoggingConfig,
    pub trace: TraceConfig,
}

/// Helper to load configuration from disk.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument.
    /// 2. `REPORTFLOW_CONFIG` environment variable.
    /// 3. `reportflow.toml` in the current working directory, falling back to
    ///    built-in defaults when that file does not exist.
    pub fn load(path: Option<PathBuf>) -> Result<Config, ReportError> {
        let (candidate, required) = resolve_path(path);
        if !required && !candidate.exists() {
            return Ok(Config::default());
        }

        let raw = fs::read_to_string(&candidate)
            .map_err(|err| ReportError::config_io(candidate.clone(), err))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Config, ReportError> {
        let config: Config = toml::from_str(raw)
            .map_err(|err| ReportError::InvalidConfiguration(err.to_string()))?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &Config) -> Result<(), ReportError> {
        let max = config.planner.max_sections;
        if max == 0 || max > MAX_PLAN_SECTIONS {
            return Err(ReportError::InvalidConfiguration(format!(
                "planner.max_sections must be between 1 and {MAX_PLAN_SECTIONS}, got {max}"
            )));
        }
        if config.aggregation.default_tone.trim().is_empty() {
            return Err(ReportError::InvalidConfiguration(
                "aggregation.default_tone must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn resolve_path(path: Option<PathBuf>) -> (PathBuf, bool) {
    if let Some(path) = path {
        return (path, true);
    }

    if let Ok(from_env) = env::var(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return (PathBuf::from(from_env), true);
        }
    }

    (Path::new(DEFAULT_CONFIG_PATH).to_path_buf(), false)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub max_sections: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_sections: MAX_PLAN_SECTIONS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Upper bound on concurrently drafting sections; 0 means unbounded.
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    #[default]
    Concatenate,
    Tone,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub mode: AggregationMode,
    pub default_tone: String,
}

impl AggregationConfig {
    fn default_tone() -> String {
        "professional".to_string()
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            mode: AggregationMode::default(),
            default_tone: Self::default_tone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level applied to the reportflow crates; everything else logs at `warn`.
    pub level: String,
    /// Full `EnvFilter` directive string. Takes precedence over `RUST_LOG`
    /// and `level`.
    pub filter: Option<String>,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            filter: None,
            ansi: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Directory receiving `<run_id>.json` trace files.
    pub dir: Option<PathBuf>,
}
