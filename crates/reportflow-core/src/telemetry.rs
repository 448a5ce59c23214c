use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt};

use crate::ReportError;
use crate::config::LoggingConfig;

static TELEMETRY_GUARD: OnceLock<()> = OnceLock::new();

const REPORTFLOW_TARGETS: [&str; 2] = ["reportflow_core", "reportflow_cli"];

/// Pick the filter directives: configured filter, then `RUST_LOG`, then the
/// configured level scoped to the reportflow crates.
fn resolve_directives(logging: &LoggingConfig, rust_log: Option<String>) -> String {
    if let Some(filter) = logging.filter.as_deref().filter(|f| !f.trim().is_empty()) {
        return filter.to_string();
    }
    if let Some(env) = rust_log.filter(|f| !f.trim().is_empty()) {
        return env;
    }

    let level = logging.level.trim();
    let mut directives = vec!["warn".to_string()];
    directives.extend(
        REPORTFLOW_TARGETS
            .iter()
            .map(|target| format!("{target}={level}")),
    );
    directives.join(",")
}

/// Install the global tracing subscriber described by `logging`.
///
/// Safe to call multiple times; only the first invocation installs the subscriber.
pub fn init_telemetry(logging: &LoggingConfig) -> Result<(), ReportError> {
    if TELEMETRY_GUARD.get().is_some() {
        return Ok(());
    }

    let directives = resolve_directives(logging, std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directives).map_err(|err| {
        ReportError::InvalidConfiguration(format!("invalid log filter '{directives}': {err}"))
    })?;

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_ansi(logging.ansi)
        .with_target(false)
        .try_init()
        .map_err(|err| ReportError::InvalidConfiguration(format!("telemetry init failed: {err}")))?;

    TELEMETRY_GUARD.get_or_init(|| ());
    Ok(())
}
