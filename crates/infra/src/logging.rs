use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;

/// Chatty dependency targets held at `warn` unless `log_level` names them.
const QUIET_TARGETS: [&str; 4] = ["surrealdb", "hyper", "reqwest", "tower_http"];

pub fn env_filter(log_level: &str) -> EnvFilter {
    let mut filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    for target in QUIET_TARGETS {
        if log_level.contains(target) {
            continue;
        }
        if let Ok(directive) = format!("{target}=warn").parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

pub fn init_tracing(config: &AppConfig) -> Result<()> {
    let filter = env_filter(&config.log_level);

    let installed = if config.is_production() {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .try_init()
    };
    installed.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;

    tracing::debug!(
        environment = %config.app_env,
        log_level = %config.log_level,
        "tracing initialised"
    );
    Ok(())
}
