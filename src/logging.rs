//! Logging setup
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to this
//! crate.

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter for a logging config
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("enterprise_splash={}", config.level)))
}

fn uses_json(config: &LoggingConfig) -> bool {
    config.format.eq_ignore_ascii_case("json")
}

/// Install the global subscriber: `json` for machine output, anything else is pretty
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let json = uses_json(config);

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(json.then(|| fmt::layer().json().with_target(false)))
        .with((!json).then(|| fmt::layer().with_target(false).pretty()))
        .try_init()?;

    Ok(())
}
