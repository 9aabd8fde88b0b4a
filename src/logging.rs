//! Tracing subscriber setup shared by the service and the offline tools

use crate::config::LoggingConfig;
use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// A non-empty `RUST_LOG` replaces the configured directives; otherwise the
/// configured level applies to this crate and to the calling binary's target.
pub fn init(config: &LoggingConfig, binary_target: &str) -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(rust_log.as_deref(), config, binary_target)?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

fn build_filter(
    rust_log: Option<&str>,
    config: &LoggingConfig,
    binary_target: &str,
) -> Result<EnvFilter> {
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => {
            EnvFilter::try_new(directives).map_err(|e| anyhow!("Invalid RUST_LOG: {}", e))
        }
        None => EnvFilter::try_new(format!(
            "error,loan_eligibility={level},{target}={level}",
            level = config.level,
            target = binary_target
        ))
        .map_err(|e| anyhow!("Invalid logging level `{}`: {}", config.level, e)),
    }
}
