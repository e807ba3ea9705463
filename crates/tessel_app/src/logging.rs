//! Logging bootstrap
//!
//! Installs a `tracing-subscriber` fmt subscriber. Filter precedence:
//! `RUST_LOG`, then the configured filter, then [`DEFAULT_FILTER`].

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_FILTER: &str = "tessel=info";

/// Filter from `RUST_LOG`, falling back to `configured` and the default
pub fn env_filter(configured: Option<&str>) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    filter_from(configured)
}

fn filter_from(configured: Option<&str>) -> Result<EnvFilter> {
    let directives = configured.unwrap_or(DEFAULT_FILTER);
    EnvFilter::try_new(directives).with_context(|| format!("Invalid log filter '{directives}'"))
}

/// Install the global subscriber
///
/// Fails when a subscriber is already installed.
pub fn init(configured: Option<&str>) -> Result<()> {
    let filter = env_filter(configured)?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .context("Failed to install the tracing subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        let filter = filter_from(None).unwrap();
        assert!(filter.to_string().starts_with("tessel="));
    }

    #[test]
    fn test_configured_filter_wins_over_default() {
        let filter = filter_from(Some("tessel_gpu=trace,warn")).unwrap();
        assert!(filter.to_string().contains("tessel_gpu"));
    }

    #[test]
    fn test_invalid_filter_is_an_error() {
        assert!(filter_from(Some("tessel=loudest")).is_err());
    }
}
