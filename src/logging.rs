//! Logging setup for embedding hosts.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{ConfigError, FabricError, Result};

/// Initializes the logging system.
///
/// Does nothing if the host already installed a global subscriber.
///
/// # Errors
///
/// Returns an error if the filter directive is invalid.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(&config.level)?;

    let installed = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    };

    if installed.is_err() {
        tracing::debug!("A global subscriber is already installed");
    }
    Ok(())
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level).map_err(|e| {
        FabricError::Config(ConfigError::ParseError {
            message: format!("Invalid log filter '{level}': {e}"),
            location: Some(String::from("logging.level")),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives() {
        assert!(build_filter("info").is_ok());
        assert!(build_filter("fabric_provider=debug,warn").is_ok());
        assert!(build_filter("fabric_provider=loud").is_err());
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());
    }
}
