//! Tracing subscriber setup for test binaries.

use crate::config::TesterConfig;
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG`, or by `default_level`
/// when `RUST_LOG` is unset or invalid.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init()
        .is_ok()
}

/// [`init_tracing`] at the config's `log_level`
pub fn init_from_config(config: &TesterConfig) -> bool {
    init_tracing(&config.log_level)
}

/// Same as [`init_tracing`], emitting JSON lines
pub fn init_json_tracing(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        let _ = init_tracing("debug");
        assert!(!init_tracing("info"));
        assert!(!init_json_tracing("info"));
        assert!(!init_from_config(&TesterConfig::new()));
        tracing::info!("logging initialised");
    }
}
