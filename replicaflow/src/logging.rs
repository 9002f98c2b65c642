//! Structured logging setup.

use crate::config::PipelineSettings;
use tracing_subscriber::EnvFilter;

/// Initialize structured logging with tracing-subscriber.
///
/// Uses the `RUST_LOG` env var if set, otherwise falls back to `log_level`.
/// A subscriber installed earlier (by the host process or another test) is
/// left in place.
pub fn init(log_level: &str, json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let installed = if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .try_init()
    };

    if installed.is_err() {
        tracing::debug!("Global subscriber already set; keeping it");
    }
}

/// Initialize logging from process settings.
pub fn init_from_settings(settings: &PipelineSettings) {
    init(&settings.log_level, settings.log_json);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init("debug", false);
        init_from_settings(&PipelineSettings::default());
    }
}
