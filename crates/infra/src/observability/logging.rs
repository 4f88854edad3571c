//! Tracing subscriber setup
//!
//! Filter precedence: `RUST_LOG`, then the configured filter, then `info`.

use fieldsync_domain::{LoggingSettings, SyncError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// # Errors
/// Returns `SyncError::Configuration` if the configured filter does not
/// parse or a global subscriber is already installed.
pub fn init_tracing(settings: &LoggingSettings) -> Result<(), SyncError> {
    let filter = build_filter(settings)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = if settings.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true).with_target(true))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|err| {
        SyncError::Configuration(format!("failed to install tracing subscriber: {err}"))
    })
}

fn build_filter(settings: &LoggingSettings) -> Result<EnvFilter, SyncError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    match settings.filter.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives).map_err(|err| {
            SyncError::Configuration(format!("invalid log filter '{directives}': {err}"))
        }),
        None => Ok(EnvFilter::new(DEFAULT_FILTER)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_filter() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let settings = LoggingSettings { json: false, filter: Some("fieldsync=verbose".to_string()) };

        assert!(matches!(build_filter(&settings), Err(SyncError::Configuration(_))));
    }

    #[test]
    fn second_install_is_reported() {
        let settings = LoggingSettings::default();
        let _ = init_tracing(&settings);

        assert!(init_tracing(&settings).is_err());
    }
}
