use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::error::TelemetryError;

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// configured filter; output goes to stderr so reports on stdout stay clean.
pub fn init(settings: &Settings) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.log_filter).map_err(|source| {
            TelemetryError::EnvFilter {
                value: settings.log_filter.clone(),
                source,
            }
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(TelemetryError::Subscriber)
}
