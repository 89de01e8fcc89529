//! Tracing setup for hosts embedding the engine

use crate::config::LoggingSettings;
use crate::{FlowError, Result};
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber
///
/// `RUST_LOG` takes precedence over `settings.level`. Output goes to stderr so
/// it stays out of the way of prompts on stdout. Fails if a global subscriber
/// is already set.
pub fn init_tracing(settings: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| FlowError::Config(format!("Invalid log level '{}': {}", settings.level, e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = match settings.format.as_str() {
        "pretty" => builder.pretty().try_init(),
        "compact" => builder.compact().try_init(),
        other => {
            return Err(FlowError::Config(format!(
                "Unknown log format '{}', expected 'compact' or 'pretty'",
                other
            )))
        }
    };

    installed.map_err(|e| FlowError::Config(format!("Failed to install subscriber: {}", e)))
}
