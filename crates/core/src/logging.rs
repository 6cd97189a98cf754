use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Install the global `tracing` subscriber. `RUST_LOG` wins over the
/// configured level when it is set and parses.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| Error::Logging(error.to_string()))
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}
