use thiserror::Error;

use crate::settings::SessionId;

/// Top-level error for the ignore-groups workspace.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Logging error: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("session {0} is not known to the settings source")]
    SessionNotFound(SessionId),

    #[error("settings unavailable: {0}")]
    Unavailable(String),
}
