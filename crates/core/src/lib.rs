pub mod config;
pub mod error;
pub mod logging;
pub mod settings;

pub use error::{Error, Result, SettingsError};
pub use settings::{IGNORE_GROUPS_SETTING, SessionId, SessionSettings, SettingsSource};

#[cfg(feature = "test-util")]
pub use settings::MockSettingsSource;
