use std::collections::HashMap;
use std::fmt;

use dashmap::DashMap;
use tracing::debug;

use crate::config::Config;
use crate::error::SettingsError;

/// Account option that suppresses server-assigned roster groups.
pub const IGNORE_GROUPS_SETTING: &str = "ignore_groups";

/// Identifies the account/session a stanza was received on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Synchronous read access to per-session boolean options.
///
/// `Ok(None)` means the option was never set for a known session; callers
/// apply their own default. An error means the session could not be
/// resolved at all.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
pub trait SettingsSource: Send + Sync {
    fn get_bool(&self, session: &SessionId, key: &str) -> Result<Option<bool>, SettingsError>;
}

/// In-memory settings keyed by session, safe to toggle while stanzas are
/// being filtered on other threads.
#[derive(Debug, Default)]
pub struct SessionSettings {
    sessions: DashMap<SessionId, HashMap<String, bool>>,
}

impl SessionSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed one session per configured account.
    pub fn from_config(config: &Config) -> Self {
        let settings = Self::new();
        for account in &config.accounts {
            let session = SessionId::new(account.jid.clone());
            settings.open_session(session.clone());
            settings.set_bool(&session, IGNORE_GROUPS_SETTING, account.ignore_groups);
        }
        settings
    }

    /// Make a session known. Reopening an existing session keeps its values.
    pub fn open_session(&self, session: SessionId) {
        self.sessions.entry(session).or_default();
    }

    pub fn close_session(&self, session: &SessionId) -> bool {
        self.sessions.remove(session).is_some()
    }

    pub fn contains_session(&self, session: &SessionId) -> bool {
        self.sessions.contains_key(session)
    }

    /// Set an option, opening the session if needed.
    pub fn set_bool(&self, session: &SessionId, key: &str, value: bool) {
        debug!(session = %session, key, value, "account option updated");
        self.sessions
            .entry(session.clone())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Clear an option so that lookups fall back to the caller's default.
    pub fn remove(&self, session: &SessionId, key: &str) -> Option<bool> {
        self.sessions
            .get_mut(session)
            .and_then(|mut values| values.remove(key))
    }
}

impl SettingsSource for SessionSettings {
    fn get_bool(&self, session: &SessionId, key: &str) -> Result<Option<bool>, SettingsError> {
        let values = self
            .sessions
            .get(session)
            .ok_or_else(|| SettingsError::SessionNotFound(session.clone()))?;
        Ok(values.get(key).copied())
    }
}
