use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// A boolean account option shown in the account editor of one protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountOption {
    pub setting: String,
    pub label: String,
    pub default: bool,
}

impl AccountOption {
    pub fn bool(label: impl Into<String>, setting: impl Into<String>, default: bool) -> Self {
        Self {
            setting: setting.into(),
            label: label.into(),
            default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionError {
    #[error("account option {setting} is already registered for {protocol}")]
    AlreadyRegistered { protocol: String, setting: String },
}

/// Account options advertised by a protocol. Entries are only added through
/// [`ProtocolOptions::acquire`] and disappear when their [`OptionSlot`] is
/// dropped.
#[derive(Debug)]
pub struct ProtocolOptions {
    protocol_id: String,
    options: Mutex<Vec<AccountOption>>,
}

impl ProtocolOptions {
    pub fn new(protocol_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            protocol_id: protocol_id.into(),
            options: Mutex::new(Vec::new()),
        })
    }

    pub fn protocol_id(&self) -> &str {
        &self.protocol_id
    }

    pub fn acquire(self: &Arc<Self>, option: AccountOption) -> Result<OptionSlot, OptionError> {
        let mut options = self.lock();
        if options.iter().any(|o| o.setting == option.setting) {
            return Err(OptionError::AlreadyRegistered {
                protocol: self.protocol_id.clone(),
                setting: option.setting,
            });
        }

        debug!(
            protocol = %self.protocol_id,
            setting = %option.setting,
            "account option added"
        );
        let setting = option.setting.clone();
        options.push(option);

        Ok(OptionSlot {
            options: Arc::clone(self),
            setting,
        })
    }

    pub fn options(&self) -> Vec<AccountOption> {
        self.lock().clone()
    }

    pub fn contains(&self, setting: &str) -> bool {
        self.lock().iter().any(|o| o.setting == setting)
    }

    fn release(&self, setting: &str) {
        self.lock().retain(|o| o.setting != setting);
        debug!(protocol = %self.protocol_id, setting, "account option removed");
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AccountOption>> {
        self.options.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ownership of one registered account option.
#[derive(Debug)]
#[must_use = "dropping the slot removes the option again"]
pub struct OptionSlot {
    options: Arc<ProtocolOptions>,
    setting: String,
}

impl OptionSlot {
    pub fn setting(&self) -> &str {
        &self.setting
    }
}

impl Drop for OptionSlot {
    fn drop(&mut self) {
        self.options.release(&self.setting);
    }
}
