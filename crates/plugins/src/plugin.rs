use std::sync::Arc;

use tracing::{info, warn};

use ignore_groups_core::{IGNORE_GROUPS_SETTING, SettingsSource};
use ignore_groups_xmpp::{IgnoreGroupsProcessor, InterceptorRegistry, PipelineError, StanzaClass};

use crate::options::{AccountOption, OptionError, OptionSlot, ProtocolOptions};

pub const JABBER_PROTOCOL_ID: &str = "prpl-jabber";

pub const IGNORE_GROUPS_OPTION_LABEL: &str = "Ignore server-sent groups";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub version: &'static str,
    pub summary: &'static str,
    pub description: &'static str,
    pub dependencies: &'static [&'static str],
}

pub const PLUGIN_INFO: PluginInfo = PluginInfo {
    id: "core-xmpp-ignore-groups",
    name: "XMPP Ignore Groups",
    version: "1.0",
    summary: "Ignore server-sent XMPP groups",
    description: "For servers that push their own roster groups onto your buddies. \
                  Load the plugin, then turn on 'Ignore server-sent groups' in the \
                  advanced settings of the XMPP account.",
    dependencies: &[JABBER_PROTOCOL_ID],
};

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("plugin {id} requires protocol {dependency}")]
    MissingDependency { id: String, dependency: String },

    #[error("failed to register roster interceptor: {0}")]
    Registration(#[from] PipelineError),

    #[error("failed to add account option: {0}")]
    Option(#[from] OptionError),
}

/// Wires the roster group filter into a host: one interceptor on
/// `jabber:iq:roster` queries plus the per-account toggle.
pub struct IgnoreGroupsPlugin {
    settings: Arc<dyn SettingsSource>,
}

impl IgnoreGroupsPlugin {
    pub fn new(settings: Arc<dyn SettingsSource>) -> Self {
        Self { settings }
    }

    pub fn info(&self) -> &'static PluginInfo {
        &PLUGIN_INFO
    }

    pub fn load(
        &self,
        registry: Arc<dyn InterceptorRegistry>,
        options: &Arc<ProtocolOptions>,
    ) -> Result<LoadedPlugin, PluginError> {
        info!(plugin = PLUGIN_INFO.id, "plugin_load");

        if options.protocol_id() != JABBER_PROTOCOL_ID {
            warn!(
                plugin = PLUGIN_INFO.id,
                protocol = options.protocol_id(),
                "XMPP protocol unavailable, not loading"
            );
            return Err(PluginError::MissingDependency {
                id: PLUGIN_INFO.id.to_string(),
                dependency: JABBER_PROTOCOL_ID.to_string(),
            });
        }

        let class = IgnoreGroupsProcessor::class();
        let processor = Arc::new(IgnoreGroupsProcessor::new(Arc::clone(&self.settings)));
        registry.register(class.clone(), processor)?;

        let option = AccountOption::bool(IGNORE_GROUPS_OPTION_LABEL, IGNORE_GROUPS_SETTING, false);
        let slot = match options.acquire(option) {
            Ok(slot) => slot,
            Err(error) => {
                warn!(plugin = PLUGIN_INFO.id, %error, "rolling back interceptor registration");
                registry.unregister(&class);
                return Err(error.into());
            }
        };

        Ok(LoadedPlugin {
            registry,
            class: Some(class),
            option: Some(slot),
        })
    }
}

/// A loaded plugin. Unloading, explicitly or by dropping, removes the
/// interceptor and the account option exactly once.
#[must_use = "dropping the plugin unloads it"]
pub struct LoadedPlugin {
    registry: Arc<dyn InterceptorRegistry>,
    class: Option<StanzaClass>,
    option: Option<OptionSlot>,
}

impl LoadedPlugin {
    pub fn class(&self) -> Option<&StanzaClass> {
        self.class.as_ref()
    }

    pub fn unload(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(class) = self.class.take() {
            self.registry.unregister(&class);
        }
        if self.option.take().is_some() {
            info!(plugin = PLUGIN_INFO.id, "plugin unloaded");
        }
    }
}

impl Drop for LoadedPlugin {
    fn drop(&mut self) {
        self.release();
    }
}
