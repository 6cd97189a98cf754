pub mod options;
pub mod plugin;

pub use options::{AccountOption, OptionError, OptionSlot, ProtocolOptions};
pub use plugin::{
    IGNORE_GROUPS_OPTION_LABEL, IgnoreGroupsPlugin, JABBER_PROTOCOL_ID, LoadedPlugin, PLUGIN_INFO,
    PluginError, PluginInfo,
};
