//! Plugin management commands - install, uninstall, enable, disable, list,
//! status and update.

pub(crate) mod helpers;
pub(crate) mod install;
pub(crate) mod list;
pub(crate) mod manage;
pub(crate) mod status;
pub(crate) mod update;

pub(crate) use install::{InstallRequest, install_plugin};
pub(crate) use list::list_plugins;
pub(crate) use manage::{disable_plugin, enable_plugin, uninstall_plugin};
pub(crate) use status::show_status;
pub(crate) use update::{UpdateRequest, update_plugins};
