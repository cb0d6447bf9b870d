//! Plugins compiled into the `ggshield` binary.
//!
//! Each builtin is exposed twice: as a host [`EntryPoint`], and in the
//! [`FactoryTable`] under the same symbol so an installed wheel declaring
//! that symbol resolves to the native constructor. Every loader the CLI
//! builds comes from [`loader`].

mod inspect;

use std::sync::Arc;

use ggshield_core::host_version;
use ggshield_plugins::context::PluginContext;
use ggshield_plugins::enterprise_config::EnterpriseConfig;
use ggshield_plugins::loader::PluginLoader;
use ggshield_plugins::plugin::{EntryPoint, FactoryTable, PluginConstructor};

pub(crate) use inspect::{INSPECT_COMMAND, InspectPlugin};

/// A plugin linked into the binary.
struct Builtin {
    name: &'static str,
    symbol: &'static str,
    constructor: PluginConstructor,
}

const BUILTINS: &[Builtin] = &[Builtin {
    name: "inspect",
    symbol: "ggshield.builtin.inspect:InspectPlugin",
    constructor: InspectPlugin::boxed,
}];

/// Host entry points for every builtin.
pub(crate) fn entry_points() -> Vec<EntryPoint> {
    BUILTINS
        .iter()
        .map(|b| EntryPoint::new(b.name, b.symbol, b.constructor).with_version(host_version()))
        .collect()
}

/// Symbol table resolving wheel entry points to native constructors.
pub(crate) fn factory() -> FactoryTable {
    BUILTINS.iter().fold(FactoryTable::new(), |table, b| {
        table.with(b.symbol, b.constructor)
    })
}

/// Loader over `ctx` with the builtin entry points and factory.
pub(crate) fn loader(ctx: &PluginContext, config: EnterpriseConfig) -> PluginLoader {
    PluginLoader::from_context(ctx, config)
        .with_entry_points(entry_points())
        .with_factory(Arc::new(factory()))
}
