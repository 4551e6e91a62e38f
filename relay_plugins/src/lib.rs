//! Built-in sources, actions, and stop conditions, plus the registry that
//! resolves `name[:arg]` identifiers into them.
pub mod actions;
pub mod error;
pub mod registry;
pub mod sources;
pub mod stop;
pub mod util;

pub use error::{PluginError, PluginKind};
pub use registry::{
    PluginInfo, PluginRef, catalog, resolve_action, resolve_source, resolve_stop_condition,
    resolve_target,
};
