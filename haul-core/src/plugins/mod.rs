//! Plugin lifecycle
//!
//! Plugins extend the daemon at runtime: each one registers operations and
//! event handlers under its own name, and unloading removes exactly what
//! loading added.

mod error;
mod host;
mod registry;

pub use error::PluginHostError;
pub use host::PluginHost;
pub use registry::PluginRegistry;
