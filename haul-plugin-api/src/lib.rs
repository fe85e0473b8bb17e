//! haul-plugin-api - Plugin API for the haul daemon
//!
//! This crate provides the traits and types needed to write plugins for
//! haul. Plugins are native Rust dynamic libraries that add callable
//! operations and event handlers to a running daemon.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use haul_plugin_api::{
//!     AuthLevel, Plugin, PluginContext, PluginError, PluginManifest, export_plugin,
//! };
//!
//! #[derive(Default)]
//! pub struct MyPlugin;
//!
//! impl Plugin for MyPlugin {
//!     fn manifest(&self) -> PluginManifest {
//!         PluginManifest {
//!             name: "my-plugin".to_string(),
//!             version: "0.1.0".to_string(),
//!             description: "My custom plugin".to_string(),
//!             ..Default::default()
//!         }
//!     }
//!
//!     fn enable(&mut self, ctx: &mut PluginContext) -> Result<(), PluginError> {
//!         ctx.register_operation("my.op", AuthLevel::Normal, Arc::new(MyOp));
//!         Ok(())
//!     }
//!
//!     fn disable(&mut self) -> Result<(), PluginError> {
//!         Ok(())
//!     }
//! }
//!
//! export_plugin!(MyPlugin);
//! ```

pub mod auth;
pub mod context;
pub mod error;
pub mod handler;
pub mod types;

pub use auth::AuthLevel;
pub use context::{EventCallback, EventHandlerSpec, OperationSpec, PluginContext};
pub use error::PluginError;
pub use handler::{CallArgs, CallContext, Handler, HandlerError};
pub use types::PluginManifest;

/// The event type delivered to subscribed callbacks.
pub use haul_proto::Event;

/// Current plugin API version. Plugins must match this exactly; the host
/// checks it before instantiating anything from the library.
pub const API_VERSION: u32 = 1;

/// The core plugin trait - implement this to create a haul plugin.
pub trait Plugin: Send + Sync {
    /// Return plugin metadata
    fn manifest(&self) -> PluginManifest;

    /// Called when the plugin is enabled. Register operations and event
    /// handlers through the context; the host commits them after this
    /// returns `Ok` and rolls everything back if it does not.
    fn enable(&mut self, ctx: &mut PluginContext) -> Result<(), PluginError>;

    /// Called when the plugin is disabled, before its registrations are
    /// removed. Best-effort: a failure here is logged, never fatal.
    fn disable(&mut self) -> Result<(), PluginError>;
}

/// Export a plugin type for dynamic loading.
///
/// Generates the C ABI entry points the daemon uses to load and unload
/// plugins:
///
/// - `_haul_plugin_create()`: creates a new plugin instance
/// - `_haul_plugin_api_version()`: returns the API version
/// - `_haul_plugin_destroy()`: destroys a plugin instance
#[macro_export]
macro_rules! export_plugin {
    ($plugin_type:ty) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn _haul_plugin_create() -> *mut dyn $crate::Plugin {
            let plugin: Box<dyn $crate::Plugin> = Box::new(<$plugin_type>::default());
            Box::into_raw(plugin)
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn _haul_plugin_api_version() -> u32 {
            $crate::API_VERSION
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn _haul_plugin_destroy(ptr: *mut dyn $crate::Plugin) {
            if !ptr.is_null() {
                unsafe {
                    drop(Box::from_raw(ptr));
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_version_is_set() {
        assert_eq!(API_VERSION, 1);
    }

    #[test]
    fn plugin_trait_is_object_safe() {
        // This compiles only if Plugin is object-safe
        fn _takes_boxed_plugin(_: Box<dyn Plugin>) {}
    }
}
