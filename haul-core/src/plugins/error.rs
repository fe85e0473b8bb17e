//! Plugin host errors

use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading, unloading, and tracking plugins.
#[derive(Error, Debug)]
pub enum PluginHostError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("No plugin library found in {dir}")]
    LibraryNotFound { dir: PathBuf },

    #[error("Failed to load library: {0}")]
    Library(#[from] libloading::Error),

    #[error("Plugin built against API version {found}, daemon requires {expected}")]
    ApiVersionMismatch { expected: u32, found: u32 },

    #[error("Plugin '{name}' is already loaded")]
    AlreadyLoaded { name: String },

    #[error("Plugin '{name}' is not loaded")]
    NotLoaded { name: String },

    #[error("Plugin '{name}' failed to enable: {reason}")]
    EnableFailed { name: String, reason: String },

    #[error("Plugin '{name}' tried to register '{operation}', which already exists")]
    DuplicateOperation { name: String, operation: String },
}
