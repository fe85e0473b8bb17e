//! Error types for haul-core

use thiserror::Error;

use crate::plugins::PluginHostError;

/// Top-level error type for haul-core
#[derive(Error, Debug)]
pub enum HaulError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginHostError),
}

/// Errors related to session management
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(u64),

    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },
}

/// Authentication and authorization failures.
///
/// Returned as `auth_error` faults; the connection stays open.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Operation '{operation}' requires {required} level, session has {actual}")]
    InsufficientLevel {
        operation: String,
        required: haul_plugin_api::AuthLevel,
        actual: haul_plugin_api::AuthLevel,
    },

    #[error("Failed to read auth file: {0}")]
    Store(String),
}

/// Errors from registry mutation on the dispatcher
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Operation '{0}' is already registered")]
    DuplicateOperation(String),
}

/// Errors from the external job engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Engine failure: {0}")]
    Failed(String),
}
