//! Operation handlers and the per-call context
//!
//! A [`Handler`] is one callable operation. The dispatcher constructs a
//! fresh [`CallContext`] for every invocation; it is borrowed by exactly
//! that call and never shared with concurrently executing calls.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::auth::AuthLevel;

/// Identifies the invoking session for the duration of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// The session the request arrived on
    pub session_id: u64,
    /// That session's authorization level at call time
    pub auth_level: AuthLevel,
    /// The request id the response will carry
    pub request_id: u64,
}

/// Positional and named arguments of one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl CallArgs {
    pub fn new(args: Vec<Value>, kwargs: Map<String, Value>) -> Self {
        Self { args, kwargs }
    }

    /// Look up an argument by keyword name, falling back to position.
    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.kwargs.get(name).or_else(|| self.args.get(index))
    }

    /// A required string argument.
    pub fn string(&self, index: usize, name: &str) -> Result<&str, HandlerError> {
        self.get(index, name)
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::invalid_args(format!("missing string argument '{name}'")))
    }

    /// An optional boolean argument, defaulting when absent.
    pub fn bool_or(&self, index: usize, name: &str, default: bool) -> Result<bool, HandlerError> {
        match self.get(index, name) {
            None => Ok(default),
            Some(value) => value.as_bool().ok_or_else(|| {
                HandlerError::invalid_args(format!("argument '{name}' must be a boolean"))
            }),
        }
    }

    /// An optional object argument, empty when absent.
    pub fn object_or_default(
        &self,
        index: usize,
        name: &str,
    ) -> Result<Map<String, Value>, HandlerError> {
        match self.get(index, name) {
            None => Ok(Map::new()),
            Some(value) => value.as_object().cloned().ok_or_else(|| {
                HandlerError::invalid_args(format!("argument '{name}' must be an object"))
            }),
        }
    }
}

/// Failure raised inside an operation's implementation.
///
/// Caught at the dispatch boundary and converted to a `handler_error`
/// fault; never propagated to crash the dispatcher or other sessions.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::InvalidArgs(message.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// One callable operation.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: &CallContext, args: &CallArgs) -> Result<Value, HandlerError>;
}
