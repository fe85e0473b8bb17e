//! Daemon introspection, shutdown, and event subscription operations

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::info;

use haul_plugin_api::{CallArgs, CallContext, Handler, HandlerError};

use crate::events::EventManager;

/// `daemon.info` - static daemon and protocol identification.
pub struct InfoOp;

#[async_trait]
impl Handler for InfoOp {
    async fn call(&self, _ctx: &CallContext, _args: &CallArgs) -> Result<Value, HandlerError> {
        Ok(json!({
            "name": "haul",
            "version": env!("CARGO_PKG_VERSION"),
            "protocol_version": haul_proto::PROTOCOL_VERSION,
        }))
    }
}

/// `daemon.shutdown` - signal the daemon to stop accepting and exit.
pub struct ShutdownOp {
    shutdown: CancellationToken,
}

impl ShutdownOp {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self { shutdown }
    }
}

#[async_trait]
impl Handler for ShutdownOp {
    async fn call(&self, ctx: &CallContext, _args: &CallArgs) -> Result<Value, HandlerError> {
        info!(session = ctx.session_id, "shutdown requested");
        self.shutdown.cancel();
        Ok(json!(true))
    }
}

/// `daemon.subscribe` - add an event name to the calling session's filters.
pub struct SubscribeOp {
    events: Arc<EventManager>,
}

impl SubscribeOp {
    pub fn new(events: Arc<EventManager>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl Handler for SubscribeOp {
    async fn call(&self, ctx: &CallContext, args: &CallArgs) -> Result<Value, HandlerError> {
        let name = args.string(0, "event")?;
        self.events
            .subscribe(ctx.session_id, name)
            .await
            .map_err(|e| HandlerError::failed(e.to_string()))?;
        Ok(json!(true))
    }
}

/// `daemon.unsubscribe` - drop an event name from the session's filters.
pub struct UnsubscribeOp {
    events: Arc<EventManager>,
}

impl UnsubscribeOp {
    pub fn new(events: Arc<EventManager>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl Handler for UnsubscribeOp {
    async fn call(&self, ctx: &CallContext, args: &CallArgs) -> Result<Value, HandlerError> {
        let name = args.string(0, "event")?;
        self.events
            .unsubscribe(ctx.session_id, name)
            .await
            .map_err(|e| HandlerError::failed(e.to_string()))?;
        Ok(json!(true))
    }
}
