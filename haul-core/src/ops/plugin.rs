//! Plugin lifecycle operations

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use haul_plugin_api::{CallArgs, CallContext, Handler, HandlerError};

use crate::plugins::PluginHost;

/// `plugin.load` - load and enable a plugin by name.
pub struct PluginLoadOp {
    host: Arc<PluginHost>,
}

impl PluginLoadOp {
    pub fn new(host: Arc<PluginHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Handler for PluginLoadOp {
    async fn call(&self, _ctx: &CallContext, args: &CallArgs) -> Result<Value, HandlerError> {
        let name = args.string(0, "name")?;
        let manifest = self
            .host
            .enable_plugin(name)
            .await
            .map_err(|e| HandlerError::failed(e.to_string()))?;
        Ok(json!({
            "name": manifest.name,
            "version": manifest.version,
            "description": manifest.description,
        }))
    }
}

/// `plugin.unload` - disable a plugin and remove its registrations.
pub struct PluginUnloadOp {
    host: Arc<PluginHost>,
}

impl PluginUnloadOp {
    pub fn new(host: Arc<PluginHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Handler for PluginUnloadOp {
    async fn call(&self, _ctx: &CallContext, args: &CallArgs) -> Result<Value, HandlerError> {
        let name = args.string(0, "name")?;
        self.host
            .disable_plugin(name)
            .await
            .map_err(|e| HandlerError::failed(e.to_string()))?;
        Ok(json!(true))
    }
}

/// `plugin.list` - manifests of all loaded plugins.
pub struct PluginListOp {
    host: Arc<PluginHost>,
}

impl PluginListOp {
    pub fn new(host: Arc<PluginHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Handler for PluginListOp {
    async fn call(&self, _ctx: &CallContext, _args: &CallArgs) -> Result<Value, HandlerError> {
        let manifests = self.host.list().await;
        let listed: Vec<Value> = manifests
            .into_iter()
            .map(|m| {
                json!({
                    "name": m.name,
                    "version": m.version,
                    "description": m.description,
                })
            })
            .collect();
        Ok(Value::Array(listed))
    }
}
