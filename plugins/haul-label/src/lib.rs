//! Label plugin - tag jobs with free-form labels
//!
//! Adds `label.set`, `label.get`, and `label.list` operations, and drops a
//! job's label when the daemon reports the job removed.
//!
//! ## Installing
//!
//! ```bash
//! cargo build --release -p haul-label
//! mkdir -p ~/.config/haul/plugins/labels
//! cp target/release/libhaul_label.so ~/.config/haul/plugins/labels/labels.so
//! ```
//!
//! Then load it with the `plugin.load` operation or list it in the plugin
//! registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use haul_plugin_api::{
    AuthLevel, CallArgs, CallContext, Handler, HandlerError, Plugin, PluginContext, PluginError,
    PluginManifest, export_plugin,
};

type LabelStore = Arc<Mutex<HashMap<String, String>>>;

fn with_store<R>(store: &LabelStore, f: impl FnOnce(&mut HashMap<String, String>) -> R) -> Result<R, HandlerError> {
    match store.lock() {
        Ok(mut labels) => Ok(f(&mut labels)),
        Err(_) => Err(HandlerError::failed("label store poisoned")),
    }
}

struct SetOp {
    labels: LabelStore,
}

#[async_trait]
impl Handler for SetOp {
    async fn call(&self, _ctx: &CallContext, args: &CallArgs) -> Result<Value, HandlerError> {
        let job_id = args.string(0, "job_id")?.to_string();
        let label = args.string(1, "label")?.to_string();
        with_store(&self.labels, |labels| {
            labels.insert(job_id.clone(), label.clone());
        })?;
        Ok(json!({ "job_id": job_id, "label": label }))
    }
}

struct GetOp {
    labels: LabelStore,
}

#[async_trait]
impl Handler for GetOp {
    async fn call(&self, _ctx: &CallContext, args: &CallArgs) -> Result<Value, HandlerError> {
        let job_id = args.string(0, "job_id")?;
        let label = with_store(&self.labels, |labels| labels.get(job_id).cloned())?;
        Ok(match label {
            Some(label) => json!(label),
            None => Value::Null,
        })
    }
}

struct ListOp {
    labels: LabelStore,
}

#[async_trait]
impl Handler for ListOp {
    async fn call(&self, _ctx: &CallContext, _args: &CallArgs) -> Result<Value, HandlerError> {
        with_store(&self.labels, |labels| {
            json!(labels.clone())
        })
    }
}

/// The plugin itself: shared label table plus registrations.
#[derive(Default)]
pub struct LabelPlugin {
    labels: LabelStore,
}

impl Plugin for LabelPlugin {
    fn manifest(&self) -> PluginManifest {
        PluginManifest {
            name: "labels".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Tag jobs with free-form labels".to_string(),
            ..Default::default()
        }
    }

    fn enable(&mut self, ctx: &mut PluginContext) -> Result<(), PluginError> {
        ctx.register_operation(
            "label.set",
            AuthLevel::Normal,
            Arc::new(SetOp {
                labels: self.labels.clone(),
            }),
        );
        ctx.register_operation(
            "label.get",
            AuthLevel::ReadOnly,
            Arc::new(GetOp {
                labels: self.labels.clone(),
            }),
        );
        ctx.register_operation(
            "label.list",
            AuthLevel::ReadOnly,
            Arc::new(ListOp {
                labels: self.labels.clone(),
            }),
        );

        // Labels die with their job
        let labels = self.labels.clone();
        ctx.subscribe_event("job.removed", Arc::new(move |event| {
            if let Some(job_id) = event.payload.get("job_id").and_then(Value::as_str) {
                if let Ok(mut labels) = labels.lock() {
                    labels.remove(job_id);
                }
            }
        }));

        ctx.log_info("label plugin enabled");
        Ok(())
    }

    fn disable(&mut self) -> Result<(), PluginError> {
        Ok(())
    }
}

export_plugin!(LabelPlugin);
