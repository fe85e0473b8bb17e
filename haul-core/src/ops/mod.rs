//! Built-in operations
//!
//! The operations every daemon exposes without any plugin: job control
//! bridged to the engine, daemon introspection and shutdown, event
//! subscription management, and plugin lifecycle control.

mod daemon;
mod job;
mod plugin;

pub use daemon::{InfoOp, ShutdownOp, SubscribeOp, UnsubscribeOp};
pub use job::{JobOp, build_add, build_list, build_pause, build_remove, build_resume, build_status};
pub use plugin::{PluginListOp, PluginLoadOp, PluginUnloadOp};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use haul_plugin_api::AuthLevel;

use crate::engine::JobEngine;
use crate::error::DispatchError;
use crate::events::EventManager;
use crate::plugins::PluginHost;
use crate::rpc::Dispatcher;

/// Register the full built-in operation table. Built-ins carry no owner
/// tag, so no plugin unload can ever remove them.
pub async fn register_builtins(
    dispatcher: &Dispatcher,
    engine: Arc<dyn JobEngine>,
    host: Arc<PluginHost>,
    events: Arc<EventManager>,
    shutdown: CancellationToken,
) -> Result<(), DispatchError> {
    use AuthLevel::{Admin, Normal, ReadOnly};

    dispatcher
        .register("daemon.info", ReadOnly, Arc::new(InfoOp), None)
        .await?;
    dispatcher
        .register("daemon.shutdown", Admin, Arc::new(ShutdownOp::new(shutdown)), None)
        .await?;
    dispatcher
        .register(
            "daemon.subscribe",
            ReadOnly,
            Arc::new(SubscribeOp::new(events.clone())),
            None,
        )
        .await?;
    dispatcher
        .register(
            "daemon.unsubscribe",
            ReadOnly,
            Arc::new(UnsubscribeOp::new(events)),
            None,
        )
        .await?;

    dispatcher
        .register("job.add", Normal, Arc::new(JobOp::new(engine.clone(), build_add)), None)
        .await?;
    dispatcher
        .register(
            "job.remove",
            Admin,
            Arc::new(JobOp::new(engine.clone(), build_remove)),
            None,
        )
        .await?;
    dispatcher
        .register(
            "job.pause",
            Normal,
            Arc::new(JobOp::new(engine.clone(), build_pause)),
            None,
        )
        .await?;
    dispatcher
        .register(
            "job.resume",
            Normal,
            Arc::new(JobOp::new(engine.clone(), build_resume)),
            None,
        )
        .await?;
    dispatcher
        .register(
            "job.status",
            ReadOnly,
            Arc::new(JobOp::new(engine.clone(), build_status)),
            None,
        )
        .await?;
    dispatcher
        .register("job.list", ReadOnly, Arc::new(JobOp::new(engine, build_list)), None)
        .await?;

    dispatcher
        .register(
            "plugin.load",
            Admin,
            Arc::new(PluginLoadOp::new(host.clone())),
            None,
        )
        .await?;
    dispatcher
        .register(
            "plugin.unload",
            Admin,
            Arc::new(PluginUnloadOp::new(host.clone())),
            None,
        )
        .await?;
    dispatcher
        .register("plugin.list", ReadOnly, Arc::new(PluginListOp::new(host)), None)
        .await?;

    Ok(())
}
