//! Daemon state wiring
//!
//! Builds the core components, registers the built-in operation table,
//! and bridges engine status changes into the event fan-out.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use haul_core::{
    AuthStore, Dispatcher, EventManager, HaulError, JobEngine, PluginHost, SessionManager, ops,
};
use haul_proto::Event;

use crate::config::DaemonConfig;

/// Everything a connection needs, shared across all of them.
pub struct DaemonState {
    pub config: DaemonConfig,
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<SessionManager>,
    pub events: Arc<EventManager>,
    pub plugins: Arc<PluginHost>,
    pub engine: Arc<dyn JobEngine>,
    pub shutdown: CancellationToken,
}

impl DaemonState {
    /// Wire up the daemon core around the given engine.
    ///
    /// Registers built-in operations, loads enabled plugins, and spawns
    /// the forwarder feeding engine status changes into the event manager.
    pub async fn build(
        config: DaemonConfig,
        engine: Arc<dyn JobEngine>,
    ) -> Result<Arc<Self>, HaulError> {
        let events = Arc::new(EventManager::new());
        let dispatcher = Arc::new(match config.handler_timeout_secs {
            0 => Dispatcher::new(),
            secs => Dispatcher::with_handler_timeout(Duration::from_secs(secs)),
        });

        let auth = AuthStore::load(&config.auth_file)?;
        let sessions = Arc::new(SessionManager::new(
            auth,
            events.clone(),
            Duration::from_secs(config.id_reuse_grace_secs),
        ));
        let plugins = Arc::new(PluginHost::new(
            config.plugin_dir.clone(),
            dispatcher.clone(),
            events.clone(),
        ));
        let shutdown = CancellationToken::new();

        ops::register_builtins(
            &dispatcher,
            engine.clone(),
            plugins.clone(),
            events.clone(),
            shutdown.clone(),
        )
        .await?;

        if let Err(e) = plugins.load_enabled().await {
            warn!(error = %e, "could not read plugin registry");
        }

        spawn_status_forwarder(engine.clone(), events.clone(), shutdown.clone());

        Ok(Arc::new(Self {
            config,
            dispatcher,
            sessions,
            events,
            plugins,
            engine,
            shutdown,
        }))
    }
}

/// Publish every engine status change as a wire event until shutdown.
fn spawn_status_forwarder(
    engine: Arc<dyn JobEngine>,
    events: Arc<EventManager>,
    shutdown: CancellationToken,
) {
    let mut rx = engine.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(change) => {
                        let event = Event::new(
                            change.kind.event_name(),
                            json!({ "job_id": change.job_id, "detail": change.detail }),
                        );
                        events.publish(event).await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        error!(missed, "status forwarder lagged behind the engine");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use haul_core::MockEngine;
    use haul_core::{EngineCommand, JobStatusChange, StatusKind};
    use haul_proto::Message;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn test_config(dir: &TempDir) -> DaemonConfig {
        DaemonConfig {
            auth_file: dir.path().join("auth.toml"),
            plugin_dir: dir.path().join("plugins"),
            ..DaemonConfig::default()
        }
    }

    #[tokio::test]
    async fn build_registers_builtin_operations() {
        let dir = TempDir::new().unwrap();
        let state = DaemonState::build(test_config(&dir), Arc::new(MockEngine::new()))
            .await
            .unwrap();

        assert!(state.dispatcher.contains("job.add").await);
        assert!(state.dispatcher.contains("daemon.info").await);
        assert!(state.dispatcher.contains("plugin.list").await);
    }

    #[tokio::test]
    async fn engine_status_changes_become_events() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(MockEngine::new());
        let state = DaemonState::build(test_config(&dir), engine.clone())
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        state.events.attach_session(1, tx).await;
        state.events.subscribe(1, "job.status").await.unwrap();

        engine.emit(JobStatusChange {
            job_id: "j-1".to_string(),
            kind: StatusKind::StatusChanged,
            detail: json!({"state": "seeding"}),
        });

        let message = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match message {
            Message::Event(event) => {
                assert_eq!(event.name, "job.status");
                assert_eq!(event.payload["job_id"], json!("j-1"));
            }
            other => panic!("expected event, got {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn engine_driven_add_emits_job_added() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(MockEngine::new());
        let state = DaemonState::build(test_config(&dir), engine.clone())
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        state.events.attach_session(1, tx).await;
        state.events.subscribe(1, "job.added").await.unwrap();

        engine
            .execute(EngineCommand::AddJob {
                source: "magnet:?x".to_string(),
                options: serde_json::Map::new(),
            })
            .await
            .unwrap();

        let message = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(message, Message::Event(e) if e.name == "job.added"));
    }
}
