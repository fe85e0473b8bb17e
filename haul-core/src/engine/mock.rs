//! Mock engine for testing
//!
//! MockEngine records every command it executes and answers with canned
//! results, enabling fast, deterministic testing of dispatch and event
//! wiring without a real transfer engine.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{Mutex, broadcast};

use crate::error::EngineError;

use super::traits::{EngineCommand, JobEngine, JobStatusChange, StatusKind};

/// Mock implementation of [`JobEngine`].
///
/// Queue failures with [`MockEngine::queue_failure`] to script error
/// paths; inspect [`MockEngine::calls`] to assert on side effects.
pub struct MockEngine {
    calls: Mutex<Vec<EngineCommand>>,
    failures: Mutex<VecDeque<EngineError>>,
    delay: Mutex<Option<Duration>>,
    next_job: AtomicU64,
    tx: broadcast::Sender<JobStatusChange>,
}

impl MockEngine {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            delay: Mutex::new(None),
            next_job: AtomicU64::new(1),
            tx,
        }
    }

    /// Make the next `execute` call fail with the given error.
    pub async fn queue_failure(&self, error: EngineError) {
        self.failures.lock().await.push_back(error);
    }

    /// Make every `execute` call sleep first, simulating a slow engine.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.lock().await = Some(delay);
    }

    /// Every command executed so far, in order.
    pub async fn calls(&self) -> Vec<EngineCommand> {
        self.calls.lock().await.clone()
    }

    /// Report a status change, as a running engine would.
    pub fn emit(&self, change: JobStatusChange) {
        let _ = self.tx.send(change);
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobEngine for MockEngine {
    async fn execute(&self, command: EngineCommand) -> Result<Value, EngineError> {
        self.calls.lock().await.push(command.clone());

        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.failures.lock().await.pop_front() {
            return Err(error);
        }

        match command {
            EngineCommand::AddJob { source, .. } => {
                let job_id = format!("j-{}", self.next_job.fetch_add(1, Ordering::SeqCst));
                self.emit(JobStatusChange {
                    job_id: job_id.clone(),
                    kind: StatusKind::Added,
                    detail: json!({ "source": source }),
                });
                Ok(json!({ "job_id": job_id, "source": source }))
            }
            EngineCommand::RemoveJob { job_id, .. } => {
                self.emit(JobStatusChange {
                    job_id: job_id.clone(),
                    kind: StatusKind::Removed,
                    detail: json!({}),
                });
                Ok(json!(true))
            }
            EngineCommand::PauseJob { job_id } | EngineCommand::ResumeJob { job_id } => {
                self.emit(JobStatusChange {
                    job_id: job_id.clone(),
                    kind: StatusKind::StatusChanged,
                    detail: json!({}),
                });
                Ok(json!(true))
            }
            EngineCommand::JobStatus { job_id } => Ok(json!({
                "job_id": job_id,
                "state": "downloading",
                "progress": 0.5,
            })),
            EngineCommand::ListJobs => Ok(json!([])),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<JobStatusChange> {
        self.tx.subscribe()
    }
}
