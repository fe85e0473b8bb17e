//! In-memory reference engine
//!
//! Stands in for a real transfer engine: jobs live in a map and move
//! through queued/paused states without any actual data transfer. Gives
//! the daemon binary working job semantics end to end; a production
//! deployment swaps in an engine that implements the same trait against a
//! real transfer backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, broadcast};

use haul_core::{EngineCommand, EngineError, JobEngine, JobStatusChange, StatusKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum JobState {
    Queued,
    Paused,
}

#[derive(Debug)]
struct JobRecord {
    job_id: String,
    source: String,
    state: JobState,
    options: serde_json::Map<String, Value>,
}

/// [`JobEngine`] backed by an in-memory job table.
pub struct MemoryEngine {
    jobs: Mutex<HashMap<String, JobRecord>>,
    next_job: AtomicU64,
    tx: broadcast::Sender<JobStatusChange>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            jobs: Mutex::new(HashMap::new()),
            next_job: AtomicU64::new(1),
            tx,
        }
    }

    fn emit(&self, job_id: &str, kind: StatusKind, detail: Value) {
        let _ = self.tx.send(JobStatusChange {
            job_id: job_id.to_string(),
            kind,
            detail,
        });
    }

    fn record_value(record: &JobRecord) -> Value {
        json!({
            "job_id": record.job_id,
            "source": record.source,
            "state": record.state,
            "options": record.options,
        })
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobEngine for MemoryEngine {
    async fn execute(&self, command: EngineCommand) -> Result<Value, EngineError> {
        match command {
            EngineCommand::AddJob { source, options } => {
                let job_id = format!("j-{}", self.next_job.fetch_add(1, Ordering::SeqCst));
                let record = JobRecord {
                    job_id: job_id.clone(),
                    source,
                    state: JobState::Queued,
                    options,
                };
                let value = Self::record_value(&record);
                self.jobs.lock().await.insert(job_id.clone(), record);
                self.emit(&job_id, StatusKind::Added, value.clone());
                Ok(value)
            }
            EngineCommand::RemoveJob { job_id, remove_data } => {
                let removed = self.jobs.lock().await.remove(&job_id);
                match removed {
                    Some(_) => {
                        self.emit(&job_id, StatusKind::Removed, json!({ "remove_data": remove_data }));
                        Ok(json!(true))
                    }
                    None => Err(EngineError::UnknownJob(job_id)),
                }
            }
            EngineCommand::PauseJob { job_id } => {
                let mut jobs = self.jobs.lock().await;
                let record = jobs
                    .get_mut(&job_id)
                    .ok_or_else(|| EngineError::UnknownJob(job_id.clone()))?;
                record.state = JobState::Paused;
                drop(jobs);
                self.emit(&job_id, StatusKind::StatusChanged, json!({ "state": "paused" }));
                Ok(json!(true))
            }
            EngineCommand::ResumeJob { job_id } => {
                let mut jobs = self.jobs.lock().await;
                let record = jobs
                    .get_mut(&job_id)
                    .ok_or_else(|| EngineError::UnknownJob(job_id.clone()))?;
                record.state = JobState::Queued;
                drop(jobs);
                self.emit(&job_id, StatusKind::StatusChanged, json!({ "state": "queued" }));
                Ok(json!(true))
            }
            EngineCommand::JobStatus { job_id } => {
                let jobs = self.jobs.lock().await;
                jobs.get(&job_id)
                    .map(Self::record_value)
                    .ok_or(EngineError::UnknownJob(job_id))
            }
            EngineCommand::ListJobs => {
                let jobs = self.jobs.lock().await;
                let mut listed: Vec<Value> = jobs.values().map(Self::record_value).collect();
                listed.sort_by_key(|v| v["job_id"].as_str().map(String::from));
                Ok(Value::Array(listed))
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<JobStatusChange> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn add(engine: &MemoryEngine, source: &str) -> String {
        let value = engine
            .execute(EngineCommand::AddJob {
                source: source.to_string(),
                options: serde_json::Map::new(),
            })
            .await
            .unwrap();
        value["job_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn add_then_status_roundtrip() {
        let engine = MemoryEngine::new();
        let job_id = add(&engine, "https://example.org/file.iso").await;

        let status = engine
            .execute(EngineCommand::JobStatus {
                job_id: job_id.clone(),
            })
            .await
            .unwrap();
        assert_eq!(status["source"], json!("https://example.org/file.iso"));
        assert_eq!(status["state"], json!("queued"));
    }

    #[tokio::test]
    async fn pause_and_resume_flip_state() {
        let engine = MemoryEngine::new();
        let job_id = add(&engine, "https://example.org/a").await;

        engine
            .execute(EngineCommand::PauseJob {
                job_id: job_id.clone(),
            })
            .await
            .unwrap();
        let status = engine
            .execute(EngineCommand::JobStatus {
                job_id: job_id.clone(),
            })
            .await
            .unwrap();
        assert_eq!(status["state"], json!("paused"));

        engine
            .execute(EngineCommand::ResumeJob {
                job_id: job_id.clone(),
            })
            .await
            .unwrap();
        let status = engine
            .execute(EngineCommand::JobStatus { job_id })
            .await
            .unwrap();
        assert_eq!(status["state"], json!("queued"));
    }

    #[tokio::test]
    async fn remove_unknown_job_is_an_error() {
        let engine = MemoryEngine::new();
        let err = engine
            .execute(EngineCommand::RemoveJob {
                job_id: "j-404".to_string(),
                remove_data: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownJob(_)));
    }

    #[tokio::test]
    async fn list_reports_all_jobs() {
        let engine = MemoryEngine::new();
        add(&engine, "https://example.org/a").await;
        add(&engine, "https://example.org/b").await;

        let listed = engine.execute(EngineCommand::ListJobs).await.unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn lifecycle_emits_status_changes() {
        let engine = MemoryEngine::new();
        let mut rx = engine.subscribe();

        let job_id = add(&engine, "https://example.org/a").await;
        engine
            .execute(EngineCommand::RemoveJob {
                job_id,
                remove_data: false,
            })
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().kind, StatusKind::Added);
        assert_eq!(rx.recv().await.unwrap().kind, StatusKind::Removed);
    }
}
