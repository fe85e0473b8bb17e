//! JobEngine trait and related types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::error::EngineError;

/// Commands the daemon issues to the engine on behalf of clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EngineCommand {
    AddJob {
        source: String,
        options: Map<String, Value>,
    },
    RemoveJob {
        job_id: String,
        remove_data: bool,
    },
    PauseJob {
        job_id: String,
    },
    ResumeJob {
        job_id: String,
    },
    JobStatus {
        job_id: String,
    },
    ListJobs,
}

/// Category of a status change, mapped onto a wire event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Added,
    Removed,
    StatusChanged,
    Progress,
}

impl StatusKind {
    pub fn event_name(self) -> &'static str {
        match self {
            StatusKind::Added => "job.added",
            StatusKind::Removed => "job.removed",
            StatusKind::StatusChanged => "job.status",
            StatusKind::Progress => "job.progress",
        }
    }
}

/// One status change reported by the engine.
#[derive(Debug, Clone)]
pub struct JobStatusChange {
    pub job_id: String,
    pub kind: StatusKind,
    pub detail: Value,
}

/// Trait for transfer/download engines.
///
/// Implementations execute job commands and broadcast status changes;
/// the daemon forwards those changes into the event fan-out.
#[async_trait]
pub trait JobEngine: Send + Sync {
    /// Execute one command, returning its result value.
    async fn execute(&self, command: EngineCommand) -> Result<Value, EngineError>;

    /// Subscribe to status changes reported by the engine.
    fn subscribe(&self) -> broadcast::Receiver<JobStatusChange>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_kind_maps_to_event_names() {
        assert_eq!(StatusKind::Added.event_name(), "job.added");
        assert_eq!(StatusKind::Removed.event_name(), "job.removed");
        assert_eq!(StatusKind::StatusChanged.event_name(), "job.status");
        assert_eq!(StatusKind::Progress.event_name(), "job.progress");
    }

    #[test]
    fn engine_command_serializes_tagged() {
        let cmd = EngineCommand::RemoveJob {
            job_id: "j-1".to_string(),
            remove_data: true,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains(r#""command":"remove_job""#));

        let parsed: EngineCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cmd);
    }

    #[test]
    fn job_engine_is_object_safe() {
        fn _takes_boxed_engine(_: Box<dyn JobEngine>) {}
    }
}
