//! Job control operations bridged to the engine

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use haul_plugin_api::{CallArgs, CallContext, Handler, HandlerError};

use crate::engine::{EngineCommand, JobEngine};

/// Builds an engine command from call arguments.
pub type CommandBuilder = fn(&CallArgs) -> Result<EngineCommand, HandlerError>;

/// A job operation: argument mapping plus one engine round trip.
pub struct JobOp {
    engine: Arc<dyn JobEngine>,
    build: CommandBuilder,
}

impl JobOp {
    pub fn new(engine: Arc<dyn JobEngine>, build: CommandBuilder) -> Self {
        Self { engine, build }
    }
}

#[async_trait]
impl Handler for JobOp {
    async fn call(&self, _ctx: &CallContext, args: &CallArgs) -> Result<Value, HandlerError> {
        let command = (self.build)(args)?;
        self.engine
            .execute(command)
            .await
            .map_err(|e| HandlerError::failed(e.to_string()))
    }
}

pub fn build_add(args: &CallArgs) -> Result<EngineCommand, HandlerError> {
    Ok(EngineCommand::AddJob {
        source: args.string(0, "source")?.to_string(),
        options: args.object_or_default(1, "options")?,
    })
}

pub fn build_remove(args: &CallArgs) -> Result<EngineCommand, HandlerError> {
    Ok(EngineCommand::RemoveJob {
        job_id: args.string(0, "job_id")?.to_string(),
        remove_data: args.bool_or(1, "remove_data", false)?,
    })
}

pub fn build_pause(args: &CallArgs) -> Result<EngineCommand, HandlerError> {
    Ok(EngineCommand::PauseJob {
        job_id: args.string(0, "job_id")?.to_string(),
    })
}

pub fn build_resume(args: &CallArgs) -> Result<EngineCommand, HandlerError> {
    Ok(EngineCommand::ResumeJob {
        job_id: args.string(0, "job_id")?.to_string(),
    })
}

pub fn build_status(args: &CallArgs) -> Result<EngineCommand, HandlerError> {
    Ok(EngineCommand::JobStatus {
        job_id: args.string(0, "job_id")?.to_string(),
    })
}

pub fn build_list(_args: &CallArgs) -> Result<EngineCommand, HandlerError> {
    Ok(EngineCommand::ListJobs)
}
