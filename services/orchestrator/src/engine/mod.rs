//! Client seam for the durable workflow execution engine.
//!
//! The orchestrator never implements workflow execution itself; it submits
//! start requests, queries progress, and delivers signals through this trait.
//! Engine-specific failures are classified into [`EngineError`] so callers
//! see orchestration-level outcomes ("already started" is not a transport
//! failure) instead of raw engine exceptions.

use crate::config::WorkflowTimeouts;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

mod memory;
mod redis;

pub use self::memory::InMemoryEngine;
pub use self::redis::RedisEngine;

/// Opaque reference to a started workflow: the deterministic workflow id
/// plus the engine-assigned run id. Recomputable from tenant identity, so it
/// is never persisted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowHandle {
    pub workflow_id: String,
    pub run_id: String,
}

#[derive(Debug, Clone)]
pub struct StartRequest {
    /// Workflow type registered with the worker fleet, e.g. "provision-tenant".
    pub workflow_type: String,
    /// Deterministic id; the engine deduplicates on it.
    pub workflow_id: String,
    pub input: serde_json::Value,
    pub timeouts: WorkflowTimeouts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowState {
    /// A failed or cancelled workflow permits a fresh run under the same
    /// deterministic id; a running workflow deduplicates and a completed
    /// one never restarts.
    pub fn is_restartable(&self) -> bool {
        matches!(self, WorkflowState::Failed | WorkflowState::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Running => "running",
            WorkflowState::Completed => "completed",
            WorkflowState::Failed => "failed",
            WorkflowState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(WorkflowState::Running),
            "completed" => Ok(WorkflowState::Completed),
            "failed" => Ok(WorkflowState::Failed),
            "cancelled" => Ok(WorkflowState::Cancelled),
            other => Err(format!("unknown workflow state '{other}'")),
        }
    }
}

/// Worker-reported progress for one workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowProgress {
    pub state: WorkflowState,
    pub step: String,
    pub progress: u8,
    pub message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The deterministic id already has a live workflow. A success branch
    /// for callers, surfaced here so the gateway can classify it.
    #[error("workflow {workflow_id} already started")]
    AlreadyStarted { workflow_id: String, run_id: String },
    /// Never started, or started and since expired from the engine's
    /// retention window. Callers disambiguate against the tenant row.
    #[error("workflow not found")]
    NotFound,
    #[error("invalid start request: {0}")]
    InvalidRequest(String),
    #[error("engine transport failure: {0}")]
    Transport(String),
    #[error("workflow execution failed: {0}")]
    ExecutionFailed(String),
}

/// Durable workflow engine client: start, query, signal.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    async fn start(&self, request: StartRequest) -> Result<WorkflowHandle, EngineError>;

    async fn query(&self, workflow_id: &str) -> Result<WorkflowProgress, EngineError>;

    /// Deliver a cooperative signal. Fire-and-forget: the workflow observes
    /// it at its next checkpoint, so callers poll status afterwards.
    async fn signal(
        &self,
        workflow_id: &str,
        signal: &str,
        payload: serde_json::Value,
    ) -> Result<(), EngineError>;
}
