//! In-memory engine used when no `REDIS_URL` is configured (local
//! development boots without a worker fleet) and as the test double. The
//! simulation controls below stand in for worker-side progress reports.

use super::{EngineError, StartRequest, WorkflowEngine, WorkflowHandle, WorkflowProgress, WorkflowState};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct WorkflowRecord {
    run_id: String,
    #[allow(dead_code)]
    workflow_type: String,
    progress: WorkflowProgress,
}

#[derive(Clone, Default)]
pub struct InMemoryEngine {
    workflows: Arc<RwLock<HashMap<String, WorkflowRecord>>>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered workflows; lets tests assert that a retried
    /// start did not create a duplicate.
    pub async fn workflow_count(&self) -> usize {
        self.workflows.read().await.len()
    }

    /// Simulate a worker progress report.
    pub async fn advance(&self, workflow_id: &str, step: &str, progress: u8) {
        self.update(workflow_id, |record| {
            record.progress.state = WorkflowState::Running;
            record.progress.step = step.to_string();
            record.progress.progress = progress.min(100);
            record.progress.updated_at = Some(Utc::now());
        })
        .await;
    }

    /// Simulate successful completion.
    pub async fn complete(&self, workflow_id: &str) {
        self.update(workflow_id, |record| {
            record.progress.state = WorkflowState::Completed;
            record.progress.step = "completed".to_string();
            record.progress.progress = 100;
            record.progress.updated_at = Some(Utc::now());
        })
        .await;
    }

    /// Simulate a terminal workflow failure.
    pub async fn fail(&self, workflow_id: &str, message: &str) {
        self.update(workflow_id, |record| {
            record.progress.state = WorkflowState::Failed;
            record.progress.step = "failed".to_string();
            record.progress.message = Some(message.to_string());
            record.progress.updated_at = Some(Utc::now());
        })
        .await;
    }

    /// Simulate the engine's retention window expiring a workflow record.
    pub async fn forget(&self, workflow_id: &str) {
        self.workflows.write().await.remove(workflow_id);
    }

    async fn update(&self, workflow_id: &str, apply: impl FnOnce(&mut WorkflowRecord)) {
        if let Some(record) = self.workflows.write().await.get_mut(workflow_id) {
            apply(record);
        }
    }
}

#[async_trait]
impl WorkflowEngine for InMemoryEngine {
    async fn start(&self, request: StartRequest) -> Result<WorkflowHandle, EngineError> {
        let mut workflows = self.workflows.write().await;
        if let Some(existing) = workflows.get(&request.workflow_id) {
            // A live or completed workflow deduplicates; a failed or
            // cancelled one is replaced by a fresh run so a retry under the
            // same deterministic id actually does new work.
            if !existing.progress.state.is_restartable() {
                return Err(EngineError::AlreadyStarted {
                    workflow_id: request.workflow_id,
                    run_id: existing.run_id.clone(),
                });
            }
        }

        let run_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        workflows.insert(
            request.workflow_id.clone(),
            WorkflowRecord {
                run_id: run_id.clone(),
                workflow_type: request.workflow_type,
                progress: WorkflowProgress {
                    state: WorkflowState::Running,
                    step: "queued".to_string(),
                    progress: 0,
                    message: None,
                    started_at: Some(now),
                    updated_at: Some(now),
                },
            },
        );

        Ok(WorkflowHandle {
            workflow_id: request.workflow_id,
            run_id,
        })
    }

    async fn query(&self, workflow_id: &str) -> Result<WorkflowProgress, EngineError> {
        self.workflows
            .read()
            .await
            .get(workflow_id)
            .map(|record| record.progress.clone())
            .ok_or(EngineError::NotFound)
    }

    async fn signal(
        &self,
        workflow_id: &str,
        signal: &str,
        _payload: serde_json::Value,
    ) -> Result<(), EngineError> {
        let mut workflows = self.workflows.write().await;
        let record = workflows.get_mut(workflow_id).ok_or(EngineError::NotFound)?;

        // A real engine delivers the signal and lets the workflow observe it
        // at its next checkpoint; the double reacts immediately.
        if signal == crate::gateway::CANCEL_SIGNAL {
            record.progress.state = WorkflowState::Cancelled;
            record.progress.step = "cancelled".to_string();
            record.progress.message = Some("cancellation requested".to_string());
            record.progress.updated_at = Some(Utc::now());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowTimeouts;

    fn start_request(workflow_id: &str) -> StartRequest {
        StartRequest {
            workflow_type: "provision-tenant".to_string(),
            workflow_id: workflow_id.to_string(),
            input: serde_json::json!({}),
            timeouts: WorkflowTimeouts::provisioning_defaults(),
        }
    }

    #[tokio::test]
    async fn running_workflow_deduplicates_on_the_existing_run() {
        let engine = InMemoryEngine::new();
        let handle = engine.start(start_request("wf-1")).await.unwrap();

        let err = engine.start(start_request("wf-1")).await.unwrap_err();
        match err {
            EngineError::AlreadyStarted { run_id, .. } => assert_eq!(run_id, handle.run_id),
            other => panic!("expected AlreadyStarted, got {other:?}"),
        }
        assert_eq!(engine.workflow_count().await, 1);
    }

    #[tokio::test]
    async fn failed_workflow_restarts_with_a_fresh_run() {
        let engine = InMemoryEngine::new();
        let first = engine.start(start_request("wf-1")).await.unwrap();
        engine.fail("wf-1", "schema bootstrap failed").await;

        let second = engine.start(start_request("wf-1")).await.unwrap();
        assert_ne!(second.run_id, first.run_id);

        let progress = engine.query("wf-1").await.unwrap();
        assert_eq!(progress.state, WorkflowState::Running);
        assert_eq!(progress.step, "queued");
        assert_eq!(progress.progress, 0);
        assert!(progress.message.is_none());
    }

    #[tokio::test]
    async fn cancelled_workflow_restarts_with_a_fresh_run() {
        let engine = InMemoryEngine::new();
        let first = engine.start(start_request("wf-1")).await.unwrap();
        engine
            .signal("wf-1", crate::gateway::CANCEL_SIGNAL, serde_json::json!({}))
            .await
            .unwrap();

        let second = engine.start(start_request("wf-1")).await.unwrap();
        assert_ne!(second.run_id, first.run_id);
        assert_eq!(
            engine.query("wf-1").await.unwrap().state,
            WorkflowState::Running
        );
    }

    #[tokio::test]
    async fn completed_workflow_does_not_restart() {
        let engine = InMemoryEngine::new();
        let handle = engine.start(start_request("wf-1")).await.unwrap();
        engine.complete("wf-1").await;

        let err = engine.start(start_request("wf-1")).await.unwrap_err();
        match err {
            EngineError::AlreadyStarted { run_id, .. } => assert_eq!(run_id, handle.run_id),
            other => panic!("expected AlreadyStarted, got {other:?}"),
        }
    }
}
