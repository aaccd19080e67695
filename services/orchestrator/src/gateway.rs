//! Workflow gateway: the client abstraction over the execution engine.
//!
//! Every start call validates its input first, derives the deterministic
//! workflow id, and submits with bounded timeouts. "Already started" from
//! the engine is classified as a success branch ([`StartOutcome::already_running`])
//! because the deterministic id guarantees it is the same logical request.

use crate::config::{OrchestratorConfig, WorkflowTimeouts};
use crate::engine::{EngineError, StartRequest, WorkflowEngine, WorkflowHandle, WorkflowProgress};
use crate::workflow_id::{
    deprovisioning_workflow_id, provisioning_workflow_id, user_provisioning_workflow_id,
};
use dto::{DeprovisionOptions, ProvisioningRequest, UserProvisioningRequest};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const CANCEL_SIGNAL: &str = "cancel";

pub const PROVISION_TENANT_WORKFLOW: &str = "provision-tenant";
pub const DEPROVISION_TENANT_WORKFLOW: &str = "deprovision-tenant";
pub const PROVISION_USER_WORKFLOW: &str = "provision-user";

#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub handle: WorkflowHandle,
    /// True when the engine reported the deterministic id already live; the
    /// caller still sees an accepted request.
    pub already_running: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// Fatal: the caller must fix its input; never retried automatically.
    #[error("invalid request: {0}")]
    Validation(String),
    /// Retryable by the caller with backoff; the gateway performs no
    /// implicit retry loop of its own.
    #[error("engine unavailable: {0}")]
    Transport(String),
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("workflow not found")]
    NotFound,
    #[error("engine unavailable: {0}")]
    Transport(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CancelError {
    #[error("workflow not found")]
    NotFound,
    #[error("engine unavailable: {0}")]
    Transport(String),
}

#[derive(Clone)]
pub struct WorkflowGateway {
    engine: Arc<dyn WorkflowEngine>,
    provisioning_timeouts: WorkflowTimeouts,
    user_provisioning_timeouts: WorkflowTimeouts,
    call_timeout: Duration,
}

impl WorkflowGateway {
    pub fn new(engine: Arc<dyn WorkflowEngine>, config: &OrchestratorConfig) -> Self {
        Self {
            engine,
            provisioning_timeouts: config.provisioning,
            user_provisioning_timeouts: config.user_provisioning,
            call_timeout: config.call_timeout,
        }
    }

    pub async fn start_provisioning(
        &self,
        request: &ProvisioningRequest,
    ) -> Result<StartOutcome, StartError> {
        validate_tenant_key(&request.tenant_key)?;
        if request.subscription_id.trim().is_empty() {
            return Err(StartError::Validation("subscriptionId is required".into()));
        }

        let workflow_id = provisioning_workflow_id(request.tenant_id);
        // The idempotency key is identity-only; log the plan so a colliding
        // request with different commercial content is at least observable.
        tracing::info!(
            %workflow_id,
            tenant_id = %request.tenant_id,
            plan_id = %request.plan_id,
            tier = %request.tier,
            "submitting provisioning workflow"
        );

        self.submit(StartRequest {
            workflow_type: PROVISION_TENANT_WORKFLOW.to_string(),
            workflow_id,
            input: to_input(request)?,
            timeouts: self.provisioning_timeouts,
        })
        .await
    }

    pub async fn start_deprovisioning(
        &self,
        tenant_id: Uuid,
        options: &DeprovisionOptions,
    ) -> Result<StartOutcome, StartError> {
        let workflow_id = deprovisioning_workflow_id(tenant_id);
        let timeouts = WorkflowTimeouts::for_deprovisioning(options.grace_period_days);
        tracing::info!(
            %workflow_id,
            %tenant_id,
            grace_period_days = options.grace_period_days,
            execution_timeout_secs = timeouts.execution.as_secs(),
            "submitting deprovisioning workflow"
        );

        self.submit(StartRequest {
            workflow_type: DEPROVISION_TENANT_WORKFLOW.to_string(),
            workflow_id,
            input: to_input(options)?,
            timeouts,
        })
        .await
    }

    pub async fn start_user_provisioning(
        &self,
        request: &UserProvisioningRequest,
    ) -> Result<StartOutcome, StartError> {
        validate_tenant_key(&request.tenant_key)?;
        validate_email(&request.email)?;

        let workflow_id = user_provisioning_workflow_id(request.tenant_id, &request.email);
        tracing::info!(%workflow_id, tenant_id = %request.tenant_id, "submitting user provisioning workflow");

        self.submit(StartRequest {
            workflow_type: PROVISION_USER_WORKFLOW.to_string(),
            workflow_id,
            input: to_input(request)?,
            timeouts: self.user_provisioning_timeouts,
        })
        .await
    }

    pub async fn query_provisioning_status(
        &self,
        tenant_id: Uuid,
    ) -> Result<WorkflowProgress, QueryError> {
        self.query(&provisioning_workflow_id(tenant_id)).await
    }

    pub async fn query_deprovisioning_status(
        &self,
        tenant_id: Uuid,
    ) -> Result<WorkflowProgress, QueryError> {
        self.query(&deprovisioning_workflow_id(tenant_id)).await
    }

    pub async fn query_workflow(&self, workflow_id: &str) -> Result<WorkflowProgress, QueryError> {
        self.query(workflow_id).await
    }

    /// Deliver a cooperative cancellation signal to the provisioning
    /// workflow. Fire-and-forget: callers poll status to observe the
    /// eventual terminal transition.
    pub async fn cancel(&self, tenant_id: Uuid) -> Result<(), CancelError> {
        let workflow_id = provisioning_workflow_id(tenant_id);
        let payload = serde_json::json!({ "requestedAt": chrono::Utc::now() });

        let result = tokio::time::timeout(
            self.call_timeout,
            self.engine.signal(&workflow_id, CANCEL_SIGNAL, payload),
        )
        .await;

        match result {
            Err(_) => Err(CancelError::Transport("signal timed out".into())),
            Ok(Ok(())) => {
                tracing::info!(%workflow_id, "cancellation signal delivered");
                Ok(())
            }
            Ok(Err(EngineError::NotFound)) => Err(CancelError::NotFound),
            Ok(Err(err)) => Err(CancelError::Transport(err.to_string())),
        }
    }

    async fn submit(&self, request: StartRequest) -> Result<StartOutcome, StartError> {
        let result = tokio::time::timeout(self.call_timeout, self.engine.start(request)).await;

        match result {
            Err(_) => Err(StartError::Transport("start request timed out".into())),
            Ok(Ok(handle)) => Ok(StartOutcome {
                handle,
                already_running: false,
            }),
            Ok(Err(EngineError::AlreadyStarted { workflow_id, run_id })) => {
                tracing::info!(%workflow_id, "workflow already running, treating start as idempotent success");
                Ok(StartOutcome {
                    handle: WorkflowHandle { workflow_id, run_id },
                    already_running: true,
                })
            }
            Ok(Err(EngineError::InvalidRequest(msg))) => Err(StartError::Validation(msg)),
            Ok(Err(err)) => Err(StartError::Transport(err.to_string())),
        }
    }

    async fn query(&self, workflow_id: &str) -> Result<WorkflowProgress, QueryError> {
        let result = tokio::time::timeout(self.call_timeout, self.engine.query(workflow_id)).await;

        match result {
            Err(_) => Err(QueryError::Transport("status query timed out".into())),
            Ok(Ok(progress)) => Ok(progress),
            Ok(Err(EngineError::NotFound)) => Err(QueryError::NotFound),
            Ok(Err(err)) => Err(QueryError::Transport(err.to_string())),
        }
    }
}

fn to_input<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, StartError> {
    serde_json::to_value(value).map_err(|err| StartError::Validation(err.to_string()))
}

pub(crate) fn validate_tenant_key(key: &str) -> Result<(), StartError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StartError::Validation(format!(
            "tenantKey '{key}' must be a lowercase URL-safe slug"
        )))
    }
}

fn validate_email(email: &str) -> Result<(), StartError> {
    let trimmed = email.trim();
    if trimmed.contains('@') && !trimmed.starts_with('@') && !trimmed.ends_with('@') {
        Ok(())
    } else {
        Err(StartError::Validation(format!("invalid email '{email}'")))
    }
}
