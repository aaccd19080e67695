//! Status projection: answers "how far along is this tenant" by querying
//! the engine live and reconciling against the stored tenant row.
//!
//! The tenant's stored status is the system of record; the engine's view is
//! a live-progress optimization. A workflow that has expired from the
//! engine's retention window therefore synthesizes a terminal status when
//! the tenant row already records the durable outcome, and a
//! workflow-reported terminal state drives the lifecycle machine forward on
//! the next poll rather than surfacing as a query error.

use crate::engine::{WorkflowProgress, WorkflowState};
use crate::gateway::{QueryError, WorkflowGateway};
use crate::lifecycle::{TenantLifecycle, TransitionError};
use dto::ProvisioningStatus;
use models::{Tenant, TenantStatus};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("no provisioning status for tenant")]
    NotFound,
    #[error("status backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone)]
pub struct StatusProjection {
    gateway: Arc<WorkflowGateway>,
    lifecycle: TenantLifecycle,
}

impl StatusProjection {
    pub fn new(gateway: Arc<WorkflowGateway>, lifecycle: TenantLifecycle) -> Self {
        Self { gateway, lifecycle }
    }

    pub async fn get_status(&self, tenant_id: Uuid) -> Result<ProvisioningStatus, ProjectionError> {
        let tenant = match self.lifecycle.current(tenant_id).await {
            Ok(tenant) => tenant,
            Err(TransitionError::TenantNotFound) => return Err(ProjectionError::NotFound),
            Err(err) => return Err(ProjectionError::Unavailable(err.to_string())),
        };

        let deprovisioning = matches!(
            tenant.status,
            TenantStatus::Deprovisioning | TenantStatus::Deprovisioned
        );
        let live = if deprovisioning {
            self.gateway.query_deprovisioning_status(tenant_id).await
        } else {
            self.gateway.query_provisioning_status(tenant_id).await
        };

        match live {
            Ok(progress) => {
                self.reconcile(&tenant, &progress, deprovisioning).await;
                Ok(to_status(progress))
            }
            Err(QueryError::NotFound) => match tenant.status {
                // The engine may have garbage-collected the workflow record;
                // the durable outcome lives in the tenant row.
                TenantStatus::Active | TenantStatus::Deprovisioned => Ok(synthesized(&tenant)),
                _ => Err(ProjectionError::NotFound),
            },
            Err(QueryError::Transport(msg)) => Err(ProjectionError::Unavailable(msg)),
        }
    }

    /// Fold a workflow-reported terminal state into the tenant row. A lost
    /// race or an edge we no longer hold is discarded: the winning writer's
    /// state already reflects the outcome.
    async fn reconcile(&self, tenant: &Tenant, progress: &WorkflowProgress, deprovisioning: bool) {
        let next = match (deprovisioning, tenant.status, progress.state) {
            (false, TenantStatus::Provisioning, WorkflowState::Completed) => TenantStatus::Active,
            (false, TenantStatus::Provisioning, WorkflowState::Failed) => {
                TenantStatus::ProvisionFailed
            }
            (false, TenantStatus::Provisioning, WorkflowState::Cancelled) => TenantStatus::Cancelled,
            (true, TenantStatus::Deprovisioning, WorkflowState::Completed) => {
                TenantStatus::Deprovisioned
            }
            (true, TenantStatus::Deprovisioning, WorkflowState::Failed)
            | (true, TenantStatus::Deprovisioning, WorkflowState::Cancelled) => {
                TenantStatus::Cancelled
            }
            _ => return,
        };

        match self
            .lifecycle
            .apply_transition(tenant.id, tenant.status, next)
            .await
        {
            Ok(()) => {}
            Err(TransitionError::Conflict) | Err(TransitionError::InvalidTransition { .. }) => {
                tracing::debug!(tenant_id = %tenant.id, intended = %next, "terminal reconciliation lost a race");
            }
            Err(err) => {
                tracing::warn!(tenant_id = %tenant.id, error = %err, "failed to record terminal tenant status");
            }
        }
    }
}

pub(crate) fn to_status(progress: WorkflowProgress) -> ProvisioningStatus {
    let message = match (&progress.state, progress.message) {
        (WorkflowState::Failed, None) => Some("provisioning failed".to_string()),
        (_, message) => message,
    };
    ProvisioningStatus {
        step: progress.step,
        progress: progress.progress,
        message,
        started_at: progress.started_at,
        updated_at: progress.updated_at,
    }
}

fn synthesized(tenant: &Tenant) -> ProvisioningStatus {
    ProvisioningStatus {
        step: "completed".to_string(),
        progress: 100,
        message: None,
        started_at: Some(tenant.created_at),
        updated_at: Some(tenant.updated_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OrchestratorConfig, WorkflowTimeouts};
    use crate::engine::{InMemoryEngine, StartRequest, WorkflowEngine};
    use crate::store::{InMemoryTenantStore, TenantStore};
    use chrono::Utc;
    use models::DeploymentTier;

    struct Fixture {
        engine: Arc<InMemoryEngine>,
        store: Arc<InMemoryTenantStore>,
        gateway: Arc<WorkflowGateway>,
        projection: StatusProjection,
    }

    fn fixture() -> Fixture {
        let engine = Arc::new(InMemoryEngine::new());
        let store = Arc::new(InMemoryTenantStore::new());
        let gateway = Arc::new(WorkflowGateway::new(
            engine.clone(),
            &OrchestratorConfig::default(),
        ));
        let lifecycle = TenantLifecycle::new(store.clone());
        let projection = StatusProjection::new(gateway.clone(), lifecycle);
        Fixture {
            engine,
            store,
            gateway,
            projection,
        }
    }

    async fn seed_tenant(store: &InMemoryTenantStore, status: TenantStatus) -> Uuid {
        let tenant = Tenant {
            id: Uuid::new_v4(),
            key: "acme".to_string(),
            name: "Acme Corp".to_string(),
            deployment_tier: DeploymentTier::Silo,
            status,
            domains: vec![],
            contacts: vec![],
            address: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.insert(&tenant).await.unwrap();
        tenant.id
    }

    #[tokio::test]
    async fn synthesizes_completed_status_for_expired_active_tenant() {
        let f = fixture();
        let tenant_id = seed_tenant(&f.store, TenantStatus::Active).await;
        // Nothing registered in the engine at all.
        let status = f.projection.get_status(tenant_id).await.unwrap();
        assert_eq!(status.step, "completed");
        assert_eq!(status.progress, 100);
    }

    #[tokio::test]
    async fn not_found_for_tenant_that_never_started() {
        let f = fixture();
        let tenant_id = seed_tenant(&f.store, TenantStatus::Pending).await;
        let err = f.projection.get_status(tenant_id).await.unwrap_err();
        assert!(matches!(err, ProjectionError::NotFound));
    }

    #[tokio::test]
    async fn unknown_tenant_is_not_found() {
        let f = fixture();
        let err = f.projection.get_status(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ProjectionError::NotFound));
    }

    #[tokio::test]
    async fn completed_workflow_drives_tenant_to_active() {
        let f = fixture();
        let tenant_id = seed_tenant(&f.store, TenantStatus::Provisioning).await;

        let request = dto::ProvisioningRequest {
            tenant_id,
            tenant_key: "acme".to_string(),
            tenant_name: "Acme Corp".to_string(),
            tier: "enterprise".to_string(),
            domains: vec![],
            contacts: vec![],
            address: None,
            subscription_id: "sub-1".to_string(),
            plan_id: "plan-enterprise-annual".to_string(),
            idp_config: None,
            infrastructure_config: None,
            notification_config: dto::NotificationConfig {
                from_address: "noreply@example.com".to_string(),
                welcome_template: None,
                reply_to: None,
            },
        };
        let outcome = f.gateway.start_provisioning(&request).await.unwrap();
        f.engine.complete(&outcome.handle.workflow_id).await;

        let status = f.projection.get_status(tenant_id).await.unwrap();
        assert_eq!(status.progress, 100);
        assert_eq!(
            f.store.find(tenant_id).await.unwrap().unwrap().status,
            TenantStatus::Active
        );
    }

    #[tokio::test]
    async fn failed_workflow_surfaces_as_status_not_as_error() {
        let f = fixture();
        let tenant_id = seed_tenant(&f.store, TenantStatus::Provisioning).await;

        let workflow_id = crate::workflow_id::provisioning_workflow_id(tenant_id);
        f.engine
            .start(StartRequest {
                workflow_type: "provision-tenant".to_string(),
                workflow_id: workflow_id.clone(),
                input: serde_json::json!({}),
                timeouts: WorkflowTimeouts::provisioning_defaults(),
            })
            .await
            .unwrap();
        f.engine.fail(&workflow_id, "realm creation failed").await;

        let status = f.projection.get_status(tenant_id).await.unwrap();
        assert_eq!(status.message.as_deref(), Some("realm creation failed"));
        assert_eq!(
            f.store.find(tenant_id).await.unwrap().unwrap().status,
            TenantStatus::ProvisionFailed
        );
    }
}
