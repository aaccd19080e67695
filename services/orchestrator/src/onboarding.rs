//! User onboarding: a per-invitation instance of the start/query pattern.
//!
//! Shares the idempotency key generator and the workflow gateway but keeps
//! no tenant-wide state of its own; the only state is the invitation
//! workflow's progress, queried on demand. Two invitations for different
//! emails on the same tenant derive distinct deterministic ids and never
//! interfere.

use crate::engine::WorkflowProgress;
use crate::gateway::{QueryError, StartError, StartOutcome, WorkflowGateway};
use dto::UserProvisioningRequest;
use std::sync::Arc;

const USER_WORKFLOW_PREFIX: &str = "provision-user-";

#[derive(Clone)]
pub struct UserOnboarding {
    gateway: Arc<WorkflowGateway>,
}

impl UserOnboarding {
    pub fn new(gateway: Arc<WorkflowGateway>) -> Self {
        Self { gateway }
    }

    pub async fn invite(
        &self,
        request: &UserProvisioningRequest,
    ) -> Result<StartOutcome, StartError> {
        if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
            return Err(StartError::Validation(
                "firstName and lastName are required".into(),
            ));
        }
        self.gateway.start_user_provisioning(request).await
    }

    /// Status lookup by the workflow id handed back from [`invite`].
    ///
    /// Only user-provisioning ids are accepted; tenant-wide workflow ids are
    /// not this sub-orchestrator's business.
    pub async fn status(&self, workflow_id: &str) -> Result<WorkflowProgress, QueryError> {
        if !workflow_id.starts_with(USER_WORKFLOW_PREFIX) {
            return Err(QueryError::NotFound);
        }
        self.gateway.query_workflow(workflow_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::engine::InMemoryEngine;
    use uuid::Uuid;

    fn invite_request(tenant_id: Uuid, email: &str) -> UserProvisioningRequest {
        UserProvisioningRequest {
            tenant_id,
            tenant_key: "acme".to_string(),
            tenant_name: "Acme Corp".to_string(),
            email: email.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            password: None,
            role: Some("member".to_string()),
            metadata: None,
            app_url: "https://acme.platform.example.com".to_string(),
            login_url: "https://acme.platform.example.com/login".to_string(),
        }
    }

    fn onboarding(engine: Arc<InMemoryEngine>) -> UserOnboarding {
        let gateway = Arc::new(WorkflowGateway::new(engine, &OrchestratorConfig::default()));
        UserOnboarding::new(gateway)
    }

    #[tokio::test]
    async fn concurrent_invitations_for_different_emails_do_not_interfere() {
        let engine = Arc::new(InMemoryEngine::new());
        let onboarding = onboarding(engine.clone());
        let tenant_id = Uuid::new_v4();

        let ada = invite_request(tenant_id, "ada@example.com");
        let grace = invite_request(tenant_id, "grace@example.com");
        let (a, b) = tokio::join!(onboarding.invite(&ada), onboarding.invite(&grace),);
        let a = a.unwrap();
        let b = b.unwrap();

        assert_ne!(a.handle.workflow_id, b.handle.workflow_id);
        assert!(!a.already_running);
        assert!(!b.already_running);
        assert_eq!(engine.workflow_count().await, 2);
    }

    #[tokio::test]
    async fn repeated_invitation_for_one_email_is_idempotent() {
        let engine = Arc::new(InMemoryEngine::new());
        let onboarding = onboarding(engine.clone());
        let tenant_id = Uuid::new_v4();

        let first = onboarding
            .invite(&invite_request(tenant_id, "ada@example.com"))
            .await
            .unwrap();
        let second = onboarding
            .invite(&invite_request(tenant_id, "Ada@Example.com "))
            .await
            .unwrap();

        assert!(second.already_running);
        assert_eq!(first.handle.workflow_id, second.handle.workflow_id);
        assert_eq!(engine.workflow_count().await, 1);
    }

    #[tokio::test]
    async fn invalid_email_is_rejected_up_front() {
        let engine = Arc::new(InMemoryEngine::new());
        let onboarding = onboarding(engine.clone());
        let err = onboarding
            .invite(&invite_request(Uuid::new_v4(), "not-an-email"))
            .await
            .unwrap_err();
        assert!(matches!(err, StartError::Validation(_)));
        assert_eq!(engine.workflow_count().await, 0);
    }

    #[tokio::test]
    async fn status_rejects_non_user_workflow_ids() {
        let onboarding = onboarding(Arc::new(InMemoryEngine::new()));
        let err = onboarding
            .status("provision-tenant-00000000-0000-0000-0000-000000000000")
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::NotFound));
    }
}
