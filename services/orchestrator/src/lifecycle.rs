//! Tenant lifecycle state machine: owns the status column and applies legal
//! transitions as single optimistic writes. Losing a status race is an
//! expected outcome, logged at debug and reported as [`TransitionError::Conflict`]
//! so callers can discard it without surfacing a user-facing error.

use crate::store::{StoreError, TenantStore};
use models::{Tenant, TenantStatus};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("invalid tenant status transition {from} -> {to}")]
    InvalidTransition { from: TenantStatus, to: TenantStatus },
    #[error("tenant not found")]
    TenantNotFound,
    /// A concurrent writer won; its intended state is already stored.
    #[error("concurrent status update won the race")]
    Conflict,
    #[error(transparent)]
    Store(StoreError),
}

#[derive(Clone)]
pub struct TenantLifecycle {
    store: Arc<dyn TenantStore>,
}

impl TenantLifecycle {
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        Self { store }
    }

    pub async fn current(&self, tenant_id: Uuid) -> Result<Tenant, TransitionError> {
        match self.store.find(tenant_id).await {
            Ok(Some(tenant)) => Ok(tenant),
            Ok(None) => Err(TransitionError::TenantNotFound),
            Err(err) => Err(TransitionError::Store(err)),
        }
    }

    /// Pure legality check, used to reject a start before any engine call.
    pub fn ensure_transition_allowed(
        from: TenantStatus,
        to: TenantStatus,
    ) -> Result<(), TransitionError> {
        if from.can_transition_to(to) {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }

    /// Apply `from -> to` as one atomic read-modify-write.
    ///
    /// Re-applying a transition whose target is already stored is a no-op
    /// success: that is what makes `PENDING -> PROVISIONING` idempotent when
    /// the engine reports the workflow already running.
    pub async fn apply_transition(
        &self,
        tenant_id: Uuid,
        from: TenantStatus,
        to: TenantStatus,
    ) -> Result<(), TransitionError> {
        if from == to {
            return Ok(());
        }
        Self::ensure_transition_allowed(from, to)?;

        match self.store.update_status(tenant_id, from, to).await {
            Ok(()) => {
                tracing::info!(%tenant_id, %from, %to, "tenant status updated");
                Ok(())
            }
            Err(StoreError::Conflict) => match self.store.find(tenant_id).await {
                Ok(Some(tenant)) if tenant.status == to => {
                    tracing::debug!(%tenant_id, %to, "transition already applied, treating as no-op");
                    Ok(())
                }
                Ok(Some(tenant)) => {
                    tracing::debug!(%tenant_id, current = %tenant.status, intended = %to, "lost status race");
                    Err(TransitionError::Conflict)
                }
                Ok(None) => Err(TransitionError::TenantNotFound),
                Err(err) => Err(TransitionError::Store(err)),
            },
            Err(StoreError::NotFound) => Err(TransitionError::TenantNotFound),
            Err(err) => Err(TransitionError::Store(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryTenantStore;
    use chrono::Utc;
    use models::DeploymentTier;

    fn tenant(status: TenantStatus) -> Tenant {
        Tenant {
            id: Uuid::new_v4(),
            key: "acme".to_string(),
            name: "Acme Corp".to_string(),
            deployment_tier: DeploymentTier::Pooled,
            status,
            domains: vec![],
            contacts: vec![],
            address: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn applies_legal_transition() {
        let store = Arc::new(InMemoryTenantStore::new());
        let t = tenant(TenantStatus::Pending);
        store.insert(&t).await.unwrap();

        let lifecycle = TenantLifecycle::new(store.clone());
        lifecycle
            .apply_transition(t.id, TenantStatus::Pending, TenantStatus::Provisioning)
            .await
            .unwrap();
        assert_eq!(
            store.find(t.id).await.unwrap().unwrap().status,
            TenantStatus::Provisioning
        );
    }

    #[tokio::test]
    async fn rejects_illegal_transition_before_touching_the_store() {
        let lifecycle = TenantLifecycle::new(Arc::new(InMemoryTenantStore::new()));
        // Tenant does not even exist; the edge check fails first.
        let err = lifecycle
            .apply_transition(
                Uuid::new_v4(),
                TenantStatus::Provisioning,
                TenantStatus::Deprovisioning,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn reapplying_an_applied_transition_is_a_noop_success() {
        let store = Arc::new(InMemoryTenantStore::new());
        let t = tenant(TenantStatus::Pending);
        store.insert(&t).await.unwrap();

        let lifecycle = TenantLifecycle::new(store.clone());
        lifecycle
            .apply_transition(t.id, TenantStatus::Pending, TenantStatus::Provisioning)
            .await
            .unwrap();
        // Second caller raced us with the same intent; stored state already
        // matches the target, so this is a success.
        lifecycle
            .apply_transition(t.id, TenantStatus::Pending, TenantStatus::Provisioning)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn losing_a_race_to_a_different_state_reports_conflict() {
        let store = Arc::new(InMemoryTenantStore::new());
        let t = tenant(TenantStatus::Provisioning);
        store.insert(&t).await.unwrap();

        let lifecycle = TenantLifecycle::new(store.clone());
        // Another writer already moved Provisioning -> Active.
        store
            .update_status(t.id, TenantStatus::Provisioning, TenantStatus::Active)
            .await
            .unwrap();

        let err = lifecycle
            .apply_transition(t.id, TenantStatus::Provisioning, TenantStatus::ProvisionFailed)
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::Conflict));
        assert_eq!(
            store.find(t.id).await.unwrap().unwrap().status,
            TenantStatus::Active
        );
    }

    #[tokio::test]
    async fn missing_tenant_is_reported_as_not_found() {
        let lifecycle = TenantLifecycle::new(Arc::new(InMemoryTenantStore::new()));
        let err = lifecycle
            .apply_transition(Uuid::new_v4(), TenantStatus::Pending, TenantStatus::Provisioning)
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::TenantNotFound));
    }
}
