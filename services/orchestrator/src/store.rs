//! Tenant persistence. The status column is the only shared mutable
//! resource in the subsystem; `update_status` is an optimistic
//! read-modify-write keyed on the expected current value.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use models::{DeploymentTier, Tenant, TenantStatus};
use sqlx::{Pool, Postgres, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The optimistic predicate missed: another writer moved the status
    /// first. Expected under concurrent callers.
    #[error("tenant status changed concurrently")]
    Conflict,
    #[error("tenant not found")]
    NotFound,
    #[error("corrupt tenant row: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn find(&self, tenant_id: Uuid) -> Result<Option<Tenant>, StoreError>;

    async fn insert(&self, tenant: &Tenant) -> Result<(), StoreError>;

    /// Write `next` only if the stored status is still `expected`.
    async fn update_status(
        &self,
        tenant_id: Uuid,
        expected: TenantStatus,
        next: TenantStatus,
    ) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgTenantStore {
    pool: Pool<Postgres>,
}

impl PgTenantStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn corrupt(err: impl ToString) -> StoreError {
    StoreError::Corrupt(err.to_string())
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn find(&self, tenant_id: Uuid) -> Result<Option<Tenant>, StoreError> {
        let row = sqlx::query(
            r#"
                SELECT id, key, name, deployment_tier, status, domains,
                       contacts, address, created_at, updated_at
                FROM tenants
                WHERE id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tier: String = row.try_get("deployment_tier")?;
        let status: String = row.try_get("status")?;
        let contacts: serde_json::Value = row.try_get("contacts")?;
        let address: Option<serde_json::Value> = row.try_get("address")?;

        Ok(Some(Tenant {
            id: row.try_get("id")?,
            key: row.try_get("key")?,
            name: row.try_get("name")?,
            deployment_tier: tier.parse::<DeploymentTier>().map_err(corrupt)?,
            status: status.parse::<TenantStatus>().map_err(corrupt)?,
            domains: row.try_get::<Vec<String>, _>("domains")?,
            contacts: serde_json::from_value(contacts).map_err(corrupt)?,
            address: address
                .map(serde_json::from_value)
                .transpose()
                .map_err(corrupt)?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        }))
    }

    async fn insert(&self, tenant: &Tenant) -> Result<(), StoreError> {
        let contacts = serde_json::to_value(&tenant.contacts).map_err(corrupt)?;
        let address = tenant
            .address
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(corrupt)?;

        sqlx::query(
            r#"
                INSERT INTO tenants
                    (id, key, name, deployment_tier, status, domains, contacts, address)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(tenant.id)
        .bind(&tenant.key)
        .bind(&tenant.name)
        .bind(tenant.deployment_tier.as_str())
        .bind(tenant.status.as_str())
        .bind(&tenant.domains)
        .bind(contacts)
        .bind(address)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_status(
        &self,
        tenant_id: Uuid,
        expected: TenantStatus,
        next: TenantStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
                UPDATE tenants
                SET status = $3, updated_at = NOW()
                WHERE id = $1 AND status = $2
            "#,
        )
        .bind(tenant_id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Predicate missed: distinguish a lost race from a missing row.
        let exists = sqlx::query(r#"SELECT 1 AS present FROM tenants WHERE id = $1"#)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_some() {
            Err(StoreError::Conflict)
        } else {
            Err(StoreError::NotFound)
        }
    }
}

/// Development fallback and test double; same contract as the Postgres
/// store, kept behind an async lock.
#[derive(Clone, Default)]
pub struct InMemoryTenantStore {
    tenants: Arc<RwLock<HashMap<Uuid, Tenant>>>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn find(&self, tenant_id: Uuid) -> Result<Option<Tenant>, StoreError> {
        Ok(self.tenants.read().await.get(&tenant_id).cloned())
    }

    async fn insert(&self, tenant: &Tenant) -> Result<(), StoreError> {
        self.tenants
            .write()
            .await
            .insert(tenant.id, tenant.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        tenant_id: Uuid,
        expected: TenantStatus,
        next: TenantStatus,
    ) -> Result<(), StoreError> {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants.get_mut(&tenant_id).ok_or(StoreError::NotFound)?;
        if tenant.status != expected {
            return Err(StoreError::Conflict);
        }
        tenant.status = next;
        tenant.updated_at = Utc::now();
        Ok(())
    }
}
