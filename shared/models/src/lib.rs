use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Infrastructure isolation strategy for a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentTier {
    /// Dedicated infrastructure per tenant.
    Silo,
    /// Shared infrastructure, isolated by row-level policy.
    Pooled,
    /// Hybrid: shared control plane, dedicated data plane.
    Bridge,
}

impl DeploymentTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentTier::Silo => "silo",
            DeploymentTier::Pooled => "pooled",
            DeploymentTier::Bridge => "bridge",
        }
    }
}

impl fmt::Display for DeploymentTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "silo" => Ok(DeploymentTier::Silo),
            "pooled" => Ok(DeploymentTier::Pooled),
            "bridge" => Ok(DeploymentTier::Bridge),
            other => Err(format!("unknown deployment tier '{other}'")),
        }
    }
}

/// Provisioning status of a tenant. Only the orchestrator mutates this once
/// provisioning begins; the stored value is the system of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantStatus {
    Pending,
    Provisioning,
    Active,
    ProvisionFailed,
    Deprovisioning,
    Deprovisioned,
    Cancelled,
}

impl TenantStatus {
    /// Legal transition table. Everything not listed here fails closed.
    ///
    /// `ProvisionFailed` and `Cancelled` are retryable: the deterministic
    /// workflow id lets a later attempt resume into `Provisioning`, and a
    /// cancelled teardown can be re-entered through `Deprovisioning`.
    pub fn can_transition_to(&self, next: TenantStatus) -> bool {
        use TenantStatus::*;
        matches!(
            (*self, next),
            (Pending, Provisioning)
                | (Pending, Cancelled)
                | (Provisioning, Active)
                | (Provisioning, ProvisionFailed)
                | (Provisioning, Cancelled)
                | (ProvisionFailed, Provisioning)
                | (Cancelled, Provisioning)
                | (Cancelled, Deprovisioning)
                | (Active, Deprovisioning)
                | (Deprovisioning, Deprovisioned)
                | (Deprovisioning, Cancelled)
        )
    }

    /// Deprovisioned tenants keep a tombstone row and never leave this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TenantStatus::Deprovisioned)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Pending => "PENDING",
            TenantStatus::Provisioning => "PROVISIONING",
            TenantStatus::Active => "ACTIVE",
            TenantStatus::ProvisionFailed => "PROVISION_FAILED",
            TenantStatus::Deprovisioning => "DEPROVISIONING",
            TenantStatus::Deprovisioned => "DEPROVISIONED",
            TenantStatus::Cancelled => "CANCELLED",
        }
    }

    pub const ALL: [TenantStatus; 7] = [
        TenantStatus::Pending,
        TenantStatus::Provisioning,
        TenantStatus::Active,
        TenantStatus::ProvisionFailed,
        TenantStatus::Deprovisioning,
        TenantStatus::Deprovisioned,
        TenantStatus::Cancelled,
    ];
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TenantStatus::Pending),
            "PROVISIONING" => Ok(TenantStatus::Provisioning),
            "ACTIVE" => Ok(TenantStatus::Active),
            "PROVISION_FAILED" => Ok(TenantStatus::ProvisionFailed),
            "DEPROVISIONING" => Ok(TenantStatus::Deprovisioning),
            "DEPROVISIONED" => Ok(TenantStatus::Deprovisioned),
            "CANCELLED" => Ok(TenantStatus::Cancelled),
            other => Err(format!("unknown tenant status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: String,
}

/// One customer organization. Created `Pending` by the tenant-creation API;
/// the status column is then owned by the orchestrator. Rows are never hard
/// deleted — deprovisioned tenants remain as tombstones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// URL-safe slug, unique across the platform.
    pub key: String,
    pub name: String,
    /// Immutable once provisioning has started.
    pub deployment_tier: DeploymentTier,
    pub status: TenantStatus,
    pub domains: Vec<String>,
    pub contacts: Vec<Contact>,
    pub address: Option<Address>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_fails_closed() {
        use TenantStatus::*;
        let legal = [
            (Pending, Provisioning),
            (Pending, Cancelled),
            (Provisioning, Active),
            (Provisioning, ProvisionFailed),
            (Provisioning, Cancelled),
            (ProvisionFailed, Provisioning),
            (Cancelled, Provisioning),
            (Cancelled, Deprovisioning),
            (Active, Deprovisioning),
            (Deprovisioning, Deprovisioned),
            (Deprovisioning, Cancelled),
        ];
        for from in TenantStatus::ALL {
            for to in TenantStatus::ALL {
                let expected = legal.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "unexpected verdict for {from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn deprovisioned_is_the_only_terminal_state() {
        for status in TenantStatus::ALL {
            assert_eq!(status.is_terminal(), status == TenantStatus::Deprovisioned);
        }
    }

    #[test]
    fn cross_role_edges_are_illegal() {
        assert!(!TenantStatus::Provisioning.can_transition_to(TenantStatus::Deprovisioning));
        assert!(!TenantStatus::Deprovisioning.can_transition_to(TenantStatus::Provisioning));
    }

    #[test]
    fn cancelled_deprovisioning_can_be_retried() {
        // A teardown cancelled mid-flight must not strand the tenant; the
        // cancel state re-enters either role.
        assert!(TenantStatus::Deprovisioning.can_transition_to(TenantStatus::Cancelled));
        assert!(TenantStatus::Cancelled.can_transition_to(TenantStatus::Deprovisioning));
        assert!(TenantStatus::Cancelled.can_transition_to(TenantStatus::Provisioning));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in TenantStatus::ALL {
            assert_eq!(status.as_str().parse::<TenantStatus>().unwrap(), status);
        }
        assert!("PAUSED".parse::<TenantStatus>().is_err());
    }
}
