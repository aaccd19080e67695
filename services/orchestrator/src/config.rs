use dto::{IdpConfig, InfrastructureConfig};
use std::time::Duration;

/// The three timeout knobs every workflow start carries.
///
/// Execution bounds worst-case resource leakage if an activity never
/// completes, run bounds a single attempt (the engine may retry a fresh run
/// under the same workflow id), decision bounds how long we wait for the
/// next workflow decision before the worker counts as unresponsive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowTimeouts {
    pub execution: Duration,
    pub run: Duration,
    pub decision: Duration,
}

const DEPROVISION_MARGIN: Duration = Duration::from_secs(24 * 60 * 60);

impl WorkflowTimeouts {
    pub fn provisioning_defaults() -> Self {
        Self {
            execution: Duration::from_secs(4 * 60 * 60),
            run: Duration::from_secs(30 * 60),
            decision: Duration::from_secs(30),
        }
    }

    pub fn user_provisioning_defaults() -> Self {
        Self {
            execution: Duration::from_secs(60 * 60),
            run: Duration::from_secs(10 * 60),
            decision: Duration::from_secs(30),
        }
    }

    /// Deprovisioning must outlive the requested grace period, so the
    /// execution timeout scales with it instead of being a constant.
    pub fn for_deprovisioning(grace_period_days: u32) -> Self {
        let grace = Duration::from_secs(u64::from(grace_period_days) * 24 * 60 * 60);
        Self {
            execution: grace + DEPROVISION_MARGIN,
            run: Duration::from_secs(30 * 60),
            decision: Duration::from_secs(30),
        }
    }

    /// Overlay env overrides on a default set, e.g.
    /// `PROVISION_EXECUTION_TIMEOUT_SECS` / `PROVISION_RUN_TIMEOUT_SECS` /
    /// `PROVISION_DECISION_TIMEOUT_SECS`.
    pub fn from_env(prefix: &str, defaults: Self) -> Self {
        Self {
            execution: env_secs(&format!("{prefix}_EXECUTION_TIMEOUT_SECS"), defaults.execution),
            run: env_secs(&format!("{prefix}_RUN_TIMEOUT_SECS"), defaults.run),
            decision: env_secs(&format!("{prefix}_DECISION_TIMEOUT_SECS"), defaults.decision),
        }
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

/// Orchestrator-wide settings assembled once at boot.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub provisioning: WorkflowTimeouts,
    pub user_provisioning: WorkflowTimeouts,
    /// Bound on a single network round-trip to the engine (start or query),
    /// distinct from the workflow's own execution timeout.
    pub call_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            provisioning: WorkflowTimeouts::provisioning_defaults(),
            user_provisioning: WorkflowTimeouts::user_provisioning_defaults(),
            call_timeout: Duration::from_secs(5),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Self {
        Self {
            provisioning: WorkflowTimeouts::from_env(
                "PROVISION",
                WorkflowTimeouts::provisioning_defaults(),
            ),
            user_provisioning: WorkflowTimeouts::from_env(
                "PROVISION_USER",
                WorkflowTimeouts::user_provisioning_defaults(),
            ),
            call_timeout: env_secs("ENGINE_CALL_TIMEOUT_SECS", Duration::from_secs(5)),
        }
    }
}

/// Assemble the optional identity-provider config from the environment.
///
/// Returns `None` when nothing is configured so the workflow input records
/// "no idp integration" explicitly rather than a struct of empty strings.
pub fn assemble_idp_config() -> Option<IdpConfig> {
    let config = IdpConfig {
        issuer_url: std::env::var("IDP_ISSUER_URL").ok(),
        client_id: std::env::var("IDP_CLIENT_ID").ok(),
        client_secret: std::env::var("IDP_CLIENT_SECRET").ok(),
        realm_template: std::env::var("IDP_REALM_TEMPLATE").ok(),
    };
    if config == IdpConfig::default() {
        None
    } else {
        Some(config)
    }
}

pub fn assemble_infrastructure_config() -> Option<InfrastructureConfig> {
    let config = InfrastructureConfig {
        region: std::env::var("INFRA_REGION").ok(),
        cluster: std::env::var("INFRA_CLUSTER").ok(),
        database_host: std::env::var("INFRA_DATABASE_HOST").ok(),
        dns_zone: std::env::var("INFRA_DNS_ZONE").ok(),
    };
    if config == InfrastructureConfig::default() {
        None
    } else {
        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deprovision_timeout_scales_with_grace_period() {
        let seven = WorkflowTimeouts::for_deprovisioning(7);
        assert_eq!(
            seven.execution,
            Duration::from_secs(7 * 24 * 60 * 60) + DEPROVISION_MARGIN
        );

        let zero = WorkflowTimeouts::for_deprovisioning(0);
        assert_eq!(zero.execution, DEPROVISION_MARGIN);
        assert!(seven.execution > zero.execution);
    }

    #[test]
    fn provisioning_defaults_are_bounded_sanely() {
        let t = WorkflowTimeouts::provisioning_defaults();
        assert!(t.execution > t.run);
        assert!(t.run > t.decision);
        assert!(t.decision >= Duration::from_secs(1));
    }
}
