use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalAddress {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    pub country: String,
}

/// Identity-provider realm settings, assembled once from the environment when
/// the caller does not supply them. All fields present-but-nullable so the
/// workflow input has a stable shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdpConfig {
    pub issuer_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub realm_template: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureConfig {
    pub region: Option<String>,
    pub cluster: Option<String>,
    pub database_host: Option<String>,
    pub dns_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfig {
    pub from_address: String,
    #[serde(default)]
    pub welcome_template: Option<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
}

/// Input contract for one tenant provisioning attempt. Constructed once by
/// the caller and passed by value into the workflow gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRequest {
    pub tenant_id: Uuid,
    pub tenant_key: String,
    pub tenant_name: String,
    /// Pricing tier name or raw plan id; resolved to a deployment tier.
    pub tier: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub contacts: Vec<ContactInfo>,
    #[serde(default)]
    pub address: Option<PostalAddress>,
    pub subscription_id: String,
    pub plan_id: String,
    #[serde(default)]
    pub idp_config: Option<IdpConfig>,
    #[serde(default)]
    pub infrastructure_config: Option<InfrastructureConfig>,
    pub notification_config: NotificationConfig,
}

/// Input contract for onboarding one user into an existing tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProvisioningRequest {
    pub tenant_id: Uuid,
    pub tenant_key: String,
    pub tenant_name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    pub app_url: String,
    pub login_url: String,
}

fn default_grace_period_days() -> u32 {
    7
}

fn default_notify_users() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeprovisionOptions {
    #[serde(default)]
    pub delete_data: bool,
    #[serde(default = "default_grace_period_days")]
    pub grace_period_days: u32,
    #[serde(default = "default_notify_users")]
    pub notify_users: bool,
}

impl Default for DeprovisionOptions {
    fn default() -> Self {
        Self {
            delete_data: false,
            grace_period_days: default_grace_period_days(),
            notify_users: default_notify_users(),
        }
    }
}

/// Read-only projection of provisioning progress. Never cached beyond a
/// single request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningStatus {
    pub step: String,
    /// 0-100.
    pub progress: u8,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionAccepted {
    pub workflow_id: String,
    pub run_id: String,
    pub already_running: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProvisionAccepted {
    pub workflow_id: String,
    pub already_running: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deprovision_options_defaults_match_an_empty_body() {
        let options: DeprovisionOptions = serde_json::from_str("{}").unwrap();
        assert!(!options.delete_data);
        assert_eq!(options.grace_period_days, 7);
        assert!(options.notify_users);
        assert_eq!(options, DeprovisionOptions::default());
    }

    #[test]
    fn deprovision_options_fields_can_be_overridden() {
        let options: DeprovisionOptions =
            serde_json::from_str(r#"{"deleteData":true,"gracePeriodDays":0,"notifyUsers":false}"#)
                .unwrap();
        assert!(options.delete_data);
        assert_eq!(options.grace_period_days, 0);
        assert!(!options.notify_users);
    }
}
