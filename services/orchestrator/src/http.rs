//! HTTP surface of the orchestrator. All mutating endpoints are
//! fire-and-forget: they return 202 once the start request is accepted and
//! callers observe progress by polling the status endpoints.

use crate::config::{assemble_idp_config, assemble_infrastructure_config, OrchestratorConfig};
use crate::engine::WorkflowEngine;
use crate::gateway::{self, CancelError, QueryError, StartError, WorkflowGateway};
use crate::lifecycle::{TenantLifecycle, TransitionError};
use crate::onboarding::UserOnboarding;
use crate::projection::{self, ProjectionError, StatusProjection};
use crate::store::TenantStore;
use crate::tier::resolve_tier;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use dto::{
    ContactInfo, DeprovisionOptions, PostalAddress, ProvisionAccepted, ProvisioningRequest,
    ProvisioningStatus, UserProvisionAccepted, UserProvisioningRequest,
};
use models::{Address, Contact, Tenant, TenantStatus};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn TenantStore>,
    gateway: Arc<WorkflowGateway>,
    lifecycle: TenantLifecycle,
    projection: StatusProjection,
    onboarding: UserOnboarding,
}

impl AppState {
    pub fn new(
        store: Arc<dyn TenantStore>,
        engine: Arc<dyn WorkflowEngine>,
        config: &OrchestratorConfig,
    ) -> Self {
        let gateway = Arc::new(WorkflowGateway::new(engine, config));
        let lifecycle = TenantLifecycle::new(store.clone());
        let projection = StatusProjection::new(gateway.clone(), lifecycle.clone());
        let onboarding = UserOnboarding::new(gateway.clone());
        Self {
            store,
            gateway,
            lifecycle,
            projection,
            onboarding,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Invalid(String),
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Unexpected(error) => {
                tracing::error!(?error, "unexpected api error");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<StartError> for ApiError {
    fn from(err: StartError) -> Self {
        match err {
            StartError::Validation(msg) => ApiError::Invalid(msg),
            StartError::Transport(msg) => ApiError::Unavailable(msg),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::NotFound => ApiError::NotFound,
            QueryError::Transport(msg) => ApiError::Unavailable(msg),
        }
    }
}

impl From<CancelError> for ApiError {
    fn from(err: CancelError) -> Self {
        match err {
            CancelError::NotFound => ApiError::NotFound,
            CancelError::Transport(msg) => ApiError::Unavailable(msg),
        }
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        match err {
            ProjectionError::NotFound => ApiError::NotFound,
            ProjectionError::Unavailable(msg) => ApiError::Unavailable(msg),
        }
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::TenantNotFound => ApiError::NotFound,
            TransitionError::InvalidTransition { from, to } => {
                ApiError::Conflict(format!("tenant status transition {from} -> {to} is not allowed"))
            }
            TransitionError::Conflict => {
                ApiError::Conflict("tenant status changed concurrently".to_string())
            }
            TransitionError::Store(err) => ApiError::Unexpected(anyhow::Error::new(err)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tenants", post(create_tenant))
        .route("/tenants/:id/provision", post(provision))
        .route("/tenants/:id/provisioning-status", get(provisioning_status))
        .route("/tenants/:id/provisioning/cancel", post(cancel_provisioning))
        .route("/tenants/:id/deprovision", post(deprovision))
        .route("/users/provision", post(provision_user))
        .route(
            "/users/provisioning-status/:workflow_id",
            get(user_provisioning_status),
        )
        .with_state(state)
}

/// Lightweight liveness probe for readiness checks and dashboards.
async fn health() -> Json<serde_json::Value> {
    Json(json!({"status":"ok"}))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTenantRequest {
    #[serde(default)]
    id: Option<Uuid>,
    key: String,
    name: String,
    /// Pricing tier name or raw plan id.
    plan: String,
    #[serde(default)]
    domains: Vec<String>,
    #[serde(default)]
    contacts: Vec<ContactInfo>,
    #[serde(default)]
    address: Option<PostalAddress>,
}

fn to_contact(info: ContactInfo) -> Contact {
    Contact {
        name: info.name,
        email: info.email,
        phone: info.phone,
        role: info.role,
    }
}

fn to_address(addr: PostalAddress) -> Address {
    Address {
        line1: addr.line1,
        line2: addr.line2,
        city: addr.city,
        region: addr.region,
        postal_code: addr.postal_code,
        country: addr.country,
    }
}

/// Seed a tenant row in `PENDING`. Provisioning is a separate, explicitly
/// asynchronous step.
async fn create_tenant(
    State(state): State<AppState>,
    Json(request): Json<CreateTenantRequest>,
) -> Result<(StatusCode, Json<Tenant>), ApiError> {
    gateway::validate_tenant_key(&request.key)?;

    let now = Utc::now();
    let tenant = Tenant {
        id: request.id.unwrap_or_else(Uuid::new_v4),
        key: request.key,
        name: request.name,
        deployment_tier: resolve_tier(&request.plan),
        status: TenantStatus::Pending,
        domains: request.domains,
        contacts: request.contacts.into_iter().map(to_contact).collect(),
        address: request.address.map(to_address),
        created_at: now,
        updated_at: now,
    };
    state
        .store
        .insert(&tenant)
        .await
        .map_err(|err| ApiError::Unexpected(anyhow::Error::new(err)))?;

    tracing::info!(tenant_id = %tenant.id, key = %tenant.key, tier = %tenant.deployment_tier, "tenant created");
    Ok((StatusCode::CREATED, Json(tenant)))
}

async fn provision(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(mut request): Json<ProvisioningRequest>,
) -> Result<(StatusCode, Json<ProvisionAccepted>), ApiError> {
    if request.tenant_id != tenant_id {
        return Err(ApiError::Invalid("tenantId does not match path".into()));
    }

    let tenant = state.lifecycle.current(tenant_id).await?;

    // Reject illegal starts before any engine call. A tenant already in
    // PROVISIONING passes through: the deterministic workflow id makes the
    // retried start converge on the running workflow.
    if tenant.status != TenantStatus::Provisioning {
        TenantLifecycle::ensure_transition_allowed(tenant.status, TenantStatus::Provisioning)?;
    }

    let requested_tier = resolve_tier(&request.tier);
    if requested_tier != tenant.deployment_tier {
        // The tier is immutable once provisioning has started; changing it
        // requires a new tenant or a migration workflow.
        tracing::warn!(
            %tenant_id,
            stored = %tenant.deployment_tier,
            requested = %requested_tier,
            "ignoring tier change on provisioning request"
        );
    }

    if request.idp_config.is_none() {
        request.idp_config = assemble_idp_config();
    }
    if request.infrastructure_config.is_none() {
        request.infrastructure_config = assemble_infrastructure_config();
    }

    let outcome = state.gateway.start_provisioning(&request).await?;

    if tenant.status != TenantStatus::Provisioning {
        match state
            .lifecycle
            .apply_transition(tenant_id, tenant.status, TenantStatus::Provisioning)
            .await
        {
            Ok(()) => {}
            Err(TransitionError::Conflict) => {
                tracing::debug!(%tenant_id, "provisioning transition lost a race, winner's state stands");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(ProvisionAccepted {
            workflow_id: outcome.handle.workflow_id,
            run_id: outcome.handle.run_id,
            already_running: outcome.already_running,
        }),
    ))
}

async fn provisioning_status(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<ProvisioningStatus>, ApiError> {
    let status = state.projection.get_status(tenant_id).await?;
    Ok(Json(status))
}

async fn cancel_provisioning(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    state.lifecycle.current(tenant_id).await?;
    state.gateway.cancel(tenant_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"status": "cancellation-requested"})),
    ))
}

async fn deprovision(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(options): Json<DeprovisionOptions>,
) -> Result<(StatusCode, Json<ProvisionAccepted>), ApiError> {
    let tenant = state.lifecycle.current(tenant_id).await?;

    // Cross-role exclusivity: a provisioning tenant cannot start
    // deprovisioning; reject before the engine sees anything.
    if tenant.status != TenantStatus::Deprovisioning {
        TenantLifecycle::ensure_transition_allowed(tenant.status, TenantStatus::Deprovisioning)?;
    }

    let outcome = state.gateway.start_deprovisioning(tenant_id, &options).await?;

    if tenant.status != TenantStatus::Deprovisioning {
        match state
            .lifecycle
            .apply_transition(tenant_id, tenant.status, TenantStatus::Deprovisioning)
            .await
        {
            Ok(()) => {}
            Err(TransitionError::Conflict) => {
                tracing::debug!(%tenant_id, "deprovisioning transition lost a race, winner's state stands");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(ProvisionAccepted {
            workflow_id: outcome.handle.workflow_id,
            run_id: outcome.handle.run_id,
            already_running: outcome.already_running,
        }),
    ))
}

async fn provision_user(
    State(state): State<AppState>,
    Json(request): Json<UserProvisioningRequest>,
) -> Result<Json<UserProvisionAccepted>, ApiError> {
    let outcome = state.onboarding.invite(&request).await?;
    Ok(Json(UserProvisionAccepted {
        workflow_id: outcome.handle.workflow_id,
        already_running: outcome.already_running,
    }))
}

async fn user_provisioning_status(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<ProvisioningStatus>, ApiError> {
    let progress = state.onboarding.status(&workflow_id).await?;
    Ok(Json(projection::to_status(progress)))
}
