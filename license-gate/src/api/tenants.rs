//! Tenant and license administration

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use shared::util::now_millis;

use super::{ApiResult, ClientIp, origin, require_super_admin, require_tenant_access};
use crate::auth::SessionUser;
use crate::capacity::{CapacityStatus, CreatedTenant};
use crate::license::LicenseStatus;
use crate::state::AppState;
use crate::tenants::Overview;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/tenants", post(create_tenant))
        .route("/api/admin/tenants/overview", get(overview))
        .route("/api/admin/tenants/capacity", get(capacity))
        .route("/api/admin/tenants/{id}/active", post(set_active))
        .route(
            "/api/admin/tenants/{id}/license",
            get(license_status).post(generate_license),
        )
        .route("/api/admin/tenants/{id}/license/toggle", post(toggle_license))
        .route("/api/admin/tenants/{id}/license/extend", post(extend_license))
}

#[derive(Deserialize)]
pub struct CreateTenantRequest {
    pub name: String,
}

/// POST /api/admin/tenants
pub async fn create_tenant(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    ip: ClientIp,
    Json(req): Json<CreateTenantRequest>,
) -> ApiResult<CreatedTenant> {
    require_super_admin(&user)?;
    let created = state
        .capacity
        .create_tenant(&req.name, &origin(&user, ip), now_millis())
        .await?;
    Ok(Json(created))
}

/// GET /api/admin/tenants/overview
pub async fn overview(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> ApiResult<Overview> {
    require_super_admin(&user)?;
    Ok(Json(state.tenants.overview(now_millis()).await?))
}

/// GET /api/admin/tenants/capacity
pub async fn capacity(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> ApiResult<CapacityStatus> {
    require_super_admin(&user)?;
    Ok(Json(state.capacity.status().await?))
}

#[derive(Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Serialize)]
pub struct ActiveState {
    pub id: i64,
    pub active: bool,
}

/// POST /api/admin/tenants/{id}/active
pub async fn set_active(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    ip: ClientIp,
    Path(id): Path<i64>,
    Json(req): Json<SetActiveRequest>,
) -> ApiResult<ActiveState> {
    require_super_admin(&user)?;
    state
        .tenants
        .set_active(id, req.active, &origin(&user, ip), now_millis())
        .await?;
    Ok(Json(ActiveState {
        id,
        active: req.active,
    }))
}

/// GET /api/admin/tenants/{id}/license
pub async fn license_status(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<i64>,
) -> ApiResult<LicenseStatus> {
    require_tenant_access(&user, id)?;
    Ok(Json(state.registry.status(id, now_millis()).await?))
}

#[derive(Deserialize, Default)]
pub struct GenerateRequest {
    pub validity_days: Option<i64>,
    pub max_devices: Option<i64>,
}

#[derive(Serialize)]
pub struct GeneratedLicense {
    pub tenant_id: i64,
    pub license_key: String,
}

/// POST /api/admin/tenants/{id}/license
pub async fn generate_license(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    ip: ClientIp,
    Path(id): Path<i64>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<GeneratedLicense> {
    require_super_admin(&user)?;
    let key = state
        .registry
        .generate(
            id,
            req.validity_days.unwrap_or(state.config.default_license_days),
            req.max_devices.unwrap_or(state.config.default_max_devices),
            &origin(&user, ip),
            now_millis(),
        )
        .await?;
    Ok(Json(GeneratedLicense {
        tenant_id: id,
        license_key: key,
    }))
}

/// POST /api/admin/tenants/{id}/license/toggle
pub async fn toggle_license(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    ip: ClientIp,
    Path(id): Path<i64>,
) -> ApiResult<ActiveState> {
    require_super_admin(&user)?;
    let active = state
        .registry
        .toggle(id, &origin(&user, ip), now_millis())
        .await?;
    Ok(Json(ActiveState { id, active }))
}

#[derive(Deserialize)]
pub struct ExtendRequest {
    pub days: i64,
}

#[derive(Serialize)]
pub struct ExtendedLicense {
    pub tenant_id: i64,
    pub expires_at: i64,
}

/// POST /api/admin/tenants/{id}/license/extend
pub async fn extend_license(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    ip: ClientIp,
    Path(id): Path<i64>,
    Json(req): Json<ExtendRequest>,
) -> ApiResult<ExtendedLicense> {
    require_super_admin(&user)?;
    let expires_at = state
        .registry
        .extend(id, req.days, &origin(&user, ip), now_millis())
        .await?;
    Ok(Json(ExtendedLicense {
        tenant_id: id,
        expires_at,
    }))
}
