//! Device administration

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use shared::error::AppError;
use shared::util::now_millis;

use super::{ApiResult, ClientIp, origin, require_tenant_access, scoped_tenant};
use crate::auth::SessionUser;
use crate::db::devices::DeviceRow;
use crate::devices::{Activation, devices_csv};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/devices", get(list).post(bind))
        .route("/api/admin/devices/export", get(export))
        .route("/api/admin/devices/{id}", axum::routing::delete(delete))
        .route("/api/admin/devices/{id}/active", post(set_active))
        .route("/api/admin/devices/{id}/renew", post(renew))
}

#[derive(Deserialize)]
pub struct TenantFilter {
    pub tenant_id: Option<i64>,
}

/// GET /api/admin/devices
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Query(filter): Query<TenantFilter>,
) -> ApiResult<Vec<DeviceRow>> {
    let tenant_id = scoped_tenant(&user, filter.tenant_id)?;
    Ok(Json(state.ledger.list(tenant_id).await?))
}

/// GET /api/admin/devices/export
pub async fn export(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Query(filter): Query<TenantFilter>,
) -> Result<Response, AppError> {
    let tenant_id = scoped_tenant(&user, filter.tenant_id)?;
    let rows = state.ledger.list(tenant_id).await?;
    let filename = match tenant_id {
        Some(id) => format!("devices-tenant-{id}.csv"),
        None => "devices.csv".to_string(),
    };
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        devices_csv(&rows),
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct BindRequest {
    /// Required for super administrators; admins always bind to their own tenant
    pub tenant_id: Option<i64>,
    pub fingerprint: String,
    pub notes: Option<String>,
}

/// POST /api/admin/devices
pub async fn bind(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    ip: ClientIp,
    Json(req): Json<BindRequest>,
) -> ApiResult<Activation> {
    let tenant_id = scoped_tenant(&user, req.tenant_id)?
        .ok_or_else(|| AppError::validation("tenant_id is required"))?;
    require_tenant_access(&user, tenant_id)?;

    let notes = req.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let activation = state
        .ledger
        .bind(
            tenant_id,
            &req.fingerprint,
            notes,
            &origin(&user, ip),
            now_millis(),
        )
        .await?;
    Ok(Json(activation))
}

/// Load the device and check the caller may manage its tenant
async fn authorize_device(
    state: &AppState,
    user: &SessionUser,
    device_id: i64,
) -> Result<(), AppError> {
    let device = state.ledger.find(device_id).await?;
    require_tenant_access(user, device.tenant_id)
}

#[derive(Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Serialize)]
pub struct DeviceState {
    pub id: i64,
    pub active: bool,
}

/// POST /api/admin/devices/{id}/active
pub async fn set_active(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<i64>,
    Json(req): Json<SetActiveRequest>,
) -> ApiResult<DeviceState> {
    authorize_device(&state, &user, id).await?;
    state.ledger.set_active(id, req.active).await?;
    Ok(Json(DeviceState {
        id,
        active: req.active,
    }))
}

#[derive(Deserialize)]
pub struct RenewRequest {
    pub days: i64,
}

#[derive(Serialize)]
pub struct RenewedDevice {
    pub id: i64,
    pub expires_at: i64,
}

/// POST /api/admin/devices/{id}/renew
pub async fn renew(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<i64>,
    Json(req): Json<RenewRequest>,
) -> ApiResult<RenewedDevice> {
    authorize_device(&state, &user, id).await?;
    let expires_at = state.ledger.renew(id, req.days, now_millis()).await?;
    Ok(Json(RenewedDevice { id, expires_at }))
}

/// DELETE /api/admin/devices/{id}
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<i64>,
) -> ApiResult<DeviceState> {
    authorize_device(&state, &user, id).await?;
    state.ledger.delete(id).await?;
    tracing::info!(device_id = id, user_id = user.id, "Device removed by operator");
    Ok(Json(DeviceState { id, active: false }))
}
