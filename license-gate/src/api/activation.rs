//! Public license activation
//!
//! A device presents the tenant's license key and its fingerprint. On
//! success the caller is pointed at the login page; every failure carries a
//! readable reason (invalid key, license inactive, device limit reached).

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::util::now_millis;

use super::{ApiResult, ClientIp};
use crate::audit::Origin;
use crate::db;
use crate::state::AppState;

/// Fingerprints longer than this are rejected outright
const MAX_FINGERPRINT_LEN: usize = 256;

#[derive(Deserialize)]
pub struct ActivateRequest {
    pub license_key: String,
    pub fingerprint: String,
}

#[derive(Debug, Serialize)]
pub struct ActivateResponse {
    pub tenant_id: i64,
    pub tenant_name: String,
    pub device_id: i64,
    pub reactivated: bool,
    pub redirect: &'static str,
}

/// POST /api/license/activate
pub async fn activate(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(req): Json<ActivateRequest>,
) -> ApiResult<ActivateResponse> {
    let key = req.license_key.trim();
    let fingerprint = req.fingerprint.trim();
    if key.is_empty() || fingerprint.is_empty() {
        return Err(AppError::validation("license_key and fingerprint are required"));
    }
    if fingerprint.len() > MAX_FINGERPRINT_LEN {
        return Err(AppError::validation("fingerprint is too long"));
    }

    let tenant = db::tenants::find_by_license_key(&state.db.pool, key)
        .await
        .map_err(crate::error::LicenseError::from)?
        .ok_or_else(|| {
            tracing::info!(ip = %ip.0, "Activation with unknown license key");
            AppError::new(ErrorCode::LicenseKeyInvalid)
        })?;

    let origin = Origin::new(ip.0, None);
    let activation = state
        .ledger
        .activate_or_bind(tenant.id, fingerprint, &origin, now_millis())
        .await?;

    Ok(Json(ActivateResponse {
        tenant_id: tenant.id,
        tenant_name: tenant.name,
        device_id: activation.device_id,
        reactivated: activation.reactivated,
        redirect: crate::gate::middleware::LOGIN_PATH,
    }))
}
