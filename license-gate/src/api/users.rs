//! User administration

use axum::{Extension, Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::util::now_millis;

use super::ApiResult;
use crate::auth::{self, Role, SessionUser};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/admin/users", post(create_user))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub tenant_id: Option<i64>,
}

#[derive(Serialize)]
pub struct CreatedUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub tenant_id: Option<i64>,
}

/// Tenant the new account lands in, given who is asking
fn target_tenant(caller: &SessionUser, req: &CreateUserRequest) -> Result<Option<i64>, AppError> {
    match caller.role {
        Role::SuperAdmin => Ok(req.tenant_id),
        Role::Admin => {
            if req.role == Role::SuperAdmin {
                return Err(AppError::new(ErrorCode::SuperAdminRequired));
            }
            let own = caller
                .tenant_id
                .ok_or_else(|| AppError::new(ErrorCode::TenantNotSelected))?;
            if req.tenant_id.is_some_and(|id| id != own) {
                return Err(AppError::permission_denied("Tenant belongs to another account"));
            }
            Ok(Some(own))
        }
        Role::User => Err(AppError::new(ErrorCode::AdminRequired)),
    }
}

/// POST /api/admin/users
pub async fn create_user(
    State(state): State<AppState>,
    Extension(caller): Extension<SessionUser>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<CreatedUser> {
    let tenant_id = target_tenant(&caller, &req)?;
    let id = auth::create_user(
        &state.db.pool,
        &req.username,
        &req.password,
        req.role,
        tenant_id,
        now_millis(),
    )
    .await?;
    Ok(Json(CreatedUser {
        id,
        username: req.username.trim().to_string(),
        role: req.role,
        tenant_id,
    }))
}
