//! Login, logout and current user

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use http::HeaderValue;
use serde::{Deserialize, Serialize};
use shared::error::{ApiResponse, AppError, ErrorCode};

use super::{ApiResult, ClientIp};
use crate::auth::{self, SessionUser, clear_session_cookie};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let user = auth::authenticate(&state.db.pool, req.username.trim(), &req.password)
        .await?
        .ok_or_else(|| {
            tracing::info!(username = %req.username, ip = %ip.0, "Login failed");
            AppError::invalid_credentials()
        })?;
    let session_user = SessionUser::from_user(&user)
        .ok_or_else(|| AppError::new(ErrorCode::AccountDisabled))?;

    let token = state.sessions.issue(user.id).map_err(|e| {
        tracing::error!("Session token creation failed: {e}");
        AppError::new(ErrorCode::InternalError)
    })?;
    let cookie = state
        .sessions
        .session_cookie(&token, !state.config.is_development());
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|_| AppError::internal("Session cookie is not a valid header value"))?;

    tracing::info!(user_id = user.id, role = session_user.role.as_str(), ip = %ip.0, "Login succeeded");
    let mut response = Json(ApiResponse::success(session_user)).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

/// POST /api/auth/logout
pub async fn logout() -> Response {
    let mut response = Json(ApiResponse::ok()).into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, clear_session_cookie());
    response
}

#[derive(Deserialize)]
pub struct LoginPageQuery {
    pub error: Option<String>,
    pub code: Option<u16>,
}

#[derive(Serialize)]
pub struct LoginPage {
    pub login_endpoint: &'static str,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// GET /login: where the gate sends unauthenticated requests
pub async fn login_page(Query(query): Query<LoginPageQuery>) -> Json<LoginPage> {
    // unknown codes are dropped rather than echoed
    let code = query.code.and_then(|c| ErrorCode::try_from(c).ok());
    Json(LoginPage {
        login_endpoint: "/api/auth/login",
        error: query.error,
        code,
        message: code.map(|c| c.message()),
    })
}

/// GET /api/me
pub async fn me(Extension(user): Extension<SessionUser>) -> ApiResult<SessionUser> {
    Ok(Json(user))
}
