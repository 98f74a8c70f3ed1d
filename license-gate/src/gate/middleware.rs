//! axum middleware running the gate in front of protected routes
//!
//! Reads the `session` and `fp` cookies, asks [`AuthorizationGate`] for a
//! decision and turns it into a response. On success the [`SessionUser`] is
//! placed in the request extensions for the handlers.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::{Extensions, HeaderMap, HeaderValue, StatusCode, header};
use shared::error::{AppError, ErrorCode};
use shared::util::now_millis;

use super::{Decision, DenyCause, GateRequest, LoginRedirect};
use crate::audit::ReasonCode;
use crate::auth::session::{FINGERPRINT_COOKIE, SESSION_COOKIE};
use crate::auth::{SessionUser, clear_session_cookie, cookie_value};
use crate::state::AppState;

pub const LOGIN_PATH: &str = "/login";

pub async fn gate_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();
    let session_token = cookie_value(headers, SESSION_COOKIE);
    let gate_request = GateRequest {
        user_id: session_token
            .as_deref()
            .and_then(|token| state.sessions.verify(token)),
        fingerprint: cookie_value(headers, FINGERPRINT_COOKIE),
        ip: Some(client_ip(headers, request.extensions())),
        path: request.uri().path().to_string(),
    };

    let result = state.gate.authorize(&gate_request, now_millis()).await;
    match result.decision {
        Decision::Allow { user } => {
            request.extensions_mut().insert::<SessionUser>(user);
            next.run(request).await
        }
        Decision::RedirectToLogin(why) => {
            // a stale token is cleared even when the gate treats it as no session
            let clear = why.clears_session() || session_token.is_some();
            login_redirect(why, clear)
        }
        Decision::Deny {
            cause,
            clear_session,
        } => {
            let mut response = deny_error(cause).into_response();
            if clear_session {
                response
                    .headers_mut()
                    .append(header::SET_COOKIE, clear_session_cookie());
            }
            response
        }
        Decision::Unavailable => AppError::unavailable().into_response(),
    }
}

fn login_redirect(why: LoginRedirect, clear_session: bool) -> Response {
    let location = match why.reason() {
        Some((error, code)) => format!("{LOGIN_PATH}?error={error}&code={code}"),
        None => LOGIN_PATH.to_string(),
    };
    let mut response = StatusCode::SEE_OTHER.into_response();
    if let Ok(value) = HeaderValue::from_str(&location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    if clear_session {
        response
            .headers_mut()
            .append(header::SET_COOKIE, clear_session_cookie());
    }
    response
}

/// Error body for a refused request; names the category, not the raw reason
pub fn deny_error(cause: DenyCause) -> AppError {
    match cause {
        DenyCause::LicenseInactive => AppError::new(ErrorCode::LicenseInactive),
        DenyCause::LicenseExpired => AppError::new(ErrorCode::LicenseExpired),
        DenyCause::FingerprintMissing => AppError::new(ErrorCode::FingerprintRequired),
        DenyCause::Device(reason) => {
            let code = match reason {
                ReasonCode::DeviceBlocked => ErrorCode::DeviceBlocked,
                ReasonCode::DeviceQuotaExceeded => ErrorCode::DeviceLimitReached,
                _ => ErrorCode::DeviceNotBound,
            };
            AppError::with_message(code, format!("Access not authorized: {}", reason.describe()))
        }
    }
}

/// Client IP: first `X-Forwarded-For` entry, then the peer address
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(first) = val.split(',').next()
    {
        let ip = first.trim();
        if !ip.is_empty() {
            return ip.to_owned();
        }
    }

    extensions
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}
