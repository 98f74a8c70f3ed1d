//! HTTP surface
//!
//! Public routes (health, login/logout, license activation, static files)
//! are mounted outside the gate. Everything else sits behind
//! [`gate_middleware`](crate::gate::middleware::gate_middleware) and checks
//! the caller's role in the handler.

pub mod activation;
pub mod audit;
pub mod auth;
pub mod devices;
pub mod health;
pub mod tenants;
pub mod users;

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use http::request::Parts;
use shared::error::{AppError, ErrorCode};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::audit::Origin;
use crate::auth::{Role, SessionUser};
use crate::gate::middleware::{client_ip, gate_middleware};
use crate::state::AppState;

pub type ApiResult<T> = Result<Json<T>, AppError>;

/// Build the full application router
pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health_check))
        .route("/login", get(auth::login_page))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/license/activate", post(activation::activate))
        .nest_service("/static", ServeDir::new("static"));

    let protected = Router::new()
        .route("/api/me", get(auth::me))
        .merge(tenants::router())
        .merge(devices::router())
        .merge(users::router())
        .merge(audit::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), gate_middleware));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Client IP of the request, as seen by the gate
pub struct ClientIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(client_ip(&parts.headers, &parts.extensions)))
    }
}

pub fn origin(user: &SessionUser, ip: ClientIp) -> Origin {
    Origin::new(ip.0, Some(user.id))
}

pub fn require_super_admin(user: &SessionUser) -> Result<(), AppError> {
    if user.is_super_admin() {
        Ok(())
    } else {
        Err(AppError::new(ErrorCode::SuperAdminRequired))
    }
}

/// Admin of `tenant_id`, or super administrator
pub fn require_tenant_access(user: &SessionUser, tenant_id: i64) -> Result<(), AppError> {
    match user.role {
        Role::User => Err(AppError::new(ErrorCode::AdminRequired)),
        _ if user.can_manage(tenant_id) => Ok(()),
        _ => Err(AppError::permission_denied("Tenant belongs to another account")),
    }
}

/// Tenant filter for listings: admins are pinned to their own tenant
pub fn scoped_tenant(user: &SessionUser, requested: Option<i64>) -> Result<Option<i64>, AppError> {
    match user.role {
        Role::SuperAdmin => Ok(requested),
        Role::Admin => match user.tenant_id {
            Some(own) => Ok(Some(own)),
            None => Err(AppError::new(ErrorCode::TenantNotSelected)),
        },
        Role::User => Err(AppError::new(ErrorCode::AdminRequired)),
    }
}
