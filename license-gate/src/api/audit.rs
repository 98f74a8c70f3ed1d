//! Audit log listings

use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;

use super::{ApiResult, scoped_tenant};
use crate::audit::{Page, PageQuery};
use crate::auth::SessionUser;
use crate::db::access_logs::AccessLogRow;
use crate::db::license_history::HistoryRow;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/audit/access", get(access_log))
        .route("/api/admin/audit/history", get(history))
}

#[derive(Deserialize)]
pub struct AuditQuery {
    pub tenant_id: Option<i64>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl AuditQuery {
    fn page(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// GET /api/admin/audit/access
pub async fn access_log(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Page<AccessLogRow>> {
    let tenant_id = scoped_tenant(&user, query.tenant_id)?;
    Ok(Json(state.trail.access_log(tenant_id, query.page()).await?))
}

/// GET /api/admin/audit/history
pub async fn history(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Page<HistoryRow>> {
    let tenant_id = scoped_tenant(&user, query.tenant_id)?;
    Ok(Json(state.trail.history(tenant_id, query.page()).await?))
}
