#![allow(dead_code)]

use license_gate::alert::Alert;
use license_gate::audit::Origin;
use license_gate::auth::{Role, create_user};
use license_gate::db::DbService;
use license_gate::{AppState, Config};
use tokio::sync::mpsc;

pub const NOW: i64 = 1_760_000_000_000;

/// App state over a private in-memory database
///
/// The alert receiver is returned so queued alerts can be inspected.
pub async fn app_state(tenant_capacity: i64) -> (AppState, mpsc::Receiver<Alert>) {
    let db = DbService::in_memory().await.expect("in-memory database");
    let config = Config {
        tenant_capacity,
        ..Config::default()
    };
    AppState::new(db, config)
}

pub fn operator() -> Origin {
    Origin::new("10.0.0.1", Some(1))
}

pub fn device_origin() -> Origin {
    Origin::new("192.168.1.20", None)
}

/// Create a tenant through the capacity limiter; returns (id, license key)
pub async fn tenant(state: &AppState, name: &str) -> (i64, String) {
    let created = state
        .capacity
        .create_tenant(name, &operator(), NOW)
        .await
        .expect("tenant created");
    (created.tenant_id, created.license_key)
}

pub async fn user(state: &AppState, username: &str, role: Role, tenant_id: Option<i64>) -> i64 {
    create_user(&state.db.pool, username, "password123", role, tenant_id, NOW)
        .await
        .expect("user created")
}

pub async fn count(state: &AppState, sql: &str) -> i64 {
    sqlx::query_scalar(sql)
        .fetch_one(&state.db.pool)
        .await
        .expect("count query")
}

pub fn drain(rx: &mut mpsc::Receiver<Alert>) -> Vec<Alert> {
    let mut alerts = Vec::new();
    while let Ok(alert) = rx.try_recv() {
        alerts.push(alert);
    }
    alerts
}
