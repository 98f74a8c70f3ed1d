//! license-gate server binary

use std::net::SocketAddr;
use std::sync::Arc;

use license_gate::alert::{Alert, AlertSink, AlertWorker, LogAlertSink, WebhookAlertSink};
use license_gate::auth::ensure_superadmin;
use license_gate::db::DbService;
use license_gate::{AppState, Config, api};
use shared::util::now_millis;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = Config::from_env()?;
    tracing::info!("Starting license-gate (env: {})", config.environment);

    let db = DbService::new(&config.database_url).await?;

    if let (Some(username), Some(password)) =
        (&config.superadmin_username, &config.superadmin_password)
    {
        ensure_superadmin(&db.pool, username, password, now_millis()).await?;
    }

    let sink: Arc<dyn AlertSink> = match &config.alert_webhook_url {
        Some(url) => {
            tracing::info!("Alerts go to webhook");
            Arc::new(WebhookAlertSink::new(url.clone()))
        }
        None => Arc::new(LogAlertSink),
    };

    let http_port = config.http_port;
    let (state, alert_rx) = AppState::new(db, config);
    tokio::spawn(AlertWorker::new(sink).run(alert_rx));

    // Tenants over the ceiling are switched off before the first request
    let remediation = state.capacity.remediate_on_startup(now_millis()).await?;
    state.alerts.dispatch(Alert::info(
        "Service started",
        format!(
            "license-gate started with {} tenants (ceiling {}); {} blocked at startup",
            remediation.total,
            state.capacity.ceiling(),
            remediation.blocked.len()
        ),
    ));

    let app = api::create_router(state);

    let addr = format!("0.0.0.0:{http_port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("license-gate HTTP listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("license-gate stopped");
    Ok(())
}

/// `LOG_FORMAT=json` switches to one JSON object per line
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "license_gate=info,tower_http=info".into());

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    tracing::info!("Shutdown signal received");
}
