//! Application state shared by every handler

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::alert::{Alert, AlertDispatcher};
use crate::audit::AuditTrail;
use crate::auth::SessionKeys;
use crate::capacity::{CapacityLimiter, TenantDefaults};
use crate::config::Config;
use crate::db::DbService;
use crate::devices::DeviceLedger;
use crate::gate::AuthorizationGate;
use crate::license::LicenseRegistry;
use crate::tenants::TenantAdmin;

#[derive(Clone)]
pub struct AppState {
    pub db: DbService,
    pub config: Arc<Config>,
    pub sessions: SessionKeys,
    pub alerts: AlertDispatcher,
    pub trail: AuditTrail,
    pub registry: LicenseRegistry,
    pub ledger: DeviceLedger,
    pub capacity: CapacityLimiter,
    pub tenants: TenantAdmin,
    pub gate: AuthorizationGate,
}

impl AppState {
    /// Wire services over `db`; the receiver feeds the alert worker
    pub fn new(db: DbService, config: Config) -> (Self, mpsc::Receiver<Alert>) {
        let (alerts, alert_rx) = AlertDispatcher::new(config.alert_queue_size);
        let pool = db.pool.clone();

        let trail = AuditTrail::new(pool.clone());
        let ledger = DeviceLedger::new(pool.clone());
        let defaults = TenantDefaults {
            validity_days: config.default_license_days,
            max_devices: config.default_max_devices,
        };

        let state = Self {
            sessions: SessionKeys::new(&config.session_secret, config.session_ttl_minutes),
            registry: LicenseRegistry::new(pool.clone()),
            capacity: CapacityLimiter::new(
                pool.clone(),
                config.tenant_capacity,
                defaults,
                alerts.clone(),
            ),
            tenants: TenantAdmin::new(pool.clone()),
            gate: AuthorizationGate::new(pool, ledger.clone(), trail.clone(), alerts.clone()),
            ledger,
            trail,
            alerts,
            config: Arc::new(config),
            db,
        };
        (state, alert_rx)
    }
}
