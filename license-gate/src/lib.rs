//! license-gate: tenant license and device authorization service
//!
//! Every protected request passes the [`gate`]: a valid session, a tenant
//! with a live license and a bound, active device fingerprint. Operators
//! manage tenants, licenses and devices over the admin API; every decision
//! and change lands in the [`audit`] trail.

pub mod alert;
pub mod api;
pub mod audit;
pub mod auth;
pub mod capacity;
pub mod config;
pub mod db;
pub mod devices;
pub mod error;
pub mod gate;
pub mod license;
pub mod state;
pub mod tenants;

pub use config::Config;
pub use error::{LicenseError, LicenseResult};
pub use state::AppState;
