//! License Registry
//!
//! Per-tenant license lifecycle: generate, toggle, extend and read status.
//! Every mutation commits together with its history entry.

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Serialize;
use shared::util::{DAY_MILLIS, MAX_TERM_DAYS, millis_after_days};
use sqlx::SqlitePool;

use crate::audit::{self, HistoryAction, HistoryEntry, Origin, SYSTEM_FINGERPRINT};
use crate::db::{self, tenants::LicenseGrant};
use crate::error::{LicenseError, LicenseResult};

/// Length of a generated license key
pub const LICENSE_KEY_LEN: usize = 32;

/// New license key: 32 characters of `[A-Za-z0-9]` from the OS RNG
pub fn generate_key() -> String {
    rand::rngs::OsRng
        .sample_iter(&Alphanumeric)
        .take(LICENSE_KEY_LEN)
        .map(char::from)
        .collect()
}

/// Reject a term outside `1..=MAX_TERM_DAYS`
pub fn check_term(field: &str, days: i64) -> LicenseResult<()> {
    if !(1..=MAX_TERM_DAYS).contains(&days) {
        return Err(LicenseError::InvalidArgument(format!(
            "{field} must be between 1 and {MAX_TERM_DAYS}"
        )));
    }
    Ok(())
}

/// `from + days` as an expiry timestamp
pub fn expiry_after(from: i64, days: i64) -> LicenseResult<i64> {
    millis_after_days(from, days)
        .ok_or_else(|| LicenseError::InvalidArgument("expiry is out of range".into()))
}

/// Expiry after adding `extra_days`
///
/// A license still in the future is extended from its current expiry; an
/// expired or unbounded one is re-based on `now`.
pub fn extended_expiry(current: Option<i64>, extra_days: i64, now: i64) -> LicenseResult<i64> {
    match current {
        Some(exp) if exp > now => expiry_after(exp, extra_days),
        _ => expiry_after(now, extra_days),
    }
}

/// Days left on a license, counted in whole UTC calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "days", rename_all = "snake_case")]
pub enum DaysRemaining {
    /// No expiry set
    Unbounded,
    Remaining(i64),
    ExpiredAgo(i64),
}

fn utc_day(millis: i64) -> i64 {
    millis.div_euclid(DAY_MILLIS)
}

pub fn days_remaining(expiry: Option<i64>, now: i64) -> DaysRemaining {
    let Some(expiry) = expiry else {
        return DaysRemaining::Unbounded;
    };
    let diff = utc_day(expiry) - utc_day(now);
    if diff < 0 {
        DaysRemaining::ExpiredAgo(-diff)
    } else {
        DaysRemaining::Remaining(diff)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LicenseStatus {
    pub tenant_id: i64,
    pub tenant_name: String,
    pub active: bool,
    pub expires_at: Option<i64>,
    pub expired: bool,
    pub days_remaining: DaysRemaining,
    pub max_devices: i64,
    pub active_devices: i64,
}

#[derive(Clone)]
pub struct LicenseRegistry {
    pool: SqlitePool,
}

impl LicenseRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Issue a fresh key, switch the license on and reset expiry and quota
    pub async fn generate(
        &self,
        tenant_id: i64,
        validity_days: i64,
        max_devices: i64,
        origin: &Origin,
        now: i64,
    ) -> LicenseResult<String> {
        check_term("validity_days", validity_days)?;
        if max_devices < 1 {
            return Err(LicenseError::InvalidArgument(
                "max_devices must be at least 1".into(),
            ));
        }

        let key = generate_key();
        let grant = LicenseGrant {
            license_key: &key,
            expires_at: Some(expiry_after(now, validity_days)?),
            max_devices,
        };

        let mut tx = self.pool.begin().await?;
        db::tenants::set_license(&mut tx, tenant_id, &grant)
            .await
            .map_err(|e| not_found_as_tenant(e, tenant_id))?;
        audit::record_history(
            &mut tx,
            &HistoryEntry {
                tenant_id,
                license_key: Some(&key),
                action: HistoryAction::Generated,
                origin,
                fingerprint: SYSTEM_FINGERPRINT,
                detail: format!(
                    "License generated. Validity: {validity_days} days, max devices: {max_devices}"
                ),
            },
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(tenant_id, validity_days, max_devices, "License generated");
        Ok(key)
    }

    /// Flip the license switch; returns the new state
    pub async fn toggle(&self, tenant_id: i64, origin: &Origin, now: i64) -> LicenseResult<bool> {
        let mut tx = self.pool.begin().await?;
        let active = db::tenants::toggle_license_active(&mut tx, tenant_id)
            .await
            .map_err(|e| not_found_as_tenant(e, tenant_id))?;
        let key: Option<String> =
            sqlx::query_scalar("SELECT license_key FROM tenants WHERE id = ?")
                .bind(tenant_id)
                .fetch_one(&mut *tx)
                .await?;

        let (action, verb) = if active {
            (HistoryAction::Unblocked, "unblocked")
        } else {
            (HistoryAction::Blocked, "blocked")
        };
        audit::record_history(
            &mut tx,
            &HistoryEntry {
                tenant_id,
                license_key: key.as_deref(),
                action,
                origin,
                fingerprint: SYSTEM_FINGERPRINT,
                detail: format!("License {verb}"),
            },
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(tenant_id, active, "License toggled");
        Ok(active)
    }

    /// Push the expiry out by `extra_days`; returns the new expiry
    pub async fn extend(
        &self,
        tenant_id: i64,
        extra_days: i64,
        origin: &Origin,
        now: i64,
    ) -> LicenseResult<i64> {
        check_term("extra_days", extra_days)?;

        let mut tx = self.pool.begin().await?;
        if !db::tenants::lock_for_update(&mut tx, tenant_id).await? {
            return Err(LicenseError::NotFound(format!("Tenant {tenant_id}")));
        }
        let (current, key): (Option<i64>, Option<String>) = sqlx::query_as(
            "SELECT license_expires_at, license_key FROM tenants WHERE id = ?",
        )
        .bind(tenant_id)
        .fetch_one(&mut *tx)
        .await?;

        let new_expiry = extended_expiry(current, extra_days, now)?;
        db::tenants::set_license_expiry(&mut tx, tenant_id, new_expiry).await?;
        audit::record_history(
            &mut tx,
            &HistoryEntry {
                tenant_id,
                license_key: key.as_deref(),
                action: HistoryAction::Renewed,
                origin,
                fingerprint: SYSTEM_FINGERPRINT,
                detail: format!(
                    "License extended by {extra_days} days. New expiry: {}",
                    format_date(new_expiry)
                ),
            },
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(tenant_id, extra_days, new_expiry, "License extended");
        Ok(new_expiry)
    }

    pub async fn status(&self, tenant_id: i64, now: i64) -> LicenseResult<LicenseStatus> {
        let tenant = db::tenants::find_by_id(&self.pool, tenant_id)
            .await?
            .ok_or_else(|| LicenseError::NotFound(format!("Tenant {tenant_id}")))?;
        let active_devices = db::devices::count_active(&self.pool, tenant_id).await?;

        Ok(LicenseStatus {
            tenant_id,
            expired: tenant.is_expired(now),
            days_remaining: days_remaining(tenant.license_expires_at, now),
            tenant_name: tenant.name,
            active: tenant.license_active,
            expires_at: tenant.license_expires_at,
            max_devices: tenant.max_devices,
            active_devices,
        })
    }
}

fn not_found_as_tenant(err: db::RepoError, tenant_id: i64) -> LicenseError {
    match err {
        db::RepoError::NotFound(_) => LicenseError::NotFound(format!("Tenant {tenant_id}")),
        other => other.into(),
    }
}

/// `dd/mm/YYYY` in UTC, for history details and alerts
pub fn format_date(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| millis.to_string())
}
