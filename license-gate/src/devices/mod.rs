//! Device Ledger
//!
//! Binds fingerprints to tenants under the license quota. A tenant never has
//! more active devices than `max_devices`; activation enforces this with a
//! conditional write, and `check_authorization` reports a tenant that ended up
//! above it (quota lowered after binding) as `DEVICE_QUOTA_EXCEEDED`.

mod export;

pub use export::devices_csv;

use serde::Serialize;
use sqlx::SqlitePool;

use crate::audit::{
    self, AccessEntry, HistoryAction, HistoryEntry, Origin, ReasonCode,
};
use crate::db::{self, RepoError, devices::Device, devices::DeviceRow, tenants::Tenant};
use crate::error::{LicenseError, LicenseResult};
use crate::license::{check_term, expiry_after};

/// Device validity when the license itself never expires
pub const DEFAULT_DEVICE_DAYS: i64 = 365;

/// Outcome of a successful activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Activation {
    pub tenant_id: i64,
    pub device_id: i64,
    /// The fingerprint already had a binding for this tenant
    pub reactivated: bool,
}

/// How a bind request entered the system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindSource {
    /// Public activation with a license key; writes a `LICENSE_ACTIVATED` access entry
    Activation,
    /// Operator bind from the management API
    Operator,
}

#[derive(Clone)]
pub struct DeviceLedger {
    pool: SqlitePool,
}

impl DeviceLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Bind `fingerprint` to the tenant, or reactivate its existing binding
    pub async fn activate_or_bind(
        &self,
        tenant_id: i64,
        fingerprint: &str,
        origin: &Origin,
        now: i64,
    ) -> LicenseResult<Activation> {
        self.bind_inner(tenant_id, fingerprint, None, origin, now, BindSource::Activation)
            .await
    }

    /// Operator variant of [`DeviceLedger::activate_or_bind`] with free-text notes
    pub async fn bind(
        &self,
        tenant_id: i64,
        fingerprint: &str,
        notes: Option<&str>,
        origin: &Origin,
        now: i64,
    ) -> LicenseResult<Activation> {
        self.bind_inner(tenant_id, fingerprint, notes, origin, now, BindSource::Operator)
            .await
    }

    async fn bind_inner(
        &self,
        tenant_id: i64,
        fingerprint: &str,
        notes: Option<&str>,
        origin: &Origin,
        now: i64,
        source: BindSource,
    ) -> LicenseResult<Activation> {
        let fingerprint = fingerprint.trim();
        if fingerprint.is_empty() {
            return Err(LicenseError::InvalidArgument("fingerprint is required".into()));
        }

        let tenant = db::tenants::find_by_id(&self.pool, tenant_id)
            .await?
            .ok_or_else(|| LicenseError::NotFound(format!("Tenant {tenant_id}")))?;
        if !tenant.license_active {
            return Err(LicenseError::LicenseInactive);
        }

        let expires_at = Some(match tenant.license_expires_at {
            Some(expiry) => expiry,
            None => expiry_after(now, DEFAULT_DEVICE_DAYS)?,
        });
        let quota_exceeded = || LicenseError::QuotaExceeded {
            max: tenant.max_devices,
        };

        // Lock the tenant row first; the binding is then read and written by
        // one writer at a time.
        let mut tx = self.pool.begin().await?;
        if !db::tenants::lock_for_update(&mut tx, tenant_id).await? {
            return Err(LicenseError::NotFound(format!("Tenant {tenant_id}")));
        }
        let (device_id, reactivated) =
            match db::devices::find_by_fingerprint_tx(&mut tx, fingerprint).await? {
                Some(device) if device.tenant_id != tenant_id => {
                    return Err(LicenseError::FingerprintBound);
                }
                Some(device) => {
                    let still_active =
                        db::devices::refresh_if_active(&mut tx, device.id, expires_at).await?;
                    if !still_active
                        && !db::devices::reactivate_within_quota(
                            &mut tx, device.id, tenant_id, expires_at,
                        )
                        .await?
                    {
                        return Err(quota_exceeded());
                    }
                    (device.id, true)
                }
                None => {
                    match db::devices::insert_within_quota(
                        &mut tx,
                        tenant_id,
                        fingerprint,
                        notes,
                        expires_at,
                        now,
                    )
                    .await?
                    {
                        Some(id) => (id, false),
                        None => return Err(quota_exceeded()),
                    }
                }
            };

        let active_now = db::devices::count_active_tx(&mut tx, tenant_id).await?;
        let (action, detail) = if reactivated {
            (
                HistoryAction::DeviceReactivated,
                format!("Device reactivated. ID: {device_id}"),
            )
        } else {
            (
                HistoryAction::DeviceActivated,
                format!(
                    "New device activated. Active devices: {active_now}/{}",
                    tenant.max_devices
                ),
            )
        };
        audit::record_history(
            &mut tx,
            &HistoryEntry {
                tenant_id,
                license_key: tenant.license_key.as_deref(),
                action,
                origin,
                fingerprint,
                detail,
            },
            now,
        )
        .await?;

        if source == BindSource::Activation {
            audit::record_access_tx(
                &mut tx,
                &AccessEntry {
                    tenant_id: Some(tenant_id),
                    user_id: None,
                    fingerprint: Some(fingerprint.to_string()),
                    ip: origin.ip.clone(),
                    reason: ReasonCode::LicenseActivated,
                },
                now,
            )
            .await?;
        }
        tx.commit().await?;

        tracing::info!(
            tenant_id,
            device_id,
            reactivated,
            active_devices = active_now,
            max_devices = tenant.max_devices,
            "Device bound"
        );
        Ok(Activation {
            tenant_id,
            device_id,
            reactivated,
        })
    }

    /// Read-only device decision for the gate; never writes
    ///
    /// Returns `Authorized` or the first failing reason, in order: license
    /// switch, license expiry, binding, blocked flag, quota.
    pub async fn check_authorization(
        &self,
        tenant_id: i64,
        fingerprint: &str,
        now: i64,
    ) -> LicenseResult<ReasonCode> {
        let tenant = db::tenants::find_by_id(&self.pool, tenant_id)
            .await?
            .ok_or_else(|| LicenseError::NotFound(format!("Tenant {tenant_id}")))?;
        self.check_for_tenant(&tenant, fingerprint, now).await
    }

    pub(crate) async fn check_for_tenant(
        &self,
        tenant: &Tenant,
        fingerprint: &str,
        now: i64,
    ) -> LicenseResult<ReasonCode> {
        if !tenant.license_active {
            return Ok(ReasonCode::TenantLicenseInactive);
        }
        if tenant.is_expired(now) {
            return Ok(ReasonCode::LicenseExpired);
        }

        let device = match db::devices::find_by_fingerprint(&self.pool, fingerprint).await? {
            Some(d) if d.tenant_id == tenant.id => d,
            _ => return Ok(ReasonCode::DeviceNotBound),
        };
        if !device.active {
            return Ok(ReasonCode::DeviceBlocked);
        }

        let active = db::devices::count_active(&self.pool, tenant.id).await?;
        if active > tenant.max_devices {
            return Ok(ReasonCode::DeviceQuotaExceeded);
        }
        Ok(ReasonCode::Authorized)
    }

    pub async fn find(&self, device_id: i64) -> LicenseResult<Device> {
        db::devices::find_by_id(&self.pool, device_id)
            .await?
            .ok_or_else(|| LicenseError::NotFound(format!("Device {device_id}")))
    }

    /// Block or unblock a device; expiry is unchanged
    pub async fn set_active(&self, device_id: i64, active: bool) -> LicenseResult<()> {
        db::devices::set_active(&self.pool, device_id, active)
            .await
            .map_err(|e| not_found_as_device(e, device_id))?;
        tracing::info!(device_id, active, "Device status changed");
        Ok(())
    }

    /// Set expiry to `now + days`, whatever it was
    pub async fn renew(&self, device_id: i64, days: i64, now: i64) -> LicenseResult<i64> {
        check_term("days", days)?;
        let expires_at = expiry_after(now, days)?;
        db::devices::set_expiry(&self.pool, device_id, expires_at)
            .await
            .map_err(|e| not_found_as_device(e, device_id))?;
        tracing::info!(device_id, days, "Device renewed");
        Ok(expires_at)
    }

    pub async fn delete(&self, device_id: i64) -> LicenseResult<()> {
        db::devices::delete(&self.pool, device_id)
            .await
            .map_err(|e| not_found_as_device(e, device_id))?;
        tracing::info!(device_id, "Device deleted");
        Ok(())
    }

    /// Devices of one tenant, or all when `tenant_id` is `None`
    pub async fn list(&self, tenant_id: Option<i64>) -> LicenseResult<Vec<DeviceRow>> {
        Ok(db::devices::list(&self.pool, tenant_id).await?)
    }
}

fn not_found_as_device(err: RepoError, device_id: i64) -> LicenseError {
    match err {
        RepoError::NotFound(_) => LicenseError::NotFound(format!("Device {device_id}")),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use shared::util::DAY_MILLIS;

    const NOW: i64 = 1_760_000_000_000;

    async fn setup(max_devices: i64, expires_at: Option<i64>) -> (DeviceLedger, SqlitePool) {
        let db = DbService::in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO tenants (id, name, license_key, license_active, license_expires_at, max_devices, created_at) \
             VALUES (1, 'Loja', 'KEY1', 1, ?, ?, 0), (2, 'Outra', 'KEY2', 1, NULL, 5, 0)",
        )
        .bind(expires_at)
        .bind(max_devices)
        .execute(&db.pool)
        .await
        .unwrap();
        (DeviceLedger::new(db.pool.clone()), db.pool)
    }

    fn origin() -> Origin {
        Origin::new("192.168.0.10", None)
    }

    #[tokio::test]
    async fn test_quota_and_rebind() {
        let (ledger, pool) = setup(3, Some(NOW + 365 * DAY_MILLIS)).await;

        for fp in ["fp1", "fp2", "fp3"] {
            let a = ledger.activate_or_bind(1, fp, &origin(), NOW).await.unwrap();
            assert!(!a.reactivated);
        }
        let err = ledger
            .activate_or_bind(1, "fp4", &origin(), NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, LicenseError::QuotaExceeded { max: 3 }));

        let again = ledger.activate_or_bind(1, "fp1", &origin(), NOW).await.unwrap();
        assert!(again.reactivated);
        assert_eq!(db::devices::count_active(&pool, 1).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_activation_writes_history_and_access_log() {
        let (ledger, pool) = setup(2, None).await;
        ledger.activate_or_bind(1, "fp1", &origin(), NOW).await.unwrap();
        ledger.activate_or_bind(1, "fp1", &origin(), NOW).await.unwrap();

        assert_eq!(
            db::license_history::count_by_action(&pool, "DEVICE_ACTIVATED").await.unwrap(),
            1
        );
        assert_eq!(
            db::license_history::count_by_action(&pool, "DEVICE_REACTIVATED").await.unwrap(),
            1
        );
        let logs = db::access_logs::query(&pool, Some(1), 10, 0).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|l| l.reason == "LICENSE_ACTIVATED" && l.user_id.is_none()));
    }

    #[tokio::test]
    async fn test_device_expiry_follows_license() {
        let license_expiry = NOW + 40 * DAY_MILLIS;
        let (ledger, _) = setup(2, Some(license_expiry)).await;
        let a = ledger.activate_or_bind(1, "fp1", &origin(), NOW).await.unwrap();
        assert_eq!(ledger.find(a.device_id).await.unwrap().expires_at, Some(license_expiry));

        // unbounded license: one year from now
        let b = ledger.activate_or_bind(2, "fp2", &origin(), NOW).await.unwrap();
        assert_eq!(
            ledger.find(b.device_id).await.unwrap().expires_at,
            Some(NOW + 365 * DAY_MILLIS)
        );
    }

    #[tokio::test]
    async fn test_fingerprint_bound_to_other_tenant() {
        let (ledger, _) = setup(3, None).await;
        ledger.activate_or_bind(1, "shared", &origin(), NOW).await.unwrap();
        let err = ledger
            .activate_or_bind(2, "shared", &origin(), NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, LicenseError::FingerprintBound));
        assert_eq!(
            ledger.check_authorization(2, "shared", NOW).await.unwrap(),
            ReasonCode::DeviceNotBound
        );
    }

    #[tokio::test]
    async fn test_inactive_license_rejects_activation() {
        let (ledger, pool) = setup(3, None).await;
        sqlx::query("UPDATE tenants SET license_active = 0 WHERE id = 1")
            .execute(&pool)
            .await
            .unwrap();
        let err = ledger
            .activate_or_bind(1, "fp1", &origin(), NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, LicenseError::LicenseInactive));
    }

    #[tokio::test]
    async fn test_reactivating_blocked_device_needs_free_slot() {
        let (ledger, _) = setup(1, None).await;
        let a = ledger.activate_or_bind(1, "fp1", &origin(), NOW).await.unwrap();
        ledger.set_active(a.device_id, false).await.unwrap();
        ledger.activate_or_bind(1, "fp2", &origin(), NOW).await.unwrap();

        let err = ledger
            .activate_or_bind(1, "fp1", &origin(), NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, LicenseError::QuotaExceeded { max: 1 }));
    }

    #[tokio::test]
    async fn test_check_authorization_reasons() {
        let (ledger, pool) = setup(2, Some(NOW + DAY_MILLIS)).await;
        assert_eq!(
            ledger.check_authorization(1, "unknown", NOW).await.unwrap(),
            ReasonCode::DeviceNotBound
        );

        let a = ledger.activate_or_bind(1, "fp1", &origin(), NOW).await.unwrap();
        assert_eq!(
            ledger.check_authorization(1, "fp1", NOW).await.unwrap(),
            ReasonCode::Authorized
        );

        ledger.set_active(a.device_id, false).await.unwrap();
        assert_eq!(
            ledger.check_authorization(1, "fp1", NOW).await.unwrap(),
            ReasonCode::DeviceBlocked
        );
        ledger.set_active(a.device_id, true).await.unwrap();

        // quota lowered below the bound set
        ledger.activate_or_bind(1, "fp2", &origin(), NOW).await.unwrap();
        sqlx::query("UPDATE tenants SET max_devices = 1 WHERE id = 1")
            .execute(&pool)
            .await
            .unwrap();
        assert_eq!(
            ledger.check_authorization(1, "fp1", NOW).await.unwrap(),
            ReasonCode::DeviceQuotaExceeded
        );

        assert_eq!(
            ledger.check_authorization(1, "fp1", NOW + 2 * DAY_MILLIS).await.unwrap(),
            ReasonCode::LicenseExpired
        );
        sqlx::query("UPDATE tenants SET license_active = 0 WHERE id = 1")
            .execute(&pool)
            .await
            .unwrap();
        assert_eq!(
            ledger.check_authorization(1, "fp1", NOW).await.unwrap(),
            ReasonCode::TenantLicenseInactive
        );

        assert!(matches!(
            ledger.check_authorization(99, "fp1", NOW).await,
            Err(LicenseError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_check_authorization_writes_nothing() {
        let (ledger, pool) = setup(2, None).await;
        ledger.check_authorization(1, "fp1", NOW).await.unwrap();
        assert_eq!(db::access_logs::count(&pool, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_operator_mutators() {
        let (ledger, _) = setup(2, Some(NOW + 10 * DAY_MILLIS)).await;
        let a = ledger
            .bind(1, "fp1", Some("balcão"), &Origin::system(), NOW)
            .await
            .unwrap();
        let device = ledger.find(a.device_id).await.unwrap();
        assert_eq!(device.notes.as_deref(), Some("balcão"));

        let renewed = ledger.renew(a.device_id, 90, NOW).await.unwrap();
        assert_eq!(renewed, NOW + 90 * DAY_MILLIS);

        ledger.set_active(a.device_id, false).await.unwrap();
        assert_eq!(ledger.find(a.device_id).await.unwrap().expires_at, Some(renewed));

        ledger.delete(a.device_id).await.unwrap();
        assert!(matches!(
            ledger.set_active(a.device_id, true).await,
            Err(LicenseError::NotFound(_))
        ));
        assert!(matches!(
            ledger.renew(a.device_id, 0, NOW).await,
            Err(LicenseError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_renew_rejects_oversized_terms() {
        let (ledger, _) = setup(2, None).await;
        let a = ledger.activate_or_bind(1, "fp1", &origin(), NOW).await.unwrap();
        let before = ledger.find(a.device_id).await.unwrap().expires_at;

        for days in [shared::util::MAX_TERM_DAYS + 1, i64::MAX / 2, i64::MAX] {
            assert!(matches!(
                ledger.renew(a.device_id, days, NOW).await,
                Err(LicenseError::InvalidArgument(_))
            ));
        }
        assert_eq!(ledger.find(a.device_id).await.unwrap().expires_at, before);
    }

    #[tokio::test]
    async fn test_deleted_device_binds_again_as_new() {
        let (ledger, pool) = setup(1, None).await;
        let a = ledger.activate_or_bind(1, "fp1", &origin(), NOW).await.unwrap();
        ledger.delete(a.device_id).await.unwrap();

        let b = ledger.activate_or_bind(1, "fp1", &origin(), NOW).await.unwrap();
        assert!(!b.reactivated);
        assert_ne!(b.device_id, a.device_id);
        assert_eq!(db::devices::count_active(&pool, 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_operator_bind_writes_no_access_log() {
        let (ledger, pool) = setup(2, None).await;
        ledger.bind(1, "fp1", None, &Origin::system(), NOW).await.unwrap();
        assert_eq!(db::access_logs::count(&pool, None).await.unwrap(), 0);
        assert_eq!(ledger.list(Some(1)).await.unwrap().len(), 1);
        assert!(ledger.list(Some(2)).await.unwrap().is_empty());
        assert_eq!(ledger.list(None).await.unwrap().len(), 1);
    }
}
