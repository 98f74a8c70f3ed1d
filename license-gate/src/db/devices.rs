//! Device Repository
//!
//! Quota-bounded writes are single conditional statements: the active count
//! is evaluated inside the same statement that inserts or reactivates, so the
//! write itself is the serialization point.

use super::{RepoError, RepoResult};
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};

const DEVICE_COLUMNS: &str = "id, tenant_id, fingerprint, active, notes, created_at, expires_at";

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Device {
    pub id: i64,
    pub tenant_id: i64,
    pub fingerprint: String,
    pub active: bool,
    pub notes: Option<String>,
    pub created_at: i64,
    pub expires_at: Option<i64>,
}

/// Device joined with its tenant name, for listings and export
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct DeviceRow {
    pub id: i64,
    pub tenant_id: i64,
    pub tenant_name: String,
    pub fingerprint: String,
    pub active: bool,
    pub notes: Option<String>,
    pub created_at: i64,
    pub expires_at: Option<i64>,
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Device>> {
    let device = sqlx::query_as::<_, Device>(&format!(
        "SELECT {DEVICE_COLUMNS} FROM devices WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(device)
}

/// Fingerprints are globally unique, so at most one row matches
pub async fn find_by_fingerprint(pool: &SqlitePool, fingerprint: &str) -> RepoResult<Option<Device>> {
    let device = sqlx::query_as::<_, Device>(&format!(
        "SELECT {DEVICE_COLUMNS} FROM devices WHERE fingerprint = ?"
    ))
    .bind(fingerprint)
    .fetch_optional(pool)
    .await?;
    Ok(device)
}

pub async fn find_by_fingerprint_tx(
    tx: &mut Transaction<'_, Sqlite>,
    fingerprint: &str,
) -> RepoResult<Option<Device>> {
    let device = sqlx::query_as::<_, Device>(&format!(
        "SELECT {DEVICE_COLUMNS} FROM devices WHERE fingerprint = ?"
    ))
    .bind(fingerprint)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(device)
}

pub async fn count_active(pool: &SqlitePool, tenant_id: i64) -> RepoResult<i64> {
    let n = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM devices WHERE tenant_id = ? AND active = 1",
    )
    .bind(tenant_id)
    .fetch_one(pool)
    .await?;
    Ok(n)
}

/// Devices of one tenant, or of all tenants when `tenant_id` is `None`
pub async fn list(pool: &SqlitePool, tenant_id: Option<i64>) -> RepoResult<Vec<DeviceRow>> {
    let rows = sqlx::query_as::<_, DeviceRow>(
        "SELECT d.id, d.tenant_id, t.name AS tenant_name, d.fingerprint, d.active, d.notes, d.created_at, d.expires_at \
         FROM devices d JOIN tenants t ON t.id = d.tenant_id \
         WHERE (?1 IS NULL OR d.tenant_id = ?1) \
         ORDER BY d.created_at DESC, d.id DESC",
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Insert a new active binding only while the tenant is below its quota
///
/// Returns `None` when the tenant already holds `max_devices` active devices.
/// A fingerprint bound anywhere else surfaces as `RepoError::Duplicate`.
pub async fn insert_within_quota(
    tx: &mut Transaction<'_, Sqlite>,
    tenant_id: i64,
    fingerprint: &str,
    notes: Option<&str>,
    expires_at: Option<i64>,
    now: i64,
) -> RepoResult<Option<i64>> {
    let result = sqlx::query(
        "INSERT INTO devices (tenant_id, fingerprint, active, notes, created_at, expires_at) \
         SELECT ?1, ?2, 1, ?3, ?4, ?5 \
         WHERE (SELECT COUNT(*) FROM devices WHERE tenant_id = ?1 AND active = 1) \
             < (SELECT max_devices FROM tenants WHERE id = ?1)",
    )
    .bind(tenant_id)
    .bind(fingerprint)
    .bind(notes)
    .bind(now)
    .bind(expires_at)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    Ok(Some(result.last_insert_rowid()))
}

/// Reactivate an inactive binding only while the tenant is below its quota
///
/// Returns `false` when no slot is free (or the row is no longer inactive).
pub async fn reactivate_within_quota(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    tenant_id: i64,
    expires_at: Option<i64>,
) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE devices SET active = 1, expires_at = ?1 \
         WHERE id = ?2 AND active = 0 \
           AND (SELECT COUNT(*) FROM devices WHERE tenant_id = ?3 AND active = 1) \
             < (SELECT max_devices FROM tenants WHERE id = ?3)",
    )
    .bind(expires_at)
    .bind(id)
    .bind(tenant_id)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Refresh the expiry of a binding that is still active
///
/// Returns `false` if the row is gone or was deactivated meanwhile.
pub async fn refresh_if_active(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    expires_at: Option<i64>,
) -> RepoResult<bool> {
    let result = sqlx::query("UPDATE devices SET expires_at = ? WHERE id = ? AND active = 1")
        .bind(expires_at)
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_active_tx(tx: &mut Transaction<'_, Sqlite>, tenant_id: i64) -> RepoResult<i64> {
    let n = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM devices WHERE tenant_id = ? AND active = 1",
    )
    .bind(tenant_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(n)
}

/// Toggle the active flag; expiry is left alone
pub async fn set_active(pool: &SqlitePool, id: i64, active: bool) -> RepoResult<()> {
    let rows = sqlx::query("UPDATE devices SET active = ? WHERE id = ?")
        .bind(active)
        .bind(id)
        .execute(pool)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Device {id} not found")));
    }
    Ok(())
}

pub async fn set_expiry(pool: &SqlitePool, id: i64, expires_at: i64) -> RepoResult<()> {
    let rows = sqlx::query("UPDATE devices SET expires_at = ? WHERE id = ?")
        .bind(expires_at)
        .bind(id)
        .execute(pool)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Device {id} not found")));
    }
    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: i64) -> RepoResult<()> {
    let rows = sqlx::query("DELETE FROM devices WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Device {id} not found")));
    }
    Ok(())
}
