//! Tenant Repository
//!
//! A tenant row also carries its license (key, switch, expiry, device quota).

use super::{RepoError, RepoResult};
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};

const TENANT_COLUMNS: &str =
    "id, name, active, license_key, license_active, license_expires_at, max_devices, created_at";

/// Tenant record with its license fields inline
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
    /// Hard kill switch, independent of licensing
    pub active: bool,
    pub license_key: Option<String>,
    pub license_active: bool,
    /// Unix millis; `None` never expires
    pub license_expires_at: Option<i64>,
    pub max_devices: i64,
    pub created_at: i64,
}

impl Tenant {
    /// Expired means an expiry is set and lies strictly before `now`
    pub fn is_expired(&self, now: i64) -> bool {
        self.license_expires_at.is_some_and(|exp| exp < now)
    }
}

/// License fields written together on generate
pub struct LicenseGrant<'a> {
    pub license_key: &'a str,
    pub expires_at: Option<i64>,
    pub max_devices: i64,
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Tenant>> {
    let tenant = sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(tenant)
}

pub async fn find_by_license_key(pool: &SqlitePool, key: &str) -> RepoResult<Option<Tenant>> {
    let tenant = sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants WHERE license_key = ?"
    ))
    .bind(key)
    .fetch_optional(pool)
    .await?;
    Ok(tenant)
}

/// All tenants, ascending id (capacity rank order)
pub async fn find_all(pool: &SqlitePool) -> RepoResult<Vec<Tenant>> {
    let tenants = sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants ORDER BY id ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(tenants)
}

pub async fn count(pool: &SqlitePool) -> RepoResult<i64> {
    let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tenants")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

/// Insert a tenant only while fewer than `ceiling` tenants exist
///
/// Returns `None` when the ceiling is already reached. The count and the
/// insert are one statement, so two concurrent creations cannot both pass.
pub async fn insert_within_ceiling(
    tx: &mut Transaction<'_, Sqlite>,
    name: &str,
    grant: &LicenseGrant<'_>,
    ceiling: i64,
    now: i64,
) -> RepoResult<Option<i64>> {
    let result = sqlx::query(
        "INSERT INTO tenants (name, active, license_key, license_active, license_expires_at, max_devices, created_at) \
         SELECT ?1, 1, ?2, 1, ?3, ?4, ?5 \
         WHERE (SELECT COUNT(*) FROM tenants) < ?6",
    )
    .bind(name)
    .bind(grant.license_key)
    .bind(grant.expires_at)
    .bind(grant.max_devices)
    .bind(now)
    .bind(ceiling)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    Ok(Some(result.last_insert_rowid()))
}

/// Overwrite the license: new key, switched on, new expiry and quota
pub async fn set_license(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    grant: &LicenseGrant<'_>,
) -> RepoResult<()> {
    let rows = sqlx::query(
        "UPDATE tenants SET license_key = ?1, license_active = 1, license_expires_at = ?2, max_devices = ?3 WHERE id = ?4",
    )
    .bind(grant.license_key)
    .bind(grant.expires_at)
    .bind(grant.max_devices)
    .bind(id)
    .execute(&mut **tx)
    .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Tenant {id} not found")));
    }
    Ok(())
}

/// Flip `license_active` in place and return the new value
pub async fn toggle_license_active(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
) -> RepoResult<bool> {
    let active = sqlx::query_scalar::<_, bool>(
        "UPDATE tenants SET license_active = NOT license_active WHERE id = ? RETURNING license_active",
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;
    active.ok_or_else(|| RepoError::NotFound(format!("Tenant {id} not found")))
}

/// Take the write lock on a tenant row before reading inside `tx`
///
/// Returns `false` when the tenant does not exist.
pub async fn lock_for_update(tx: &mut Transaction<'_, Sqlite>, id: i64) -> RepoResult<bool> {
    let touched = sqlx::query("UPDATE tenants SET max_devices = max_devices WHERE id = ?")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(touched.rows_affected() > 0)
}

pub async fn set_license_expiry(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    expires_at: i64,
) -> RepoResult<()> {
    let rows = sqlx::query("UPDATE tenants SET license_expires_at = ? WHERE id = ?")
        .bind(expires_at)
        .bind(id)
        .execute(&mut **tx)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Tenant {id} not found")));
    }
    Ok(())
}

pub async fn set_active(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    active: bool,
) -> RepoResult<()> {
    let rows = sqlx::query("UPDATE tenants SET active = ? WHERE id = ?")
        .bind(active)
        .bind(id)
        .execute(&mut **tx)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Tenant {id} not found")));
    }
    Ok(())
}

/// Switch off both the tenant and its license (capacity remediation)
pub async fn disable_with_license(tx: &mut Transaction<'_, Sqlite>, id: i64) -> RepoResult<()> {
    sqlx::query("UPDATE tenants SET active = 0, license_active = 0 WHERE id = ?")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Tenant with device and user counts, for the operator overview
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct TenantSummary {
    pub id: i64,
    pub name: String,
    pub active: bool,
    pub license_active: bool,
    pub license_expires_at: Option<i64>,
    pub max_devices: i64,
    pub created_at: i64,
    pub device_count: i64,
    pub active_devices: i64,
    pub user_count: i64,
}

pub async fn summaries(pool: &SqlitePool) -> RepoResult<Vec<TenantSummary>> {
    let rows = sqlx::query_as::<_, TenantSummary>(
        "SELECT t.id, t.name, t.active, t.license_active, t.license_expires_at, t.max_devices, t.created_at, \
             (SELECT COUNT(*) FROM devices d WHERE d.tenant_id = t.id) AS device_count, \
             (SELECT COUNT(*) FROM devices d WHERE d.tenant_id = t.id AND d.active = 1) AS active_devices, \
             (SELECT COUNT(*) FROM users u WHERE u.tenant_id = t.id) AS user_count \
         FROM tenants t ORDER BY t.id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
