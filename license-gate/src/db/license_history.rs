//! License history operations (append-only)

use super::RepoResult;
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};

pub struct NewHistoryEntry<'a> {
    pub tenant_id: i64,
    pub license_key: Option<&'a str>,
    pub action: &'a str,
    pub ip: Option<&'a str>,
    pub fingerprint: Option<&'a str>,
    pub user_id: Option<i64>,
    pub detail: Option<&'a str>,
    pub created_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct HistoryRow {
    pub id: i64,
    pub tenant_id: i64,
    pub license_key: Option<String>,
    pub action: String,
    pub ip: Option<String>,
    pub fingerprint: Option<String>,
    pub user_id: Option<i64>,
    pub detail: Option<String>,
    pub created_at: i64,
}

/// History entries only ever commit together with the change they describe
pub async fn insert(tx: &mut Transaction<'_, Sqlite>, entry: &NewHistoryEntry<'_>) -> RepoResult<i64> {
    let result = sqlx::query(
        "INSERT INTO license_history (tenant_id, license_key, action, ip, fingerprint, user_id, detail, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.tenant_id)
    .bind(entry.license_key)
    .bind(entry.action)
    .bind(entry.ip)
    .bind(entry.fingerprint)
    .bind(entry.user_id)
    .bind(entry.detail)
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn query(
    pool: &SqlitePool,
    tenant_id: Option<i64>,
    limit: i64,
    offset: i64,
) -> RepoResult<Vec<HistoryRow>> {
    let rows = sqlx::query_as::<_, HistoryRow>(
        "SELECT id, tenant_id, license_key, action, ip, fingerprint, user_id, detail, created_at \
         FROM license_history WHERE (?1 IS NULL OR tenant_id = ?1) ORDER BY id DESC LIMIT ?2 OFFSET ?3",
    )
    .bind(tenant_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn count_by_action(pool: &SqlitePool, action: &str) -> RepoResult<i64> {
    let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM license_history WHERE action = ?")
        .bind(action)
        .fetch_one(pool)
        .await?;
    Ok(n)
}
