//! Access log operations (append-only)

use super::RepoResult;
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};

/// Row to append
pub struct NewAccessLog<'a> {
    pub tenant_id: Option<i64>,
    pub user_id: Option<i64>,
    pub fingerprint: Option<&'a str>,
    pub ip: Option<&'a str>,
    pub reason: &'a str,
    pub created_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AccessLogRow {
    pub id: i64,
    pub tenant_id: Option<i64>,
    pub user_id: Option<i64>,
    pub fingerprint: Option<String>,
    pub ip: Option<String>,
    pub reason: String,
    pub created_at: i64,
}

const INSERT_SQL: &str = "INSERT INTO access_logs (tenant_id, user_id, fingerprint, ip, reason, created_at) VALUES (?, ?, ?, ?, ?, ?)";

pub async fn insert(pool: &SqlitePool, entry: &NewAccessLog<'_>) -> RepoResult<i64> {
    let result = sqlx::query(INSERT_SQL)
        .bind(entry.tenant_id)
        .bind(entry.user_id)
        .bind(entry.fingerprint)
        .bind(entry.ip)
        .bind(entry.reason)
        .bind(entry.created_at)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Same as [`insert`], inside a caller-owned transaction
pub async fn insert_tx(
    tx: &mut Transaction<'_, Sqlite>,
    entry: &NewAccessLog<'_>,
) -> RepoResult<i64> {
    let result = sqlx::query(INSERT_SQL)
        .bind(entry.tenant_id)
        .bind(entry.user_id)
        .bind(entry.fingerprint)
        .bind(entry.ip)
        .bind(entry.reason)
        .bind(entry.created_at)
        .execute(&mut **tx)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Newest first, optionally restricted to one tenant
pub async fn query(
    pool: &SqlitePool,
    tenant_id: Option<i64>,
    limit: i64,
    offset: i64,
) -> RepoResult<Vec<AccessLogRow>> {
    let rows = sqlx::query_as::<_, AccessLogRow>(
        "SELECT id, tenant_id, user_id, fingerprint, ip, reason, created_at FROM access_logs \
         WHERE (?1 IS NULL OR tenant_id = ?1) ORDER BY id DESC LIMIT ?2 OFFSET ?3",
    )
    .bind(tenant_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn count(pool: &SqlitePool, tenant_id: Option<i64>) -> RepoResult<i64> {
    let n = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM access_logs WHERE (?1 IS NULL OR tenant_id = ?1)",
    )
    .bind(tenant_id)
    .fetch_one(pool)
    .await?;
    Ok(n)
}
