//! User Repository

use super::RepoResult;
use sqlx::SqlitePool;

/// Stored user. `role` is the raw column; see [`crate::auth::Role`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub tenant_id: Option<i64>,
    pub created_at: i64,
}

const USER_COLUMNS: &str = "id, username, password_hash, role, tenant_id, created_at";

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_by_username(pool: &SqlitePool, username: &str) -> RepoResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Insert a user; a taken username surfaces as `RepoError::Duplicate`
pub async fn insert(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
    role: &str,
    tenant_id: Option<i64>,
    now: i64,
) -> RepoResult<i64> {
    let result = sqlx::query(
        "INSERT INTO users (username, password_hash, role, tenant_id, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(username)
    .bind(password_hash)
    .bind(role)
    .bind(tenant_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Rewrite role and password of an existing user (superadmin bootstrap)
pub async fn update_credentials(
    pool: &SqlitePool,
    id: i64,
    password_hash: &str,
    role: &str,
) -> RepoResult<()> {
    sqlx::query("UPDATE users SET password_hash = ?, role = ? WHERE id = ?")
        .bind(password_hash)
        .bind(role)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn count_by_tenant(pool: &SqlitePool, tenant_id: i64) -> RepoResult<i64> {
    let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE tenant_id = ?")
        .bind(tenant_id)
        .fetch_one(pool)
        .await?;
    Ok(n)
}
