//! Users, roles and sessions

pub mod password;
pub mod session;

pub use password::{hash_password, verify_password};
pub use session::{SessionKeys, clear_session_cookie, cookie_value};

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db::{self, RepoError, users::User};
use crate::error::{LicenseError, LicenseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Operator of the whole installation; bypasses the device gate
    SuperAdmin,
    /// Manages one tenant
    Admin,
    User,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::Admin => "ADMIN",
            Self::User => "USER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SUPER_ADMIN" => Some(Self::SuperAdmin),
            "ADMIN" => Some(Self::Admin),
            "USER" => Some(Self::User),
            _ => None,
        }
    }
}

/// Authenticated user attached to the request by the gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub tenant_id: Option<i64>,
}

impl SessionUser {
    pub fn from_user(user: &User) -> Option<Self> {
        Some(Self {
            id: user.id,
            username: user.username.clone(),
            role: Role::parse(&user.role)?,
            tenant_id: user.tenant_id,
        })
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    /// Whether this user may manage `tenant_id`
    pub fn can_manage(&self, tenant_id: i64) -> bool {
        match self.role {
            Role::SuperAdmin => true,
            Role::Admin => self.tenant_id == Some(tenant_id),
            Role::User => false,
        }
    }
}

/// Check credentials; `None` for unknown user or wrong password
pub async fn authenticate(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> LicenseResult<Option<User>> {
    let Some(user) = db::users::find_by_username(pool, username).await? else {
        return Ok(None);
    };
    if !verify_password(password, &user.password_hash) {
        return Ok(None);
    }
    Ok(Some(user))
}

pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    password: &str,
    role: Role,
    tenant_id: Option<i64>,
    now: i64,
) -> LicenseResult<i64> {
    let username = username.trim();
    if username.is_empty() {
        return Err(LicenseError::InvalidArgument("username is required".into()));
    }
    if password.len() < 8 {
        return Err(LicenseError::InvalidArgument(
            "password must be at least 8 characters".into(),
        ));
    }
    if role != Role::SuperAdmin && tenant_id.is_none() {
        return Err(LicenseError::InvalidArgument(
            "tenant_id is required for this role".into(),
        ));
    }
    if let Some(id) = tenant_id
        && db::tenants::find_by_id(pool, id).await?.is_none()
    {
        return Err(LicenseError::NotFound(format!("Tenant {id}")));
    }

    let hash = hash_password(password)
        .map_err(|e| LicenseError::Internal(format!("password hashing failed: {e}")))?;
    let id = db::users::insert(pool, username, &hash, role.as_str(), tenant_id, now)
        .await
        .map_err(|e| match e {
            RepoError::Duplicate(_) => {
                LicenseError::InvalidArgument(format!("username '{username}' is taken"))
            }
            other => other.into(),
        })?;
    tracing::info!(user_id = id, role = role.as_str(), ?tenant_id, "User created");
    Ok(id)
}

/// Make sure the configured operator account exists with role `SuperAdmin`
///
/// An existing user of that name gets its password and role rewritten.
pub async fn ensure_superadmin(
    pool: &SqlitePool,
    username: &str,
    password: &str,
    now: i64,
) -> LicenseResult<i64> {
    match db::users::find_by_username(pool, username).await? {
        Some(user) => {
            let hash = hash_password(password).map_err(|e| {
                LicenseError::Internal(format!("password hashing failed: {e}"))
            })?;
            db::users::update_credentials(pool, user.id, &hash, Role::SuperAdmin.as_str()).await?;
            tracing::info!(user_id = user.id, "Superadmin credentials refreshed");
            Ok(user.id)
        }
        None => {
            let id = create_user(pool, username, password, Role::SuperAdmin, None, now).await?;
            tracing::info!(user_id = id, "Superadmin created");
            Ok(id)
        }
    }
}
