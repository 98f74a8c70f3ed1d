//! Authorization Gate
//!
//! Per-request state machine. Checks run in a fixed order and the first
//! failure decides:
//!
//! | # | state                     | outcome                      | access log | alert |
//! |---|---------------------------|------------------------------|------------|-------|
//! | 1 | no session                | redirect to login            | no         | no    |
//! | 2 | session user unknown      | clear session, redirect      | no         | no    |
//! | 3 | `Role::SuperAdmin`        | allow, skip everything below | no         | no    |
//! | 4 | user without tenant       | clear session, redirect      | no         | no    |
//! | 5 | tenant missing / disabled | clear session, redirect      | no         | no    |
//! | 6 | license switched off      | clear session, 403           | yes        | yes   |
//! | 7 | license expired           | clear session, 403           | yes        | yes   |
//! | 8 | no `fp` cookie            | 403                          | no         | no    |
//! | 9 | device not authorized     | 403 with cause               | yes        | yes   |
//! |10 | authorized                | allow                        | yes        | no    |
//!
//! The super-administrator bypass is a deliberate trust boundary: that role
//! is never subject to licensing or device binding.
//!
//! Storage failures from step 2 on yield [`Decision::Unavailable`]; the gate
//! never allows a request it could not check. A failed access-log write does
//! not change the decision; it is reported in
//! [`AuthorizationResult::audit_write_error`].

pub mod middleware;

use serde::Serialize;
use shared::error::ErrorCode;
use sqlx::SqlitePool;

use crate::alert::{Alert, AlertDispatcher};
use crate::audit::{AccessEntry, AuditTrail, ReasonCode};
use crate::auth::SessionUser;
use crate::db::{self, tenants::Tenant};
use crate::devices::DeviceLedger;
use crate::error::LicenseError;
use crate::license::format_date;

/// What the gate knows about an inbound request
#[derive(Debug, Clone, Default)]
pub struct GateRequest {
    /// User id from a valid session token
    pub user_id: Option<i64>,
    pub fingerprint: Option<String>,
    pub ip: Option<String>,
    pub path: String,
}

/// Why a request that reached the license checks was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyCause {
    LicenseInactive,
    LicenseExpired,
    FingerprintMissing,
    /// Device check failed with the given reason
    Device(ReasonCode),
}

/// Why the user is sent back to the login page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginRedirect {
    NoSession,
    InvalidSession,
    NoTenant,
    TenantUnavailable,
}

impl LoginRedirect {
    pub const fn clears_session(&self) -> bool {
        !matches!(self, Self::NoSession)
    }

    /// Error slug and code shown on the login page, if any
    pub const fn reason(&self) -> Option<(&'static str, ErrorCode)> {
        match self {
            Self::NoSession | Self::InvalidSession => None,
            Self::NoTenant => Some(("no_tenant", ErrorCode::TenantNotSelected)),
            Self::TenantUnavailable => Some(("tenant_unavailable", ErrorCode::TenantDisabled)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow { user: SessionUser },
    RedirectToLogin(LoginRedirect),
    Deny { cause: DenyCause, clear_session: bool },
    /// Storage failed while checking; fail closed
    Unavailable,
}

#[derive(Debug)]
pub struct AuthorizationResult {
    pub decision: Decision,
    /// Access-log write that failed; the decision stands regardless
    pub audit_write_error: Option<LicenseError>,
}

impl AuthorizationResult {
    fn decided(decision: Decision) -> Self {
        Self {
            decision,
            audit_write_error: None,
        }
    }
}

#[derive(Clone)]
pub struct AuthorizationGate {
    pool: SqlitePool,
    ledger: DeviceLedger,
    trail: AuditTrail,
    alerts: AlertDispatcher,
}

impl AuthorizationGate {
    pub fn new(
        pool: SqlitePool,
        ledger: DeviceLedger,
        trail: AuditTrail,
        alerts: AlertDispatcher,
    ) -> Self {
        Self {
            pool,
            ledger,
            trail,
            alerts,
        }
    }

    pub async fn authorize(&self, req: &GateRequest, now: i64) -> AuthorizationResult {
        // 1
        let Some(user_id) = req.user_id else {
            return AuthorizationResult::decided(Decision::RedirectToLogin(LoginRedirect::NoSession));
        };

        // 2
        let user = match db::users::find_by_id(&self.pool, user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::info!(user_id, "Session names an unknown user");
                return AuthorizationResult::decided(Decision::RedirectToLogin(
                    LoginRedirect::InvalidSession,
                ));
            }
            Err(e) => return unavailable(e.into(), "user lookup"),
        };
        let Some(user) = SessionUser::from_user(&user) else {
            tracing::warn!(user_id, role = %user.role, "Stored user has an unknown role");
            return AuthorizationResult::decided(Decision::RedirectToLogin(
                LoginRedirect::InvalidSession,
            ));
        };

        // 3
        if user.is_super_admin() {
            return AuthorizationResult::decided(Decision::Allow { user });
        }

        // 4
        let Some(tenant_id) = user.tenant_id else {
            return AuthorizationResult::decided(Decision::RedirectToLogin(LoginRedirect::NoTenant));
        };

        // 5
        let tenant = match db::tenants::find_by_id(&self.pool, tenant_id).await {
            Ok(Some(tenant)) if tenant.active => tenant,
            Ok(_) => {
                return AuthorizationResult::decided(Decision::RedirectToLogin(
                    LoginRedirect::TenantUnavailable,
                ));
            }
            Err(e) => return unavailable(e.into(), "tenant lookup"),
        };

        // 6
        if !tenant.license_active {
            self.alert(
                "Access attempt on inactive license",
                &user,
                &tenant,
                req,
                now,
                None,
            );
            return self
                .deny_logged(&user, &tenant, req, ReasonCode::TenantLicenseInactive, now)
                .await;
        }

        // 7
        if tenant.is_expired(now) {
            self.alert(
                "Access attempt with expired license",
                &user,
                &tenant,
                req,
                now,
                None,
            );
            return self
                .deny_logged(&user, &tenant, req, ReasonCode::LicenseExpired, now)
                .await;
        }

        // 8
        let Some(fingerprint) = req.fingerprint.as_deref() else {
            return AuthorizationResult::decided(Decision::Deny {
                cause: DenyCause::FingerprintMissing,
                clear_session: false,
            });
        };

        // 9
        let reason = match self.ledger.check_for_tenant(&tenant, fingerprint, now).await {
            Ok(reason) => reason,
            Err(e) => return unavailable(e, "device check"),
        };
        if reason != ReasonCode::Authorized {
            self.alert(
                "Unauthorized access attempt",
                &user,
                &tenant,
                req,
                now,
                Some(reason),
            );
            return self.deny_logged(&user, &tenant, req, reason, now).await;
        }

        // 10
        let audit_write_error = self
            .log(&user, &tenant, req, ReasonCode::Authorized, now)
            .await
            .err();
        if let Some(e) = &audit_write_error {
            tracing::warn!(user_id = user.id, tenant_id = tenant.id, error = %e, "Access log write failed on allowed request");
        }
        AuthorizationResult {
            decision: Decision::Allow { user },
            audit_write_error,
        }
    }

    async fn deny_logged(
        &self,
        user: &SessionUser,
        tenant: &Tenant,
        req: &GateRequest,
        reason: ReasonCode,
        now: i64,
    ) -> AuthorizationResult {
        let audit_write_error = self.log(user, tenant, req, reason, now).await.err();
        if let Some(e) = &audit_write_error {
            tracing::error!(user_id = user.id, tenant_id = tenant.id, reason = %reason, error = %e, "Access log write failed on denied request");
        }

        let (cause, clear_session) = match reason {
            ReasonCode::TenantLicenseInactive => (DenyCause::LicenseInactive, true),
            ReasonCode::LicenseExpired => (DenyCause::LicenseExpired, true),
            other => (DenyCause::Device(other), false),
        };
        tracing::info!(user_id = user.id, tenant_id = tenant.id, reason = %reason, "Request denied");
        AuthorizationResult {
            decision: Decision::Deny {
                cause,
                clear_session,
            },
            audit_write_error,
        }
    }

    async fn log(
        &self,
        user: &SessionUser,
        tenant: &Tenant,
        req: &GateRequest,
        reason: ReasonCode,
        now: i64,
    ) -> Result<i64, LicenseError> {
        let entry = AccessEntry {
            tenant_id: Some(tenant.id),
            user_id: Some(user.id),
            fingerprint: req.fingerprint.clone(),
            ip: req.ip.clone(),
            reason,
        };
        self.trail.record_access(&entry, now).await
    }

    fn alert(
        &self,
        subject: &str,
        user: &SessionUser,
        tenant: &Tenant,
        req: &GateRequest,
        now: i64,
        reason: Option<ReasonCode>,
    ) {
        let mut body = format!(
            "Tenant: {} (ID {})\n\
             User: {} (ID {})\n\
             IP: {}\n\
             Fingerprint: {}\n\
             Path: {}\n\
             Date: {}",
            tenant.name,
            tenant.id,
            user.username,
            user.id,
            req.ip.as_deref().unwrap_or("-"),
            req.fingerprint.as_deref().unwrap_or("-"),
            req.path,
            format_date(now),
        );
        if let Some(expiry) = tenant.license_expires_at {
            body.push_str(&format!("\nLicense expiry: {}", format_date(expiry)));
        }
        if let Some(reason) = reason {
            body.push_str(&format!("\nReason: {} ({})", reason.as_str(), reason.describe()));
        }
        self.alerts.dispatch(Alert::warning(subject, body));
    }
}

fn unavailable(err: LicenseError, step: &str) -> AuthorizationResult {
    tracing::error!(step, error = %err, "Authorization check failed, denying request");
    AuthorizationResult::decided(Decision::Unavailable)
}
