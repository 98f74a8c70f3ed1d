//! Tenant Capacity Limiter
//!
//! Global ceiling on the number of tenants. Creation checks it inside the
//! insert itself; startup re-validates persisted state and disables every
//! tenant ranked past the ceiling (ascending id).

use serde::Serialize;
use sqlx::SqlitePool;

use crate::alert::{Alert, AlertDispatcher};
use crate::audit::{self, HistoryAction, HistoryEntry, Origin, SYSTEM_FINGERPRINT};
use crate::db::{self, tenants::LicenseGrant};
use crate::error::{LicenseError, LicenseResult};
use crate::license::{expiry_after, format_date, generate_key};

/// Fingerprint recorded on history entries written by remediation
pub const CAPACITY_FINGERPRINT: &str = "CAPACITY_LIMIT";

/// License terms given to a freshly created tenant
#[derive(Debug, Clone, Copy)]
pub struct TenantDefaults {
    pub validity_days: i64,
    pub max_devices: i64,
}

impl Default for TenantDefaults {
    fn default() -> Self {
        Self {
            validity_days: 365,
            max_devices: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedTenant {
    pub tenant_id: i64,
    pub name: String,
    pub license_key: String,
    pub expires_at: i64,
    pub max_devices: i64,
    pub total: i64,
    pub remaining: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapacityStatus {
    pub total: i64,
    pub limit: i64,
    pub remaining: i64,
    pub reached: bool,
}

impl CapacityStatus {
    fn new(total: i64, limit: i64) -> Self {
        Self {
            total,
            limit,
            remaining: (limit - total).max(0),
            reached: total >= limit,
        }
    }
}

/// Result of the startup check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Remediation {
    pub total: i64,
    /// Tenants disabled by this run, in rank order
    pub blocked: Vec<i64>,
}

#[derive(Clone)]
pub struct CapacityLimiter {
    pool: SqlitePool,
    ceiling: i64,
    defaults: TenantDefaults,
    alerts: AlertDispatcher,
}

impl CapacityLimiter {
    pub fn new(
        pool: SqlitePool,
        ceiling: i64,
        defaults: TenantDefaults,
        alerts: AlertDispatcher,
    ) -> Self {
        Self {
            pool,
            ceiling,
            defaults,
            alerts,
        }
    }

    pub fn ceiling(&self) -> i64 {
        self.ceiling
    }

    /// Create a tenant with a fresh license, unless the ceiling is reached
    pub async fn create_tenant(
        &self,
        name: &str,
        origin: &Origin,
        now: i64,
    ) -> LicenseResult<CreatedTenant> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LicenseError::InvalidArgument("tenant name is required".into()));
        }

        let key = generate_key();
        let expires_at = expiry_after(now, self.defaults.validity_days)?;
        let grant = LicenseGrant {
            license_key: &key,
            expires_at: Some(expires_at),
            max_devices: self.defaults.max_devices,
        };

        let mut tx = self.pool.begin().await?;
        let Some(tenant_id) =
            db::tenants::insert_within_ceiling(&mut tx, name, &grant, self.ceiling, now).await?
        else {
            drop(tx);
            tracing::warn!(tenant = %name, limit = self.ceiling, "Tenant creation refused: capacity reached");
            self.alerts.dispatch(Alert::high(
                "Tenant capacity reached",
                format!(
                    "Attempt to create tenant '{name}' refused.\n\
                     Limit: {limit} tenants\n\
                     Requested by user: {user}\n\
                     IP: {ip}\n\
                     Date: {date}",
                    limit = self.ceiling,
                    user = display_user(origin.user_id),
                    ip = origin.ip.as_deref().unwrap_or("-"),
                    date = format_date(now),
                ),
            ));
            return Err(LicenseError::CapacityExceeded {
                limit: self.ceiling,
            });
        };

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenants")
            .fetch_one(&mut *tx)
            .await?;
        audit::record_history(
            &mut tx,
            &HistoryEntry {
                tenant_id,
                license_key: Some(&key),
                action: HistoryAction::Generated,
                origin,
                fingerprint: SYSTEM_FINGERPRINT,
                detail: format!("Tenant created: {name}. Total: {total}/{}", self.ceiling),
            },
            now,
        )
        .await?;
        tx.commit().await?;

        let remaining = (self.ceiling - total).max(0);
        tracing::info!(tenant_id, total, limit = self.ceiling, "Tenant created");
        self.alerts.dispatch(Alert::info(
            "Tenant created",
            format!(
                "Tenant: {name}\n\
                 License expires: {expiry}\n\
                 Max devices: {max}\n\
                 Tenants: {total}/{limit}\n\
                 Remaining slots: {remaining}",
                expiry = format_date(expires_at),
                max = self.defaults.max_devices,
                limit = self.ceiling,
            ),
        ));

        Ok(CreatedTenant {
            tenant_id,
            name: name.to_string(),
            license_key: key,
            expires_at,
            max_devices: self.defaults.max_devices,
            total,
            remaining,
        })
    }

    pub async fn status(&self) -> LicenseResult<CapacityStatus> {
        let total = db::tenants::count(&self.pool).await?;
        Ok(CapacityStatus::new(total, self.ceiling))
    }

    /// Disable tenants ranked past the ceiling
    ///
    /// Tenants already disabled (tenant and license both off) are left
    /// alone, so a restart does not write the same entries again.
    pub async fn remediate_on_startup(&self, now: i64) -> LicenseResult<Remediation> {
        let tenants = db::tenants::find_all(&self.pool).await?;
        let total = tenants.len() as i64;
        if total <= self.ceiling {
            tracing::info!(total, limit = self.ceiling, "Tenant capacity within limit");
            return Ok(Remediation {
                total,
                blocked: Vec::new(),
            });
        }

        tracing::error!(total, limit = self.ceiling, "Tenant count exceeds capacity");
        let origin = Origin::system();
        let mut blocked = Vec::new();
        let mut tx = self.pool.begin().await?;
        for (rank, tenant) in tenants.iter().enumerate().skip(self.ceiling.max(0) as usize) {
            if !tenant.active && !tenant.license_active {
                continue;
            }
            db::tenants::disable_with_license(&mut tx, tenant.id).await?;
            audit::record_history(
                &mut tx,
                &HistoryEntry {
                    tenant_id: tenant.id,
                    license_key: tenant.license_key.as_deref(),
                    action: HistoryAction::CapacityBlocked,
                    origin: &origin,
                    fingerprint: CAPACITY_FINGERPRINT,
                    detail: format!(
                        "Tenant blocked for exceeding the limit of {} tenants. Position: {}",
                        self.ceiling,
                        rank + 1
                    ),
                },
                now,
            )
            .await?;
            tracing::warn!(tenant_id = tenant.id, tenant = %tenant.name, "Tenant blocked by capacity limit");
            blocked.push(tenant.id);
        }
        tx.commit().await?;

        if !blocked.is_empty() {
            self.alerts.dispatch(Alert::high(
                "Tenant capacity exceeded",
                format!(
                    "Limit: {limit} tenants\n\
                     Stored tenants: {total}\n\
                     Exceeded by: {over}\n\
                     Blocked now: {ids:?}\n\
                     Checked: {date}",
                    limit = self.ceiling,
                    over = total - self.ceiling,
                    ids = blocked,
                    date = format_date(now),
                ),
            ));
        }
        Ok(Remediation { total, blocked })
    }
}

fn display_user(user_id: Option<i64>) -> String {
    user_id.map_or_else(|| "-".to_string(), |id| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use tokio::sync::mpsc;

    const NOW: i64 = 1_760_000_000_000;

    async fn limiter(ceiling: i64) -> (CapacityLimiter, SqlitePool, mpsc::Receiver<Alert>) {
        let db = DbService::in_memory().await.unwrap();
        let (alerts, rx) = AlertDispatcher::new(16);
        let limiter = CapacityLimiter::new(db.pool.clone(), ceiling, TenantDefaults::default(), alerts);
        (limiter, db.pool, rx)
    }

    #[tokio::test]
    async fn test_create_until_ceiling() {
        let (limiter, pool, mut rx) = limiter(2).await;
        let origin = Origin::new("10.0.0.1", Some(1));

        let a = limiter.create_tenant("Loja A", &origin, NOW).await.unwrap();
        assert_eq!(a.total, 1);
        assert_eq!(a.remaining, 1);
        assert_eq!(a.license_key.len(), crate::license::LICENSE_KEY_LEN);
        let b = limiter.create_tenant("Loja B", &origin, NOW).await.unwrap();
        assert_eq!(b.remaining, 0);

        let err = limiter.create_tenant("Loja C", &origin, NOW).await.unwrap_err();
        assert!(matches!(err, LicenseError::CapacityExceeded { limit: 2 }));
        assert_eq!(db::tenants::count(&pool).await.unwrap(), 2);

        let subjects: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|a| a.subject)
            .collect();
        assert_eq!(
            subjects,
            vec!["Tenant created", "Tenant created", "Tenant capacity reached"]
        );
        assert_eq!(
            db::license_history::count_by_action(&pool, "GENERATED").await.unwrap(),
            2
        );

        let status = limiter.status().await.unwrap();
        assert_eq!(
            status,
            CapacityStatus {
                total: 2,
                limit: 2,
                remaining: 0,
                reached: true
            }
        );
    }

    #[tokio::test]
    async fn test_new_tenant_gets_default_license() {
        let (limiter, pool, _rx) = limiter(10).await;
        let created = limiter
            .create_tenant("  Loja Centro ", &Origin::system(), NOW)
            .await
            .unwrap();
        let tenant = db::tenants::find_by_id(&pool, created.tenant_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tenant.name, "Loja Centro");
        assert!(tenant.active && tenant.license_active);
        assert_eq!(tenant.license_expires_at, Some(NOW + 365 * shared::util::DAY_MILLIS));
        assert_eq!(tenant.max_devices, 3);

        assert!(matches!(
            limiter.create_tenant(" ", &Origin::system(), NOW).await,
            Err(LicenseError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_remediation_blocks_tenants_past_ceiling() {
        let (limiter, pool, mut rx) = limiter(3).await;
        for i in 1..=5 {
            sqlx::query(
                "INSERT INTO tenants (id, name, license_key, license_active, max_devices, created_at) VALUES (?, ?, ?, 1, 3, 0)",
            )
            .bind(i)
            .bind(format!("Loja {i}"))
            .bind(format!("KEY{i}"))
            .execute(&pool)
            .await
            .unwrap();
        }

        let report = limiter.remediate_on_startup(NOW).await.unwrap();
        assert_eq!(report.total, 5);
        assert_eq!(report.blocked, vec![4, 5]);
        for id in 1..=5 {
            let t = db::tenants::find_by_id(&pool, id).await.unwrap().unwrap();
            assert_eq!(t.active, id <= 3);
            assert_eq!(t.license_active, id <= 3);
        }
        assert_eq!(
            db::license_history::count_by_action(&pool, "CAPACITY_BLOCKED").await.unwrap(),
            2
        );
        assert_eq!(rx.try_recv().unwrap().subject, "Tenant capacity exceeded");
        assert!(rx.try_recv().is_err());

        // second run finds nothing left to do
        let again = limiter.remediate_on_startup(NOW).await.unwrap();
        assert!(again.blocked.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_remediation_noop_within_limit() {
        let (limiter, _pool, mut rx) = limiter(3).await;
        let report = limiter.remediate_on_startup(NOW).await.unwrap();
        assert_eq!(report, Remediation::default());
        assert!(rx.try_recv().is_err());
    }
}
