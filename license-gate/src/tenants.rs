//! Tenant administration: kill switch and operator overview

use serde::Serialize;
use sqlx::SqlitePool;

use crate::audit::{self, HistoryAction, HistoryEntry, Origin, SYSTEM_FINGERPRINT};
use crate::db::{self, RepoError};
use crate::error::{LicenseError, LicenseResult};
use crate::license::{DaysRemaining, days_remaining};

#[derive(Debug, Clone, Serialize)]
pub struct TenantOverview {
    pub id: i64,
    pub name: String,
    pub active: bool,
    pub license_active: bool,
    pub license_expires_at: Option<i64>,
    pub expired: bool,
    pub days_remaining: DaysRemaining,
    pub max_devices: i64,
    pub device_count: i64,
    pub active_devices: i64,
    pub user_count: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OverviewTotals {
    pub tenants: i64,
    pub active_tenants: i64,
    pub active_licenses: i64,
    pub expired_licenses: i64,
    pub devices: i64,
    pub active_devices: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub tenants: Vec<TenantOverview>,
    pub totals: OverviewTotals,
}

#[derive(Clone)]
pub struct TenantAdmin {
    pool: SqlitePool,
}

impl TenantAdmin {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Hard kill switch; the license itself is left as it is
    pub async fn set_active(
        &self,
        tenant_id: i64,
        active: bool,
        origin: &Origin,
        now: i64,
    ) -> LicenseResult<()> {
        let mut tx = self.pool.begin().await?;
        db::tenants::set_active(&mut tx, tenant_id, active)
            .await
            .map_err(|e| match e {
                RepoError::NotFound(_) => LicenseError::NotFound(format!("Tenant {tenant_id}")),
                other => other.into(),
            })?;
        let key: Option<String> = sqlx::query_scalar("SELECT license_key FROM tenants WHERE id = ?")
            .bind(tenant_id)
            .fetch_one(&mut *tx)
            .await?;

        let (action, detail) = if active {
            (HistoryAction::Activated, "Tenant enabled")
        } else {
            (HistoryAction::Blocked, "Tenant disabled")
        };
        audit::record_history(
            &mut tx,
            &HistoryEntry {
                tenant_id,
                license_key: key.as_deref(),
                action,
                origin,
                fingerprint: SYSTEM_FINGERPRINT,
                detail: detail.to_string(),
            },
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(tenant_id, active, "Tenant status changed");
        Ok(())
    }

    pub async fn overview(&self, now: i64) -> LicenseResult<Overview> {
        let summaries = db::tenants::summaries(&self.pool).await?;

        let mut totals = OverviewTotals::default();
        let tenants = summaries
            .into_iter()
            .map(|s| {
                let expired = s.license_expires_at.is_some_and(|exp| exp < now);
                totals.tenants += 1;
                totals.active_tenants += i64::from(s.active);
                totals.active_licenses += i64::from(s.license_active && !expired);
                totals.expired_licenses += i64::from(expired);
                totals.devices += s.device_count;
                totals.active_devices += s.active_devices;
                TenantOverview {
                    id: s.id,
                    name: s.name,
                    active: s.active,
                    license_active: s.license_active,
                    license_expires_at: s.license_expires_at,
                    expired,
                    days_remaining: days_remaining(s.license_expires_at, now),
                    max_devices: s.max_devices,
                    device_count: s.device_count,
                    active_devices: s.active_devices,
                    user_count: s.user_count,
                    created_at: s.created_at,
                }
            })
            .collect();

        Ok(Overview { tenants, totals })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use shared::util::DAY_MILLIS;

    const NOW: i64 = 1_760_000_000_000;

    async fn seeded() -> (TenantAdmin, SqlitePool) {
        let db = DbService::in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO tenants (id, name, license_key, license_active, license_expires_at, max_devices, created_at) VALUES \
             (1, 'Loja A', 'K1', 1, ?, 3, 0), \
             (2, 'Loja B', 'K2', 1, ?, 2, 0), \
             (3, 'Loja C', NULL, 0, NULL, 1, 0)",
        )
        .bind(NOW + 10 * DAY_MILLIS)
        .bind(NOW - DAY_MILLIS)
        .execute(&db.pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO devices (tenant_id, fingerprint, active, created_at) VALUES \
             (1, 'a1', 1, 0), (1, 'a2', 0, 0), (2, 'b1', 1, 0)",
        )
        .execute(&db.pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO users (username, password_hash, role, tenant_id, created_at) VALUES ('ana', 'x', 'ADMIN', 1, 0)",
        )
        .execute(&db.pool)
        .await
        .unwrap();
        (TenantAdmin::new(db.pool.clone()), db.pool)
    }

    #[tokio::test]
    async fn test_overview_counts() {
        let (admin, _) = seeded().await;
        let overview = admin.overview(NOW).await.unwrap();

        assert_eq!(
            overview.totals,
            OverviewTotals {
                tenants: 3,
                active_tenants: 3,
                active_licenses: 1,
                expired_licenses: 1,
                devices: 3,
                active_devices: 2,
            }
        );
        let a = &overview.tenants[0];
        assert_eq!((a.device_count, a.active_devices, a.user_count), (2, 1, 1));
        assert_eq!(a.days_remaining, DaysRemaining::Remaining(10));
        assert!(overview.tenants[1].expired);
        assert_eq!(overview.tenants[2].days_remaining, DaysRemaining::Unbounded);
    }

    #[tokio::test]
    async fn test_set_active_writes_history() {
        let (admin, pool) = seeded().await;
        admin.set_active(1, false, &Origin::system(), NOW).await.unwrap();
        let tenant = db::tenants::find_by_id(&pool, 1).await.unwrap().unwrap();
        assert!(!tenant.active);
        assert!(tenant.license_active);

        admin.set_active(1, true, &Origin::system(), NOW).await.unwrap();
        assert_eq!(db::license_history::count_by_action(&pool, "BLOCKED").await.unwrap(), 1);
        assert_eq!(db::license_history::count_by_action(&pool, "ACTIVATED").await.unwrap(), 1);

        assert!(matches!(
            admin.set_active(42, true, &Origin::system(), NOW).await,
            Err(LicenseError::NotFound(_))
        ));
    }
}
