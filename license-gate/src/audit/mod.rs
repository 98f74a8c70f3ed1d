//! Audit Trail
//!
//! Two append-only streams:
//! - access log: one row per request-time authorization decision
//! - license history: one row per license lifecycle transition
//!
//! Access entries from the gate are written on their own; history entries are
//! always written inside the transaction of the change they describe.

use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::fmt;

use crate::db::{self, access_logs::AccessLogRow, license_history::HistoryRow};
use crate::error::LicenseResult;

/// Fingerprint recorded for operator-initiated history events
pub const SYSTEM_FINGERPRINT: &str = "SYSTEM";

/// Reason attached to an access decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    Authorized,
    LicenseActivated,
    TenantLicenseInactive,
    LicenseExpired,
    DeviceNotBound,
    DeviceBlocked,
    DeviceQuotaExceeded,
}

impl ReasonCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Authorized => "AUTHORIZED",
            Self::LicenseActivated => "LICENSE_ACTIVATED",
            Self::TenantLicenseInactive => "TENANT_LICENSE_INACTIVE",
            Self::LicenseExpired => "LICENSE_EXPIRED",
            Self::DeviceNotBound => "DEVICE_NOT_BOUND",
            Self::DeviceBlocked => "DEVICE_BLOCKED",
            Self::DeviceQuotaExceeded => "DEVICE_QUOTA_EXCEEDED",
        }
    }

    /// Device-level denials (gate step 9)
    pub const fn is_device_denial(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotBound | Self::DeviceBlocked | Self::DeviceQuotaExceeded
        )
    }

    /// Value stored in `access_logs.reason`
    ///
    /// Device denials are prefixed with `UNAUTHORIZED:`.
    pub fn log_value(&self) -> String {
        if self.is_device_denial() {
            format!("UNAUTHORIZED:{}", self.as_str())
        } else {
            self.as_str().to_string()
        }
    }

    /// Inverse of [`ReasonCode::log_value`]
    pub fn parse(value: &str) -> Option<Self> {
        let bare = value.strip_prefix("UNAUTHORIZED:").unwrap_or(value);
        [
            Self::Authorized,
            Self::LicenseActivated,
            Self::TenantLicenseInactive,
            Self::LicenseExpired,
            Self::DeviceNotBound,
            Self::DeviceBlocked,
            Self::DeviceQuotaExceeded,
        ]
        .into_iter()
        .find(|r| r.as_str() == bare)
    }

    /// Human readable cause, shown to the end user
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::Authorized => "Access authorized",
            Self::LicenseActivated => "License activated",
            Self::TenantLicenseInactive => "Store license is inactive",
            Self::LicenseExpired => "License has expired",
            Self::DeviceNotBound => "Device not authorized",
            Self::DeviceBlocked => "Device blocked",
            Self::DeviceQuotaExceeded => "Device limit exceeded",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// License lifecycle action tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    Generated,
    /// Tenant hard switch turned back on
    Activated,
    Renewed,
    Blocked,
    Unblocked,
    DeviceActivated,
    DeviceReactivated,
    CapacityBlocked,
}

impl HistoryAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Generated => "GENERATED",
            Self::Activated => "ACTIVATED",
            Self::Renewed => "RENEWED",
            Self::Blocked => "BLOCKED",
            Self::Unblocked => "UNBLOCKED",
            Self::DeviceActivated => "DEVICE_ACTIVATED",
            Self::DeviceReactivated => "DEVICE_REACTIVATED",
            Self::CapacityBlocked => "CAPACITY_BLOCKED",
        }
    }
}

/// Where a request or operator action came from
#[derive(Debug, Clone, Default)]
pub struct Origin {
    pub ip: Option<String>,
    pub user_id: Option<i64>,
}

impl Origin {
    pub fn new(ip: impl Into<String>, user_id: Option<i64>) -> Self {
        Self {
            ip: Some(ip.into()),
            user_id,
        }
    }

    /// Background jobs with no request behind them
    pub fn system() -> Self {
        Self {
            ip: Some("SYSTEM".into()),
            user_id: None,
        }
    }
}

/// One access decision to append
#[derive(Debug, Clone)]
pub struct AccessEntry {
    pub tenant_id: Option<i64>,
    pub user_id: Option<i64>,
    pub fingerprint: Option<String>,
    pub ip: Option<String>,
    pub reason: ReasonCode,
}

/// One lifecycle transition to append
#[derive(Debug, Clone)]
pub struct HistoryEntry<'a> {
    pub tenant_id: i64,
    pub license_key: Option<&'a str>,
    pub action: HistoryAction,
    pub origin: &'a Origin,
    /// Device fingerprint, or [`SYSTEM_FINGERPRINT`] for operator events
    pub fingerprint: &'a str,
    pub detail: String,
}

/// Page request; `page` is 1-based
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    pub const MAX_PER_PAGE: i64 = 100;

    /// `(limit, offset)` with defaults and clamping applied
    pub fn limit_offset(&self) -> (i64, i64) {
        let per_page = self.per_page.unwrap_or(20).clamp(1, Self::MAX_PER_PAGE);
        let page = self.page.unwrap_or(1).max(1);
        (per_page, (page - 1) * per_page)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
}

/// Read/write facade over both audit streams
#[derive(Clone)]
pub struct AuditTrail {
    pool: SqlitePool,
}

impl AuditTrail {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one access decision
    pub async fn record_access(&self, entry: &AccessEntry, now: i64) -> LicenseResult<i64> {
        let reason = entry.reason.log_value();
        let row = access_row(entry, &reason, now);
        Ok(db::access_logs::insert(&self.pool, &row).await?)
    }

    pub async fn access_log(
        &self,
        tenant_id: Option<i64>,
        page: PageQuery,
    ) -> LicenseResult<Page<AccessLogRow>> {
        let (limit, offset) = page.limit_offset();
        let items = db::access_logs::query(&self.pool, tenant_id, limit, offset).await?;
        Ok(Page {
            items,
            page: offset / limit + 1,
            per_page: limit,
        })
    }

    pub async fn history(
        &self,
        tenant_id: Option<i64>,
        page: PageQuery,
    ) -> LicenseResult<Page<HistoryRow>> {
        let (limit, offset) = page.limit_offset();
        let items = db::license_history::query(&self.pool, tenant_id, limit, offset).await?;
        Ok(Page {
            items,
            page: offset / limit + 1,
            per_page: limit,
        })
    }
}

fn access_row<'a>(entry: &'a AccessEntry, reason: &'a str, now: i64) -> db::access_logs::NewAccessLog<'a> {
    db::access_logs::NewAccessLog {
        tenant_id: entry.tenant_id,
        user_id: entry.user_id,
        fingerprint: entry.fingerprint.as_deref(),
        ip: entry.ip.as_deref(),
        reason,
        created_at: now,
    }
}

/// Append an access entry inside a caller-owned transaction
pub async fn record_access_tx(
    tx: &mut Transaction<'_, Sqlite>,
    entry: &AccessEntry,
    now: i64,
) -> LicenseResult<i64> {
    let reason = entry.reason.log_value();
    let row = access_row(entry, &reason, now);
    Ok(db::access_logs::insert_tx(tx, &row).await?)
}

/// Append a history entry inside a caller-owned transaction
pub async fn record_history(
    tx: &mut Transaction<'_, Sqlite>,
    entry: &HistoryEntry<'_>,
    now: i64,
) -> LicenseResult<i64> {
    let row = db::license_history::NewHistoryEntry {
        tenant_id: entry.tenant_id,
        license_key: entry.license_key,
        action: entry.action.as_str(),
        ip: entry.origin.ip.as_deref(),
        fingerprint: Some(entry.fingerprint),
        user_id: entry.origin.user_id,
        detail: Some(&entry.detail),
        created_at: now,
    };
    Ok(db::license_history::insert(tx, &row).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;

    #[test]
    fn test_reason_log_values() {
        assert_eq!(ReasonCode::Authorized.log_value(), "AUTHORIZED");
        assert_eq!(
            ReasonCode::TenantLicenseInactive.log_value(),
            "TENANT_LICENSE_INACTIVE"
        );
        assert_eq!(
            ReasonCode::DeviceBlocked.log_value(),
            "UNAUTHORIZED:DEVICE_BLOCKED"
        );
        for reason in [
            ReasonCode::LicenseActivated,
            ReasonCode::LicenseExpired,
            ReasonCode::DeviceQuotaExceeded,
            ReasonCode::DeviceNotBound,
        ] {
            assert_eq!(ReasonCode::parse(&reason.log_value()), Some(reason));
        }
        assert_eq!(ReasonCode::parse("SOMETHING_ELSE"), None);
    }

    #[test]
    fn test_page_query_clamps() {
        let q = PageQuery {
            page: Some(0),
            per_page: Some(1000),
        };
        assert_eq!(q.limit_offset(), (100, 0));

        let q = PageQuery {
            page: Some(3),
            per_page: None,
        };
        assert_eq!(q.limit_offset(), (20, 40));
    }

    #[tokio::test]
    async fn test_access_log_newest_first_and_filtered() {
        let db = DbService::in_memory().await.unwrap();
        let trail = AuditTrail::new(db.pool.clone());

        for (tenant, reason) in [
            (Some(1), ReasonCode::Authorized),
            (Some(2), ReasonCode::DeviceNotBound),
            (Some(1), ReasonCode::LicenseExpired),
        ] {
            let entry = AccessEntry {
                tenant_id: tenant,
                user_id: None,
                fingerprint: Some("fp".into()),
                ip: Some("10.0.0.1".into()),
                reason,
            };
            trail.record_access(&entry, 1_000).await.unwrap();
        }

        let page = trail
            .access_log(Some(1), PageQuery { page: None, per_page: None })
            .await
            .unwrap();
        let reasons: Vec<_> = page.items.iter().map(|r| r.reason.as_str()).collect();
        assert_eq!(reasons, ["LICENSE_EXPIRED", "AUTHORIZED"]);

        let all = trail
            .access_log(None, PageQuery { page: Some(2), per_page: Some(2) })
            .await
            .unwrap();
        assert_eq!(all.page, 2);
        assert_eq!(all.items.len(), 1);
        assert_eq!(all.items[0].reason, "AUTHORIZED");
    }

    #[tokio::test]
    async fn test_history_written_in_transaction() {
        let db = DbService::in_memory().await.unwrap();
        let trail = AuditTrail::new(db.pool.clone());
        let origin = Origin::new("127.0.0.1", Some(9));

        let mut tx = db.pool.begin().await.unwrap();
        record_history(
            &mut tx,
            &HistoryEntry {
                tenant_id: 5,
                license_key: Some("KEY"),
                action: HistoryAction::Renewed,
                origin: &origin,
                fingerprint: SYSTEM_FINGERPRINT,
                detail: "extended by 30 days".into(),
            },
            42,
        )
        .await
        .unwrap();
        // rolled back: nothing persists
        tx.rollback().await.unwrap();
        let empty = trail
            .history(Some(5), PageQuery { page: None, per_page: None })
            .await
            .unwrap();
        assert!(empty.items.is_empty());

        let mut tx = db.pool.begin().await.unwrap();
        record_history(
            &mut tx,
            &HistoryEntry {
                tenant_id: 5,
                license_key: Some("KEY"),
                action: HistoryAction::Renewed,
                origin: &origin,
                fingerprint: SYSTEM_FINGERPRINT,
                detail: "extended by 30 days".into(),
            },
            42,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let page = trail
            .history(Some(5), PageQuery { page: None, per_page: None })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        let row = &page.items[0];
        assert_eq!(row.action, "RENEWED");
        assert_eq!(row.fingerprint.as_deref(), Some("SYSTEM"));
        assert_eq!(row.user_id, Some(9));
        assert_eq!(row.ip.as_deref(), Some("127.0.0.1"));
    }
}
