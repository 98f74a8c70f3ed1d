//! Domain error taxonomy for license and device operations
//!
//! `LicenseError` sits between the repositories (`RepoError`) and the HTTP
//! layer (`AppError`). Storage faults collapse into `StorageUnavailable` so
//! callers fail closed instead of guessing.

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

use crate::db::RepoError;

#[derive(Debug, Error)]
pub enum LicenseError {
    /// Tenant, device or license does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Tenant already holds `max` active devices
    #[error("device limit of {max} reached")]
    QuotaExceeded { max: i64 },

    #[error("license is inactive")]
    LicenseInactive,

    /// Global tenant ceiling reached
    #[error("tenant capacity of {limit} reached")]
    CapacityExceeded { limit: i64 },

    /// Fingerprint is already bound to a different tenant
    #[error("fingerprint is bound to another tenant")]
    FingerprintBound,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RepoError> for LicenseError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(what) => LicenseError::NotFound(what),
            RepoError::Duplicate(msg) | RepoError::Validation(msg) => {
                LicenseError::InvalidArgument(msg)
            }
            RepoError::Database(msg) => LicenseError::StorageUnavailable(msg),
        }
    }
}

impl From<sqlx::Error> for LicenseError {
    fn from(err: sqlx::Error) -> Self {
        RepoError::from(err).into()
    }
}

impl From<LicenseError> for AppError {
    fn from(err: LicenseError) -> Self {
        match err {
            LicenseError::NotFound(what) => AppError::not_found(what),
            LicenseError::QuotaExceeded { max } => AppError::with_message(
                ErrorCode::DeviceLimitReached,
                format!("Device limit of {max} reached"),
            )
            .with_detail("max_devices", max),
            LicenseError::LicenseInactive => AppError::new(ErrorCode::LicenseInactive),
            LicenseError::CapacityExceeded { limit } => AppError::with_message(
                ErrorCode::TenantCapacityExceeded,
                format!("Tenant capacity of {limit} reached"),
            )
            .with_detail("limit", limit),
            LicenseError::FingerprintBound => AppError::new(ErrorCode::FingerprintBound),
            LicenseError::InvalidArgument(msg) => AppError::validation(msg),
            LicenseError::StorageUnavailable(msg) => {
                tracing::error!(error = %msg, "Storage unavailable");
                AppError::unavailable()
            }
            LicenseError::Internal(msg) => AppError::internal(msg),
        }
    }
}

pub type LicenseResult<T> = Result<T, LicenseError>;
