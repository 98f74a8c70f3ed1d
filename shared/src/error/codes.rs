//! Unified error codes
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: License, tenant and device errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values so clients can switch on
/// them without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,

    // ==================== 1xxx: Auth ====================
    /// Invalid credentials (username/password)
    InvalidCredentials = 1002,
    /// Account is disabled
    AccountDisabled = 1007,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Admin role required
    AdminRequired = 2003,
    /// Super administrator role required
    SuperAdminRequired = 2006,

    // ==================== 3xxx: License / Tenant / Device ====================
    /// User has no tenant bound
    TenantNotSelected = 3001,
    /// License has expired
    LicenseExpired = 3005,
    /// License is switched off
    LicenseInactive = 3006,
    /// Device limit reached
    DeviceLimitReached = 3007,
    /// License key does not match any tenant
    LicenseKeyInvalid = 3009,
    /// Fingerprint is not bound to this tenant
    DeviceNotBound = 3020,
    /// Device binding is blocked
    DeviceBlocked = 3021,
    /// Request carries no device fingerprint
    FingerprintRequired = 3022,
    /// Fingerprint already bound to another tenant
    FingerprintBound = 3023,
    /// Tenant hard switch is off
    TenantDisabled = 3024,
    /// Global tenant ceiling reached
    TenantCapacityExceeded = 3030,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Storage could not be reached; the request was refused
    StorageUnavailable = 9004,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",

            // Auth
            ErrorCode::InvalidCredentials => "Invalid username or password",
            ErrorCode::AccountDisabled => "Account is disabled",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::AdminRequired => "Administrator role is required",
            ErrorCode::SuperAdminRequired => "Super administrator role is required",

            // License / Tenant / Device
            ErrorCode::TenantNotSelected => "User is not bound to a tenant",
            ErrorCode::LicenseExpired => "License has expired",
            ErrorCode::LicenseInactive => "License is inactive",
            ErrorCode::DeviceLimitReached => "Device limit reached",
            ErrorCode::LicenseKeyInvalid => "Invalid license key",
            ErrorCode::DeviceNotBound => "Device is not authorized for this tenant",
            ErrorCode::DeviceBlocked => "Device is blocked",
            ErrorCode::FingerprintRequired => "Please enable device identification",
            ErrorCode::FingerprintBound => "Device is already bound to another tenant",
            ErrorCode::TenantDisabled => "Tenant is disabled",
            ErrorCode::TenantCapacityExceeded => "Tenant capacity reached",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::StorageUnavailable => "Service temporarily unavailable",
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),

            // Auth
            1002 => Ok(ErrorCode::InvalidCredentials),
            1007 => Ok(ErrorCode::AccountDisabled),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2003 => Ok(ErrorCode::AdminRequired),
            2006 => Ok(ErrorCode::SuperAdminRequired),

            // License / Tenant / Device
            3001 => Ok(ErrorCode::TenantNotSelected),
            3005 => Ok(ErrorCode::LicenseExpired),
            3006 => Ok(ErrorCode::LicenseInactive),
            3007 => Ok(ErrorCode::DeviceLimitReached),
            3009 => Ok(ErrorCode::LicenseKeyInvalid),
            3020 => Ok(ErrorCode::DeviceNotBound),
            3021 => Ok(ErrorCode::DeviceBlocked),
            3022 => Ok(ErrorCode::FingerprintRequired),
            3023 => Ok(ErrorCode::FingerprintBound),
            3024 => Ok(ErrorCode::TenantDisabled),
            3030 => Ok(ErrorCode::TenantCapacityExceeded),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9004 => Ok(ErrorCode::StorageUnavailable),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::NotFound.code(), 3);
        assert_eq!(ErrorCode::InvalidCredentials.code(), 1002);
        assert_eq!(ErrorCode::SuperAdminRequired.code(), 2006);
        assert_eq!(ErrorCode::LicenseExpired.code(), 3005);
        assert_eq!(ErrorCode::LicenseInactive.code(), 3006);
        assert_eq!(ErrorCode::DeviceLimitReached.code(), 3007);
        assert_eq!(ErrorCode::TenantCapacityExceeded.code(), 3030);
        assert_eq!(ErrorCode::StorageUnavailable.code(), 9004);
    }

    #[test]
    fn test_try_from_round_trips_known_codes() {
        for code in [
            ErrorCode::Success,
            ErrorCode::InvalidCredentials,
            ErrorCode::AdminRequired,
            ErrorCode::DeviceBlocked,
            ErrorCode::FingerprintBound,
            ErrorCode::TenantDisabled,
            ErrorCode::StorageUnavailable,
        ] {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }

    #[test]
    fn test_try_from_unknown_code() {
        assert_eq!(ErrorCode::try_from(4242), Err(InvalidErrorCode(4242)));
        // retired numbers stay unassigned
        for retired in [1, 1003, 3002, 9003] {
            assert!(ErrorCode::try_from(retired).is_err());
        }
    }

    #[test]
    fn test_serde_as_number() {
        let json = serde_json::to_string(&ErrorCode::DeviceLimitReached).unwrap();
        assert_eq!(json, "3007");
        let code: ErrorCode = serde_json::from_str("3022").unwrap();
        assert_eq!(code, ErrorCode::FingerprintRequired);
        assert!(serde_json::from_str::<ErrorCode>("12345").is_err());
    }
}
