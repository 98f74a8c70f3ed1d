//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::FingerprintBound | Self::TenantCapacityExceeded => StatusCode::CONFLICT,

            // 401 Unauthorized
            Self::InvalidCredentials | Self::AccountDisabled => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            Self::PermissionDenied
            | Self::AdminRequired
            | Self::SuperAdminRequired
            | Self::TenantNotSelected
            | Self::TenantDisabled
            | Self::LicenseExpired
            | Self::LicenseInactive
            | Self::DeviceLimitReached
            | Self::DeviceNotBound
            | Self::DeviceBlocked
            | Self::FingerprintRequired => StatusCode::FORBIDDEN,

            // 503 Service Unavailable (transient, client can retry)
            Self::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,

            Self::ValidationFailed | Self::LicenseKeyInvalid => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_status() {
        assert_eq!(ErrorCode::Success.http_status(), StatusCode::OK);
    }

    #[test]
    fn test_gate_rejections_are_forbidden() {
        for code in [
            ErrorCode::LicenseInactive,
            ErrorCode::LicenseExpired,
            ErrorCode::FingerprintRequired,
            ErrorCode::DeviceNotBound,
            ErrorCode::DeviceBlocked,
            ErrorCode::DeviceLimitReached,
            ErrorCode::TenantNotSelected,
            ErrorCode::TenantDisabled,
        ] {
            assert_eq!(code.http_status(), StatusCode::FORBIDDEN, "{code:?}");
        }
    }

    #[test]
    fn test_conflict_status() {
        assert_eq!(
            ErrorCode::FingerprintBound.http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ErrorCode::TenantCapacityExceeded.http_status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_unauthorized_status() {
        assert_eq!(
            ErrorCode::InvalidCredentials.http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ErrorCode::AccountDisabled.http_status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_system_status() {
        assert_eq!(
            ErrorCode::StorageUnavailable.http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorCode::InternalError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_bad_request_status() {
        assert_eq!(
            ErrorCode::ValidationFailed.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::LicenseKeyInvalid.http_status(),
            StatusCode::BAD_REQUEST
        );
    }
}
