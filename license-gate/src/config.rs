//! License gate configuration

use shared::util::MAX_TERM_DAYS;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite path or `sqlite:` URL
    pub database_url: String,
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// HMAC secret for session tokens
    pub session_secret: String,
    pub session_ttl_minutes: i64,
    /// Maximum number of tenants
    pub tenant_capacity: i64,
    /// Operator account ensured at startup (role `SuperAdmin`)
    pub superadmin_username: Option<String>,
    pub superadmin_password: Option<String>,
    /// Alerts are POSTed here when set, otherwise only logged
    pub alert_webhook_url: Option<String>,
    pub alert_queue_size: usize,
    /// License terms for new tenants
    pub default_license_days: i64,
    pub default_max_devices: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:license-gate.db".into(),
            http_port: 8080,
            environment: "development".into(),
            session_secret: "dev-SESSION_SECRET-not-for-production".into(),
            session_ttl_minutes: 30,
            tenant_capacity: 10,
            superadmin_username: None,
            superadmin_password: None,
            alert_webhook_url: None,
            alert_queue_size: 256,
            default_license_days: 365,
            default_max_devices: 3,
        }
    }
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn optional(name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|s| !s.is_empty())
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let defaults = Self::default();

        let config = Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            http_port: Self::parsed("HTTP_PORT", defaults.http_port),
            session_secret: Self::require_secret("SESSION_SECRET", &environment)?,
            session_ttl_minutes: Self::parsed("SESSION_TTL_MINUTES", defaults.session_ttl_minutes),
            tenant_capacity: Self::parsed("TENANT_CAPACITY", defaults.tenant_capacity),
            superadmin_username: Self::optional("SUPERADMIN_USERNAME"),
            superadmin_password: Self::optional("SUPERADMIN_PASSWORD"),
            alert_webhook_url: Self::optional("ALERT_WEBHOOK_URL"),
            alert_queue_size: Self::parsed("ALERT_QUEUE_SIZE", defaults.alert_queue_size),
            default_license_days: Self::parsed("DEFAULT_LICENSE_DAYS", defaults.default_license_days),
            default_max_devices: Self::parsed("DEFAULT_MAX_DEVICES", defaults.default_max_devices),
            environment,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), BoxError> {
        if self.tenant_capacity < 1 {
            return Err("TENANT_CAPACITY must be at least 1".into());
        }
        if self.default_license_days < 1 || self.default_max_devices < 1 {
            return Err("DEFAULT_LICENSE_DAYS and DEFAULT_MAX_DEVICES must be at least 1".into());
        }
        if self.default_license_days > MAX_TERM_DAYS {
            return Err(format!("DEFAULT_LICENSE_DAYS must be at most {MAX_TERM_DAYS}").into());
        }
        if self.session_ttl_minutes < 1 {
            return Err("SESSION_TTL_MINUTES must be at least 1".into());
        }
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}
