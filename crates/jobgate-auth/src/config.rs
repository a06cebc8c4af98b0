//! Authorization layer configuration.
//!
//! Covers administrator role names, the shape of the two permission caches,
//! and where (and how patiently) to reach the external authorities.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default capacity of each permission cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 500;

/// Default fixed lifetime of a cache entry.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default role granting read-only administrator access.
pub const DEFAULT_ADMIN_READ_ROLE: &str = "EE2_ADMIN_RO";

/// Default role granting read-write administrator access.
pub const DEFAULT_ADMIN_WRITE_ROLE: &str = "EE2_ADMIN";

/// Root authorization configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// admin_read_role = "EE2_ADMIN_RO"
/// admin_write_role = "EE2_ADMIN"
/// authority_timeout = "10s"
/// workspace_url = "https://ci.example.org/services/ws"
/// auth_url = "https://ci.example.org/services/auth"
///
/// [auth.cache]
/// capacity = 500
/// ttl = "5m"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Role whose members hold read-only administrator access.
    pub admin_read_role: String,

    /// Role whose members hold read-write administrator access.
    pub admin_write_role: String,

    /// Shape of the job permission and administrator caches.
    pub cache: CacheConfig,

    /// Upper bound on any single external authority call.
    #[serde(with = "humantime_serde")]
    pub authority_timeout: Duration,

    /// Base URL of the workspace authorization authority.
    pub workspace_url: Option<String>,

    /// Base URL of the role authority.
    pub auth_url: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_read_role: DEFAULT_ADMIN_READ_ROLE.to_string(),
            admin_write_role: DEFAULT_ADMIN_WRITE_ROLE.to_string(),
            cache: CacheConfig::default(),
            authority_timeout: Duration::from_secs(10),
            workspace_url: None,
            auth_url: None,
        }
    }
}

/// Cache configuration, shared by both permission caches.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of live entries per cache.
    pub capacity: usize,

    /// Fixed entry lifetime, measured from insertion.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl: DEFAULT_CACHE_TTL,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - Either admin role name is empty, or both are the same role
    /// - The cache capacity or TTL is zero
    /// - The authority timeout is zero
    /// - An authority URL does not parse
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin_read_role.trim().is_empty() || self.admin_write_role.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "admin role names cannot be empty".to_string(),
            ));
        }

        if self.admin_read_role == self.admin_write_role {
            return Err(ConfigError::InvalidValue(format!(
                "admin_read_role and admin_write_role must differ (both '{}')",
                self.admin_read_role
            )));
        }

        if self.cache.capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "cache capacity must be > 0".to_string(),
            ));
        }

        if self.cache.ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "cache ttl must be > 0".to_string(),
            ));
        }

        if self.authority_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "authority_timeout must be > 0".to_string(),
            ));
        }

        for (name, value) in [
            ("workspace_url", &self.workspace_url),
            ("auth_url", &self.auth_url),
        ] {
            if let Some(raw) = value {
                url::Url::parse(raw).map_err(|e| {
                    ConfigError::InvalidValue(format!("{name} '{raw}' is not a valid URL: {e}"))
                })?;
            }
        }

        Ok(())
    }

    /// Returns the workspace authority URL or a `Missing` error.
    pub fn require_workspace_url(&self) -> Result<url::Url, ConfigError> {
        require_url("workspace_url", self.workspace_url.as_deref())
    }

    /// Returns the role authority URL or a `Missing` error.
    pub fn require_auth_url(&self) -> Result<url::Url, ConfigError> {
        require_url("auth_url", self.auth_url.as_deref())
    }
}

fn require_url(name: &str, raw: Option<&str>) -> Result<url::Url, ConfigError> {
    let raw = raw.ok_or_else(|| ConfigError::Missing(name.to_string()))?;
    url::Url::parse(raw)
        .map_err(|e| ConfigError::InvalidValue(format!("{name} '{raw}' is not a valid URL: {e}")))
}
