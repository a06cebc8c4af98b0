//! Process-wide permission caches.
//!
//! The job permission cache and the administrator cache are built once at
//! process start from [`CacheConfig`] and shared by every request context.
//! The two caches are separate instances with distinct key types, so a
//! caller id can never collide with a (caller, job) pair.

use std::sync::{Arc, OnceLock};

use jobgate_core::{CallerId, JobId, PermissionLevel};

use super::ttl::{BoundedTtlCache, CacheStats};
use crate::AuthResult;
use crate::config::CacheConfig;

static GLOBAL_CACHES: OnceLock<Arc<AuthCaches>> = OnceLock::new();

/// Key of the job permission cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionKey {
    pub caller: CallerId,
    pub job: JobId,
}

impl PermissionKey {
    pub fn new(caller: CallerId, job: JobId) -> Self {
        Self { caller, job }
    }
}

/// The two permission caches shared across request contexts.
pub struct AuthCaches {
    permissions: BoundedTtlCache<PermissionKey, PermissionLevel>,
    admin: BoundedTtlCache<CallerId, PermissionLevel>,
}

impl AuthCaches {
    /// Build both caches with the configured capacity and TTL.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the capacity is zero.
    pub fn new(config: &CacheConfig) -> AuthResult<Self> {
        Ok(Self {
            permissions: BoundedTtlCache::new(config.capacity, config.ttl)?,
            admin: BoundedTtlCache::new(config.capacity, config.ttl)?,
        })
    }

    /// Initialize the process-wide caches.
    ///
    /// The first successful call wins; later calls return the existing
    /// instance and ignore their configuration.
    pub fn init_global(config: &CacheConfig) -> AuthResult<Arc<Self>> {
        if let Some(existing) = GLOBAL_CACHES.get() {
            tracing::debug!("Permission caches already initialized");
            return Ok(Arc::clone(existing));
        }

        let caches = Arc::new(Self::new(config)?);
        if GLOBAL_CACHES.set(Arc::clone(&caches)).is_ok() {
            tracing::info!(
                capacity = config.capacity,
                ttl_secs = config.ttl.as_secs(),
                "Permission caches initialized"
            );
            return Ok(caches);
        }

        Ok(GLOBAL_CACHES.get().map(Arc::clone).unwrap_or(caches))
    }

    /// The process-wide caches, if [`AuthCaches::init_global`] has run.
    pub fn global() -> Option<Arc<Self>> {
        GLOBAL_CACHES.get().map(Arc::clone)
    }

    /// Job permission cache, keyed by (caller, job).
    pub fn permissions(&self) -> &BoundedTtlCache<PermissionKey, PermissionLevel> {
        &self.permissions
    }

    /// Administrator cache, keyed by caller.
    pub fn admin(&self) -> &BoundedTtlCache<CallerId, PermissionLevel> {
        &self.admin
    }

    /// Statistics for both caches: (permissions, admin).
    pub fn stats(&self) -> (CacheStats, CacheStats) {
        (self.permissions.stats(), self.admin.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_caches_are_disjoint() {
        let caches = AuthCaches::new(&CacheConfig::default()).unwrap();
        let caller = CallerId::new("alice");
        let job = JobId::new("alice").unwrap();

        caches.admin().set(caller.clone(), PermissionLevel::Write);

        assert!(caches.admin().contains(&caller));
        assert!(
            !caches
                .permissions()
                .contains(&PermissionKey::new(caller, job))
        );
    }

    #[test]
    fn test_caches_use_configured_shape() {
        let config = CacheConfig {
            capacity: 7,
            ttl: Duration::from_secs(42),
        };
        let caches = AuthCaches::new(&config).unwrap();
        assert_eq!(caches.permissions().capacity(), 7);
        assert_eq!(caches.admin().ttl(), Duration::from_secs(42));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = CacheConfig {
            capacity: 0,
            ttl: Duration::from_secs(1),
        };
        assert!(AuthCaches::new(&config).is_err());
    }

    #[test]
    fn test_global_is_initialized_once() {
        let first = AuthCaches::init_global(&CacheConfig::default()).unwrap();
        let second = AuthCaches::init_global(&CacheConfig {
            capacity: 1,
            ttl: Duration::from_secs(1),
        })
        .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &AuthCaches::global().unwrap()));
    }
}
