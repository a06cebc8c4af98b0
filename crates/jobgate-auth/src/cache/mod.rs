//! Permission caching.
//!
//! - [`BoundedTtlCache`] - generic LRU cache with a fixed entry lifetime
//! - [`AuthCaches`] - the process-wide job permission and administrator caches

pub mod shared;
pub mod ttl;

pub use shared::{AuthCaches, PermissionKey};
pub use ttl::{BoundedTtlCache, CacheStats};
