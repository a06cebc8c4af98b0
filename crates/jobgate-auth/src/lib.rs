//! # jobgate-auth
//!
//! Authorization and caching layer of the job execution engine.
//!
//! This crate provides:
//! - A bounded, TTL-expiring LRU cache safe for concurrent use
//! - Process-wide job permission and administrator caches
//! - Clients for the workspace and role authorities
//! - Job permission and administrator role resolution
//! - The authorization gate composed in front of job-lifecycle operations
//!
//! ## Modules
//!
//! - [`config`] - Role names, cache shape and authority endpoints
//! - [`cache`] - Bounded TTL cache and the shared cache pair
//! - [`authority`] - Collaborator traits and HTTP authority clients
//! - [`resolver`] - Job permission and administrator role resolvers
//! - [`gate`] - Authorization gate

pub mod authority;
pub mod cache;
pub mod config;
pub mod error;
pub mod gate;
pub mod resolver;

pub use authority::{
    HttpRoleAuthority, HttpWorkspaceAuthority, JobStore, ROLE_AUTHORITY, RoleAuthority,
    WORKSPACE_AUTHORITY, WorkspaceAuthority,
};
pub use cache::{AuthCaches, BoundedTtlCache, CacheStats, PermissionKey};
pub use config::{AuthConfig, CacheConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use gate::AuthorizationGate;
pub use resolver::{AdminRoleResolver, AdminRoles, JobPermissionResolver};

/// Type alias for authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use jobgate_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::authority::{JobStore, RoleAuthority, WorkspaceAuthority};
    pub use crate::cache::AuthCaches;
    pub use crate::config::{AuthConfig, CacheConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::gate::AuthorizationGate;
    pub use crate::resolver::{AdminRoleResolver, AdminRoles, JobPermissionResolver};
    pub use jobgate_core::{CallerIdentity, JobId, PermissionLevel, WorkspaceId};
}
