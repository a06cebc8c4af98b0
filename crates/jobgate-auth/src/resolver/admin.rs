use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use jobgate_core::{CallerIdentity, PermissionLevel};

use crate::AuthResult;
use crate::authority::{ROLE_AUTHORITY, RoleAuthority, call_with_timeout};
use crate::cache::AuthCaches;
use crate::config::AuthConfig;
use crate::error::AuthError;

/// Role names granting administrator access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminRoles {
    pub read: String,
    pub write: String,
}

impl AdminRoles {
    pub fn new(read: impl Into<String>, write: impl Into<String>) -> Self {
        Self {
            read: read.into(),
            write: write.into(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.admin_read_role, &config.admin_write_role)
    }

    /// Administrator level implied by a set of role memberships.
    ///
    /// The write role wins over the read role.
    pub fn level_for(&self, roles: &HashSet<String>) -> PermissionLevel {
        if roles.contains(&self.write) {
            PermissionLevel::Write
        } else if roles.contains(&self.read) {
            PermissionLevel::Read
        } else {
            PermissionLevel::None
        }
    }
}

impl Default for AdminRoles {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}

/// Resolves a caller's platform-wide administrator level.
#[derive(Clone)]
pub struct AdminRoleResolver {
    caches: Arc<AuthCaches>,
    authority: Arc<dyn RoleAuthority>,
    roles: AdminRoles,
    timeout: Duration,
}

impl AdminRoleResolver {
    pub fn new(
        caches: Arc<AuthCaches>,
        authority: Arc<dyn RoleAuthority>,
        roles: AdminRoles,
        timeout: Duration,
    ) -> Self {
        Self {
            caches,
            authority,
            roles,
            timeout,
        }
    }

    pub fn roles(&self) -> &AdminRoles {
        &self.roles
    }

    /// Administrator level of `caller`.
    ///
    /// A cache miss always completes the role lookup before returning.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AuthorityUnavailable` if the role authority fails
    /// or times out.
    pub async fn resolve_admin(&self, caller: &CallerIdentity) -> AuthResult<PermissionLevel> {
        if let Some(level) = self.caches.admin().get(caller.user_id()) {
            tracing::trace!(user = %caller.user_id(), level = %level, "Admin cache hit");
            return Ok(level);
        }

        tracing::debug!(user = %caller.user_id(), "Admin cache miss, querying role authority");

        let roles = call_with_timeout(
            ROLE_AUTHORITY,
            self.timeout,
            self.authority.get_roles(caller),
        )
        .await?;

        let level = self.roles.level_for(&roles);
        self.caches.admin().set(caller.user_id().clone(), level);
        Ok(level)
    }

    /// Whether `caller` holds at least the `requested` administrator level.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` when `requested` is
    /// [`PermissionLevel::None`]; administrator checks must name a concrete
    /// level. The role authority is not consulted in that case.
    pub async fn check_admin(
        &self,
        caller: &CallerIdentity,
        requested: PermissionLevel,
    ) -> AuthResult<bool> {
        if requested == PermissionLevel::None {
            return Err(AuthError::validation(
                "Admin permission check requires a Read or Write level",
            ));
        }

        let actual = self.resolve_admin(caller).await?;
        Ok(actual.satisfies(requested))
    }

    /// Whether `caller` holds any administrator level.
    pub async fn is_admin(&self, caller: &CallerIdentity) -> AuthResult<bool> {
        self.check_admin(caller, PermissionLevel::Read).await
    }
}
