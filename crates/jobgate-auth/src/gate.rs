//! Authorization gate.
//!
//! A gate is composed in front of every job-lifecycle operation. Its steps
//! run strictly in order: validate the job id, authorize (administrator
//! check or job permission), then hand off to the operation. The gate never
//! touches job state itself.
//!
//! # Example
//!
//! ```ignore
//! let status = gate
//!     .guarded(&caller, Some(&job_id), PermissionLevel::Read, as_admin, || {
//!         store.get_job(&job_id)
//!     })
//!     .await?;
//! ```

use std::future::Future;

use jobgate_core::{CallerIdentity, JobId, PermissionLevel};

use crate::AuthResult;
use crate::error::AuthError;
use crate::resolver::{AdminRoleResolver, JobPermissionResolver};

// =============================================================================
// Gate
// =============================================================================

/// Guard enforcing job and administrator permissions.
#[derive(Clone)]
pub struct AuthorizationGate {
    jobs: JobPermissionResolver,
    admins: AdminRoleResolver,
}

impl AuthorizationGate {
    pub fn new(jobs: JobPermissionResolver, admins: AdminRoleResolver) -> Self {
        Self { jobs, admins }
    }

    pub fn job_resolver(&self) -> &JobPermissionResolver {
        &self.jobs
    }

    pub fn admin_resolver(&self) -> &AdminRoleResolver {
        &self.admins
    }

    /// Authorize `caller` for `required` access to `job_id`.
    ///
    /// With `as_admin` set, only the administrator level is checked and the
    /// job permission resolver is never consulted.
    ///
    /// # Errors
    ///
    /// - `AuthError::Validation` if `job_id` is absent or `required` is
    ///   [`PermissionLevel::None`]
    /// - `AuthError::Forbidden` if the caller lacks the required level
    /// - `AuthError::NotFound` / `AuthError::AuthorityUnavailable` as raised
    ///   by the resolvers
    pub async fn authorize(
        &self,
        caller: &CallerIdentity,
        job_id: Option<&JobId>,
        required: PermissionLevel,
        as_admin: bool,
    ) -> AuthResult<()> {
        let job_id = job_id.ok_or_else(|| AuthError::validation("Please provide valid job_id"))?;
        require_concrete(required)?;

        if as_admin {
            return require_admin(&self.admins, caller, required).await;
        }
        require_job_permission(&self.jobs, caller, job_id, required).await
    }

    /// Authorize `caller` for `required` administrator access.
    ///
    /// # Errors
    ///
    /// - `AuthError::Validation` if `required` is [`PermissionLevel::None`]
    /// - `AuthError::Forbidden` if the caller lacks the administrator level
    pub async fn authorize_admin(
        &self,
        caller: &CallerIdentity,
        required: PermissionLevel,
    ) -> AuthResult<()> {
        require_admin(&self.admins, caller, required).await
    }

    /// Run `operation` only if [`AuthorizationGate::authorize`] succeeds.
    ///
    /// The operation is not started when authorization fails.
    pub async fn guarded<T, E, F, Fut>(
        &self,
        caller: &CallerIdentity,
        job_id: Option<&JobId>,
        required: PermissionLevel,
        as_admin: bool,
        operation: F,
    ) -> Result<T, E>
    where
        E: From<AuthError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.authorize(caller, job_id, required, as_admin).await?;
        operation().await
    }
}

fn require_concrete(required: PermissionLevel) -> AuthResult<()> {
    if required == PermissionLevel::None {
        return Err(AuthError::validation(
            "A gated operation must require Read or Write",
        ));
    }
    Ok(())
}

/// Require `caller` to hold `required` on `job_id` through the job resolver.
///
/// Usable without an [`AuthorizationGate`] when only job permissions are
/// needed.
pub async fn require_job_permission(
    jobs: &JobPermissionResolver,
    caller: &CallerIdentity,
    job_id: &JobId,
    required: PermissionLevel,
) -> AuthResult<()> {
    require_concrete(required)?;

    let actual = jobs.resolve(caller, Some(job_id)).await?;
    if !actual.satisfies(required) {
        tracing::debug!(
            user = %caller.user_id(),
            job_id = %job_id,
            required = %required,
            actual = %actual,
            "Job access denied"
        );
        return Err(AuthError::forbidden(format!(
            "User {} does not have {} permission for job {}",
            caller.user_id(),
            required,
            job_id
        )));
    }
    Ok(())
}

/// Require `caller` to hold the `required` administrator level.
pub async fn require_admin(
    admins: &AdminRoleResolver,
    caller: &CallerIdentity,
    required: PermissionLevel,
) -> AuthResult<()> {
    if !admins.check_admin(caller, required).await? {
        tracing::debug!(
            user = %caller.user_id(),
            required = %required,
            "Admin access denied: missing admin role"
        );
        return Err(AuthError::forbidden(format!(
            "User {} does not have {} administrator permission",
            caller.user_id(),
            required
        )));
    }

    tracing::debug!(user = %caller.user_id(), required = %required, "Admin access granted");
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
