//! Interfaces to the collaborators consulted on a cache miss.
//!
//! This module defines:
//!
//! - [`JobStore`] - resolves the workspace owning a job
//! - [`WorkspaceAuthority`] - resolves a caller's access level on a workspace
//! - [`RoleAuthority`] - resolves a caller's role memberships
//!
//! # Implementations
//!
//! - [`HttpWorkspaceAuthority`] - JSON-RPC workspace service client
//! - [`HttpRoleAuthority`] - auth service client
//!
//! Job store implementations live with the persistence layer.

pub mod roles;
pub mod workspace;

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use jobgate_core::{CallerIdentity, JobId, PermissionLevel, WorkspaceId};

use crate::AuthResult;
use crate::error::AuthError;

pub use roles::HttpRoleAuthority;
pub use workspace::HttpWorkspaceAuthority;

/// Name used in errors and logs for the workspace authority.
pub const WORKSPACE_AUTHORITY: &str = "workspace";

/// Name used in errors and logs for the role authority.
pub const ROLE_AUTHORITY: &str = "roles";

// =============================================================================
// Collaborator Traits
// =============================================================================

/// Read access to job ownership.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Workspace owning `job_id`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotFound` if the job does not exist.
    async fn get_owning_workspace(&self, job_id: &JobId) -> AuthResult<WorkspaceId>;
}

/// External authority deciding access to workspaces.
#[async_trait]
pub trait WorkspaceAuthority: Send + Sync {
    /// Access level `caller` holds on `workspace`.
    async fn get_access_level(
        &self,
        caller: &CallerIdentity,
        workspace: &WorkspaceId,
    ) -> AuthResult<PermissionLevel>;
}

/// External authority listing role memberships.
#[async_trait]
pub trait RoleAuthority: Send + Sync {
    /// Roles held by `caller`.
    async fn get_roles(&self, caller: &CallerIdentity) -> AuthResult<HashSet<String>>;
}

/// Bound an authority call by `timeout`.
///
/// A call that does not finish in time is reported as
/// `AuthError::AuthorityUnavailable`, never as a grant or a denial.
pub(crate) async fn call_with_timeout<T, F>(
    authority: &'static str,
    timeout: Duration,
    call: F,
) -> AuthResult<T>
where
    F: Future<Output = AuthResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                authority,
                timeout_ms = timeout.as_millis() as u64,
                "Authority call timed out"
            );
            Err(AuthError::authority_unavailable(
                authority,
                format!("no response within {timeout:?}"),
            ))
        }
    }
}

/// Map a reqwest failure onto `AuthorityUnavailable`.
pub(crate) fn transport_error(authority: &'static str, err: reqwest::Error) -> AuthError {
    let message = if err.is_timeout() {
        format!("request timed out: {err}")
    } else {
        err.to_string()
    };
    tracing::warn!(authority, error = %message, "Authority request failed");
    AuthError::authority_unavailable(authority, message)
}

/// Build the shared HTTP client used by the authority clients.
pub(crate) fn http_client(timeout: Duration) -> AuthResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AuthError::configuration(format!("Failed to create HTTP client: {e}")))
}
