use std::sync::Arc;
use std::time::Duration;

use jobgate_core::{CallerIdentity, JobId, PermissionLevel};

use crate::AuthResult;
use crate::authority::{JobStore, WORKSPACE_AUTHORITY, WorkspaceAuthority, call_with_timeout};
use crate::cache::{AuthCaches, PermissionKey};
use crate::error::AuthError;

/// Resolves a caller's effective permission on a job.
///
/// The job's owning workspace decides: write access on the workspace means
/// [`PermissionLevel::Write`] on every job in it, read access means
/// [`PermissionLevel::Read`].
#[derive(Clone)]
pub struct JobPermissionResolver {
    caches: Arc<AuthCaches>,
    job_store: Arc<dyn JobStore>,
    authority: Arc<dyn WorkspaceAuthority>,
    timeout: Duration,
}

impl JobPermissionResolver {
    pub fn new(
        caches: Arc<AuthCaches>,
        job_store: Arc<dyn JobStore>,
        authority: Arc<dyn WorkspaceAuthority>,
        timeout: Duration,
    ) -> Self {
        Self {
            caches,
            job_store,
            authority,
            timeout,
        }
    }

    /// Permission `caller` holds on `job_id`.
    ///
    /// # Errors
    ///
    /// - `AuthError::Validation` if `job_id` is absent
    /// - `AuthError::NotFound` if the job store does not know the job
    /// - `AuthError::AuthorityUnavailable` if the workspace authority fails
    ///   or does not answer within the timeout
    pub async fn resolve(
        &self,
        caller: &CallerIdentity,
        job_id: Option<&JobId>,
    ) -> AuthResult<PermissionLevel> {
        let job_id = job_id.ok_or_else(|| AuthError::validation("Please provide valid job_id"))?;
        let key = PermissionKey::new(caller.user_id().clone(), job_id.clone());

        if let Some(level) = self.caches.permissions().get(&key) {
            tracing::trace!(user = %caller.user_id(), job_id = %job_id, level = %level, "Job permission cache hit");
            return Ok(level);
        }

        let workspace = self.job_store.get_owning_workspace(job_id).await?;

        tracing::debug!(
            user = %caller.user_id(),
            job_id = %job_id,
            workspace = %workspace,
            "Job permission cache miss, querying workspace authority"
        );

        let level = call_with_timeout(
            WORKSPACE_AUTHORITY,
            self.timeout,
            self.authority.get_access_level(caller, &workspace),
        )
        .await?;

        self.caches.permissions().set(key, level);
        Ok(level)
    }

    /// Drop the cached permission for (caller, job), if any.
    pub fn invalidate(&self, caller: &CallerIdentity, job_id: &JobId) {
        let key = PermissionKey::new(caller.user_id().clone(), job_id.clone());
        self.caches.permissions().remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use async_trait::async_trait;
    use jobgate_core::WorkspaceId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedStore;

    #[async_trait]
    impl JobStore for FixedStore {
        async fn get_owning_workspace(&self, job_id: &JobId) -> AuthResult<WorkspaceId> {
            if job_id.as_str() == "missing" {
                return Err(AuthError::not_found(format!("job {job_id}")));
            }
            Ok(WorkspaceId::new("42"))
        }
    }

    struct CountingAuthority {
        level: PermissionLevel,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WorkspaceAuthority for CountingAuthority {
        async fn get_access_level(
            &self,
            _caller: &CallerIdentity,
            _workspace: &WorkspaceId,
        ) -> AuthResult<PermissionLevel> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.level)
        }
    }

    fn resolver(level: PermissionLevel) -> (JobPermissionResolver, Arc<CountingAuthority>) {
        let authority = Arc::new(CountingAuthority {
            level,
            calls: AtomicUsize::new(0),
        });
        let caches = Arc::new(AuthCaches::new(&CacheConfig::default()).unwrap());
        let resolver = JobPermissionResolver::new(
            caches,
            Arc::new(FixedStore),
            authority.clone(),
            Duration::from_secs(5),
        );
        (resolver, authority)
    }

    #[tokio::test]
    async fn test_missing_job_id_is_validation_error() {
        let (resolver, authority) = resolver(PermissionLevel::Write);
        let caller = CallerIdentity::new("alice", "token");

        let err = resolver.resolve(&caller, None).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation { .. }));
        assert_eq!(authority.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (resolver, authority) = resolver(PermissionLevel::Read);
        let caller = CallerIdentity::new("alice", "token");
        let job = JobId::new("job-1").unwrap();

        assert_eq!(
            resolver.resolve(&caller, Some(&job)).await.unwrap(),
            PermissionLevel::Read
        );
        assert_eq!(
            resolver.resolve(&caller, Some(&job)).await.unwrap(),
            PermissionLevel::Read
        );
        assert_eq!(authority.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_found_propagates_and_is_not_cached() {
        let (resolver, authority) = resolver(PermissionLevel::Write);
        let caller = CallerIdentity::new("alice", "token");
        let job = JobId::new("missing").unwrap();

        let err = resolver.resolve(&caller, Some(&job)).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound { .. }));
        assert_eq!(authority.calls.load(Ordering::SeqCst), 0);
        assert!(resolver.caches.permissions().is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let (resolver, authority) = resolver(PermissionLevel::Write);
        let caller = CallerIdentity::new("alice", "token");
        let job = JobId::new("job-1").unwrap();

        resolver.resolve(&caller, Some(&job)).await.unwrap();
        resolver.invalidate(&caller, &job);
        resolver.resolve(&caller, Some(&job)).await.unwrap();
        assert_eq!(authority.calls.load(Ordering::SeqCst), 2);
    }
}
