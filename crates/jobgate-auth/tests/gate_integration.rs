//! End-to-end authorization tests.
//!
//! The gate is wired to in-memory collaborators that count their calls, so
//! the tests can assert exactly when the caches go back to an authority.

use std::collections::{HashMap, HashSet};
use std::future::pending;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jobgate_auth::prelude::*;
use tokio_test::{assert_err, assert_ok};

const TTL: Duration = Duration::from_secs(300);

#[derive(Default)]
struct Calls {
    store: AtomicUsize,
    workspace: AtomicUsize,
    roles: AtomicUsize,
}

struct MemoryJobStore {
    calls: Arc<Calls>,
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get_owning_workspace(&self, job_id: &JobId) -> AuthResult<WorkspaceId> {
        self.calls.store.fetch_add(1, Ordering::SeqCst);
        if job_id.as_str().starts_with("ghost") {
            return Err(AuthError::not_found(format!("Job {job_id} not found")));
        }
        Ok(WorkspaceId::new(format!("ws-{job_id}")))
    }
}

/// Grants per user; users not listed get `None`.
struct MemoryWorkspaces {
    calls: Arc<Calls>,
    grants: HashMap<&'static str, PermissionLevel>,
    hang: bool,
}

#[async_trait]
impl WorkspaceAuthority for MemoryWorkspaces {
    async fn get_access_level(
        &self,
        caller: &CallerIdentity,
        _workspace: &WorkspaceId,
    ) -> AuthResult<PermissionLevel> {
        self.calls.workspace.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            pending::<()>().await;
        }
        Ok(self
            .grants
            .get(caller.user_id().as_str())
            .copied()
            .unwrap_or(PermissionLevel::None))
    }
}

struct MemoryRoles {
    calls: Arc<Calls>,
    roles: HashMap<&'static str, &'static str>,
}

#[async_trait]
impl RoleAuthority for MemoryRoles {
    async fn get_roles(&self, caller: &CallerIdentity) -> AuthResult<HashSet<String>> {
        self.calls.roles.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .roles
            .get(caller.user_id().as_str())
            .map(|role| HashSet::from([role.to_string()]))
            .unwrap_or_default())
    }
}

struct Harness {
    gate: AuthorizationGate,
    caches: Arc<AuthCaches>,
    calls: Arc<Calls>,
}

fn harness_with(capacity: usize, hang: bool, authority_timeout: Duration) -> Harness {
    let calls = Arc::new(Calls::default());
    let caches = Arc::new(AuthCaches::new(&CacheConfig { capacity, ttl: TTL }).unwrap());

    let workspaces = MemoryWorkspaces {
        calls: calls.clone(),
        grants: HashMap::from([
            ("reader", PermissionLevel::Read),
            ("writer", PermissionLevel::Write),
        ]),
        hang,
    };
    let roles = MemoryRoles {
        calls: calls.clone(),
        roles: HashMap::from([("ops", "EE2_ADMIN"), ("auditor", "EE2_ADMIN_RO")]),
    };

    let jobs = JobPermissionResolver::new(
        caches.clone(),
        Arc::new(MemoryJobStore {
            calls: calls.clone(),
        }),
        Arc::new(workspaces),
        authority_timeout,
    );
    let admins = AdminRoleResolver::new(
        caches.clone(),
        Arc::new(roles),
        AdminRoles::default(),
        authority_timeout,
    );

    Harness {
        gate: AuthorizationGate::new(jobs, admins),
        caches,
        calls,
    }
}

fn harness() -> Harness {
    harness_with(500, false, Duration::from_secs(10))
}

fn job(id: &str) -> JobId {
    JobId::new(id).unwrap()
}

#[tokio::test]
async fn test_read_only_caller_cannot_write() {
    let h = harness();
    let caller = CallerIdentity::new("reader", "tok");

    let err = h
        .gate
        .authorize(&caller, Some(&job("j1")), PermissionLevel::Write, false)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Forbidden { .. }));
}

#[tokio::test]
async fn test_non_admin_as_admin_is_denied_without_job_lookup() {
    let h = harness();
    let caller = CallerIdentity::new("writer", "tok");

    for required in [PermissionLevel::Read, PermissionLevel::Write] {
        let err = h
            .gate
            .authorize(&caller, Some(&job("j1")), required, true)
            .await
            .unwrap_err();
        assert!(err.is_authorization_error());
    }

    assert_eq!(h.calls.store.load(Ordering::SeqCst), 0);
    assert_eq!(h.calls.workspace.load(Ordering::SeqCst), 0);
    assert_eq!(h.calls.roles.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_read_admin_reads_without_job_lookup() {
    let h = harness();
    let caller = CallerIdentity::new("auditor", "tok");

    assert_ok!(
        h.gate
            .authorize(&caller, Some(&job("j1")), PermissionLevel::Read, true)
            .await
    );
    let err = assert_err!(
        h.gate
            .authorize(&caller, Some(&job("j1")), PermissionLevel::Write, true)
            .await
    );

    assert!(err.is_authorization_error());
    assert_eq!(h.calls.store.load(Ordering::SeqCst), 0);
    assert_eq!(h.calls.workspace.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_write_admin_passes_every_level() {
    let h = harness();
    let caller = CallerIdentity::new("ops", "tok");

    for required in [PermissionLevel::Read, PermissionLevel::Write] {
        assert_ok!(
            h.gate
                .authorize(&caller, Some(&job("j1")), required, true)
                .await
        );
    }
}

#[tokio::test]
async fn test_sequential_calls_within_ttl_hit_authority_once() {
    let h = harness();
    let caller = CallerIdentity::new("writer", "tok");

    for _ in 0..2 {
        h.gate
            .authorize(&caller, Some(&job("j1")), PermissionLevel::Write, false)
            .await
            .unwrap();
    }

    assert_eq!(h.calls.workspace.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_triggers_exactly_one_refresh() {
    let h = harness();
    let caller = CallerIdentity::new("reader", "tok");
    let j1 = job("j1");

    h.gate
        .authorize(&caller, Some(&j1), PermissionLevel::Read, false)
        .await
        .unwrap();
    tokio::time::advance(TTL - Duration::from_secs(1)).await;
    h.gate
        .authorize(&caller, Some(&j1), PermissionLevel::Read, false)
        .await
        .unwrap();
    assert_eq!(h.calls.workspace.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    h.gate
        .authorize(&caller, Some(&j1), PermissionLevel::Read, false)
        .await
        .unwrap();
    h.gate
        .authorize(&caller, Some(&j1), PermissionLevel::Read, false)
        .await
        .unwrap();
    assert_eq!(h.calls.workspace.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_admin_entry_expires_after_ttl() {
    let h = harness();
    let caller = CallerIdentity::new("ops", "tok");
    let admins = h.gate.admin_resolver();

    admins.resolve_admin(&caller).await.unwrap();
    admins.resolve_admin(&caller).await.unwrap();
    assert_eq!(h.calls.roles.load(Ordering::SeqCst), 1);

    tokio::time::advance(TTL).await;
    admins.resolve_admin(&caller).await.unwrap();
    assert_eq!(h.calls.roles.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_capacity_overflow_evicts_least_recently_used() {
    let h = harness_with(2, false, Duration::from_secs(10));
    let caller = CallerIdentity::new("writer", "tok");
    let resolver = h.gate.job_resolver();

    for id in ["j1", "j2", "j3"] {
        resolver.resolve(&caller, Some(&job(id))).await.unwrap();
    }
    assert_eq!(h.calls.workspace.load(Ordering::SeqCst), 3);
    assert_eq!(h.caches.permissions().len(), 2);

    // j1 was evicted by j3
    resolver.resolve(&caller, Some(&job("j1"))).await.unwrap();
    assert_eq!(h.calls.workspace.load(Ordering::SeqCst), 4);

    resolver.resolve(&caller, Some(&job("j3"))).await.unwrap();
    assert_eq!(h.calls.workspace.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_not_found_propagates_unchanged() {
    let h = harness();
    let caller = CallerIdentity::new("writer", "tok");

    let err = h
        .gate
        .authorize(&caller, Some(&job("ghost-1")), PermissionLevel::Read, false)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::NotFound { .. }));
    assert_eq!(h.calls.workspace.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_authority_timeout_is_unavailable_and_not_cached() {
    let h = harness_with(500, true, Duration::from_secs(1));
    let caller = CallerIdentity::new("writer", "tok");

    let err = h
        .gate
        .authorize(&caller, Some(&job("j1")), PermissionLevel::Read, false)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::AuthorityUnavailable { .. }));
    assert!(err.is_retryable());
    assert!(h.caches.permissions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_request_writes_no_cache_entry() {
    let h = harness_with(500, true, Duration::from_secs(60));
    let caller = CallerIdentity::new("writer", "tok");
    let j1 = job("j1");

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        h.gate
            .authorize(&caller, Some(&j1), PermissionLevel::Read, false),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(h.calls.workspace.load(Ordering::SeqCst), 1);
    assert!(h.caches.permissions().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_caches() {
    let h = Arc::new(harness());
    let mut handles = Vec::new();

    for i in 0..32 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            let user = if i % 2 == 0 { "reader" } else { "writer" };
            let caller = CallerIdentity::new(user, "tok");
            let j = job(&format!("j{}", i % 4));
            h.gate
                .authorize(&caller, Some(&j), PermissionLevel::Read, false)
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // 2 users x 4 jobs; duplicate concurrent misses may each call out
    let calls = h.calls.workspace.load(Ordering::SeqCst);
    assert!((8..=32).contains(&calls));
    assert_eq!(h.caches.permissions().len(), 8);
}
