//! Collaborator interfaces of the job-lifecycle operations.
//!
//! This module defines:
//!
//! - [`JobStoreClient`] - job records, queries and status writes
//! - [`SchedulerClient`] - submission to and cancellation in the scheduler
//! - [`LogStoreClient`] - job log lines
//! - [`EventNotifier`] - status change events
//! - [`AlertChannel`] - operator alerts
//!
//! Every handle is built by a constructor `(config, identity) -> handle`
//! registered in a [`CollaboratorFactory`].

use std::sync::Arc;

use async_trait::async_trait;
use jobgate_auth::authority::{JobStore, RoleAuthority, WorkspaceAuthority};
use jobgate_auth::{AuthResult, HttpRoleAuthority, HttpWorkspaceAuthority};
use jobgate_core::{CallerId, CallerIdentity, JobId, WorkspaceId};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::{JobFilter, JobRecord, LogLine, LogPage, StatusChange, StatusUpdate};

pub const SCHEDULER: &str = "scheduler";
pub const LOG_STORE: &str = "log_store";
pub const JOB_STORE: &str = "job_store";
pub const NOTIFIER: &str = "notifier";
pub const ALERTS: &str = "alerts";

// =============================================================================
// Collaborator Traits
// =============================================================================

/// Persistent job store.
#[async_trait]
pub trait JobStoreClient: JobStore {
    /// # Errors
    ///
    /// Returns a not-found error if the job does not exist.
    async fn get_job(&self, job_id: &JobId) -> EngineResult<JobRecord>;

    async fn find_jobs(&self, filter: &JobFilter) -> EngineResult<Vec<JobRecord>>;

    async fn update_status(&self, job_id: &JobId, update: StatusUpdate) -> EngineResult<()>;
}

/// Scheduler backend.
#[async_trait]
pub trait SchedulerClient: Send + Sync {
    /// Submit a job described by `params` on behalf of `owner`.
    async fn submit(&self, owner: &CallerId, params: &serde_json::Value) -> EngineResult<JobId>;

    async fn cancel(&self, job_id: &JobId) -> EngineResult<()>;
}

/// Job log storage.
#[async_trait]
pub trait LogStoreClient: Send + Sync {
    /// Append lines, returning the number of the last stored line.
    async fn add_lines(&self, job_id: &JobId, lines: &[LogLine]) -> EngineResult<usize>;

    async fn view(&self, job_id: &JobId, skip_lines: Option<usize>) -> EngineResult<LogPage>;
}

#[async_trait]
pub trait EventNotifier: Send + Sync {
    async fn publish_status_change(&self, change: &StatusChange) -> EngineResult<()>;
}

#[async_trait]
pub trait AlertChannel: Send + Sync {
    async fn alert(&self, message: &str) -> EngineResult<()>;
}

/// Adapts a [`JobStoreClient`] to the ownership lookup used by the resolver.
pub(crate) struct OwnershipLookup(pub(crate) Arc<dyn JobStoreClient>);

#[async_trait]
impl JobStore for OwnershipLookup {
    async fn get_owning_workspace(&self, job_id: &JobId) -> AuthResult<WorkspaceId> {
        self.0.get_owning_workspace(job_id).await
    }
}

// =============================================================================
// Default Implementations
// =============================================================================

/// Notifier that only records events in the trace log.
#[derive(Debug, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl EventNotifier for LoggingNotifier {
    async fn publish_status_change(&self, change: &StatusChange) -> EngineResult<()> {
        tracing::info!(
            job_id = %change.job_id,
            user = %change.user,
            previous = ?change.previous,
            status = %change.status,
            "Job status changed"
        );
        Ok(())
    }
}

/// Alert channel that writes alerts to the trace log.
#[derive(Debug, Default)]
pub struct LoggingAlerts;

#[async_trait]
impl AlertChannel for LoggingAlerts {
    async fn alert(&self, message: &str) -> EngineResult<()> {
        tracing::warn!(alert = message, "Operator alert");
        Ok(())
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Constructor of a collaborator handle.
pub type Constructor<T> =
    Arc<dyn Fn(&EngineConfig, &CallerIdentity) -> EngineResult<Arc<T>> + Send + Sync>;

/// Constructors for every collaborator a request context may need.
///
/// The authorities default to the HTTP clients configured under `auth`,
/// the notifier and alert channel to tracing-backed implementations. The
/// job store, scheduler and log store have no default.
#[derive(Clone)]
pub struct CollaboratorFactory {
    pub(crate) job_store: Option<Constructor<dyn JobStoreClient>>,
    pub(crate) scheduler: Option<Constructor<dyn SchedulerClient>>,
    pub(crate) log_store: Option<Constructor<dyn LogStoreClient>>,
    pub(crate) workspace_authority: Constructor<dyn WorkspaceAuthority>,
    pub(crate) role_authority: Constructor<dyn RoleAuthority>,
    pub(crate) notifier: Constructor<dyn EventNotifier>,
    pub(crate) alerts: Constructor<dyn AlertChannel>,
}

impl Default for CollaboratorFactory {
    fn default() -> Self {
        Self {
            job_store: None,
            scheduler: None,
            log_store: None,
            workspace_authority: Arc::new(http_workspace_authority),
            role_authority: Arc::new(http_role_authority),
            notifier: Arc::new(logging_notifier),
            alerts: Arc::new(logging_alerts),
        }
    }
}

impl CollaboratorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job_store<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&EngineConfig, &CallerIdentity) -> EngineResult<Arc<dyn JobStoreClient>>
            + Send
            + Sync
            + 'static,
    {
        self.job_store = Some(Arc::new(constructor));
        self
    }

    pub fn with_scheduler<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&EngineConfig, &CallerIdentity) -> EngineResult<Arc<dyn SchedulerClient>>
            + Send
            + Sync
            + 'static,
    {
        self.scheduler = Some(Arc::new(constructor));
        self
    }

    pub fn with_log_store<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&EngineConfig, &CallerIdentity) -> EngineResult<Arc<dyn LogStoreClient>>
            + Send
            + Sync
            + 'static,
    {
        self.log_store = Some(Arc::new(constructor));
        self
    }

    pub fn with_workspace_authority<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&EngineConfig, &CallerIdentity) -> EngineResult<Arc<dyn WorkspaceAuthority>>
            + Send
            + Sync
            + 'static,
    {
        self.workspace_authority = Arc::new(constructor);
        self
    }

    pub fn with_role_authority<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&EngineConfig, &CallerIdentity) -> EngineResult<Arc<dyn RoleAuthority>>
            + Send
            + Sync
            + 'static,
    {
        self.role_authority = Arc::new(constructor);
        self
    }

    pub fn with_notifier<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&EngineConfig, &CallerIdentity) -> EngineResult<Arc<dyn EventNotifier>>
            + Send
            + Sync
            + 'static,
    {
        self.notifier = Arc::new(constructor);
        self
    }

    pub fn with_alerts<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&EngineConfig, &CallerIdentity) -> EngineResult<Arc<dyn AlertChannel>>
            + Send
            + Sync
            + 'static,
    {
        self.alerts = Arc::new(constructor);
        self
    }
}

pub(crate) fn missing_constructor(subsystem: &'static str) -> EngineError {
    EngineError::configuration(format!("no {subsystem} constructor registered"))
}

fn logging_notifier(
    _config: &EngineConfig,
    _identity: &CallerIdentity,
) -> EngineResult<Arc<dyn EventNotifier>> {
    Ok(Arc::new(LoggingNotifier))
}

fn logging_alerts(
    _config: &EngineConfig,
    _identity: &CallerIdentity,
) -> EngineResult<Arc<dyn AlertChannel>> {
    Ok(Arc::new(LoggingAlerts))
}

fn http_workspace_authority(
    config: &EngineConfig,
    _identity: &CallerIdentity,
) -> EngineResult<Arc<dyn WorkspaceAuthority>> {
    let url = config
        .auth
        .require_workspace_url()
        .map_err(|e| EngineError::configuration(e.to_string()))?;
    let client = HttpWorkspaceAuthority::new(url, config.auth.authority_timeout)?;
    Ok(Arc::new(client))
}

fn http_role_authority(
    config: &EngineConfig,
    _identity: &CallerIdentity,
) -> EngineResult<Arc<dyn RoleAuthority>> {
    let url = config
        .auth
        .require_auth_url()
        .map_err(|e| EngineError::configuration(e.to_string()))?;
    let client = HttpRoleAuthority::new(url, config.auth.authority_timeout)?;
    Ok(Arc::new(client))
}
