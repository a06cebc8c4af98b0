//! Per-request context.
//!
//! A [`RequestContext`] is created for every inbound call. It owns the
//! caller identity and the collaborator handles it constructs; handles are
//! built on first use, at most once per context, and never shared with
//! other contexts. The permission caches are the only state shared across
//! contexts.

use std::fmt;
use std::sync::Arc;

use jobgate_auth::authority::{RoleAuthority, WorkspaceAuthority};
use jobgate_auth::gate::{require_admin, require_job_permission};
use jobgate_auth::{AdminRoleResolver, AdminRoles, AuthCaches, JobPermissionResolver};
use jobgate_core::{CallerIdentity, JobId, PermissionLevel, normalize_timestamp, now_epoch_seconds};
use tokio::sync::OnceCell;

use crate::collaborators::{
    ALERTS, AlertChannel, CollaboratorFactory, Constructor, EventNotifier, JOB_STORE, LOG_STORE,
    JobStoreClient, LogStoreClient, NOTIFIER, OwnershipLookup, SCHEDULER, SchedulerClient,
    missing_constructor,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::{
    CancellationStatus, DateRangeQuery, JobFilter, JobOutcome, JobRecord, JobStatus, LogLine,
    LogPage, StatusChange, StatusUpdate,
};

/// Collaborator handles a context can construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    JobStore,
    Scheduler,
    LogStore,
    WorkspaceAuthority,
    RoleAuthority,
    Notifier,
    Alerts,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::JobStore => "job_store",
            Self::Scheduler => "scheduler",
            Self::LogStore => "log_store",
            Self::WorkspaceAuthority => "workspace_authority",
            Self::RoleAuthority => "role_authority",
            Self::Notifier => "notifier",
            Self::Alerts => "alerts",
        };
        f.write_str(name)
    }
}

/// A constructed collaborator handle.
#[derive(Clone)]
pub enum Handle {
    JobStore(Arc<dyn JobStoreClient>),
    Scheduler(Arc<dyn SchedulerClient>),
    LogStore(Arc<dyn LogStoreClient>),
    WorkspaceAuthority(Arc<dyn WorkspaceAuthority>),
    RoleAuthority(Arc<dyn RoleAuthority>),
    Notifier(Arc<dyn EventNotifier>),
    Alerts(Arc<dyn AlertChannel>),
}

impl Handle {
    pub fn kind(&self) -> HandleKind {
        match self {
            Self::JobStore(_) => HandleKind::JobStore,
            Self::Scheduler(_) => HandleKind::Scheduler,
            Self::LogStore(_) => HandleKind::LogStore,
            Self::WorkspaceAuthority(_) => HandleKind::WorkspaceAuthority,
            Self::RoleAuthority(_) => HandleKind::RoleAuthority,
            Self::Notifier(_) => HandleKind::Notifier,
            Self::Alerts(_) => HandleKind::Alerts,
        }
    }
}

#[derive(Default)]
struct Handles {
    job_store: OnceCell<Arc<dyn JobStoreClient>>,
    scheduler: OnceCell<Arc<dyn SchedulerClient>>,
    log_store: OnceCell<Arc<dyn LogStoreClient>>,
    workspace_authority: OnceCell<Arc<dyn WorkspaceAuthority>>,
    role_authority: OnceCell<Arc<dyn RoleAuthority>>,
    notifier: OnceCell<Arc<dyn EventNotifier>>,
    alerts: OnceCell<Arc<dyn AlertChannel>>,
}

/// State and collaborators of a single inbound call.
pub struct RequestContext {
    config: Arc<EngineConfig>,
    identity: CallerIdentity,
    caches: Arc<AuthCaches>,
    factory: Arc<CollaboratorFactory>,
    handles: Handles,
    jobs: OnceCell<JobPermissionResolver>,
    admins: OnceCell<AdminRoleResolver>,
}

impl RequestContext {
    pub fn new(
        config: Arc<EngineConfig>,
        identity: CallerIdentity,
        caches: Arc<AuthCaches>,
        factory: Arc<CollaboratorFactory>,
    ) -> Self {
        Self {
            config,
            identity,
            caches,
            factory,
            handles: Handles::default(),
            jobs: OnceCell::new(),
            admins: OnceCell::new(),
        }
    }

    pub fn identity(&self) -> &CallerIdentity {
        &self.identity
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Handles
    // =========================================================================

    /// Memoized handle of the given kind.
    pub async fn handle(&self, kind: HandleKind) -> EngineResult<Handle> {
        Ok(match kind {
            HandleKind::JobStore => Handle::JobStore(self.job_store().await?),
            HandleKind::Scheduler => Handle::Scheduler(self.scheduler().await?),
            HandleKind::LogStore => Handle::LogStore(self.log_store().await?),
            HandleKind::WorkspaceAuthority => {
                Handle::WorkspaceAuthority(self.workspace_authority().await?)
            }
            HandleKind::RoleAuthority => Handle::RoleAuthority(self.role_authority().await?),
            HandleKind::Notifier => Handle::Notifier(self.notifier().await?),
            HandleKind::Alerts => Handle::Alerts(self.alerts().await?),
        })
    }

    /// Whether the handle of `kind` has been constructed.
    pub fn is_constructed(&self, kind: HandleKind) -> bool {
        match kind {
            HandleKind::JobStore => self.handles.job_store.initialized(),
            HandleKind::Scheduler => self.handles.scheduler.initialized(),
            HandleKind::LogStore => self.handles.log_store.initialized(),
            HandleKind::WorkspaceAuthority => self.handles.workspace_authority.initialized(),
            HandleKind::RoleAuthority => self.handles.role_authority.initialized(),
            HandleKind::Notifier => self.handles.notifier.initialized(),
            HandleKind::Alerts => self.handles.alerts.initialized(),
        }
    }

    pub async fn job_store(&self) -> EngineResult<Arc<dyn JobStoreClient>> {
        let ctor = self.factory.job_store.as_ref();
        self.memoized(&self.handles.job_store, HandleKind::JobStore, ctor, JOB_STORE)
            .await
    }

    pub async fn scheduler(&self) -> EngineResult<Arc<dyn SchedulerClient>> {
        let ctor = self.factory.scheduler.as_ref();
        self.memoized(&self.handles.scheduler, HandleKind::Scheduler, ctor, SCHEDULER)
            .await
    }

    pub async fn log_store(&self) -> EngineResult<Arc<dyn LogStoreClient>> {
        let ctor = self.factory.log_store.as_ref();
        self.memoized(&self.handles.log_store, HandleKind::LogStore, ctor, LOG_STORE)
            .await
    }

    pub async fn workspace_authority(&self) -> EngineResult<Arc<dyn WorkspaceAuthority>> {
        let ctor = Some(&self.factory.workspace_authority);
        self.memoized(
            &self.handles.workspace_authority,
            HandleKind::WorkspaceAuthority,
            ctor,
            jobgate_auth::WORKSPACE_AUTHORITY,
        )
        .await
    }

    pub async fn role_authority(&self) -> EngineResult<Arc<dyn RoleAuthority>> {
        let ctor = Some(&self.factory.role_authority);
        self.memoized(
            &self.handles.role_authority,
            HandleKind::RoleAuthority,
            ctor,
            jobgate_auth::ROLE_AUTHORITY,
        )
        .await
    }

    pub async fn notifier(&self) -> EngineResult<Arc<dyn EventNotifier>> {
        let ctor = Some(&self.factory.notifier);
        self.memoized(&self.handles.notifier, HandleKind::Notifier, ctor, NOTIFIER)
            .await
    }

    pub async fn alerts(&self) -> EngineResult<Arc<dyn AlertChannel>> {
        let ctor = Some(&self.factory.alerts);
        self.memoized(&self.handles.alerts, HandleKind::Alerts, ctor, ALERTS)
            .await
    }

    async fn memoized<T: ?Sized>(
        &self,
        cell: &OnceCell<Arc<T>>,
        kind: HandleKind,
        constructor: Option<&Constructor<T>>,
        subsystem: &'static str,
    ) -> EngineResult<Arc<T>> {
        let handle = cell
            .get_or_try_init(|| async {
                let constructor = constructor.ok_or_else(|| missing_constructor(subsystem))?;
                tracing::debug!(handle = %kind, user = %self.identity.user_id(), "Constructing collaborator handle");
                constructor(self.config.as_ref(), &self.identity)
            })
            .await?;
        Ok(Arc::clone(handle))
    }

    /// Administrator resolver, built from the role authority alone.
    pub async fn admin_resolver(&self) -> EngineResult<&AdminRoleResolver> {
        self.admins
            .get_or_try_init(|| async {
                let auth = &self.config.auth;
                Ok::<_, EngineError>(AdminRoleResolver::new(
                    Arc::clone(&self.caches),
                    self.role_authority().await?,
                    AdminRoles::from_config(auth),
                    auth.authority_timeout,
                ))
            })
            .await
    }

    /// Job permission resolver, built from the job store and the workspace
    /// authority.
    pub async fn job_resolver(&self) -> EngineResult<&JobPermissionResolver> {
        self.jobs
            .get_or_try_init(|| async {
                Ok::<_, EngineError>(JobPermissionResolver::new(
                    Arc::clone(&self.caches),
                    Arc::new(OwnershipLookup(self.job_store().await?)),
                    self.workspace_authority().await?,
                    self.config.auth.authority_timeout,
                ))
            })
            .await
    }

    /// Gate a job operation. Administrator calls never build the job
    /// resolver or its collaborators.
    async fn authorize(
        &self,
        job_id: &JobId,
        required: PermissionLevel,
        as_admin: bool,
    ) -> EngineResult<()> {
        if as_admin {
            return self.authorize_admin(required).await;
        }
        require_job_permission(self.job_resolver().await?, &self.identity, job_id, required)
            .await?;
        Ok(())
    }

    async fn authorize_admin(&self, required: PermissionLevel) -> EngineResult<()> {
        require_admin(self.admin_resolver().await?, &self.identity, required).await?;
        Ok(())
    }

    // =========================================================================
    // Running jobs
    // =========================================================================

    /// Submit a job owned by the caller.
    ///
    /// With `as_admin`, the caller must hold the write-admin role.
    pub async fn run_job(&self, params: serde_json::Value, as_admin: bool) -> EngineResult<JobId> {
        if as_admin {
            self.authorize_admin(PermissionLevel::Write).await?;
        }

        let owner = self.identity.user_id();
        let job_id = self.scheduler().await?.submit(owner, &params).await?;
        tracing::info!(job_id = %job_id, user = %owner, as_admin, "Job submitted");

        self.publish(&job_id, None, JobStatus::Created, now_epoch_seconds())
            .await;
        Ok(job_id)
    }

    pub async fn get_job_params(&self, job_id: &str, as_admin: bool) -> EngineResult<serde_json::Value> {
        let job_id = JobId::new(job_id)?;
        self.authorize(&job_id, PermissionLevel::Read, as_admin).await?;
        Ok(self.job_store().await?.get_job(&job_id).await?.job_input)
    }

    // =========================================================================
    // Logs
    // =========================================================================

    /// Append log lines, returning the number of the last stored line.
    pub async fn add_job_logs(
        &self,
        job_id: &str,
        lines: &[LogLine],
        as_admin: bool,
    ) -> EngineResult<usize> {
        let job_id = JobId::new(job_id)?;
        self.authorize(&job_id, PermissionLevel::Write, as_admin).await?;
        self.log_store().await?.add_lines(&job_id, lines).await
    }

    pub async fn view_job_logs(
        &self,
        job_id: &str,
        skip_lines: Option<usize>,
        as_admin: bool,
    ) -> EngineResult<LogPage> {
        let job_id = JobId::new(job_id)?;
        self.authorize(&job_id, PermissionLevel::Read, as_admin).await?;
        self.log_store().await?.view(&job_id, skip_lines).await
    }

    // =========================================================================
    // Job management
    // =========================================================================

    pub async fn cancel_job(
        &self,
        job_id: &str,
        terminated_code: Option<i32>,
        as_admin: bool,
    ) -> EngineResult<()> {
        let job_id = JobId::new(job_id)?;
        self.authorize(&job_id, PermissionLevel::Write, as_admin).await?;

        let store = self.job_store().await?;
        let record = store.get_job(&job_id).await?;
        if record.status.is_terminal() {
            return Err(EngineError::validation(format!(
                "Job {job_id} cannot be canceled while {}",
                record.status
            )));
        }

        self.scheduler().await?.cancel(&job_id).await?;

        let now = now_epoch_seconds();
        let mut update = StatusUpdate::new(JobStatus::Terminated, now);
        update.terminated_code = Some(terminated_code.unwrap_or(0));
        store.update_status(&job_id, update).await?;

        tracing::info!(job_id = %job_id, user = %self.identity.user_id(), as_admin, "Job canceled");
        self.publish(&job_id, Some(record.status), JobStatus::Terminated, now)
            .await;
        Ok(())
    }

    /// Move a job into estimation, or straight to running when
    /// `skip_estimation` is set or the job is already estimating.
    pub async fn start_job(
        &self,
        job_id: &str,
        skip_estimation: bool,
        as_admin: bool,
    ) -> EngineResult<JobStatus> {
        let job_id = JobId::new(job_id)?;
        self.authorize(&job_id, PermissionLevel::Write, as_admin).await?;

        let store = self.job_store().await?;
        let record = store.get_job(&job_id).await?;
        let next = match record.status {
            JobStatus::Estimating => JobStatus::Running,
            JobStatus::Created | JobStatus::Queued if skip_estimation => JobStatus::Running,
            JobStatus::Created | JobStatus::Queued => JobStatus::Estimating,
            other => {
                return Err(EngineError::validation(format!(
                    "Job {job_id} cannot be started while {other}"
                )));
            }
        };

        let now = now_epoch_seconds();
        store
            .update_status(&job_id, StatusUpdate::new(next, now))
            .await?;
        self.publish(&job_id, Some(record.status), next, now).await;
        Ok(next)
    }

    pub async fn finish_job(
        &self,
        job_id: &str,
        outcome: JobOutcome,
        as_admin: bool,
    ) -> EngineResult<JobStatus> {
        let job_id = JobId::new(job_id)?;
        self.authorize(&job_id, PermissionLevel::Write, as_admin).await?;

        let store = self.job_store().await?;
        let record = store.get_job(&job_id).await?;
        if record.status.is_terminal() {
            return Err(EngineError::validation(format!(
                "Job {job_id} is already finished ({})",
                record.status
            )));
        }

        let now = now_epoch_seconds();
        let (update, failure) = match outcome {
            JobOutcome::Completed { output } => {
                let mut update = StatusUpdate::new(JobStatus::Completed, now);
                update.job_output = Some(output);
                (update, None)
            }
            JobOutcome::Failed {
                message,
                code,
                error,
            } => {
                let mut update = StatusUpdate::new(JobStatus::Error, now);
                update.error_message = Some(message.clone());
                update.terminated_code = code;
                update.job_output = error;
                (update, Some(message))
            }
        };
        let status = update.status;
        store.update_status(&job_id, update).await?;
        self.publish(&job_id, Some(record.status), status, now).await;

        if let Some(message) = failure {
            let alert = format!("Job {job_id} owned by {} failed: {message}", record.user);
            let result = match self.alerts().await {
                Ok(alerts) => alerts.alert(&alert).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to send alert");
            }
        }
        Ok(status)
    }

    /// Fetch a job record, checking read permission unless
    /// `check_permission` is false.
    pub async fn check_job(
        &self,
        job_id: &str,
        check_permission: bool,
        as_admin: bool,
    ) -> EngineResult<JobRecord> {
        let job_id = JobId::new(job_id)?;
        if check_permission {
            self.authorize(&job_id, PermissionLevel::Read, as_admin).await?;
        }
        self.job_store().await?.get_job(&job_id).await
    }

    pub async fn get_job_status_field(&self, job_id: &str, as_admin: bool) -> EngineResult<JobStatus> {
        Ok(self.check_job(job_id, true, as_admin).await?.status)
    }

    /// Fetch several job records, in the order requested.
    pub async fn check_jobs(
        &self,
        job_ids: &[&str],
        check_permission: bool,
        as_admin: bool,
    ) -> EngineResult<Vec<JobRecord>> {
        let mut records = Vec::with_capacity(job_ids.len());
        for job_id in job_ids {
            records.push(self.check_job(job_id, check_permission, as_admin).await?);
        }
        Ok(records)
    }

    pub async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        as_admin: bool,
    ) -> EngineResult<()> {
        let job_id = JobId::new(job_id)?;
        self.authorize(&job_id, PermissionLevel::Write, as_admin).await?;

        let store = self.job_store().await?;
        let previous = store.get_job(&job_id).await?.status;
        let now = now_epoch_seconds();
        store
            .update_status(&job_id, StatusUpdate::new(status, now))
            .await?;
        self.publish(&job_id, Some(previous), status, now).await;
        Ok(())
    }

    /// Whether a job has been canceled.
    ///
    /// Under `as_admin` the read-admin role is sufficient.
    pub async fn check_job_canceled(
        &self,
        job_id: &str,
        as_admin: bool,
    ) -> EngineResult<CancellationStatus> {
        let job_id = JobId::new(job_id)?;
        self.authorize(&job_id, PermissionLevel::Read, as_admin).await?;

        let record = self.job_store().await?.get_job(&job_id).await?;
        Ok(CancellationStatus {
            canceled: record.is_canceled(),
            finished: record.status.is_terminal(),
        })
    }

    /// Jobs created within a date range.
    ///
    /// Listing another user's jobs requires the read-admin role. Both bounds
    /// must normalize; no default time is substituted.
    pub async fn check_jobs_date_range_for_user(
        &self,
        query: DateRangeQuery,
    ) -> EngineResult<Vec<JobRecord>> {
        let created_after = normalize_timestamp(query.creation_start_time, false)?;
        let created_before = normalize_timestamp(query.creation_end_time, false)?;
        if created_after > created_before {
            return Err(EngineError::validation(format!(
                "The start date {created_after} cannot be greater than the end date {created_before}"
            )));
        }

        let caller = self.identity.user_id();
        let user = query.user.unwrap_or_else(|| caller.clone());
        if &user != caller {
            self.authorize_admin(PermissionLevel::Read).await?;
        }

        let filter = JobFilter {
            user,
            created_after,
            created_before,
            limit: query.limit,
            offset: query.offset,
            ascending: query.ascending,
        };
        self.job_store().await?.find_jobs(&filter).await
    }

    async fn publish(
        &self,
        job_id: &JobId,
        previous: Option<JobStatus>,
        status: JobStatus,
        timestamp: f64,
    ) {
        let change = StatusChange {
            job_id: job_id.clone(),
            user: self.identity.user_id().clone(),
            previous,
            status,
            timestamp,
        };
        let result = match self.notifier().await {
            Ok(notifier) => notifier.publish_status_change(&change).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(job_id = %job_id, status = %status, error = %e, "Failed to publish status change");
        }
    }
}
