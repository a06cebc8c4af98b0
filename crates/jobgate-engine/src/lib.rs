//! # jobgate-engine
//!
//! Request context and job-lifecycle orchestration.
//!
//! Every lifecycle operation runs through the authorization gate before
//! reaching its collaborator (job store, scheduler, log store, notifier,
//! alerts). Collaborator handles are constructed lazily, once per
//! [`RequestContext`].

pub mod bootstrap;
pub mod collaborators;
pub mod config;
pub mod consistency;
pub mod context;
pub mod error;
pub mod model;
pub mod observability;

pub use bootstrap::{Gateway, bootstrap};
pub use collaborators::{
    AlertChannel, CollaboratorFactory, EventNotifier, JobStoreClient, LogStoreClient,
    LoggingAlerts, LoggingNotifier, SchedulerClient,
};
pub use config::{EngineConfig, LoggingConfig, ServicesConfig};
pub use consistency::{FinishTimeReport, check_finish_times};
pub use context::{Handle, HandleKind, RequestContext};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use model::{
    CancellationStatus, DateRangeQuery, JobFilter, JobOutcome, JobRecord, JobStatus, LogLine,
    LogPage, StatusChange, StatusUpdate,
};
pub use observability::{apply_logging_level, init_tracing};
