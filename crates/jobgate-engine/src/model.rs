//! Job records and the values exchanged with the lifecycle collaborators.

use std::fmt;
use std::str::FromStr;

use jobgate_core::{CallerId, CoreError, JobId, TimestampInput, WorkspaceId};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Created,
    Queued,
    Estimating,
    Running,
    Completed,
    Error,
    Terminated,
}

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        Self::Created,
        Self::Queued,
        Self::Estimating,
        Self::Running,
        Self::Completed,
        Self::Error,
        Self::Terminated,
    ];

    /// Statuses a job never leaves.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Terminated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Queued => "queued",
            Self::Estimating => "estimating",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::validation(format!("'{s}' is not a valid job status")))
    }
}

/// Read-only view of a stored job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub user: CallerId,
    #[serde(default)]
    pub wsid: Option<WorkspaceId>,
    pub status: JobStatus,
    #[serde(default)]
    pub created: Option<f64>,
    #[serde(default)]
    pub queued: Option<f64>,
    #[serde(default)]
    pub running: Option<f64>,
    #[serde(default)]
    pub finished: Option<f64>,
    #[serde(default)]
    pub job_input: serde_json::Value,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub terminated_code: Option<i32>,
}

impl JobRecord {
    /// A freshly created job owned by `user`.
    pub fn new(job_id: JobId, user: CallerId, created: f64) -> Self {
        Self {
            job_id,
            user,
            wsid: None,
            status: JobStatus::Created,
            created: Some(created),
            queued: None,
            running: None,
            finished: None,
            job_input: serde_json::Value::Null,
            error_message: None,
            terminated_code: None,
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.status == JobStatus::Terminated
    }
}

/// Status change written to the job store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusUpdate {
    pub status: JobStatus,
    /// Epoch seconds at which the job entered `status`.
    pub timestamp: f64,
    pub error_message: Option<String>,
    pub terminated_code: Option<i32>,
    pub job_output: Option<serde_json::Value>,
}

impl StatusUpdate {
    pub fn new(status: JobStatus, timestamp: f64) -> Self {
        Self {
            status,
            timestamp,
            error_message: None,
            terminated_code: None,
            job_output: None,
        }
    }
}

/// Status change event published after a successful update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub job_id: JobId,
    pub user: CallerId,
    pub previous: Option<JobStatus>,
    pub status: JobStatus,
    pub timestamp: f64,
}

/// How a job ended, reported through `finish_job`.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed {
        output: serde_json::Value,
    },
    Failed {
        message: String,
        code: Option<i32>,
        error: Option<serde_json::Value>,
    },
}

/// A single log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub line: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub ts: Option<f64>,
}

impl LogLine {
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            is_error: false,
            ts: None,
        }
    }
}

/// A page of stored log lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogPage {
    pub lines: Vec<LogLine>,
    /// Number of the last line returned, counting from 1.
    pub last_line_number: usize,
}

/// Cancellation state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CancellationStatus {
    pub canceled: bool,
    pub finished: bool,
}

/// Caller-side date-range query over jobs.
#[derive(Debug, Clone)]
pub struct DateRangeQuery {
    pub creation_start_time: TimestampInput,
    pub creation_end_time: TimestampInput,
    /// Owner whose jobs are listed. `None` means the caller.
    pub user: Option<CallerId>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub ascending: bool,
}

impl DateRangeQuery {
    pub fn new(start: impl Into<TimestampInput>, end: impl Into<TimestampInput>) -> Self {
        Self {
            creation_start_time: start.into(),
            creation_end_time: end.into(),
            user: None,
            limit: None,
            offset: None,
            ascending: true,
        }
    }

    pub fn for_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(CallerId::new(user));
        self
    }
}

/// Normalized filter handed to the job store.
#[derive(Debug, Clone, PartialEq)]
pub struct JobFilter {
    pub user: CallerId,
    /// Inclusive lower bound on `created`, epoch seconds.
    pub created_after: f64,
    /// Inclusive upper bound on `created`, epoch seconds.
    pub created_before: f64,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub ascending: bool,
}

impl JobFilter {
    pub fn matches(&self, record: &JobRecord) -> bool {
        record.user == self.user
            && record
                .created
                .is_some_and(|c| c >= self.created_after && c <= self.created_before)
    }
}
