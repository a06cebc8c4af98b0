//! Engine error types.
//!
//! Errors from the authorization layer and the core types pass through
//! unchanged; [`EngineError::kind`] flattens every variant onto the error
//! kinds callers surface.

use std::fmt;

use jobgate_auth::AuthError;
use jobgate_core::{CoreError, ErrorCategory as CoreCategory, JobId};

/// Errors raised by the request context and the job-lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Authorization failure, including not-found and authority outages.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Invalid identifier, flag or timestamp.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An out-of-scope subsystem (scheduler, log store, notifier...) failed.
    #[error("{subsystem} error: {message}")]
    Collaborator {
        /// Subsystem that reported the failure.
        subsystem: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl EngineError {
    #[must_use]
    pub fn collaborator(subsystem: &'static str, message: impl Into<String>) -> Self {
        Self::Collaborator {
            subsystem,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Job store error for an unknown job.
    #[must_use]
    pub fn job_not_found(job_id: &JobId) -> Self {
        Self::Auth(AuthError::not_found(format!("Job {job_id} not found")))
    }

    /// Invalid request input.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Core(CoreError::validation(message))
    }

    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(err) => match err {
                AuthError::Validation { .. } => ErrorKind::Validation,
                AuthError::Forbidden { .. } => ErrorKind::Authorization,
                AuthError::NotFound { .. } => ErrorKind::NotFound,
                AuthError::AuthorityUnavailable { .. } => ErrorKind::AuthorityUnavailable,
                AuthError::Configuration { .. } => ErrorKind::Configuration,
                AuthError::Internal { .. } => ErrorKind::Internal,
            },
            Self::Core(err) => match err.category() {
                CoreCategory::Validation => ErrorKind::Validation,
                CoreCategory::Normalization => ErrorKind::Normalization,
            },
            Self::Collaborator { .. } => ErrorKind::Collaborator,
            Self::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// Returns `true` if the caller may reasonably retry the request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::AuthorityUnavailable | ErrorKind::Collaborator
        )
    }
}

/// Kinds of errors surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    AuthorityUnavailable,
    Normalization,
    Collaborator,
    Configuration,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Authorization => "authorization",
            Self::NotFound => "not_found",
            Self::AuthorityUnavailable => "authority_unavailable",
            Self::Normalization => "normalization",
            Self::Collaborator => "collaborator",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Type alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;
