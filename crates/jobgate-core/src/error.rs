use thiserror::Error;

/// Core error types for jobgate operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid job id: {0}")]
    InvalidJobId(String),

    #[error("Invalid permission level: {0}")]
    InvalidPermission(String),

    #[error("Not a boolean value: {0}")]
    InvalidBoolean(String),

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Cannot convert time input into timestamp: {input} ({reason})")]
    Normalization { input: String, reason: String },
}

impl CoreError {
    /// Create a new InvalidJobId error
    pub fn invalid_job_id(message: impl Into<String>) -> Self {
        Self::InvalidJobId(message.into())
    }

    /// Create a new InvalidPermission error
    pub fn invalid_permission(value: impl Into<String>) -> Self {
        Self::InvalidPermission(value.into())
    }

    /// Create a new InvalidBoolean error
    pub fn invalid_boolean(value: impl Into<String>) -> Self {
        Self::InvalidBoolean(value.into())
    }

    /// Create a new Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new Normalization error carrying the offending input
    pub fn normalization(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Normalization {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// The offending input of a normalization failure, if this is one
    pub fn offending_input(&self) -> Option<&str> {
        match self {
            Self::Normalization { input, .. } => Some(input),
            _ => None,
        }
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidJobId(_)
            | Self::InvalidPermission(_)
            | Self::InvalidBoolean(_)
            | Self::Validation { .. } => ErrorCategory::Validation,
            Self::Normalization { .. } => ErrorCategory::Normalization,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Normalization,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Normalization => write!(f, "normalization"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
