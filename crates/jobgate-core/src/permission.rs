//! Permission levels shared by job-scoped and administrator-scoped checks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Effective access a caller holds on a job, or administrator scope.
///
/// Levels are totally ordered: `None < Read < Write`. A held level
/// satisfies a requested level when it is at least as high.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    #[default]
    None,
    Read,
    Write,
}

impl PermissionLevel {
    /// Returns `true` if this level grants at least `requested`.
    #[must_use]
    pub fn satisfies(self, requested: PermissionLevel) -> bool {
        self >= requested
    }

    /// Parse a single-letter authority code.
    ///
    /// `a` is the workspace-administrator code and grants `Write`.
    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "n" => Ok(Self::None),
            "r" => Ok(Self::Read),
            "w" | "a" => Ok(Self::Write),
            other => Err(CoreError::invalid_permission(other)),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            other => Self::from_code(other),
        }
    }
}
