pub mod error;
pub mod flag;
pub mod id;
pub mod permission;
pub mod time;

pub use error::{CoreError, ErrorCategory, Result};
pub use flag::parse_bool_flag;
pub use id::{CallerId, CallerIdentity, JobId, WorkspaceId};
pub use permission::PermissionLevel;
pub use time::{TimestampInput, from_epoch_seconds, normalize_timestamp, now_epoch_seconds};
