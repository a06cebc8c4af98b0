//! Permission resolvers.
//!
//! Both resolvers follow the same read-through shape: consult the cache,
//! and on a miss ask the external authority (bounded by a timeout), store
//! the answer and return it. The insert only happens after a successful
//! answer, so an abandoned or failed call leaves no entry behind.

mod admin;
mod job;

pub use admin::{AdminRoleResolver, AdminRoles};
pub use job::JobPermissionResolver;
