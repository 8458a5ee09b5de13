//! `navguard-access` — multi-tenant navigational authorization resolver.
//!
//! This crate is the decision core: given a user, a tenant, and a requested
//! path or resource key, it answers Allow / Deny(reason) / Redirect. It is
//! intentionally decoupled from HTTP and storage; the only seams are the
//! [`PermissionStore`] trait and the immutable configuration loaded once at
//! startup.

pub mod config;
pub mod engine;
pub mod grants;
pub mod hierarchy;
pub mod roles;
pub mod routes;
pub mod session;

pub use config::{AccessConfig, ConfigError};
pub use engine::{
    AccessEngine, AccessTarget, CascadePolicy, Decision, DenyReason, RoleAllowList, Route,
};
pub use grants::{InMemoryPermissionStore, PermissionGrant, PermissionSet, PermissionStore};
pub use hierarchy::{ResourceHierarchy, ResourceKey, ResourceNode};
pub use roles::{Role, RoleRegistry};
pub use session::{AccessSession, LoadToken, SessionError, SessionSnapshot, SessionState};
