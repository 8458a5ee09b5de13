//! Session state around the decision core.
//!
//! The engine itself is stateless per call; the session owns the loaded
//! [`PermissionSet`] and the load lifecycle. While the set is not loaded,
//! decisions are deferred (an error the caller must surface), never
//! defaulted to Allow or Deny; a failed load is *not* the same thing as an
//! empty set.

use thiserror::Error;

use navguard_core::{TenantId, UserId};

use crate::grants::PermissionSet;
use crate::roles::Role;

/// Monotonic fetch token: a permission load superseded by a newer
/// `begin_load` must have its result discarded (last-issued-wins, never
/// last-completed-wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadToken(u64);

/// Load lifecycle of the session's permission set.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// Not yet fetched (or invalidated); all decisions defer.
    Loading,
    /// Snapshot available; decisions are computed.
    Ready(PermissionSet),
    /// The latest fetch failed; decisions still defer.
    LoadFailed,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("permission set is still loading")]
    PermissionsLoading,

    #[error("permission set failed to load")]
    PermissionsUnavailable,
}

/// Everything the engine reads for one decision, captured at a point in
/// time. Concurrent decisions against the same snapshot see the same
/// immutable permission set.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub role: Option<Role>,
    pub permissions: PermissionSet,
}

/// Per-user session owning the permission-set lifecycle.
///
/// Created on login / role-load, discarded on logout; a tenant switch
/// resets it wholesale. The permission set is exclusively replaced through
/// `begin_load` / `complete_load`; there is no partial merge.
#[derive(Debug)]
pub struct AccessSession {
    user_id: UserId,
    tenant_id: TenantId,
    role: Option<Role>,
    state: SessionState,
    issued: u64,
}

impl AccessSession {
    pub fn new(user_id: UserId, tenant_id: TenantId, role: Option<Role>) -> Self {
        Self {
            user_id,
            tenant_id,
            role,
            state: SessionState::Loading,
            issued: 0,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Issue the next fetch token. Any older in-flight fetch is superseded
    /// from this point on.
    pub fn begin_load(&mut self) -> LoadToken {
        self.issued += 1;
        LoadToken(self.issued)
    }

    fn is_current(&self, token: LoadToken) -> bool {
        token.0 == self.issued
    }

    /// Apply a completed fetch. Returns `false` (and discards the result)
    /// when the token has been superseded by a newer `begin_load`.
    pub fn complete_load(&mut self, token: LoadToken, permissions: PermissionSet) -> bool {
        if !self.is_current(token) {
            return false;
        }
        self.state = SessionState::Ready(permissions);
        true
    }

    /// Record a failed fetch. Only the latest token may transition the
    /// session into `LoadFailed`; stale failures are ignored.
    pub fn fail_load(&mut self, token: LoadToken) -> bool {
        if !self.is_current(token) {
            return false;
        }
        self.state = SessionState::LoadFailed;
        true
    }

    /// Drop the loaded set and defer decisions until the next reload
    /// (used when an external sync touches this user's grants).
    pub fn invalidate(&mut self) {
        self.state = SessionState::Loading;
    }

    /// Switch the session to another tenant: the old snapshot and role are
    /// discarded, and any in-flight fetch is superseded.
    pub fn switch_tenant(&mut self, tenant_id: TenantId, role: Option<Role>) {
        self.tenant_id = tenant_id;
        self.role = role;
        self.state = SessionState::Loading;
        self.issued += 1;
    }

    /// Capture the engine input, or defer while the set is not loaded.
    pub fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        match &self.state {
            SessionState::Ready(permissions) => Ok(SessionSnapshot {
                user_id: self.user_id,
                tenant_id: self.tenant_id,
                role: self.role,
                permissions: permissions.clone(),
            }),
            SessionState::Loading => Err(SessionError::PermissionsLoading),
            SessionState::LoadFailed => Err(SessionError::PermissionsUnavailable),
        }
    }
}
