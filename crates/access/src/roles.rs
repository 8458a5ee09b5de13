//! Role model and per-tenant role assignment.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use navguard_core::{DomainError, DomainResult, TenantId, UserId};

/// Closed role set.
///
/// Deliberately a tagged variant rather than an opaque string: adding a role
/// forces every decision site to be revisited by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Bypasses every check; owns its own tenant and administers others.
    Superadmin,
    /// Tenant operator whose access is gated by per-resource grants.
    Admin,
    /// Coarse role-gated tier with no dynamic-permission capability
    /// (e.g. sales staff confined to their area).
    Restricted,
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Role::Superadmin => write!(f, "superadmin"),
            Role::Admin => write!(f, "admin"),
            Role::Restricted => write!(f, "restricted"),
        }
    }
}

/// Per-tenant role assignments.
///
/// # Invariants
/// - A non-superadmin user holds exactly one `(tenant, role)` pair;
///   re-assigning (same tenant or another) replaces the previous pair.
/// - A superadmin's tenant id equals its own user id (a superadmin owns its
///   own tenant); assignment under any other tenant is rejected.
#[derive(Debug, Default)]
pub struct RoleRegistry {
    inner: RwLock<HashMap<UserId, (TenantId, Role)>>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign (or replace) a user's role within a tenant.
    pub fn assign(&self, tenant_id: TenantId, user_id: UserId, role: Role) -> DomainResult<()> {
        if role == Role::Superadmin && !user_id.owns_tenant(tenant_id) {
            return Err(DomainError::invariant(
                "superadmin must be assigned under its own tenant",
            ));
        }

        let mut map = self
            .inner
            .write()
            .map_err(|_| DomainError::invariant("role registry poisoned"))?;
        map.insert(user_id, (tenant_id, role));
        Ok(())
    }

    /// Resolve a user's role within a tenant context.
    ///
    /// `None` means authenticated-but-unprovisioned (the pending state).
    /// A superadmin resolves in *any* tenant context: its record lives under
    /// its own tenant, which is what lets it administer other tenants.
    pub fn role_of(&self, tenant_id: TenantId, user_id: UserId) -> Option<Role> {
        let map = self.inner.read().ok()?;
        let (assigned_tenant, role) = map.get(&user_id)?;

        match role {
            Role::Superadmin => Some(Role::Superadmin),
            _ if *assigned_tenant == tenant_id => Some(*role),
            _ => None,
        }
    }

    /// Remove a user's assignment (de-provisioning).
    pub fn remove(&self, user_id: UserId) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&user_id);
        }
    }
}
