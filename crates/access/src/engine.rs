//! The access-decision core.
//!
//! `decide` is a pure function over immutable configuration (hierarchy,
//! route table, allow-list) and a caller-supplied session snapshot. Its
//! output is plain data; the router layer interprets it and performs the
//! actual navigation.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::grants::PermissionSet;
use crate::hierarchy::{ResourceHierarchy, ResourceKey};
use crate::roles::Role;
use crate::routes::RouteTable;
use crate::session::SessionSnapshot;

/// A navigational route target (redirects only; never interpreted here).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route(Cow<'static, str>);

impl Route {
    pub fn new(path: impl Into<Cow<'static, str>>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Route {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a request was denied. The reason code, not a UI string, is the
/// contract; each code maps to exactly one user-facing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Authenticated but not yet provisioned with a role.
    PendingRole,
    /// Explicitly denied (or simply not granted) this one resource.
    AccessDenied,
    /// Admin holds zero grants in total: nothing configured yet, which is
    /// a different remedy than an explicit per-resource denial.
    ContactSuperadmin,
    /// Caller bug (e.g. unknown resource key); logged, never a panic.
    InternalError,
}

/// Outcome of one access decision, as pure data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny { reason: DenyReason },
    Redirect { to: Route },
}

impl Decision {
    pub fn deny(reason: DenyReason) -> Self {
        Self::Deny { reason }
    }

    pub fn redirect(to: Route) -> Self {
        Self::Redirect { to }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// What the caller wants to reach: a raw path (resolved through the route
/// table) or an explicit resource key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessTarget<'a> {
    Path(&'a str),
    Resource(ResourceKey),
}

/// Whether an ancestor grant reaches down to descendant resources.
///
/// `Explicit` (the default) requires a grant row per resource key. Under
/// `Inherit`, a key without its own record takes the nearest explicit
/// ancestor record. An explicit descendant record beats any ancestor, so
/// conflicting grants up and down one branch stay well-defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadePolicy {
    #[default]
    Explicit,
    Inherit,
}

/// Coarse role gate per resource: which roles may enter an area at all.
///
/// Only consulted for [`Role::Restricted`]; a mapped area without an entry
/// admits no restricted users.
#[derive(Debug, Clone, Default)]
pub struct RoleAllowList {
    inner: HashMap<ResourceKey, BTreeSet<Role>>,
}

impl RoleAllowList {
    pub fn new(entries: impl IntoIterator<Item = (ResourceKey, BTreeSet<Role>)>) -> Self {
        Self {
            inner: entries.into_iter().collect(),
        }
    }

    pub fn permits(&self, key: &ResourceKey, role: Role) -> bool {
        self.inner
            .get(key)
            .is_some_and(|roles| roles.contains(&role))
    }
}

/// Composes hierarchy, route table, role rules and the session snapshot
/// into a single deterministic decision per request.
#[derive(Debug)]
pub struct AccessEngine {
    hierarchy: ResourceHierarchy,
    routes: RouteTable,
    allow_list: RoleAllowList,
    cascade: CascadePolicy,
    landing_route: Route,
    pending_route: Route,
}

impl AccessEngine {
    pub fn new(
        hierarchy: ResourceHierarchy,
        routes: RouteTable,
        allow_list: RoleAllowList,
        cascade: CascadePolicy,
        landing_route: Route,
        pending_route: Route,
    ) -> Self {
        Self {
            hierarchy,
            routes,
            allow_list,
            cascade,
            landing_route,
            pending_route,
        }
    }

    pub fn hierarchy(&self) -> &ResourceHierarchy {
        &self.hierarchy
    }

    pub fn cascade(&self) -> CascadePolicy {
        self.cascade
    }

    /// Where the router sends a restricted user bounced off an area.
    pub fn landing_route(&self) -> &Route {
        &self.landing_route
    }

    /// Where the router sends an authenticated-but-unprovisioned user.
    pub fn pending_route(&self) -> &Route {
        &self.pending_route
    }

    /// Router-guard helper: resource key for a path, if any.
    pub fn resolve(&self, path: &str) -> Option<&ResourceKey> {
        self.routes.resolve(path)
    }

    /// Decide access for one navigation, in strict precedence order.
    pub fn decide(&self, session: &SessionSnapshot, target: AccessTarget<'_>) -> Decision {
        // 1. Authenticated but not provisioned.
        let Some(role) = session.role else {
            return Decision::deny(DenyReason::PendingRole);
        };

        match role {
            // 2. Superadmin bypasses everything, including mapping failures.
            Role::Superadmin => Decision::Allow,

            // 3. Coarse tier: role gate only, expressed as a navigation
            //    redirect rather than a security denial.
            Role::Restricted => {
                let resource = match self.resolve_target(&target) {
                    Ok(resource) => resource,
                    Err(decision) => return decision,
                };
                match resource {
                    Some(key) if !self.allow_list.permits(&key, Role::Restricted) => {
                        Decision::redirect(self.landing_route.clone())
                    }
                    // Unmapped targets carry no resource gate.
                    _ => Decision::Allow,
                }
            }

            Role::Admin => {
                let resource = match self.resolve_target(&target) {
                    Ok(resource) => resource,
                    Err(decision) => return decision,
                };

                // 4. Unmapped areas are role-gated only.
                let Some(key) = resource else {
                    return Decision::Allow;
                };

                // 5. Nothing configured yet is not the same as an explicit
                //    denial: the remedy differs (ask the superadmin).
                if session.permissions.is_empty() {
                    return Decision::deny(DenyReason::ContactSuperadmin);
                }

                // 6. Explicit grant check (with optional cascade).
                match self.effective_grant(&session.permissions, &key) {
                    Some(true) => Decision::Allow,
                    Some(false) | None => Decision::deny(DenyReason::AccessDenied),
                }
            }
        }
    }

    /// Resolve the target to an optional resource gate.
    ///
    /// `Err` carries the ready-made decision for a caller bug: an explicit
    /// resource key that is not part of the taxonomy.
    fn resolve_target(&self, target: &AccessTarget<'_>) -> Result<Option<ResourceKey>, Decision> {
        match target {
            AccessTarget::Path(path) => Ok(self.routes.resolve(path).cloned()),
            AccessTarget::Resource(key) => {
                if self.hierarchy.contains(key) {
                    Ok(Some(key.clone()))
                } else {
                    tracing::warn!(resource = %key, "decision requested for unknown resource key");
                    Err(Decision::deny(DenyReason::InternalError))
                }
            }
        }
    }

    /// Grant value governing `key` under the configured cascade policy.
    fn effective_grant(&self, permissions: &PermissionSet, key: &ResourceKey) -> Option<bool> {
        match self.cascade {
            CascadePolicy::Explicit => permissions.lookup(key),
            CascadePolicy::Inherit => {
                // ancestors() starts at the key itself, so the nearest
                // explicit record wins.
                let chain = self.hierarchy.ancestors(key).ok()?;
                chain.iter().find_map(|k| permissions.lookup(k))
            }
        }
    }
}
