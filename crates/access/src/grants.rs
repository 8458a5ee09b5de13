//! Per-tenant, per-user permission grants and their session snapshot.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use navguard_core::{TenantId, UserId};

use crate::hierarchy::ResourceKey;

/// An explicit allow/deny record for one user, one tenant, one resource key.
///
/// At most one record exists per `(tenant, user, resource_key)` triple.
/// Absence of a record means "not explicitly granted", which is distinct
/// from `allowed: false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub resource_key: ResourceKey,
    pub allowed: bool,
}

/// Materialized snapshot of one user's grants for the active session.
///
/// The snapshot is copy-on-write: a sync replaces the whole underlying map,
/// so a reader holding an older snapshot keeps a consistent view and never
/// observes a half-replaced set.
#[derive(Debug, Clone)]
pub struct PermissionSet {
    grants: Arc<HashMap<ResourceKey, bool>>,
    loaded_at: DateTime<Utc>,
}

impl PermissionSet {
    pub fn new(
        grants: impl IntoIterator<Item = (ResourceKey, bool)>,
        loaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            grants: Arc::new(grants.into_iter().collect()),
            loaded_at,
        }
    }

    /// Materialize a snapshot from store records (read-all-for-user).
    pub fn from_grants(grants: &[PermissionGrant], loaded_at: DateTime<Utc>) -> Self {
        Self::new(
            grants
                .iter()
                .map(|g| (g.resource_key.clone(), g.allowed)),
            loaded_at,
        )
    }

    /// Explicit grant value for `key`; `None` means no record.
    pub fn lookup(&self, key: &ResourceKey) -> Option<bool> {
        self.grants.get(key).copied()
    }

    /// Whether the user holds zero grants in total (allow or deny).
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

/// Storage seam for permission grants, keyed by `(tenant, user, resource)`.
///
/// The persistence mechanics behind this trait are an external concern; the
/// workspace ships [`InMemoryPermissionStore`] for tests/dev and single-node
/// deployments.
pub trait PermissionStore: Send + Sync {
    /// Upsert one grant record.
    fn grant(&self, tenant_id: TenantId, user_id: UserId, resource_key: ResourceKey, allowed: bool);

    /// Explicit grant value, or `None` when no record exists.
    fn is_granted(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        resource_key: &ResourceKey,
    ) -> Option<bool>;

    /// Whether the user holds at least one grant record in the tenant.
    fn has_any_grants(&self, tenant_id: TenantId, user_id: UserId) -> bool;

    /// Replace the user's entire grant set atomically (last-writer-wins,
    /// no partial merge). Readers observe either the old set or the new
    /// one, never a mixture.
    fn sync_all(&self, tenant_id: TenantId, user_id: UserId, grants: Vec<(ResourceKey, bool)>);

    /// Read all records for a user (snapshot materialization).
    fn list(&self, tenant_id: TenantId, user_id: UserId) -> Vec<PermissionGrant>;
}

impl<S> PermissionStore for Arc<S>
where
    S: PermissionStore + ?Sized,
{
    fn grant(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        resource_key: ResourceKey,
        allowed: bool,
    ) {
        (**self).grant(tenant_id, user_id, resource_key, allowed)
    }

    fn is_granted(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        resource_key: &ResourceKey,
    ) -> Option<bool> {
        (**self).is_granted(tenant_id, user_id, resource_key)
    }

    fn has_any_grants(&self, tenant_id: TenantId, user_id: UserId) -> bool {
        (**self).has_any_grants(tenant_id, user_id)
    }

    fn sync_all(&self, tenant_id: TenantId, user_id: UserId, grants: Vec<(ResourceKey, bool)>) {
        (**self).sync_all(tenant_id, user_id, grants)
    }

    fn list(&self, tenant_id: TenantId, user_id: UserId) -> Vec<PermissionGrant> {
        (**self).list(tenant_id, user_id)
    }
}

/// In-memory grant store for tests/dev and single-node deployments.
///
/// Each user's set is held behind its own `Arc`; mutation builds a
/// replacement map and swaps the `Arc`, so concurrent readers keep whichever
/// complete set they started with.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    inner: RwLock<HashMap<(TenantId, UserId), Arc<HashMap<ResourceKey, bool>>>>,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn user_set(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Option<Arc<HashMap<ResourceKey, bool>>> {
        let map = self.inner.read().ok()?;
        map.get(&(tenant_id, user_id)).cloned()
    }
}

impl PermissionStore for InMemoryPermissionStore {
    fn grant(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        resource_key: ResourceKey,
        allowed: bool,
    ) {
        if let Ok(mut map) = self.inner.write() {
            let entry = map.entry((tenant_id, user_id)).or_default();
            // Copy-on-write: a reader holding the old Arc keeps its view.
            Arc::make_mut(entry).insert(resource_key, allowed);
        }
    }

    fn is_granted(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        resource_key: &ResourceKey,
    ) -> Option<bool> {
        self.user_set(tenant_id, user_id)?
            .get(resource_key)
            .copied()
    }

    fn has_any_grants(&self, tenant_id: TenantId, user_id: UserId) -> bool {
        self.user_set(tenant_id, user_id)
            .is_some_and(|set| !set.is_empty())
    }

    fn sync_all(&self, tenant_id: TenantId, user_id: UserId, grants: Vec<(ResourceKey, bool)>) {
        // Build the replacement off-lock; the swap itself is the only write.
        let next: Arc<HashMap<ResourceKey, bool>> = Arc::new(grants.into_iter().collect());
        if let Ok(mut map) = self.inner.write() {
            map.insert((tenant_id, user_id), next);
        }
    }

    fn list(&self, tenant_id: TenantId, user_id: UserId) -> Vec<PermissionGrant> {
        let Some(set) = self.user_set(tenant_id, user_id) else {
            return Vec::new();
        };

        let mut grants: Vec<PermissionGrant> = set
            .iter()
            .map(|(key, &allowed)| PermissionGrant {
                tenant_id,
                user_id,
                resource_key: key.clone(),
                allowed,
            })
            .collect();
        grants.sort_by(|a, b| a.resource_key.cmp(&b.resource_key));
        grants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(name: &'static str) -> ResourceKey {
        ResourceKey::new(name)
    }

    #[test]
    fn absent_record_is_undefined_not_false() {
        let store = InMemoryPermissionStore::new();
        let (tenant, user) = (TenantId::new(), UserId::new());

        assert_eq!(store.is_granted(tenant, user, &key("page:ledger")), None);

        store.grant(tenant, user, key("page:ledger"), false);
        assert_eq!(
            store.is_granted(tenant, user, &key("page:ledger")),
            Some(false)
        );
    }

    #[test]
    fn grant_upserts_single_record_per_triple() {
        let store = InMemoryPermissionStore::new();
        let (tenant, user) = (TenantId::new(), UserId::new());

        store.grant(tenant, user, key("page:ledger"), false);
        store.grant(tenant, user, key("page:ledger"), true);

        assert_eq!(
            store.is_granted(tenant, user, &key("page:ledger")),
            Some(true)
        );
        assert_eq!(store.list(tenant, user).len(), 1);
    }

    #[test]
    fn sync_all_replaces_wholesale() {
        let store = InMemoryPermissionStore::new();
        let (tenant, user) = (TenantId::new(), UserId::new());

        store.grant(tenant, user, key("page:ledger"), true);
        store.sync_all(tenant, user, vec![(key("page:parties"), true)]);

        // The old record is gone, not merged.
        assert_eq!(store.is_granted(tenant, user, &key("page:ledger")), None);
        assert_eq!(
            store.is_granted(tenant, user, &key("page:parties")),
            Some(true)
        );
    }

    #[test]
    fn has_any_grants_reflects_record_count_not_values() {
        let store = InMemoryPermissionStore::new();
        let (tenant, user) = (TenantId::new(), UserId::new());

        assert!(!store.has_any_grants(tenant, user));

        // An explicit deny still counts as a configured grant record.
        store.grant(tenant, user, key("page:ledger"), false);
        assert!(store.has_any_grants(tenant, user));

        store.sync_all(tenant, user, Vec::new());
        assert!(!store.has_any_grants(tenant, user));
    }

    #[test]
    fn grants_are_tenant_isolated() {
        let store = InMemoryPermissionStore::new();
        let user = UserId::new();
        let (tenant_a, tenant_b) = (TenantId::new(), TenantId::new());

        store.grant(tenant_a, user, key("page:ledger"), true);

        assert_eq!(store.is_granted(tenant_b, user, &key("page:ledger")), None);
        assert!(!store.has_any_grants(tenant_b, user));
    }

    #[test]
    fn snapshot_survives_later_sync() {
        let store = InMemoryPermissionStore::new();
        let (tenant, user) = (TenantId::new(), UserId::new());

        store.sync_all(tenant, user, vec![(key("page:ledger"), true)]);
        let snapshot = PermissionSet::from_grants(&store.list(tenant, user), Utc::now());

        store.sync_all(tenant, user, vec![(key("page:ledger"), false)]);

        // The session's snapshot is copy-on-write: unchanged until reload.
        assert_eq!(snapshot.lookup(&key("page:ledger")), Some(true));
        assert_eq!(
            store.is_granted(tenant, user, &key("page:ledger")),
            Some(false)
        );
    }

    proptest! {
        /// Round-trip: after `sync_all`, `is_granted` returns exactly the
        /// synced values and `None` for everything else.
        #[test]
        fn sync_round_trips(values in prop::collection::btree_map("[a-z]{1,8}", any::<bool>(), 0..16)) {
            let store = InMemoryPermissionStore::new();
            let (tenant, user) = (TenantId::new(), UserId::new());

            let grants: Vec<(ResourceKey, bool)> = values
                .iter()
                .map(|(name, &allowed)| (ResourceKey::new(name.clone()), allowed))
                .collect();

            store.sync_all(tenant, user, grants.clone());

            for (k, allowed) in &grants {
                prop_assert_eq!(store.is_granted(tenant, user, k), Some(*allowed));
            }
            prop_assert_eq!(store.is_granted(tenant, user, &ResourceKey::new("never-synced")), None);

            // Idempotence: a second identical sync changes nothing.
            store.sync_all(tenant, user, grants.clone());
            for (k, allowed) in &grants {
                prop_assert_eq!(store.is_granted(tenant, user, k), Some(*allowed));
            }
            prop_assert_eq!(store.list(tenant, user).len(), grants.len());
        }
    }
}
