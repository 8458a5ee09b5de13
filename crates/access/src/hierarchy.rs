//! Resource taxonomy: an immutable, single-rooted tree of protected areas.
//!
//! The hierarchy is process-wide configuration, built once at startup and
//! never mutated afterwards. All traversal helpers are pure.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use navguard_core::{DomainError, DomainResult};

use crate::config::ConfigError;

/// Stable identifier for a protected area of functionality
/// (e.g. `"page:ledger"`), independent of its URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(Cow<'static, str>);

impl ResourceKey {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One node of the resource taxonomy, as declared in configuration.
///
/// Declaration order of sibling nodes defines child ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub key: ResourceKey,
    pub label: String,
    pub parent: Option<ResourceKey>,
}

#[derive(Debug, Clone)]
struct NodeEntry {
    parent: Option<ResourceKey>,
    children: Vec<ResourceKey>,
}

/// Immutable, single-rooted resource tree.
///
/// # Invariants (checked at construction)
/// - `key` is globally unique across the tree.
/// - Every declared parent exists.
/// - Exactly one root (node without a parent).
/// - No cycles: every node reaches the root by following parents.
#[derive(Debug, Clone)]
pub struct ResourceHierarchy {
    root: ResourceKey,
    nodes: HashMap<ResourceKey, NodeEntry>,
}

impl ResourceHierarchy {
    /// Build the tree from declared nodes, validating every invariant.
    ///
    /// Any violation is a fatal configuration error: the process must not
    /// start with a malformed taxonomy.
    pub fn from_nodes(declared: &[ResourceNode]) -> Result<Self, ConfigError> {
        if declared.is_empty() {
            return Err(ConfigError::EmptyHierarchy);
        }

        let mut nodes: HashMap<ResourceKey, NodeEntry> = HashMap::with_capacity(declared.len());
        let mut roots: Vec<ResourceKey> = Vec::new();

        for node in declared {
            if nodes.contains_key(&node.key) {
                return Err(ConfigError::DuplicateResourceKey(node.key.to_string()));
            }
            nodes.insert(
                node.key.clone(),
                NodeEntry {
                    parent: node.parent.clone(),
                    children: Vec::new(),
                },
            );
            if node.parent.is_none() {
                roots.push(node.key.clone());
            }
        }

        // Wire children in declaration order; every parent must exist.
        for node in declared {
            if let Some(parent) = &node.parent {
                match nodes.get_mut(parent) {
                    Some(entry) => entry.children.push(node.key.clone()),
                    None => {
                        return Err(ConfigError::UnknownParent {
                            key: node.key.to_string(),
                            parent: parent.to_string(),
                        });
                    }
                }
            }
        }

        let root = match roots.as_slice() {
            [single] => single.clone(),
            _ => return Err(ConfigError::RootCount(roots.len())),
        };

        let hierarchy = Self { root, nodes };

        // Every node must be reachable from the root; an unreachable node
        // sits on a parent cycle.
        let reachable = hierarchy.reachable_from_root();
        if let Some(offender) = hierarchy.nodes.keys().find(|k| !reachable.contains(*k)) {
            return Err(ConfigError::CycleDetected(offender.to_string()));
        }

        Ok(hierarchy)
    }

    fn reachable_from_root(&self) -> BTreeSet<ResourceKey> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![self.root.clone()];
        while let Some(key) = stack.pop() {
            if !seen.insert(key.clone()) {
                continue;
            }
            if let Some(entry) = self.nodes.get(&key) {
                stack.extend(entry.children.iter().cloned());
            }
        }
        seen
    }

    pub fn root(&self) -> &ResourceKey {
        &self.root
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Every key in the tree.
    pub fn all_keys(&self) -> BTreeSet<ResourceKey> {
        self.nodes.keys().cloned().collect()
    }

    /// Direct children of `key`, in declaration order.
    pub fn child_keys(&self, key: &ResourceKey) -> DomainResult<&[ResourceKey]> {
        self.nodes
            .get(key)
            .map(|entry| entry.children.as_slice())
            .ok_or(DomainError::NotFound)
    }

    /// Ancestor chain starting at `key` itself and ending at the root.
    pub fn ancestors(&self, key: &ResourceKey) -> DomainResult<Vec<ResourceKey>> {
        let mut entry = self.nodes.get(key).ok_or(DomainError::NotFound)?;
        let mut chain = vec![key.clone()];

        while let Some(parent) = &entry.parent {
            chain.push(parent.clone());
            // Parent existence is a construction invariant.
            match self.nodes.get(parent) {
                Some(next) => entry = next,
                None => break,
            }
        }

        Ok(chain)
    }
}
