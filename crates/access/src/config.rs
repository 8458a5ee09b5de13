//! Startup configuration: the resource taxonomy, route table and role rules
//! as one serde document.
//!
//! Every validation failure here is fatal: the process must refuse to
//! start with a malformed access configuration rather than guess.

use std::collections::BTreeSet;

use serde::Deserialize;
use thiserror::Error;

use crate::engine::{AccessEngine, CascadePolicy, RoleAllowList, Route};
use crate::hierarchy::{ResourceHierarchy, ResourceKey, ResourceNode};
use crate::roles::Role;
use crate::routes::{RouteMapping, RouteTable};

/// Configuration rejection. All variants abort initialization.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate resource key '{0}'")]
    DuplicateResourceKey(String),

    #[error("resource '{key}' references unknown parent '{parent}'")]
    UnknownParent { key: String, parent: String },

    #[error("resource hierarchy contains a cycle through '{0}'")]
    CycleDetected(String),

    #[error("resource hierarchy must have exactly one root, found {0}")]
    RootCount(usize),

    #[error("resource hierarchy is empty")]
    EmptyHierarchy,

    #[error("duplicate route pattern '{0}'")]
    DuplicateRoutePattern(String),

    #[error("route pattern '{pattern}' maps to unknown resource '{resource}'")]
    UnknownRouteResource { pattern: String, resource: String },

    #[error("allow-list entry references unknown resource '{0}'")]
    UnknownAllowListResource(String),

    #[error("invalid access configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceNodeConfig {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteMappingConfig {
    pub path: String,
    pub resource: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllowListEntryConfig {
    pub resource: String,
    pub roles: Vec<Role>,
}

/// The complete access configuration document, loaded once at process
/// start and immutable thereafter.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    /// Taxonomy nodes; declaration order defines sibling ordering.
    pub resources: Vec<ResourceNodeConfig>,

    /// Route patterns; declaration order is the equal-length tie-break.
    pub routes: Vec<RouteMappingConfig>,

    /// Patterns excluded from prefix matching (home/dashboard routes).
    #[serde(default)]
    pub root_patterns: Vec<String>,

    /// Whether ancestor grants reach descendants.
    #[serde(default)]
    pub cascade: CascadePolicy,

    /// Coarse role gate per resource (consulted for restricted roles).
    #[serde(default)]
    pub allow_list: Vec<AllowListEntryConfig>,

    /// Where restricted users land when bounced off an area.
    pub landing_route: String,

    /// Where unprovisioned users are parked.
    pub pending_route: String,
}

impl AccessConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Validate everything and assemble the immutable engine.
    pub fn build(self) -> Result<AccessEngine, ConfigError> {
        let nodes: Vec<ResourceNode> = self
            .resources
            .iter()
            .map(|node| ResourceNode {
                key: ResourceKey::new(node.key.clone()),
                label: node.label.clone(),
                parent: node.parent.clone().map(ResourceKey::new),
            })
            .collect();
        let hierarchy = ResourceHierarchy::from_nodes(&nodes)?;

        let mappings: Vec<RouteMapping> = self
            .routes
            .iter()
            .map(|mapping| RouteMapping {
                path_pattern: mapping.path.clone(),
                resource_key: ResourceKey::new(mapping.resource.clone()),
            })
            .collect();
        let root_patterns: BTreeSet<String> = self.root_patterns.iter().cloned().collect();
        let routes = RouteTable::new(mappings, &root_patterns, &hierarchy)?;

        let mut allow_entries = Vec::with_capacity(self.allow_list.len());
        for entry in &self.allow_list {
            let key = ResourceKey::new(entry.resource.clone());
            if !hierarchy.contains(&key) {
                return Err(ConfigError::UnknownAllowListResource(entry.resource.clone()));
            }
            allow_entries.push((key, entry.roles.iter().copied().collect::<BTreeSet<Role>>()));
        }

        Ok(AccessEngine::new(
            hierarchy,
            routes,
            RoleAllowList::new(allow_entries),
            self.cascade,
            Route::new(self.landing_route),
            Route::new(self.pending_route),
        ))
    }
}
