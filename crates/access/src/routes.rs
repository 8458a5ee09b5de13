//! Path → resource key mapping for router guards.
//!
//! The table is process-wide configuration, built once at startup against a
//! validated [`ResourceHierarchy`] and immutable afterwards.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::hierarchy::{ResourceHierarchy, ResourceKey};

/// A literal route pattern mapped to a resource key (e.g. `/parties` →
/// `page:parties`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMapping {
    pub path_pattern: String,
    pub resource_key: ResourceKey,
}

/// Lookup table resolving navigational paths to resource keys.
///
/// Resolution order:
/// 1. exact pattern match;
/// 2. longest-prefix match over non-root patterns, where `p` accepts `path`
///    only at a segment boundary (`path == p` or `path` starts with `p/`);
/// 3. no match → the path carries no resource gate.
///
/// Root patterns (home/dashboard routes) only ever match exactly, so they
/// cannot greedily swallow unrelated paths.
///
/// Two equal-length patterns matching the same path is a configuration
/// smell; the first-declared pattern wins. That tie-break is deterministic
/// but deliberately not a documented business guarantee.
#[derive(Debug, Clone)]
pub struct RouteTable {
    mappings: Vec<RouteMapping>,
    exact: HashMap<String, usize>,
    // Indices of prefix-eligible mappings, longest pattern first; ties keep
    // declaration order.
    prefix_order: Vec<usize>,
}

impl RouteTable {
    /// Build the table, validating pattern uniqueness and that every target
    /// resource key exists in the hierarchy.
    pub fn new(
        mappings: Vec<RouteMapping>,
        root_patterns: &BTreeSet<String>,
        hierarchy: &ResourceHierarchy,
    ) -> Result<Self, ConfigError> {
        let mut exact: HashMap<String, usize> = HashMap::with_capacity(mappings.len());

        for (index, mapping) in mappings.iter().enumerate() {
            if !hierarchy.contains(&mapping.resource_key) {
                return Err(ConfigError::UnknownRouteResource {
                    pattern: mapping.path_pattern.clone(),
                    resource: mapping.resource_key.to_string(),
                });
            }
            if exact.insert(mapping.path_pattern.clone(), index).is_some() {
                return Err(ConfigError::DuplicateRoutePattern(
                    mapping.path_pattern.clone(),
                ));
            }
        }

        let mut prefix_order: Vec<usize> = (0..mappings.len())
            .filter(|&i| !root_patterns.contains(&mappings[i].path_pattern))
            .collect();
        // Stable sort: equal lengths stay in declaration order.
        prefix_order.sort_by_key(|&i| std::cmp::Reverse(mappings[i].path_pattern.len()));

        Ok(Self {
            mappings,
            exact,
            prefix_order,
        })
    }

    /// Resolve a path to its resource key, or `None` when the path is
    /// unmapped (no resource gate).
    pub fn resolve(&self, path: &str) -> Option<&ResourceKey> {
        if let Some(&index) = self.exact.get(path) {
            return Some(&self.mappings[index].resource_key);
        }

        for &index in &self.prefix_order {
            let pattern = self.mappings[index].path_pattern.as_str();
            if path.len() > pattern.len()
                && path.starts_with(pattern)
                && path.as_bytes()[pattern.len()] == b'/'
            {
                return Some(&self.mappings[index].resource_key);
            }
        }

        None
    }

    pub fn mappings(&self) -> &[RouteMapping] {
        &self.mappings
    }
}
