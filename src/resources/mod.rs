// Resource Definition Table
// Maps a resource kind (broker, router, ...) to its tunable per-replica limits

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The synthetic resource kind whose ceiling bounds the sum across all
/// other kinds in a namespace plan.
pub const AGGREGATE_KIND: &str = "aggregate";

/// Definition of one dimension of broker-fleet capacity.
///
/// Limits are opaque name/value tunables (e.g. "max-storage-per-replica")
/// enforced by the replicas themselves; the engine only stores and hands
/// them out. A definition is immutable once stored - updates go through
/// `PlanRegistry::replace_resource_definition`, which swaps the whole
/// table atomically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceDefinition {
    /// Unique resource kind name
    pub kind: String,

    /// Limit-name to value, e.g. "max-storage-per-replica" -> "1Mb"
    pub limits: BTreeMap<String, String>,
}

impl ResourceDefinition {
    /// Create a definition with no limits
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            limits: BTreeMap::new(),
        }
    }

    /// Add or override a limit
    pub fn with_limit(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.limits.insert(name.into(), value.into());
        self
    }

    /// Look up a limit value by name
    pub fn limit(&self, name: &str) -> Option<&str> {
        self.limits.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_lookup() {
        let def = ResourceDefinition::new("broker").with_limit("max-storage-per-replica", "1Mb");

        assert_eq!(def.kind, "broker");
        assert_eq!(def.limit("max-storage-per-replica"), Some("1Mb"));
        assert_eq!(def.limit("unknown"), None);
    }

    #[test]
    fn test_limit_override() {
        let def = ResourceDefinition::new("broker")
            .with_limit("max-storage-per-replica", "1Mb")
            .with_limit("max-storage-per-replica", "5Mb");

        assert_eq!(def.limit("max-storage-per-replica"), Some("5Mb"));
    }
}
