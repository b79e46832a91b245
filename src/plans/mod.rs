// Plan Registry
// Stores destination plans and namespace plans with cross-reference
// validation; readers take an immutable versioned snapshot so concurrent
// plan updates never race a reconciliation pass

use crate::destination::DestinationType;
use crate::error::{EngineError, EngineResult};
use crate::resources::{ResourceDefinition, AGGREGATE_KIND};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// One (resource kind, fraction) consumption entry of a destination plan.
/// The fraction is the share of a single replica's capacity one instance
/// of the destination occupies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceRequest {
    pub kind: String,
    pub fraction: f64,
}

/// Declares how much of each resource kind one instance of a destination
/// consumes. Entries keep caller order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DestinationPlan {
    pub name: String,
    pub destination_type: DestinationType,
    pub requests: Vec<ResourceRequest>,
}

impl DestinationPlan {
    pub fn new(name: impl Into<String>, destination_type: DestinationType) -> Self {
        Self {
            name: name.into(),
            destination_type,
            requests: Vec::new(),
        }
    }

    pub fn with_request(mut self, kind: impl Into<String>, fraction: f64) -> Self {
        self.requests.push(ResourceRequest {
            kind: kind.into(),
            fraction,
        });
        self
    }

    /// Consumption fraction for one resource kind (0.0 when not requested)
    pub fn consumption(&self, kind: &str) -> f64 {
        self.requests
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.fraction)
            .sum()
    }

    /// Sum of all per-kind fractions, counted against the aggregate ceiling
    pub fn aggregate_consumption(&self) -> f64 {
        self.requests.iter().map(|r| r.fraction).sum()
    }

    /// Resource kind whose single-instance consumption exceeds one full
    /// replica, if any. Such a plan can never be admitted.
    pub fn infeasible_kind(&self) -> Option<&str> {
        self.requests
            .iter()
            .find(|r| r.fraction > 1.0 + f64::EPSILON)
            .map(|r| r.kind.as_str())
    }
}

/// Per-resource-kind ceiling of a namespace plan
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ResourceCeiling {
    /// Floor on the replica count for this kind, even when nothing is placed
    pub min_replicas: usize,
    /// Maximum total consumption units across all destinations
    pub max_units: f64,
}

impl ResourceCeiling {
    pub fn new(min_replicas: usize, max_units: f64) -> Self {
        Self {
            min_replicas,
            max_units,
        }
    }
}

/// Space-level plan capping aggregate consumption of each resource kind,
/// plus the set of destination plans usable under it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamespacePlan {
    pub name: String,
    pub namespace_type: String,
    pub ceilings: BTreeMap<String, ResourceCeiling>,
    pub allowed_destination_plans: Vec<String>,
}

impl NamespacePlan {
    pub fn new(name: impl Into<String>, namespace_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace_type: namespace_type.into(),
            ceilings: BTreeMap::new(),
            allowed_destination_plans: Vec::new(),
        }
    }

    pub fn with_ceiling(mut self, kind: impl Into<String>, min_replicas: usize, max_units: f64) -> Self {
        self.ceilings
            .insert(kind.into(), ResourceCeiling::new(min_replicas, max_units));
        self
    }

    pub fn with_allowed_plan(mut self, plan: impl Into<String>) -> Self {
        self.allowed_destination_plans.push(plan.into());
        self
    }

    /// Ceiling in consumption units for one kind; absent kinds admit nothing
    pub fn ceiling(&self, kind: &str) -> f64 {
        self.ceilings.get(kind).map(|c| c.max_units).unwrap_or(0.0)
    }

    /// Aggregate ceiling bounding the sum across all kinds; infinite when
    /// the plan does not declare one
    pub fn aggregate_ceiling(&self) -> f64 {
        self.ceilings
            .get(AGGREGATE_KIND)
            .map(|c| c.max_units)
            .unwrap_or(f64::INFINITY)
    }

    pub fn min_replicas(&self, kind: &str) -> usize {
        self.ceilings.get(kind).map(|c| c.min_replicas).unwrap_or(0)
    }

    /// Resource kinds governed by this plan, excluding the synthetic
    /// aggregate kind
    pub fn resource_kinds(&self) -> impl Iterator<Item = &str> {
        self.ceilings
            .keys()
            .map(String::as_str)
            .filter(|k| *k != AGGREGATE_KIND)
    }

    pub fn allows(&self, plan_name: &str) -> bool {
        self.allowed_destination_plans.iter().any(|p| p == plan_name)
    }
}

/// Immutable, versioned view of all registered plans and resource
/// definitions. Each reconciliation pass works against exactly one
/// snapshot.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    pub version: u64,
    pub resources: BTreeMap<String, ResourceDefinition>,
    pub destination_plans: BTreeMap<String, DestinationPlan>,
    pub namespace_plans: BTreeMap<String, NamespacePlan>,
}

impl RegistrySnapshot {
    pub fn destination_plan(&self, name: &str) -> EngineResult<&DestinationPlan> {
        self.destination_plans
            .get(name)
            .ok_or_else(|| EngineError::NotFound(format!("destination plan '{name}'")))
    }

    pub fn namespace_plan(&self, name: &str) -> EngineResult<&NamespacePlan> {
        self.namespace_plans
            .get(name)
            .ok_or_else(|| EngineError::NotFound(format!("namespace plan '{name}'")))
    }

    pub fn resource_definition(&self, kind: &str) -> EngineResult<&ResourceDefinition> {
        self.resources
            .get(kind)
            .ok_or_else(|| EngineError::NotFound(format!("resource definition '{kind}'")))
    }
}

/// Thread-safe plan store. Reads are lock-free via an atomically swapped
/// snapshot; writes are serialized and publish a new snapshot with a
/// bumped version.
pub struct PlanRegistry {
    snapshot: ArcSwap<RegistrySnapshot>,
    write_lock: Mutex<()>,
}

impl PlanRegistry {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(RegistrySnapshot::default()),
            write_lock: Mutex::new(()),
        }
    }

    /// Current immutable snapshot; cheap and lock-free
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.load_full()
    }

    /// Register a new resource definition
    pub fn register_resource_definition(&self, definition: ResourceDefinition) -> EngineResult<()> {
        if definition.kind.is_empty() {
            return Err(EngineError::Validation(
                "resource definition kind must not be empty".to_string(),
            ));
        }

        self.mutate(|next| {
            info!(kind = %definition.kind, "Resource definition registered");
            next.resources.insert(definition.kind.clone(), definition);
            Ok(())
        })
    }

    /// Replace an existing resource definition atomically. Active
    /// destinations are not recomputed until the next admission cycle.
    pub fn replace_resource_definition(&self, definition: ResourceDefinition) -> EngineResult<()> {
        self.mutate(|next| {
            if !next.resources.contains_key(&definition.kind) {
                return Err(EngineError::NotFound(format!(
                    "resource definition '{}'",
                    definition.kind
                )));
            }
            info!(kind = %definition.kind, "Resource definition replaced");
            next.resources.insert(definition.kind.clone(), definition);
            Ok(())
        })
    }

    /// Register a destination plan. Fails when the plan references a
    /// resource kind absent from the definition table, and stores nothing.
    pub fn register_destination_plan(&self, plan: DestinationPlan) -> EngineResult<()> {
        self.mutate(|next| {
            for request in &plan.requests {
                if !next.resources.contains_key(&request.kind) {
                    return Err(EngineError::Validation(format!(
                        "destination plan '{}' references unknown resource kind '{}'",
                        plan.name, request.kind
                    )));
                }
                if !request.fraction.is_finite() || request.fraction < 0.0 {
                    return Err(EngineError::Validation(format!(
                        "destination plan '{}' has invalid fraction for '{}'",
                        plan.name, request.kind
                    )));
                }
            }
            info!(plan = %plan.name, "Destination plan registered");
            next.destination_plans.insert(plan.name.clone(), plan);
            Ok(())
        })
    }

    /// Register a namespace plan. Fails when a ceiling names an unknown
    /// resource kind or the allowed set references an unknown destination
    /// plan.
    pub fn register_namespace_plan(&self, plan: NamespacePlan) -> EngineResult<()> {
        self.mutate(|next| {
            for kind in plan.ceilings.keys() {
                if kind != AGGREGATE_KIND && !next.resources.contains_key(kind) {
                    return Err(EngineError::Validation(format!(
                        "namespace plan '{}' references unknown resource kind '{}'",
                        plan.name, kind
                    )));
                }
            }
            for allowed in &plan.allowed_destination_plans {
                if !next.destination_plans.contains_key(allowed) {
                    return Err(EngineError::Validation(format!(
                        "namespace plan '{}' references unknown destination plan '{}'",
                        plan.name, allowed
                    )));
                }
            }
            info!(plan = %plan.name, "Namespace plan registered");
            next.namespace_plans.insert(plan.name.clone(), plan);
            Ok(())
        })
    }

    pub fn destination_plan(&self, name: &str) -> EngineResult<DestinationPlan> {
        self.snapshot().destination_plan(name).cloned()
    }

    pub fn namespace_plan(&self, name: &str) -> EngineResult<NamespacePlan> {
        self.snapshot().namespace_plan(name).cloned()
    }

    pub fn resource_definition(&self, kind: &str) -> EngineResult<ResourceDefinition> {
        self.snapshot().resource_definition(kind).cloned()
    }

    /// Clone-modify-publish under the write lock. Nothing is published when
    /// the mutation fails, so a rejected plan is never partially applied.
    fn mutate<F>(&self, f: F) -> EngineResult<()>
    where
        F: FnOnce(&mut RegistrySnapshot) -> EngineResult<()>,
    {
        let _guard = self.write_lock.lock();
        let mut next = (**self.snapshot.load()).clone();
        f(&mut next)?;
        next.version += 1;
        self.snapshot.store(Arc::new(next));
        Ok(())
    }
}

impl Default for PlanRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_broker() -> PlanRegistry {
        let registry = PlanRegistry::new();
        registry
            .register_resource_definition(ResourceDefinition::new("broker"))
            .unwrap();
        registry
    }

    #[test]
    fn test_destination_plan_unknown_kind_rejected() {
        let registry = registry_with_broker();

        let plan = DestinationPlan::new("bad-plan", DestinationType::Queue)
            .with_request("router", 0.5);
        let err = registry.register_destination_plan(plan).unwrap_err();

        assert!(matches!(err, EngineError::Validation(_)));
        // The bad plan must not be stored
        assert!(registry.destination_plan("bad-plan").is_err());
    }

    #[test]
    fn test_namespace_plan_unknown_destination_plan_rejected() {
        let registry = registry_with_broker();

        let plan = NamespacePlan::new("space", "standard")
            .with_ceiling("broker", 0, 2.0)
            .with_allowed_plan("missing-plan");
        let err = registry.register_namespace_plan(plan).unwrap_err();

        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_replace_resource_definition_bumps_version() {
        let registry = registry_with_broker();
        let before = registry.snapshot().version;

        registry
            .replace_resource_definition(
                ResourceDefinition::new("broker").with_limit("max-storage-per-replica", "1Mb"),
            )
            .unwrap();

        let snapshot = registry.snapshot();
        assert!(snapshot.version > before);
        assert_eq!(
            snapshot
                .resource_definition("broker")
                .unwrap()
                .limit("max-storage-per-replica"),
            Some("1Mb")
        );
    }

    #[test]
    fn test_replace_unknown_definition_fails() {
        let registry = registry_with_broker();
        let err = registry
            .replace_resource_definition(ResourceDefinition::new("router"))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_snapshot_isolated_from_later_writes() {
        let registry = registry_with_broker();
        let snapshot = registry.snapshot();

        registry
            .register_destination_plan(
                DestinationPlan::new("q", DestinationType::Queue).with_request("broker", 0.6),
            )
            .unwrap();

        // The earlier snapshot does not see the new plan
        assert!(snapshot.destination_plan("q").is_err());
        assert!(registry.destination_plan("q").is_ok());
    }

    #[test]
    fn test_aggregate_ceiling_defaults_unbounded() {
        let plan = NamespacePlan::new("space", "standard").with_ceiling("broker", 0, 2.0);
        assert!(plan.aggregate_ceiling().is_infinite());

        let bounded = plan.with_ceiling(AGGREGATE_KIND, 0, 3.0);
        assert_eq!(bounded.aggregate_ceiling(), 3.0);
    }

    #[test]
    fn test_infeasible_kind_detection() {
        let plan = DestinationPlan::new("big", DestinationType::Queue)
            .with_request("broker", 1.5)
            .with_request("router", 0.1);
        assert_eq!(plan.infeasible_kind(), Some("broker"));

        let ok = DestinationPlan::new("full", DestinationType::Queue).with_request("broker", 1.0);
        assert_eq!(ok.infeasible_kind(), None);
    }
}
