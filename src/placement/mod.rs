// Placement Allocator
// Assigns accepted destinations to replica groups per resource kind:
// first-fit-decreasing packing for pooled destinations, a dedicated group
// for sharded ones. Existing placements are never moved to improve
// packing - only newly-admitted destinations are placed.

use crate::quota::{PlannedDestination, CAPACITY_EPSILON};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Identifier of a replica group, e.g. "broker-0"
pub type GroupId = String;

/// Whether a group's replica is shared or dedicated
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GroupMode {
    /// Multiple small destinations share the replica's capacity
    Pooled,
    /// Exactly one destination owns the whole replica
    Sharded,
}

/// One replica's worth of capacity for a resource kind, holding the
/// destinations assigned to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaGroup {
    pub id: GroupId,
    pub resource_kind: String,
    pub mode: GroupMode,
    /// Destination name to the fraction it occupies
    pub members: BTreeMap<String, f64>,
}

impl ReplicaGroup {
    fn new(id: GroupId, resource_kind: String, mode: GroupMode) -> Self {
        Self {
            id,
            resource_kind,
            mode,
            members: BTreeMap::new(),
        }
    }

    /// Sum of fractions of all destinations currently assigned
    pub fn committed_consumption(&self) -> f64 {
        self.members.values().sum()
    }

    /// Capacity left before the replica's 1.0 cap
    pub fn remaining_capacity(&self) -> f64 {
        1.0 - self.committed_consumption()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Per-namespace table of replica groups across all resource kinds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupTable {
    groups: BTreeMap<GroupId, ReplicaGroup>,
    next_index: BTreeMap<String, u64>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&self, id: &str) -> Option<&ReplicaGroup> {
        self.groups.get(id)
    }

    pub fn groups_for_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a ReplicaGroup> {
        self.groups.values().filter(move |g| g.resource_kind == kind)
    }

    /// Number of groups (and thus replicas) currently open for a kind
    pub fn count_for_kind(&self, kind: &str) -> usize {
        self.groups_for_kind(kind).count()
    }

    /// Group the destination is assigned to for a kind, if any
    pub fn assignment(&self, destination: &str, kind: &str) -> Option<&GroupId> {
        self.groups
            .values()
            .find(|g| g.resource_kind == kind && g.members.contains_key(destination))
            .map(|g| &g.id)
    }

    /// Groups for a kind with no remaining members, candidates for draining
    pub fn empty_groups(&self, kind: &str) -> Vec<GroupId> {
        self.groups_for_kind(kind)
            .filter(|g| g.is_empty())
            .map(|g| g.id.clone())
            .collect()
    }

    /// Release a destination from every group it occupies. Returns the
    /// affected group ids; empty groups are kept until the scaling
    /// coordinator confirms their data has been drained.
    pub fn release(&mut self, destination: &str) -> Vec<GroupId> {
        let mut affected = Vec::new();
        for group in self.groups.values_mut() {
            if group.members.remove(destination).is_some() {
                debug!(
                    destination = %destination,
                    group = %group.id,
                    remaining = group.committed_consumption(),
                    "Destination released from group"
                );
                affected.push(group.id.clone());
            }
        }
        affected
    }

    /// Remove a drained group from the table
    pub fn remove_group(&mut self, id: &str) -> Option<ReplicaGroup> {
        self.groups.remove(id)
    }

    fn open_group(&mut self, kind: &str, mode: GroupMode) -> GroupId {
        let index = self.next_index.entry(kind.to_string()).or_insert(0);
        let id = format!("{kind}-{index}");
        *index += 1;
        self.groups
            .insert(id.clone(), ReplicaGroup::new(id.clone(), kind.to_string(), mode));
        id
    }
}

/// One destination-to-group assignment produced by a placement run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub destination: String,
    pub resource_kind: String,
    pub group: GroupId,
}

/// Places newly-admitted destinations onto replica groups
#[derive(Debug, Clone)]
pub struct PlacementAllocator {
    /// Consumption fraction at or above which a destination gets a
    /// dedicated (sharded) replica. Policy default 1.0: only destinations
    /// that alone fill a replica are isolated.
    isolation_threshold: f64,
}

impl PlacementAllocator {
    pub fn new(isolation_threshold: f64) -> Self {
        Self {
            isolation_threshold,
        }
    }

    /// Place the given destinations for every resource kind they consume.
    ///
    /// Destinations already holding an assignment for a kind keep it
    /// (stable re-placement); pooled newcomers are packed first-fit over
    /// existing groups in descending consumption order, opening new groups
    /// only when nothing fits.
    pub fn place(&self, table: &mut GroupTable, admitted: &[PlannedDestination]) -> Vec<Assignment> {
        let mut assignments = Vec::new();

        // Collect the kinds touched by this batch, in deterministic order
        let mut kinds: Vec<&str> = admitted
            .iter()
            .flat_map(|d| d.plan.requests.iter().map(|r| r.kind.as_str()))
            .collect();
        kinds.sort_unstable();
        kinds.dedup();

        for kind in kinds {
            let mut pending: Vec<(&str, f64)> = admitted
                .iter()
                .filter_map(|d| {
                    let fraction = d.plan.consumption(kind);
                    if fraction <= 0.0 || table.assignment(&d.name, kind).is_some() {
                        None
                    } else {
                        Some((d.name.as_str(), fraction))
                    }
                })
                .collect();

            // First-fit-decreasing: biggest consumers first, stable for ties
            pending.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

            for (name, fraction) in pending {
                let group = self.place_one(table, kind, name, fraction);
                assignments.push(Assignment {
                    destination: name.to_string(),
                    resource_kind: kind.to_string(),
                    group,
                });
            }
        }

        assignments
    }

    fn place_one(&self, table: &mut GroupTable, kind: &str, name: &str, fraction: f64) -> GroupId {
        if fraction >= self.isolation_threshold - CAPACITY_EPSILON {
            // Sharded: the destination owns a dedicated replica
            let id = table.open_group(kind, GroupMode::Sharded);
            info!(destination = %name, group = %id, kind = %kind, "Sharded destination placed");
            table
                .groups
                .get_mut(&id)
                .map(|g| g.members.insert(name.to_string(), fraction));
            return id;
        }

        // Pooled: first existing pooled group with room wins
        let existing = table
            .groups
            .values()
            .filter(|g| {
                g.resource_kind == kind
                    && g.mode == GroupMode::Pooled
                    && g.remaining_capacity() + CAPACITY_EPSILON >= fraction
            })
            .map(|g| g.id.clone())
            .next();

        let id = existing.unwrap_or_else(|| table.open_group(kind, GroupMode::Pooled));
        if let Some(group) = table.groups.get_mut(&id) {
            group.members.insert(name.to_string(), fraction);
            debug!(
                destination = %name,
                group = %id,
                kind = %kind,
                committed = group.committed_consumption(),
                "Pooled destination placed"
            );
        }
        id
    }
}

impl Default for PlacementAllocator {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::DestinationType;
    use crate::plans::DestinationPlan;

    fn planned(name: &str, broker: f64) -> PlannedDestination {
        PlannedDestination::new(
            name,
            DestinationPlan::new("p", DestinationType::Queue).with_request("broker", broker),
        )
    }

    #[test]
    fn test_pooled_first_fit_decreasing() {
        let allocator = PlacementAllocator::default();
        let mut table = GroupTable::new();

        // 0.6 + 0.4 fills one replica, 0.5 + 0.3 fit in a second:
        // summed 1.8 must never use more than 2 groups
        let batch = vec![
            planned("a", 0.5),
            planned("b", 0.6),
            planned("c", 0.4),
            planned("d", 0.3),
        ];
        allocator.place(&mut table, &batch);

        assert_eq!(table.count_for_kind("broker"), 2);
        // Descending order packs b (0.6) first, then a (0.5) opens the
        // second group, c (0.4) backfills the first, d (0.3) the second
        assert_eq!(table.assignment("b", "broker"), table.assignment("c", "broker"));
        assert_eq!(table.assignment("a", "broker"), table.assignment("d", "broker"));
    }

    #[test]
    fn test_sharded_never_share() {
        let allocator = PlacementAllocator::default();
        let mut table = GroupTable::new();

        let batch = vec![planned("t1", 1.0), planned("t2", 1.0)];
        allocator.place(&mut table, &batch);

        assert_eq!(table.count_for_kind("broker"), 2);
        let g1 = table.assignment("t1", "broker").unwrap();
        let g2 = table.assignment("t2", "broker").unwrap();
        assert_ne!(g1, g2);
        assert_eq!(table.group(g1).unwrap().mode, GroupMode::Sharded);
    }

    #[test]
    fn test_pooled_never_join_sharded_group() {
        let allocator = PlacementAllocator::default();
        let mut table = GroupTable::new();

        allocator.place(&mut table, &[planned("iso", 1.0)]);
        allocator.place(&mut table, &[planned("small", 0.1)]);

        let iso_group = table.assignment("iso", "broker").unwrap().clone();
        let small_group = table.assignment("small", "broker").unwrap().clone();
        assert_ne!(iso_group, small_group);
    }

    #[test]
    fn test_stable_replacement() {
        let allocator = PlacementAllocator::default();
        let mut table = GroupTable::new();

        allocator.place(&mut table, &[planned("a", 0.4), planned("b", 0.4)]);
        let before = table.assignment("a", "broker").unwrap().clone();

        // Re-placing the same destination must not move it, even though a
        // tighter packing might exist
        allocator.place(&mut table, &[planned("a", 0.4), planned("c", 0.4)]);
        assert_eq!(table.assignment("a", "broker").unwrap(), &before);
        assert_eq!(table.count_for_kind("broker"), 1);
    }

    #[test]
    fn test_packing_bound() {
        let allocator = PlacementAllocator::default();
        let mut table = GroupTable::new();

        // 4 x 0.4 = 1.6 fits in 2 replicas, must not open a third
        let batch = vec![
            planned("q1", 0.4),
            planned("q2", 0.4),
            planned("q3", 0.4),
            planned("q4", 0.4),
        ];
        allocator.place(&mut table, &batch);
        assert_eq!(table.count_for_kind("broker"), 2);
    }

    #[test]
    fn test_release_keeps_empty_group_for_drain() {
        let allocator = PlacementAllocator::default();
        let mut table = GroupTable::new();

        allocator.place(&mut table, &[planned("q1", 0.4)]);
        let group = table.assignment("q1", "broker").unwrap().clone();

        let affected = table.release("q1");
        assert_eq!(affected, vec![group.clone()]);
        // The group survives with zero consumption until drained
        assert_eq!(table.group(&group).unwrap().committed_consumption(), 0.0);
        assert_eq!(table.empty_groups("broker"), vec![group]);
    }

    #[test]
    fn test_multi_kind_placement() {
        let allocator = PlacementAllocator::default();
        let mut table = GroupTable::new();

        let topic = PlannedDestination::new(
            "t1",
            DestinationPlan::new("topic", DestinationType::Topic)
                .with_request("broker", 0.4)
                .with_request("router", 0.2),
        );
        let assignments = allocator.place(&mut table, &[topic]);

        assert_eq!(assignments.len(), 2);
        assert!(table.assignment("t1", "broker").is_some());
        assert!(table.assignment("t1", "router").is_some());
    }

    #[test]
    fn test_lower_isolation_threshold() {
        // With threshold 0.5, a 0.6 destination is sharded
        let allocator = PlacementAllocator::new(0.5);
        let mut table = GroupTable::new();

        allocator.place(&mut table, &[planned("big", 0.6), planned("small", 0.2)]);
        let big_group = table.assignment("big", "broker").unwrap();
        assert_eq!(table.group(big_group).unwrap().mode, GroupMode::Sharded);

        let small_group = table.assignment("small", "broker").unwrap();
        assert_eq!(table.group(small_group).unwrap().mode, GroupMode::Pooled);
    }
}
