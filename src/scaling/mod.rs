// Scaling Coordinator
// Reconciles desired replica counts against the observed state reported by
// an external replica-lifecycle manager. Scale-down is sequenced behind
// drain confirmation so no committed message ever becomes unreachable.

use crate::placement::{GroupId, GroupTable};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// External collaborator that actually starts and stops broker/router
/// replicas. The engine only hands it declarative desired counts and reads
/// back observed state and per-group migration completion.
#[async_trait]
pub trait ReplicaLifecycleManager: Send + Sync {
    /// Apply a desired replica count for a resource kind in a namespace
    async fn apply_replica_count(
        &self,
        namespace: &str,
        kind: &str,
        desired: usize,
    ) -> anyhow::Result<()>;

    /// Replica count the manager currently observes
    async fn observed_replica_count(&self, namespace: &str, kind: &str) -> anyhow::Result<usize>;

    /// Whether all durable data held by the given group's replica has been
    /// relocated or is otherwise durably retained
    async fn migration_complete(
        &self,
        namespace: &str,
        kind: &str,
        group: &GroupId,
    ) -> anyhow::Result<bool>;
}

/// Per-kind scaling state, per namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingState {
    Stable,
    ScalingUp,
    /// Waiting for departing replicas to finish migrating their data
    Draining,
    ScalingDown,
}

/// A declarative scale intent handed to the lifecycle manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleIntent {
    pub namespace: String,
    pub kind: String,
    pub desired: usize,
}

/// A persistent condition on a resource kind's scaling, surfaced to
/// callers instead of being destructively auto-resolved
#[derive(Debug, Clone)]
pub struct ScalingCondition {
    pub namespace: String,
    pub kind: String,
    pub state: ScalingState,
    pub message: String,
}

/// Bounded wait budget for callers that choose to block on convergence.
/// The engine itself never waits unboundedly; dropping the waiting future
/// cancels it.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutBudget {
    deadline: Instant,
}

impl TimeoutBudget {
    pub fn new(budget: Duration) -> Self {
        Self {
            deadline: Instant::now() + budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

struct KindScaling {
    state: ScalingState,
    since: Instant,
}

/// Drives replica counts toward the placement allocator's output, one
/// resource kind at a time
pub struct ScalingCoordinator {
    /// "namespace/kind" to current scaling state
    states: DashMap<String, KindScaling>,
    /// Divergence longer than this is reported as a stuck condition
    stuck_timeout: Duration,
}

impl ScalingCoordinator {
    pub fn new(stuck_timeout: Duration) -> Self {
        Self {
            states: DashMap::new(),
            stuck_timeout,
        }
    }

    /// Reconcile one resource kind of one namespace.
    ///
    /// Empty groups are drained first: a group is removed from the table
    /// (shrinking the desired count) only once its committed consumption is
    /// zero and the lifecycle manager confirms its data has been migrated.
    /// A scale intent is issued whenever desired and observed counts
    /// diverge; a stuck condition is reported when they stay divergent
    /// beyond the timeout. Scale-down is never forced.
    pub async fn reconcile_kind(
        &self,
        namespace: &str,
        kind: &str,
        table: &mut GroupTable,
        min_replicas: usize,
        manager: &dyn ReplicaLifecycleManager,
    ) -> (Option<ScaleIntent>, Vec<ScalingCondition>) {
        let mut conditions = Vec::new();
        let mut draining = false;

        for group_id in table.empty_groups(kind) {
            // Invariant guard: only zero-consumption groups are drained
            let committed = table
                .group(&group_id)
                .map(|g| g.committed_consumption())
                .unwrap_or(0.0);
            if committed > 0.0 {
                warn!(group = %group_id, committed, "Skipping drain of non-empty group");
                continue;
            }

            match manager.migration_complete(namespace, kind, &group_id).await {
                Ok(true) => {
                    info!(
                        namespace = %namespace,
                        kind = %kind,
                        group = %group_id,
                        "Group drained, releasing replica"
                    );
                    table.remove_group(&group_id);
                }
                Ok(false) => {
                    debug!(
                        namespace = %namespace,
                        kind = %kind,
                        group = %group_id,
                        "Awaiting data migration before scale-down"
                    );
                    draining = true;
                }
                Err(e) => {
                    draining = true;
                    conditions.push(ScalingCondition {
                        namespace: namespace.to_string(),
                        kind: kind.to_string(),
                        state: ScalingState::Draining,
                        message: format!("migration status unavailable for '{group_id}': {e}"),
                    });
                }
            }
        }

        let desired = min_replicas.max(table.count_for_kind(kind));

        let observed = match manager.observed_replica_count(namespace, kind).await {
            Ok(count) => count,
            Err(e) => {
                conditions.push(ScalingCondition {
                    namespace: namespace.to_string(),
                    kind: kind.to_string(),
                    state: self.state_of(namespace, kind),
                    message: format!("observed replica count unavailable: {e}"),
                });
                return (None, conditions);
            }
        };

        let next_state = if draining {
            ScalingState::Draining
        } else if desired > observed {
            ScalingState::ScalingUp
        } else if desired < observed {
            ScalingState::ScalingDown
        } else {
            ScalingState::Stable
        };

        let since = self.transition(namespace, kind, next_state, desired, observed);

        let mut intent = None;
        if desired != observed {
            match manager.apply_replica_count(namespace, kind, desired).await {
                Ok(()) => {
                    intent = Some(ScaleIntent {
                        namespace: namespace.to_string(),
                        kind: kind.to_string(),
                        desired,
                    });
                }
                Err(e) => {
                    conditions.push(ScalingCondition {
                        namespace: namespace.to_string(),
                        kind: kind.to_string(),
                        state: next_state,
                        message: format!("scale intent failed: {e}"),
                    });
                }
            }
        }

        if next_state != ScalingState::Stable && since.elapsed() >= self.stuck_timeout {
            warn!(
                namespace = %namespace,
                kind = %kind,
                state = ?next_state,
                desired,
                observed,
                "Scaling stuck beyond timeout"
            );
            conditions.push(ScalingCondition {
                namespace: namespace.to_string(),
                kind: kind.to_string(),
                state: next_state,
                message: format!(
                    "scaling stuck: desired {desired}, observed {observed} for {}s",
                    since.elapsed().as_secs()
                ),
            });
        }

        (intent, conditions)
    }

    /// Current scaling state of a kind, Stable when never touched
    pub fn state_of(&self, namespace: &str, kind: &str) -> ScalingState {
        self.states
            .get(&Self::key(namespace, kind))
            .map(|s| s.state)
            .unwrap_or(ScalingState::Stable)
    }

    /// Record a state transition; returns the instant the current state was
    /// entered (for stuck detection)
    fn transition(
        &self,
        namespace: &str,
        kind: &str,
        next: ScalingState,
        desired: usize,
        observed: usize,
    ) -> Instant {
        let mut entry = self
            .states
            .entry(Self::key(namespace, kind))
            .or_insert_with(|| KindScaling {
                state: ScalingState::Stable,
                since: Instant::now(),
            });

        if entry.state != next {
            info!(
                namespace = %namespace,
                kind = %kind,
                from = ?entry.state,
                to = ?next,
                desired,
                observed,
                "Scaling state transition"
            );
            entry.state = next;
            entry.since = Instant::now();
        }
        entry.since
    }

    fn key(namespace: &str, kind: &str) -> String {
        format!("{namespace}/{kind}")
    }
}

/// Lifecycle manager backed by in-process state, used for standalone
/// operation and tests. Applied counts converge to observed immediately
/// unless a migration is explicitly held back.
pub struct InMemoryLifecycleManager {
    observed: DashMap<String, usize>,
    held_migrations: DashMap<String, ()>,
    intents: Mutex<Vec<ScaleIntent>>,
}

impl InMemoryLifecycleManager {
    pub fn new() -> Self {
        Self {
            observed: DashMap::new(),
            held_migrations: DashMap::new(),
            intents: Mutex::new(Vec::new()),
        }
    }

    /// Force the observed count, simulating an external/manual scale event
    pub fn set_observed(&self, namespace: &str, kind: &str, count: usize) {
        self.observed
            .insert(ScalingCoordinator::key(namespace, kind), count);
    }

    /// Hold back migration completion for a group, keeping its replica
    /// undrainable until released
    pub fn hold_migration(&self, namespace: &str, kind: &str, group: &str) {
        self.held_migrations
            .insert(format!("{namespace}/{kind}/{group}"), ());
    }

    /// Report the group's data as migrated
    pub fn release_migration(&self, namespace: &str, kind: &str, group: &str) {
        self.held_migrations
            .remove(&format!("{namespace}/{kind}/{group}"));
    }

    /// All scale intents applied so far, oldest first
    pub fn intents(&self) -> Vec<ScaleIntent> {
        self.intents.lock().clone()
    }
}

impl Default for InMemoryLifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplicaLifecycleManager for InMemoryLifecycleManager {
    async fn apply_replica_count(
        &self,
        namespace: &str,
        kind: &str,
        desired: usize,
    ) -> anyhow::Result<()> {
        self.intents.lock().push(ScaleIntent {
            namespace: namespace.to_string(),
            kind: kind.to_string(),
            desired,
        });
        self.observed
            .insert(ScalingCoordinator::key(namespace, kind), desired);
        Ok(())
    }

    async fn observed_replica_count(&self, namespace: &str, kind: &str) -> anyhow::Result<usize> {
        Ok(self
            .observed
            .get(&ScalingCoordinator::key(namespace, kind))
            .map(|c| *c)
            .unwrap_or(0))
    }

    async fn migration_complete(
        &self,
        namespace: &str,
        kind: &str,
        group: &GroupId,
    ) -> anyhow::Result<bool> {
        Ok(!self
            .held_migrations
            .contains_key(&format!("{namespace}/{kind}/{group}")))
    }
}
