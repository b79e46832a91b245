// Namespace Reconciliation Engine
// Runs discrete reconciliation passes over each namespace's desired
// destination set: admission, placement and scaling decisions are computed
// atomically against that namespace's state, while different namespaces
// reconcile independently and concurrently.

use crate::destination::{Destination, DestinationPhase, DestinationSpec};
use crate::error::{EngineError, EngineResult};
use crate::identity::IdentityProvider;
use crate::placement::{GroupId, GroupTable, PlacementAllocator};
use crate::plans::{NamespacePlan, PlanRegistry};
use crate::quota::{self, PlannedDestination, Utilization, CAPACITY_EPSILON, PLAN_INFEASIBLE, QUOTA_EXCEEDED};
use crate::scaling::{
    ReplicaLifecycleManager, ScaleIntent, ScalingCondition, ScalingCoordinator, TimeoutBudget,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Lifecycle of a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespacePhase {
    Created,
    Active,
    Terminating,
}

/// Per-destination placement result readable by callers polling for
/// readiness
#[derive(Debug, Clone)]
pub struct DestinationStatus {
    pub name: String,
    pub phase: DestinationPhase,
    pub status_messages: Vec<String>,
    pub replica_group_id: Option<GroupId>,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub accepted: Vec<String>,
    pub rejected: Vec<(String, String)>,
    pub intents: Vec<ScaleIntent>,
    pub conditions: Vec<ScalingCondition>,
    pub utilization: Utilization,
}

/// Engine tunables
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Consumption fraction at or above which a destination is sharded
    pub isolation_threshold: f64,
    /// Divergence between desired and observed replica counts longer than
    /// this is reported as a stuck-scaling condition
    pub stuck_timeout: Duration,
    /// Background reconcile loop interval
    pub reconcile_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            isolation_threshold: 1.0,
            stuck_timeout: Duration::from_secs(120),
            reconcile_interval: Duration::from_secs(5),
        }
    }
}

/// All state the engine owns for one namespace. Mutation is confined to
/// the reconciliation pass (or caller operation) holding the lock,
/// enforcing single-writer discipline without fine-grained locks.
struct NamespaceState {
    id: Uuid,
    name: String,
    /// Namespace plan reference, immutable for the namespace's lifetime
    plan: String,
    phase: NamespacePhase,
    /// Desired destinations in caller-supplied order; order is significant
    /// for admission
    destinations: Vec<Destination>,
    groups: GroupTable,
    created_at: DateTime<Utc>,
}

impl NamespaceState {
    fn destination_mut(&mut self, name: &str) -> Option<&mut Destination> {
        self.destinations.iter_mut().find(|d| d.name == name)
    }
}

/// The admission-and-placement engine
pub struct Engine {
    registry: Arc<PlanRegistry>,
    namespaces: Arc<DashMap<String, Arc<Mutex<NamespaceState>>>>,
    allocator: PlacementAllocator,
    coordinator: Arc<ScalingCoordinator>,
    lifecycle: Arc<dyn ReplicaLifecycleManager>,
    identity: Arc<dyn IdentityProvider>,
    settings: EngineSettings,
    running: Arc<AtomicBool>,
}

impl Engine {
    pub fn new(
        registry: Arc<PlanRegistry>,
        lifecycle: Arc<dyn ReplicaLifecycleManager>,
        identity: Arc<dyn IdentityProvider>,
        settings: EngineSettings,
    ) -> Self {
        info!(
            isolation_threshold = settings.isolation_threshold,
            "Initializing admission and placement engine"
        );
        Self {
            registry,
            namespaces: Arc::new(DashMap::new()),
            allocator: PlacementAllocator::new(settings.isolation_threshold),
            coordinator: Arc::new(ScalingCoordinator::new(settings.stuck_timeout)),
            lifecycle,
            identity,
            settings,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a namespace governed by the given namespace plan. Provisions
    /// the namespace's identity realm before the namespace becomes Active.
    pub async fn create_namespace(&self, name: &str, plan: &str) -> anyhow::Result<()> {
        // Fail fast on a dangling plan reference
        self.registry.namespace_plan(plan)?;

        if self.namespaces.contains_key(name) {
            return Err(EngineError::Validation(format!("namespace '{name}' already exists")).into());
        }

        let mut state = NamespaceState {
            id: Uuid::new_v4(),
            name: name.to_string(),
            plan: plan.to_string(),
            phase: NamespacePhase::Created,
            destinations: Vec::new(),
            groups: GroupTable::new(),
            created_at: Utc::now(),
        };

        self.identity.create_realm(name).await?;
        state.phase = NamespacePhase::Active;

        info!(namespace = %name, namespace_id = %state.id, plan = %plan, "Namespace created");
        self.namespaces
            .insert(name.to_string(), Arc::new(Mutex::new(state)));
        Ok(())
    }

    /// Delete a namespace, releasing all destinations and its identity
    /// realm
    pub async fn delete_namespace(&self, name: &str) -> anyhow::Result<()> {
        let state = self.namespace_state(name)?;
        {
            let mut st = state.lock().await;
            st.phase = NamespacePhase::Terminating;
            let age = Utc::now().signed_duration_since(st.created_at);
            debug!(namespace = %name, age_secs = age.num_seconds(), "Terminating namespace");
            for dest in st.destinations.iter_mut() {
                dest.mark_terminating();
            }
        }
        self.identity.delete_realm(name).await?;
        self.namespaces.remove(name);
        info!(namespace = %name, "Namespace deleted");
        Ok(())
    }

    /// Provision a user in the namespace's identity realm
    pub async fn create_user(
        &self,
        namespace: &str,
        username: &str,
        password: &str,
    ) -> anyhow::Result<()> {
        self.namespace_state(namespace)?;
        self.identity.create_user(namespace, username, password).await
    }

    /// Replace the namespace's desired destination set. Destinations
    /// missing from the new set are deleted (their consumption released);
    /// new ones start Pending. The caller-supplied order is preserved as
    /// the admission order.
    pub async fn set_destinations(
        &self,
        namespace: &str,
        specs: Vec<DestinationSpec>,
    ) -> anyhow::Result<()> {
        let state = self.namespace_state(namespace)?;
        let mut st = state.lock().await;

        let mut next = Vec::with_capacity(specs.len());
        for spec in &specs {
            if let Some(pos) = st.destinations.iter().position(|d| d.name == spec.name) {
                next.push(st.destinations.remove(pos));
            } else {
                debug!(namespace = %namespace, destination = %spec.name, "Destination added to desired set");
                next.push(Destination::from_spec(spec));
            }
        }

        // Whatever remains was removed from the desired set
        for mut removed in std::mem::take(&mut st.destinations) {
            removed.mark_terminating();
            info!(namespace = %namespace, destination = %removed.name, "Destination removed from desired set");
            st.groups.release(&removed.name);
        }

        st.destinations = next;
        Ok(())
    }

    /// Append destinations to the desired set, keeping existing entries
    pub async fn append_destinations(
        &self,
        namespace: &str,
        specs: Vec<DestinationSpec>,
    ) -> anyhow::Result<()> {
        let state = self.namespace_state(namespace)?;
        let mut st = state.lock().await;

        for spec in specs {
            if st.destinations.iter().any(|d| d.name == spec.name) {
                warn!(namespace = %namespace, destination = %spec.name, "Destination already in desired set, skipping");
                continue;
            }
            st.destinations.push(Destination::from_spec(&spec));
        }
        Ok(())
    }

    /// Remove one destination, releasing its consumption from its replica
    /// groups
    pub async fn remove_destination(&self, namespace: &str, name: &str) -> anyhow::Result<()> {
        let state = self.namespace_state(namespace)?;
        let mut st = state.lock().await;

        let Some(pos) = st.destinations.iter().position(|d| d.name == name) else {
            return Err(EngineError::NotFound(format!("destination '{name}'")).into());
        };
        let mut removed = st.destinations.remove(pos);
        removed.mark_terminating();
        st.groups.release(name);
        info!(namespace = %namespace, destination = %name, "Destination deleted");
        Ok(())
    }

    /// Placement result for one destination
    pub async fn destination_status(
        &self,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<DestinationStatus> {
        let state = self.namespace_state(namespace)?;
        let st = state.lock().await;
        st.destinations
            .iter()
            .find(|d| d.name == name)
            .map(|d| DestinationStatus {
                name: d.name.clone(),
                phase: d.phase,
                status_messages: d.status_messages.clone(),
                replica_group_id: d.replica_group_id().cloned(),
            })
            .ok_or_else(|| EngineError::NotFound(format!("destination '{name}'")).into())
    }

    /// Placement results for all destinations, in desired-set order
    pub async fn destination_statuses(&self, namespace: &str) -> anyhow::Result<Vec<DestinationStatus>> {
        let state = self.namespace_state(namespace)?;
        let st = state.lock().await;
        Ok(st
            .destinations
            .iter()
            .map(|d| DestinationStatus {
                name: d.name.clone(),
                phase: d.phase,
                status_messages: d.status_messages.clone(),
                replica_group_id: d.replica_group_id().cloned(),
            })
            .collect())
    }

    /// Run one reconciliation pass over a namespace: snapshot the registry,
    /// re-validate Active destinations, admit Pending candidates in order,
    /// place the accepted ones and drive replica counts toward the result.
    #[instrument(skip(self), fields(namespace = %namespace))]
    pub async fn reconcile(&self, namespace: &str) -> anyhow::Result<ReconcileReport> {
        let snapshot = self.registry.snapshot();
        let state = self.namespace_state(namespace)?;
        let mut st = state.lock().await;

        let ns_plan = snapshot.namespace_plan(&st.plan)?.clone();
        let mut report = ReconcileReport::default();

        // Resolve every destination's plan against this pass's snapshot
        let mut unresolved: Vec<(String, String)> = Vec::new();
        let mut active: Vec<PlannedDestination> = Vec::new();
        let mut candidates: Vec<PlannedDestination> = Vec::new();

        for dest in &st.destinations {
            if dest.phase == DestinationPhase::Terminating {
                continue;
            }
            let plan = match snapshot.destination_plan(&dest.plan) {
                Ok(p) => p.clone(),
                Err(_) => {
                    unresolved.push((
                        dest.name.clone(),
                        format!("Unknown destination plan '{}'", dest.plan),
                    ));
                    continue;
                }
            };
            if !ns_plan.allows(&dest.plan) {
                unresolved.push((
                    dest.name.clone(),
                    "Destination plan not permitted by namespace plan".to_string(),
                ));
                continue;
            }
            let planned = PlannedDestination::new(&dest.name, plan);
            match dest.phase {
                DestinationPhase::Active => active.push(planned),
                DestinationPhase::Pending | DestinationPhase::Rejected => candidates.push(planned),
                DestinationPhase::Terminating => {}
            }
        }

        // Lazy re-validation: a registry change may have shrunk the
        // ceilings underneath already-Active destinations. Demote the
        // newest ones until the remainder fits; their data stays with its
        // group and they are re-offered on later passes.
        let mut demoted: Vec<String> = Vec::new();
        while !within_ceilings(&ns_plan, &active) {
            match active.pop() {
                Some(lost) => demoted.push(lost.name),
                None => break,
            }
        }

        for (name, message) in &unresolved {
            if let Some(dest) = st.destination_mut(name) {
                dest.mark_pending(message);
                report.rejected.push((name.clone(), message.clone()));
            }
        }
        for name in &demoted {
            warn!(namespace = %namespace, destination = %name, "Active destination no longer fits, demoting");
            if let Some(dest) = st.destination_mut(name) {
                dest.mark_pending(QUOTA_EXCEEDED);
                report.rejected.push((name.clone(), QUOTA_EXCEEDED.to_string()));
            }
        }

        // Greedy order-sensitive admission of the candidate batch
        let outcome = quota::admit(&ns_plan, &active, &candidates);

        let accepted_planned: Vec<PlannedDestination> = candidates
            .iter()
            .filter(|c| outcome.is_accepted(&c.name))
            .cloned()
            .collect();

        let assignments = self.allocator.place(&mut st.groups, &accepted_planned);
        for assignment in &assignments {
            if let Some(dest) = st.destination_mut(&assignment.destination) {
                dest.replica_groups
                    .insert(assignment.resource_kind.clone(), assignment.group.clone());
            }
        }

        for planned in &accepted_planned {
            if let Some(dest) = st.destination_mut(&planned.name) {
                dest.mark_active();
                report.accepted.push(planned.name.clone());
            }
        }

        for (name, reason) in outcome.rejected() {
            if let Some(dest) = st.destination_mut(name) {
                if reason == PLAN_INFEASIBLE {
                    dest.mark_rejected(reason);
                } else {
                    dest.mark_pending(reason);
                }
                report.rejected.push((name.to_string(), reason.to_string()));
            }
        }

        report.utilization = outcome.utilization;

        // Reconcile replica counts for every kind the namespace plan governs
        let kinds: Vec<String> = ns_plan.resource_kinds().map(str::to_string).collect();
        for kind in kinds {
            let (intent, mut conditions) = self
                .coordinator
                .reconcile_kind(
                    namespace,
                    &kind,
                    &mut st.groups,
                    ns_plan.min_replicas(&kind),
                    &*self.lifecycle,
                )
                .await;
            if let Some(intent) = intent {
                report.intents.push(intent);
            }
            report.conditions.append(&mut conditions);
        }

        debug!(
            namespace = %namespace,
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            intents = report.intents.len(),
            "Reconciliation pass complete"
        );
        Ok(report)
    }

    /// Reconcile every namespace once. Per-namespace failures are logged
    /// and do not abort the remaining namespaces.
    pub async fn reconcile_all(&self) {
        let names: Vec<String> = self.namespaces.iter().map(|e| e.key().clone()).collect();
        for name in names {
            let started = std::time::Instant::now();
            match self.reconcile(&name).await {
                Ok(_) => {
                    crate::observability::record_pass_duration(
                        &name,
                        started.elapsed().as_millis() as u64,
                    );
                }
                Err(e) => error!(namespace = %name, error = %e, "Reconciliation pass failed"),
            }
        }
    }

    /// Start the background reconcile loop
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::Relaxed) {
            warn!("Engine reconcile loop already running");
            return;
        }

        info!(
            interval_secs = self.settings.reconcile_interval.as_secs(),
            "Starting reconcile loop"
        );

        let engine = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(engine.settings.reconcile_interval);
            while engine.running.load(Ordering::Relaxed) {
                interval.tick().await;
                engine.reconcile_all().await;
            }
            info!("Reconcile loop stopped");
        });
    }

    /// Stop the background reconcile loop
    pub fn stop(&self) {
        info!("Stopping reconcile loop");
        self.running.store(false, Ordering::Relaxed);
    }

    /// Reconcile until every non-terminating destination is Active, or the
    /// budget runs out. Cancellable by dropping the future.
    pub async fn wait_for_destinations_ready(
        &self,
        namespace: &str,
        budget: TimeoutBudget,
    ) -> anyhow::Result<()> {
        loop {
            self.reconcile(namespace).await?;
            let statuses = self.destination_statuses(namespace).await?;
            let pending: Vec<&DestinationStatus> = statuses
                .iter()
                .filter(|s| {
                    s.phase != DestinationPhase::Active && s.phase != DestinationPhase::Terminating
                })
                .collect();
            if pending.is_empty() {
                return Ok(());
            }
            if budget.expired() {
                let names: Vec<&str> = pending.iter().map(|s| s.name.as_str()).collect();
                anyhow::bail!("destinations are not ready: {}", names.join(", "));
            }
            tokio::time::sleep(budget.remaining().min(Duration::from_millis(200))).await;
        }
    }

    /// Reconcile until the observed replica count for a kind matches the
    /// expectation, or the budget runs out
    pub async fn wait_for_replicas(
        &self,
        namespace: &str,
        kind: &str,
        expected: usize,
        budget: TimeoutBudget,
    ) -> anyhow::Result<()> {
        loop {
            self.reconcile(namespace).await?;
            let observed = self.lifecycle.observed_replica_count(namespace, kind).await?;
            if observed == expected {
                return Ok(());
            }
            if budget.expired() {
                return Err(EngineError::StuckScaling {
                    namespace: namespace.to_string(),
                    kind: kind.to_string(),
                    desired: expected,
                    observed,
                }
                .into());
            }
            tokio::time::sleep(budget.remaining().min(Duration::from_millis(200))).await;
        }
    }

    /// Committed consumption per replica group for a kind, for observability
    pub async fn group_utilization(
        &self,
        namespace: &str,
        kind: &str,
    ) -> anyhow::Result<BTreeMap<GroupId, f64>> {
        let state = self.namespace_state(namespace)?;
        let st = state.lock().await;
        Ok(st
            .groups
            .groups_for_kind(kind)
            .map(|g| (g.id.clone(), g.committed_consumption()))
            .collect())
    }

    pub fn namespace_names(&self) -> Vec<String> {
        self.namespaces.iter().map(|e| e.key().clone()).collect()
    }

    pub async fn namespace_phase(&self, namespace: &str) -> anyhow::Result<NamespacePhase> {
        let state = self.namespace_state(namespace)?;
        let st = state.lock().await;
        Ok(st.phase)
    }

    fn namespace_state(&self, name: &str) -> EngineResult<Arc<Mutex<NamespaceState>>> {
        self.namespaces
            .get(name)
            .map(|e| e.value().clone())
            .ok_or_else(|| EngineError::NotFound(format!("namespace '{name}'")))
    }
}

/// Whether the given destinations' summed consumption fits every per-kind
/// ceiling and the aggregate ceiling
fn within_ceilings(plan: &NamespacePlan, destinations: &[PlannedDestination]) -> bool {
    let mut per_kind: BTreeMap<&str, f64> = BTreeMap::new();
    let mut aggregate = 0.0;
    for dest in destinations {
        for request in &dest.plan.requests {
            *per_kind.entry(request.kind.as_str()).or_insert(0.0) += request.fraction;
        }
        aggregate += dest.plan.aggregate_consumption();
    }
    per_kind
        .iter()
        .all(|(kind, total)| *total <= plan.ceiling(kind) + CAPACITY_EPSILON)
        && aggregate <= plan.aggregate_ceiling() + CAPACITY_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::DestinationType;
    use crate::identity::InMemoryIdentityProvider;
    use crate::plans::{DestinationPlan, NamespacePlan};
    use crate::resources::{ResourceDefinition, AGGREGATE_KIND};
    use crate::scaling::InMemoryLifecycleManager;

    fn test_registry() -> Arc<PlanRegistry> {
        let registry = Arc::new(PlanRegistry::new());
        registry
            .register_resource_definition(ResourceDefinition::new("broker"))
            .unwrap();
        registry
            .register_resource_definition(ResourceDefinition::new("router"))
            .unwrap();
        registry
            .register_destination_plan(
                DestinationPlan::new("pooled-queue", DestinationType::Queue)
                    .with_request("broker", 0.6),
            )
            .unwrap();
        registry
            .register_namespace_plan(
                NamespacePlan::new("small-space", "standard")
                    .with_ceiling("broker", 0, 2.0)
                    .with_ceiling("router", 1, 1.0)
                    .with_ceiling(AGGREGATE_KIND, 0, 3.0)
                    .with_allowed_plan("pooled-queue"),
            )
            .unwrap();
        registry
    }

    fn test_engine(registry: Arc<PlanRegistry>) -> (Arc<Engine>, Arc<InMemoryLifecycleManager>) {
        let lifecycle = Arc::new(InMemoryLifecycleManager::new());
        let engine = Arc::new(Engine::new(
            registry,
            lifecycle.clone(),
            Arc::new(InMemoryIdentityProvider::new()),
            EngineSettings::default(),
        ));
        (engine, lifecycle)
    }

    #[tokio::test]
    async fn test_create_namespace_unknown_plan_fails() {
        let (engine, _) = test_engine(test_registry());
        assert!(engine.create_namespace("ns", "missing-plan").await.is_err());
    }

    #[tokio::test]
    async fn test_admission_and_activation() {
        let (engine, _) = test_engine(test_registry());
        engine.create_namespace("ns", "small-space").await.unwrap();
        engine
            .set_destinations(
                "ns",
                vec![
                    DestinationSpec::queue("q1", "pooled-queue"),
                    DestinationSpec::queue("q2", "pooled-queue"),
                ],
            )
            .await
            .unwrap();

        let report = engine.reconcile("ns").await.unwrap();
        assert_eq!(report.accepted, vec!["q1", "q2"]);

        let status = engine.destination_status("ns", "q1").await.unwrap();
        assert_eq!(status.phase, DestinationPhase::Active);
        assert!(status.replica_group_id.is_some());
        assert!(status.status_messages.is_empty());
    }

    #[tokio::test]
    async fn test_quota_rejection_keeps_pending() {
        let (engine, _) = test_engine(test_registry());
        engine.create_namespace("ns", "small-space").await.unwrap();
        // Ceiling 2.0, 4 x 0.6: the fourth does not fit
        engine
            .set_destinations(
                "ns",
                vec![
                    DestinationSpec::queue("d1", "pooled-queue"),
                    DestinationSpec::queue("d2", "pooled-queue"),
                    DestinationSpec::queue("d3", "pooled-queue"),
                    DestinationSpec::queue("d4", "pooled-queue"),
                ],
            )
            .await
            .unwrap();

        engine.reconcile("ns").await.unwrap();

        let status = engine.destination_status("ns", "d4").await.unwrap();
        assert_eq!(status.phase, DestinationPhase::Pending);
        assert!(status.status_messages.contains(&QUOTA_EXCEEDED.to_string()));
    }

    #[tokio::test]
    async fn test_idempotent_reconcile() {
        let (engine, lifecycle) = test_engine(test_registry());
        engine.create_namespace("ns", "small-space").await.unwrap();
        engine
            .set_destinations("ns", vec![DestinationSpec::queue("q1", "pooled-queue")])
            .await
            .unwrap();

        engine.reconcile("ns").await.unwrap();
        let intents_after_first = lifecycle.intents().len();

        let report = engine.reconcile("ns").await.unwrap();
        assert!(report.accepted.is_empty());
        assert!(report.intents.is_empty());
        assert_eq!(lifecycle.intents().len(), intents_after_first);
    }

    #[tokio::test]
    async fn test_pending_retries_after_capacity_frees() {
        let (engine, _) = test_engine(test_registry());
        engine.create_namespace("ns", "small-space").await.unwrap();
        engine
            .set_destinations(
                "ns",
                vec![
                    DestinationSpec::queue("d1", "pooled-queue"),
                    DestinationSpec::queue("d2", "pooled-queue"),
                    DestinationSpec::queue("d3", "pooled-queue"),
                    DestinationSpec::queue("d4", "pooled-queue"),
                ],
            )
            .await
            .unwrap();
        engine.reconcile("ns").await.unwrap();

        // Deleting d1 frees 0.6 units; d4 is re-admitted automatically
        engine.remove_destination("ns", "d1").await.unwrap();
        let report = engine.reconcile("ns").await.unwrap();
        assert_eq!(report.accepted, vec!["d4"]);

        let status = engine.destination_status("ns", "d4").await.unwrap();
        assert_eq!(status.phase, DestinationPhase::Active);
        assert!(status.status_messages.is_empty());
    }

    #[tokio::test]
    async fn test_disallowed_plan_rejected() {
        let registry = test_registry();
        registry
            .register_destination_plan(
                DestinationPlan::new("other-queue", DestinationType::Queue)
                    .with_request("broker", 0.1),
            )
            .unwrap();
        let (engine, _) = test_engine(registry);
        engine.create_namespace("ns", "small-space").await.unwrap();
        engine
            .set_destinations("ns", vec![DestinationSpec::queue("q1", "other-queue")])
            .await
            .unwrap();

        engine.reconcile("ns").await.unwrap();
        let status = engine.destination_status("ns", "q1").await.unwrap();
        assert_eq!(status.phase, DestinationPhase::Pending);
        assert!(status.status_messages[0].contains("not permitted"));
    }

    #[tokio::test]
    async fn test_router_min_replicas_scaled_up_front() {
        let (engine, lifecycle) = test_engine(test_registry());
        engine.create_namespace("ns", "small-space").await.unwrap();

        engine.reconcile("ns").await.unwrap();
        // No destinations, but the plan demands one router replica
        assert_eq!(
            lifecycle.observed_replica_count("ns", "router").await.unwrap(),
            1
        );
    }
}
