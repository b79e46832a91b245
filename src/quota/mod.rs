// Quota Calculator
// Pure, order-sensitive greedy admission: candidates are processed in
// caller order against running per-kind and aggregate utilization, and a
// previously-Active destination is never evicted to make room

use crate::plans::{DestinationPlan, NamespacePlan};
use std::collections::BTreeMap;
use tracing::debug;

/// Status message attached to destinations that do not fit
pub const QUOTA_EXCEEDED: &str = "Quota exceeded";

/// Status message for plans that exceed one full replica on their own
pub const PLAN_INFEASIBLE: &str = "Destination plan exceeds per-replica capacity";

/// Tolerance for fraction arithmetic so that inclusive ceilings survive
/// floating-point accumulation (e.g. 0.6 * 3 <= 1.8)
pub(crate) const CAPACITY_EPSILON: f64 = 1e-9;

/// A destination together with its resolved consumption plan
#[derive(Debug, Clone)]
pub struct PlannedDestination {
    pub name: String,
    pub plan: DestinationPlan,
}

impl PlannedDestination {
    pub fn new(name: impl Into<String>, plan: DestinationPlan) -> Self {
        Self {
            name: name.into(),
            plan,
        }
    }
}

/// Per-candidate admission decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    Accepted,
    Rejected(String),
}

/// Resulting utilization after the accepted candidates are committed
#[derive(Debug, Clone, Default)]
pub struct Utilization {
    pub per_kind: BTreeMap<String, f64>,
    pub aggregate: f64,
}

impl Utilization {
    fn add(&mut self, plan: &DestinationPlan) {
        for request in &plan.requests {
            *self.per_kind.entry(request.kind.clone()).or_insert(0.0) += request.fraction;
        }
        self.aggregate += plan.aggregate_consumption();
    }

    pub fn for_kind(&self, kind: &str) -> f64 {
        self.per_kind.get(kind).copied().unwrap_or(0.0)
    }
}

/// Outcome of one admission batch, decisions in caller order
#[derive(Debug, Clone, Default)]
pub struct AdmissionOutcome {
    pub decisions: Vec<(String, AdmissionDecision)>,
    pub utilization: Utilization,
}

impl AdmissionOutcome {
    pub fn accepted(&self) -> impl Iterator<Item = &str> {
        self.decisions
            .iter()
            .filter(|(_, d)| *d == AdmissionDecision::Accepted)
            .map(|(name, _)| name.as_str())
    }

    pub fn rejected(&self) -> impl Iterator<Item = (&str, &str)> {
        self.decisions.iter().filter_map(|(name, d)| match d {
            AdmissionDecision::Rejected(reason) => Some((name.as_str(), reason.as_str())),
            AdmissionDecision::Accepted => None,
        })
    }

    pub fn is_accepted(&self, name: &str) -> bool {
        self.decisions
            .iter()
            .any(|(n, d)| n == name && *d == AdmissionDecision::Accepted)
    }
}

/// Decide which candidates fit within the namespace plan's remaining
/// capacity.
///
/// `baseline` holds the already-Active destinations whose consumption is
/// committed before any candidate is considered. Candidates are admitted
/// greedily in the given order with no backtracking: earlier candidates
/// are favored when capacity is scarce, and reordering the input changes
/// which candidates are accepted. Ceilings are inclusive.
pub fn admit(
    namespace_plan: &NamespacePlan,
    baseline: &[PlannedDestination],
    candidates: &[PlannedDestination],
) -> AdmissionOutcome {
    let mut outcome = AdmissionOutcome::default();

    for dest in baseline {
        outcome.utilization.add(&dest.plan);
    }

    let aggregate_ceiling = namespace_plan.aggregate_ceiling();

    for candidate in candidates {
        // A plan that alone overflows one replica can never fit, no matter
        // how generous the ceilings are
        if let Some(kind) = candidate.plan.infeasible_kind() {
            debug!(
                destination = %candidate.name,
                kind = %kind,
                "Candidate plan exceeds per-replica capacity"
            );
            outcome.decisions.push((
                candidate.name.clone(),
                AdmissionDecision::Rejected(PLAN_INFEASIBLE.to_string()),
            ));
            continue;
        }

        let fits_kinds = candidate.plan.requests.iter().all(|request| {
            let total = outcome.utilization.for_kind(&request.kind) + request.fraction;
            total <= namespace_plan.ceiling(&request.kind) + CAPACITY_EPSILON
        });

        let fits_aggregate = outcome.utilization.aggregate + candidate.plan.aggregate_consumption()
            <= aggregate_ceiling + CAPACITY_EPSILON;

        if fits_kinds && fits_aggregate {
            outcome.utilization.add(&candidate.plan);
            outcome
                .decisions
                .push((candidate.name.clone(), AdmissionDecision::Accepted));
        } else {
            debug!(destination = %candidate.name, "Candidate rejected: quota exceeded");
            outcome.decisions.push((
                candidate.name.clone(),
                AdmissionDecision::Rejected(QUOTA_EXCEEDED.to_string()),
            ));
        }
    }

    outcome
}
