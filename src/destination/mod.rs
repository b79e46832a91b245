// Destination Model and Status Machine
// Tracks each destination's lifecycle phase and the human-readable
// reasons it was rejected, surfaced to callers polling for readiness

use crate::placement::GroupId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Kind of addressable messaging endpoint inside a namespace
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DestinationType {
    Queue,
    Topic,
    Anycast,
    Multicast,
}

impl DestinationType {
    /// Default destination plan for this type, used when a caller omits an
    /// explicit plan reference. Kept as a flat lookup table rather than
    /// per-type behavior.
    pub fn default_plan(&self) -> &'static str {
        match self {
            DestinationType::Queue => "standard-queue",
            DestinationType::Topic => "standard-topic",
            DestinationType::Anycast => "standard-anycast",
            DestinationType::Multicast => "standard-multicast",
        }
    }
}

/// Lifecycle phase of a destination
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DestinationPhase {
    /// Awaiting admission, or demoted after capacity was lost
    Pending,
    /// Admitted and assigned to a replica group
    Active,
    /// Permanently rejected until the plan or resource definition changes
    Rejected,
    /// Deletion requested by the caller
    Terminating,
}

/// A caller-supplied desired destination: name, type and plan reference.
/// The plan defaults per destination type when omitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DestinationSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub destination_type: DestinationType,
    #[serde(default)]
    pub plan: Option<String>,
}

impl DestinationSpec {
    pub fn new(
        name: impl Into<String>,
        destination_type: DestinationType,
        plan: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            destination_type,
            plan: Some(plan.into()),
        }
    }

    pub fn queue(name: impl Into<String>, plan: impl Into<String>) -> Self {
        Self::new(name, DestinationType::Queue, plan)
    }

    pub fn topic(name: impl Into<String>, plan: impl Into<String>) -> Self {
        Self::new(name, DestinationType::Topic, plan)
    }

    pub fn anycast(name: impl Into<String>, plan: impl Into<String>) -> Self {
        Self::new(name, DestinationType::Anycast, plan)
    }

    pub fn multicast(name: impl Into<String>, plan: impl Into<String>) -> Self {
        Self::new(name, DestinationType::Multicast, plan)
    }

    /// Plan reference, falling back to the type's default plan
    pub fn plan_name(&self) -> &str {
        self.plan
            .as_deref()
            .unwrap_or_else(|| self.destination_type.default_plan())
    }
}

/// A destination tracked by the engine, unique by name within its namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    pub name: String,
    pub destination_type: DestinationType,
    /// Destination plan name; consumption is resolved against the current
    /// registry snapshot on every reconciliation pass
    pub plan: String,
    pub phase: DestinationPhase,
    /// Replica group assignment per resource kind, empty until accepted
    pub replica_groups: BTreeMap<String, GroupId>,
    /// Accumulated rejection/diagnostic reasons; cleared on activation
    pub status_messages: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Destination {
    pub fn from_spec(spec: &DestinationSpec) -> Self {
        Self {
            name: spec.name.clone(),
            destination_type: spec.destination_type,
            plan: spec.plan_name().to_string(),
            phase: DestinationPhase::Pending,
            replica_groups: BTreeMap::new(),
            status_messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Primary replica group id for callers that only track one, preferring
    /// the broker assignment
    pub fn replica_group_id(&self) -> Option<&GroupId> {
        self.replica_groups
            .get("broker")
            .or_else(|| self.replica_groups.values().next())
    }

    /// Transition to Active. Clears accumulated status messages - this is
    /// the only transition that does.
    pub fn mark_active(&mut self) {
        if self.phase != DestinationPhase::Active {
            info!(destination = %self.name, "Destination is now Active");
        }
        self.phase = DestinationPhase::Active;
        self.status_messages.clear();
    }

    /// Transition to Pending with a reason. Existing replica group
    /// associations are kept so data stays reachable; the destination is
    /// re-offered for admission on the next pass.
    pub fn mark_pending(&mut self, reason: &str) {
        if self.phase == DestinationPhase::Active {
            info!(destination = %self.name, reason = %reason, "Destination demoted to Pending");
        }
        self.phase = DestinationPhase::Pending;
        self.push_message(reason);
    }

    /// Transition to Rejected (permanent until plans change)
    pub fn mark_rejected(&mut self, reason: &str) {
        self.phase = DestinationPhase::Rejected;
        self.push_message(reason);
    }

    /// Transition to Terminating on caller-requested deletion
    pub fn mark_terminating(&mut self) {
        debug!(destination = %self.name, "Destination terminating");
        self.phase = DestinationPhase::Terminating;
    }

    /// Append a status message unless it repeats the latest one, so that
    /// retrying reconciliation passes do not grow the list unbounded
    fn push_message(&mut self, reason: &str) {
        if self.status_messages.last().map(String::as_str) != Some(reason) {
            self.status_messages.push(reason.to_string());
        }
    }
}
