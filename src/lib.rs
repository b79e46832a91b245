// Quince - Multi-Tenant Broker Admission, Placement and Scaling Engine
// Library surface shared by the daemon binary and the integration tests

pub mod cli;
pub mod config;
pub mod destination;
pub mod error;
pub mod identity;
pub mod namespace;
pub mod observability;
pub mod placement;
pub mod plans;
pub mod quota;
pub mod resources;
pub mod scaling;
pub mod signals;

pub use config::QuinceConfig;
pub use destination::{Destination, DestinationPhase, DestinationSpec, DestinationType};
pub use error::{EngineError, EngineResult};
pub use identity::{IdentityProvider, InMemoryIdentityProvider, NoopIdentityProvider};
pub use namespace::{DestinationStatus, Engine, EngineSettings, ReconcileReport};
pub use placement::{GroupId, GroupMode, PlacementAllocator, ReplicaGroup};
pub use plans::{DestinationPlan, NamespacePlan, PlanRegistry, ResourceCeiling};
pub use quota::{AdmissionDecision, AdmissionOutcome, PlannedDestination, Utilization};
pub use resources::{ResourceDefinition, AGGREGATE_KIND};
pub use scaling::{
    InMemoryLifecycleManager, ReplicaLifecycleManager, ScaleIntent, ScalingCondition,
    ScalingCoordinator, ScalingState, TimeoutBudget,
};
