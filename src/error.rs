// Engine error taxonomy
// Admission and placement errors are per-destination and never abort a batch;
// only registry-time validation errors are fatal to the operation that caused them.

use thiserror::Error;

/// Errors surfaced by the admission and placement engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// A plan or resource definition is malformed or references an unknown
    /// entity. The offending object is never stored.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A destination does not fit within the namespace plan's remaining
    /// capacity. Resolved automatically when capacity frees up.
    #[error("Quota exceeded")]
    QuotaExceeded,

    /// A destination plan's own consumption of some resource kind exceeds one
    /// full replica, so no ceiling could ever admit it.
    #[error("Destination plan exceeds per-replica capacity")]
    CapacityInfeasible,

    /// Observed replica count has diverged from desired beyond the timeout.
    #[error("scaling stuck for '{kind}' in namespace '{namespace}': desired {desired}, observed {observed}")]
    StuckScaling {
        namespace: String,
        kind: String,
        desired: usize,
        observed: usize,
    },

    /// Reference to an unknown plan, resource definition or destination.
    #[error("not found: {0}")]
    NotFound(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exceeded_message() {
        // Callers match on this exact string in status messages
        assert_eq!(EngineError::QuotaExceeded.to_string(), "Quota exceeded");
    }

    #[test]
    fn test_capacity_infeasible_message() {
        assert_eq!(
            EngineError::CapacityInfeasible.to_string(),
            "Destination plan exceeds per-replica capacity"
        );
    }
}
