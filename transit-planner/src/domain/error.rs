//! Domain error types.
//!
//! These errors represent validation failures and data inconsistencies
//! in the domain layer. They are distinct from graph and IO errors.

use super::Location;

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DomainError {
    /// Invalid stage construction (e.g., arrival before departure)
    #[error("invalid stage: {0}")]
    InvalidStage(&'static str),

    /// Consecutive stages don't meet at the same place
    #[error("stages do not connect: {0} then {1}")]
    StagesNotConnected(Location, Location),

    /// A stage departs before the previous one arrives
    #[error("stage departs before the previous stage arrives")]
    StagesOverlap,

    /// Journey has no stages
    #[error("journey must have at least one stage")]
    EmptyJourney,
}
