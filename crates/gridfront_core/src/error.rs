//! Error types for the game simulation.

use thiserror::Error;

use crate::command::Process;
use crate::coordinate::Coordinate;
use crate::objects::{ObjectId, ResourceKind};

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for all simulation errors.
///
/// Every variant except [`SimError::InvalidState`] is a local, recoverable
/// failure of one command or task: the task layer drops the offending task
/// and the simulation continues.
#[derive(Debug, Error)]
pub enum SimError {
    /// The footprint cannot be placed at the given anchor cell.
    #[error("cannot place object at {0}")]
    Placement(Coordinate),

    /// A cost could not be covered by the player's stockpile.
    #[error("insufficient resources: need {required} {resource}, have {available}")]
    InsufficientResources {
        /// Resource kind that fell short.
        resource: ResourceKind,
        /// Amount required.
        required: u32,
        /// Amount available.
        available: u32,
    },

    /// The player's population cap is already reached.
    #[error("population limit reached ({current}/{max})")]
    PopulationLimit {
        /// Current unit count.
        current: u32,
        /// Maximum population.
        max: u32,
    },

    /// The target cell is farther than the acting entity can reach.
    #[error("target {to} is out of range from {from}")]
    OutOfRange {
        /// Position of the acting entity.
        from: Coordinate,
        /// Target cell.
        to: Coordinate,
    },

    /// The target cell does not hold a usable occupant.
    #[error("invalid target at {at}: {reason}")]
    InvalidTarget {
        /// Target cell.
        at: Coordinate,
        /// Why the occupant (or lack of one) was rejected.
        reason: &'static str,
    },

    /// The entity already has a conflicting command in flight.
    #[error("entity {actor} already has a conflicting {process:?} command in flight")]
    ConflictingCommand {
        /// The acting entity.
        actor: ObjectId,
        /// Process kind of the conflicting in-flight command.
        process: Process,
    },

    /// No walkable path exists between the two cells.
    #[error("no path from {from} to {to}")]
    NoPath {
        /// Path origin.
        from: Coordinate,
        /// Path destination.
        to: Coordinate,
    },

    /// Invalid object reference.
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// Invalid simulation state (corrupted invariants, serialization failure).
    #[error("invalid simulation state: {0}")]
    InvalidState(String),
}

impl SimError {
    /// Whether the task layer may swallow this error and drop the task.
    ///
    /// [`SimError::InvalidState`] means a broken invariant and must
    /// propagate; everything else is a per-command failure.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidState(_))
    }
}
