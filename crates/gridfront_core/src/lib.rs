//! # Gridfront Core
//!
//! Deterministic tick-driven economy simulation for a grid RTS.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! Players own units and buildings on a shared occupancy grid, issue
//! long-running behaviors (move, build, gather-and-haul, attack), and those
//! behaviors resolve over discrete ticks while contending for the grid,
//! shared stockpiles, and a population cap.
//!
//! ## Crate Structure
//!
//! - [`coordinate`] - Integer grid points and distance arithmetic
//! - [`map`] - Occupancy grid, placement, reservations, spatial search
//! - [`pathfinding`] - A* over the grid
//! - [`objects`] - Units, buildings, resource nodes and their arena
//! - [`player`] - Stockpiles and the population cap
//! - [`interactions`] - Validated mutation primitives
//! - [`command`] - Timed one-shot commands and the shared command list
//! - [`task`] - Multi-tick behaviors composing commands
//! - [`simulation`] - State ownership and the tick driver
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod command;
pub mod coordinate;
pub mod error;
pub mod interactions;
pub mod map;
pub mod math;
pub mod objects;
pub mod pathfinding;
pub mod player;
pub mod simulation;
pub mod task;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::command::{Command, CommandId, CommandList, Process};
    pub use crate::coordinate::Coordinate;
    pub use crate::error::{Result, SimError};
    pub use crate::map::{Cell, Footprint, Map, MapView};
    pub use crate::math::Fixed;
    pub use crate::objects::{
        BuildingKind, GameObject, ObjectId, ObjectKind, ObjectStore, ResourceKind, UnitKind,
    };
    pub use crate::pathfinding::PathMode;
    pub use crate::player::{Player, PlayerId, Stockpile};
    pub use crate::simulation::{Simulation, TickEvents};
    pub use crate::task::{
        BuildTask, CollectAndDropTask, KillTask, MoveTask, SpawnTask, Task, TaskStatus,
    };
}
