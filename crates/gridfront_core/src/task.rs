//! Multi-tick behaviors that sequence commands toward a goal.
//!
//! A task is owned by its entity (`GameObject::task`) and driven once per
//! tick. Tasks never touch the grid directly; they issue commands through
//! the simulation and watch for their handles to leave the command list.
//! A recoverable failure anywhere below clears the task.

use serde::{Deserialize, Serialize};

use crate::command::CommandId;
use crate::coordinate::Coordinate;
use crate::error::{Result, SimError};
use crate::map::Footprint;
use crate::objects::{BuildingKind, ObjectId, ResourceKind, UnitKind, CARGO_CAPACITY};
use crate::simulation::Simulation;

/// A spawn counts as launched once this close to completion, so the
/// building can immediately queue the next one.
pub const SPAWN_LAUNCH_MS: u64 = 20_000;

/// What one `execute` call decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Keep the task attached and call again next tick.
    Running,
    /// Goal reached (or given up); detach the task.
    Done,
}

/// Closed set of task behaviors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Task {
    /// Walk a precomputed path.
    Move(MoveTask),
    /// Chase and attack until the target dies.
    Kill(KillTask),
    /// Gather until full, haul to a drop point, unload.
    CollectAndDrop(CollectAndDropTask),
    /// Walk to a site and construct a building there.
    Build(BuildTask),
    /// Train a unit on the nearest free cell.
    Spawn(SpawnTask),
}

impl Task {
    /// Drive the task one tick.
    pub fn execute(&mut self, sim: &mut Simulation, entity: ObjectId) -> Result<TaskStatus> {
        match self {
            Self::Move(task) => task.execute(sim, entity),
            Self::Kill(task) => task.execute(sim, entity),
            Self::CollectAndDrop(task) => task.execute(sim, entity),
            Self::Build(task) => task.execute(sim, entity),
            Self::Spawn(task) => task.execute(sim, entity),
        }
    }

    /// Command handles this task still tracks, including nested legs.
    /// Cancelling a task rolls all of these back.
    #[must_use]
    pub fn active_commands(&self) -> Vec<CommandId> {
        let mut handles = Vec::new();
        match self {
            Self::Move(task) => handles.extend(task.command),
            Self::Kill(task) => {
                handles.extend(task.command);
                handles.extend(task.move_task.command);
            }
            Self::CollectAndDrop(task) => {
                handles.extend(task.command);
                handles.extend(task.move_task.command);
            }
            Self::Build(task) => {
                handles.extend(task.command);
                handles.extend(task.move_task.command);
            }
            Self::Spawn(task) => handles.extend(task.command),
        }
        handles
    }
}

fn entity_position(sim: &Simulation, entity: ObjectId) -> Result<Coordinate> {
    sim.objects()
        .fetch(entity)?
        .coordinate
        .ok_or_else(|| SimError::InvalidState(format!("entity {entity} is not placed")))
}

/// Walks a path one move command at a time.
///
/// The path is computed once at construction; a step that becomes blocked
/// fails the next move command and, through the task layer, clears the
/// whole task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveTask {
    path: Vec<Coordinate>,
    step: usize,
    command: Option<CommandId>,
}

impl MoveTask {
    /// Plan an 8-directional path from the entity's position to `target`.
    pub fn new(sim: &Simulation, entity: ObjectId, target: Coordinate) -> Result<Self> {
        let from = entity_position(sim, entity)?;
        let path = crate::pathfinding::find_path(
            sim.map(),
            from,
            target,
            crate::pathfinding::PathMode::Diagonal,
        )?;
        Ok(Self::from_path(path))
    }

    /// Plan a 4-directional path; used to sidestep out of a diagonal that
    /// range-1 attackers cannot swing across.
    pub fn cardinal(sim: &Simulation, entity: ObjectId, target: Coordinate) -> Result<Self> {
        let from = entity_position(sim, entity)?;
        let path = crate::pathfinding::find_path(
            sim.map(),
            from,
            target,
            crate::pathfinding::PathMode::Cardinal,
        )?;
        Ok(Self::from_path(path))
    }

    /// Plan a path that stays out of `site` except at the destination.
    pub fn avoiding(
        sim: &Simulation,
        entity: ObjectId,
        target: Coordinate,
        site: Footprint,
    ) -> Result<Self> {
        let from = entity_position(sim, entity)?;
        let path = crate::pathfinding::find_path_avoiding(sim.map(), from, target, site)?;
        Ok(Self::from_path(path))
    }

    fn from_path(path: Vec<Coordinate>) -> Self {
        Self {
            path,
            step: 0,
            command: None,
        }
    }

    /// Whether a move command of this task is still registered.
    fn has_live_command(&self, sim: &Simulation) -> bool {
        self.command.is_some_and(|id| sim.has_command(id))
    }

    fn execute(&mut self, sim: &mut Simulation, entity: ObjectId) -> Result<TaskStatus> {
        if let Some(id) = self.command {
            if sim.has_command(id) {
                return Ok(TaskStatus::Running);
            }
            self.command = None;
            // The command is gone either because it completed or because it
            // failed at resolution (the waypoint got occupied after
            // planning). Only a step the unit actually stands on counts as
            // progress; anything else fails the task.
            let at = entity_position(sim, entity)?;
            if at != self.path[self.step] {
                let goal = self.path.last().copied().unwrap_or(at);
                return Err(SimError::NoPath { from: at, to: goal });
            }
            self.step += 1;
        }
        if self.step >= self.path.len() {
            return Ok(TaskStatus::Done);
        }
        self.command = Some(sim.issue_move(entity, self.path[self.step])?);
        Ok(TaskStatus::Running)
    }
}

/// Chases the occupant of a cell and keeps attacking until it dies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillTask {
    target: Coordinate,
    move_task: MoveTask,
    command: Option<CommandId>,
}

impl KillTask {
    /// Plan an approach toward the target cell.
    pub fn new(sim: &Simulation, entity: ObjectId, target: Coordinate) -> Result<Self> {
        Ok(Self {
            target,
            move_task: MoveTask::new(sim, entity, target)?,
            command: None,
        })
    }

    fn target_alive(&self, sim: &Simulation) -> bool {
        sim.map()
            .occupant(self.target)
            .and_then(|id| sim.objects().get(id))
            .is_some_and(|o| o.alive)
    }

    fn execute(&mut self, sim: &mut Simulation, entity: ObjectId) -> Result<TaskStatus> {
        if let Some(id) = self.command {
            if sim.has_command(id) {
                // Cooldown from the previous swing.
                return Ok(TaskStatus::Running);
            }
            self.command = None;
        }
        if !self.target_alive(sim) {
            return Ok(TaskStatus::Done);
        }

        let attacker = sim.objects().fetch(entity)?;
        let from = entity_position(sim, entity)?;
        let range = attacker
            .unit_state()
            .map(|u| u.kind.range())
            .ok_or_else(|| SimError::InvalidState(format!("attacker {entity} is not a unit")))?;

        if !from.is_in_range(self.target, range) {
            // Diagonally adjacent with a melee range of 1: the Euclidean
            // check fails on sqrt(2), so sidestep onto a cardinal cell
            // instead of stepping into the target.
            if from.is_adjacent(self.target) && !self.move_task.has_live_command(sim) {
                self.move_task = MoveTask::cardinal(sim, entity, self.target)?;
            }
            if self.move_task.execute(sim, entity)? == TaskStatus::Done {
                // Path exhausted without ever reaching range.
                return Ok(TaskStatus::Done);
            }
            return Ok(TaskStatus::Running);
        }

        self.command = Some(sim.issue_attack(entity, self.target)?);
        Ok(TaskStatus::Running)
    }
}

/// Which leg of the harvest loop the villager is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum HaulPhase {
    /// Walking to the source and gathering.
    Gather,
    /// Walking back to the drop point.
    Haul,
    /// Drop command issued; waiting for it to resolve.
    Dropping,
}

/// Gathers from a source until the hold is full (or the source is gone),
/// hauls to a drop point, unloads, and completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectAndDropTask {
    resource: Coordinate,
    drop: Coordinate,
    kind: ResourceKind,
    move_task: MoveTask,
    phase: HaulPhase,
    command: Option<CommandId>,
}

impl CollectAndDropTask {
    /// Plan a harvest loop between the source at `resource` and the drop
    /// point cell at `drop`. The resource kind is fixed at construction;
    /// farms count as food sources.
    pub fn new(
        sim: &Simulation,
        entity: ObjectId,
        resource: Coordinate,
        drop: Coordinate,
    ) -> Result<Self> {
        let source = sim
            .map()
            .occupant(resource)
            .and_then(|id| sim.objects().get(id))
            .ok_or(SimError::InvalidTarget {
                at: resource,
                reason: "no occupant",
            })?;
        let kind = match &source.kind {
            crate::objects::ObjectKind::Resource(node) => node.kind,
            _ if source.is_gatherable() => ResourceKind::Food,
            _ => {
                return Err(SimError::InvalidTarget {
                    at: resource,
                    reason: "not a resource",
                })
            }
        };
        Ok(Self {
            resource,
            drop,
            kind,
            move_task: MoveTask::new(sim, entity, resource)?,
            phase: HaulPhase::Gather,
            command: None,
        })
    }

    fn source_remains(&self, sim: &Simulation) -> bool {
        sim.map()
            .occupant(self.resource)
            .and_then(|id| sim.objects().get(id))
            .is_some_and(|o| o.alive && o.is_gatherable())
    }

    fn execute(&mut self, sim: &mut Simulation, entity: ObjectId) -> Result<TaskStatus> {
        if let Some(id) = self.command {
            if sim.has_command(id) {
                return Ok(TaskStatus::Running);
            }
            self.command = None;
            if self.phase == HaulPhase::Dropping {
                // Cargo is banked; only now does the task clear.
                return Ok(TaskStatus::Done);
            }
        }

        match self.phase {
            HaulPhase::Gather => {
                let carried = sim
                    .objects()
                    .fetch(entity)?
                    .unit_state()
                    .ok_or_else(|| {
                        SimError::InvalidState(format!("collector {entity} is not a unit"))
                    })?
                    .cargo
                    .amount(self.kind);
                if carried >= CARGO_CAPACITY || !self.source_remains(sim) {
                    self.phase = HaulPhase::Haul;
                    self.move_task = MoveTask::new(sim, entity, self.drop)?;
                    return self.execute(sim, entity);
                }

                let from = entity_position(sim, entity)?;
                if !from.is_adjacent(self.resource) {
                    self.move_task.execute(sim, entity)?;
                    return Ok(TaskStatus::Running);
                }
                self.command = Some(sim.issue_collect(entity, self.resource)?);
                Ok(TaskStatus::Running)
            }
            HaulPhase::Haul => {
                let from = entity_position(sim, entity)?;
                if !from.is_adjacent(self.drop) {
                    self.move_task.execute(sim, entity)?;
                    return Ok(TaskStatus::Running);
                }
                self.command = Some(sim.issue_drop(entity, self.drop)?);
                self.phase = HaulPhase::Dropping;
                Ok(TaskStatus::Running)
            }
            HaulPhase::Dropping => Ok(TaskStatus::Done),
        }
    }
}

/// Walks a villager to a build site and constructs one building there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildTask {
    site: Coordinate,
    building: BuildingKind,
    move_task: MoveTask,
    command: Option<CommandId>,
    issued: bool,
}

impl BuildTask {
    /// Plan an approach that routes around the future footprint, so the
    /// builder never ends up inside the cells about to be reserved.
    pub fn new(
        sim: &Simulation,
        entity: ObjectId,
        building: BuildingKind,
        site: Coordinate,
    ) -> Result<Self> {
        let rect = Footprint {
            anchor: site,
            size: building.size(),
        };
        Ok(Self {
            site,
            building,
            move_task: MoveTask::avoiding(sim, entity, site, rect)?,
            command: None,
            issued: false,
        })
    }

    fn execute(&mut self, sim: &mut Simulation, entity: ObjectId) -> Result<TaskStatus> {
        if let Some(id) = self.command {
            if sim.has_command(id) {
                return Ok(TaskStatus::Running);
            }
            self.command = None;
            return Ok(TaskStatus::Done);
        }
        if self.issued {
            return Ok(TaskStatus::Done);
        }

        let from = entity_position(sim, entity)?;
        if !from.is_adjacent(self.site) {
            if self.move_task.execute(sim, entity)? == TaskStatus::Done {
                return Ok(TaskStatus::Done);
            }
            return Ok(TaskStatus::Running);
        }
        self.command = Some(sim.issue_build(entity, self.building, self.site)?);
        self.issued = true;
        Ok(TaskStatus::Running)
    }
}

/// Queues one unit training run at a building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnTask {
    unit: UnitKind,
    target: Coordinate,
    command: Option<CommandId>,
}

impl SpawnTask {
    /// Pick the nearest free cell around the building as the spawn point.
    pub fn new(sim: &Simulation, building: ObjectId, unit: UnitKind) -> Result<Self> {
        let anchor = entity_position(sim, building)?;
        let target = sim
            .map()
            .find_nearest_empty_zones(anchor, 1)
            .first()
            .copied()
            .ok_or(SimError::Placement(anchor))?;
        Ok(Self {
            unit,
            target,
            command: None,
        })
    }

    fn execute(&mut self, sim: &mut Simulation, entity: ObjectId) -> Result<TaskStatus> {
        match self.command {
            None => {
                self.command = Some(sim.issue_spawn(entity, self.unit, self.target)?);
                Ok(TaskStatus::Running)
            }
            Some(id) => match sim.command_remaining(id) {
                // The spawn resolved (or failed); either way the task is over.
                None => Ok(TaskStatus::Done),
                // Launched: close enough to completion that the building may
                // queue its next spawn. The command finishes on its own.
                Some(remaining) if remaining <= sim.ticks_from_ms(SPAWN_LAUNCH_MS) => {
                    Ok(TaskStatus::Done)
                }
                Some(_) => Ok(TaskStatus::Running),
            },
        }
    }
}
