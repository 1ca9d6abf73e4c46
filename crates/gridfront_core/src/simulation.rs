//! The simulation state and its tick driver.
//!
//! One [`Simulation`] owns the grid, the object arena, the players, and the
//! shared command list. A tick drives every task once, then resolves every
//! command once, in registration order, on a snapshot of the list. All of it
//! is single-threaded and deterministic: same inputs, same state hash.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::command::{
    run_command, CommandContext, CommandId, CommandList, CommandOutcome, CommandState, Process,
};
use crate::coordinate::Coordinate;
use crate::error::{Result, SimError};
use crate::interactions;
use crate::map::{Map, MapView};
use crate::objects::{
    BuildingKind, GameObject, ObjectId, ObjectKind, ObjectStore, ResourceKind, UnitKind,
    ATTACK_COOLDOWN_MS, COLLECT_STROKE_MS,
};
use crate::player::{Player, PlayerId, Stockpile};
use crate::task::{Task, TaskStatus};

/// What happened during one tick.
///
/// Consumed by outer layers (effects, logging, headless reporting); the
/// core itself never reads these back.
#[derive(Debug, Default)]
pub struct TickEvents {
    /// Commands that completed this tick, as (actor, process).
    pub completed: Vec<(ObjectId, Process)>,
    /// Commands that failed and were rolled back, with the error.
    pub failed: Vec<(ObjectId, Process, SimError)>,
    /// Entities whose task finished this tick.
    pub tasks_finished: Vec<ObjectId>,
    /// Entities whose task was dropped after a recoverable failure.
    pub tasks_failed: Vec<(ObjectId, SimError)>,
}

/// The whole deterministic game state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    tick: u64,
    ticks_per_second: u32,
    map: Map,
    objects: ObjectStore,
    players: Vec<Player>,
    commands: CommandList,
}

impl Simulation {
    /// Create an empty simulation on a `map_size` x `map_size` grid.
    ///
    /// # Panics
    ///
    /// Panics if `ticks_per_second` is zero.
    #[must_use]
    pub fn new(map_size: u32, ticks_per_second: u32) -> Self {
        assert!(ticks_per_second > 0, "tick rate must be positive");
        Self {
            tick: 0,
            ticks_per_second,
            map: Map::new(map_size),
            objects: ObjectStore::new(),
            players: Vec::new(),
            commands: CommandList::new(),
        }
    }

    /// Current tick number.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Ticks per simulated second.
    #[must_use]
    pub const fn ticks_per_second(&self) -> u32 {
        self.ticks_per_second
    }

    /// Convert a duration in milliseconds to ticks, truncating.
    #[must_use]
    pub const fn ticks_from_ms(&self, ms: u64) -> u64 {
        ms * self.ticks_per_second as u64 / 1000
    }

    /// The grid.
    #[must_use]
    pub const fn map(&self) -> &Map {
        &self.map
    }

    /// The object arena.
    #[must_use]
    pub const fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    /// The shared command list.
    #[must_use]
    pub const fn commands(&self) -> &CommandList {
        &self.commands
    }

    /// All players.
    #[must_use]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// One player.
    pub fn player(&self, id: PlayerId) -> Result<&Player> {
        self.players
            .get(id.0 as usize)
            .ok_or_else(|| SimError::InvalidState(format!("unknown {id}")))
    }

    /// Read-only grid snapshot for AI or rendering consumers.
    #[must_use]
    pub fn capture_map(&self) -> MapView {
        self.map.capture()
    }

    /// Owner of the object occupying `coord`, for per-cell color lookups.
    #[must_use]
    pub fn owner_at(&self, coord: Coordinate) -> Option<PlayerId> {
        self.map
            .occupant(coord)
            .and_then(|id| self.objects.get(id))
            .and_then(GameObject::owner)
    }

    /// Register a player and return its id.
    pub fn add_player(&mut self, name: impl Into<String>, stockpile: Stockpile) -> PlayerId {
        let id = PlayerId(self.players.len() as u32);
        self.players.push(Player::new(id, name, stockpile));
        id
    }

    /// Place a resource node directly (world setup).
    pub fn spawn_resource(&mut self, kind: ResourceKind, at: Coordinate) -> Result<ObjectId> {
        let id = self.objects.insert(|id| GameObject::resource(id, kind));
        interactions::place_object(&mut self.map, &mut self.objects, id, at)?;
        Ok(id)
    }

    /// Place a unit directly, bypassing training and the population cap
    /// (world setup). Trained units go through the spawn command instead,
    /// which does enforce the cap.
    pub fn spawn_unit(
        &mut self,
        kind: UnitKind,
        owner: PlayerId,
        at: Coordinate,
    ) -> Result<ObjectId> {
        let id = self.objects.insert(|id| GameObject::unit(id, kind, owner));
        interactions::place_object(&mut self.map, &mut self.objects, id, at)?;
        self.players
            .get_mut(owner.0 as usize)
            .ok_or_else(|| SimError::InvalidState(format!("unknown {owner}")))?
            .units
            .insert(id);
        Ok(id)
    }

    /// Place a building directly, bypassing construction (world setup).
    pub fn spawn_building(
        &mut self,
        kind: BuildingKind,
        owner: PlayerId,
        at: Coordinate,
    ) -> Result<ObjectId> {
        let id = self
            .objects
            .insert(|id| GameObject::building(id, kind, owner));
        interactions::place_object(&mut self.map, &mut self.objects, id, at)?;
        interactions::link_owner(&self.objects, &mut self.players, id)?;
        Ok(id)
    }

    fn actor_unit(&self, id: ObjectId) -> Result<(UnitKind, PlayerId)> {
        let obj = self.objects.fetch(id)?;
        obj.unit_state()
            .map(|u| (u.kind, u.owner))
            .ok_or_else(|| SimError::InvalidState(format!("actor {id} is not a unit")))
    }

    /// Register a one-step move command for a unit.
    pub fn issue_move(&mut self, actor: ObjectId, target: Coordinate) -> Result<CommandId> {
        let (kind, owner) = self.actor_unit(actor)?;
        let total = self.ticks_from_ms(kind.step_time_ms());
        self.commands
            .register(actor, owner, target, CommandState::Move, total)
    }

    /// Register an attack command for a unit.
    pub fn issue_attack(&mut self, actor: ObjectId, target: Coordinate) -> Result<CommandId> {
        let (_, owner) = self.actor_unit(actor)?;
        let total = self.ticks_from_ms(ATTACK_COOLDOWN_MS);
        self.commands
            .register(actor, owner, target, CommandState::Attack, total)
    }

    /// Register a single gather stroke for a unit.
    pub fn issue_collect(&mut self, actor: ObjectId, target: Coordinate) -> Result<CommandId> {
        let (_, owner) = self.actor_unit(actor)?;
        let total = self.ticks_from_ms(COLLECT_STROKE_MS);
        self.commands
            .register(actor, owner, target, CommandState::Collect, total)
    }

    /// Register a cargo drop for a unit. Resolves the same tick.
    pub fn issue_drop(&mut self, actor: ObjectId, target: Coordinate) -> Result<CommandId> {
        let (_, owner) = self.actor_unit(actor)?;
        self.commands
            .register(actor, owner, target, CommandState::Drop, 0)
    }

    /// Register a build command for a villager.
    pub fn issue_build(
        &mut self,
        actor: ObjectId,
        building: BuildingKind,
        target: Coordinate,
    ) -> Result<CommandId> {
        let (_, owner) = self.actor_unit(actor)?;
        let total = self.ticks_from_ms(building.build_time_ms());
        self.commands
            .register(actor, owner, target, CommandState::Build { building }, total)
    }

    /// Register a training run at a building. The building must be able to
    /// train the requested unit kind.
    pub fn issue_spawn(
        &mut self,
        actor: ObjectId,
        unit: UnitKind,
        target: Coordinate,
    ) -> Result<CommandId> {
        let obj = self.objects.fetch(actor)?;
        let building = obj.building_state().ok_or_else(|| {
            SimError::InvalidState(format!("spawn actor {actor} is not a building"))
        })?;
        if building.kind.trains() != Some(unit) {
            return Err(SimError::InvalidTarget {
                at: obj.coordinate.unwrap_or_default(),
                reason: "building cannot train this unit",
            });
        }
        let owner = building.owner;
        let total = self.ticks_from_ms(unit.spawn_time_ms());
        self.commands
            .register(actor, owner, target, CommandState::Spawn { unit }, total)
    }

    /// Whether a command is still registered.
    #[must_use]
    pub fn has_command(&self, id: CommandId) -> bool {
        self.commands.contains(id)
    }

    /// Remaining ticks of a registered command.
    #[must_use]
    pub fn command_remaining(&self, id: CommandId) -> Option<u64> {
        self.commands.get(id).map(|cmd| cmd.remaining)
    }

    /// Deregister a command and undo its reservation and cost. Idempotent.
    pub fn cancel_command(&mut self, id: CommandId) {
        if let Some(cmd) = self.commands.remove(id) {
            cmd.rollback(&mut self.map, &mut self.players);
            tracing::debug!(%id, actor = %cmd.actor, process = ?cmd.process(), "command cancelled");
        }
    }

    /// Attach a task to an entity, replacing and rolling back any previous
    /// one.
    pub fn assign_task(&mut self, entity: ObjectId, task: Task) -> Result<()> {
        self.clear_task(entity)?;
        self.objects.fetch_mut(entity)?.task = Some(task);
        Ok(())
    }

    /// Detach an entity's task and cancel its in-flight commands.
    pub fn clear_task(&mut self, entity: ObjectId) -> Result<()> {
        let previous = self.objects.fetch_mut(entity)?.task.take();
        if let Some(task) = previous {
            for id in task.active_commands() {
                self.cancel_command(id);
            }
        }
        Ok(())
    }

    /// Entity ids with a task, per player in id order, units before
    /// buildings.
    fn tasked_entities(&self) -> Vec<ObjectId> {
        let mut ids = Vec::new();
        for player in &self.players {
            ids.extend(player.units.iter().copied());
            ids.extend(player.buildings.iter().copied());
        }
        ids.retain(|&id| self.objects.get(id).is_some_and(|o| o.task.is_some()));
        ids
    }

    fn execute_tasks(&mut self, events: &mut TickEvents) -> Result<()> {
        for entity in self.tasked_entities() {
            // Take the task out so it can borrow the simulation while it
            // runs; it goes back only if it is still running.
            let Some(mut task) = self.objects.get_mut(entity).and_then(|o| o.task.take()) else {
                continue;
            };
            match task.execute(self, entity) {
                Ok(TaskStatus::Running) => {
                    if let Some(obj) = self.objects.get_mut(entity) {
                        obj.task = Some(task);
                    }
                }
                Ok(TaskStatus::Done) => {
                    // In-flight commands (a launched spawn, a cooldown) are
                    // left to finish on their own.
                    events.tasks_finished.push(entity);
                }
                Err(err) if err.is_recoverable() => {
                    tracing::warn!(%entity, error = %err, "task dropped");
                    for id in task.active_commands() {
                        self.cancel_command(id);
                    }
                    events.tasks_failed.push((entity, err));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn run_commands(&mut self, events: &mut TickEvents) -> Result<()> {
        // Commands registered during this pass run next tick.
        for id in self.commands.ids() {
            let Some(mut cmd) = self.commands.remove(id) else {
                continue;
            };
            let mut ctx = CommandContext {
                map: &mut self.map,
                objects: &mut self.objects,
                players: &mut self.players,
            };
            match run_command(&mut cmd, &mut ctx) {
                Ok(CommandOutcome::Running) => self.commands.reinsert(cmd),
                Ok(CommandOutcome::Completed) => {
                    events.completed.push((cmd.actor, cmd.process()));
                }
                Err(err) if err.is_recoverable() => {
                    cmd.rollback(&mut self.map, &mut self.players);
                    tracing::debug!(
                        %id,
                        actor = %cmd.actor,
                        process = ?cmd.process(),
                        error = %err,
                        "command failed"
                    );
                    events.failed.push((cmd.actor, cmd.process(), err));
                }
                Err(err) => {
                    cmd.rollback(&mut self.map, &mut self.players);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Advance the simulation one tick: drive every task, then resolve
    /// every command on a snapshot of the list, then bump the counter.
    pub fn tick(&mut self) -> Result<TickEvents> {
        let mut events = TickEvents::default();
        self.execute_tasks(&mut events)?;
        self.run_commands(&mut events)?;
        self.tick += 1;

        #[cfg(any(debug_assertions, feature = "debug-validation"))]
        {
            tracing::trace!(tick = self.tick, state_hash = self.state_hash(), "tick done");
        }
        #[cfg(feature = "debug-validation")]
        self.validate_placements();
        Ok(events)
    }

    /// Cross-check objects against the grid after every tick; only compiled
    /// with the `debug-validation` feature.
    ///
    /// # Panics
    ///
    /// Panics if a placed object and the grid disagree about its anchor.
    #[cfg(feature = "debug-validation")]
    fn validate_placements(&self) {
        for &id in self.objects.ids() {
            if let Some(anchor) = self.objects.get(id).and_then(|obj| obj.coordinate) {
                assert_eq!(
                    self.map.occupant(anchor),
                    Some(id),
                    "grid desync at {anchor} for {id}"
                );
            }
        }
    }

    /// Nearest cells holding the given resource kind. Farms count as food
    /// sources.
    #[must_use]
    pub fn find_nearest_resources(&self, from: Coordinate, kind: ResourceKind) -> Vec<Coordinate> {
        self.map.find_nearest_matching(from, |id| {
            self.objects.get(id).is_some_and(|obj| match &obj.kind {
                ObjectKind::Resource(node) => node.kind == kind,
                ObjectKind::Building(b) => {
                    kind == ResourceKind::Food && b.kind == BuildingKind::Farm
                }
                ObjectKind::Unit(_) => false,
            })
        })
    }

    /// Nearest cells holding units or buildings not owned by `excluded`.
    #[must_use]
    pub fn find_nearest_enemies(&self, from: Coordinate, excluded: PlayerId) -> Vec<Coordinate> {
        self.map.find_nearest_matching(from, |id| {
            self.objects
                .get(id)
                .and_then(|obj| obj.owner())
                .is_some_and(|owner| owner != excluded)
        })
    }

    /// Nearest drop-point buildings owned by `player`.
    #[must_use]
    pub fn find_nearest_drop_points(&self, from: Coordinate, player: PlayerId) -> Vec<Coordinate> {
        self.map.find_nearest_matching(from, |id| {
            self.objects.get(id).is_some_and(|obj| {
                obj.building_state()
                    .is_some_and(|b| b.owner == player && b.kind.is_drop_point())
            })
        })
    }

    /// Hash of the observable game state, for desync detection. Two
    /// simulations fed identical inputs produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);

        let ids = self.objects.ids();
        ids.len().hash(&mut hasher);
        for &id in ids {
            if let Some(obj) = self.objects.get(id) {
                id.hash(&mut hasher);
                obj.hp.hash(&mut hasher);
                obj.alive.hash(&mut hasher);
                obj.coordinate.hash(&mut hasher);
                if let ObjectKind::Unit(unit) = &obj.kind {
                    for kind in ResourceKind::ALL {
                        unit.cargo.amount(kind).hash(&mut hasher);
                    }
                }
                if let ObjectKind::Resource(node) = &obj.kind {
                    node.amount.hash(&mut hasher);
                }
            }
        }

        for player in &self.players {
            for kind in ResourceKind::ALL {
                player.stockpile.amount(kind).hash(&mut hasher);
            }
            player.population().hash(&mut hasher);
            player.population_cap.hash(&mut hasher);
        }

        self.commands.len().hash(&mut hasher);
        for cmd in self.commands.iter() {
            cmd.id.hash(&mut hasher);
            cmd.remaining.hash(&mut hasher);
            cmd.started.hash(&mut hasher);
        }

        hasher.finish()
    }

    /// Serialize the whole state for saves or replays.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| SimError::InvalidState(format!("failed to serialize simulation: {e}")))
    }

    /// Restore a simulation from [`Simulation::serialize`] output.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| SimError::InvalidState(format!("failed to deserialize simulation: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::SpawnTask;

    /// 10 ticks per second keeps the durations small: a villager step is 8
    /// ticks, a gather stroke 4, a spawn 250.
    fn sim() -> Simulation {
        Simulation::new(24, 10)
    }

    fn sim_with_player(stockpile: Stockpile) -> (Simulation, PlayerId) {
        let mut sim = sim();
        let player = sim.add_player("red", stockpile);
        (sim, player)
    }

    #[test]
    fn test_spawn_pipeline() {
        let (mut sim, player) = sim_with_player(Stockpile::new(200, 0, 0));
        let tc = sim
            .spawn_building(BuildingKind::TownCenter, player, Coordinate::new(5, 5))
            .unwrap();
        assert_eq!(sim.player(player).unwrap().population_cap, 5);

        let task = SpawnTask::new(&sim, tc, UnitKind::Villager).unwrap();
        sim.assign_task(tc, Task::Spawn(task)).unwrap();

        // Villager spawn: 25s = 250 ticks, plus registration and completion
        // overhead. Food is deducted on the first resolution.
        sim.tick().unwrap();
        sim.tick().unwrap();
        assert_eq!(
            sim.player(player).unwrap().stockpile.amount(ResourceKind::Food),
            150
        );

        let mut spawned = false;
        for _ in 0..260 {
            let events = sim.tick().unwrap();
            if events.completed.iter().any(|&(_, p)| p == Process::Spawn) {
                spawned = true;
                break;
            }
        }
        assert!(spawned);
        assert_eq!(sim.player(player).unwrap().population(), 1);

        // The task detached before the command finished (launch threshold).
        assert!(sim.objects().get(tc).unwrap().task.is_none());
    }

    #[test]
    fn test_spawn_rejected_at_population_cap() {
        let (mut sim, player) = sim_with_player(Stockpile::new(500, 0, 0));
        let tc = sim
            .spawn_building(BuildingKind::TownCenter, player, Coordinate::new(5, 5))
            .unwrap();
        for i in 0..5 {
            sim.spawn_unit(UnitKind::Villager, player, Coordinate::new(i, 0))
                .unwrap();
        }
        assert!(!sim.player(player).unwrap().has_population_room());

        let id = sim
            .issue_spawn(tc, UnitKind::Villager, Coordinate::new(10, 10))
            .unwrap();
        let events = sim.tick().unwrap();

        // First resolution fails, the command is gone, nothing was spent.
        assert!(matches!(
            events.failed.as_slice(),
            [(_, Process::Spawn, SimError::PopulationLimit { .. })]
        ));
        assert!(!sim.has_command(id));
        assert_eq!(
            sim.player(player).unwrap().stockpile.amount(ResourceKind::Food),
            500
        );
    }

    #[test]
    fn test_build_cost_is_atomic() {
        let (mut sim, player) = sim_with_player(Stockpile::new(0, 0, 50));
        let builder = sim
            .spawn_unit(UnitKind::Villager, player, Coordinate::new(4, 4))
            .unwrap();
        // Farm costs 60 wood; the player has 50.
        sim.issue_build(builder, BuildingKind::Farm, Coordinate::new(5, 5))
            .unwrap();
        let events = sim.tick().unwrap();

        assert!(matches!(
            events.failed.as_slice(),
            [(_, Process::Build, SimError::InsufficientResources { .. })]
        ));
        assert_eq!(
            sim.player(player).unwrap().stockpile.amount(ResourceKind::Wood),
            50
        );
        assert!(sim.map().check_placement(2, Coordinate::new(5, 5)));
    }

    #[test]
    fn test_build_command_constructs_building() {
        let (mut sim, player) = sim_with_player(Stockpile::new(0, 0, 100));
        let builder = sim
            .spawn_unit(UnitKind::Villager, player, Coordinate::new(4, 4))
            .unwrap();
        sim.issue_build(builder, BuildingKind::House, Coordinate::new(5, 5))
            .unwrap();

        // House: 15s = 150 ticks. Reservation appears on the first tick.
        sim.tick().unwrap();
        assert!(!sim.map().check_placement(2, Coordinate::new(5, 5)));
        assert_eq!(
            sim.player(player).unwrap().stockpile.amount(ResourceKind::Wood),
            75
        );

        for _ in 0..151 {
            sim.tick().unwrap();
        }
        let house = sim.map().occupant(Coordinate::new(5, 5)).unwrap();
        assert_eq!(
            sim.objects().get(house).unwrap().building_state().map(|b| b.kind),
            Some(BuildingKind::House)
        );
        assert_eq!(sim.player(player).unwrap().population_cap, 5);
    }

    #[test]
    fn test_build_fails_if_builder_leaves() {
        let (mut sim, player) = sim_with_player(Stockpile::new(0, 0, 100));
        let builder = sim
            .spawn_unit(UnitKind::Villager, player, Coordinate::new(4, 4))
            .unwrap();
        sim.issue_build(builder, BuildingKind::House, Coordinate::new(5, 5))
            .unwrap();
        sim.tick().unwrap();

        // Drag the builder out of adjacency by hand.
        interactions::move_unit(&mut sim.map, &mut sim.objects, builder, Coordinate::new(3, 3))
            .unwrap();
        let events = sim.tick().unwrap();

        assert!(matches!(
            events.failed.as_slice(),
            [(_, Process::Build, SimError::OutOfRange { .. })]
        ));
        // Full rollback: wood refunded, reservation released.
        assert_eq!(
            sim.player(player).unwrap().stockpile.amount(ResourceKind::Wood),
            100
        );
        assert!(sim.map().check_placement(2, Coordinate::new(5, 5)));
    }

    #[test]
    fn test_cancel_command_rolls_back() {
        let (mut sim, player) = sim_with_player(Stockpile::new(0, 0, 100));
        let builder = sim
            .spawn_unit(UnitKind::Villager, player, Coordinate::new(4, 4))
            .unwrap();
        let id = sim
            .issue_build(builder, BuildingKind::House, Coordinate::new(5, 5))
            .unwrap();
        sim.tick().unwrap();
        assert_eq!(
            sim.player(player).unwrap().stockpile.amount(ResourceKind::Wood),
            75
        );

        sim.cancel_command(id);
        assert_eq!(
            sim.player(player).unwrap().stockpile.amount(ResourceKind::Wood),
            100
        );
        assert!(sim.map().check_placement(2, Coordinate::new(5, 5)));
        // Cancelling again is a no-op.
        sim.cancel_command(id);
    }

    #[test]
    fn test_move_command_takes_step_time() {
        let (mut sim, player) = sim_with_player(Stockpile::default());
        let unit = sim
            .spawn_unit(UnitKind::Villager, player, Coordinate::new(2, 2))
            .unwrap();
        let id = sim.issue_move(unit, Coordinate::new(3, 3)).unwrap();

        // The step applies on the first resolution; the command then holds
        // the unit for the rest of its 8-tick travel window.
        sim.tick().unwrap();
        assert_eq!(
            sim.objects().get(unit).unwrap().coordinate,
            Some(Coordinate::new(3, 3))
        );
        assert!(sim.has_command(id));
        assert_eq!(sim.command_remaining(id), Some(7));

        for _ in 0..8 {
            sim.tick().unwrap();
        }
        assert!(!sim.has_command(id));
    }

    #[test]
    fn test_dead_actor_command_fails_recoverably() {
        let (mut sim, player) = sim_with_player(Stockpile::default());
        sim.spawn_resource(ResourceKind::Wood, Coordinate::new(5, 5))
            .unwrap();
        let villager = sim
            .spawn_unit(UnitKind::Villager, player, Coordinate::new(4, 4))
            .unwrap();
        let id = sim.issue_collect(villager, Coordinate::new(5, 5)).unwrap();
        sim.tick().unwrap();
        assert!(sim.has_command(id));

        // Killed mid-stroke. The orphaned command rolls back on its next
        // resolution instead of halting the run.
        interactions::destroy_object(&mut sim.map, &mut sim.objects, &mut sim.players, villager)
            .unwrap();
        let events = sim.tick().unwrap();
        assert!(matches!(
            events.failed.as_slice(),
            [(_, Process::Collect, SimError::ObjectNotFound(_))]
        ));
        assert!(!sim.has_command(id));
        for _ in 0..10 {
            sim.tick().unwrap();
        }
    }

    #[test]
    fn test_determinism_across_runs() {
        let run = || {
            let (mut sim, player) = sim_with_player(Stockpile::new(100, 0, 100));
            sim.spawn_building(BuildingKind::Camp, player, Coordinate::new(1, 1))
                .unwrap();
            let unit = sim
                .spawn_unit(UnitKind::Villager, player, Coordinate::new(6, 6))
                .unwrap();
            sim.spawn_resource(ResourceKind::Wood, Coordinate::new(9, 9))
                .unwrap();
            let task =
                crate::task::CollectAndDropTask::new(&sim, unit, Coordinate::new(9, 9), Coordinate::new(2, 2))
                    .unwrap();
            sim.assign_task(unit, Task::CollectAndDrop(task)).unwrap();
            for _ in 0..300 {
                sim.tick().unwrap();
            }
            sim.state_hash()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_serialize_roundtrip_preserves_hash() {
        let (mut sim, player) = sim_with_player(Stockpile::new(100, 50, 100));
        sim.spawn_building(BuildingKind::TownCenter, player, Coordinate::new(3, 3))
            .unwrap();
        sim.spawn_unit(UnitKind::Archer, player, Coordinate::new(10, 10))
            .unwrap();
        sim.spawn_resource(ResourceKind::Gold, Coordinate::new(12, 12))
            .unwrap();
        sim.issue_move(ObjectId(1), Coordinate::new(11, 11)).unwrap();
        sim.tick().unwrap();

        let bytes = sim.serialize().unwrap();
        let restored = Simulation::deserialize(&bytes).unwrap();
        assert_eq!(sim.tick_count(), restored.tick_count());
        assert_eq!(sim.state_hash(), restored.state_hash());
    }

    #[test]
    fn test_spatial_queries() {
        let (mut sim, player) = sim_with_player(Stockpile::default());
        let enemy = sim.add_player("blue", Stockpile::default());
        sim.spawn_resource(ResourceKind::Gold, Coordinate::new(4, 0)).unwrap();
        sim.spawn_building(BuildingKind::Farm, player, Coordinate::new(8, 8))
            .unwrap();
        sim.spawn_unit(UnitKind::Swordsman, enemy, Coordinate::new(2, 2))
            .unwrap();
        sim.spawn_unit(UnitKind::Villager, player, Coordinate::new(1, 1))
            .unwrap();

        let gold = sim.find_nearest_resources(Coordinate::new(0, 0), ResourceKind::Gold);
        assert_eq!(gold, vec![Coordinate::new(4, 0)]);

        // Farms answer food queries.
        let food = sim.find_nearest_resources(Coordinate::new(0, 0), ResourceKind::Food);
        assert!(!food.is_empty());

        // Own units are not enemies.
        let enemies = sim.find_nearest_enemies(Coordinate::new(0, 0), player);
        assert_eq!(enemies, vec![Coordinate::new(2, 2)]);
    }
}
