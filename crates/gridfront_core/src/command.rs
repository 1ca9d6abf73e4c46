//! Timed one-shot commands and the shared command arena.
//!
//! A command is a counter plus a little state machine, resolved once per
//! tick by the driver. Commands live in one [`CommandList`] per simulation;
//! tasks hold [`CommandId`] handles, never references, and detect completion
//! by the id disappearing from the list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;
use crate::error::{Result, SimError};
use crate::interactions;
use crate::map::Map;
use crate::objects::{BuildingKind, Cost, GameObject, ObjectId, ObjectStore, UnitKind};
use crate::player::{Player, PlayerId};

/// Handle to a registered command.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct CommandId(pub u64);

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cmd#{}", self.0)
    }
}

/// The kind of a command, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Process {
    /// Train a unit at a building.
    Spawn,
    /// Step one cell.
    Move,
    /// One attack swing plus cooldown.
    Attack,
    /// One gather stroke.
    Collect,
    /// Unload cargo, instantaneous.
    Drop,
    /// Construct a building.
    Build,
}

/// A command's kind together with its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandState {
    /// Train `unit` at the acting building; the target cell is reserved
    /// while training runs.
    Spawn {
        /// Unit being trained.
        unit: UnitKind,
    },
    /// Step the acting unit onto the target cell.
    Move,
    /// Swing at the target cell, then cool down.
    Attack,
    /// Cool down, then gather one unit from the target cell.
    Collect,
    /// Unload the acting unit's cargo at the target cell.
    Drop,
    /// Construct `building` anchored at the target cell.
    Build {
        /// Building under construction.
        building: BuildingKind,
    },
}

impl CommandState {
    /// The process kind of this state.
    #[must_use]
    pub const fn process(&self) -> Process {
        match self {
            Self::Spawn { .. } => Process::Spawn,
            Self::Move => Process::Move,
            Self::Attack => Process::Attack,
            Self::Collect => Process::Collect,
            Self::Drop => Process::Drop,
            Self::Build { .. } => Process::Build,
        }
    }
}

/// One registered command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Handle in the list.
    pub id: CommandId,
    /// The entity performing the command.
    pub actor: ObjectId,
    /// The actor's owner.
    pub player: PlayerId,
    /// Target cell.
    pub target: Coordinate,
    /// Ticks left before completion.
    pub remaining: u64,
    /// Ticks at registration.
    pub total: u64,
    /// Whether start-of-command effects (cost deduction, reservation,
    /// the move/attack itself) have been applied.
    pub started: bool,
    /// Kind and payload.
    pub state: CommandState,
}

impl Command {
    /// The process kind.
    #[must_use]
    pub const fn process(&self) -> Process {
        self.state.process()
    }

    /// Resources deducted at start, refunded on rollback.
    #[must_use]
    pub const fn cost(&self) -> Cost {
        match self.state {
            CommandState::Spawn { unit } => unit.cost(),
            CommandState::Build { building } => building.cost(),
            _ => &[],
        }
    }

    /// Undo the start-of-command effects after a failure or cancellation:
    /// release the reserved footprint and refund the deducted cost. Safe to
    /// call on commands that never started.
    pub fn rollback(&self, map: &mut Map, players: &mut [Player]) {
        map.release(self.id);
        if self.started {
            if let Some(player) = players.get_mut(self.player.0 as usize) {
                player.stockpile.refund(self.cost());
            }
        }
    }
}

/// Outcome of one [`run_command`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Still counting down; keep it registered.
    Running,
    /// Finished this tick; drop it from the list.
    Completed,
}

/// The shared, insertion-ordered command arena.
///
/// Ids are monotonic, so iterating the `BTreeMap` visits commands in
/// registration order; within a tick, resource races resolve
/// first-registered-first-served.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandList {
    commands: BTreeMap<CommandId, Command>,
    next_id: u64,
}

impl CommandList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command, enforcing per-actor mutual exclusion.
    ///
    /// A non-spawn command conflicts with any in-flight COLLECT or BUILD of
    /// the same actor, and with an in-flight ATTACK or MOVE of the same
    /// process kind. SPAWN registration is always allowed; buildings may
    /// queue freely and affordability is checked at resolution.
    pub fn register(
        &mut self,
        actor: ObjectId,
        player: PlayerId,
        target: Coordinate,
        state: CommandState,
        total: u64,
    ) -> Result<CommandId> {
        let incoming = state.process();
        if incoming != Process::Spawn {
            for cmd in self.commands.values() {
                if cmd.actor != actor {
                    continue;
                }
                match cmd.process() {
                    Process::Spawn => {}
                    Process::Collect | Process::Build => {
                        return Err(SimError::ConflictingCommand {
                            actor,
                            process: cmd.process(),
                        });
                    }
                    p @ (Process::Attack | Process::Move) if p == incoming => {
                        return Err(SimError::ConflictingCommand { actor, process: p });
                    }
                    _ => {}
                }
            }
        }

        let id = CommandId(self.next_id);
        self.next_id += 1;
        self.commands.insert(
            id,
            Command {
                id,
                actor,
                player,
                target,
                remaining: total,
                total,
                started: false,
                state,
            },
        );
        tracing::trace!(%id, ?incoming, %actor, %target, total, "command registered");
        Ok(id)
    }

    /// Take a command out of the list. Idempotent: an already-removed id
    /// yields `None` without complaint, because a task may try to clean up
    /// a command that resolved itself.
    pub fn remove(&mut self, id: CommandId) -> Option<Command> {
        self.commands.remove(&id)
    }

    /// Put a still-running command back after resolution.
    pub(crate) fn reinsert(&mut self, command: Command) {
        self.commands.insert(command.id, command);
    }

    /// Whether `id` is still registered.
    #[must_use]
    pub fn contains(&self, id: CommandId) -> bool {
        self.commands.contains_key(&id)
    }

    /// Look up a command.
    #[must_use]
    pub fn get(&self, id: CommandId) -> Option<&Command> {
        self.commands.get(&id)
    }

    /// Registered ids in insertion order.
    #[must_use]
    pub fn ids(&self) -> Vec<CommandId> {
        self.commands.keys().copied().collect()
    }

    /// Iterate commands in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Everything a command resolution may touch besides the list itself.
///
/// The command is removed from the list while it runs, so the list never
/// aliases the rest of the world.
pub struct CommandContext<'a> {
    /// The grid.
    pub map: &'a mut Map,
    /// The object arena.
    pub objects: &'a mut ObjectStore,
    /// All players, indexed by [`PlayerId`].
    pub players: &'a mut [Player],
}

fn player_mut<'a>(players: &'a mut [Player], id: PlayerId) -> Result<&'a mut Player> {
    players
        .get_mut(id.0 as usize)
        .ok_or_else(|| SimError::InvalidState(format!("unknown {id}")))
}

/// Resolve a command for one tick.
///
/// Start effects run on the first call; the counter then drops by one per
/// call until it hits zero, and the call after that performs completion
/// effects and reports [`CommandOutcome::Completed`]. On `Err` the caller
/// must roll the command back and drop it.
pub fn run_command(cmd: &mut Command, ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
    // The actor may have been killed while this command was pending; that
    // fails the command recoverably so the driver rolls it back instead of
    // halting the tick.
    if !ctx.objects.fetch(cmd.actor)?.alive {
        return Err(SimError::ObjectNotFound(cmd.actor));
    }
    match cmd.state {
        CommandState::Spawn { unit } => run_spawn(cmd, ctx, unit),
        CommandState::Move => run_move(cmd, ctx),
        CommandState::Attack => run_attack(cmd, ctx),
        CommandState::Collect => run_collect(cmd, ctx),
        CommandState::Drop => run_drop(cmd, ctx),
        CommandState::Build { building } => run_build(cmd, ctx, building),
    }
}

fn countdown(cmd: &mut Command) -> CommandOutcome {
    if cmd.remaining == 0 {
        CommandOutcome::Completed
    } else {
        cmd.remaining -= 1;
        CommandOutcome::Running
    }
}

fn run_spawn(
    cmd: &mut Command,
    ctx: &mut CommandContext<'_>,
    unit: UnitKind,
) -> Result<CommandOutcome> {
    if !cmd.started {
        let player = player_mut(ctx.players, cmd.player)?;
        if !player.has_population_room() {
            return Err(SimError::PopulationLimit {
                current: player.population(),
                max: player.population_cap,
            });
        }
        for &(resource, required) in unit.cost() {
            let available = player.stockpile.amount(resource);
            if available < required {
                return Err(SimError::InsufficientResources {
                    resource,
                    required,
                    available,
                });
            }
        }
        ctx.map.reserve(cmd.id, 1, cmd.target)?;
        // Infallible now that every line was checked above.
        player_mut(ctx.players, cmd.player)?.stockpile.spend(unit.cost())?;
        cmd.started = true;
    }

    match countdown(cmd) {
        CommandOutcome::Running => Ok(CommandOutcome::Running),
        CommandOutcome::Completed => {
            // Population may have filled up while training ran; the caller's
            // rollback refunds the cost and frees the reserved cell.
            let player = player_mut(ctx.players, cmd.player)?;
            if !player.has_population_room() {
                return Err(SimError::PopulationLimit {
                    current: player.population(),
                    max: player.population_cap,
                });
            }
            ctx.map.release(cmd.id);
            let owner = cmd.player;
            let id = ctx.objects.insert(|id| GameObject::unit(id, unit, owner));
            interactions::place_object(ctx.map, ctx.objects, id, cmd.target)?;
            interactions::link_owner(ctx.objects, ctx.players, id)?;
            tracing::debug!(%id, unit = unit.name(), %owner, at = %cmd.target, "unit spawned");
            Ok(CommandOutcome::Completed)
        }
    }
}

fn run_move(cmd: &mut Command, ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
    if !cmd.started {
        interactions::move_unit(ctx.map, ctx.objects, cmd.actor, cmd.target)?;
        cmd.started = true;
    }
    // The remaining ticks model travel time for the already-applied step.
    Ok(countdown(cmd))
}

fn run_attack(cmd: &mut Command, ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
    if !cmd.started {
        interactions::attack(ctx.map, ctx.objects, ctx.players, cmd.actor, cmd.target)?;
        cmd.started = true;
    }
    // Cooldown window before the actor may swing again.
    Ok(countdown(cmd))
}

fn run_collect(cmd: &mut Command, ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
    cmd.started = true;
    match countdown(cmd) {
        CommandOutcome::Running => Ok(CommandOutcome::Running),
        CommandOutcome::Completed => {
            interactions::collect_resource(
                ctx.map,
                ctx.objects,
                ctx.players,
                cmd.actor,
                cmd.target,
                1,
            )?;
            Ok(CommandOutcome::Completed)
        }
    }
}

fn run_drop(cmd: &mut Command, ctx: &mut CommandContext<'_>) -> Result<CommandOutcome> {
    cmd.started = true;
    interactions::drop_resource(ctx.map, ctx.objects, ctx.players, cmd.actor, cmd.target)?;
    Ok(CommandOutcome::Completed)
}

fn run_build(
    cmd: &mut Command,
    ctx: &mut CommandContext<'_>,
    building: BuildingKind,
) -> Result<CommandOutcome> {
    // Unlike spawn, adjacency to the site is revalidated every tick; a
    // builder that wanders (or is pushed) away fails the whole command.
    let builder = ctx.objects.fetch(cmd.actor)?;
    let at = builder.coordinate.ok_or_else(|| SimError::InvalidState(format!(
        "builder {} is not placed",
        cmd.actor
    )))?;
    if !at.is_adjacent(cmd.target) {
        return Err(SimError::OutOfRange {
            from: at,
            to: cmd.target,
        });
    }

    if !cmd.started {
        let player = player_mut(ctx.players, cmd.player)?;
        for &(resource, required) in building.cost() {
            let available = player.stockpile.amount(resource);
            if available < required {
                return Err(SimError::InsufficientResources {
                    resource,
                    required,
                    available,
                });
            }
        }
        ctx.map.reserve(cmd.id, building.size(), cmd.target)?;
        player_mut(ctx.players, cmd.player)?
            .stockpile
            .spend(building.cost())?;
        cmd.started = true;
    }

    match countdown(cmd) {
        CommandOutcome::Running => Ok(CommandOutcome::Running),
        CommandOutcome::Completed => {
            ctx.map.release(cmd.id);
            let owner = cmd.player;
            let id = ctx
                .objects
                .insert(|id| GameObject::building(id, building, owner));
            interactions::place_object(ctx.map, ctx.objects, id, cmd.target)?;
            interactions::link_owner(ctx.objects, ctx.players, id)?;
            tracing::debug!(%id, building = building.name(), %owner, at = %cmd.target, "building constructed");
            Ok(CommandOutcome::Completed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::ResourceKind;
    use crate::player::Stockpile;

    fn list() -> CommandList {
        CommandList::new()
    }

    #[test]
    fn test_collect_blocks_everything() {
        let mut commands = list();
        let actor = ObjectId(1);
        let target = Coordinate::new(2, 2);
        commands
            .register(actor, PlayerId(0), target, CommandState::Collect, 5)
            .unwrap();

        for state in [CommandState::Move, CommandState::Attack, CommandState::Collect] {
            let err = commands
                .register(actor, PlayerId(0), target, state, 5)
                .unwrap_err();
            assert!(matches!(
                err,
                SimError::ConflictingCommand {
                    process: Process::Collect,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_move_and_attack_coexist() {
        let mut commands = list();
        let actor = ObjectId(1);
        let target = Coordinate::new(2, 2);
        commands
            .register(actor, PlayerId(0), target, CommandState::Move, 5)
            .unwrap();
        commands
            .register(actor, PlayerId(0), target, CommandState::Attack, 5)
            .unwrap();

        // But a second move (or attack) of the same kind conflicts.
        assert!(matches!(
            commands.register(actor, PlayerId(0), target, CommandState::Move, 5),
            Err(SimError::ConflictingCommand {
                process: Process::Move,
                ..
            })
        ));
    }

    #[test]
    fn test_spawn_is_exempt_from_exclusion() {
        let mut commands = list();
        let actor = ObjectId(1);
        let target = Coordinate::new(2, 2);
        let state = CommandState::Spawn {
            unit: UnitKind::Villager,
        };
        commands.register(actor, PlayerId(0), target, state, 10).unwrap();
        // A building may queue a second spawn, and an in-flight spawn does
        // not block other processes either.
        commands.register(actor, PlayerId(0), target, state, 10).unwrap();
        commands
            .register(actor, PlayerId(0), target, CommandState::Move, 5)
            .unwrap();
    }

    #[test]
    fn test_removal_is_idempotent() {
        let mut commands = list();
        let id = commands
            .register(ObjectId(1), PlayerId(0), Coordinate::new(0, 0), CommandState::Move, 3)
            .unwrap();
        assert!(commands.remove(id).is_some());
        assert!(commands.remove(id).is_none());
        assert!(!commands.contains(id));
    }

    #[test]
    fn test_insertion_order_iteration() {
        let mut commands = list();
        let a = commands
            .register(ObjectId(1), PlayerId(0), Coordinate::new(0, 0), CommandState::Move, 3)
            .unwrap();
        let b = commands
            .register(ObjectId(2), PlayerId(0), Coordinate::new(1, 1), CommandState::Move, 3)
            .unwrap();
        assert_eq!(commands.ids(), vec![a, b]);
    }

    #[test]
    fn test_rollback_refunds_started_commands_only() {
        let mut map = Map::new(8);
        let mut players = vec![Player::new(PlayerId(0), "red", Stockpile::new(0, 0, 100))];

        let mut cmd = Command {
            id: CommandId(0),
            actor: ObjectId(1),
            player: PlayerId(0),
            target: Coordinate::new(3, 3),
            remaining: 10,
            total: 10,
            started: false,
            state: CommandState::Build {
                building: BuildingKind::House,
            },
        };

        // Unstarted: nothing to refund.
        cmd.rollback(&mut map, &mut players);
        assert_eq!(players[0].stockpile.amount(ResourceKind::Wood), 100);

        players[0].stockpile.spend(cmd.cost()).unwrap();
        map.reserve(cmd.id, 2, cmd.target).unwrap();
        cmd.started = true;

        cmd.rollback(&mut map, &mut players);
        assert_eq!(players[0].stockpile.amount(ResourceKind::Wood), 100);
        assert!(map.check_placement(2, Coordinate::new(3, 3)));
    }
}
