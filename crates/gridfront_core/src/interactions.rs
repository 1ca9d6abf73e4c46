//! Validated mutation primitives over the grid and object state.
//!
//! This is the only module allowed to write grid cells or flip object
//! liveness; commands and tasks go through these functions. Every function
//! either fully succeeds or leaves all state unchanged.

use crate::coordinate::Coordinate;
use crate::error::{Result, SimError};
use crate::map::Map;
use crate::objects::{BuildingKind, GameObject, ObjectId, ObjectKind, ObjectStore, ResourceKind};
use crate::player::{Player, PlayerId};

fn player_mut(players: &mut [Player], id: PlayerId) -> Result<&mut Player> {
    players
        .get_mut(id.0 as usize)
        .ok_or_else(|| SimError::InvalidState(format!("unknown {id}")))
}

fn position_of(obj: &GameObject) -> Result<Coordinate> {
    obj.coordinate
        .ok_or_else(|| SimError::InvalidState(format!("object {} is not placed", obj.id)))
}

/// Put an object onto the grid at `anchor` and record its position.
pub fn place_object(
    map: &mut Map,
    objects: &mut ObjectStore,
    id: ObjectId,
    anchor: Coordinate,
) -> Result<()> {
    let obj = objects.fetch_mut(id)?;
    map.place(id, obj.size, anchor)?;
    obj.coordinate = Some(anchor);
    obj.alive = true;
    Ok(())
}

/// Take an object off the grid and mark it dead.
///
/// Owner bookkeeping (unit counts, population bonuses) is the caller's
/// concern; see [`destroy_object`].
pub fn remove_object(map: &mut Map, objects: &mut ObjectStore, id: ObjectId) -> Result<()> {
    let obj = objects.fetch_mut(id)?;
    if let Some(anchor) = obj.coordinate {
        map.remove_at(anchor)?;
    }
    obj.coordinate = None;
    obj.alive = false;
    Ok(())
}

/// Remove an object and unwind its owner's bookkeeping: dead units free
/// population room, dead buildings surrender their population bonus.
pub fn destroy_object(
    map: &mut Map,
    objects: &mut ObjectStore,
    players: &mut [Player],
    id: ObjectId,
) -> Result<()> {
    remove_object(map, objects, id)?;
    let obj = objects.fetch(id)?;
    match &obj.kind {
        ObjectKind::Resource(_) => {}
        ObjectKind::Unit(unit) => {
            player_mut(players, unit.owner)?.remove_unit(id);
        }
        ObjectKind::Building(building) => {
            let bonus = building.kind.population_bonus();
            player_mut(players, building.owner)?.remove_building(id, bonus);
        }
    }
    Ok(())
}

/// Step a unit one cell. Adjacency and placement are enforced by the grid.
pub fn move_unit(
    map: &mut Map,
    objects: &mut ObjectStore,
    id: ObjectId,
    to: Coordinate,
) -> Result<()> {
    map.relocate(id, to)?;
    objects.fetch_mut(id)?.coordinate = Some(to);
    Ok(())
}

/// Apply one swing of damage from `attacker` to the occupant of `target`.
///
/// Fails if the target is out of the attacker's range, empty, reserved, or
/// a resource node. A killed occupant leaves the grid and its owner's
/// bookkeeping immediately.
pub fn attack(
    map: &mut Map,
    objects: &mut ObjectStore,
    players: &mut [Player],
    attacker: ObjectId,
    target: Coordinate,
) -> Result<()> {
    let obj = objects.fetch(attacker)?;
    let from = position_of(obj)?;
    let unit = obj
        .unit_state()
        .ok_or_else(|| SimError::InvalidState(format!("attacker {} is not a unit", obj.id)))?;
    let range = unit.kind.range();
    let damage = unit.kind.attack();

    if !from.is_in_range(target, range) {
        return Err(SimError::OutOfRange { from, to: target });
    }
    let victim_id = map.occupant(target).ok_or(SimError::InvalidTarget {
        at: target,
        reason: "no occupant",
    })?;
    let victim = objects.fetch_mut(victim_id)?;
    if matches!(victim.kind, ObjectKind::Resource(_)) {
        return Err(SimError::InvalidTarget {
            at: target,
            reason: "cannot attack a resource",
        });
    }

    if victim.apply_damage(damage) {
        destroy_object(map, objects, players, victim_id)?;
    }
    Ok(())
}

/// Gather up to `amount` from the resource (or farm) at `target` into the
/// unit's cargo hold, clamped to the hold's free space. A depleted source
/// is removed from the grid.
pub fn collect_resource(
    map: &mut Map,
    objects: &mut ObjectStore,
    players: &mut [Player],
    collector: ObjectId,
    target: Coordinate,
    amount: u32,
) -> Result<()> {
    let obj = objects.fetch(collector)?;
    let from = position_of(obj)?;
    if !from.is_adjacent(target) {
        return Err(SimError::OutOfRange { from, to: target });
    }

    let source_id = map.occupant(target).ok_or(SimError::InvalidTarget {
        at: target,
        reason: "no occupant",
    })?;
    let source = objects.fetch_mut(source_id)?;
    let (kind, taken, depleted) = match &mut source.kind {
        ObjectKind::Resource(node) => {
            let taken = node.collect(amount);
            (node.kind, taken, node.is_depleted())
        }
        ObjectKind::Building(building) if building.kind == BuildingKind::Farm => {
            let taken = amount.min(building.food);
            building.food -= taken;
            (ResourceKind::Food, taken, building.food == 0)
        }
        _ => {
            return Err(SimError::InvalidTarget {
                at: target,
                reason: "not a resource",
            })
        }
    };

    let unit = objects
        .fetch_mut(collector)?
        .unit_state_mut()
        .ok_or_else(|| SimError::InvalidState(format!("collector {collector} is not a unit")))?;
    unit.cargo.load(kind, taken);

    if depleted {
        destroy_object(map, objects, players, source_id)?;
    }
    Ok(())
}

/// Empty the unit's cargo into its owner's stockpile via the drop-point
/// building occupying `target`.
pub fn drop_resource(
    map: &Map,
    objects: &mut ObjectStore,
    players: &mut [Player],
    carrier: ObjectId,
    target: Coordinate,
) -> Result<()> {
    let obj = objects.fetch(carrier)?;
    let from = position_of(obj)?;
    if !from.is_adjacent(target) {
        return Err(SimError::OutOfRange { from, to: target });
    }

    let building_id = map.occupant(target).ok_or(SimError::InvalidTarget {
        at: target,
        reason: "no occupant",
    })?;
    let is_drop_point = objects
        .fetch(building_id)?
        .building_state()
        .is_some_and(|b| b.kind.is_drop_point());
    if !is_drop_point {
        return Err(SimError::InvalidTarget {
            at: target,
            reason: "not a drop point",
        });
    }

    let unit = objects
        .fetch_mut(carrier)?
        .unit_state_mut()
        .ok_or_else(|| SimError::InvalidState(format!("carrier {carrier} is not a unit")))?;
    let owner = unit.owner;
    let amounts = unit.cargo.drain();
    let stockpile = &mut player_mut(players, owner)?.stockpile;
    for kind in ResourceKind::ALL {
        stockpile.deposit(kind, amounts[kind.index()]);
    }
    Ok(())
}

/// Register a unit or building into its owner's collections.
///
/// Units count against the population cap; buildings raise it by their
/// bonus. Resources have no owner and are rejected.
pub fn link_owner(objects: &ObjectStore, players: &mut [Player], id: ObjectId) -> Result<()> {
    let obj = objects.fetch(id)?;
    match &obj.kind {
        ObjectKind::Unit(unit) => player_mut(players, unit.owner)?.add_unit(id),
        ObjectKind::Building(building) => {
            let bonus = building.kind.population_bonus();
            player_mut(players, building.owner)?.add_building(id, bonus);
            Ok(())
        }
        ObjectKind::Resource(_) => Err(SimError::InvalidTarget {
            at: obj.coordinate.unwrap_or_default(),
            reason: "resources have no owner",
        }),
    }
}
