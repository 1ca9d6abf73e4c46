//! Players: stockpiles, owned objects, and the population cap.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::objects::{Cost, ObjectId, ResourceKind};

/// Index of a player in the simulation's player list.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct PlayerId(pub u32);

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "player {}", self.0)
    }
}

/// A player's resource stockpile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stockpile {
    amounts: [u32; 3],
}

impl Stockpile {
    /// Create a stockpile with the given starting amounts.
    #[must_use]
    pub fn new(food: u32, gold: u32, wood: u32) -> Self {
        Self {
            amounts: [food, gold, wood],
        }
    }

    /// Current amount of one kind.
    #[must_use]
    pub const fn amount(&self, kind: ResourceKind) -> u32 {
        self.amounts[kind.index()]
    }

    /// Whether every line of `cost` is covered.
    #[must_use]
    pub fn can_afford(&self, cost: Cost) -> bool {
        cost.iter().all(|&(kind, amount)| self.amount(kind) >= amount)
    }

    /// Deduct `cost` atomically. Nothing is deducted on failure.
    pub fn spend(&mut self, cost: Cost) -> Result<()> {
        for &(kind, required) in cost {
            let available = self.amount(kind);
            if available < required {
                return Err(SimError::InsufficientResources {
                    resource: kind,
                    required,
                    available,
                });
            }
        }
        for &(kind, amount) in cost {
            self.amounts[kind.index()] -= amount;
        }
        Ok(())
    }

    /// Return `cost` to the stockpile (command rollback).
    pub fn refund(&mut self, cost: Cost) {
        for &(kind, amount) in cost {
            self.amounts[kind.index()] += amount;
        }
    }

    /// Add `amount` of one kind.
    pub fn deposit(&mut self, kind: ResourceKind, amount: u32) {
        self.amounts[kind.index()] += amount;
    }
}

/// One participant in the simulation.
///
/// Owned id sets are `BTreeSet` so per-player iteration order is the id
/// order, independent of hash seeding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Slot in the simulation's player list.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Banked resources.
    pub stockpile: Stockpile,
    /// Living units owned by this player.
    pub units: BTreeSet<ObjectId>,
    /// Standing buildings owned by this player.
    pub buildings: BTreeSet<ObjectId>,
    /// Maximum unit count, raised by houses and town centers.
    pub population_cap: u32,
}

impl Player {
    /// Create a player with the given starting stockpile and no objects.
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>, stockpile: Stockpile) -> Self {
        Self {
            id,
            name: name.into(),
            stockpile,
            units: BTreeSet::new(),
            buildings: BTreeSet::new(),
            population_cap: 0,
        }
    }

    /// Current unit count.
    #[must_use]
    pub fn population(&self) -> u32 {
        self.units.len() as u32
    }

    /// Whether one more unit fits under the cap.
    #[must_use]
    pub fn has_population_room(&self) -> bool {
        self.population() < self.population_cap
    }

    /// Register a freshly spawned unit, enforcing the population cap.
    pub fn add_unit(&mut self, id: ObjectId) -> Result<()> {
        if !self.has_population_room() {
            return Err(SimError::PopulationLimit {
                current: self.population(),
                max: self.population_cap,
            });
        }
        self.units.insert(id);
        Ok(())
    }

    /// Remove a unit after its death.
    pub fn remove_unit(&mut self, id: ObjectId) {
        self.units.remove(&id);
    }

    /// Register a completed building and claim its population bonus.
    pub fn add_building(&mut self, id: ObjectId, population_bonus: u32) {
        self.buildings.insert(id);
        self.population_cap += population_bonus;
    }

    /// Remove a destroyed building and surrender its population bonus.
    ///
    /// The cap can drop below the current population; existing units stay,
    /// but no new unit spawns until room reopens.
    pub fn remove_building(&mut self, id: ObjectId, population_bonus: u32) {
        self.buildings.remove(&id);
        self.population_cap = self.population_cap.saturating_sub(population_bonus);
    }
}
