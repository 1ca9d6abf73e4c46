//! Game objects: units, buildings, resource nodes, and their storage arena.
//!
//! Every object lives in [`ObjectStore`] under a monotonically increasing
//! [`ObjectId`]. Objects are never deleted from the store; death marks them
//! `alive = false` and clears their map position, so stale ids stay
//! resolvable as tombstones instead of dangling.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;
use crate::error::{Result, SimError};
use crate::player::PlayerId;
use crate::task::Task;

/// Unique identifier for a game object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ObjectId(pub u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The three collectable resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Food, gathered from food piles and farms.
    Food,
    /// Gold.
    Gold,
    /// Wood.
    Wood,
}

impl ResourceKind {
    /// All kinds, in stockpile slot order.
    pub const ALL: [Self; 3] = [Self::Food, Self::Gold, Self::Wood];

    /// Stockpile slot index.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Food => 0,
            Self::Gold => 1,
            Self::Wood => 2,
        }
    }

    /// Initial amount carried by a freshly placed node of this kind.
    #[must_use]
    pub const fn node_amount(self) -> u32 {
        match self {
            Self::Food => 300,
            Self::Gold => 800,
            Self::Wood => 100,
        }
    }

    /// Whether map generation may scatter nodes of this kind.
    ///
    /// Food only enters the map through farms, never as loose piles.
    #[must_use]
    pub const fn is_spawnable(self) -> bool {
        !matches!(self, Self::Food)
    }

    /// Display tag used by map dumps.
    #[must_use]
    pub const fn tag(self) -> char {
        match self {
            Self::Food => 'F',
            Self::Gold => 'G',
            Self::Wood => 'W',
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Food => "food",
            Self::Gold => "gold",
            Self::Wood => "wood",
        };
        f.write_str(name)
    }
}

/// A unit cost, as (resource, amount) pairs.
pub type Cost = &'static [(ResourceKind, u32)];

/// The trainable unit kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    /// Gatherer and builder. Weak in combat.
    Villager,
    /// Melee infantry.
    Swordsman,
    /// Ranged infantry.
    Archer,
    /// Fast melee cavalry.
    Horseman,
}

impl UnitKind {
    /// Display tag.
    #[must_use]
    pub const fn tag(self) -> char {
        match self {
            Self::Villager => 'v',
            Self::Swordsman => 's',
            Self::Archer => 'a',
            Self::Horseman => 'h',
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Villager => "villager",
            Self::Swordsman => "swordsman",
            Self::Archer => "archer",
            Self::Horseman => "horseman",
        }
    }

    /// Starting hit points.
    #[must_use]
    pub const fn max_hp(self) -> u32 {
        match self {
            Self::Villager => 25,
            Self::Swordsman => 40,
            Self::Archer => 30,
            Self::Horseman => 45,
        }
    }

    /// Training cost.
    #[must_use]
    pub const fn cost(self) -> Cost {
        match self {
            Self::Villager => &[(ResourceKind::Food, 50)],
            Self::Swordsman => &[(ResourceKind::Food, 50), (ResourceKind::Gold, 20)],
            Self::Archer => &[(ResourceKind::Food, 50)],
            Self::Horseman => &[(ResourceKind::Food, 50), (ResourceKind::Gold, 20)],
        }
    }

    /// Training duration in milliseconds.
    #[must_use]
    pub const fn spawn_time_ms(self) -> u64 {
        match self {
            Self::Villager => 25_000,
            Self::Swordsman => 20_000,
            Self::Archer => 35_000,
            Self::Horseman => 30_000,
        }
    }

    /// Damage dealt per attack.
    #[must_use]
    pub const fn attack(self) -> u32 {
        match self {
            Self::Villager => 2,
            Self::Swordsman | Self::Archer | Self::Horseman => 4,
        }
    }

    /// Attack range in cells.
    #[must_use]
    pub const fn range(self) -> u32 {
        match self {
            Self::Archer => 4,
            _ => 1,
        }
    }

    /// Time to move one cell, in milliseconds.
    #[must_use]
    pub const fn step_time_ms(self) -> u64 {
        match self {
            Self::Villager => 800,
            Self::Swordsman => 900,
            Self::Archer => 1_000,
            Self::Horseman => 1_200,
        }
    }
}

/// Time between attack swings, in milliseconds. Same for every unit.
pub const ATTACK_COOLDOWN_MS: u64 = 1_000;

/// Time for one villager gather stroke, in milliseconds (25/60 of a second).
pub const COLLECT_STROKE_MS: u64 = 25_000 / 60;

/// How many resource units a villager can carry.
pub const CARGO_CAPACITY: u32 = 20;

/// The constructible building kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    /// Main hub: drop point, trains villagers, grants population.
    TownCenter,
    /// Grants population capacity.
    House,
    /// Resource drop point.
    Camp,
    /// Renewable food source; counts as a resource for gathering.
    Farm,
    /// Trains swordsmen.
    Barracks,
    /// Trains archers.
    ArcheryRange,
    /// Trains horsemen.
    Stable,
    /// Defensive tower.
    Keep,
}

impl BuildingKind {
    /// Display tag.
    #[must_use]
    pub const fn tag(self) -> char {
        match self {
            Self::TownCenter => 'T',
            Self::House => 'H',
            Self::Camp => 'C',
            Self::Farm => 'f',
            Self::Barracks => 'B',
            Self::ArcheryRange => 'R',
            Self::Stable => 'S',
            Self::Keep => 'K',
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TownCenter => "town center",
            Self::House => "house",
            Self::Camp => "camp",
            Self::Farm => "farm",
            Self::Barracks => "barracks",
            Self::ArcheryRange => "archery range",
            Self::Stable => "stable",
            Self::Keep => "keep",
        }
    }

    /// Footprint edge length in cells.
    #[must_use]
    pub const fn size(self) -> u8 {
        match self {
            Self::TownCenter => 4,
            Self::House | Self::Camp | Self::Farm => 2,
            Self::Barracks | Self::ArcheryRange | Self::Stable => 3,
            Self::Keep => 1,
        }
    }

    /// Hit points when fully constructed.
    #[must_use]
    pub const fn max_hp(self) -> u32 {
        match self {
            Self::TownCenter => 1_000,
            Self::House | Self::Camp => 200,
            Self::Farm => 100,
            Self::Barracks | Self::ArcheryRange | Self::Stable => 500,
            Self::Keep => 800,
        }
    }

    /// Construction cost.
    #[must_use]
    pub const fn cost(self) -> Cost {
        match self {
            Self::TownCenter => &[(ResourceKind::Wood, 350)],
            Self::House => &[(ResourceKind::Wood, 25)],
            Self::Camp => &[(ResourceKind::Wood, 100)],
            Self::Farm => &[(ResourceKind::Wood, 60)],
            Self::Barracks | Self::ArcheryRange | Self::Stable => &[(ResourceKind::Wood, 175)],
            Self::Keep => &[(ResourceKind::Wood, 35), (ResourceKind::Gold, 125)],
        }
    }

    /// Construction duration in milliseconds.
    #[must_use]
    pub const fn build_time_ms(self) -> u64 {
        match self {
            Self::TownCenter => 60_000,
            Self::House | Self::Farm => 15_000,
            Self::Camp => 20_000,
            Self::Barracks | Self::ArcheryRange | Self::Stable => 30_000,
            Self::Keep => 40_000,
        }
    }

    /// Population capacity granted while the building stands.
    #[must_use]
    pub const fn population_bonus(self) -> u32 {
        match self {
            Self::TownCenter | Self::House => 5,
            _ => 0,
        }
    }

    /// Whether villagers can unload cargo here.
    #[must_use]
    pub const fn is_drop_point(self) -> bool {
        matches!(self, Self::TownCenter | Self::Camp)
    }

    /// Unit kind trained here, if any.
    #[must_use]
    pub const fn trains(self) -> Option<UnitKind> {
        match self {
            Self::TownCenter => Some(UnitKind::Villager),
            Self::Barracks => Some(UnitKind::Swordsman),
            Self::ArcheryRange => Some(UnitKind::Archer),
            Self::Stable => Some(UnitKind::Horseman),
            _ => None,
        }
    }

    /// Food stocked by a fresh farm. Farms gather like resource nodes.
    #[must_use]
    pub const fn farm_food(self) -> u32 {
        match self {
            Self::Farm => 300,
            _ => 0,
        }
    }
}

/// What a villager is carrying.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CargoHold {
    amounts: [u32; 3],
}

impl CargoHold {
    /// Amount carried of one kind.
    #[must_use]
    pub const fn amount(&self, kind: ResourceKind) -> u32 {
        self.amounts[kind.index()]
    }

    /// Total amount carried across all kinds.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.amounts.iter().sum()
    }

    /// Whether nothing is carried.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Load up to `amount` of `kind`, clamped to remaining capacity.
    /// Returns how much was actually loaded.
    pub fn load(&mut self, kind: ResourceKind, amount: u32) -> u32 {
        let free = CARGO_CAPACITY.saturating_sub(self.total());
        let loaded = amount.min(free);
        self.amounts[kind.index()] += loaded;
        loaded
    }

    /// Empty the hold, returning the carried amounts in slot order.
    pub fn drain(&mut self) -> [u32; 3] {
        std::mem::take(&mut self.amounts)
    }
}

/// State specific to resource nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    /// What the node yields.
    pub kind: ResourceKind,
    /// Remaining stock.
    pub amount: u32,
}

impl ResourceNode {
    /// Take up to `amount` from the node. Returns what was actually taken.
    pub fn collect(&mut self, amount: u32) -> u32 {
        let taken = amount.min(self.amount);
        self.amount -= taken;
        taken
    }

    /// Whether the node still has stock.
    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.amount == 0
    }
}

/// State specific to units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitState {
    /// Which unit this is.
    pub kind: UnitKind,
    /// Owning player.
    pub owner: PlayerId,
    /// Carried resources (only villagers ever load anything).
    pub cargo: CargoHold,
}

/// State specific to buildings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingState {
    /// Which building this is.
    pub kind: BuildingKind,
    /// Owning player.
    pub owner: PlayerId,
    /// Remaining farm food. Zero for every other building kind.
    pub food: u32,
}

/// Closed set of object categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    /// A gatherable resource node.
    Resource(ResourceNode),
    /// A mobile unit.
    Unit(UnitState),
    /// A placed building.
    Building(BuildingState),
}

/// A single entity on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameObject {
    /// Arena id.
    pub id: ObjectId,
    /// Display name.
    pub name: String,
    /// Single-character display tag.
    pub tag: char,
    /// Remaining hit points.
    pub hp: u32,
    /// False once destroyed. Dead objects keep their id but leave the map.
    pub alive: bool,
    /// Footprint edge length (1 for units and resources).
    pub size: u8,
    /// Anchor cell, `None` while off-map (pending spawn or dead).
    pub coordinate: Option<Coordinate>,
    /// Currently assigned high-level task.
    pub task: Option<Task>,
    /// Category-specific state.
    pub kind: ObjectKind,
}

impl GameObject {
    /// Build a resource node of `kind`.
    #[must_use]
    pub fn resource(id: ObjectId, kind: ResourceKind) -> Self {
        Self {
            id,
            name: kind.to_string(),
            tag: kind.tag(),
            hp: 1,
            alive: true,
            size: 1,
            coordinate: None,
            task: None,
            kind: ObjectKind::Resource(ResourceNode {
                kind,
                amount: kind.node_amount(),
            }),
        }
    }

    /// Build a unit of `kind` owned by `owner`.
    #[must_use]
    pub fn unit(id: ObjectId, kind: UnitKind, owner: PlayerId) -> Self {
        Self {
            id,
            name: kind.name().to_string(),
            tag: kind.tag(),
            hp: kind.max_hp(),
            alive: true,
            size: 1,
            coordinate: None,
            task: None,
            kind: ObjectKind::Unit(UnitState {
                kind,
                owner,
                cargo: CargoHold::default(),
            }),
        }
    }

    /// Build a building of `kind` owned by `owner`.
    #[must_use]
    pub fn building(id: ObjectId, kind: BuildingKind, owner: PlayerId) -> Self {
        Self {
            id,
            name: kind.name().to_string(),
            tag: kind.tag(),
            hp: kind.max_hp(),
            alive: true,
            size: kind.size(),
            coordinate: None,
            task: None,
            kind: ObjectKind::Building(BuildingState {
                kind,
                owner,
                food: kind.farm_food(),
            }),
        }
    }

    /// Owning player, if this is a unit or building.
    #[must_use]
    pub fn owner(&self) -> Option<PlayerId> {
        match &self.kind {
            ObjectKind::Resource(_) => None,
            ObjectKind::Unit(u) => Some(u.owner),
            ObjectKind::Building(b) => Some(b.owner),
        }
    }

    /// Unit state accessor.
    #[must_use]
    pub fn unit_state(&self) -> Option<&UnitState> {
        match &self.kind {
            ObjectKind::Unit(u) => Some(u),
            _ => None,
        }
    }

    /// Mutable unit state accessor.
    pub fn unit_state_mut(&mut self) -> Option<&mut UnitState> {
        match &mut self.kind {
            ObjectKind::Unit(u) => Some(u),
            _ => None,
        }
    }

    /// Building state accessor.
    #[must_use]
    pub fn building_state(&self) -> Option<&BuildingState> {
        match &self.kind {
            ObjectKind::Building(b) => Some(b),
            _ => None,
        }
    }

    /// Whether villagers can gather from this object.
    ///
    /// Resource nodes and farms both qualify.
    #[must_use]
    pub fn is_gatherable(&self) -> bool {
        match &self.kind {
            ObjectKind::Resource(_) => true,
            ObjectKind::Building(b) => b.kind == BuildingKind::Farm,
            ObjectKind::Unit(_) => false,
        }
    }

    /// Apply `damage` hit points. Returns true if this killed the object.
    pub fn apply_damage(&mut self, damage: u32) -> bool {
        self.hp = self.hp.saturating_sub(damage);
        if self.hp == 0 && self.alive {
            self.alive = false;
            return true;
        }
        false
    }
}

/// Arena of all game objects, keyed by [`ObjectId`].
///
/// Keeps a sorted id list alongside the hash map so that iteration order is
/// deterministic regardless of hash seeding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectStore {
    objects: HashMap<ObjectId, GameObject>,
    next_id: u64,
    sorted_ids: Vec<ObjectId>,
}

impl ObjectStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id and insert the object built for it.
    pub fn insert(&mut self, make: impl FnOnce(ObjectId) -> GameObject) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.insert(id, make(id));
        // Ids are monotonic, so pushing keeps the list sorted.
        self.sorted_ids.push(id);
        id
    }

    /// Look up an object.
    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    /// Look up an object mutably.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(&id)
    }

    /// Look up an object, failing with [`SimError::ObjectNotFound`].
    pub fn fetch(&self, id: ObjectId) -> Result<&GameObject> {
        self.objects.get(&id).ok_or(SimError::ObjectNotFound(id))
    }

    /// Mutable variant of [`ObjectStore::fetch`].
    pub fn fetch_mut(&mut self, id: ObjectId) -> Result<&mut GameObject> {
        self.objects
            .get_mut(&id)
            .ok_or(SimError::ObjectNotFound(id))
    }

    /// All ids ever allocated, ascending. Includes dead objects.
    #[must_use]
    pub fn ids(&self) -> &[ObjectId] {
        &self.sorted_ids
    }

    /// Iterate objects in id order.
    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.sorted_ids.iter().filter_map(|id| self.objects.get(id))
    }

    /// Number of objects ever allocated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
