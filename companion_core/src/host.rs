// Collaborator interfaces the task core is driven through.
//
// The host game owns the world, entity movement, storage networks and the
// chat sink. The core sees them only through the narrow traits below and a
// `TickContext` that bundles one mutable borrow of each for the duration of
// a single tick. Nothing here is retained across ticks, so the host is free
// to mutate its world between calls.
//
// `StorageNetwork` is best effort: every method returns a `StorageOutcome`
// whose `Unavailable` arm (network absent, chunk unloaded, integration not
// installed) is distinct from an empty `Ready` result. Callers treat
// `Unavailable` as "try the next source", never as an error.
//
// See also: `sandbox.rs` for the in-memory implementations used by tests and
// the sandbox binary, `inventory.rs` for `AgentBody`, `companion.rs` for the
// tick entry point that builds a `TickContext`.

use crate::inventory::AgentBody;
use crate::items::{ItemKind, ItemStack};
use crate::types::{Block, EntityId, VoxelCoord};
use companion_prng::RandomSource;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnimalSpecies {
    Cow,
    Pig,
    Sheep,
    Chicken,
    Rabbit,
    Horse,
    Donkey,
    Llama,
    Wolf,
    Cat,
    Parrot,
}

impl AnimalSpecies {
    /// Rideable animals; never hunted.
    pub fn is_mount(self) -> bool {
        matches!(self, AnimalSpecies::Horse | AnimalSpecies::Donkey | AnimalSpecies::Llama)
    }

    /// Tameable helpers; never hunted.
    pub fn is_utility(self) -> bool {
        matches!(self, AnimalSpecies::Wolf | AnimalSpecies::Cat | AnimalSpecies::Parrot)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Animal(AnimalSpecies),
    Hostile,
    Villager,
    Golem,
    Player,
    /// A dropped item lying in the world.
    Item,
}

/// What the world reports about one entity at the moment of the query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: VoxelCoord,
    pub health: f32,
    /// Carries a player-given name tag.
    pub named: bool,
    pub leashed: bool,
    /// Flagged by another mod or the host as not game fauna.
    pub non_game: bool,
    /// Ticks before a dropped item may be picked up.
    pub pickup_delay: u32,
    /// Contents when `kind` is `Item`.
    pub item: Option<ItemStack>,
}

impl EntitySnapshot {
    /// A fresh snapshot with no flags set.
    pub fn new(id: EntityId, kind: EntityKind, position: VoxelCoord, health: f32) -> Self {
        Self {
            id,
            kind,
            position,
            health,
            named: false,
            leashed: false,
            non_game: false,
            pickup_delay: 0,
            item: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AttackOutcome {
    Hit { remaining_health: f32 },
    Killed,
    /// The entity no longer exists.
    Missing,
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Block and entity access. Reads of unloaded or out-of-range positions
/// return `Block::Air`; writes there fail.
pub trait World {
    fn block_at(&self, pos: VoxelCoord) -> Block;
    fn is_loaded(&self, pos: VoxelCoord) -> bool;
    /// Whether nothing solid lies above `pos` up to the build limit.
    fn sky_visible(&self, pos: VoxelCoord) -> bool;

    /// Remove the block and return its drops. Nothing drops (and nothing
    /// changes) for air or unbreakable blocks.
    fn break_block(&mut self, pos: VoxelCoord) -> SmallVec<[ItemStack; 2]>;
    fn place_block(&mut self, pos: VoxelCoord, block: Block) -> bool;
    /// Remove a vegetation or decoration block without drops. Returns false
    /// (and changes nothing) for anything else.
    fn clear_vegetation(&mut self, pos: VoxelCoord) -> bool;

    /// Item slots of the container block at `pos`, if there is one.
    fn container_mut(&mut self, pos: VoxelCoord) -> Option<&mut crate::items::Container>;

    fn entities_near(&self, center: VoxelCoord, radius: u32) -> Vec<EntitySnapshot>;
    fn attack(&mut self, target: EntityId, damage: f32) -> AttackOutcome;
    /// Remove a dropped-item entity and hand over its stack.
    fn pick_up(&mut self, item: EntityId) -> Option<ItemStack>;
    fn spawn_drop(&mut self, pos: VoxelCoord, stack: ItemStack);
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

/// Fire-and-forget movement. `move_to` replaces any current goal; the host
/// moves the agent's body between ticks.
pub trait Navigator {
    fn move_to(&mut self, target: VoxelCoord, speed: f64);
    fn is_done(&self) -> bool;
    fn stop(&mut self);
}

// ---------------------------------------------------------------------------
// Storage network
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageOutcome<T> {
    /// The network could not be consulted at all.
    Unavailable,
    Ready(T),
}

impl<T> StorageOutcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            StorageOutcome::Ready(v) => Some(v),
            StorageOutcome::Unavailable => None,
        }
    }
}

pub type ItemFilter<'a> = &'a dyn Fn(&ItemKind) -> bool;

pub trait StorageNetwork {
    fn find_access_points(&mut self, center: VoxelCoord, radius: u32) -> StorageOutcome<Vec<VoxelCoord>>;
    fn extract_items(&mut self, point: VoxelCoord, filter: ItemFilter<'_>, max: u32) -> StorageOutcome<Vec<ItemStack>>;
    fn query_available_items(&self, point: VoxelCoord, filter: ItemFilter<'_>) -> StorageOutcome<Vec<ItemStack>>;
    /// Ask the network to craft `count` of `kind`. `Ready(true)` means the
    /// job was accepted and results can be extracted afterwards.
    fn request_craft(&mut self, point: VoxelCoord, kind: ItemKind, count: u32) -> StorageOutcome<bool>;
}

/// A storage network that is never there.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoStorageNetwork;

impl StorageNetwork for NoStorageNetwork {
    fn find_access_points(&mut self, _: VoxelCoord, _: u32) -> StorageOutcome<Vec<VoxelCoord>> {
        StorageOutcome::Unavailable
    }

    fn extract_items(&mut self, _: VoxelCoord, _: ItemFilter<'_>, _: u32) -> StorageOutcome<Vec<ItemStack>> {
        StorageOutcome::Unavailable
    }

    fn query_available_items(&self, _: VoxelCoord, _: ItemFilter<'_>) -> StorageOutcome<Vec<ItemStack>> {
        StorageOutcome::Unavailable
    }

    fn request_craft(&mut self, _: VoxelCoord, _: ItemKind, _: u32) -> StorageOutcome<bool> {
        StorageOutcome::Unavailable
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// User-facing text sink (chat). Fire and forget.
pub trait Reporter {
    fn report(&mut self, message: &str);
}

/// Forwards reports to the `tracing` log at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&mut self, message: &str) {
        tracing::info!(target: "companion::chat", "{message}");
    }
}

// ---------------------------------------------------------------------------
// Tick context
// ---------------------------------------------------------------------------

/// Everything a machine may touch during one tick.
pub struct TickContext<'a> {
    pub tick: u64,
    pub world: &'a mut dyn World,
    pub nav: &'a mut dyn Navigator,
    pub body: &'a mut AgentBody,
    pub storage: &'a mut dyn StorageNetwork,
    pub reporter: &'a mut dyn Reporter,
    pub rng: &'a mut dyn RandomSource,
}

impl TickContext<'_> {
    pub fn position(&self) -> VoxelCoord {
        self.body.position
    }

    /// Put a stack into the inventory, spilling whatever does not fit as a
    /// world drop at the agent's feet.
    pub fn receive(&mut self, stack: ItemStack) {
        if let Some(left) = self.body.inventory.add_item(stack) {
            tracing::debug!(?left, "inventory full, spilling");
            self.world.spawn_drop(self.body.position, left);
        }
    }
}
