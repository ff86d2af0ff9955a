// In-memory collaborators: a dense voxel world, a straight-line navigator,
// a container-backed storage network, and a collecting reporter.
//
// These stand in for the host game in tests, benchmarks, and the `sandbox`
// binary. `GridWorld` stores blocks in a flat `Vec<Block>` indexed by
// `x + z * size_x + y * size_x * size_z`. Out-of-bounds reads return `Air`
// and out-of-bounds writes are no-ops, so scans can run off the edge of the
// map without special cases.
//
// `Harness` bundles one of each plus an agent body and a seeded `GameRng`,
// and steps a machine the way a host would: build a `TickContext`, run one
// tick, then let the navigator move the body and age dropped items.
//
// See also: `host.rs` for the traits implemented here, `src/bin/sandbox.rs`
// for the demo driver.

use crate::host::{
    AnimalSpecies, AttackOutcome, EntityKind, EntitySnapshot, ItemFilter, Navigator, Reporter, StorageNetwork,
    StorageOutcome, TickContext, World,
};
use crate::inventory::AgentBody;
use crate::items::{Container, FoodKind, ItemKind, ItemStack};
use crate::materials;
use crate::types::{Block, EntityId, VoxelCoord};
use companion_prng::GameRng;
use smallvec::SmallVec;
use std::collections::BTreeMap;

pub const CONTAINER_SLOTS: usize = 27;
const DEFAULT_DROP_PICKUP_DELAY: u32 = 40;

// ---------------------------------------------------------------------------
// GridWorld
// ---------------------------------------------------------------------------

/// Dense block grid with containers and entities.
#[derive(Clone, Debug, Default)]
pub struct GridWorld {
    blocks: Vec<Block>,
    pub size_x: u32,
    pub size_y: u32,
    pub size_z: u32,
    containers: BTreeMap<VoxelCoord, Container>,
    entities: BTreeMap<EntityId, EntitySnapshot>,
    next_entity: u64,
    /// Pickup delay given to items spilled through `spawn_drop`.
    pub drop_pickup_delay: u32,
    /// Every entity hit through `attack`, in order.
    pub attack_log: Vec<EntityId>,
    /// Every successful `place_block`, in order.
    pub placement_log: Vec<(VoxelCoord, Block)>,
}

impl GridWorld {
    /// A world of the given size filled with air.
    pub fn new(size_x: u32, size_y: u32, size_z: u32) -> Self {
        let total = (size_x as usize) * (size_y as usize) * (size_z as usize);
        Self {
            blocks: vec![Block::Air; total],
            size_x,
            size_y,
            size_z,
            drop_pickup_delay: DEFAULT_DROP_PICKUP_DELAY,
            ..Default::default()
        }
    }

    pub fn in_bounds(&self, coord: VoxelCoord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && coord.z >= 0
            && (coord.x as u32) < self.size_x
            && (coord.y as u32) < self.size_y
            && (coord.z as u32) < self.size_z
    }

    fn index(&self, coord: VoxelCoord) -> Option<usize> {
        if !self.in_bounds(coord) {
            return None;
        }
        let sx = self.size_x as usize;
        let sz = self.size_z as usize;
        Some(coord.x as usize + coord.z as usize * sx + coord.y as usize * sx * sz)
    }

    pub fn get(&self, coord: VoxelCoord) -> Block {
        self.index(coord).map_or(Block::Air, |i| self.blocks[i])
    }

    /// Write a block. Container blocks get an empty container; replacing a
    /// container discards its contents.
    pub fn set_block(&mut self, coord: VoxelCoord, block: Block) {
        let Some(i) = self.index(coord) else { return };
        self.blocks[i] = block;
        if block.is_container() {
            self.containers
                .entry(coord)
                .or_insert_with(|| Container::new(CONTAINER_SLOTS));
        } else {
            self.containers.remove(&coord);
        }
    }

    /// Fill the inclusive box between two corners.
    pub fn fill(&mut self, a: VoxelCoord, b: VoxelCoord, block: Block) {
        for y in a.y.min(b.y)..=a.y.max(b.y) {
            for z in a.z.min(b.z)..=a.z.max(b.z) {
                for x in a.x.min(b.x)..=a.x.max(b.x) {
                    self.set_block(VoxelCoord::new(x, y, z), block);
                }
            }
        }
    }

    pub fn container(&self, pos: VoxelCoord) -> Option<&Container> {
        self.containers.get(&pos)
    }

    /// Number of positions holding `block`.
    pub fn count_blocks(&self, block: Block) -> usize {
        self.blocks.iter().filter(|&&b| b == block).count()
    }

    pub fn spawn_entity(&mut self, mut snapshot: EntitySnapshot) -> EntityId {
        self.next_entity += 1;
        let id = EntityId(self.next_entity);
        snapshot.id = id;
        self.entities.insert(id, snapshot);
        id
    }

    pub fn add_animal(&mut self, species: AnimalSpecies, pos: VoxelCoord) -> EntityId {
        self.spawn_entity(EntitySnapshot::new(EntityId(0), EntityKind::Animal(species), pos, 10.0))
    }

    pub fn add_hostile(&mut self, pos: VoxelCoord) -> EntityId {
        self.spawn_entity(EntitySnapshot::new(EntityId(0), EntityKind::Hostile, pos, 20.0))
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut EntitySnapshot> {
        self.entities.get_mut(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.entities.values()
    }

    /// Age dropped items by one tick.
    pub fn advance_tick(&mut self) {
        for e in self.entities.values_mut() {
            e.pickup_delay = e.pickup_delay.saturating_sub(1);
        }
    }

    fn spawn_item(&mut self, pos: VoxelCoord, stack: ItemStack, delay: u32) {
        let mut item = EntitySnapshot::new(EntityId(0), EntityKind::Item, pos, 1.0);
        item.item = Some(stack);
        item.pickup_delay = delay;
        self.spawn_entity(item);
    }
}

fn carcass_drop(species: AnimalSpecies) -> Option<ItemStack> {
    let food = match species {
        AnimalSpecies::Cow => FoodKind::RawBeef,
        AnimalSpecies::Pig => FoodKind::RawPorkchop,
        AnimalSpecies::Sheep => FoodKind::RawMutton,
        AnimalSpecies::Chicken => FoodKind::RawChicken,
        AnimalSpecies::Rabbit => FoodKind::RawRabbit,
        _ => return None,
    };
    Some(ItemStack::new(ItemKind::Food(food), 2))
}

impl World for GridWorld {
    fn block_at(&self, pos: VoxelCoord) -> Block {
        self.get(pos)
    }

    fn is_loaded(&self, pos: VoxelCoord) -> bool {
        self.in_bounds(pos)
    }

    fn sky_visible(&self, pos: VoxelCoord) -> bool {
        (pos.y + 1..self.size_y as i32).all(|y| !self.get(VoxelCoord::new(pos.x, y, pos.z)).is_solid())
    }

    fn break_block(&mut self, pos: VoxelCoord) -> SmallVec<[ItemStack; 2]> {
        let block = self.get(pos);
        if block.hardness().is_none() {
            return SmallVec::new();
        }
        if let Some(contents) = self.containers.remove(&pos) {
            for (_, stack) in contents.iter() {
                self.spawn_item(pos, *stack, 0);
            }
        }
        self.set_block(pos, Block::Air);
        block.drops()
    }

    fn place_block(&mut self, pos: VoxelCoord, block: Block) -> bool {
        let current = self.get(pos);
        if !self.in_bounds(pos) || !(current.is_air() || current.is_liquid() || current.is_clearable()) {
            return false;
        }
        self.set_block(pos, block);
        self.placement_log.push((pos, block));
        true
    }

    fn clear_vegetation(&mut self, pos: VoxelCoord) -> bool {
        if !self.get(pos).is_clearable() {
            return false;
        }
        self.set_block(pos, Block::Air);
        true
    }

    fn container_mut(&mut self, pos: VoxelCoord) -> Option<&mut Container> {
        self.containers.get_mut(&pos)
    }

    fn entities_near(&self, center: VoxelCoord, radius: u32) -> Vec<EntitySnapshot> {
        let reach = radius as f64;
        self.entities
            .values()
            .filter(|e| e.position.within(center, reach))
            .cloned()
            .collect()
    }

    fn attack(&mut self, target: EntityId, damage: f32) -> AttackOutcome {
        let Some(entity) = self.entities.get_mut(&target) else {
            return AttackOutcome::Missing;
        };
        self.attack_log.push(target);
        entity.health -= damage;
        if entity.health > 0.0 {
            return AttackOutcome::Hit {
                remaining_health: entity.health,
            };
        }
        let (kind, pos) = (entity.kind, entity.position);
        self.entities.remove(&target);
        if let EntityKind::Animal(species) = kind
            && let Some(stack) = carcass_drop(species)
        {
            self.spawn_item(pos, stack, 0);
        }
        AttackOutcome::Killed
    }

    fn pick_up(&mut self, item: EntityId) -> Option<ItemStack> {
        match self.entities.get(&item) {
            Some(e) if e.kind == EntityKind::Item => self.entities.remove(&item).and_then(|e| e.item),
            _ => None,
        }
    }

    fn spawn_drop(&mut self, pos: VoxelCoord, stack: ItemStack) {
        let delay = self.drop_pickup_delay;
        self.spawn_item(pos, stack, delay);
    }
}

// ---------------------------------------------------------------------------
// StepNavigator
// ---------------------------------------------------------------------------

/// Moves the body one block per tick along the axis with the largest
/// remaining distance. No collision, no path planning.
#[derive(Clone, Debug, Default)]
pub struct StepNavigator {
    goal: Option<VoxelCoord>,
    pub steps_taken: u64,
}

impl StepNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn goal(&self) -> Option<VoxelCoord> {
        self.goal
    }

    /// Host-side movement between ticks.
    pub fn advance(&mut self, body: &mut AgentBody) {
        let Some(goal) = self.goal else { return };
        let (dx, dy, dz) = (goal.x - body.position.x, goal.y - body.position.y, goal.z - body.position.z);
        let step = if dx.abs() >= dy.abs() && dx.abs() >= dz.abs() && dx != 0 {
            (dx.signum(), 0, 0)
        } else if dz.abs() >= dy.abs() && dz != 0 {
            (0, 0, dz.signum())
        } else {
            (0, dy.signum(), 0)
        };
        if step != (0, 0, 0) {
            body.position = body.position.offset(step.0, step.1, step.2);
            self.steps_taken += 1;
        }
        if body.position == goal {
            self.goal = None;
        }
    }
}

impl Navigator for StepNavigator {
    fn move_to(&mut self, target: VoxelCoord, _speed: f64) {
        self.goal = Some(target);
    }

    fn is_done(&self) -> bool {
        self.goal.is_none()
    }

    fn stop(&mut self) {
        self.goal = None;
    }
}

// ---------------------------------------------------------------------------
// MemoryStorageNetwork
// ---------------------------------------------------------------------------

/// Access points that all reach one shared container. Crafting requests run
/// the fixed recipes against that container.
#[derive(Clone, Debug)]
pub struct MemoryStorageNetwork {
    pub access_points: Vec<VoxelCoord>,
    pub store: Container,
    pub available: bool,
    pub craft_requests: Vec<(ItemKind, u32)>,
}

impl Default for MemoryStorageNetwork {
    fn default() -> Self {
        Self {
            access_points: Vec::new(),
            store: Container::new(CONTAINER_SLOTS * 4),
            available: true,
            craft_requests: Vec::new(),
        }
    }
}

impl MemoryStorageNetwork {
    pub fn new(access_points: Vec<VoxelCoord>) -> Self {
        Self {
            access_points,
            ..Default::default()
        }
    }

    fn knows(&self, point: VoxelCoord) -> bool {
        self.available && self.access_points.contains(&point)
    }
}

impl StorageNetwork for MemoryStorageNetwork {
    fn find_access_points(&mut self, center: VoxelCoord, radius: u32) -> StorageOutcome<Vec<VoxelCoord>> {
        if !self.available {
            return StorageOutcome::Unavailable;
        }
        let mut found: Vec<_> = self
            .access_points
            .iter()
            .copied()
            .filter(|p| p.chebyshev_distance(center) <= radius)
            .collect();
        found.sort_by_key(|p| (p.distance_squared(center), *p));
        StorageOutcome::Ready(found)
    }

    fn extract_items(&mut self, point: VoxelCoord, filter: ItemFilter<'_>, max: u32) -> StorageOutcome<Vec<ItemStack>> {
        if !self.knows(point) {
            return StorageOutcome::Unavailable;
        }
        StorageOutcome::Ready(self.store.remove_matching(filter, max))
    }

    fn query_available_items(&self, point: VoxelCoord, filter: ItemFilter<'_>) -> StorageOutcome<Vec<ItemStack>> {
        if !self.knows(point) {
            return StorageOutcome::Unavailable;
        }
        StorageOutcome::Ready(
            self.store
                .counts()
                .into_iter()
                .filter(|(k, _)| filter(k))
                .map(|(k, n)| ItemStack::new(k, n))
                .collect(),
        )
    }

    fn request_craft(&mut self, point: VoxelCoord, kind: ItemKind, count: u32) -> StorageOutcome<bool> {
        if !self.knows(point) {
            return StorageOutcome::Unavailable;
        }
        self.craft_requests.push((kind, count));
        let made = materials::craft(&mut self.store, kind, count);
        StorageOutcome::Ready(made > 0)
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// Keeps every report for later inspection.
#[derive(Clone, Debug, Default)]
pub struct CollectingReporter {
    pub messages: Vec<String>,
}

impl CollectingReporter {
    /// Number of reports containing `needle`.
    pub fn count_containing(&self, needle: &str) -> usize {
        self.messages.iter().filter(|m| m.contains(needle)).count()
    }
}

impl Reporter for CollectingReporter {
    fn report(&mut self, message: &str) {
        self.messages.push(message.to_owned());
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// One agent in a `GridWorld`, stepped the way a host would step it.
pub struct Harness {
    pub world: GridWorld,
    pub nav: StepNavigator,
    pub body: AgentBody,
    pub storage: MemoryStorageNetwork,
    pub reporter: CollectingReporter,
    pub rng: GameRng,
    pub tick: u64,
}

impl Harness {
    pub fn new(world: GridWorld, position: VoxelCoord, seed: u64) -> Self {
        Self {
            world,
            nav: StepNavigator::new(),
            body: AgentBody::new(position),
            storage: MemoryStorageNetwork::default(),
            reporter: CollectingReporter::default(),
            rng: GameRng::new(seed),
            tick: 0,
        }
    }

    /// Run `f` as one tick, then move the body and age the world.
    pub fn step<R>(&mut self, f: impl FnOnce(&mut TickContext<'_>) -> R) -> R {
        let mut ctx = TickContext {
            tick: self.tick,
            world: &mut self.world,
            nav: &mut self.nav,
            body: &mut self.body,
            storage: &mut self.storage,
            reporter: &mut self.reporter,
            rng: &mut self.rng,
        };
        let out = f(&mut ctx);
        self.nav.advance(&mut self.body);
        self.world.advance_tick();
        self.tick += 1;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_reads_air_and_writes_nothing() {
        let mut w = GridWorld::new(4, 4, 4);
        let outside = VoxelCoord::new(-1, 2, 2);
        w.set_block(outside, Block::Stone);
        assert_eq!(w.get(outside), Block::Air);
        assert!(!w.place_block(outside, Block::Stone));
        assert!(!w.is_loaded(outside));
    }

    #[test]
    fn containers_follow_their_blocks() {
        let mut w = GridWorld::new(4, 4, 4);
        let p = VoxelCoord::new(1, 1, 1);
        w.set_block(p, Block::Chest);
        w.container_mut(p).unwrap().add_item(ItemStack::new(ItemKind::Coal, 5));
        let drops = w.break_block(p);
        assert_eq!(drops.as_slice(), &[ItemStack::block(Block::Chest, 1)]);
        assert!(w.container(p).is_none());
        // The contents spilled as an item entity.
        assert_eq!(w.entities().filter(|e| e.kind == EntityKind::Item).count(), 1);
    }

    #[test]
    fn sky_visibility_scans_the_column() {
        let mut w = GridWorld::new(4, 10, 4);
        let p = VoxelCoord::new(1, 2, 1);
        assert!(w.sky_visible(p));
        w.set_block(p.offset(0, 5, 0), Block::Leaves(crate::types::WoodSpecies::Oak));
        assert!(!w.sky_visible(p));
        w.set_block(p.offset(0, 5, 0), Block::Torch);
        assert!(w.sky_visible(p));
    }

    #[test]
    fn place_only_into_open_or_clearable_cells() {
        let mut w = GridWorld::new(4, 4, 4);
        let p = VoxelCoord::new(1, 1, 1);
        w.set_block(p, Block::Flower);
        assert!(w.place_block(p, Block::Cobblestone));
        assert!(!w.place_block(p, Block::Dirt));
        assert_eq!(w.placement_log, vec![(p, Block::Cobblestone)]);
    }

    #[test]
    fn killing_an_animal_drops_food() {
        let mut w = GridWorld::new(8, 8, 8);
        let cow = w.add_animal(AnimalSpecies::Cow, VoxelCoord::new(2, 1, 2));
        assert!(matches!(w.attack(cow, 4.0), AttackOutcome::Hit { .. }));
        assert_eq!(w.attack(cow, 100.0), AttackOutcome::Killed);
        assert_eq!(w.attack(cow, 1.0), AttackOutcome::Missing);
        let drop = w.entities().find(|e| e.kind == EntityKind::Item).unwrap();
        assert_eq!(drop.item.unwrap().kind, ItemKind::Food(FoodKind::RawBeef));
    }

    #[test]
    fn step_navigator_walks_dominant_axis() {
        let mut nav = StepNavigator::new();
        let mut body = AgentBody::new(VoxelCoord::new(0, 0, 0));
        nav.move_to(VoxelCoord::new(3, 1, 0), 1.0);
        nav.advance(&mut body);
        assert_eq!(body.position, VoxelCoord::new(1, 0, 0));
        for _ in 0..10 {
            nav.advance(&mut body);
        }
        assert_eq!(body.position, VoxelCoord::new(3, 1, 0));
        assert!(nav.is_done());
        assert_eq!(nav.steps_taken, 4);
    }

    #[test]
    fn unavailable_network_is_distinct_from_empty() {
        let point = VoxelCoord::new(0, 0, 0);
        let mut net = MemoryStorageNetwork::new(vec![point]);
        assert_eq!(net.find_access_points(point, 4), StorageOutcome::Ready(vec![point]));
        assert_eq!(net.extract_items(point, &|k| k.is_food(), 10), StorageOutcome::Ready(vec![]));
        net.available = false;
        assert_eq!(net.find_access_points(point, 4), StorageOutcome::Unavailable);
        assert_eq!(net.extract_items(point, &|k| k.is_food(), 10), StorageOutcome::Unavailable);
    }
}
