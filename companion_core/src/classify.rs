// Spatial classifier: block classes, target safety, and vein/tree flood fill.
//
// `classify` derives a `BlockClass` from whatever the world reports for a
// position right now. Classes are never cached past one search pass; the
// world may change between ticks.
//
// Target safety keeps a gathering agent from wrecking a base. A candidate is
// rejected if it lies in the session's `ProtectedZone` (cells near
// containers, crafting stations, light sources and storage terminals), if
// breaking it would strip a floor, or if it looks like part of a wall. Ore
// and vegetation never look like walls. Generic stone and soil are only fair
// game underground (below the depth threshold or with no open sky).
//
// `vein_queue` runs one bounded flood fill from an accepted origin and
// orders the result for safe consumption: ore bottom-up, logs top-down.
// During felling, leaves of any species near the origin act as connectors so
// branches separated by foliage still join the trunk's queue.
//
// See also: `search.rs` for the BFS and shell primitives, `gather.rs` which
// drives searching and consumes `WorkQueue`s.

use crate::config::GatherConfig;
use crate::host::World;
use crate::search::{Admit, BfsLimits, bounded_bfs};
use crate::types::{Block, FACE_OFFSETS, LATERAL_OFFSETS, NEIGHBORS_26, OreKind, VoxelCoord, WoodSpecies};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum BlockClass {
    Ore(OreKind),
    Wood(WoodSpecies),
    Leaf(WoodSpecies),
    Crop,
    Storage,
    Structural,
    Other,
}

pub fn class_of(block: Block) -> BlockClass {
    match block {
        Block::Ore { kind, .. } => BlockClass::Ore(kind),
        Block::Log(s) => BlockClass::Wood(s),
        Block::Leaves(s) => BlockClass::Leaf(s),
        Block::Crop { .. } => BlockClass::Crop,
        Block::Chest | Block::Barrel | Block::StorageTerminal => BlockClass::Storage,
        Block::Planks(_)
        | Block::Stairs(_)
        | Block::Slab(_)
        | Block::Cobblestone
        | Block::CobbledDeepslate
        | Block::Fence
        | Block::StoneWall
        | Block::Glass
        | Block::Door
        | Block::CraftingTable
        | Block::Furnace
        | Block::Torch
        | Block::Lantern => BlockClass::Structural,
        _ => BlockClass::Other,
    }
}

/// Class of the block currently at `pos`.
pub fn classify(world: &dyn World, pos: VoxelCoord) -> BlockClass {
    class_of(world.block_at(pos))
}

// ---------------------------------------------------------------------------
// Reachability and safety
// ---------------------------------------------------------------------------

/// At least one face neighbour is open.
pub fn is_reachable(world: &dyn World, pos: VoxelCoord) -> bool {
    FACE_OFFSETS
        .iter()
        .any(|&(dx, dy, dz)| !world.block_at(pos.offset(dx, dy, dz)).is_solid())
}

/// Non-solid below and solid above: breaking it leaves a hanging ceiling
/// with nothing to stand on.
pub fn strips_floor(world: &dyn World, pos: VoxelCoord) -> bool {
    !world.block_at(pos.below()).is_solid() && world.block_at(pos.above()).is_solid()
}

/// Exactly one open lateral side, at least two solid lateral sides, solid
/// below, and the same block directly above or below.
pub fn looks_like_wall(world: &dyn World, pos: VoxelCoord) -> bool {
    let block = world.block_at(pos);
    if block.is_natural() {
        return false;
    }
    let mut open = 0;
    let mut solid = 0;
    for &(dx, dy, dz) in &LATERAL_OFFSETS {
        if world.block_at(pos.offset(dx, dy, dz)).is_solid() {
            solid += 1;
        } else {
            open += 1;
        }
    }
    let below = world.block_at(pos.below());
    let above = world.block_at(pos.above());
    open == 1 && solid >= 2 && below.is_solid() && (above == block || below == block)
}

/// Generic stone or soil that is exposed at the surface.
pub fn is_surface_terrain(world: &dyn World, pos: VoxelCoord, depth_threshold: i32) -> bool {
    world.block_at(pos).is_generic_terrain() && pos.y >= depth_threshold && world.sky_visible(pos)
}

/// Cells around base landmarks that a gathering session must not touch,
/// plus any cells its owner excludes outright (a build's own footprint).
///
/// Landmarks are only known inside the regions scanned so far. The zone
/// starts with one scan around the session's start and grows with `cover`
/// as the agent searches further afield; `guards` covers a single cell on
/// demand before answering, so it is exact anywhere.
#[derive(Clone, Debug, Default)]
pub struct ProtectedZone {
    cells: FxHashSet<VoxelCoord>,
    landmarks: Vec<VoxelCoord>,
    landmark_radius: u32,
    /// (center, Chebyshev radius) of every landmark scan so far.
    scanned: Vec<(VoxelCoord, u32)>,
    excluded: FxHashSet<VoxelCoord>,
}

impl ProtectedZone {
    pub fn compute(world: &dyn World, center: VoxelCoord, scan_radius: u32, landmark_radius: u32) -> Self {
        let mut zone = Self {
            landmark_radius,
            ..Self::default()
        };
        zone.cover(world, center, scan_radius);
        zone
    }

    /// Never touch `cells`, landmark or not.
    pub fn exclude(&mut self, cells: impl IntoIterator<Item = VoxelCoord>) {
        self.excluded.extend(cells);
    }

    /// Every cell within `radius` of `center` has already been scanned.
    pub fn covers(&self, center: VoxelCoord, radius: u32) -> bool {
        self.scanned
            .iter()
            .any(|&(c, r)| c.chebyshev_distance(center) + radius <= r)
    }

    /// Scan for landmarks within `radius` of `center` unless that region is
    /// already known, and protect the cells around any new ones.
    pub fn cover(&mut self, world: &dyn World, center: VoxelCoord, radius: u32) {
        if self.covers(center, radius) {
            return;
        }
        let r = radius as i32;
        let before = self.landmarks.len();
        for dy in -r..=r {
            for dz in -r..=r {
                for dx in -r..=r {
                    let p = center.offset(dx, dy, dz);
                    if world.block_at(p).is_landmark() && !self.landmarks.contains(&p) {
                        self.landmarks.push(p);
                    }
                }
            }
        }
        let lr = self.landmark_radius as i32;
        for &lm in &self.landmarks[before..] {
            for dy in -lr..=lr {
                for dz in -lr..=lr {
                    for dx in -lr..=lr {
                        self.cells.insert(lm.offset(dx, dy, dz));
                    }
                }
            }
        }
        self.scanned.push((center, radius));
        if self.landmarks.len() > before {
            tracing::debug!(
                %center,
                radius,
                landmarks = self.landmarks.len(),
                cells = self.cells.len(),
                "protected zone extended"
            );
        }
    }

    /// Whether `pos` is protected, scanning around it first if no earlier
    /// scan reached far enough to see every landmark that could cover it.
    pub fn guards(&mut self, world: &dyn World, pos: VoxelCoord) -> bool {
        self.cover(world, pos, self.landmark_radius);
        self.contains(pos)
    }

    /// Protected according to the regions scanned so far.
    pub fn contains(&self, pos: VoxelCoord) -> bool {
        self.cells.contains(&pos) || self.excluded.contains(&pos)
    }

    pub fn landmarks(&self) -> &[VoxelCoord] {
        &self.landmarks
    }

    pub fn landmark_radius(&self) -> u32 {
        self.landmark_radius
    }

    pub fn len(&self) -> usize {
        self.cells.len() + self.excluded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.excluded.is_empty()
    }
}

/// All safety filters applied to a search candidate.
pub fn is_safe_target(world: &dyn World, pos: VoxelCoord, zone: &ProtectedZone, config: &GatherConfig) -> bool {
    !zone.contains(pos)
        && !strips_floor(world, pos)
        && !looks_like_wall(world, pos)
        && !is_surface_terrain(world, pos, config.surface_depth_threshold)
}

// ---------------------------------------------------------------------------
// Work queues
// ---------------------------------------------------------------------------

/// Positions of one class, consumed front to back. Never longer than its
/// cap.
#[derive(Clone, Debug)]
pub struct WorkQueue {
    class: BlockClass,
    positions: VecDeque<VoxelCoord>,
}

impl WorkQueue {
    pub fn new(class: BlockClass, mut positions: Vec<VoxelCoord>, cap: usize) -> Self {
        positions.truncate(cap);
        Self {
            class,
            positions: positions.into(),
        }
    }

    pub fn class(&self) -> BlockClass {
        self.class
    }

    pub fn pop_front(&mut self) -> Option<VoxelCoord> {
        self.positions.pop_front()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VoxelCoord> {
        self.positions.iter()
    }
}

/// Flood fill over the 26-neighbourhood collecting positions whose block
/// satisfies `matches`, skipping protected cells.
pub fn flood_fill(
    world: &dyn World,
    origin: VoxelCoord,
    cap: usize,
    zone: &ProtectedZone,
    matches: impl Fn(Block) -> bool,
) -> Vec<VoxelCoord> {
    bounded_bfs(
        origin,
        &NEIGHBORS_26,
        BfsLimits { cap, visit_budget: cap.saturating_mul(27) },
        |p| {
            if !zone.contains(p) && world.is_loaded(p) && matches(world.block_at(p)) {
                Admit::Collect
            } else {
                Admit::Reject
            }
        },
    )
}

/// Build the work queue for the vein, tree, or patch containing `origin`.
/// `None` if the origin itself is not collectible.
pub fn vein_queue(world: &dyn World, origin: VoxelCoord, zone: &ProtectedZone, config: &GatherConfig) -> Option<WorkQueue> {
    let origin_block = world.block_at(origin);
    if origin_block.is_air() || zone.contains(origin) {
        return None;
    }
    let class = class_of(origin_block);
    let queue = match origin_block {
        Block::Ore { kind, .. } => {
            let mut found = flood_fill(world, origin, config.vein_cap, zone, |b| {
                matches!(b, Block::Ore { kind: k, .. } if k == kind)
            });
            found.sort_by_key(|p| p.y);
            WorkQueue::new(class, found, config.vein_cap)
        }
        Block::Log(species) => {
            let link = config.leaf_link_radius;
            let mut found = bounded_bfs(
                origin,
                &NEIGHBORS_26,
                BfsLimits {
                    cap: config.tree_cap,
                    visit_budget: config.flood_visit_budget,
                },
                |p| {
                    if zone.contains(p) || !world.is_loaded(p) {
                        return Admit::Reject;
                    }
                    match world.block_at(p) {
                        Block::Log(s) if s == species => Admit::Collect,
                        Block::Leaves(_) if p.chebyshev_distance(origin) <= link => Admit::Connect,
                        _ => Admit::Reject,
                    }
                },
            );
            found.sort_by_key(|p| std::cmp::Reverse(p.y));
            WorkQueue::new(class, found, config.tree_cap)
        }
        Block::Crop { kind, mature } => {
            let found = flood_fill(world, origin, config.vein_cap, zone, |b| {
                b == Block::Crop { kind, mature }
            });
            WorkQueue::new(class, found, config.vein_cap)
        }
        other => {
            let mut found = flood_fill(world, origin, config.vein_cap, zone, |b| b == other);
            found.sort_by_key(|p| p.y);
            WorkQueue::new(class, found, config.vein_cap)
        }
    };
    tracing::debug!(%origin, ?class, size = queue.len(), "flood fill");
    Some(queue)
}
