// Build plans and the named blueprint library.
//
// A `BuildPlan` is an immutable list of placements, each an offset from the
// build origin, the block to put there, and the `Phase` it belongs to.
// Placements are stored sorted by phase (stable, so generation order within
// a phase is kept, bottom-up), and the required-materials multiset is
// derived from them once at construction.
//
// Phases run foundation → corners → walls → openings → roof → interior.
// The construction engine never applies a placement of a later phase while
// an earlier phase still has unresolved placements; a phase with no
// placements is simply skipped.
//
// The library resolves free-text names ("hut", "cabin", "house", "tower",
// "wall") to parameterized generators. Offset y = 0 is the foundation layer,
// so the origin should be the air cell just above the ground.
//
// See also: `construction.rs` which executes plans, `materials.rs` for the
// ledger built from `BuildPlan::required()`.

use crate::error::TaskError;
use crate::items::ItemKind;
use crate::types::{Block, VoxelCoord, WoodSpecies};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Phase {
    Foundation,
    Corners,
    Walls,
    Openings,
    Roof,
    Interior,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Foundation,
        Phase::Corners,
        Phase::Walls,
        Phase::Openings,
        Phase::Roof,
        Phase::Interior,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub offset: VoxelCoord,
    pub block: Block,
    pub phase: Phase,
}

#[derive(Clone, Debug, Serialize)]
pub struct BuildPlan {
    name: String,
    placements: Vec<Placement>,
    required: BTreeMap<ItemKind, u32>,
}

impl BuildPlan {
    /// Sort placements by phase (stable) and derive required materials.
    /// Blocks with no item form (air, liquids) need nothing.
    pub fn new(name: impl Into<String>, mut placements: Vec<Placement>) -> Self {
        placements.sort_by_key(|p| p.phase);
        let mut required = BTreeMap::new();
        for p in &placements {
            if let Some(item) = p.block.placement_item() {
                *required.entry(item).or_default() += 1;
            }
        }
        Self {
            name: name.into(),
            placements,
            required,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn placement(&self, index: usize) -> Option<&Placement> {
        self.placements.get(index)
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn required(&self) -> &BTreeMap<ItemKind, u32> {
        &self.required
    }

    /// Indices of the placements in `phase`, in plan order.
    pub fn phase_indices(&self, phase: Phase) -> Vec<usize> {
        self.placements
            .iter()
            .enumerate()
            .filter(|(_, p)| p.phase == phase)
            .map(|(i, _)| i)
            .collect()
    }

    /// Inclusive bounding box of all offsets, `None` for an empty plan.
    pub fn bounds(&self) -> Option<(VoxelCoord, VoxelCoord)> {
        let first = self.placements.first()?.offset;
        Some(self.placements.iter().fold((first, first), |(lo, hi), p| {
            let o = p.offset;
            (
                VoxelCoord::new(lo.x.min(o.x), lo.y.min(o.y), lo.z.min(o.z)),
                VoxelCoord::new(hi.x.max(o.x), hi.y.max(o.y), hi.z.max(o.z)),
            )
        }))
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Accumulates placements; the first placement claimed for a cell wins.
#[derive(Default)]
struct PlanBuilder {
    placements: Vec<Placement>,
    claimed: FxHashSet<VoxelCoord>,
}

impl PlanBuilder {
    fn put(&mut self, phase: Phase, x: i32, y: i32, z: i32, block: Block) {
        let offset = VoxelCoord::new(x, y, z);
        if self.claimed.insert(offset) {
            self.placements.push(Placement { offset, block, phase });
        }
    }

    /// Reserve a cell so later calls leave it empty (doorways).
    fn keep_open(&mut self, x: i32, y: i32, z: i32) {
        self.claimed.insert(VoxelCoord::new(x, y, z));
    }

    fn finish(self, name: &str) -> BuildPlan {
        BuildPlan::new(name, self.placements)
    }
}

/// Rectangular room: floor, corner posts, walls with a door on the z = 0
/// side and a window centred on each other side, then a stair-rimmed slab
/// roof.
fn room(name: &str, width: i32, depth: i32, height: i32, wood: WoodSpecies, interior: bool) -> BuildPlan {
    let mut b = PlanBuilder::default();
    let (wx, wz) = (width - 1, depth - 1);

    for z in 0..depth {
        for x in 0..width {
            b.put(Phase::Foundation, x, 0, z, Block::Cobblestone);
        }
    }
    for y in 1..=height {
        for (x, z) in [(0, 0), (wx, 0), (0, wz), (wx, wz)] {
            b.put(Phase::Corners, x, y, z, Block::Log(wood));
        }
    }

    let door_x = width / 2;
    b.keep_open(door_x, 1, 0);
    b.keep_open(door_x, 2, 0);
    let window_y = 2.min(height);
    let windows = [(door_x, wz), (0, depth / 2), (wx, depth / 2)];
    for &(x, z) in &windows {
        b.put(Phase::Openings, x, window_y, z, Block::Slab(wood));
    }

    for y in 1..=height {
        for x in 0..width {
            b.put(Phase::Walls, x, y, 0, Block::Planks(wood));
            b.put(Phase::Walls, x, y, wz, Block::Planks(wood));
        }
        for z in 1..wz {
            b.put(Phase::Walls, 0, y, z, Block::Planks(wood));
            b.put(Phase::Walls, wx, y, z, Block::Planks(wood));
        }
    }

    let roof_y = height + 1;
    for z in 0..depth {
        for x in 0..width {
            let rim = x == 0 || z == 0 || x == wx || z == wz;
            let block = if rim { Block::Stairs(wood) } else { Block::Slab(wood) };
            b.put(Phase::Roof, x, roof_y, z, block);
        }
    }

    if interior {
        // A shelf of slabs along the back wall.
        for x in 1..wx {
            b.put(Phase::Interior, x, 1, wz - 1, Block::Slab(wood));
        }
    }
    b.finish(name)
}

/// Solid stone tower with a doorway, capped by a stone roof.
fn tower(height: i32) -> BuildPlan {
    let mut b = PlanBuilder::default();
    for z in 0..3 {
        for x in 0..3 {
            b.put(Phase::Foundation, x, 0, z, Block::Cobblestone);
        }
    }
    b.keep_open(1, 1, 0);
    b.keep_open(1, 2, 0);
    for y in 1..=height {
        for (x, z) in [(0, 0), (2, 0), (0, 2), (2, 2)] {
            b.put(Phase::Corners, x, y, z, Block::Cobblestone);
        }
        for (x, z) in [(1, 0), (0, 1), (2, 1), (1, 2)] {
            b.put(Phase::Walls, x, y, z, Block::Cobblestone);
        }
    }
    for z in 0..3 {
        for x in 0..3 {
            b.put(Phase::Roof, x, height + 1, z, Block::Cobblestone);
        }
    }
    b.finish("tower")
}

/// Straight stone wall along +x with end posts.
fn wall(length: i32, height: i32) -> BuildPlan {
    let mut b = PlanBuilder::default();
    for x in 0..length {
        b.put(Phase::Foundation, x, 0, 0, Block::Cobblestone);
    }
    for y in 1..=height {
        b.put(Phase::Corners, 0, y, 0, Block::Cobblestone);
        b.put(Phase::Corners, length - 1, y, 0, Block::Cobblestone);
        for x in 1..length - 1 {
            b.put(Phase::Walls, x, y, 0, Block::Cobblestone);
        }
    }
    b.finish("wall")
}

/// Resolve a free-text blueprint name.
pub fn resolve_blueprint(name: &str) -> Result<BuildPlan, TaskError> {
    let key = name.trim().to_lowercase().replace(['_', '-'], " ");
    let plan = match key.as_str() {
        "hut" | "shelter" | "small house" => room("hut", 5, 5, 3, WoodSpecies::Oak, false),
        "cabin" | "house" | "home" => room("cabin", 7, 7, 4, WoodSpecies::Oak, true),
        "tower" | "watchtower" => tower(8),
        "wall" => wall(9, 2),
        _ => return Err(TaskError::UnknownBlueprint(name.trim().to_owned())),
    };
    Ok(plan)
}
