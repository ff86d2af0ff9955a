// Core spatial and block types shared by every task machine.
//
// Defines the grid coordinate (`VoxelCoord`), the neighbourhood offset
// tables used by the search routines, entity handles, and the block-state
// vocabulary (`Block`) with its physical properties: solidity, hardness, the
// tool category that speeds breaking, and what it drops.
//
// A `Block` is what the world collaborator reports for a position. The task
// core never stores blocks beyond a single search pass; it re-reads the
// world every tick (see `classify.rs`).
//
// See also: `items.rs` for `ItemKind`/`ItemStack` (drops and placement
// materials), `classify.rs` for the `BlockClass` derived from a `Block`,
// `host.rs` for the world interface that returns these.

use crate::items::{FoodKind, ItemKind, ItemStack, ToolCategory};
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A position in the world grid, in block units.
///
/// Y is up. Ordering is lexicographic (x, y, z) so coordinates can key a
/// `BTreeMap` and break ties deterministically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoxelCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl VoxelCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub const fn above(self) -> Self {
        self.offset(0, 1, 0)
    }

    pub const fn below(self) -> Self {
        self.offset(0, -1, 0)
    }

    /// Component-wise sum, for plan offsets relative to a build origin.
    pub const fn add(self, other: Self) -> Self {
        self.offset(other.x, other.y, other.z)
    }

    /// Manhattan distance between two coordinates.
    pub fn manhattan_distance(self, other: Self) -> u32 {
        (self.x - other.x).unsigned_abs()
            + (self.y - other.y).unsigned_abs()
            + (self.z - other.z).unsigned_abs()
    }

    /// Chebyshev (king-move) distance; the radius of the cube shell that
    /// contains `other` when centred on `self`.
    pub fn chebyshev_distance(self, other: Self) -> u32 {
        (self.x - other.x)
            .unsigned_abs()
            .max((self.y - other.y).unsigned_abs())
            .max((self.z - other.z).unsigned_abs())
    }

    /// Squared Euclidean distance. Integer, so comparisons are exact.
    pub fn distance_squared(self, other: Self) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dy * dy + dz * dz
    }

    pub fn distance(self, other: Self) -> f64 {
        (self.distance_squared(other) as f64).sqrt()
    }

    /// True if `other` is within `reach` blocks (Euclidean).
    pub fn within(self, other: Self, reach: f64) -> bool {
        (self.distance_squared(other) as f64) <= reach * reach
    }
}

impl fmt::Display for VoxelCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// The six face-adjacent offsets (±x, ±y, ±z).
pub const FACE_OFFSETS: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// The four horizontal face offsets.
pub const LATERAL_OFFSETS: [(i32, i32, i32); 4] = [(1, 0, 0), (-1, 0, 0), (0, 0, 1), (0, 0, -1)];

/// The full 3×3×3 neighbourhood minus the centre, in a fixed order
/// (y outer, z middle, x inner) so breadth-first expansion is deterministic.
pub const NEIGHBORS_26: [(i32, i32, i32); 26] = {
    let mut out = [(0, 0, 0); 26];
    let mut i = 0;
    let mut dy = -1;
    while dy <= 1 {
        let mut dz = -1;
        while dz <= 1 {
            let mut dx = -1;
            while dx <= 1 {
                if !(dx == 0 && dy == 0 && dz == 0) {
                    out[i] = (dx, dy, dz);
                    i += 1;
                }
                dx += 1;
            }
            dz += 1;
        }
        dy += 1;
    }
    out
};

// ---------------------------------------------------------------------------
// Entity handles
// ---------------------------------------------------------------------------

/// Opaque handle for a world entity (animal, hostile, dropped item). Issued
/// by the world collaborator; the core only compares and passes them back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

// ---------------------------------------------------------------------------
// Block vocabulary
// ---------------------------------------------------------------------------

/// Wood species. Logs, leaves, planks, stairs and slabs are all per-species.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WoodSpecies {
    Oak,
    Spruce,
    Birch,
    Jungle,
    Acacia,
    DarkOak,
}

impl WoodSpecies {
    pub const ALL: [WoodSpecies; 6] = [
        WoodSpecies::Oak,
        WoodSpecies::Spruce,
        WoodSpecies::Birch,
        WoodSpecies::Jungle,
        WoodSpecies::Acacia,
        WoodSpecies::DarkOak,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WoodSpecies::Oak => "oak",
            WoodSpecies::Spruce => "spruce",
            WoodSpecies::Birch => "birch",
            WoodSpecies::Jungle => "jungle",
            WoodSpecies::Acacia => "acacia",
            WoodSpecies::DarkOak => "dark oak",
        }
    }
}

/// Ore kinds. Each has a stone and a deep-stone variant that count as the
/// same kind for vein detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OreKind {
    Coal,
    Iron,
    Copper,
    Gold,
    Redstone,
    Lapis,
    Diamond,
    Emerald,
}

impl OreKind {
    pub const ALL: [OreKind; 8] = [
        OreKind::Coal,
        OreKind::Iron,
        OreKind::Copper,
        OreKind::Gold,
        OreKind::Redstone,
        OreKind::Lapis,
        OreKind::Diamond,
        OreKind::Emerald,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OreKind::Coal => "coal",
            OreKind::Iron => "iron",
            OreKind::Copper => "copper",
            OreKind::Gold => "gold",
            OreKind::Redstone => "redstone",
            OreKind::Lapis => "lapis",
            OreKind::Diamond => "diamond",
            OreKind::Emerald => "emerald",
        }
    }

    /// Item dropped when mined (no fortune, no silk touch).
    fn drop(self) -> ItemStack {
        match self {
            OreKind::Coal => ItemStack::new(ItemKind::Coal, 1),
            OreKind::Iron => ItemStack::new(ItemKind::RawIron, 1),
            OreKind::Copper => ItemStack::new(ItemKind::RawCopper, 2),
            OreKind::Gold => ItemStack::new(ItemKind::RawGold, 1),
            OreKind::Redstone => ItemStack::new(ItemKind::Redstone, 4),
            OreKind::Lapis => ItemStack::new(ItemKind::Lapis, 4),
            OreKind::Diamond => ItemStack::new(ItemKind::Diamond, 1),
            OreKind::Emerald => ItemStack::new(ItemKind::Emerald, 1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CropKind {
    Wheat,
    Carrot,
    Potato,
}

/// A block state as reported by the world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Block {
    #[default]
    Air,
    CaveAir,
    Stone,
    Deepslate,
    Cobblestone,
    CobbledDeepslate,
    Andesite,
    Diorite,
    Granite,
    Dirt,
    GrassBlock,
    Sand,
    Gravel,
    Bedrock,
    Ore { kind: OreKind, deep: bool },
    Log(WoodSpecies),
    Leaves(WoodSpecies),
    Planks(WoodSpecies),
    Stairs(WoodSpecies),
    Slab(WoodSpecies),
    Crop { kind: CropKind, mature: bool },
    Farmland,
    Chest,
    Barrel,
    CraftingTable,
    Furnace,
    Torch,
    Lantern,
    StorageTerminal,
    Fence,
    StoneWall,
    Glass,
    Door,
    TallGrass,
    Fern,
    Flower,
    Water,
    Lava,
}

impl Block {
    pub fn is_air(self) -> bool {
        matches!(self, Block::Air | Block::CaveAir)
    }

    pub fn is_liquid(self) -> bool {
        matches!(self, Block::Water | Block::Lava)
    }

    /// Non-collidable plants and decorations that site preparation may
    /// clear and that never count as a wall or floor.
    pub fn is_vegetation(self) -> bool {
        matches!(
            self,
            Block::TallGrass | Block::Fern | Block::Flower | Block::Crop { .. }
        )
    }

    /// Solid for reachability and the floor/wall heuristics. Air, liquids,
    /// vegetation and torches are not.
    pub fn is_solid(self) -> bool {
        !(self.is_air() || self.is_liquid() || self.is_vegetation() || self == Block::Torch)
    }

    /// Blocks site preparation may remove: vegetation and leaves. Never
    /// structural blocks, never liquids.
    pub fn is_clearable(self) -> bool {
        self.is_vegetation() || matches!(self, Block::Leaves(_))
    }

    /// Naturally generated ore and vegetation, exempt from the wall
    /// heuristic.
    pub fn is_natural(self) -> bool {
        matches!(
            self,
            Block::Ore { .. } | Block::Log(_) | Block::Leaves(_) | Block::Crop { .. }
        ) || self.is_vegetation()
    }

    /// Generic stone and soil: minable only underground.
    pub fn is_generic_terrain(self) -> bool {
        matches!(
            self,
            Block::Stone
                | Block::Deepslate
                | Block::Andesite
                | Block::Diorite
                | Block::Granite
                | Block::Dirt
                | Block::GrassBlock
                | Block::Sand
                | Block::Gravel
        )
    }

    /// Landmarks around which a gathering session protects the base:
    /// containers, crafting stations, light sources, network terminals.
    pub fn is_landmark(self) -> bool {
        matches!(
            self,
            Block::Chest
                | Block::Barrel
                | Block::CraftingTable
                | Block::Furnace
                | Block::Torch
                | Block::Lantern
                | Block::StorageTerminal
        )
    }

    /// Blocks that hold items and expose a `Container` through the world.
    pub fn is_container(self) -> bool {
        matches!(self, Block::Chest | Block::Barrel)
    }

    /// Hardness in break-time units. `None` means unbreakable.
    pub fn hardness(self) -> Option<f32> {
        let h = match self {
            Block::Bedrock => return None,
            Block::Air | Block::CaveAir | Block::Water | Block::Lava => return None,
            Block::Stone | Block::Andesite | Block::Diorite | Block::Granite => 1.5,
            Block::Deepslate => 3.0,
            Block::Cobblestone | Block::CobbledDeepslate | Block::StoneWall => 2.0,
            Block::Dirt | Block::GrassBlock | Block::Sand | Block::Farmland => 0.5,
            Block::Gravel => 0.6,
            Block::Ore { deep: false, .. } => 3.0,
            Block::Ore { deep: true, .. } => 4.5,
            Block::Log(_) | Block::Planks(_) | Block::Stairs(_) | Block::Slab(_) => 2.0,
            Block::Fence | Block::Door => 2.0,
            Block::Leaves(_) => 0.2,
            Block::Chest | Block::Barrel | Block::CraftingTable => 2.5,
            Block::Furnace => 3.5,
            Block::StorageTerminal => 5.0,
            Block::Lantern => 3.5,
            Block::Glass => 0.3,
            Block::Torch
            | Block::TallGrass
            | Block::Fern
            | Block::Flower
            | Block::Crop { .. } => 0.0,
        };
        Some(h)
    }

    /// Tool category that speeds up breaking this block, if any.
    pub fn preferred_tool(self) -> Option<ToolCategory> {
        match self {
            Block::Stone
            | Block::Deepslate
            | Block::Cobblestone
            | Block::CobbledDeepslate
            | Block::Andesite
            | Block::Diorite
            | Block::Granite
            | Block::Ore { .. }
            | Block::Furnace
            | Block::StoneWall
            | Block::Lantern
            | Block::StorageTerminal => Some(ToolCategory::Pickaxe),
            Block::Log(_)
            | Block::Planks(_)
            | Block::Stairs(_)
            | Block::Slab(_)
            | Block::Chest
            | Block::Barrel
            | Block::CraftingTable
            | Block::Fence
            | Block::Door => Some(ToolCategory::Axe),
            Block::Dirt | Block::GrassBlock | Block::Sand | Block::Gravel | Block::Farmland => {
                Some(ToolCategory::Shovel)
            }
            Block::Leaves(_) => Some(ToolCategory::Hoe),
            _ => None,
        }
    }

    /// Items produced when the block is broken by hand or a plain tool.
    pub fn drops(self) -> SmallVec<[ItemStack; 2]> {
        let block_item = |b: Block| smallvec![ItemStack::new(ItemKind::Block(b), 1)];
        match self {
            Block::Stone => block_item(Block::Cobblestone),
            Block::Deepslate => block_item(Block::CobbledDeepslate),
            Block::GrassBlock | Block::Farmland => block_item(Block::Dirt),
            Block::Ore { kind, .. } => smallvec![kind.drop()],
            Block::Crop { kind, mature } => match (kind, mature) {
                (CropKind::Wheat, true) => smallvec![
                    ItemStack::new(ItemKind::Wheat, 1),
                    ItemStack::new(ItemKind::Seeds, 2),
                ],
                (CropKind::Wheat, false) => smallvec![ItemStack::new(ItemKind::Seeds, 1)],
                (CropKind::Carrot, true) => smallvec![ItemStack::new(ItemKind::Food(FoodKind::Carrot), 3)],
                (CropKind::Potato, true) => smallvec![ItemStack::new(ItemKind::Food(FoodKind::Potato), 3)],
                (CropKind::Carrot, false) => smallvec![ItemStack::new(ItemKind::Food(FoodKind::Carrot), 1)],
                (CropKind::Potato, false) => smallvec![ItemStack::new(ItemKind::Food(FoodKind::Potato), 1)],
            },
            Block::Air
            | Block::CaveAir
            | Block::Water
            | Block::Lava
            | Block::Bedrock
            | Block::Leaves(_)
            | Block::Glass
            | Block::TallGrass
            | Block::Fern
            | Block::Flower => SmallVec::new(),
            other => block_item(other),
        }
    }

    /// Human-readable name for chat.
    pub fn name(self) -> String {
        match self {
            Block::Air | Block::CaveAir => "air".into(),
            Block::CobbledDeepslate => "cobbled deepslate".into(),
            Block::GrassBlock => "grass block".into(),
            Block::Ore { kind, deep: false } => format!("{} ore", kind.name()),
            Block::Ore { kind, deep: true } => format!("deepslate {} ore", kind.name()),
            Block::Log(s) => format!("{} log", s.name()),
            Block::Leaves(s) => format!("{} leaves", s.name()),
            Block::Planks(s) => format!("{} planks", s.name()),
            Block::Stairs(s) => format!("{} stairs", s.name()),
            Block::Slab(s) => format!("{} slab", s.name()),
            Block::Crop { kind, .. } => format!("{kind:?}").to_lowercase(),
            Block::CraftingTable => "crafting table".into(),
            Block::StorageTerminal => "storage terminal".into(),
            Block::StoneWall => "stone wall".into(),
            Block::TallGrass => "tall grass".into(),
            other => format!("{other:?}").to_lowercase(),
        }
    }

    /// The item that must be spent to place this block, if it can be placed
    /// from an item at all.
    pub fn placement_item(self) -> Option<ItemKind> {
        match self {
            Block::Air
            | Block::CaveAir
            | Block::Water
            | Block::Lava
            | Block::Bedrock
            | Block::Ore { .. }
            | Block::Crop { .. }
            | Block::Farmland
            | Block::TallGrass
            | Block::Fern
            | Block::Flower
            | Block::GrassBlock => None,
            other => Some(ItemKind::Block(other)),
        }
    }
}
