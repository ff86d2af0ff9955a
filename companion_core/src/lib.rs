// companion_core: tick-driven task execution for a voxel-world companion.
//
// The host game calls into this crate once per tick with mutable access to
// the world, the navigator, the agent's body, the storage network and a chat
// sink (bundled as a `TickContext`). Everything the agent does (mining,
// felling, hunting, storing, building) is a bounded amount of work spread
// across many such ticks. Nothing here blocks, spawns threads, or reads the
// clock.
//
// Module overview:
// - `types.rs`:        VoxelCoord, neighbourhood offsets, Block and its materials.
// - `items.rs`:        Item kinds, tiers, stacks, and the slot-based `Container`.
// - `host.rs`:         Collaborator traits (World, Navigator, StorageNetwork, Reporter) + TickContext.
// - `inventory.rs`:    AgentBody, equipment and gear selection, drop vacuuming.
// - `error.rs`:        TaskError, ConfigError, IntentError.
// - `config.rs`:       CompanionConfig: every threshold, cap, radius and timeout.
// - `search.rs`:       Bounded BFS and nearest-first cube-shell scanning.
// - `classify.rs`:     Block classes, target safety, protected zones, vein/tree flood fill.
// - `task.rs`:         TaskStatus + TaskClock (state plus ticks-in-state).
// - `gather.rs`:       Resource gathering engine.
// - `survival.rs`:     Autonomous survival state machine.
// - `materials.rs`:    Material ledger with substitution, fixed crafting recipes.
// - `blueprint.rs`:    Phased build plans and the named blueprint library.
// - `construction.rs`: Construction engine (materials, site prep, phased placement).
// - `intent.rs`:       Thread-safe intent channel from the language front end.
// - `companion.rs`:    Per-agent dispatcher: drains intents, runs the active task.
// - `sandbox.rs`:      In-memory world, navigator, storage and harness for tests and the demo binary.
// - `prng`:            Re-exported from `companion_prng` (xoshiro256++).
//
// **Critical constraint: determinism.** Given the same world, config, seed and
// intents, a run replays exactly. All randomness goes through the injected
// `RandomSource`; ordered collections are `BTreeMap`s; hash sets are used
// only for membership tests and never iterated.

pub mod blueprint;
pub mod classify;
pub mod companion;
pub mod config;
pub mod construction;
pub mod error;
pub mod gather;
pub mod host;
pub mod intent;
pub mod inventory;
pub mod items;
pub mod materials;
pub mod sandbox;
pub mod search;
pub mod survival;
pub mod task;
pub mod types;

pub use companion_prng as prng;
