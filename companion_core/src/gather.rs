// Resource gathering engine: find, reach, and break blocks until a
// requested count has been mined.
//
// A session starts from a free-text request ("wood", "iron ore", "carrots")
// resolved through an alias table to one or more `Target`s; an unknown
// request fails before any state is entered. The machine then cycles:
//
//   Idle → Searching → Traveling → Working → DrainingQueue ─┐
//               ▲                                           │
//               └──────────── queue empty ──────────────────┘
//
// Searching scans expanding cube shells around the agent (a few shells per
// tick) for the nearest loaded, matching, reachable, safe block. A hit runs
// one flood fill that fills the `WorkQueue` for the whole vein or tree; the
// queue is then drained front to back, re-validating each entry because the
// world may have changed since the fill. An empty queue sends the machine
// back to Searching from radius 1.
//
// Liveness: every Searching tick counts against a no-progress budget that
// resets when a target is found or a block is mined; exceeding it fails the
// session. Each target has its own dwell budget (travel plus work); exceeding
// it abandons only that target, which is remembered so later searches skip
// it.
//
// Every tick, dropped items near the agent are vacuumed into the inventory.
// Completion and failure are reported to the user once; afterwards `tick`
// keeps returning the terminal status without doing anything.
//
// See also: `classify.rs` for classification, safety and flood fill,
// `search.rs` for `ShellScan`, `survival.rs` and `construction.rs` which
// run gathering sessions as sub-tasks.

use crate::classify::{ProtectedZone, WorkQueue, is_reachable, is_safe_target, vein_queue};
use crate::config::GatherConfig;
use crate::error::TaskError;
use crate::host::{TickContext, World};
use crate::inventory::vacuum_drops;
use crate::items::ItemKind;
use crate::search::ShellScan;
use crate::task::{TaskClock, TaskStatus};
use crate::types::{Block, CropKind, OreKind, VoxelCoord, WoodSpecies};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::VecDeque;

/// Flood fill sizes kept for inspection; older ones only count.
pub const RECENT_FILLS: usize = 32;

/// Landmark scans reach this much further than one search needs, so small
/// moves between searches reuse the last scan.
const ZONE_SCAN_SLACK: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum GatherState {
    Idle,
    Searching,
    Traveling,
    Working,
    DrainingQueue,
    Completed,
    Failed,
}

/// One kind of block a request can be satisfied with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Target {
    /// Either the stone or the deep-stone variant.
    Ore(OreKind),
    Log(WoodSpecies),
    /// Mature crops only.
    Crop(CropKind),
    Block(Block),
}

impl Target {
    pub fn matches(self, block: Block) -> bool {
        match self {
            Target::Ore(kind) => matches!(block, Block::Ore { kind: k, .. } if k == kind),
            Target::Log(species) => block == Block::Log(species),
            Target::Crop(kind) => block == Block::Crop { kind, mature: true },
            Target::Block(b) => block == b,
        }
    }
}

// ---------------------------------------------------------------------------
// Alias resolution
// ---------------------------------------------------------------------------

fn all_logs() -> Vec<Target> {
    WoodSpecies::ALL.iter().map(|&s| Target::Log(s)).collect()
}

fn lookup(key: &str) -> Option<Vec<Target>> {
    let blocks = |bs: &[Block]| bs.iter().map(|&b| Target::Block(b)).collect::<Vec<_>>();
    let targets = match key {
        "wood" | "log" | "tree" | "timber" => all_logs(),
        "ore" => OreKind::ALL.iter().map(|&k| Target::Ore(k)).collect(),
        "stone" | "cobble" | "cobblestone" | "rock" => blocks(&[
            Block::Stone,
            Block::Deepslate,
            Block::Andesite,
            Block::Diorite,
            Block::Granite,
        ]),
        "deepslate" | "cobbled deepslate" => blocks(&[Block::Deepslate]),
        "andesite" => blocks(&[Block::Andesite]),
        "diorite" => blocks(&[Block::Diorite]),
        "granite" => blocks(&[Block::Granite]),
        "dirt" | "soil" => blocks(&[Block::Dirt, Block::GrassBlock]),
        "sand" => blocks(&[Block::Sand]),
        "gravel" => blocks(&[Block::Gravel]),
        "crop" | "food" | "harvest" => vec![
            Target::Crop(CropKind::Wheat),
            Target::Crop(CropKind::Carrot),
            Target::Crop(CropKind::Potato),
        ],
        "wheat" => vec![Target::Crop(CropKind::Wheat)],
        "carrot" => vec![Target::Crop(CropKind::Carrot)],
        "potato" | "potatoe" => vec![Target::Crop(CropKind::Potato)],
        "lapis lazuli" => vec![Target::Ore(OreKind::Lapis)],
        "raw iron" => vec![Target::Ore(OreKind::Iron)],
        "raw copper" => vec![Target::Ore(OreKind::Copper)],
        "raw gold" => vec![Target::Ore(OreKind::Gold)],
        "redstone dust" => vec![Target::Ore(OreKind::Redstone)],
        _ => {
            if let Some(species) = WoodSpecies::ALL.iter().find(|s| {
                let n = s.name();
                key == n || key.strip_prefix(n).is_some_and(|rest| matches!(rest, " log" | " wood" | " tree"))
            }) {
                return Some(vec![Target::Log(*species)]);
            }
            let ore_name = key
                .strip_prefix("deepslate ")
                .unwrap_or(key)
                .strip_suffix(" ore")
                .unwrap_or(key.strip_prefix("deepslate ").unwrap_or(key));
            let kind = OreKind::ALL.iter().find(|k| k.name() == ore_name)?;
            vec![Target::Ore(*kind)]
        }
    };
    Some(targets)
}

/// Resolve a free-text request to gatherable targets. Case, underscores,
/// a `minecraft:` prefix and simple plurals are ignored.
pub fn resolve_targets(request: &str) -> Result<Vec<Target>, TaskError> {
    let key = request
        .trim()
        .to_lowercase()
        .trim_start_matches("minecraft:")
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let singular = [key.strip_suffix("es"), key.strip_suffix('s')];
    std::iter::once(Some(key.as_str()))
        .chain(singular)
        .flatten()
        .find_map(lookup)
        .ok_or_else(|| TaskError::UnknownBlock(request.trim().to_owned()))
}

// ---------------------------------------------------------------------------
// Break time
// ---------------------------------------------------------------------------

/// Ticks to break `block` holding `held`:
/// `max(min, base + hardness × factor) / multiplier`, rounded up, at least 1.
/// The tool multiplier applies only when the held tool's category matches
/// the block's preferred tool.
pub fn break_ticks(block: Block, held: Option<ItemKind>, config: &GatherConfig) -> u32 {
    let hardness = block.hardness().unwrap_or(0.0);
    let raw = config
        .min_break_ticks
        .max(config.base_break_ticks + (hardness * config.hardness_factor).round() as u32);
    let multiplier = match (held, block.preferred_tool()) {
        (Some(ItemKind::Tool(category, tier)), Some(wanted)) if category == wanted => tier.speed_multiplier(),
        _ => 1.0,
    };
    ((raw as f32 / multiplier).ceil() as u32).max(1)
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Read-only progress snapshot.
#[derive(Clone, Debug, Serialize)]
pub struct GatherStatus {
    pub request: String,
    pub state: GatherState,
    pub ticks_in_state: u64,
    pub mined: u32,
    pub requested: u32,
    pub queue_len: usize,
    pub flood_fills: usize,
    pub abandoned: usize,
}

#[derive(Clone, Debug)]
pub struct GatherSession {
    request: String,
    targets: Vec<Target>,
    requested: u32,
    mined: u32,
    clock: TaskClock<GatherState>,
    config: GatherConfig,
    zone: Option<ProtectedZone>,
    queue: Option<WorkQueue>,
    current: Option<VoxelCoord>,
    next_shell: u32,
    idle_search_ticks: u64,
    target_ticks: u64,
    work_progress: u32,
    work_needed: u32,
    abandoned: FxHashSet<VoxelCoord>,
    /// Cells the owner forbids outright, merged into the zone once built.
    excluded: FxHashSet<VoxelCoord>,
    tool_checked: bool,
    flood_fills: usize,
    /// Sizes of the most recent flood fills, oldest first.
    recent_fills: VecDeque<usize>,
    outcome: Option<TaskStatus>,
    /// Report completion and failure to the user. Off for sub-tasks, whose
    /// owner reports on their behalf.
    announce: bool,
}

impl GatherSession {
    /// Resolve `request` and create a session in `Idle`. Unknown requests
    /// fail here, before any state exists.
    pub fn start(request: &str, count: u32, config: &GatherConfig) -> Result<Self, TaskError> {
        let targets = resolve_targets(request)?;
        let request = request.trim().to_owned();
        tracing::info!(%request, count, targets = targets.len(), "gathering session started");
        Ok(Self {
            request,
            targets,
            requested: count.max(1),
            mined: 0,
            clock: TaskClock::new("gather", GatherState::Idle),
            config: config.clone(),
            zone: None,
            queue: None,
            current: None,
            next_shell: 1,
            idle_search_ticks: 0,
            target_ticks: 0,
            work_progress: 0,
            work_needed: 0,
            abandoned: FxHashSet::default(),
            excluded: FxHashSet::default(),
            tool_checked: false,
            flood_fills: 0,
            recent_fills: VecDeque::new(),
            outcome: None,
            announce: true,
        })
    }

    /// Run as a sub-task: outcomes are logged but not reported to the user.
    pub fn quiet(mut self) -> Self {
        self.announce = false;
        self
    }

    /// Never break any of `cells`, whatever they hold.
    pub fn excluding(mut self, cells: impl IntoIterator<Item = VoxelCoord>) -> Self {
        self.excluded.extend(cells);
        self
    }

    pub fn state(&self) -> GatherState {
        self.clock.state()
    }

    pub fn mined(&self) -> u32 {
        self.mined
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Number of flood fills run so far.
    pub fn flood_fills(&self) -> usize {
        self.flood_fills
    }

    /// Sizes of the last `RECENT_FILLS` flood fills, oldest first.
    pub fn flood_fill_sizes(&self) -> Vec<usize> {
        self.recent_fills.iter().copied().collect()
    }

    pub fn current_target(&self) -> Option<VoxelCoord> {
        self.current
    }

    pub fn is_abandoned(&self, pos: VoxelCoord) -> bool {
        self.abandoned.contains(&pos)
    }

    pub fn status(&self) -> GatherStatus {
        GatherStatus {
            request: self.request.clone(),
            state: self.clock.state(),
            ticks_in_state: self.clock.ticks_in_state(),
            mined: self.mined,
            requested: self.requested,
            queue_len: self.queue.as_ref().map_or(0, WorkQueue::len),
            flood_fills: self.flood_fills,
            abandoned: self.abandoned.len(),
        }
    }

    pub fn tick(&mut self, ctx: &mut TickContext<'_>) -> TaskStatus {
        if let Some(done) = &self.outcome {
            return done.clone();
        }
        if self.zone.is_none() {
            let mut zone = ProtectedZone::compute(
                &*ctx.world,
                ctx.position(),
                self.config.protected_scan_radius,
                self.config.protected_landmark_radius,
            );
            zone.exclude(self.excluded.iter().copied());
            self.zone = Some(zone);
        }
        vacuum_drops(ctx.world, ctx.body, self.config.pickup_radius);

        match self.clock.state() {
            GatherState::Idle => {
                self.next_shell = 1;
                self.clock.transition(GatherState::Searching);
            }
            GatherState::Searching => self.search(ctx),
            GatherState::Traveling => self.travel(ctx),
            GatherState::Working => self.work(ctx),
            GatherState::DrainingQueue => self.drain(&*ctx.world),
            GatherState::Completed | GatherState::Failed => {}
        }
        self.clock.end_tick();
        self.outcome.clone().unwrap_or(TaskStatus::Running)
    }

    fn matches(&self, block: Block) -> bool {
        self.targets.iter().any(|t| t.matches(block))
    }

    fn is_candidate(&self, world: &dyn World, pos: VoxelCoord, zone: &ProtectedZone) -> bool {
        !self.abandoned.contains(&pos)
            && world.is_loaded(pos)
            && self.matches(world.block_at(pos))
            && is_reachable(world, pos)
            && is_safe_target(world, pos, zone, &self.config)
    }

    fn search(&mut self, ctx: &mut TickContext<'_>) {
        self.idle_search_ticks += 1;
        if self.idle_search_ticks > self.config.search_timeout_ticks {
            self.fail(ctx, TaskError::SearchExhausted(self.request.clone()));
            return;
        }
        let world: &dyn World = &*ctx.world;
        let center = ctx.body.position;
        let scan = ShellScan::new(center, self.config.search_radius);
        // Every candidate must see the landmarks around it, so the zone has
        // to know the whole search cube plus the landmark radius.
        if let Some(zone) = self.zone.as_mut() {
            let needed = self.config.search_radius + self.config.protected_landmark_radius;
            zone.cover(world, center, needed + ZONE_SCAN_SLACK);
        }
        let empty = ProtectedZone::default();
        let zone = self.zone.as_ref().unwrap_or(&empty);

        for _ in 0..self.config.shells_per_tick.max(1) {
            let radius = self.next_shell;
            self.next_shell = if radius >= self.config.search_radius { 1 } else { radius + 1 };
            let Some(origin) = scan.shell(radius).into_iter().find(|&p| self.is_candidate(world, p, zone)) else {
                continue;
            };
            let Some(mut queue) = vein_queue(world, origin, zone, &self.config) else {
                continue;
            };
            self.record_fill(queue.len());
            self.queue = Some(queue);
            tracing::debug!(%origin, radius, "gather target found");
            self.drain(world);
            if self.current.is_some() {
                self.idle_search_ticks = 0;
            }
            return;
        }
    }

    /// Count a tick against the current target; abandon it past the dwell
    /// budget. Returns true if the target was abandoned.
    fn dwell_exceeded(&mut self, ctx: &mut TickContext<'_>, target: VoxelCoord) -> bool {
        self.target_ticks += 1;
        if self.target_ticks <= self.config.target_dwell_ticks {
            return false;
        }
        tracing::warn!(%target, ticks = self.target_ticks, "abandoning unreachable gather target");
        self.abandoned.insert(target);
        self.current = None;
        ctx.nav.stop();
        self.clock.transition(GatherState::DrainingQueue);
        true
    }

    fn travel(&mut self, ctx: &mut TickContext<'_>) {
        let Some(target) = self.current else {
            self.clock.transition(GatherState::DrainingQueue);
            return;
        };
        let block = ctx.world.block_at(target);
        if !self.matches(block) {
            self.current = None;
            self.clock.transition(GatherState::DrainingQueue);
            return;
        }
        if self.dwell_exceeded(ctx, target) {
            return;
        }
        if !ctx.position().within(target, self.config.reach) {
            ctx.nav.move_to(target, self.config.move_speed);
            return;
        }
        ctx.nav.stop();
        ctx.body.facing = Some(target);
        if !self.tool_checked {
            self.tool_checked = true;
            if let Some(category) = block.preferred_tool()
                && let Some(tier) = ctx.body.equip_best_tool(category)
            {
                tracing::debug!(?category, ?tier, "equipped tool");
            }
        }
        self.work_progress = 0;
        self.work_needed = break_ticks(block, ctx.body.main_hand(), &self.config);
        self.clock.transition(GatherState::Working);
    }

    fn work(&mut self, ctx: &mut TickContext<'_>) {
        let Some(target) = self.current else {
            self.clock.transition(GatherState::DrainingQueue);
            return;
        };
        if !self.matches(ctx.world.block_at(target)) {
            self.current = None;
            self.clock.transition(GatherState::DrainingQueue);
            return;
        }
        if self.dwell_exceeded(ctx, target) {
            return;
        }
        self.work_progress += 1;
        if self.work_progress < self.work_needed {
            return;
        }
        for stack in ctx.world.break_block(target) {
            ctx.receive(stack);
        }
        self.mined += 1;
        self.current = None;
        self.idle_search_ticks = 0;
        tracing::debug!(%target, mined = self.mined, requested = self.requested, "block gathered");
        if self.mined >= self.requested {
            self.complete(ctx);
        } else {
            self.clock.transition(GatherState::DrainingQueue);
        }
    }

    fn record_fill(&mut self, size: usize) {
        self.flood_fills += 1;
        if self.recent_fills.len() == RECENT_FILLS {
            self.recent_fills.pop_front();
        }
        self.recent_fills.push_back(size);
    }

    /// Move to the next queued position that is still fair game. Queue
    /// entries can lie outside every landmark scan so far, so each one is
    /// guarded individually.
    fn drain(&mut self, world: &dyn World) {
        while let Some(pos) = self.queue.as_mut().and_then(WorkQueue::pop_front) {
            if self.abandoned.contains(&pos) {
                continue;
            }
            if !self.zone.as_mut().is_some_and(|z| z.guards(world, pos)) {
                self.current = Some(pos);
                self.target_ticks = 0;
                self.clock.transition(GatherState::Traveling);
                return;
            }
        }
        self.queue = None;
        self.next_shell = 1;
        self.clock.transition(GatherState::Searching);
    }

    fn complete(&mut self, ctx: &mut TickContext<'_>) {
        tracing::info!(request = %self.request, mined = self.mined, "gathering complete");
        if self.announce {
            ctx.reporter
                .report(&format!("Done! Gathered {} {}.", self.mined, self.request));
        }
        self.queue = None;
        self.outcome = Some(TaskStatus::Completed);
        self.clock.transition(GatherState::Completed);
    }

    fn fail(&mut self, ctx: &mut TickContext<'_>, error: TaskError) {
        tracing::info!(request = %self.request, mined = self.mined, %error, "gathering failed");
        if self.announce {
            ctx.reporter.report(&error.to_string());
        }
        ctx.nav.stop();
        self.queue = None;
        self.current = None;
        self.outcome = Some(TaskStatus::Failed(error));
        self.clock.transition(GatherState::Failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::EntityKind;
    use crate::items::{ItemStack, Tier, ToolCategory};
    use crate::sandbox::{GridWorld, Harness};

    /// Stone block with a two-high tunnel along x at y 10..=11, z = 10.
    fn tunnel_world() -> GridWorld {
        let mut w = GridWorld::new(40, 24, 24);
        w.fill(VoxelCoord::new(0, 0, 0), VoxelCoord::new(39, 20, 23), Block::Stone);
        w.fill(VoxelCoord::new(1, 10, 10), VoxelCoord::new(38, 11, 10), Block::Air);
        w
    }

    fn coal() -> Block {
        Block::Ore {
            kind: OreKind::Coal,
            deep: false,
        }
    }

    fn run(h: &mut Harness, session: &mut GatherSession, max_ticks: u32) -> TaskStatus {
        for _ in 0..max_ticks {
            let status = h.step(|ctx| session.tick(ctx));
            if status.is_finished() {
                return status;
            }
        }
        TaskStatus::Running
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(resolve_targets("wood").unwrap().len(), 6);
        assert_eq!(resolve_targets("Iron Ore").unwrap(), vec![Target::Ore(OreKind::Iron)]);
        assert_eq!(resolve_targets("diamonds").unwrap(), vec![Target::Ore(OreKind::Diamond)]);
        assert_eq!(resolve_targets("oak_logs").unwrap(), vec![Target::Log(WoodSpecies::Oak)]);
        assert_eq!(resolve_targets("dark oak").unwrap(), vec![Target::Log(WoodSpecies::DarkOak)]);
        assert_eq!(resolve_targets("minecraft:deepslate_gold_ore").unwrap(), vec![Target::Ore(OreKind::Gold)]);
        assert_eq!(resolve_targets("potatoes").unwrap(), vec![Target::Crop(CropKind::Potato)]);
        assert_eq!(resolve_targets("lapis lazuli").unwrap(), vec![Target::Ore(OreKind::Lapis)]);
    }

    #[test]
    fn unknown_request_fails_before_any_state() {
        let err = GatherSession::start("mithril", 3, &GatherConfig::default()).unwrap_err();
        assert_eq!(err, TaskError::UnknownBlock("mithril".into()));
    }

    #[test]
    fn deep_ore_matches_its_kind() {
        let t = Target::Ore(OreKind::Iron);
        assert!(t.matches(Block::Ore { kind: OreKind::Iron, deep: true }));
        assert!(!t.matches(Block::Ore { kind: OreKind::Gold, deep: false }));
        assert!(!Target::Crop(CropKind::Wheat).matches(Block::Crop { kind: CropKind::Wheat, mature: false }));
    }

    #[test]
    fn tool_multiplier_only_for_matching_category() {
        let cfg = GatherConfig::default();
        let bare = break_ticks(Block::Stone, None, &cfg);
        let pick = break_ticks(Block::Stone, Some(ItemKind::Tool(ToolCategory::Pickaxe, Tier::Iron)), &cfg);
        let axe = break_ticks(Block::Stone, Some(ItemKind::Tool(ToolCategory::Axe, Tier::Netherite)), &cfg);
        assert!(pick < bare);
        assert_eq!(axe, bare);
        let mut last = u32::MAX;
        for tier in [Tier::Wood, Tier::Stone, Tier::Iron, Tier::Diamond, Tier::Netherite] {
            let t = break_ticks(Block::Deepslate, Some(ItemKind::Tool(ToolCategory::Pickaxe, tier)), &cfg);
            assert!(t <= last);
            last = t;
        }
        // Zero hardness still pays the base time.
        assert_eq!(
            break_ticks(Block::TallGrass, None, &cfg),
            cfg.base_break_ticks.max(cfg.min_break_ticks)
        );
    }

    #[test]
    fn fells_tree_top_down_and_completes_once() {
        let mut w = GridWorld::new(20, 30, 20);
        w.fill(VoxelCoord::new(0, 0, 0), VoxelCoord::new(19, 4, 19), Block::Dirt);
        for y in 5..10 {
            w.set_block(VoxelCoord::new(10, y, 10), Block::Log(WoodSpecies::Birch));
        }
        let mut h = Harness::new(w, VoxelCoord::new(7, 5, 7), 1);
        let mut session = GatherSession::start("wood", 5, &GatherConfig::default()).unwrap();
        let mut removal_order = Vec::new();
        let mut remaining: Vec<i32> = (5..10).collect();
        for _ in 0..2000 {
            let status = h.step(|ctx| session.tick(ctx));
            remaining.retain(|&y| {
                let gone = h.world.get(VoxelCoord::new(10, y, 10)).is_air();
                if gone {
                    removal_order.push(y);
                }
                !gone
            });
            if status.is_finished() {
                break;
            }
        }
        assert_eq!(session.state(), GatherState::Completed);
        assert_eq!(removal_order, vec![9, 8, 7, 6, 5]);
        assert_eq!(session.flood_fill_sizes(), &[5]);
        assert_eq!(h.body.inventory.count(ItemKind::Block(Block::Log(WoodSpecies::Birch))), 5);
        // Terminal: further ticks change nothing and report nothing.
        for _ in 0..10 {
            assert_eq!(h.step(|ctx| session.tick(ctx)), TaskStatus::Completed);
        }
        assert_eq!(h.reporter.count_containing("Done!"), 1);
    }

    #[test]
    fn equips_best_matching_tool_once() {
        let mut w = tunnel_world();
        w.set_block(VoxelCoord::new(8, 10, 11), coal());
        let mut h = Harness::new(w, VoxelCoord::new(4, 10, 10), 2);
        h.body.inventory.add_item(ItemStack::new(ItemKind::Tool(ToolCategory::Pickaxe, Tier::Stone), 1));
        h.body.inventory.add_item(ItemStack::new(ItemKind::Tool(ToolCategory::Pickaxe, Tier::Diamond), 1));
        h.body.inventory.add_item(ItemStack::new(ItemKind::Tool(ToolCategory::Axe, Tier::Netherite), 1));
        let mut session = GatherSession::start("coal", 1, &GatherConfig::default()).unwrap();
        assert_eq!(run(&mut h, &mut session, 500), TaskStatus::Completed);
        assert_eq!(h.body.main_hand(), Some(ItemKind::Tool(ToolCategory::Pickaxe, Tier::Diamond)));
        assert_eq!(h.body.inventory.count(ItemKind::Coal), 1);
    }

    #[test]
    fn overflow_spills_into_world() {
        let mut w = tunnel_world();
        w.set_block(VoxelCoord::new(6, 10, 11), coal());
        let mut h = Harness::new(w, VoxelCoord::new(4, 10, 10), 3);
        for _ in 0..36 {
            h.body.inventory.add_item(ItemStack::new(ItemKind::Diamond, 64));
        }
        let mut session = GatherSession::start("coal", 1, &GatherConfig::default()).unwrap();
        assert_eq!(run(&mut h, &mut session, 500), TaskStatus::Completed);
        let spilled: Vec<_> = h
            .world
            .entities()
            .filter(|e| e.kind == EntityKind::Item)
            .filter_map(|e| e.item)
            .collect();
        assert_eq!(spilled, vec![ItemStack::new(ItemKind::Coal, 1)]);
    }

    #[test]
    fn vacuums_nearby_drops() {
        let w = tunnel_world();
        let mut h = Harness::new(w, VoxelCoord::new(4, 10, 10), 4);
        h.world.drop_pickup_delay = 0;
        h.world.spawn_drop(VoxelCoord::new(5, 10, 10), ItemStack::new(ItemKind::Wheat, 3));
        h.world.drop_pickup_delay = 5;
        h.world.spawn_drop(VoxelCoord::new(5, 11, 10), ItemStack::new(ItemKind::Seeds, 3));
        let mut session = GatherSession::start("coal", 1, &GatherConfig::default()).unwrap();
        h.step(|ctx| session.tick(ctx));
        assert_eq!(h.body.inventory.count(ItemKind::Wheat), 3);
        // Still in its pickup delay.
        assert_eq!(h.body.inventory.count(ItemKind::Seeds), 0);
    }

    #[test]
    fn dwell_abandons_target_then_search_exhausts() {
        let mut w = tunnel_world();
        let ore = VoxelCoord::new(30, 10, 11);
        w.set_block(ore, coal());
        let mut h = Harness::new(w, VoxelCoord::new(2, 10, 10), 5);
        let config = GatherConfig {
            target_dwell_ticks: 5,
            search_timeout_ticks: 40,
            ..GatherConfig::default()
        };
        let mut session = GatherSession::start("coal", 1, &config).unwrap();
        let status = run(&mut h, &mut session, 500);
        assert_eq!(status, TaskStatus::Failed(TaskError::SearchExhausted("coal".into())));
        assert!(session.is_abandoned(ore));
        assert_eq!(h.world.get(ore), coal());
        assert_eq!(h.reporter.messages, vec!["I couldn't find any more coal nearby".to_owned()]);
    }

    #[test]
    fn protected_ore_is_never_mined() {
        let mut w = tunnel_world();
        let ore = VoxelCoord::new(8, 10, 11);
        w.set_block(ore, coal());
        w.set_block(VoxelCoord::new(10, 10, 10), Block::Chest);
        let mut h = Harness::new(w, VoxelCoord::new(4, 10, 10), 6);
        let config = GatherConfig {
            search_timeout_ticks: 30,
            ..GatherConfig::default()
        };
        let mut session = GatherSession::start("coal", 1, &config).unwrap();
        assert!(matches!(run(&mut h, &mut session, 200), TaskStatus::Failed(_)));
        assert_eq!(h.world.get(ore), coal());
        assert!(session.flood_fill_sizes().is_empty());
    }

    #[test]
    fn chest_beyond_the_first_landmark_scan_still_protects() {
        let mut w = tunnel_world();
        let ore = VoxelCoord::new(29, 10, 11);
        w.set_block(ore, coal());
        w.set_block(VoxelCoord::new(30, 10, 11), Block::Chest);
        let mut h = Harness::new(w, VoxelCoord::new(4, 10, 10), 6);
        let config = GatherConfig {
            search_timeout_ticks: 30,
            ..GatherConfig::default()
        };
        assert!(ore.chebyshev_distance(h.body.position) > config.protected_scan_radius);
        let mut session = GatherSession::start("coal", 1, &config).unwrap();
        let status = run(&mut h, &mut session, 200);
        assert_eq!(status, TaskStatus::Failed(TaskError::SearchExhausted("coal".into())));
        assert_eq!(h.world.get(ore), coal());
        assert_eq!(session.flood_fills(), 0);
    }

    #[test]
    fn excluded_cells_are_never_gathered() {
        let mut w = GridWorld::new(20, 30, 20);
        w.fill(VoxelCoord::new(0, 0, 0), VoxelCoord::new(19, 4, 19), Block::Dirt);
        let post = VoxelCoord::new(10, 5, 10);
        let tree = VoxelCoord::new(4, 5, 4);
        w.set_block(post, Block::Log(WoodSpecies::Oak));
        w.set_block(tree, Block::Log(WoodSpecies::Oak));
        let mut h = Harness::new(w, VoxelCoord::new(9, 5, 9), 7);
        let config = GatherConfig {
            search_timeout_ticks: 30,
            ..GatherConfig::default()
        };
        let mut session = GatherSession::start("oak", 2, &config).unwrap().excluding([post]);
        let status = run(&mut h, &mut session, 1000);
        assert!(matches!(status, TaskStatus::Failed(_)));
        assert_eq!(session.mined(), 1);
        assert!(h.world.get(tree).is_air());
        assert_eq!(h.world.get(post), Block::Log(WoodSpecies::Oak));
    }

    #[test]
    fn fill_history_keeps_only_recent_sizes() {
        let mut session = GatherSession::start("iron", 1, &GatherConfig::default()).unwrap();
        for size in 0..40 {
            session.record_fill(size);
        }
        assert_eq!(session.flood_fills(), 40);
        let recent = session.flood_fill_sizes();
        assert_eq!(recent.len(), RECENT_FILLS);
        assert_eq!(recent.first(), Some(&(40 - RECENT_FILLS)));
        assert_eq!(recent.last(), Some(&39));
        assert_eq!(session.status().flood_fills, 40);
    }
}
