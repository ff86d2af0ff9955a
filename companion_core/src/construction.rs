// Construction engine: turn a `BuildPlan` into placed blocks, sourcing the
// materials first.
//
//   Starting → CheckingMaterials ─┬─ short ─→ Gathering ⇄ NavigatingToStorage
//                  ▲              │               │
//                  │              └─ ready ─→ SitePrep → Building → Completed
//                  └────────── out of material mid-build ──┘
//
// The material ledger is always recomputed from scratch against the
// placements that are not yet resolved and the current inventory, so
// re-checking after any change is safe. Gathering walks the sources from
// cheapest to most expensive, one `GatherStep` at a time: what is already
// owned, the storage network, nearby containers, mining stone, felling
// trees, and finally fixed-ratio crafting (raw materials before refined
// ones). Crafting only consumes wood the ledger left spare, and felling or
// mining never touches a cell of the plan's own footprint. The step chain
// repeats until the ledger is empty. The only
// liveness guarantee is a global no-progress timeout: if the outstanding
// total stops shrinking for too long the session fails with the shortfall,
// and any blocks already placed stay in the world.
//
// Building applies one placement per interval in strict phase order. A
// placement whose cell is occupied by something that is neither air nor
// clearable is skipped, as is one that cannot be reached in time. Material
// is removed from the inventory before the world write; a write the world
// refuses refunds it. Running out mid-build returns to CheckingMaterials.
// Phases with nothing left to place are skipped.
//
// See also: `blueprint.rs` (plans and phases), `materials.rs` (ledger,
// families, recipes), `gather.rs` (mining and felling sub-sessions),
// `companion.rs` which starts build sessions from intents.

use crate::blueprint::{BuildPlan, Phase, resolve_blueprint};
use crate::config::{ConstructionConfig, GatherConfig};
use crate::error::TaskError;
use crate::gather::GatherSession;
use crate::host::{TickContext, World};
use crate::items::{ItemKind, ItemStack};
use crate::materials::{
    Family, MaterialLedger, craft_from_spare, family_of, recipe_for, satisfies, substituted_block, take_for_placement,
};
use crate::search::ShellScan;
use crate::task::{TaskClock, TaskStatus};
use crate::types::VoxelCoord;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BuildState {
    Starting,
    CheckingMaterials,
    Gathering,
    NavigatingToStorage,
    SitePrep,
    Building,
    Completed,
    Failed,
}

/// Material source currently being tried while in `Gathering`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum GatherStep {
    CheckInventory,
    CheckExternalStorage,
    CheckNearbyContainers,
    Mining,
    Chopping,
    Crafting,
}

/// `candidate` satisfies `required` directly or can be crafted into it.
fn feeds(required: ItemKind, candidate: ItemKind) -> bool {
    satisfies(required, candidate) || recipe_for(required).is_some_and(|(input, _)| feeds(input, candidate))
}

#[derive(Clone, Debug, Serialize)]
pub struct BuildStatus {
    pub blueprint: String,
    pub state: BuildState,
    pub ticks_in_state: u64,
    pub step: GatherStep,
    pub phase: Option<Phase>,
    pub placed: u32,
    pub skipped: u32,
    pub total: usize,
    pub outstanding: u32,
}

#[derive(Clone, Debug)]
pub struct BuildSession {
    plan: BuildPlan,
    origin: VoxelCoord,
    clock: TaskClock<BuildState>,
    config: ConstructionConfig,
    gather_config: GatherConfig,
    ledger: MaterialLedger,
    step: GatherStep,
    sub_gather: Option<GatherSession>,
    storage_point: Option<VoxelCoord>,
    container_spots: Option<Vec<VoxelCoord>>,
    best_outstanding: u32,
    stalled_ticks: u64,
    site_prepared: bool,
    site_cells: Vec<VoxelCoord>,
    /// Per placement: applied or skipped, never revisited.
    resolved: Vec<bool>,
    phase: usize,
    pending: VecDeque<usize>,
    placement_ticks: u64,
    last_place_tick: Option<u64>,
    applied_order: Vec<usize>,
    placed: u32,
    skipped: u32,
    outcome: Option<TaskStatus>,
}

impl BuildSession {
    /// Resolve a named blueprint. Unknown names fail before any state.
    pub fn start(
        blueprint: &str,
        origin: VoxelCoord,
        config: &ConstructionConfig,
        gather_config: &GatherConfig,
    ) -> Result<Self, TaskError> {
        let plan = resolve_blueprint(blueprint)?;
        Ok(Self::new(plan, origin, config, gather_config))
    }

    pub fn new(plan: BuildPlan, origin: VoxelCoord, config: &ConstructionConfig, gather_config: &GatherConfig) -> Self {
        tracing::info!(blueprint = plan.name(), %origin, placements = plan.len(), "build session started");
        let resolved = vec![false; plan.len()];
        Self {
            plan,
            origin,
            clock: TaskClock::new("construction", BuildState::Starting),
            config: config.clone(),
            gather_config: gather_config.clone(),
            ledger: MaterialLedger::default(),
            step: GatherStep::CheckInventory,
            sub_gather: None,
            storage_point: None,
            container_spots: None,
            best_outstanding: u32::MAX,
            stalled_ticks: 0,
            site_prepared: false,
            site_cells: Vec::new(),
            resolved,
            phase: 0,
            pending: VecDeque::new(),
            placement_ticks: 0,
            last_place_tick: None,
            applied_order: Vec::new(),
            placed: 0,
            skipped: 0,
            outcome: None,
        }
    }

    pub fn state(&self) -> BuildState {
        self.clock.state()
    }

    pub fn gather_step(&self) -> GatherStep {
        self.step
    }

    pub fn plan(&self) -> &BuildPlan {
        &self.plan
    }

    pub fn origin(&self) -> VoxelCoord {
        self.origin
    }

    pub fn ledger(&self) -> &MaterialLedger {
        &self.ledger
    }

    /// Plan indices in the order they were written to the world.
    pub fn applied_order(&self) -> &[usize] {
        &self.applied_order
    }

    /// Phase of each applied placement, in application order.
    pub fn applied_phases(&self) -> Vec<Phase> {
        self.applied_order
            .iter()
            .filter_map(|&i| self.plan.placement(i).map(|p| p.phase))
            .collect()
    }

    pub fn placed(&self) -> u32 {
        self.placed
    }

    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    pub fn current_phase(&self) -> Option<Phase> {
        match self.clock.state() {
            BuildState::Building => Phase::ALL.get(self.phase).copied(),
            _ => None,
        }
    }

    pub fn status(&self) -> BuildStatus {
        BuildStatus {
            blueprint: self.plan.name().to_owned(),
            state: self.clock.state(),
            ticks_in_state: self.clock.ticks_in_state(),
            step: self.step,
            phase: self.current_phase(),
            placed: self.placed,
            skipped: self.skipped,
            total: self.plan.len(),
            outstanding: self.ledger.total(),
        }
    }

    pub fn tick(&mut self, ctx: &mut TickContext<'_>) -> TaskStatus {
        if let Some(done) = &self.outcome {
            return done.clone();
        }
        match self.clock.state() {
            BuildState::Starting => self.travel_to_site(ctx),
            BuildState::CheckingMaterials => self.check_materials(ctx),
            BuildState::Gathering => self.gather(ctx),
            BuildState::NavigatingToStorage => self.visit_storage(ctx),
            BuildState::SitePrep => self.prepare_site(ctx),
            BuildState::Building => self.build(ctx),
            BuildState::Completed | BuildState::Failed => {}
        }
        self.clock.end_tick();
        self.outcome.clone().unwrap_or(TaskStatus::Running)
    }

    // -- Materials --------------------------------------------------------

    /// Materials for every placement not yet applied or skipped.
    fn remaining_required(&self) -> BTreeMap<ItemKind, u32> {
        let mut required = BTreeMap::new();
        for (p, _) in self
            .plan
            .placements()
            .iter()
            .zip(&self.resolved)
            .filter(|(_, done)| !**done)
        {
            if let Some(item) = p.block.placement_item() {
                *required.entry(item).or_default() += 1;
            }
        }
        required
    }

    /// World cells of every placement. Sub-gathers never break these, so
    /// felling or mining for more material cannot undo placed work.
    fn footprint(&self) -> Vec<VoxelCoord> {
        self.plan.placements().iter().map(|p| self.origin.add(p.offset)).collect()
    }

    fn refresh_ledger(&mut self, ctx: &TickContext<'_>) {
        self.ledger = MaterialLedger::for_inventory(&self.remaining_required(), &ctx.body.inventory);
    }

    fn travel_to_site(&mut self, ctx: &mut TickContext<'_>) {
        if ctx.position().within(self.origin, self.config.arrive_radius) {
            ctx.nav.stop();
            self.clock.transition(BuildState::CheckingMaterials);
            return;
        }
        if self.clock.ticks_in_state() >= self.config.travel_timeout_ticks {
            self.fail(ctx, TaskError::TravelTimeout(self.origin.to_string()));
            return;
        }
        ctx.nav.move_to(self.origin, self.config.move_speed);
    }

    fn check_materials(&mut self, ctx: &mut TickContext<'_>) {
        self.refresh_ledger(ctx);
        if self.ledger.is_empty() {
            if self.site_prepared {
                self.enter_building(ctx);
            } else {
                self.clock.transition(BuildState::SitePrep);
            }
            return;
        }
        tracing::info!(outstanding = %self.ledger.describe(), "materials short, gathering");
        self.best_outstanding = self.ledger.total();
        self.stalled_ticks = 0;
        self.set_step(GatherStep::CheckInventory);
        self.clock.transition(BuildState::Gathering);
    }

    fn set_step(&mut self, step: GatherStep) {
        tracing::debug!(from = ?self.step, to = ?step, "gather step");
        self.step = step;
        self.sub_gather = None;
        self.container_spots = None;
    }

    /// Recompute the ledger and account for progress. Returns false if the
    /// machine left the gathering loop (satisfied or timed out).
    fn track_progress(&mut self, ctx: &mut TickContext<'_>) -> bool {
        self.refresh_ledger(ctx);
        if self.ledger.is_empty() {
            self.sub_gather = None;
            self.clock.transition(BuildState::CheckingMaterials);
            return false;
        }
        let total = self.ledger.total();
        if total < self.best_outstanding {
            self.best_outstanding = total;
            self.stalled_ticks = 0;
        } else {
            self.stalled_ticks += 1;
        }
        if self.stalled_ticks > self.config.gather_timeout_ticks {
            let error = TaskError::MaterialShortage(self.ledger.describe());
            self.fail(ctx, error);
            return false;
        }
        true
    }

    fn gather(&mut self, ctx: &mut TickContext<'_>) {
        if !self.track_progress(ctx) {
            return;
        }
        match self.step {
            GatherStep::CheckInventory => self.set_step(GatherStep::CheckExternalStorage),
            GatherStep::CheckExternalStorage => self.check_external_storage(ctx),
            GatherStep::CheckNearbyContainers => self.check_containers(ctx),
            GatherStep::Mining => {
                let stone: u32 = self
                    .ledger
                    .iter()
                    .filter(|&(k, _)| family_of(k) == Some(Family::StoneLike))
                    .map(|(_, n)| n)
                    .sum();
                self.run_sub_gather(ctx, "stone", stone, GatherStep::Chopping);
            }
            GatherStep::Chopping => {
                let logs = self.ledger.log_shortfall();
                self.run_sub_gather(ctx, "wood", logs, GatherStep::Crafting);
            }
            GatherStep::Crafting => self.craft_outstanding(ctx),
        }
    }

    fn check_external_storage(&mut self, ctx: &mut TickContext<'_>) {
        let point = ctx
            .storage
            .find_access_points(ctx.body.position, self.config.storage_radius)
            .ready()
            .and_then(|points| points.first().copied());
        if let Some(point) = point {
            let needs: Vec<ItemKind> = self.ledger.iter().map(|(k, _)| k).collect();
            let wanted = |k: &ItemKind| needs.iter().any(|&r| feeds(r, *k));
            let available = ctx
                .storage
                .query_available_items(point, &wanted)
                .ready()
                .unwrap_or_default();
            if !available.is_empty() {
                tracing::debug!(%point, kinds = available.len(), "storage has materials");
                self.storage_point = Some(point);
                self.clock.transition(BuildState::NavigatingToStorage);
                return;
            }
        }
        self.set_step(GatherStep::CheckNearbyContainers);
    }

    fn visit_storage(&mut self, ctx: &mut TickContext<'_>) {
        if !self.track_progress(ctx) {
            return;
        }
        let Some(point) = self.storage_point else {
            self.set_step(GatherStep::CheckNearbyContainers);
            self.clock.transition(BuildState::Gathering);
            return;
        };
        if !ctx.position().within(point, self.config.place_reach) {
            ctx.nav.move_to(point, self.config.move_speed);
            return;
        }
        ctx.nav.stop();

        let mut received = 0;
        for (kind, need) in self.ledger.by_priority() {
            let filter = |k: &ItemKind| satisfies(kind, *k);
            let mut got = ctx.storage.extract_items(point, &filter, need).ready().unwrap_or_default();
            let mut count: u32 = got.iter().map(|s| s.count).sum();
            if count < need
                && recipe_for(kind).is_some()
                && ctx.storage.request_craft(point, kind, need - count).ready() == Some(true)
            {
                let more = ctx
                    .storage
                    .extract_items(point, &filter, need - count)
                    .ready()
                    .unwrap_or_default();
                count += more.iter().map(|s| s.count).sum::<u32>();
                got.extend(more);
            }
            for stack in got {
                ctx.receive(stack);
            }
            received += count;
        }
        tracing::info!(%point, received, "pulled materials from storage");
        self.storage_point = None;
        self.set_step(GatherStep::CheckNearbyContainers);
        self.clock.transition(BuildState::Gathering);
    }

    fn check_containers(&mut self, ctx: &mut TickContext<'_>) {
        if self.container_spots.is_none() {
            let world: &dyn World = &*ctx.world;
            let spots = ShellScan::new(ctx.body.position, self.config.container_radius)
                .collect(|p| world.block_at(p).is_container());
            self.container_spots = Some(spots);
        }
        let needs = self.ledger.by_priority();
        let wanted = |k: &ItemKind| needs.iter().any(|&(r, _)| satisfies(r, *k));
        let target = self.container_spots.as_deref().unwrap_or_default().iter().copied().find(|&p| {
            ctx.world
                .container_mut(p)
                .is_some_and(|c| c.count_matching(&wanted) > 0)
        });
        let Some(target) = target else {
            self.set_step(GatherStep::Mining);
            return;
        };
        if !ctx.position().within(target, self.config.place_reach) {
            ctx.nav.move_to(target, self.config.move_speed);
            return;
        }
        ctx.nav.stop();

        let mut taken = Vec::new();
        if let Some(container) = ctx.world.container_mut(target) {
            for &(kind, need) in &needs {
                taken.extend(container.remove_matching(&|k: &ItemKind| satisfies(kind, *k), need));
            }
        }
        let count: u32 = taken.iter().map(|s| s.count).sum();
        for stack in taken {
            ctx.receive(stack);
        }
        tracing::info!(%target, count, "took materials from container");
    }

    fn run_sub_gather(&mut self, ctx: &mut TickContext<'_>, request: &str, needed: u32, next: GatherStep) {
        if self.sub_gather.is_none() {
            if needed == 0 {
                self.set_step(next);
                return;
            }
            match GatherSession::start(request, needed, &self.gather_config) {
                Ok(session) => self.sub_gather = Some(session.quiet().excluding(self.footprint())),
                Err(error) => {
                    tracing::warn!(%error, request, "cannot gather for construction");
                    self.set_step(next);
                    return;
                }
            }
        }
        let Some(session) = self.sub_gather.as_mut() else {
            return;
        };
        if session.tick(ctx).is_finished() {
            tracing::debug!(request, mined = session.mined(), needed, "construction sub-gather finished");
            self.set_step(next);
        }
    }

    /// Craft refined materials from spare wood only. The ledger is refreshed
    /// before each recipe so a batch never eats inputs that an earlier one or
    /// a pending `Log` placement still needs.
    fn craft_outstanding(&mut self, ctx: &mut TickContext<'_>) {
        let mut made = 0;
        for (kind, _) in self.ledger.by_priority() {
            if recipe_for(kind).is_none() {
                continue;
            }
            self.refresh_ledger(ctx);
            let need = self.ledger.outstanding(kind);
            if need == 0 {
                continue;
            }
            let (produced, overflow) = craft_from_spare(&mut ctx.body.inventory, &self.ledger, kind, need);
            for stack in overflow {
                ctx.receive(stack);
            }
            made += produced;
        }
        if made > 0 {
            tracing::info!(made, "crafted building materials");
        }
        self.set_step(GatherStep::CheckInventory);
    }

    // -- Site preparation -------------------------------------------------

    /// Clearable cells in the plan's bounding box plus the margin.
    fn clearable_site_cells(&self, world: &dyn World) -> Vec<VoxelCoord> {
        let Some((lo, hi)) = self.plan.bounds() else {
            return Vec::new();
        };
        let m = self.config.site_margin;
        let (lo, hi) = (self.origin.add(lo), self.origin.add(hi));
        let mut cells = Vec::new();
        for y in lo.y..=hi.y + m {
            for z in lo.z - m..=hi.z + m {
                for x in lo.x - m..=hi.x + m {
                    let cell = VoxelCoord::new(x, y, z);
                    if world.block_at(cell).is_clearable() {
                        cells.push(cell);
                    }
                }
            }
        }
        cells
    }

    fn prepare_site(&mut self, ctx: &mut TickContext<'_>) {
        if self.site_cells.is_empty() {
            self.site_cells = self.clearable_site_cells(&*ctx.world);
            if self.site_cells.is_empty() {
                tracing::debug!("site clear");
                self.site_prepared = true;
                self.enter_building(ctx);
                return;
            }
        }
        if self.clock.ticks_in_state() >= self.config.site_prep_timeout_ticks {
            tracing::warn!(remaining = self.site_cells.len(), "site preparation timed out, building anyway");
            self.site_cells.clear();
            self.site_prepared = true;
            self.enter_building(ctx);
            return;
        }
        let mut cleared = 0;
        while cleared < self.config.clears_per_tick {
            let Some(cell) = self.site_cells.pop() else { break };
            if ctx.world.block_at(cell).is_clearable() && ctx.world.clear_vegetation(cell) {
                cleared += 1;
            }
        }
        tracing::trace!(cleared, remaining = self.site_cells.len(), "cleared site cells");
    }

    // -- Building ---------------------------------------------------------

    /// Load the first phase at or after the cursor that still has
    /// unresolved placements. False when none remain.
    fn load_phase(&mut self) -> bool {
        while let Some(&phase) = Phase::ALL.get(self.phase) {
            self.pending = self
                .plan
                .phase_indices(phase)
                .into_iter()
                .filter(|&i| !self.resolved[i])
                .collect();
            if !self.pending.is_empty() {
                tracing::debug!(?phase, placements = self.pending.len(), "phase loaded");
                return true;
            }
            self.phase += 1;
        }
        false
    }

    fn enter_building(&mut self, ctx: &mut TickContext<'_>) {
        if self.load_phase() {
            self.placement_ticks = 0;
            self.clock.transition(BuildState::Building);
        } else {
            self.complete(ctx);
        }
    }

    fn build(&mut self, ctx: &mut TickContext<'_>) {
        let Some(&index) = self.pending.front() else {
            self.advance_phase(ctx);
            return;
        };
        if self
            .last_place_tick
            .is_some_and(|t| ctx.tick < t + self.config.place_interval_ticks)
        {
            return;
        }
        let Some(placement) = self.plan.placement(index).copied() else {
            self.resolve(ctx, index, false);
            return;
        };
        let cell = self.origin.add(placement.offset);
        let current = ctx.world.block_at(cell);
        if !current.is_air() && !current.is_clearable() {
            tracing::debug!(%cell, ?current, "cell occupied, skipping placement");
            self.resolve(ctx, index, false);
            return;
        }
        if !ctx.position().within(cell, self.config.place_reach) {
            self.placement_ticks += 1;
            if self.placement_ticks > self.config.placement_dwell_ticks {
                tracing::warn!(%cell, "placement unreachable, skipping");
                self.resolve(ctx, index, false);
                return;
            }
            ctx.nav.move_to(cell, self.config.move_speed);
            return;
        }
        ctx.nav.stop();

        let Some(required) = placement.block.placement_item() else {
            self.resolve(ctx, index, false);
            return;
        };
        let Some(spent) = take_for_placement(&mut ctx.body.inventory, required) else {
            tracing::info!(%required, "ran out mid-build, rechecking materials");
            self.clock.transition(BuildState::CheckingMaterials);
            return;
        };
        let block = substituted_block(placement.block, spent);
        self.last_place_tick = Some(ctx.tick);
        if ctx.world.place_block(cell, block) {
            self.applied_order.push(index);
            self.placed += 1;
            self.resolve(ctx, index, true);
        } else {
            tracing::warn!(%cell, ?block, "world refused placement, refunding");
            ctx.receive(ItemStack::new(spent, 1));
            self.resolve(ctx, index, false);
        }
    }

    /// Mark the front placement done and move on, to the next phase if this
    /// one is finished.
    fn resolve(&mut self, ctx: &mut TickContext<'_>, index: usize, applied: bool) {
        self.resolved[index] = true;
        if !applied {
            self.skipped += 1;
        }
        self.pending.retain(|&i| i != index);
        self.placement_ticks = 0;
        if self.pending.is_empty() {
            self.advance_phase(ctx);
        }
    }

    fn advance_phase(&mut self, ctx: &mut TickContext<'_>) {
        self.phase += 1;
        if !self.load_phase() {
            self.complete(ctx);
        }
    }

    // -- Outcomes ---------------------------------------------------------

    fn complete(&mut self, ctx: &mut TickContext<'_>) {
        tracing::info!(blueprint = self.plan.name(), placed = self.placed, skipped = self.skipped, "build complete");
        ctx.nav.stop();
        ctx.reporter
            .report(&format!("Finished building the {}!", self.plan.name()));
        self.pending.clear();
        self.outcome = Some(TaskStatus::Completed);
        self.clock.transition(BuildState::Completed);
    }

    fn fail(&mut self, ctx: &mut TickContext<'_>, error: TaskError) {
        tracing::info!(blueprint = self.plan.name(), placed = self.placed, %error, "build failed");
        ctx.nav.stop();
        ctx.reporter.report(&error.to_string());
        self.sub_gather = None;
        self.pending.clear();
        self.outcome = Some(TaskStatus::Failed(error));
        self.clock.transition(BuildState::Failed);
    }
}
