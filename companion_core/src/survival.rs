// Survival state machine: the companion's autonomous top-level loop.
//
// The machine never terminates. It starts in Assessing, which runs a short
// fixed timeline (environment scan, self scan, decision) and then commits to
// one activity state. Every activity state returns to Assessing when its
// work is done or when its tick ceiling is reached, so a stuck activity
// costs at most one ceiling before the agent reconsiders.
//
// The decision is a priority ladder, evaluated by the pure `decide` function
// over an `Assessment` snapshot:
//
//   1. carried gear strictly better than what is worn  → Equipping
//   2. food below threshold → RetrievingExternalStorage (access point known),
//      else Hunting, else Gathering (mature crops, while hunting cools down)
//   3. inventory over half full with a known container  → Storing
//   4. armed: Exploring or Patrolling; unarmed: Resting or, rarely, Exploring
//
// The random choices in step 4 draw from the injected `RandomSource` with
// probabilities from `SurvivalConfig`.
//
// Hunting never targets named, leashed, penned, rideable, tameable or
// non-game animals. A hunt that finds nothing is reported once, starts a
// cooldown, and returns to Assessing without a single attack.
//
// See also: `config.rs` (`SurvivalConfig`), `gather.rs` (crop harvesting
// runs a quiet `GatherSession`), `inventory.rs` (self scan, gear, vacuum),
// `companion.rs` which runs this machine whenever no command is active.
//
// **Critical constraint: determinism.** Scans iterate shells and entity
// lists in a fixed order; ties between hunt targets and threats break on
// `EntityId`.

use crate::config::{GatherConfig, SurvivalConfig};
use crate::error::TaskError;
use crate::gather::GatherSession;
use crate::host::{AnimalSpecies, AttackOutcome, EntityKind, EntitySnapshot, TickContext, World};
use crate::inventory::{AgentSelfState, vacuum_drops};
use crate::items::ItemKind;
use crate::search::ShellScan;
use crate::task::TaskClock;
use crate::types::{Block, EntityId, VoxelCoord};
use companion_prng::RandomSource;
use serde::Serialize;
use std::collections::VecDeque;

/// Points of interest kept from one environment scan.
const POI_LIMIT: usize = 16;

/// Distance at which an exploration waypoint counts as reached.
const WAYPOINT_ARRIVAL: f64 = 1.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SurvivalState {
    Assessing,
    Hunting,
    Gathering,
    Equipping,
    Storing,
    RetrievingExternalStorage,
    Exploring,
    Patrolling,
    Resting,
}

/// What the last Assessing pass learned. Environment fields come from the
/// environment scan, `self_state`/`better_gear`/`inventory_over_half` from
/// the self scan, cooldown flags are filled in at decision time.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Assessment {
    pub self_state: AgentSelfState,
    pub better_gear: bool,
    pub inventory_over_half: bool,
    /// Nearest container block within the scan radius.
    pub storage_target: Option<VoxelCoord>,
    /// Nearest storage-network access point.
    pub access_point: Option<VoxelCoord>,
    pub mature_crops: Option<VoxelCoord>,
    pub points_of_interest: Vec<VoxelCoord>,
    pub threats: usize,
    pub hunt_on_cooldown: bool,
    pub retrieval_on_cooldown: bool,
}

/// The priority ladder. Pure: reads only its arguments and the random
/// source, so every branch is testable without a world.
pub fn decide(assessment: &Assessment, config: &SurvivalConfig, rng: &mut dyn RandomSource) -> SurvivalState {
    if assessment.better_gear {
        return SurvivalState::Equipping;
    }
    if assessment.self_state.food_count < config.food_threshold {
        if assessment.access_point.is_some() && !assessment.retrieval_on_cooldown {
            return SurvivalState::RetrievingExternalStorage;
        }
        if !assessment.hunt_on_cooldown {
            return SurvivalState::Hunting;
        }
        if assessment.mature_crops.is_some() {
            return SurvivalState::Gathering;
        }
    }
    if assessment.inventory_over_half && assessment.storage_target.is_some() {
        return SurvivalState::Storing;
    }
    if assessment.self_state.has_weapon {
        if rng.chance(config.armed_explore_chance) {
            SurvivalState::Exploring
        } else {
            SurvivalState::Patrolling
        }
    } else if rng.chance(config.unarmed_explore_chance) {
        SurvivalState::Exploring
    } else {
        SurvivalState::Resting
    }
}

// ---------------------------------------------------------------------------
// Hunting
// ---------------------------------------------------------------------------

/// Relative worth of a kill. Zero means the species is never hunted.
pub fn hunt_value(species: AnimalSpecies) -> f64 {
    match species {
        AnimalSpecies::Cow | AnimalSpecies::Pig => 3.0,
        AnimalSpecies::Sheep => 2.0,
        AnimalSpecies::Chicken => 1.5,
        AnimalSpecies::Rabbit => 1.0,
        _ => 0.0,
    }
}

fn is_flooring(block: Block) -> bool {
    matches!(
        block,
        Block::Planks(_) | Block::Slab(_) | Block::Stairs(_) | Block::Cobblestone | Block::CobbledDeepslate
    )
}

/// Enclosure heuristic: the animal stands on placed flooring, or enough
/// fence and wall blocks surround it.
pub fn is_penned(world: &dyn World, pos: VoxelCoord, config: &SurvivalConfig) -> bool {
    if is_flooring(world.block_at(pos.below())) {
        return true;
    }
    let r = config.enclosure_radius;
    let mut barriers = 0;
    for dy in -1..=1 {
        for dz in -r..=r {
            for dx in -r..=r {
                if matches!(world.block_at(pos.offset(dx, dy, dz)), Block::Fence | Block::StoneWall) {
                    barriers += 1;
                    if barriers >= config.enclosure_block_threshold {
                        return true;
                    }
                }
            }
        }
    }
    false
}

pub fn is_huntable(entity: &EntitySnapshot, world: &dyn World, config: &SurvivalConfig) -> bool {
    let EntityKind::Animal(species) = entity.kind else {
        return false;
    };
    hunt_value(species) > 0.0
        && !species.is_mount()
        && !species.is_utility()
        && !entity.named
        && !entity.leashed
        && !entity.non_game
        && !is_penned(world, entity.position, config)
}

/// Best huntable animal within the hunt radius: highest value per distance,
/// lowest id on ties.
pub fn find_hunt_target(world: &dyn World, from: VoxelCoord, config: &SurvivalConfig) -> Option<EntitySnapshot> {
    let mut best: Option<(f64, EntitySnapshot)> = None;
    for entity in world.entities_near(from, config.hunt_radius) {
        let EntityKind::Animal(species) = entity.kind else {
            continue;
        };
        if !is_huntable(&entity, world, config) {
            continue;
        }
        let score = hunt_value(species) / (1.0 + from.distance(entity.position));
        let better = match &best {
            None => true,
            Some((s, b)) => score > *s || (score == *s && entity.id < b.id),
        };
        if better {
            best = Some((score, entity));
        }
    }
    best.map(|(_, e)| e)
}

// ---------------------------------------------------------------------------
// Exploring
// ---------------------------------------------------------------------------

/// Sample `explore_candidates` random points around `from` and keep the best
/// scored one. Distance near the preferred distance scores highest; being
/// near a point of interest adds a bonus; being near a recently visited
/// waypoint subtracts a penalty. Candidates closer than the minimum distance
/// are discarded. `None` if every candidate was discarded.
pub fn choose_waypoint(
    from: VoxelCoord,
    points_of_interest: &[VoxelCoord],
    visited: &VecDeque<VoxelCoord>,
    config: &SurvivalConfig,
    rng: &mut dyn RandomSource,
) -> Option<VoxelCoord> {
    let max = config.explore_max_distance;
    let preferred = config.explore_preferred_distance.max(1.0);
    let mut best: Option<(f64, VoxelCoord)> = None;
    for _ in 0..config.explore_candidates {
        let dx = rng.range_i32_inclusive(-max, max);
        let dz = rng.range_i32_inclusive(-max, max);
        let candidate = from.offset(dx, 0, dz);
        let distance = from.distance(candidate);
        if distance < f64::from(config.explore_min_distance) {
            continue;
        }
        let mut score = 1.0 - (distance - preferred).abs() / preferred;
        if points_of_interest
            .iter()
            .any(|p| p.distance(candidate) <= config.explore_poi_radius)
        {
            score += config.explore_poi_bonus;
        }
        if visited
            .iter()
            .any(|v| v.distance(candidate) <= config.explore_visited_radius)
        {
            score -= config.explore_visited_penalty;
        }
        if best.is_none_or(|(s, _)| score > s) {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, c)| c)
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct SurvivalStatus {
    pub state: SurvivalState,
    pub ticks_in_state: u64,
    pub decisions: u64,
    pub hunt_target: Option<EntityId>,
    pub waypoint: Option<VoxelCoord>,
    pub assessment: Assessment,
}

#[derive(Clone, Debug)]
pub struct SurvivalMachine {
    clock: TaskClock<SurvivalState>,
    config: SurvivalConfig,
    gather_config: GatherConfig,
    assessment: Assessment,
    hunt_target: Option<EntityId>,
    last_attack_tick: Option<u64>,
    hunt_cooldown_until: u64,
    retrieval_cooldown_until: u64,
    crops: Option<GatherSession>,
    waypoint: Option<VoxelCoord>,
    visited: VecDeque<VoxelCoord>,
    decisions: u64,
}

impl SurvivalMachine {
    pub fn new(config: &SurvivalConfig, gather_config: &GatherConfig) -> Self {
        Self {
            clock: TaskClock::new("survival", SurvivalState::Assessing),
            config: config.clone(),
            gather_config: gather_config.clone(),
            assessment: Assessment::default(),
            hunt_target: None,
            last_attack_tick: None,
            hunt_cooldown_until: 0,
            retrieval_cooldown_until: 0,
            crops: None,
            waypoint: None,
            visited: VecDeque::new(),
            decisions: 0,
        }
    }

    pub fn state(&self) -> SurvivalState {
        self.clock.state()
    }

    pub fn ticks_in_state(&self) -> u64 {
        self.clock.ticks_in_state()
    }

    pub fn assessment(&self) -> &Assessment {
        &self.assessment
    }

    pub fn hunt_target(&self) -> Option<EntityId> {
        self.hunt_target
    }

    /// Recent exploration waypoints, oldest first.
    pub fn visited(&self) -> &VecDeque<VoxelCoord> {
        &self.visited
    }

    pub fn status(&self) -> SurvivalStatus {
        SurvivalStatus {
            state: self.clock.state(),
            ticks_in_state: self.clock.ticks_in_state(),
            decisions: self.decisions,
            hunt_target: self.hunt_target,
            waypoint: self.waypoint,
            assessment: self.assessment.clone(),
        }
    }

    fn ceiling(&self, state: SurvivalState) -> u64 {
        let c = &self.config.ceilings;
        match state {
            SurvivalState::Assessing => c.assessing,
            SurvivalState::Hunting => c.hunting,
            SurvivalState::Gathering => c.gathering,
            SurvivalState::Equipping => c.equipping,
            SurvivalState::Storing => c.storing,
            SurvivalState::RetrievingExternalStorage => c.retrieving,
            SurvivalState::Exploring => c.exploring,
            SurvivalState::Patrolling => c.patrolling,
            SurvivalState::Resting => c.resting,
        }
    }

    pub fn tick(&mut self, ctx: &mut TickContext<'_>) {
        vacuum_drops(ctx.world, ctx.body, self.gather_config.pickup_radius);

        let state = self.clock.state();
        let ticks = self.clock.ticks_in_state();
        if state != SurvivalState::Assessing && ticks >= self.ceiling(state) {
            tracing::debug!(?state, ticks, "survival state ceiling reached");
            self.leave(ctx);
            self.clock.transition(SurvivalState::Assessing);
            self.clock.end_tick();
            return;
        }

        match state {
            SurvivalState::Assessing => self.assess(ctx, ticks),
            SurvivalState::Hunting => self.hunt(ctx),
            SurvivalState::Gathering => self.gather_crops(ctx),
            SurvivalState::Equipping => {
                let changed = ctx.body.equip_best_gear();
                tracing::info!(changed, "equipped better gear");
                self.clock.transition(SurvivalState::Assessing);
            }
            SurvivalState::Storing => self.store(ctx),
            SurvivalState::RetrievingExternalStorage => self.retrieve(ctx),
            SurvivalState::Exploring => self.explore(ctx, ticks),
            SurvivalState::Patrolling => self.patrol(ctx, ticks),
            SurvivalState::Resting => {}
        }
        self.clock.end_tick();
    }

    /// Drop per-activity state when an activity is cut short.
    fn leave(&mut self, ctx: &mut TickContext<'_>) {
        ctx.nav.stop();
        self.hunt_target = None;
        self.crops = None;
        self.waypoint = None;
    }

    // -- Assessing --------------------------------------------------------

    fn assess(&mut self, ctx: &mut TickContext<'_>, ticks: u64) {
        let (env_tick, self_tick, decision_tick) = (
            self.config.environment_scan_tick,
            self.config.self_scan_tick,
            self.config.decision_tick,
        );
        if ticks == env_tick {
            self.scan_environment(ctx);
        }
        if ticks == self_tick {
            self.scan_self(ctx);
        }
        if ticks >= decision_tick || ticks >= self.config.ceilings.assessing {
            self.assessment.hunt_on_cooldown = ctx.tick < self.hunt_cooldown_until;
            self.assessment.retrieval_on_cooldown = ctx.tick < self.retrieval_cooldown_until;
            let next = decide(&self.assessment, &self.config, ctx.rng);
            self.decisions += 1;
            tracing::debug!(
                ?next,
                food = self.assessment.self_state.food_count,
                armed = self.assessment.self_state.has_weapon,
                "survival decision"
            );
            self.enter(ctx, next);
        }
    }

    fn scan_environment(&mut self, ctx: &mut TickContext<'_>) {
        let pos = ctx.position();
        let world: &dyn World = &*ctx.world;
        let found = ShellScan::new(pos, self.config.environment_scan_radius).collect(|p| {
            let block = world.block_at(p);
            block.is_landmark() || matches!(block, Block::Crop { mature: true, .. })
        });

        let a = &mut self.assessment;
        a.storage_target = found.iter().copied().find(|&p| world.block_at(p).is_container());
        a.mature_crops = found
            .iter()
            .copied()
            .find(|&p| matches!(world.block_at(p), Block::Crop { mature: true, .. }));
        a.points_of_interest = found
            .iter()
            .copied()
            .filter(|&p| world.block_at(p).is_landmark())
            .take(POI_LIMIT)
            .collect();
        a.threats = world
            .entities_near(pos, self.config.threat_radius)
            .iter()
            .filter(|e| e.kind == EntityKind::Hostile)
            .count();
        a.access_point = ctx
            .storage
            .find_access_points(pos, self.config.access_point_radius)
            .ready()
            .and_then(|points| points.first().copied());
    }

    fn scan_self(&mut self, ctx: &mut TickContext<'_>) {
        let a = &mut self.assessment;
        a.self_state = ctx.body.self_state();
        a.better_gear = ctx.body.has_better_gear();
        a.inventory_over_half = ctx.body.inventory.is_over_half_full();
    }

    /// Commit to `next`, running its entry step. An activity that cannot
    /// start goes straight back to Assessing.
    fn enter(&mut self, ctx: &mut TickContext<'_>, next: SurvivalState) {
        match next {
            SurvivalState::Hunting => {
                let Some(target) = find_hunt_target(&*ctx.world, ctx.position(), &self.config) else {
                    tracing::info!("no huntable animals nearby");
                    ctx.reporter.report(&TaskError::NothingToHunt.to_string());
                    self.hunt_cooldown_until = ctx.tick + self.config.hunt_cooldown_ticks;
                    self.clock.transition(SurvivalState::Assessing);
                    return;
                };
                tracing::debug!(id = ?target.id, kind = ?target.kind, at = %target.position, "hunt target chosen");
                self.hunt_target = Some(target.id);
                self.last_attack_tick = None;
            }
            SurvivalState::Gathering => {
                match GatherSession::start("crops", self.config.crop_gather_count, &self.gather_config) {
                    Ok(session) => self.crops = Some(session.quiet()),
                    Err(error) => {
                        tracing::warn!(%error, "crop gathering unavailable");
                        self.clock.transition(SurvivalState::Assessing);
                        return;
                    }
                }
            }
            SurvivalState::Exploring => {
                let from = ctx.position();
                let Some(waypoint) =
                    choose_waypoint(from, &self.assessment.points_of_interest, &self.visited, &self.config, ctx.rng)
                else {
                    self.clock.transition(SurvivalState::Assessing);
                    return;
                };
                self.visited.push_back(waypoint);
                while self.visited.len() > self.config.waypoint_history {
                    self.visited.pop_front();
                }
                self.waypoint = Some(waypoint);
                ctx.nav.move_to(waypoint, self.config.move_speed);
            }
            SurvivalState::Patrolling => self.last_attack_tick = None,
            SurvivalState::Resting => ctx.nav.stop(),
            _ => {}
        }
        self.clock.transition(next);
    }

    // -- Activities -------------------------------------------------------

    /// Attack `target` if the attack interval has elapsed.
    fn strike(&mut self, ctx: &mut TickContext<'_>, target: EntityId) -> Option<AttackOutcome> {
        let interval = self.config.attack_interval_ticks;
        if self.last_attack_tick.is_some_and(|t| ctx.tick < t + interval) {
            return None;
        }
        self.last_attack_tick = Some(ctx.tick);
        Some(ctx.world.attack(target, ctx.body.melee_damage()))
    }

    fn hunt(&mut self, ctx: &mut TickContext<'_>) {
        let Some(id) = self.hunt_target else {
            self.clock.transition(SurvivalState::Assessing);
            return;
        };
        let pos = ctx.position();
        let target = ctx
            .world
            .entities_near(pos, self.config.hunt_radius.saturating_mul(2))
            .into_iter()
            .find(|e| e.id == id);
        let Some(target) = target else {
            tracing::debug!(?id, "hunt target gone");
            self.hunt_target = None;
            self.clock.transition(SurvivalState::Assessing);
            return;
        };
        if !pos.within(target.position, self.config.attack_reach) {
            ctx.nav.move_to(target.position, self.config.move_speed);
            return;
        }
        ctx.nav.stop();
        match self.strike(ctx, id) {
            Some(AttackOutcome::Hit { remaining_health }) => {
                tracing::trace!(?id, remaining_health, "hit hunt target");
            }
            Some(AttackOutcome::Killed | AttackOutcome::Missing) => {
                tracing::info!(?id, "hunt finished");
                self.hunt_target = None;
                self.clock.transition(SurvivalState::Assessing);
            }
            None => {}
        }
    }

    fn gather_crops(&mut self, ctx: &mut TickContext<'_>) {
        let Some(session) = self.crops.as_mut() else {
            self.clock.transition(SurvivalState::Assessing);
            return;
        };
        if session.tick(ctx).is_finished() {
            tracing::info!(harvested = session.mined(), "crop harvest finished");
            self.crops = None;
            self.clock.transition(SurvivalState::Assessing);
        }
    }

    fn store(&mut self, ctx: &mut TickContext<'_>) {
        let Some(target) = self
            .assessment
            .storage_target
            .filter(|&p| ctx.world.block_at(p).is_container())
        else {
            self.clock.transition(SurvivalState::Assessing);
            return;
        };
        if !ctx.position().within(target, self.config.interact_reach) {
            ctx.nav.move_to(target, self.config.move_speed);
            return;
        }
        ctx.nav.stop();
        let Some(container) = ctx.world.container_mut(target) else {
            self.clock.transition(SurvivalState::Assessing);
            return;
        };
        let moved = ctx
            .body
            .inventory
            .transfer_into(container, &|k: &ItemKind| !k.is_kept_on_deposit());
        tracing::info!(%target, moved, "deposited items");
        if moved > 0 {
            ctx.reporter.report(&format!("Stored {moved} items."));
        }
        self.clock.transition(SurvivalState::Assessing);
    }

    fn retrieve(&mut self, ctx: &mut TickContext<'_>) {
        let Some(point) = self.assessment.access_point else {
            self.retrieval_failed(ctx);
            return;
        };
        if !ctx.position().within(point, self.config.interact_reach) {
            ctx.nav.move_to(point, self.config.move_speed);
            return;
        }
        ctx.nav.stop();
        let food = ctx
            .storage
            .extract_items(point, &|k: &ItemKind| k.is_food(), self.config.retrieve_max)
            .ready()
            .unwrap_or_default();
        let total: u32 = food.iter().map(|s| s.count).sum();
        if total == 0 {
            self.retrieval_failed(ctx);
            return;
        }
        for stack in food {
            ctx.receive(stack);
        }
        tracing::info!(%point, total, "retrieved food from storage");
        ctx.reporter.report(&format!("Grabbed {total} food from storage."));
        self.clock.transition(SurvivalState::Assessing);
    }

    fn retrieval_failed(&mut self, ctx: &mut TickContext<'_>) {
        tracing::warn!("no food from external storage, hunting instead");
        self.retrieval_cooldown_until = ctx.tick + self.config.retrieval_cooldown_ticks;
        self.enter(ctx, SurvivalState::Hunting);
    }

    fn explore(&mut self, ctx: &mut TickContext<'_>, ticks: u64) {
        let Some(waypoint) = self.waypoint else {
            self.clock.transition(SurvivalState::Assessing);
            return;
        };
        let arrived = ctx.position().within(waypoint, WAYPOINT_ARRIVAL);
        if arrived || (ticks > 0 && ctx.nav.is_done()) {
            tracing::debug!(%waypoint, arrived, "exploration leg over");
            self.waypoint = None;
            self.clock.transition(SurvivalState::Assessing);
        }
    }

    fn patrol(&mut self, ctx: &mut TickContext<'_>, ticks: u64) {
        let pos = ctx.position();
        let threat = ctx
            .world
            .entities_near(pos, self.config.threat_radius)
            .into_iter()
            .filter(|e| e.kind == EntityKind::Hostile)
            .min_by_key(|e| (e.position.distance_squared(pos), e.id));

        if let Some(threat) = threat {
            if !pos.within(threat.position, self.config.attack_reach) {
                ctx.nav.move_to(threat.position, self.config.move_speed);
                return;
            }
            ctx.nav.stop();
            if let Some(outcome) = self.strike(ctx, threat.id) {
                tracing::debug!(id = ?threat.id, ?outcome, "engaged threat");
            }
            return;
        }

        if ticks % self.config.patrol_wander_interval_ticks.max(1) == 0 {
            let r = self.config.patrol_radius;
            let (dx, dz) = (ctx.rng.range_i32_inclusive(-r, r), ctx.rng.range_i32_inclusive(-r, r));
            let goal = ctx.body.home.offset(dx, 0, dz);
            ctx.nav.move_to(goal, self.config.move_speed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StateCeilings;
    use crate::items::{FoodKind, ItemStack, Tier};
    use crate::sandbox::{GridWorld, Harness, MemoryStorageNetwork};
    use companion_prng::{GameRng, ScriptedRng};

    fn field() -> GridWorld {
        let mut world = GridWorld::new(40, 24, 40);
        world.fill(VoxelCoord::new(0, 9, 0), VoxelCoord::new(39, 9, 39), Block::GrassBlock);
        world
    }

    fn harness(world: GridWorld) -> Harness {
        Harness::new(world, VoxelCoord::new(10, 10, 10), 7)
    }

    fn hungry() -> Assessment {
        Assessment::default()
    }

    fn fed() -> Assessment {
        Assessment {
            self_state: AgentSelfState {
                food_count: 20,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn run(h: &mut Harness, machine: &mut SurvivalMachine, ticks: u32) -> Vec<SurvivalState> {
        (0..ticks)
            .map(|_| {
                h.step(|ctx| machine.tick(ctx));
                machine.state()
            })
            .collect()
    }

    #[test]
    fn ladder_prefers_gear_then_food() {
        let cfg = SurvivalConfig::default();
        let mut rng = ScriptedRng::from_unit_floats(&[0.5]);
        let mut a = hungry();
        a.better_gear = true;
        a.access_point = Some(VoxelCoord::new(0, 0, 0));
        assert_eq!(decide(&a, &cfg, &mut rng), SurvivalState::Equipping);

        a.better_gear = false;
        assert_eq!(decide(&a, &cfg, &mut rng), SurvivalState::RetrievingExternalStorage);

        a.retrieval_on_cooldown = true;
        assert_eq!(decide(&a, &cfg, &mut rng), SurvivalState::Hunting);

        a.access_point = None;
        a.retrieval_on_cooldown = false;
        assert_eq!(decide(&a, &cfg, &mut rng), SurvivalState::Hunting);

        a.hunt_on_cooldown = true;
        a.mature_crops = Some(VoxelCoord::new(1, 0, 1));
        assert_eq!(decide(&a, &cfg, &mut rng), SurvivalState::Gathering);
    }

    #[test]
    fn ladder_storing_and_idle_choices() {
        let cfg = SurvivalConfig::default();
        let mut a = fed();
        a.inventory_over_half = true;
        a.storage_target = Some(VoxelCoord::new(3, 0, 0));
        let mut rng = ScriptedRng::from_unit_floats(&[0.0]);
        assert_eq!(decide(&a, &cfg, &mut rng), SurvivalState::Storing);

        // Over half full but nowhere to store falls through.
        a.storage_target = None;
        a.self_state.has_weapon = true;
        let mut low = ScriptedRng::from_unit_floats(&[0.1]);
        let mut high = ScriptedRng::from_unit_floats(&[0.9]);
        assert_eq!(decide(&a, &cfg, &mut low), SurvivalState::Exploring);
        assert_eq!(decide(&a, &cfg, &mut high), SurvivalState::Patrolling);

        a.self_state.has_weapon = false;
        let mut rare = ScriptedRng::from_unit_floats(&[0.05]);
        let mut common = ScriptedRng::from_unit_floats(&[0.5]);
        assert_eq!(decide(&a, &cfg, &mut rare), SurvivalState::Exploring);
        assert_eq!(decide(&a, &cfg, &mut common), SurvivalState::Resting);
    }

    #[test]
    fn hungry_with_everything_on_cooldown_falls_through() {
        let cfg = SurvivalConfig::default();
        let mut a = hungry();
        a.hunt_on_cooldown = true;
        let mut rng = ScriptedRng::from_unit_floats(&[0.9]);
        assert_eq!(decide(&a, &cfg, &mut rng), SurvivalState::Resting);
    }

    #[test]
    fn hunt_target_excludes_protected_animals() {
        let mut world = field();
        let cfg = SurvivalConfig::default();
        let from = VoxelCoord::new(10, 10, 10);
        let named = world.add_animal(AnimalSpecies::Cow, VoxelCoord::new(11, 10, 10));
        world.entity_mut(named).unwrap().named = true;
        let leashed = world.add_animal(AnimalSpecies::Pig, VoxelCoord::new(10, 10, 11));
        world.entity_mut(leashed).unwrap().leashed = true;
        let modded = world.add_animal(AnimalSpecies::Pig, VoxelCoord::new(9, 10, 10));
        world.entity_mut(modded).unwrap().non_game = true;
        world.add_animal(AnimalSpecies::Horse, VoxelCoord::new(10, 10, 9));
        world.add_animal(AnimalSpecies::Wolf, VoxelCoord::new(12, 10, 10));
        assert!(find_hunt_target(&world, from, &cfg).is_none());

        let sheep = world.add_animal(AnimalSpecies::Sheep, VoxelCoord::new(20, 10, 10));
        assert_eq!(find_hunt_target(&world, from, &cfg).map(|e| e.id), Some(sheep));
    }

    #[test]
    fn hunt_target_prefers_value_per_distance() {
        let mut world = field();
        let cfg = SurvivalConfig::default();
        let from = VoxelCoord::new(10, 10, 10);
        // Rabbit: 1 / (1 + 1) = 0.5. Cow: 3 / (1 + 4) = 0.6.
        world.add_animal(AnimalSpecies::Rabbit, VoxelCoord::new(11, 10, 10));
        let cow = world.add_animal(AnimalSpecies::Cow, VoxelCoord::new(14, 10, 10));
        assert_eq!(find_hunt_target(&world, from, &cfg).map(|e| e.id), Some(cow));
    }

    #[test]
    fn penned_by_fences_or_flooring() {
        let mut world = field();
        let cfg = SurvivalConfig::default();
        let pos = VoxelCoord::new(20, 10, 20);
        assert!(!is_penned(&world, pos, &cfg));
        for x in 18..=22 {
            world.set_block(VoxelCoord::new(x, 10, 18), Block::Fence);
        }
        assert!(is_penned(&world, pos, &cfg));

        let barn = VoxelCoord::new(5, 10, 30);
        assert!(!is_penned(&world, barn, &cfg));
        world.set_block(barn.below(), Block::Planks(crate::types::WoodSpecies::Oak));
        assert!(is_penned(&world, barn, &cfg));
    }

    #[test]
    fn waypoints_respect_distance_bounds() {
        let cfg = SurvivalConfig::default();
        let from = VoxelCoord::new(0, 64, 0);
        let mut rng = GameRng::new(99);
        let visited = VecDeque::new();
        for _ in 0..50 {
            let Some(w) = choose_waypoint(from, &[], &visited, &cfg, &mut rng) else {
                continue;
            };
            assert!(from.distance(w) >= f64::from(cfg.explore_min_distance));
            assert!(from.chebyshev_distance(w) <= cfg.explore_max_distance as u32);
            assert_eq!(w.y, from.y);
        }
    }

    #[test]
    fn waypoints_avoid_recent_history() {
        let cfg = SurvivalConfig {
            explore_candidates: 64,
            ..Default::default()
        };
        let from = VoxelCoord::new(0, 64, 0);
        let first = choose_waypoint(from, &[], &VecDeque::new(), &cfg, &mut GameRng::new(5)).unwrap();
        let visited: VecDeque<_> = [first].into_iter().collect();
        let second = choose_waypoint(from, &[], &visited, &cfg, &mut GameRng::new(5)).unwrap();
        assert!(second.distance(first) > cfg.explore_visited_radius);
    }

    #[test]
    fn assessing_timeline_then_no_hunt_targets() {
        let mut h = harness(field());
        let mut machine = SurvivalMachine::new(&SurvivalConfig::default(), &GatherConfig::default());
        let states = run(&mut h, &mut machine, 2);
        assert_eq!(states, vec![SurvivalState::Assessing, SurvivalState::Assessing]);
        assert_eq!(machine.status().decisions, 0);

        // Third tick decides: hungry, no access point, nothing to hunt.
        run(&mut h, &mut machine, 1);
        assert_eq!(machine.status().decisions, 1);
        assert_eq!(machine.state(), SurvivalState::Assessing);
        assert_eq!(h.reporter.count_containing("No animals to hunt nearby"), 1);
        assert!(h.world.attack_log.is_empty());

        // The cooldown keeps the report from repeating.
        run(&mut h, &mut machine, 60);
        assert_eq!(h.reporter.count_containing("No animals to hunt nearby"), 1);
    }

    #[test]
    fn hunts_a_cow_and_collects_the_meat() {
        let mut world = field();
        let cow = world.add_animal(AnimalSpecies::Cow, VoxelCoord::new(18, 10, 10));
        let mut h = harness(world);
        let mut machine = SurvivalMachine::new(&SurvivalConfig::default(), &GatherConfig::default());
        run(&mut h, &mut machine, 300);
        assert!(h.world.entity(cow).is_none());
        assert!(h.world.attack_log.iter().all(|&id| id == cow));
        assert_eq!(h.body.inventory.count(ItemKind::Food(FoodKind::RawBeef)), 2);
    }

    #[test]
    fn equips_then_stores_everything_but_keepers() {
        let mut world = field();
        let chest = VoxelCoord::new(13, 10, 10);
        world.set_block(chest, Block::Chest);
        world
            .container_mut(chest)
            .unwrap()
            .add_item(ItemStack::block(Block::Cobblestone, 30));
        let mut h = harness(world);
        for _ in 0..20 {
            h.body.inventory.add_item(ItemStack::block(Block::Cobblestone, 64));
        }
        h.body.inventory.add_item(ItemStack::new(ItemKind::Food(FoodKind::Bread), 4));
        h.body.inventory.add_item(ItemStack::new(ItemKind::Sword(Tier::Iron), 1));

        let cfg = SurvivalConfig {
            food_threshold: 0,
            ..Default::default()
        };
        let mut machine = SurvivalMachine::new(&cfg, &GatherConfig::default());
        let states = run(&mut h, &mut machine, 12);
        assert!(states.contains(&SurvivalState::Equipping));
        assert!(states.contains(&SurvivalState::Storing));

        assert_eq!(h.body.main_hand(), Some(ItemKind::Sword(Tier::Iron)));
        assert_eq!(h.body.inventory.count(ItemKind::Block(Block::Cobblestone)), 0);
        assert_eq!(h.body.inventory.count(ItemKind::Food(FoodKind::Bread)), 4);
        let stored = h.world.container(chest).unwrap();
        assert_eq!(stored.count(ItemKind::Block(Block::Cobblestone)), 30 + 20 * 64);
        assert_eq!(h.reporter.count_containing("Stored 1280 items."), 1);
    }

    #[test]
    fn retrieves_food_from_storage() {
        let mut h = harness(field());
        let point = VoxelCoord::new(12, 10, 10);
        h.storage = MemoryStorageNetwork::new(vec![point]);
        h.storage.store.add_item(ItemStack::new(ItemKind::Food(FoodKind::Bread), 10));
        let mut machine = SurvivalMachine::new(&SurvivalConfig::default(), &GatherConfig::default());
        run(&mut h, &mut machine, 6);
        assert_eq!(h.body.inventory.count(ItemKind::Food(FoodKind::Bread)), 10);
        assert_eq!(h.reporter.count_containing("Grabbed 10 food"), 1);
        assert!(h.storage.store.is_empty());
    }

    #[test]
    fn empty_storage_falls_back_to_hunting() {
        let mut h = harness(field());
        h.storage = MemoryStorageNetwork::new(vec![VoxelCoord::new(12, 10, 10)]);
        let mut machine = SurvivalMachine::new(&SurvivalConfig::default(), &GatherConfig::default());
        let states = run(&mut h, &mut machine, 4);
        assert!(states.contains(&SurvivalState::RetrievingExternalStorage));
        // Retrieval failed, the hunt found nothing, back to Assessing.
        assert_eq!(h.reporter.count_containing("No animals to hunt nearby"), 1);
        assert_eq!(machine.state(), SurvivalState::Assessing);
        assert!(h.world.attack_log.is_empty());
    }

    #[test]
    fn every_activity_is_bounded_by_its_ceiling() {
        let cfg = SurvivalConfig {
            food_threshold: 0,
            unarmed_explore_chance: 0.0,
            ceilings: StateCeilings {
                resting: 5,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut h = harness(field());
        let mut machine = SurvivalMachine::new(&cfg, &GatherConfig::default());
        let states = run(&mut h, &mut machine, 20);
        let first_rest = states.iter().position(|&s| s == SurvivalState::Resting).unwrap();
        let rest_run = states[first_rest..]
            .iter()
            .take_while(|&&s| s == SurvivalState::Resting)
            .count();
        assert!(rest_run <= 6, "rested {rest_run} ticks");
        assert_eq!(states[first_rest + rest_run], SurvivalState::Assessing);
    }

    #[test]
    fn patrol_engages_nearby_hostiles() {
        let mut world = field();
        let zombie = world.add_hostile(VoxelCoord::new(15, 10, 10));
        let mut h = harness(world);
        h.body.equipment.main_hand = Some(ItemStack::new(ItemKind::Sword(Tier::Iron), 1));
        let cfg = SurvivalConfig {
            food_threshold: 0,
            armed_explore_chance: 0.0,
            ..Default::default()
        };
        let mut machine = SurvivalMachine::new(&cfg, &GatherConfig::default());
        let states = run(&mut h, &mut machine, 40);
        assert!(states.contains(&SurvivalState::Patrolling));
        assert!(h.world.attack_log.contains(&zombie));
    }
}
