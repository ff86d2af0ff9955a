// Material accounting for construction: equivalence families, the
// outstanding-materials ledger, and fixed-ratio crafting.
//
// A plan asks for exact block items, but any member of the same family
// will do: any stone-like block for cobblestone, any species for planks,
// logs, stairs and slabs. `MaterialLedger::compute` allocates owned items
// against requirements in two passes over one shared working copy of the
// inventory counts: exact matches first for every requirement, then family
// substitutes. An item allocated once is never counted again, and the
// computation is a pure function of (requirements, inventory), so
// recomputing it without changes yields the same ledger.
//
// Crafting follows three species-preserving recipes: 1 log → 4 planks,
// 6 planks → 4 stairs, 3 planks → 6 slabs. `craft` pulls planks from logs on
// demand when a stair or slab batch is short.
//
// See also: `construction.rs` which recomputes the ledger on every
// readiness check, `blueprint.rs` for the required-materials multiset.

use crate::items::{Container, ItemKind, ItemStack};
use crate::types::{Block, WoodSpecies};
use serde::Serialize;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Families
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Family {
    StoneLike,
    Planks,
    Logs,
    Stairs,
    Slabs,
}

pub fn family_of(kind: ItemKind) -> Option<Family> {
    let ItemKind::Block(block) = kind else {
        return None;
    };
    match block {
        Block::Cobblestone
        | Block::CobbledDeepslate
        | Block::Stone
        | Block::Andesite
        | Block::Diorite
        | Block::Granite
        | Block::Deepslate => Some(Family::StoneLike),
        Block::Planks(_) => Some(Family::Planks),
        Block::Log(_) => Some(Family::Logs),
        Block::Stairs(_) => Some(Family::Stairs),
        Block::Slab(_) => Some(Family::Slabs),
        _ => None,
    }
}

/// `candidate` can stand in for `required`.
pub fn satisfies(required: ItemKind, candidate: ItemKind) -> bool {
    required == candidate || family_of(required).is_some_and(|f| family_of(candidate) == Some(f))
}

/// 0 for raw materials, higher for each crafting step away from raw.
pub fn refinement(kind: ItemKind) -> u8 {
    match family_of(kind) {
        Some(Family::Planks) => 1,
        Some(Family::Stairs | Family::Slabs) => 2,
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Outstanding quantity per required kind, plus the owned items left over
/// after allocation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MaterialLedger {
    outstanding: BTreeMap<ItemKind, u32>,
    spare: BTreeMap<ItemKind, u32>,
}

impl MaterialLedger {
    pub fn compute(required: &BTreeMap<ItemKind, u32>, owned: &BTreeMap<ItemKind, u32>) -> Self {
        let mut working = owned.clone();
        let mut outstanding = BTreeMap::new();

        // Pass 1: exact matches.
        for (&kind, &need) in required {
            let have = working.get_mut(&kind).map_or(0, |n| {
                let take = (*n).min(need);
                *n -= take;
                take
            });
            if need > have {
                outstanding.insert(kind, need - have);
            }
        }

        // Pass 2: family substitutes for what is still short.
        for (&kind, need) in outstanding.iter_mut() {
            for (&candidate, count) in working.iter_mut() {
                if *need == 0 {
                    break;
                }
                if candidate != kind && satisfies(kind, candidate) {
                    let take = (*count).min(*need);
                    *count -= take;
                    *need -= take;
                }
            }
        }
        outstanding.retain(|_, n| *n > 0);
        working.retain(|_, n| *n > 0);
        Self {
            outstanding,
            spare: working,
        }
    }

    pub fn for_inventory(required: &BTreeMap<ItemKind, u32>, inventory: &Container) -> Self {
        Self::compute(required, &inventory.counts())
    }

    pub fn is_empty(&self) -> bool {
        self.outstanding.is_empty()
    }

    pub fn total(&self) -> u32 {
        self.outstanding.values().sum()
    }

    pub fn outstanding(&self, kind: ItemKind) -> u32 {
        self.outstanding.get(&kind).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemKind, u32)> + '_ {
        self.outstanding.iter().map(|(&k, &n)| (k, n))
    }

    /// Outstanding entries, raw materials first.
    pub fn by_priority(&self) -> Vec<(ItemKind, u32)> {
        let mut v: Vec<_> = self.iter().collect();
        v.sort_by_key(|&(k, _)| (refinement(k), k));
        v
    }

    /// Owned items not allocated to any requirement.
    pub fn spare(&self, kind: ItemKind) -> u32 {
        self.spare.get(&kind).copied().unwrap_or(0)
    }

    fn spare_in(&self, family: Family) -> u32 {
        self.spare
            .iter()
            .filter(|(k, _)| family_of(**k) == Some(family))
            .map(|(_, n)| n)
            .sum()
    }

    /// Logs still to be felled to cover every wood-derived shortfall,
    /// counting spare planks and logs already owned.
    pub fn log_shortfall(&self) -> u32 {
        let mut plank_demand = 0u32;
        let mut log_demand = 0u32;
        for (kind, n) in self.iter() {
            match family_of(kind) {
                Some(Family::Planks) => plank_demand += n,
                Some(Family::Stairs) => plank_demand += n.div_ceil(STAIRS.output_count) * STAIRS.input_count,
                Some(Family::Slabs) => plank_demand += n.div_ceil(SLABS.output_count) * SLABS.input_count,
                Some(Family::Logs) => log_demand += n,
                _ => {}
            }
        }
        let planks_short = plank_demand.saturating_sub(self.spare_in(Family::Planks));
        log_demand += planks_short.div_ceil(PLANKS.output_count);
        log_demand.saturating_sub(self.spare_in(Family::Logs))
    }

    /// "12 cobblestone, 4 oak stairs"
    pub fn describe(&self) -> String {
        self.iter()
            .map(|(k, n)| format!("{n} {k}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ---------------------------------------------------------------------------
// Recipes
// ---------------------------------------------------------------------------

/// Ratio for one recipe family; the species is filled in at use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ratio {
    pub input_count: u32,
    pub output_count: u32,
}

pub const PLANKS: Ratio = Ratio { input_count: 1, output_count: 4 };
pub const STAIRS: Ratio = Ratio { input_count: 6, output_count: 4 };
pub const SLABS: Ratio = Ratio { input_count: 3, output_count: 6 };

/// Input kind and ratio that produce `output`, if it is craftable.
pub fn recipe_for(output: ItemKind) -> Option<(ItemKind, Ratio)> {
    match output {
        ItemKind::Block(Block::Planks(s)) => Some((ItemKind::Block(Block::Log(s)), PLANKS)),
        ItemKind::Block(Block::Stairs(s)) => Some((ItemKind::Block(Block::Planks(s)), STAIRS)),
        ItemKind::Block(Block::Slab(s)) => Some((ItemKind::Block(Block::Planks(s)), SLABS)),
        _ => None,
    }
}

/// Craft at least `count` of `target` inside `container` (whole batches),
/// crafting intermediate planks from logs when short. Returns the number
/// produced, which may be less than asked or zero.
pub fn craft(container: &mut Container, target: ItemKind, count: u32) -> u32 {
    let Some((input, ratio)) = recipe_for(target) else {
        return 0;
    };
    let mut produced = 0;
    while produced < count {
        let have = container.count(input);
        if have < ratio.input_count {
            craft(container, input, ratio.input_count - have);
        }
        if container.count(input) < ratio.input_count {
            break;
        }
        // Removing the input frees no slot if the stack stays non-empty, so
        // check room for the output first.
        if container.capacity_for(target) < ratio.output_count {
            break;
        }
        container.remove_item(input, ratio.input_count);
        container.add_item(ItemStack::new(target, ratio.output_count));
        produced += ratio.output_count;
    }
    if produced > 0 {
        tracing::debug!(%target, produced, "crafted");
    }
    produced
}

/// Craft toward `target`, trying its own species first and then any other
/// species the family accepts.
pub fn craft_any_species(container: &mut Container, target: ItemKind, count: u32) -> u32 {
    let mut produced = craft(container, target, count);
    if produced >= count {
        return produced;
    }
    let with_species = |s: WoodSpecies| match target {
        ItemKind::Block(Block::Planks(_)) => Some(ItemKind::Block(Block::Planks(s))),
        ItemKind::Block(Block::Stairs(_)) => Some(ItemKind::Block(Block::Stairs(s))),
        ItemKind::Block(Block::Slab(_)) => Some(ItemKind::Block(Block::Slab(s))),
        _ => None,
    };
    for species in WoodSpecies::ALL {
        let Some(alt) = with_species(species) else { break };
        if alt == target {
            continue;
        }
        produced += craft(container, alt, count - produced);
        if produced >= count {
            break;
        }
    }
    produced
}

/// `craft_any_species` restricted to the wood the ledger left spare, so logs
/// and planks already allocated to other requirements are never consumed.
/// Returns the number produced and any output that did not fit back into
/// `inventory`.
pub fn craft_from_spare(
    inventory: &mut Container,
    ledger: &MaterialLedger,
    target: ItemKind,
    count: u32,
) -> (u32, Vec<ItemStack>) {
    let mut scratch = Container::new(inventory.slot_count());
    for (&kind, &n) in &ledger.spare {
        if matches!(family_of(kind), Some(Family::Logs | Family::Planks)) {
            scratch.add_item(ItemStack::new(kind, n));
        }
    }
    let before = scratch.counts();
    let produced = craft_any_species(&mut scratch, target, count);
    if produced == 0 {
        return (0, Vec::new());
    }
    let after = scratch.counts();

    for (&kind, &had) in &before {
        let used = had.saturating_sub(after.get(&kind).copied().unwrap_or(0));
        if used > 0 {
            inventory.remove_item(kind, used);
        }
    }
    let mut overflow = Vec::new();
    for (&kind, &now) in &after {
        let gained = now.saturating_sub(before.get(&kind).copied().unwrap_or(0));
        if gained > 0
            && let Some(left) = inventory.add_item(ItemStack::new(kind, gained))
        {
            overflow.push(left);
        }
    }
    (produced, overflow)
}

/// Remove one item that can be placed for `required`, exact match first.
/// Returns the kind actually spent.
pub fn take_for_placement(inventory: &mut Container, required: ItemKind) -> Option<ItemKind> {
    if inventory.remove_item(required, 1) == 1 {
        return Some(required);
    }
    let substitute = inventory
        .counts()
        .into_keys()
        .find(|&k| k != required && satisfies(required, k))?;
    (inventory.remove_item(substitute, 1) == 1).then_some(substitute)
}

/// The block to place when `spent` was used for a planned `block`.
pub fn substituted_block(planned: Block, spent: ItemKind) -> Block {
    if planned.placement_item() == Some(spent) {
        return planned;
    }
    spent.placed_block().unwrap_or(planned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use companion_prng::{GameRng, RandomSource};

    fn b(block: Block) -> ItemKind {
        ItemKind::Block(block)
    }

    fn req(pairs: &[(ItemKind, u32)]) -> BTreeMap<ItemKind, u32> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn substitutes_fill_shortfall() {
        let required = req(&[(b(Block::Cobblestone), 10)]);
        let owned = req(&[(b(Block::Cobblestone), 4), (b(Block::Andesite), 3), (b(Block::Dirt), 20)]);
        let ledger = MaterialLedger::compute(&required, &owned);
        assert_eq!(ledger.outstanding(b(Block::Cobblestone)), 3);
        assert_eq!(ledger.spare(b(Block::Dirt)), 20);
    }

    #[test]
    fn exact_matches_win_before_substitution() {
        // Oak planks are needed exactly by one requirement; spruce planks
        // must cover the other. Allocating oak as a substitute first would
        // double count.
        let oak = b(Block::Planks(WoodSpecies::Oak));
        let spruce = b(Block::Planks(WoodSpecies::Spruce));
        let birch = b(Block::Planks(WoodSpecies::Birch));
        let required = req(&[(birch, 5), (oak, 5)]);
        let owned = req(&[(oak, 5), (spruce, 5)]);
        let ledger = MaterialLedger::compute(&required, &owned);
        assert!(ledger.is_empty(), "{}", ledger.describe());

        let owned_short = req(&[(oak, 7)]);
        let ledger = MaterialLedger::compute(&required, &owned_short);
        assert_eq!(ledger.total(), 3);
        assert_eq!(ledger.outstanding(birch), 3);
    }

    #[test]
    fn never_allocates_more_than_owned() {
        let mut rng = GameRng::new(17);
        let kinds = [
            b(Block::Cobblestone),
            b(Block::Stone),
            b(Block::Andesite),
            b(Block::Planks(WoodSpecies::Oak)),
            b(Block::Planks(WoodSpecies::Birch)),
            b(Block::Stairs(WoodSpecies::Oak)),
            b(Block::Glass),
        ];
        for _ in 0..500 {
            let mut required = BTreeMap::new();
            let mut owned = BTreeMap::new();
            for &k in &kinds {
                if rng.chance(0.6) {
                    required.insert(k, rng.range_u64(1, 30) as u32);
                }
                if rng.chance(0.6) {
                    owned.insert(k, rng.range_u64(0, 30) as u32);
                }
            }
            let ledger = MaterialLedger::compute(&required, &owned);
            let need: u32 = required.values().sum();
            let have: u32 = owned.values().sum();
            let spare: u32 = ledger.spare.values().sum();
            let allocated = have - spare;
            assert_eq!(need - ledger.total(), allocated);
            assert!(allocated <= have);
            // Idempotent.
            assert_eq!(ledger, MaterialLedger::compute(&required, &owned));
        }
    }

    #[test]
    fn log_shortfall_counts_recipe_ratios() {
        let required = req(&[
            (b(Block::Planks(WoodSpecies::Oak)), 8),
            (b(Block::Stairs(WoodSpecies::Oak)), 4),
        ]);
        // 8 planks + 6 planks for one stair batch = 14 planks = 4 logs.
        let ledger = MaterialLedger::compute(&required, &BTreeMap::new());
        assert_eq!(ledger.log_shortfall(), 4);
        let owned = req(&[(b(Block::Log(WoodSpecies::Spruce)), 1)]);
        assert_eq!(MaterialLedger::compute(&required, &owned).log_shortfall(), 3);
    }

    #[test]
    fn crafting_chains_logs_into_stairs() {
        let mut inv = Container::new(36);
        inv.add_item(ItemStack::block(Block::Log(WoodSpecies::Oak), 2));
        let made = craft(&mut inv, b(Block::Stairs(WoodSpecies::Oak)), 4);
        assert_eq!(made, 4);
        assert_eq!(inv.count(b(Block::Stairs(WoodSpecies::Oak))), 4);
        // 2 logs → 8 planks, 6 spent.
        assert_eq!(inv.count(b(Block::Planks(WoodSpecies::Oak))), 2);
        assert_eq!(inv.count(b(Block::Log(WoodSpecies::Oak))), 0);
    }

    #[test]
    fn slabs_ratio_and_shortage() {
        let mut inv = Container::new(36);
        inv.add_item(ItemStack::block(Block::Planks(WoodSpecies::Birch), 5));
        assert_eq!(craft(&mut inv, b(Block::Slab(WoodSpecies::Birch)), 12), 6);
        assert_eq!(inv.count(b(Block::Planks(WoodSpecies::Birch))), 2);
        assert_eq!(craft(&mut inv, b(Block::Cobblestone), 1), 0);
    }

    #[test]
    fn craft_falls_back_to_other_species() {
        let mut inv = Container::new(36);
        inv.add_item(ItemStack::block(Block::Log(WoodSpecies::Acacia), 1));
        let made = craft_any_species(&mut inv, b(Block::Planks(WoodSpecies::Oak)), 4);
        assert_eq!(made, 4);
        assert_eq!(inv.count(b(Block::Planks(WoodSpecies::Acacia))), 4);
    }

    #[test]
    fn spare_crafting_leaves_allocated_logs_alone() {
        let oak_log = b(Block::Log(WoodSpecies::Oak));
        let oak_planks = b(Block::Planks(WoodSpecies::Oak));
        let required = req(&[(oak_log, 2), (oak_planks, 2)]);
        let mut inv = Container::new(36);
        inv.add_item(ItemStack::new(oak_log, 2));

        let ledger = MaterialLedger::for_inventory(&required, &inv);
        assert_eq!(ledger.spare(oak_log), 0);
        let (made, overflow) = craft_from_spare(&mut inv, &ledger, oak_planks, 2);
        assert_eq!(made, 0);
        assert!(overflow.is_empty());
        assert_eq!(inv.count(oak_log), 2);

        // A third log is spare and gets crafted; the two allocated ones stay.
        inv.add_item(ItemStack::new(oak_log, 1));
        let ledger = MaterialLedger::for_inventory(&required, &inv);
        let (made, _) = craft_from_spare(&mut inv, &ledger, oak_planks, 2);
        assert_eq!(made, 4);
        assert_eq!(inv.count(oak_log), 2);
        assert_eq!(inv.count(oak_planks), 4);
        assert!(MaterialLedger::for_inventory(&required, &inv).is_empty());
    }

    #[test]
    fn placement_takes_exact_then_substitute() {
        let mut inv = Container::new(36);
        inv.add_item(ItemStack::block(Block::Granite, 1));
        inv.add_item(ItemStack::block(Block::Cobblestone, 1));
        assert_eq!(take_for_placement(&mut inv, b(Block::Cobblestone)), Some(b(Block::Cobblestone)));
        assert_eq!(take_for_placement(&mut inv, b(Block::Cobblestone)), Some(b(Block::Granite)));
        assert_eq!(take_for_placement(&mut inv, b(Block::Cobblestone)), None);
        assert_eq!(substituted_block(Block::Cobblestone, b(Block::Granite)), Block::Granite);
        assert_eq!(
            substituted_block(Block::Stairs(WoodSpecies::Oak), b(Block::Stairs(WoodSpecies::Oak))),
            Block::Stairs(WoodSpecies::Oak)
        );
    }
}
