// Item kinds, stacks, tools, and the slot container.
//
// `ItemKind` is the inventory-side vocabulary: placeable blocks travel as
// `ItemKind::Block(Block)`, everything else (ore drops, food, tools, weapons,
// armor) has its own variant. Stack limits are a property of the kind.
//
// `Container` is the slot array used for both the agent inventory and world
// chests. `add_item` tops up partial stacks of the same kind before touching
// empty slots and hands back whatever did not fit, so callers decide where
// overflow goes (usually spilled into the world as a drop).
//
// See also: `inventory.rs` for `AgentBody` and equipment handling built on
// `Container`, `materials.rs` for equivalence families over `ItemKind`,
// `types.rs` for `Block::drops()`.

use crate::types::Block;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Tools, weapons, armor
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ToolCategory {
    Pickaxe,
    Axe,
    Shovel,
    Hoe,
}

/// Material tier shared by tools, weapons and armor. Ordering follows
/// quality: a later variant is strictly better.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Wood,
    Stone,
    Iron,
    Diamond,
    Netherite,
}

impl Tier {
    /// Break-speed multiplier when a tool of this tier matches the block.
    /// Strictly increasing with tier.
    pub fn speed_multiplier(self) -> f32 {
        match self {
            Tier::Wood => 2.0,
            Tier::Stone => 4.0,
            Tier::Iron => 6.0,
            Tier::Diamond => 8.0,
            Tier::Netherite => 9.0,
        }
    }

    /// Melee damage of a sword of this tier.
    pub fn sword_damage(self) -> f32 {
        match self {
            Tier::Wood => 4.0,
            Tier::Stone => 5.0,
            Tier::Iron => 6.0,
            Tier::Diamond => 7.0,
            Tier::Netherite => 8.0,
        }
    }

    /// Armor points contributed by one piece of this tier.
    pub fn armor_points(self, slot: ArmorSlot) -> u32 {
        let base = match self {
            Tier::Wood => 1,
            Tier::Stone => 2,
            Tier::Iron => 3,
            Tier::Diamond => 4,
            Tier::Netherite => 5,
        };
        match slot {
            ArmorSlot::Chest => base * 2,
            ArmorSlot::Legs => base + base / 2,
            ArmorSlot::Head | ArmorSlot::Feet => base,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArmorSlot {
    Head,
    Chest,
    Legs,
    Feet,
}

impl ArmorSlot {
    pub const ALL: [ArmorSlot; 4] = [ArmorSlot::Head, ArmorSlot::Chest, ArmorSlot::Legs, ArmorSlot::Feet];

    pub fn index(self) -> usize {
        match self {
            ArmorSlot::Head => 0,
            ArmorSlot::Chest => 1,
            ArmorSlot::Legs => 2,
            ArmorSlot::Feet => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FoodKind {
    RawBeef,
    RawPorkchop,
    RawChicken,
    RawMutton,
    RawRabbit,
    Bread,
    Apple,
    Carrot,
    Potato,
}

impl FoodKind {
    /// Hunger points restored when eaten.
    pub fn nutrition(self) -> u32 {
        match self {
            FoodKind::RawBeef | FoodKind::RawPorkchop => 3,
            FoodKind::RawChicken | FoodKind::RawMutton | FoodKind::RawRabbit => 2,
            FoodKind::Bread => 5,
            FoodKind::Apple | FoodKind::Carrot => 4,
            FoodKind::Potato => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// ItemKind / ItemStack
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKind {
    /// A placeable block.
    Block(Block),
    Coal,
    RawIron,
    RawCopper,
    RawGold,
    Redstone,
    Lapis,
    Diamond,
    Emerald,
    Stick,
    Seeds,
    Wheat,
    Egg,
    Food(FoodKind),
    Tool(ToolCategory, Tier),
    Sword(Tier),
    Armor(ArmorSlot, Tier),
}

impl ItemKind {
    /// Maximum count per slot.
    pub fn max_stack(self) -> u32 {
        match self {
            ItemKind::Tool(..) | ItemKind::Sword(_) | ItemKind::Armor(..) => 1,
            ItemKind::Egg => 16,
            _ => 64,
        }
    }

    pub fn is_food(self) -> bool {
        matches!(self, ItemKind::Food(_))
    }

    pub fn is_weapon(self) -> bool {
        matches!(self, ItemKind::Sword(_))
    }

    pub fn is_armor(self) -> bool {
        matches!(self, ItemKind::Armor(..))
    }

    /// Items the agent keeps when depositing into storage.
    pub fn is_kept_on_deposit(self) -> bool {
        self.is_food() || self.is_weapon() || self.is_armor()
    }

    pub fn nutrition(self) -> u32 {
        match self {
            ItemKind::Food(f) => f.nutrition(),
            _ => 0,
        }
    }

    /// Melee damage when held; bare hand (or any non-weapon) deals 1.
    pub fn melee_damage(self) -> f32 {
        match self {
            ItemKind::Sword(tier) => tier.sword_damage(),
            ItemKind::Tool(ToolCategory::Axe, tier) => tier.sword_damage() - 1.0,
            _ => 1.0,
        }
    }

    /// The block this item places, if any.
    pub fn placed_block(self) -> Option<Block> {
        match self {
            ItemKind::Block(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Block(b) => f.write_str(&b.name()),
            ItemKind::RawIron => f.write_str("raw iron"),
            ItemKind::RawCopper => f.write_str("raw copper"),
            ItemKind::RawGold => f.write_str("raw gold"),
            ItemKind::Food(food) => write!(f, "{}", format!("{food:?}").to_lowercase()),
            ItemKind::Tool(cat, tier) => write!(f, "{} {}", format!("{tier:?}").to_lowercase(), format!("{cat:?}").to_lowercase()),
            ItemKind::Sword(tier) => write!(f, "{} sword", format!("{tier:?}").to_lowercase()),
            ItemKind::Armor(slot, tier) => write!(f, "{} {}", format!("{tier:?}").to_lowercase(), format!("{slot:?}").to_lowercase()),
            other => write!(f, "{}", format!("{other:?}").to_lowercase()),
        }
    }
}

/// A count of one item kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub kind: ItemKind,
    pub count: u32,
}

impl ItemStack {
    pub fn new(kind: ItemKind, count: u32) -> Self {
        Self { kind, count }
    }

    pub fn block(block: Block, count: u32) -> Self {
        Self::new(ItemKind::Block(block), count)
    }
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// A fixed number of item slots. Each slot is empty or holds one stack no
/// larger than its kind's `max_stack`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    slots: Vec<Option<ItemStack>>,
}

impl Container {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![None; slot_count],
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<&ItemStack> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    /// Put a stack into a specific slot, returning whatever was there.
    /// Out-of-range indices return the stack unchanged.
    pub fn set_slot(&mut self, index: usize, stack: Option<ItemStack>) -> Option<ItemStack> {
        match self.slots.get_mut(index) {
            Some(slot) => std::mem::replace(slot, stack),
            None => stack,
        }
    }

    pub fn take_slot(&mut self, index: usize) -> Option<ItemStack> {
        self.slots.get_mut(index).and_then(|s| s.take())
    }

    /// Iterate `(slot index, stack)` over occupied slots.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ItemStack)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|stack| (i, stack)))
    }

    pub fn occupied_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied_slots() == 0
    }

    /// More than half of the slots are occupied.
    pub fn is_over_half_full(&self) -> bool {
        self.occupied_slots() * 2 > self.slots.len()
    }

    /// Insert as much of `stack` as fits. Partial stacks of the same kind
    /// are topped up first (lowest slot first), then empty slots are used.
    /// Returns the part that did not fit.
    pub fn add_item(&mut self, stack: ItemStack) -> Option<ItemStack> {
        let max = stack.kind.max_stack();
        let mut remaining = stack.count;

        for slot in self.slots.iter_mut().flatten() {
            if remaining == 0 {
                break;
            }
            if slot.kind == stack.kind && slot.count < max {
                let moved = remaining.min(max - slot.count);
                slot.count += moved;
                remaining -= moved;
            }
        }

        for slot in self.slots.iter_mut() {
            if remaining == 0 {
                break;
            }
            if slot.is_none() {
                let moved = remaining.min(max);
                *slot = Some(ItemStack::new(stack.kind, moved));
                remaining -= moved;
            }
        }

        (remaining > 0).then(|| ItemStack::new(stack.kind, remaining))
    }

    /// How many of `stack` would fit without spilling.
    pub fn capacity_for(&self, kind: ItemKind) -> u32 {
        let max = kind.max_stack();
        self.slots
            .iter()
            .map(|slot| match slot {
                None => max,
                Some(s) if s.kind == kind => max.saturating_sub(s.count),
                Some(_) => 0,
            })
            .sum()
    }

    /// Remove up to `count` of `kind`, taking from the highest slot first so
    /// early slots keep their stacks. Returns the number removed.
    pub fn remove_item(&mut self, kind: ItemKind, count: u32) -> u32 {
        let mut removed = 0;
        for slot in self.slots.iter_mut().rev() {
            if removed == count {
                break;
            }
            if let Some(stack) = slot
                && stack.kind == kind
            {
                let take = (count - removed).min(stack.count);
                stack.count -= take;
                removed += take;
                if stack.count == 0 {
                    *slot = None;
                }
            }
        }
        removed
    }

    /// Remove up to `max` items whose kind satisfies `filter`, returning the
    /// removed stacks grouped by kind.
    pub fn remove_matching(&mut self, filter: &dyn Fn(&ItemKind) -> bool, max: u32) -> Vec<ItemStack> {
        let mut taken: BTreeMap<ItemKind, u32> = BTreeMap::new();
        let mut budget = max;
        for slot in self.slots.iter_mut() {
            if budget == 0 {
                break;
            }
            if let Some(stack) = slot
                && filter(&stack.kind)
            {
                let take = budget.min(stack.count);
                stack.count -= take;
                budget -= take;
                *taken.entry(stack.kind).or_default() += take;
                if stack.count == 0 {
                    *slot = None;
                }
            }
        }
        taken
            .into_iter()
            .map(|(kind, count)| ItemStack::new(kind, count))
            .collect()
    }

    pub fn count(&self, kind: ItemKind) -> u32 {
        self.iter()
            .filter(|(_, s)| s.kind == kind)
            .map(|(_, s)| s.count)
            .sum()
    }

    pub fn count_matching(&self, filter: &dyn Fn(&ItemKind) -> bool) -> u32 {
        self.iter()
            .filter(|(_, s)| filter(&s.kind))
            .map(|(_, s)| s.count)
            .sum()
    }

    /// Totals per kind, in kind order.
    pub fn counts(&self) -> BTreeMap<ItemKind, u32> {
        let mut out = BTreeMap::new();
        for (_, stack) in self.iter() {
            *out.entry(stack.kind).or_default() += stack.count;
        }
        out
    }

    /// Move every stack whose kind passes `filter` into `dest`, keeping
    /// whatever `dest` cannot hold. Returns the number of items moved.
    pub fn transfer_into(&mut self, dest: &mut Container, filter: &dyn Fn(&ItemKind) -> bool) -> u32 {
        let mut moved = 0;
        for slot in self.slots.iter_mut() {
            let Some(stack) = *slot else { continue };
            if !filter(&stack.kind) {
                continue;
            }
            match dest.add_item(stack) {
                None => {
                    moved += stack.count;
                    *slot = None;
                }
                Some(left) => {
                    moved += stack.count - left.count;
                    *slot = Some(left);
                }
            }
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cobble(n: u32) -> ItemStack {
        ItemStack::block(Block::Cobblestone, n)
    }

    #[test]
    fn add_merges_partial_before_empty() {
        let mut c = Container::new(4);
        c.set_slot(2, Some(cobble(30)));
        assert_eq!(c.add_item(cobble(40)), None);
        assert_eq!(c.slot(2), Some(&cobble(64)));
        assert_eq!(c.slot(0), Some(&cobble(6)));
        assert_eq!(c.count(ItemKind::Block(Block::Cobblestone)), 70);
    }

    #[test]
    fn add_returns_leftover_when_full() {
        let mut c = Container::new(1);
        assert_eq!(c.add_item(cobble(100)), Some(cobble(36)));
        assert_eq!(c.capacity_for(ItemKind::Block(Block::Cobblestone)), 0);
    }

    #[test]
    fn tools_do_not_stack() {
        let mut c = Container::new(3);
        let pick = ItemStack::new(ItemKind::Tool(ToolCategory::Pickaxe, Tier::Iron), 2);
        assert_eq!(c.add_item(pick), None);
        assert_eq!(c.occupied_slots(), 2);
    }

    #[test]
    fn remove_item_reports_removed_count() {
        let mut c = Container::new(4);
        c.add_item(cobble(70));
        assert_eq!(c.remove_item(ItemKind::Block(Block::Cobblestone), 10), 10);
        assert_eq!(c.count(ItemKind::Block(Block::Cobblestone)), 60);
        assert_eq!(c.remove_item(ItemKind::Block(Block::Cobblestone), 100), 60);
        assert!(c.is_empty());
        assert_eq!(c.remove_item(ItemKind::Coal, 1), 0);
    }

    #[test]
    fn remove_matching_groups_by_kind() {
        let mut c = Container::new(4);
        c.add_item(ItemStack::new(ItemKind::Food(FoodKind::Bread), 3));
        c.add_item(ItemStack::new(ItemKind::Food(FoodKind::Apple), 5));
        c.add_item(cobble(10));
        let taken = c.remove_matching(&|k| k.is_food(), 6);
        let total: u32 = taken.iter().map(|s| s.count).sum();
        assert_eq!(total, 6);
        assert_eq!(c.count_matching(&|k| k.is_food()), 2);
        assert_eq!(c.count(ItemKind::Block(Block::Cobblestone)), 10);
    }

    #[test]
    fn transfer_keeps_filtered_and_overflow() {
        let mut inv = Container::new(4);
        inv.add_item(cobble(40));
        inv.add_item(ItemStack::new(ItemKind::Food(FoodKind::Bread), 2));
        let mut chest = Container::new(1);
        chest.add_item(cobble(50));
        let moved = inv.transfer_into(&mut chest, &|k| !k.is_kept_on_deposit());
        assert_eq!(moved, 14);
        assert_eq!(inv.count(ItemKind::Block(Block::Cobblestone)), 26);
        assert_eq!(inv.count(ItemKind::Food(FoodKind::Bread)), 2);
    }

    #[test]
    fn tier_multiplier_strictly_increases() {
        let tiers = [Tier::Wood, Tier::Stone, Tier::Iron, Tier::Diamond, Tier::Netherite];
        for pair in tiers.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].speed_multiplier() < pair[1].speed_multiplier());
        }
    }

    #[test]
    fn half_full_threshold() {
        let mut c = Container::new(4);
        c.add_item(cobble(64));
        c.add_item(ItemStack::new(ItemKind::Coal, 1));
        assert!(!c.is_over_half_full());
        c.add_item(ItemStack::new(ItemKind::Diamond, 1));
        assert!(c.is_over_half_full());
    }
}
