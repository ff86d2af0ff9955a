// The agent's body: position, inventory, equipment, home anchor.
//
// `AgentBody` is owned by the host and lent to the machines through
// `TickContext`. Gear selection lives here because both the gathering engine
// (tool equip once per session) and the survival machine (Equipping state,
// self scan) need it.
//
// See also: `items.rs` for `Container` and tiers, `gather.rs` for tool use,
// `survival.rs` for `AgentSelfState` consumers.

use crate::host::{EntityKind, World};
use crate::items::{ArmorSlot, Container, ItemKind, ItemStack, Tier, ToolCategory};
use crate::types::VoxelCoord;
use serde::{Deserialize, Serialize};

pub const INVENTORY_SLOTS: usize = 36;

/// Main hand plus one slot per armor piece.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub main_hand: Option<ItemStack>,
    pub armor: [Option<ItemStack>; 4],
}

impl Equipment {
    pub fn armor_in(&self, slot: ArmorSlot) -> Option<Tier> {
        match self.armor[slot.index()] {
            Some(ItemStack {
                kind: ItemKind::Armor(_, tier),
                ..
            }) => Some(tier),
            _ => None,
        }
    }

    pub fn has_armor(&self) -> bool {
        self.armor.iter().any(|a| a.is_some())
    }
}

/// Rebuilt from inventory on every self scan; never stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AgentSelfState {
    pub food_count: u32,
    pub has_weapon: bool,
    pub has_armor: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentBody {
    pub position: VoxelCoord,
    pub inventory: Container,
    pub equipment: Equipment,
    /// Where the agent patrols and returns to.
    pub home: VoxelCoord,
    /// Block the agent is currently looking at, if any.
    pub facing: Option<VoxelCoord>,
}

impl AgentBody {
    pub fn new(position: VoxelCoord) -> Self {
        Self {
            position,
            inventory: Container::new(INVENTORY_SLOTS),
            equipment: Equipment::default(),
            home: position,
            facing: None,
        }
    }

    pub fn main_hand(&self) -> Option<ItemKind> {
        self.equipment.main_hand.map(|s| s.kind)
    }

    pub fn melee_damage(&self) -> f32 {
        self.main_hand().map_or(1.0, ItemKind::melee_damage)
    }

    pub fn self_state(&self) -> AgentSelfState {
        AgentSelfState {
            food_count: self.inventory.count_matching(&|k| k.is_food()),
            has_weapon: self.main_hand().is_some_and(ItemKind::is_weapon),
            has_armor: self.equipment.has_armor(),
        }
    }

    /// Swap the inventory stack at `slot` into the main hand. Whatever was
    /// held goes back into that slot.
    pub fn equip_main_hand_from(&mut self, slot: usize) -> bool {
        let Some(stack) = self.inventory.take_slot(slot) else {
            return false;
        };
        let previous = self.equipment.main_hand.replace(stack);
        self.inventory.set_slot(slot, previous);
        true
    }

    /// Inventory slot of the highest-tier tool of `category`.
    pub fn best_tool_slot(&self, category: ToolCategory) -> Option<(usize, Tier)> {
        self.inventory
            .iter()
            .filter_map(|(i, s)| match s.kind {
                ItemKind::Tool(c, tier) if c == category => Some((i, tier)),
                _ => None,
            })
            .max_by_key(|&(i, tier)| (tier, std::cmp::Reverse(i)))
    }

    /// Hold the best tool of `category` unless the hand already holds one at
    /// least as good. Returns the tier now held, or `None` if the agent owns
    /// no such tool (the hand is left alone in that case).
    pub fn equip_best_tool(&mut self, category: ToolCategory) -> Option<Tier> {
        let held = match self.main_hand() {
            Some(ItemKind::Tool(c, tier)) if c == category => Some(tier),
            _ => None,
        };
        match (self.best_tool_slot(category), held) {
            (Some((_, carried)), Some(held)) if held >= carried => Some(held),
            (Some((slot, carried)), _) => {
                self.equip_main_hand_from(slot);
                Some(carried)
            }
            (None, held) => held,
        }
    }

    fn best_weapon_slot(&self) -> Option<(usize, f32)> {
        self.inventory
            .iter()
            .filter(|(_, s)| s.kind.is_weapon())
            .map(|(i, s)| (i, s.kind.melee_damage()))
            .fold(None, |best, (i, dmg)| match best {
                Some((_, b)) if b >= dmg => best,
                _ => Some((i, dmg)),
            })
    }

    fn best_armor_slot(&self, slot: ArmorSlot) -> Option<(usize, Tier)> {
        self.inventory
            .iter()
            .filter_map(|(i, s)| match s.kind {
                ItemKind::Armor(a, tier) if a == slot => Some((i, tier)),
                _ => None,
            })
            .max_by_key(|&(i, tier)| (tier, std::cmp::Reverse(i)))
    }

    /// A carried weapon out-damages the held item, or a carried armor piece
    /// beats what is worn in its slot.
    pub fn has_better_gear(&self) -> bool {
        let weapon_better = self
            .best_weapon_slot()
            .is_some_and(|(_, dmg)| dmg > self.melee_damage());
        weapon_better
            || ArmorSlot::ALL.iter().any(|&slot| {
                self.best_armor_slot(slot)
                    .is_some_and(|(_, tier)| self.equipment.armor_in(slot).is_none_or(|worn| tier > worn))
            })
    }

    /// Equip every strictly better carried piece. Returns how many pieces
    /// changed.
    pub fn equip_best_gear(&mut self) -> u32 {
        let mut changed = 0;
        if let Some((slot, dmg)) = self.best_weapon_slot()
            && dmg > self.melee_damage()
        {
            self.equip_main_hand_from(slot);
            changed += 1;
        }
        for armor_slot in ArmorSlot::ALL {
            let Some((inv_slot, tier)) = self.best_armor_slot(armor_slot) else {
                continue;
            };
            if self.equipment.armor_in(armor_slot).is_some_and(|worn| worn >= tier) {
                continue;
            }
            let Some(piece) = self.inventory.take_slot(inv_slot) else {
                continue;
            };
            let previous = self.equipment.armor[armor_slot.index()].replace(piece);
            self.inventory.set_slot(inv_slot, previous);
            changed += 1;
        }
        changed
    }
}

/// Pull nearby dropped items (pickup delay elapsed, room in the inventory)
/// into the agent's inventory. Returns the number of items collected.
pub fn vacuum_drops(world: &mut dyn World, body: &mut AgentBody, radius: u32) -> u32 {
    let mut collected = 0;
    for entity in world.entities_near(body.position, radius) {
        if entity.kind != EntityKind::Item || entity.pickup_delay > 0 {
            continue;
        }
        let Some(stack) = entity.item else { continue };
        if body.inventory.capacity_for(stack.kind) < stack.count {
            continue;
        }
        if let Some(stack) = world.pick_up(entity.id) {
            collected += stack.count;
            if let Some(left) = body.inventory.add_item(stack) {
                world.spawn_drop(body.position, left);
                collected -= left.count;
            }
        }
    }
    collected
}
