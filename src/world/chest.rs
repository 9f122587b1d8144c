//! Chest contents and timed replenishment.
//!
//! A chest holds an ordered list of items; slot 0 marks a player deposit,
//! a non-zero slot ties the item to a spawn rule. Each rule-governed slot
//! holds at most one item at a time and refills once its interval has
//! elapsed since the slot was last emptied.

use crate::config::Limits;
use rand::Rng;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChestItem {
    pub id: u16,
    pub amount: u32,
    /// 0 = player-deposited, >0 = rule-governed slot index.
    pub slot: u8,
}

/// Timed replenishment directive binding a chest slot to an item stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChestSpawnRule {
    pub slot: u8,
    pub minutes: u16,
    pub item_id: u16,
    pub amount: u32,
    pub last_taken_ms: u64,
}

impl ChestSpawnRule {
    pub fn due_at_ms(&self) -> u64 {
        self.last_taken_ms + u64::from(self.minutes) * 60_000
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chest {
    pub x: u8,
    pub y: u8,
    pub items: Vec<ChestItem>,
    pub spawns: Vec<ChestSpawnRule>,
    /// Highest rule-reserved slot count; caps player deposits.
    pub slots: usize,
}

impl Chest {
    pub fn new(x: u8, y: u8) -> Self {
        Self {
            x,
            y,
            items: Vec::new(),
            spawns: Vec::new(),
            slots: 0,
        }
    }

    /// Amount of `id` present, 0 when absent.
    pub fn has_item(&self, id: u16) -> u32 {
        self.items
            .iter()
            .find(|item| item.id == id)
            .map(|item| item.amount)
            .unwrap_or(0)
    }

    /// Adds an item stack. Player deposits (`slot` 0) merge into an
    /// existing stack of the same id and are bounded by the slot capacity
    /// left over after rule-reserved slots; rule spawns go to the front.
    /// Returns the amount added, 0 on any capacity or amount rejection.
    pub fn add_item(&mut self, id: u16, amount: u32, slot: u8, limits: &Limits) -> u32 {
        if amount == 0 {
            return 0;
        }

        if slot == 0 {
            if let Some(item) = self.items.iter_mut().find(|item| item.id == id) {
                match item.amount.checked_add(amount) {
                    Some(total) if total <= limits.max_chest => {
                        item.amount = total;
                        return amount;
                    }
                    _ => return 0,
                }
            }
        }

        if self.items.len() >= limits.chest_slots || amount > limits.max_chest {
            return 0;
        }

        if slot == 0 {
            let deposited = self.items.iter().filter(|item| item.slot == 0).count();
            if deposited + self.slots >= limits.chest_slots {
                return 0;
            }
        }

        let item = ChestItem { id, amount, slot };
        if slot == 0 {
            self.items.push(item);
        } else {
            self.items.insert(0, item);
        }
        amount
    }

    /// Removes a whole stack; restarts the respawn clock when the stack
    /// belonged to a rule slot. Returns the amount removed.
    pub fn del_item(&mut self, id: u16, now_ms: u64) -> u32 {
        let Some(index) = self.items.iter().position(|item| item.id == id) else {
            return 0;
        };
        let item = self.items.remove(index);
        if item.slot != 0 {
            self.restamp_slot(item.slot, now_ms);
        }
        item.amount
    }

    /// Removes part of a stack. A partial take re-stamps the rule slot and
    /// unties the remainder from it (the rest is now player-owned).
    /// Returns the amount left in the chest after a partial take, or the
    /// removed amount on a full take.
    pub fn del_some_item(&mut self, id: u16, amount: u32, now_ms: u64) -> u32 {
        let Some(index) = self.items.iter().position(|item| item.id == id) else {
            return 0;
        };
        if amount == 0 {
            return 0;
        }
        if amount < self.items[index].amount {
            self.items[index].amount -= amount;
            let slot = self.items[index].slot;
            if slot != 0 {
                self.restamp_slot(slot, now_ms);
                self.items[index].slot = 0;
            }
            return self.items[index].amount;
        }
        self.del_item(id, now_ms)
    }

    pub(crate) fn restamp_slot(&mut self, slot: u8, now_ms: u64) {
        for spawn in &mut self.spawns {
            if spawn.slot == slot {
                spawn.last_taken_ms = now_ms;
            }
        }
    }

    /// Refills every empty rule slot whose interval has elapsed, choosing
    /// randomly among rules bound to the same slot. Returns whether any
    /// slot changed (callers broadcast the contents when it did).
    pub fn respawn_due(&mut self, now_ms: u64, limits: &Limits) -> bool {
        let mut ready: HashMap<u8, Vec<usize>> = HashMap::new();
        for (index, spawn) in self.spawns.iter().enumerate() {
            if spawn.due_at_ms() > now_ms {
                continue;
            }
            if self.items.iter().any(|item| item.slot == spawn.slot) {
                continue;
            }
            ready.entry(spawn.slot).or_default().push(index);
        }

        let mut changed = false;
        let mut rng = rand::thread_rng();
        for (_, candidates) in ready {
            let pick = candidates[rng.gen_range(0..candidates.len())];
            let spawn = self.spawns[pick];
            if self.add_item(spawn.item_id, spawn.amount, spawn.slot, limits) > 0 {
                changed = true;
            }
        }
        changed
    }
}
