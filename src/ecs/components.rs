use std::collections::BTreeMap;
use std::fmt;

use bracket_geometry::prelude::Point;
use serde::Serialize;
use specs::prelude::{Component, NullStorage, VecStorage};
use tokio::sync::{mpsc, oneshot, watch};

use crate::data::items::{ItemClass, ItemTemplate};
use crate::data::monsters::{MonsterClass, MonsterTemplate};
use crate::map::Direction;
use crate::protocol::{Batch, ServerMessage};

/// Session-scoped identifier shared by players, monsters and piles. Never
/// reused within a session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Component for EntityId {
    type Storage = VecStorage<Self>;
}

#[derive(Clone, Debug)]
pub struct Position {
    pub point: Point,
}

impl Component for Position {
    type Storage = VecStorage<Self>;
}

#[derive(Clone, Debug)]
pub struct Renderable {
    pub glyph: char,
}

impl Component for Renderable {
    type Storage = VecStorage<Self>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CombatStats {
    pub health: i32,
    pub health_total: i32,
    pub attack: i32,
    pub defense: i32,
    pub line_of_sight: i32,
    pub speed: i32,
}

impl Component for CombatStats {
    type Storage = VecStorage<Self>;
}

impl CombatStats {
    pub fn player() -> Self {
        Self {
            health: 100,
            health_total: 100,
            attack: 5,
            defense: 0,
            line_of_sight: 5,
            speed: 0,
        }
    }

    pub fn for_monster(template: &MonsterTemplate, level: u32) -> Self {
        let health = template.health.at(level);
        Self {
            health,
            health_total: health,
            attack: template.attack.at(level),
            defense: template.defense.at(level),
            line_of_sight: 0,
            speed: template.speed,
        }
    }

    /// Adds an equipped item's deltas. Raising the health cap raises current
    /// health by the same amount.
    pub fn apply(&mut self, item: &ItemTemplate) {
        self.attack += item.attack;
        self.defense += item.defense;
        self.line_of_sight += item.line_of_sight;
        self.speed += item.speed;
        self.health_total += item.health_total;
        self.health = (self.health + item.health_total).min(self.health_total);
    }

    /// Exact inverse of [`CombatStats::apply`].
    pub fn unapply(&mut self, item: &ItemTemplate) {
        self.attack -= item.attack;
        self.defense -= item.defense;
        self.line_of_sight -= item.line_of_sight;
        self.speed -= item.speed;
        self.health_total -= item.health_total;
        self.health = (self.health - item.health_total).clamp(1, self.health_total.max(1));
    }

    pub fn would_benefit_from(&self, item: &ItemTemplate) -> bool {
        !item.heals_only() || (item.health > 0 && self.health < self.health_total)
    }

    /// Permanently applies a consumable. Returns false, leaving the stats
    /// untouched, when the item would have no effect.
    pub fn consume(&mut self, item: &ItemTemplate) -> bool {
        if !self.would_benefit_from(item) {
            return false;
        }
        self.apply(item);
        self.health = (self.health + item.health).min(self.health_total);
        true
    }
}

#[derive(Clone, Debug, Default)]
pub struct Inventory {
    pub items: BTreeMap<&'static str, u32>,
}

impl Component for Inventory {
    type Storage = VecStorage<Self>;
}

impl Inventory {
    pub fn count(&self, name: &str) -> u32 {
        self.items.get(name).copied().unwrap_or(0)
    }

    pub fn add(&mut self, name: &'static str, amount: u32) -> u32 {
        let count = self.items.entry(name).or_insert(0);
        *count += amount;
        *count
    }

    /// Removes one unit and returns the remaining count, or `None` if the
    /// item was not held.
    pub fn remove_one(&mut self, name: &str) -> Option<u32> {
        let count = self.items.get_mut(name)?;
        *count -= 1;
        let remaining = *count;
        if remaining == 0 {
            self.items.remove(name);
        }
        Some(remaining)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Equipment {
    pub weapon: Option<&'static ItemTemplate>,
    pub armor: Option<&'static ItemTemplate>,
}

impl Component for Equipment {
    type Storage = VecStorage<Self>;
}

impl Equipment {
    pub fn slot_mut(&mut self, class: ItemClass) -> Option<&mut Option<&'static ItemTemplate>> {
        match class {
            ItemClass::Weapon => Some(&mut self.weapon),
            ItemClass::Armor => Some(&mut self.armor),
            ItemClass::Consumable => None,
        }
    }
}

/// Messages queued for one player during the current event, plus the
/// transport-facing channel they are flushed into.
#[derive(Debug)]
pub struct Outbox {
    pub queue: Batch,
    pub tx: mpsc::Sender<Batch>,
}

impl Component for Outbox {
    type Storage = VecStorage<Self>;
}

impl Outbox {
    pub fn new(tx: mpsc::Sender<Batch>) -> Self {
        Self {
            queue: Vec::new(),
            tx,
        }
    }

    pub fn push(&mut self, message: ServerMessage) {
        self.queue.push(message);
    }
}

/// Publishes the player's speed to its action throttle.
#[derive(Debug)]
pub struct SpeedLink {
    pub tx: watch::Sender<i32>,
}

impl Component for SpeedLink {
    type Storage = VecStorage<Self>;
}

#[derive(Debug)]
pub struct MonsterBrain {
    pub class: MonsterClass,
    pub facing: Option<Direction>,
    pub stop: Option<oneshot::Sender<()>>,
}

impl Component for MonsterBrain {
    type Storage = VecStorage<Self>;
}

impl MonsterBrain {
    /// Halts the monster's timer. Safe to call more than once.
    pub fn halt(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

#[derive(Default)]
pub struct PlayerTag;

impl Component for PlayerTag {
    type Storage = NullStorage<Self>;
}

#[derive(Default)]
pub struct MonsterTag;

impl Component for MonsterTag {
    type Storage = NullStorage<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::items::lookup;

    fn item(name: &str) -> &'static ItemTemplate {
        lookup(name).expect("catalog item")
    }

    #[test]
    fn apply_then_unapply_restores_every_stat() {
        for template in crate::data::items::ITEMS {
            let mut stats = CombatStats::player();
            stats.health = 40;
            let before = stats.clone();
            stats.apply(template);
            stats.unapply(template);
            assert_eq!(stats, before, "drift after {}", template.name);
        }
    }

    #[test]
    fn apply_raises_cap_and_health_together() {
        let mut stats = CombatStats::player();
        stats.health = 90;
        let elixir = ItemTemplate {
            health_total: 5,
            ..item("Sword").clone()
        };
        stats.apply(&elixir);
        assert_eq!(stats.health_total, 105);
        assert_eq!(stats.health, 95);
        assert_eq!(stats.attack, 8);
    }

    #[test]
    fn potion_is_refused_at_full_health() {
        let mut stats = CombatStats::player();
        assert!(!stats.consume(item("Potion")));
        assert_eq!(stats, CombatStats::player());
    }

    #[test]
    fn potion_heals_up_to_the_cap() {
        let mut stats = CombatStats::player();
        stats.health = 90;
        assert!(stats.consume(item("Potion")));
        assert_eq!(stats.health, 100);
    }

    #[test]
    fn elixir_always_has_an_effect() {
        let mut stats = CombatStats::player();
        assert!(stats.consume(item("Life Elixir")));
        assert_eq!(stats.health_total, 105);
        assert_eq!(stats.health, 105);
    }

    #[test]
    fn inventory_counts_never_reach_zero() {
        let mut inventory = Inventory::default();
        assert_eq!(inventory.add("Potion", 2), 2);
        assert_eq!(inventory.remove_one("Potion"), Some(1));
        assert_eq!(inventory.remove_one("Potion"), Some(0));
        assert!(inventory.items.is_empty());
        assert_eq!(inventory.remove_one("Potion"), None);
    }

    #[test]
    fn equipment_slots_follow_item_class() {
        let mut equipment = Equipment::default();
        assert!(equipment.slot_mut(ItemClass::Consumable).is_none());
        if let Some(slot) = equipment.slot_mut(ItemClass::Armor) {
            *slot = Some(item("Cloak"));
        }
        assert_eq!(equipment.armor.map(|armor| armor.name), Some("Cloak"));
        assert!(equipment.weapon.is_none());
    }
}
