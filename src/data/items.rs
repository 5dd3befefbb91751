use std::collections::BTreeMap;

use bracket_random::prelude::RandomNumberGenerator;
use serde::Serialize;

use super::weighted_pick;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemClass {
    Consumable,
    Weapon,
    Armor,
}

/// Static item definition. Deltas are added to a player's stats when the item
/// is equipped or consumed.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTemplate {
    #[serde(skip)]
    pub name: &'static str,
    #[serde(rename = "type")]
    pub class: ItemClass,
    pub rarity: u32,
    pub health: i32,
    pub health_total: i32,
    pub attack: i32,
    pub defense: i32,
    pub line_of_sight: i32,
    pub speed: i32,
}

impl ItemTemplate {
    const fn new(name: &'static str, class: ItemClass, rarity: u32) -> Self {
        Self {
            name,
            class,
            rarity,
            health: 0,
            health_total: 0,
            attack: 0,
            defense: 0,
            line_of_sight: 0,
            speed: 0,
        }
    }

    const fn health(mut self, health: i32) -> Self {
        self.health = health;
        self
    }

    const fn health_total(mut self, health_total: i32) -> Self {
        self.health_total = health_total;
        self
    }

    const fn attack(mut self, attack: i32) -> Self {
        self.attack = attack;
        self
    }

    const fn defense(mut self, defense: i32) -> Self {
        self.defense = defense;
        self
    }

    const fn line_of_sight(mut self, line_of_sight: i32) -> Self {
        self.line_of_sight = line_of_sight;
        self
    }

    const fn speed(mut self, speed: i32) -> Self {
        self.speed = speed;
        self
    }

    /// True when every delta other than plain healing is zero.
    pub fn heals_only(&self) -> bool {
        self.health_total == 0
            && self.attack == 0
            && self.defense == 0
            && self.line_of_sight == 0
            && self.speed == 0
    }
}

use ItemClass::{Armor, Consumable, Weapon};

pub static ITEMS: &[ItemTemplate] = &[
    // consumables
    ItemTemplate::new("Small Potion", Consumable, 30).health(10),
    ItemTemplate::new("Potion", Consumable, 15).health(25),
    ItemTemplate::new("Great Potion", Consumable, 5).health(100),
    ItemTemplate::new("Small Life Elixir", Consumable, 10).health_total(1),
    ItemTemplate::new("Life Elixir", Consumable, 4).health_total(5),
    ItemTemplate::new("Great Life Elixir", Consumable, 1).health_total(20),
    // weapons
    ItemTemplate::new("Butterknive", Weapon, 8).attack(1),
    ItemTemplate::new("Sword", Weapon, 4).attack(3),
    ItemTemplate::new("Battleaxe", Weapon, 2).attack(4).speed(-5),
    ItemTemplate::new("Daggers", Weapon, 3).attack(2).speed(5),
    ItemTemplate::new("Sting", Weapon, 1).attack(2).line_of_sight(2),
    ItemTemplate::new("Shield", Weapon, 3).defense(3),
    // armor
    ItemTemplate::new("Leather Armor", Armor, 5).defense(2).speed(-5),
    ItemTemplate::new("Shining Armor", Armor, 2)
        .defense(2)
        .line_of_sight(3)
        .speed(-5),
    ItemTemplate::new("Heavy Armor", Armor, 2).defense(3).speed(-10),
    ItemTemplate::new("Spiked Armor", Armor, 2)
        .attack(1)
        .defense(2)
        .speed(-10),
    ItemTemplate::new("Cloak", Armor, 3)
        .defense(1)
        .line_of_sight(1)
        .speed(5),
    ItemTemplate::new("Body Oil", Armor, 2).attack(1).speed(10),
];

pub fn lookup(name: &str) -> Option<&'static ItemTemplate> {
    ITEMS.iter().find(|item| item.name == name)
}

pub fn random_item(rng: &mut RandomNumberGenerator) -> Option<&'static ItemTemplate> {
    weighted_pick(ITEMS, |item| item.rarity, rng)
}

/// The catalog keyed by item name, as served to clients.
pub fn catalog() -> BTreeMap<&'static str, &'static ItemTemplate> {
    ITEMS.iter().map(|item| (item.name, item)).collect()
}
