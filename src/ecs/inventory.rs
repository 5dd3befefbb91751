use bracket_geometry::prelude::Point;
use specs::prelude::{Entity, WorldExt};
use tracing::debug;

use super::components::{CombatStats, Equipment, Inventory};
use super::resources::{IdAllocator, Piles};
use super::{SessionWorld, pile_created};
use crate::data::items::{self, ItemClass, ItemTemplate};
use crate::protocol::ServerMessage;

fn slot_message(class: ItemClass, item: Option<&ItemTemplate>) -> Option<ServerMessage> {
    let item = item.map(|item| item.name.to_string());
    match class {
        ItemClass::Weapon => Some(ServerMessage::SetWeapon { item }),
        ItemClass::Armor => Some(ServerMessage::SetArmor { item }),
        ItemClass::Consumable => None,
    }
}

impl SessionWorld {
    /// Adds items to the pile at `point`, announcing the pile if it is new.
    pub(super) fn deposit(&self, point: Point, item: &'static str, amount: u32) {
        let created = {
            let mut ids = self.specs_world.write_resource::<IdAllocator>();
            let mut piles = self.specs_world.write_resource::<Piles>();
            piles.deposit(point, item, amount, || ids.next())
        };
        if let Some(id) = created {
            self.broadcast(pile_created(id, point));
        }
    }

    pub(super) fn pickup(&mut self, player: Entity) {
        let Some(point) = self.position_of(player) else {
            return;
        };
        let Some(pile) = self.specs_world.write_resource::<Piles>().take(point) else {
            debug!("nothing to pick up");
            return;
        };

        let updates: Vec<ServerMessage> = {
            let mut inventories = self.specs_world.write_component::<Inventory>();
            let Some(inventory) = inventories.get_mut(player) else {
                return;
            };
            pile.items
                .iter()
                .map(|(&name, &amount)| ServerMessage::inventory(name, inventory.add(name, amount)))
                .collect()
        };
        for update in updates {
            self.send_to(player, update);
        }
        self.broadcast(ServerMessage::Remove { id: pile.id });
    }

    pub(super) fn drop_item(&mut self, player: Entity, name: &str) {
        let Some(item) = items::lookup(name) else {
            debug!(item = name, "unknown item");
            return;
        };
        let Some(point) = self.position_of(player) else {
            return;
        };
        let remaining = self
            .specs_world
            .write_component::<Inventory>()
            .get_mut(player)
            .and_then(|inventory| inventory.remove_one(item.name));
        let Some(remaining) = remaining else {
            debug!(item = name, "item not held");
            return;
        };

        if remaining == 0 {
            self.unequip(player, item);
        }
        self.send_to(player, ServerMessage::inventory(item.name, remaining));
        self.deposit(point, item.name, 1);
    }

    pub(super) fn use_item(&mut self, player: Entity, name: &str) {
        let Some(item) = items::lookup(name) else {
            debug!(item = name, "unknown item");
            return;
        };
        let held = self
            .specs_world
            .read_component::<Inventory>()
            .get(player)
            .map_or(0, |inventory| inventory.count(item.name));
        if held == 0 {
            debug!(item = name, "item not held");
            return;
        }
        match item.class {
            ItemClass::Consumable => self.consume(player, item),
            ItemClass::Weapon | ItemClass::Armor => self.toggle_equipment(player, item),
        }
    }

    fn consume(&mut self, player: Entity, item: &'static ItemTemplate) {
        let stats = {
            let mut storage = self.specs_world.write_component::<CombatStats>();
            let Some(stats) = storage.get_mut(player) else {
                return;
            };
            if !stats.consume(item) {
                debug!(item = item.name, "consumable would have no effect");
                return;
            }
            stats.clone()
        };
        let remaining = self
            .specs_world
            .write_component::<Inventory>()
            .get_mut(player)
            .and_then(|inventory| inventory.remove_one(item.name))
            .unwrap_or(0);
        self.send_to(player, ServerMessage::inventory(item.name, remaining));
        self.send_to(player, ServerMessage::stats(&stats));
    }

    /// Equips `item`, or unequips it if it already occupies its slot. Any
    /// other item in the slot is taken off first.
    fn toggle_equipment(&mut self, player: Entity, item: &'static ItemTemplate) {
        let (equipped, stats) = {
            let mut equipment = self.specs_world.write_component::<Equipment>();
            let mut stats = self.specs_world.write_component::<CombatStats>();
            let (Some(equipment), Some(stats)) = (equipment.get_mut(player), stats.get_mut(player))
            else {
                return;
            };
            let Some(slot) = equipment.slot_mut(item.class) else {
                return;
            };
            let previous = slot.take();
            if let Some(previous) = previous {
                stats.unapply(previous);
            }
            let equipped = match previous {
                Some(previous) if previous.name == item.name => None,
                _ => {
                    stats.apply(item);
                    Some(item)
                }
            };
            *slot = equipped;
            (equipped, stats.clone())
        };
        if let Some(message) = slot_message(item.class, equipped) {
            self.send_to(player, message);
        }
        self.send_to(player, ServerMessage::stats(&stats));
    }

    fn unequip(&mut self, player: Entity, item: &'static ItemTemplate) {
        let stats = {
            let mut equipment = self.specs_world.write_component::<Equipment>();
            let mut stats = self.specs_world.write_component::<CombatStats>();
            let (Some(equipment), Some(stats)) = (equipment.get_mut(player), stats.get_mut(player))
            else {
                return;
            };
            let Some(slot) = equipment.slot_mut(item.class) else {
                return;
            };
            if !matches!(slot, Some(current) if current.name == item.name) {
                return;
            }
            *slot = None;
            stats.unapply(item);
            stats.clone()
        };
        if let Some(message) = slot_message(item.class, None) {
            self.send_to(player, message);
        }
        self.send_to(player, ServerMessage::stats(&stats));
    }
}
