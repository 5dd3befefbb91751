use bracket_random::prelude::RandomNumberGenerator;
use specs::prelude::{Entity, WorldExt};
use tracing::{debug, info, warn};

use super::components::{CombatStats, MonsterBrain};
use super::{Departure, SessionWorld};
use crate::data::items;
use crate::protocol::ServerMessage;

/// Damage dealt by one hit: `attack² / (attack + defense)`, rounded.
pub fn damage(attack: i32, defense: i32) -> i32 {
    if attack <= 0 {
        return 0;
    }
    let attack = f64::from(attack);
    let defense = f64::from(defense.max(0));
    (attack * attack / (attack + defense)).round() as i32
}

enum Strike {
    Wounded,
    Killed,
}

impl SessionWorld {
    fn strike(&self, attacker: Entity, target: Entity) -> Option<Strike> {
        let mut stats = self.specs_world.write_component::<CombatStats>();
        let attack = stats.get(attacker)?.attack;
        let target = stats.get_mut(target)?;
        let amount = damage(attack, target.defense);
        if amount >= target.health {
            target.health = 0;
            Some(Strike::Killed)
        } else {
            target.health -= amount;
            Some(Strike::Wounded)
        }
    }

    pub(super) fn player_attacks(&mut self, player: Entity, monster: Entity) {
        if let Some(Strike::Killed) = self.strike(player, monster) {
            self.kill_monster(monster);
        }
    }

    /// Only the victim learns its new stats; a killed player is removed.
    pub(super) fn monster_attacks(&mut self, monster: Entity, player: Entity) {
        match self.strike(monster, player) {
            Some(Strike::Killed) => {
                if let Some(id) = self.id_of(player) {
                    info!(player = %id, "player killed");
                }
                self.remove_player_entity(player, Departure::Died);
            }
            Some(Strike::Wounded) => {
                let stats = self
                    .specs_world
                    .read_component::<CombatStats>()
                    .get(player)
                    .cloned();
                if let Some(stats) = stats {
                    self.send_to(player, ServerMessage::stats(&stats));
                }
            }
            None => {}
        }
    }

    fn kill_monster(&mut self, monster: Entity) {
        let Some(id) = self.id_of(monster) else {
            return;
        };
        let point = self.position_of(monster);
        let class = self
            .specs_world
            .write_component::<MonsterBrain>()
            .get_mut(monster)
            .map(|brain| {
                brain.halt();
                brain.class
            });
        if let Err(err) = self.specs_world.delete_entity(monster) {
            warn!(monster = %id, error = ?err, "monster entity already gone");
        }
        if let Some(class) = class {
            debug!(monster = %id, class = class.template().name, "monster killed");
        }

        if let Some(point) = point {
            let loot = {
                let mut rng = self.specs_world.write_resource::<RandomNumberGenerator>();
                items::random_item(&mut rng)
            };
            if let Some(item) = loot {
                debug!(monster = %id, item = item.name, "loot dropped");
                self.deposit(point, item.name, 1);
            }
        }
        self.broadcast(ServerMessage::Remove { id });
    }
}
