pub mod components;
pub mod resources;
pub mod systems;

mod combat;
mod inventory;

use std::collections::BTreeMap;
use std::sync::Arc;

use bracket_geometry::prelude::Point;
use bracket_random::prelude::RandomNumberGenerator;
use specs::prelude::{Builder, Component, Entity, Join, RunNow, World as SpecsWorld, WorldExt};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};

use crate::{
    ai::{self, MonsterTick},
    config::Settings,
    map::{self, Direction, Layout, MonsterSpawn, entry_point},
    protocol::{Batch, ClientAction, ObjectKind, ServerMessage},
};

use self::{
    components::{
        CombatStats, EntityId, Equipment, Inventory, MonsterBrain, MonsterTag, Outbox, PlayerTag,
        Position, Renderable, SpeedLink,
    },
    resources::{Dungeon, IdAllocator, Lagging, Pile, Piles},
    systems::{FlushSystem, SpeedSyncSystem},
};

pub use combat::damage;

pub const PLAYER_GLYPH: char = '@';
pub const PILE_GLYPH: char = '%';

/// Why a player leaves the session.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Departure {
    Disconnected,
    Died,
}

/// All state of one session. Owned by the session actor; nothing else reads
/// or writes it.
pub struct SessionWorld {
    specs_world: SpecsWorld,
    settings: Arc<Settings>,
    ticks: mpsc::Sender<MonsterTick>,
}

impl SessionWorld {
    pub fn new(settings: Arc<Settings>, ticks: mpsc::Sender<MonsterTick>) -> Self {
        let mut specs_world = SpecsWorld::new();
        Self::register_components(&mut specs_world);
        let rng = match settings.seed {
            Some(seed) => RandomNumberGenerator::seeded(seed),
            None => RandomNumberGenerator::new(),
        };
        specs_world.insert(rng);
        specs_world.insert(IdAllocator::default());
        specs_world.insert(Dungeon::default());
        specs_world.insert(Piles::default());
        specs_world.insert(Lagging::default());

        let mut world = Self {
            specs_world,
            settings,
            ticks,
        };
        world.generate_level(1);
        world
    }

    fn register_components(world: &mut SpecsWorld) {
        world.register::<EntityId>();
        world.register::<Position>();
        world.register::<Renderable>();
        world.register::<CombatStats>();
        world.register::<Inventory>();
        world.register::<Equipment>();
        world.register::<Outbox>();
        world.register::<SpeedLink>();
        world.register::<MonsterBrain>();
        world.register::<PlayerTag>();
        world.register::<MonsterTag>();
    }

    pub fn level(&self) -> u32 {
        self.specs_world.read_resource::<Dungeon>().level
    }

    pub fn stairs(&self) -> Point {
        self.specs_world.read_resource::<Dungeon>().stairs
    }

    pub fn layout(&self) -> Layout {
        self.specs_world.read_resource::<Dungeon>().layout.clone()
    }

    pub fn is_walkable(&self, point: Point) -> bool {
        self.specs_world.read_resource::<Dungeon>().is_walkable(point)
    }

    pub fn player_count(&self) -> usize {
        self.specs_world.read_component::<PlayerTag>().join().count()
    }

    pub fn monster_count(&self) -> usize {
        self.specs_world.read_component::<MonsterTag>().join().count()
    }

    pub fn player_ids(&self) -> Vec<EntityId> {
        self.entities_with::<PlayerTag>()
            .into_iter()
            .filter_map(|entity| self.id_of(entity))
            .collect()
    }

    pub fn monster_ids(&self) -> Vec<EntityId> {
        self.entities_with::<MonsterTag>()
            .into_iter()
            .filter_map(|entity| self.id_of(entity))
            .collect()
    }

    pub fn position(&self, id: EntityId) -> Option<Point> {
        let entity = self
            .find_tagged::<PlayerTag>(id)
            .or_else(|| self.find_tagged::<MonsterTag>(id))?;
        self.position_of(entity)
    }

    pub fn stats(&self, id: EntityId) -> Option<CombatStats> {
        let entity = self
            .find_tagged::<PlayerTag>(id)
            .or_else(|| self.find_tagged::<MonsterTag>(id))?;
        self.specs_world
            .read_component::<CombatStats>()
            .get(entity)
            .cloned()
    }

    pub fn inventory(&self, id: EntityId) -> Option<BTreeMap<&'static str, u32>> {
        let entity = self.find_tagged::<PlayerTag>(id)?;
        self.specs_world
            .read_component::<Inventory>()
            .get(entity)
            .map(|inventory| inventory.items.clone())
    }

    pub fn pile_at(&self, point: Point) -> Option<Pile> {
        self.specs_world.read_resource::<Piles>().get(point).cloned()
    }

    fn allocate_id(&self) -> EntityId {
        self.specs_world.write_resource::<IdAllocator>().next()
    }

    fn entities_with<T: Component>(&self) -> Vec<Entity> {
        let entities = self.specs_world.entities();
        let tags = self.specs_world.read_component::<T>();
        (&entities, &tags).join().map(|(entity, _)| entity).collect()
    }

    fn find_tagged<T: Component>(&self, id: EntityId) -> Option<Entity> {
        let entities = self.specs_world.entities();
        let ids = self.specs_world.read_component::<EntityId>();
        let tags = self.specs_world.read_component::<T>();
        (&entities, &ids, &tags)
            .join()
            .find(|(_, entity_id, _)| **entity_id == id)
            .map(|(entity, _, _)| entity)
    }

    fn tagged_at<T: Component>(&self, point: Point) -> Option<Entity> {
        let entities = self.specs_world.entities();
        let positions = self.specs_world.read_component::<Position>();
        let tags = self.specs_world.read_component::<T>();
        (&entities, &positions, &tags)
            .join()
            .find(|(_, pos, _)| pos.point == point)
            .map(|(entity, _, _)| entity)
    }

    fn find_player(&self, id: EntityId) -> Option<Entity> {
        self.find_tagged::<PlayerTag>(id)
    }

    fn find_monster(&self, id: EntityId) -> Option<Entity> {
        self.find_tagged::<MonsterTag>(id)
    }

    fn player_at(&self, point: Point) -> Option<Entity> {
        self.tagged_at::<PlayerTag>(point)
    }

    fn monster_at(&self, point: Point) -> Option<Entity> {
        self.tagged_at::<MonsterTag>(point)
    }

    fn id_of(&self, entity: Entity) -> Option<EntityId> {
        self.specs_world
            .read_component::<EntityId>()
            .get(entity)
            .copied()
    }

    fn position_of(&self, entity: Entity) -> Option<Point> {
        self.specs_world
            .read_component::<Position>()
            .get(entity)
            .map(|pos| pos.point)
    }

    fn player_points(&self) -> Vec<Point> {
        let positions = self.specs_world.read_component::<Position>();
        let players = self.specs_world.read_component::<PlayerTag>();
        (&positions, &players)
            .join()
            .map(|(pos, _)| pos.point)
            .collect()
    }

    fn send_to(&self, entity: Entity, message: ServerMessage) {
        if let Some(outbox) = self
            .specs_world
            .write_component::<Outbox>()
            .get_mut(entity)
        {
            outbox.push(message);
        }
    }

    fn broadcast_filtered(&self, skip: Option<Entity>, message: ServerMessage) {
        let entities = self.specs_world.entities();
        let mut outboxes = self.specs_world.write_component::<Outbox>();
        for (entity, outbox) in (&entities, &mut outboxes).join() {
            if Some(entity) != skip {
                outbox.push(message.clone());
            }
        }
    }

    fn broadcast(&self, message: ServerMessage) {
        self.broadcast_filtered(None, message);
    }

    /// Delivers everything queued during the current event, one batch per
    /// player. Players whose buffer overflowed are disconnected and the
    /// others are told so. Returns how many players were dropped.
    pub fn flush(&mut self) -> usize {
        SpeedSyncSystem.run_now(&self.specs_world);
        let mut dropped = 0;
        loop {
            FlushSystem.run_now(&self.specs_world);
            let lagging = std::mem::take(&mut self.specs_world.write_resource::<Lagging>().players);
            if lagging.is_empty() {
                return dropped;
            }
            for player in lagging {
                self.remove_player_entity(player, Departure::Disconnected);
                dropped += 1;
            }
        }
    }

    fn level_message(&self) -> ServerMessage {
        let dungeon = self.specs_world.read_resource::<Dungeon>();
        ServerMessage::SetLevel {
            level: dungeon.level,
            rects: dungeon.layout.rects.clone(),
            ladder: dungeon.stairs.into(),
        }
    }

    fn describe(&self, entity: Entity) -> Option<ServerMessage> {
        let ids = self.specs_world.read_component::<EntityId>();
        let positions = self.specs_world.read_component::<Position>();
        let renderables = self.specs_world.read_component::<Renderable>();
        let players = self.specs_world.read_component::<PlayerTag>();
        let stats = self.specs_world.read_component::<CombatStats>();

        let id = *ids.get(entity)?;
        let pos = positions.get(entity)?.point.into();
        let rune = renderables.get(entity).map(|r| r.glyph);
        let message = if players.contains(entity) {
            ServerMessage::Create {
                kind: ObjectKind::Player,
                id,
                pos,
                rune,
                line_of_sight: stats.get(entity).map(|s| s.line_of_sight),
            }
        } else {
            ServerMessage::Create {
                kind: ObjectKind::Monster,
                id,
                pos,
                rune,
                line_of_sight: None,
            }
        };
        Some(message)
    }

    fn pile_messages(&self) -> Vec<ServerMessage> {
        let piles = self.specs_world.read_resource::<Piles>();
        let mut listed: Vec<(&Point, &Pile)> = piles.by_point.iter().collect();
        listed.sort_by_key(|(_, pile)| pile.id);
        listed
            .into_iter()
            .map(|(point, pile)| pile_created(pile.id, *point))
            .collect()
    }

    fn set_position(&self, entity: Entity, point: Point) {
        if let Some(pos) = self
            .specs_world
            .write_component::<Position>()
            .get_mut(entity)
        {
            pos.point = point;
        }
        if let Some(id) = self.id_of(entity) {
            self.broadcast(ServerMessage::position(id, point));
        }
    }

    /// Adds a player at the level entrance, queues the full session snapshot
    /// for it and announces it to everyone else. The returned receiver tracks
    /// the player's speed.
    pub fn add_player(&mut self, outbound: mpsc::Sender<Batch>) -> (EntityId, watch::Receiver<i32>) {
        let id = self.allocate_id();
        let stats = CombatStats::player();
        let (speed_tx, speed_rx) = watch::channel(stats.speed);
        let player = self
            .specs_world
            .create_entity()
            .with(id)
            .with(Position {
                point: entry_point(),
            })
            .with(Renderable {
                glyph: PLAYER_GLYPH,
            })
            .with(stats.clone())
            .with(Inventory::default())
            .with(Equipment::default())
            .with(Outbox::new(outbound))
            .with(SpeedLink { tx: speed_tx })
            .with(PlayerTag)
            .build();

        let mut snapshot = vec![
            ServerMessage::SetId { id },
            ServerMessage::stats(&stats),
            self.level_message(),
        ];
        snapshot.extend(
            self.entities_with::<MonsterTag>()
                .into_iter()
                .filter_map(|monster| self.describe(monster)),
        );
        snapshot.extend(self.pile_messages());
        snapshot.extend(
            self.entities_with::<PlayerTag>()
                .into_iter()
                .filter_map(|other| self.describe(other)),
        );
        for message in snapshot {
            self.send_to(player, message);
        }

        if let Some(created) = self.describe(player) {
            self.broadcast_filtered(Some(player), created);
        }
        info!(player = %id, "player joined");
        (id, speed_rx)
    }

    /// Removes a player. Returns false if the player was already gone.
    pub fn remove_player(&mut self, id: EntityId, departure: Departure) -> bool {
        match self.find_player(id) {
            Some(player) => {
                self.remove_player_entity(player, departure);
                true
            }
            None => false,
        }
    }

    fn remove_player_entity(&mut self, player: Entity, departure: Departure) {
        let Some(id) = self.id_of(player) else {
            return;
        };

        if departure == Departure::Died {
            let held = self
                .specs_world
                .write_component::<Inventory>()
                .get_mut(player)
                .map(|inventory| std::mem::take(&mut inventory.items))
                .unwrap_or_default();
            if let Some(point) = self.position_of(player) {
                for (item, amount) in held {
                    self.deposit(point, item, amount);
                }
            }
        }

        self.broadcast(ServerMessage::Remove { id });

        let outbox = self.specs_world.write_component::<Outbox>().remove(player);
        if let (Departure::Died, Some(outbox)) = (departure, outbox) {
            match outbox.tx.try_send(outbox.queue) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(player = %id, "observer is lagging, final batch dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(player = %id, "observer channel closed");
                }
            }
        }
        if let Err(err) = self.specs_world.delete_entity(player) {
            warn!(player = %id, error = ?err, "player entity already gone");
        }
        info!(player = %id, ?departure, "player left");

        // The departed player may have been the last one off the stairs.
        self.maybe_next_level();
    }

    /// Halts every monster timer. Called when the session ends.
    pub fn shutdown(&mut self) {
        self.despawn_monsters();
    }

    pub fn apply_action(&mut self, id: EntityId, action: ClientAction) {
        let Some(player) = self.find_player(id) else {
            debug!(player = %id, "action from departed player ignored");
            return;
        };
        match action {
            ClientAction::Move { dir } => self.move_player(player, dir),
            ClientAction::Pickup => self.pickup(player),
            ClientAction::Drop { item } => self.drop_item(player, &item),
            ClientAction::Use { item } => self.use_item(player, &item),
        }
    }

    fn move_player(&mut self, player: Entity, dir: Direction) {
        let Some(origin) = self.position_of(player) else {
            return;
        };
        let target = dir.step(origin);
        if let Some(monster) = self.monster_at(target) {
            self.player_attacks(player, monster);
            return;
        }
        if !self.is_walkable(target) {
            debug!(x = target.x, y = target.y, "move into wall ignored");
            return;
        }
        self.set_position(player, target);
        self.maybe_next_level();
    }

    /// Regenerates the dungeon once every player stands on the stairs.
    fn maybe_next_level(&mut self) {
        let stairs = self.stairs();
        let players = self.player_points();
        if players.is_empty() || players.iter().any(|point| *point != stairs) {
            return;
        }

        let next = self.level() + 1;
        self.generate_level(next);
        info!(level = next, "descended");

        self.broadcast(self.level_message());
        for monster in self.entities_with::<MonsterTag>() {
            if let Some(created) = self.describe(monster) {
                self.broadcast(created);
            }
        }
        for player in self.entities_with::<PlayerTag>() {
            self.set_position(player, entry_point());
        }
    }

    fn generate_level(&mut self, level: u32) {
        self.despawn_monsters();
        self.specs_world.write_resource::<Piles>().clear();
        let generated = {
            let mut rng = self.specs_world.write_resource::<RandomNumberGenerator>();
            map::generate(level, &mut rng)
        };
        *self.specs_world.write_resource::<Dungeon>() = Dungeon {
            level,
            layout: generated.layout,
            stairs: generated.stairs,
        };
        for spawn in generated.spawns {
            self.spawn_monster(spawn);
        }
    }

    pub(crate) fn spawn_monster(&mut self, spawn: MonsterSpawn) -> EntityId {
        let id = self.allocate_id();
        let (stop, stop_rx) = oneshot::channel();
        ai::spawn_timer(
            id,
            self.settings.action_interval(spawn.stats.speed),
            self.ticks.clone(),
            stop_rx,
        );
        self.specs_world
            .create_entity()
            .with(id)
            .with(Position { point: spawn.point })
            .with(Renderable {
                glyph: spawn.class.glyph(),
            })
            .with(spawn.stats)
            .with(MonsterBrain {
                class: spawn.class,
                facing: None,
                stop: Some(stop),
            })
            .with(MonsterTag)
            .build();
        id
    }

    fn despawn_monsters(&mut self) {
        let monsters = self.entities_with::<MonsterTag>();
        {
            let mut brains = self.specs_world.write_component::<MonsterBrain>();
            for &monster in &monsters {
                if let Some(brain) = brains.get_mut(monster) {
                    brain.halt();
                }
            }
        }
        if let Err(err) = self.specs_world.delete_entities(&monsters) {
            warn!(error = ?err, "failed to despawn monsters");
        }
    }

    /// One step of a monster's behavior: keep hitting a player it is facing,
    /// otherwise turn toward the nearest player in range and step.
    pub fn monster_act(&mut self, id: EntityId) {
        let Some(monster) = self.find_monster(id) else {
            trace!(monster = %id, "tick for dead monster ignored");
            return;
        };
        let Some(origin) = self.position_of(monster) else {
            return;
        };

        let facing = self
            .specs_world
            .read_component::<MonsterBrain>()
            .get(monster)
            .and_then(|brain| brain.facing);
        if let Some(dir) = facing {
            if let Some(player) = self.player_at(dir.step(origin)) {
                self.monster_attacks(monster, player);
                return;
            }
        }

        let players = self.player_points();
        let chosen = {
            let dungeon = self.specs_world.read_resource::<Dungeon>();
            let mut rng = self.specs_world.write_resource::<RandomNumberGenerator>();
            ai::choose_direction(
                origin,
                &players,
                self.settings.aggro_radius,
                &dungeon.layout,
                &mut rng,
            )
        };
        let Some(dir) = chosen else {
            return;
        };
        if let Some(brain) = self
            .specs_world
            .write_component::<MonsterBrain>()
            .get_mut(monster)
        {
            brain.facing = Some(dir);
        }

        let target = dir.step(origin);
        if let Some(player) = self.player_at(target) {
            self.monster_attacks(monster, player);
        } else if self.monster_at(target).is_none() && self.is_walkable(target) {
            self.set_position(monster, target);
        }
    }

    #[cfg(test)]
    pub(crate) fn install_layout(&mut self, rects: Vec<map::Rect>, stairs: Point) {
        self.despawn_monsters();
        self.specs_world.write_resource::<Piles>().clear();
        let mut dungeon = self.specs_world.write_resource::<Dungeon>();
        dungeon.layout = Layout { rects };
        dungeon.stairs = stairs;
    }

    #[cfg(test)]
    pub(crate) fn facing(&self, id: EntityId) -> Option<Direction> {
        let monster = self.find_monster(id)?;
        self.specs_world
            .read_component::<MonsterBrain>()
            .get(monster)
            .and_then(|brain| brain.facing)
    }

    #[cfg(test)]
    pub(crate) fn face(&self, id: EntityId, dir: Direction) {
        let Some(monster) = self.find_monster(id) else {
            return;
        };
        if let Some(brain) = self
            .specs_world
            .write_component::<MonsterBrain>()
            .get_mut(monster)
        {
            brain.facing = Some(dir);
        }
    }

    #[cfg(test)]
    pub(crate) fn teleport(&self, id: EntityId, point: Point) {
        if let Some(entity) = self
            .find_player(id)
            .or_else(|| self.find_monster(id))
        {
            self.set_position(entity, point);
        }
    }
}

fn pile_created(id: EntityId, point: Point) -> ServerMessage {
    ServerMessage::Create {
        kind: ObjectKind::Pile,
        id,
        pos: point.into(),
        rune: Some(PILE_GLYPH),
        line_of_sight: None,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::map::Rect;

    pub const ROOM: Rect = Rect {
        x1: -5,
        y1: -5,
        x2: 5,
        y2: 5,
    };

    /// A seeded world with a single open room and no monsters.
    pub fn world() -> (SessionWorld, mpsc::Receiver<MonsterTick>) {
        let settings = Arc::new(Settings {
            seed: Some(1234),
            ..Settings::default()
        });
        let (ticks, tick_rx) = mpsc::channel(64);
        let mut world = SessionWorld::new(settings, ticks);
        world.install_layout(vec![ROOM], Point::new(4, 4));
        (world, tick_rx)
    }

    pub fn join(world: &mut SessionWorld) -> (EntityId, mpsc::Receiver<Batch>) {
        let (tx, rx) = mpsc::channel(64);
        let (id, _) = world.add_player(tx);
        (id, rx)
    }

    /// Flushes the world and returns everything delivered to `rx`.
    pub fn drain(world: &mut SessionWorld, rx: &mut mpsc::Receiver<Batch>) -> Vec<ServerMessage> {
        world.flush();
        let mut messages = Vec::new();
        while let Ok(batch) = rx.try_recv() {
            messages.extend(batch);
        }
        messages
    }
}
