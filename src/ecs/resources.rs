use std::collections::{BTreeMap, HashMap};

use bracket_geometry::prelude::Point;

use specs::prelude::Entity;

use super::components::EntityId;
use crate::map::{Layout, entry_point};

/// Monotonic id source for everything in a session.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: u64,
}

impl IdAllocator {
    pub fn next(&mut self) -> EntityId {
        self.last += 1;
        EntityId(self.last)
    }
}

/// The level currently being played.
#[derive(Clone, Debug)]
pub struct Dungeon {
    pub level: u32,
    pub layout: Layout,
    pub stairs: Point,
}

impl Default for Dungeon {
    fn default() -> Self {
        Self {
            level: 0,
            layout: Layout::default(),
            stairs: entry_point(),
        }
    }
}

impl Dungeon {
    pub fn is_walkable(&self, point: Point) -> bool {
        self.layout.is_walkable(point)
    }
}

#[derive(Clone, Debug)]
pub struct Pile {
    pub id: EntityId,
    pub items: BTreeMap<&'static str, u32>,
}

/// Item piles keyed by the cell they rest on. At most one pile per cell.
#[derive(Clone, Debug, Default)]
pub struct Piles {
    pub by_point: HashMap<Point, Pile>,
}

impl Piles {
    pub fn get(&self, point: Point) -> Option<&Pile> {
        self.by_point.get(&point)
    }

    /// Merges `amount` of `item` into the pile at `point`. Returns the pile's
    /// id when the pile had to be created.
    pub fn deposit(
        &mut self,
        point: Point,
        item: &'static str,
        amount: u32,
        new_id: impl FnOnce() -> EntityId,
    ) -> Option<EntityId> {
        let mut created = None;
        let pile = self.by_point.entry(point).or_insert_with(|| {
            let id = new_id();
            created = Some(id);
            Pile {
                id,
                items: BTreeMap::new(),
            }
        });
        *pile.items.entry(item).or_insert(0) += amount;
        created
    }

    pub fn take(&mut self, point: Point) -> Option<Pile> {
        self.by_point.remove(&point)
    }

    pub fn clear(&mut self) {
        self.by_point.clear();
    }
}

/// Players whose outbound buffer overflowed during the last flush. They have
/// lost a batch and must be dropped from the session.
#[derive(Debug, Default)]
pub struct Lagging {
    pub players: Vec<Entity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_keeps_pile_identity() {
        let mut piles = Piles::default();
        let at = Point::new(2, 3);
        assert_eq!(piles.deposit(at, "Potion", 1, || EntityId(10)), Some(EntityId(10)));
        assert_eq!(piles.deposit(at, "Potion", 2, || EntityId(11)), None);
        assert_eq!(piles.deposit(at, "Sword", 1, || EntityId(12)), None);

        let pile = piles.take(at).expect("pile exists");
        assert_eq!(pile.id, EntityId(10));
        assert_eq!(pile.items.get("Potion"), Some(&3));
        assert_eq!(pile.items.get("Sword"), Some(&1));
        assert!(piles.get(at).is_none());
    }
}
