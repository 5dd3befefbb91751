pub mod geometry;

use std::collections::HashSet;

use bracket_geometry::prelude::Point;
use bracket_random::prelude::RandomNumberGenerator;
use smallvec::{SmallVec, smallvec};

use crate::data::monsters::MonsterClass;
use crate::ecs::components::CombatStats;

pub use geometry::{Direction, Rect, manhattan};

pub const SEED_ROOM: Rect = Rect {
    x1: -3,
    y1: -3,
    x2: 3,
    y2: 3,
};
const ROOM_ATTEMPTS: usize = 15;
const ROOM_EXTENT: i32 = 25;
const MAX_ROOM_AREA: i32 = 150;
const MAX_ROOM_PERIMETER: i32 = 80;
const SPAWN_DRAWS: usize = 16;

/// Where players enter a level. Always inside the seed room.
pub fn entry_point() -> Point {
    SEED_ROOM.center()
}

/// Walkable terrain of one level: a cell is walkable iff some rect contains it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Layout {
    pub rects: Vec<Rect>,
}

impl Layout {
    pub fn is_walkable(&self, point: Point) -> bool {
        self.rects.iter().any(|rect| rect.contains(point))
    }
}

#[derive(Clone, Debug)]
pub struct MonsterSpawn {
    pub class: MonsterClass,
    pub point: Point,
    pub stats: CombatStats,
}

impl MonsterSpawn {
    pub fn new(class: MonsterClass, point: Point, level: u32) -> Self {
        Self {
            class,
            point,
            stats: CombatStats::for_monster(class.template(), level),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GeneratedLevel {
    pub layout: Layout,
    pub rooms: usize,
    pub stairs: Point,
    pub spawns: Vec<MonsterSpawn>,
}

/// L-shaped connection between two room centers: horizontal leg along the
/// first center's row, then vertical leg along the second center's column.
fn corridor(from: Point, to: Point) -> SmallVec<[Rect; 2]> {
    smallvec![
        Rect::new(from.x, from.y, to.x, from.y),
        Rect::new(to.x, from.y, to.x, to.y),
    ]
}

/// A random cell of `room` that is not in `taken`. Falls back to scanning the
/// room when random draws keep colliding; `None` only if every cell is taken.
fn free_point(
    room: &Rect,
    taken: &HashSet<Point>,
    rng: &mut RandomNumberGenerator,
) -> Option<Point> {
    (0..SPAWN_DRAWS)
        .map(|_| room.random_point(rng))
        .find(|point| !taken.contains(point))
        .or_else(|| room.cells().find(|point| !taken.contains(point)))
}

pub fn generate(level: u32, rng: &mut RandomNumberGenerator) -> GeneratedLevel {
    let mut prev = SEED_ROOM;
    let mut rooms = vec![prev];
    let mut corridors = Vec::new();
    let mut spawns = Vec::new();
    let mut taken = HashSet::from([entry_point()]);

    for _ in 0..ROOM_ATTEMPTS {
        let candidate = Rect::random(ROOM_EXTENT, rng);
        if candidate.area() >= MAX_ROOM_AREA || candidate.perimeter() >= MAX_ROOM_PERIMETER {
            continue;
        }

        corridors.extend(corridor(prev.center(), candidate.center()));
        rooms.push(candidate);

        if let Some(class) = MonsterClass::random(rng) {
            if let Some(point) = free_point(&candidate, &taken, rng) {
                taken.insert(point);
                spawns.push(MonsterSpawn::new(class, point, level));
            }
        }
        prev = candidate;
    }

    let stairs = prev.random_point(rng);
    let room_count = rooms.len();
    let mut rects = rooms;
    rects.extend(corridors);

    GeneratedLevel {
        layout: Layout { rects },
        rooms: room_count,
        stairs,
        spawns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_room_comes_first_and_holds_the_entry() {
        let mut rng = RandomNumberGenerator::seeded(5);
        let level = generate(1, &mut rng);
        assert_eq!(level.layout.rects[0], SEED_ROOM);
        assert!(level.layout.is_walkable(entry_point()));
    }

    #[test]
    fn every_room_is_joined_to_its_predecessor() {
        for seed in 0..20 {
            let mut rng = RandomNumberGenerator::seeded(seed);
            let level = generate(1, &mut rng);
            let rooms = &level.layout.rects[..level.rooms];
            let corridors = &level.layout.rects[level.rooms..];
            assert_eq!(corridors.len(), 2 * (rooms.len() - 1));
            for (i, pair) in rooms.windows(2).enumerate() {
                let (a, b) = (pair[0].center(), pair[1].center());
                let legs = &corridors[2 * i..2 * i + 2];
                assert!(legs[0].contains(a));
                assert!(legs[0].contains(Point::new(b.x, a.y)));
                assert!(legs[1].contains(Point::new(b.x, a.y)));
                assert!(legs[1].contains(b));
            }
        }
    }

    #[test]
    fn accepted_rooms_respect_size_limits() {
        let mut rng = RandomNumberGenerator::seeded(77);
        let level = generate(2, &mut rng);
        for room in &level.layout.rects[1..level.rooms] {
            assert!(room.area() < MAX_ROOM_AREA);
            assert!(room.perimeter() < MAX_ROOM_PERIMETER);
        }
    }

    #[test]
    fn at_most_one_monster_per_new_room_on_walkable_cells() {
        for seed in 0..20 {
            let mut rng = RandomNumberGenerator::seeded(seed);
            let level = generate(3, &mut rng);
            let new_rooms = &level.layout.rects[1..level.rooms];
            assert!(level.spawns.len() <= new_rooms.len());
            for spawn in &level.spawns {
                assert!(new_rooms.iter().any(|room| room.contains(spawn.point)));
                let template = spawn.class.template();
                assert_eq!(spawn.stats.health, template.health.at(3));
                assert_eq!(spawn.stats.attack, template.attack.at(3));
            }
        }
    }

    #[test]
    fn spawns_never_share_a_cell_or_block_the_entry() {
        for seed in 0..2000 {
            let mut rng = RandomNumberGenerator::seeded(seed);
            let level = generate(1, &mut rng);
            let mut seen = HashSet::from([entry_point()]);
            for spawn in &level.spawns {
                assert!(seen.insert(spawn.point), "seed {seed}: {:?} taken twice", spawn.point);
            }
        }
    }

    #[test]
    fn free_point_skips_taken_cells() {
        let mut rng = RandomNumberGenerator::seeded(1);
        let room = Rect::new(0, 0, 1, 0);
        let taken = HashSet::from([Point::new(0, 0)]);
        for _ in 0..10 {
            assert_eq!(free_point(&room, &taken, &mut rng), Some(Point::new(1, 0)));
        }
        let full = HashSet::from([Point::new(0, 0), Point::new(1, 0)]);
        assert_eq!(free_point(&room, &full, &mut rng), None);
    }

    #[test]
    fn stairs_sit_in_the_last_room() {
        for seed in 0..20 {
            let mut rng = RandomNumberGenerator::seeded(seed);
            let level = generate(1, &mut rng);
            let last_room = level.layout.rects[level.rooms - 1];
            assert!(last_room.contains(level.stairs));
            assert!(level.layout.is_walkable(level.stairs));
        }
    }
}
