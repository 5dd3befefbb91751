use bracket_geometry::prelude::Point;
use bracket_pathfinding::prelude::DistanceAlg;
use bracket_random::prelude::RandomNumberGenerator;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    pub fn delta(&self) -> Point {
        match self {
            Direction::Up => Point::new(0, -1),
            Direction::Right => Point::new(1, 0),
            Direction::Down => Point::new(0, 1),
            Direction::Left => Point::new(-1, 0),
        }
    }

    pub fn step(&self, from: Point) -> Point {
        let delta = self.delta();
        Point::new(from.x + delta.x, from.y + delta.y)
    }

    /// Direction of the dominant axis from `from` to `to`. Equal magnitudes
    /// resolve to the horizontal axis.
    pub fn toward(from: Point, to: Point) -> Self {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        if dx.abs() >= dy.abs() && dx != 0 {
            if dx > 0 {
                Direction::Right
            } else {
                Direction::Left
            }
        } else if dy < 0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    pub fn random(rng: &mut RandomNumberGenerator) -> Self {
        Self::ALL[rng.range(0, Self::ALL.len() as i32) as usize]
    }
}

pub fn manhattan(a: Point, b: Point) -> i32 {
    DistanceAlg::Manhattan.distance2d(a, b) as i32
}

/// Axis-aligned walkable region with inclusive bounds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Rectangle with both corners drawn from `[-extent, extent)`.
    pub fn random(extent: i32, rng: &mut RandomNumberGenerator) -> Self {
        let x1 = rng.range(-extent, extent);
        let x2 = rng.range(-extent, extent);
        let y1 = rng.range(-extent, extent);
        let y2 = rng.range(-extent, extent);
        Self::new(x1, y1, x2, y2)
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> i32 {
        self.width() * self.height()
    }

    pub fn perimeter(&self) -> i32 {
        (self.width() + self.height()) * 2
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x1 && point.x <= self.x2 && point.y >= self.y1 && point.y <= self.y2
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }

    /// Every cell of the rect, row by row.
    pub fn cells(&self) -> impl Iterator<Item = Point> + '_ {
        (self.y1..=self.y2).flat_map(move |y| (self.x1..=self.x2).map(move |x| Point::new(x, y)))
    }

    pub fn random_point(&self, rng: &mut RandomNumberGenerator) -> Point {
        Point::new(
            self.x1 + rng.range(0, self.width() + 1),
            self.y1 + rng.range(0, self.height() + 1),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_normalizes_corners() {
        let rect = Rect::new(4, 7, -2, 1);
        assert_eq!(rect, Rect { x1: -2, y1: 1, x2: 4, y2: 7 });
        assert_eq!(rect.area(), 36);
        assert_eq!(rect.perimeter(), 24);
        assert_eq!(rect.center(), Point::new(1, 4));
    }

    #[test]
    fn contains_is_inclusive() {
        let rect = Rect::new(-3, -3, 3, 3);
        assert!(rect.contains(Point::new(3, -3)));
        assert!(rect.contains(Point::new(0, 0)));
        assert!(!rect.contains(Point::new(4, 0)));
    }

    #[test]
    fn zero_width_corridor_contains_its_line() {
        let corridor = Rect::new(2, 5, 2, -1);
        assert_eq!(corridor.area(), 0);
        assert!(corridor.contains(Point::new(2, 0)));
        assert!(!corridor.contains(Point::new(3, 0)));
    }

    #[test]
    fn random_point_stays_inside() {
        let mut rng = RandomNumberGenerator::seeded(7);
        let rect = Rect::new(-1, 2, 1, 2);
        for _ in 0..200 {
            assert!(rect.contains(rect.random_point(&mut rng)));
        }
    }

    #[test]
    fn toward_prefers_horizontal_on_ties() {
        let origin = Point::new(0, 0);
        assert_eq!(Direction::toward(origin, Point::new(3, 3)), Direction::Right);
        assert_eq!(Direction::toward(origin, Point::new(-2, 2)), Direction::Left);
        assert_eq!(Direction::toward(origin, Point::new(1, -4)), Direction::Up);
        assert_eq!(Direction::toward(origin, Point::new(0, 2)), Direction::Down);
    }

    #[test]
    fn step_moves_one_cell() {
        let p = Point::new(5, 5);
        assert_eq!(Direction::Up.step(p), Point::new(5, 4));
        assert_eq!(Direction::Left.step(p), Point::new(4, 5));
        assert_eq!(manhattan(p, Point::new(2, 9)), 7);
    }
}
