use bracket_random::prelude::RandomNumberGenerator;

use super::weighted_pick;

/// Linear stat curve over dungeon levels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Scaling {
    pub base: i32,
    pub per_level: i32,
}

impl Scaling {
    const fn new(base: i32, per_level: i32) -> Self {
        Self { base, per_level }
    }

    pub fn at(&self, level: u32) -> i32 {
        self.base + self.per_level * level as i32
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MonsterClass {
    Rat,
    Bat,
    Goblin,
    Orc,
    Troll,
}

impl MonsterClass {
    pub const ALL: [MonsterClass; 5] = [
        MonsterClass::Rat,
        MonsterClass::Bat,
        MonsterClass::Goblin,
        MonsterClass::Orc,
        MonsterClass::Troll,
    ];

    pub fn template(&self) -> &'static MonsterTemplate {
        match self {
            MonsterClass::Rat => &RAT,
            MonsterClass::Bat => &BAT,
            MonsterClass::Goblin => &GOBLIN,
            MonsterClass::Orc => &ORC,
            MonsterClass::Troll => &TROLL,
        }
    }

    pub fn glyph(&self) -> char {
        self.template().glyph
    }

    pub fn random(rng: &mut RandomNumberGenerator) -> Option<Self> {
        weighted_pick(&Self::ALL, |class| class.template().rarity, rng).copied()
    }
}

#[derive(Clone, Debug)]
pub struct MonsterTemplate {
    pub name: &'static str,
    pub glyph: char,
    pub health: Scaling,
    pub attack: Scaling,
    pub defense: Scaling,
    pub speed: i32,
    pub rarity: u32,
}

static RAT: MonsterTemplate = MonsterTemplate {
    name: "Rat",
    glyph: 'r',
    health: Scaling::new(6, 2),
    attack: Scaling::new(2, 1),
    defense: Scaling::new(0, 0),
    speed: -15,
    rarity: 30,
};

static BAT: MonsterTemplate = MonsterTemplate {
    name: "Bat",
    glyph: 'b',
    health: Scaling::new(4, 1),
    attack: Scaling::new(1, 1),
    defense: Scaling::new(0, 0),
    speed: -10,
    rarity: 20,
};

static GOBLIN: MonsterTemplate = MonsterTemplate {
    name: "Goblin",
    glyph: 'g',
    health: Scaling::new(10, 3),
    attack: Scaling::new(3, 1),
    defense: Scaling::new(1, 0),
    speed: -24,
    rarity: 18,
};

static ORC: MonsterTemplate = MonsterTemplate {
    name: "Orc",
    glyph: 'o',
    health: Scaling::new(16, 4),
    attack: Scaling::new(4, 1),
    defense: Scaling::new(2, 1),
    speed: -28,
    rarity: 10,
};

static TROLL: MonsterTemplate = MonsterTemplate {
    name: "Troll",
    glyph: 'T',
    health: Scaling::new(30, 6),
    attack: Scaling::new(6, 2),
    defense: Scaling::new(3, 1),
    speed: -34,
    rarity: 4,
};
