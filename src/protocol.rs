//! Wire messages exchanged with observers.
//!
//! Inbound actions are internally tagged on `action`; anything that does not
//! decode into [`ClientAction`] is protocol noise and is dropped by the
//! transport. Outbound messages are delivered in batches, one batch per
//! processed session event.

use bracket_geometry::prelude::Point;
use serde::{Deserialize, Serialize};

use crate::ecs::components::{CombatStats, EntityId};
use crate::map::{Direction, Rect};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientAction {
    Move { dir: Direction },
    Pickup,
    Drop { item: String },
    Use { item: String },
}

impl ClientAction {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl From<Point> for Pos {
    fn from(point: Point) -> Self {
        Self {
            x: point.x,
            y: point.y,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Player,
    Monster,
    Pile,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ServerMessage {
    SetId {
        id: EntityId,
    },
    #[serde(rename_all = "camelCase")]
    SetStats {
        health: i32,
        health_total: i32,
        attack: i32,
        defense: i32,
        line_of_sight: i32,
        speed: i32,
    },
    SetLevel {
        level: u32,
        rects: Vec<Rect>,
        ladder: Pos,
    },
    #[serde(rename_all = "camelCase")]
    Create {
        #[serde(rename = "type")]
        kind: ObjectKind,
        id: EntityId,
        pos: Pos,
        #[serde(skip_serializing_if = "Option::is_none")]
        rune: Option<char>,
        #[serde(skip_serializing_if = "Option::is_none")]
        line_of_sight: Option<i32>,
    },
    Remove {
        id: EntityId,
    },
    SetPosition {
        id: EntityId,
        pos: Pos,
    },
    SetInventory {
        item: String,
        amount: u32,
    },
    SetWeapon {
        item: Option<String>,
    },
    SetArmor {
        item: Option<String>,
    },
}

pub type Batch = Vec<ServerMessage>;

impl ServerMessage {
    pub fn stats(stats: &CombatStats) -> Self {
        ServerMessage::SetStats {
            health: stats.health,
            health_total: stats.health_total,
            attack: stats.attack,
            defense: stats.defense,
            line_of_sight: stats.line_of_sight,
            speed: stats.speed,
        }
    }

    pub fn position(id: EntityId, point: Point) -> Self {
        ServerMessage::SetPosition {
            id,
            pos: point.into(),
        }
    }

    pub fn inventory(item: &str, amount: u32) -> Self {
        ServerMessage::SetInventory {
            item: item.to_string(),
            amount,
        }
    }
}

pub fn encode_batch(batch: &Batch) -> Result<String, serde_json::Error> {
    serde_json::to_string(batch)
}
