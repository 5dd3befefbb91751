//! Multiplayer dungeon crawl sessions.
//!
//! Each session is an actor that owns a generated dungeon level, its monsters
//! and item piles, and the players who joined it. Sessions are created on
//! first join and torn down when the last player leaves.

pub mod ai;
pub mod config;
pub mod data;
pub mod ecs;
pub mod error;
pub mod map;
pub mod protocol;
pub mod server;
pub mod session;

pub use config::Settings;
pub use error::{SessionError, SessionResult};
pub use session::{Connection, Registry};
