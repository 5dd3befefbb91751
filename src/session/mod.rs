//! Session actor.
//!
//! Every session runs as a single tokio task that exclusively owns its
//! [`SessionWorld`]. Joins, leaves, player actions and monster ticks arrive on
//! separate channels and are handled strictly one at a time; the batch of
//! messages produced by each event is flushed to observers before the next
//! event is taken. A session that has no players for `idle_grace` shuts
//! down, so a join abandoned before its reply does not keep it alive.

pub mod connection;
pub mod registry;
mod throttle;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{Instrument, debug, info, info_span};

use crate::ai::MonsterTick;
use crate::config::Settings;
use crate::ecs::components::EntityId;
use crate::ecs::{Departure, SessionWorld};
use crate::protocol::{Batch, ClientAction};

pub use connection::Connection;
pub use registry::Registry;

const JOIN_BACKLOG: usize = 32;
const ACTION_BACKLOG: usize = 256;

pub(crate) struct Join {
    outbound: mpsc::Sender<Batch>,
    reply: oneshot::Sender<Joined>,
}

pub(crate) struct Joined {
    player_id: EntityId,
    speed: watch::Receiver<i32>,
}

/// Cloneable address of a running session actor.
#[derive(Clone, Debug)]
pub(crate) struct SessionHandle {
    instance: u64,
    join_tx: mpsc::Sender<Join>,
    leave_tx: mpsc::UnboundedSender<EntityId>,
    action_tx: mpsc::Sender<(EntityId, ClientAction)>,
}

impl SessionHandle {
    pub(crate) fn instance(&self) -> u64 {
        self.instance
    }
}

enum Event {
    Join(Join),
    Leave(EntityId),
    Action(EntityId, ClientAction),
    Tick(EntityId),
    Idle,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Terminate,
}

struct SessionActor {
    id: String,
    instance: u64,
    registry: Registry,
    world: SessionWorld,
    join_rx: mpsc::Receiver<Join>,
    leave_rx: mpsc::UnboundedReceiver<EntityId>,
    action_rx: mpsc::Receiver<(EntityId, ClientAction)>,
    tick_rx: mpsc::Receiver<MonsterTick>,
}

/// Starts a session actor and returns its handle. The first level is
/// generated inside the actor task.
pub(crate) fn spawn(
    id: String,
    instance: u64,
    settings: Arc<Settings>,
    registry: Registry,
) -> SessionHandle {
    let (join_tx, join_rx) = mpsc::channel(JOIN_BACKLOG);
    let (leave_tx, leave_rx) = mpsc::unbounded_channel();
    let (action_tx, action_rx) = mpsc::channel(ACTION_BACKLOG);
    let (tick_tx, tick_rx) = mpsc::channel(settings.tick_capacity);

    let idle_grace = settings.idle_grace;

    let span = info_span!("session", session = %id, instance);
    tokio::spawn(
        async move {
            let world = SessionWorld::new(settings, tick_tx);
            let actor = SessionActor {
                id,
                instance,
                registry,
                world,
                join_rx,
                leave_rx,
                action_rx,
                tick_rx,
            };
            actor.run(idle_grace).await;
        }
        .instrument(span),
    );

    SessionHandle {
        instance,
        join_tx,
        leave_tx,
        action_tx,
    }
}

impl SessionActor {
    async fn run(mut self, idle_grace: Duration) {
        info!(level = self.world.level(), "session started");
        let idle = sleep_until(Instant::now() + idle_grace);
        tokio::pin!(idle);
        loop {
            let idle_armed = self.world.player_count() == 0;
            let event = tokio::select! {
                Some(join) = self.join_rx.recv() => Event::Join(join),
                Some(player) = self.leave_rx.recv() => Event::Leave(player),
                Some((player, action)) = self.action_rx.recv() => Event::Action(player, action),
                Some(MonsterTick(monster)) = self.tick_rx.recv() => Event::Tick(monster),
                () = &mut idle, if idle_armed => Event::Idle,
                else => break,
            };
            let flow = self.handle(event);
            let dropped = self.world.flush();
            if flow == Flow::Terminate || (dropped > 0 && self.world.player_count() == 0) {
                break;
            }
        }

        // Unregister before the receivers drop so a racing join retries
        // against a fresh session.
        self.registry.remove(&self.id, self.instance).await;
        self.world.shutdown();
        info!(level = self.world.level(), "session closed");
    }

    fn handle(&mut self, event: Event) -> Flow {
        match event {
            Event::Join(Join { outbound, reply }) => {
                let (player_id, speed) = self.world.add_player(outbound);
                if reply.send(Joined { player_id, speed }).is_err() {
                    debug!(player = %player_id, "joiner went away before the reply");
                    self.world.remove_player(player_id, Departure::Disconnected);
                    return self.after_departure();
                }
                Flow::Continue
            }
            Event::Leave(player) => {
                if self.world.remove_player(player, Departure::Disconnected) {
                    self.after_departure()
                } else {
                    Flow::Continue
                }
            }
            Event::Action(player, action) => {
                self.world.apply_action(player, action);
                Flow::Continue
            }
            Event::Idle => {
                info!("no players joined in time");
                self.after_departure()
            }
            Event::Tick(monster) => {
                let before = self.world.player_count();
                self.world.monster_act(monster);
                if before > 0 {
                    self.after_departure()
                } else {
                    Flow::Continue
                }
            }
        }
    }

    fn after_departure(&self) -> Flow {
        if self.world.player_count() == 0 {
            Flow::Terminate
        } else {
            Flow::Continue
        }
    }
}
