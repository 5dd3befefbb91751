use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::throttle;
use super::{Joined, SessionHandle};
use crate::config::Settings;
use crate::ecs::components::EntityId;
use crate::protocol::{Batch, ClientAction};

/// One player's attachment to a session.
///
/// Actions passed to [`Connection::submit`] are rate limited by the player's
/// speed. Dropping the connection removes the player from the session.
#[derive(Debug)]
pub struct Connection {
    session: String,
    player_id: EntityId,
    outbound: mpsc::Receiver<Batch>,
    pending: watch::Sender<Option<ClientAction>>,
    leave_tx: mpsc::UnboundedSender<EntityId>,
}

impl Connection {
    pub(crate) fn new(
        session: &str,
        handle: &SessionHandle,
        joined: Joined,
        outbound: mpsc::Receiver<Batch>,
        settings: Arc<Settings>,
    ) -> Self {
        let (pending, pending_rx) = watch::channel(None);
        throttle::spawn(
            joined.player_id,
            pending_rx,
            joined.speed,
            handle.action_tx.clone(),
            settings,
        );
        Self {
            session: session.to_string(),
            player_id: joined.player_id,
            outbound,
            pending,
            leave_tx: handle.leave_tx.clone(),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn player_id(&self) -> EntityId {
        self.player_id
    }

    /// Queues an action. An action still waiting for its slot is replaced.
    pub fn submit(&self, action: ClientAction) {
        self.pending.send_replace(Some(action));
    }

    /// Next batch of messages for this player. `None` once the player has
    /// been removed from the session.
    pub async fn recv(&mut self) -> Option<Batch> {
        self.outbound.recv().await
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.leave_tx.send(self.player_id);
    }
}
