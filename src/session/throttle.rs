use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tracing::trace;

use crate::config::Settings;
use crate::ecs::components::EntityId;
use crate::protocol::ClientAction;

/// Paces a player's actions by its current speed. Only the most recent
/// action submitted during the wait is forwarded. The task ends when the
/// connection drops its end of `pending` or the session stops accepting
/// actions.
pub(super) fn spawn(
    player: EntityId,
    mut pending: watch::Receiver<Option<ClientAction>>,
    speed: watch::Receiver<i32>,
    actions: mpsc::Sender<(EntityId, ClientAction)>,
    settings: Arc<Settings>,
) {
    tokio::spawn(async move {
        let mut ready_at = Instant::now();
        while pending.changed().await.is_ok() {
            sleep_until(ready_at).await;
            let Some(action) = pending.borrow_and_update().clone() else {
                continue;
            };
            if actions.send((player, action)).await.is_err() {
                break;
            }
            ready_at = Instant::now() + settings.action_interval(*speed.borrow());
        }
        trace!(%player, "throttle stopped");
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::map::Direction;

    fn step(dir: Direction) -> ClientAction {
        ClientAction::Move { dir }
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_only_the_latest_action_per_interval() {
        let settings = Arc::new(Settings::default());
        let (pending_tx, pending_rx) = watch::channel(None);
        let (_speed_tx, speed_rx) = watch::channel(0);
        let (actions_tx, mut actions_rx) = mpsc::channel(8);
        spawn(EntityId(1), pending_rx, speed_rx, actions_tx, settings);

        pending_tx.send_replace(Some(step(Direction::Up)));
        let started = Instant::now();
        assert_eq!(actions_rx.recv().await, Some((EntityId(1), step(Direction::Up))));

        pending_tx.send_replace(Some(step(Direction::Left)));
        pending_tx.send_replace(Some(step(Direction::Right)));
        assert_eq!(actions_rx.recv().await, Some((EntityId(1), step(Direction::Right))));
        assert!(started.elapsed() >= Duration::from_millis(100));

        drop(pending_tx);
        assert!(actions_rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn faster_players_wait_less() {
        let settings = Arc::new(Settings::default());
        let (pending_tx, pending_rx) = watch::channel(None);
        let (speed_tx, speed_rx) = watch::channel(0);
        let (actions_tx, mut actions_rx) = mpsc::channel(8);
        spawn(EntityId(2), pending_rx, speed_rx, actions_tx, settings.clone());

        speed_tx.send_replace(10);
        pending_tx.send_replace(Some(step(Direction::Down)));
        actions_rx.recv().await;
        let sent = Instant::now();
        pending_tx.send_replace(Some(step(Direction::Down)));
        actions_rx.recv().await;
        let waited = sent.elapsed();
        assert!(waited >= settings.action_interval(10));
        assert!(waited < settings.action_interval(0));
    }
}
