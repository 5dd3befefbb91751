use specs::prelude::*;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use super::components::{CombatStats, EntityId, Outbox, SpeedLink};
use super::resources::Lagging;

/// Hands every non-empty outbox to its transport as one batch. A player whose
/// buffer is full loses its outbox, which closes the channel, and is listed in
/// [`Lagging`] for removal.
#[derive(Default)]
pub struct FlushSystem;

impl<'a> System<'a> for FlushSystem {
    type SystemData = (
        Entities<'a>,
        ReadStorage<'a, EntityId>,
        WriteStorage<'a, Outbox>,
        Write<'a, Lagging>,
    );

    fn run(&mut self, (entities, ids, mut outboxes, mut lagging): Self::SystemData) {
        for (entity, id, outbox) in (&entities, &ids, &mut outboxes).join() {
            if outbox.queue.is_empty() {
                continue;
            }
            let batch = std::mem::take(&mut outbox.queue);
            match outbox.tx.try_send(batch) {
                Ok(()) => {}
                Err(TrySendError::Full(batch)) => {
                    warn!(
                        player = %id,
                        dropped = batch.len(),
                        "observer is lagging, disconnecting"
                    );
                    lagging.players.push(entity);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(player = %id, "observer channel closed");
                }
            }
        }
        for &entity in &lagging.players {
            outboxes.remove(entity);
        }
    }
}

/// Publishes speed changes so each player's throttle paces actions with the
/// current stat.
#[derive(Default)]
pub struct SpeedSyncSystem;

impl<'a> System<'a> for SpeedSyncSystem {
    type SystemData = (ReadStorage<'a, CombatStats>, ReadStorage<'a, SpeedLink>);

    fn run(&mut self, (stats, links): Self::SystemData) {
        for (stat, link) in (&stats, &links).join() {
            link.tx.send_if_modified(|speed| {
                if *speed == stat.speed {
                    false
                } else {
                    *speed = stat.speed;
                    true
                }
            });
        }
    }
}
