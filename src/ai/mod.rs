//! Monster controller.
//!
//! Each monster owns a timer task that only ever sends a [`MonsterTick`] to
//! its session. The decision itself runs inside the session actor, through
//! [`choose_direction`], so monsters never touch session state directly.

use std::time::Duration;

use bracket_geometry::prelude::Point;
use bracket_random::prelude::RandomNumberGenerator;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::trace;

use crate::ecs::components::EntityId;
use crate::map::{Direction, Layout, manhattan};

/// "This monster wants to act."
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MonsterTick(pub EntityId);

/// Starts a monster's cadence. The task ends when `stop` fires or is dropped,
/// or when the session stops listening.
pub fn spawn_timer(
    monster: EntityId,
    period: Duration,
    ticks: mpsc::Sender<MonsterTick>,
    mut stop: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => match ticks.try_send(MonsterTick(monster)) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        trace!(%monster, "session busy, tick skipped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                },
            }
        }
        trace!(%monster, "timer stopped");
    })
}

/// Picks the step a monster at `origin` should take toward the nearest
/// player. Returns `None` when no player is within `aggro_radius`. When the
/// direct step is blocked by a wall, a random direction is chosen instead.
pub fn choose_direction(
    origin: Point,
    players: &[Point],
    aggro_radius: i32,
    layout: &Layout,
    rng: &mut RandomNumberGenerator,
) -> Option<Direction> {
    let nearest = players
        .iter()
        .copied()
        .min_by_key(|player| manhattan(origin, *player))?;
    if manhattan(origin, nearest) > aggro_radius {
        return None;
    }
    let direct = Direction::toward(origin, nearest);
    if layout.is_walkable(direct.step(origin)) {
        Some(direct)
    } else {
        Some(Direction::random(rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Rect;

    fn open_floor() -> Layout {
        Layout {
            rects: vec![Rect::new(-20, -20, 20, 20)],
        }
    }

    #[test]
    fn ignores_players_beyond_aggro_radius() {
        let mut rng = RandomNumberGenerator::seeded(1);
        let players = [Point::new(8, 3)];
        assert_eq!(
            choose_direction(Point::new(0, 0), &players, 10, &open_floor(), &mut rng),
            None
        );
        assert_eq!(
            choose_direction(Point::new(0, 0), &[], 10, &open_floor(), &mut rng),
            None
        );
    }

    #[test]
    fn chases_the_nearest_player() {
        let mut rng = RandomNumberGenerator::seeded(1);
        let players = [Point::new(-6, 0), Point::new(0, 3)];
        assert_eq!(
            choose_direction(Point::new(0, 0), &players, 10, &open_floor(), &mut rng),
            Some(Direction::Down)
        );
    }

    #[test]
    fn blocked_step_falls_back_to_a_random_direction() {
        let corridor = Layout {
            rects: vec![Rect::new(0, 0, 0, 10)],
        };
        let players = [Point::new(3, 1)];
        for seed in 0..10 {
            let mut rng = RandomNumberGenerator::seeded(seed);
            let dir = choose_direction(Point::new(0, 0), &players, 10, &corridor, &mut rng);
            assert!(dir.is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timer_ticks_until_stopped() {
        let (ticks, mut rx) = mpsc::channel(8);
        let (stop, stop_rx) = oneshot::channel();
        let handle = spawn_timer(EntityId(7), Duration::from_millis(500), ticks, stop_rx);

        assert_eq!(rx.recv().await, Some(MonsterTick(EntityId(7))));
        assert_eq!(rx.recv().await, Some(MonsterTick(EntityId(7))));

        stop.send(()).expect("timer still running");
        handle.await.expect("timer task exits cleanly");
        assert!(rx.recv().await.is_none());
    }
}
