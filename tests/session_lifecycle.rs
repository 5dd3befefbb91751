use std::time::Duration;

use deepdelve::ecs::components::EntityId;
use deepdelve::map::Direction;
use deepdelve::protocol::{ClientAction, ObjectKind, ServerMessage};
use deepdelve::{Connection, Registry, SessionError, Settings};
use tokio::time::{sleep, timeout};

fn registry() -> Registry {
    Registry::new(Settings {
        seed: Some(7),
        ..Settings::default()
    })
}

async fn next_batch(connection: &mut Connection) -> Vec<ServerMessage> {
    timeout(Duration::from_secs(2), connection.recv())
        .await
        .expect("batch arrives in time")
        .expect("connection still open")
}

/// Skips batches (monster moves, for instance) until one satisfies `wanted`.
async fn wait_for(
    connection: &mut Connection,
    wanted: impl Fn(&ServerMessage) -> bool,
) -> Vec<ServerMessage> {
    timeout(Duration::from_secs(2), async {
        loop {
            let batch = connection.recv().await.expect("connection still open");
            if batch.iter().any(&wanted) {
                return batch;
            }
        }
    })
    .await
    .expect("expected message arrives in time")
}

async fn wait_until_gone(registry: &Registry, id: &str) {
    timeout(Duration::from_secs(2), async {
        while registry.contains(id).await {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("session shuts down");
}

#[tokio::test]
async fn first_batch_is_the_snapshot() {
    let registry = registry();
    let mut connection = registry.join("snapshot").await.expect("join");
    let batch = next_batch(&mut connection).await;

    assert_eq!(batch[0], ServerMessage::SetId {
        id: connection.player_id()
    });
    assert!(matches!(batch[2], ServerMessage::SetLevel { level: 1, .. }));
    assert!(batch.iter().any(|m| matches!(
        m,
        ServerMessage::Create { kind: ObjectKind::Player, id, .. } if *id == connection.player_id()
    )));
}

#[tokio::test]
async fn last_leave_ends_the_session_and_rejoin_starts_fresh() {
    let registry = registry();
    let connection = registry.join("abc").await.expect("join");
    let first = registry.instance("abc").await.expect("session registered");

    drop(connection);
    wait_until_gone(&registry, "abc").await;
    assert_eq!(registry.session_count().await, 0);

    let mut connection = registry.join("abc").await.expect("rejoin");
    let second = registry.instance("abc").await.expect("session registered");
    assert_ne!(first, second);
    let batch = next_batch(&mut connection).await;
    assert!(matches!(batch[2], ServerMessage::SetLevel { level: 1, .. }));
}

#[tokio::test]
async fn players_in_one_session_see_each_other() {
    let registry = registry();
    let mut first = registry.join("pair").await.expect("join");
    next_batch(&mut first).await;

    let mut second = registry.join("pair").await.expect("join");
    let snapshot = next_batch(&mut second).await;
    assert!(snapshot.iter().any(|m| matches!(
        m,
        ServerMessage::Create { kind: ObjectKind::Player, id, .. } if *id == first.player_id()
    )));

    let second_id = second.player_id();
    wait_for(&mut first, |m| {
        matches!(m, ServerMessage::Create { kind: ObjectKind::Player, id, .. } if *id == second_id)
    })
    .await;

    drop(second);
    wait_for(&mut first, |m| *m == ServerMessage::Remove { id: second_id }).await;
    assert!(registry.contains("pair").await);
}

#[tokio::test]
async fn submitted_moves_are_applied() {
    let registry = registry();
    let mut connection = registry.join("walk").await.expect("join");
    next_batch(&mut connection).await;
    let me = connection.player_id();

    // A monster may stand next to the entrance, so try every direction.
    let mut moved = false;
    for dir in Direction::ALL {
        connection.submit(ClientAction::Move { dir });
        let seen = timeout(
            Duration::from_millis(500),
            wait_for(&mut connection, |m| {
                matches!(m, ServerMessage::SetPosition { id, .. } if *id == me)
            }),
        )
        .await;
        if seen.is_ok() {
            moved = true;
            break;
        }
    }
    assert!(moved);
}

#[tokio::test]
async fn concurrent_joins_share_one_session() {
    let registry = registry();
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move { registry.join("crowd").await }));
    }
    let mut connections = Vec::new();
    for task in tasks {
        connections.push(task.await.expect("task").expect("join"));
    }

    assert_eq!(registry.session_count().await, 1);
    let mut ids: Vec<_> = connections.iter().map(Connection::player_id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
}

#[tokio::test]
async fn requests_for_unknown_sessions_fail() {
    let registry = registry();
    let err = registry
        .submit_action("nowhere", EntityId(1), ClientAction::Pickup)
        .await
        .expect_err("no such session");
    assert_eq!(err, SessionError::Closed("nowhere".to_string()));
    assert!(registry.leave("nowhere", EntityId(1)).await.is_err());
}
