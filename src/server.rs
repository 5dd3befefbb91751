use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::time::interval;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::data::items::{self, ItemTemplate};
use crate::protocol::{ClientAction, encode_batch};
use crate::session::{Connection, Registry};

const PING_INTERVAL: Duration = Duration::from_secs(20);

#[derive(Clone)]
struct AppState {
    registry: Registry,
}

pub fn router(registry: Registry) -> Router {
    Router::new()
        .route("/ws/:id", get(ws_session))
        .route("/items/", get(item_catalog))
        .with_state(AppState { registry })
}

async fn item_catalog() -> Json<BTreeMap<&'static str, &'static ItemTemplate>> {
    Json(items::catalog())
}

async fn ws_session(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| async move { ws_session_task(socket, id, state.registry).await })
}

async fn ws_session_task(socket: WebSocket, id: String, registry: Registry) {
    let connection = match registry.join(&id).await {
        Ok(connection) => connection,
        Err(err) => {
            warn!(session = %id, %err, "join failed");
            let _ = socket.close().await;
            return;
        }
    };
    let span = info_span!("connection", session = %id, player = %connection.player_id());
    pump(socket, connection).instrument(span).await;
}

/// Shuttles batches out and actions in until either side goes away. The
/// connection is dropped on return, which removes the player.
async fn pump(mut socket: WebSocket, mut connection: Connection) {
    let mut heartbeat = interval(PING_INTERVAL);
    heartbeat.tick().await;
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            batch = connection.recv() => {
                let Some(batch) = batch else {
                    debug!("removed from session");
                    break;
                };
                let text = match encode_batch(&batch) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(%err, "failed to encode batch");
                        continue;
                    }
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => match ClientAction::decode(&text) {
                    Ok(action) => connection.submit(action),
                    Err(err) => debug!(%err, "ignoring malformed message"),
                },
                Some(Ok(Message::Pong(_))) => awaiting_pong = false,
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = heartbeat.tick() => {
                if awaiting_pong {
                    info!("no pong since last ping, closing");
                    break;
                }
                awaiting_pong = true;
                if socket.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = socket.close().await;
    info!("connection closed");
}

pub async fn serve(addr: SocketAddr, registry: Registry) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, router(registry))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(%err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn items_route_serves_the_catalog() {
        let response = router(Registry::default())
            .oneshot(Request::get("/items/").body(Body::empty()).expect("request"))
            .await
            .expect("router is infallible");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
