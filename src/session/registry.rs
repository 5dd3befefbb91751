use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{debug, info};

use super::{Connection, Join, SessionHandle};
use crate::config::Settings;
use crate::ecs::components::EntityId;
use crate::error::{SessionError, SessionResult};
use crate::protocol::ClientAction;

/// Process-wide map from session id to running session.
///
/// Cloning is cheap; all clones share the same sessions.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    settings: Arc<Settings>,
    instances: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Registry {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: RwLock::new(HashMap::new()),
                settings: Arc::new(settings),
                instances: AtomicU64::new(0),
            }),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Returns the live session for `id`, starting one if none exists.
    /// Concurrent callers for the same id always get the same session.
    pub(crate) async fn get_or_create(&self, id: &str) -> SessionHandle {
        if let Some(handle) = self.inner.sessions.read().await.get(id) {
            return handle.clone();
        }

        let mut sessions = self.inner.sessions.write().await;
        if let Some(handle) = sessions.get(id) {
            return handle.clone();
        }
        let instance = self.inner.instances.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = super::spawn(
            id.to_string(),
            instance,
            self.inner.settings.clone(),
            self.clone(),
        );
        sessions.insert(id.to_string(), handle.clone());
        info!(session = id, instance, "session created");
        handle
    }

    async fn lookup(&self, id: &str) -> SessionResult<SessionHandle> {
        self.inner
            .sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::Closed(id.to_string()))
    }

    /// Adds a new player to session `id`, creating the session if needed.
    ///
    /// A session that is shutting down drops the join; the attempt is then
    /// repeated against a fresh session.
    pub async fn join(&self, id: &str) -> SessionResult<Connection> {
        let attempts = self.inner.settings.join_attempts.max(1);
        for attempt in 1..=attempts {
            let handle = self.get_or_create(id).await;
            let (outbound_tx, outbound_rx) = mpsc::channel(self.inner.settings.outbound_capacity);
            let (reply_tx, reply_rx) = oneshot::channel();
            let join = Join {
                outbound: outbound_tx,
                reply: reply_tx,
            };
            if handle.join_tx.send(join).await.is_ok() {
                if let Ok(joined) = reply_rx.await {
                    return Ok(Connection::new(
                        id,
                        &handle,
                        joined,
                        outbound_rx,
                        self.inner.settings.clone(),
                    ));
                }
            }
            debug!(session = id, attempt, "session closed during join");
        }
        Err(SessionError::Unavailable {
            id: id.to_string(),
            attempts,
        })
    }

    /// Delivers an action without rate limiting.
    pub async fn submit_action(
        &self,
        id: &str,
        player: EntityId,
        action: ClientAction,
    ) -> SessionResult<()> {
        let handle = self.lookup(id).await?;
        handle
            .action_tx
            .send((player, action))
            .await
            .map_err(|_| SessionError::Closed(id.to_string()))
    }

    pub async fn leave(&self, id: &str, player: EntityId) -> SessionResult<()> {
        let handle = self.lookup(id).await?;
        handle
            .leave_tx
            .send(player)
            .map_err(|_| SessionError::Closed(id.to_string()))
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.sessions.read().await.contains_key(id)
    }

    /// Identifies the current incarnation of session `id`.
    pub async fn instance(&self, id: &str) -> Option<u64> {
        self.inner
            .sessions
            .read()
            .await
            .get(id)
            .map(SessionHandle::instance)
    }

    pub async fn session_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    /// Unregisters `id`, but only if it still refers to `instance`.
    pub(crate) async fn remove(&self, id: &str, instance: u64) {
        let mut sessions = self.inner.sessions.write().await;
        if sessions
            .get(id)
            .is_some_and(|handle| handle.instance == instance)
        {
            sessions.remove(id);
            debug!(session = id, instance, "session unregistered");
        }
    }
}
