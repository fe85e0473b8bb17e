//! SessionManager - session lifecycle and identity
//!
//! Owns every live session. Closing is idempotent and safe to call from
//! any component; no session's closure can block or fault another. Retired
//! session ids re-enter circulation only after a grace period, so a late
//! message addressed to a dead session cannot land on its successor.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, info};

use haul_proto::{Event, Message};
use haul_plugin_api::AuthLevel;

use crate::auth::AuthStore;
use crate::error::{HaulError, SessionError};
use crate::events::EventManager;

use super::{Session, SessionId, SessionState};

struct IdAllocator {
    next: SessionId,
    free: Vec<SessionId>,
    retired: Vec<(SessionId, Instant)>,
    grace: Duration,
}

impl IdAllocator {
    fn new(grace: Duration) -> Self {
        Self {
            next: 1,
            free: Vec::new(),
            retired: Vec::new(),
            grace,
        }
    }

    fn allocate(&mut self) -> SessionId {
        self.reap();
        match self.free.pop() {
            Some(id) => id,
            None => {
                let id = self.next;
                self.next += 1;
                id
            }
        }
    }

    fn retire(&mut self, id: SessionId) {
        self.retired.push((id, Instant::now()));
    }

    /// Move retired ids whose grace period has elapsed onto the free list.
    fn reap(&mut self) {
        let grace = self.grace;
        let mut still_retired = Vec::new();
        for (id, when) in self.retired.drain(..) {
            if when.elapsed() >= grace {
                self.free.push(id);
            } else {
                still_retired.push((id, when));
            }
        }
        self.retired = still_retired;
    }
}

/// Tracks one live [`Session`] per connection.
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Session>>,
    ids: Mutex<IdAllocator>,
    auth: AuthStore,
    events: Arc<EventManager>,
}

impl SessionManager {
    pub fn new(auth: AuthStore, events: Arc<EventManager>, id_reuse_grace: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ids: Mutex::new(IdAllocator::new(id_reuse_grace)),
            auth,
            events,
        }
    }

    /// Register a new connection. The session starts in `Connecting` and
    /// its outbound queue is wired into the event fan-out.
    pub async fn open(&self, peer: SocketAddr, outbound: mpsc::Sender<Message>) -> SessionId {
        let id = self.ids.lock().await.allocate();
        let session = Session::new(id, peer, outbound.clone());

        self.sessions.write().await.insert(id, session);
        self.events.attach_session(id, outbound).await;

        debug!(session = id, peer = %peer, "session opened");
        id
    }

    /// Mark the protocol handshake complete: `Connecting -> Authenticating`.
    pub async fn handshake_complete(&self, id: SessionId) -> Result<(), SessionError> {
        {
            let mut sessions = self.sessions.write().await;
            let session = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
            if session.state() != SessionState::Connecting {
                return Err(SessionError::InvalidState {
                    expected: "connecting".to_string(),
                    actual: format!("{:?}", session.state()),
                });
            }
            session.set_state(SessionState::Authenticating);
        }

        self.events
            .publish(Event::new("session.connected", json!({ "session_id": id })))
            .await;
        Ok(())
    }

    /// Check credentials against the store. Success sets the session's
    /// level and moves it to `Authenticated`; failure leaves it in
    /// `Authenticating` at level `None`.
    pub async fn authenticate(
        &self,
        id: SessionId,
        username: &str,
        password: &str,
    ) -> Result<AuthLevel, HaulError> {
        let level = self.auth.verify(username, password)?;

        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        session.set_level(level);
        session.set_state(SessionState::Authenticated);

        info!(session = id, user = username, level = %level, "session authenticated");
        Ok(level)
    }

    /// Tear down a session. Idempotent and safe to call from any
    /// component: the outbound queue is dropped (discarding anything still
    /// enqueued), the event fan-out forgets the session, and the id is
    /// retired for later reuse.
    pub async fn close(&self, id: SessionId) {
        let removed = {
            let mut sessions = self.sessions.write().await;
            if let Some(session) = sessions.get_mut(&id) {
                session.set_state(SessionState::Closing);
            }
            sessions.remove(&id)
        };

        let Some(_session) = removed else {
            return;
        };

        self.events.detach_session(id).await;
        self.ids.lock().await.retire(id);

        self.events
            .publish(Event::new("session.closed", json!({ "session_id": id })))
            .await;
        debug!(session = id, "session closed");
    }

    /// The session's authorization level at this instant.
    pub async fn auth_level(&self, id: SessionId) -> Option<AuthLevel> {
        self.sessions.read().await.get(&id).map(Session::level)
    }

    /// The session's lifecycle state, `Closed` if it no longer exists.
    pub async fn state(&self, id: SessionId) -> SessionState {
        self.sessions
            .read()
            .await
            .get(&id)
            .map(Session::state)
            .unwrap_or(SessionState::Closed)
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Account;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn manager_with(grace: Duration) -> SessionManager {
        let auth = AuthStore::from_accounts([
            (
                "alice".to_string(),
                Account {
                    password: "hunter2".to_string(),
                    level: AuthLevel::Admin,
                },
            ),
            (
                "watcher".to_string(),
                Account {
                    password: "lookonly".to_string(),
                    level: AuthLevel::ReadOnly,
                },
            ),
        ]);
        SessionManager::new(auth, Arc::new(EventManager::new()), grace)
    }

    fn manager() -> SessionManager {
        manager_with(Duration::from_secs(60))
    }

    async fn open(manager: &SessionManager) -> (SessionId, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(8);
        let id = manager.open(peer(), tx).await;
        (id, rx)
    }

    #[tokio::test]
    async fn open_assigns_unique_ids() {
        let manager = manager();
        let (id1, _rx1) = open(&manager).await;
        let (id2, _rx2) = open(&manager).await;

        assert_ne!(id1, id2);
        assert_eq!(manager.session_count().await, 2);
    }

    #[tokio::test]
    async fn lifecycle_advances_through_states() {
        let manager = manager();
        let (id, _rx) = open(&manager).await;
        assert_eq!(manager.state(id).await, SessionState::Connecting);

        manager.handshake_complete(id).await.unwrap();
        assert_eq!(manager.state(id).await, SessionState::Authenticating);

        let level = manager.authenticate(id, "alice", "hunter2").await.unwrap();
        assert_eq!(level, AuthLevel::Admin);
        assert_eq!(manager.state(id).await, SessionState::Authenticated);
        assert_eq!(manager.auth_level(id).await, Some(AuthLevel::Admin));
    }

    #[tokio::test]
    async fn handshake_complete_twice_is_invalid() {
        let manager = manager();
        let (id, _rx) = open(&manager).await;
        manager.handshake_complete(id).await.unwrap();

        assert!(matches!(
            manager.handshake_complete(id).await,
            Err(SessionError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn failed_authentication_leaves_level_none() {
        let manager = manager();
        let (id, _rx) = open(&manager).await;
        manager.handshake_complete(id).await.unwrap();

        let result = manager.authenticate(id, "alice", "wrong").await;
        assert!(result.is_err());
        assert_eq!(manager.auth_level(id).await, Some(AuthLevel::None));
        assert_eq!(manager.state(id).await, SessionState::Authenticating);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let manager = manager();
        let (id, _rx) = open(&manager).await;

        manager.close(id).await;
        manager.close(id).await;

        assert_eq!(manager.session_count().await, 0);
        assert_eq!(manager.state(id).await, SessionState::Closed);
    }

    #[tokio::test]
    async fn close_does_not_disturb_other_sessions() {
        let manager = manager();
        let (id1, _rx1) = open(&manager).await;
        let (id2, _rx2) = open(&manager).await;
        manager.handshake_complete(id2).await.unwrap();
        manager.authenticate(id2, "watcher", "lookonly").await.unwrap();

        manager.close(id1).await;

        assert_eq!(manager.state(id2).await, SessionState::Authenticated);
        assert_eq!(manager.auth_level(id2).await, Some(AuthLevel::ReadOnly));
    }

    #[tokio::test]
    async fn id_not_reused_within_grace_period() {
        let manager = manager_with(Duration::from_secs(3600));
        let (id1, _rx1) = open(&manager).await;
        manager.close(id1).await;

        let (id2, _rx2) = open(&manager).await;
        assert_ne!(id1, id2);
    }

    #[tokio::test]
    async fn id_reused_after_grace_elapses() {
        let manager = manager_with(Duration::ZERO);
        let (id1, _rx1) = open(&manager).await;
        manager.close(id1).await;

        let (id2, _rx2) = open(&manager).await;
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn unknown_session_has_no_level() {
        let manager = manager();
        assert_eq!(manager.auth_level(99).await, None);
    }
}
