//! Session struct and lifecycle states

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use haul_proto::Message;
use haul_plugin_api::AuthLevel;

use super::SessionId;

/// Lifecycle of a session.
///
/// `Connecting -> Authenticating -> Authenticated -> Closing -> Closed`;
/// a dropped connection moves to `Closed` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Transport accepted, protocol handshake not yet complete
    Connecting,
    /// Handshake done, waiting for credentials
    Authenticating,
    /// Credentials accepted
    Authenticated,
    /// Teardown in progress
    Closing,
    /// Gone; the id is retired
    Closed,
}

/// One live client connection.
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    state: SessionState,
    level: AuthLevel,
    outbound: mpsc::Sender<Message>,
    connected_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId, peer: SocketAddr, outbound: mpsc::Sender<Message>) -> Self {
        Self {
            id,
            peer,
            state: SessionState::Connecting,
            level: AuthLevel::None,
            outbound,
            connected_at: Utc::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(super) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// The session's authorization level. Changes only through
    /// `SessionManager::authenticate`.
    pub fn level(&self) -> AuthLevel {
        self.level
    }

    pub(super) fn set_level(&mut self, level: AuthLevel) {
        self.level = level;
    }

    /// Sender half of the session's outbound message queue.
    pub fn outbound(&self) -> mpsc::Sender<Message> {
        self.outbound.clone()
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }
}
