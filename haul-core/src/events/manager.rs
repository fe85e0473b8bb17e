//! EventManager - publish/subscribe fan-out to sessions and plugin handlers
//!
//! Delivery to sessions is best-effort: a full outbound queue drops the
//! event for that subscriber only (drop-newest), and a closed session is
//! skipped. The publisher never blocks on a slow subscriber.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;

use tokio::sync::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error};

use haul_proto::{Event, Message};
use haul_plugin_api::EventCallback;

use crate::error::SessionError;
use crate::session::SessionId;

struct Subscriber {
    sender: mpsc::Sender<Message>,
    filters: HashSet<String>,
}

struct HandlerEntry {
    event_name: String,
    owner: String,
    callback: EventCallback,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, Subscriber>,
    handlers: Vec<HandlerEntry>,
}

/// Fan-out path from internal state changes to interested sessions and
/// plugin event handlers.
#[derive(Default)]
pub struct EventManager {
    inner: RwLock<Inner>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire a session's outbound queue into the fan-out table. The session
    /// starts with an empty filter set and receives nothing until it
    /// subscribes.
    pub async fn attach_session(&self, id: SessionId, sender: mpsc::Sender<Message>) {
        let mut inner = self.inner.write().await;
        inner.sessions.insert(
            id,
            Subscriber {
                sender,
                filters: HashSet::new(),
            },
        );
    }

    /// Remove a session from the fan-out table. Idempotent.
    pub async fn detach_session(&self, id: SessionId) {
        let mut inner = self.inner.write().await;
        inner.sessions.remove(&id);
    }

    /// Add an event name to a session's filter set.
    pub async fn subscribe(&self, id: SessionId, name: &str) -> Result<(), SessionError> {
        let mut inner = self.inner.write().await;
        let subscriber = inner.sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        subscriber.filters.insert(name.to_string());
        Ok(())
    }

    /// Remove an event name from a session's filter set.
    pub async fn unsubscribe(&self, id: SessionId, name: &str) -> Result<(), SessionError> {
        let mut inner = self.inner.write().await;
        let subscriber = inner.sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        subscriber.filters.remove(name);
        Ok(())
    }

    /// Deliver an event to every matching subscriber and plugin handler.
    ///
    /// Session delivery happens under the read lock (`try_send` never
    /// blocks); plugin callbacks run after the lock is released, each with
    /// panic isolation so one bad handler cannot take down the publisher.
    pub async fn publish(&self, event: Event) {
        let callbacks: Vec<EventCallback> = {
            let inner = self.inner.read().await;

            for (id, subscriber) in &inner.sessions {
                if !subscriber.filters.contains(&event.name) {
                    continue;
                }
                match subscriber.sender.try_send(Message::Event(event.clone())) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        debug!(session = id, event = %event.name, "outbound queue full, dropping event");
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!(session = id, event = %event.name, "session gone, skipping event");
                    }
                }
            }

            inner
                .handlers
                .iter()
                .filter(|entry| entry.event_name == event.name)
                .map(|entry| entry.callback.clone())
                .collect()
        };

        for callback in callbacks {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| callback(&event)));
            if result.is_err() {
                error!(event = %event.name, "event handler panicked");
            }
        }
    }

    /// Register a plugin event handler under an owner tag.
    pub async fn register_handler(
        &self,
        owner: impl Into<String>,
        event_name: impl Into<String>,
        callback: EventCallback,
    ) {
        let mut inner = self.inner.write().await;
        inner.handlers.push(HandlerEntry {
            event_name: event_name.into(),
            owner: owner.into(),
            callback,
        });
    }

    /// Remove every event handler registered under the tag. No-op if none.
    pub async fn remove_handlers(&self, owner: &str) {
        let mut inner = self.inner.write().await;
        inner.handlers.retain(|entry| entry.owner != owner);
    }

    /// (owner, event name) pairs of all registered plugin handlers.
    pub async fn handler_entries(&self) -> Vec<(String, String)> {
        self.inner
            .read()
            .await
            .handlers
            .iter()
            .map(|entry| (entry.owner.clone(), entry.event_name.clone()))
            .collect()
    }

    /// Number of attached sessions.
    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}
