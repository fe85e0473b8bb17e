//! PluginContext - the registration surface handed to `Plugin::enable`
//!
//! Registrations are collected as pending specs while `enable` runs and
//! committed by the host only after it returns successfully. A failed
//! `enable` therefore leaves nothing behind to roll back beyond what the
//! host itself committed.

use std::sync::Arc;

use haul_proto::Event;

use crate::auth::AuthLevel;
use crate::handler::Handler;

/// Callback invoked by the event manager for matching events.
pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;

/// A pending operation registration.
pub struct OperationSpec {
    pub name: String,
    pub min_level: AuthLevel,
    pub handler: Arc<dyn Handler>,
}

/// A pending event-handler registration.
pub struct EventHandlerSpec {
    pub event_name: String,
    pub callback: EventCallback,
}

/// Plugin's interface to the daemon during `enable`.
pub struct PluginContext {
    plugin_name: String,
    pending_operations: Vec<OperationSpec>,
    pending_event_handlers: Vec<EventHandlerSpec>,
}

impl PluginContext {
    /// Create a new plugin context
    pub fn new(plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            pending_operations: Vec::new(),
            pending_event_handlers: Vec::new(),
        }
    }

    /// The name this plugin's registrations will be tagged with.
    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// Register a callable operation. The minimum authorization level is
    /// required here - an operation without one cannot exist.
    pub fn register_operation(
        &mut self,
        name: impl Into<String>,
        min_level: AuthLevel,
        handler: Arc<dyn Handler>,
    ) {
        self.pending_operations.push(OperationSpec {
            name: name.into(),
            min_level,
            handler,
        });
    }

    /// Subscribe a callback to every published event with this name.
    pub fn subscribe_event(&mut self, event_name: impl Into<String>, callback: EventCallback) {
        self.pending_event_handlers.push(EventHandlerSpec {
            event_name: event_name.into(),
            callback,
        });
    }

    /// Log at info level with the plugin's name attached.
    pub fn log_info(&self, message: &str) {
        tracing::info!(plugin = %self.plugin_name, "{message}");
    }

    /// Log at debug level with the plugin's name attached.
    pub fn log_debug(&self, message: &str) {
        tracing::debug!(plugin = %self.plugin_name, "{message}");
    }

    /// Log at warn level with the plugin's name attached.
    pub fn log_warn(&self, message: &str) {
        tracing::warn!(plugin = %self.plugin_name, "{message}");
    }

    /// Pending operation registrations (host side).
    pub fn pending_operations(&self) -> &[OperationSpec] {
        &self.pending_operations
    }

    /// Drain pending operation registrations for commit (host side).
    pub fn take_pending_operations(&mut self) -> Vec<OperationSpec> {
        std::mem::take(&mut self.pending_operations)
    }

    /// Drain pending event-handler registrations for commit (host side).
    pub fn take_pending_event_handlers(&mut self) -> Vec<EventHandlerSpec> {
        std::mem::take(&mut self.pending_event_handlers)
    }
}
