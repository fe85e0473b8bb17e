//! haul-core - daemon core for haul
//!
//! The request dispatch, session, event, and plugin-lifecycle subsystem:
//! everything between the wire transport and the transfer engine. The
//! transport lives in `haul-daemon`; the engine is an external collaborator
//! behind the [`engine::JobEngine`] seam.

pub mod auth;
pub mod engine;
pub mod error;
pub mod events;
pub mod ops;
pub mod plugins;
pub mod rpc;
pub mod session;

pub use auth::{AuthLevel, AuthStore};
pub use engine::{EngineCommand, JobEngine, JobStatusChange, MockEngine, StatusKind};
pub use error::{AuthError, DispatchError, EngineError, HaulError, SessionError};
pub use events::EventManager;
pub use plugins::{PluginHost, PluginHostError, PluginRegistry};
pub use rpc::Dispatcher;
pub use session::{Session, SessionId, SessionManager, SessionState};
