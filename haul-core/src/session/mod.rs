//! Client sessions
//!
//! One [`Session`] per live connection, owned exclusively by the
//! [`SessionManager`]. Other components refer to sessions by id or hold a
//! clone of the outbound queue sender, never the session itself.

mod manager;
mod state;

pub use manager::SessionManager;
pub use state::{Session, SessionState};

/// Unique per connection while the session is live. Retired ids become
/// reusable only after the configured grace period.
pub type SessionId = u64;
