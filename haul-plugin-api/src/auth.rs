//! Authorization levels
//!
//! A total order of permission tiers. Every registered operation declares
//! the minimum level required to invoke it; a session starts at `None` and
//! gains a level only through authentication.

use serde::{Deserialize, Serialize};

/// Ordered authorization tiers. Derived `Ord` follows declaration order,
/// so `None < ReadOnly < Normal < Admin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum AuthLevel {
    /// Unauthenticated
    #[default]
    None,
    /// May query state, never mutate it
    ReadOnly,
    /// May manage its own jobs
    Normal,
    /// Full control, including daemon and plugin management
    Admin,
}

impl std::fmt::Display for AuthLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuthLevel::None => "none",
            AuthLevel::ReadOnly => "read_only",
            AuthLevel::Normal => "normal",
            AuthLevel::Admin => "admin",
        };
        f.write_str(name)
    }
}
