//! Credentials store and authorization levels
//!
//! Accounts live in a TOML file mapping username to password and level.
//! A missing file yields an empty store, which rejects every credential -
//! the daemon denies by default rather than failing open.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use haul_plugin_api::AuthLevel;

use crate::error::AuthError;

/// One account entry in the auth file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub password: String,
    pub level: AuthLevel,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AuthFile {
    #[serde(default)]
    accounts: HashMap<String, Account>,
}

/// Credentials store loaded from the daemon's auth file.
#[derive(Debug, Default)]
pub struct AuthStore {
    accounts: HashMap<String, Account>,
}

impl AuthStore {
    /// Load the store from a TOML file.
    ///
    /// Returns an empty store (rejecting everything) if the file doesn't
    /// exist.
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| AuthError::Store(e.to_string()))?;
        let file: AuthFile =
            toml::from_str(&content).map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(Self {
            accounts: file.accounts,
        })
    }

    /// Build a store from in-memory accounts.
    pub fn from_accounts(accounts: impl IntoIterator<Item = (String, Account)>) -> Self {
        Self {
            accounts: accounts.into_iter().collect(),
        }
    }

    /// Check credentials, returning the account's level on success.
    pub fn verify(&self, username: &str, password: &str) -> Result<AuthLevel, AuthError> {
        match self.accounts.get(username) {
            Some(account) if account.password == password => Ok(account.level),
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    /// Number of known accounts.
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}
