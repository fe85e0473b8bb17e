//! Persistent record of which plugins are enabled
//!
//! Stored as TOML under the plugin directory so enable/disable survive a
//! daemon restart. Only names live here; everything else about a plugin
//! comes from its own manifest at load time.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::PluginHostError;

/// The set of plugin names to load at startup.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PluginRegistry {
    #[serde(default)]
    enabled: BTreeSet<String>,
}

impl PluginRegistry {
    /// Load the registry, or an empty one if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, PluginHostError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PluginHostError::Registry(e.to_string()))
    }

    /// Write the registry, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), PluginHostError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| PluginHostError::Registry(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    pub fn enable(&mut self, name: &str) {
        self.enabled.insert(name.to_string());
    }

    pub fn disable(&mut self, name: &str) {
        self.enabled.remove(name);
    }

    /// Enabled plugin names in sorted order.
    pub fn enabled_plugins(&self) -> impl Iterator<Item = &str> {
        self.enabled.iter().map(String::as_str)
    }
}
