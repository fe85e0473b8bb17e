//! PluginHost - loads and unloads extension code at runtime
//!
//! Loading resolves a dynamic library, checks the API version, and runs the
//! plugin's `enable` entry point. Registrations collected during `enable`
//! are committed afterwards, tagged with the plugin's name; if anything in
//! the sequence fails, the commit is rolled back so the operation registry
//! and event-handler tables are exactly what they were before the attempt.
//!
//! Load and unload hold the host lock for their whole critical section, so
//! plugin lifecycle transitions are mutually exclusive with each other.
//! They are NOT exclusive with dispatch - the dispatcher's own registry
//! lock guarantees a concurrent call sees each operation fully present or
//! fully absent.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use haul_plugin_api::{API_VERSION, Plugin, PluginContext, PluginManifest};

use crate::events::EventManager;
use crate::rpc::Dispatcher;

use super::error::PluginHostError;
use super::registry::PluginRegistry;

/// A loaded plugin with its runtime state.
///
/// Field order matters: the instance must drop before the library that
/// contains its code.
struct LoadedPlugin {
    manifest: PluginManifest,
    instance: Box<dyn Plugin>,
    _library: Option<Library>,
}

/// Manages plugin lifecycle and the registrations plugins own.
pub struct PluginHost {
    plugins: Mutex<HashMap<String, LoadedPlugin>>,
    plugin_dir: PathBuf,
    registry_path: PathBuf,
    dispatcher: Arc<Dispatcher>,
    events: Arc<EventManager>,
}

impl PluginHost {
    /// Create a host searching `plugin_dir` for plugin subdirectories.
    pub fn new(plugin_dir: PathBuf, dispatcher: Arc<Dispatcher>, events: Arc<EventManager>) -> Self {
        let registry_path = plugin_dir.join("registry.toml");
        Self {
            plugins: Mutex::new(HashMap::new()),
            plugin_dir,
            registry_path,
            dispatcher,
            events,
        }
    }

    /// Load a plugin from its dynamic library and enable it.
    pub async fn load(&self, name: &str) -> Result<PluginManifest, PluginHostError> {
        let mut plugins = self.plugins.lock().await;
        if plugins.contains_key(name) {
            return Err(PluginHostError::AlreadyLoaded {
                name: name.to_string(),
            });
        }

        let lib_path = self.find_library(name)?;

        // SAFETY: loading a library the operator placed in the plugin
        // directory and explicitly asked for; it must export the C ABI
        // entry points generated by `export_plugin!`.
        let library = unsafe { Library::new(&lib_path)? };

        // SAFETY: `_haul_plugin_api_version` is exported by `export_plugin!`.
        let api_version_fn: libloading::Symbol<extern "C" fn() -> u32> =
            unsafe { library.get(b"_haul_plugin_api_version")? };
        let found = api_version_fn();
        if found != API_VERSION {
            return Err(PluginHostError::ApiVersionMismatch {
                expected: API_VERSION,
                found,
            });
        }

        // SAFETY: `_haul_plugin_create` returns a raw pointer produced by
        // `Box::into_raw` on a `Box<dyn Plugin>`.
        let create_fn: libloading::Symbol<extern "C" fn() -> *mut dyn Plugin> =
            unsafe { library.get(b"_haul_plugin_create")? };
        let instance = unsafe { Box::from_raw(create_fn()) };

        let manifest = self
            .activate(&mut plugins, instance, Some(library))
            .await?;
        info!(plugin = %manifest.name, version = %manifest.version, "plugin loaded");
        Ok(manifest)
    }

    /// Enable an in-process plugin instance.
    ///
    /// Same lifecycle as [`PluginHost::load`] without the dynamic library;
    /// used for statically linked plugins and in tests.
    pub async fn install(&self, instance: Box<dyn Plugin>) -> Result<PluginManifest, PluginHostError> {
        let mut plugins = self.plugins.lock().await;
        let name = instance.manifest().name;
        if plugins.contains_key(&name) {
            return Err(PluginHostError::AlreadyLoaded { name });
        }
        self.activate(&mut plugins, instance, None).await
    }

    /// Run `enable`, commit its registrations, and record the plugin.
    /// Rolls back everything committed under the plugin's tag on failure.
    async fn activate(
        &self,
        plugins: &mut HashMap<String, LoadedPlugin>,
        mut instance: Box<dyn Plugin>,
        library: Option<Library>,
    ) -> Result<PluginManifest, PluginHostError> {
        let manifest = instance.manifest();
        let name = manifest.name.clone();
        let mut ctx = PluginContext::new(name.clone());

        let enabled = std::panic::catch_unwind(AssertUnwindSafe(|| instance.enable(&mut ctx)));
        match enabled {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(PluginHostError::EnableFailed {
                    name,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(PluginHostError::EnableFailed {
                    name,
                    reason: "enable panicked".to_string(),
                });
            }
        }

        for spec in ctx.take_pending_operations() {
            let operation = spec.name.clone();
            let registered = self
                .dispatcher
                .register(spec.name, spec.min_level, spec.handler, Some(name.clone()))
                .await;
            if registered.is_err() {
                // Undo what this attempt already committed; earlier owners
                // are untouched because removal is keyed by tag.
                self.dispatcher.unregister_all(&name).await;
                self.events.remove_handlers(&name).await;
                return Err(PluginHostError::DuplicateOperation { name, operation });
            }
        }

        for spec in ctx.take_pending_event_handlers() {
            self.events
                .register_handler(name.clone(), spec.event_name, spec.callback)
                .await;
        }

        plugins.insert(
            name,
            LoadedPlugin {
                manifest: manifest.clone(),
                instance,
                _library: library,
            },
        );
        Ok(manifest)
    }

    /// Disable a plugin and remove everything it registered.
    ///
    /// `disable` is best-effort: a failure or panic there is logged and
    /// removal proceeds regardless.
    pub async fn unload(&self, name: &str) -> Result<(), PluginHostError> {
        let mut plugins = self.plugins.lock().await;
        let Some(mut plugin) = plugins.remove(name) else {
            return Err(PluginHostError::NotLoaded {
                name: name.to_string(),
            });
        };

        let disabled =
            std::panic::catch_unwind(AssertUnwindSafe(|| plugin.instance.disable()));
        match disabled {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(plugin = %name, error = %e, "plugin disable returned error"),
            Err(_) => error!(plugin = %name, "plugin panicked in disable"),
        }

        self.dispatcher.unregister_all(name).await;
        self.events.remove_handlers(name).await;

        info!(plugin = %name, "plugin unloaded");
        Ok(())
    }

    /// Enable in the persistent registry and load now.
    pub async fn enable_plugin(&self, name: &str) -> Result<PluginManifest, PluginHostError> {
        let mut registry = PluginRegistry::load(&self.registry_path)?;
        registry.enable(name);
        registry.save(&self.registry_path)?;
        self.load(name).await
    }

    /// Disable in the persistent registry and unload if loaded.
    pub async fn disable_plugin(&self, name: &str) -> Result<(), PluginHostError> {
        let mut registry = PluginRegistry::load(&self.registry_path)?;
        registry.disable(name);
        registry.save(&self.registry_path)?;

        match self.unload(name).await {
            Ok(()) | Err(PluginHostError::NotLoaded { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Load every plugin the registry lists as enabled. Individual
    /// failures are logged and skipped; the daemon still comes up.
    pub async fn load_enabled(&self) -> Result<(), PluginHostError> {
        let registry = PluginRegistry::load(&self.registry_path)?;
        for name in registry.enabled_plugins() {
            if let Err(e) = self.load(name).await {
                error!(plugin = %name, error = %e, "failed to load plugin");
            }
        }
        Ok(())
    }

    /// Manifests of all loaded plugins, sorted by name.
    pub async fn list(&self) -> Vec<PluginManifest> {
        let plugins = self.plugins.lock().await;
        let mut manifests: Vec<PluginManifest> =
            plugins.values().map(|p| p.manifest.clone()).collect();
        manifests.sort_by(|a, b| a.name.cmp(&b.name));
        manifests
    }

    /// Manifest of one loaded plugin, `None` if it isn't loaded.
    pub async fn info(&self, name: &str) -> Option<PluginManifest> {
        self.plugins
            .lock()
            .await
            .get(name)
            .map(|plugin| plugin.manifest.clone())
    }

    /// Whether a plugin is currently loaded.
    pub async fn is_loaded(&self, name: &str) -> bool {
        self.plugins.lock().await.contains_key(name)
    }

    /// Find the plugin's library under `<plugin_dir>/<name>/`.
    fn find_library(&self, name: &str) -> Result<PathBuf, PluginHostError> {
        let dir = self.plugin_dir.join(name);
        let extensions: &[&str] = if cfg!(target_os = "macos") {
            &["dylib", "so"]
        } else if cfg!(target_os = "windows") {
            &["dll"]
        } else {
            &["so"]
        };

        for ext in extensions {
            for file_name in [format!("{name}.{ext}"), format!("lib{name}.{ext}")] {
                let candidate = dir.join(&file_name);
                if candidate.exists() {
                    return Ok(candidate);
                }
            }
        }

        Err(PluginHostError::LibraryNotFound { dir })
    }
}
