//! File-backed configuration with reload support.
//!
//! A [`ConfigurationStore`] loads a property file once and keeps the result as
//! an atomically swappable snapshot. The store never polls: an external
//! trigger (a timer, a signal handler, an admin endpoint) calls
//! [`ConfigurationStore::reload_if_changed`], which reloads only when the
//! file's modification time is newer than the one recorded at the last
//! successful load.
//!
//! # Reload guarantees
//!
//! - Readers holding a snapshot from [`ConfigurationStore::current`] keep it;
//!   new readers see either the old or the fully new configuration.
//! - A reloaded configuration is always validated eagerly before it is
//!   published.
//! - When a reload fails the previous configuration stays active and the
//!   recorded modification time is not advanced, so the next trigger retries.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use keel_config::{ConfigurationStore, PropertySchema};
//!
//! # fn example() -> Result<(), keel_config::ConfigError> {
//! let store = ConfigurationStore::open("/etc/keel/client.properties", Arc::new(PropertySchema::empty()))?;
//! store.on_change(|change| {
//!     println!("{} properties changed", change.changed_keys.len());
//! });
//!
//! // Later, from a timer:
//! if store.reload_if_changed()? {
//!     println!("reloaded");
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::loader::ConfigSource;
use crate::{
    ConfigError, ConfigLoader, ConfigResult, PropertySchema, ResolvedConfiguration, SystemProperties,
    ValidationMode, VariableResolver,
};

/// Callback invoked after a successful reload.
pub type ChangeListener = Arc<dyn Fn(&ConfigChange) + Send + Sync>;

/// The outcome of a successful reload.
#[derive(Debug, Clone)]
pub struct ConfigChange {
    /// Full keys that were added, removed or changed.
    pub changed_keys: Vec<String>,
    /// The newly published configuration.
    pub snapshot: Arc<ResolvedConfiguration>,
}

/// The backing file and its last observed modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBinding {
    path: PathBuf,
    last_modified: SystemTime,
}

impl FileBinding {
    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modification time recorded at the last successful load.
    pub fn last_modified(&self) -> SystemTime {
        self.last_modified
    }
}

fn modified_time(path: &Path) -> ConfigResult<SystemTime> {
    fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .map_err(|e| ConfigError::io(path, e))
}

/// Builder for [`ConfigurationStore`].
#[derive(Debug, Clone)]
#[must_use]
pub struct ConfigurationStoreBuilder {
    path: PathBuf,
    loader: ConfigLoader,
}

impl ConfigurationStoreBuilder {
    /// Use the given resolver for include paths and values.
    pub fn resolver(mut self, resolver: VariableResolver) -> Self {
        self.loader = self.loader.with_resolver(resolver);
        self
    }

    /// Resolve placeholders against the given system properties first.
    pub fn system_properties(mut self, system: SystemProperties) -> Self {
        self.loader = self.loader.with_system_properties(system);
        self
    }

    /// Validation mode of the initial load. Reloads always validate eagerly.
    pub fn validation(mut self, validation: ValidationMode) -> Self {
        self.loader = self.loader.with_validation(validation);
        self
    }

    /// Perform the initial load.
    ///
    /// # Errors
    ///
    /// Returns any error of the initial load.
    pub fn open(self) -> ConfigResult<ConfigurationStore> {
        let last_modified = modified_time(&self.path)?;
        let config = self.loader.load(ConfigSource::File(self.path.clone()))?;

        Ok(ConfigurationStore {
            loader: self.loader,
            binding: Mutex::new(FileBinding {
                path: self.path,
                last_modified,
            }),
            current: ArcSwap::from_pointee(config),
            listeners: RwLock::new(Vec::new()),
        })
    }
}

/// A file-backed, reloadable configuration.
pub struct ConfigurationStore {
    loader: ConfigLoader,
    binding: Mutex<FileBinding>,
    current: ArcSwap<ResolvedConfiguration>,
    listeners: RwLock<Vec<ChangeListener>>,
}

impl fmt::Debug for ConfigurationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationStore")
            .field("binding", &*self.binding.lock())
            .field("listeners", &self.listeners.read().len())
            .finish_non_exhaustive()
    }
}

impl ConfigurationStore {
    /// Start configuring a store for `path`.
    pub fn builder(path: impl Into<PathBuf>, schema: Arc<PropertySchema>) -> ConfigurationStoreBuilder {
        ConfigurationStoreBuilder {
            path: path.into(),
            loader: ConfigLoader::new(schema),
        }
    }

    /// Open a store with the default resolver and lazy initial validation.
    ///
    /// # Errors
    ///
    /// Returns any error of the initial load.
    pub fn open(path: impl Into<PathBuf>, schema: Arc<PropertySchema>) -> ConfigResult<Self> {
        Self::builder(path, schema).open()
    }

    /// The current configuration snapshot.
    pub fn current(&self) -> Arc<ResolvedConfiguration> {
        self.current.load_full()
    }

    /// A copy of the file binding.
    pub fn binding(&self) -> FileBinding {
        self.binding.lock().clone()
    }

    /// Register a listener called after every successful reload.
    ///
    /// Listeners run on the thread that triggered the reload, after the new
    /// snapshot is published.
    pub fn on_change<F>(&self, listener: F)
    where
        F: Fn(&ConfigChange) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Reload if the file was modified after the last successful load.
    ///
    /// Returns `true` when a new configuration was published.
    ///
    /// # Errors
    ///
    /// Returns the error of the failed reload; the previous configuration
    /// stays active.
    pub fn reload_if_changed(&self) -> ConfigResult<bool> {
        let mut binding = self.binding.lock();
        let modified = match modified_time(&binding.path) {
            Ok(modified) => modified,
            Err(err) => {
                warn!(path = %binding.path.display(), error = %err, "failed to check configuration file");
                return Err(err);
            }
        };
        if modified <= binding.last_modified {
            return Ok(false);
        }

        let change = self.reload_locked(&mut binding, modified)?;
        drop(binding);
        self.notify(&change);
        Ok(true)
    }

    /// Reload unconditionally.
    ///
    /// # Errors
    ///
    /// Returns the error of the failed reload; the previous configuration
    /// stays active.
    pub fn reload(&self) -> ConfigResult<()> {
        let mut binding = self.binding.lock();
        let modified = match modified_time(&binding.path) {
            Ok(modified) => modified,
            Err(err) => {
                warn!(path = %binding.path.display(), error = %err, "failed to check configuration file");
                return Err(err);
            }
        };

        let change = self.reload_locked(&mut binding, modified)?;
        drop(binding);
        self.notify(&change);
        Ok(())
    }

    fn reload_locked(&self, binding: &mut FileBinding, modified: SystemTime) -> ConfigResult<ConfigChange> {
        let config = match self
            .loader
            .load_with(ConfigSource::File(binding.path.clone()), ValidationMode::Eager)
        {
            Ok(config) => Arc::new(config),
            Err(err) => {
                warn!(
                    path = %binding.path.display(),
                    error = %err,
                    "reloaded configuration is invalid, keeping the previous one"
                );
                return Err(err);
            }
        };

        let previous = self.current.swap(Arc::clone(&config));
        binding.last_modified = modified;

        let changed_keys = config.changed_keys(&previous);
        for key in &changed_keys {
            let descriptor = config.descriptor_for(key).or_else(|| previous.descriptor_for(key));
            if descriptor.is_some_and(|d| !d.is_updateable()) {
                warn!(key = %key, "property changed but is not updateable, a restart is needed to apply it");
            }
        }

        info!(
            path = %binding.path.display(),
            changed = changed_keys.len(),
            "configuration reloaded"
        );

        Ok(ConfigChange {
            changed_keys,
            snapshot: config,
        })
    }

    fn notify(&self, change: &ConfigChange) {
        let listeners: Vec<ChangeListener> = self.listeners.read().clone();
        for listener in listeners {
            listener(change);
        }
    }
}
