//! Configuration System
//!
//! Layered configuration for stores, the sync loops and logging. Sources, lowest
//! precedence first: built-in defaults, the global file, the workspace files, then
//! `KEYTREE_*` environment variables.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::store::{JsonFileStore, MemoryTreeStore, SledTreeStore, TreeStore};
use crate::sync::{AutoSaveOptions, AutoUpdateOptions};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeytreeConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub auto_save: AutoSaveConfig,

    #[serde(default)]
    pub auto_update: AutoUpdateConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which store backs persisted trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Json,
    Sled,
    Memory,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreBackend::Json => "json",
            StoreBackend::Sled => "sled",
            StoreBackend::Memory => "memory",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// Directory (json) or database path (sled), relative to the workspace root
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Handle used when a command does not name one
    #[serde(default = "default_handle")]
    pub handle: String,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Json
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".keytree/store")
}

fn default_handle() -> String {
    "default".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_store_path(),
            handle: default_handle(),
        }
    }
}

impl StoreConfig {
    /// Open the configured store. Relative paths resolve against `workspace_root`.
    pub fn open(&self, workspace_root: &Path) -> Result<Arc<dyn TreeStore>, ApiError> {
        let path = if self.path.is_absolute() {
            self.path.clone()
        } else {
            workspace_root.join(&self.path)
        };
        let store: Arc<dyn TreeStore> = match self.backend {
            StoreBackend::Json => Arc::new(JsonFileStore::new(path)?),
            StoreBackend::Sled => Arc::new(SledTreeStore::new(path)?),
            StoreBackend::Memory => Arc::new(MemoryTreeStore::new()),
        };
        Ok(store)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoSaveConfig {
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    #[serde(default)]
    pub filter_enabled: bool,

    #[serde(default)]
    pub filters: Vec<String>,
}

fn default_delay_ms() -> u64 {
    500
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            filter_enabled: false,
            filters: Vec::new(),
        }
    }
}

impl AutoSaveConfig {
    pub fn options(&self) -> AutoSaveOptions {
        AutoSaveOptions::from(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoUpdateConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default)]
    pub can_add: bool,

    #[serde(default)]
    pub can_remove: bool,
}

fn default_interval_ms() -> u64 {
    1000
}

impl Default for AutoUpdateConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            can_add: false,
            can_remove: false,
        }
    }
}

impl AutoUpdateConfig {
    pub fn options(&self) -> AutoUpdateOptions {
        AutoUpdateOptions::from(self)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Store(String),
    AutoSave(String),
    AutoUpdate(String),
    Logging(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Store(msg) => write!(f, "Store: {}", msg),
            ValidationError::AutoSave(msg) => write!(f, "Auto-save: {}", msg),
            ValidationError::AutoUpdate(msg) => write!(f, "Auto-update: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl KeytreeConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.store.backend != StoreBackend::Memory && self.store.path.as_os_str().is_empty() {
            errors.push(ValidationError::Store("Store path cannot be empty".to_string()));
        }
        if let Err(e) = crate::store::validate_handle(&self.store.handle) {
            errors.push(ValidationError::Store(e.to_string()));
        }

        if self.auto_save.delay_ms == 0 {
            errors.push(ValidationError::AutoSave(
                "delay_ms must be greater than zero".to_string(),
            ));
        }
        if self.auto_save.filters.iter().any(|f| f.trim().is_empty()) {
            errors.push(ValidationError::AutoSave(
                "filters cannot contain blank paths".to_string(),
            ));
        }

        if self.auto_update.interval_ms == 0 {
            errors.push(ValidationError::AutoUpdate(
                "interval_ms must be greater than zero".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            errors.push(ValidationError::Logging(format!(
                "Invalid log format: {}",
                self.logging.format
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// `validate` folded into a single `ApiError`
    pub fn ensure_valid(&self) -> Result<(), ApiError> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })
    }
}

/// Builds a [`KeytreeConfig`] from all configuration sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then the global file, then `config/config.toml` and
    /// `config/{KEYTREE_ENV}.toml` under `workspace_root`, then the environment.
    pub fn load(workspace_root: &Path) -> Result<KeytreeConfig, ApiError> {
        let builder = merge::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = sources::add_environment(builder);
        let config: KeytreeConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Load a single TOML file on top of the defaults
    pub fn load_from_file(path: &Path) -> Result<KeytreeConfig, ApiError> {
        let config: KeytreeConfig = merge::builder_with_defaults()?
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Path of the global configuration file, when one can be determined
    pub fn xdg_config_path() -> Option<PathBuf> {
        global_config_path()
    }
}
