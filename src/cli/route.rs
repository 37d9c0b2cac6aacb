//! CLI route: single route table and run context. Dispatches to the store and tree services
//! and to output formatting.

use crate::config::{ConfigLoader, KeytreeConfig};
use crate::error::{ApiError, StorageError, TreeError};
use crate::snapshot::Snapshot;
use crate::store::TreeStore;
use crate::sync::{AutoUpdate, AutoUpdateOptions, SyncOutcome, SyncSignal};
use crate::tree::path;
use crate::tree::{Container, Node};
use crate::value::ValueKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::cli::output::{
    format_change_event, format_diff_json, format_diff_text, format_snapshot_json,
    format_snapshot_text,
};
use crate::cli::parse::Commands;

/// Runtime context for CLI execution: workspace, loaded configuration and the opened store.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    workspace_root: PathBuf,
    config: KeytreeConfig,
    store: Arc<dyn TreeStore>,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        config.ensure_valid()?;

        let store = config.store.open(&workspace_root)?;
        info!(
            backend = %config.store.backend,
            workspace = %workspace_root.display(),
            "Opened tree store"
        );

        Ok(Self {
            workspace_root,
            config,
            store,
        })
    }

    /// Context over an already opened store
    pub fn with_store(
        workspace_root: PathBuf,
        config: KeytreeConfig,
        store: Arc<dyn TreeStore>,
    ) -> Self {
        Self {
            workspace_root,
            config,
            store,
        }
    }

    pub fn workspace_root(&self) -> &PathBuf {
        &self.workspace_root
    }

    pub fn config(&self) -> &KeytreeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TreeStore> {
        &self.store
    }

    /// Execute a command and return the text to print
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        let result = match command {
            Commands::Config => self.handle_config(),
            Commands::List => self.handle_list(),
            Commands::Show { handle, format } => self.handle_show(handle.as_deref(), format),
            Commands::Get { path, handle } => self.handle_get(path, handle.as_deref()),
            Commands::Set {
                path,
                value,
                kind,
                handle,
            } => self.handle_set(path, value, kind.as_deref(), handle.as_deref()),
            Commands::Diff {
                left,
                right,
                format,
            } => self.handle_diff(left, right, format),
            Commands::Watch {
                handle,
                interval_ms,
            } => self.handle_watch(handle.as_deref(), *interval_ms),
        };
        info!(
            duration_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Command finished"
        );
        result
    }

    fn handle_for<'a>(&'a self, handle: Option<&'a str>) -> &'a str {
        handle.unwrap_or(&self.config.store.handle)
    }

    fn handle_config(&self) -> Result<String, ApiError> {
        toml::to_string_pretty(&self.config)
            .map_err(|e| ApiError::ConfigError(format!("Failed to render configuration: {}", e)))
    }

    fn handle_list(&self) -> Result<String, ApiError> {
        let mut handles = self.store.handles()?;
        if handles.is_empty() {
            return Ok("No persisted trees.".to_string());
        }
        handles.sort();
        Ok(handles.join("\n"))
    }

    fn handle_show(&self, handle: Option<&str>, format: &str) -> Result<String, ApiError> {
        let handle = self.handle_for(handle);
        let snapshot = self.store.load_snapshot(handle)?;
        match format {
            "json" => format_snapshot_json(&snapshot),
            "text" => Ok(format_snapshot_text(handle, &snapshot)),
            other => Err(invalid_format(other)),
        }
    }

    fn handle_get(&self, leaf_path: &str, handle: Option<&str>) -> Result<String, ApiError> {
        let snapshot = self.store.load_snapshot(self.handle_for(handle))?;
        match snapshot.get(leaf_path) {
            Some(value) => Ok(value.to_string()),
            None => Err(ApiError::TreeError(TreeError::PathResolution {
                path: leaf_path.to_string(),
                segment: path::split_last(leaf_path).1.to_string(),
            })),
        }
    }

    fn handle_set(
        &self,
        leaf_path: &str,
        text: &str,
        kind: Option<&str>,
        handle: Option<&str>,
    ) -> Result<String, ApiError> {
        let handle = self.handle_for(handle);
        let tree = if self.store.exists(handle)? {
            self.store.load(handle)?
        } else {
            Container::new(handle)
        };

        let kind = match (tree.value_at(leaf_path), kind) {
            (Some(existing), _) => existing.kind(),
            (None, Some(name)) => name
                .parse::<ValueKind>()
                .map_err(|e| ApiError::TreeError(TreeError::Mapping(e)))?,
            (None, None) => ValueKind::String,
        };
        let value = kind.parse_value(text).ok_or_else(|| {
            ApiError::TreeError(TreeError::Mapping(format!(
                "Cannot read {:?} as a {} value",
                text, kind
            )))
        })?;

        ensure_parents(&tree, leaf_path)?;
        if !tree.put_value(leaf_path, value.clone()) {
            return Err(ApiError::TreeError(rejected_write(&tree, leaf_path)));
        }
        self.store.save(handle, &Snapshot::capture(&tree))?;
        info!(handle, path = leaf_path, %kind, "Saved value");
        Ok(format!("{} = {}", leaf_path, value))
    }

    fn handle_diff(&self, left: &str, right: &str, format: &str) -> Result<String, ApiError> {
        let left_snapshot = self.store.load_snapshot(left)?;
        let right_snapshot = self.store.load_snapshot(right)?;
        let diff = left_snapshot.diff(&right_snapshot);
        match format {
            "json" => format_diff_json(&diff),
            "text" => Ok(format_diff_text(left, right, &diff)),
            other => Err(invalid_format(other)),
        }
    }

    fn handle_watch(&self, handle: Option<&str>, interval_ms: Option<u64>) -> Result<String, ApiError> {
        let handle = self.handle_for(handle).to_string();
        let mut options = AutoUpdateOptions::from(&self.config.auto_update);
        if let Some(ms) = interval_ms {
            options.interval = Duration::from_millis(ms);
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::StorageError(StorageError::IoError(e)))?;

        let store = Arc::clone(&self.store);
        runtime.block_on(async move {
            let tree = if store.exists(&handle)? {
                store.load(&handle)?
            } else {
                Container::new(handle.as_str())
            };
            let (subscription, mut events) = tree.subscribe_channel();
            let updater = AutoUpdate::new(tree.clone(), Arc::clone(&store), handle.clone(), options);
            let mut signals = updater.signals();
            updater.start()?;
            info!(handle = %handle, interval_ms = updater.interval().as_millis() as u64, "Watching tree");

            let mut changes = 0usize;
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    Some(event) = events.recv() => {
                        changes += 1;
                        println!("{}", format_change_event(&event));
                    }
                    Ok(signal) = signals.recv() => {
                        if let SyncSignal::Finished(SyncOutcome::Failed(message)) = signal {
                            warn!(handle = %handle, error = %message, "Update poll failed");
                        }
                    }
                }
            }

            updater.stop().await?;
            tree.unsubscribe(subscription);
            Ok::<_, ApiError>(format!(
                "Stopped watching {} after {} change(s)",
                handle, changes
            ))
        })
    }
}

/// Create the containers above `leaf_path` that do not exist yet
fn ensure_parents(tree: &Container, leaf_path: &str) -> Result<(), TreeError> {
    let Some(parent) = path::split_last(leaf_path).0 else {
        return Ok(());
    };
    let mut current = tree.clone();
    for segment in path::segments(parent) {
        current = match current.find(segment) {
            Some(Node::Container(next)) => next,
            Some(Node::Leaf(_)) => {
                return Err(TreeError::StructuralMismatch {
                    path: leaf_path.to_string(),
                })
            }
            None => current.add_container(segment)?,
        };
    }
    Ok(())
}

/// Why `put_value` refused to write `leaf_path`
fn rejected_write(tree: &Container, leaf_path: &str) -> TreeError {
    match tree.find_recursive(leaf_path) {
        Ok(Some(Node::Leaf(_))) => TreeError::OutOfBounds {
            name: leaf_path.to_string(),
        },
        Ok(None) => match path::validate_name(path::split_last(leaf_path).1) {
            Err(invalid) => invalid,
            Ok(()) => TreeError::StructuralMismatch {
                path: leaf_path.to_string(),
            },
        },
        Ok(Some(Node::Container(_))) | Err(_) => TreeError::StructuralMismatch {
            path: leaf_path.to_string(),
        },
    }
}

fn invalid_format(format: &str) -> ApiError {
    ApiError::ConfigError(format!(
        "Invalid output format: {} (must be 'text' or 'json')",
        format
    ))
}
