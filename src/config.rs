//! Configuration for hartodb
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a hartodb instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all schemas
    /// Internal structure:
    ///   {root_dir}/
    ///     └── {schema}/
    ///           ├── index.conf.{ext}           (schema marker)
    ///           ├── {table}.{ext}              (record slots)
    ///           ├── {table}.conf.{ext}         (table definition)
    ///           └── {table}.{field}.data.{ext} (ref side file)
    pub root_dir: PathBuf,

    /// Extension shared by every file the engine writes (without the dot)
    pub file_extension: String,

    /// Sync strategy: whether writes are followed by fsync
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Cleanup Configuration
    // -------------------------------------------------------------------------
    /// Start the cleanup worker on open with this interval
    pub cleanup_interval: Option<Duration>,
}

/// Write sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every data or side-file write (safest, slowest)
    EveryWrite,

    /// Leave flushing to the operating system
    OsManaged,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./hartoDB"),
            file_extension: "htdb".to_string(),
            sync_strategy: SyncStrategy::OsManaged,
            cleanup_interval: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database root directory
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.root_dir = path.into();
        self
    }

    /// Set the file extension (a leading dot is stripped)
    pub fn file_extension(mut self, ext: impl Into<String>) -> Self {
        let ext = ext.into();
        self.config.file_extension = ext.trim_start_matches('.').to_string();
        self
    }

    /// Set the write sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Start the cleanup worker on open with the given interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = Some(interval);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
