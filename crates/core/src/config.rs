//! TOML-based configuration system for ModQueue.
//!
//! Every section is optional; a file containing nothing at all yields a
//! working configuration with the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Entry store location and logging.
    #[serde(default)]
    pub store: StoreConfig,

    /// Group names that grant moderation capabilities.
    #[serde(default)]
    pub permissions: PermissionsConfig,

    /// Folder listing settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Action engine behaviour.
    #[serde(default)]
    pub engine: EngineConfig,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Entry store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding `modqueue.db`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/modqueue")
}
fn default_log_level() -> String {
    "warn".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

impl StoreConfig {
    /// Path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("modqueue.db")
    }
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// Which groups grant which capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsConfig {
    /// Members of any of these groups may approve, reject, merge and block.
    #[serde(default = "default_review_groups")]
    pub review_groups: Vec<String>,

    /// Members of any of these groups have their edits applied directly.
    #[serde(default = "default_bypass_groups")]
    pub bypass_groups: Vec<String>,

    /// Optional TOML file mapping actors to their groups.
    #[serde(default)]
    pub groups_file: Option<PathBuf>,
}

fn default_review_groups() -> Vec<String> {
    vec!["moderator".into()]
}
fn default_bypass_groups() -> Vec<String> {
    vec!["automoderated".into()]
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            review_groups: default_review_groups(),
            bypass_groups: default_bypass_groups(),
            groups_file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Folder listing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Default number of entries returned by a folder listing.
    #[serde(default = "default_folder_limit")]
    pub folder_limit: u32,
}

fn default_folder_limit() -> u32 {
    150
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            folder_limit: default_folder_limit(),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Action engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deadline for each document store call, in milliseconds.
    #[serde(default = "default_document_timeout_ms")]
    pub document_timeout_ms: u64,

    /// How many times a `StaleBase` answer re-runs conflict detection
    /// before the call fails with an edit conflict.
    #[serde(default = "default_stale_base_retries")]
    pub stale_base_retries: u32,
}

fn default_document_timeout_ms() -> u64 {
    5000
}
fn default_stale_base_retries() -> u32 {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            document_timeout_ms: default_document_timeout_ms(),
            stale_base_retries: default_stale_base_retries(),
        }
    }
}

impl EngineConfig {
    pub fn document_timeout(&self) -> Duration {
        Duration::from_millis(self.document_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that all values are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.permissions.review_groups.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "permissions.review_groups".into(),
                detail: "at least one review group is required".into(),
            });
        }
        if self.queue.folder_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "queue.folder_limit".into(),
                detail: "folder limit must be > 0".into(),
            });
        }
        if self.engine.document_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.document_timeout_ms".into(),
                detail: "document timeout must be > 0".into(),
            });
        }
        if let Some(ref path) = self.permissions.groups_file {
            if !path.exists() {
                return Err(ConfigError::InvalidValue {
                    field: "permissions.groups_file".into(),
                    detail: format!("file not found: {}", path.display()),
                });
            }
        }
        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }
}
