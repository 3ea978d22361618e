//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `HNEWS_ROOT_FOLDER`, then `HNEWS_ROOT` environment variable
//! 3. `root_folder` in the module's TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: a warning is logged and
//! defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Primary root folder environment variable
pub const ENV_ROOT_FOLDER: &str = "HNEWS_ROOT_FOLDER";
/// Alternative root folder environment variable
pub const ENV_ROOT: &str = "HNEWS_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "hnews.db";

/// Default Hacker News API base
pub const DEFAULT_HN_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";

/// Values used when neither CLI, environment, nor TOML provide one
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join("hnews"))
            .unwrap_or_else(|| PathBuf::from("./hnews_data"));

        Self {
            root_folder,
            log_level: "info".to_string(),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` directive; `RUST_LOG` overrides it
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[controller]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Hacker News API base URL, without trailing slash
    pub hn_base_url: String,
    /// Delay before a deferred cycle is retried
    pub requeue_after_secs: u64,
    /// Interval at which every resource is reconciled regardless of events
    pub resync_interval_secs: u64,
    /// Per-request timeout; `None` leaves requests unbounded
    pub request_timeout_secs: Option<u64>,
    /// Event bus buffer size
    pub event_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            hn_base_url: DEFAULT_HN_BASE_URL.to_string(),
            requeue_after_secs: 30,
            resync_interval_secs: 10 * 60 * 60,
            request_timeout_secs: None,
            event_capacity: 100,
        }
    }
}

/// `[server]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5780,
        }
    }
}

/// Module TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl TomlConfig {
    /// Parse a TOML file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load the module's config file, falling back to defaults
    pub fn load(module_name: &str) -> Self {
        let Some(path) = config_file_path(module_name) else {
            warn!("Could not determine config directory, using defaults");
            return Self::default();
        };

        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }

        match Self::from_path(&path) {
            Ok(config) => {
                debug!(path = %path.display(), "Loaded config file");
                config
            }
            Err(e) => {
                warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }
}

/// `<config_dir>/hnews/<module>.toml`
pub fn config_file_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hnews").join(format!("{}.toml", module_name)))
}

/// Resolves the root folder holding the database
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
        }
    }

    /// Highest-priority override from the command line
    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        for var in [ENV_ROOT_FOLDER, ENV_ROOT] {
            if let Ok(path) = std::env::var(var) {
                if !path.is_empty() {
                    return PathBuf::from(path);
                }
            }
        }

        if let Some(path) = config_file_path(&self.module_name).filter(|p| p.exists()) {
            match TomlConfig::from_path(&path) {
                Ok(TomlConfig {
                    root_folder: Some(root),
                    ..
                }) => return root,
                Ok(_) => {}
                Err(e) => warn!("{}; ignoring root_folder from config", e),
            }
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and locates the database inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder (and parents) if missing; idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}
