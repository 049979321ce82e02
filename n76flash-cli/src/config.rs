//! Configuration file support for n76flash.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (N76FLASH_*)
//! 3. Local config file (./n76flash.toml)
//! 4. Global config file (~/.config/n76flash/config.toml)
//!
//! ```toml
//! [connection]
//! port = "ttyUSB0"
//! search = "ttyUSB"
//!
//! [flash]
//! tries = 50
//! erase_timeout_ms = 2000
//! reset_on_abort = false
//! ```

use directories::ProjectDirs;
use log::{debug, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Local configuration file name, looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "n76flash.toml";

/// Connection configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "ttyUSB0" or "/dev/ttyACM0").
    pub port: Option<String>,
    /// Device name prefix used for discovery.
    pub search: Option<String>,
}

/// Flash configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlashConfig {
    /// Number of connection retries.
    pub tries: Option<u32>,
    /// Erase acknowledgment timeout in milliseconds.
    pub erase_timeout_ms: Option<u64>,
    /// Send a reset when programming is aborted.
    pub reset_on_abort: Option<bool>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Connection configuration.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Flash configuration.
    #[serde(default)]
    pub flash: FlashConfig,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "n76flash").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        // Connection config
        if other.connection.port.is_some() {
            self.connection.port = other.connection.port;
        }
        if other.connection.search.is_some() {
            self.connection.search = other.connection.search;
        }

        // Flash config
        if other.flash.tries.is_some() {
            self.flash.tries = other.flash.tries;
        }
        if other.flash.erase_timeout_ms.is_some() {
            self.flash.erase_timeout_ms = other.flash.erase_timeout_ms;
        }
        if other.flash.reset_on_abort.is_some() {
            self.flash.reset_on_abort = other.flash.reset_on_abort;
        }
    }
}
