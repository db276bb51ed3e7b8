//! Configuration for the conpty demo.
//!
//! The configuration file is located at `~/.conpty/config.toml`:
//!
//! ```toml
//! # Command launched in the pseudo console
//! shell = "powershell.exe -NoProfile"
//!
//! [terminal]
//! columns = 120
//! rows = 40
//!
//! [io]
//! read_buffer = 4096
//! poll_interval_ms = 5
//! exit_grace_ms = 100
//!
//! [log]
//! level = "debug"
//! ```
//!
//! Every key is optional. A missing or unreadable file yields the defaults.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pty::SessionOptions;
use crate::size::ConsoleSize;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Command launched in the pseudo console
    pub shell: Option<String>,
    pub terminal: TerminalConfig,
    pub io: IoConfig,
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: None,
            terminal: TerminalConfig::default(),
            io: IoConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// Console dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub columns: i16,
    pub rows: i16,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            columns: 80,
            rows: 25,
        }
    }
}

/// Reader settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    pub read_buffer: usize,
    pub poll_interval_ms: u64,
    /// Quiet period on the output pipe after the child exits
    pub exit_grace_ms: u64,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            read_buffer: 4096,
            poll_interval_ms: 5,
            exit_grace_ms: 100,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Default shell command
    pub const DEFAULT_SHELL: &'static str = "cmd.exe";

    /// Load configuration from file
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(&path) {
                    match Self::from_toml(&content) {
                        Ok(config) => return config,
                        Err(e) => tracing::warn!("Ignoring {}: {}", path.display(), e),
                    }
                }
            }
        }
        Self::default()
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Get config file path
    pub fn get_config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Log file next to the config file
    pub fn log_path() -> PathBuf {
        config_dir()
            .map(|dir| dir.join("conpty.log"))
            .unwrap_or_else(|| PathBuf::from("conpty.log"))
    }

    pub fn shell(&self) -> &str {
        self.shell.as_deref().unwrap_or(Self::DEFAULT_SHELL)
    }

    pub fn console_size(&self) -> ConsoleSize {
        ConsoleSize::new(self.terminal.columns, self.terminal.rows)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            read_buffer: self.io.read_buffer,
            poll_interval: Duration::from_millis(self.io.poll_interval_ms),
            exit_grace: Duration::from_millis(self.io.exit_grace_ms),
        }
    }
}

fn config_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".conpty"))
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}
