//! Configuration management for sshterm.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/sshterm/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("keepalive interval must be between 1 and 3600 seconds, got {0}")]
    InvalidKeepaliveInterval(u64),

    #[error("login timeout must be between 1 and 600 seconds, got {0}")]
    InvalidLoginTimeout(u64),

    #[error("script_ttl must be between 1 and 3600 seconds, got {0}")]
    InvalidScriptTtl(u64),

    #[error("terminal geometry must be between 1 and 1000, got {cols}x{rows}")]
    InvalidGeometry { cols: u16, rows: u16 },

    #[error("term must not be empty")]
    EmptyTerm,

    #[error("ssh program must not be empty")]
    EmptySshProgram,

    #[error("keepalive payload must not be empty when keepalive is enabled")]
    EmptyKeepalivePayload,

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for sshterm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration.
    pub logging: LoggingConfig,

    /// SSH client invocation.
    pub ssh: SshConfig,

    /// Terminal environment handed to the child.
    pub terminal: TerminalConfig,

    /// Idle keepalive traffic.
    pub keepalive: KeepaliveConfig,

    /// Automated password login.
    pub login: LoginConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub level: String,

    /// Directory for log files written during interactive sessions.
    pub directory: PathBuf,
}

/// SSH client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SshConfig {
    /// The ssh client program.
    pub program: String,

    /// Program that feeds a password to ssh (`sshpass`-compatible, `-e` flag).
    pub password_helper: String,

    /// Use the password helper when it is installed.
    pub prefer_password_helper: bool,

    /// The expect interpreter running generated login scripts.
    pub expect_program: String,

    /// `ServerAliveInterval` in seconds (0 = not passed).
    pub server_alive_interval: u64,

    /// `ConnectTimeout` in seconds (0 = not passed).
    pub connect_timeout: u64,

    /// Extra `-o` options passed verbatim, e.g. `Compression=yes`.
    pub extra_options: Vec<String>,
}

/// Terminal environment configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerminalConfig {
    /// Value of `TERM` for the child.
    pub term: String,

    /// Value of `LANG` and `LC_ALL` for the child.
    pub locale: String,

    /// Default width in columns.
    pub cols: u16,

    /// Default height in rows.
    pub rows: u16,

    /// Write an `stty` command to the remote shell on resize.
    pub notify_remote_resize: bool,
}

/// Keepalive configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KeepaliveConfig {
    /// Whether keepalive traffic is sent at all.
    pub enabled: bool,

    /// Seconds between keepalive writes.
    pub interval_secs: u64,

    /// Bytes written to the remote foreground program on each tick.
    ///
    /// The default NUL is ignored by shells and pagers, but full-screen
    /// editors may bind it (vim insert mode repeats the last insert, emacs
    /// sets the mark). Disable keepalive and rely on `ssh.server_alive_interval`
    /// when such programs sit idle for long periods.
    pub payload: String,
}

/// Automated login configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoginConfig {
    /// Seconds to wait for a recognisable prompt before giving up.
    pub timeout_secs: u64,

    /// Seconds a generated login script may exist on disk.
    pub script_ttl_secs: u64,

    /// Directory for login scripts. Defaults to the OS temp directory.
    pub script_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: default_log_dir(),
        }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            password_helper: "sshpass".to_string(),
            prefer_password_helper: true,
            expect_program: "expect".to_string(),
            server_alive_interval: 30,
            connect_timeout: 15,
            extra_options: Vec::new(),
        }
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            term: "xterm-256color".to_string(),
            locale: "en_US.UTF-8".to_string(),
            cols: 80,
            rows: 24,
            notify_remote_resize: true,
        }
    }
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 120, // 2 minutes
            payload: "\0".to_string(),
        }
    }
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            script_ttl_secs: 60,
            script_dir: None,
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sshterm")
        .join("config.toml")
}

/// Returns the default log directory.
fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sshterm")
        .join("logs")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - SSHTERM_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    /// - SSHTERM_SSH_PROGRAM: Override the ssh client program
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("SSHTERM_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log level from environment: {}", level);
                self.logging.level = level;
            }
        }

        if let Ok(program) = std::env::var("SSHTERM_SSH_PROGRAM") {
            if !program.is_empty() {
                tracing::info!("Overriding ssh program from environment: {}", program);
                self.ssh.program = program;
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keepalive.enabled {
            if !(1..=3600).contains(&self.keepalive.interval_secs) {
                return Err(ConfigError::InvalidKeepaliveInterval(
                    self.keepalive.interval_secs,
                ));
            }
            if self.keepalive.payload.is_empty() {
                return Err(ConfigError::EmptyKeepalivePayload);
            }
        }

        if !(1..=600).contains(&self.login.timeout_secs) {
            return Err(ConfigError::InvalidLoginTimeout(self.login.timeout_secs));
        }

        if !(1..=3600).contains(&self.login.script_ttl_secs) {
            return Err(ConfigError::InvalidScriptTtl(self.login.script_ttl_secs));
        }

        let (cols, rows) = (self.terminal.cols, self.terminal.rows);
        if !(1..=1000).contains(&cols) || !(1..=1000).contains(&rows) {
            return Err(ConfigError::InvalidGeometry { cols, rows });
        }

        if self.terminal.term.trim().is_empty() {
            return Err(ConfigError::EmptyTerm);
        }

        if self.ssh.program.trim().is_empty() {
            return Err(ConfigError::EmptySshProgram);
        }

        let level = self.logging.level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.logging.level.clone()));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
