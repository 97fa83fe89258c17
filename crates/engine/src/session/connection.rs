//! Connection parameters captured when a session connects.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default SSH port; no `-p` flag is emitted for it.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// How the session authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthMethod {
    /// Password resolved from the secret store.
    Password,
    /// Key file or agent; ssh handles it on its own.
    PublicKey,
}

/// Problems with a [`SessionConfig`] detected before spawning.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionConfigError {
    #[error("host must not be empty or contain whitespace: {0:?}")]
    InvalidHost(String),

    #[error("username must not be empty or contain whitespace: {0:?}")]
    InvalidUsername(String),

    #[error("port must not be 0")]
    InvalidPort,

    #[error("terminal geometry must be at least 1x1, got {cols}x{rows}")]
    InvalidGeometry { cols: u16, rows: u16 },
}

/// Immutable snapshot of what to connect to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth_method: AuthMethod,
    /// Explicit identity file for public key auth.
    pub key_path: Option<PathBuf>,
    pub terminal_cols: u16,
    pub terminal_rows: u16,
}

impl SessionConfig {
    /// Creates a public key config for `username@host` on port 22 at 80x24.
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            username: username.into(),
            auth_method: AuthMethod::PublicKey,
            key_path: None,
            terminal_cols: 80,
            terminal_rows: 24,
        }
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Switches to password authentication.
    pub fn with_password_auth(mut self) -> Self {
        self.auth_method = AuthMethod::Password;
        self
    }

    /// Uses public key authentication with an explicit key file.
    pub fn with_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.auth_method = AuthMethod::PublicKey;
        self.key_path = Some(path.into());
        self
    }

    /// Sets the initial terminal size.
    pub fn with_geometry(mut self, cols: u16, rows: u16) -> Self {
        self.terminal_cols = cols;
        self.terminal_rows = rows;
        self
    }

    /// The `user@host` destination argument.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }

    /// Checks the fields ssh would otherwise misinterpret.
    ///
    /// A leading `-` is rejected so a host or user can never be parsed as an
    /// ssh option.
    pub fn validate(&self) -> Result<(), SessionConfigError> {
        if !is_plain_word(&self.host) {
            return Err(SessionConfigError::InvalidHost(self.host.clone()));
        }
        if !is_plain_word(&self.username) {
            return Err(SessionConfigError::InvalidUsername(self.username.clone()));
        }
        if self.port == 0 {
            return Err(SessionConfigError::InvalidPort);
        }
        if self.terminal_cols == 0 || self.terminal_rows == 0 {
            return Err(SessionConfigError::InvalidGeometry {
                cols: self.terminal_cols,
                rows: self.terminal_rows,
            });
        }
        Ok(())
    }
}

fn is_plain_word(value: &str) -> bool {
    !value.is_empty() && !value.starts_with('-') && !value.chars().any(char::is_whitespace)
}
