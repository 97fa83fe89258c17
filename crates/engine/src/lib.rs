//! # sshterm Engine Library
//!
//! Terminal sessions backed by the system ssh client.
//!
//! ## Overview
//!
//! The engine spawns `ssh` as a child process, handles authentication
//! (key files, a password helper, or a generated expect script), moves bytes
//! between the child and a UI sink, and reports every failure as a typed
//! [`SessionState`]. Output bytes are meant to be fed to an
//! [`ansi::AnsiDecoder`], one per stream.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use engine::{ChannelSink, KeyringStore, ProcessSession, SessionConfig, SessionSettings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (sink, mut events) = ChannelSink::new();
//!     let session = ProcessSession::new(
//!         "prod-db",
//!         SessionSettings::default(),
//!         Arc::new(KeyringStore::system()),
//!         Arc::new(sink),
//!     );
//!
//!     session.connect(SessionConfig::new("db.example.com", "admin"));
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`secrets`]: Password storage collaborator
//! - [`session`]: Child process sessions and their lifecycle

pub mod config;
pub mod secrets;
pub mod session;

// Re-export the decoder crate for convenience
pub use ansi;

// Re-export config types for convenience
pub use config::{Config, ConfigError};

// Re-export secret store types for convenience
pub use secrets::{KeyringStore, MemorySecretStore, SecretStore};

// Re-export session types for convenience
pub use session::{
    AuthMethod, ChannelSink, DisconnectReason, OutputStream, ProcessSession, SessionConfig,
    SessionError, SessionEvent, SessionSettings, SessionSink, SessionState,
};
