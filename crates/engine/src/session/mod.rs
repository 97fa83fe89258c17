//! Session management module.
//!
//! This module drives remote shells through an external ssh client:
//! argument vectors, password automation, keepalive, and the lifecycle
//! state machine that reports everything through a [`SessionSink`].

pub mod command;
pub mod connection;
pub mod keepalive;
pub mod process;
pub mod script;
pub mod settings;
pub mod sink;
pub mod state;

pub use command::{ssh_args, LaunchPlan, LoginMode};
pub use connection::{AuthMethod, SessionConfig, SessionConfigError, DEFAULT_SSH_PORT};
pub use process::ProcessSession;
pub use script::{escape_tcl, CredentialScript, SCRIPT_EXIT_AUTH_REJECTED, SCRIPT_EXIT_TIMEOUT};
pub use settings::{KeepaliveSettings, SessionSettings};
pub use sink::{ChannelSink, OutputStream, SessionEvent, SessionSink};
pub use state::{DisconnectReason, SessionError, SessionState};
