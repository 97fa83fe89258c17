//! Session lifecycle states and the failure taxonomy.

use std::fmt;

use thiserror::Error;

/// Every way a session can fail.
///
/// These never escape as `Err` from the public session API; they are
/// reported through [`SessionState::Failed`] or
/// [`DisconnectReason::Error`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The child process could not be started.
    #[error("failed to spawn ssh client: {0}")]
    SpawnFailed(String),

    /// Password authentication was selected but no secret could be resolved.
    #[error("no password available for this session")]
    AuthMissing,

    /// The remote host rejected the credentials.
    #[error("remote host rejected authentication")]
    RemoteAuthRejected,

    /// No login prompt was recognised within the wait budget.
    #[error("timed out waiting for login prompt")]
    Timeout,

    /// The child exited with a status that has no more specific meaning.
    #[error("ssh client exited unexpectedly with status {0}")]
    UnexpectedExit(i32),

    /// The login automation script could not be written.
    #[error("failed to create login script: {0}")]
    ScriptCreationFailed(String),
}

/// Why a session reached [`SessionState::Disconnected`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The child exited with status zero.
    Exited,
    /// `disconnect()` was called.
    Requested,
    /// The child exited with a failure status.
    Error(SessionError),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Exited => write!(f, "connection closed"),
            DisconnectReason::Requested => write!(f, "disconnected"),
            DisconnectReason::Error(e) => write!(f, "{e}"),
        }
    }
}

/// Lifecycle of one session.
///
/// Per connection attempt the state only moves forward:
/// `Idle -> Connecting -> {Connected | Failed}`, `Connected -> Disconnected`.
/// `Connecting` can also go straight to `Disconnected` when the attempt is
/// cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnected(DisconnectReason),
    Failed(SessionError),
}

impl SessionState {
    /// True while a child process is starting or running.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Connected)
    }

    /// True once an attempt has ended, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Disconnected(_) | SessionState::Failed(_)
        )
    }

    /// True when `connect` would start a new attempt.
    pub fn can_connect(&self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Disconnected(reason) => write!(f, "disconnected ({reason})"),
            SessionState::Failed(e) => write!(f, "failed ({e})"),
        }
    }
}
