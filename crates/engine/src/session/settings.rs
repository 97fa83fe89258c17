//! Runtime settings for a session, derived from [`Config`].

use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;

/// How long a child gets to exit after SIGTERM before it is killed.
const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);

/// Periodic keepalive writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepaliveSettings {
    pub interval: Duration,
    pub payload: Vec<u8>,
}

/// Everything a [`ProcessSession`](super::ProcessSession) needs besides the
/// connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// The ssh client program.
    pub ssh_program: String,
    /// `sshpass`-compatible helper; `None` disables it.
    pub password_helper: Option<String>,
    /// Interpreter for generated login scripts.
    pub expect_program: String,
    pub server_alive_interval: Option<u64>,
    pub connect_timeout: Option<u64>,
    pub extra_options: Vec<String>,
    pub term: String,
    pub locale: String,
    pub notify_remote_resize: bool,
    /// `None` disables keepalive.
    pub keepalive: Option<KeepaliveSettings>,
    /// Prompt-matching budget for scripted logins.
    pub login_timeout: Duration,
    /// Lifetime of a login script on disk.
    pub script_ttl: Duration,
    pub script_dir: PathBuf,
    pub kill_grace: Duration,
}

impl SessionSettings {
    /// Builds settings from a loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        let keepalive = config.keepalive.enabled.then(|| KeepaliveSettings {
            interval: Duration::from_secs(config.keepalive.interval_secs),
            payload: config.keepalive.payload.as_bytes().to_vec(),
        });

        Self {
            ssh_program: config.ssh.program.clone(),
            password_helper: config
                .ssh
                .prefer_password_helper
                .then(|| config.ssh.password_helper.clone())
                .filter(|helper| !helper.is_empty()),
            expect_program: config.ssh.expect_program.clone(),
            server_alive_interval: nonzero(config.ssh.server_alive_interval),
            connect_timeout: nonzero(config.ssh.connect_timeout),
            extra_options: config.ssh.extra_options.clone(),
            term: config.terminal.term.clone(),
            locale: config.terminal.locale.clone(),
            notify_remote_resize: config.terminal.notify_remote_resize,
            keepalive,
            login_timeout: Duration::from_secs(config.login.timeout_secs),
            script_ttl: Duration::from_secs(config.login.script_ttl_secs),
            script_dir: config
                .login
                .script_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

fn nonzero(value: u64) -> Option<u64> {
    (value != 0).then_some(value)
}
