//! Child process invocations.
//!
//! Builds the ssh argument vector and the three ways of launching it:
//! directly (key auth), through a password helper, or through a generated
//! login script.

use std::path::{Path, PathBuf};

use super::connection::{AuthMethod, SessionConfig, DEFAULT_SSH_PORT};
use super::script::{SCRIPT_EXIT_AUTH_REJECTED, SCRIPT_EXIT_TIMEOUT};
use super::settings::SessionSettings;
use super::state::{DisconnectReason, SessionError};

/// `sshpass` exit status for a rejected password.
const HELPER_EXIT_AUTH_REJECTED: i32 = 5;

/// Environment variable the password helper reads with `-e`.
const HELPER_PASSWORD_ENV: &str = "SSHPASS";

/// How the child authenticates, which decides how its exit status is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
    /// ssh on its own (key or agent).
    Direct,
    /// ssh wrapped by a password helper.
    Helper,
    /// ssh driven by a generated expect script.
    Script,
}

/// A fully resolved child invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub mode: LoginMode,
}

impl LaunchPlan {
    /// ssh run directly.
    pub fn direct(config: &SessionConfig, settings: &SessionSettings) -> Self {
        Self {
            program: settings.ssh_program.clone(),
            args: ssh_args(config, settings),
            env: terminal_env(settings, config.terminal_cols, config.terminal_rows),
            mode: LoginMode::Direct,
        }
    }

    /// ssh wrapped by a password helper; the secret travels in the
    /// environment, never on the command line.
    pub fn with_helper(
        helper: &Path,
        secret: &str,
        config: &SessionConfig,
        settings: &SessionSettings,
    ) -> Self {
        let mut args = vec!["-e".to_string(), settings.ssh_program.clone()];
        args.extend(ssh_args(config, settings));

        let mut env = terminal_env(settings, config.terminal_cols, config.terminal_rows);
        env.push((HELPER_PASSWORD_ENV.to_string(), secret.to_string()));

        Self {
            program: helper.to_string_lossy().into_owned(),
            args,
            env,
            mode: LoginMode::Helper,
        }
    }

    /// A login script run by the expect interpreter.
    pub fn with_script(script: &Path, config: &SessionConfig, settings: &SessionSettings) -> Self {
        Self {
            program: settings.expect_program.clone(),
            args: vec!["-f".to_string(), script.to_string_lossy().into_owned()],
            env: terminal_env(settings, config.terminal_cols, config.terminal_rows),
            mode: LoginMode::Script,
        }
    }

    /// Interprets the child's exit status. `None` means killed by a signal.
    pub fn classify_exit(&self, code: Option<i32>) -> DisconnectReason {
        let Some(code) = code else {
            return DisconnectReason::Error(SessionError::UnexpectedExit(-1));
        };

        let error = match (self.mode, code) {
            (_, 0) => return DisconnectReason::Exited,
            (LoginMode::Helper, HELPER_EXIT_AUTH_REJECTED) => SessionError::RemoteAuthRejected,
            (LoginMode::Script, SCRIPT_EXIT_AUTH_REJECTED) => SessionError::RemoteAuthRejected,
            (LoginMode::Script, SCRIPT_EXIT_TIMEOUT) => SessionError::Timeout,
            (_, code) => SessionError::UnexpectedExit(code),
        };
        DisconnectReason::Error(error)
    }

    /// The command line with any helper password left out, for logging.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The ssh argument vector for a session.
///
/// Host key prompts are disabled, a remote PTY is forced, and `-p` is only
/// emitted for non-default ports. The destination is always last.
pub fn ssh_args(config: &SessionConfig, settings: &SessionSettings) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-o".into(),
        "StrictHostKeyChecking=no".into(),
        "-o".into(),
        "UserKnownHostsFile=/dev/null".into(),
        "-tt".into(),
    ];

    if config.port != DEFAULT_SSH_PORT {
        args.push("-p".into());
        args.push(config.port.to_string());
    }

    if config.auth_method == AuthMethod::PublicKey {
        if let Some(key) = &config.key_path {
            args.push("-i".into());
            args.push(key.to_string_lossy().into_owned());
        }
    }

    if let Some(interval) = settings.server_alive_interval {
        args.push("-o".into());
        args.push(format!("ServerAliveInterval={interval}"));
    }

    if let Some(timeout) = settings.connect_timeout {
        args.push("-o".into());
        args.push(format!("ConnectTimeout={timeout}"));
    }

    for option in &settings.extra_options {
        args.push("-o".into());
        args.push(option.clone());
    }

    if config.auth_method == AuthMethod::Password {
        args.push("-o".into());
        args.push("PreferredAuthentications=password,keyboard-interactive".into());
        args.push("-o".into());
        args.push("PubkeyAuthentication=no".into());
    }

    args.push(config.destination());
    args
}

/// Terminal type, locale and geometry hints for the child.
pub fn terminal_env(settings: &SessionSettings, cols: u16, rows: u16) -> Vec<(String, String)> {
    vec![
        ("TERM".to_string(), settings.term.clone()),
        ("LANG".to_string(), settings.locale.clone()),
        ("LC_ALL".to_string(), settings.locale.clone()),
        ("COLUMNS".to_string(), cols.to_string()),
        ("LINES".to_string(), rows.to_string()),
    ]
}

/// Locates the password helper on `PATH`.
pub fn find_password_helper(settings: &SessionSettings) -> Option<PathBuf> {
    let helper = settings.password_helper.as_deref()?;
    which::which(helper).ok()
}
