//! Login automation scripts for password sessions.
//!
//! When no password helper is installed, a short-lived expect script spawns
//! ssh, answers the host key and password prompts, and then hands the
//! terminal over with `interact`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::command::ssh_args;
use super::connection::SessionConfig;
use super::settings::SessionSettings;
use super::state::SessionError;

/// Script exit status when the remote host rejects the password.
pub const SCRIPT_EXIT_AUTH_REJECTED: i32 = 5;

/// Script exit status when no prompt matched in time.
pub const SCRIPT_EXIT_TIMEOUT: i32 = 6;

/// Quiet period after the password is sent before the session is handed
/// over without a recognised shell prompt.
const PASSWORD_SETTLE: Duration = Duration::from_secs(5);

const SCRIPT_PREFIX: &str = "sshterm-login-";
const SCRIPT_SUFFIX: &str = ".exp";

/// Escapes a value for use inside a double-quoted Tcl word.
pub fn escape_tcl(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$' | '[' | ']') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Renders the expect script text.
pub fn render_script(secret: &str, config: &SessionConfig, settings: &SessionSettings) -> String {
    let command = std::iter::once(settings.ssh_program.clone())
        .chain(ssh_args(config, settings))
        .map(|arg| format!("\"{}\"", escape_tcl(&arg)))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        r#"#!/usr/bin/expect -f
set timeout {timeout}
set stty_init "rows {rows} cols {cols}"
log_user 1
set sent 0
spawn -noecho {command}
expect {{
    -nocase -re "are you sure you want to continue connecting" {{
        send -- "yes\r"
        exp_continue
    }}
    -nocase -re "permission denied|authentication failed|access denied" {{
        exit {rejected}
    }}
    -nocase -re "password\[^\r\n\]*: ?$" {{
        send -- "{secret}\r"
        set sent 1
        set timeout {settle}
        exp_continue
    }}
    -re {{[$#>%] ?(\x1b\[[0-9;?]*[A-Za-z])*$}} {{}}
    timeout {{
        if {{!$sent}} {{
            exit {timed_out}
        }}
    }}
    eof {{
        catch wait result
        exit [lindex $result 3]
    }}
}}
set timeout -1
interact
catch wait result
exit [lindex $result 3]
"#,
        timeout = settings.login_timeout.as_secs().max(1),
        settle = settings.login_timeout.min(PASSWORD_SETTLE).as_secs().max(1),
        rows = config.terminal_rows,
        cols = config.terminal_cols,
        command = command,
        rejected = SCRIPT_EXIT_AUTH_REJECTED,
        secret = escape_tcl(secret),
        timed_out = SCRIPT_EXIT_TIMEOUT,
    )
}

/// A login script on disk.
///
/// The file is created with owner-only permissions and removed on drop.
/// [`CredentialScript::schedule_removal`] additionally removes it once its
/// TTL expires, even while the session is still running.
#[derive(Debug)]
pub struct CredentialScript {
    path: PathBuf,
    created_at: Instant,
}

impl CredentialScript {
    /// Writes a new script into `settings.script_dir`.
    pub fn create(
        secret: &str,
        config: &SessionConfig,
        settings: &SessionSettings,
    ) -> Result<Self, SessionError> {
        Self::write(&settings.script_dir, &render_script(secret, config, settings))
            .map_err(|e| SessionError::ScriptCreationFailed(e.to_string()))
    }

    fn write(dir: &Path, contents: &str) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(SCRIPT_PREFIX)
            .suffix(SCRIPT_SUFFIX)
            .tempfile_in(dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(file.path(), fs::Permissions::from_mode(0o700))?;
        }

        file.write_all(contents.as_bytes())?;
        file.flush()?;

        let (_, path) = file.keep().map_err(|e| e.error)?;

        tracing::debug!(path = %path.display(), "Created login script");

        Ok(Self {
            path,
            created_at: Instant::now(),
        })
    }

    /// Location of the script.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the script was written.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Removes the script once `ttl` has elapsed since creation.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule_removal(&self, ttl: Duration) {
        let path = self.path.clone();
        let deadline = tokio::time::Instant::from_std(self.created_at + ttl);
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            remove_script(&path);
        });
    }
}

impl Drop for CredentialScript {
    fn drop(&mut self) {
        remove_script(&self.path);
    }
}

fn remove_script(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed login script"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove login script");
        }
    }
}
