//! Integration tests for ProcessSession.
//!
//! Small `/bin/sh` scripts stand in for the ssh client through the
//! configurable program path, so these tests exercise real child processes,
//! pipes, signals and exit codes:
//! - Lifecycle transitions and exit classification
//! - Input, output and environment plumbing
//! - Password paths (helper, missing secret, script creation)
//! - Disconnect idempotence, keepalive and resize
//! - Generated login scripts, when `expect` is installed

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use engine::secrets::{MemorySecretStore, SecretStore};
use engine::session::{
    ChannelSink, DisconnectReason, KeepaliveSettings, OutputStream, ProcessSession,
    SessionConfig, SessionError, SessionEvent, SessionSettings, SessionState,
};
use pretty_assertions::assert_eq;
use serial_test::serial;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Writes an executable shell script and returns its path.
fn fake_program(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn test_settings(dir: &TempDir, ssh_body: &str) -> SessionSettings {
    SessionSettings {
        ssh_program: fake_program(dir.path(), "fake-ssh", ssh_body)
            .to_string_lossy()
            .into_owned(),
        password_helper: None,
        keepalive: None,
        script_dir: dir.path().to_path_buf(),
        kill_grace: Duration::from_millis(500),
        ..SessionSettings::default()
    }
}

fn start(
    settings: SessionSettings,
    secrets: Arc<dyn SecretStore>,
) -> (ProcessSession, UnboundedReceiver<SessionEvent>) {
    let (sink, rx) = ChannelSink::new();
    let session = ProcessSession::new("admin@example.com", settings, secrets, Arc::new(sink));
    (session, rx)
}

fn no_secrets() -> Arc<dyn SecretStore> {
    Arc::new(MemorySecretStore::new())
}

fn admin_secret() -> Arc<dyn SecretStore> {
    Arc::new(MemorySecretStore::with_secret("admin@example.com", "hunter2"))
}

/// A store that takes a while to answer, keeping the session connecting.
struct SlowSecretStore {
    delay: Duration,
    inner: MemorySecretStore,
}

impl SecretStore for SlowSecretStore {
    fn get(&self, id: &str) -> Option<String> {
        std::thread::sleep(self.delay);
        self.inner.get(id)
    }

    fn set(&self, id: &str, secret: &str) -> bool {
        self.inner.set(id, secret)
    }

    fn delete(&self, id: &str) -> bool {
        self.inner.delete(id)
    }
}

/// Settings that run generated login scripts through the real `expect`.
fn expect_settings(dir: &TempDir, ssh_body: &str) -> Option<SessionSettings> {
    let Ok(expect) = which::which("expect") else {
        eprintln!("expect is not installed; skipping");
        return None;
    };
    let mut settings = test_settings(dir, ssh_body);
    settings.expect_program = expect.to_string_lossy().into_owned();
    settings.login_timeout = Duration::from_secs(1);
    Some(settings)
}

async fn next_event(rx: &mut UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("session event channel closed")
}

/// Everything observed up to and including the first terminal state.
#[derive(Debug, Default)]
struct Transcript {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    states: Vec<SessionState>,
}

impl Transcript {
    fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    fn last_state(&self) -> &SessionState {
        self.states.last().expect("no state recorded")
    }
}

async fn run_to_end(rx: &mut UnboundedReceiver<SessionEvent>) -> Transcript {
    let mut transcript = Transcript::default();
    loop {
        match next_event(rx).await {
            SessionEvent::Output {
                stream: OutputStream::Stdout,
                data,
            } => transcript.stdout.extend(data),
            SessionEvent::Output {
                stream: OutputStream::Stderr,
                data,
            } => transcript.stderr.extend(data),
            SessionEvent::State(state) => {
                let terminal = state.is_terminal();
                transcript.states.push(state);
                if terminal {
                    return transcript;
                }
            }
        }
    }
}

async fn wait_connected(rx: &mut UnboundedReceiver<SessionEvent>) {
    assert_eq!(next_event(rx).await, SessionEvent::State(SessionState::Connecting));
    assert_eq!(next_event(rx).await, SessionEvent::State(SessionState::Connected));
}

/// Reads stdout until `needle` shows up.
async fn wait_for_output(rx: &mut UnboundedReceiver<SessionEvent>, needle: &str) -> String {
    let mut seen = Vec::new();
    loop {
        match next_event(rx).await {
            SessionEvent::Output { data, .. } => {
                seen.extend(data);
                let text = String::from_utf8_lossy(&seen).into_owned();
                if text.contains(needle) {
                    return text;
                }
            }
            SessionEvent::State(state) => panic!("unexpected state {state:?} before {needle:?}"),
        }
    }
}

async fn assert_quiet(rx: &mut UnboundedReceiver<SessionEvent>) {
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err(), "unexpected extra event");
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
#[serial]
async fn test_key_auth_clean_exit() {
    let dir = TempDir::new().unwrap();
    let (session, mut rx) = start(test_settings(&dir, r#"echo "args: $*""#), no_secrets());

    session.connect(SessionConfig::new("example.com", "admin"));
    let transcript = run_to_end(&mut rx).await;

    assert_eq!(
        transcript.states,
        vec![
            SessionState::Connecting,
            SessionState::Connected,
            SessionState::Disconnected(DisconnectReason::Exited),
        ]
    );
    let output = transcript.stdout_text();
    assert!(output.contains("StrictHostKeyChecking=no"));
    assert!(output.contains("-tt"));
    assert!(output.trim_end().ends_with("admin@example.com"));
    assert!(!output.contains(" -p "));
    assert_eq!(session.state(), SessionState::Disconnected(DisconnectReason::Exited));
}

#[tokio::test]
#[serial]
async fn test_nonzero_exit_is_unexpected() {
    let dir = TempDir::new().unwrap();
    let (session, mut rx) = start(test_settings(&dir, "exit 3"), no_secrets());

    session.connect(SessionConfig::new("example.com", "admin"));
    let transcript = run_to_end(&mut rx).await;

    assert_eq!(
        transcript.last_state(),
        &SessionState::Disconnected(DisconnectReason::Error(SessionError::UnexpectedExit(3)))
    );
}

#[tokio::test]
#[serial]
async fn test_missing_program_fails_to_spawn() {
    let dir = TempDir::new().unwrap();
    let mut settings = test_settings(&dir, "exit 0");
    settings.ssh_program = dir.path().join("no-such-ssh").to_string_lossy().into_owned();
    let (session, mut rx) = start(settings, no_secrets());

    session.connect(SessionConfig::new("example.com", "admin"));
    let transcript = run_to_end(&mut rx).await;

    assert_eq!(transcript.states.len(), 2);
    assert!(matches!(
        transcript.last_state(),
        SessionState::Failed(SessionError::SpawnFailed(_))
    ));
    assert!(session.state().can_connect());
}

#[tokio::test]
#[serial]
async fn test_invalid_config_fails_without_spawning() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("spawned");
    let body = format!("touch {}", marker.display());
    let (session, mut rx) = start(test_settings(&dir, &body), no_secrets());

    session.connect(SessionConfig::new("-oProxyCommand=evil", "admin"));
    let transcript = run_to_end(&mut rx).await;

    assert!(matches!(
        transcript.last_state(),
        SessionState::Failed(SessionError::SpawnFailed(_))
    ));
    assert!(!marker.exists());
}

#[tokio::test]
#[serial]
async fn test_connect_is_noop_while_active() {
    let dir = TempDir::new().unwrap();
    let (session, mut rx) = start(test_settings(&dir, "exec cat"), no_secrets());

    session.connect(SessionConfig::new("example.com", "admin"));
    wait_connected(&mut rx).await;

    session.connect(SessionConfig::new("other.example.com", "root"));
    assert_quiet(&mut rx).await;
    assert_eq!(session.state(), SessionState::Connected);

    session.disconnect();
    assert_eq!(
        next_event(&mut rx).await,
        SessionEvent::State(SessionState::Disconnected(DisconnectReason::Requested))
    );
}

#[tokio::test]
#[serial]
async fn test_reconnect_after_exit() {
    let dir = TempDir::new().unwrap();
    let (session, mut rx) = start(test_settings(&dir, "exit 0"), no_secrets());

    session.connect(SessionConfig::new("example.com", "admin"));
    let first = run_to_end(&mut rx).await;
    session.connect(SessionConfig::new("example.com", "admin"));
    let second = run_to_end(&mut rx).await;

    assert_eq!(first.states, second.states);
    assert_eq!(
        second.last_state(),
        &SessionState::Disconnected(DisconnectReason::Exited)
    );
}

// =============================================================================
// I/O plumbing
// =============================================================================

#[tokio::test]
#[serial]
async fn test_send_reaches_child_stdin() {
    let dir = TempDir::new().unwrap();
    let (session, mut rx) = start(test_settings(&dir, "exec cat"), no_secrets());

    session.connect(SessionConfig::new("example.com", "admin"));
    wait_connected(&mut rx).await;

    session.send(b"hello from the keyboard\n");
    let echoed = wait_for_output(&mut rx, "hello from the keyboard").await;
    assert!(echoed.starts_with("hello"));

    session.disconnect();
}

#[tokio::test]
#[serial]
async fn test_send_before_connect_is_dropped() {
    let dir = TempDir::new().unwrap();
    let (session, mut rx) = start(test_settings(&dir, "exec cat"), no_secrets());

    session.send(b"early\n");
    assert_quiet(&mut rx).await;
    assert_eq!(session.state(), SessionState::Idle);

    session.connect(SessionConfig::new("example.com", "admin"));
    wait_connected(&mut rx).await;
    session.send(b"late\n");
    let output = wait_for_output(&mut rx, "late").await;
    assert!(!output.contains("early"));

    session.disconnect();
}

#[tokio::test]
#[serial]
async fn test_stderr_is_tagged() {
    let dir = TempDir::new().unwrap();
    let (session, mut rx) = start(test_settings(&dir, "echo oops >&2; echo fine"), no_secrets());

    session.connect(SessionConfig::new("example.com", "admin"));
    let transcript = run_to_end(&mut rx).await;

    assert_eq!(String::from_utf8_lossy(&transcript.stderr), "oops\n");
    assert_eq!(transcript.stdout_text(), "fine\n");
}

#[tokio::test]
#[serial]
async fn test_terminal_environment() {
    let dir = TempDir::new().unwrap();
    let (session, mut rx) = start(
        test_settings(&dir, r#"echo "$TERM $COLUMNS $LINES $LANG""#),
        no_secrets(),
    );

    session.connect(SessionConfig::new("example.com", "admin").with_geometry(132, 43));
    let transcript = run_to_end(&mut rx).await;

    assert_eq!(transcript.stdout_text(), "xterm-256color 132 43 en_US.UTF-8\n");
}

#[tokio::test]
#[serial]
async fn test_output_precedes_exit_state() {
    let dir = TempDir::new().unwrap();
    let (session, mut rx) = start(
        test_settings(&dir, "i=0; while [ $i -lt 200 ]; do echo line$i; i=$((i+1)); done"),
        no_secrets(),
    );

    session.connect(SessionConfig::new("example.com", "admin"));
    let transcript = run_to_end(&mut rx).await;

    let output = transcript.stdout_text();
    assert!(output.starts_with("line0\n"));
    assert!(output.ends_with("line199\n"));
    assert_eq!(output.lines().count(), 200);
}

// =============================================================================
// Password authentication
// =============================================================================

#[tokio::test]
#[serial]
async fn test_password_without_secret_is_auth_missing() {
    let dir = TempDir::new().unwrap();
    let (session, mut rx) = start(test_settings(&dir, "exit 0"), no_secrets());

    session.connect(SessionConfig::new("example.com", "admin").with_password_auth());
    let transcript = run_to_end(&mut rx).await;

    assert_eq!(
        transcript.states,
        vec![
            SessionState::Connecting,
            SessionState::Failed(SessionError::AuthMissing),
        ]
    );
}

#[tokio::test]
#[serial]
async fn test_password_helper_receives_secret_in_environment() {
    let dir = TempDir::new().unwrap();
    let helper = fake_program(dir.path(), "fake-sshpass", r#"echo "pw=$SSHPASS args=$*"; exit 5"#);
    let mut settings = test_settings(&dir, "exit 0");
    settings.password_helper = Some(helper.to_string_lossy().into_owned());
    let secrets: Arc<dyn SecretStore> =
        Arc::new(MemorySecretStore::with_secret("admin@example.com", "hunter2"));
    let (session, mut rx) = start(settings, secrets);

    session.connect(SessionConfig::new("example.com", "admin").with_password_auth());
    let transcript = run_to_end(&mut rx).await;

    let output = transcript.stdout_text();
    assert!(output.starts_with("pw=hunter2 args=-e "));
    assert!(!output["pw=hunter2".len()..].contains("hunter2"));
    assert!(output.contains("PubkeyAuthentication=no"));
    assert_eq!(
        transcript.last_state(),
        &SessionState::Disconnected(DisconnectReason::Error(SessionError::RemoteAuthRejected))
    );
}

#[tokio::test]
#[serial]
async fn test_script_creation_failure() {
    let dir = TempDir::new().unwrap();
    let mut settings = test_settings(&dir, "exit 0");
    settings.script_dir = dir.path().join("missing");
    let secrets: Arc<dyn SecretStore> =
        Arc::new(MemorySecretStore::with_secret("admin@example.com", "hunter2"));
    let (session, mut rx) = start(settings, secrets);

    session.connect(SessionConfig::new("example.com", "admin").with_password_auth());
    let transcript = run_to_end(&mut rx).await;

    assert!(matches!(
        transcript.last_state(),
        SessionState::Failed(SessionError::ScriptCreationFailed(_))
    ));
}

#[tokio::test]
#[serial]
async fn test_login_script_is_removed_after_session() {
    let dir = TempDir::new().unwrap();
    let scripts = TempDir::new().unwrap();
    let mut settings = test_settings(&dir, "exit 0");
    // Any program works here; the script only has to be handed over.
    settings.expect_program = fake_program(dir.path(), "fake-expect", r#"cat "$2" >/dev/null; exit 0"#)
        .to_string_lossy()
        .into_owned();
    settings.script_dir = scripts.path().to_path_buf();
    let secrets: Arc<dyn SecretStore> =
        Arc::new(MemorySecretStore::with_secret("admin@example.com", "hunter2"));
    let (session, mut rx) = start(settings, secrets);

    session.connect(SessionConfig::new("example.com", "admin").with_password_auth());
    let transcript = run_to_end(&mut rx).await;
    assert_eq!(
        transcript.last_state(),
        &SessionState::Disconnected(DisconnectReason::Exited)
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(std::fs::read_dir(scripts.path()).unwrap().count(), 0);
}

// =============================================================================
// Teardown, keepalive and resize
// =============================================================================

#[tokio::test]
#[serial]
async fn test_disconnect_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let (session, mut rx) = start(test_settings(&dir, "exec cat"), no_secrets());

    session.connect(SessionConfig::new("example.com", "admin"));
    wait_connected(&mut rx).await;

    session.disconnect();
    session.disconnect();
    assert_eq!(
        next_event(&mut rx).await,
        SessionEvent::State(SessionState::Disconnected(DisconnectReason::Requested))
    );
    assert_quiet(&mut rx).await;

    session.send(b"after\n");
    session.disconnect();
    assert_quiet(&mut rx).await;
}

#[tokio::test]
#[serial]
async fn test_disconnect_after_natural_exit_is_noop() {
    let dir = TempDir::new().unwrap();
    let (session, mut rx) = start(test_settings(&dir, "exit 0"), no_secrets());

    session.connect(SessionConfig::new("example.com", "admin"));
    let transcript = run_to_end(&mut rx).await;
    assert_eq!(
        transcript.last_state(),
        &SessionState::Disconnected(DisconnectReason::Exited)
    );

    session.disconnect();
    assert_quiet(&mut rx).await;
    assert_eq!(session.state(), SessionState::Disconnected(DisconnectReason::Exited));
}

#[tokio::test]
#[serial]
async fn test_disconnect_racing_exit_reports_once() {
    let dir = TempDir::new().unwrap();
    let (session, mut rx) = start(test_settings(&dir, "exit 0"), no_secrets());

    session.connect(SessionConfig::new("example.com", "admin"));
    wait_connected(&mut rx).await;
    session.disconnect();

    let transcript = run_to_end(&mut rx).await;
    assert_eq!(transcript.states.len(), 1);
    assert!(matches!(transcript.last_state(), SessionState::Disconnected(_)));
    assert_quiet(&mut rx).await;
}

#[tokio::test]
#[serial]
async fn test_disconnect_terminates_stubborn_child() {
    let dir = TempDir::new().unwrap();
    let (session, mut rx) = start(
        test_settings(&dir, "trap '' TERM; while true; do sleep 1; done"),
        no_secrets(),
    );

    session.connect(SessionConfig::new("example.com", "admin"));
    wait_connected(&mut rx).await;
    session.disconnect();

    assert_eq!(
        next_event(&mut rx).await,
        SessionEvent::State(SessionState::Disconnected(DisconnectReason::Requested))
    );
    assert_quiet(&mut rx).await;
}

#[tokio::test]
#[serial]
async fn test_keepalive_writes_payload() {
    let dir = TempDir::new().unwrap();
    let mut settings = test_settings(&dir, "exec cat");
    settings.keepalive = Some(KeepaliveSettings {
        interval: Duration::from_millis(50),
        payload: b"ka\n".to_vec(),
    });
    let (session, mut rx) = start(settings, no_secrets());

    session.connect(SessionConfig::new("example.com", "admin"));
    wait_connected(&mut rx).await;

    let output = wait_for_output(&mut rx, "ka\nka\n").await;
    assert!(output.starts_with("ka\n"));

    session.disconnect();
    assert_eq!(
        next_event(&mut rx).await,
        SessionEvent::State(SessionState::Disconnected(DisconnectReason::Requested))
    );
    assert_quiet(&mut rx).await;
}

#[tokio::test]
#[serial]
async fn test_resize_notifies_remote_shell() {
    let dir = TempDir::new().unwrap();
    let (session, mut rx) = start(test_settings(&dir, "exec cat"), no_secrets());

    session.connect(SessionConfig::new("example.com", "admin"));
    wait_connected(&mut rx).await;

    session.resize(100, 40);
    wait_for_output(&mut rx, " stty cols 100 rows 40\r").await;
    assert_eq!(session.geometry(), (100, 40));

    session.disconnect();
}

#[tokio::test]
#[serial]
async fn test_resize_without_remote_notification() {
    let dir = TempDir::new().unwrap();
    let mut settings = test_settings(&dir, "exec cat");
    settings.notify_remote_resize = false;
    let (session, mut rx) = start(settings, no_secrets());

    session.connect(SessionConfig::new("example.com", "admin"));
    wait_connected(&mut rx).await;

    session.resize(100, 40);
    assert_quiet(&mut rx).await;
    assert_eq!(session.geometry(), (100, 40));

    session.disconnect();
}

#[tokio::test]
#[serial]
async fn test_keepalive_stops_when_child_exits() {
    let dir = TempDir::new().unwrap();
    // The background reader keeps the pipes open after the shell exits.
    let mut settings = test_settings(&dir, "exec 3<&0; cat <&3 & echo EXITING; exit 0");
    settings.keepalive = Some(KeepaliveSettings {
        interval: Duration::from_millis(300),
        payload: b"KA\n".to_vec(),
    });
    let (session, mut rx) = start(settings, no_secrets());

    session.connect(SessionConfig::new("example.com", "admin"));
    let transcript = run_to_end(&mut rx).await;

    assert_eq!(
        transcript.last_state(),
        &SessionState::Disconnected(DisconnectReason::Exited)
    );
    assert_eq!(transcript.stdout_text(), "EXITING\n");
}

#[tokio::test]
#[serial]
async fn test_resize_while_connecting_reaches_remote() {
    let dir = TempDir::new().unwrap();
    let helper = fake_program(dir.path(), "fake-sshpass", "exec cat");
    let mut settings = test_settings(&dir, "exit 0");
    settings.password_helper = Some(helper.to_string_lossy().into_owned());
    let secrets: Arc<dyn SecretStore> = Arc::new(SlowSecretStore {
        delay: Duration::from_millis(300),
        inner: MemorySecretStore::with_secret("admin@example.com", "hunter2"),
    });
    let (session, mut rx) = start(settings, secrets);

    session.connect(SessionConfig::new("example.com", "admin").with_password_auth());
    assert_eq!(next_event(&mut rx).await, SessionEvent::State(SessionState::Connecting));
    session.resize(100, 40);
    assert_eq!(next_event(&mut rx).await, SessionEvent::State(SessionState::Connected));

    session.resize(100, 40);
    session.send(b"MARK\n");
    let output = wait_for_output(&mut rx, "MARK\n").await;
    assert_eq!(output, " stty cols 100 rows 40\rMARK\n");
    assert_eq!(session.geometry(), (100, 40));

    session.disconnect();
}

// =============================================================================
// Generated login scripts
// =============================================================================

#[tokio::test]
#[serial]
async fn test_script_answers_host_key_and_password() {
    let dir = TempDir::new().unwrap();
    let answers = dir.path().join("answers");
    let body = format!(
        r#"printf 'Are you sure you want to continue connecting (yes/no)? '
read answer
printf 'Password: '
read pw
echo "$answer $pw" >> {}
printf 'admin@host:~$ '
exec cat"#,
        answers.display()
    );
    let Some(settings) = expect_settings(&dir, &body) else {
        return;
    };
    let (session, mut rx) = start(settings, admin_secret());

    session.connect(SessionConfig::new("example.com", "admin").with_password_auth());
    wait_connected(&mut rx).await;
    wait_for_output(&mut rx, "~$ ").await;

    assert_eq!(std::fs::read_to_string(&answers).unwrap(), "yes hunter2\n");
    assert_eq!(session.state(), SessionState::Connected);

    session.disconnect();
    assert_eq!(
        next_event(&mut rx).await,
        SessionEvent::State(SessionState::Disconnected(DisconnectReason::Requested))
    );
}

#[tokio::test]
#[serial]
async fn test_script_hands_over_without_recognised_prompt() {
    let dir = TempDir::new().unwrap();
    let answers = dir.path().join("answers");
    let body = format!(
        r#"printf 'Password: '
read pw
echo "$pw" >> {}
printf 'welcome\r\n\342\235\257 '
exec cat"#,
        answers.display()
    );
    let Some(settings) = expect_settings(&dir, &body) else {
        return;
    };
    let (session, mut rx) = start(settings, admin_secret());

    session.connect(SessionConfig::new("example.com", "admin").with_password_auth());
    wait_connected(&mut rx).await;
    wait_for_output(&mut rx, "welcome").await;

    // Well past the login timeout; the script must have handed over.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(std::fs::read_to_string(&answers).unwrap(), "hunter2\n");

    session.disconnect();
}

#[tokio::test]
#[serial]
async fn test_script_reports_rejected_password() {
    let dir = TempDir::new().unwrap();
    let answers = dir.path().join("answers");
    let body = format!(
        r#"printf 'Password: '
read pw
echo "$pw" >> {}
echo 'Permission denied, please try again.'
sleep 10"#,
        answers.display()
    );
    let Some(settings) = expect_settings(&dir, &body) else {
        return;
    };
    let (session, mut rx) = start(settings, admin_secret());

    session.connect(SessionConfig::new("example.com", "admin").with_password_auth());
    let transcript = run_to_end(&mut rx).await;

    assert_eq!(
        transcript.last_state(),
        &SessionState::Disconnected(DisconnectReason::Error(SessionError::RemoteAuthRejected))
    );
    assert_eq!(std::fs::read_to_string(&answers).unwrap(), "hunter2\n");
}

#[tokio::test]
#[serial]
async fn test_script_times_out_without_prompt() {
    let dir = TempDir::new().unwrap();
    let Some(settings) = expect_settings(&dir, "sleep 10") else {
        return;
    };
    let (session, mut rx) = start(settings, admin_secret());

    session.connect(SessionConfig::new("example.com", "admin").with_password_auth());
    let transcript = run_to_end(&mut rx).await;

    assert_eq!(
        transcript.states,
        vec![
            SessionState::Connecting,
            SessionState::Connected,
            SessionState::Disconnected(DisconnectReason::Error(SessionError::Timeout)),
        ]
    );
}
