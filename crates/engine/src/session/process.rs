//! Child-process-backed remote shell sessions.
//!
//! A [`ProcessSession`] owns at most one ssh child at a time. The public
//! methods only take a short lock and hand work to background tasks, so they
//! never block their caller. Every way an attempt can end (natural exit,
//! `disconnect()`, spawn failure) goes through one transition function
//! guarded by an attempt generation, so the terminal state is reported
//! exactly once.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::secrets::SecretStore;

use super::command::{find_password_helper, LaunchPlan};
use super::connection::{AuthMethod, SessionConfig};
use super::keepalive::spawn_keepalive;
use super::script::CredentialScript;
use super::settings::SessionSettings;
use super::sink::{OutputStream, SessionSink};
use super::state::{DisconnectReason, SessionError, SessionState};

/// Buffer size for reading from child pipes.
const READ_BUFFER_SIZE: usize = 4096;

/// How long output is drained after the child exits before reporting it.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Bookkeeping for the current connection attempt.
struct Attempt {
    cancel: CancellationToken,
    /// Present once the child is running.
    input: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

struct Shared {
    state: SessionState,
    generation: u64,
    cols: u16,
    rows: u16,
    /// Geometry the remote shell was last told about.
    announced: (u16, u16),
    attempt: Option<Attempt>,
}

struct Inner {
    id: String,
    settings: SessionSettings,
    secrets: Arc<dyn SecretStore>,
    sink: Arc<dyn SessionSink>,
    shared: Mutex<Shared>,
}

/// One remote shell session driven through an external ssh client.
///
/// `connect` and friends must be called from within a tokio runtime. The
/// sink is invoked while the session's internal lock is held and must
/// neither block nor call back into the session; see [`SessionSink`].
pub struct ProcessSession {
    inner: Arc<Inner>,
}

impl ProcessSession {
    /// Creates an idle session. `id` is also the key used to look up the
    /// password in `secrets`.
    pub fn new(
        id: impl Into<String>,
        settings: SessionSettings,
        secrets: Arc<dyn SecretStore>,
        sink: Arc<dyn SessionSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: id.into(),
                settings,
                secrets,
                sink,
                shared: Mutex::new(Shared {
                    state: SessionState::Idle,
                    generation: 0,
                    cols: 80,
                    rows: 24,
                    announced: (80, 24),
                    attempt: None,
                }),
            }),
        }
    }

    /// The session identifier.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.inner.lock().state.clone()
    }

    /// The last known terminal geometry as `(cols, rows)`.
    pub fn geometry(&self) -> (u16, u16) {
        let shared = self.inner.lock();
        (shared.cols, shared.rows)
    }

    /// Starts a connection attempt. No-op while connecting or connected.
    pub fn connect(&self, config: SessionConfig) {
        let inner = &self.inner;
        let mut shared = inner.lock();

        if shared.state.is_active() {
            tracing::debug!(session_id = %inner.id, state = %shared.state, "Connect ignored");
            return;
        }

        shared.generation += 1;
        let generation = shared.generation;
        let cancel = CancellationToken::new();
        shared.cols = config.terminal_cols;
        shared.rows = config.terminal_rows;
        shared.announced = (config.terminal_cols, config.terminal_rows);
        shared.attempt = Some(Attempt {
            cancel: cancel.clone(),
            input: None,
        });

        tracing::info!(
            session_id = %inner.id,
            destination = %config.destination(),
            auth = ?config.auth_method,
            "Connecting"
        );
        inner.set_state(&mut shared, SessionState::Connecting);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            let error = SessionError::SpawnFailed("no async runtime available".to_string());
            inner.end_attempt(&mut shared, SessionState::Failed(error));
            return;
        };
        drop(shared);

        runtime.spawn(Arc::clone(inner).drive(generation, config, cancel));
    }

    /// Writes bytes to the child's stdin. Dropped unless connected.
    pub fn send(&self, bytes: &[u8]) {
        let shared = self.inner.lock();
        if !self.inner.queue_input(&shared, bytes.to_vec()) {
            tracing::trace!(session_id = %self.inner.id, len = bytes.len(), "Input dropped");
        }
    }

    /// Records the new geometry and, when connected, asks the remote shell
    /// to adopt it. The remote side may ignore the request. A size recorded
    /// while connecting is sent once the session connects.
    pub fn resize(&self, cols: u16, rows: u16) {
        if cols == 0 || rows == 0 {
            return;
        }

        let mut shared = self.inner.lock();
        shared.cols = cols;
        shared.rows = rows;
        self.inner.announce_geometry(&mut shared);
    }

    /// Ends the current attempt. Safe to call repeatedly and concurrently
    /// with the child exiting on its own.
    pub fn disconnect(&self) {
        let mut shared = self.inner.lock();
        if !shared.state.is_active() {
            return;
        }
        tracing::info!(session_id = %self.inner.id, "Disconnect requested");
        self.inner
            .end_attempt(&mut shared, SessionState::Disconnected(DisconnectReason::Requested));
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, shared: &mut Shared, state: SessionState) {
        shared.state = state;
        self.sink.on_state_changed(&shared.state);
    }

    /// Moves to a terminal state and tears down the attempt's tasks.
    fn end_attempt(&self, shared: &mut Shared, state: SessionState) {
        if let Some(attempt) = shared.attempt.take() {
            attempt.cancel.cancel();
        }
        match &state {
            SessionState::Failed(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "Session failed");
            }
            other => tracing::info!(session_id = %self.id, state = %other, "Session ended"),
        }
        self.set_state(shared, state);
    }

    /// Ends attempt `generation` unless it already ended or was superseded.
    fn finish(&self, generation: u64, state: SessionState) -> bool {
        let mut shared = self.lock();
        if shared.generation != generation || !shared.state.is_active() {
            return false;
        }
        self.end_attempt(&mut shared, state);
        true
    }

    /// Connecting -> Connected for attempt `generation`.
    fn mark_connected(&self, generation: u64, input: mpsc::UnboundedSender<Vec<u8>>) -> bool {
        let mut shared = self.lock();
        if shared.generation != generation || shared.state != SessionState::Connecting {
            return false;
        }
        if let Some(attempt) = shared.attempt.as_mut() {
            attempt.input = Some(input);
        }
        tracing::info!(session_id = %self.id, "Connected");
        self.set_state(&mut shared, SessionState::Connected);
        self.announce_geometry(&mut shared);
        true
    }

    /// Stops accepting input for attempt `generation` once its child exited.
    fn close_input(&self, generation: u64) {
        let mut shared = self.lock();
        if shared.generation != generation {
            return;
        }
        if let Some(attempt) = shared.attempt.as_mut() {
            attempt.input = None;
        }
    }

    /// Tells the remote shell about the stored geometry if it differs from
    /// what it was last told.
    fn announce_geometry(&self, shared: &mut Shared) {
        let (cols, rows) = (shared.cols, shared.rows);
        if !self.settings.notify_remote_resize || shared.announced == (cols, rows) {
            return;
        }
        let command = format!(" stty cols {cols} rows {rows}\r").into_bytes();
        if self.queue_input(shared, command) {
            shared.announced = (cols, rows);
            tracing::debug!(session_id = %self.id, cols, rows, "Requested remote resize");
        }
    }

    /// Queues input for attempt `generation` only.
    fn queue_for(&self, generation: u64, bytes: Vec<u8>) -> bool {
        let shared = self.lock();
        shared.generation == generation && self.queue_input(&shared, bytes)
    }

    fn queue_input(&self, shared: &Shared, bytes: Vec<u8>) -> bool {
        if shared.state != SessionState::Connected {
            return false;
        }
        shared
            .attempt
            .as_ref()
            .and_then(|attempt| attempt.input.as_ref())
            .is_some_and(|input| input.send(bytes).is_ok())
    }

    /// Background task for one attempt.
    async fn drive(self: Arc<Self>, generation: u64, config: SessionConfig, cancel: CancellationToken) {
        let (plan, script) = match self.prepare(config).await {
            Ok(prepared) => prepared,
            Err(e) => {
                self.finish(generation, SessionState::Failed(e));
                return;
            }
        };

        if cancel.is_cancelled() {
            return;
        }

        tracing::debug!(session_id = %self.id, command = %plan.display(), "Spawning child");

        let mut child = match spawn_child(&plan) {
            Ok(child) => child,
            Err(e) => {
                self.finish(generation, SessionState::Failed(SessionError::SpawnFailed(e.to_string())));
                return;
            }
        };

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            terminate(&mut child, self.settings.kill_grace).await;
            let error = SessionError::SpawnFailed("child pipes unavailable".to_string());
            self.finish(generation, SessionState::Failed(error));
            return;
        };

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        if !self.mark_connected(generation, input_tx) {
            terminate(&mut child, self.settings.kill_grace).await;
            return;
        }

        tokio::spawn(write_input(self.id.clone(), stdin, input_rx, cancel.clone()));
        let readers = [
            Arc::clone(&self).spawn_reader(generation, OutputStream::Stdout, stdout, cancel.clone()),
            Arc::clone(&self).spawn_reader(generation, OutputStream::Stderr, stderr, cancel.clone()),
        ];
        let keepalive_cancel = cancel.child_token();
        if let Some(keepalive) = self.settings.keepalive.clone() {
            let inner = Arc::clone(&self);
            spawn_keepalive(
                self.id.clone(),
                keepalive,
                move |payload| inner.queue_for(generation, payload),
                keepalive_cancel.clone(),
            );
        }

        let status = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel.cancelled() => None,
        };
        self.close_input(generation);
        keepalive_cancel.cancel();

        match status {
            Some(Ok(status)) => {
                let deadline = tokio::time::Instant::now() + OUTPUT_DRAIN_TIMEOUT;
                for reader in readers {
                    let _ = tokio::time::timeout_at(deadline, reader).await;
                }
                tracing::debug!(session_id = %self.id, status = %status, "Child exited");
                let reason = plan.classify_exit(status.code());
                self.finish(generation, SessionState::Disconnected(reason));
            }
            Some(Err(e)) => {
                tracing::error!(session_id = %self.id, error = %e, "Failed to wait for child");
                terminate(&mut child, self.settings.kill_grace).await;
                let reason = DisconnectReason::Error(SessionError::UnexpectedExit(-1));
                self.finish(generation, SessionState::Disconnected(reason));
            }
            None => terminate(&mut child, self.settings.kill_grace).await,
        }

        cancel.cancel();
        drop(script);
    }

    /// Resolves credentials and builds the child invocation.
    async fn prepare(
        &self,
        config: SessionConfig,
    ) -> Result<(LaunchPlan, Option<CredentialScript>), SessionError> {
        config
            .validate()
            .map_err(|e| SessionError::SpawnFailed(e.to_string()))?;

        if config.auth_method == AuthMethod::PublicKey {
            return Ok((LaunchPlan::direct(&config, &self.settings), None));
        }

        let secrets = Arc::clone(&self.secrets);
        let id = self.id.clone();
        let secret = tokio::task::spawn_blocking(move || secrets.get(&id))
            .await
            .ok()
            .flatten()
            .ok_or(SessionError::AuthMissing)?;

        let settings = self.settings.clone();
        let prepared = tokio::task::spawn_blocking(move || -> Result<_, SessionError> {
            if let Some(helper) = find_password_helper(&settings) {
                return Ok((LaunchPlan::with_helper(&helper, &secret, &config, &settings), None));
            }
            let script = CredentialScript::create(&secret, &config, &settings)?;
            let plan = LaunchPlan::with_script(script.path(), &config, &settings);
            Ok((plan, Some(script)))
        })
        .await
        .map_err(|e| SessionError::ScriptCreationFailed(e.to_string()))??;

        if let Some(script) = &prepared.1 {
            script.schedule_removal(self.settings.script_ttl);
        }
        Ok(prepared)
    }

    /// Hands a chunk to the sink unless attempt `generation` has ended.
    fn deliver(&self, generation: u64, stream: OutputStream, chunk: &[u8]) -> bool {
        let shared = self.lock();
        if shared.generation != generation || !shared.state.is_active() {
            return false;
        }
        self.sink.on_bytes(stream, chunk);
        true
    }

    fn spawn_reader<R>(
        self: Arc<Self>,
        generation: u64,
        stream: OutputStream,
        mut reader: R,
        cancel: CancellationToken,
    ) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let mut buffer = vec![0u8; READ_BUFFER_SIZE];
            loop {
                let read = tokio::select! {
                    _ = cancel.cancelled() => break,
                    read = reader.read(&mut buffer) => read,
                };
                match read {
                    Ok(0) => break,
                    Ok(n) => {
                        if !self.deliver(generation, stream, &buffer[..n]) {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(session_id = %self.id, ?stream, error = %e, "Read failed");
                        break;
                    }
                }
            }
            tracing::trace!(session_id = %self.id, ?stream, "Reader stopped");
        })
    }
}

fn spawn_child(plan: &LaunchPlan) -> std::io::Result<Child> {
    Command::new(&plan.program)
        .args(&plan.args)
        .envs(plan.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
}

async fn write_input(
    session_id: String,
    mut stdin: ChildStdin,
    mut input: mpsc::UnboundedReceiver<Vec<u8>>,
    cancel: CancellationToken,
) {
    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => break,
            chunk = input.recv() => match chunk {
                Some(chunk) => chunk,
                None => break,
            },
        };

        let written = tokio::select! {
            _ = cancel.cancelled() => break,
            written = async {
                stdin.write_all(&chunk).await?;
                stdin.flush().await
            } => written,
        };

        if let Err(e) = written {
            tracing::debug!(session_id = %session_id, error = %e, "Write to child failed");
            break;
        }
    }
}

/// SIGTERM, then kill once `grace` runs out.
async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) {
            if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
                tracing::debug!(pid, error = %e, "SIGTERM failed");
            }
            if tokio::time::timeout(grace, child.wait()).await.is_ok() {
                return;
            }
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "Kill failed");
    }
    let _ = child.wait().await;
}
