//! Delivery of session output and state changes to the UI.

use tokio::sync::mpsc;

use super::state::SessionState;

/// Which child pipe a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Receives everything a session produces.
///
/// Output arrives from background reader tasks. State changes may also be
/// reported on the thread calling `connect` or `disconnect`. Chunks of one
/// stream arrive in order; the two streams are not ordered relative to each
/// other.
///
/// Calls are made while the session's lock is held, which is what keeps
/// output from trailing the final state. Implementations must return
/// promptly without blocking or calling back into the session; slow
/// consumers should hand events off the way [`ChannelSink`] does.
pub trait SessionSink: Send + Sync {
    /// One read from a child pipe, delivered exactly once.
    fn on_bytes(&self, stream: OutputStream, chunk: &[u8]);

    /// One lifecycle transition.
    fn on_state_changed(&self, state: &SessionState);
}

/// An event forwarded by [`ChannelSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Output { stream: OutputStream, data: Vec<u8> },
    State(SessionState),
}

/// Sink that forwards events over an unbounded channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver for its events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Session event receiver dropped");
        }
    }
}

impl SessionSink for ChannelSink {
    fn on_bytes(&self, stream: OutputStream, chunk: &[u8]) {
        self.forward(SessionEvent::Output {
            stream,
            data: chunk.to_vec(),
        });
    }

    fn on_state_changed(&self, state: &SessionState) {
        self.forward(SessionEvent::State(state.clone()));
    }
}
