//! Periodic keepalive writes to a connected child.

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::settings::KeepaliveSettings;

/// Hands `settings.payload` to `send` every `settings.interval` until
/// `cancel` fires or `send` refuses the payload. The first write happens one
/// full interval after start.
///
/// `send` decides under the session's own synchronization whether the child
/// may still receive input, so a refusal ends the task.
pub fn spawn_keepalive<F>(
    session_id: String,
    settings: KeepaliveSettings,
    send: F,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    F: Fn(Vec<u8>) -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + settings.interval, settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if !send(settings.payload.clone()) {
                        break;
                    }
                    tracing::trace!(session_id = %session_id, "Sent keepalive");
                }
            }
        }

        tracing::debug!(session_id = %session_id, "Keepalive stopped");
    })
}
