//! Fire-and-forget unlock notifications.
//!
//! Decisions are already returned by the time a notification is
//! dispatched, so delivery is best-effort by design: the channel is
//! bounded and a full or closed channel drops the message with a
//! warning rather than blocking the decision path.

use tokio::sync::mpsc;

/// Outbound notification channel implementation.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Notifier that only writes to the log. Stands in for an external
/// messaging integration.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        tracing::info!(%message, "notification");
    }
}

/// Clone-safe sending side of the notification channel.
#[derive(Clone)]
pub struct NotifyHandle {
    tx: mpsc::Sender<String>,
}

impl NotifyHandle {
    /// Enqueue a message without waiting. Dropped on overflow.
    pub fn send(&self, message: String) {
        if let Err(error) = self.tx.try_send(message) {
            tracing::warn!(%error, "notification dropped");
        }
    }
}

/// Spawn the notification worker on the current tokio runtime.
pub fn spawn_notifier(notifier: Box<dyn Notifier>, buffer: usize) -> NotifyHandle {
    let (tx, mut rx) = mpsc::channel::<String>(buffer.max(1));
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            notifier.notify(&message);
        }
        tracing::debug!("notifier worker exiting");
    });
    NotifyHandle { tx }
}
