use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::cluster::ErrorEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// A transient, user-facing message. `key` is unique per occurrence so a
/// renderer can show repeated identical messages without coalescing them.
#[derive(Debug, Clone)]
pub struct Notification {
    pub key: String,
    pub message: String,
    pub severity: Severity,
}

/// In-memory notification sink shared between producers and the renderer.
#[derive(Clone, Default)]
pub struct NotificationStore {
    entries: Arc<Mutex<Vec<Notification>>>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, notification: Notification) {
        self.entries.lock().unwrap().push(notification);
    }

    /// Drain everything accumulated since the last call.
    pub fn take_all(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.entries.lock().unwrap())
    }
}

/// Turn every refresh error event into one notification entry.
///
/// Runs until the store side of the error channel is dropped. A lagged
/// receiver skips the overwritten events and keeps going.
pub async fn forward_errors(mut events: broadcast::Receiver<ErrorEvent>, sink: NotificationStore) {
    loop {
        match events.recv().await {
            Ok(event) => {
                log::debug!("Got refresh error event {}", event.occurrence);
                sink.push(Notification {
                    key: event.key(),
                    message: event.error.to_string(),
                    severity: Severity::Error,
                });
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("Notification forwarder lagged, {skipped} error events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
