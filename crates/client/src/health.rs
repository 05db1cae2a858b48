//! Push channel health indicator.
//!
//! A single owned status value shared by every push session. Observers
//! (a status badge, tests) read it through a [`tokio::sync::watch`]
//! receiver.

use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushStatus {
    /// No push session has connected yet.
    Idle,
    /// The most recent push handshake succeeded.
    Connected,
    /// A push session hit a transport error; results now depend on polling.
    Degraded,
}

#[derive(Debug, Clone)]
pub struct ChannelHealth {
    tx: watch::Sender<PushStatus>,
}

impl ChannelHealth {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PushStatus::Idle);
        Self { tx }
    }

    pub fn current(&self) -> PushStatus {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PushStatus> {
        self.tx.subscribe()
    }

    pub fn mark_connected(&self) {
        self.set(PushStatus::Connected);
    }

    pub fn mark_degraded(&self) {
        self.set(PushStatus::Degraded);
    }

    fn set(&self, status: PushStatus) {
        self.tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            tracing::debug!(from = ?*current, to = ?status, "Push channel health changed");
            *current = status;
            true
        });
    }
}

impl Default for ChannelHealth {
    fn default() -> Self {
        Self::new()
    }
}
