// SPDX-License-Identifier: MIT OR Apache-2.0
//! Broadcast fan-out for job notifications.
//!
//! [`BroadcastObserver`] plugs into the engine as its [`EventObserver`] and
//! republishes every notification to any number of subscribers (for example
//! a websocket layer feeding live progress views).

use bas_core::EventObserver;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

/// One notification as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// `simulation_event` or `simulation_progress`.
    pub event_type: String,
    /// Job counters, plus the event for `simulation_event`.
    pub payload: serde_json::Value,
    /// Lower-case severity level.
    pub level: String,
    /// Emitting component.
    pub source: String,
}

#[derive(Debug, Default)]
struct Stats {
    published: AtomicU64,
    dropped: AtomicU64,
}

/// Tokio broadcast-backed [`EventObserver`].
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    tx: broadcast::Sender<Notification>,
    stats: Arc<Stats>,
}

impl BroadcastObserver {
    /// Observer with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Observer with the given channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            stats: Arc::new(Stats::default()),
        }
    }

    /// Receive notifications published from now on.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total notifications published.
    pub fn published(&self) -> u64 {
        self.stats.published.load(Ordering::Relaxed)
    }

    /// Notifications nobody received, either for lack of subscribers or lag.
    pub fn dropped(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }
}

impl Default for BroadcastObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl EventObserver for BroadcastObserver {
    fn emit(
        &self,
        event_type: &str,
        payload: serde_json::Value,
        level: &str,
        source: &str,
    ) -> anyhow::Result<()> {
        self.stats.published.fetch_add(1, Ordering::Relaxed);
        let note = Notification {
            event_type: event_type.to_string(),
            payload,
            level: level.to_string(),
            source: source.to_string(),
        };
        if self.tx.send(note).is_err() {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

/// Receiving half of a [`BroadcastObserver`].
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<Notification>,
    stats: Arc<Stats>,
}

impl Subscription {
    /// Next notification; `None` once every observer handle is gone.
    /// Lagged notifications are skipped and counted as dropped.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.rx.recv().await {
                Ok(n) => return Some(n),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.stats.dropped.fetch_add(n, Ordering::Relaxed);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<Notification> {
        loop {
            match self.rx.try_recv() {
                Ok(n) => return Some(n),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    self.stats.dropped.fetch_add(n, Ordering::Relaxed);
                }
                Err(_) => return None,
            }
        }
    }
}
