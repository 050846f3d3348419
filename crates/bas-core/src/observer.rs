// SPDX-License-Identifier: MIT OR Apache-2.0
//! Best-effort external observers (e.g. a fan-out feeding live progress UIs).

use std::fmt;
use std::sync::Arc;

/// Fire-and-forget sink for job events and progress updates.
///
/// Implementations must not block. Errors are logged by the caller and never
/// affect job state.
pub trait EventObserver: Send + Sync {
    /// Deliver one notification.
    fn emit(
        &self,
        event_type: &str,
        payload: serde_json::Value,
        level: &str,
        source: &str,
    ) -> anyhow::Result<()>;
}

/// Optional observer attached to a job.
///
/// Cloning shares the observer; an empty slot silently drops notifications.
#[derive(Clone, Default)]
pub struct ObserverSlot(Option<Arc<dyn EventObserver>>);

impl ObserverSlot {
    /// Slot holding `observer`.
    pub fn new(observer: Arc<dyn EventObserver>) -> Self {
        Self(Some(observer))
    }

    /// Returns `true` if an observer is attached.
    pub fn is_attached(&self) -> bool {
        self.0.is_some()
    }

    /// Forward to the observer, swallowing and logging any failure.
    pub fn notify(&self, event_type: &str, payload: serde_json::Value, level: &str) {
        let Some(observer) = &self.0 else {
            return;
        };
        if let Err(e) = observer.emit(event_type, payload, level, crate::EVENT_SOURCE) {
            tracing::warn!(
                target: "bas.observer",
                event_type,
                error = %e,
                "observer notification failed"
            );
        }
    }
}

impl From<Option<Arc<dyn EventObserver>>> for ObserverSlot {
    fn from(value: Option<Arc<dyn EventObserver>>) -> Self {
        Self(value)
    }
}

impl fmt::Debug for ObserverSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSlot")
            .field("attached", &self.is_attached())
            .finish()
    }
}
