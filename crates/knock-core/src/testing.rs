//! Deterministic test doubles shared with the workspace test suite.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::Timestamp;
use crate::ports::{EventSink, GateEvent, TimeSource};

/// Time source driven by hand.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    now: AtomicU64,
}

impl ManualTimeSource {
    pub fn new(initial: Timestamp) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicU64::new(initial),
        })
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Event sink that records everything it sees.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<GateEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events, in arrival order.
    pub fn recorded(&self) -> Vec<GateEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingEventSink {
    fn observe(&self, event: GateEvent) {
        self.events.lock().push(event);
    }
}
