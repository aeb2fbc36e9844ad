//! Session telemetry collector.
//!
//! The collector keeps a bounded history of session events plus an async
//! broadcast stream. Each engine owns its collector; the notifier worker
//! publishes delivery failures into the same one.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::sync::broadcast;

use crate::engine::TimeSource;

pub mod events;

pub use events::{EngineEvent, TelemetryRecord};

/// Snapshot of collector state for HTTP/CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<TelemetryRecord>,
    pub total_events: u64,
    pub dropped_events: u64,
}

impl TelemetrySnapshot {
    pub fn count(&self, predicate: impl Fn(&EngineEvent) -> bool) -> usize {
        self.recent.iter().filter(|r| predicate(&r.event)).count()
    }
}

/// Broadcast-based collector retaining a bounded history of events.
pub struct TelemetryCollector {
    tx: broadcast::Sender<TelemetryRecord>,
    history: Mutex<VecDeque<TelemetryRecord>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
    time_source: Arc<dyn TimeSource>,
    start_instant: Instant,
}

impl TelemetryCollector {
    pub fn new(
        buffer: usize,
        history_capacity: usize,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        let start_instant = time_source.now();
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity: history_capacity.max(1),
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
            time_source,
            start_instant,
        }
    }

    pub fn with_time_source(time_source: Arc<dyn TimeSource>) -> Self {
        Self::new(256, 256, time_source)
    }

    pub fn publish(&self, event: EngineEvent) {
        let timestamp_ms = self
            .time_source
            .now()
            .saturating_duration_since(self.start_instant)
            .as_millis() as u64;
        let record = TelemetryRecord {
            timestamp_ms,
            event,
        };

        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = self.lock_history();
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(record.clone());
        }

        let _ = self.tx.send(record);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryRecord> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = self.lock_history();
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }

    fn lock_history(&self) -> MutexGuard<'_, VecDeque<TelemetryRecord>> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
