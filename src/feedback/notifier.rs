//! Rate-limited, non-blocking speech notifier.
//!
//! Producers call [`Notifier::speak`] from the frame loop. The rate gate runs
//! on the caller's thread so the accept/reject answer is immediate; accepted
//! messages go through an unbounded FIFO channel to a dedicated worker thread
//! that owns the sink. A `Stop` command queued behind pending messages ends
//! the worker after they have been delivered.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::NotifierConfig;
use crate::engine::TimeSource;
use crate::error::{log_delivery_error, DeliveryError, ErrorCode};
use crate::feedback::{FeedbackMessage, Priority, RateGate, SpeechSink};
use crate::telemetry::{EngineEvent, TelemetryCollector};

enum NotifierCommand {
    Deliver(FeedbackMessage),
    Stop,
}

#[derive(Debug, Default)]
struct NotifierStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Counters since the notifier started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierStatsSnapshot {
    pub accepted: u64,
    pub rejected: u64,
    pub delivered: u64,
    pub failed: u64,
}

impl NotifierStatsSnapshot {
    /// Accepted messages not yet delivered or failed.
    pub fn pending(&self) -> u64 {
        self.accepted
            .saturating_sub(self.delivered + self.failed)
    }
}

pub struct Notifier {
    tx: mpsc::UnboundedSender<NotifierCommand>,
    gate: Mutex<RateGate>,
    time_source: Arc<dyn TimeSource>,
    telemetry: Option<Arc<TelemetryCollector>>,
    stats: Arc<NotifierStats>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl Notifier {
    /// Start the worker thread that owns `sink`.
    ///
    /// # Errors
    /// `WorkerUnavailable` if the runtime or thread cannot be created
    pub fn spawn(
        sink: Box<dyn SpeechSink>,
        config: &NotifierConfig,
        time_source: Arc<dyn TimeSource>,
        telemetry: Option<Arc<TelemetryCollector>>,
    ) -> Result<Self, DeliveryError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(NotifierStats::default());

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| DeliveryError::WorkerUnavailable {
                reason: format!("failed to create runtime: {}", err),
            })?;

        let worker_stats = Arc::clone(&stats);
        let worker_telemetry = telemetry.clone();
        let handle = std::thread::Builder::new()
            .name("form-coach-notifier".to_string())
            .spawn(move || {
                rt.block_on(run_worker(rx, sink, worker_stats, worker_telemetry));
            })
            .map_err(|err| DeliveryError::WorkerUnavailable {
                reason: format!("failed to spawn worker: {}", err),
            })?;

        Ok(Self {
            tx,
            gate: Mutex::new(RateGate::new(config)),
            time_source,
            telemetry,
            stats,
            worker: Mutex::new(Some(handle)),
            stopped: AtomicBool::new(false),
        })
    }

    /// Offer a message.
    ///
    /// # Returns
    /// `true` if the message was accepted and enqueued, `false` if the rate
    /// gate rejected it or the notifier is shut down
    pub fn speak(&self, text: &str, priority: Priority, message_type: &str) -> bool {
        self.submit(FeedbackMessage::new(text, priority, message_type))
    }

    pub fn submit(&self, message: FeedbackMessage) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            return false;
        }

        let now = self.time_source.now();
        // held until the send settles so concurrent producers see one stamp
        let mut gate = self.lock_gate();
        if !gate.allows(&message.message_type, message.priority, now) {
            drop(gate);
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            if let Some(telemetry) = &self.telemetry {
                telemetry.publish(EngineEvent::MessageRejected {
                    message_type: message.message_type.clone(),
                    priority: message.priority,
                });
            }
            return false;
        }

        log::debug!(
            "[Notifier] accepted {:?} '{}': {}",
            message.priority,
            message.message_type,
            message.text
        );
        let message_type = message.message_type.clone();
        if self.tx.send(NotifierCommand::Deliver(message)).is_err() {
            log::warn!("[Notifier] worker gone, dropping message");
            return false;
        }
        gate.stamp(&message_type, now);
        drop(gate);
        self.stats.accepted.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn stats(&self) -> NotifierStatsSnapshot {
        NotifierStatsSnapshot {
            accepted: self.stats.accepted.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }

    /// Queue the stop sentinel and wait for the worker to drain and exit.
    ///
    /// Idempotent. Later `speak` calls return `false`.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(NotifierCommand::Stop);

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("[Notifier] worker thread panicked");
            }
        }
        log::debug!("[Notifier] stopped: {:?}", self.stats());
    }

    fn lock_gate(&self) -> MutexGuard<'_, RateGate> {
        self.gate.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<NotifierCommand>,
    mut sink: Box<dyn SpeechSink>,
    stats: Arc<NotifierStats>,
    telemetry: Option<Arc<TelemetryCollector>>,
) {
    tracing::debug!(sink = sink.name(), "notifier worker started");

    while let Some(command) = rx.recv().await {
        match command {
            NotifierCommand::Deliver(message) => match sink.deliver(&message) {
                Ok(()) => {
                    stats.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    log_delivery_error(&err, "notifier worker");
                    tracing::warn!(
                        message_type = %message.message_type,
                        code = err.code(),
                        "message dropped"
                    );
                    if let Some(telemetry) = &telemetry {
                        telemetry.publish(EngineEvent::DeliveryFailed {
                            code: err.code(),
                            message_type: message.message_type.clone(),
                            reason: err.message(),
                        });
                    }
                }
            },
            NotifierCommand::Stop => break,
        }
    }

    sink.close();
    tracing::debug!("notifier worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ManualTimeSource;
    use crate::feedback::MemorySink;
    use std::time::Duration;

    fn notifier(sink: MemorySink) -> (Notifier, Arc<ManualTimeSource>) {
        let clock = Arc::new(ManualTimeSource::new());
        let notifier = Notifier::spawn(
            Box::new(sink),
            &NotifierConfig::default(),
            clock.clone(),
            None,
        )
        .unwrap();
        (notifier, clock)
    }

    #[test]
    fn test_speak_applies_rate_gate() {
        let sink = MemorySink::new();
        let handle = sink.handle();
        let (n, clock) = notifier(sink);

        assert!(n.speak("Keep your pelvis still", Priority::High, "pelvis_shift"));
        clock.advance(Duration::from_millis(500));
        assert!(!n.speak("Keep your pelvis still", Priority::High, "pelvis_shift"));
        clock.advance(Duration::from_millis(400));
        assert!(n.speak("Keep your pelvis still", Priority::High, "pelvis_shift"));

        n.shutdown();
        assert_eq!(handle.delivered().len(), 2);
        let stats = n.stats();
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.pending(), 0);
    }

    #[test]
    fn test_delivery_is_fifo() {
        let sink = MemorySink::new().with_delay(Duration::from_millis(5));
        let handle = sink.handle();
        let (n, _) = notifier(sink);

        for i in 0..5 {
            assert!(n.speak(&format!("m{}", i), Priority::Normal, &format!("t{}", i)));
        }
        n.shutdown();
        assert_eq!(handle.texts(), vec!["m0", "m1", "m2", "m3", "m4"]);
        assert!(handle.is_closed());
    }

    #[test]
    fn test_speak_after_shutdown_returns_false() {
        let sink = MemorySink::new();
        let handle = sink.handle();
        let (n, _) = notifier(sink);
        n.shutdown();
        n.shutdown();
        assert!(!n.speak("late", Priority::High, "late"));
        assert!(!n.is_running());
        assert!(handle.delivered().is_empty());
    }

    #[test]
    fn test_failed_delivery_does_not_stop_worker() {
        let sink = MemorySink::new().failing_for(&["hip_roll"]);
        let handle = sink.handle();
        let clock = Arc::new(ManualTimeSource::new());
        let telemetry = Arc::new(TelemetryCollector::with_time_source(clock.clone()));
        let n = Notifier::spawn(
            Box::new(sink),
            &NotifierConfig::default(),
            clock,
            Some(Arc::clone(&telemetry)),
        )
        .unwrap();

        assert!(n.speak("Keep hips stacked", Priority::High, "hip_roll"));
        assert!(n.speak("Keep your pelvis still", Priority::High, "pelvis_shift"));
        n.shutdown();

        assert_eq!(handle.types(), vec!["pelvis_shift"]);
        assert_eq!(n.stats().failed, 1);
        let failures = telemetry
            .snapshot()
            .count(|e| matches!(e, EngineEvent::DeliveryFailed { .. }));
        assert_eq!(failures, 1);
    }

    #[test]
    fn test_speak_does_not_wait_for_slow_sink() {
        let sink = MemorySink::new().with_delay(Duration::from_millis(200));
        let (n, _) = notifier(sink);
        let started = std::time::Instant::now();
        for i in 0..3 {
            n.speak("slow", Priority::Low, &format!("t{}", i));
        }
        assert!(started.elapsed() < Duration::from_millis(150));
        n.shutdown();
    }

    struct PanickingSink;

    impl SpeechSink for PanickingSink {
        fn deliver(&mut self, _message: &FeedbackMessage) -> Result<(), DeliveryError> {
            panic!("speech backend crashed");
        }

        fn name(&self) -> &'static str {
            "panicking"
        }
    }

    #[test]
    fn test_message_dropped_by_dead_worker_leaves_gate_open() {
        let clock = Arc::new(ManualTimeSource::new());
        let n = Notifier::spawn(
            Box::new(PanickingSink),
            &NotifierConfig::default(),
            clock.clone(),
            None,
        )
        .unwrap();

        assert!(n.speak("first", Priority::Normal, "guidance"));
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !n.tx.is_closed() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(n.tx.is_closed());

        assert!(!n.speak("Keep hips stacked", Priority::High, "hip_roll"));
        assert!(n.lock_gate().allows("hip_roll", Priority::High, clock.now()));
        assert_eq!(n.stats().accepted, 1);
        assert_eq!(n.stats().rejected, 0);
    }
}
