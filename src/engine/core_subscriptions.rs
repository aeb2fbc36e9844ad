use std::sync::{Arc, RwLock};

use futures::{Stream, StreamExt};
use tokio::runtime::Builder;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::{BroadcastStream, UnboundedReceiverStream};

use crate::calibration::{Baseline, CalibrationProgress};
use crate::engine::FrameOutput;
use crate::managers::BroadcastChannelManager;
use crate::telemetry::{TelemetryCollector, TelemetryRecord, TelemetrySnapshot};

use super::TrainerEngine;

impl TrainerEngine {
    // ========================================================================
    // STREAM SUBSCRIPTIONS
    // ========================================================================

    pub fn subscribe_frames(&self) -> broadcast::Receiver<FrameOutput> {
        self.broadcasts.subscribe_frames()
    }

    pub fn subscribe_calibration(&self) -> broadcast::Receiver<CalibrationProgress> {
        self.broadcasts.subscribe_calibration()
    }

    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetryRecord> {
        self.telemetry.subscribe()
    }

    /// Frame outputs bridged onto an unbounded channel for callers without
    /// a tokio runtime. Lagged frames are skipped.
    pub fn frame_updates(&self) -> mpsc::UnboundedReceiver<FrameOutput> {
        bridge(self.broadcasts.subscribe_frames(), "form-coach-frames")
    }

    pub fn calibration_updates(&self) -> mpsc::UnboundedReceiver<CalibrationProgress> {
        bridge(
            self.broadcasts.subscribe_calibration(),
            "form-coach-calibration",
        )
    }

    // ========================================================================
    // ASYNC STREAM ADAPTERS
    // ========================================================================

    /// Async stream of frame outputs; lagged items are dropped.
    pub fn frame_stream(&self) -> impl Stream<Item = FrameOutput> + Unpin {
        BroadcastStream::new(self.broadcasts.subscribe_frames())
            .filter_map(|item| futures::future::ready(item.ok()))
    }

    pub fn telemetry_stream(&self) -> impl Stream<Item = TelemetryRecord> + Unpin {
        BroadcastStream::new(self.telemetry.subscribe())
            .filter_map(|item| futures::future::ready(item.ok()))
    }

    pub fn calibration_stream(&self) -> impl Stream<Item = CalibrationProgress> + Unpin {
        UnboundedReceiverStream::new(self.calibration_updates())
    }

    // ========================================================================
    // TOOLING HANDLES
    // ========================================================================

    pub fn telemetry_snapshot(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    pub fn telemetry_handle(&self) -> Arc<TelemetryCollector> {
        Arc::clone(&self.telemetry)
    }

    /// Shared channel manager (debug transports subscribe through it).
    pub fn broadcasts(&self) -> BroadcastChannelManager {
        self.broadcasts.clone()
    }

    /// Shared baseline slot, read by fixture tooling.
    pub fn baseline_handle(&self) -> Arc<RwLock<Option<Baseline>>> {
        self.calibration.baseline_handle()
    }

    /// Milliseconds elapsed since the engine was built.
    pub fn uptime_ms(&self) -> u64 {
        self.time_source
            .now()
            .saturating_duration_since(self.start_instant)
            .as_millis() as u64
    }
}

/// Forward a broadcast receiver onto an unbounded channel from a helper
/// thread running its own current-thread runtime.
fn bridge<T: Clone + Send + 'static>(
    mut broadcast_rx: broadcast::Receiver<T>,
    name: &str,
) -> mpsc::UnboundedReceiver<T> {
    let (tx, rx) = mpsc::unbounded_channel();

    let runtime = match Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!("[TrainerEngine] Failed to create bridge runtime: {}", err);
            return rx;
        }
    };

    let spawned = std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    match broadcast_rx.recv().await {
                        Ok(item) => {
                            if tx.send(item).is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            log::debug!("[TrainerEngine] Bridge lagged by {}", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
        });
    if let Err(err) = spawned {
        log::error!("[TrainerEngine] Failed to spawn bridge thread: {}", err);
    }

    rx
}
