// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::calibration::CalibrationProgress;
use crate::engine::FrameOutput;

/// Manages the engine's tokio broadcast channels
///
/// # Channel Types
/// - Frames: per-frame output for transport subscribers (UI, SSE)
/// - Calibration: progress updates while a calibration window is open
///
/// Channels are created lazily; publishing with no subscriber is a no-op.
#[derive(Clone)]
pub struct BroadcastChannelManager {
    frames: Arc<Mutex<Option<broadcast::Sender<FrameOutput>>>>,
    calibration: Arc<Mutex<Option<broadcast::Sender<CalibrationProgress>>>>,
}

impl BroadcastChannelManager {
    pub fn new() -> Self {
        Self {
            frames: Arc::new(Mutex::new(None)),
            calibration: Arc::new(Mutex::new(None)),
        }
    }

    // ========================================================================
    // FRAME CHANNEL
    // ========================================================================

    /// Initialize the frame output channel.
    ///
    /// Buffer size: 120 messages (four seconds at 30 fps); lagging
    /// subscribers lose the oldest outputs.
    pub fn init_frames(&self) -> broadcast::Sender<FrameOutput> {
        let mut slot = lock(&self.frames);
        if let Some(tx) = slot.as_ref() {
            return tx.clone();
        }
        let (tx, _) = broadcast::channel(120);
        *slot = Some(tx.clone());
        tx
    }

    pub fn subscribe_frames(&self) -> broadcast::Receiver<FrameOutput> {
        self.init_frames().subscribe()
    }

    pub fn get_frames_sender(&self) -> Option<broadcast::Sender<FrameOutput>> {
        lock(&self.frames).clone()
    }

    /// Publish one output if anyone ever subscribed.
    pub fn publish_frame(&self, output: &FrameOutput) {
        if let Some(tx) = lock(&self.frames).as_ref() {
            if tx.receiver_count() > 0 {
                let _ = tx.send(output.clone());
            }
        }
    }

    // ========================================================================
    // CALIBRATION CHANNEL
    // ========================================================================

    /// Initialize the calibration progress channel.
    ///
    /// Buffer size: 50 messages (a full 30-frame window with margin).
    pub fn init_calibration(&self) -> broadcast::Sender<CalibrationProgress> {
        let mut slot = lock(&self.calibration);
        if let Some(tx) = slot.as_ref() {
            return tx.clone();
        }
        let (tx, _) = broadcast::channel(50);
        *slot = Some(tx.clone());
        tx
    }

    pub fn subscribe_calibration(&self) -> broadcast::Receiver<CalibrationProgress> {
        self.init_calibration().subscribe()
    }

    pub fn get_calibration_sender(&self) -> Option<broadcast::Sender<CalibrationProgress>> {
        lock(&self.calibration).clone()
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
