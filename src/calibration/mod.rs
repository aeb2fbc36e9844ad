// Calibration module - baseline capture for the user's starting posture
//
// This module provides:
// - CalibrationAccumulator: running per-metric sums over the calibration window
// - Baseline: the averaged reference posture plus the derived displacement target
// - CalibrationProgress: progress snapshots for UI streams

pub mod accumulator;
pub mod baseline;
pub mod progress;

pub use accumulator::{CalibrationAccumulator, CalibrationPhase, FinalizeReason};
pub use baseline::Baseline;
pub use progress::{CalibrationProgress, CalibrationStatus};
