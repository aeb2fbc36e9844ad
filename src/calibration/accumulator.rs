// CalibrationAccumulator - running sums over the calibration window
//
// Lifecycle: created when calibration begins, fed once per valid frame while
// ACCUMULATING, and converted into a Baseline exactly once. Sums are kept per
// metric with their own sample counts so a metric that was unavailable on some
// frames is averaged only over the frames where it was seen.

use std::time::{Duration, Instant};

use crate::calibration::{Baseline, CalibrationProgress, CalibrationStatus};
use crate::config::CalibrationConfig;
use crate::error::CalibrationError;
use crate::pose::MetricSample;

/// Calibration window state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Accumulating,
    Finalized,
}

/// Why a window was (or may be) finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeReason {
    /// Target frame count reached
    TargetReached,
    /// Timeout elapsed with at least the minimum partial frame count
    PartialTimeout,
    /// Caller forced finalization
    Forced,
}

#[derive(Debug, Clone, Copy, Default)]
struct RunningMean {
    sum: f64,
    count: u32,
}

impl RunningMean {
    fn add(&mut self, value: Option<f64>) {
        if let Some(value) = value.filter(|v| v.is_finite()) {
            self.sum += value;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationAccumulator {
    pelvis_x: RunningMean,
    tracked_joint_y: RunningMean,
    torso_angle: RunningMean,
    hip_spread: RunningMean,
    frames: u32,
    setup_passes: u32,
    target_frames: u32,
    frame_width: u32,
    frame_height: u32,
    started_at: Instant,
    phase: CalibrationPhase,
}

impl CalibrationAccumulator {
    pub fn new(target_frames: u32, started_at: Instant) -> Self {
        Self {
            pelvis_x: RunningMean::default(),
            tracked_joint_y: RunningMean::default(),
            torso_angle: RunningMean::default(),
            hip_spread: RunningMean::default(),
            frames: 0,
            setup_passes: 0,
            target_frames,
            frame_width: 0,
            frame_height: 0,
            started_at,
            phase: CalibrationPhase::Accumulating,
        }
    }

    /// Add one valid frame. Ignored once finalized.
    ///
    /// # Returns
    /// Number of frames accumulated so far
    pub fn add_frame(
        &mut self,
        sample: &MetricSample,
        setup_ok: bool,
        frame_width: u32,
        frame_height: u32,
    ) -> u32 {
        if self.phase == CalibrationPhase::Finalized {
            return self.frames;
        }

        self.pelvis_x.add(sample.pelvis_x);
        self.tracked_joint_y.add(sample.tracked_joint_y);
        self.torso_angle.add(sample.torso_angle);
        self.hip_spread.add(sample.hip_spread);
        self.frames += 1;
        if setup_ok {
            self.setup_passes += 1;
        }
        self.frame_width = frame_width;
        self.frame_height = frame_height;
        self.frames
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn target_frames(&self) -> u32 {
        self.target_frames
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    /// Check whether the window should finalize on its own.
    pub fn ready(&self, now: Instant, config: &CalibrationConfig) -> Option<FinalizeReason> {
        if self.phase == CalibrationPhase::Finalized {
            return None;
        }
        if self.frames >= self.target_frames {
            return Some(FinalizeReason::TargetReached);
        }
        if self.elapsed(now) >= config.timeout() && self.frames >= config.min_partial_frames() {
            return Some(FinalizeReason::PartialTimeout);
        }
        None
    }

    /// True once the hard limit passed without enough frames for a partial
    /// baseline.
    pub fn abandoned(&self, now: Instant, config: &CalibrationConfig) -> bool {
        self.phase == CalibrationPhase::Accumulating
            && self.elapsed(now) >= config.abandon_after()
            && self.frames < config.min_partial_frames()
    }

    /// Convert the sums into a Baseline.
    ///
    /// Refused with `InsufficientSamples` when no frame was accumulated; the
    /// accumulator stays ACCUMULATING in that case.
    pub fn finalize(
        &mut self,
        reason: FinalizeReason,
        config: &CalibrationConfig,
    ) -> Result<Baseline, CalibrationError> {
        if self.phase == CalibrationPhase::Finalized {
            return Err(CalibrationError::NotActive);
        }
        if self.frames == 0 {
            return Err(CalibrationError::InsufficientSamples {
                required: 1,
                collected: 0,
            });
        }

        let setup_ratio = self.setup_passes as f64 / self.frames as f64;
        let baseline = Baseline {
            pelvis_x: self.pelvis_x.mean(),
            tracked_joint_y: self.tracked_joint_y.mean(),
            torso_angle: self.torso_angle.mean(),
            hip_spread: self.hip_spread.mean(),
            target_displacement: self.frame_height as f64 * config.target_displacement_fraction,
            frame_width: self.frame_width,
            frame_height: self.frame_height,
            frames_averaged: self.frames,
            partial: reason != FinalizeReason::TargetReached && self.frames < self.target_frames,
            setup_verified: setup_ratio >= config.setup_pass_ratio,
        };

        self.phase = CalibrationPhase::Finalized;
        Ok(baseline)
    }

    pub fn progress(&self) -> CalibrationProgress {
        let status = match self.phase {
            CalibrationPhase::Accumulating => CalibrationStatus::Accumulating,
            CalibrationPhase::Finalized => CalibrationStatus::Finalized,
        };
        CalibrationProgress::new(self.frames, self.target_frames).with_status(status)
    }
}
