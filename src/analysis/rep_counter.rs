//! Hysteresis repetition counter.
//!
//! Two thresholds split progress into BOTTOM and TOP regions; the gap between
//! them absorbs jitter around either threshold. A rep is one full
//! BOTTOM→TOP→BOTTOM cycle, counted on the edge selected by [`RepBoundary`].

use serde::{Deserialize, Serialize};

use crate::config::RepConfig;
use crate::error::EngineError;
use crate::pose::SmoothedSignal;

/// Which edge of the cycle increments the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepBoundary {
    /// Count on TOP→BOTTOM (return to start)
    #[default]
    OnReturn,
    /// Count on BOTTOM→TOP (reaching the top)
    OnTop,
}

/// Current region of the movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepDirection {
    #[default]
    Bottom,
    Top,
}

/// Threshold crossing observed on a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepEdge {
    ReachedTop,
    ReturnedToBottom,
}

/// Edge plus the new rep count when that edge completed a rep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepEvent {
    pub edge: RepEdge,
    pub completed: Option<u32>,
}

/// Result of feeding one raw progress sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepUpdate {
    /// Smoothed progress after this frame
    pub progress: f64,
    pub event: Option<RepEvent>,
}

#[derive(Debug, Clone)]
pub struct RepCounter {
    reps: u32,
    direction: RepDirection,
    progress: SmoothedSignal,
    up: f64,
    down: f64,
    boundary: RepBoundary,
}

impl RepCounter {
    pub fn new(config: &RepConfig, progress_alpha: f64) -> Self {
        Self {
            reps: 0,
            direction: RepDirection::Bottom,
            progress: SmoothedSignal::new(progress_alpha, 0.0),
            up: config.up_threshold,
            down: config.down_threshold,
            boundary: config.boundary,
        }
    }

    pub fn reps(&self) -> u32 {
        self.reps
    }

    pub fn direction(&self) -> RepDirection {
        self.direction
    }

    /// Last smoothed progress, 0 before the first sample.
    pub fn progress(&self) -> f64 {
        self.progress.value().unwrap_or(0.0)
    }

    /// Smooth a raw progress sample and advance the state machine.
    ///
    /// `None` (progress unavailable this frame) holds the smoothed value and
    /// still runs the transition check against it.
    pub fn observe(&mut self, raw: Option<f64>) -> Result<RepUpdate, EngineError> {
        let smoothed = self.progress.update_available(raw.map(|p| p.clamp(0.0, 1.0)));
        let Some(progress) = smoothed else {
            return Ok(RepUpdate {
                progress: 0.0,
                event: None,
            });
        };
        let event = self.step(progress)?;
        Ok(RepUpdate { progress, event })
    }

    /// Advance with an already smoothed progress value.
    pub fn step(&mut self, progress: f64) -> Result<Option<RepEvent>, EngineError> {
        if !progress.is_finite() || !(0.0..=1.0).contains(&progress) {
            return Err(EngineError::InvariantViolated {
                detail: format!("progress {progress} outside [0, 1]"),
            });
        }

        let event = match self.direction {
            RepDirection::Bottom if progress >= self.up => {
                self.direction = RepDirection::Top;
                Some(self.edge(RepEdge::ReachedTop))
            }
            RepDirection::Top if progress <= self.down => {
                self.direction = RepDirection::Bottom;
                Some(self.edge(RepEdge::ReturnedToBottom))
            }
            _ => None,
        };
        Ok(event)
    }

    fn edge(&mut self, edge: RepEdge) -> RepEvent {
        let counts = matches!(
            (self.boundary, edge),
            (RepBoundary::OnReturn, RepEdge::ReturnedToBottom)
                | (RepBoundary::OnTop, RepEdge::ReachedTop)
        );
        let completed = counts.then(|| {
            self.reps += 1;
            self.reps
        });
        RepEvent { edge, completed }
    }

    /// Back to BOTTOM with fresh smoothing; the rep count is kept.
    pub fn reset_progress(&mut self) {
        self.direction = RepDirection::Bottom;
        self.progress.reset();
    }

    /// Explicit user reset: count, direction and smoothing.
    pub fn reset(&mut self) {
        self.reps = 0;
        self.reset_progress();
    }
}
