//! Per-frame output contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::feedback::FeedbackMessage;

pub const NO_POSE_FEEDBACK: &str = "no pose detected";

/// What the engine was doing on this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStatus {
    NoPose,
    Calibrating,
    /// Posture gate failed; nothing advanced
    PostureCheck,
    /// Progress needs a baseline that does not exist yet
    AwaitingCalibration,
    Tracking,
}

/// Caller-visible result of one `process_frame` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameOutput {
    pub reps: u32,
    /// Single line for on-screen display
    pub feedback: String,
    /// Named angles (or calibration percentage) for overlays
    pub angles: BTreeMap<String, Option<f64>>,
    /// Smoothed progress (or calibration fraction), always in [0, 1]
    pub progress: f64,
    pub status: FrameStatus,
    /// Every rule warning active on this frame
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Messages the notifier accepted on this frame
    #[serde(default)]
    pub spoken: Vec<FeedbackMessage>,
}

impl FrameOutput {
    pub fn no_pose(reps: u32) -> Self {
        Self {
            reps,
            feedback: NO_POSE_FEEDBACK.to_string(),
            angles: BTreeMap::new(),
            progress: 0.0,
            status: FrameStatus::NoPose,
            warnings: Vec::new(),
            spoken: Vec::new(),
        }
    }

    pub fn with_status(reps: u32, status: FrameStatus, feedback: impl Into<String>) -> Self {
        Self {
            feedback: feedback.into(),
            status,
            ..Self::no_pose(reps)
        }
    }
}
