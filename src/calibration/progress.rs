// Progress tracking for the calibration window
//
// Snapshots are broadcast to subscribers and mirrored into the per-frame
// output while calibration is running.

use serde::{Deserialize, Serialize};

/// Where the calibration window currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStatus {
    Accumulating,
    Finalized,
    Failed,
}

/// Progress information for the active calibration window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProgress {
    pub status: CalibrationStatus,
    /// Valid frames accumulated so far
    pub frames_collected: u32,
    /// Frames needed to finalize without the timeout policy
    pub frames_needed: u32,
    /// Set once the window finalized through the partial-success policy
    #[serde(default)]
    pub partial: bool,
    /// Optional hint for the user (e.g. "hold still")
    #[serde(default)]
    pub hint: Option<String>,
}

impl CalibrationProgress {
    pub fn new(frames_collected: u32, frames_needed: u32) -> Self {
        Self {
            status: CalibrationStatus::Accumulating,
            frames_collected,
            frames_needed,
            partial: false,
            hint: None,
        }
    }

    /// Attach a status to the progress snapshot
    pub fn with_status(mut self, status: CalibrationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Fraction complete in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        if self.status == CalibrationStatus::Finalized {
            return 1.0;
        }
        if self.frames_needed == 0 {
            return 0.0;
        }
        (self.frames_collected as f64 / self.frames_needed as f64).clamp(0.0, 1.0)
    }

    /// Whole-number percentage for display
    pub fn percentage(&self) -> u8 {
        (self.fraction() * 100.0).round() as u8
    }

    pub fn is_complete(&self) -> bool {
        self.status == CalibrationStatus::Finalized
    }

    /// Human-readable status line carried in the frame output's feedback slot
    pub fn message(&self) -> String {
        match self.status {
            CalibrationStatus::Accumulating => match &self.hint {
                Some(hint) => format!("Calibrating... {}% ({})", self.percentage(), hint),
                None => format!("Calibrating... {}%", self.percentage()),
            },
            CalibrationStatus::Finalized => "Calibration complete".to_string(),
            CalibrationStatus::Failed => "Calibration failed, please try again".to_string(),
        }
    }
}
