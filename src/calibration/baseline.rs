// Baseline - averaged reference posture captured during calibration
//
// Every metric is optional: a metric never observed during the calibration
// window is `None` in the baseline, and rules that depend on it are skipped.
// A baseline is never edited after creation; recalibration replaces it whole.

use serde::{Deserialize, Serialize};

use crate::pose::Metric;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// Hip-center x (pixels)
    pub pelvis_x: Option<f64>,
    /// Tracked joint y (pixels)
    pub tracked_joint_y: Option<f64>,
    /// Torso lean from vertical (degrees)
    pub torso_angle: Option<f64>,
    /// Left/right hip horizontal spread (pixels)
    pub hip_spread: Option<f64>,
    /// Displacement that maps to progress 1.0 (pixels)
    pub target_displacement: f64,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Number of frames averaged
    pub frames_averaged: u32,
    /// True when finalized by the timeout policy before reaching the target
    #[serde(default)]
    pub partial: bool,
    /// True when enough calibration frames passed the setup checks
    #[serde(default)]
    pub setup_verified: bool,
}

impl Baseline {
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::PelvisX => self.pelvis_x,
            Metric::TrackedJointY => self.tracked_joint_y,
            Metric::TorsoAngle => self.torso_angle,
            Metric::HipSpread => self.hip_spread,
        }
    }

    /// Normalized travel of the tracked joint toward the target, clamped to
    /// `[0, 1]`. Upward movement (smaller y) counts as positive.
    pub fn displacement_progress(&self, tracked_joint_y: f64) -> Option<f64> {
        let reference = self.tracked_joint_y?;
        if !(self.target_displacement > 0.0) {
            return None;
        }
        let raw = (reference - tracked_joint_y) / self.target_displacement;
        raw.is_finite().then(|| raw.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> Baseline {
        Baseline {
            pelvis_x: Some(320.0),
            tracked_joint_y: Some(300.0),
            torso_angle: None,
            hip_spread: Some(4.0),
            target_displacement: 43.2,
            frame_width: 640,
            frame_height: 480,
            frames_averaged: 30,
            partial: false,
            setup_verified: true,
        }
    }

    #[test]
    fn test_metric_lookup() {
        let b = baseline();
        assert_eq!(b.metric(Metric::PelvisX), Some(320.0));
        assert_eq!(b.metric(Metric::TorsoAngle), None);
    }

    #[test]
    fn test_displacement_progress_clamps() {
        let b = baseline();
        assert_eq!(b.displacement_progress(300.0), Some(0.0));
        assert_eq!(b.displacement_progress(320.0), Some(0.0));
        assert!((b.displacement_progress(278.4).unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(b.displacement_progress(200.0), Some(1.0));
    }

    #[test]
    fn test_displacement_progress_requires_reference() {
        let b = Baseline {
            tracked_joint_y: None,
            ..baseline()
        };
        assert_eq!(b.displacement_progress(250.0), None);
    }

    #[test]
    fn test_serde_defaults_for_flags() {
        let json = r#"{
            "pelvis_x": 1.0, "tracked_joint_y": null, "torso_angle": null, "hip_spread": null,
            "target_displacement": 10.0, "frame_width": 100, "frame_height": 100,
            "frames_averaged": 3
        }"#;
        let parsed: Baseline = serde_json::from_str(json).unwrap();
        assert!(!parsed.partial);
        assert!(!parsed.setup_verified);
    }
}
