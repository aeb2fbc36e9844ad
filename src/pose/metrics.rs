//! Body metrics shared by calibration, progress and baseline rules.

use serde::{Deserialize, Serialize};

use super::geometry::{angle_from_vertical, horizontal_spread};
use super::landmark::{Joint, PoseView};
use super::smoothing::SmoothedSignal;

/// Scalar body metric, all in pixels except `TorsoAngle` (degrees).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Horizontal position of the hip center
    PelvisX,
    /// Vertical position of the exercise's tracked joint
    TrackedJointY,
    /// Lean of the hip→shoulder line away from vertical
    TorsoAngle,
    /// Horizontal distance between the two hips
    HipSpread,
}

/// Instantaneous (or smoothed) metric values for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub pelvis_x: Option<f64>,
    pub tracked_joint_y: Option<f64>,
    pub torso_angle: Option<f64>,
    pub hip_spread: Option<f64>,
}

impl MetricSample {
    /// Measure every metric that the frame's available landmarks allow.
    pub fn measure(view: &PoseView<'_>, tracked_joint: Joint) -> Self {
        let hip_center = view.center(Joint::Hip);
        let shoulder_center = view.center(Joint::Shoulder);

        Self {
            pelvis_x: hip_center.map(|p| p.x),
            tracked_joint_y: view.tracked(tracked_joint).map(|p| p.y),
            torso_angle: match (shoulder_center, hip_center) {
                (Some(shoulder), Some(hip)) => Some(angle_from_vertical(shoulder, hip)),
                _ => None,
            },
            hip_spread: view
                .pair(Joint::Hip)
                .map(|(left, right)| horizontal_spread(left, right)),
        }
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::PelvisX => self.pelvis_x,
            Metric::TrackedJointY => self.tracked_joint_y,
            Metric::TorsoAngle => self.torso_angle,
            Metric::HipSpread => self.hip_spread,
        }
    }
}

/// One smoothing signal per metric.
#[derive(Debug, Clone)]
pub struct MetricSignals {
    pelvis_x: SmoothedSignal,
    tracked_joint_y: SmoothedSignal,
    torso_angle: SmoothedSignal,
    hip_spread: SmoothedSignal,
}

impl MetricSignals {
    pub fn new(alpha: f64, min_confidence: f64) -> Self {
        let signal = || SmoothedSignal::new(alpha, min_confidence);
        Self {
            pelvis_x: signal(),
            tracked_joint_y: signal(),
            torso_angle: signal(),
            hip_spread: signal(),
        }
    }

    /// Advance each signal with the available raw values; missing values hold.
    pub fn update(&mut self, raw: &MetricSample) -> MetricSample {
        MetricSample {
            pelvis_x: self.pelvis_x.update_available(raw.pelvis_x),
            tracked_joint_y: self.tracked_joint_y.update_available(raw.tracked_joint_y),
            torso_angle: self.torso_angle.update_available(raw.torso_angle),
            hip_spread: self.hip_spread.update_available(raw.hip_spread),
        }
    }

    pub fn reset(&mut self) {
        self.pelvis_x.reset();
        self.tracked_joint_y.reset();
        self.torso_angle.reset();
        self.hip_spread.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{JointId, Landmark, PoseFrame, Side};
    use std::collections::HashMap;

    fn lying_frame() -> PoseFrame {
        let mut landmarks = HashMap::new();
        landmarks.insert(JointId::LeftShoulder, Landmark::new(0.30, 0.50, 0.9));
        landmarks.insert(JointId::RightShoulder, Landmark::new(0.30, 0.52, 0.9));
        landmarks.insert(JointId::LeftHip, Landmark::new(0.55, 0.50, 0.9));
        landmarks.insert(JointId::RightHip, Landmark::new(0.57, 0.52, 0.9));
        landmarks.insert(JointId::LeftKnee, Landmark::new(0.70, 0.45, 0.9));
        PoseFrame::new(100, 100, Side::Left).with_landmarks(landmarks)
    }

    #[test]
    fn test_measure_lying_pose() {
        let frame = lying_frame();
        let view = PoseView::new(&frame, 0.5);
        let sample = MetricSample::measure(&view, Joint::Knee);

        assert!((sample.pelvis_x.unwrap() - 56.0).abs() < 1e-9);
        assert!((sample.tracked_joint_y.unwrap() - 45.0).abs() < 1e-9);
        assert!((sample.hip_spread.unwrap() - 2.0).abs() < 1e-9);
        // shoulders level with hips: torso is horizontal
        assert!((sample.torso_angle.unwrap() - 90.0).abs() < 1.0);
    }

    #[test]
    fn test_missing_joint_leaves_metric_empty() {
        let frame = lying_frame();
        let view = PoseView::new(&frame, 0.5);
        let sample = MetricSample::measure(&view, Joint::Ankle);
        assert_eq!(sample.tracked_joint_y, None);
        assert_eq!(sample.get(Metric::TrackedJointY), None);
        assert!(sample.get(Metric::PelvisX).is_some());
    }

    #[test]
    fn test_signals_hold_missing_metrics() {
        let mut signals = MetricSignals::new(0.5, 0.5);
        signals.update(&MetricSample {
            pelvis_x: Some(10.0),
            tracked_joint_y: Some(20.0),
            ..MetricSample::default()
        });
        let smoothed = signals.update(&MetricSample {
            pelvis_x: Some(20.0),
            ..MetricSample::default()
        });
        assert_eq!(smoothed.pelvis_x, Some(15.0));
        assert_eq!(smoothed.tracked_joint_y, Some(20.0));
        assert_eq!(smoothed.hip_spread, None);
    }
}
