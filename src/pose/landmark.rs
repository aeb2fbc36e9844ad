//! Per-frame pose input as supplied by the pose-estimation collaborator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::geometry::Point2;

/// Named body joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointId {
    Nose,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

/// Body side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Side-relative joint, resolved against the tracked side of each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Shoulder,
    Elbow,
    Wrist,
    Hip,
    Knee,
    Ankle,
    Heel,
    FootIndex,
}

impl Joint {
    pub fn on(self, side: Side) -> JointId {
        use JointId::*;
        match (self, side) {
            (Joint::Shoulder, Side::Left) => LeftShoulder,
            (Joint::Shoulder, Side::Right) => RightShoulder,
            (Joint::Elbow, Side::Left) => LeftElbow,
            (Joint::Elbow, Side::Right) => RightElbow,
            (Joint::Wrist, Side::Left) => LeftWrist,
            (Joint::Wrist, Side::Right) => RightWrist,
            (Joint::Hip, Side::Left) => LeftHip,
            (Joint::Hip, Side::Right) => RightHip,
            (Joint::Knee, Side::Left) => LeftKnee,
            (Joint::Knee, Side::Right) => RightKnee,
            (Joint::Ankle, Side::Left) => LeftAnkle,
            (Joint::Ankle, Side::Right) => RightAnkle,
            (Joint::Heel, Side::Left) => LeftHeel,
            (Joint::Heel, Side::Right) => RightHeel,
            (Joint::FootIndex, Side::Left) => LeftFootIndex,
            (Joint::FootIndex, Side::Right) => RightFootIndex,
        }
    }
}

/// A single tracked joint position with its confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(alias = "visibility")]
    pub confidence: f64,
}

impl Landmark {
    pub const fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            confidence,
        }
    }
}

/// Unit of landmark coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateUnits {
    /// Fractions of frame width/height
    #[default]
    Normalized,
    Pixels,
}

/// One frame of pose input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    pub frame_width: u32,
    pub frame_height: u32,
    /// `None` when the estimator found no person in the frame
    #[serde(default)]
    pub landmarks: Option<HashMap<JointId, Landmark>>,
    #[serde(default)]
    pub tracked_side: Side,
    #[serde(default)]
    pub units: CoordinateUnits,
}

impl PoseFrame {
    pub fn new(frame_width: u32, frame_height: u32, tracked_side: Side) -> Self {
        Self {
            frame_width,
            frame_height,
            landmarks: None,
            tracked_side,
            units: CoordinateUnits::Normalized,
        }
    }

    pub fn with_landmarks(mut self, landmarks: HashMap<JointId, Landmark>) -> Self {
        self.landmarks = Some(landmarks);
        self
    }
}

/// Confidence-gated read access to a frame, in pixel coordinates.
///
/// Landmarks below `min_confidence` or with non-finite coordinates read as
/// `None`; callers never see a low-confidence position.
pub struct PoseView<'a> {
    frame: &'a PoseFrame,
    min_confidence: f64,
}

impl<'a> PoseView<'a> {
    pub fn new(frame: &'a PoseFrame, min_confidence: f64) -> Self {
        Self {
            frame,
            min_confidence,
        }
    }

    pub fn frame(&self) -> &PoseFrame {
        self.frame
    }

    pub fn side(&self) -> Side {
        self.frame.tracked_side
    }

    pub fn width(&self) -> f64 {
        self.frame.frame_width as f64
    }

    pub fn height(&self) -> f64 {
        self.frame.frame_height as f64
    }

    /// Gated position of a named joint.
    pub fn point(&self, id: JointId) -> Option<Point2> {
        let landmark = self.frame.landmarks.as_ref()?.get(&id)?;
        if !(landmark.confidence >= self.min_confidence) {
            return None;
        }
        let point = match self.frame.units {
            CoordinateUnits::Normalized => {
                Point2::new(landmark.x * self.width(), landmark.y * self.height())
            }
            CoordinateUnits::Pixels => Point2::new(landmark.x, landmark.y),
        };
        point.is_finite().then_some(point)
    }

    /// Gated position of a joint on the tracked side.
    pub fn tracked(&self, joint: Joint) -> Option<Point2> {
        self.point(joint.on(self.side()))
    }

    /// Both sides of a joint, only when both are available.
    pub fn pair(&self, joint: Joint) -> Option<(Point2, Point2)> {
        Some((
            self.point(joint.on(Side::Left))?,
            self.point(joint.on(Side::Right))?,
        ))
    }

    /// Midpoint of both sides, or the tracked side alone when the other is
    /// unavailable.
    pub fn center(&self, joint: Joint) -> Option<Point2> {
        match self.pair(joint) {
            Some((left, right)) => Some(left.midpoint(right)),
            None => self
                .tracked(joint)
                .or_else(|| self.point(joint.on(self.side().opposite()))),
        }
    }
}
