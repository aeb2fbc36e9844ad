//! Pose input types plus the geometry and smoothing primitives built on them.

pub mod geometry;
pub mod landmark;
pub mod metrics;
pub mod smoothing;

pub use geometry::{
    angle, angle_from_vertical, horizontal_spread, Point2, DEGENERATE_ANGLE, DEGENERATE_EPSILON,
};
pub use landmark::{CoordinateUnits, Joint, JointId, Landmark, PoseFrame, PoseView, Side};
pub use metrics::{Metric, MetricSample, MetricSignals};
pub use smoothing::{smooth, SmoothedPoint, SmoothedSignal};
