//! Declarative form rules.
//!
//! A rule is a pure predicate over smoothed metrics, an optional smoothed
//! measurement (joint angle or landmark gap) and the baseline. Rules whose inputs are unavailable report
//! `Skipped` so their counters are left alone for that frame.

use serde::{Deserialize, Serialize};

use crate::calibration::Baseline;
use crate::pose::{angle, horizontal_spread, Joint, Metric, MetricSample, PoseView};

/// What a rule measures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCheck {
    /// |current - baseline| must stay within a fraction of frame width
    BaselineDrift {
        metric: Metric,
        max_fraction_of_width: f64,
    },
    /// Angle at the middle joint must stay within `[min, max]` degrees
    AngleRange {
        joints: [Joint; 3],
        min_degrees: f64,
        max_degrees: f64,
    },
    /// Torso lean from vertical must stay at or below the limit
    MaxLean { max_degrees: f64 },
    /// Horizontal distance between two joints must stay within a fraction
    /// of frame width
    HorizontalGap {
        joints: [Joint; 2],
        max_fraction_of_width: f64,
    },
}

/// One form rule with its coaching text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormRule {
    /// Message-type tag; also the rate-limiting bucket for its warnings
    pub id: String,
    pub check: RuleCheck,
    /// Spoken and shown while the rule fails
    pub warning: String,
    /// Spoken (low priority) after a long passing streak
    #[serde(default)]
    pub praise: Option<String>,
    /// Key under which the rule's angle appears in the frame output
    #[serde(default)]
    pub angle_label: Option<String>,
    /// Evaluated on calibration frames to verify the starting setup
    #[serde(default)]
    pub setup_check: bool,
    /// Only evaluated during calibration, never while tracking reps
    #[serde(default)]
    pub setup_only: bool,
}

/// Per-frame rule result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RuleOutcome {
    Pass,
    Fail { status: String },
    Skipped,
}

impl RuleOutcome {
    pub fn is_fail(&self) -> bool {
        matches!(self, RuleOutcome::Fail { .. })
    }
}

/// Inputs shared by every rule on a frame.
pub struct RuleInputs<'a> {
    pub metrics: &'a MetricSample,
    pub baseline: Option<&'a Baseline>,
    pub frame_width: f64,
}

impl FormRule {
    pub fn needs_baseline(&self) -> bool {
        matches!(self.check, RuleCheck::BaselineDrift { .. })
    }

    pub fn checks_setup(&self) -> bool {
        self.setup_check || self.setup_only
    }

    /// Raw landmark measurement this rule watches, if any: degrees for
    /// `AngleRange`, pixels for `HorizontalGap`.
    pub fn raw_measurement(&self, view: &PoseView<'_>) -> Option<f64> {
        match &self.check {
            RuleCheck::AngleRange { joints, .. } => Some(angle(
                view.tracked(joints[0])?,
                view.tracked(joints[1])?,
                view.tracked(joints[2])?,
            )),
            RuleCheck::HorizontalGap { joints, .. } => Some(horizontal_spread(
                view.tracked(joints[0])?,
                view.tracked(joints[1])?,
            )),
            _ => None,
        }
    }

    /// Evaluate against smoothed inputs. `measured` is the rule's smoothed
    /// landmark measurement (read by `AngleRange` and `HorizontalGap`).
    pub fn evaluate(&self, inputs: &RuleInputs<'_>, measured: Option<f64>) -> RuleOutcome {
        match &self.check {
            RuleCheck::BaselineDrift {
                metric,
                max_fraction_of_width,
            } => {
                let Some(reference) = inputs.baseline.and_then(|b| b.metric(*metric)) else {
                    return RuleOutcome::Skipped;
                };
                let Some(current) = inputs.metrics.get(*metric) else {
                    return RuleOutcome::Skipped;
                };
                if (current - reference).abs() > max_fraction_of_width * inputs.frame_width {
                    RuleOutcome::Fail {
                        status: "too far from baseline".to_string(),
                    }
                } else {
                    RuleOutcome::Pass
                }
            }
            RuleCheck::AngleRange {
                min_degrees,
                max_degrees,
                ..
            } => match measured {
                None => RuleOutcome::Skipped,
                Some(value) if value < *min_degrees => RuleOutcome::Fail {
                    status: "angle below range".to_string(),
                },
                Some(value) if value > *max_degrees => RuleOutcome::Fail {
                    status: "angle above range".to_string(),
                },
                Some(_) => RuleOutcome::Pass,
            },
            RuleCheck::MaxLean { max_degrees } => match inputs.metrics.torso_angle {
                None => RuleOutcome::Skipped,
                Some(lean) if lean > *max_degrees => RuleOutcome::Fail {
                    status: "leaning too far".to_string(),
                },
                Some(_) => RuleOutcome::Pass,
            },
            RuleCheck::HorizontalGap {
                max_fraction_of_width,
                ..
            } => match measured {
                None => RuleOutcome::Skipped,
                Some(gap) if gap > max_fraction_of_width * inputs.frame_width => {
                    RuleOutcome::Fail {
                        status: "joints too far apart".to_string(),
                    }
                }
                Some(_) => RuleOutcome::Pass,
            },
        }
    }
}
