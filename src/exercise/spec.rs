//! Declarative exercise definition.
//!
//! One generic engine runs every exercise; what differs between them (how
//! progress is measured, which rules apply, what gets said) lives here.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::{FormRule, RuleCheck};
use crate::calibration::Baseline;
use crate::error::EngineError;
use crate::pose::{angle, Joint, MetricSample, PoseView};

/// How raw rep progress (0..1) is derived for a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressSource {
    /// Upward displacement of the tracked joint against the baseline target.
    /// Requires calibration.
    Displacement { joint: Joint },
    /// Joint angle mapped from `rest_degrees` (0) to `full_degrees` (1).
    JointAngle {
        joints: [Joint; 3],
        rest_degrees: f64,
        full_degrees: f64,
        label: String,
    },
}

/// Raw progress plus the angle it was derived from, if any.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProgressReading {
    pub progress: Option<f64>,
    pub angle: Option<f64>,
}

impl ProgressSource {
    pub fn needs_baseline(&self) -> bool {
        matches!(self, ProgressSource::Displacement { .. })
    }

    pub fn angle_label(&self) -> Option<&str> {
        match self {
            ProgressSource::JointAngle { label, .. } => Some(label),
            ProgressSource::Displacement { .. } => None,
        }
    }

    /// Raw (unsmoothed, unclamped-by-counter) progress for this frame.
    pub fn read(
        &self,
        view: &PoseView<'_>,
        metrics: &MetricSample,
        baseline: Option<&Baseline>,
    ) -> ProgressReading {
        match self {
            ProgressSource::Displacement { .. } => ProgressReading {
                progress: baseline.zip(metrics.tracked_joint_y).and_then(
                    |(baseline, y)| baseline.displacement_progress(y),
                ),
                angle: None,
            },
            ProgressSource::JointAngle {
                joints,
                rest_degrees,
                full_degrees,
                ..
            } => {
                let measured = (|| {
                    Some(angle(
                        view.tracked(joints[0])?,
                        view.tracked(joints[1])?,
                        view.tracked(joints[2])?,
                    ))
                })();
                ProgressReading {
                    progress: measured.map(|a| {
                        ((a - rest_degrees) / (full_degrees - rest_degrees)).clamp(0.0, 1.0)
                    }),
                    angle: measured,
                }
            }
        }
    }
}

/// Whole-body orientation required before any tracking happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PostureGate {
    /// Lying down: shoulder and hip centers at nearly the same height.
    Horizontal {
        max_vertical_fraction: f64,
        instruction: String,
    },
    /// Standing: shoulders clearly above hips.
    Upright {
        min_vertical_fraction: f64,
        instruction: String,
    },
}

impl PostureGate {
    /// `false` when the posture is wrong or cannot be seen.
    pub fn check(&self, view: &PoseView<'_>) -> bool {
        let (Some(shoulders), Some(hips)) = (view.center(Joint::Shoulder), view.center(Joint::Hip))
        else {
            return false;
        };
        let height = view.height();
        match self {
            PostureGate::Horizontal {
                max_vertical_fraction,
                ..
            } => (shoulders.y - hips.y).abs() < max_vertical_fraction * height,
            PostureGate::Upright {
                min_vertical_fraction,
                ..
            } => hips.y - shoulders.y > min_vertical_fraction * height,
        }
    }

    pub fn instruction(&self) -> &str {
        match self {
            PostureGate::Horizontal { instruction, .. } | PostureGate::Upright { instruction, .. } => {
                instruction
            }
        }
    }
}

/// Fixed coaching lines for one exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciseCues {
    /// Spoken when the movement reaches the top
    pub top: Option<String>,
    /// On-screen hint while in the bottom region
    pub hint_bottom: String,
    /// On-screen hint while in the top region
    pub hint_top: String,
    pub calibration_start: String,
    pub calibration_done: String,
    /// Replaces `calibration_done` when the setup checks mostly failed
    pub calibration_unverified: String,
    pub calibration_failed: String,
    pub calibrate_prompt: String,
}

impl Default for ExerciseCues {
    fn default() -> Self {
        Self {
            top: None,
            hint_bottom: "Lift".to_string(),
            hint_top: "Lower slowly".to_string(),
            calibration_start: "Calibrating. Hold your start position.".to_string(),
            calibration_done: "Calibration complete. Start when ready.".to_string(),
            calibration_unverified: "Calibration done, but check your setup.".to_string(),
            calibration_failed: "Calibration failed, please try again.".to_string(),
            calibrate_prompt: "Get into position and calibrate".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSpec {
    pub id: String,
    pub display_name: String,
    pub progress: ProgressSource,
    /// Joint whose availability makes a frame valid for calibration
    pub tracked_joint: Joint,
    #[serde(default)]
    pub rules: Vec<FormRule>,
    #[serde(default)]
    pub posture_gate: Option<PostureGate>,
    #[serde(default)]
    pub cues: ExerciseCues,
    #[serde(default)]
    pub guidance: Vec<String>,
    #[serde(default)]
    pub great_form_phrases: Vec<String>,
}

impl ExerciseSpec {
    /// Load a custom exercise definition from JSON.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| EngineError::InvalidConfig {
            reason: format!("cannot read {}: {}", path.display(), err),
        })?;
        let spec: ExerciseSpec =
            serde_json::from_str(&contents).map_err(|err| EngineError::InvalidConfig {
                reason: format!("cannot parse {}: {}", path.display(), err),
            })?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |reason: String| Err(EngineError::InvalidConfig { reason });

        if self.id.trim().is_empty() {
            return invalid("exercise id is empty".to_string());
        }
        match &self.progress {
            ProgressSource::JointAngle {
                rest_degrees,
                full_degrees,
                ..
            } if (rest_degrees - full_degrees).abs() < f64::EPSILON => {
                return invalid(format!("{}: rest and full angle are equal", self.id));
            }
            ProgressSource::Displacement { joint } if *joint != self.tracked_joint => {
                return invalid(format!(
                    "{}: displacement joint must be the tracked joint",
                    self.id
                ));
            }
            _ => {}
        }

        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                return invalid(format!("{}: rule with empty id", self.id));
            }
            if !seen.insert(rule.id.as_str()) {
                return invalid(format!("{}: duplicate rule '{}'", self.id, rule.id));
            }
            match &rule.check {
                RuleCheck::AngleRange {
                    min_degrees,
                    max_degrees,
                    ..
                } if min_degrees >= max_degrees => {
                    return invalid(format!("{}: rule '{}' has empty range", self.id, rule.id));
                }
                RuleCheck::BaselineDrift {
                    max_fraction_of_width,
                    ..
                }
                | RuleCheck::HorizontalGap {
                    max_fraction_of_width,
                    ..
                } if *max_fraction_of_width <= 0.0 => {
                    return invalid(format!(
                        "{}: rule '{}' needs a positive tolerance",
                        self.id, rule.id
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn setup_rules(&self) -> impl Iterator<Item = &FormRule> {
        self.rules.iter().filter(|rule| rule.checks_setup())
    }
}
