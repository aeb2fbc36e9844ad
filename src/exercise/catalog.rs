//! Built-in exercise catalog.

use once_cell::sync::Lazy;

use crate::analysis::{FormRule, RuleCheck};
use crate::error::EngineError;
use crate::exercise::{ExerciseCues, ExerciseSpec, PostureGate, ProgressSource};
use crate::pose::{Joint, Metric};

pub const DEFAULT_EXERCISE: &str = "glute_fly";

static CATALOG: Lazy<Vec<ExerciseSpec>> =
    Lazy::new(|| vec![glute_fly(), squat(), pushup(), lateral_raise()]);

pub fn all() -> &'static [ExerciseSpec] {
    &CATALOG
}

pub fn builtin_ids() -> Vec<&'static str> {
    CATALOG.iter().map(|spec| spec.id.as_str()).collect()
}

pub fn builtin(id: &str) -> Result<ExerciseSpec, EngineError> {
    CATALOG
        .iter()
        .find(|spec| spec.id == id)
        .cloned()
        .ok_or_else(|| EngineError::UnknownExercise { id: id.to_string() })
}

fn rule(id: &str, check: RuleCheck, warning: &str, praise: Option<&str>) -> FormRule {
    FormRule {
        id: id.to_string(),
        check,
        warning: warning.to_string(),
        praise: praise.map(str::to_string),
        angle_label: None,
        setup_check: false,
        setup_only: false,
    }
}

/// Starting-position check that is never evaluated while tracking reps.
fn setup_rule(id: &str, check: RuleCheck, correction: &str) -> FormRule {
    FormRule {
        setup_only: true,
        ..rule(id, check, correction, None)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn great_form() -> Vec<String> {
    strings(&[
        "Great form, keep it up!",
        "Excellent, your posture is spot on!",
        "Perfect, keep going like that!",
        "Really nice control!",
        "Textbook technique!",
    ])
}

fn glute_fly() -> ExerciseSpec {
    let mut dorsiflexion = rule(
        "dorsiflexion",
        RuleCheck::AngleRange {
            joints: [Joint::Knee, Joint::Ankle, Joint::FootIndex],
            min_degrees: 80.0,
            max_degrees: 120.0,
        },
        "Dorsiflex your ankle, toes toward your shin",
        Some("Ankle dorsiflexed, perfect!"),
    );
    dorsiflexion.angle_label = Some("ankle".to_string());
    dorsiflexion.setup_check = true;

    ExerciseSpec {
        id: "glute_fly".to_string(),
        display_name: "Side-lying glute fly".to_string(),
        progress: ProgressSource::Displacement { joint: Joint::Knee },
        tracked_joint: Joint::Knee,
        rules: vec![
            rule(
                "pelvis_shift",
                RuleCheck::BaselineDrift {
                    metric: Metric::PelvisX,
                    max_fraction_of_width: 0.05,
                },
                "Keep your hips still, don't drift forward or back",
                Some("Hips stable, good!"),
            ),
            rule(
                "hip_roll",
                RuleCheck::BaselineDrift {
                    metric: Metric::HipSpread,
                    max_fraction_of_width: 0.04,
                },
                "Don't let your pelvis roll back",
                Some("Pelvis straight, excellent!"),
            ),
            setup_rule(
                "calib_heels",
                RuleCheck::HorizontalGap {
                    joints: [Joint::Heel, Joint::Hip],
                    max_fraction_of_width: 0.08,
                },
                "Keep your heels near the edge of your hips",
            ),
            setup_rule(
                "calib_achilles",
                RuleCheck::AngleRange {
                    joints: [Joint::Knee, Joint::Ankle, Joint::FootIndex],
                    min_degrees: 60.0,
                    max_degrees: 120.0,
                },
                "Rest the top of your Achilles against the other knee",
            ),
            dorsiflexion,
            setup_rule(
                "calib_hip",
                RuleCheck::AngleRange {
                    joints: [Joint::Shoulder, Joint::Hip, Joint::Knee],
                    min_degrees: 160.0,
                    max_degrees: 180.0,
                },
                "Keep your hips about four inches forward of square",
            ),
            setup_rule(
                "calib_arch",
                RuleCheck::AngleRange {
                    joints: [Joint::Shoulder, Joint::Hip, Joint::Knee],
                    min_degrees: 160.0,
                    max_degrees: 180.0,
                },
                "Chest forward, keep the arch in your back",
            ),
        ],
        posture_gate: Some(PostureGate::Horizontal {
            max_vertical_fraction: 0.2,
            instruction: "Lie on your side facing the camera".to_string(),
        }),
        cues: ExerciseCues {
            top: Some("Good, the leg is up. Hold it.".to_string()),
            hint_bottom: "Lift the top knee".to_string(),
            hint_top: "Lower slowly".to_string(),
            calibration_start: "Calibrating. Hold your start position still.".to_string(),
            calibration_done: "Calibration complete, setup verified. Start with small lifts."
                .to_string(),
            calibration_unverified: "Calibration done, but your setup needs work.".to_string(),
            calibrate_prompt: "Lie on your side and calibrate in the start position".to_string(),
            ..ExerciseCues::default()
        },
        guidance: strings(&[
            "Remember, keep your hips completely still.",
            "Lift with control, not speed.",
            "Keep the ankle dorsiflexed throughout.",
            "Small lifts are enough, one inch is plenty.",
            "Keep the pelvis straight, don't let it roll.",
            "Slow and controlled movement.",
        ]),
        great_form_phrases: great_form(),
    }
}

fn squat() -> ExerciseSpec {
    ExerciseSpec {
        id: "squat".to_string(),
        display_name: "Bodyweight squat".to_string(),
        progress: ProgressSource::JointAngle {
            joints: [Joint::Hip, Joint::Knee, Joint::Ankle],
            rest_degrees: 160.0,
            full_degrees: 70.0,
            label: "knee".to_string(),
        },
        tracked_joint: Joint::Knee,
        rules: vec![rule(
            "torso_lean",
            RuleCheck::MaxLean { max_degrees: 50.0 },
            "Keep your chest up",
            Some("Nice upright torso!"),
        )],
        posture_gate: Some(PostureGate::Upright {
            min_vertical_fraction: 0.1,
            instruction: "Stand side-on to the camera".to_string(),
        }),
        cues: ExerciseCues {
            top: Some("Good depth, now drive up.".to_string()),
            hint_bottom: "Sit back and down".to_string(),
            hint_top: "Stand up tall".to_string(),
            calibrate_prompt: "Stand tall and calibrate".to_string(),
            ..ExerciseCues::default()
        },
        guidance: strings(&[
            "Push your knees out over your toes.",
            "Keep your weight in your heels.",
            "Brace your core before each rep.",
        ]),
        great_form_phrases: great_form(),
    }
}

fn pushup() -> ExerciseSpec {
    let mut body_line = rule(
        "body_line",
        RuleCheck::AngleRange {
            joints: [Joint::Shoulder, Joint::Hip, Joint::Ankle],
            min_degrees: 155.0,
            max_degrees: 180.0,
        },
        "Keep your body in a straight line",
        Some("Solid plank!"),
    );
    body_line.angle_label = Some("body_line".to_string());
    body_line.setup_check = true;

    ExerciseSpec {
        id: "pushup".to_string(),
        display_name: "Push-up".to_string(),
        progress: ProgressSource::JointAngle {
            joints: [Joint::Shoulder, Joint::Elbow, Joint::Wrist],
            rest_degrees: 160.0,
            full_degrees: 80.0,
            label: "elbow".to_string(),
        },
        tracked_joint: Joint::Elbow,
        rules: vec![body_line],
        posture_gate: Some(PostureGate::Horizontal {
            max_vertical_fraction: 0.2,
            instruction: "Get into a plank, side-on to the camera".to_string(),
        }),
        cues: ExerciseCues {
            top: Some("Chest down, now push.".to_string()),
            hint_bottom: "Lower your chest".to_string(),
            hint_top: "Push up".to_string(),
            calibrate_prompt: "Hold a plank and calibrate".to_string(),
            ..ExerciseCues::default()
        },
        guidance: strings(&[
            "Keep your elbows at about forty five degrees.",
            "Squeeze your glutes to hold the plank.",
        ]),
        great_form_phrases: great_form(),
    }
}

fn lateral_raise() -> ExerciseSpec {
    let mut elbow_bend = rule(
        "elbow_bend",
        RuleCheck::AngleRange {
            joints: [Joint::Shoulder, Joint::Elbow, Joint::Wrist],
            min_degrees: 140.0,
            max_degrees: 180.0,
        },
        "Keep your arm long, only a soft bend at the elbow",
        None,
    );
    elbow_bend.angle_label = Some("elbow".to_string());

    ExerciseSpec {
        id: "lateral_raise".to_string(),
        display_name: "Lateral raise".to_string(),
        progress: ProgressSource::JointAngle {
            joints: [Joint::Hip, Joint::Shoulder, Joint::Elbow],
            rest_degrees: 20.0,
            full_degrees: 85.0,
            label: "shoulder".to_string(),
        },
        tracked_joint: Joint::Elbow,
        rules: vec![elbow_bend],
        posture_gate: Some(PostureGate::Upright {
            min_vertical_fraction: 0.1,
            instruction: "Stand facing the camera".to_string(),
        }),
        cues: ExerciseCues {
            top: Some("Shoulder height, pause.".to_string()),
            hint_bottom: "Raise to shoulder height".to_string(),
            hint_top: "Lower with control".to_string(),
            calibrate_prompt: "Stand with arms by your sides and calibrate".to_string(),
            ..ExerciseCues::default()
        },
        guidance: strings(&[
            "Lead with the elbows.",
            "Don't shrug, keep the shoulders down.",
        ]),
        great_form_phrases: great_form(),
    }
}
