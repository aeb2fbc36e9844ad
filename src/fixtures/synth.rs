//! Synthetic pose recordings for the built-in exercises.
//!
//! Poses are laid out on a 640x480 pixel canvas and emitted in normalized
//! coordinates. Each repetition is rise, top hold, fall, bottom hold; the
//! recording opens with a calibration command and rest frames.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::pose::{CoordinateUnits, Joint, JointId, Landmark, Point2, PoseFrame, Side};

use super::{RecordedFrame, SessionCommand};

pub const CANVAS_WIDTH: u32 = 640;
pub const CANVAS_HEIGHT: u32 = 480;

const CONFIDENCE: f64 = 0.95;

#[derive(Debug, Clone, PartialEq)]
pub struct SynthOptions {
    pub exercise: String,
    pub reps: u32,
    pub fps: u32,
    /// Rest frames after the calibration command
    pub calibration_frames: u32,
    pub seed: u64,
    /// Uniform per-coordinate noise amplitude, pixels
    pub jitter: f64,
    pub side: Side,
    /// Perform every rep with the exercise's typical form fault
    pub form_fault: bool,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self {
            exercise: crate::exercise::DEFAULT_EXERCISE.to_string(),
            reps: 3,
            fps: 30,
            calibration_frames: 30,
            seed: 7,
            jitter: 0.0,
            side: Side::Left,
            form_fault: false,
        }
    }
}

type Pose = Vec<(Joint, Point2, Point2)>;

/// Pose generator for one exercise: phase in `[0, 1]` to landmarks.
trait Performer {
    /// Tracked-side and opposite-side positions per joint.
    fn pose(&self, phase: f64, fault: bool) -> Pose;
}

struct GluteFly;
struct Squat;
struct Pushup;
struct LateralRaise;

impl Performer for GluteFly {
    fn pose(&self, phase: f64, fault: bool) -> Pose {
        let h = CANVAS_HEIGHT as f64;
        let pelvis_dx = if fault { 60.0 } else { 0.0 };
        let knee = Point2::new(448.0, 264.0 - phase * 0.12 * h);
        // knees bent, heels tucked back under the hips; the shin lifts with the knee
        let ankle = knee.offset(-108.0, 66.0);
        let hip = Point2::new(320.0 + pelvis_dx, 264.0);
        let shoulder = Point2::new(150.0, 250.0);
        vec![
            (Joint::Shoulder, shoulder, shoulder.offset(4.0, 0.0)),
            (Joint::Hip, hip, hip.offset(4.0, 0.0)),
            (Joint::Knee, knee, knee.offset(0.0, 6.0)),
            (Joint::Ankle, ankle, ankle.offset(0.0, 6.0)),
            (Joint::Heel, ankle.offset(-6.0, 8.0), ankle.offset(-6.0, 14.0)),
            (Joint::FootIndex, ankle.offset(18.0, 36.0), ankle.offset(18.0, 42.0)),
        ]
    }
}

impl Performer for Squat {
    fn pose(&self, phase: f64, fault: bool) -> Pose {
        let knee_angle = lerp(165.0, 65.0, phase);
        let ankle = Point2::new(320.0, 420.0);
        let knee = Point2::new(330.0, 330.0);
        let hip = along(knee, rotate(unit(knee, ankle), knee_angle), 100.0);
        let lean: f64 = if fault { 60.0 } else { 5.0 };
        let shoulder = hip.offset(
            130.0 * lean.to_radians().sin(),
            -130.0 * lean.to_radians().cos(),
        );
        side_view(&[
            (Joint::Shoulder, shoulder),
            (Joint::Hip, hip),
            (Joint::Knee, knee),
            (Joint::Ankle, ankle),
        ])
    }
}

impl Performer for Pushup {
    fn pose(&self, phase: f64, fault: bool) -> Pose {
        let arm = 70.0;
        let elbow_angle = lerp(165.0, 75.0, phase);
        let half = (elbow_angle / 2.0).to_radians();
        let wrist = Point2::new(200.0, 400.0);
        let shoulder = wrist.offset(0.0, -2.0 * arm * half.sin());
        let elbow = wrist.midpoint(shoulder).offset(arm * half.cos(), 0.0);
        let ankle = Point2::new(520.0, 400.0);
        let pike = if fault { 60.0 } else { 3.0 };
        let hip = shoulder.midpoint(ankle).offset(0.0, -pike);
        side_view(&[
            (Joint::Shoulder, shoulder),
            (Joint::Elbow, elbow),
            (Joint::Wrist, wrist),
            (Joint::Hip, hip),
            (Joint::Ankle, ankle),
        ])
    }
}

impl Performer for LateralRaise {
    fn pose(&self, phase: f64, fault: bool) -> Pose {
        let abduction = lerp(15.0, 90.0, phase);
        let bend = if fault { 60.0 } else { 10.0 };
        let mirror = |p: Point2| Point2::new(CANVAS_WIDTH as f64 - p.x, p.y);

        let shoulder = Point2::new(290.0, 150.0);
        let hip = Point2::new(310.0, 300.0);
        let elbow = along(shoulder, downward(-abduction), 80.0);
        let wrist = along(elbow, downward(-(abduction + bend)), 70.0);
        [
            (Joint::Shoulder, shoulder),
            (Joint::Elbow, elbow),
            (Joint::Wrist, wrist),
            (Joint::Hip, hip),
        ]
        .into_iter()
        .map(|(joint, p)| (joint, p, mirror(p)))
        .collect()
    }
}

fn performer(exercise: &str) -> Option<Box<dyn Performer>> {
    match exercise {
        "glute_fly" => Some(Box::new(GluteFly)),
        "squat" => Some(Box::new(Squat)),
        "pushup" => Some(Box::new(Pushup)),
        "lateral_raise" => Some(Box::new(LateralRaise)),
        _ => None,
    }
}

/// Generate a recording for a built-in exercise.
///
/// # Errors
/// Unknown exercise or a zero frame rate.
pub fn generate(options: &SynthOptions) -> anyhow::Result<Vec<RecordedFrame>> {
    let performer = performer(&options.exercise)
        .ok_or_else(|| anyhow::anyhow!("no synthetic performer for '{}'", options.exercise))?;
    if options.fps == 0 {
        anyhow::bail!("fps must be positive");
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let frame_ms = 1000.0 / options.fps as f64;
    let frames_for = |secs: f64| ((secs * options.fps as f64).round() as u32).max(1);
    let mut recording = Vec::new();
    let mut index: u64 = 0;
    let t_ms = |index: u64| (index as f64 * frame_ms).round() as u64;

    recording.push(RecordedFrame {
        t_ms: 0,
        command: Some(SessionCommand::BeginCalibration),
        frame: None,
    });

    let mut push = |phase: f64, fault: bool, rng: &mut StdRng, recording: &mut Vec<_>| {
        index += 1;
        let pose = performer.pose(phase, fault);
        recording.push(RecordedFrame {
            t_ms: t_ms(index),
            command: None,
            frame: Some(render(&pose, options.side, options.jitter, rng)),
        });
    };

    for _ in 0..options.calibration_frames {
        push(0.0, false, &mut rng, &mut recording);
    }
    // settle before the first rep
    for _ in 0..frames_for(0.5) {
        push(0.0, false, &mut rng, &mut recording);
    }

    let (rise, top, fall, bottom) = (
        frames_for(0.6),
        frames_for(0.3),
        frames_for(0.6),
        frames_for(0.5),
    );
    for _ in 0..options.reps {
        for i in 1..=rise {
            push(i as f64 / rise as f64, options.form_fault, &mut rng, &mut recording);
        }
        for _ in 0..top {
            push(1.0, options.form_fault, &mut rng, &mut recording);
        }
        for i in 1..=fall {
            push(
                1.0 - i as f64 / fall as f64,
                options.form_fault,
                &mut rng,
                &mut recording,
            );
        }
        for _ in 0..bottom {
            push(0.0, options.form_fault, &mut rng, &mut recording);
        }
    }

    Ok(recording)
}

fn render(pose: &Pose, side: Side, jitter: f64, rng: &mut StdRng) -> PoseFrame {
    let w = CANVAS_WIDTH as f64;
    let h = CANVAS_HEIGHT as f64;
    let mut noise = || {
        if jitter > 0.0 {
            rng.gen_range(-jitter..=jitter)
        } else {
            0.0
        }
    };

    let mut landmarks: HashMap<JointId, Landmark> = HashMap::new();
    for (joint, tracked, other) in pose {
        for (id, p) in [(joint.on(side), tracked), (joint.on(side.opposite()), other)] {
            let x = (p.x + noise()) / w;
            let y = (p.y + noise()) / h;
            landmarks.insert(id, Landmark::new(x, y, CONFIDENCE));
        }
    }

    let mut frame = PoseFrame::new(CANVAS_WIDTH, CANVAS_HEIGHT, side).with_landmarks(landmarks);
    frame.units = CoordinateUnits::Normalized;
    frame
}

/// Opposite side overlapping the tracked one, shifted slightly.
fn side_view(points: &[(Joint, Point2)]) -> Pose {
    points
        .iter()
        .map(|&(joint, p)| (joint, p, p.offset(4.0, 0.0)))
        .collect()
}

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t.clamp(0.0, 1.0)
}

fn unit(from: Point2, to: Point2) -> Point2 {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    let len = dx.hypot(dy);
    Point2::new(dx / len, dy / len)
}

fn rotate(v: Point2, degrees: f64) -> Point2 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Point2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Unit vector `degrees` away from straight down (positive swings right).
fn downward(degrees: f64) -> Point2 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Point2::new(sin, cos)
}

fn along(origin: Point2, direction: Point2, length: f64) -> Point2 {
    origin.offset(direction.x * length, direction.y * length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise;
    use crate::pose::{angle, PoseView};

    fn view_angle(frame: &PoseFrame, joints: [Joint; 3]) -> f64 {
        let view = PoseView::new(frame, 0.5);
        angle(
            view.tracked(joints[0]).unwrap(),
            view.tracked(joints[1]).unwrap(),
            view.tracked(joints[2]).unwrap(),
        )
    }

    fn frames(options: &SynthOptions) -> Vec<PoseFrame> {
        generate(options)
            .unwrap()
            .into_iter()
            .filter_map(|r| r.frame)
            .collect()
    }

    #[test]
    fn test_recording_opens_with_calibration() {
        let recording = generate(&SynthOptions::default()).unwrap();
        assert_eq!(
            recording[0].command,
            Some(SessionCommand::BeginCalibration)
        );
        assert!(recording.windows(2).all(|w| w[0].t_ms <= w[1].t_ms));
    }

    #[test]
    fn test_every_exercise_passes_its_posture_gate() {
        for id in exercise::builtin_ids() {
            let spec = exercise::builtin(id).unwrap();
            let gate = spec.posture_gate.clone().unwrap();
            for fault in [false, true] {
                let options = SynthOptions {
                    exercise: id.to_string(),
                    reps: 1,
                    form_fault: fault,
                    ..SynthOptions::default()
                };
                for frame in frames(&options) {
                    assert!(gate.check(&PoseView::new(&frame, 0.5)), "{id} fault={fault}");
                }
            }
        }
    }

    #[test]
    fn test_glute_fly_start_position_passes_setup() {
        let spec = exercise::builtin("glute_fly").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let metrics = crate::pose::MetricSample::default();
        for phase in [0.0, 1.0] {
            let frame = render(&GluteFly.pose(phase, false), Side::Left, 0.0, &mut rng);
            let view = PoseView::new(&frame, 0.5);
            let inputs = crate::analysis::RuleInputs {
                metrics: &metrics,
                baseline: None,
                frame_width: view.width(),
            };
            for rule in spec.setup_rules().filter(|r| phase == 0.0 || r.setup_check) {
                let outcome = rule.evaluate(&inputs, rule.raw_measurement(&view));
                assert_eq!(outcome, crate::analysis::RuleOutcome::Pass, "{} at {phase}", rule.id);
            }
        }
    }

    #[test]
    fn test_squat_spans_the_progress_range() {
        let squat = Squat;
        let joints = [Joint::Hip, Joint::Knee, Joint::Ankle];
        let mut rng = StdRng::seed_from_u64(1);
        let rest = render(&squat.pose(0.0, false), Side::Left, 0.0, &mut rng);
        let deep = render(&squat.pose(1.0, false), Side::Left, 0.0, &mut rng);
        assert!((view_angle(&rest, joints) - 165.0).abs() < 0.5);
        assert!((view_angle(&deep, joints) - 65.0).abs() < 0.5);
    }

    #[test]
    fn test_pushup_body_line_breaks_only_with_fault() {
        let joints = [Joint::Shoulder, Joint::Hip, Joint::Ankle];
        let mut rng = StdRng::seed_from_u64(1);
        for phase in [0.0, 0.5, 1.0] {
            let clean = render(&Pushup.pose(phase, false), Side::Left, 0.0, &mut rng);
            let piked = render(&Pushup.pose(phase, true), Side::Left, 0.0, &mut rng);
            assert!(view_angle(&clean, joints) >= 155.0);
            assert!(view_angle(&piked, joints) < 155.0);
        }
    }

    #[test]
    fn test_lateral_raise_elbow_stays_soft() {
        let mut rng = StdRng::seed_from_u64(1);
        let frame = render(&LateralRaise.pose(0.7, false), Side::Left, 0.0, &mut rng);
        let elbow = view_angle(&frame, [Joint::Shoulder, Joint::Elbow, Joint::Wrist]);
        assert!((elbow - 170.0).abs() < 0.5);
        let raise = view_angle(&frame, [Joint::Hip, Joint::Shoulder, Joint::Elbow]);
        assert!(raise > 20.0 && raise < 90.0);
    }

    #[test]
    fn test_right_side_swaps_joint_ids() {
        let options = SynthOptions {
            side: Side::Right,
            reps: 0,
            calibration_frames: 1,
            ..SynthOptions::default()
        };
        let frame = frames(&options).remove(0);
        assert_eq!(frame.tracked_side, Side::Right);
        let landmarks = frame.landmarks.unwrap();
        assert!(landmarks[&JointId::RightKnee].y < landmarks[&JointId::LeftKnee].y);
    }

    #[test]
    fn test_same_seed_same_recording() {
        let options = SynthOptions {
            jitter: 2.0,
            ..SynthOptions::default()
        };
        assert_eq!(generate(&options).unwrap(), generate(&options).unwrap());
    }

    #[test]
    fn test_unknown_exercise_rejected() {
        let options = SynthOptions {
            exercise: "plank".to_string(),
            ..SynthOptions::default()
        };
        assert!(generate(&options).is_err());
    }
}
