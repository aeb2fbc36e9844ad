//! End-to-end coaching sessions driven through the public engine API
//!
//! Synthetic recordings stand in for a pose estimator; the engine runs on a
//! manual clock so every timing rule is deterministic.

use std::sync::Arc;
use std::time::Duration;

use form_coach::engine::ManualTimeSource;
use form_coach::feedback::{types, MemorySink, MemorySinkHandle};
use form_coach::fixtures::synth::{self, SynthOptions};
use form_coach::fixtures::{RecordedFrame, SessionCommand};
use form_coach::telemetry::EngineEvent;
use form_coach::{EngineBuilder, FrameOutput, FrameStatus, PoseFrame, Side, TrainerEngine};

struct Session {
    engine: TrainerEngine,
    clock: Arc<ManualTimeSource>,
    sink: MemorySinkHandle,
}

fn session(exercise: &str) -> Session {
    let clock = Arc::new(ManualTimeSource::new());
    let sink = MemorySink::new();
    let handle = sink.handle();
    let engine = EngineBuilder::for_exercise(exercise)
        .expect("builtin exercise")
        .time_source(clock.clone())
        .sink(Box::new(sink))
        .seed(11)
        .build()
        .expect("engine");
    Session {
        engine,
        clock,
        sink: handle,
    }
}

fn drive(session: &mut Session, recording: &[RecordedFrame]) -> Vec<FrameOutput> {
    let mut outputs = Vec::new();
    for record in recording {
        session
            .clock
            .set_elapsed(Duration::from_millis(record.t_ms));
        match record.command {
            Some(SessionCommand::BeginCalibration) => {
                session.engine.begin_calibration();
            }
            Some(SessionCommand::ExpireCalibration) => {
                let _ = session.engine.expire_calibration();
            }
            Some(SessionCommand::ResetReps) => session.engine.reset_reps(),
            None => {}
        }
        if let Some(frame) = &record.frame {
            outputs.push(session.engine.process_frame(frame).expect("frame"));
        }
    }
    outputs
}

/// Rest frames only: a calibration command followed by the bottom pose.
fn rest_frames(exercise: &str) -> Vec<PoseFrame> {
    synth::generate(&SynthOptions {
        exercise: exercise.to_string(),
        reps: 0,
        ..SynthOptions::default()
    })
    .expect("synthetic recording")
    .into_iter()
    .filter_map(|record| record.frame)
    .collect()
}

#[test]
fn right_side_glute_fly_counts_every_rep() {
    let mut session = session("glute_fly");
    let recording = synth::generate(&SynthOptions {
        side: Side::Right,
        ..SynthOptions::default()
    })
    .unwrap();

    let outputs = drive(&mut session, &recording);

    assert_eq!(session.engine.reps(), 3);
    assert!(outputs.iter().any(|o| o.status == FrameStatus::Calibrating));
    assert!(outputs.iter().any(|o| o.status == FrameStatus::Tracking));
    let reps: Vec<u32> = outputs.iter().map(|o| o.reps).collect();
    assert!(reps.windows(2).all(|w| w[1] >= w[0]), "rep count never decreases");
}

#[test]
fn jittery_landmarks_still_count_clean_reps() {
    let mut session = session("glute_fly");
    let recording = synth::generate(&SynthOptions {
        jitter: 2.0,
        seed: 42,
        ..SynthOptions::default()
    })
    .unwrap();

    let outputs = drive(&mut session, &recording);

    assert_eq!(session.engine.reps(), 3);
    assert!(outputs.iter().all(|o| (0.0..=1.0).contains(&o.progress)));
}

#[test]
fn angle_exercise_tracks_without_calibration() {
    let mut session = session("squat");
    let recording: Vec<RecordedFrame> = synth::generate(&SynthOptions {
        exercise: "squat".to_string(),
        reps: 2,
        ..SynthOptions::default()
    })
    .unwrap()
    .into_iter()
    .filter(|record| record.command.is_none())
    .collect();

    let outputs = drive(&mut session, &recording);

    assert!(session.engine.baseline().unwrap().is_none());
    assert!(outputs.iter().all(|o| o.status != FrameStatus::Calibrating));
    assert_eq!(session.engine.reps(), 2);
}

#[test]
fn missing_pose_mid_session_keeps_the_count() {
    let mut session = session("glute_fly");
    let recording = synth::generate(&SynthOptions {
        reps: 1,
        ..SynthOptions::default()
    })
    .unwrap();
    drive(&mut session, &recording);
    assert_eq!(session.engine.reps(), 1);

    for _ in 0..10 {
        session.clock.advance(Duration::from_millis(33));
        let out = session
            .engine
            .process_frame(&PoseFrame::new(640, 480, Side::Left))
            .unwrap();
        assert_eq!(out.status, FrameStatus::NoPose);
        assert_eq!(out.reps, 1);
    }
}

#[test]
fn calibration_times_out_into_partial_baseline() {
    let mut session = session("glute_fly");
    let frame = rest_frames("glute_fly").remove(0);

    assert!(session.engine.begin_calibration());
    // one usable frame every 500ms; the 5s window closes after ten of them
    for _ in 0..12 {
        session.clock.advance(Duration::from_millis(500));
        session.engine.process_frame(&frame).unwrap();
        if !session.engine.is_calibrating() {
            break;
        }
    }

    let baseline = session.engine.baseline().unwrap().expect("partial baseline");
    assert!(baseline.partial);
    assert!(baseline.frames_averaged >= 10);
    assert!(baseline.frames_averaged < 30);

    let snapshot = session.engine.telemetry_snapshot();
    assert_eq!(
        snapshot.count(|e| matches!(e, EngineEvent::CalibrationFinished { partial: true, .. })),
        1
    );
}

#[test]
fn calibration_without_a_visible_body_is_abandoned() {
    let mut session = session("glute_fly");
    assert!(session.engine.begin_calibration());

    let empty = PoseFrame::new(640, 480, Side::Left);
    for _ in 0..25 {
        session.clock.advance(Duration::from_secs(1));
        session.engine.process_frame(&empty).unwrap();
    }

    assert!(!session.engine.is_calibrating());
    assert!(session.engine.baseline().unwrap().is_none());
    let snapshot = session.engine.telemetry_snapshot();
    assert_eq!(
        snapshot.count(|e| matches!(e, EngineEvent::CalibrationFailed { .. })),
        1
    );

    session.engine.shutdown();
    let spoken = session.sink.delivered();
    assert!(spoken
        .iter()
        .any(|m| m.text == session.engine.exercise().cues.calibration_failed));
}

#[test]
fn recalibration_replaces_the_baseline_only_when_finished() {
    let mut session = session("glute_fly");
    let recording = synth::generate(&SynthOptions {
        reps: 0,
        ..SynthOptions::default()
    })
    .unwrap();
    drive(&mut session, &recording);
    let first = session.engine.baseline().unwrap().expect("baseline");

    assert!(session.engine.begin_calibration());
    let frame = rest_frames("glute_fly").remove(0);
    for _ in 0..5 {
        session.clock.advance(Duration::from_millis(33));
        session.engine.process_frame(&frame).unwrap();
    }
    assert!(session.engine.is_calibrating());
    assert_eq!(session.engine.baseline().unwrap(), Some(first.clone()));

    let replaced = session
        .engine
        .expire_calibration()
        .unwrap()
        .expect("forced baseline");
    assert_eq!(replaced.frames_averaged, 5);
    assert_eq!(session.engine.baseline().unwrap(), Some(replaced));
}

#[test]
fn calibration_progress_reaches_bridge_subscribers() {
    let mut session = session("glute_fly");
    let mut updates = session.engine.calibration_updates();

    let recording = synth::generate(&SynthOptions {
        reps: 0,
        ..SynthOptions::default()
    })
    .unwrap();
    drive(&mut session, &recording);
    assert!(session.engine.baseline().unwrap().is_some());

    let mut last = None;
    while let Some(progress) = updates.blocking_recv() {
        let done = progress.is_complete();
        last = Some(progress);
        if done {
            break;
        }
    }
    let last = last.expect("progress updates");
    assert_eq!(last.frames_collected, last.frames_needed);
    assert!(!last.partial);
}

#[tokio::test]
async fn telemetry_stream_reports_completed_reps() {
    use futures::StreamExt;

    let mut session = session("glute_fly");
    let mut stream = session.engine.telemetry_stream();

    let recording = synth::generate(&SynthOptions {
        reps: 2,
        ..SynthOptions::default()
    })
    .unwrap();
    drive(&mut session, &recording);

    let mut reps_seen = Vec::new();
    while reps_seen.len() < 2 {
        let record = stream.next().await.expect("telemetry record");
        if let EngineEvent::RepCompleted { reps } = record.event {
            reps_seen.push(reps);
        }
    }
    assert_eq!(reps_seen, vec![1, 2]);
}

#[test]
fn rep_announcements_are_spoken_in_order() {
    let mut session = session("glute_fly");
    let recording = synth::generate(&SynthOptions::default()).unwrap();
    drive(&mut session, &recording);
    session.engine.shutdown();

    let reps: Vec<String> = session
        .sink
        .delivered()
        .into_iter()
        .filter(|m| m.message_type == types::REP_COMPLETE)
        .map(|m| m.text)
        .collect();
    assert_eq!(reps, vec!["Good! Rep 1", "Good! Rep 2", "Good! Rep 3"]);
}

#[tokio::test]
async fn frame_and_calibration_streams_follow_the_session() {
    use futures::StreamExt;

    let mut session = session("glute_fly");
    let mut frames = session.engine.frame_stream();
    let mut calibration = session.engine.calibration_stream();

    let recording = synth::generate(&SynthOptions {
        reps: 0,
        ..SynthOptions::default()
    })
    .unwrap();
    let outputs = drive(&mut session, &recording);

    let first = frames.next().await.expect("frame output");
    assert_eq!(first, outputs[0]);
    assert_eq!(first.status, FrameStatus::Calibrating);

    let opening = calibration.next().await.expect("calibration progress");
    assert_eq!(opening.frames_collected, 0);
    let second = calibration.next().await.expect("calibration progress");
    assert_eq!(second.frames_collected, 1);
}

#[test]
fn frame_updates_bridge_delivers_in_order() {
    let mut session = session("squat");
    let mut updates = session.engine.frame_updates();

    for _ in 0..3 {
        session.clock.advance(Duration::from_millis(33));
        session
            .engine
            .process_frame(&PoseFrame::new(640, 480, Side::Left))
            .unwrap();
    }
    session.clock.advance(Duration::from_millis(33));
    let frame = rest_frames("squat").remove(0);
    let last = session.engine.process_frame(&frame).unwrap();

    let received: Vec<FrameOutput> = (0..4)
        .map(|_| updates.blocking_recv().expect("bridged frame"))
        .collect();
    assert!(received[..3].iter().all(|o| o.status == FrameStatus::NoPose));
    assert_eq!(received[3], last);
}

#[test]
fn clean_start_position_is_verified_without_corrections() {
    let mut session = session("glute_fly");
    let recording = synth::generate(&SynthOptions {
        reps: 0,
        ..SynthOptions::default()
    })
    .unwrap();
    let outputs = drive(&mut session, &recording);

    let baseline = session.engine.baseline().unwrap().expect("baseline");
    assert!(baseline.setup_verified);
    assert!(outputs
        .iter()
        .flat_map(|o| o.spoken.iter())
        .all(|m| !m.message_type.starts_with("calib_")));

    session.engine.shutdown();
    let spoken = session.sink.texts();
    assert!(spoken.contains(&session.engine.exercise().cues.calibration_done));
}
