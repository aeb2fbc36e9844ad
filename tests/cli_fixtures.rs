use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_coach_cli"))
}

fn fixture_file(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

#[test]
fn replay_fixture_succeeds() {
    let output = cli()
        .args(["replay", "--fixture", "glute_fly_three_reps"])
        .output()
        .expect("failed to run coach_cli replay");
    assert!(
        output.status.success(),
        "CLI exited with {:?}",
        output.status.code()
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("replay report JSON payload");
    assert_eq!(json["fixture"], "glute_fly_three_reps");
    assert_eq!(json["final_reps"], 3);
    assert_eq!(json["calibrated"], true);
}

#[test]
fn replay_fixture_detects_mismatch() {
    let output = cli()
        .args([
            "replay",
            "--fixture",
            "glute_fly_three_reps",
            "--expect",
            &fixture_file("glute_fly_three_reps_incorrect.expect.json"),
        ])
        .output()
        .expect("failed to run mismatch replay");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(
        stderr.contains("\"failures\""),
        "expected diff JSON in stderr, got {stderr}"
    );
}

#[test]
fn pelvis_shift_fixture_meets_expectations() {
    let output = cli()
        .args(["replay", "--fixture", "glute_fly_pelvis_shift"])
        .output()
        .expect("failed to run pelvis shift replay");
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn synth_then_replay_round_trip() {
    let path = std::env::temp_dir().join(format!("coach_cli_synth_{}.jsonl", std::process::id()));
    let status = cli()
        .args([
            "synth",
            "--exercise",
            "squat",
            "--reps",
            "2",
            "--jitter",
            "1.0",
            "--output",
        ])
        .arg(&path)
        .status()
        .expect("failed to run synth");
    assert!(status.success());

    let output = cli()
        .args(["replay", "--exercise", "squat", "--fixture"])
        .arg(&path)
        .output()
        .expect("failed to replay synthetic recording");
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("report JSON");
    assert_eq!(json["final_reps"], 2);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn unknown_exercise_is_an_error() {
    let output = cli()
        .args([
            "replay",
            "--fixture",
            "glute_fly_three_reps",
            "--exercise",
            "plank",
        ])
        .output()
        .expect("failed to run replay");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn dump_fixtures_lists_assets() {
    let output = cli()
        .arg("dump-fixtures")
        .output()
        .expect("failed to run dump-fixtures");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    assert!(
        stdout.contains("glute_fly_three_reps"),
        "expected fixture listing, got {stdout}"
    );
}

#[test]
fn exercises_lists_builtins() {
    let output = cli()
        .arg("exercises")
        .output()
        .expect("failed to run exercises");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    for id in ["glute_fly", "squat", "pushup", "lateral_raise"] {
        assert!(stdout.contains(id), "missing {id} in {stdout}");
    }
}

#[test]
fn live_playback_streams_frame_outputs() {
    let output = cli()
        .args([
            "live",
            "--fixture",
            "glute_fly_three_reps",
            "--speed",
            "100",
        ])
        .output()
        .expect("failed to run live playback");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let frames: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("frame output JSON line"))
        .collect();
    assert!(frames.iter().any(|f| f["status"] == "calibrating"));
    assert_eq!(frames.last().map(|f| f["reps"].clone()), Some(Value::from(3)));
}
