//! Recorded-session fixtures for the deterministic CLI harness.
//!
//! A fixture is a JSONL recording (one [`RecordedFrame`] per line) with an
//! optional `<name>.expect.json` sidecar. Recordings are replayed through a
//! real [`TrainerEngine`] driven by a manual clock, so timing-dependent
//! behavior (calibration windows, rate limits, stale counters) reproduces
//! exactly.

pub mod synth;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::calibration::Baseline;
use crate::config::AppConfig;
use crate::engine::{EngineBuilder, FrameStatus, ManualTimeSource, TrainerEngine};
use crate::error::EngineError;
use crate::exercise::ExerciseSpec;
use crate::feedback::{FeedbackMessage, MemorySink, NotifierStatsSnapshot};
use crate::pose::PoseFrame;
use crate::telemetry::TelemetrySnapshot;

/// Default location for fixture recordings.
pub const DEFAULT_FIXTURE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

/// Caller action interleaved with frames in a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCommand {
    BeginCalibration,
    ExpireCalibration,
    ResetReps,
}

/// One line of a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    /// Milliseconds since the start of the recording
    pub t_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<SessionCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<PoseFrame>,
}

/// Metadata describing an available fixture.
#[derive(Clone, Debug)]
pub struct FixtureMetadata {
    pub name: String,
    pub recording_path: PathBuf,
    pub expect_path: Option<PathBuf>,
}

/// Loaded fixture recording plus expectations.
pub struct FixtureData {
    pub metadata: FixtureMetadata,
    pub frames: Vec<RecordedFrame>,
    pub expectations: Option<FixtureExpectations>,
}

/// JSON expectation schema for fixture verification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureExpectations {
    pub fixture: String,
    /// Exercise the recording was made for
    #[serde(default)]
    pub exercise: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub final_reps: Option<u32>,
    #[serde(default)]
    pub calibrated: Option<bool>,
    /// Message types that must reach the sink at least once
    #[serde(default)]
    pub spoken_types: Vec<String>,
    /// Message types that must never reach the sink
    #[serde(default)]
    pub forbidden_types: Vec<String>,
}

impl FixtureExpectations {
    pub fn verify(&self, report: &ReplayReport) -> std::result::Result<(), ExpectationDiff> {
        let mut failures = Vec::new();

        if let Some(expected) = self.final_reps {
            if report.final_reps != expected {
                failures.push(ExpectationFailure::new(
                    "final_reps",
                    expected,
                    report.final_reps,
                ));
            }
        }

        if let Some(expected) = self.calibrated {
            if report.calibrated != expected {
                failures.push(ExpectationFailure::new(
                    "calibrated",
                    expected,
                    report.calibrated,
                ));
            }
        }

        let delivered = report.spoken_types();
        for message_type in &self.spoken_types {
            if !delivered.contains(message_type) {
                failures.push(ExpectationFailure::new(
                    "spoken_types",
                    message_type,
                    &delivered,
                ));
            }
        }
        for message_type in &self.forbidden_types {
            if delivered.contains(message_type) {
                failures.push(ExpectationFailure::new(
                    "forbidden_types",
                    format!("no '{message_type}'"),
                    &delivered,
                ));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExpectationDiff { failures })
        }
    }
}

/// Outcome of comparing a replay with expectations.
#[derive(Debug)]
pub struct ExpectationDiff {
    pub failures: Vec<ExpectationFailure>,
}

impl ExpectationDiff {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "failures": self.failures })
    }
}

/// Detailed diff entry for a single failed check.
#[derive(Debug, Clone, Serialize)]
pub struct ExpectationFailure {
    pub check: String,
    pub expected: serde_json::Value,
    pub actual: serde_json::Value,
}

impl ExpectationFailure {
    fn new(check: &str, expected: impl Serialize, actual: impl Serialize) -> Self {
        Self {
            check: check.to_string(),
            expected: serde_json::to_value(expected).unwrap_or_default(),
            actual: serde_json::to_value(actual).unwrap_or_default(),
        }
    }
}

/// Catalog responsible for discovering fixtures on disk.
pub struct FixtureCatalog {
    root: PathBuf,
}

impl FixtureCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List all fixtures by their metadata.
    pub fn discover(&self) -> Result<Vec<FixtureMetadata>> {
        let mut fixtures = Vec::new();
        if !self.root.exists() {
            return Ok(fixtures);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) == Some("jsonl") {
                    fixtures.push(self.metadata_for_path(&path)?);
                }
            }
        }

        fixtures.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fixtures)
    }

    /// Load a recording + expectations for the provided name or path.
    pub fn load(&self, fixture: &str, override_expect: Option<PathBuf>) -> Result<FixtureData> {
        let recording_path = self.resolve_fixture_path(fixture)?;
        let metadata = self.metadata_for_path(&recording_path)?;
        let frames = load_recording(&recording_path)?;

        let expectation_path = override_expect.or(metadata.expect_path.clone());
        let expectations = match expectation_path {
            Some(path) => {
                let json = fs::read_to_string(&path)
                    .with_context(|| format!("reading expectation {}", path.display()))?;
                Some(
                    serde_json::from_str(&json)
                        .with_context(|| format!("parsing {}", path.display()))?,
                )
            }
            None => None,
        };

        Ok(FixtureData {
            metadata,
            frames,
            expectations,
        })
    }

    fn resolve_fixture_path(&self, fixture: &str) -> Result<PathBuf> {
        let as_path = Path::new(fixture);
        if as_path.exists() {
            return Ok(as_path.to_path_buf());
        }

        let candidate = self.root.join(format!("{fixture}.jsonl"));
        if candidate.exists() {
            Ok(candidate)
        } else {
            Err(anyhow!(
                "Fixture '{fixture}' not found in {}",
                self.root.display()
            ))
        }
    }

    fn metadata_for_path(&self, recording_path: &Path) -> Result<FixtureMetadata> {
        let name = recording_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("Invalid fixture name for {}", recording_path.display()))?
            .to_string();
        let expect_path = recording_path.with_extension("expect.json");
        Ok(FixtureMetadata {
            name,
            recording_path: recording_path.to_path_buf(),
            expect_path: expect_path.exists().then_some(expect_path),
        })
    }
}

impl Default for FixtureCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_FIXTURE_ROOT)
    }
}

/// Parse a JSONL recording. Blank lines are ignored; timestamps must not
/// go backwards.
pub fn load_recording(path: &Path) -> Result<Vec<RecordedFrame>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_recording(&contents).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_recording(contents: &str) -> Result<Vec<RecordedFrame>> {
    let mut frames: Vec<RecordedFrame> = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let frame: RecordedFrame =
            serde_json::from_str(line).with_context(|| format!("line {}", idx + 1))?;
        if let Some(previous) = frames.last() {
            if frame.t_ms < previous.t_ms {
                bail!(
                    "line {}: timestamp {} ms goes back from {} ms",
                    idx + 1,
                    frame.t_ms,
                    previous.t_ms
                );
            }
        }
        frames.push(frame);
    }
    Ok(frames)
}

/// Write a recording as JSONL.
pub fn write_recording(path: &Path, frames: &[RecordedFrame]) -> Result<()> {
    let mut out = String::new();
    for frame in frames {
        out.push_str(&serde_json::to_string(frame)?);
        out.push('\n');
    }
    fs::write(path, out).with_context(|| format!("writing {}", path.display()))
}

/// Summary of one replayed recording.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub exercise: String,
    pub frames: usize,
    pub tracking_frames: usize,
    pub warning_frames: usize,
    pub final_reps: u32,
    /// Recording time of each completed rep
    pub rep_times_ms: Vec<u64>,
    pub calibrated: bool,
    pub baseline: Option<Baseline>,
    /// Messages delivered by the sink, in order
    pub spoken: Vec<FeedbackMessage>,
    /// Non-fatal errors (invalid frames, failed calibrations)
    pub errors: Vec<String>,
    pub faulted: bool,
    pub notifier: NotifierStatsSnapshot,
    pub telemetry: TelemetrySnapshot,
}

impl ReplayReport {
    pub fn spoken_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .spoken
            .iter()
            .map(|m| m.message_type.clone())
            .collect();
        types.sort();
        types.dedup();
        types
    }
}

/// Replays recordings through a fresh engine on a manual clock.
pub struct RecordingPlayer {
    exercise: ExerciseSpec,
    config: AppConfig,
    seed: u64,
}

impl RecordingPlayer {
    pub fn new(exercise: ExerciseSpec) -> Self {
        Self {
            exercise,
            config: AppConfig::default(),
            seed: 7,
        }
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn run(&self, recording: &[RecordedFrame]) -> Result<ReplayReport> {
        let clock = Arc::new(ManualTimeSource::new());
        let sink = MemorySink::new();
        let delivered = sink.handle();
        let mut engine = EngineBuilder::new(self.exercise.clone())
            .config(self.config.clone())
            .time_source(clock.clone())
            .sink(Box::new(sink))
            .seed(self.seed)
            .build()?;

        let mut report = ReplayReport {
            exercise: self.exercise.id.clone(),
            frames: 0,
            tracking_frames: 0,
            warning_frames: 0,
            final_reps: 0,
            rep_times_ms: Vec::new(),
            calibrated: false,
            baseline: None,
            spoken: Vec::new(),
            errors: Vec::new(),
            faulted: false,
            notifier: NotifierStatsSnapshot::default(),
            telemetry: engine.telemetry_snapshot(),
        };

        for record in recording {
            clock.set_elapsed(Duration::from_millis(record.t_ms));
            if let Some(command) = record.command {
                apply_command(&mut engine, command, record.t_ms, &mut report);
            }
            let Some(frame) = &record.frame else {
                continue;
            };

            let reps_before = engine.reps();
            match engine.process_frame(frame) {
                Ok(output) => {
                    report.frames += 1;
                    if output.status == FrameStatus::Tracking {
                        report.tracking_frames += 1;
                    }
                    if !output.warnings.is_empty() {
                        report.warning_frames += 1;
                    }
                    if output.reps > reps_before {
                        report.rep_times_ms.push(record.t_ms);
                    }
                }
                Err(err @ EngineError::InvalidFrame { .. }) => {
                    report.errors.push(format!("{} ms: {}", record.t_ms, err));
                }
                Err(err) => {
                    report.errors.push(format!("{} ms: {}", record.t_ms, err));
                    if engine.is_faulted() {
                        log::error!("[RecordingPlayer] Engine faulted, stopping replay");
                        break;
                    }
                }
            }
        }

        engine.shutdown();
        report.final_reps = engine.reps();
        report.baseline = engine.baseline()?;
        report.calibrated = report.baseline.is_some();
        report.faulted = engine.is_faulted();
        report.spoken = delivered.delivered();
        report.notifier = engine.notifier_stats();
        report.telemetry = engine.telemetry_snapshot();
        Ok(report)
    }
}

fn apply_command(
    engine: &mut TrainerEngine,
    command: SessionCommand,
    t_ms: u64,
    report: &mut ReplayReport,
) {
    match command {
        SessionCommand::BeginCalibration => {
            engine.begin_calibration();
        }
        SessionCommand::ExpireCalibration => {
            if let Err(err) = engine.expire_calibration() {
                report.errors.push(format!("{} ms: {}", t_ms, err));
            }
        }
        SessionCommand::ResetReps => engine.reset_reps(),
    }
}
