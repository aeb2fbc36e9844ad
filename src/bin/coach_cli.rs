use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use form_coach::config::AppConfig;
use form_coach::exercise::{self, ExerciseSpec};
use form_coach::feedback::build_sink;
use form_coach::fixtures::synth::{self, SynthOptions};
use form_coach::fixtures::{
    write_recording, ExpectationDiff, FixtureCatalog, ReplayReport, RecordingPlayer,
    SessionCommand,
};
use form_coach::pose::Side;
use form_coach::{EngineBuilder, EngineError};

#[derive(Parser, Debug)]
#[command(
    name = "coach_cli",
    about = "Deterministic replay harness for the form coach engine"
)]
struct Cli {
    /// Override directory containing fixture recordings (defaults to ./fixtures)
    #[arg(long)]
    fixtures_dir: Option<PathBuf>,
    /// Engine configuration JSON (defaults to built-in values)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a recording and optionally compare against expectations
    Replay {
        #[arg(long)]
        fixture: String,
        #[arg(long)]
        expect: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Built-in exercise id (defaults to the expectation's exercise)
        #[arg(long)]
        exercise: Option<String>,
        /// Exercise definition JSON, overrides --exercise
        #[arg(long)]
        exercise_file: Option<PathBuf>,
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
    /// Generate a synthetic recording for a built-in exercise
    Synth {
        #[arg(long, default_value = exercise::DEFAULT_EXERCISE)]
        exercise: String,
        #[arg(long, default_value_t = 3)]
        reps: u32,
        #[arg(long, default_value_t = 30)]
        fps: u32,
        #[arg(long, default_value_t = 7)]
        seed: u64,
        /// Landmark noise amplitude in pixels
        #[arg(long, default_value_t = 0.0)]
        jitter: f64,
        #[arg(long, value_enum, default_value_t = SideArg::Left)]
        side: SideArg,
        /// Perform every rep with the exercise's typical form fault
        #[arg(long)]
        form_fault: bool,
        #[arg(long)]
        output: PathBuf,
    },
    /// Play a recording in real time through the configured speech sink,
    /// printing each frame output as a JSON line
    Live {
        #[arg(long)]
        fixture: String,
        #[arg(long, default_value = exercise::DEFAULT_EXERCISE)]
        exercise: String,
        /// Playback speed multiplier; timing rules run on the compressed clock
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
    },
    /// List built-in exercises
    Exercises,
    /// Print the effective configuration as JSON
    Config,
    /// List available fixtures on disk
    DumpFixtures,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SideArg {
    Left,
    Right,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Left => Side::Left,
            SideArg::Right => Side::Right,
        }
    }
}

fn main() -> ExitCode {
    form_coach::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let catalog = cli
        .fixtures_dir
        .map(FixtureCatalog::new)
        .unwrap_or_else(FixtureCatalog::default);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Replay {
            fixture,
            expect,
            output,
            exercise,
            exercise_file,
            seed,
        } => run_replay(
            &catalog,
            config,
            &fixture,
            expect,
            output,
            exercise.as_deref(),
            exercise_file.as_deref(),
            seed,
        ),
        Commands::Synth {
            exercise,
            reps,
            fps,
            seed,
            jitter,
            side,
            form_fault,
            output,
        } => run_synth(
            SynthOptions {
                exercise,
                reps,
                fps,
                seed,
                jitter,
                side: side.into(),
                form_fault,
                ..SynthOptions::default()
            },
            &output,
        ),
        Commands::Live {
            fixture,
            exercise,
            speed,
        } => run_live(&catalog, config, &fixture, &exercise, speed),
        Commands::Exercises => run_exercises(),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
        Commands::DumpFixtures => run_dump(&catalog),
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))?
        }
        None => AppConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

#[allow(clippy::too_many_arguments)]
fn run_replay(
    catalog: &FixtureCatalog,
    config: AppConfig,
    fixture: &str,
    override_expect: Option<PathBuf>,
    output_path: Option<PathBuf>,
    exercise_id: Option<&str>,
    exercise_file: Option<&Path>,
    seed: u64,
) -> Result<ExitCode> {
    let data = catalog.load(fixture, override_expect)?;
    let spec = resolve_exercise(
        exercise_file,
        exercise_id.or(data
            .expectations
            .as_ref()
            .and_then(|e| e.exercise.as_deref())),
    )?;

    let report = RecordingPlayer::new(spec)
        .with_config(config)
        .with_seed(seed)
        .run(&data.frames)
        .with_context(|| format!("replaying fixture {}", fixture))?;

    emit_report(&data.metadata.name, &report, output_path)?;

    if let Some(expectations) = data.expectations {
        match expectations.verify(&report) {
            Ok(()) => Ok(ExitCode::from(0)),
            Err(diff) => {
                emit_diff(&diff)?;
                Ok(ExitCode::from(2))
            }
        }
    } else {
        Ok(ExitCode::from(0))
    }
}

fn resolve_exercise(file: Option<&Path>, id: Option<&str>) -> Result<ExerciseSpec> {
    let spec = match file {
        Some(path) => ExerciseSpec::load_from_file(path)?,
        None => exercise::builtin(id.unwrap_or(exercise::DEFAULT_EXERCISE))?,
    };
    Ok(spec)
}

fn run_synth(options: SynthOptions, output: &Path) -> Result<ExitCode> {
    let recording = synth::generate(&options)?;
    write_recording(output, &recording)?;
    println!(
        "Wrote {} records ({} reps of {}) to {}",
        recording.len(),
        options.reps,
        options.exercise,
        output.display()
    );
    Ok(ExitCode::from(0))
}

fn run_live(
    catalog: &FixtureCatalog,
    config: AppConfig,
    fixture: &str,
    exercise_id: &str,
    speed: f64,
) -> Result<ExitCode> {
    if !(speed.is_finite() && speed > 0.0) {
        anyhow::bail!("--speed must be positive, got {speed}");
    }
    let data = catalog.load(fixture, None)?;
    let spec = exercise::builtin(exercise_id)?;
    let sink = build_sink(&config.notifier);
    let mut engine = EngineBuilder::new(spec).config(config).sink(sink).build()?;
    form_coach::http::spawn_if_enabled(&engine);

    let started = Instant::now();
    for record in &data.frames {
        let due = Duration::from_secs_f64(record.t_ms as f64 / 1000.0 / speed);
        if let Some(wait) = due.checked_sub(started.elapsed()) {
            thread::sleep(wait);
        }

        match record.command {
            Some(SessionCommand::BeginCalibration) => {
                engine.begin_calibration();
            }
            Some(SessionCommand::ExpireCalibration) => {
                if let Err(err) = engine.expire_calibration() {
                    log::warn!("[coach_cli] {} ms: {}", record.t_ms, err);
                }
            }
            Some(SessionCommand::ResetReps) => engine.reset_reps(),
            None => {}
        }

        let Some(frame) = &record.frame else {
            continue;
        };
        match engine.process_frame(frame) {
            Ok(output) => println!("{}", serde_json::to_string(&output)?),
            Err(err @ EngineError::InvalidFrame { .. }) => {
                log::warn!("[coach_cli] {} ms: {}", record.t_ms, err);
            }
            Err(err) => {
                engine.shutdown();
                return Err(err).with_context(|| format!("frame at {} ms", record.t_ms));
            }
        }
    }

    engine.shutdown();
    log::info!(
        "[coach_cli] {} finished with {} reps ({:?})",
        fixture,
        engine.reps(),
        engine.notifier_stats()
    );
    Ok(ExitCode::from(0))
}

fn run_exercises() -> Result<ExitCode> {
    for spec in exercise::catalog::all() {
        let rules: Vec<&str> = spec.rules.iter().map(|r| r.id.as_str()).collect();
        println!("{:<14} {:<22} rules: {}", spec.id, spec.display_name, rules.join(", "));
    }
    Ok(ExitCode::from(0))
}

fn run_dump(catalog: &FixtureCatalog) -> Result<ExitCode> {
    let fixtures = catalog.discover()?;
    if fixtures.is_empty() {
        println!("No fixtures found under {}", catalog.root().display());
        return Ok(ExitCode::from(0));
    }

    for metadata in fixtures {
        if let Some(expect) = metadata.expect_path {
            println!("{} -> {}", metadata.name, expect.display());
        } else {
            println!("{}", metadata.name);
        }
    }
    Ok(ExitCode::from(0))
}

fn emit_report(fixture: &str, report: &ReplayReport, output_path: Option<PathBuf>) -> Result<()> {
    let payload = ReplayReportPayload { fixture, report };
    let json = serde_json::to_string_pretty(&payload)?;

    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    Ok(())
}

fn emit_diff(diff: &ExpectationDiff) -> Result<()> {
    let json = serde_json::to_string_pretty(&diff.to_json())?;
    eprintln!("{json}");
    Ok(())
}

#[derive(serde::Serialize)]
struct ReplayReportPayload<'a> {
    fixture: &'a str,
    #[serde(flatten)]
    report: &'a ReplayReport,
}
