//! Configuration management for coaching parameters
//!
//! Smoothing factors, calibration policy, hysteresis thresholds, violation
//! persistence and notifier intervals are loaded from a JSON file so they
//! can be tuned without recompiling. Every section has defaults and a
//! partial file only overrides the keys it names.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::analysis::RepBoundary;
use crate::error::EngineError;

/// Default config file location relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "assets/coach_config.json";

/// Longest accepted duration setting (one day)
pub const MAX_DURATION_SECS: f64 = 86_400.0;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub smoothing: SmoothingConfig,
    pub calibration: CalibrationConfig,
    pub reps: RepConfig,
    pub violations: ViolationConfig,
    pub notifier: NotifierConfig,
    pub guidance: GuidanceConfig,
}

/// Exponential smoothing and confidence gating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Blend factor for body metrics (pelvis position, joint height, spread)
    pub metric_alpha: f64,
    /// Blend factor for the normalized progress signal
    pub progress_alpha: f64,
    /// Blend factor for per-rule joint angles
    pub angle_alpha: f64,
    /// Landmarks below this confidence are treated as unavailable
    pub min_confidence: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            metric_alpha: 0.35,
            progress_alpha: 0.4,
            angle_alpha: 0.35,
            min_confidence: 0.5,
        }
    }
}

/// Calibration window policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Valid frames averaged into the baseline
    pub target_frames: u32,
    /// Wall-clock window after which a partial baseline is accepted
    pub timeout_secs: f64,
    /// Fraction of `target_frames` required for a partial baseline
    pub min_partial_fraction: f64,
    /// Hard limit; past it a window without enough frames fails
    pub abandon_after_secs: f64,
    /// Share of calibration frames that must pass the setup checks
    pub setup_pass_ratio: f64,
    /// Displacement target as a fraction of frame height
    pub target_displacement_fraction: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            target_frames: 30,
            timeout_secs: 5.0,
            min_partial_fraction: 0.33,
            abandon_after_secs: 20.0,
            setup_pass_ratio: 0.7,
            target_displacement_fraction: 0.09,
        }
    }
}

impl CalibrationConfig {
    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }

    pub fn abandon_after(&self) -> Duration {
        secs(self.abandon_after_secs)
    }

    /// Minimum frames accepted by the partial-success policy (at least one).
    pub fn min_partial_frames(&self) -> u32 {
        let frames = (self.target_frames as f64 * self.min_partial_fraction).ceil() as u32;
        frames.clamp(1, self.target_frames.max(1))
    }
}

/// Repetition hysteresis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepConfig {
    pub up_threshold: f64,
    pub down_threshold: f64,
    pub boundary: RepBoundary,
}

impl Default for RepConfig {
    fn default() -> Self {
        Self {
            up_threshold: 0.85,
            down_threshold: 0.20,
            boundary: RepBoundary::OnReturn,
        }
    }
}

/// Violation persistence and recovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViolationConfig {
    /// Counter must exceed this before a warning is spoken
    pub persistence_frames: i32,
    /// Counter is forced to minus this after a warning
    pub cooldown_frames: i32,
    /// Passing streak must exceed this before praise is offered
    pub positive_streak_frames: i32,
    /// Consecutive all-pass frames before the aggregate message
    pub great_form_frames: u32,
    /// Counters are forced to minus this after the aggregate message
    pub great_form_cooldown: i32,
    /// Evidence older than this is discarded
    pub stale_after_ms: u64,
}

impl Default for ViolationConfig {
    fn default() -> Self {
        Self {
            persistence_frames: 8,
            cooldown_frames: 5,
            positive_streak_frames: 16,
            great_form_frames: 20,
            great_form_cooldown: 15,
            stale_after_ms: 1000,
        }
    }
}

impl ViolationConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

/// Speech backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Write messages to the log
    Log,
    /// Keep messages in memory (replay and tests)
    Memory,
    /// Run an external text-to-speech program, falling back to the log
    Command,
}

/// Feedback notifier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub high_interval_secs: f64,
    pub normal_interval_secs: f64,
    pub low_interval_secs: f64,
    pub sink: SinkKind,
    /// Program used by the command sink; platform default when absent
    pub command: Option<String>,
    pub command_args: Vec<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            high_interval_secs: 0.8,
            normal_interval_secs: 1.8,
            low_interval_secs: 3.5,
            sink: SinkKind::Log,
            command: None,
            command_args: Vec::new(),
        }
    }
}

/// Periodic coaching reminders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceConfig {
    pub enabled: bool,
    pub interval_secs: f64,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 15.0,
        }
    }
}

impl GuidanceConfig {
    pub fn interval(&self) -> Duration {
        secs(self.interval_secs)
    }
}

/// Saturates instead of panicking; `validate` rejects out-of-range values.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults when the file is missing or
    /// malformed. Either failure is logged, never raised.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        Self::load_from_file(DEFAULT_CONFIG_PATH)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        let s = &self.smoothing;
        for (name, alpha) in [
            ("smoothing.metric_alpha", s.metric_alpha),
            ("smoothing.progress_alpha", s.progress_alpha),
            ("smoothing.angle_alpha", s.angle_alpha),
        ] {
            if !(alpha > 0.0 && alpha < 1.0) {
                return Err(invalid(format!("{name} must be in (0, 1), got {alpha}")));
            }
        }
        if !(0.0..=1.0).contains(&s.min_confidence) {
            return Err(invalid(format!(
                "smoothing.min_confidence must be in [0, 1], got {}",
                s.min_confidence
            )));
        }

        let c = &self.calibration;
        if c.target_frames == 0 {
            return Err(invalid("calibration.target_frames must be positive".into()));
        }
        if !(c.min_partial_fraction > 0.0 && c.min_partial_fraction <= 1.0) {
            return Err(invalid(format!(
                "calibration.min_partial_fraction must be in (0, 1], got {}",
                c.min_partial_fraction
            )));
        }
        if !(c.target_displacement_fraction > 0.0 && c.target_displacement_fraction <= 1.0) {
            return Err(invalid(format!(
                "calibration.target_displacement_fraction must be in (0, 1], got {}",
                c.target_displacement_fraction
            )));
        }
        if c.timeout_secs <= 0.0 || c.abandon_after_secs < c.timeout_secs {
            return Err(invalid(
                "calibration.abandon_after_secs must not be shorter than timeout_secs".into(),
            ));
        }
        for (name, value) in [
            ("calibration.timeout_secs", c.timeout_secs),
            ("calibration.abandon_after_secs", c.abandon_after_secs),
            ("notifier.high_interval_secs", self.notifier.high_interval_secs),
            ("notifier.normal_interval_secs", self.notifier.normal_interval_secs),
            ("notifier.low_interval_secs", self.notifier.low_interval_secs),
            ("guidance.interval_secs", self.guidance.interval_secs),
        ] {
            if !(value <= MAX_DURATION_SECS) {
                return Err(invalid(format!(
                    "{name} must be at most {MAX_DURATION_SECS} s, got {value}"
                )));
            }
        }

        let r = &self.reps;
        if !(0.0..=1.0).contains(&r.down_threshold)
            || !(0.0..=1.0).contains(&r.up_threshold)
            || r.up_threshold <= r.down_threshold
        {
            return Err(invalid(format!(
                "reps thresholds must satisfy 0 <= down < up <= 1, got down={} up={}",
                r.down_threshold, r.up_threshold
            )));
        }

        let v = &self.violations;
        if v.persistence_frames < 0 || v.cooldown_frames < 0 || v.great_form_cooldown < 0 {
            return Err(invalid("violation counters must be non-negative".into()));
        }

        let n = &self.notifier;
        for (name, interval) in [
            ("notifier.high_interval_secs", n.high_interval_secs),
            ("notifier.normal_interval_secs", n.normal_interval_secs),
            ("notifier.low_interval_secs", n.low_interval_secs),
        ] {
            if !(interval > 0.0) {
                return Err(invalid(format!("{name} must be positive, got {interval}")));
            }
        }

        if self.guidance.enabled && !(self.guidance.interval_secs > 0.0) {
            return Err(invalid("guidance.interval_secs must be positive".into()));
        }

        Ok(())
    }
}

fn invalid(reason: String) -> EngineError {
    EngineError::InvalidConfig { reason }
}
