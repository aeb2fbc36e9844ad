// Form Coach Core - pose-based exercise coaching engine
// Per-frame posture analysis, repetition counting and rate-limited spoken feedback

// Module declarations
pub mod analysis;
pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;
pub mod exercise;
pub mod feedback;
pub mod fixtures;
pub mod http;
pub mod managers;
pub mod pose;
pub mod telemetry;

// Re-exports for convenience
pub use config::AppConfig;
pub use engine::{EngineBuilder, FrameOutput, FrameStatus, TrainerEngine};
pub use error::{CalibrationError, DeliveryError, EngineError, ErrorCode};
pub use exercise::ExerciseSpec;
pub use feedback::{FeedbackMessage, Priority};
pub use pose::{JointId, Landmark, PoseFrame, Side};

/// Install the global tracing subscriber (honors `RUST_LOG`).
///
/// Output goes to stderr so CLI reports on stdout stay machine-readable.
/// Calling this more than once is harmless.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
    {
        log::debug!("[FormCoach] Logging initialized");
    }
}
