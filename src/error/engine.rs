// Engine error types and constants

use crate::error::{CalibrationError, DeliveryError, ErrorCode};
use log::error;
use std::fmt;

/// Engine error code constants
///
/// Error code range: 1001-1005. Wrapped calibration and delivery errors
/// report their own codes.
pub struct EngineErrorCodes {}

impl EngineErrorCodes {
    /// Frame dimensions were zero (caller bug)
    pub const INVALID_FRAME: i32 = 1001;

    /// Engine instance was faulted by an earlier invariant violation
    pub const FAULTED: i32 = 1002;

    /// Internal invariant violated while processing a frame
    pub const INVARIANT_VIOLATED: i32 = 1003;

    /// Configuration or exercise definition rejected
    pub const INVALID_CONFIG: i32 = 1004;

    /// Exercise id not present in the catalog
    pub const UNKNOWN_EXERCISE: i32 = 1005;
}

/// Log an engine error with structured context
pub fn log_engine_error(err: &EngineError, context: &str) {
    error!(
        "Engine error in {}: code={}, component=TrainerEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors returned by the per-frame engine.
///
/// `InvariantViolated` is fatal for the engine instance: every later call
/// returns `Faulted`. Nothing here is ever fatal for the process.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    InvalidFrame { width: u32, height: u32 },
    Faulted { reason: String },
    InvariantViolated { detail: String },
    InvalidConfig { reason: String },
    UnknownExercise { id: String },
    Calibration(CalibrationError),
    Delivery(DeliveryError),
}

impl ErrorCode for EngineError {
    fn code(&self) -> i32 {
        match self {
            EngineError::InvalidFrame { .. } => EngineErrorCodes::INVALID_FRAME,
            EngineError::Faulted { .. } => EngineErrorCodes::FAULTED,
            EngineError::InvariantViolated { .. } => EngineErrorCodes::INVARIANT_VIOLATED,
            EngineError::InvalidConfig { .. } => EngineErrorCodes::INVALID_CONFIG,
            EngineError::UnknownExercise { .. } => EngineErrorCodes::UNKNOWN_EXERCISE,
            EngineError::Calibration(inner) => inner.code(),
            EngineError::Delivery(inner) => inner.code(),
        }
    }

    fn message(&self) -> String {
        match self {
            EngineError::InvalidFrame { width, height } => {
                format!("Invalid frame size {}x{}", width, height)
            }
            EngineError::Faulted { reason } => format!("Engine faulted: {}", reason),
            EngineError::InvariantViolated { detail } => {
                format!("Invariant violated: {}", detail)
            }
            EngineError::InvalidConfig { reason } => format!("Invalid configuration: {}", reason),
            EngineError::UnknownExercise { id } => format!("Unknown exercise '{}'", id),
            EngineError::Calibration(inner) => inner.message(),
            EngineError::Delivery(inner) => inner.message(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EngineError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for EngineError {}

impl From<CalibrationError> for EngineError {
    fn from(err: CalibrationError) -> Self {
        EngineError::Calibration(err)
    }
}

impl From<DeliveryError> for EngineError {
    fn from(err: DeliveryError) -> Self {
        EngineError::Delivery(err)
    }
}
