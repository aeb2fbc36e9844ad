// Calibration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// Error code range: 2001-2004
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// No (or too few) valid frames were accumulated before finalization
    pub const INSUFFICIENT_SAMPLES: i32 = 2001;

    /// An operation required an active calibration window
    pub const NOT_ACTIVE: i32 = 2002;

    /// Calibration window expired without enough frames
    pub const TIMEOUT: i32 = 2003;

    /// Calibration state lock was poisoned
    pub const STATE_POISONED: i32 = 2004;
}

/// Log a calibration error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=CalibrationManager, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// Only `InsufficientSamples` and `Timeout` are ever surfaced to the end
/// user; both leave any previously finalized baseline untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Finalization refused: not enough valid frames
    InsufficientSamples { required: u32, collected: u32 },

    /// No calibration window is open
    NotActive,

    /// Calibration window ran past its hard limit
    Timeout { reason: String },

    /// Calibration state lock was poisoned
    StatePoisoned,
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::InsufficientSamples { .. } => {
                CalibrationErrorCodes::INSUFFICIENT_SAMPLES
            }
            CalibrationError::NotActive => CalibrationErrorCodes::NOT_ACTIVE,
            CalibrationError::Timeout { .. } => CalibrationErrorCodes::TIMEOUT,
            CalibrationError::StatePoisoned => CalibrationErrorCodes::STATE_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::InsufficientSamples {
                required,
                collected,
            } => {
                format!(
                    "Insufficient frames: need {}, got {}",
                    required, collected
                )
            }
            CalibrationError::NotActive => "Calibration not active".to_string(),
            CalibrationError::Timeout { reason } => {
                format!("Calibration timed out: {}", reason)
            }
            CalibrationError::StatePoisoned => "Calibration state lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}
