// Error types for the form coach engine
//
// This module defines custom error types for the per-frame engine, the
// calibration subsystem and the feedback delivery path, each carrying a
// numeric code so transport layers can report failures without parsing text.

mod calibration;
mod delivery;
mod engine;

pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use delivery::{log_delivery_error, DeliveryError, DeliveryErrorCodes};
pub use engine::{log_engine_error, EngineError, EngineErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the transport boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
