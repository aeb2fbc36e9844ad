// Feedback delivery error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Delivery error code constants
///
/// Error code range: 3001-3003
pub struct DeliveryErrorCodes {}

impl DeliveryErrorCodes {
    /// Speech backend could not be reached (missing binary, device busy)
    pub const BACKEND_UNAVAILABLE: i32 = 3001;

    /// Speech backend accepted the message but reported a failure
    pub const BACKEND_FAILED: i32 = 3002;

    /// Notifier worker could not be started or is gone
    pub const WORKER_UNAVAILABLE: i32 = 3003;
}

/// Log a delivery error with structured context
pub fn log_delivery_error(err: &DeliveryError, context: &str) {
    error!(
        "Delivery error in {}: code={}, component=Notifier, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while delivering coaching messages.
///
/// A failed delivery drops that single message; the worker keeps running.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryError {
    BackendUnavailable { backend: String, reason: String },
    BackendFailed { backend: String, reason: String },
    WorkerUnavailable { reason: String },
}

impl ErrorCode for DeliveryError {
    fn code(&self) -> i32 {
        match self {
            DeliveryError::BackendUnavailable { .. } => DeliveryErrorCodes::BACKEND_UNAVAILABLE,
            DeliveryError::BackendFailed { .. } => DeliveryErrorCodes::BACKEND_FAILED,
            DeliveryError::WorkerUnavailable { .. } => DeliveryErrorCodes::WORKER_UNAVAILABLE,
        }
    }

    fn message(&self) -> String {
        match self {
            DeliveryError::BackendUnavailable { backend, reason } => {
                format!("Speech backend '{}' unavailable: {}", backend, reason)
            }
            DeliveryError::BackendFailed { backend, reason } => {
                format!("Speech backend '{}' failed: {}", backend, reason)
            }
            DeliveryError::WorkerUnavailable { reason } => {
                format!("Notifier worker unavailable: {}", reason)
            }
        }
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DeliveryError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for DeliveryError {}
