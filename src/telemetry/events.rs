//! Session telemetry event types exposed to CLI/HTTP surfaces.

use serde::{Deserialize, Serialize};

use crate::feedback::Priority;
use crate::pose::Side;

/// Coaching session events, tagged for JSON consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EngineEvent {
    CalibrationStarted {
        target_frames: u32,
    },
    CalibrationFinished {
        frames: u32,
        partial: bool,
        setup_verified: bool,
    },
    CalibrationFailed {
        code: i32,
        reason: String,
    },
    RepCompleted {
        reps: u32,
    },
    ViolationRaised {
        rule: String,
    },
    GreatForm,
    SideSwitched {
        side: Side,
    },
    MessageRejected {
        message_type: String,
        priority: Priority,
    },
    DeliveryFailed {
        code: i32,
        message_type: String,
        reason: String,
    },
    EngineFaulted {
        reason: String,
    },
}

/// Event stamped with milliseconds since the engine started.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryRecord {
    pub timestamp_ms: u64,
    pub event: EngineEvent,
}
