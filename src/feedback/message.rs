//! Coaching message value types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Priority class. Governs only the minimum re-fire interval of a
/// message type, never queue position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    /// Default minimum interval between accepted messages of one type.
    pub fn default_interval(self) -> Duration {
        match self {
            Priority::High => Duration::from_millis(800),
            Priority::Normal => Duration::from_millis(1800),
            Priority::Low => Duration::from_millis(3500),
        }
    }
}

/// Well-known message types emitted by the engine itself.
pub mod types {
    pub const REP_COMPLETE: &str = "rep_complete";
    pub const REP_UP: &str = "rep_up";
    pub const GREAT_FORM: &str = "great_form";
    pub const GUIDANCE: &str = "guidance";
    pub const CALIBRATION: &str = "calibration";
    pub const POSTURE: &str = "posture";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackMessage {
    pub text: String,
    pub priority: Priority,
    pub message_type: String,
}

impl FeedbackMessage {
    pub fn new(text: impl Into<String>, priority: Priority, message_type: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            priority,
            message_type: message_type.into(),
        }
    }

    pub fn high(text: impl Into<String>, message_type: impl Into<String>) -> Self {
        Self::new(text, Priority::High, message_type)
    }

    pub fn normal(text: impl Into<String>, message_type: impl Into<String>) -> Self {
        Self::new(text, Priority::Normal, message_type)
    }

    pub fn low(text: impl Into<String>, message_type: impl Into<String>) -> Self {
        Self::new(text, Priority::Low, message_type)
    }
}
