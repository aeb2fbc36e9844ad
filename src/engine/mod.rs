//! Engine module housing the per-frame coaching core.
//!
//! `core` holds `TrainerEngine` and its builder; `clock` the `TimeSource`
//! abstraction every time-based rule goes through; `output` the per-frame
//! result returned to the caller.

pub mod clock;
pub mod core;
pub mod output;

pub use clock::{ManualTimeSource, SystemTimeSource, TimeSource};
pub use core::{EngineBuilder, TrainerEngine};
pub use output::{FrameOutput, FrameStatus, NO_POSE_FEEDBACK};
