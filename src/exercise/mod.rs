// Exercise definitions
//
// An ExerciseSpec is data: progress source, form rules, posture gate and
// coaching text. The catalog holds the built-in ones; custom definitions
// load from JSON with the same shape.

pub mod catalog;
pub mod spec;

pub use catalog::{builtin, builtin_ids, DEFAULT_EXERCISE};
pub use spec::{ExerciseCues, ExerciseSpec, PostureGate, ProgressReading, ProgressSource};
