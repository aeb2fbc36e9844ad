// Movement analysis: repetition counting, form rules and coaching cadence
//
// Everything here runs synchronously inside the per-frame call. Components
// own their counters and smoothing state; none of them talks to the
// notifier directly, they return messages for the engine to submit.

pub mod guidance;
pub mod rep_counter;
pub mod rules;
pub mod violations;

pub use guidance::GuidanceScheduler;
pub use rep_counter::{RepBoundary, RepCounter, RepDirection, RepEdge, RepEvent, RepUpdate};
pub use rules::{FormRule, RuleCheck, RuleInputs, RuleOutcome};
pub use violations::{DetectorReport, RuleReport, SetupMiss, ViolationCounter, ViolationDetector};
