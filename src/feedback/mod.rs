// Spoken feedback: message types, rate limiting and the delivery worker
//
// - RateGate: per-type minimum interval by priority
// - Notifier: producer handle plus the worker thread that owns the sink
// - SpeechSink: log, in-memory and external-command backends

pub mod message;
pub mod notifier;
pub mod rate_gate;
pub mod sink;

pub use message::{types, FeedbackMessage, Priority};
pub use notifier::{Notifier, NotifierStatsSnapshot};
pub use rate_gate::RateGate;
pub use sink::{
    build_sink, CommandSink, FallbackSink, LogSink, MemorySink, MemorySinkHandle, SpeechSink,
};
