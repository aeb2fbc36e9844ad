//! Speech sinks: where accepted messages are finally delivered.
//!
//! Sinks are blocking. They run only on the notifier worker thread, one
//! message at a time, which keeps delivery strictly FIFO.

use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::config::{NotifierConfig, SinkKind};
use crate::error::DeliveryError;
use crate::feedback::FeedbackMessage;

pub trait SpeechSink: Send + 'static {
    /// Deliver one message, blocking until it has been spoken.
    fn deliver(&mut self, message: &FeedbackMessage) -> Result<(), DeliveryError>;

    /// Release backend resources. Called once by the worker on shutdown.
    fn close(&mut self) {}

    fn name(&self) -> &'static str;
}

/// Writes messages to the log. Used when no audio backend is wanted.
#[derive(Debug, Default)]
pub struct LogSink;

impl SpeechSink for LogSink {
    fn deliver(&mut self, message: &FeedbackMessage) -> Result<(), DeliveryError> {
        log::info!(
            "[Speech] ({:?}/{}) {}",
            message.priority,
            message.message_type,
            message.text
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    delivered: Vec<FeedbackMessage>,
    closed: bool,
}

/// In-memory sink recording every delivered message, for replays and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
    delay: Option<Duration>,
    fail_types: Vec<String>,
}

/// Read side of a [`MemorySink`], usable after the sink moved to the worker.
#[derive(Debug, Clone)]
pub struct MemorySinkHandle {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate speech duration.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail delivery of these message types.
    pub fn failing_for(mut self, types: &[&str]) -> Self {
        self.fail_types = types.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn handle(&self) -> MemorySinkHandle {
        MemorySinkHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl SpeechSink for MemorySink {
    fn deliver(&mut self, message: &FeedbackMessage) -> Result<(), DeliveryError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail_types.iter().any(|t| *t == message.message_type) {
            return Err(DeliveryError::BackendFailed {
                backend: self.name().to_string(),
                reason: format!("injected failure for '{}'", message.message_type),
            });
        }
        self.lock().delivered.push(message.clone());
        Ok(())
    }

    fn close(&mut self) {
        self.lock().closed = true;
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

impl MemorySinkHandle {
    pub fn delivered(&self) -> Vec<FeedbackMessage> {
        self.lock().delivered.clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.lock()
            .delivered
            .iter()
            .map(|m| m.text.clone())
            .collect()
    }

    pub fn types(&self) -> Vec<String> {
        self.lock()
            .delivered
            .iter()
            .map(|m| m.message_type.clone())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Runs an external text-to-speech program per message.
#[derive(Debug, Clone)]
pub struct CommandSink {
    program: String,
    args: Vec<String>,
}

impl CommandSink {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Platform default speech command.
    pub fn platform_default() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "macos")] {
                Self::new("say", Vec::new())
            } else if #[cfg(target_os = "windows")] {
                Self::new(
                    "powershell",
                    vec![
                        "-NoProfile".to_string(),
                        "-Command".to_string(),
                        "Add-Type -AssemblyName System.Speech; (New-Object System.Speech.Synthesis.SpeechSynthesizer).Speak($args[0])".to_string(),
                    ],
                )
            } else {
                Self::new("espeak", Vec::new())
            }
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SpeechSink for CommandSink {
    fn deliver(&mut self, message: &FeedbackMessage) -> Result<(), DeliveryError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&message.text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|err| DeliveryError::BackendUnavailable {
                backend: self.program.clone(),
                reason: err.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(DeliveryError::BackendFailed {
                backend: self.program.clone(),
                reason: status.to_string(),
            })
        }
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

/// Tries `primary` and falls back once it reports the backend unavailable.
pub struct FallbackSink {
    primary: Box<dyn SpeechSink>,
    fallback: Box<dyn SpeechSink>,
    primary_down: bool,
}

impl FallbackSink {
    pub fn new(primary: Box<dyn SpeechSink>, fallback: Box<dyn SpeechSink>) -> Self {
        Self {
            primary,
            fallback,
            primary_down: false,
        }
    }
}

impl SpeechSink for FallbackSink {
    fn deliver(&mut self, message: &FeedbackMessage) -> Result<(), DeliveryError> {
        if !self.primary_down {
            match self.primary.deliver(message) {
                Err(DeliveryError::BackendUnavailable { backend, reason }) => {
                    log::warn!(
                        "[Speech] backend '{}' unavailable ({}), using '{}'",
                        backend,
                        reason,
                        self.fallback.name()
                    );
                    self.primary_down = true;
                }
                other => return other,
            }
        }
        self.fallback.deliver(message)
    }

    fn close(&mut self) {
        self.primary.close();
        self.fallback.close();
    }

    fn name(&self) -> &'static str {
        self.primary.name()
    }
}

/// Build the sink selected in the notifier config.
pub fn build_sink(config: &NotifierConfig) -> Box<dyn SpeechSink> {
    match config.sink {
        SinkKind::Log => Box::new(LogSink),
        SinkKind::Memory => Box::new(MemorySink::new()),
        SinkKind::Command => {
            let command = match &config.command {
                Some(program) => CommandSink::new(program.clone(), config.command_args.clone()),
                None => CommandSink::platform_default(),
            };
            Box::new(FallbackSink::new(Box::new(command), Box::new(LogSink)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_records_in_order() {
        let mut sink = MemorySink::new();
        let handle = sink.handle();
        sink.deliver(&FeedbackMessage::high("a", "x")).unwrap();
        sink.deliver(&FeedbackMessage::low("b", "y")).unwrap();
        assert_eq!(handle.texts(), vec!["a", "b"]);
        assert!(!handle.is_closed());
        sink.close();
        assert!(handle.is_closed());
    }

    #[test]
    fn test_memory_sink_injected_failure() {
        let mut sink = MemorySink::new().failing_for(&["hip_roll"]);
        let handle = sink.handle();
        assert!(sink.deliver(&FeedbackMessage::high("roll", "hip_roll")).is_err());
        assert!(sink.deliver(&FeedbackMessage::high("shift", "pelvis_shift")).is_ok());
        assert_eq!(handle.types(), vec!["pelvis_shift"]);
    }

    #[test]
    fn test_missing_command_is_unavailable() {
        let mut sink = CommandSink::new("definitely-not-a-speech-binary-4821", Vec::new());
        let err = sink.deliver(&FeedbackMessage::normal("hi", "t")).unwrap_err();
        assert!(matches!(err, DeliveryError::BackendUnavailable { .. }));
    }

    #[test]
    fn test_fallback_used_when_primary_unavailable() {
        let fallback = MemorySink::new();
        let handle = fallback.handle();
        let mut sink = FallbackSink::new(
            Box::new(CommandSink::new("definitely-not-a-speech-binary-4821", Vec::new())),
            Box::new(fallback),
        );
        sink.deliver(&FeedbackMessage::normal("one", "t")).unwrap();
        sink.deliver(&FeedbackMessage::normal("two", "t")).unwrap();
        assert_eq!(handle.texts(), vec!["one", "two"]);
    }

    #[test]
    fn test_build_sink_from_config() {
        let config = NotifierConfig::default();
        assert_eq!(build_sink(&config).name(), "log");
    }
}
