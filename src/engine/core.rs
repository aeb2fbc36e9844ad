//! TrainerEngine: per-session coaching orchestration.
//!
//! One engine runs one exercise for one user. The caller owns the frame
//! loop and calls [`TrainerEngine::process_frame`] once per pose frame; the
//! engine owns every piece of session state (baseline, rep counter,
//! violation counters, smoothing) plus the notifier worker, and fans each
//! frame's output out to broadcast subscribers.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::analysis::{
    GuidanceScheduler, RepCounter, RepDirection, RepEdge, RepUpdate, SetupMiss, ViolationDetector,
};
use crate::calibration::{Baseline, CalibrationProgress, CalibrationStatus};
use crate::config::AppConfig;
use crate::engine::{FrameOutput, FrameStatus, SystemTimeSource, TimeSource};
use crate::error::{log_engine_error, CalibrationError, EngineError, ErrorCode};
use crate::exercise::{self, ExerciseSpec};
use crate::feedback::{build_sink, types, FeedbackMessage, Notifier, Priority, SpeechSink};
use crate::managers::{BroadcastChannelManager, CalibrationManager, CalibrationStep};
use crate::pose::{MetricSample, MetricSignals, PoseFrame, PoseView, Side, SmoothedSignal};
use crate::telemetry::{EngineEvent, TelemetryCollector};

#[path = "core_subscriptions.rs"]
mod core_subscriptions;

/// Builder wiring config, clock, speech sink and RNG seed into an engine.
pub struct EngineBuilder {
    exercise: ExerciseSpec,
    config: AppConfig,
    time_source: Option<Arc<dyn TimeSource>>,
    sink: Option<Box<dyn SpeechSink>>,
    seed: Option<u64>,
}

impl EngineBuilder {
    pub fn new(exercise: ExerciseSpec) -> Self {
        Self {
            exercise,
            config: AppConfig::default(),
            time_source: None,
            sink: None,
            seed: None,
        }
    }

    /// Start from a built-in exercise.
    pub fn for_exercise(id: &str) -> Result<Self, EngineError> {
        Ok(Self::new(exercise::builtin(id)?))
    }

    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = Some(time_source);
        self
    }

    /// Speech sink; defaults to the one selected in the notifier config.
    pub fn sink(mut self, sink: Box<dyn SpeechSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Seed for great-form phrase selection.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate and start the engine (spawns the notifier worker).
    pub fn build(self) -> Result<TrainerEngine, EngineError> {
        self.config.validate()?;
        self.exercise.validate()?;

        let config = self.config;
        let exercise = self.exercise;
        let time_source = self
            .time_source
            .unwrap_or_else(|| Arc::new(SystemTimeSource::default()));
        let telemetry = Arc::new(TelemetryCollector::with_time_source(Arc::clone(
            &time_source,
        )));
        let sink = self.sink.unwrap_or_else(|| build_sink(&config.notifier));
        let notifier = Notifier::spawn(
            sink,
            &config.notifier,
            Arc::clone(&time_source),
            Some(Arc::clone(&telemetry)),
        )?;
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let smoothing = &config.smoothing;
        let engine = TrainerEngine {
            metrics: MetricSignals::new(smoothing.metric_alpha, smoothing.min_confidence),
            reps: RepCounter::new(&config.reps, smoothing.progress_alpha),
            detector: ViolationDetector::new(
                exercise.rules.clone(),
                exercise.great_form_phrases.clone(),
                config.violations.clone(),
                smoothing,
                rng,
            ),
            guidance: GuidanceScheduler::new(
                if config.guidance.enabled {
                    exercise.guidance.clone()
                } else {
                    Vec::new()
                },
                config.guidance.interval(),
            ),
            progress_angle: SmoothedSignal::new(smoothing.angle_alpha, smoothing.min_confidence),
            calibration: CalibrationManager::new(config.calibration.clone()),
            broadcasts: BroadcastChannelManager::new(),
            telemetry,
            notifier,
            start_instant: time_source.now(),
            time_source,
            config,
            exercise,
            last_side: None,
            tracking: false,
            corrections_given: HashSet::new(),
            faulted: None,
            frames_processed: 0,
        };

        log::info!(
            "[TrainerEngine] Ready for '{}' ({} rules)",
            engine.exercise.id,
            engine.exercise.rules.len()
        );
        Ok(engine)
    }
}

/// Per-session coaching engine.
pub struct TrainerEngine {
    config: AppConfig,
    exercise: ExerciseSpec,
    time_source: Arc<dyn TimeSource>,
    calibration: CalibrationManager,
    pub(crate) broadcasts: BroadcastChannelManager,
    telemetry: Arc<TelemetryCollector>,
    notifier: Notifier,
    metrics: MetricSignals,
    reps: RepCounter,
    detector: ViolationDetector,
    guidance: GuidanceScheduler,
    progress_angle: SmoothedSignal,
    last_side: Option<Side>,
    tracking: bool,
    /// Setup rules already corrected aloud in the open calibration window
    corrections_given: HashSet<String>,
    faulted: Option<String>,
    frames_processed: u64,
    start_instant: Instant,
}

impl TrainerEngine {
    pub fn builder(exercise: ExerciseSpec) -> EngineBuilder {
        EngineBuilder::new(exercise)
    }

    // ========================================================================
    // PER-FRAME PIPELINE
    // ========================================================================

    /// Process one pose frame.
    ///
    /// Missing or low-confidence landmarks are never an error.
    ///
    /// # Errors
    /// - `InvalidFrame` for zero frame dimensions
    /// - `InvariantViolated` when internal state breaks; the engine is then
    ///   faulted and every later call returns `Faulted`
    /// - `Calibration(StatePoisoned)` on lock poisoning
    pub fn process_frame(&mut self, frame: &PoseFrame) -> Result<FrameOutput, EngineError> {
        if let Some(reason) = &self.faulted {
            return Err(EngineError::Faulted {
                reason: reason.clone(),
            });
        }
        if frame.frame_width == 0 || frame.frame_height == 0 {
            let err = EngineError::InvalidFrame {
                width: frame.frame_width,
                height: frame.frame_height,
            };
            log_engine_error(&err, "process_frame");
            return Err(err);
        }

        self.frames_processed += 1;
        let now = self.time_source.now();
        let output = match self.step(frame, now) {
            Ok(output) => output,
            Err(err) => {
                if matches!(err, EngineError::InvariantViolated { .. }) {
                    self.fault(&err);
                }
                return Err(err);
            }
        };

        self.broadcasts.publish_frame(&output);
        Ok(output)
    }

    fn step(&mut self, frame: &PoseFrame, now: Instant) -> Result<FrameOutput, EngineError> {
        let reps = self.reps.reps();
        if frame.landmarks.is_none() {
            if self.calibration.is_active() {
                let step = self.calibration.tick(now);
                let mut spoken = Vec::new();
                self.calibration_step(step, now, &mut spoken)?;
            }
            return Ok(FrameOutput::no_pose(reps));
        }

        let view = PoseView::new(frame, self.config.smoothing.min_confidence);
        self.track_side(view.side());

        if self.calibration.is_active() {
            return self.calibration_frame(&view, now);
        }

        if let Some(gate) = &self.exercise.posture_gate {
            if !gate.check(&view) {
                let instruction = gate.instruction().to_string();
                let mut output =
                    FrameOutput::with_status(reps, FrameStatus::PostureCheck, instruction.clone());
                self.offer(
                    FeedbackMessage::normal(instruction, types::POSTURE),
                    &mut output.spoken,
                );
                return Ok(output);
            }
        }

        let raw = MetricSample::measure(&view, self.exercise.tracked_joint);
        let smoothed = self.metrics.update(&raw);
        let baseline = self.calibration.baseline()?;

        if self.exercise.progress.needs_baseline() && baseline.is_none() {
            return Ok(FrameOutput::with_status(
                reps,
                FrameStatus::AwaitingCalibration,
                self.exercise.cues.calibrate_prompt.clone(),
            ));
        }

        if !self.tracking {
            self.guidance.reset(now);
            self.tracking = true;
        }

        let reading = self
            .exercise
            .progress
            .read(&view, &smoothed, baseline.as_ref());
        let update = self.reps.observe(reading.progress)?;
        let shown_angle = self.progress_angle.update_available(reading.angle);
        let report = self
            .detector
            .evaluate(&view, &smoothed, baseline.as_ref(), now);

        for rule in &report.fired {
            self.telemetry
                .publish(EngineEvent::ViolationRaised { rule: rule.clone() });
        }
        if report.great_form {
            self.telemetry.publish(EngineEvent::GreatForm);
        }

        let mut output = FrameOutput::with_status(self.reps.reps(), FrameStatus::Tracking, "");
        output.progress = update.progress;
        output.warnings = report.warnings.clone();

        // warnings, then rep cues, then praise and guidance
        let (urgent, rest): (Vec<_>, Vec<_>) = report
            .messages
            .iter()
            .cloned()
            .partition(|m| m.priority == Priority::High);
        for message in urgent {
            self.offer(message, &mut output.spoken);
        }
        let rep_message = self.rep_messages(&update, &mut output.spoken);
        for message in rest {
            self.offer(message, &mut output.spoken);
        }
        if !report.has_violation() {
            if let Some(text) = self.guidance.due(now).map(str::to_string) {
                let accepted =
                    self.offer(FeedbackMessage::low(text, types::GUIDANCE), &mut output.spoken);
                self.guidance.mark_offered(now, accepted);
            }
        }

        output.feedback = match (report.warnings.first(), rep_message) {
            (Some(warning), _) => warning.clone(),
            (None, Some(rep)) => rep,
            (None, None) => self.state_hint().to_string(),
        };

        for rule in &report.rules {
            if let Some(label) = &rule.angle_label {
                output.angles.insert(label.clone(), rule.angle);
            }
        }
        if let Some(label) = self.exercise.progress.angle_label() {
            output.angles.insert(label.to_string(), shown_angle);
        }

        Ok(output)
    }

    fn rep_messages(
        &mut self,
        update: &RepUpdate,
        spoken: &mut Vec<FeedbackMessage>,
    ) -> Option<String> {
        let event = update.event?;
        if let Some(count) = event.completed {
            log::info!("[TrainerEngine] Rep {} complete", count);
            self.telemetry
                .publish(EngineEvent::RepCompleted { reps: count });
            let text = format!("Good! Rep {}", count);
            self.offer(
                FeedbackMessage::normal(text.clone(), types::REP_COMPLETE),
                spoken,
            );
            return Some(text);
        }
        if event.edge == RepEdge::ReachedTop {
            if let Some(cue) = self.exercise.cues.top.clone() {
                self.offer(FeedbackMessage::normal(cue, types::REP_UP), spoken);
            }
        }
        None
    }

    fn state_hint(&self) -> &str {
        match self.reps.direction() {
            RepDirection::Bottom => &self.exercise.cues.hint_bottom,
            RepDirection::Top => &self.exercise.cues.hint_top,
        }
    }

    fn track_side(&mut self, side: Side) {
        if self.last_side.is_some_and(|last| last != side) {
            log::info!("[TrainerEngine] Tracked side switched to {:?}", side);
            self.reset_smoothing();
            self.telemetry.publish(EngineEvent::SideSwitched { side });
        }
        self.last_side = Some(side);
    }

    fn reset_smoothing(&mut self) {
        self.metrics.reset();
        self.reps.reset_progress();
        self.detector.reset_smoothing();
        self.progress_angle.reset();
    }

    // ========================================================================
    // CALIBRATION
    // ========================================================================

    /// Open (or restart) a calibration window.
    ///
    /// Resets rep progress, violation counters and all smoothing; the rep
    /// count and the current baseline are kept until a new one finalizes.
    pub fn begin_calibration(&mut self) -> bool {
        let now = self.time_source.now();
        let progress_tx = self.broadcasts.init_calibration();
        match self.calibration.begin(now, Some(progress_tx)) {
            Ok(_) => {
                self.reset_smoothing();
                self.detector.reset();
                self.tracking = false;
                self.corrections_given.clear();
                self.telemetry.publish(EngineEvent::CalibrationStarted {
                    target_frames: self.config.calibration.target_frames,
                });
                let text = self.exercise.cues.calibration_start.clone();
                self.notifier
                    .submit(FeedbackMessage::normal(text, types::CALIBRATION));
                true
            }
            Err(err) => {
                log_engine_error(&EngineError::from(err), "begin_calibration");
                false
            }
        }
    }

    /// Finalize the open window now (caller-driven timeout).
    ///
    /// Idempotent: `Ok(None)` when no window is open.
    pub fn expire_calibration(&mut self) -> Result<Option<Baseline>, CalibrationError> {
        let now = self.time_source.now();
        match self.calibration.expire(now) {
            Ok(Some(baseline)) => {
                let mut spoken = Vec::new();
                self.on_calibrated(&baseline, now, &mut spoken);
                Ok(Some(baseline))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                let mut spoken = Vec::new();
                self.on_calibration_failed(&err, &mut spoken);
                Err(err)
            }
        }
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibration.is_active()
    }

    pub fn calibration_progress(&self) -> Option<CalibrationProgress> {
        self.calibration.progress()
    }

    pub fn baseline(&self) -> Result<Option<Baseline>, CalibrationError> {
        self.calibration.baseline()
    }

    /// Install a saved baseline (skips calibration).
    pub fn load_baseline(&mut self, baseline: Baseline) -> Result<(), CalibrationError> {
        self.calibration.load_baseline(baseline)?;
        self.detector.reset();
        Ok(())
    }

    fn calibration_frame(
        &mut self,
        view: &PoseView<'_>,
        now: Instant,
    ) -> Result<FrameOutput, EngineError> {
        let tracked_joint = self.exercise.tracked_joint;
        let raw = MetricSample::measure(view, tracked_joint);
        let mut spoken = Vec::new();

        let (step, hint) = if view.tracked(tracked_joint).is_some() {
            let misses = self.detector.setup_misses(view, &raw);
            self.correct_setup(&misses, &mut spoken);
            let hint = misses
                .iter()
                .find(|miss| !miss.skipped)
                .or(misses.first())
                .map(|miss| miss.warning.clone());
            let step = self.calibration.observe(
                &raw,
                misses.is_empty(),
                view.frame().frame_width,
                view.frame().frame_height,
                now,
            );
            (step, hint)
        } else {
            (
                self.calibration.tick(now),
                Some("Move fully into view".to_string()),
            )
        };

        let progress = self.calibration_step(step, now, &mut spoken)?;
        let progress = match hint {
            Some(hint) if progress.status == CalibrationStatus::Accumulating => {
                progress.with_hint(hint)
            }
            _ => progress,
        };

        let mut output = FrameOutput::with_status(
            self.reps.reps(),
            FrameStatus::Calibrating,
            progress.message(),
        );
        output
            .angles
            .insert("calibration".to_string(), Some(progress.percentage() as f64));
        output.progress = progress.fraction();
        output.spoken = spoken;
        Ok(output)
    }

    /// Speak each failing setup rule's correction once per window.
    fn correct_setup(&mut self, misses: &[SetupMiss], spoken: &mut Vec<FeedbackMessage>) {
        for miss in misses.iter().filter(|miss| !miss.skipped) {
            if self.corrections_given.contains(&miss.rule_id) {
                continue;
            }
            let message = FeedbackMessage::high(miss.warning.clone(), miss.rule_id.clone());
            if self.offer(message, spoken) {
                log::debug!("[TrainerEngine] Setup correction '{}' spoken", miss.rule_id);
                self.corrections_given.insert(miss.rule_id.clone());
            }
        }
    }

    /// Apply a manager step: announce finalization or failure.
    fn calibration_step(
        &mut self,
        step: Result<CalibrationStep, CalibrationError>,
        now: Instant,
        spoken: &mut Vec<FeedbackMessage>,
    ) -> Result<CalibrationProgress, EngineError> {
        match step {
            Ok(CalibrationStep::Collecting(progress)) => Ok(progress),
            Ok(CalibrationStep::Finalized { baseline, progress }) => {
                self.on_calibrated(&baseline, now, spoken);
                Ok(progress)
            }
            Ok(CalibrationStep::Idle) => Ok(CalibrationProgress::new(
                0,
                self.config.calibration.target_frames,
            )),
            Err(err @ CalibrationError::Timeout { .. }) => {
                self.on_calibration_failed(&err, spoken);
                Ok(
                    CalibrationProgress::new(0, self.config.calibration.target_frames)
                        .with_status(CalibrationStatus::Failed),
                )
            }
            Err(err) => Err(EngineError::from(err)),
        }
    }

    fn on_calibrated(
        &mut self,
        baseline: &Baseline,
        now: Instant,
        spoken: &mut Vec<FeedbackMessage>,
    ) {
        self.reset_smoothing();
        self.detector.reset();
        self.guidance.reset(now);
        self.tracking = true;
        self.telemetry.publish(EngineEvent::CalibrationFinished {
            frames: baseline.frames_averaged,
            partial: baseline.partial,
            setup_verified: baseline.setup_verified,
        });

        let cues = &self.exercise.cues;
        let text = if baseline.setup_verified || self.exercise.setup_rules().next().is_none() {
            cues.calibration_done.clone()
        } else {
            cues.calibration_unverified.clone()
        };
        self.offer(FeedbackMessage::normal(text, types::CALIBRATION), spoken);
    }

    fn on_calibration_failed(&mut self, err: &CalibrationError, spoken: &mut Vec<FeedbackMessage>) {
        self.telemetry.publish(EngineEvent::CalibrationFailed {
            code: err.code(),
            reason: err.message(),
        });
        let text = self.exercise.cues.calibration_failed.clone();
        self.offer(FeedbackMessage::normal(text, types::CALIBRATION), spoken);
    }

    // ========================================================================
    // SESSION CONTROL
    // ========================================================================

    /// Explicit user reset: count to zero, direction to bottom.
    pub fn reset_reps(&mut self) {
        log::info!("[TrainerEngine] Reps reset (was {})", self.reps.reps());
        self.reps.reset();
    }

    /// Stop the notifier worker after it drains. Idempotent.
    pub fn shutdown(&self) {
        self.notifier.shutdown();
    }

    /// Offer a message directly to the notifier.
    pub fn speak(&self, text: &str, priority: Priority, message_type: &str) -> bool {
        self.notifier.speak(text, priority, message_type)
    }

    pub fn reps(&self) -> u32 {
        self.reps.reps()
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted.is_some()
    }

    pub fn exercise(&self) -> &ExerciseSpec {
        &self.exercise
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn notifier_stats(&self) -> crate::feedback::NotifierStatsSnapshot {
        self.notifier.stats()
    }

    fn offer(&self, message: FeedbackMessage, spoken: &mut Vec<FeedbackMessage>) -> bool {
        let accepted = self.notifier.submit(message.clone());
        if accepted {
            spoken.push(message);
        }
        accepted
    }

    fn fault(&mut self, err: &EngineError) {
        log_engine_error(err, "process_frame");
        let reason = err.message();
        self.telemetry.publish(EngineEvent::EngineFaulted {
            reason: reason.clone(),
        });
        self.faulted = Some(reason);
    }
}
