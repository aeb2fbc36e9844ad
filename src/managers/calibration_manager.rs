// CalibrationManager: calibration window lifecycle and baseline ownership
//
// Single Responsibility: turning calibration frames into a Baseline and
// swapping it in atomically. The previous baseline stays active until a new
// one finalizes; a failed window never touches it.

use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use tokio::sync::broadcast;

use crate::calibration::{
    Baseline, CalibrationAccumulator, CalibrationProgress, CalibrationStatus, FinalizeReason,
};
use crate::config::CalibrationConfig;
use crate::error::{log_calibration_error, CalibrationError};
use crate::pose::MetricSample;

/// Outcome of feeding the manager one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationStep {
    /// No calibration window is open
    Idle,
    Collecting(CalibrationProgress),
    Finalized {
        baseline: Baseline,
        progress: CalibrationProgress,
    },
}

struct CalibrationSession {
    accumulator: CalibrationAccumulator,
    progress_tx: Option<broadcast::Sender<CalibrationProgress>>,
}

/// Manages the calibration window and the active baseline
///
/// This manager handles:
/// - Opening (and restarting) a calibration window
/// - Accumulating valid frames and finalizing at target or partial timeout
/// - Caller-driven expiry and the hard abandon limit
/// - Publishing progress on the calibration broadcast channel
pub struct CalibrationManager {
    config: CalibrationConfig,
    session: Arc<Mutex<Option<CalibrationSession>>>,
    baseline: Arc<RwLock<Option<Baseline>>>,
}

impl CalibrationManager {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            session: Arc::new(Mutex::new(None)),
            baseline: Arc::new(RwLock::new(None)),
        }
    }

    /// Open a calibration window, discarding any window already open.
    ///
    /// # Returns
    /// `true` if an earlier window was restarted
    pub fn begin(
        &self,
        now: Instant,
        progress_tx: Option<broadcast::Sender<CalibrationProgress>>,
    ) -> Result<bool, CalibrationError> {
        let mut session = self.lock_session().inspect_err(|err| {
            log_calibration_error(err, "begin_calibration");
        })?;

        let restarted = session.is_some();
        let accumulator = CalibrationAccumulator::new(self.config.target_frames, now);
        if let Some(tx) = &progress_tx {
            let _ = tx.send(accumulator.progress());
        }
        *session = Some(CalibrationSession {
            accumulator,
            progress_tx,
        });

        log::info!(
            "[CalibrationManager] Calibration {} (target {} frames)",
            if restarted { "restarted" } else { "started" },
            self.config.target_frames
        );
        Ok(restarted)
    }

    pub fn is_active(&self) -> bool {
        self.lock_session()
            .map(|session| session.is_some())
            .unwrap_or(false)
    }

    /// Add one valid calibration frame and finalize if ready.
    ///
    /// # Errors
    /// - `Timeout` when the window hit the hard limit without enough frames
    /// - `StatePoisoned` on lock poisoning
    pub fn observe(
        &self,
        sample: &MetricSample,
        setup_ok: bool,
        frame_width: u32,
        frame_height: u32,
        now: Instant,
    ) -> Result<CalibrationStep, CalibrationError> {
        let mut session = self.lock_session()?;
        let Some(active) = session.as_mut() else {
            return Ok(CalibrationStep::Idle);
        };
        active
            .accumulator
            .add_frame(sample, setup_ok, frame_width, frame_height);
        self.advance(&mut session, now)
    }

    /// Check the clock without a new frame (frame unusable for calibration).
    pub fn tick(&self, now: Instant) -> Result<CalibrationStep, CalibrationError> {
        let mut session = self.lock_session()?;
        self.advance(&mut session, now)
    }

    /// Force finalization of the open window (caller-driven timeout).
    ///
    /// Idempotent: with no open window it returns `Ok(None)`.
    ///
    /// # Errors
    /// `InsufficientSamples` when the window collected nothing; the window is
    /// closed and the previous baseline stays active
    pub fn expire(&self, now: Instant) -> Result<Option<Baseline>, CalibrationError> {
        let mut session = self.lock_session()?;
        let Some(active) = session.as_mut() else {
            return Ok(None);
        };

        match active
            .accumulator
            .finalize(FinalizeReason::Forced, &self.config)
        {
            Ok(baseline) => {
                let progress = Self::finished_progress(&active.accumulator, &baseline);
                Self::publish(active, progress);
                *session = None;
                drop(session);
                self.install(baseline.clone())?;
                Ok(Some(baseline))
            }
            Err(err) => {
                log_calibration_error(&err, "expire_calibration");
                let failed = active
                    .accumulator
                    .progress()
                    .with_status(CalibrationStatus::Failed);
                Self::publish(active, failed);
                *session = None;
                Err(err)
            }
        }
    }

    /// Close the open window without producing a baseline.
    pub fn cancel(&self) -> bool {
        match self.lock_session() {
            Ok(mut session) => session.take().is_some(),
            Err(_) => false,
        }
    }

    pub fn baseline(&self) -> Result<Option<Baseline>, CalibrationError> {
        Ok(self.read_baseline()?.clone())
    }

    /// Install a previously saved baseline.
    pub fn load_baseline(&self, baseline: Baseline) -> Result<(), CalibrationError> {
        *self.write_baseline().inspect_err(|err| {
            log_calibration_error(err, "load_baseline");
        })? = Some(baseline);
        Ok(())
    }

    pub fn baseline_handle(&self) -> Arc<RwLock<Option<Baseline>>> {
        Arc::clone(&self.baseline)
    }

    pub fn progress(&self) -> Option<CalibrationProgress> {
        self.lock_session()
            .ok()?
            .as_ref()
            .map(|active| active.accumulator.progress())
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    // ========================================================================
    // HELPER METHODS
    // ========================================================================

    fn advance(
        &self,
        session: &mut MutexGuard<'_, Option<CalibrationSession>>,
        now: Instant,
    ) -> Result<CalibrationStep, CalibrationError> {
        let Some(active) = session.as_mut() else {
            return Ok(CalibrationStep::Idle);
        };

        if let Some(reason) = active.accumulator.ready(now, &self.config) {
            let baseline = active.accumulator.finalize(reason, &self.config)?;
            let progress = Self::finished_progress(&active.accumulator, &baseline);
            Self::publish(active, progress.clone());
            **session = None;
            self.install(baseline.clone())?;
            return Ok(CalibrationStep::Finalized { baseline, progress });
        }

        if active.accumulator.abandoned(now, &self.config) {
            let err = CalibrationError::Timeout {
                reason: format!(
                    "only {} of {} frames after {:.1}s",
                    active.accumulator.frames(),
                    self.config.min_partial_frames(),
                    active.accumulator.elapsed(now).as_secs_f64()
                ),
            };
            log_calibration_error(&err, "calibration_window");
            let failed = active
                .accumulator
                .progress()
                .with_status(CalibrationStatus::Failed);
            Self::publish(active, failed);
            **session = None;
            return Err(err);
        }

        let progress = active.accumulator.progress();
        Self::publish(active, progress.clone());
        Ok(CalibrationStep::Collecting(progress))
    }

    fn finished_progress(
        accumulator: &CalibrationAccumulator,
        baseline: &Baseline,
    ) -> CalibrationProgress {
        accumulator.progress().with_partial(baseline.partial)
    }

    fn install(&self, baseline: Baseline) -> Result<(), CalibrationError> {
        if baseline.partial {
            log::warn!(
                "[CalibrationManager] Partial baseline from {} frames",
                baseline.frames_averaged
            );
        } else {
            log::info!(
                "[CalibrationManager] Baseline finalized from {} frames (setup verified: {})",
                baseline.frames_averaged,
                baseline.setup_verified
            );
        }
        *self.write_baseline()? = Some(baseline);
        Ok(())
    }

    fn publish(active: &CalibrationSession, progress: CalibrationProgress) {
        if let Some(tx) = &active.progress_tx {
            let _ = tx.send(progress);
        }
    }

    fn lock_session(
        &self,
    ) -> Result<MutexGuard<'_, Option<CalibrationSession>>, CalibrationError> {
        self.session
            .lock()
            .map_err(|_| CalibrationError::StatePoisoned)
    }

    fn read_baseline(&self) -> Result<RwLockReadGuard<'_, Option<Baseline>>, CalibrationError> {
        self.baseline
            .read()
            .map_err(|_| CalibrationError::StatePoisoned)
    }

    fn write_baseline(&self) -> Result<RwLockWriteGuard<'_, Option<Baseline>>, CalibrationError> {
        self.baseline
            .write()
            .map_err(|_| CalibrationError::StatePoisoned)
    }
}
