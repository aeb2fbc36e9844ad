//! Form violation detector.
//!
//! Each rule owns a signed persistence counter and a positive streak. The
//! counter climbs by one per failing frame and fires a high-priority warning
//! once it exceeds the persistence threshold, after which it is forced
//! negative so the same violation has to re-accumulate before it can fire
//! again. The on-screen warning is reported on every failing frame.
//!
//! Setup-only rules are never evaluated here; calibration checks them through
//! [`ViolationDetector::setup_misses`].

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::Rng;

use crate::analysis::rules::{FormRule, RuleInputs, RuleOutcome};
use crate::calibration::Baseline;
use crate::config::{SmoothingConfig, ViolationConfig};
use crate::feedback::{types, FeedbackMessage};
use crate::pose::{MetricSample, PoseView, SmoothedSignal};

/// Signed persistence counter plus positive streak for one rule.
#[derive(Debug, Clone, Default)]
pub struct ViolationCounter {
    value: i32,
    streak: i32,
    last_update: Option<Instant>,
}

impl ViolationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn streak(&self) -> i32 {
        self.streak
    }

    /// Drop evidence older than `stale_after` and stamp `now`.
    ///
    /// # Returns
    /// `true` when the counter was reset
    pub fn refresh(&mut self, now: Instant, stale_after: Duration) -> bool {
        let stale = self
            .last_update
            .is_some_and(|last| now.saturating_duration_since(last) > stale_after);
        if stale {
            self.value = 0;
            self.streak = 0;
        }
        self.last_update = Some(now);
        stale
    }

    /// Count a failing frame.
    ///
    /// # Returns
    /// `true` when the counter crossed the persistence threshold this frame
    pub fn record_failure(&mut self, config: &ViolationConfig) -> bool {
        self.streak = 0;
        self.value += 1;
        if self.value > config.persistence_frames {
            self.value = -config.cooldown_frames;
            true
        } else {
            false
        }
    }

    /// Count a passing frame: one step toward zero, streak grows.
    ///
    /// # Returns
    /// `true` when the passing streak crossed its threshold this frame
    pub fn record_success(&mut self, config: &ViolationConfig) -> bool {
        self.value -= self.value.signum();
        self.streak += 1;
        if self.streak > config.positive_streak_frames {
            self.streak = -config.cooldown_frames;
            true
        } else {
            false
        }
    }

    pub fn cool_down(&mut self, value: i32, streak: i32) {
        self.value = value;
        self.streak = streak;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone)]
struct RuleState {
    counter: ViolationCounter,
    angle: SmoothedSignal,
}

/// Per-rule result for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleReport {
    pub id: String,
    pub outcome: RuleOutcome,
    pub angle_label: Option<String>,
    pub angle: Option<f64>,
    pub counter: i32,
}

/// Everything the detector produced for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectorReport {
    pub rules: Vec<RuleReport>,
    /// Warning text of every rule failing this frame
    pub warnings: Vec<String>,
    /// Messages to offer the notifier, in submission order
    pub messages: Vec<FeedbackMessage>,
    /// Rules whose warning fired this frame
    pub fired: Vec<String>,
    pub great_form: bool,
}

impl DetectorReport {
    pub fn has_violation(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A setup rule that did not pass on a calibration frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SetupMiss {
    pub rule_id: String,
    pub warning: String,
    /// Inputs were unavailable rather than out of range
    pub skipped: bool,
}

pub struct ViolationDetector {
    rules: Vec<FormRule>,
    states: Vec<RuleState>,
    config: ViolationConfig,
    great_form_phrases: Vec<String>,
    clean_frames: u32,
    last_phrase: Option<usize>,
    rng: StdRng,
}

impl ViolationDetector {
    pub fn new(
        rules: Vec<FormRule>,
        great_form_phrases: Vec<String>,
        config: ViolationConfig,
        smoothing: &SmoothingConfig,
        rng: StdRng,
    ) -> Self {
        let states = rules
            .iter()
            .map(|_| RuleState {
                counter: ViolationCounter::new(),
                angle: SmoothedSignal::new(smoothing.angle_alpha, smoothing.min_confidence),
            })
            .collect();
        Self {
            rules,
            states,
            config,
            great_form_phrases,
            clean_frames: 0,
            last_phrase: None,
            rng,
        }
    }

    pub fn rules(&self) -> &[FormRule] {
        &self.rules
    }

    pub fn counter(&self, rule_id: &str) -> Option<&ViolationCounter> {
        self.rules
            .iter()
            .position(|rule| rule.id == rule_id)
            .map(|idx| &self.states[idx].counter)
    }

    /// Evaluate every rule against this frame's smoothed metrics.
    pub fn evaluate(
        &mut self,
        view: &PoseView<'_>,
        metrics: &MetricSample,
        baseline: Option<&Baseline>,
        now: Instant,
    ) -> DetectorReport {
        let inputs = RuleInputs {
            metrics,
            baseline,
            frame_width: view.width(),
        };
        let stale_after = self.config.stale_after();
        let mut report = DetectorReport::default();
        let mut praise = Vec::new();
        let mut evaluated = 0usize;
        let mut skipped = false;

        for (rule, state) in self.rules.iter().zip(self.states.iter_mut()) {
            if rule.setup_only {
                continue;
            }
            let angle = state.angle.update_available(rule.raw_measurement(view));
            let outcome = rule.evaluate(&inputs, angle);

            match &outcome {
                RuleOutcome::Skipped => skipped = true,
                RuleOutcome::Fail { .. } => {
                    evaluated += 1;
                    state.counter.refresh(now, stale_after);
                    report.warnings.push(rule.warning.clone());
                    if state.counter.record_failure(&self.config) {
                        log::debug!("[ViolationDetector] '{}' persisted, warning", rule.id);
                        report
                            .messages
                            .push(FeedbackMessage::high(rule.warning.clone(), rule.id.clone()));
                        report.fired.push(rule.id.clone());
                    }
                }
                RuleOutcome::Pass => {
                    evaluated += 1;
                    state.counter.refresh(now, stale_after);
                    if state.counter.record_success(&self.config) {
                        if let Some(text) = &rule.praise {
                            praise.push(FeedbackMessage::low(
                                text.clone(),
                                format!("{}_ok", rule.id),
                            ));
                        }
                    }
                }
            }

            report.rules.push(RuleReport {
                id: rule.id.clone(),
                outcome,
                angle_label: rule.angle_label.clone(),
                angle,
                counter: state.counter.value(),
            });
        }

        // great form needs every rule measured and passing
        if evaluated > 0 && !skipped && report.warnings.is_empty() {
            self.clean_frames += 1;
        } else {
            self.clean_frames = 0;
        }

        let settled = self.states.iter().all(|s| s.counter.value() <= 0);
        if self.config.great_form_frames > 0
            && self.clean_frames >= self.config.great_form_frames
            && settled
            && !self.great_form_phrases.is_empty()
        {
            let phrase = self.pick_phrase();
            report
                .messages
                .push(FeedbackMessage::low(phrase, types::GREAT_FORM));
            report.great_form = true;
            for state in &mut self.states {
                state
                    .counter
                    .cool_down(-self.config.great_form_cooldown, -self.config.cooldown_frames);
            }
            self.clean_frames = 0;
        } else {
            report.messages.extend(praise);
        }

        report
    }

    /// Stateless check of the setup rules on raw (unsmoothed) input.
    ///
    /// Returns every setup rule that did not pass, in rule order. A rule
    /// whose inputs are unavailable is a miss with `skipped` set.
    pub fn setup_misses(&self, view: &PoseView<'_>, metrics: &MetricSample) -> Vec<SetupMiss> {
        let inputs = RuleInputs {
            metrics,
            baseline: None,
            frame_width: view.width(),
        };
        self.rules
            .iter()
            .filter(|rule| rule.checks_setup() && !rule.needs_baseline())
            .filter_map(|rule| match rule.evaluate(&inputs, rule.raw_measurement(view)) {
                RuleOutcome::Pass => None,
                outcome => Some(SetupMiss {
                    rule_id: rule.id.clone(),
                    warning: rule.warning.clone(),
                    skipped: outcome == RuleOutcome::Skipped,
                }),
            })
            .collect()
    }

    /// Drop all counters and smoothing history.
    pub fn reset(&mut self) {
        for state in &mut self.states {
            state.counter.reset();
            state.angle.reset();
        }
        self.clean_frames = 0;
    }

    pub fn reset_smoothing(&mut self) {
        for state in &mut self.states {
            state.angle.reset();
        }
    }

    fn pick_phrase(&mut self) -> String {
        let n = self.great_form_phrases.len();
        let idx = match self.last_phrase {
            Some(last) if n > 1 => {
                let pick = self.rng.gen_range(0..n - 1);
                if pick >= last {
                    pick + 1
                } else {
                    pick
                }
            }
            _ => self.rng.gen_range(0..n),
        };
        self.last_phrase = Some(idx);
        self.great_form_phrases[idx].clone()
    }
}
