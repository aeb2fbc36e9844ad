//! Per-type minimum-interval gate.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::NotifierConfig;
use crate::feedback::Priority;

/// Accepts a message only if strictly more than its priority's interval has
/// passed since the last accepted message of the same type.
#[derive(Debug, Clone)]
pub struct RateGate {
    high: Duration,
    normal: Duration,
    low: Duration,
    last_accepted: HashMap<String, Instant>,
}

impl RateGate {
    pub fn new(config: &NotifierConfig) -> Self {
        Self {
            high: secs(config.high_interval_secs, Priority::High),
            normal: secs(config.normal_interval_secs, Priority::Normal),
            low: secs(config.low_interval_secs, Priority::Low),
            last_accepted: HashMap::new(),
        }
    }

    pub fn interval(&self, priority: Priority) -> Duration {
        match priority {
            Priority::High => self.high,
            Priority::Normal => self.normal,
            Priority::Low => self.low,
        }
    }

    /// Whether a message of this type may pass at `now`. Does not stamp.
    pub fn allows(&self, message_type: &str, priority: Priority, now: Instant) -> bool {
        match self.last_accepted.get(message_type) {
            Some(last) => now.saturating_duration_since(*last) > self.interval(priority),
            None => true,
        }
    }

    /// Record an accepted message; its type is gated from `now`.
    pub fn stamp(&mut self, message_type: &str, now: Instant) {
        self.last_accepted.insert(message_type.to_string(), now);
    }

    pub fn try_accept(&mut self, message_type: &str, priority: Priority, now: Instant) -> bool {
        let allowed = self.allows(message_type, priority, now);
        if allowed {
            self.stamp(message_type, now);
        }
        allowed
    }

    pub fn clear(&mut self) {
        self.last_accepted.clear();
    }
}

fn secs(value: f64, fallback: Priority) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_else(|_| fallback.default_interval())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> RateGate {
        RateGate::new(&NotifierConfig::default())
    }

    #[test]
    fn test_first_message_of_type_accepted() {
        let mut g = gate();
        assert!(g.try_accept("pelvis_shift", Priority::High, Instant::now()));
    }

    #[test]
    fn test_same_type_within_interval_rejected() {
        let mut g = gate();
        let t0 = Instant::now();
        assert!(g.try_accept("pelvis_shift", Priority::High, t0));
        assert!(!g.try_accept("pelvis_shift", Priority::High, t0 + Duration::from_millis(500)));
        assert!(g.try_accept("pelvis_shift", Priority::High, t0 + Duration::from_millis(900)));
    }

    #[test]
    fn test_exact_interval_is_not_enough() {
        let mut g = gate();
        let t0 = Instant::now();
        g.try_accept("rep_complete", Priority::Normal, t0);
        assert!(!g.try_accept("rep_complete", Priority::Normal, t0 + Duration::from_millis(1800)));
    }

    #[test]
    fn test_types_are_independent() {
        let mut g = gate();
        let t0 = Instant::now();
        assert!(g.try_accept("pelvis_shift", Priority::High, t0));
        assert!(g.try_accept("hip_roll", Priority::High, t0));
    }

    #[test]
    fn test_rejection_does_not_restart_interval() {
        let mut g = gate();
        let t0 = Instant::now();
        g.try_accept("great_form", Priority::Low, t0);
        assert!(!g.try_accept("great_form", Priority::Low, t0 + Duration::from_secs(3)));
        assert!(g.try_accept("great_form", Priority::Low, t0 + Duration::from_millis(3600)));
    }

    #[test]
    fn test_allows_does_not_stamp() {
        let mut g = gate();
        let t0 = Instant::now();
        assert!(g.allows("hip_roll", Priority::High, t0));
        assert!(g.allows("hip_roll", Priority::High, t0));
        g.stamp("hip_roll", t0);
        assert!(!g.allows("hip_roll", Priority::High, t0 + Duration::from_millis(800)));
        assert!(g.allows("hip_roll", Priority::High, t0 + Duration::from_millis(801)));
    }
}
