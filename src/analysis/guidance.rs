//! Periodic technique cues, offered while the user moves without violations.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct GuidanceScheduler {
    phrases: Vec<String>,
    cursor: usize,
    interval: Duration,
    last_offered: Option<Instant>,
}

impl GuidanceScheduler {
    pub fn new(phrases: Vec<String>, interval: Duration) -> Self {
        Self {
            phrases,
            cursor: 0,
            interval,
            last_offered: None,
        }
    }

    /// Restart the interval from `now` (e.g. when tracking begins).
    pub fn reset(&mut self, now: Instant) {
        self.last_offered = Some(now);
    }

    /// Next cue if the interval has elapsed.
    pub fn due(&self, now: Instant) -> Option<&str> {
        if self.phrases.is_empty() {
            return None;
        }
        let elapsed = match self.last_offered {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        };
        elapsed.then(|| self.phrases[self.cursor % self.phrases.len()].as_str())
    }

    /// Record an offer. The cursor only advances when the notifier took it,
    /// so a rejected cue is retried next interval.
    pub fn mark_offered(&mut self, now: Instant, accepted: bool) {
        self.last_offered = Some(now);
        if accepted && !self.phrases.is_empty() {
            self.cursor = (self.cursor + 1) % self.phrases.len();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> GuidanceScheduler {
        GuidanceScheduler::new(
            vec!["Breathe out on the way up".to_string(), "Slow down".to_string()],
            Duration::from_secs(15),
        )
    }

    #[test]
    fn test_due_after_interval() {
        let start = Instant::now();
        let mut g = scheduler();
        g.reset(start);
        assert!(g.due(start + Duration::from_secs(5)).is_none());
        assert_eq!(
            g.due(start + Duration::from_secs(15)),
            Some("Breathe out on the way up")
        );
    }

    #[test]
    fn test_rotates_only_on_acceptance() {
        let start = Instant::now();
        let mut g = scheduler();
        g.reset(start);
        let t1 = start + Duration::from_secs(16);
        g.mark_offered(t1, false);
        let t2 = t1 + Duration::from_secs(16);
        assert_eq!(g.due(t2), Some("Breathe out on the way up"));
        g.mark_offered(t2, true);
        let t3 = t2 + Duration::from_secs(16);
        assert_eq!(g.due(t3), Some("Slow down"));
    }

    #[test]
    fn test_empty_phrases_never_due() {
        let g = GuidanceScheduler::new(Vec::new(), Duration::from_secs(1));
        assert!(g.due(Instant::now()).is_none());
    }
}
