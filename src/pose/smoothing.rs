//! Confidence-gated exponential smoothing.

use super::geometry::Point2;

/// One EMA step: `new` for the first sample, else `α·new + (1-α)·prev`.
pub fn smooth(prev: Option<f64>, new: f64, alpha: f64) -> f64 {
    match prev {
        None => new,
        Some(prev) => alpha * new + (1.0 - alpha) * prev,
    }
}

/// Scalar signal that only advances on available, confident samples.
///
/// An unavailable sample holds the last good value rather than dragging the
/// signal toward noise.
#[derive(Debug, Clone)]
pub struct SmoothedSignal {
    value: Option<f64>,
    alpha: f64,
    min_confidence: f64,
}

impl SmoothedSignal {
    pub fn new(alpha: f64, min_confidence: f64) -> Self {
        Self {
            value: None,
            alpha,
            min_confidence,
        }
    }

    /// Feed a sample with its confidence score.
    pub fn update(&mut self, sample: f64, confidence: f64) -> Option<f64> {
        if confidence >= self.min_confidence {
            self.advance(sample);
        }
        self.value
    }

    /// Feed a sample that was already gated upstream (`None` = unavailable).
    pub fn update_available(&mut self, sample: Option<f64>) -> Option<f64> {
        if let Some(sample) = sample {
            self.advance(sample);
        }
        self.value
    }

    fn advance(&mut self, sample: f64) {
        if sample.is_finite() {
            self.value = Some(smooth(self.value, sample, self.alpha));
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

/// 2D counterpart of [`SmoothedSignal`]: one gate, per-axis blend.
#[derive(Debug, Clone)]
pub struct SmoothedPoint {
    x: SmoothedSignal,
    y: SmoothedSignal,
}

impl SmoothedPoint {
    pub fn new(alpha: f64, min_confidence: f64) -> Self {
        Self {
            x: SmoothedSignal::new(alpha, min_confidence),
            y: SmoothedSignal::new(alpha, min_confidence),
        }
    }

    pub fn update(&mut self, sample: Point2, confidence: f64) -> Option<Point2> {
        if sample.is_finite() {
            self.x.update(sample.x, confidence);
            self.y.update(sample.y, confidence);
        }
        self.value()
    }

    pub fn update_available(&mut self, sample: Option<Point2>) -> Option<Point2> {
        if let Some(point) = sample.filter(|p| p.is_finite()) {
            self.x.update_available(Some(point.x));
            self.y.update_available(Some(point.y));
        }
        self.value()
    }

    pub fn value(&self) -> Option<Point2> {
        Some(Point2::new(self.x.value()?, self.y.value()?))
    }

    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_passes_through() {
        for alpha in [0.01, 0.35, 0.99] {
            assert_eq!(smooth(None, 12.5, alpha), 12.5);
        }
    }

    #[test]
    fn test_constant_signal_is_fixed_point() {
        for alpha in [0.1, 0.4, 0.9] {
            assert!((smooth(Some(3.25), 3.25, alpha) - 3.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_blend() {
        assert!((smooth(Some(0.0), 10.0, 0.4) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_low_confidence_holds_value() {
        let mut signal = SmoothedSignal::new(0.5, 0.5);
        assert_eq!(signal.update(10.0, 0.9), Some(10.0));
        assert_eq!(signal.update(100.0, 0.2), Some(10.0));
        assert_eq!(signal.update(20.0, 0.5), Some(15.0));
    }

    #[test]
    fn test_low_confidence_never_initializes() {
        let mut signal = SmoothedSignal::new(0.5, 0.5);
        assert_eq!(signal.update(10.0, 0.1), None);
        assert_eq!(signal.update_available(None), None);
    }

    #[test]
    fn test_non_finite_sample_ignored() {
        let mut signal = SmoothedSignal::new(0.5, 0.0);
        signal.update_available(Some(4.0));
        assert_eq!(signal.update_available(Some(f64::NAN)), Some(4.0));
        assert_eq!(signal.update_available(Some(f64::INFINITY)), Some(4.0));
    }

    #[test]
    fn test_reset_clears_history() {
        let mut signal = SmoothedSignal::new(0.5, 0.0);
        signal.update_available(Some(4.0));
        signal.reset();
        assert_eq!(signal.update_available(Some(8.0)), Some(8.0));
    }

    #[test]
    fn test_point_smoothing() {
        let mut point = SmoothedPoint::new(0.5, 0.5);
        assert_eq!(point.update(Point2::new(0.0, 0.0), 1.0), Some(Point2::new(0.0, 0.0)));
        assert_eq!(
            point.update(Point2::new(10.0, 20.0), 1.0),
            Some(Point2::new(5.0, 10.0))
        );
        assert_eq!(
            point.update(Point2::new(100.0, 100.0), 0.0),
            Some(Point2::new(5.0, 10.0))
        );
    }
}
