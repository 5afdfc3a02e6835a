//! Prediction errors and tracked scalar predictions.
//!
//! Prediction errors are the only messages that flow upward between
//! levels. A tracked prediction is the generative-model primitive every
//! level builds on: an exponentially smoothed scalar whose precision
//! (inverse uncertainty) only grows with consistent evidence.

use crate::Level;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How close an observation must be to the prediction to count as
/// consistent evidence for a precision increase.
const CONSISTENCY_THRESHOLD: f64 = 0.1;

/// Per-observation precision gain for consistent evidence.
const PRECISION_GAIN: f64 = 0.01;

/// Upper bound on precision. Confidence grows with evidence, but not
/// without limit.
const PRECISION_CEILING: f64 = 10.0;

/// A precision-weighted prediction error crossing a level boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionError {
    /// Level that produced the error.
    pub source: Level,
    /// Level the error is addressed to.
    pub target: Level,
    /// Error magnitude, clamped to [0, 1].
    pub magnitude: f64,
    /// Precision of the violated prediction, >= 0.
    pub precision: f64,
    /// Human-readable diff of what was predicted vs. observed.
    pub content: String,
    /// When the error was produced.
    pub timestamp: DateTime<Utc>,
}

impl PredictionError {
    /// Create a prediction error. Magnitude is clamped to [0, 1] and
    /// precision to >= 0.
    pub fn new(
        source: Level,
        target: Level,
        magnitude: f64,
        precision: f64,
        content: impl Into<String>,
    ) -> Self {
        Self {
            source,
            target,
            magnitude: magnitude.clamp(0.0, 1.0),
            precision: precision.max(0.0),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Precision-weighted magnitude. This is the quantity compared
    /// against interrupt and panic thresholds.
    pub fn weighted(&self) -> f64 {
        self.magnitude * self.precision
    }

    /// Re-address this error one level up, preserving its content.
    pub fn escalated(&self, source: Level, target: Level) -> Self {
        Self {
            source,
            target,
            ..self.clone()
        }
    }
}

/// An exponentially smoothed scalar prediction with monotone precision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedPrediction {
    predicted: f64,
    precision: f64,
}

impl TrackedPrediction {
    pub fn new(initial: f64, precision: f64) -> Self {
        Self {
            predicted: initial,
            precision: precision.max(0.0),
        }
    }

    /// Current predicted value.
    pub fn predicted(&self) -> f64 {
        self.predicted
    }

    /// Current precision. Never decreases.
    pub fn precision(&self) -> f64 {
        self.precision
    }

    /// Observe a value: returns the absolute error against the *old*
    /// prediction, then moves the prediction toward the observation by
    /// `learning_rate`. Precision rises slowly when the observation was
    /// consistent with the prediction.
    pub fn observe(&mut self, observed: f64, learning_rate: f64) -> f64 {
        let error = (observed - self.predicted).abs();
        self.predicted += learning_rate * (observed - self.predicted);
        if error < CONSISTENCY_THRESHOLD {
            self.precision = (self.precision + PRECISION_GAIN).min(PRECISION_CEILING);
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitude_is_clamped() {
        let e = PredictionError::new(Level::Autonomic, Level::Reactive, 1.7, -0.5, "x");
        assert_eq!(e.magnitude, 1.0);
        assert_eq!(e.precision, 0.0);
    }

    #[test]
    fn weighted_combines_magnitude_and_precision() {
        let e = PredictionError::new(Level::Autonomic, Level::Reactive, 0.5, 4.0, "x");
        assert!((e.weighted() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn escalated_preserves_content() {
        let e = PredictionError::new(Level::Reactive, Level::Cognitive, 0.4, 1.0, "load spike");
        let up = e.escalated(Level::Cognitive, Level::Executive);
        assert_eq!(up.source, Level::Cognitive);
        assert_eq!(up.target, Level::Executive);
        assert_eq!(up.content, "load spike");
        assert_eq!(up.magnitude, e.magnitude);
    }

    #[test]
    fn observe_reports_error_against_old_prediction() {
        let mut p = TrackedPrediction::new(0.0, 1.0);
        let err = p.observe(1.0, 0.1);
        assert!((err - 1.0).abs() < 1e-12);
        assert!((p.predicted() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn constant_stream_converges_monotonically() {
        let mut p = TrackedPrediction::new(0.0, 1.0);
        let mut last_err = f64::INFINITY;
        for _ in 0..100 {
            let err = p.observe(0.8, 0.1);
            assert!(err <= last_err);
            last_err = err;
        }
        assert!(last_err < 0.01);
        assert!((p.predicted() - 0.8).abs() < 0.01);
    }

    #[test]
    fn precision_never_decreases() {
        let mut p = TrackedPrediction::new(0.5, 1.0);
        let mut last = p.precision();
        for observed in [0.5, 0.9, 0.1, 0.5, 0.52, 0.51] {
            p.observe(observed, 0.1);
            assert!(p.precision() >= last);
            last = p.precision();
        }
    }

    #[test]
    fn precision_grows_only_with_consistent_evidence() {
        let mut p = TrackedPrediction::new(0.5, 1.0);
        p.observe(0.95, 0.1); // inconsistent
        assert_eq!(p.precision(), 1.0);
        p.observe(p.predicted() + 0.01, 0.1); // consistent
        assert!(p.precision() > 1.0);
    }
}
