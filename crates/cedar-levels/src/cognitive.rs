//! Cognitive level (L3): strategy selection and downward forecasting.
//!
//! L3 picks a reasoning strategy as a step function of its own free
//! energy and of task-context richness, and generates the downward
//! forecast that L2 schedules against. This is the top-down half of
//! predictive coding: L2 never invents its own forecast of L3's
//! behavior, it receives one.

use crate::{ExecutivePredictions, LoadForecast};
use cedar_types::{Level, PredictionError, Task, TrackedPrediction};
use serde::{Deserialize, Serialize};

/// Context entries beyond which a task counts as rich enough to
/// justify a more elaborate strategy.
const RICH_CONTEXT_KEYS: usize = 4;

/// Confidence lost per unit of average incoming error magnitude.
const CONFIDENCE_DECAY: f64 = 0.1;

/// Confidence regained per error-free step.
const CONFIDENCE_RECOVERY: f64 = 0.02;

/// Reasoning strategy, from cheapest to most elaborate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Sequential,
    Parallel,
    Reflective,
    /// Full ensemble of strategies run together.
    Ensemble,
}

impl Strategy {
    /// The next more elaborate strategy, saturating at `Ensemble`.
    fn escalate(self) -> Strategy {
        match self {
            Strategy::Sequential => Strategy::Parallel,
            Strategy::Parallel => Strategy::Reflective,
            Strategy::Reflective | Strategy::Ensemble => Strategy::Ensemble,
        }
    }
}

/// Output of one cognitive step.
#[derive(Clone, Debug)]
pub struct CognitiveOutput {
    /// Errors above the 0.3 explain-away threshold, addressed to L4.
    pub errors: Vec<PredictionError>,
    pub strategy: Strategy,
    /// Downward forecast for L2's next cycle.
    pub predictions_for_l2: LoadForecast,
}

/// The cognitive level.
#[derive(Clone, Debug)]
pub struct CognitiveLevel {
    /// Confidence in the current strategy, in [0.1, 1].
    confidence: f64,
    /// Smoothed estimate of queue pressure, the basis of the downward
    /// load forecast.
    load_estimate: TrackedPrediction,
    /// Errors with magnitude below this are explained away locally.
    /// Stricter than L1/L2: higher levels are less sensitive to noise.
    suppression_threshold: f64,
    free_energy: f64,
    strategy: Strategy,
}

impl CognitiveLevel {
    pub fn new(suppression_threshold: f64) -> Self {
        Self {
            confidence: 1.0,
            load_estimate: TrackedPrediction::new(0.5, 1.0),
            suppression_threshold,
            free_energy: 0.0,
            strategy: Strategy::Sequential,
        }
    }

    pub fn free_energy(&self) -> f64 {
        self.free_energy
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// One cognitive cycle.
    pub fn step(
        &mut self,
        l2_errors: &[PredictionError],
        l4_predictions: &ExecutivePredictions,
        current_task: Option<&Task>,
    ) -> CognitiveOutput {
        // ── Free energy and confidence ───────────────────────────────
        self.free_energy = l2_errors.iter().map(PredictionError::weighted).sum();

        if l2_errors.is_empty() {
            self.confidence = (self.confidence + CONFIDENCE_RECOVERY).min(1.0);
        } else {
            let avg_magnitude =
                l2_errors.iter().map(|e| e.magnitude).sum::<f64>() / l2_errors.len() as f64;
            self.confidence = (self.confidence - CONFIDENCE_DECAY * avg_magnitude).max(0.1);
        }

        // ── Strategy selection ───────────────────────────────────────
        let base = if self.free_energy < 0.3 {
            Strategy::Sequential
        } else if self.free_energy < 0.8 {
            Strategy::Parallel
        } else if self.free_energy < 1.5 {
            Strategy::Reflective
        } else {
            Strategy::Ensemble
        };
        let rich_context = current_task
            .map(|t| t.context.len() > RICH_CONTEXT_KEYS)
            .unwrap_or(false);
        self.strategy = if rich_context { base.escalate() } else { base };

        // ── Downward forecast ────────────────────────────────────────
        // Task-load mismatches reported by L2 move the load estimate;
        // latency scales with strategy cost and shrinks as confidence
        // recovers.
        if let Some(load_error) = l2_errors.iter().find(|e| e.content.starts_with("task_load")) {
            let direction = if load_error.content.starts_with("task_load_surge") {
                1.0
            } else {
                -1.0
            };
            let observed =
                (self.load_estimate.predicted() + direction * load_error.magnitude).clamp(0.0, 1.0);
            self.load_estimate.observe(observed, 0.2);
        } else {
            let relaxed = self.load_estimate.predicted() * 0.95;
            self.load_estimate.observe(relaxed, 0.2);
        }
        let latency_base = match self.strategy {
            Strategy::Sequential => 1.0,
            Strategy::Parallel => 0.5,
            Strategy::Reflective => 2.0,
            Strategy::Ensemble => 3.0,
        };
        let predictions_for_l2 = LoadForecast {
            expected_task_load: self.load_estimate.predicted(),
            expected_latency: latency_base * (2.0 - self.confidence),
        };

        // ── Upward propagation ───────────────────────────────────────
        let errors = l2_errors
            .iter()
            .filter(|e| e.magnitude > self.suppression_threshold)
            .map(|e| e.escalated(Level::Cognitive, Level::Executive))
            .collect();

        // l4 predictions temper the forecast when the executive sees
        // low stability: an unstable system gets a pessimistic load.
        let predictions_for_l2 = if l4_predictions.system_stability < 0.3 {
            LoadForecast {
                expected_task_load: predictions_for_l2.expected_task_load.max(0.8),
                expected_latency: predictions_for_l2.expected_latency * 1.5,
            }
        } else {
            predictions_for_l2
        };

        CognitiveOutput {
            errors,
            strategy: self.strategy,
            predictions_for_l2,
        }
    }
}

impl Default for CognitiveLevel {
    fn default() -> Self {
        Self::new(0.3)
    }
}
