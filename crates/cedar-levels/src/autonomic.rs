//! Autonomic level (L1): vitals and heartbeat.
//!
//! Runs every cycle regardless of mode. Tracks four vital variables
//! with fixed-shape predictions, emits precision-weighted errors for
//! the reactive level, and raises advisory panic/restart/dormancy
//! signals. L1 never halts anything itself; the orchestrator decides
//! what to do with its vital-fault signals.

use cedar_types::{Level, PredictionError, TrackedPrediction};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Smoothing rate for vital predictions.
const LEARNING_RATE: f64 = 0.1;

/// Aggregate precision-weighted error beyond which panic is raised.
const PANIC_THRESHOLD: f64 = 0.9;

/// Energy level below which dormancy is advised.
const DORMANCY_THRESHOLD: f64 = 0.05;

/// One cycle's worth of vital observations.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct VitalObservations {
    /// Available energy, in [0, 1].
    pub energy: f64,
    /// Whether agents are responding to the heartbeat.
    pub agents_responsive: bool,
    /// Whether the integrity check passed.
    pub integrity_valid: bool,
    /// System load, in [0, 1].
    pub system_load: f64,
}

/// Scope of an advisory restart signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartScope {
    All,
}

/// Advisory vital-fault signals. Consumed by the orchestrator; L1
/// performs none of these itself.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct VitalActions {
    /// The orchestrator is the only component that may decide to halt.
    pub halt: bool,
    pub restart: Option<RestartScope>,
    /// Raised when aggregate weighted error exceeds the panic
    /// threshold or integrity is invalid.
    pub panic: bool,
    /// Raised when energy is nearly exhausted.
    pub enter_dormancy: bool,
}

/// Output of one autonomic step.
#[derive(Clone, Debug)]
pub struct AutonomicOutput {
    /// Errors above the suppression threshold, addressed to L2.
    pub errors: Vec<PredictionError>,
    pub actions: VitalActions,
}

/// Fixed-shape vital predictions. The tracked variable set is
/// statically known and never grows at runtime.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct VitalPredictions {
    energy: TrackedPrediction,
    responsiveness: TrackedPrediction,
    integrity: TrackedPrediction,
    load: TrackedPrediction,
}

impl Default for VitalPredictions {
    fn default() -> Self {
        Self {
            energy: TrackedPrediction::new(1.0, 1.0),
            responsiveness: TrackedPrediction::new(1.0, 1.0),
            integrity: TrackedPrediction::new(1.0, 1.0),
            load: TrackedPrediction::new(0.3, 1.0),
        }
    }
}

/// The autonomic level.
#[derive(Clone, Debug)]
pub struct AutonomicLevel {
    predictions: VitalPredictions,
    /// Errors with magnitude below this are explained away locally.
    suppression_threshold: f64,
    free_energy: f64,
}

impl AutonomicLevel {
    pub fn new(suppression_threshold: f64) -> Self {
        Self {
            predictions: VitalPredictions::default(),
            suppression_threshold,
            free_energy: 0.0,
        }
    }

    /// Precision-weighted free energy of the latest step.
    pub fn free_energy(&self) -> f64 {
        self.free_energy
    }

    /// Current predicted energy, for belief-state snapshots.
    pub fn predicted_energy(&self) -> f64 {
        self.predictions.energy.predicted()
    }

    /// Current predicted load, for belief-state snapshots.
    pub fn predicted_load(&self) -> f64 {
        self.predictions.load.predicted()
    }

    /// One autonomic cycle: compute errors against the old predictions,
    /// smooth toward the observations, emit advisory actions.
    pub fn step(&mut self, obs: &VitalObservations) -> AutonomicOutput {
        let responsive = if obs.agents_responsive { 1.0 } else { 0.0 };
        let integral = if obs.integrity_valid { 1.0 } else { 0.0 };

        let mut errors = Vec::new();
        let mut total = 0.0;

        let observations: [(&str, f64, &mut TrackedPrediction); 4] = [
            ("energy", obs.energy, &mut self.predictions.energy),
            ("responsiveness", responsive, &mut self.predictions.responsiveness),
            ("integrity", integral, &mut self.predictions.integrity),
            ("load", obs.system_load, &mut self.predictions.load),
        ];

        for (name, observed, prediction) in observations {
            let previous = prediction.predicted();
            let precision = prediction.precision();
            let magnitude = prediction.observe(observed, LEARNING_RATE);
            total += magnitude * precision;
            if magnitude >= self.suppression_threshold {
                errors.push(PredictionError::new(
                    Level::Autonomic,
                    Level::Reactive,
                    magnitude,
                    precision,
                    format!("{}: predicted {:.3}, observed {:.3}", name, previous, observed),
                ));
            }
        }

        self.free_energy = total;

        let actions = VitalActions {
            halt: false,
            restart: (!obs.agents_responsive).then_some(RestartScope::All),
            panic: total > PANIC_THRESHOLD || !obs.integrity_valid,
            enter_dormancy: obs.energy < DORMANCY_THRESHOLD,
        };
        if actions.panic {
            warn!(
                weighted_error = total,
                integrity = obs.integrity_valid,
                "Vital panic advisory raised"
            );
        }

        AutonomicOutput { errors, actions }
    }
}

impl Default for AutonomicLevel {
    fn default() -> Self {
        Self::new(0.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nominal() -> VitalObservations {
        VitalObservations {
            energy: 1.0,
            agents_responsive: true,
            integrity_valid: true,
            system_load: 0.3,
        }
    }

    #[test]
    fn nominal_observations_raise_no_actions() {
        let mut level = AutonomicLevel::default();
        let out = level.step(&nominal());
        assert!(!out.actions.panic);
        assert!(out.actions.restart.is_none());
        assert!(!out.actions.enter_dormancy);
    }

    #[test]
    fn small_errors_are_suppressed() {
        let mut level = AutonomicLevel::default();
        level.step(&nominal());
        // Second step with a tiny deviation: error below 0.1 stays local.
        let out = level.step(&VitalObservations {
            system_load: 0.32,
            ..nominal()
        });
        assert!(out.errors.iter().all(|e| e.magnitude >= 0.1));
    }

    #[test]
    fn integrity_failure_raises_panic() {
        let mut level = AutonomicLevel::default();
        let out = level.step(&VitalObservations {
            integrity_valid: false,
            ..nominal()
        });
        assert!(out.actions.panic);
    }

    #[test]
    fn unresponsive_agents_request_full_restart() {
        let mut level = AutonomicLevel::default();
        let out = level.step(&VitalObservations {
            agents_responsive: false,
            ..nominal()
        });
        assert_eq!(out.actions.restart, Some(RestartScope::All));
    }

    #[test]
    fn exhausted_energy_advises_dormancy() {
        let mut level = AutonomicLevel::default();
        let out = level.step(&VitalObservations {
            energy: 0.01,
            ..nominal()
        });
        assert!(out.actions.enter_dormancy);
    }

    #[test]
    fn constant_stream_drives_error_toward_zero() {
        let mut level = AutonomicLevel::default();
        let obs = VitalObservations {
            energy: 0.6,
            ..nominal()
        };
        let mut last_fe = f64::INFINITY;
        for _ in 0..80 {
            level.step(&obs);
            assert!(level.free_energy() <= last_fe + 1e-9);
            last_fe = level.free_energy();
        }
        assert!(last_fe < 0.05);
        assert!((level.predicted_energy() - 0.6).abs() < 0.02);
    }

    #[test]
    fn error_is_computed_against_old_prediction() {
        let mut level = AutonomicLevel::default();
        // First observation of energy 0.5 against initial prediction 1.0:
        // magnitude must be 0.5, not the post-smoothing difference.
        let out = level.step(&VitalObservations {
            energy: 0.5,
            ..nominal()
        });
        let energy_error = out
            .errors
            .iter()
            .find(|e| e.content.starts_with("energy"))
            .expect("energy error expected");
        assert!((energy_error.magnitude - 0.5).abs() < 1e-9);
    }
}
