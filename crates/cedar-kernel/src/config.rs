//! Kernel configuration.
//!
//! The reference constants live here rather than being scattered as
//! literals: the per-level explain-away thresholds in particular have
//! no stated derivation, so they are kept configurable.

use serde::{Deserialize, Serialize};

/// Per-level magnitude thresholds below which a level explains an
/// error away locally instead of propagating it upward.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ExplainAwayThresholds {
    pub autonomic: f64,
    pub reactive: f64,
    pub cognitive: f64,
    pub executive: f64,
}

impl Default for ExplainAwayThresholds {
    fn default() -> Self {
        Self {
            autonomic: 0.1,
            reactive: 0.2,
            cognitive: 0.3,
            executive: 0.5,
        }
    }
}

/// Small fixed cost each level charges the ledger per cycle.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LevelOverheads {
    pub autonomic: f64,
    pub reactive: f64,
    pub cognitive: f64,
    pub executive: f64,
}

impl Default for LevelOverheads {
    fn default() -> Self {
        Self {
            autonomic: 0.001,
            reactive: 0.002,
            cognitive: 0.005,
            executive: 0.01,
        }
    }
}

/// Kernel configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KernelConfig {
    pub thresholds: ExplainAwayThresholds,

    /// A single error whose magnitude x precision exceeds this fires
    /// an L2 interrupt.
    pub interrupt_threshold: f64,

    /// Executive free energy above which self-modification may be
    /// requested. Combined by strict AND with the phi gate and the
    /// external stability check; tunable policy, not a law.
    pub self_mod_fe_threshold: f64,

    /// Phi gate for self-modification requests.
    pub self_mod_phi_threshold: f64,

    /// Budget reallocation runs every this many cycles.
    pub budget_reallocation_interval: u64,

    /// Leapfrog step size for the reallocation gradient step.
    pub integrator_step_size: f64,

    /// The steady-state monitor is sampled every this many cycles.
    pub steady_state_sample_interval: u64,

    /// Ring-buffer capacity of the free-energy history.
    pub history_capacity: usize,

    pub level_overheads: LevelOverheads,

    /// Capacity of the kernel event broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            thresholds: ExplainAwayThresholds::default(),
            interrupt_threshold: 3.0,
            self_mod_fe_threshold: 1.5,
            self_mod_phi_threshold: 0.6,
            budget_reallocation_interval: 100,
            integrator_step_size: 0.01,
            steady_state_sample_interval: 50,
            history_capacity: 1000,
            level_overheads: LevelOverheads::default(),
            event_channel_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_constants() {
        let config = KernelConfig::default();
        assert_eq!(config.thresholds.autonomic, 0.1);
        assert_eq!(config.thresholds.reactive, 0.2);
        assert_eq!(config.thresholds.cognitive, 0.3);
        assert_eq!(config.thresholds.executive, 0.5);
        assert_eq!(config.interrupt_threshold, 3.0);
        assert_eq!(config.self_mod_fe_threshold, 1.5);
        assert_eq!(config.self_mod_phi_threshold, 0.6);
        assert_eq!(config.history_capacity, 1000);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = KernelConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: KernelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.budget_reallocation_interval, 100);
    }
}
