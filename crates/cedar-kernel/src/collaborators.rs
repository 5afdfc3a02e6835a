//! External collaborator contracts.
//!
//! The kernel consumes, and must not implement internally: an economic
//! ledger tracking revenue/cost per module, an information-geometry
//! stability monitor, a Hamiltonian budget integrator, and a
//! steady-state economic deviation monitor. Only the narrow numeric
//! interfaces below cross into the kernel.
//!
//! The [`testing`] module holds minimal in-memory stand-ins for use in
//! tests and examples, in the spirit of a no-op recovery executor: not
//! production implementations, just enough behavior to exercise the
//! kernel.

use serde::{Deserialize, Serialize};

// ── Economic ledger ─────────────────────────────────────────────────────

/// Return-on-investment numbers for one registered module.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModuleRoi {
    pub module: String,
    pub revenue: f64,
    pub cost: f64,
    /// Revenue over cost, ledger-defined for zero cost.
    pub roi: f64,
}

/// Ledger-wide totals.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GlobalSection {
    pub total_revenue: f64,
    pub total_costs: f64,
    pub net_flow: f64,
}

/// The economic ledger the kernel records costs against and pulls ROI
/// numbers from for budget reallocation.
pub trait EconomicLedger {
    fn register_module(&mut self, id: &str);
    fn record_revenue(&mut self, id: &str, amount: f64, label: &str);
    fn record_cost(&mut self, id: &str, amount: f64, label: &str);
    /// Per-module ROI in module registration order.
    fn rois(&self) -> Vec<ModuleRoi>;
    /// Push a new allocation vector, aligned with `rois()` order.
    fn set_allocations(&mut self, values: &[f64]);
    fn total_budget(&self) -> f64;
    fn global_section(&self) -> GlobalSection;
}

// ── Stability monitor ───────────────────────────────────────────────────

/// Contraction-based stability monitor. The kernel feeds it belief
/// deltas and perturbations every cycle; self-modification is only
/// permitted while the monitor reports contraction.
pub trait StabilityMonitor {
    fn observe(&mut self, prev_beliefs: &[f64], curr_beliefs: &[f64], perturbation: f64);
    fn is_stable(&self) -> bool;
    /// Contraction damping factor, in (0, 1].
    fn damping_factor(&self) -> f64;
}

// ── Budget integrator ───────────────────────────────────────────────────

/// One leapfrog/Hamiltonian step over the resource allocation. Pure:
/// given position, momentum, a gradient and a constraint projector, it
/// returns the next position and momentum.
pub trait BudgetIntegrator {
    fn step(
        &self,
        position: &[f64],
        momentum: &[f64],
        gradient: &dyn Fn(&[f64]) -> Vec<f64>,
        step_size: f64,
        project: &dyn Fn(&mut Vec<f64>),
    ) -> (Vec<f64>, Vec<f64>);
}

// ── Steady-state monitor ────────────────────────────────────────────────

/// One sample of the surrounding economy.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct EconomySample {
    pub revenue: f64,
    pub costs: f64,
    pub customers: f64,
    pub quality: f64,
    pub balance: f64,
}

/// Deviation from the economic steady state.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SteadyStateReading {
    /// Deviation in [0, 1].
    pub deviation: f64,
    /// Critical deviations force the kernel out of relaxed modes.
    pub critical: bool,
}

pub trait SteadyStateMonitor {
    fn observe(&mut self, sample: &EconomySample) -> SteadyStateReading;
}

// ── Test doubles ────────────────────────────────────────────────────────

/// Minimal collaborator stand-ins for tests and examples.
pub mod testing {
    use super::*;
    use std::collections::HashMap;

    /// In-memory ledger with a fixed total budget.
    pub struct StaticLedger {
        order: Vec<String>,
        revenue: HashMap<String, f64>,
        cost: HashMap<String, f64>,
        allocations: Vec<f64>,
        total_budget: f64,
    }

    impl StaticLedger {
        pub fn new(total_budget: f64) -> Self {
            Self {
                order: Vec::new(),
                revenue: HashMap::new(),
                cost: HashMap::new(),
                allocations: Vec::new(),
                total_budget,
            }
        }

        pub fn allocations(&self) -> &[f64] {
            &self.allocations
        }
    }

    impl EconomicLedger for StaticLedger {
        fn register_module(&mut self, id: &str) {
            if !self.order.iter().any(|m| m == id) {
                self.order.push(id.to_string());
            }
        }

        fn record_revenue(&mut self, id: &str, amount: f64, _label: &str) {
            *self.revenue.entry(id.to_string()).or_default() += amount;
        }

        fn record_cost(&mut self, id: &str, amount: f64, _label: &str) {
            *self.cost.entry(id.to_string()).or_default() += amount;
        }

        fn rois(&self) -> Vec<ModuleRoi> {
            self.order
                .iter()
                .map(|id| {
                    let revenue = self.revenue.get(id).copied().unwrap_or(0.0);
                    let cost = self.cost.get(id).copied().unwrap_or(0.0);
                    let roi = if cost > 0.0 { revenue / cost } else { revenue };
                    ModuleRoi {
                        module: id.clone(),
                        revenue,
                        cost,
                        roi,
                    }
                })
                .collect()
        }

        fn set_allocations(&mut self, values: &[f64]) {
            self.allocations = values.to_vec();
        }

        fn total_budget(&self) -> f64 {
            self.total_budget
        }

        fn global_section(&self) -> GlobalSection {
            let total_revenue: f64 = self.revenue.values().sum();
            let total_costs: f64 = self.cost.values().sum();
            GlobalSection {
                total_revenue,
                total_costs,
                net_flow: total_revenue - total_costs,
            }
        }
    }

    /// Stability monitor with a fixed verdict.
    pub struct FixedStabilityMonitor {
        pub stable: bool,
        pub damping: f64,
    }

    impl FixedStabilityMonitor {
        pub fn contracting() -> Self {
            Self {
                stable: true,
                damping: 0.8,
            }
        }

        pub fn diverging() -> Self {
            Self {
                stable: false,
                damping: 1.0,
            }
        }
    }

    impl StabilityMonitor for FixedStabilityMonitor {
        fn observe(&mut self, _prev: &[f64], _curr: &[f64], _perturbation: f64) {}

        fn is_stable(&self) -> bool {
            self.stable
        }

        fn damping_factor(&self) -> f64 {
            self.damping
        }
    }

    /// Textbook leapfrog: half-kick, drift, project, half-kick.
    pub struct LeapfrogIntegrator;

    impl BudgetIntegrator for LeapfrogIntegrator {
        fn step(
            &self,
            position: &[f64],
            momentum: &[f64],
            gradient: &dyn Fn(&[f64]) -> Vec<f64>,
            step_size: f64,
            project: &dyn Fn(&mut Vec<f64>),
        ) -> (Vec<f64>, Vec<f64>) {
            let g = gradient(position);
            let half: Vec<f64> = momentum
                .iter()
                .zip(&g)
                .map(|(m, g)| m + 0.5 * step_size * g)
                .collect();
            let mut next: Vec<f64> = position
                .iter()
                .zip(&half)
                .map(|(p, m)| p + step_size * m)
                .collect();
            project(&mut next);
            let g2 = gradient(&next);
            let next_momentum: Vec<f64> = half
                .iter()
                .zip(&g2)
                .map(|(m, g)| m + 0.5 * step_size * g)
                .collect();
            (next, next_momentum)
        }
    }

    /// Steady-state monitor with a fixed deviation.
    pub struct FixedSteadyState {
        pub deviation: f64,
        pub critical: bool,
    }

    impl FixedSteadyState {
        pub fn calm() -> Self {
            Self {
                deviation: 0.1,
                critical: false,
            }
        }

        pub fn critical() -> Self {
            Self {
                deviation: 0.95,
                critical: true,
            }
        }
    }

    impl SteadyStateMonitor for FixedSteadyState {
        fn observe(&mut self, _sample: &EconomySample) -> SteadyStateReading {
            SteadyStateReading {
                deviation: self.deviation,
                critical: self.critical,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn static_ledger_computes_rois_in_registration_order() {
        let mut ledger = StaticLedger::new(4.0);
        ledger.register_module("a");
        ledger.register_module("b");
        ledger.record_revenue("a", 10.0, "sale");
        ledger.record_cost("a", 5.0, "compute");
        ledger.record_cost("b", 2.0, "compute");

        let rois = ledger.rois();
        assert_eq!(rois.len(), 2);
        assert_eq!(rois[0].module, "a");
        assert!((rois[0].roi - 2.0).abs() < 1e-12);
        assert_eq!(rois[1].module, "b");
        assert_eq!(rois[1].roi, 0.0);

        let section = ledger.global_section();
        assert!((section.net_flow - 3.0).abs() < 1e-12);
    }

    #[test]
    fn leapfrog_conserves_under_zero_gradient() {
        let integrator = LeapfrogIntegrator;
        let (pos, mom) = integrator.step(
            &[1.0, 2.0],
            &[0.0, 0.0],
            &|_| vec![0.0, 0.0],
            0.1,
            &|_| {},
        );
        assert_eq!(pos, vec![1.0, 2.0]);
        assert_eq!(mom, vec![0.0, 0.0]);
    }

    #[test]
    fn leapfrog_moves_along_the_gradient() {
        let integrator = LeapfrogIntegrator;
        let (pos, _) = integrator.step(&[0.0], &[0.0], &|_| vec![1.0], 0.1, &|_| {});
        assert!(pos[0] > 0.0);
    }
}
