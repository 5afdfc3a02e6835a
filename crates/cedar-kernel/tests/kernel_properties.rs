//! Property tests: any random sequence of observations and task
//! submissions keeps the kernel's core accounting laws intact.
//!
//! The laws under test: total free energy is always the fixed weighted
//! sum of the four level energies, schedules are totally ordered by
//! expected free energy, budget allocations stay on the fixed-sum
//! simplex, and self-modification never happens while the external
//! stability monitor reports divergence.

use cedar_kernel::collaborators::testing::{
    FixedStabilityMonitor, FixedSteadyState, LeapfrogIntegrator, StaticLedger,
};
use cedar_kernel::{CycleInputs, Kernel, KernelConfig};
use cedar_levels::VitalObservations;
use cedar_types::{KernelMode, Level, TaskOptions};
use proptest::prelude::*;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_kernel(stability: FixedStabilityMonitor) -> Kernel {
    let mut kernel = Kernel::new(
        KernelConfig::default(),
        Box::new(StaticLedger::new(4.0)),
        Box::new(stability),
        Box::new(LeapfrogIntegrator),
        Box::new(FixedSteadyState::calm()),
    );
    kernel.start().expect("fresh kernel starts");
    kernel
}

/// Generate one observation frame.
fn arb_vitals() -> impl Strategy<Value = VitalObservations> {
    (0.0f64..=1.0, any::<bool>(), any::<bool>(), 0.0f64..=1.0).prop_map(
        |(energy, agents_responsive, integrity_valid, system_load)| VitalObservations {
            energy,
            agents_responsive,
            integrity_valid,
            system_load,
        },
    )
}

/// Generate task options with value terms spanning their full ranges.
fn arb_task_options() -> impl Strategy<Value = TaskOptions> {
    (0.0f64..=1.0, 0.0f64..=1.0, 0.0f64..=1.0, any::<bool>()).prop_map(
        |(info_gain, pragmatic_value, risk, preemptible)| TaskOptions {
            info_gain,
            pragmatic_value,
            risk,
            level: Level::Reactive,
            preemptible,
            deadline: None,
        },
    )
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Total free energy is exactly 1.0*L1 + 0.8*L2 + 0.6*L3 + 0.4*L4
    /// after every cycle, whatever the observation sequence.
    #[test]
    fn total_fe_is_always_the_weighted_sum(
        frames in prop::collection::vec(arb_vitals(), 1..40),
        phi in 0.0f64..=1.0,
    ) {
        let mut kernel = make_kernel(FixedStabilityMonitor::contracting());
        for vitals in frames {
            let state = kernel
                .cycle(&CycleInputs { vitals, phi, economy: None })
                .unwrap();
            let expected = 1.0 * state.level_fe.autonomic
                + 0.8 * state.level_fe.reactive
                + 0.6 * state.level_fe.cognitive
                + 0.4 * state.level_fe.executive;
            prop_assert!((state.total_free_energy - expected).abs() < 1e-12);
            prop_assert!(state.total_free_energy.is_finite());
        }
    }

    /// Schedules are ascending in EFE and the scheduled task is the
    /// head of the schedule.
    #[test]
    fn schedule_is_totally_ordered_by_efe(
        batches in prop::collection::vec(arb_task_options(), 1..15),
    ) {
        let mut kernel = make_kernel(FixedStabilityMonitor::contracting());
        for options in batches {
            kernel.submit_task("work", HashMap::new(), options);
        }
        let state = kernel
            .cycle(&CycleInputs {
                vitals: VitalObservations {
                    energy: 0.9,
                    agents_responsive: true,
                    integrity_valid: true,
                    system_load: 0.3,
                },
                phi: 0.1,
                economy: None,
            })
            .unwrap();

        let schedule = kernel.get_schedule();
        prop_assert!(!schedule.is_empty());
        for pair in schedule.windows(2) {
            prop_assert!(pair[0].efe <= pair[1].efe);
        }
        prop_assert_eq!(state.scheduled_task, Some(schedule[0].id));
    }

    /// Budget allocations stay non-negative and keep summing to the
    /// ledger's total budget across reallocation rounds.
    #[test]
    fn allocations_stay_on_the_budget_simplex(
        frames in prop::collection::vec(arb_vitals(), 1..4),
    ) {
        let mut kernel = make_kernel(FixedStabilityMonitor::contracting());
        let rounds = 3;
        let interval = KernelConfig::default().budget_reallocation_interval;
        for round in 0..rounds {
            for _ in 0..interval {
                let vitals = frames[round as usize % frames.len()];
                kernel
                    .cycle(&CycleInputs { vitals, phi: 0.1, economy: None })
                    .unwrap();
            }
            let status = kernel.get_status();
            let sum: f64 = status.allocations.iter().sum();
            prop_assert!((sum - 4.0).abs() < 1e-9);
            for share in &status.allocations {
                prop_assert!(*share >= 0.0);
            }
        }
    }

    /// Self-modification is never granted while the stability monitor
    /// reports divergence, no matter how high free energy and phi get.
    #[test]
    fn no_self_modification_under_divergence(
        frames in prop::collection::vec(arb_vitals(), 1..40),
        phi in 0.0f64..=1.0,
    ) {
        let mut kernel = make_kernel(FixedStabilityMonitor::diverging());
        for vitals in frames {
            let state = kernel
                .cycle(&CycleInputs { vitals, phi, economy: None })
                .unwrap();
            prop_assert!(!state.self_mod_granted);
            prop_assert_ne!(state.mode, KernelMode::SelfImproving);
        }
    }

    /// The free-energy history never exceeds its configured capacity.
    #[test]
    fn fe_history_is_bounded(
        frames in prop::collection::vec(arb_vitals(), 1..60),
    ) {
        let mut kernel = make_kernel(FixedStabilityMonitor::contracting());
        let capacity = KernelConfig::default().history_capacity;
        for vitals in frames {
            kernel
                .cycle(&CycleInputs { vitals, phi: 0.2, economy: None })
                .unwrap();
            prop_assert!(kernel.fe_history().count() <= capacity);
        }
    }
}
