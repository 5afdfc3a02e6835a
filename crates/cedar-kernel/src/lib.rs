//! Cedar Kernel Orchestrator
//!
//! The kernel drives one synchronous `cycle()` per tick over the four
//! hierarchy levels:
//!
//! 1. Bottom-up error propagation: L1 → L2 → L3 → L4. Each level
//!    explains away small errors locally and passes the rest up.
//! 2. Top-down prediction distribution: L4 → L3 → L2. Lower levels
//!    schedule against forecasts they receive, not ones they invent.
//! 3. Total system free energy as a fixed weighted sum, recorded in a
//!    bounded history.
//! 4. Every N cycles, a gradient step reallocates the shared budget
//!    across levels from the ledger's per-module ROI numbers.
//!
//! A cycle is atomic and fully synchronous; the kernel holds no locks
//! because it has no internal parallelism. The only concurrency is the
//! host calling `cycle()` at its own cadence.
//!
//! Economic bookkeeping, stability monitoring, leapfrog integration
//! and steady-state detection are external collaborators consumed
//! through the narrow traits in [`collaborators`]; the kernel never
//! implements them.

#![deny(unsafe_code)]

pub mod budget;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod tasks;

pub use budget::*;
pub use collaborators::{
    BudgetIntegrator, EconomicLedger, EconomySample, GlobalSection, ModuleRoi, StabilityMonitor,
    SteadyStateMonitor, SteadyStateReading,
};
pub use config::*;
pub use error::*;
pub use events::*;
pub use orchestrator::*;
pub use tasks::*;
