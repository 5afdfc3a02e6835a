//! Kernel event broadcasting.
//!
//! Hosts subscribe to per-cycle state, mode changes, and
//! high-magnitude prediction errors. Emission is fire-and-forget: a
//! lagging or absent subscriber never blocks the cycle.

use crate::orchestrator::CycleState;
use cedar_types::{KernelMode, PredictionError};

/// Events emitted by the kernel.
#[derive(Clone, Debug)]
pub enum KernelEvent {
    /// A cycle finished; the full state snapshot.
    CycleCompleted(Box<CycleState>),

    /// The kernel mode changed.
    ModeChanged {
        from: KernelMode,
        to: KernelMode,
        reason: String,
    },

    /// A prediction error crossed the interrupt threshold.
    HighMagnitudeError(PredictionError),
}
