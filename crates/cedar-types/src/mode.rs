//! Process-wide kernel mode.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The single process-wide mode controlling which levels run each
/// cycle and how error/urgency signals are weighted.
///
/// Transitions are triggered only by L2 (threat/energy heuristics) or
/// L4 (self-modification readiness gated by external stability), and
/// only the orchestrator actually mutates the mode. L3 never sets it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelMode {
    /// Normal operation, all levels active.
    Awake,
    /// Heightened attention on the current task.
    Focused,
    /// Threat response: errors weighted up, interrupts favored.
    Vigilant,
    /// Offline consolidation; cognition idle.
    Dreaming,
    /// Minimal operation, only the autonomic level runs.
    Dormant,
    /// Self-modification window. Entered only through the double-gated
    /// executive request plus an external stability confirmation.
    SelfImproving,
}

impl KernelMode {
    /// Whether the cognitive and executive levels run in this mode.
    pub fn permits_cognitive(&self) -> bool {
        matches!(
            self,
            KernelMode::Awake | KernelMode::Focused | KernelMode::Vigilant | KernelMode::SelfImproving
        )
    }

    /// Whether this mode counts as relaxed. A critical economic
    /// steady-state deviation forces `Vigilant` only out of a relaxed
    /// mode, never out of `Focused` or `SelfImproving`.
    pub fn is_relaxed(&self) -> bool {
        matches!(
            self,
            KernelMode::Awake | KernelMode::Dreaming | KernelMode::Dormant
        )
    }
}

impl fmt::Display for KernelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KernelMode::Awake => "awake",
            KernelMode::Focused => "focused",
            KernelMode::Vigilant => "vigilant",
            KernelMode::Dreaming => "dreaming",
            KernelMode::Dormant => "dormant",
            KernelMode::SelfImproving => "self_improving",
        };
        write!(f, "{}", name)
    }
}
