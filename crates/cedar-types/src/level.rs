//! The four hierarchy levels and their fixed free-energy weights.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A level in the control hierarchy.
///
/// Levels are ordered by timescale: autonomic runs every cycle at the
/// fastest cadence, executive only in permissive modes at the slowest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// L1: vitals and heartbeat. Always active, cannot be disabled.
    Autonomic,
    /// L2: scheduling, urgency and interrupt handling.
    Reactive,
    /// L3: strategy selection. Active only in permissive modes.
    Cognitive,
    /// L4: self-model, goals, policy revision. Active only in
    /// permissive modes.
    Executive,
}

impl Level {
    /// All levels, lowest first.
    pub const ALL: [Level; 4] = [
        Level::Autonomic,
        Level::Reactive,
        Level::Cognitive,
        Level::Executive,
    ];

    /// Fixed weight of this level's free energy in the system total.
    pub fn fe_weight(&self) -> f64 {
        match self {
            Level::Autonomic => 1.0,
            Level::Reactive => 0.8,
            Level::Cognitive => 0.6,
            Level::Executive => 0.4,
        }
    }

    /// The level directly above, if any.
    pub fn above(&self) -> Option<Level> {
        match self {
            Level::Autonomic => Some(Level::Reactive),
            Level::Reactive => Some(Level::Cognitive),
            Level::Cognitive => Some(Level::Executive),
            Level::Executive => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Autonomic => "autonomic",
            Level::Reactive => "reactive",
            Level::Cognitive => "cognitive",
            Level::Executive => "executive",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_bottom_up() {
        assert!(Level::Autonomic < Level::Reactive);
        assert!(Level::Reactive < Level::Cognitive);
        assert!(Level::Cognitive < Level::Executive);
    }

    #[test]
    fn fe_weights_are_fixed() {
        assert_eq!(Level::Autonomic.fe_weight(), 1.0);
        assert_eq!(Level::Reactive.fe_weight(), 0.8);
        assert_eq!(Level::Cognitive.fe_weight(), 0.6);
        assert_eq!(Level::Executive.fe_weight(), 0.4);
    }

    #[test]
    fn above_walks_the_hierarchy() {
        assert_eq!(Level::Autonomic.above(), Some(Level::Reactive));
        assert_eq!(Level::Executive.above(), None);
    }
}
