//! Cedar Level Objects
//!
//! The four Markov-blanket levels of the control hierarchy. Each level
//! owns a fixed-shape set of tracked predictions (its internal state),
//! receives observations or errors (its sensory boundary), and returns
//! a fresh output object of errors and advisory actions (its active
//! boundary). No level reads another level's internal state; the
//! orchestrator in `cedar-kernel` owns all cross-level sequencing.
//!
//! Levels never block and never perform their own actions: everything
//! they emit is advisory, to be acted on (or not) by the orchestrator.

#![deny(unsafe_code)]

mod autonomic;
mod cognitive;
mod executive;
mod reactive;

pub use autonomic::*;
pub use cognitive::*;
pub use executive::*;
pub use reactive::*;
