//! Cedar Supervision Tree
//!
//! Erlang/OTP-style crash recovery for the control hierarchy. A tree
//! of supervisors, each with a restart strategy, a restart budget, and
//! an ordered list of children. Crashes are counted per node inside a
//! sliding window; exhausting the budget escalates one level up the
//! tree, and escalation at the root is terminal for the caller to
//! surface, never silently absorbed.
//!
//! The tree decides, it never acts: `handle_crash` returns an action
//! for the orchestrator to apply.

#![deny(unsafe_code)]

mod error;
mod tree;

pub use error::*;
pub use tree::*;
