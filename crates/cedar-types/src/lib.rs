//! Cedar Domain Types
//!
//! Shared vocabulary for the cedar control kernel. The kernel is a
//! four-level supervisory loop in which every level minimizes its own
//! precision-weighted prediction error ("free energy"):
//!
//! - **Level**: the four hierarchy levels, from autonomic vitals to
//!   executive goal management, each with a fixed weight in the total
//!   system free energy.
//! - **KernelMode**: the single process-wide mode controlling which
//!   levels run each cycle.
//! - **PredictionError**: the only message that flows upward between
//!   levels. Raw internal state never crosses a level boundary.
//! - **TrackedPrediction**: an exponentially smoothed scalar prediction
//!   with a precision that only grows with consistent evidence.
//! - **Task**: an opaque unit of work scored by expected free energy
//!   instead of a fixed priority. Tasks transition, they are never
//!   deleted.
//!
//! # Design Principles
//!
//! 1. Every decision point is a closed enum with exhaustive matching.
//! 2. Each level's tracked variable set is statically known, so
//!    predictions are fixed-shape structs, not string-keyed maps.
//! 3. Only prediction errors cross level boundaries.

#![deny(unsafe_code)]

mod level;
mod mode;
mod prediction;
mod task;

pub use level::*;
pub use mode::*;
pub use prediction::*;
pub use task::*;
