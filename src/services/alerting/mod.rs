//! Decides whether a cycle alerts at all.

mod cooldown;
mod gate;

pub use cooldown::{CooldownGuard, CooldownStatus};
pub use gate::{GateDecision, evaluate, select_candidate};
