//! The contract between primitive behaviors and the event simulator.
//!
//! A behavior is an explicit state machine: the simulator calls `resume`,
//! the behavior reads committed net values and drives new ones through the
//! scope, then suspends by returning where it wants to wake up next.

use crate::{Const, JunctionId};

/// Where a behavior suspends after a reactive step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suspension {
    /// Reactivate after this many time units. A zero delay means the next
    /// delta of the current instant.
    Delay(u64),
    /// Reactivate once, the next time any of these junctions' nets change
    /// value. The subscription is consumed by the wakeup; a behavior that
    /// wants further notifications re-subscribes on its next suspension.
    WaitOn(Vec<JunctionId>),
    /// Never reactivate again.
    Done,
}

/// A failed correctness check inside a behavior. Always a hard stop of the
/// simulation run.
#[derive(Debug, Clone)]
pub struct Assert {
    pub message: String,
}

impl Assert {
    pub fn new(message: impl Into<String>) -> Assert {
        Assert { message: message.into() }
    }
}

/// The simulator-side capabilities a behavior may use while resumed.
///
/// Reads always observe the last committed value, never one scheduled
/// within the current delta. Writes go through `drive` and are committed
/// by the simulator between ranks.
pub trait SimScope {
    fn now(&self) -> u64;

    fn delta(&self) -> u32;

    fn value(&self, junction: JunctionId) -> &Const;

    fn drive(&mut self, junction: JunctionId, value: Const);
}

/// One reactive hardware behavior.
pub trait Process {
    fn resume(&mut self, scope: &mut dyn SimScope) -> Result<Suspension, Assert>;
}
