use std::collections::BTreeMap;

use indexmap::{IndexMap, IndexSet};
use weft_netlist::{Const, ProcessId, XNetId};

/// Pending work at one instant: value changes keyed by net, and process
/// reactivations bucketed by rank. Created on demand when something is
/// scheduled for a time that has no event yet, consumed whole when its
/// time arrives.
#[derive(Debug, Default)]
pub(crate) struct Event {
    pub(crate) changes: IndexMap<XNetId, Const>,
    pub(crate) wake: BTreeMap<u32, IndexSet<ProcessId>>,
}
