//! Built-in primitive modules: the minimal library of gates, registers and
//! clock sources the simulator and demo designs are built from.

mod arith;
mod gate;
mod seq;
mod stim;

pub use arith::AddConst;
pub use gate::{Gate, GateOp};
pub use seq::{Dff, Tick};
pub use stim::Stimulus;
