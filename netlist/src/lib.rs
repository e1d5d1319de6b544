//! This library provides the in-memory form of a Weft design.
//!
//! A [`Design`] is a tree of module [`Instance`]s whose interfaces are made
//! of [`Junction`]s, identified by contiguous ranges of indices. Elaboration
//! runs every instance body exactly once, resolves every junction to a
//! concrete type by fixed-point propagation, collapses the junction graph
//! into same-value [`XNet`] equivalence classes with deterministic per-scope
//! names, and levels the instance graph into ranks an event-driven simulator
//! can schedule without ever revisiting a combinational block within one
//! delta.

mod design;
mod elab;
mod error;
mod handle;
mod junction;
mod logic;
mod module;
mod process;
mod rank;
mod render;
mod ty;
mod xnet;

pub use design::Design;
pub use error::ElabError;
pub use handle::{InstanceId, JunctionId, ProcessId, XNetId};
pub use junction::{Junction, JunctionKind};
pub use logic::{Const, Trit};
pub use module::{ArgValue, Args, Instance, ModuleCtx, ModuleImpl};
pub use process::{Assert, Process, SimScope, Suspension};
pub use render::Renderer;
pub use ty::Ty;
pub use xnet::{is_reserved, NetName, XNet};
