//! Junctions: the addressable, optionally-typed connection points of a
//! design.

use indexmap::IndexSet;

use crate::{InstanceId, JunctionId, Ty, XNetId};

/// The kind of a junction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum JunctionKind {
    /// An interface input; bound from the instantiating scope.
    Input,
    /// An interface output; bound from inside the defining instance.
    Output,
    /// An internal wire, local to its owning instance.
    Wire,
}

impl JunctionKind {
    pub fn is_port(self) -> bool {
        matches!(self, JunctionKind::Input | JunctionKind::Output)
    }
}

/// An addressable connection point: an input, output, or internal wire.
///
/// A junction may stay untyped until elaboration propagates a concrete type
/// to it from its source. It has at most one source and any number of
/// sinks. Composite-typed junctions decompose into named member junctions
/// which are themselves junctions; the composite itself never joins an XNet,
/// its members do.
#[derive(Clone)]
pub struct Junction {
    pub(crate) kind: JunctionKind,
    pub(crate) owner: InstanceId,
    pub(crate) name: String,
    /// Whether the name was chosen by the design author (as opposed to
    /// derived by the tool). Explicit names collide fatally; implicit names
    /// are renamed silently.
    pub(crate) explicit: bool,
    /// Eligible for by-name auto-binding in the instantiating scope.
    pub(crate) auto: bool,
    /// An auto input that may legally stay unbound.
    pub(crate) optional: bool,
    pub(crate) ty: Option<Ty>,
    pub(crate) source: Option<JunctionId>,
    pub(crate) sinks: IndexSet<JunctionId>,
    pub(crate) members: Vec<(String, JunctionId)>,
    pub(crate) xnet: Option<XNetId>,
    /// The collision-free name assigned by the naming pass.
    pub(crate) resolved: Option<String>,
    /// Unused wires are tombstoned rather than removed, keeping handles
    /// stable.
    pub(crate) dead: bool,
}

impl Junction {
    pub(crate) fn new(kind: JunctionKind, owner: InstanceId, name: &str) -> Junction {
        Junction {
            kind,
            owner,
            name: name.to_owned(),
            explicit: true,
            auto: false,
            optional: false,
            ty: None,
            source: None,
            sinks: IndexSet::new(),
            members: Vec::new(),
            xnet: None,
            resolved: None,
            dead: false,
        }
    }

    pub fn kind(&self) -> JunctionKind {
        self.kind
    }

    pub fn owner(&self) -> InstanceId {
        self.owner
    }

    /// The declared name, before collision resolution.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The final name assigned by the naming pass, if it has run.
    pub fn resolved_name(&self) -> Option<&str> {
        self.resolved.as_deref()
    }

    pub fn ty(&self) -> Option<&Ty> {
        self.ty.as_ref()
    }

    pub fn source(&self) -> Option<JunctionId> {
        self.source
    }

    pub fn sinks(&self) -> impl Iterator<Item = JunctionId> + '_ {
        self.sinks.iter().copied()
    }

    pub fn members(&self) -> &[(String, JunctionId)] {
        &self.members
    }

    pub fn is_composite(&self) -> bool {
        !self.members.is_empty()
    }

    pub fn xnet(&self) -> Option<XNetId> {
        self.xnet
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }
}
