//! The design: an explicit context object owning every arena.
//!
//! All construction and elaboration state lives here — there is no ambient
//! "current scope" global, so independent designs can be built and
//! elaborated in isolation (and in tests, side by side).

use crate::{Instance, InstanceId, Junction, JunctionId, XNet, XNetId};

pub struct Design {
    pub(crate) instances: Vec<Instance>,
    pub(crate) junctions: Vec<Junction>,
    pub(crate) xnets: Vec<XNet>,
    pub(crate) root: Option<InstanceId>,
    pub(crate) use_counter: u32,
}

impl Design {
    pub fn new() -> Design {
        Design {
            instances: Vec::new(),
            junctions: Vec::new(),
            xnets: Vec::new(),
            root: None,
            use_counter: 0,
        }
    }

    /// The top instance; valid once elaboration has started.
    pub fn root(&self) -> InstanceId {
        self.root.expect("design has not been elaborated")
    }

    pub fn instance(&self, id: InstanceId) -> &Instance {
        &self.instances[id.index()]
    }

    pub fn junction(&self, id: JunctionId) -> &Junction {
        &self.junctions[id.index()]
    }

    pub fn xnet(&self, id: XNetId) -> &XNet {
        &self.xnets[id.index()]
    }

    // The id iterators capture nothing, so callers may keep mutating the
    // design while walking them.
    pub fn instance_ids(&self) -> impl Iterator<Item = InstanceId> + use<> {
        (0..self.instances.len()).map(InstanceId::from_index)
    }

    pub fn junction_ids(&self) -> impl Iterator<Item = JunctionId> + use<> {
        (0..self.junctions.len()).map(JunctionId::from_index)
    }

    pub fn xnet_ids(&self) -> impl Iterator<Item = XNetId> + use<> {
        (0..self.xnets.len()).map(XNetId::from_index)
    }

    pub fn instances(&self) -> impl Iterator<Item = (InstanceId, &Instance)> {
        self.instances.iter().enumerate().map(|(index, inst)| (InstanceId::from_index(index), inst))
    }

    /// The fully qualified hierarchical path of an instance, for
    /// diagnostics. Uses assigned names where the naming pass has run, and
    /// falls back to labels or definition names before that.
    pub fn instance_path(&self, id: InstanceId) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(id);
        while let Some(id) = cursor {
            let inst = &self.instances[id.index()];
            let part = inst
                .resolved
                .clone()
                .or_else(|| inst.label.clone())
                .unwrap_or_else(|| inst.imp.type_name().to_owned());
            parts.push(part);
            cursor = inst.parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// The fully qualified hierarchical path of a junction.
    pub fn junction_path(&self, id: JunctionId) -> String {
        let junction = &self.junctions[id.index()];
        let name = junction.resolved.as_deref().unwrap_or(&junction.name);
        format!("{}.{}", self.instance_path(junction.owner), name)
    }

    /// Iterates a scope's junctions in naming-relevant creation order:
    /// ports first, then wires, each recursed into composite members.
    pub(crate) fn scope_junctions(&self, instance: InstanceId) -> Vec<JunctionId> {
        let inst = &self.instances[instance.index()];
        let mut result = Vec::new();
        for &id in inst.ports.iter().chain(&inst.wires) {
            self.push_with_members(id, &mut result);
        }
        result
    }

    pub(crate) fn push_with_members(&self, id: JunctionId, result: &mut Vec<JunctionId>) {
        result.push(id);
        for &(_, member) in &self.junctions[id.index()].members {
            self.push_with_members(member, result);
        }
    }
}

impl Default for Design {
    fn default() -> Self {
        Design::new()
    }
}

#[cfg(test)]
mod test {
    use crate::{Design, ElabError, ModuleCtx, ModuleImpl, Ty};

    struct Solo;

    impl ModuleImpl for Solo {
        fn type_name(&self) -> &str {
            "solo"
        }

        fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.input("a", Ty::bit())?;
            Ok(())
        }
    }

    #[test]
    fn test_id_iterators_do_not_hold_the_design() {
        let mut design = Design::new();
        design.elaborate(Solo).unwrap();
        // The passes mutate the design while walking its id ranges.
        for instance in design.instance_ids() {
            design.instances[instance.index()].rank = Some(0);
        }
        for junction in design.junction_ids() {
            assert!(!design.junction(junction).name().is_empty());
            design.use_counter += 1;
        }
    }
}
