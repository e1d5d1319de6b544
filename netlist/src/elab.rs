//! Elaboration: expanding module bodies and resolving types to fixed point.
//!
//! Each scope's `body` runs exactly once. Children become elaborable as
//! soon as each of their inputs is either concretely typed or undriven;
//! types flow along source→sink edges between rounds. A round without
//! progress while children remain is a type-inference failure and aborts
//! with a bounded report of the offending inputs.

use std::rc::Rc;

use crate::{
    Design, ElabError, InstanceId, JunctionId, JunctionKind, ModuleCtx, ModuleImpl,
};

impl Design {
    /// Builds and elaborates a design with `top` at the root: runs the
    /// construction walk, the type fixed point, XNet construction, the
    /// naming pass, and rank assignment. The first structural error aborts
    /// the whole pipeline.
    pub fn elaborate(&mut self, top: impl ModuleImpl + 'static) -> Result<InstanceId, ElabError> {
        assert!(self.root.is_none(), "design is already elaborated");
        let root = self.construct_instance(None, None, Rc::new(top))?;
        self.root = Some(root);
        self.elaborate_scope(root)?;
        self.build_xnets()?;
        self.assign_names()?;
        self.assign_ranks()?;
        Ok(root)
    }

    fn elaborate_scope(&mut self, scope: InstanceId) -> Result<(), ElabError> {
        let inst = &self.instances[scope.index()];
        assert!(!inst.elaborated, "body of {} invoked twice", self.instance_path(scope));
        tracing::debug!("elaborating {}", self.instance_path(scope));
        let imp = inst.imp.clone();
        imp.body(&mut ModuleCtx::new(self, scope))?;
        self.instances[scope.index()].elaborated = true;

        self.validate_wires(scope)?;
        self.autobind_children(scope)?;
        // Auto-binding adds sinks, never sources; a wire whose only sinks
        // arrived with it is just as undrivable.
        self.validate_wires(scope)?;

        let mut unresolved: Vec<InstanceId> = self.instances[scope.index()]
            .children
            .iter()
            .copied()
            .filter(|child| !self.instances[child.index()].elaborated)
            .collect();
        loop {
            let mut progress = self.propagate_scope_types(scope)?;
            let mut remaining = Vec::new();
            for child in unresolved.drain(..) {
                if self.child_ready(child) {
                    self.elaborate_scope(child)?;
                    progress = true;
                } else {
                    remaining.push(child);
                }
            }
            unresolved = remaining;
            if unresolved.is_empty() {
                break;
            }
            if !progress {
                return Err(self.unresolved_error(&unresolved));
            }
        }
        // One more sweep so this scope's outputs pick up the types of
        // sources that only landed during child elaboration.
        while self.propagate_scope_types(scope)? {}
        self.check_outputs(scope)?;

        self.instances[scope.index()].frozen = true;
        self.reorder_children(scope);
        Ok(())
    }

    /// Wires with neither source nor sinks are silently dropped; a wire
    /// with sinks but no source can never carry a value and is an error.
    fn validate_wires(&mut self, scope: InstanceId) -> Result<(), ElabError> {
        let wires = self.instances[scope.index()].wires.clone();
        for wire in wires {
            let junction = &self.junctions[wire.index()];
            if junction.dead || junction.source.is_some() || junction.is_composite() {
                continue;
            }
            if junction.sinks.is_empty() {
                if junction.ty.is_none() {
                    tracing::trace!("dropping unused wire {}", self.junction_path(wire));
                    self.junctions[wire.index()].dead = true;
                }
            } else {
                return Err(ElabError::WireWithoutSource { wire: self.junction_path(wire) });
            }
        }
        Ok(())
    }

    /// Binds every unbound auto-discoverable child input to an identically
    /// named junction of this scope — ports first, then wires.
    fn autobind_children(&mut self, scope: InstanceId) -> Result<(), ElabError> {
        let children = self.instances[scope.index()].children.clone();
        for child in children {
            let ports = self.instances[child.index()].ports.clone();
            for port in ports {
                let junction = &self.junctions[port.index()];
                if junction.kind != JunctionKind::Input
                    || !junction.auto
                    || junction.source.is_some()
                {
                    continue;
                }
                let name = junction.name.clone();
                let optional = junction.optional;
                let scope_inst = &self.instances[scope.index()];
                let candidate = scope_inst
                    .ports
                    .iter()
                    .chain(&scope_inst.wires)
                    .copied()
                    .find(|&id| self.junctions[id.index()].name == name && !self.junctions[id.index()].dead);
                match candidate {
                    Some(found) => {
                        tracing::trace!(
                            "auto-binding {} to {}",
                            self.junction_path(port),
                            self.junction_path(found)
                        );
                        ModuleCtx::new(self, scope).bind(port, found)?;
                    }
                    None if optional => (),
                    None => {
                        return Err(ElabError::UnboundAutoInput {
                            input: self.junction_path(port),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// One propagation sweep over this scope's junction graph: copies the
    /// source's concrete type onto every untyped sink and derives member
    /// links of composites whose types have landed. Returns whether
    /// anything changed.
    fn propagate_scope_types(&mut self, scope: InstanceId) -> Result<bool, ElabError> {
        let mut progress = false;
        loop {
            let mut set = self.scope_junctions(scope);
            for &child in &self.instances[scope.index()].children {
                for &port in &self.instances[child.index()].ports {
                    self.push_with_members(port, &mut set);
                }
            }
            let mut changed = false;
            for junction in set {
                let Some(source) = self.junctions[junction.index()].source else { continue };
                let source_ty = self.junctions[source.index()].ty.clone();
                let sink_ty = self.junctions[junction.index()].ty.clone();
                match (&sink_ty, &source_ty) {
                    (None, Some(ty)) => {
                        self.junctions[junction.index()].ty = Some(ty.clone());
                        self.realize_members(junction);
                        changed = true;
                    }
                    (Some(sink_ty), Some(source_ty)) if sink_ty != source_ty => {
                        return Err(ElabError::NoConversion {
                            sink: self.junction_path(junction),
                            from: source_ty.to_string(),
                            to: sink_ty.to_string(),
                        });
                    }
                    _ => (),
                }
                // Composite member links that could not be derived at bind
                // time (one side was untyped then).
                let sink_members = self.junctions[junction.index()].members.clone();
                let source_members = self.junctions[source.index()].members.clone();
                if !sink_members.is_empty() && sink_members.len() == source_members.len() {
                    for ((_, sink_member), (_, source_member)) in
                        sink_members.into_iter().zip(source_members)
                    {
                        if self.junctions[sink_member.index()].source.is_none() {
                            self.junctions[sink_member.index()].source = Some(source_member);
                            self.junctions[source_member.index()].sinks.insert(sink_member);
                            changed = true;
                        }
                    }
                }
            }
            if changed {
                progress = true;
            } else {
                break;
            }
        }
        Ok(progress)
    }

    /// A child is elaborable once each of its input leaves is concretely
    /// typed or undriven.
    fn child_ready(&self, child: InstanceId) -> bool {
        self.input_leaves(child).into_iter().all(|leaf| {
            let junction = &self.junctions[leaf.index()];
            junction.ty.is_some() || junction.source.is_none()
        })
    }

    pub(crate) fn input_leaves(&self, instance: InstanceId) -> Vec<JunctionId> {
        let mut leaves = Vec::new();
        for &port in &self.instances[instance.index()].ports {
            if self.junctions[port.index()].kind == JunctionKind::Input {
                self.leaves_of(port, &mut leaves);
            }
        }
        leaves
    }

    fn leaves_of(&self, junction: JunctionId, leaves: &mut Vec<JunctionId>) {
        let entry = &self.junctions[junction.index()];
        if entry.is_composite() {
            for &(_, member) in &entry.members {
                self.leaves_of(member, leaves);
            }
        } else {
            leaves.push(junction);
        }
    }

    fn unresolved_error(&self, unresolved: &[InstanceId]) -> ElabError {
        let mut inputs = Vec::new();
        for &child in unresolved {
            for leaf in self.input_leaves(child) {
                let junction = &self.junctions[leaf.index()];
                if junction.ty.is_none() && junction.source.is_some() {
                    inputs.push(self.junction_path(leaf));
                }
            }
        }
        let total = inputs.len();
        ElabError::UnresolvedTypes { inputs, total }
    }

    /// A dangling untyped output is acceptable; a driven one whose type
    /// still cannot be inferred is not.
    fn check_outputs(&self, scope: InstanceId) -> Result<(), ElabError> {
        for &port in &self.instances[scope.index()].ports {
            let junction = &self.junctions[port.index()];
            if junction.kind != JunctionKind::Output || junction.is_composite() {
                continue;
            }
            if junction.ty.is_none() && junction.source.is_some() {
                return Err(ElabError::UntypedDrivenOutput { output: self.junction_path(port) });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::{Args, Design, ElabError, ModuleCtx, ModuleImpl, Ty};

    /// A pass-through buffer that infers its width from its input.
    struct Buf;

    impl ModuleImpl for Buf {
        fn type_name(&self) -> &str {
            "buf"
        }

        fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.input_infer("d")?;
            ctx.output("q")?;
            Ok(())
        }

        fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            let d = ctx.port(ctx.instance(), "d")?;
            let q = ctx.port(ctx.instance(), "q")?;
            if let Some(ty) = ctx.ty(d) {
                ctx.set_ty(q, ty)?;
            }
            Ok(())
        }
    }

    struct Chain;

    impl ModuleImpl for Chain {
        fn type_name(&self) -> &str {
            "chain"
        }

        fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.input("d", Ty::bits(8))?;
            ctx.output("q")?;
            Ok(())
        }

        fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            let d = ctx.port(ctx.instance(), "d")?;
            let q = ctx.port(ctx.instance(), "q")?;
            let first = ctx.add("first", Buf)?;
            let second = ctx.add("second", Buf)?;
            let first_d = ctx.port(first, "d")?;
            let first_q = ctx.port(first, "q")?;
            let second_d = ctx.port(second, "d")?;
            let second_q = ctx.port(second, "q")?;
            ctx.bind(first_d, d)?;
            ctx.bind(second_d, first_q)?;
            ctx.bind(q, second_q)?;
            Ok(())
        }
    }

    #[test]
    fn test_type_propagation_terminates() {
        let mut design = Design::new();
        let root = design.elaborate(Chain).unwrap();
        let q = design.port(root, "q").unwrap();
        assert_eq!(design.junction(q).ty(), Some(&Ty::bits(8)));
        // Every port of every instance is concretely typed.
        for id in design.instance_ids() {
            for &port in design.instance(id).ports() {
                assert!(design.junction(port).ty().is_some(), "{} untyped", design.junction_path(port));
            }
        }
    }

    struct Loopy;

    impl ModuleImpl for Loopy {
        fn type_name(&self) -> &str {
            "loopy"
        }

        fn construct(&self, _ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            Ok(())
        }

        fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            // A buffer fed from its own output: no type can ever land.
            let buf = ctx.add("buffer", Buf)?;
            let d = ctx.port(buf, "d")?;
            let q = ctx.port(buf, "q")?;
            ctx.bind(d, q)?;
            Ok(())
        }
    }

    #[test]
    fn test_unresolved_types_reported() {
        let mut design = Design::new();
        match design.elaborate(Loopy) {
            Err(ElabError::UnresolvedTypes { inputs, total }) => {
                assert_eq!(total, 1);
                assert!(inputs[0].ends_with(".d"));
            }
            other => panic!("expected UnresolvedTypes, got {other:?}"),
        }
    }

    struct UnusedWire;

    impl ModuleImpl for UnusedWire {
        fn type_name(&self) -> &str {
            "unused_wire"
        }

        fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.input("d", Ty::bit())?;
            Ok(())
        }

        fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.wire("scratch")?;
            Ok(())
        }
    }

    #[test]
    fn test_unused_wire_dropped_silently() {
        let mut design = Design::new();
        let root = design.elaborate(UnusedWire).unwrap();
        let wire = design.instance(root).wires()[0];
        assert!(design.junction(wire).is_dead());
    }

    struct SourcelessWire;

    impl ModuleImpl for SourcelessWire {
        fn type_name(&self) -> &str {
            "sourceless_wire"
        }

        fn construct(&self, _ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            Ok(())
        }

        fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            let scratch = ctx.wire("scratch")?;
            let buf = ctx.add("buffer", Buf)?;
            let d = ctx.port(buf, "d")?;
            ctx.bind(d, scratch)?;
            Ok(())
        }
    }

    #[test]
    fn test_wire_with_sinks_but_no_source_fails() {
        let mut design = Design::new();
        match design.elaborate(SourcelessWire) {
            Err(ElabError::WireWithoutSource { wire }) => assert!(wire.ends_with("scratch")),
            other => panic!("expected WireWithoutSource, got {other:?}"),
        }
    }

    struct NeedsClock;

    impl ModuleImpl for NeedsClock {
        fn type_name(&self) -> &str {
            "needs_clock"
        }

        fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.input_auto("clk")?;
            ctx.input_infer("d")?;
            ctx.output("q")?;
            Ok(())
        }

        fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            let d = ctx.port(ctx.instance(), "d")?;
            let q = ctx.port(ctx.instance(), "q")?;
            if let Some(ty) = ctx.ty(d) {
                ctx.set_ty(q, ty)?;
            }
            Ok(())
        }

        fn combinational(&self) -> bool {
            false
        }
    }

    /// Bare typed clock output; a behavior would toggle it at runtime.
    struct ClockSrc;

    impl ModuleImpl for ClockSrc {
        fn type_name(&self) -> &str {
            "clock_src"
        }

        fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.output_typed("clk", Ty::bit())?;
            Ok(())
        }

        fn combinational(&self) -> bool {
            false
        }
    }

    struct WithClock {
        have_clock: bool,
    }

    impl ModuleImpl for WithClock {
        fn type_name(&self) -> &str {
            "with_clock"
        }

        fn args(&self) -> Args {
            Args::new().with("have_clock", self.have_clock)
        }

        fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.input("d", Ty::bit())?;
            Ok(())
        }

        fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            if self.have_clock {
                let clk = ctx.wire_typed("clk", Ty::bit())?;
                let osc = ctx.add("osc", ClockSrc)?;
                ctx.bind(clk, ctx.port(osc, "clk")?)?;
            }
            let child = ctx.add("state", NeedsClock)?;
            let child_d = ctx.port(child, "d")?;
            let d = ctx.port(ctx.instance(), "d")?;
            ctx.bind(child_d, d)?;
            Ok(())
        }
    }

    #[test]
    fn test_auto_binding_finds_clock_by_name() {
        let mut design = Design::new();
        let root = design.elaborate(WithClock { have_clock: true }).unwrap();
        let child = design
            .instance(root)
            .children()
            .iter()
            .copied()
            .find(|&child| design.instance(child).imp().type_name() == "needs_clock")
            .unwrap();
        let clk = design.port(child, "clk").unwrap();
        let source = design.junction(clk).source().unwrap();
        assert_eq!(design.junction(source).name(), "clk");

        // A missing clock must fail loudly.
        let mut design = Design::new();
        match design.elaborate(WithClock { have_clock: false }) {
            Err(ElabError::UnboundAutoInput { input }) => assert!(input.ends_with("clk")),
            other => panic!("expected UnboundAutoInput, got {other:?}"),
        }
    }

    /// Declares a clock wire for auto-binding but never drives it.
    struct UndrivenClock;

    impl ModuleImpl for UndrivenClock {
        fn type_name(&self) -> &str {
            "undriven_clock"
        }

        fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.input("d", Ty::bit())?;
            Ok(())
        }

        fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.wire_typed("clk", Ty::bit())?;
            let child = ctx.add("state", NeedsClock)?;
            let child_d = ctx.port(child, "d")?;
            let d = ctx.port(ctx.instance(), "d")?;
            ctx.bind(child_d, d)?;
            Ok(())
        }
    }

    #[test]
    fn test_undriven_wire_with_auto_bound_sink_is_an_error() {
        let mut design = Design::new();
        match design.elaborate(UndrivenClock) {
            Err(ElabError::WireWithoutSource { wire }) => assert!(wire.ends_with("clk")),
            other => panic!("expected WireWithoutSource, got {other:?}"),
        }
    }

    struct ReservedLabel;

    impl ModuleImpl for ReservedLabel {
        fn type_name(&self) -> &str {
            "reserved_label"
        }

        fn construct(&self, _ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            Ok(())
        }

        fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.add("reg", Buf)?;
            Ok(())
        }
    }

    #[test]
    fn test_reserved_instance_label_is_rejected() {
        let mut design = Design::new();
        match design.elaborate(ReservedLabel) {
            Err(ElabError::ReservedName { name }) => assert_eq!(name, "reg"),
            other => panic!("expected ReservedName, got {other:?}"),
        }
    }

    #[test]
    fn test_equivalence_and_classes() {
        let mut design = Design::new();
        let root = design.elaborate(Chain).unwrap();
        let children = design.instance(root).children().to_vec();
        assert!(design.equivalent(children[0], children[1]));
        assert!(!design.equivalent(root, children[0]));
        // One class for the chain, one shared by both buffers.
        assert_eq!(design.definition_classes().len(), 2);
    }

    #[test]
    fn test_port_after_freeze_rejected() {
        // Declaring ports from a body after a child was already elaborated
        // is fine; re-opening the interface of a frozen instance is not.
        struct Reopen;

        impl ModuleImpl for Reopen {
            fn type_name(&self) -> &str {
                "reopen"
            }

            fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
                ctx.input("d", Ty::bit())?;
                Ok(())
            }
        }

        let mut design = Design::new();
        let root = design.elaborate(Reopen).unwrap();
        let err = ModuleCtx::new(&mut design, root).input("late", Ty::bit());
        assert!(matches!(err, Err(ElabError::PortAfterFreeze { .. })));
    }
}
