//! XNets: hierarchy-spanning equivalence classes of junctions that carry
//! the same value, plus the deterministic per-scope naming pass.

use indexmap::{IndexMap, IndexSet};

use crate::{Design, ElabError, InstanceId, JunctionId, JunctionKind, Ty, XNetId};

/// Identifiers that can never be chosen as a scope-level name, so that
/// emitted structural RTL is always lexically valid.
const RESERVED: &[&str] = &[
    "always", "and", "assign", "automatic", "begin", "buf", "case", "casex", "casez",
    "default", "defparam", "disable", "edge", "else", "end", "endcase", "endfunction",
    "endgenerate", "endmodule", "endtask", "for", "forever", "function", "generate",
    "genvar", "if", "initial", "inout", "input", "integer", "localparam", "logic",
    "module", "nand", "negedge", "nor", "not", "or", "output", "parameter", "posedge",
    "real", "reg", "repeat", "signed", "supply0", "supply1", "task", "time", "tri",
    "unsigned", "wand", "while", "wire", "wor", "xnor", "xor",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.binary_search(&name).is_ok()
}

/// One name an XNet answers to within a particular scope, in registration
/// order. `used` and `assigned` let a renderer pick the best handle for an
/// expression and skip names nothing reads.
#[derive(Debug, Clone)]
pub struct NetName {
    pub(crate) name: String,
    pub(crate) explicit: bool,
    pub(crate) used: bool,
    pub(crate) assigned: bool,
}

impl NetName {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    pub fn is_assigned(&self) -> bool {
        self.assigned
    }
}

/// A maximal set of junctions that necessarily carry the same value at
/// every instant, gathered by walking from an ultimate source through its
/// transitive sinks. The simulator commits values per XNet; the renderer
/// reads names per scope.
#[derive(Debug)]
pub struct XNet {
    pub(crate) source: Option<JunctionId>,
    pub(crate) transitions: IndexSet<JunctionId>,
    pub(crate) aliases: IndexSet<JunctionId>,
    pub(crate) sinks: IndexSet<JunctionId>,
    pub(crate) ty: Option<Ty>,
    pub(crate) scopes: IndexMap<InstanceId, Vec<NetName>>,
}

impl XNet {
    fn new() -> XNet {
        XNet {
            source: None,
            transitions: IndexSet::new(),
            aliases: IndexSet::new(),
            sinks: IndexSet::new(),
            ty: None,
            scopes: IndexMap::new(),
        }
    }

    pub fn source(&self) -> Option<JunctionId> {
        self.source
    }

    pub fn ty(&self) -> Option<&Ty> {
        self.ty.as_ref()
    }

    pub fn sinks(&self) -> impl Iterator<Item = JunctionId> + '_ {
        self.sinks.iter().copied()
    }

    pub fn members(&self) -> impl Iterator<Item = JunctionId> + '_ {
        self.source
            .iter()
            .copied()
            .chain(self.transitions.iter().copied())
            .chain(self.aliases.iter().copied())
            .chain(self.sinks.iter().copied())
    }

    /// Every scope this net answers to a name in, with the names in
    /// registration order.
    pub fn scopes(&self) -> impl Iterator<Item = (InstanceId, &[NetName])> {
        self.scopes.iter().map(|(&scope, names)| (scope, names.as_slice()))
    }

    pub fn names_in(&self, scope: InstanceId) -> &[NetName] {
        self.scopes.get(&scope).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The preferred handle for this net within `scope`: the first
    /// explicitly given name, else the first name of any kind.
    pub fn best_name(&self, scope: InstanceId) -> Option<&str> {
        let names = self.names_in(scope);
        names
            .iter()
            .find(|name| name.explicit)
            .or_else(|| names.first())
            .map(|name| name.name.as_str())
    }
}

impl Design {
    /// Collapses the elaborated junction graph into XNets. Composite
    /// junctions never join a net themselves; their members do.
    pub(crate) fn build_xnets(&mut self) -> Result<(), ElabError> {
        assert!(self.xnets.is_empty(), "XNets built twice");
        for instance in self.instance_ids() {
            for seed in self.scope_junctions(instance) {
                let junction = &self.junctions[seed.index()];
                if junction.dead
                    || junction.is_composite()
                    || junction.ty.is_none()
                    || junction.source.is_some()
                {
                    continue;
                }
                self.gather_xnet(seed);
            }
        }
        self.check_association()?;
        Ok(())
    }

    fn gather_xnet(&mut self, seed: JunctionId) {
        let id = XNetId::from_index(self.xnets.len());
        let mut xnet = XNet::new();
        xnet.ty = self.junctions[seed.index()].ty.clone();
        self.junctions[seed.index()].xnet = Some(id);

        let seed_sinks: Vec<_> = self.junctions[seed.index()].sinks.iter().copied().collect();
        if seed_sinks.is_empty() {
            // Trivial net. An unused wire is a pure alias; a dangling input
            // still transitions a value into its instance; writes to an
            // unobserved output must stay recordable, so it counts as a sink.
            match self.junctions[seed.index()].kind {
                JunctionKind::Wire => xnet.aliases.insert(seed),
                JunctionKind::Input => xnet.transitions.insert(seed),
                JunctionKind::Output => xnet.sinks.insert(seed),
            };
        } else {
            xnet.source = Some(seed);
            let mut queue = seed_sinks;
            while let Some(visit) = queue.pop() {
                let junction = &self.junctions[visit.index()];
                if junction.xnet == Some(id) {
                    continue;
                }
                debug_assert!(junction.xnet.is_none(), "junction joins two XNets");
                let onward: Vec<_> = junction.sinks.iter().copied().collect();
                match junction.kind {
                    JunctionKind::Wire => {
                        xnet.aliases.insert(visit);
                    }
                    _ if onward.is_empty() => {
                        xnet.sinks.insert(visit);
                    }
                    _ => {
                        xnet.transitions.insert(visit);
                    }
                }
                if let Some(ty) = &self.junctions[visit.index()].ty {
                    assert_eq!(Some(ty), xnet.ty.as_ref(), "type disagreement within one XNet");
                }
                self.junctions[visit.index()].xnet = Some(id);
                queue.extend(onward);
            }
        }
        tracing::trace!(
            "{id}: source {:?}, {} transitions, {} aliases, {} sinks",
            xnet.source,
            xnet.transitions.len(),
            xnet.aliases.len(),
            xnet.sinks.len()
        );
        self.xnets.push(xnet);
    }

    /// Every concretely-typed leaf port must have joined a net; a miss
    /// means the bindings form a loop, the port was left undriven, or a
    /// bind never happened even though a source was recorded.
    fn check_association(&self) -> Result<(), ElabError> {
        for instance in self.instance_ids() {
            let mut leaves = Vec::new();
            for &port in &self.instances[instance.index()].ports {
                self.push_with_members(port, &mut leaves);
            }
            for leaf in leaves {
                let junction = &self.junctions[leaf.index()];
                if junction.is_composite() || junction.xnet.is_some() || junction.dead {
                    continue;
                }
                if junction.ty.is_none() && junction.source.is_none() {
                    // Dangling and type-free: nothing can ever flow here.
                    continue;
                }
                let cause = self.association_cause(leaf);
                return Err(ElabError::Unassociated { junction: self.junction_path(leaf), cause });
            }
        }
        Ok(())
    }

    fn association_cause(&self, junction: JunctionId) -> &'static str {
        let mut seen = IndexSet::new();
        let mut cursor = junction;
        while let Some(source) = self.junctions[cursor.index()].source {
            if !seen.insert(cursor) {
                return "it is part of a loop of bindings that drives itself";
            }
            if !self.junctions[source.index()].sinks.contains(&cursor) {
                return "a source was recorded without a binding";
            }
            cursor = source;
        }
        "it was left undriven"
    }

    /// The fully qualified diagnostic name of an XNet, anchored at its
    /// source (or, for a dangling net, its sole member).
    pub fn xnet_path(&self, id: XNetId) -> String {
        let xnet = &self.xnets[id.index()];
        match xnet.members().next() {
            Some(member) => self.junction_path(member),
            None => id.to_string(),
        }
    }
}

/// Per-scope symbol table used by the naming pass. Reserved words are
/// seeded up front so they can never win.
struct ScopeTable {
    taken: IndexMap<String, bool>,
}

impl ScopeTable {
    fn new() -> ScopeTable {
        let taken = RESERVED.iter().map(|&word| (word.to_owned(), true)).collect();
        ScopeTable { taken }
    }

    fn register(
        &mut self,
        scope: &str,
        want: &str,
        explicit: bool,
    ) -> Result<String, ElabError> {
        match self.taken.get(want) {
            None => {
                self.taken.insert(want.to_owned(), explicit);
                return Ok(want.to_owned());
            }
            Some(true) if explicit => {
                if is_reserved(want) {
                    return Err(ElabError::ReservedName { name: want.to_owned() });
                }
                return Err(ElabError::NameCollision {
                    scope: scope.to_owned(),
                    name: want.to_owned(),
                });
            }
            Some(_) => (),
        }
        for counter in 1u32.. {
            let attempt = format!("{want}_{counter}");
            if !self.taken.contains_key(&attempt) {
                self.taken.insert(attempt.clone(), explicit);
                return Ok(attempt);
            }
        }
        unreachable!()
    }
}

impl Design {
    /// Single global naming pass. Within each scope, in order: the scope's
    /// own ports, explicitly named wires, anonymous wires, child instance
    /// labels, and finally synthesized names for child-output nets that
    /// would otherwise be nameless in this scope. Two explicit names
    /// colliding is fatal; everything else is suffixed deterministically.
    pub(crate) fn assign_names(&mut self) -> Result<(), ElabError> {
        for scope in self.instance_ids() {
            let scope_path = self.instance_path(scope);
            let mut table = ScopeTable::new();

            let mut ports = Vec::new();
            for &port in &self.instances[scope.index()].ports {
                self.push_with_members(port, &mut ports);
            }
            let mut wires = Vec::new();
            for &wire in &self.instances[scope.index()].wires {
                self.push_with_members(wire, &mut wires);
            }
            let (named, anonymous): (Vec<_>, Vec<_>) = wires
                .into_iter()
                .partition(|&id| self.junctions[id.index()].explicit);

            for junction in ports.into_iter().chain(named).chain(anonymous) {
                if self.junctions[junction.index()].dead {
                    continue;
                }
                let entry = &self.junctions[junction.index()];
                let (name, explicit) = (entry.name.clone(), entry.explicit);
                let resolved = table.register(&scope_path, &name, explicit)?;
                self.record_net_name(scope, junction, &resolved);
                self.junctions[junction.index()].resolved = Some(resolved);
            }

            let children = self.instances[scope.index()].children.clone();
            for child in children {
                let inst = &self.instances[child.index()];
                let (want, explicit) = match &inst.label {
                    Some(label) => (label.clone(), true),
                    None => (inst.imp.type_name().to_owned(), false),
                };
                let resolved = table.register(&scope_path, &want, explicit)?;
                let inst = &mut self.instances[child.index()];
                inst.generated = !explicit;
                inst.resolved = Some(resolved);
            }

            // Child outputs whose nets are otherwise nameless here.
            let children = self.instances[scope.index()].children.clone();
            for child in children {
                let child_name = self.instances[child.index()]
                    .resolved
                    .clone()
                    .unwrap_or_default();
                let mut leaves = Vec::new();
                for &port in &self.instances[child.index()].ports {
                    self.push_with_members(port, &mut leaves);
                }
                for leaf in leaves {
                    let junction = &self.junctions[leaf.index()];
                    if junction.kind != JunctionKind::Output {
                        continue;
                    }
                    let Some(xnet) = junction.xnet else { continue };
                    if !self.xnets[xnet.index()].names_in(scope).is_empty() {
                        continue;
                    }
                    let want = format!("{child_name}_{}", junction.name);
                    let resolved = table.register(&scope_path, &want, false)?;
                    self.record_net_name(scope, leaf, &resolved);
                }
            }
        }
        Ok(())
    }

    fn record_net_name(&mut self, scope: InstanceId, junction: JunctionId, resolved: &str) {
        let entry = &self.junctions[junction.index()];
        let explicit = entry.explicit;
        let assigned = entry.source.is_some();
        let used = !entry.sinks.is_empty();
        let Some(xnet) = entry.xnet else { return };
        let assigned = assigned || self.xnets[xnet.index()].source == Some(junction);
        self.xnets[xnet.index()]
            .scopes
            .entry(scope)
            .or_default()
            .push(NetName { name: resolved.to_owned(), explicit, used, assigned });
    }
}

#[cfg(test)]
mod test {
    use super::is_reserved;
    use crate::{Design, ElabError, ModuleCtx, ModuleImpl, Ty};

    struct Inv;

    impl ModuleImpl for Inv {
        fn type_name(&self) -> &str {
            "inv"
        }

        fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.input("a", Ty::bit())?;
            ctx.output_typed("y", Ty::bit())?;
            Ok(())
        }
    }

    struct Pair;

    impl ModuleImpl for Pair {
        fn type_name(&self) -> &str {
            "pair"
        }

        fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.input("a", Ty::bit())?;
            ctx.output("y")?;
            Ok(())
        }

        fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            let a = ctx.port(ctx.instance(), "a")?;
            let y = ctx.port(ctx.instance(), "y")?;
            let first = ctx.add("first", Inv)?;
            let second = ctx.add("second", Inv)?;
            let mid = ctx.wire("mid")?;
            ctx.bind(ctx.port(first, "a")?, a)?;
            ctx.bind(mid, ctx.port(first, "y")?)?;
            ctx.bind(ctx.port(second, "a")?, mid)?;
            ctx.bind(y, ctx.port(second, "y")?)?;
            Ok(())
        }
    }

    #[test]
    fn test_reserved_words() {
        assert!(is_reserved("module"));
        assert!(is_reserved("wire"));
        assert!(!is_reserved("sum"));
        assert!(!is_reserved("wires"));
    }

    #[test]
    fn test_partition_property() {
        let mut design = Design::new();
        design.elaborate(Pair).unwrap();
        // Every typed, alive, non-composite junction is in exactly one net,
        // and the nets' members cover that same set with no duplicates.
        let mut expected = 0;
        for id in design.junction_ids() {
            let junction = design.junction(id);
            if junction.ty().is_some() && !junction.is_dead() && !junction.is_composite() {
                expected += 1;
                assert!(junction.xnet().is_some(), "{} in no XNet", design.junction_path(id));
            }
        }
        let mut seen = indexmap::IndexSet::new();
        for id in design.xnet_ids() {
            for member in design.xnet(id).members() {
                assert!(seen.insert(member), "member counted twice");
            }
        }
        assert_eq!(seen.len(), expected);
    }

    struct TwoSums;

    impl ModuleImpl for TwoSums {
        fn type_name(&self) -> &str {
            "two_sums"
        }

        fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.input("a", Ty::bit())?;
            Ok(())
        }

        fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            let a = ctx.port(ctx.instance(), "a")?;
            for label in ["first", "second"] {
                let inv = ctx.add(label, Inv)?;
                ctx.bind(ctx.port(inv, "a")?, a)?;
                // Both taps want to be called "y" after their source port.
                let tapped = ctx.tap(ctx.port(inv, "y")?)?;
                let sink = ctx.add(&format!("{label}_sink"), Inv)?;
                ctx.bind(ctx.port(sink, "a")?, tapped)?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_implicit_collision_suffixed_deterministically() {
        for _ in 0..3 {
            let mut design = Design::new();
            let root = design.elaborate(TwoSums).unwrap();
            let names: Vec<_> = design
                .instance(root)
                .wires()
                .iter()
                .map(|&wire| design.junction(wire).resolved_name().unwrap().to_owned())
                .collect();
            assert_eq!(names, ["y", "y_1"]);
        }
    }

    struct ExplicitClash;

    impl ModuleImpl for ExplicitClash {
        fn type_name(&self) -> &str {
            "explicit_clash"
        }

        fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.input("a", Ty::bit())?;
            Ok(())
        }

        fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            let a = ctx.port(ctx.instance(), "a")?;
            // A wire and a child instance both explicitly named "stage".
            let stage = ctx.wire_typed("stage", Ty::bit())?;
            ctx.bind(stage, a)?;
            let child = ctx.add("stage", Inv)?;
            ctx.bind(ctx.port(child, "a")?, stage)?;
            Ok(())
        }
    }

    #[test]
    fn test_explicit_collision_fatal() {
        let mut design = Design::new();
        match design.elaborate(ExplicitClash) {
            Err(ElabError::NameCollision { name, .. }) => assert_eq!(name, "stage"),
            other => panic!("expected NameCollision, got {other:?}"),
        }
    }

    struct Direct;

    impl ModuleImpl for Direct {
        fn type_name(&self) -> &str {
            "direct"
        }

        fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.input("a", Ty::bit())?;
            ctx.output("y")?;
            Ok(())
        }

        fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            let a = ctx.port(ctx.instance(), "a")?;
            let y = ctx.port(ctx.instance(), "y")?;
            let first = ctx.add("first", Inv)?;
            let second = ctx.add("second", Inv)?;
            // No intermediate wire: first's output feeds second directly.
            ctx.bind(ctx.port(second, "a")?, ctx.port(first, "y")?)?;
            ctx.bind(ctx.port(first, "a")?, a)?;
            ctx.bind(y, ctx.port(second, "y")?)?;
            Ok(())
        }
    }

    #[test]
    fn test_child_output_fallback_name() {
        let mut design = Design::new();
        let root = design.elaborate(Direct).unwrap();
        // The wireless net between the inverters is named after its driving
        // child output; the net reaching the root port keeps the port name.
        let named = design.instance(root).wires().is_empty();
        assert!(named);
        let first = design.instance(root).children()[0];
        let y = design.port(first, "y").unwrap();
        let xnet = design.junction(y).xnet().unwrap();
        assert_eq!(design.xnet(xnet).best_name(root), Some("first_y"));
    }
}
