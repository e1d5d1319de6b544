//! Module hierarchy and the two-phase construction protocol.
//!
//! A module is described by an implementation of [`ModuleImpl`]. Its
//! `construct` hook runs once at instantiation and declares the interface;
//! its `body` hook runs exactly once during elaboration and populates
//! internal wires, sub-instances, and bindings. Interfaces may stay
//! partially untyped until elaboration propagates types to them.
//!
//! All declaration and binding goes through the explicit [`ModuleCtx`]
//! builder, which checks name legality and binding direction at the call
//! site.

use std::rc::Rc;

use crate::xnet::is_reserved;
use crate::{
    Const, Design, ElabError, InstanceId, Junction, JunctionId, JunctionKind, Process, Ty,
};

/// The construct-arguments record of an instance, used for instance
/// equivalence comparisons.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Args {
    entries: Vec<(String, ArgValue)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgValue {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl Args {
    pub fn new() -> Args {
        Args::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<ArgValue>) -> Args {
        self.entries.push((name.to_owned(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.entries.iter().find(|(entry, _)| entry == name).map(|(_, value)| value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Int(value)
    }
}

impl From<u64> for ArgValue {
    fn from(value: u64) -> Self {
        ArgValue::Int(value as i64)
    }
}

impl From<usize> for ArgValue {
    fn from(value: usize) -> Self {
        ArgValue::Int(value as i64)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Str(value.to_owned())
    }
}

/// A module definition.
///
/// Implementations declare their interface in [`construct`], their contents
/// in [`body`], and (for leaf primitives) their reactive behavior in
/// [`behavior`].
///
/// [`construct`]: ModuleImpl::construct
/// [`body`]: ModuleImpl::body
/// [`behavior`]: ModuleImpl::behavior
pub trait ModuleImpl {
    /// The definition name; instances of equivalent definitions share it.
    fn type_name(&self) -> &str;

    /// Declares the interface. Runs once, immediately at instantiation,
    /// before any sibling is elaborated.
    fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError>;

    /// Populates wires, sub-instances, and bindings. Runs exactly once per
    /// instance, during elaboration.
    fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
        let _ = ctx;
        Ok(())
    }

    /// Whether this module is purely combinational. Non-combinational
    /// modules are forced to rank 0.
    fn combinational(&self) -> bool {
        true
    }

    /// The construct-arguments record used for equivalence comparisons.
    fn args(&self) -> Args {
        Args::new()
    }

    /// The reactive behavior of a leaf primitive, compatible with the
    /// suspension contract of [`Process`]. Hierarchical containers return
    /// [`None`].
    fn behavior(&self, design: &Design, instance: InstanceId) -> Option<Box<dyn Process>> {
        let _ = (design, instance);
        None
    }

    /// An inline rendering of this instance within its parent's body, if
    /// the module supports being textually folded instead of getting its
    /// own named definition.
    fn inline_expr(&self, design: &Design, instance: InstanceId) -> Option<String> {
        let _ = (design, instance);
        None
    }
}

/// A node of the instance tree.
///
/// The parent owns its children exclusively; a junction is owned by exactly
/// the instance whose declaration created it. Once elaboration has processed
/// an instance's body, its interface is frozen.
pub struct Instance {
    pub(crate) parent: Option<InstanceId>,
    pub(crate) children: Vec<InstanceId>,
    /// Interface junctions, in declaration order.
    pub(crate) ports: Vec<JunctionId>,
    /// Internal wires, in declaration order.
    pub(crate) wires: Vec<JunctionId>,
    pub(crate) imp: Rc<dyn ModuleImpl>,
    pub(crate) args: Args,
    pub(crate) label: Option<String>,
    /// The unique name assigned within the parent scope by the naming pass.
    pub(crate) resolved: Option<String>,
    pub(crate) generated: bool,
    pub(crate) frozen: bool,
    pub(crate) elaborated: bool,
    pub(crate) rank: Option<u32>,
    /// Position in "first bound output" order within the parent scope.
    pub(crate) first_use: Option<u32>,
}

impl Instance {
    pub fn parent(&self) -> Option<InstanceId> {
        self.parent
    }

    pub fn children(&self) -> &[InstanceId] {
        &self.children
    }

    pub fn ports(&self) -> &[JunctionId] {
        &self.ports
    }

    pub fn wires(&self) -> &[JunctionId] {
        &self.wires
    }

    pub fn imp(&self) -> &Rc<dyn ModuleImpl> {
        &self.imp
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    /// The final scope-unique name; [`None`] before the naming pass.
    pub fn name(&self) -> Option<&str> {
        self.resolved.as_deref()
    }

    /// Whether the final name was derived by the tool rather than chosen by
    /// the design author.
    pub fn name_generated(&self) -> bool {
        self.generated
    }

    pub fn rank(&self) -> Option<u32> {
        self.rank
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

impl Design {
    pub(crate) fn construct_instance(
        &mut self,
        parent: Option<InstanceId>,
        label: Option<&str>,
        imp: Rc<dyn ModuleImpl>,
    ) -> Result<InstanceId, ElabError> {
        if let Some(label) = label {
            if is_reserved(label) {
                return Err(ElabError::ReservedName { name: label.to_owned() });
            }
        }
        let id = InstanceId::from_index(self.instances.len());
        self.instances.push(Instance {
            parent,
            children: Vec::new(),
            ports: Vec::new(),
            wires: Vec::new(),
            args: imp.args(),
            imp: imp.clone(),
            label: label.map(str::to_owned),
            resolved: None,
            generated: false,
            frozen: false,
            elaborated: false,
            rank: None,
            first_use: None,
        });
        if let Some(parent) = parent {
            self.instances[parent.index()].children.push(id);
        }
        let mut ctx = ModuleCtx::new(self, id);
        imp.construct(&mut ctx)?;
        Ok(id)
    }

    /// Creates member junctions for a composite-typed junction, if its type
    /// is known and the members have not been materialized yet.
    pub(crate) fn realize_members(&mut self, id: JunctionId) {
        let junction = &self.junctions[id.index()];
        if !junction.members.is_empty() {
            return;
        }
        let Some(ty) = junction.ty.clone() else { return };
        if !ty.is_composite() {
            return;
        }
        let kind = junction.kind;
        let owner = junction.owner;
        let base = junction.name.clone();
        let mut members = Vec::new();
        for (field, field_ty) in ty.members() {
            let mut member = Junction::new(kind, owner, &format!("{base}_{field}"));
            member.explicit = false;
            member.ty = Some(field_ty.clone());
            let member_id = JunctionId::from_index(self.junctions.len());
            self.junctions.push(member);
            self.realize_members(member_id);
            members.push((field.clone(), member_id));
        }
        self.junctions[id.index()].members = members;
    }

    /// Looks up an interface junction of `instance` by declared name.
    pub fn port(&self, instance: InstanceId, name: &str) -> Option<JunctionId> {
        self.instances[instance.index()]
            .ports
            .iter()
            .copied()
            .find(|&port| self.junctions[port.index()].name == name)
    }

    /// Whether two instances are interchangeable for code generation:
    /// identical ordered interface port types, identical wire types, equal
    /// construct arguments, and pairwise-equivalent children.
    pub fn equivalent(&self, lft: InstanceId, rgt: InstanceId) -> bool {
        let mut memo = std::collections::HashMap::new();
        self.equivalent_memo(lft, rgt, &mut memo)
    }

    fn equivalent_memo(
        &self,
        lft: InstanceId,
        rgt: InstanceId,
        memo: &mut std::collections::HashMap<(InstanceId, InstanceId), bool>,
    ) -> bool {
        if lft == rgt {
            return true;
        }
        let key = (lft.min(rgt), lft.max(rgt));
        if let Some(&result) = memo.get(&key) {
            return result;
        }
        let result = self.equivalent_uncached(lft, rgt, memo);
        memo.insert(key, result);
        result
    }

    fn equivalent_uncached(
        &self,
        lft: InstanceId,
        rgt: InstanceId,
        memo: &mut std::collections::HashMap<(InstanceId, InstanceId), bool>,
    ) -> bool {
        let (linst, rinst) = (&self.instances[lft.index()], &self.instances[rgt.index()]);
        if linst.imp.type_name() != rinst.imp.type_name() || linst.args != rinst.args {
            return false;
        }
        if linst.ports.len() != rinst.ports.len() || linst.wires.len() != rinst.wires.len() {
            return false;
        }
        let junction_eq = |lid: &JunctionId, rid: &JunctionId| {
            let (lj, rj) = (&self.junctions[lid.index()], &self.junctions[rid.index()]);
            lj.kind == rj.kind && lj.ty == rj.ty
        };
        if !linst.ports.iter().zip(&rinst.ports).all(|(lid, rid)| junction_eq(lid, rid)) {
            return false;
        }
        if !linst.wires.iter().zip(&rinst.wires).all(|(lid, rid)| junction_eq(lid, rid)) {
            return false;
        }
        if linst.children.len() != rinst.children.len() {
            return false;
        }
        let children: Vec<_> =
            linst.children.iter().copied().zip(rinst.children.iter().copied()).collect();
        children.into_iter().all(|(lchild, rchild)| self.equivalent_memo(lchild, rchild, memo))
    }

    /// One representative instance per equivalence class, in creation order.
    pub fn definition_classes(&self) -> Vec<InstanceId> {
        let mut reprs: Vec<InstanceId> = Vec::new();
        let mut memo = std::collections::HashMap::new();
        for index in 0..self.instances.len() {
            let id = InstanceId::from_index(index);
            if !reprs.iter().any(|&repr| self.equivalent_memo(repr, id, &mut memo)) {
                reprs.push(id);
            }
        }
        reprs
    }

    /// Re-orders `instance`'s children so that children whose outputs were
    /// bound into the parent scope come first, in first-bound order. Calling
    /// this again is a no-op.
    pub(crate) fn reorder_children(&mut self, instance: InstanceId) {
        let mut children = std::mem::take(&mut self.instances[instance.index()].children);
        children.sort_by_key(|&child| match self.instances[child.index()].first_use {
            Some(order) => (0u8, order),
            None => (1, 0),
        });
        self.instances[instance.index()].children = children;
    }
}

/// The builder handed to [`ModuleImpl::construct`] and [`ModuleImpl::body`].
///
/// All port/wire declaration and binding goes through this context; it knows
/// which instance's code is executing and enforces direction legality
/// accordingly.
pub struct ModuleCtx<'a> {
    design: &'a mut Design,
    inst: InstanceId,
}

impl<'a> ModuleCtx<'a> {
    pub(crate) fn new(design: &'a mut Design, inst: InstanceId) -> ModuleCtx<'a> {
        ModuleCtx { design, inst }
    }

    pub fn design(&self) -> &Design {
        self.design
    }

    /// The instance whose code is executing.
    pub fn instance(&self) -> InstanceId {
        self.inst
    }

    fn declare(
        &mut self,
        kind: JunctionKind,
        name: &str,
        ty: Option<Ty>,
        explicit: bool,
    ) -> Result<JunctionId, ElabError> {
        let inst = &self.design.instances[self.inst.index()];
        if kind.is_port() && inst.frozen {
            return Err(ElabError::PortAfterFreeze {
                instance: self.design.instance_path(self.inst),
                name: name.to_owned(),
            });
        }
        if explicit && is_reserved(name) {
            return Err(ElabError::ReservedName { name: name.to_owned() });
        }
        let mut junction = Junction::new(kind, self.inst, name);
        junction.explicit = explicit;
        junction.ty = ty;
        let id = JunctionId::from_index(self.design.junctions.len());
        self.design.junctions.push(junction);
        self.design.realize_members(id);
        let inst = &mut self.design.instances[self.inst.index()];
        match kind {
            JunctionKind::Input | JunctionKind::Output => inst.ports.push(id),
            JunctionKind::Wire => inst.wires.push(id),
        }
        Ok(id)
    }

    /// Declares a concretely typed input.
    pub fn input(&mut self, name: &str, ty: Ty) -> Result<JunctionId, ElabError> {
        self.declare(JunctionKind::Input, name, Some(ty), true)
    }

    /// Declares an input whose type is left to elaboration-time propagation
    /// from whatever drives it.
    pub fn input_infer(&mut self, name: &str) -> Result<JunctionId, ElabError> {
        self.declare(JunctionKind::Input, name, None, true)
    }

    /// Declares an auto-discoverable input: if left unbound, it binds by
    /// name to an identically named junction in the instantiating scope.
    pub fn input_auto(&mut self, name: &str) -> Result<JunctionId, ElabError> {
        let id = self.declare(JunctionKind::Input, name, None, true)?;
        self.design.junctions[id.index()].auto = true;
        Ok(id)
    }

    /// Like [`input_auto`](ModuleCtx::input_auto), but elaboration tolerates
    /// the input staying unbound.
    pub fn input_optional(&mut self, name: &str) -> Result<JunctionId, ElabError> {
        let id = self.input_auto(name)?;
        self.design.junctions[id.index()].optional = true;
        Ok(id)
    }

    /// Declares an output; its type is usually inferred from its source.
    pub fn output(&mut self, name: &str) -> Result<JunctionId, ElabError> {
        self.declare(JunctionKind::Output, name, None, true)
    }

    pub fn output_typed(&mut self, name: &str, ty: Ty) -> Result<JunctionId, ElabError> {
        self.declare(JunctionKind::Output, name, Some(ty), true)
    }

    /// Declares an internal wire.
    pub fn wire(&mut self, name: &str) -> Result<JunctionId, ElabError> {
        self.declare(JunctionKind::Wire, name, None, true)
    }

    pub fn wire_typed(&mut self, name: &str, ty: Ty) -> Result<JunctionId, ElabError> {
        self.declare(JunctionKind::Wire, name, Some(ty), true)
    }

    pub fn ty(&self, junction: JunctionId) -> Option<Ty> {
        self.design.junctions[junction.index()].ty.clone()
    }

    /// Assigns a concrete type to an own, still-untyped junction. Used by
    /// leaf primitives to type their outputs from their inputs.
    pub fn set_ty(&mut self, junction: JunctionId, ty: Ty) -> Result<(), ElabError> {
        let entry = &self.design.junctions[junction.index()];
        assert_eq!(entry.owner, self.inst, "set_ty on a junction of another instance");
        match &entry.ty {
            None => {
                self.design.junctions[junction.index()].ty = Some(ty);
                self.design.realize_members(junction);
                Ok(())
            }
            Some(existing) if *existing == ty => Ok(()),
            Some(existing) => Err(ElabError::NoConversion {
                sink: self.design.junction_path(junction),
                from: ty.to_string(),
                to: existing.to_string(),
            }),
        }
    }

    /// Binds `sink` to be driven by `source`.
    ///
    /// Directionality is enforced here: inputs are bound from the
    /// instantiating scope, outputs and wires from inside their owning
    /// instance. A junction can have at most one source.
    pub fn bind(&mut self, sink: JunctionId, source: JunctionId) -> Result<(), ElabError> {
        let sink_entry = &self.design.junctions[sink.index()];
        let legal = match sink_entry.kind {
            JunctionKind::Input => {
                self.design.instances[sink_entry.owner.index()].parent == Some(self.inst)
            }
            JunctionKind::Output | JunctionKind::Wire => sink_entry.owner == self.inst,
        };
        if !legal {
            let reason = match sink_entry.kind {
                JunctionKind::Input => "an input is bound by the instantiating scope, not from inside its defining instance",
                JunctionKind::Output => "an output is bound from inside its defining instance, not from outside",
                JunctionKind::Wire => "a wire is bound only within its owning instance",
            };
            return Err(ElabError::BindDirection {
                junction: self.design.junction_path(sink),
                reason,
            });
        }
        if sink_entry.source.is_some() {
            return Err(ElabError::MultipleDrivers { junction: self.design.junction_path(sink) });
        }
        let source_ty = self.design.junctions[source.index()].ty.clone();
        let sink_ty = self.design.junctions[sink.index()].ty.clone();
        if let (Some(sink_ty), Some(source_ty)) = (&sink_ty, &source_ty) {
            if sink_ty != source_ty {
                return Err(ElabError::NoConversion {
                    sink: self.design.junction_path(sink),
                    from: source_ty.to_string(),
                    to: sink_ty.to_string(),
                });
            }
        }
        self.design.junctions[sink.index()].source = Some(source);
        self.design.junctions[source.index()].sinks.insert(sink);
        self.note_first_use(source);
        // Members of equally typed composites connect pairwise right away;
        // otherwise elaboration derives the member links once types land.
        let sink_members = self.design.junctions[sink.index()].members.clone();
        let source_members = self.design.junctions[source.index()].members.clone();
        if !sink_members.is_empty() && sink_members.len() == source_members.len() {
            for ((_, sink_member), (_, source_member)) in
                sink_members.into_iter().zip(source_members)
            {
                if self.design.junctions[sink_member.index()].source.is_none() {
                    self.design.junctions[sink_member.index()].source = Some(source_member);
                    self.design.junctions[source_member.index()].sinks.insert(sink_member);
                }
            }
        }
        Ok(())
    }

    /// Creates an implicitly named wire carrying `source`'s value, named
    /// after the source junction. Colliding implicit names are renamed
    /// silently by the naming pass.
    pub fn tap(&mut self, source: JunctionId) -> Result<JunctionId, ElabError> {
        let name = self.design.junctions[source.index()].name.clone();
        let wire = self.declare(JunctionKind::Wire, &name, None, false)?;
        self.bind(wire, source)?;
        Ok(wire)
    }

    /// Instantiates a sub-module, running its `construct` hook.
    pub fn add(
        &mut self,
        label: &str,
        module: impl ModuleImpl + 'static,
    ) -> Result<InstanceId, ElabError> {
        self.design.construct_instance(Some(self.inst), Some(label), Rc::new(module))
    }

    /// Looks up a port of a child instance by name.
    pub fn port(&self, child: InstanceId, name: &str) -> Result<JunctionId, ElabError> {
        self.design.port(child, name).ok_or_else(|| ElabError::NoSuchPort {
            instance: self.design.instance_path(child),
            name: name.to_owned(),
        })
    }

    /// Reads the default value of a junction's type, for convenience in
    /// bodies that need a literal.
    pub fn default_of(&self, junction: JunctionId) -> Option<Const> {
        self.ty(junction).map(|ty| ty.default_value())
    }

    fn note_first_use(&mut self, source: JunctionId) {
        let entry = &self.design.junctions[source.index()];
        if entry.kind != JunctionKind::Output {
            return;
        }
        let owner = entry.owner;
        if self.design.instances[owner.index()].parent != Some(self.inst) {
            return;
        }
        if self.design.instances[owner.index()].first_use.is_none() {
            let order = self.design.use_counter;
            self.design.use_counter += 1;
            self.design.instances[owner.index()].first_use = Some(order);
        }
    }
}
