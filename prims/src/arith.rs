use weft_netlist::{
    Args, Assert, Design, ElabError, InstanceId, JunctionId, ModuleCtx, ModuleImpl, Process,
    SimScope, Suspension, Ty,
};

/// Adds a constant to its operand, wrapping at `width` bits. Any undefined
/// input bit makes the whole result undefined.
pub struct AddConst {
    width: usize,
    addend: u64,
}

impl AddConst {
    pub fn new(width: usize, addend: u64) -> AddConst {
        AddConst { width, addend }
    }
}

impl ModuleImpl for AddConst {
    fn type_name(&self) -> &str {
        "add_const"
    }

    fn args(&self) -> Args {
        Args::new().with("width", self.width).with("addend", self.addend)
    }

    fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
        ctx.input("a", Ty::bits(self.width))?;
        ctx.output_typed("y", Ty::bits(self.width))?;
        Ok(())
    }

    fn behavior(&self, design: &Design, instance: InstanceId) -> Option<Box<dyn Process>> {
        let a = design.port(instance, "a")?;
        let y = design.port(instance, "y")?;
        Some(Box::new(AddBehavior { addend: self.addend, a, y }))
    }
}

struct AddBehavior {
    addend: u64,
    a: JunctionId,
    y: JunctionId,
}

impl Process for AddBehavior {
    fn resume(&mut self, scope: &mut dyn SimScope) -> Result<Suspension, Assert> {
        let value = scope.value(self.a).add_u64(self.addend);
        scope.drive(self.y, value);
        Ok(Suspension::WaitOn(vec![self.a]))
    }
}
