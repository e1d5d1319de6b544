use weft_netlist::{
    Args, Assert, Design, ElabError, InstanceId, JunctionId, ModuleCtx, ModuleImpl, Process,
    SimScope, Suspension,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOp {
    And,
    Or,
    Xor,
    Not,
}

impl GateOp {
    fn name(self) -> &'static str {
        match self {
            GateOp::And => "and",
            GateOp::Or => "or",
            GateOp::Xor => "xor",
            GateOp::Not => "not",
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            GateOp::And => "&",
            GateOp::Or => "|",
            GateOp::Xor => "^",
            GateOp::Not => "~",
        }
    }

    fn is_unary(self) -> bool {
        self == GateOp::Not
    }
}

/// A bitwise gate over one or two equally wide operands. The width is
/// inferred from whatever drives `a`.
pub struct Gate {
    op: GateOp,
}

impl Gate {
    pub fn new(op: GateOp) -> Gate {
        Gate { op }
    }
}

impl ModuleImpl for Gate {
    fn type_name(&self) -> &str {
        self.op.name()
    }

    fn args(&self) -> Args {
        Args::new().with("op", self.op.name())
    }

    fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
        ctx.input_infer("a")?;
        if !self.op.is_unary() {
            ctx.input_infer("b")?;
        }
        ctx.output("y")?;
        Ok(())
    }

    fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
        let a = ctx.port(ctx.instance(), "a")?;
        let y = ctx.port(ctx.instance(), "y")?;
        if let Some(ty) = ctx.ty(a) {
            ctx.set_ty(y, ty)?;
        }
        if !self.op.is_unary() {
            let b = ctx.port(ctx.instance(), "b")?;
            if let Some(ty) = ctx.ty(a) {
                // Both operands must agree; report at the second operand.
                ctx.set_ty(b, ty)?;
            }
        }
        Ok(())
    }

    fn behavior(&self, design: &Design, instance: InstanceId) -> Option<Box<dyn Process>> {
        let a = design.port(instance, "a")?;
        let b = if self.op.is_unary() { None } else { Some(design.port(instance, "b")?) };
        let y = design.port(instance, "y")?;
        Some(Box::new(GateBehavior { op: self.op, a, b, y }))
    }

    fn inline_expr(&self, design: &Design, instance: InstanceId) -> Option<String> {
        let parent = design.instance(instance).parent()?;
        let name_of = |port: &str| {
            let junction = design.port(instance, port)?;
            let xnet = design.junction(junction).xnet()?;
            design.xnet(xnet).best_name(parent).map(str::to_owned)
        };
        let a = name_of("a")?;
        if self.op.is_unary() {
            Some(format!("{}{a}", self.op.symbol()))
        } else {
            Some(format!("{a} {} {}", self.op.symbol(), name_of("b")?))
        }
    }
}

struct GateBehavior {
    op: GateOp,
    a: JunctionId,
    b: Option<JunctionId>,
    y: JunctionId,
}

impl Process for GateBehavior {
    fn resume(&mut self, scope: &mut dyn SimScope) -> Result<Suspension, Assert> {
        let value = match (self.op, self.b) {
            (GateOp::Not, _) => scope.value(self.a).not(),
            (op, Some(b)) => {
                let lhs = scope.value(self.a);
                let rhs = scope.value(b);
                match op {
                    GateOp::And => lhs.and(rhs),
                    GateOp::Or => lhs.or(rhs),
                    GateOp::Xor => lhs.xor(rhs),
                    GateOp::Not => unreachable!(),
                }
            }
            (op, None) => panic!("binary {} gate lost its second operand", op.name()),
        };
        scope.drive(self.y, value);
        let mut wait = vec![self.a];
        wait.extend(self.b);
        Ok(Suspension::WaitOn(wait))
    }
}
