use weft_netlist::{
    Args, Assert, Const, Design, ElabError, InstanceId, JunctionId, ModuleCtx, ModuleImpl,
    Process, SimScope, Suspension, Trit, Ty,
};

/// A rising-edge D flip-flop with an optional synchronous reset to zero.
/// `clk` and `rst` are auto-discoverable by name in the instantiating
/// scope; `rst` may be left unconnected.
pub struct Dff {
    width: usize,
}

impl Dff {
    pub fn new(width: usize) -> Dff {
        Dff { width }
    }
}

impl ModuleImpl for Dff {
    fn type_name(&self) -> &str {
        "dff"
    }

    fn args(&self) -> Args {
        Args::new().with("width", self.width)
    }

    fn combinational(&self) -> bool {
        false
    }

    fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
        ctx.input_auto("clk")?;
        ctx.input_optional("rst")?;
        ctx.input("d", Ty::bits(self.width))?;
        ctx.output_typed("q", Ty::bits(self.width))?;
        Ok(())
    }

    fn behavior(&self, design: &Design, instance: InstanceId) -> Option<Box<dyn Process>> {
        let clk = design.port(instance, "clk")?;
        let d = design.port(instance, "d")?;
        let q = design.port(instance, "q")?;
        // An unconnected reset never joins a net; the register then simply
        // has no reset.
        let rst = design
            .port(instance, "rst")
            .filter(|&rst| design.junction(rst).xnet().is_some());
        Some(Box::new(DffBehavior { width: self.width, clk, rst, d, q, last_clk: Trit::Undef }))
    }
}

struct DffBehavior {
    width: usize,
    clk: JunctionId,
    rst: Option<JunctionId>,
    d: JunctionId,
    q: JunctionId,
    last_clk: Trit,
}

impl Process for DffBehavior {
    fn resume(&mut self, scope: &mut dyn SimScope) -> Result<Suspension, Assert> {
        let clk = scope.value(self.clk).lsb();
        let rising = self.last_clk == Trit::Zero && clk == Trit::One;
        self.last_clk = clk;
        if rising {
            let in_reset =
                self.rst.is_some_and(|rst| scope.value(rst).lsb() == Trit::One);
            let next = if in_reset {
                Const::zero(self.width)
            } else {
                scope.value(self.d).clone()
            };
            tracing::trace!("dff edge at {}: q <= {next}", scope.now());
            scope.drive(self.q, next);
        }
        Ok(Suspension::WaitOn(vec![self.clk]))
    }
}

/// A free-running clock source: toggles its output every `half_period`
/// time units, starting low, so rising edges land at odd multiples of
/// `half_period`.
pub struct Tick {
    half_period: u64,
}

impl Tick {
    pub fn new(half_period: u64) -> Tick {
        assert!(half_period > 0, "a clock cannot toggle every zero time units");
        Tick { half_period }
    }
}

impl ModuleImpl for Tick {
    fn type_name(&self) -> &str {
        "tick"
    }

    fn args(&self) -> Args {
        Args::new().with("half_period", self.half_period)
    }

    fn combinational(&self) -> bool {
        false
    }

    fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
        ctx.output_typed("clk", Ty::bit())?;
        Ok(())
    }

    fn behavior(&self, design: &Design, instance: InstanceId) -> Option<Box<dyn Process>> {
        let clk = design.port(instance, "clk")?;
        Some(Box::new(TickBehavior { half_period: self.half_period, clk, level: false }))
    }
}

struct TickBehavior {
    half_period: u64,
    clk: JunctionId,
    level: bool,
}

impl Process for TickBehavior {
    fn resume(&mut self, scope: &mut dyn SimScope) -> Result<Suspension, Assert> {
        scope.drive(self.clk, Const::from_u64(self.level as u64, 1));
        self.level = !self.level;
        Ok(Suspension::Delay(self.half_period))
    }
}
