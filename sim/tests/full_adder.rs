use weft_netlist::{Const, Design, ElabError, ModuleCtx, ModuleImpl, Ty};
use weft_prims::{Gate, GateOp};
use weft_sim::Simulator;

/// sum = a ^ b ^ cin, cout = (a & b) | (b & cin) | (cin & a), built from
/// two-input gates only.
struct FullAdder;

impl ModuleImpl for FullAdder {
    fn type_name(&self) -> &str {
        "full_adder"
    }

    fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
        ctx.input("a", Ty::bit())?;
        ctx.input("b", Ty::bit())?;
        ctx.input("cin", Ty::bit())?;
        ctx.output("sum")?;
        ctx.output("cout")?;
        Ok(())
    }

    fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
        let me = ctx.instance();
        let a = ctx.port(me, "a")?;
        let b = ctx.port(me, "b")?;
        let cin = ctx.port(me, "cin")?;

        let half = ctx.add("half", Gate::new(GateOp::Xor))?;
        ctx.bind(ctx.port(half, "a")?, a)?;
        ctx.bind(ctx.port(half, "b")?, b)?;
        let full = ctx.add("full", Gate::new(GateOp::Xor))?;
        ctx.bind(ctx.port(full, "a")?, ctx.port(half, "y")?)?;
        ctx.bind(ctx.port(full, "b")?, cin)?;
        ctx.bind(ctx.port(me, "sum")?, ctx.port(full, "y")?)?;

        let ab = ctx.add("ab", Gate::new(GateOp::And))?;
        ctx.bind(ctx.port(ab, "a")?, a)?;
        ctx.bind(ctx.port(ab, "b")?, b)?;
        let bc = ctx.add("bc", Gate::new(GateOp::And))?;
        ctx.bind(ctx.port(bc, "a")?, b)?;
        ctx.bind(ctx.port(bc, "b")?, cin)?;
        let ca = ctx.add("ca", Gate::new(GateOp::And))?;
        ctx.bind(ctx.port(ca, "a")?, cin)?;
        ctx.bind(ctx.port(ca, "b")?, a)?;
        let lo = ctx.add("lo", Gate::new(GateOp::Or))?;
        ctx.bind(ctx.port(lo, "a")?, ctx.port(ab, "y")?)?;
        ctx.bind(ctx.port(lo, "b")?, ctx.port(bc, "y")?)?;
        let hi = ctx.add("hi", Gate::new(GateOp::Or))?;
        ctx.bind(ctx.port(hi, "a")?, ctx.port(lo, "y")?)?;
        ctx.bind(ctx.port(hi, "b")?, ctx.port(ca, "y")?)?;
        ctx.bind(ctx.port(me, "cout")?, ctx.port(hi, "y")?)?;
        Ok(())
    }
}

#[test]
fn test_all_input_combinations() {
    let mut design = Design::new();
    let root = design.elaborate(FullAdder).unwrap();
    let a = design.port(root, "a").unwrap();
    let b = design.port(root, "b").unwrap();
    let cin = design.port(root, "cin").unwrap();
    let sum = design.port(root, "sum").unwrap();
    let cout = design.port(root, "cout").unwrap();

    let mut sim = Simulator::new(&design);
    for vector in 0u64..8 {
        let (va, vb, vc) = (vector & 1, vector >> 1 & 1, vector >> 2 & 1);
        sim.poke(a, Const::from_u64(va, 1)).unwrap();
        sim.poke(b, Const::from_u64(vb, 1)).unwrap();
        sim.poke(cin, Const::from_u64(vc, 1)).unwrap();
        sim.run(None).unwrap();
        assert_eq!(
            sim.peek(sum).as_u64(),
            Some(va ^ vb ^ vc),
            "sum mismatch for a={va} b={vb} cin={vc}"
        );
        assert_eq!(
            sim.peek(cout).as_u64(),
            Some((va & vb) | (vb & vc) | (vc & va)),
            "cout mismatch for a={va} b={vb} cin={vc}"
        );
    }
}

#[test]
fn test_single_combinational_rank_per_level() {
    let mut design = Design::new();
    let root = design.elaborate(FullAdder).unwrap();
    // Gates fed only by the root's inputs sit at rank 1; each further
    // level of logic is one rank up.
    let rank_of = |label: &str| {
        let child = design
            .instance(root)
            .children()
            .iter()
            .copied()
            .find(|&child| design.instance(child).name() == Some(label))
            .unwrap();
        design.instance(child).rank().unwrap()
    };
    assert_eq!(rank_of("half"), 1);
    assert_eq!(rank_of("ab"), 1);
    assert_eq!(rank_of("full"), 2);
    assert_eq!(rank_of("lo"), 2);
    assert_eq!(rank_of("hi"), 3);
}
