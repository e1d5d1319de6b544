use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;

use argparse::{ArgumentParser, Store, StoreOption, StoreTrue};
use tracing_subscriber::prelude::*;
use weft_netlist::{Const, Design, ElabError, ModuleCtx, ModuleImpl, Ty};
use weft_prims::{AddConst, Dff, Gate, GateOp, Stimulus, Tick};
use weft_sim::{Simulator, VcdWaves, WaveOptions};

/// A 4-bit counter with a free-running clock and a synchronous reset held
/// low: the register's input is its own output plus one.
struct Counter;

impl ModuleImpl for Counter {
    fn type_name(&self) -> &str {
        "counter"
    }

    fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
        ctx.input("rst", Ty::bit())?;
        ctx.output("q")?;
        Ok(())
    }

    fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
        let me = ctx.instance();
        let clk = ctx.wire_typed("clk", Ty::bit())?;
        let tick = ctx.add("tick", Tick::new(5))?;
        ctx.bind(clk, ctx.port(tick, "clk")?)?;

        // clk and rst reach the register by auto-binding.
        let reg = ctx.add("state", Dff::new(4))?;
        let inc = ctx.add("inc", AddConst::new(4, 1))?;
        ctx.bind(ctx.port(inc, "a")?, ctx.port(reg, "q")?)?;
        ctx.bind(ctx.port(reg, "d")?, ctx.port(inc, "y")?)?;
        ctx.bind(ctx.port(me, "q")?, ctx.port(reg, "q")?)?;
        Ok(())
    }
}

/// A single-bit full adder built from two-input gates.
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

struct Options {
    demo: String,
    until: u64,
    output: Option<String>,
    filter: Option<String>,
    internal: bool,
}

fn simulate(options: &Options) -> Result<(), Box<dyn Error>> {
    let mut design = Design::new();
    let root = match options.demo.as_str() {
        "counter" => design.elaborate(Counter)?,
        "adder" => design.elaborate(FullAdder)?,
        other => return Err(format!("unknown demo design {other:?}").into()),
    };

    let mut sim = Simulator::new(&design);
    if let Some(path) = &options.output {
        let sink = BufWriter::new(File::create(path)?);
        let wave_options = WaveOptions {
            include_generated: options.internal,
            filter: options.filter.clone().map(|pattern| {
                Box::new(move |name: &str| name.contains(&pattern)) as Box<dyn Fn(&str) -> bool>
            }),
            ..WaveOptions::default()
        };
        sim.attach_waves(Box::new(VcdWaves::new(sink, &design, wave_options)?));
    }

    match options.demo.as_str() {
        "counter" => {
            let rst = design.port(root, "rst").ok_or("counter has no rst port")?;
            // Hold reset across the first rising edge, then count freely.
            let plan = vec![
                (0, rst, Const::from_u64(1, 1)),
                (9, rst, Const::zero(1)),
            ];
            sim.spawn(Box::new(Stimulus::new(plan)), "reset");
        }
        _ => {
            let a = design.port(root, "a").ok_or("adder has no a port")?;
            let b = design.port(root, "b").ok_or("adder has no b port")?;
            let cin = design.port(root, "cin").ok_or("adder has no cin port")?;
            // Sweep all eight input combinations, one every ten ticks.
            let mut plan = Vec::new();
            for vector in 0u64..8 {
                let time = vector * 10;
                plan.push((time, a, Const::from_u64(vector & 1, 1)));
                plan.push((time, b, Const::from_u64(vector >> 1 & 1, 1)));
                plan.push((time, cin, Const::from_u64(vector >> 2 & 1, 1)));
            }
            sim.spawn(Box::new(Stimulus::new(plan)), "sweep");
        }
    }

    sim.run(Some(options.until))?;
    let outputs: &[&str] = match options.demo.as_str() {
        "counter" => &["q"],
        _ => &["sum", "cout"],
    };
    for name in outputs {
        let port = design.port(root, name).ok_or("missing output port")?;
        println!("{} = {} at t={}", name, sim.peek(port), sim.now());
    }
    tracing::info!(until = options.until, "simulation finished");
    sim.finish();
    Ok(())
}

fn main() -> ExitCode {
    let mut options = Options {
        demo: "counter".to_owned(),
        until: 200,
        output: None,
        filter: None,
        internal: false,
    };
    {
        let mut ap = ArgumentParser::new();
        ap.set_description("Elaborate a built-in demo design and simulate it.");
        ap.refer(&mut options.demo).add_option(
            &["-d", "--design"],
            Store,
            "demo design to run: counter (default) or adder",
        );
        ap.refer(&mut options.until).add_option(
            &["-u", "--until"],
            Store,
            "simulation end time (default 200)",
        );
        ap.refer(&mut options.output).add_option(
            &["-o", "--output"],
            StoreOption,
            "write a VCD trace to this path",
        );
        ap.refer(&mut options.filter).add_option(
            &["--filter"],
            StoreOption,
            "trace only signals whose name contains this substring",
        );
        ap.refer(&mut options.internal).add_option(
            &["--internal"],
            StoreTrue,
            "trace auto-generated internal scopes too",
        );
        ap.parse_args_or_exit();
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_tree::HierarchicalLayer::new(2).with_targets(true))
        .init();

    match simulate(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}
