//! Waveform capture. The simulator feeds every committed net change to a
//! [`Waves`] sink; [`VcdWaves`] renders them as a value-change dump keyed
//! by hierarchical scope and per-scope signal names.

use std::io;

use indexmap::IndexMap;
use vcd_ng::{IdCode, SimulationCommand, TimescaleUnit, Value, VecValue, Writer};
use weft_netlist::{Const, Design, InstanceId, Trit, XNetId};

pub trait Waves {
    /// Called once per committed value change, immediately.
    fn change(&mut self, time: u64, xnet: XNetId, value: &Const) -> io::Result<()>;

    /// Closes the trace at `time`.
    fn finish(&mut self, time: u64) -> io::Result<()>;
}

/// Knobs for [`VcdWaves`].
pub struct WaveOptions {
    pub timescale: (u32, TimescaleUnit),
    /// Descend into scopes whose names were auto-generated rather than
    /// given by the design author.
    pub include_generated: bool,
    /// Keeps only signals whose name matches; `None` keeps everything.
    pub filter: Option<Box<dyn Fn(&str) -> bool>>,
}

impl Default for WaveOptions {
    fn default() -> WaveOptions {
        WaveOptions { timescale: (1, TimescaleUnit::NS), include_generated: false, filter: None }
    }
}

fn to_vcd(trit: Trit) -> Value {
    match trit {
        Trit::Undef => Value::X,
        Trit::Zero => Value::V0,
        Trit::One => Value::V1,
    }
}

/// Writes a VCD trace. A net appears once per name per scope it traverses,
/// so aliases show up under every name they carry.
pub struct VcdWaves<W: io::Write> {
    writer: Writer<W>,
    vars: Vec<Vec<IdCode>>,
    last_time: Option<u64>,
}

impl<W: io::Write> VcdWaves<W> {
    /// Builds the VCD header from an elaborated design and dumps every
    /// signal's initial (default) value.
    pub fn new(sink: W, design: &Design, options: WaveOptions) -> io::Result<VcdWaves<W>> {
        let mut writer = Writer::new(sink);
        let (ratio, unit) = options.timescale;
        writer.timescale(ratio, unit)?;

        let mut by_scope: IndexMap<InstanceId, Vec<XNetId>> = IndexMap::new();
        for xnet in design.xnet_ids() {
            for (scope, _) in design.xnet(xnet).scopes() {
                by_scope.entry(scope).or_default().push(xnet);
            }
        }
        let mut vars = vec![Vec::new(); design.xnet_ids().count()];
        emit_scope(&mut writer, design, design.root(), &options, &by_scope, &mut vars)?;
        writer.enddefinitions()?;

        writer.begin(SimulationCommand::Dumpvars)?;
        let mut waves = VcdWaves { writer, vars, last_time: None };
        for xnet in design.xnet_ids() {
            if let Some(ty) = design.xnet(xnet).ty() {
                waves.emit(xnet, &ty.default_value())?;
            }
        }
        Ok(waves)
    }

    fn emit(&mut self, xnet: XNetId, value: &Const) -> io::Result<()> {
        if self.vars[xnet.index()].is_empty() {
            return Ok(());
        }
        if value.len() == 1 {
            for &id in &self.vars[xnet.index()] {
                self.writer.change_scalar(id, to_vcd(value.lsb()))?;
            }
        } else {
            // VCD wants the most significant bit first.
            let mut bits = VecValue::new();
            for trit in value.iter().rev() {
                bits.push(to_vcd(trit));
            }
            for &id in &self.vars[xnet.index()] {
                self.writer.change_vector(id, &bits)?;
            }
        }
        Ok(())
    }
}

fn emit_scope<W: io::Write>(
    writer: &mut Writer<W>,
    design: &Design,
    scope: InstanceId,
    options: &WaveOptions,
    by_scope: &IndexMap<InstanceId, Vec<XNetId>>,
    vars: &mut Vec<Vec<IdCode>>,
) -> io::Result<()> {
    let instance = design.instance(scope);
    let scope_name = instance.name().unwrap_or_else(|| instance.imp().type_name());
    writer.add_module(scope_name)?;
    for &xnet in by_scope.get(&scope).map(Vec::as_slice).unwrap_or(&[]) {
        let width = design.xnet(xnet).ty().map(|ty| ty.width()).unwrap_or(1);
        for name in design.xnet(xnet).names_in(scope) {
            if options.filter.as_ref().is_some_and(|keep| !keep(name.name())) {
                continue;
            }
            vars[xnet.index()].push(writer.add_wire(width as u32, name.name())?);
        }
    }
    for &child in instance.children() {
        if design.instance(child).name_generated() && !options.include_generated {
            continue;
        }
        emit_scope(writer, design, child, options, by_scope, vars)?;
    }
    writer.upscope()
}

impl<W: io::Write> Waves for VcdWaves<W> {
    fn change(&mut self, time: u64, xnet: XNetId, value: &Const) -> io::Result<()> {
        if self.last_time != Some(time) {
            self.writer.timestamp(time)?;
            self.last_time = Some(time);
        }
        self.emit(xnet, value)
    }

    fn finish(&mut self, time: u64) -> io::Result<()> {
        // The underlying sink flushes when the writer is dropped.
        if self.last_time != Some(time) {
            self.writer.timestamp(time)?;
            self.last_time = Some(time);
        }
        Ok(())
    }
}
