//! The discrete-event engine: dequeues instants from the timeline, commits
//! value changes, and reactivates processes strictly by increasing rank,
//! iterating deltas within the instant until no new work appears.

use std::collections::BTreeMap;
use std::{fmt, io, mem};

use indexmap::{IndexMap, IndexSet};
use weft_netlist::{Const, Design, JunctionId, ProcessId, Process, SimScope, Suspension, XNetId};

use crate::event::Event;
use crate::wave::Waves;

#[derive(Debug)]
pub enum SimError {
    /// A correctness check inside a behavior failed; the run stops here.
    Assert { time: u64, delta: u32, message: String },
    /// A poked value does not fit the net's type.
    BadValue { junction: String, detail: String },
    /// The waveform sink failed mid-run.
    Wave(io::Error),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimError::Assert { time, delta, message } => {
                write!(f, "assertion failed at time {time} delta {delta}: {message}")
            }
            SimError::BadValue { junction, detail } => {
                write!(f, "cannot drive {junction}: {detail}")
            }
            SimError::Wave(error) => write!(f, "waveform write failed: {error}"),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::Wave(error) => Some(error),
            _ => None,
        }
    }
}

/// The mutable value record each XNet carries for the simulation lifetime.
struct NetState {
    current: Const,
    previous: Const,
    changed_at: (u64, u32),
    listeners: IndexSet<ProcessId>,
}

struct Slot {
    process: Option<Box<dyn Process>>,
    rank: u32,
    label: String,
    /// Nets the process is currently subscribed to. A wakeup consumes the
    /// whole subscription, not just the entry on the net that changed.
    watching: Vec<XNetId>,
}

pub struct Simulator<'a> {
    design: &'a Design,
    states: Vec<NetState>,
    procs: Vec<Slot>,
    timeline: BTreeMap<u64, Event>,
    pending: IndexMap<XNetId, Const>,
    waves: Option<Box<dyn Waves>>,
    now: u64,
    delta: u32,
}

impl<'a> Simulator<'a> {
    /// Prepares a fully elaborated design for simulation: one value state
    /// per net, one process per instance with a behavior, and an initial
    /// reactivation of every process at time zero.
    pub fn new(design: &'a Design) -> Simulator<'a> {
        let states = design
            .xnet_ids()
            .map(|xnet| {
                let ty = design.xnet(xnet).ty().expect("every XNet carries a type");
                NetState {
                    current: ty.default_value(),
                    previous: ty.default_value(),
                    changed_at: (0, 0),
                    listeners: IndexSet::new(),
                }
            })
            .collect();
        let mut sim = Simulator {
            design,
            states,
            procs: Vec::new(),
            timeline: BTreeMap::new(),
            pending: IndexMap::new(),
            waves: None,
            now: 0,
            delta: 0,
        };
        for instance in design.instance_ids() {
            let imp = design.instance(instance).imp().clone();
            if let Some(process) = imp.behavior(design, instance) {
                let rank = design.instance(instance).rank().expect("unranked instance");
                sim.register(process, rank, design.instance_path(instance));
            }
        }
        sim
    }

    pub fn attach_waves(&mut self, waves: Box<dyn Waves>) {
        self.waves = Some(waves);
    }

    /// Adds a free-standing process (a stimulus or checker) at rank 0,
    /// with an initial reactivation at the current time.
    pub fn spawn(&mut self, process: Box<dyn Process>, label: &str) -> ProcessId {
        self.register(process, 0, label.to_owned())
    }

    fn register(&mut self, process: Box<dyn Process>, rank: u32, label: String) -> ProcessId {
        let pid = ProcessId::from_index(self.procs.len());
        self.procs.push(Slot { process: Some(process), rank, label, watching: Vec::new() });
        self.timeline
            .entry(self.now)
            .or_default()
            .wake
            .entry(rank)
            .or_default()
            .insert(pid);
        pid
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    /// Reads the last committed value of the net behind `junction`.
    pub fn peek(&self, junction: JunctionId) -> &Const {
        &self.states[self.net_of(junction).index()].current
    }

    /// The (time, delta) stamp of the last committed change of the net
    /// behind `junction`.
    pub fn last_change(&self, junction: JunctionId) -> (u64, u32) {
        self.states[self.net_of(junction).index()].changed_at
    }

    /// Schedules a value onto a net at the current instant, through the
    /// ordinary commit path: listeners wake, waveforms record.
    pub fn poke(&mut self, junction: JunctionId, value: Const) -> Result<(), SimError> {
        let xnet = self.net_of(junction);
        let ty = self.design.xnet(xnet).ty().expect("every XNet carries a type");
        let value = ty.normalize(value).map_err(|error| SimError::BadValue {
            junction: self.design.junction_path(junction),
            detail: error.to_string(),
        })?;
        self.timeline.entry(self.now).or_default().changes.insert(xnet, value);
        Ok(())
    }

    fn net_of(&self, junction: JunctionId) -> XNetId {
        match self.design.junction(junction).xnet() {
            Some(xnet) => xnet,
            None => panic!(
                "junction {} belongs to no net",
                self.design.junction_path(junction)
            ),
        }
    }

    /// Processes events in time order until the timeline is drained or an
    /// event past `until` is reached. Stopping at the bound is clean;
    /// whatever remains scheduled is simply not processed.
    pub fn run(&mut self, until: Option<u64>) -> Result<(), SimError> {
        while let Some((&time, _)) = self.timeline.first_key_value() {
            if until.is_some_and(|end| time > end) {
                break;
            }
            let event = self.timeline.remove(&time).expect("peeked event vanished");
            debug_assert!(time >= self.now, "timeline went backwards");
            self.now = time;
            self.run_instant(event)?;
        }
        if let Some(end) = until {
            self.now = self.now.max(end);
        }
        Ok(())
    }

    /// Runs one instant to a fixed point of deltas.
    fn run_instant(&mut self, event: Event) -> Result<(), SimError> {
        self.delta = 0;
        let mut wake = event.wake;
        // Changes scheduled for this instant commit before anything runs,
        // so every process reactivated in delta 0 observes them.
        for (xnet, value) in event.changes {
            for pid in self.commit(xnet, value)? {
                wake.entry(self.procs[pid.index()].rank).or_default().insert(pid);
            }
        }
        loop {
            if wake.is_empty() {
                break;
            }
            tracing::trace!("time {} delta {}: {} rank buckets", self.now, self.delta, wake.len());

            // Reactivations deferred to the next delta: wakes that landed
            // at or below a rank this delta has already passed.
            let mut deferred: BTreeMap<u32, IndexSet<ProcessId>> = BTreeMap::new();
            while let Some((&rank, _)) = wake.first_key_value() {
                let batch = wake.remove(&rank).expect("peeked bucket vanished");
                for pid in batch {
                    match self.reactivate(pid)? {
                        None => (),
                        Some(Suspension::Delay(0)) => {
                            deferred.entry(rank).or_default().insert(pid);
                        }
                        Some(Suspension::Delay(delay)) => {
                            self.timeline
                                .entry(self.now + delay)
                                .or_default()
                                .wake
                                .entry(rank)
                                .or_default()
                                .insert(pid);
                        }
                        Some(Suspension::WaitOn(junctions)) => {
                            for junction in junctions {
                                let xnet = self.net_of(junction);
                                self.states[xnet.index()].listeners.insert(pid);
                                self.procs[pid.index()].watching.push(xnet);
                            }
                        }
                        Some(Suspension::Done) => unreachable!(),
                    }
                }
                // Whatever this rank produced commits before the next rank
                // runs; listeners at higher ranks join the current delta,
                // anything else waits for the next one.
                for (xnet, value) in mem::take(&mut self.pending) {
                    for pid in self.commit(xnet, value)? {
                        let listener = self.procs[pid.index()].rank;
                        if listener > rank {
                            wake.entry(listener).or_default().insert(pid);
                        } else {
                            deferred.entry(listener).or_default().insert(pid);
                        }
                    }
                }
            }

            if deferred.is_empty() {
                break;
            }
            wake = deferred;
            self.delta += 1;
        }
        Ok(())
    }

    /// Resumes one process. `None` means it terminated; `Done` is folded
    /// into `None` so callers see termination one way.
    fn reactivate(&mut self, pid: ProcessId) -> Result<Option<Suspension>, SimError> {
        let Some(mut process) = self.procs[pid.index()].process.take() else {
            return Ok(None);
        };
        match process.resume(self) {
            Ok(Suspension::Done) => {
                tracing::trace!("{} is done", self.procs[pid.index()].label);
                Ok(None)
            }
            Ok(suspension) => {
                self.procs[pid.index()].process = Some(process);
                Ok(Some(suspension))
            }
            Err(assert) => Err(SimError::Assert {
                time: self.now,
                delta: self.delta,
                message: assert.message,
            }),
        }
    }

    /// Commits one value onto a net. A semantically unchanged value is
    /// dropped without waking anyone. Returns the listeners consumed by
    /// the change.
    fn commit(&mut self, xnet: XNetId, value: Const) -> Result<IndexSet<ProcessId>, SimError> {
        let ty = self.design.xnet(xnet).ty().expect("every XNet carries a type");
        let state = &mut self.states[xnet.index()];
        assert_eq!(value.len(), ty.width(), "driven value has the wrong width");
        if !ty.is_different(&state.current, &value) {
            return Ok(IndexSet::new());
        }
        state.previous = mem::replace(&mut state.current, value);
        state.changed_at = (self.now, self.delta);
        let listeners = mem::take(&mut state.listeners);
        // Waking a process consumes its entire subscription: it must not
        // fire again off a sibling net it was also watching.
        for &pid in &listeners {
            for watched in mem::take(&mut self.procs[pid.index()].watching) {
                self.states[watched.index()].listeners.shift_remove(&pid);
            }
        }
        tracing::trace!(
            "{} <- {} at {}+{}",
            self.design.xnet_path(xnet),
            self.states[xnet.index()].current,
            self.now,
            self.delta
        );
        if let Some(waves) = &mut self.waves {
            let (now, current) = (self.now, &self.states[xnet.index()].current);
            waves.change(now, xnet, current).map_err(SimError::Wave)?;
        }
        Ok(listeners)
    }

    /// Tears the run down: flushes the last known value of every net into
    /// the waveform trace. Flush failures are swallowed so teardown always
    /// completes and a partial trace stays inspectable.
    pub fn finish(mut self) {
        let Some(mut waves) = self.waves.take() else { return };
        for xnet in self.design.xnet_ids() {
            let _ = waves.change(self.now, xnet, &self.states[xnet.index()].current);
        }
        let _ = waves.finish(self.now);
    }
}

impl SimScope for Simulator<'_> {
    fn now(&self) -> u64 {
        self.now
    }

    fn delta(&self) -> u32 {
        self.delta
    }

    fn value(&self, junction: JunctionId) -> &Const {
        self.peek(junction)
    }

    fn drive(&mut self, junction: JunctionId, value: Const) {
        self.pending.insert(self.net_of(junction), value);
    }
}
