use weft_netlist::{Assert, Const, JunctionId, Process, SimScope, Suspension};

/// A test stimulus: applies a timed sequence of values to junctions, then
/// terminates. Entries must be sorted by time; entries sharing a time are
/// applied in the same instant.
pub struct Stimulus {
    plan: Vec<(u64, JunctionId, Const)>,
    at: usize,
}

impl Stimulus {
    pub fn new(plan: Vec<(u64, JunctionId, Const)>) -> Stimulus {
        assert!(
            plan.windows(2).all(|pair| pair[0].0 <= pair[1].0),
            "stimulus plan must be sorted by time"
        );
        Stimulus { plan, at: 0 }
    }
}

impl Process for Stimulus {
    fn resume(&mut self, scope: &mut dyn SimScope) -> Result<Suspension, Assert> {
        let now = scope.now();
        while let Some((time, junction, value)) = self.plan.get(self.at) {
            if *time > now {
                return Ok(Suspension::Delay(*time - now));
            }
            scope.drive(*junction, value.clone());
            self.at += 1;
        }
        Ok(Suspension::Done)
    }
}
