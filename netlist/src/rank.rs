//! Rank assignment: levels the instance dependency graph so the simulator
//! can reactivate processes in a single rank-ordered pass per delta.
//!
//! Sequential instances always get rank 0; a combinational instance ranks
//! one above its highest-ranked combinational predecessor. A revisit on
//! the DFS path is a combinational loop and is reported with the chain of
//! net names that closes it.

use crate::{Design, ElabError, InstanceId, XNetId};

impl Design {
    pub(crate) fn assign_ranks(&mut self) -> Result<(), ElabError> {
        for instance in self.instance_ids() {
            let mut path = Vec::new();
            self.rank_of(instance, &mut path)?;
        }
        for instance in self.instance_ids() {
            assert!(
                self.instances[instance.index()].rank.is_some(),
                "{} was not ranked",
                self.instance_path(instance)
            );
        }
        Ok(())
    }

    fn rank_of(
        &mut self,
        instance: InstanceId,
        path: &mut Vec<(InstanceId, XNetId)>,
    ) -> Result<u32, ElabError> {
        if let Some(rank) = self.instances[instance.index()].rank {
            return Ok(rank);
        }
        if let Some(position) = path.iter().position(|&(on_path, _)| on_path == instance) {
            let chain = path[position..]
                .iter()
                .map(|&(_, xnet)| self.xnet_path(xnet))
                .collect();
            return Err(ElabError::CombLoop { chain });
        }
        if !self.instances[instance.index()].imp.combinational() {
            self.instances[instance.index()].rank = Some(0);
            return Ok(0);
        }
        let mut rank = 0;
        for leaf in self.input_leaves(instance) {
            let Some(xnet) = self.junctions[leaf.index()].xnet else { continue };
            let Some(source) = self.xnets[xnet.index()].source else { continue };
            let owner = self.junctions[source.index()].owner;
            if owner == instance {
                continue;
            }
            path.push((instance, xnet));
            let predecessor = self.rank_of(owner, path)?;
            path.pop();
            rank = rank.max(predecessor + 1);
        }
        tracing::trace!("{} gets rank {rank}", self.instance_path(instance));
        self.instances[instance.index()].rank = Some(rank);
        Ok(rank)
    }
}

#[cfg(test)]
mod test {
    use crate::{Design, ElabError, ModuleCtx, ModuleImpl, Ty};

    struct Comb;

    impl ModuleImpl for Comb {
        fn type_name(&self) -> &str {
            "comb"
        }

        fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.input("a", Ty::bit())?;
            ctx.output_typed("y", Ty::bit())?;
            Ok(())
        }
    }

    struct Seq;

    impl ModuleImpl for Seq {
        fn type_name(&self) -> &str {
            "seq"
        }

        fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.input("d", Ty::bit())?;
            ctx.output_typed("q", Ty::bit())?;
            Ok(())
        }

        fn combinational(&self) -> bool {
            false
        }
    }

    struct CombChain;

    impl ModuleImpl for CombChain {
        fn type_name(&self) -> &str {
            "comb_chain"
        }

        fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.input("a", Ty::bit())?;
            Ok(())
        }

        fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            let a = ctx.port(ctx.instance(), "a")?;
            let first = ctx.add("first", Comb)?;
            let second = ctx.add("second", Comb)?;
            let third = ctx.add("third", Comb)?;
            ctx.bind(ctx.port(first, "a")?, a)?;
            ctx.bind(ctx.port(second, "a")?, ctx.port(first, "y")?)?;
            ctx.bind(ctx.port(third, "a")?, ctx.port(second, "y")?)?;
            Ok(())
        }
    }

    #[test]
    fn test_rank_monotonicity() {
        let mut design = Design::new();
        let root = design.elaborate(CombChain).unwrap();
        let ranks: Vec<_> = design
            .instance(root)
            .children()
            .iter()
            .map(|&child| design.instance(child).rank().unwrap())
            .collect();
        assert!(ranks.windows(2).all(|pair| pair[1] > pair[0]), "ranks {ranks:?}");
        for instance in design.instance_ids() {
            assert!(design.instance(instance).rank().is_some());
        }
    }

    struct CombCycle;

    impl ModuleImpl for CombCycle {
        fn type_name(&self) -> &str {
            "comb_cycle"
        }

        fn construct(&self, _ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            Ok(())
        }

        fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            let fwd = ctx.add("fwd", Comb)?;
            let back = ctx.add("back", Comb)?;
            ctx.bind(ctx.port(back, "a")?, ctx.port(fwd, "y")?)?;
            ctx.bind(ctx.port(fwd, "a")?, ctx.port(back, "y")?)?;
            Ok(())
        }
    }

    #[test]
    fn test_combinational_loop_detected() {
        let mut design = Design::new();
        match design.elaborate(CombCycle) {
            Err(ElabError::CombLoop { chain }) => {
                assert_eq!(chain.len(), 2);
                assert_ne!(chain[0], chain[1]);
            }
            other => panic!("expected CombLoop, got {other:?}"),
        }
    }

    struct RegisteredLoop;

    impl ModuleImpl for RegisteredLoop {
        fn type_name(&self) -> &str {
            "registered_loop"
        }

        fn construct(&self, _ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            Ok(())
        }

        fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            // The same topology as CombCycle, but a register breaks it.
            let next = ctx.add("next", Comb)?;
            let state = ctx.add("state", Seq)?;
            ctx.bind(ctx.port(state, "d")?, ctx.port(next, "y")?)?;
            ctx.bind(ctx.port(next, "a")?, ctx.port(state, "q")?)?;
            Ok(())
        }
    }

    #[test]
    fn test_register_breaks_loop() {
        let mut design = Design::new();
        let root = design.elaborate(RegisteredLoop).unwrap();
        let next = design.instance(root).children()[0];
        let state = design.instance(root).children()[1];
        assert_eq!(design.instance(state).rank(), Some(0));
        assert_eq!(design.instance(next).rank(), Some(1));
    }
}
