//! Schedule validation and the resolved execution plan.
//!
//! [`Plan::build`] turns a name-keyed [`ScheduleSpec`] into per-stage
//! decisions indexed by [`StageId`], rejecting every schedule that could make
//! a materialized stage unavailable where it is read.
use crate::error::{PipelineError, Result};
use crate::graph::{StageGraph, StageId};
use crate::schedule::{ComputeAt, ParallelDim, ScheduleSpec, TileSize};

/// Resolved placement of one stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compute {
    Input,
    Inline,
    Root,
    Tiled { consumer: StageId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagePlan {
    pub compute: Compute,
    /// Tile size used when this stage is the consumer of tiled producers.
    pub tile: Option<TileSize>,
    pub parallel: Option<ParallelDim>,
    /// Lanes per chunk; 1 means scalar.
    pub vector_width: usize,
}

#[derive(Clone, Debug)]
pub struct Plan {
    pub stages: Vec<StagePlan>,
    pub output: StageId,
    /// Root stages in topological order.
    pub root_order: Vec<StageId>,
    /// For each entry of `root_order`, root buffers no longer needed after it.
    pub release_after: Vec<Vec<StageId>>,
}

impl Plan {
    pub fn build(graph: &StageGraph, spec: &ScheduleSpec) -> Result<Self> {
        let output = graph
            .output()
            .ok_or_else(|| PipelineError::Graph("graph has no output stage".into()))?;

        let mut stages: Vec<StagePlan> = graph
            .stages()
            .map(|(_, s)| StagePlan {
                compute: if s.is_input() {
                    Compute::Input
                } else {
                    Compute::Inline
                },
                tile: None,
                parallel: None,
                vector_width: 1,
            })
            .collect();
        stages[output.index()].compute = Compute::Root;

        // First pass: names, sizes and root/inline placement.
        for (name, sched) in spec.iter() {
            let id = graph
                .id(name)
                .ok_or_else(|| PipelineError::schedule(name, "unknown stage"))?;
            if graph.stage(id).is_input() {
                return Err(PipelineError::schedule(name, "input stages cannot be scheduled"));
            }
            if id == output && sched.compute != ComputeAt::Root {
                return Err(PipelineError::schedule(
                    name,
                    "the output stage must be computed at root",
                ));
            }
            if let Some(w) = sched.vector_width {
                if w == 0 {
                    return Err(PipelineError::schedule(name, "vector width must be positive"));
                }
                stages[id.index()].vector_width = w;
            }
            stages[id.index()].parallel = sched.parallel;
            match sched.compute {
                ComputeAt::Inline => stages[id.index()].compute = Compute::Inline,
                ComputeAt::Root => stages[id.index()].compute = Compute::Root,
                ComputeAt::TiledAt { .. } => {}
            }
        }

        // Second pass: tiled placement, which depends on the consumer's placement.
        for (name, sched) in spec.iter() {
            let ComputeAt::TiledAt { consumer, tile } = &sched.compute else {
                continue;
            };
            let id = graph
                .id(name)
                .ok_or_else(|| PipelineError::schedule(name, "unknown stage"))?;
            let cid = graph.id(consumer).ok_or_else(|| {
                PipelineError::schedule(name, format!("unknown consumer `{consumer}`"))
            })?;
            if tile.width <= 0 || tile.height <= 0 {
                return Err(PipelineError::schedule(
                    name,
                    format!("tile size {}x{} must be positive", tile.width, tile.height),
                ));
            }
            if !graph.depends_on(cid, id) {
                return Err(PipelineError::schedule(
                    name,
                    format!("`{consumer}` does not consume it"),
                ));
            }
            if let Some(spec_c) = spec.get(consumer) {
                if spec_c.compute == ComputeAt::Inline {
                    return Err(PipelineError::schedule(
                        name,
                        format!("consumer `{consumer}` is computed inline"),
                    ));
                }
            } else if cid != output {
                return Err(PipelineError::schedule(
                    name,
                    format!("consumer `{consumer}` is computed inline"),
                ));
            }
            match stages[cid.index()].tile {
                Some(prev) if prev != *tile => {
                    return Err(PipelineError::schedule(
                        name,
                        format!(
                            "tile {}x{} conflicts with {}x{} already set at `{consumer}`",
                            tile.width, tile.height, prev.width, prev.height
                        ),
                    ));
                }
                _ => stages[cid.index()].tile = Some(*tile),
            }
            stages[id.index()].compute = Compute::Tiled { consumer: cid };
        }

        let plan_stages = stages;
        let mut plan = Plan {
            stages: plan_stages,
            output,
            root_order: Vec::new(),
            release_after: Vec::new(),
        };
        plan.check_scopes(graph)?;
        plan.order_roots(graph);
        for (id, stage) in graph.stages() {
            let sp = &plan.stages[id.index()];
            if sp.compute == Compute::Inline && (sp.parallel.is_some() || sp.vector_width > 1) {
                log::debug!(
                    "stage `{}` is inline; its parallel/vector settings have no effect",
                    stage.name()
                );
            }
        }
        log::debug!(
            "plan: {} root stages, {} tiled stages",
            plan.root_order.len(),
            plan.stages
                .iter()
                .filter(|s| matches!(s.compute, Compute::Tiled { .. }))
                .count()
        );
        Ok(plan)
    }

    pub fn compute(&self, id: StageId) -> Compute {
        self.stages[id.index()].compute
    }

    /// Stages that own a buffer: root and tiled.
    pub fn is_materialized(&self, id: StageId) -> bool {
        matches!(self.compute(id), Compute::Root | Compute::Tiled { .. })
    }

    /// Whether demand flows through `id` while computing a tile of `consumer`.
    pub fn in_scope_of(&self, consumer: StageId, id: StageId) -> bool {
        match self.compute(id) {
            Compute::Inline => true,
            Compute::Tiled { consumer: c } => c == consumer,
            _ => id == consumer,
        }
    }

    /// Stages evaluated while computing one tile of `consumer`.
    fn scope(&self, graph: &StageGraph, consumer: StageId) -> Vec<bool> {
        let mut reach = vec![false; graph.len()];
        let mut scope = vec![false; graph.len()];
        reach[consumer.index()] = true;
        for id in graph.ids().rev() {
            if !reach[id.index()] || !self.in_scope_of(consumer, id) {
                continue;
            }
            scope[id.index()] = true;
            for a in graph.stage(id).accesses() {
                reach[a.producer.index()] = true;
            }
        }
        scope
    }

    /// A tiled stage only exists inside tiles of its consumer, so nothing
    /// evaluated outside that scope may read it.
    fn check_scopes(&self, graph: &StageGraph) -> Result<()> {
        for (tid, tstage) in graph.stages() {
            let Compute::Tiled { consumer } = self.compute(tid) else {
                continue;
            };
            let scope = self.scope(graph, consumer);
            if !scope[tid.index()] {
                return Err(PipelineError::schedule(
                    tstage.name(),
                    format!(
                        "not reachable from `{}` through inline or co-tiled stages",
                        graph.stage(consumer).name()
                    ),
                ));
            }
            // Stages whose inline evaluation ends up reading `tid`.
            let mut reads_tiled = vec![false; graph.len()];
            reads_tiled[tid.index()] = true;
            for id in graph.ids() {
                if id <= tid {
                    continue;
                }
                let hit = graph
                    .stage(id)
                    .accesses()
                    .iter()
                    .any(|a| reads_tiled[a.producer.index()]);
                if !hit {
                    continue;
                }
                if self.compute(id) == Compute::Inline {
                    reads_tiled[id.index()] = true;
                } else if !scope[id.index()] {
                    return Err(PipelineError::schedule(
                        tstage.name(),
                        format!(
                            "read by `{}` outside the scope of `{}`",
                            graph.stage(id).name(),
                            graph.stage(consumer).name()
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Root order plus buffer lifetimes. A root buffer is released once the
    /// last root realization that can read it (directly, through inline
    /// stages or from inside its tiles) has finished.
    fn order_roots(&mut self, graph: &StageGraph) {
        let n = graph.len();
        let mut owner: Vec<Option<StageId>> = vec![None; n];
        for id in graph.ids().rev() {
            owner[id.index()] = match self.compute(id) {
                Compute::Root => Some(id),
                Compute::Tiled { consumer } => owner[consumer.index()],
                Compute::Inline => graph
                    .consumers(id)
                    .into_iter()
                    .filter_map(|c| owner[c.index()])
                    .max(),
                Compute::Input => None,
            };
        }

        self.root_order = graph
            .ids()
            .filter(|&id| self.compute(id) == Compute::Root)
            .collect();
        self.release_after = vec![Vec::new(); self.root_order.len()];
        for (pos, &rid) in self.root_order.iter().enumerate() {
            if rid == self.output {
                continue;
            }
            let last = graph
                .consumers(rid)
                .into_iter()
                .filter_map(|c| owner[c.index()])
                .max();
            let at = match last {
                Some(last) => self
                    .root_order
                    .iter()
                    .position(|&r| r == last)
                    .unwrap_or(pos),
                None => pos,
            };
            self.release_after[at].push(rid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryPolicy;
    use crate::buffer::{ElemType, Span};
    use crate::graph::FuncDef;
    use crate::schedule::StageSchedule;

    /// in -> a -> b -> out, plus side reading a.
    fn graph() -> StageGraph {
        let mut g = StageGraph::new();
        let input = g
            .input("in", ElemType::U8, 1, BoundaryPolicy::ClampToEdge)
            .unwrap();
        let a = g
            .add(
                FuncDef::new("a", ElemType::U16)
                    .reads(input, Span::radius(1), Span::ZERO)
                    .pure(|_, _| 0.0),
            )
            .unwrap();
        let b = g
            .add(
                FuncDef::new("b", ElemType::U16)
                    .reads(a, Span::ZERO, Span::radius(1))
                    .pure(|_, _| 0.0),
            )
            .unwrap();
        let side = g
            .add(
                FuncDef::new("side", ElemType::U16)
                    .reads(a, Span::ZERO, Span::ZERO)
                    .pure(|_, _| 0.0),
            )
            .unwrap();
        let out = g
            .add(
                FuncDef::new("out", ElemType::U8)
                    .reads(b, Span::ZERO, Span::ZERO)
                    .reads(side, Span::ZERO, Span::ZERO)
                    .pure(|_, _| 0.0),
            )
            .unwrap();
        g.set_output(out).unwrap();
        g
    }

    fn schedule_error(spec: ScheduleSpec) -> String {
        match Plan::build(&graph(), &spec) {
            Err(PipelineError::Schedule { reason, .. }) => reason,
            other => panic!("expected a schedule error, got {other:?}"),
        }
    }

    #[test]
    fn defaults_are_inline_with_root_output() {
        let g = graph();
        let plan = Plan::build(&g, &ScheduleSpec::new()).unwrap();
        assert_eq!(plan.compute(g.id("a").unwrap()), Compute::Inline);
        assert_eq!(plan.compute(g.id("out").unwrap()), Compute::Root);
        assert_eq!(plan.compute(g.id("in").unwrap()), Compute::Input);
        assert_eq!(plan.root_order, vec![g.id("out").unwrap()]);
    }

    #[test]
    fn rejects_invalid_schedules() {
        let unknown = ScheduleSpec::new().with("nope", StageSchedule::root());
        assert_eq!(schedule_error(unknown), "unknown stage");

        let zero_tile = ScheduleSpec::new().with("a", StageSchedule::tiled_at("out", 0, 8));
        assert!(schedule_error(zero_tile).contains("must be positive"));

        let zero_vec = ScheduleSpec::new().with("a", StageSchedule::root().vectorize(0));
        assert!(schedule_error(zero_vec).contains("vector width"));

        let not_consumer = ScheduleSpec::new().with("b", StageSchedule::tiled_at("side", 8, 8));
        assert!(schedule_error(not_consumer).contains("does not consume"));

        let inline_consumer = ScheduleSpec::new().with("a", StageSchedule::tiled_at("b", 8, 8));
        assert!(schedule_error(inline_consumer).contains("inline"));

        let inline_output = ScheduleSpec::new().with("out", StageSchedule::inline());
        assert!(schedule_error(inline_output).contains("root"));

        let input = ScheduleSpec::new().with("in", StageSchedule::root());
        assert!(schedule_error(input).contains("input"));

        let conflict = ScheduleSpec::new()
            .with("a", StageSchedule::tiled_at("out", 8, 8))
            .with("b", StageSchedule::tiled_at("out", 16, 8));
        assert!(schedule_error(conflict).contains("conflicts"));
    }

    #[test]
    fn rejects_tiled_stage_read_outside_scope() {
        // `side` is root, so it reads `a` outside the tiles of `b`.
        let spec = ScheduleSpec::new()
            .with("b", StageSchedule::root())
            .with("side", StageSchedule::root())
            .with("a", StageSchedule::tiled_at("b", 8, 8));
        assert!(schedule_error(spec).contains("outside the scope"));

        // With `side` inline it is evaluated from `out`, still outside `b`.
        let spec = ScheduleSpec::new()
            .with("b", StageSchedule::root())
            .with("a", StageSchedule::tiled_at("b", 8, 8));
        assert!(schedule_error(spec).contains("outside the scope"));

        // Tiling at `out` covers every reader.
        let spec = ScheduleSpec::new().with("a", StageSchedule::tiled_at("out", 8, 8));
        assert!(Plan::build(&graph(), &spec).is_ok());
    }

    #[test]
    fn root_buffers_are_released_after_last_reader() {
        let g = graph();
        let spec = ScheduleSpec::new()
            .with("a", StageSchedule::root())
            .with("b", StageSchedule::root());
        let plan = Plan::build(&g, &spec).unwrap();
        let (a, b, out) = (g.id("a").unwrap(), g.id("b").unwrap(), g.id("out").unwrap());
        assert_eq!(plan.root_order, vec![a, b, out]);
        // `side` is inline and evaluated by `out`, so `a` lives until `out`.
        assert_eq!(plan.release_after, vec![vec![], vec![], vec![a, b]]);
    }
}
