//! Stage graphs: named producer/consumer stages over integer coordinates.
//!
//! Purpose
//! - Describe *what* a pipeline computes, independent of *how* it is
//!   materialized. Scheduling lives in [`crate::schedule`], execution in
//!   [`crate::exec`].
//!
//! Design
//! - Stages are appended through [`StageGraph::input`] and
//!   [`StageGraph::add`]; a stage may only read stages that already exist, so
//!   the graph is a DAG and ids are a topological order.
//! - Every computed stage declares its accesses up front. Bound inference uses
//!   only these declarations, never the closures.
//!
//! Notes
//! - Closures read producers through [`Env::at`](crate::exec::Env::at) and
//!   must stay within their declared offsets. Reads outside still produce the
//!   right value but are counted as fallback evaluations by the executor.

mod stage;

pub use stage::{
    Access, FuncDef, Point, PureFn, ReductionDomain, Stage, StageId, StageKind, Update,
    UpdateFn,
};

use crate::boundary::BoundaryPolicy;
use crate::buffer::{ElemType, Region};
use crate::error::{PipelineError, Result};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct StageGraph {
    stages: Vec<Stage>,
    by_name: HashMap<String, StageId>,
    output: Option<StageId>,
    input_count: usize,
}

impl StageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the next input slot.
    pub fn input(
        &mut self,
        name: impl Into<String>,
        elem: ElemType,
        channels: usize,
        boundary: BoundaryPolicy,
    ) -> Result<StageId> {
        let slot = self.input_count;
        let id = self.push(Stage {
            name: name.into(),
            elem,
            channels,
            kind: StageKind::Input { slot, boundary },
            accesses: Vec::new(),
        })?;
        self.input_count += 1;
        Ok(id)
    }

    /// Append a computed stage.
    pub fn add(&mut self, def: FuncDef) -> Result<StageId> {
        let Some(pure) = def.pure else {
            return Err(PipelineError::Graph(format!(
                "stage `{}` has no pure definition",
                def.name
            )));
        };
        let next = self.stages.len();
        if let Some(a) = def.accesses.iter().find(|a| a.producer.0 >= next) {
            return Err(PipelineError::Graph(format!(
                "stage `{}` reads unknown producer #{}",
                def.name, a.producer.0
            )));
        }
        if let Some(a) = def
            .accesses
            .iter()
            .find(|a| a.dx.lo > a.dx.hi || a.dy.lo > a.dy.hi)
        {
            return Err(PipelineError::Graph(format!(
                "stage `{}` declares an empty access span on `{}`",
                def.name,
                self.stages[a.producer.0].name
            )));
        }
        self.push(Stage {
            name: def.name,
            elem: def.elem,
            channels: def.channels,
            kind: StageKind::Func {
                pure,
                updates: def.updates,
            },
            accesses: def.accesses,
        })
    }

    fn push(&mut self, stage: Stage) -> Result<StageId> {
        if stage.name.is_empty() {
            return Err(PipelineError::Graph("stage names must be non-empty".into()));
        }
        if stage.channels == 0 {
            return Err(PipelineError::Graph(format!(
                "stage `{}` must have at least one channel",
                stage.name
            )));
        }
        if self.by_name.contains_key(&stage.name) {
            return Err(PipelineError::Graph(format!(
                "duplicate stage name `{}`",
                stage.name
            )));
        }
        let id = StageId(self.stages.len());
        self.by_name.insert(stage.name.clone(), id);
        self.stages.push(stage);
        Ok(id)
    }

    /// Mark the stage whose values the pipeline returns.
    pub fn set_output(&mut self, id: StageId) -> Result<()> {
        let stage = self
            .stages
            .get(id.0)
            .ok_or_else(|| PipelineError::Graph(format!("unknown stage #{}", id.0)))?;
        if stage.is_input() {
            return Err(PipelineError::Graph(format!(
                "input `{}` cannot be the output",
                stage.name
            )));
        }
        self.output = Some(id);
        Ok(())
    }

    pub fn output(&self) -> Option<StageId> {
        self.output
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn input_count(&self) -> usize {
        self.input_count
    }

    /// Panics on ids from another graph.
    pub fn stage(&self, id: StageId) -> &Stage {
        &self.stages[id.0]
    }

    pub fn id(&self, name: &str) -> Option<StageId> {
        self.by_name.get(name).copied()
    }

    pub fn ids(&self) -> impl DoubleEndedIterator<Item = StageId> + ExactSizeIterator {
        (0..self.stages.len()).map(StageId)
    }

    pub fn stages(&self) -> impl Iterator<Item = (StageId, &Stage)> {
        self.stages.iter().enumerate().map(|(i, s)| (StageId(i), s))
    }

    /// Direct consumers of `producer`, in id order.
    pub fn consumers(&self, producer: StageId) -> Vec<StageId> {
        self.stages()
            .filter(|(_, s)| s.accesses.iter().any(|a| a.producer == producer))
            .map(|(id, _)| id)
            .collect()
    }

    /// Region of `producer` read when `consumer` is computed over `region`,
    /// or `None` when there is no direct edge.
    pub fn footprint(
        &self,
        consumer: StageId,
        region: &Region,
        producer: StageId,
    ) -> Option<Region> {
        self.stage(consumer)
            .accesses
            .iter()
            .filter(|a| a.producer == producer)
            .map(|a| a.required(region))
            .reduce(|acc, r| acc.union(&r))
    }

    /// Whether `consumer` reads `producer` directly or through other stages.
    pub fn depends_on(&self, consumer: StageId, producer: StageId) -> bool {
        if consumer.0 <= producer.0 {
            return false;
        }
        let mut reach = vec![false; consumer.0 + 1];
        reach[consumer.0] = true;
        for i in (producer.0 + 1..=consumer.0).rev() {
            if !reach[i] {
                continue;
            }
            for a in &self.stages[i].accesses {
                if a.producer == producer {
                    return true;
                }
                reach[a.producer.0] = true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Span;

    fn chain() -> (StageGraph, StageId, StageId, StageId) {
        let mut g = StageGraph::new();
        let input = g
            .input("in", ElemType::U8, 1, BoundaryPolicy::ClampToEdge)
            .unwrap();
        let a = g
            .add(
                FuncDef::new("a", ElemType::U16)
                    .reads(input, Span::radius(2), Span::ZERO)
                    .pure(move |env, p| env.at(input, p.x, p.y, 0)),
            )
            .unwrap();
        let b = g
            .add(
                FuncDef::new("b", ElemType::U8)
                    .reads(a, Span::ZERO, Span::radius(1))
                    .reads(a, Span::new(3, 3), Span::ZERO)
                    .pure(move |env, p| env.at(a, p.x, p.y, 0)),
            )
            .unwrap();
        g.set_output(b).unwrap();
        (g, input, a, b)
    }

    #[test]
    fn footprint_unions_every_access_on_the_edge() {
        let (g, input, a, b) = chain();
        let r = Region::new(0, 0, 10, 10);
        assert_eq!(g.footprint(b, &r, a), Some(Region::new(0, -1, 13, 12)));
        assert_eq!(g.footprint(a, &r, input), Some(Region::new(-2, 0, 14, 10)));
        assert_eq!(g.footprint(b, &r, input), None);
    }

    #[test]
    fn dependencies_follow_paths() {
        let (g, input, a, b) = chain();
        assert!(g.depends_on(b, input));
        assert!(g.depends_on(b, a));
        assert!(!g.depends_on(a, b));
        assert!(!g.depends_on(a, a));
        assert_eq!(g.consumers(a), vec![b]);
        assert_eq!(g.id("a"), Some(a));
        assert_eq!(g.output(), Some(b));
    }

    #[test]
    fn malformed_stages_are_rejected() {
        let (mut g, input, _, _) = chain();
        let dup = g.add(FuncDef::new("a", ElemType::U8).pure(|_, _| 0.0));
        assert!(matches!(dup, Err(PipelineError::Graph(_))));
        let dangling = g.add(
            FuncDef::new("c", ElemType::U8)
                .reads(StageId(99), Span::ZERO, Span::ZERO)
                .pure(|_, _| 0.0),
        );
        assert!(dangling.is_err());
        assert!(g.add(FuncDef::new("d", ElemType::U8)).is_err());
        assert!(g.set_output(input).is_err());
    }
}
