//! Interpreting executor for scheduled stage graphs.
//!
//! Purpose
//! - Evaluate "stage S over region D under schedule P" directly, producing the
//!   same values for every valid schedule.
//!
//! Design
//! - [`Plan::build`] validates the schedule up front; nothing fails once
//!   evaluation starts.
//! - [`bounds::infer`] computes, from the output region, how much of each stage
//!   is needed. Root stages are realized once over that demand, in topological
//!   order, and released after their last reader.
//! - A stage is realized tile by tile. For each tile the demand of the tile's
//!   scope (inline stages and stages tiled at it) is inferred again and the
//!   tiled producers are realized over it into tile-local buffers.
//! - Tiles of a parallel stage run on the rayon pool (feature `parallel`); each
//!   writes its own buffer, which is blitted into the stage buffer afterwards.
//!
//! Notes
//! - All values pass through [`ElemType::narrow`](crate::buffer::ElemType::narrow)
//!   whether they are stored or consumed inline, which is what makes placement
//!   numerically invisible.

pub mod bounds;
mod env;
pub mod plan;
mod stats;

pub use env::Env;
pub use plan::{Compute, Plan, StagePlan};
pub use stats::{ExecutionStats, StageStats};

use crate::buffer::{Buffer, Region};
use crate::diagnostics::TimingBreakdown;
use crate::error::{PipelineError, Result};
use crate::graph::{Point, StageGraph, StageId, StageKind};
use crate::image::ImageBufU8;
use crate::schedule::{ParallelDim, ScheduleSpec};
use log::{debug, trace};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use stats::Counters;
use std::time::Instant;

/// Output of one run together with its statistics.
#[derive(Clone, Debug)]
pub struct Realization {
    pub output: Buffer,
    pub stats: ExecutionStats,
}

impl Realization {
    pub fn to_image(&self) -> ImageBufU8 {
        self.output.to_image()
    }
}

pub struct Executor<'g> {
    graph: &'g StageGraph,
    plan: Plan,
}

impl<'g> Executor<'g> {
    /// Validate `schedule` against `graph`.
    pub fn new(graph: &'g StageGraph, schedule: &ScheduleSpec) -> Result<Self> {
        let plan = Plan::build(graph, schedule)?;
        Ok(Self { graph, plan })
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Compute the output stage over `output`. `inputs` are indexed by input slot.
    pub fn run(&self, inputs: &[&Buffer], output: Region) -> Result<Realization> {
        if output.is_empty() {
            return Err(PipelineError::EmptyOutput {
                width: output.w,
                height: output.h,
            });
        }
        self.check_inputs(inputs)?;
        let out_id = self.plan.output;
        let demand = bounds::infer(self.graph, out_id, output, |_| true);
        self.check_prepadded(inputs, &demand)?;

        let t0 = Instant::now();
        let counters = Counters::new(self.graph.len());
        let mut timing = TimingBreakdown::default();
        let base = Env::new(self.graph, &self.plan, &counters, inputs);
        let mut roots: Vec<Option<Buffer>> = (0..self.graph.len()).map(|_| None).collect();

        for (pos, &id) in self.plan.root_order.iter().enumerate() {
            let Some(region) = demand[id.index()] else {
                continue;
            };
            let name = self.graph.stage(id).name();
            let ts = Instant::now();
            let buf = {
                let env = base.overlay(
                    roots
                        .iter()
                        .enumerate()
                        .filter_map(|(i, b)| b.as_ref().map(|b| (StageId(i), b))),
                );
                self.realize(id, region, &env)
            };
            let ms = ts.elapsed().as_secs_f64() * 1000.0;
            debug!("realized `{name}` over {region:?} in {ms:.3} ms");
            timing.record(name, region, ms);
            roots[id.index()] = Some(buf);
            for done in &self.plan.release_after[pos] {
                trace!("released `{}`", self.graph.stage(*done).name());
                roots[done.index()] = None;
            }
        }

        let out = roots[out_id.index()]
            .take()
            .ok_or_else(|| PipelineError::Graph("output stage was not realized".into()))?;
        timing.total_ms = t0.elapsed().as_secs_f64() * 1000.0;
        let stats = counters.snapshot(self.graph, timing);
        debug!(
            "run finished: {} evaluations, {} tiles, {} fallbacks",
            stats.total_evaluated(),
            stats.tiles,
            stats.fallback_evaluations
        );
        Ok(Realization { output: out, stats })
    }

    fn check_inputs(&self, inputs: &[&Buffer]) -> Result<()> {
        if inputs.len() != self.graph.input_count() {
            return Err(PipelineError::InputMismatch {
                stage: "inputs".into(),
                reason: format!(
                    "expected {} buffers, got {}",
                    self.graph.input_count(),
                    inputs.len()
                ),
            });
        }
        for (_, stage) in self.graph.stages() {
            let StageKind::Input { slot, .. } = stage.kind() else {
                continue;
            };
            let buf = inputs[*slot];
            if buf.channels() != stage.channels() {
                return Err(PipelineError::InputMismatch {
                    stage: stage.name().into(),
                    reason: format!(
                        "expected {} channels, got {}",
                        stage.channels(),
                        buf.channels()
                    ),
                });
            }
            if buf.elem() != stage.elem() {
                return Err(PipelineError::InputMismatch {
                    stage: stage.name().into(),
                    reason: format!("expected {:?} samples, got {:?}", stage.elem(), buf.elem()),
                });
            }
        }
        Ok(())
    }

    fn check_prepadded(&self, inputs: &[&Buffer], demand: &[Option<Region>]) -> Result<()> {
        for (id, stage) in self.graph.stages() {
            let StageKind::Input { slot, boundary } = stage.kind() else {
                continue;
            };
            if boundary.handles_exterior() {
                continue;
            }
            let Some(required) = demand[id.index()] else {
                continue;
            };
            let available = inputs[*slot].region();
            if !available.contains_region(&required) {
                return Err(PipelineError::OutOfBounds {
                    stage: stage.name().into(),
                    required,
                    available,
                });
            }
        }
        Ok(())
    }

    /// Materialize `id` over `region`, tile by tile.
    fn realize(&self, id: StageId, region: Region, env: &Env<'_>) -> Buffer {
        let stage = self.graph.stage(id);
        let groups = self.tile_groups(id, region);
        trace!(
            "`{}`: {} task(s) over {region:?}",
            stage.name(),
            groups.len()
        );
        let run_group = |group: &Vec<Region>| -> Vec<Buffer> {
            group
                .iter()
                .map(|tile| self.compute_tile(id, *tile, env))
                .collect()
        };

        #[cfg(feature = "parallel")]
        let mut parts: Vec<Buffer> =
            if self.plan.stages[id.index()].parallel.is_some() && groups.len() > 1 {
                groups.par_iter().flat_map_iter(run_group).collect()
            } else {
                groups.iter().flat_map(run_group).collect()
            };
        #[cfg(not(feature = "parallel"))]
        let mut parts: Vec<Buffer> = groups.iter().flat_map(run_group).collect();

        env.counters().materialized(id, region.area());
        if parts.len() == 1 && parts[0].region() == region {
            if let Some(only) = parts.pop() {
                return only;
            }
        }
        let mut out = Buffer::new(stage.elem(), region, stage.channels());
        for part in &parts {
            out.blit(part);
        }
        out
    }

    /// Tiles of `region`, grouped into the units of parallel work.
    fn tile_groups(&self, id: StageId, region: Region) -> Vec<Vec<Region>> {
        let sp = &self.plan.stages[id.index()];
        let (tw, th) = match (sp.tile, sp.parallel) {
            (Some(t), _) => (t.width, t.height),
            (None, Some(_)) => (region.w, 1),
            (None, None) => (region.w, region.h),
        };
        let tiles = region.tiles(tw, th);
        match sp.parallel {
            Some(ParallelDim::Tiles) => tiles.into_iter().map(|t| vec![t]).collect(),
            Some(ParallelDim::Rows) => {
                let per_row = ((region.w + tw - 1) / tw).max(1) as usize;
                tiles.chunks(per_row).map(<[Region]>::to_vec).collect()
            }
            None => vec![tiles],
        }
    }

    /// Compute one tile of `id`, realizing its tiled producers first.
    fn compute_tile(&self, id: StageId, tile: Region, env: &Env<'_>) -> Buffer {
        env.counters().tile();
        let demand = bounds::infer(self.graph, id, tile, |s| self.plan.in_scope_of(id, s));
        let mut locals: Vec<(StageId, Buffer)> = Vec::new();
        for pid in self.graph.ids().take(id.index()) {
            if self.plan.compute(pid) != (Compute::Tiled { consumer: id }) {
                continue;
            }
            let Some(need) = demand[pid.index()] else {
                continue;
            };
            let buf = {
                let scoped = env.overlay(locals.iter().map(|(i, b)| (*i, b)));
                self.realize(pid, need, &scoped)
            };
            locals.push((pid, buf));
        }
        let scoped = env.overlay(locals.iter().map(|(i, b)| (*i, b)));
        self.compute_region(id, tile, &scoped)
    }

    /// Evaluate every point of `region` into a fresh buffer, in chunks of
    /// `vector_width` lanes with a scalar tail per row.
    fn compute_region(&self, id: StageId, region: Region, env: &Env<'_>) -> Buffer {
        let stage = self.graph.stage(id);
        let channels = stage.channels();
        let width = self.plan.stages[id.index()].vector_width.max(1);
        let mut buf = Buffer::new(stage.elem(), region, channels);
        let mut lanes = vec![0.0f64; width * channels];
        let mut chunks = 0u64;
        for y in region.y..region.y_end() {
            let mut x = region.x;
            while x < region.x_end() {
                let n = (region.x_end() - x).min(width as i64);
                if width > 1 && n == width as i64 {
                    for (i, v) in lanes.iter_mut().enumerate() {
                        let p = Point::new(x + (i / channels) as i64, y, i % channels);
                        *v = env.eval(id, p);
                    }
                    for (i, v) in lanes.iter().enumerate() {
                        buf.set(x + (i / channels) as i64, y, i % channels, *v);
                    }
                    chunks += 1;
                } else {
                    for xi in x..x + n {
                        for c in 0..channels {
                            buf.set(xi, y, c, env.eval(id, Point::new(xi, y, c)));
                        }
                    }
                }
                x += n;
            }
        }
        env.counters().vector_chunks(chunks);
        buf
    }
}
