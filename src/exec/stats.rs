use crate::diagnostics::TimingBreakdown;
use crate::graph::{StageGraph, StageId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Work counters for one stage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageStats {
    pub name: String,
    /// Points evaluated, inline or into a buffer.
    pub evaluated: u64,
    /// Buffers allocated for the stage (one per root run or per tile).
    pub materializations: u64,
    /// Points stored in those buffers, halos included.
    pub materialized_points: u64,
}

/// Execution statistics for one [`Executor::run`](super::Executor::run).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStats {
    pub stages: Vec<StageStats>,
    /// Tiles computed across all materialized stages.
    pub tiles: u64,
    /// Full-width vector chunks; scalar tails are not counted.
    pub vector_chunks: u64,
    /// Inline evaluations of a stage that should have been read from a buffer.
    pub fallback_evaluations: u64,
    pub timing: TimingBreakdown,
}

impl ExecutionStats {
    pub fn stage(&self, name: &str) -> Option<&StageStats> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn total_evaluated(&self) -> u64 {
        self.stages.iter().map(|s| s.evaluated).sum()
    }
}

/// Shared counters, bumped with relaxed atomics from worker threads.
#[derive(Debug)]
pub(crate) struct Counters {
    evaluated: Vec<AtomicU64>,
    materializations: Vec<AtomicU64>,
    materialized_points: Vec<AtomicU64>,
    tiles: AtomicU64,
    vector_chunks: AtomicU64,
    fallback: AtomicU64,
}

fn zeroed(n: usize) -> Vec<AtomicU64> {
    (0..n).map(|_| AtomicU64::new(0)).collect()
}

impl Counters {
    pub fn new(stages: usize) -> Self {
        Self {
            evaluated: zeroed(stages),
            materializations: zeroed(stages),
            materialized_points: zeroed(stages),
            tiles: AtomicU64::new(0),
            vector_chunks: AtomicU64::new(0),
            fallback: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn evaluated(&self, id: StageId) {
        self.evaluated[id.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn materialized(&self, id: StageId, points: u64) {
        self.materializations[id.index()].fetch_add(1, Ordering::Relaxed);
        self.materialized_points[id.index()].fetch_add(points, Ordering::Relaxed);
    }

    pub fn tile(&self) {
        self.tiles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn vector_chunks(&self, n: u64) {
        self.vector_chunks.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn fallback(&self) {
        self.fallback.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, graph: &StageGraph, timing: TimingBreakdown) -> ExecutionStats {
        let load = |v: &[AtomicU64], id: StageId| v[id.index()].load(Ordering::Relaxed);
        ExecutionStats {
            stages: graph
                .stages()
                .map(|(id, stage)| StageStats {
                    name: stage.name().to_string(),
                    evaluated: load(&self.evaluated, id),
                    materializations: load(&self.materializations, id),
                    materialized_points: load(&self.materialized_points, id),
                })
                .collect(),
            tiles: self.tiles.load(Ordering::Relaxed),
            vector_chunks: self.vector_chunks.load(Ordering::Relaxed),
            fallback_evaluations: self.fallback.load(Ordering::Relaxed),
            timing,
        }
    }
}
