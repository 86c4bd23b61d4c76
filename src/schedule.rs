//! Materialization schedules.
//!
//! A [`ScheduleSpec`] maps stage names to a [`StageSchedule`]. Stages that are
//! not listed are computed inline; the output stage is always computed at
//! root. Schedules never change values, only where and how often they are
//! computed. They are plain records so the demo can load them from JSON:
//!
//! ```json
//! { "stages": {
//!     "blur_x": { "compute": { "tiled_at": { "consumer": "blur_y",
//!                                            "tile": { "width": 256, "height": 32 } } },
//!                 "vector_width": 8 },
//!     "blur_y": { "compute": "root", "parallel": "rows", "vector_width": 8 } } }
//! ```
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a stage is computed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeAt {
    /// Recomputed at every access, never stored.
    #[default]
    Inline,
    /// Computed once over everything its consumers need.
    Root,
    /// Computed per tile of `consumer`, over the halo that tile needs.
    TiledAt { consumer: String, tile: TileSize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSize {
    pub width: i64,
    pub height: i64,
}

impl TileSize {
    pub const fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }
}

/// Outer loop distributed over the thread pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelDim {
    /// One task per strip of tile rows.
    Rows,
    /// One task per tile.
    Tiles,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSchedule {
    pub compute: ComputeAt,
    pub parallel: Option<ParallelDim>,
    pub vector_width: Option<usize>,
}

impl StageSchedule {
    pub fn inline() -> Self {
        Self::default()
    }

    pub fn root() -> Self {
        Self {
            compute: ComputeAt::Root,
            ..Self::default()
        }
    }

    pub fn tiled_at(consumer: impl Into<String>, width: i64, height: i64) -> Self {
        Self {
            compute: ComputeAt::TiledAt {
                consumer: consumer.into(),
                tile: TileSize::new(width, height),
            },
            ..Self::default()
        }
    }

    pub fn parallel(mut self, dim: ParallelDim) -> Self {
        self.parallel = Some(dim);
        self
    }

    pub fn vectorize(mut self, width: usize) -> Self {
        self.vector_width = Some(width);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSpec {
    pub stages: BTreeMap<String, StageSchedule>,
}

impl ScheduleSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; replaces an earlier entry for the same stage.
    pub fn with(mut self, stage: impl Into<String>, schedule: StageSchedule) -> Self {
        self.stages.insert(stage.into(), schedule);
        self
    }

    pub fn set(&mut self, stage: impl Into<String>, schedule: StageSchedule) {
        self.stages.insert(stage.into(), schedule);
    }

    pub fn get(&self, stage: &str) -> Option<&StageSchedule> {
        self.stages.get(stage)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StageSchedule)> {
        self.stages.iter().map(|(k, v)| (k.as_str(), v))
    }
}
