#![doc = include_str!("../README.md")]

// Core model: what is computed.
pub mod boundary;
pub mod buffer;
pub mod error;
pub mod graph;
pub mod kernel;

// How it is computed.
pub mod exec;
pub mod schedule;

// Pipelines and tooling around them.
pub mod config;
pub mod diagnostics;
pub mod image;
pub mod pipelines;

// --- High-level re-exports -------------------------------------------------

pub use crate::error::{PipelineError, Result};
pub use crate::exec::{ExecutionStats, Executor, Realization};
pub use crate::graph::{FuncDef, StageGraph, StageId};
pub use crate::schedule::{ComputeAt, ParallelDim, ScheduleSpec, StageSchedule};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use stencil_pipes::prelude::*;
///
/// # fn main() -> stencil_pipes::Result<()> {
/// let (w, h) = (64usize, 48usize);
/// let gray = vec![0u8; w * h];
/// let img = ImageU8::gray(w, h, &gray);
///
/// let harris = HarrisCorner::new(HarrisParams::default())?;
/// let corners = harris.run(&img)?;
/// println!("output {}x{}", corners.width(), corners.height());
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::boundary::BoundaryPolicy;
    pub use crate::buffer::{Buffer, ElemType, Region, Span};
    pub use crate::image::{ImageBufU8, ImageU8, ImageView};
    pub use crate::pipelines::{
        BlurParams, GaussianBlur, GaussianParams, HarrisCorner, HarrisParams, SeparableBlur,
        StereoInputs, StereoMatch, StereoParams,
    };
    pub use crate::{
        ComputeAt, Executor, FuncDef, ParallelDim, PipelineError, ScheduleSpec, StageGraph,
        StageSchedule,
    };
}
