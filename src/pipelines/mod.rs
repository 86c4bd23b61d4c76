//! Concrete stencil pipelines built on [`StageGraph`].
//!
//! Each pipeline owns validated parameters and exposes the same surface:
//! `graph()` to inspect the stages, `default_schedule()`, `run_with()` for an
//! explicit schedule (returns a [`Realization`] with statistics) and `run()`
//! for the common case.
//!
//! | pipeline | input | output |
//! |----------|-------|--------|
//! | [`blur::SeparableBlur`] | `u8 [H, W, C]` | `u8 [H, W, C]` |
//! | [`gaussian::GaussianBlur`] | `u8 [H, W]` | `u8 [H - 2r, W - 2r]` |
//! | [`harris::HarrisCorner`] | `u8 [H, W]` | `u8 [H - 2m, W - 2m]` |
//! | [`stereo::StereoMatch`] | 4 × `u8 [H, W, 3]` | `u8 [H, W]` |

pub mod blur;
pub mod gaussian;
pub mod harris;
pub mod rectify;
pub mod stereo;

pub use blur::{BlurParams, BlurPrecision, BlurSchedule, SeparableBlur};
pub use gaussian::{GaussianBlur, GaussianForm, GaussianParams};
pub use harris::{HarrisCorner, HarrisParams};
pub use rectify::Rectification;
pub use stereo::{StereoInputs, StereoMatch, StereoParams};

use crate::buffer::{Buffer, Region};
use crate::error::{PipelineError, Result};
use crate::exec::{Executor, Realization};
use crate::graph::StageGraph;
use crate::schedule::ScheduleSpec;

/// Plan and run `graph` over `output`.
pub(crate) fn execute(
    name: &str,
    graph: &StageGraph,
    schedule: &ScheduleSpec,
    inputs: &[&Buffer],
    output: Region,
) -> Result<Realization> {
    log::debug!(
        "{name}: {} stages, output {}x{}",
        graph.len(),
        output.w,
        output.h
    );
    let executor = Executor::new(graph, schedule)?;
    executor.run(inputs, output)
}

/// Output region of a pipeline that reads a pre-padded input and loses
/// `margin` pixels on every side.
pub(crate) fn shrunk_output(width: usize, height: usize, margin: i64) -> Result<Region> {
    let shrink = |extent: usize| {
        let border = margin.checked_mul(2)?;
        i64::try_from(extent).ok()?.checked_sub(border)
    };
    let (Some(w), Some(h)) = (shrink(width), shrink(height)) else {
        return Err(PipelineError::config(format!(
            "margin {margin} is out of range for a {width}x{height} input"
        )));
    };
    if w <= 0 || h <= 0 {
        return Err(PipelineError::EmptyOutput {
            width: w,
            height: h,
        });
    }
    Ok(Region::from_size(w, h))
}
