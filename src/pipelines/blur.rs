//! Separable blur: a horizontal pass into an intermediate, then a vertical
//! pass into the 8-bit output, with clamp-to-edge input.
//!
//! Two intermediate precisions are available:
//! - `U16`: integer sums with floor division by the kernel scale;
//! - `F32`: float division, truncated when narrowed to the u8 output.
//!
//! [`BlurSchedule`] reproduces the classic schedule study for this pipeline
//! (root, inline, tiled and tiled + parallel + vectorized intermediate). All
//! four produce the same pixels.
use super::execute;
use crate::boundary::BoundaryPolicy;
use crate::buffer::{Buffer, ElemType, Region, Span};
use crate::error::{PipelineError, Result};
use crate::exec::Realization;
use crate::graph::{FuncDef, StageGraph};
use crate::image::{ImageBufU8, ImageU8, ImageView};
use crate::kernel::Kernel;
use crate::schedule::{ParallelDim, ScheduleSpec, StageSchedule};
use serde::{Deserialize, Serialize};

pub const INPUT: &str = "input";
pub const BLUR_X: &str = "blur_x";
pub const BLUR_Y: &str = "blur_y";

const TILE_W: i64 = 256;
const TILE_H: i64 = 32;
const VECTOR: usize = 8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlurPrecision {
    #[default]
    U16,
    F32,
}

impl BlurPrecision {
    fn elem(self) -> ElemType {
        match self {
            BlurPrecision::U16 => ElemType::U16,
            BlurPrecision::F32 => ElemType::F32,
        }
    }

    /// Normalize a weighted sum by the kernel scale.
    #[inline]
    fn normalize(self, sum: f64, scale: f64) -> f64 {
        match self {
            BlurPrecision::U16 => (sum / scale).floor(),
            BlurPrecision::F32 => sum / scale,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlurSchedule {
    /// `blur_x` computed once over the whole image.
    Root,
    /// `blur_x` recomputed for every tap of `blur_y`.
    Inline,
    /// `blur_x` computed per 256×32 tile of `blur_y`.
    Tiled,
    /// Tiled, with tile rows in parallel and 8-lane chunks.
    #[default]
    TiledParallelVector,
}

impl BlurSchedule {
    pub fn spec(self) -> ScheduleSpec {
        match self {
            BlurSchedule::Root => ScheduleSpec::new().with(BLUR_X, StageSchedule::root()),
            BlurSchedule::Inline => ScheduleSpec::new(),
            BlurSchedule::Tiled => ScheduleSpec::new()
                .with(BLUR_X, StageSchedule::tiled_at(BLUR_Y, TILE_W, TILE_H))
                .with(BLUR_Y, StageSchedule::root()),
            BlurSchedule::TiledParallelVector => ScheduleSpec::new()
                .with(
                    BLUR_X,
                    StageSchedule::tiled_at(BLUR_Y, TILE_W, TILE_H).vectorize(VECTOR),
                )
                .with(
                    BLUR_Y,
                    StageSchedule::root()
                        .parallel(ParallelDim::Rows)
                        .vectorize(VECTOR),
                ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurParams {
    pub kernel: Kernel,
    pub precision: BlurPrecision,
    pub schedule: BlurSchedule,
}

impl Default for BlurParams {
    fn default() -> Self {
        Self {
            kernel: Kernel::box_filter(2),
            precision: BlurPrecision::default(),
            schedule: BlurSchedule::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SeparableBlur {
    params: BlurParams,
}

impl SeparableBlur {
    /// Kernels are validated when built or deserialized, so any params are runnable.
    pub fn new(params: BlurParams) -> Result<Self> {
        Ok(Self { params })
    }

    pub fn params(&self) -> &BlurParams {
        &self.params
    }

    pub fn graph(&self, channels: usize) -> Result<StageGraph> {
        let precision = self.params.precision;
        let radius = self.params.kernel.radius();
        let scale = self.params.kernel.scale() as f64;
        let taps: Vec<f64> = self.params.kernel.taps().iter().map(|&t| t as f64).collect();

        let mut g = StageGraph::new();
        let input = g.input(INPUT, ElemType::U8, channels, BoundaryPolicy::ClampToEdge)?;

        let taps_x = taps.clone();
        let blur_x = g.add(
            FuncDef::new(BLUR_X, precision.elem())
                .channels(channels)
                .reads(input, Span::radius(radius), Span::ZERO)
                .pure(move |env, p| {
                    let sum = weighted(&taps_x, radius, |k| env.at(input, p.x + k, p.y, p.c));
                    precision.normalize(sum, scale)
                }),
        )?;
        let blur_y = g.add(
            FuncDef::new(BLUR_Y, ElemType::U8)
                .channels(channels)
                .reads(blur_x, Span::ZERO, Span::radius(radius))
                .pure(move |env, p| {
                    let sum = weighted(&taps, radius, |k| env.at(blur_x, p.x, p.y + k, p.c));
                    precision.normalize(sum, scale)
                }),
        )?;
        g.set_output(blur_y)?;
        Ok(g)
    }

    pub fn default_schedule(&self) -> ScheduleSpec {
        self.params.schedule.spec()
    }

    pub fn run(&self, input: &ImageU8<'_>) -> Result<ImageBufU8> {
        let schedule = self.default_schedule();
        Ok(self.run_with(input, &schedule)?.to_image())
    }

    pub fn run_with(&self, input: &ImageU8<'_>, schedule: &ScheduleSpec) -> Result<Realization> {
        if input.channels() == 0 {
            return Err(PipelineError::config("blur input needs at least one channel"));
        }
        let graph = self.graph(input.channels())?;
        let buffer = Buffer::from_view(input);
        let output = Region::from_size(input.width() as i64, input.height() as i64);
        execute("separable_blur", &graph, schedule, &[&buffer], output)
    }
}

#[inline]
fn weighted(taps: &[f64], radius: i64, sample: impl Fn(i64) -> f64) -> f64 {
    taps.iter()
        .enumerate()
        .map(|(i, w)| w * sample(i as i64 - radius))
        .sum()
}
