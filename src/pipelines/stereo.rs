//! Window-based stereo correspondence.
//!
//! Both views are rectified (see [`Rectification`]), then for every pixel and
//! every candidate disparity `d ∈ [0, search_range)` the sum of absolute
//! differences over a `2R × 2R` window is accumulated in u16 (`sad`, disparity
//! stored as the channel). `best` packs `sad·256 + d` and takes the minimum,
//! which selects the smallest cost and, among equal costs, the smallest
//! disparity. The output is `d · 255 / search_range`.
//!
//! Images are read with a constant-0 exterior, remaps with a constant-128
//! (no displacement) exterior.
use super::execute;
use super::rectify::{Rectification, REMAP_ZERO};
use crate::boundary::BoundaryPolicy;
use crate::buffer::{Buffer, ElemType, Region, Span};
use crate::error::{PipelineError, Result};
use crate::exec::Realization;
use crate::graph::{FuncDef, ReductionDomain, StageGraph};
use crate::image::{ImageBufU8, ImageU8, ImageView};
use crate::schedule::{ParallelDim, ScheduleSpec, StageSchedule};
use serde::{Deserialize, Serialize};

pub const RIGHT: &str = "right";
pub const LEFT: &str = "left";
pub const RIGHT_REMAP: &str = "right_remap";
pub const LEFT_REMAP: &str = "left_remap";
pub const RIGHT_RECT: &str = "right_rect";
pub const LEFT_RECT: &str = "left_rect";
pub const SAD: &str = "sad";
pub const BEST: &str = "best";
pub const OUTPUT: &str = "output";

/// Channels of every stereo input.
pub const INPUT_CHANNELS: usize = 3;
/// Largest `R` whose `(2R)² · 255` cost fits in u16.
pub const MAX_WINDOW_RADIUS: i64 = 8;
const _: () = assert!(4 * MAX_WINDOW_RADIUS * MAX_WINDOW_RADIUS * 255 <= u16::MAX as i64);
const MAX_DISPARITY_OFFSET: u64 = 1 << 16;
const NO_MATCH: f64 = 65535.0;
const PACK: f64 = 256.0;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StereoParams {
    /// Half side `R` of the matching window `[-R, R)²`.
    pub window_radius: i64,
    /// Number of candidate disparities.
    pub search_range: i64,
    /// Constant shift added to every candidate disparity.
    pub disparity_offset: i64,
    pub rectification: Rectification,
}

impl Default for StereoParams {
    fn default() -> Self {
        Self {
            window_radius: 4,
            search_range: 64,
            disparity_offset: 0,
            rectification: Rectification::Passthrough,
        }
    }
}

/// The four views consumed by [`StereoMatch`], all `[H, W, 3]`.
#[derive(Clone, Debug)]
pub struct StereoInputs<'a> {
    pub right: ImageU8<'a>,
    pub left: ImageU8<'a>,
    pub right_remap: ImageU8<'a>,
    pub left_remap: ImageU8<'a>,
}

impl<'a> StereoInputs<'a> {
    fn views(&self) -> [(&'static str, &ImageU8<'a>); 4] {
        [
            (RIGHT, &self.right),
            (LEFT, &self.left),
            (RIGHT_REMAP, &self.right_remap),
            (LEFT_REMAP, &self.left_remap),
        ]
    }
}

/// Remap image with every sample at the no-displacement value.
pub fn identity_remap(width: usize, height: usize) -> ImageBufU8 {
    let mut img = ImageBufU8::new(width, height, INPUT_CHANNELS);
    img.data_mut().fill(REMAP_ZERO);
    img
}

#[derive(Clone, Debug)]
pub struct StereoMatch {
    params: StereoParams,
}

impl StereoMatch {
    pub fn new(params: StereoParams) -> Result<Self> {
        let r = params.window_radius;
        if r < 1 {
            return Err(PipelineError::config(format!(
                "window radius must be positive, got {r}"
            )));
        }
        if r > MAX_WINDOW_RADIUS {
            return Err(PipelineError::config(format!(
                "window radius {r} can overflow the u16 cost (at most {MAX_WINDOW_RADIUS})"
            )));
        }
        if !(1..=256).contains(&params.search_range) {
            return Err(PipelineError::config(format!(
                "search range must be within 1..=256, got {}",
                params.search_range
            )));
        }
        if params.disparity_offset.unsigned_abs() > MAX_DISPARITY_OFFSET {
            return Err(PipelineError::config(format!(
                "disparity offset must be within ±{MAX_DISPARITY_OFFSET}, got {}",
                params.disparity_offset
            )));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &StereoParams {
        &self.params
    }

    pub fn graph(&self) -> Result<StageGraph> {
        let r = self.params.window_radius;
        let search = self.params.search_range;
        let o = self.params.disparity_offset;
        let rect = self.params.rectification;
        let image_exterior = BoundaryPolicy::ConstantExterior(0.0);
        let remap_exterior = BoundaryPolicy::ConstantExterior(REMAP_ZERO as f64);

        let mut g = StageGraph::new();
        let right = g.input(RIGHT, ElemType::U8, INPUT_CHANNELS, image_exterior)?;
        let left = g.input(LEFT, ElemType::U8, INPUT_CHANNELS, image_exterior)?;
        let right_remap = g.input(RIGHT_REMAP, ElemType::U8, INPUT_CHANNELS, remap_exterior)?;
        let left_remap = g.input(LEFT_REMAP, ElemType::U8, INPUT_CHANNELS, remap_exterior)?;
        let right_rect = g.add(rect.stage(RIGHT_RECT, right, right_remap))?;
        let left_rect = g.add(rect.stage(LEFT_RECT, left, left_remap))?;

        let window = Span::half_open(-r, r);
        let sad = g.add(
            FuncDef::new(SAD, ElemType::U16)
                .channels(search as usize)
                .reads(right_rect, window, window)
                .reads(left_rect, Span::new(-r + o, r - 1 + o + search - 1), window)
                .pure(|_, _| 0.0)
                .update(ReductionDomain::rect(window, window), move |env, p, w, acc| {
                    let (u, v) = (w[0], w[1]);
                    let d = p.c as i64;
                    let a = env.at(right_rect, p.x + u, p.y + v, 0);
                    let b = env.at(left_rect, p.x + u + o + d, p.y + v, 0);
                    acc + ElemType::U16.narrow((a - b).abs())
                }),
        )?;
        let best = g.add(
            FuncDef::new(BEST, ElemType::U32)
                .reads(sad, Span::ZERO, Span::ZERO)
                .pure(|_, _| NO_MATCH * PACK)
                .update(
                    ReductionDomain::range(Span::half_open(0, search)),
                    move |env, p, d, acc| {
                        let packed = env.at(sad, p.x, p.y, d[0] as usize) * PACK + d[0] as f64;
                        acc.min(packed)
                    },
                ),
        )?;
        let output = g.add(
            FuncDef::new(OUTPUT, ElemType::U8)
                .reads(best, Span::ZERO, Span::ZERO)
                .pure(move |env, p| {
                    let d = env.at(best, p.x, p.y, 0) as i64 % PACK as i64;
                    (d * 255 / search) as f64
                }),
        )?;
        g.set_output(output)?;
        Ok(g)
    }

    /// Rectified views per 256×64 output tile, tiles in parallel; costs inline.
    pub fn default_schedule(&self) -> ScheduleSpec {
        let rect = StageSchedule::tiled_at(OUTPUT, 256, 64).vectorize(16);
        ScheduleSpec::new()
            .with(RIGHT_RECT, rect.clone())
            .with(LEFT_RECT, rect)
            .with(OUTPUT, StageSchedule::root().parallel(ParallelDim::Tiles))
    }

    pub fn run(&self, inputs: &StereoInputs<'_>) -> Result<ImageBufU8> {
        let schedule = self.default_schedule();
        Ok(self.run_with(inputs, &schedule)?.to_image())
    }

    pub fn run_with(
        &self,
        inputs: &StereoInputs<'_>,
        schedule: &ScheduleSpec,
    ) -> Result<Realization> {
        let (w, h) = (inputs.right.width(), inputs.right.height());
        for (name, view) in inputs.views() {
            if (view.width(), view.height()) != (w, h) {
                return Err(PipelineError::InputMismatch {
                    stage: name.into(),
                    reason: format!(
                        "expected {w}x{h}, got {}x{}",
                        view.width(),
                        view.height()
                    ),
                });
            }
        }
        let graph = self.graph()?;
        let buffers: Vec<Buffer> = inputs
            .views()
            .iter()
            .map(|(_, v)| Buffer::from_view(*v))
            .collect();
        let refs: Vec<&Buffer> = buffers.iter().collect();
        execute(
            "stereo_match",
            &graph,
            schedule,
            &refs,
            Region::from_size(w as i64, h as i64),
        )
    }
}
