//! Harris corner detection on a pre-padded grayscale image.
//!
//! Stages, all reading the previous ones at small fixed offsets:
//! 1. `padded`: input shifted by the margin so every tap below stays inside;
//! 2. `grad_x`, `grad_y`: 3×3 Sobel, i16;
//! 3. `grad_xx`, `grad_yy`, `grad_xy`: products, i32;
//! 4. `grad_gx`, `grad_gy`, `grad_gxy`: `block_size²` window sums (updates);
//! 5. `cim`: `det(M) - k·trace(M)²` of the normalized second-moment tensor, f32;
//! 6. `output`: 255 where `cim` is a strict 8-neighbour maximum and at least
//!    `threshold`, else 0.
//!
//! The margin is Sobel radius + window radius + suppression radius, so the
//! output is `[H - 2m, W - 2m]` (`m = 3` for the default 3×3 window).
use super::{execute, shrunk_output};
use crate::boundary::BoundaryPolicy;
use crate::buffer::{Buffer, ElemType, Span};
use crate::error::{PipelineError, Result};
use crate::exec::Realization;
use crate::graph::{FuncDef, ReductionDomain, StageGraph, StageId};
use crate::image::{ImageBufU8, ImageU8, ImageView};
use crate::schedule::{ParallelDim, ScheduleSpec, StageSchedule};
use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

pub const INPUT: &str = "input";
pub const PADDED: &str = "padded";
pub const GRAD_X: &str = "grad_x";
pub const GRAD_Y: &str = "grad_y";
pub const GRAD_XX: &str = "grad_xx";
pub const GRAD_YY: &str = "grad_yy";
pub const GRAD_XY: &str = "grad_xy";
pub const GRAD_GX: &str = "grad_gx";
pub const GRAD_GY: &str = "grad_gy";
pub const GRAD_GXY: &str = "grad_gxy";
pub const CIM: &str = "cim";
pub const OUTPUT: &str = "output";

/// Sobel aperture; only 3×3 is implemented.
const SOBEL_SIZE: u32 = 3;
/// Largest window whose sums of squared 3×3 Sobel responses (≤ 1020²) fit in i32.
pub const MAX_BLOCK_SIZE: i64 = 45;
const _: () = assert!(1020 * 1020 * MAX_BLOCK_SIZE * MAX_BLOCK_SIZE <= i32::MAX as i64);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarrisParams {
    /// Side of the square window summing gradient products (odd).
    pub block_size: i64,
    pub k: f32,
    pub threshold: f32,
}

impl Default for HarrisParams {
    fn default() -> Self {
        Self {
            block_size: 3,
            k: 0.04,
            threshold: 100.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HarrisCorner {
    params: HarrisParams,
}

impl HarrisCorner {
    pub fn new(params: HarrisParams) -> Result<Self> {
        if params.block_size < 1 || params.block_size % 2 == 0 {
            return Err(PipelineError::config(format!(
                "harris block size must be odd and positive, got {}",
                params.block_size
            )));
        }
        if params.block_size > MAX_BLOCK_SIZE {
            return Err(PipelineError::config(format!(
                "harris block size {} can overflow the i32 window sums (at most {MAX_BLOCK_SIZE})",
                params.block_size
            )));
        }
        if !params.k.is_finite() || !params.threshold.is_finite() {
            return Err(PipelineError::config(
                "harris k and threshold must be finite",
            ));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &HarrisParams {
        &self.params
    }

    /// Pixels lost on each side of the output.
    pub fn margin(&self) -> i64 {
        1 + self.params.block_size / 2 + 1
    }

    /// Divisor applied twice to the window sums.
    fn tensor_scale(&self) -> i64 {
        (1 << (SOBEL_SIZE - 1)) * self.params.block_size
    }

    pub fn graph(&self) -> Result<StageGraph> {
        let m = self.margin();
        let half = self.params.block_size / 2;
        let scale = self.tensor_scale();
        let (k, threshold) = (self.params.k, self.params.threshold);

        let mut g = StageGraph::new();
        let input = g.input(INPUT, ElemType::U8, 1, BoundaryPolicy::Prepadded)?;
        let padded = g.add(
            FuncDef::new(PADDED, ElemType::U8)
                .reads(input, Span::new(m, m), Span::new(m, m))
                .pure(move |env, p| env.at(input, p.x + m, p.y + m, 0)),
        )?;

        let grad_x = g.add(
            FuncDef::new(GRAD_X, ElemType::I16)
                .reads(padded, Span::radius(1), Span::radius(1))
                .pure(move |env, p| {
                    let s = |dx: i64, dy: i64| env.at(padded, p.x + dx, p.y + dy, 0);
                    -s(-1, -1) + s(1, -1) - 2.0 * s(-1, 0) + 2.0 * s(1, 0) - s(-1, 1) + s(1, 1)
                }),
        )?;
        let grad_y = g.add(
            FuncDef::new(GRAD_Y, ElemType::I16)
                .reads(padded, Span::radius(1), Span::radius(1))
                .pure(move |env, p| {
                    let s = |dx: i64, dy: i64| env.at(padded, p.x + dx, p.y + dy, 0);
                    s(-1, 1) - s(-1, -1) + 2.0 * s(0, 1) - 2.0 * s(0, -1) + s(1, 1) - s(1, -1)
                }),
        )?;

        let product = |g: &mut StageGraph, name: &str, a: StageId, b: StageId| {
            g.add(
                FuncDef::new(name, ElemType::I32)
                    .reads(a, Span::ZERO, Span::ZERO)
                    .reads(b, Span::ZERO, Span::ZERO)
                    .pure(move |env, p| env.at(a, p.x, p.y, 0) * env.at(b, p.x, p.y, 0)),
            )
        };
        let grad_xx = product(&mut g, GRAD_XX, grad_x, grad_x)?;
        let grad_yy = product(&mut g, GRAD_YY, grad_y, grad_y)?;
        let grad_xy = product(&mut g, GRAD_XY, grad_x, grad_y)?;

        let window = |g: &mut StageGraph, name: &str, src: StageId| {
            g.add(
                FuncDef::new(name, ElemType::I32)
                    .reads(src, Span::radius(half), Span::radius(half))
                    .pure(|_, _| 0.0)
                    .update(
                        ReductionDomain::rect(Span::radius(half), Span::radius(half)),
                        move |env, p, r, acc| acc + env.at(src, p.x + r[0], p.y + r[1], 0),
                    ),
            )
        };
        let grad_gx = window(&mut g, GRAD_GX, grad_xx)?;
        let grad_gy = window(&mut g, GRAD_GY, grad_yy)?;
        let grad_gxy = window(&mut g, GRAD_GXY, grad_xy)?;

        let cim = g.add(
            FuncDef::new(CIM, ElemType::F32)
                .reads(grad_gx, Span::ZERO, Span::ZERO)
                .reads(grad_gy, Span::ZERO, Span::ZERO)
                .reads(grad_gxy, Span::ZERO, Span::ZERO)
                .pure(move |env, p| {
                    let norm = |id: StageId| {
                        let v = env.at(id, p.x, p.y, 0) as i64;
                        v.div_euclid(scale).div_euclid(scale) as f32
                    };
                    let (lgx, lgy, lgxy) = (norm(grad_gx), norm(grad_gy), norm(grad_gxy));
                    corner_response(Matrix2::new(lgx, lgxy, lgxy, lgy), k) as f64
                }),
        )?;

        let output = g.add(
            FuncDef::new(OUTPUT, ElemType::U8)
                .reads(cim, Span::radius(1), Span::radius(1))
                .pure(move |env, p| {
                    let c = env.at(cim, p.x, p.y, 0);
                    let is_max = NEIGHBOURS
                        .iter()
                        .all(|&(dx, dy)| c > env.at(cim, p.x + dx, p.y + dy, 0));
                    if is_max && c >= threshold as f64 {
                        255.0
                    } else {
                        0.0
                    }
                }),
        )?;
        g.set_output(output)?;
        Ok(g)
    }

    /// Every intermediate computed per 240×320 output tile, tiles in parallel.
    pub fn default_schedule(&self) -> ScheduleSpec {
        let (tw, th) = (240, 320);
        let tiled = |width: usize| StageSchedule::tiled_at(OUTPUT, tw, th).vectorize(width);
        let mut spec = ScheduleSpec::new().with(
            OUTPUT,
            StageSchedule::root()
                .parallel(ParallelDim::Tiles)
                .vectorize(4),
        );
        for name in [GRAD_X, GRAD_Y] {
            spec.set(name, tiled(8));
        }
        for name in [GRAD_XX, GRAD_YY, GRAD_XY, GRAD_GX, GRAD_GY, GRAD_GXY, CIM] {
            spec.set(name, tiled(4));
        }
        spec
    }

    pub fn run(&self, input: &ImageU8<'_>) -> Result<ImageBufU8> {
        let schedule = self.default_schedule();
        Ok(self.run_with(input, &schedule)?.to_image())
    }

    pub fn run_with(&self, input: &ImageU8<'_>, schedule: &ScheduleSpec) -> Result<Realization> {
        let output = shrunk_output(input.width(), input.height(), self.margin())?;
        let graph = self.graph()?;
        let buffer = Buffer::from_view(input);
        execute("harris_corner", &graph, schedule, &[&buffer], output)
    }
}

const NEIGHBOURS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Harris response `det(M) - k·trace(M)²`, evaluated in f32.
pub fn corner_response(m: Matrix2<f32>, k: f32) -> f32 {
    let trace = m.trace();
    m.determinant() - k * trace * trace
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_of_isotropic_and_edge_tensors() {
        // Equal eigenvalues: det = 1e4, trace = 200.
        let iso = corner_response(Matrix2::new(100.0, 0.0, 0.0, 100.0), 0.04);
        assert!((iso - (10_000.0 - 0.04 * 40_000.0)).abs() < 1e-2);
        // Single dominant direction: det = 0, response negative.
        let edge = corner_response(Matrix2::new(100.0, 0.0, 0.0, 0.0), 0.04);
        assert!(edge < 0.0);
    }

    #[test]
    fn flat_image_has_no_corners() {
        let data = vec![128u8; 24 * 24];
        let img = ImageU8::gray(24, 24, &data);
        let out = HarrisCorner::new(HarrisParams::default())
            .unwrap()
            .run(&img)
            .unwrap();
        assert_eq!((out.width(), out.height()), (18, 18));
        assert!(out.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn even_block_size_is_rejected() {
        let params = HarrisParams {
            block_size: 4,
            ..HarrisParams::default()
        };
        assert!(HarrisCorner::new(params).is_err());
    }

    #[test]
    fn oversized_block_size_is_rejected_without_overflow() {
        for block_size in [MAX_BLOCK_SIZE + 2, 1 << 31, i64::MAX] {
            let params = HarrisParams {
                block_size,
                ..HarrisParams::default()
            };
            assert!(
                matches!(HarrisCorner::new(params), Err(PipelineError::InvalidConfig(_))),
                "{block_size}"
            );
        }
        let widest = HarrisCorner::new(HarrisParams {
            block_size: MAX_BLOCK_SIZE,
            ..HarrisParams::default()
        });
        assert!(widest.is_ok());
    }

    #[test]
    fn margin_tracks_block_size() {
        let h = HarrisCorner::new(HarrisParams::default()).unwrap();
        assert_eq!(h.margin(), 3);
        assert_eq!(h.tensor_scale(), 12);
        let wide = HarrisCorner::new(HarrisParams {
            block_size: 5,
            ..HarrisParams::default()
        })
        .unwrap();
        assert_eq!(wide.margin(), 4);
    }
}
