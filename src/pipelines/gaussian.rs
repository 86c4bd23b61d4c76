//! Fixed-point Gaussian blur over a pre-padded grayscale image.
//!
//! `in_bounded(x, y) = input(x + r, y + r)` so that every tap stays inside the
//! input; the output shrinks by `r` on each side. Weights come from
//! [`KernelSynth::gaussian`] with scale 255, products accumulate in u32 and
//! the result is `sum >> 16`.
//!
//! The direct form is one stage with a 2-D update over `[-r, r]²`; the
//! separable form splits it into `sum_x` and `sum_y`. Both are exact integer
//! computations and give identical pixels.
use super::{execute, shrunk_output};
use crate::boundary::BoundaryPolicy;
use crate::buffer::{Buffer, ElemType, Span};
use crate::error::{PipelineError, Result};
use crate::exec::Realization;
use crate::graph::{FuncDef, ReductionDomain, StageGraph};
use crate::image::{ImageBufU8, ImageU8, ImageView};
use crate::kernel::{Kernel, KernelSynth};
use crate::schedule::{ParallelDim, ScheduleSpec, StageSchedule};
use serde::{Deserialize, Serialize};

pub const INPUT: &str = "input";
pub const IN_BOUNDED: &str = "in_bounded";
pub const SUM: &str = "sum";
pub const SUM_X: &str = "sum_x";
pub const SUM_Y: &str = "sum_y";
pub const OUTPUT: &str = "output";

const OUTPUT_SHIFT: u32 = 16;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaussianForm {
    #[default]
    Direct,
    Separable,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussianParams {
    pub sigma: f64,
    pub radius: i64,
    pub scale: u32,
    pub form: GaussianForm,
}

impl Default for GaussianParams {
    fn default() -> Self {
        Self {
            sigma: 1.5,
            radius: 4,
            scale: 255,
            form: GaussianForm::Direct,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GaussianBlur {
    params: GaussianParams,
    kernel: Kernel,
}

impl GaussianBlur {
    pub fn new(params: GaussianParams) -> Result<Self> {
        let worst = 255u64 * params.scale as u64 * params.scale as u64;
        if worst > u32::MAX as u64 {
            return Err(PipelineError::config(format!(
                "gaussian scale {} can overflow the u32 sums",
                params.scale
            )));
        }
        let kernel = KernelSynth::gaussian(params.sigma, params.radius, params.scale)?;
        log::debug!("gaussian kernel sigma={} taps={:?}", params.sigma, kernel.taps());
        Ok(Self { params, kernel })
    }

    pub fn params(&self) -> &GaussianParams {
        &self.params
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn graph(&self) -> Result<StageGraph> {
        let r = self.kernel.radius();
        let mut g = StageGraph::new();
        let input = g.input(INPUT, ElemType::U8, 1, BoundaryPolicy::Prepadded)?;
        let in_bounded = g.add(
            FuncDef::new(IN_BOUNDED, ElemType::U8)
                .reads(input, Span::new(r, r), Span::new(r, r))
                .pure(move |env, p| env.at(input, p.x + r, p.y + r, 0)),
        )?;

        let sum = match self.params.form {
            GaussianForm::Direct => {
                let k2 = self.kernel.outer();
                g.add(
                    FuncDef::new(SUM, ElemType::U32)
                        .reads(in_bounded, Span::radius(r), Span::radius(r))
                        .pure(|_, _| 0.0)
                        .update(
                            ReductionDomain::rect(Span::radius(r), Span::radius(r)),
                            move |env, p, rd, acc| {
                                let (i, j) = (rd[0], rd[1]);
                                let w = k2[((i + r) as usize, (j + r) as usize)] as f64;
                                acc + env.at(in_bounded, p.x + i, p.y + j, 0) * w
                            },
                        ),
                )?
            }
            GaussianForm::Separable => {
                let kx = self.kernel.clone();
                let sum_x = g.add(
                    FuncDef::new(SUM_X, ElemType::U32)
                        .reads(in_bounded, Span::radius(r), Span::ZERO)
                        .pure(move |env, p| {
                            (-r..=r)
                                .map(|i| env.at(in_bounded, p.x + i, p.y, 0) * kx.at(i) as f64)
                                .sum()
                        }),
                )?;
                let ky = self.kernel.clone();
                g.add(
                    FuncDef::new(SUM_Y, ElemType::U32)
                        .reads(sum_x, Span::ZERO, Span::radius(r))
                        .pure(move |env, p| {
                            (-r..=r)
                                .map(|j| env.at(sum_x, p.x, p.y + j, 0) * ky.at(j) as f64)
                                .sum()
                        }),
                )?
            }
        };

        let output = g.add(
            FuncDef::new(OUTPUT, ElemType::U8)
                .reads(sum, Span::ZERO, Span::ZERO)
                .pure(move |env, p| {
                    (env.at(sum, p.x, p.y, 0) as u64 >> OUTPUT_SHIFT) as f64
                }),
        )?;
        g.set_output(output)?;
        Ok(g)
    }

    pub fn default_schedule(&self) -> ScheduleSpec {
        match self.params.form {
            GaussianForm::Direct => ScheduleSpec::new().with(
                OUTPUT,
                StageSchedule::root()
                    .parallel(ParallelDim::Rows)
                    .vectorize(8),
            ),
            GaussianForm::Separable => ScheduleSpec::new()
                .with(SUM_X, StageSchedule::tiled_at(OUTPUT, 128, 32).vectorize(8))
                .with(
                    OUTPUT,
                    StageSchedule::root()
                        .parallel(ParallelDim::Tiles)
                        .vectorize(8),
                ),
        }
    }

    pub fn run(&self, input: &ImageU8<'_>) -> Result<ImageBufU8> {
        let schedule = self.default_schedule();
        Ok(self.run_with(input, &schedule)?.to_image())
    }

    pub fn run_with(&self, input: &ImageU8<'_>, schedule: &ScheduleSpec) -> Result<Realization> {
        let output = shrunk_output(input.width(), input.height(), self.kernel.radius())?;
        let graph = self.graph()?;
        let buffer = Buffer::from_view(input);
        execute("gaussian_blur", &graph, schedule, &[&buffer], output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_shrinks_by_radius() {
        let data = vec![200u8; 20 * 16];
        let img = ImageU8::gray(20, 16, &data);
        let out = GaussianBlur::new(GaussianParams::default())
            .unwrap()
            .run(&img)
            .unwrap();
        assert_eq!((out.width(), out.height()), (12, 8));
        // 200 * 255 * 255 >> 16 on a flat image
        let expected = (200u64 * 255 * 255 >> 16) as u8;
        assert!(out.data().iter().all(|&v| v == expected));
    }

    #[test]
    fn too_small_input_is_rejected() {
        let data = vec![0u8; 8 * 8];
        let img = ImageU8::gray(8, 8, &data);
        let err = GaussianBlur::new(GaussianParams::default())
            .unwrap()
            .run(&img)
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyOutput { .. }));
    }

    #[test]
    fn color_input_is_a_mismatch() {
        let data = vec![0u8; 16 * 16 * 3];
        let img = ImageU8::new(16, 16, 3, &data);
        let err = GaussianBlur::new(GaussianParams::default())
            .unwrap()
            .run(&img)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InputMismatch { .. }));
    }

    #[test]
    fn scale_that_overflows_the_sums_is_rejected() {
        for (scale, ok) in [(4104, true), (4105, false), (u32::MAX, false)] {
            let params = GaussianParams {
                scale,
                ..GaussianParams::default()
            };
            assert_eq!(GaussianBlur::new(params).is_ok(), ok, "{scale}");
        }
    }

    #[test]
    fn invalid_sigma_fails_at_construction() {
        let params = GaussianParams {
            sigma: 0.0,
            ..GaussianParams::default()
        };
        assert!(GaussianBlur::new(params).is_err());
    }
}
