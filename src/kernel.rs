//! Fixed-point 1-D kernels for separable filtering.
//!
//! [`KernelSynth`] discretizes a continuous weight function over `[-r, r]`
//! and quantizes it to integers summing to a fixed-point scale `T` (255 for
//! 8-bit pipelines). Rounding each tap independently can drift the sum by a
//! few units for wide kernels, so the residual is folded into the centre tap:
//! the sum is exactly `T` and symmetry is preserved.
//!
//! Every [`Kernel`], including one deserialized from a config, has taps
//! summing to `T` or `T - 1`, so a normalized sum never exceeds the largest
//! input sample and no intermediate or 8-bit output can wrap.
use crate::error::{PipelineError, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Odd-length integer kernel with its normalization scale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawKernel")]
pub struct Kernel {
    taps: Vec<u32>,
    scale: u32,
}

/// Unchecked wire form; validated by [`Kernel::new`].
#[derive(Deserialize)]
struct RawKernel {
    taps: Vec<u32>,
    scale: u32,
}

impl TryFrom<RawKernel> for Kernel {
    type Error = PipelineError;

    fn try_from(raw: RawKernel) -> Result<Self> {
        Kernel::new(raw.taps, raw.scale)
    }
}

impl Kernel {
    pub fn new(taps: Vec<u32>, scale: u32) -> Result<Self> {
        if taps.is_empty() || taps.len() % 2 == 0 {
            return Err(PipelineError::config(format!(
                "kernel needs an odd number of taps, got {}",
                taps.len()
            )));
        }
        if scale == 0 {
            return Err(PipelineError::config("kernel scale must be positive"));
        }
        let sum: u64 = taps.iter().map(|&t| t as u64).sum();
        if sum > scale as u64 || sum + 1 < scale as u64 {
            return Err(PipelineError::config(format!(
                "kernel taps sum to {sum}, expected {scale} or {}",
                scale - 1
            )));
        }
        Ok(Self { taps, scale })
    }

    /// Unweighted average over `2r + 1` taps.
    pub fn box_filter(radius: usize) -> Self {
        let len = 2 * radius + 1;
        Self {
            taps: vec![1; len],
            scale: len as u32,
        }
    }

    /// Identity kernel: a single unit tap at the centre.
    pub fn delta(radius: usize) -> Self {
        let mut taps = vec![0; 2 * radius + 1];
        taps[radius] = 1;
        Self { taps, scale: 1 }
    }

    pub fn taps(&self) -> &[u32] {
        &self.taps
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn radius(&self) -> i64 {
        (self.taps.len() / 2) as i64
    }

    pub fn sum(&self) -> u64 {
        self.taps.iter().map(|&t| t as u64).sum()
    }

    /// Tap at signed offset `k ∈ [-r, r]`.
    #[inline]
    pub fn at(&self, k: i64) -> u32 {
        self.taps[(k + self.radius()) as usize]
    }

    pub fn is_symmetric(&self) -> bool {
        self.taps.iter().eq(self.taps.iter().rev())
    }

    /// 2-D kernel `k · kᵀ` used by the direct (non-separable) convolution.
    pub fn outer(&self) -> DMatrix<u32> {
        let v = DVector::from_column_slice(&self.taps);
        &v * v.transpose()
    }
}

/// Builder for normalized fixed-point kernels.
pub struct KernelSynth;

impl KernelSynth {
    /// Quantize `weight(i)` for `i ∈ [-radius, radius]` to integers summing to `scale`.
    pub fn synthesize(
        weight: impl Fn(f64) -> f64,
        radius: i64,
        scale: u32,
    ) -> Result<Kernel> {
        if radius < 0 {
            return Err(PipelineError::config(format!(
                "kernel radius must be non-negative, got {radius}"
            )));
        }
        if scale == 0 {
            return Err(PipelineError::config("kernel scale must be positive"));
        }
        let weights: Vec<f64> = (-radius..=radius).map(|i| weight(i as f64)).collect();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(PipelineError::config(
                "kernel weights must be finite and non-negative",
            ));
        }
        let normalizer: f64 = weights.iter().sum();
        if normalizer <= 0.0 {
            return Err(PipelineError::config("kernel weights sum to zero"));
        }

        let mut taps: Vec<i64> = weights
            .iter()
            .map(|w| (w * scale as f64 / normalizer).round() as i64)
            .collect();
        let residual = scale as i64 - taps.iter().sum::<i64>();
        let centre = radius as usize;
        taps[centre] += residual;
        if taps[centre] < 0 {
            return Err(PipelineError::config(
                "kernel scale too small for the requested support",
            ));
        }
        Kernel::new(taps.into_iter().map(|t| t as u32).collect(), scale)
    }

    /// Discretized Gaussian `exp(-i² / 2σ²)`.
    pub fn gaussian(sigma: f64, radius: i64, scale: u32) -> Result<Kernel> {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(PipelineError::config(format!(
                "gaussian sigma must be positive, got {sigma}"
            )));
        }
        let denom = 2.0 * sigma * sigma;
        Self::synthesize(|i| (-(i * i) / denom).exp(), radius, scale)
    }
}
