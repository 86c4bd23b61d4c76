//! Boundary conditions for input stages.
//!
//! Every pipeline reads its raw inputs through a [`BoundaryPolicy`] so that
//! neighbourhood accesses near the border never index outside the buffer.
//!
//! - `ClampToEdge` replicates the outermost row/column.
//! - `ConstantExterior(v)` yields `v` for every coordinate outside.
//! - `Prepadded` assumes the caller only reads inside (the pipeline shrinks
//!   its output instead). The executor rejects plans that would read outside
//!   such an input; `resolve` still clamps so it stays total.
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    ClampToEdge,
    ConstantExterior(f64),
    Prepadded,
}

/// Result of resolving one coordinate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    /// Read the input at this in-range index.
    At(usize),
    /// Use this value instead of reading.
    Fill(f64),
}

impl BoundaryPolicy {
    /// Map `coord` onto `[0, extent)`, or to a fill value.
    ///
    /// An empty extent has no valid index: clamping policies fall back to a
    /// zero fill there.
    #[inline]
    pub fn resolve(&self, coord: i64, extent: usize) -> Sample {
        if extent == 0 {
            return match *self {
                BoundaryPolicy::ConstantExterior(v) => Sample::Fill(v),
                _ => Sample::Fill(0.0),
            };
        }
        let inside = coord >= 0 && (coord as u64) < extent as u64;
        match *self {
            BoundaryPolicy::ConstantExterior(v) if !inside => Sample::Fill(v),
            _ if inside => Sample::At(coord as usize),
            _ => Sample::At(clamp_index(coord, extent)),
        }
    }

    /// Whether reading outside the extent is part of the policy's contract.
    pub fn handles_exterior(&self) -> bool {
        !matches!(self, BoundaryPolicy::Prepadded)
    }
}

#[inline]
fn clamp_index(idx: i64, upper: usize) -> usize {
    if idx < 0 {
        0
    } else if (idx as u64) >= upper as u64 {
        upper - 1
    } else {
        idx as usize
    }
}
