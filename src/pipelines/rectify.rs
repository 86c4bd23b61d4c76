//! Remap-driven rectification for the stereo pipeline.
//!
//! A remap image stores per-pixel displacements in sixteenths of a pixel,
//! biased by 128: channel 0 is the x offset, channel 1 the y offset. The
//! rectified value is a bilinear sample of image channel 1 at the displaced
//! position.
//!
//! - `Passthrough` ignores the remap and reads channel 1 directly.
//! - `Float` splits offsets with `floor` and interpolates in f32.
//! - `Fixed` splits offsets with integer floor division and interpolates with
//!   weights in 1/256, rounding each lerp: within one level of `Float`.
//!
//! Fixed-point weights are in 1/256 on purpose, not 8-bit weights normalized
//! by 255. A half-pixel offset then maps to exactly 128/256, so `Fixed` equals
//! `Float` whenever the float lerp is an integer, and the two modes are
//! interchangeable in schedule and parity tests.
use crate::buffer::{ElemType, Span};
use crate::graph::{FuncDef, StageId};
use serde::{Deserialize, Serialize};

/// Remap value meaning "no displacement".
pub const REMAP_ZERO: u8 = 128;
/// Image channel sampled by every mode.
const CHANNEL: usize = 1;
/// Largest whole-pixel displacement reachable from a u8 remap.
const REACH: i64 = 8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rectification {
    #[default]
    Passthrough,
    Float,
    Fixed,
}

impl Rectification {
    pub fn elem(self) -> ElemType {
        match self {
            Rectification::Float => ElemType::F32,
            Rectification::Passthrough | Rectification::Fixed => ElemType::U8,
        }
    }

    /// Stage rectifying `image` through `remap`.
    pub fn stage(self, name: &str, image: StageId, remap: StageId) -> FuncDef {
        let def = FuncDef::new(name, self.elem());
        match self {
            Rectification::Passthrough => def
                .reads(image, Span::ZERO, Span::ZERO)
                .pure(move |env, p| env.at(image, p.x, p.y, CHANNEL)),
            Rectification::Float => def
                .reads(image, Span::new(-REACH, REACH), Span::new(-REACH, REACH))
                .reads(remap, Span::ZERO, Span::ZERO)
                .pure(move |env, p| {
                    let (tx, wx) = float_offset(env.at(remap, p.x, p.y, 0) as u8);
                    let (ty, wy) = float_offset(env.at(remap, p.x, p.y, 1) as u8);
                    let s = |dx, dy| env.at(image, p.x + tx + dx, p.y + ty + dy, CHANNEL) as f32;
                    bilinear_f32([s(0, 0), s(1, 0), s(0, 1), s(1, 1)], wx, wy) as f64
                }),
            Rectification::Fixed => def
                .reads(image, Span::new(-REACH, REACH), Span::new(-REACH, REACH))
                .reads(remap, Span::ZERO, Span::ZERO)
                .pure(move |env, p| {
                    let (tx, wx) = fixed_offset(env.at(remap, p.x, p.y, 0) as u8);
                    let (ty, wy) = fixed_offset(env.at(remap, p.x, p.y, 1) as u8);
                    let s = |dx, dy| env.at(image, p.x + tx + dx, p.y + ty + dy, CHANNEL) as u32;
                    bilinear_fixed([s(0, 0), s(1, 0), s(0, 1), s(1, 1)], wx, wy) as f64
                }),
        }
    }
}

/// Whole-pixel offset and fractional weight of a remap sample.
pub fn float_offset(remap: u8) -> (i64, f32) {
    let offset = (remap as i16 - REMAP_ZERO as i16) as f32 / 16.0;
    let whole = offset.floor();
    (whole as i64, offset - whole)
}

/// Whole-pixel offset and weight in 1/256 of a remap sample.
pub fn fixed_offset(remap: u8) -> (i64, u32) {
    let d = remap as i64 - REMAP_ZERO as i64;
    (d.div_euclid(16), (d.rem_euclid(16) * 16) as u32)
}

#[inline]
fn lerp_f32(a: f32, b: f32, w: f32) -> f32 {
    a * (1.0 - w) + b * w
}

/// `w` is in 1/256 (0..=255), not 1/255.
#[inline]
fn lerp_fixed(a: u32, b: u32, w: u32) -> u32 {
    (a * (256 - w) + b * w + 128) >> 8
}

/// `[top-left, top-right, bottom-left, bottom-right]` interpolated in f32.
pub fn bilinear_f32(q: [f32; 4], wx: f32, wy: f32) -> f32 {
    lerp_f32(lerp_f32(q[0], q[1], wx), lerp_f32(q[2], q[3], wx), wy)
}

/// Fixed-point counterpart of [`bilinear_f32`] with weights in 1/256.
pub fn bilinear_fixed(q: [u32; 4], wx: u32, wy: u32) -> u32 {
    lerp_fixed(lerp_fixed(q[0], q[1], wx), lerp_fixed(q[2], q[3], wx), wy)
}
