//! Integer rectangles and offset spans used for bound inference.
use serde::{Deserialize, Serialize};

/// Inclusive range of integer offsets, e.g. `[-2, 2]` for a 5-tap stencil.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub lo: i64,
    pub hi: i64,
}

impl Span {
    /// The single offset `0`.
    pub const ZERO: Span = Span { lo: 0, hi: 0 };

    pub const fn new(lo: i64, hi: i64) -> Self {
        Self { lo, hi }
    }

    /// Symmetric span `[-r, r]`.
    pub const fn radius(r: i64) -> Self {
        Self { lo: -r, hi: r }
    }

    /// Offsets of a half-open range `[start, end)`.
    pub const fn half_open(start: i64, end: i64) -> Self {
        Self {
            lo: start,
            hi: end - 1,
        }
    }

    pub fn shift(self, by: i64) -> Self {
        Self {
            lo: self.lo + by,
            hi: self.hi + by,
        }
    }

    pub fn width(&self) -> i64 {
        self.hi - self.lo + 1
    }
}

/// Axis-aligned rectangle `[x, x+w) × [y, y+h)` with a signed origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

impl Region {
    pub const fn new(x: i64, y: i64, w: i64, h: i64) -> Self {
        Self { x, y, w, h }
    }

    /// Region anchored at the origin.
    pub const fn from_size(w: i64, h: i64) -> Self {
        Self { x: 0, y: 0, w, h }
    }

    #[inline]
    pub fn x_end(&self) -> i64 {
        self.x + self.w
    }

    #[inline]
    pub fn y_end(&self) -> i64 {
        self.y + self.h
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    pub fn area(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            (self.w as u64) * (self.h as u64)
        }
    }

    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.x && x < self.x_end() && y >= self.y && y < self.y_end()
    }

    pub fn contains_region(&self, other: &Region) -> bool {
        other.is_empty()
            || (other.x >= self.x
                && other.y >= self.y
                && other.x_end() <= self.x_end()
                && other.y_end() <= self.y_end())
    }

    /// Smallest region covering both; empty operands are ignored.
    pub fn union(&self, other: &Region) -> Region {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let x_end = self.x_end().max(other.x_end());
        let y_end = self.y_end().max(other.y_end());
        Region::new(x, y, x_end - x, y_end - y)
    }

    pub fn intersect(&self, other: &Region) -> Option<Region> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let x_end = self.x_end().min(other.x_end());
        let y_end = self.y_end().min(other.y_end());
        let r = Region::new(x, y, x_end - x, y_end - y);
        (!r.is_empty()).then_some(r)
    }

    /// Region read by a consumer covering `self` through offsets `dx × dy`.
    pub fn expand(&self, dx: Span, dy: Span) -> Region {
        Region::new(
            self.x + dx.lo,
            self.y + dy.lo,
            self.w + dx.hi - dx.lo,
            self.h + dy.hi - dy.lo,
        )
    }

    /// Row-major tiles of at most `tw × th`; edge tiles are clipped.
    pub fn tiles(&self, tw: i64, th: i64) -> Vec<Region> {
        if self.is_empty() {
            return Vec::new();
        }
        let tw = tw.max(1);
        let th = th.max(1);
        let mut out = Vec::new();
        let mut ty = self.y;
        while ty < self.y_end() {
            let h = th.min(self.y_end() - ty);
            let mut tx = self.x;
            while tx < self.x_end() {
                let w = tw.min(self.x_end() - tx);
                out.push(Region::new(tx, ty, w, h));
                tx += tw;
            }
            ty += th;
        }
        out
    }
}
