//! Dense typed buffers addressed in absolute coordinates.
//!
//! A [`Buffer`] covers a [`Region`] (which need not start at the origin, so a
//! tile of an intermediate stage is stored with its own offset) times a fixed
//! number of interleaved channels. Storage is typed by [`ElemType`]; reads and
//! writes go through `f64`, with writes narrowed to the element type.

pub mod elem;
pub mod region;

pub use elem::{ElemType, Samples};
pub use region::{Region, Span};

use crate::error::{PipelineError, Result};
use crate::image::{ImageBufU8, ImageView, ImageViewMut};

#[derive(Clone, Debug, PartialEq)]
pub struct Buffer {
    region: Region,
    channels: usize,
    data: Samples,
}

impl Buffer {
    /// Zero-initialized buffer over `region`.
    pub fn new(elem: ElemType, region: Region, channels: usize) -> Self {
        let len = region.area() as usize * channels;
        Self {
            region,
            channels,
            data: Samples::zeroed(elem, len),
        }
    }

    /// Wrap interleaved 8-bit samples anchored at the origin.
    pub fn from_u8(width: usize, height: usize, channels: usize, data: Vec<u8>) -> Result<Self> {
        let expected = width * height * channels;
        if data.len() != expected {
            return Err(PipelineError::config(format!(
                "buffer of {width}x{height}x{channels} needs {expected} samples, got {}",
                data.len()
            )));
        }
        Ok(Self {
            region: Region::from_size(width as i64, height as i64),
            channels,
            data: Samples::U8(data),
        })
    }

    /// Copy an 8-bit image view into an owned buffer.
    pub fn from_view<V: ImageView<Pixel = u8>>(view: &V) -> Self {
        let mut data = Vec::with_capacity(view.width() * view.height() * view.channels());
        for row in view.rows() {
            data.extend_from_slice(row);
        }
        Self {
            region: Region::from_size(view.width() as i64, view.height() as i64),
            channels: view.channels(),
            data: Samples::U8(data),
        }
    }

    pub fn elem(&self) -> ElemType {
        self.data.elem()
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn width(&self) -> usize {
        self.region.w as usize
    }

    pub fn height(&self) -> usize {
        self.region.h as usize
    }

    pub fn samples(&self) -> &Samples {
        &self.data
    }

    #[inline]
    fn index(&self, x: i64, y: i64, c: usize) -> usize {
        let lx = (x - self.region.x) as usize;
        let ly = (y - self.region.y) as usize;
        (ly * self.region.w as usize + lx) * self.channels + c
    }

    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        self.region.contains(x, y)
    }

    /// Sample at absolute coordinates. Panics when out of the region.
    #[inline]
    pub fn get(&self, x: i64, y: i64, c: usize) -> f64 {
        debug_assert!(self.contains(x, y) && c < self.channels);
        self.data.get(self.index(x, y, c))
    }

    /// Store `value` narrowed to the buffer's element type.
    #[inline]
    pub fn set(&mut self, x: i64, y: i64, c: usize, value: f64) {
        let i = self.index(x, y, c);
        let elem = self.data.elem();
        self.data.set(i, elem.narrow(value));
    }

    /// Copy the part of `src` that overlaps this buffer.
    pub fn blit(&mut self, src: &Buffer) {
        debug_assert_eq!(self.channels, src.channels);
        let Some(overlap) = self.region.intersect(&src.region) else {
            return;
        };
        let len = overlap.w as usize * self.channels;
        for y in overlap.y..overlap.y_end() {
            let dst_at = self.index(overlap.x, y, 0);
            let src_at = src.index(overlap.x, y, 0);
            self.data.copy_span(dst_at, &src.data, src_at, len);
        }
    }

    /// Borrow 8-bit storage, if that is the element type.
    pub fn as_u8(&self) -> Option<&[u8]> {
        match &self.data {
            Samples::U8(v) => Some(v),
            _ => None,
        }
    }

    /// Convert to an owned 8-bit image, narrowing other element types.
    pub fn to_image(&self) -> ImageBufU8 {
        let mut out = ImageBufU8::new(self.width(), self.height(), self.channels);
        if let Some(bytes) = self.as_u8() {
            out.data_mut().copy_from_slice(bytes);
            return out;
        }
        for ly in 0..self.height() {
            let y = self.region.y + ly as i64;
            let row = out.row_mut(ly);
            for (lx, px) in row.chunks_exact_mut(self.channels).enumerate() {
                let x = self.region.x + lx as i64;
                for (c, v) in px.iter_mut().enumerate() {
                    *v = ElemType::U8.narrow(self.get(x, y, c)) as u8;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blit_copies_overlap_at_absolute_coordinates() {
        let mut dst = Buffer::new(ElemType::U16, Region::new(0, 0, 6, 4), 2);
        let mut tile = Buffer::new(ElemType::U16, Region::new(4, 2, 4, 4), 2);
        for y in 2..6 {
            for x in 4..8 {
                tile.set(x, y, 1, (x * 10 + y) as f64);
            }
        }
        dst.blit(&tile);
        assert_eq!(dst.get(5, 3, 1), 53.0);
        assert_eq!(dst.get(4, 2, 1), 42.0);
        assert_eq!(dst.get(4, 2, 0), 0.0);
        assert_eq!(dst.get(3, 3, 1), 0.0);
    }

    #[test]
    fn set_narrows_to_element_type() {
        let mut b = Buffer::new(ElemType::U8, Region::new(-2, -2, 3, 3), 1);
        b.set(-2, -1, 0, 300.0);
        assert_eq!(b.get(-2, -1, 0), 44.0);
        assert!(b.contains(0, 0));
        assert!(!b.contains(1, 0));
    }

    #[test]
    fn from_u8_rejects_wrong_length() {
        assert!(Buffer::from_u8(4, 4, 3, vec![0; 47]).is_err());
        let b = Buffer::from_u8(2, 1, 3, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(b.get(1, 0, 2), 6.0);
    }
}
