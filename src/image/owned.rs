//! Owned 8-bit image in row-major layout (stride == width * channels).
//!
//! Pipelines return this type; it converts to a borrowed [`ImageU8`] for
//! chaining and to the `image` crate's buffers for saving.
use super::{ImageU8, ImageView, ImageViewMut};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageBufU8 {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
}

impl ImageBufU8 {
    /// Zero-filled image.
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0; width * height * channels],
        }
    }

    /// Take ownership of raw interleaved samples.
    pub fn from_raw(width: usize, height: usize, channels: usize, data: Vec<u8>) -> Option<Self> {
        (data.len() == width * height * channels).then_some(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Borrow as a read-only `ImageU8` view
    pub fn as_view(&self) -> ImageU8<'_> {
        ImageU8::new(self.width, self.height, self.channels, &self.data)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, c: usize) -> u8 {
        self.data[(y * self.width + x) * self.channels + c]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, c: usize, v: u8) {
        let i = (y * self.width + x) * self.channels + c;
        self.data[i] = v;
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }
}

impl ImageView for ImageBufU8 {
    type Pixel = u8;

    fn width(&self) -> usize {
        self.width
    }
    fn height(&self) -> usize {
        self.height
    }
    fn channels(&self) -> usize {
        self.channels
    }
    fn stride(&self) -> usize {
        self.width * self.channels
    }
    fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride();
        &self.data[start..start + self.stride()]
    }
    fn as_slice(&self) -> Option<&[u8]> {
        Some(&self.data)
    }
}

impl ImageViewMut for ImageBufU8 {
    fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let stride = self.stride();
        let start = y * stride;
        &mut self.data[start..start + stride]
    }

    fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        Some(&mut self.data)
    }
}
