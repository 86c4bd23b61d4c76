/// Borrowed 8-bit image with interleaved channels.
#[derive(Clone, Debug)]
pub struct ImageU8<'a> {
    pub w: usize,
    pub h: usize,
    pub channels: usize,
    pub stride: usize, // samples between rows
    pub data: &'a [u8],
}

impl<'a> ImageU8<'a> {
    /// Tightly packed view (`stride == w * channels`).
    pub fn new(w: usize, h: usize, channels: usize, data: &'a [u8]) -> Self {
        Self {
            w,
            h,
            channels,
            stride: w * channels,
            data,
        }
    }

    /// Tightly packed single-channel view.
    pub fn gray(w: usize, h: usize, data: &'a [u8]) -> Self {
        Self::new(w, h, 1, data)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, c: usize) -> u8 {
        self.data[y * self.stride + x * self.channels + c]
    }
}

impl<'a> crate::image::traits::ImageView for ImageU8<'a> {
    type Pixel = u8;

    #[inline]
    fn width(&self) -> usize {
        self.w
    }
    #[inline]
    fn height(&self) -> usize {
        self.h
    }
    #[inline]
    fn channels(&self) -> usize {
        self.channels
    }
    #[inline]
    fn stride(&self) -> usize {
        self.stride
    }
    #[inline]
    fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.data[start..start + self.w * self.channels]
    }
    #[inline]
    fn as_slice(&self) -> Option<&[u8]> {
        let len = self.w * self.h * self.channels;
        (self.stride == self.w * self.channels).then(|| &self.data[..len])
    }
}
