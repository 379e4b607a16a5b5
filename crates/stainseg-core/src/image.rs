//! Raster containers shared by the pipeline stages.
//!
//! All rasters are row-major. RGB data is interleaved 8-bit, scalar data is
//! `f32`, masks are one `bool` per pixel.

/// Errors raised when wrapping raw pixel buffers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RasterError {
    #[error("invalid raster buffer length (expected {expected}, got {got})")]
    BufferLength { expected: usize, got: usize },

    #[error("invalid raster dimensions (width={width}, height={height})")]
    Dimensions { width: usize, height: usize },
}

fn expected_len(width: usize, height: usize, channels: usize) -> Result<usize, RasterError> {
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels))
        .ok_or(RasterError::Dimensions { width, height })
}

/// Borrowed interleaved RGB raster.
#[derive(Clone, Copy, Debug)]
pub struct RgbImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h*3
}

impl<'a> RgbImageView<'a> {
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Result<Self, RasterError> {
        let expected = expected_len(width, height, 3)?;
        if data.len() != expected {
            return Err(RasterError::BufferLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = 3 * (y * self.width + x);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Iterate pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + 'a {
        self.data.chunks_exact(3).map(|c| [c[0], c[1], c[2]])
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Owned interleaved RGB raster, as returned by an image source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl RgbImage {
    /// Raster filled with a single colour.
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, RasterError> {
        RgbImageView::new(width, height, &data)?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn put_pixel(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let i = 3 * (y * self.width + x);
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    #[inline]
    pub fn view(&self) -> RgbImageView<'_> {
        RgbImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

/// Single-channel floating point raster (stain intensity, optical density, ...).
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl ScalarImage {
    pub fn new_fill(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Result<Self, RasterError> {
        let expected = expected_len(width, height, 1)?;
        if data.len() != expected {
            return Err(RasterError::BufferLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        self.data[y * self.width + x] = v;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Minimum and maximum over finite samples; `None` if there are none.
    pub fn finite_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Binary raster. `true` marks foreground.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<bool>,
}

impl Mask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![false; width * height],
        }
    }

    /// Foreground test with out-of-bounds treated as background.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return false;
        }
        self.data[y as usize * self.width + x as usize]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: bool) {
        self.data[y * self.width + x] = v;
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }
}
