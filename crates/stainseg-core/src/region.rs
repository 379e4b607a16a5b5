//! Regions of the source image and their physical calibration.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Physical size of one full-resolution pixel, in microns.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PixelCalibration {
    pub pixel_width_um: f64,
    pub pixel_height_um: f64,
}

impl PixelCalibration {
    pub fn square(size_um: f64) -> Self {
        Self {
            pixel_width_um: size_um,
            pixel_height_um: size_um,
        }
    }

    /// Mean of the pixel width and height.
    #[inline]
    pub fn averaged_um(&self) -> f64 {
        0.5 * (self.pixel_width_um + self.pixel_height_um)
    }
}

impl Default for PixelCalibration {
    /// Uncalibrated images report one unit per pixel.
    fn default() -> Self {
        Self::square(1.0)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RegionError {
    #[error("region extent must be positive (width={width}, height={height})")]
    EmptyExtent { width: u32, height: u32 },

    #[error("downsample must be finite and > 0 (got {0})")]
    InvalidDownsample(f64),

    #[error("pixel size must be finite and > 0 (got {0})")]
    InvalidPixelSize(f64),
}

/// Number of raster pixels covering `extent` full-resolution pixels.
///
/// Rounds half up and never returns less than one pixel.
#[inline]
pub fn scaled_extent(extent: u32, downsample: f64) -> usize {
    (extent as f64 / downsample + 0.5).floor().max(1.0) as usize
}

/// Rectangle of the source image read at a given downsample.
///
/// `x`, `y`, `width`, `height` are in full-resolution pixels; `pixel_size_um`
/// is the physical size of one *raster* pixel (base calibration times
/// downsample).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub downsample: f64,
    pub pixel_size_um: f64,
}

impl Region {
    pub fn new(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        downsample: f64,
        calibration: &PixelCalibration,
    ) -> Result<Self, RegionError> {
        if width == 0 || height == 0 {
            return Err(RegionError::EmptyExtent { width, height });
        }
        if !downsample.is_finite() || downsample <= 0.0 {
            return Err(RegionError::InvalidDownsample(downsample));
        }
        let base = calibration.averaged_um();
        if !base.is_finite() || base <= 0.0 {
            return Err(RegionError::InvalidPixelSize(base));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
            downsample,
            pixel_size_um: base * downsample,
        })
    }

    /// Raster width at this region's downsample.
    #[inline]
    pub fn raster_width(&self) -> usize {
        scaled_extent(self.width, self.downsample)
    }

    #[inline]
    pub fn raster_height(&self) -> usize {
        scaled_extent(self.height, self.downsample)
    }

    /// Physical area of one raster pixel, in µm².
    #[inline]
    pub fn pixel_area_um2(&self) -> f64 {
        self.pixel_size_um * self.pixel_size_um
    }

    /// Map a raster coordinate into full-resolution image coordinates.
    ///
    /// Scales by the actual extent-to-raster ratio per axis, so the raster's
    /// far corner lands exactly on the region's far corner even when the
    /// extent is not a multiple of the downsample.
    #[inline]
    pub fn to_image(&self, p: Point2<f64>) -> Point2<f64> {
        let sx = f64::from(self.width) / self.raster_width() as f64;
        let sy = f64::from(self.height) / self.raster_height() as f64;
        Point2::new(f64::from(self.x) + p.x * sx, f64::from(self.y) + p.y * sy)
    }
}
