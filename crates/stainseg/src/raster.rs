//! Adapters between `image` buffers and the pipeline rasters.

use image::imageops::{self, FilterType};
use stainseg_core::{PixelCalibration, RasterError, Region, RgbImageView};

use crate::host::{ImageSource, ImageSourceError};

/// Borrow an `image::RgbImage` as a pipeline RGB view.
pub fn rgb_view(img: &image::RgbImage) -> Result<RgbImageView<'_>, RasterError> {
    RgbImageView::new(img.width() as usize, img.height() as usize, img.as_raw())
}

/// [`ImageSource`] over a decoded in-memory image.
///
/// Regions are cropped at full resolution and resampled with a triangle
/// filter to the region's raster size.
#[derive(Clone, Debug)]
pub struct RgbImageSource {
    image: image::RgbImage,
    calibration: PixelCalibration,
}

impl RgbImageSource {
    pub fn new(image: image::RgbImage, calibration: PixelCalibration) -> Self {
        Self { image, calibration }
    }

    pub fn image(&self) -> &image::RgbImage {
        &self.image
    }
}

impl ImageSource for RgbImageSource {
    fn calibration(&self) -> PixelCalibration {
        self.calibration
    }

    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn read_region(&self, region: &Region) -> Result<stainseg_core::RgbImage, ImageSourceError> {
        let (iw, ih) = self.image.dimensions();
        let fits = u64::from(region.x) + u64::from(region.width) <= u64::from(iw)
            && u64::from(region.y) + u64::from(region.height) <= u64::from(ih);
        if !fits {
            return Err(ImageSourceError::OutOfBounds {
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
                image_width: iw,
                image_height: ih,
            });
        }

        let crop =
            imageops::crop_imm(&self.image, region.x, region.y, region.width, region.height)
                .to_image();
        let (w, h) = (region.raster_width(), region.raster_height());
        let scaled = if (w as u32, h as u32) == crop.dimensions() {
            crop
        } else {
            imageops::resize(&crop, w as u32, h as u32, FilterType::Triangle)
        };
        Ok(stainseg_core::RgbImage::from_raw(w, h, scaled.into_raw())?)
    }
}
