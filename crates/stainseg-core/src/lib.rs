//! Core types and utilities for stain-threshold segmentation.
//!
//! This crate is intentionally small. It holds the raster containers that flow
//! between pipeline stages, the polygon geometry produced by contour tracing,
//! and the region/calibration model that ties a raster to physical units.
//! It does *not* depend on any concrete image decoder or annotation store.

mod geometry;
mod image;
mod logger;
mod region;

pub use geometry::{Bounds, MultiPolygon, Polygon, Ring};
pub use image::{Mask, RasterError, RgbImage, RgbImageView, ScalarImage};
pub use region::{scaled_extent, PixelCalibration, Region, RegionError};

#[cfg(feature = "tracing")]
pub use logger::{init_tracing, DEFAULT_TRACING_FILTER};

pub use logger::{init_from_env, init_with_level};
