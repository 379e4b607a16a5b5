//! Region-based stain thresholding for whole-slide images.
//!
//! For every selected region of an image this crate derives a scalar stain
//! channel, smooths it at a physical scale, splits it with Otsu's method and
//! turns the foreground into a refined, measured and classified annotation
//! inside the host's object hierarchy.
//!
//! ## Quickstart
//!
//! ```no_run
//! use stainseg::{CancelToken, MemoryHierarchy, RgbImageSource, ThresholdConfig, ThresholdPipeline};
//! use stainseg::core::PixelCalibration;
//! use stainseg::ops::StainProfile;
//! use image::ImageReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = ImageReader::open("slide_region.png")?.decode()?.to_rgb8();
//! let source = RgbImageSource::new(img, PixelCalibration::square(0.5));
//! let config = ThresholdConfig { roi: None, ..ThresholdConfig::default() };
//!
//! let pipeline = ThresholdPipeline::new(config, source, Some(StainProfile::h_dab()))?;
//! let mut hierarchy = MemoryHierarchy::new();
//! let report = pipeline.run(&mut hierarchy, &CancelToken::new())?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `stainseg::core`: rasters, geometry, regions and logging setup.
//! - `stainseg::ops`: the per-region stages (channel, blur, threshold, trace,
//!   refine, statistics).
//! - [`ThresholdConfig`]: run parameters with JSON load/save.
//! - [`ImageSource`], [`StainProfileProvider`], [`Hierarchy`]: host
//!   collaborators; [`MemoryHierarchy`] and (feature `image`)
//!   [`RgbImageSource`] are in-memory implementations.
//! - [`ThresholdPipeline`]: the runner, producing a [`RunReport`].

pub use stainseg_core as core;
pub use stainseg_ops as ops;

pub mod annotation;
mod config;
mod host;
mod memory;
mod pipeline;
pub mod select;

#[cfg(feature = "image")]
mod raster;

pub use annotation::{Annotation, AnnotationError, MeasurementList};
pub use config::{ConfigError, ConfigIoError, ThresholdConfig};
pub use host::{
    BrightfieldInfo, CancelToken, Hierarchy, HierarchyError, ImageSource, ImageSourceError,
    ObjectId, RefineParams, RoiObject, StainProfileProvider,
};
pub use memory::MemoryHierarchy;
pub use pipeline::{
    RegionOutcome, RegionReport, RegionState, RunContext, RunError, RunReport, RunReportIoError,
    SkipReason, ThresholdPipeline,
};

#[cfg(feature = "image")]
pub use raster::{rgb_view, RgbImageSource};
