//! Per-region image operations for stain-threshold segmentation.
//!
//! Each module implements one pipeline stage and is independent of the
//! annotation store:
//! - [`channel`]: RGB raster to a scalar stain channel (optical-density sum or
//!   colour deconvolution against a [`StainProfile`]),
//! - [`blur`]: calibrated Gaussian smoothing,
//! - [`threshold`]: Otsu automatic threshold and binary mask,
//! - [`contour`]: mask boundary tracing into polygons with holes,
//! - [`refine`]: removal of small fragments and small holes,
//! - [`stats`]: intensity statistics inside a traced geometry.

pub mod blur;
pub mod channel;
pub mod contour;
pub mod refine;
pub mod stains;
pub mod stats;
pub mod threshold;

pub use blur::{blur, gaussian_blur_px, GaussianKernel};
pub use channel::{extract, optical_density, ChannelMethod, ExtractSkip};
pub use contour::trace;
pub use refine::refine;
pub use stains::{StainError, StainProfile, StainVector};
pub use stats::{measure, RegionStats};
pub use threshold::{between_class_variance, otsu_split, threshold, Histogram, OtsuResult};
