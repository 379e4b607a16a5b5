//! Interfaces of the host collaborators: image source, stain profile
//! provider and annotation hierarchy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stainseg_core::{MultiPolygon, PixelCalibration, RasterError, Region, RgbImage};
use stainseg_ops::StainProfile;

use crate::annotation::Annotation;

/// Identifier of an object stored in a [`Hierarchy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

#[derive(thiserror::Error, Debug)]
pub enum ImageSourceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("region ({x}, {y}, {width}x{height}) lies outside the {image_width}x{image_height} image")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error(transparent)]
    Raster(#[from] RasterError),
}

/// Pixel provider for one image.
///
/// `read_region` blocks until the raster is available. The returned raster
/// must be `region.raster_width() x region.raster_height()`.
pub trait ImageSource {
    fn calibration(&self) -> PixelCalibration;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn read_region(&self, region: &Region) -> Result<RgbImage, ImageSourceError>;
}

/// Source of the run-wide stain profile.
pub trait StainProfileProvider {
    /// `Some` only for RGB brightfield images.
    fn stain_profile(&self) -> Option<StainProfile>;
}

impl StainProfileProvider for Option<StainProfile> {
    fn stain_profile(&self) -> Option<StainProfile> {
        self.clone()
    }
}

/// Image type as reported by the host, gating access to its stains.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrightfieldInfo {
    pub rgb: bool,
    pub brightfield: bool,
    pub stains: Option<StainProfile>,
}

impl StainProfileProvider for BrightfieldInfo {
    fn stain_profile(&self) -> Option<StainProfile> {
        if self.rgb && self.brightfield {
            self.stains.clone()
        } else {
            None
        }
    }
}

/// Top-level annotation as seen by region selection.
#[derive(Clone, Debug, PartialEq)]
pub struct RoiObject {
    pub id: ObjectId,
    pub classification: Option<String>,
    /// Geometry in full-resolution image coordinates.
    pub geometry: MultiPolygon,
}

/// Parameters of the host's whole-hierarchy refine pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineParams {
    pub min_fragment_size_microns: f64,
    pub max_hole_size_microns: f64,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("parent object {0:?} does not exist")]
    UnknownParent(ObjectId),

    #[error("operation was cancelled")]
    Cancelled,

    #[error("hierarchy operation failed: {0}")]
    Failed(String),
}

/// Annotation tree of the image. Writes go through `&mut self`, so a run
/// holds the only writer for its duration.
pub trait Hierarchy {
    /// Bring the hierarchy up to date before it is enumerated.
    fn refresh(&mut self) {}

    fn top_level_annotations(&self) -> Vec<RoiObject>;

    /// Insert `annotation`, below `parent` when given. `fire_update` asks the
    /// host to signal a children-changed event immediately.
    fn insert(
        &mut self,
        annotation: Annotation,
        parent: Option<ObjectId>,
        fire_update: bool,
    ) -> Result<ObjectId, HierarchyError>;

    /// Mark every object carrying `classification` as selected.
    fn select_by_classification(&mut self, classification: &str);

    /// Long-running refine over the whole tree. Implementations should poll
    /// `cancel` and return [`HierarchyError::Cancelled`] when it is set.
    fn refine_annotations(
        &mut self,
        params: &RefineParams,
        cancel: &CancelToken,
    ) -> Result<(), HierarchyError>;
}

/// Cloneable cancellation flag shared between a run and its controller.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stains_only_for_rgb_brightfield() {
        let mut info = BrightfieldInfo {
            rgb: true,
            brightfield: true,
            stains: Some(StainProfile::h_dab()),
        };
        assert!(info.stain_profile().is_some());
        info.brightfield = false;
        assert!(info.stain_profile().is_none());
        info.brightfield = true;
        info.rgb = false;
        assert!(info.stain_profile().is_none());
    }

    #[test]
    fn refine_params_use_host_names() {
        let json = serde_json::to_value(RefineParams {
            min_fragment_size_microns: 1000.0,
            max_hole_size_microns: 250.0,
        })
        .unwrap();
        assert_eq!(json["minFragmentSizeMicrons"], 1000.0);
        assert_eq!(json["maxHoleSizeMicrons"], 250.0);
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
