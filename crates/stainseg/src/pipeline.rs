//! Per-region pipeline runner and its run report.

use std::{fmt, fs, path::Path};

use serde::{Deserialize, Serialize};
use stainseg_core::{MultiPolygon, PixelCalibration, RasterError, Region, RgbImageView};
use stainseg_ops::{ChannelMethod, ExtractSkip, StainProfile};

use crate::annotation;
use crate::config::{ConfigError, ThresholdConfig};
use crate::host::{
    CancelToken, Hierarchy, HierarchyError, ImageSource, ImageSourceError, ObjectId,
    RefineParams, StainProfileProvider,
};
use crate::select;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Stages a region passes through, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RegionState {
    Selected,
    Extracted,
    Smoothed,
    Thresholded,
    Contoured,
    Refined,
    Annotated,
    Inserted,
}

/// Why a region ended without an annotation.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SkipReason {
    #[error("{0}")]
    Extract(ExtractSkip),
    #[error("raster has a single value, nothing to threshold")]
    NoThreshold,
    #[error("no foreground pixels above the threshold")]
    NoForeground,
    #[error("every fragment is below the minimum area")]
    AllFragmentsRemoved,
    #[error("refined geometry covers no pixel centre")]
    NoCoveredPixels,
}

/// Terminal state of one region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RegionOutcome {
    Inserted {
        object: ObjectId,
        threshold: f64,
        area_um2: f64,
    },
    Skipped {
        /// Last stage the region completed.
        at: RegionState,
        reason: SkipReason,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionReport {
    pub region: Region,
    pub parent: Option<ObjectId>,
    pub outcome: RegionOutcome,
}

impl RegionReport {
    /// Last stage the region reached.
    pub fn state(&self) -> RegionState {
        match self.outcome {
            RegionOutcome::Inserted { .. } => RegionState::Inserted,
            RegionOutcome::Skipped { at, .. } => at,
        }
    }
}

/// What a run did, region by region, in processing order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub regions: Vec<RegionReport>,
    /// Whether the hierarchy-wide refine pass completed.
    pub hierarchy_refined: bool,
}

impl RunReport {
    pub fn inserted(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.regions.iter().filter_map(|r| match r.outcome {
            RegionOutcome::Inserted { object, .. } => Some(object),
            RegionOutcome::Skipped { .. } => None,
        })
    }

    pub fn inserted_count(&self) -> usize {
        self.inserted().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.regions.len() - self.inserted_count()
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), RunReportIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} region(s): {} inserted, {} skipped",
            self.regions.len(),
            self.inserted_count(),
            self.skipped_count()
        )
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RunReportIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("channel deconvolution needs an RGB brightfield image with stains")]
    StainsUnavailable,

    #[error("failed to read region ({}, {}, {}x{})", region.x, region.y, region.width, region.height)]
    ImageSource {
        region: Region,
        #[source]
        source: ImageSourceError,
    },

    #[error("image source returned a {got_width}x{got_height} raster, expected {width}x{height}")]
    RasterSize {
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },

    #[error("image source returned a malformed raster for region ({}, {})", region.x, region.y)]
    RasterBuffer {
        region: Region,
        #[source]
        source: RasterError,
    },

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error("run cancelled ({0})")]
    Cancelled(Box<RunReport>),
}

/// Read-only values shared by every region of one run.
#[derive(Clone, Copy, Debug)]
pub struct RunContext<'a> {
    pub config: &'a ThresholdConfig,
    pub stains: Option<&'a StainProfile>,
    pub calibration: PixelCalibration,
}

/// Thresholds every selected region of one image and stores the results.
///
/// Regions are handled one at a time: each is read, reduced to a scalar
/// channel, smoothed, thresholded, traced, refined, measured and inserted
/// before the next one starts. Empty intermediate results skip the region;
/// collaborator failures end the run.
#[derive(Clone, Debug)]
pub struct ThresholdPipeline<S, P> {
    config: ThresholdConfig,
    source: S,
    stains: P,
}

impl<S: ImageSource, P: StainProfileProvider> ThresholdPipeline<S, P> {
    pub fn new(config: ThresholdConfig, source: S, stains: P) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            stains,
        })
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(roi = ?self.config.roi))
    )]
    pub fn run<H: Hierarchy + ?Sized>(
        &self,
        hierarchy: &mut H,
        cancel: &CancelToken,
    ) -> Result<RunReport, RunError> {
        let profile = self.stains.stain_profile();
        if self.config.channel_method == ChannelMethod::Deconvolution && profile.is_none() {
            log::warn!("deconvolution requested but the image has no stain profile");
            return Err(RunError::StainsUnavailable);
        }
        let ctx = RunContext {
            config: &self.config,
            stains: profile.as_ref(),
            calibration: self.source.calibration(),
        };

        hierarchy.refresh();
        let regions = select::enumerate(
            &*hierarchy,
            ctx.config.roi.as_deref(),
            ctx.config.downsample,
            self.source.width(),
            self.source.height(),
            &ctx.calibration,
        );
        log::info!(
            "thresholding {} region(s) as `{}` at downsample {}",
            regions.len(),
            ctx.config.target_class,
            ctx.config.downsample
        );

        let mut report = RunReport::default();
        for (region, parent) in regions {
            if cancel.is_cancelled() {
                log::info!("run cancelled after {} region(s)", report.regions.len());
                return Err(RunError::Cancelled(Box::new(report)));
            }
            let outcome = self.process_region(&ctx, &region, parent, hierarchy)?;
            if let RegionOutcome::Skipped { at, reason } = &outcome {
                log::info!("region at ({}, {}) skipped after {at:?}: {reason}", region.x, region.y);
            }
            report.regions.push(RegionReport {
                region,
                parent,
                outcome,
            });
        }

        if report.inserted_count() > 0 {
            hierarchy.select_by_classification(&ctx.config.target_class);
        }

        let params = RefineParams {
            min_fragment_size_microns: ctx.config.min_fragment_um2,
            max_hole_size_microns: ctx.config.max_hole_um2,
        };
        match hierarchy.refine_annotations(&params, cancel) {
            Ok(()) => report.hierarchy_refined = true,
            Err(HierarchyError::Cancelled) => {
                log::info!("hierarchy refine cancelled");
                return Err(RunError::Cancelled(Box::new(report)));
            }
            Err(err) => return Err(err.into()),
        }

        log::info!("{report}");
        Ok(report)
    }

    /// Run one region to its terminal state.
    ///
    /// Returns `Err` only for collaborator failures; every empty stage result
    /// becomes a [`RegionOutcome::Skipped`].
    fn process_region<H: Hierarchy + ?Sized>(
        &self,
        ctx: &RunContext<'_>,
        region: &Region,
        parent: Option<ObjectId>,
        hierarchy: &mut H,
    ) -> Result<RegionOutcome, RunError> {
        let skip = |at: RegionState, reason: SkipReason| -> Result<RegionOutcome, RunError> {
            Ok(RegionOutcome::Skipped { at, reason })
        };
        let config = ctx.config;

        let rgb = self
            .source
            .read_region(region)
            .map_err(|source| RunError::ImageSource {
                region: *region,
                source,
            })?;
        let (width, height) = (region.raster_width(), region.raster_height());
        if rgb.width != width || rgb.height != height {
            return Err(RunError::RasterSize {
                width,
                height,
                got_width: rgb.width,
                got_height: rgb.height,
            });
        }
        let view = RgbImageView::new(rgb.width, rgb.height, &rgb.data).map_err(|source| {
            RunError::RasterBuffer {
                region: *region,
                source,
            }
        })?;

        let channel = match stainseg_ops::extract(
            &view,
            config.channel_method,
            ctx.stains,
            &config.stain_name,
        ) {
            Ok(channel) => channel,
            Err(reason) => return skip(RegionState::Selected, SkipReason::Extract(reason)),
        };

        let smoothed = stainseg_ops::blur(&channel, config.gaussian_sigma_um, region.pixel_size_um);

        let Some(otsu) = stainseg_ops::threshold(&smoothed) else {
            return skip(RegionState::Smoothed, SkipReason::NoThreshold);
        };

        let polygons = stainseg_ops::trace(&otsu.mask);
        if polygons.is_empty() {
            return skip(RegionState::Thresholded, SkipReason::NoForeground);
        }

        let refined = stainseg_ops::refine(
            &MultiPolygon::new(polygons),
            config.min_fragment_um2,
            config.max_hole_um2,
            region.pixel_size_um,
        );
        if refined.is_empty() {
            return skip(RegionState::Contoured, SkipReason::AllFragmentsRemoved);
        }

        let Some(stats) = stainseg_ops::measure(&smoothed, &refined, region.pixel_area_um2()) else {
            return skip(RegionState::Refined, SkipReason::NoCoveredPixels);
        };

        let threshold = f64::from(otsu.value);
        let annotation = annotation::build(
            refined.map_points(|p| region.to_image(p)),
            &stats,
            config.stain_label(),
            threshold,
            &config.target_class,
        );

        let object = annotation::insert(annotation, hierarchy, parent)?;
        log::debug!(
            "inserted {object:?}: {} px, {:.1} µm², threshold {threshold:.4}",
            stats.pixel_count,
            stats.area
        );
        Ok(RegionOutcome::Inserted {
            object,
            threshold,
            area_um2: stats.area,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> Region {
        Region::new(0, 0, 4, 4, 1.0, &PixelCalibration::default()).unwrap()
    }

    #[test]
    fn report_counts_outcomes() {
        let report = RunReport {
            regions: vec![
                RegionReport {
                    region: region(),
                    parent: None,
                    outcome: RegionOutcome::Inserted {
                        object: ObjectId(3),
                        threshold: 0.5,
                        area_um2: 9.0,
                    },
                },
                RegionReport {
                    region: region(),
                    parent: Some(ObjectId(1)),
                    outcome: RegionOutcome::Skipped {
                        at: RegionState::Smoothed,
                        reason: SkipReason::NoThreshold,
                    },
                },
            ],
            hierarchy_refined: true,
        };
        assert_eq!(report.inserted().collect::<Vec<_>>(), vec![ObjectId(3)]);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.regions[1].state(), RegionState::Smoothed);
        assert_eq!(report.to_string(), "2 region(s): 1 inserted, 1 skipped");
    }

    #[test]
    fn report_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = RunReport {
            regions: vec![RegionReport {
                region: region(),
                parent: None,
                outcome: RegionOutcome::Skipped {
                    at: RegionState::Selected,
                    reason: SkipReason::Extract(ExtractSkip::StainNotFound {
                        name: "Eosin".into(),
                    }),
                },
            }],
            hierarchy_refined: false,
        };
        report.write_json(&path).unwrap();
        let back: RunReport = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn stages_are_ordered() {
        assert!(RegionState::Selected < RegionState::Extracted);
        assert!(RegionState::Annotated < RegionState::Inserted);
    }
}
