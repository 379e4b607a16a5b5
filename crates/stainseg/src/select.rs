//! Region selection: which rectangles of the image a run processes.

use stainseg_core::{Bounds, PixelCalibration, Region};

use crate::host::{Hierarchy, ObjectId};

/// Regions to process, each paired with the ROI object it came from.
///
/// With `roi_class` set, every top-level annotation carrying exactly that
/// classification contributes the bounding box of its geometry, clamped to
/// the image. Without it the whole image is one region with no parent.
/// Callers refresh the hierarchy first.
pub fn enumerate<H: Hierarchy + ?Sized>(
    hierarchy: &H,
    roi_class: Option<&str>,
    downsample: f64,
    image_width: u32,
    image_height: u32,
    calibration: &PixelCalibration,
) -> Vec<(Region, Option<ObjectId>)> {
    let Some(roi_class) = roi_class else {
        return match Region::new(0, 0, image_width, image_height, downsample, calibration) {
            Ok(region) => vec![(region, None)],
            Err(err) => {
                log::warn!("cannot process the whole image: {err}");
                Vec::new()
            }
        };
    };

    let mut out = Vec::new();
    for roi in hierarchy.top_level_annotations() {
        if roi.classification.as_deref() != Some(roi_class) {
            continue;
        }
        let Some(bounds) = roi.geometry.bounds() else {
            log::debug!("roi {:?} has no geometry", roi.id);
            continue;
        };
        let Some((x, y, w, h)) = clamp_to_image(&bounds, image_width, image_height) else {
            log::warn!("roi {:?} lies outside the image, skipped", roi.id);
            continue;
        };
        match Region::new(x, y, w, h, downsample, calibration) {
            Ok(region) => out.push((region, Some(roi.id))),
            Err(err) => log::warn!("roi {:?} skipped: {err}", roi.id),
        }
    }
    log::debug!("{} region(s) match `{roi_class}`", out.len());
    out
}

/// Integer pixel rectangle covering `b`, cut to the image.
fn clamp_to_image(b: &Bounds, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let clamp = |v: f64, hi: u32| v.clamp(0.0, f64::from(hi)) as u32;
    let x0 = clamp(b.min_x.floor(), width);
    let y0 = clamp(b.min_y.floor(), height);
    let x1 = clamp(b.max_x.ceil(), width);
    let y1 = clamp(b.max_y.ceil(), height);
    (x1 > x0 && y1 > y0).then(|| (x0, y0, x1 - x0, y1 - y0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Annotation;
    use crate::memory::MemoryHierarchy;
    use stainseg_core::MultiPolygon;

    fn cal() -> PixelCalibration {
        PixelCalibration::square(0.5)
    }

    #[test]
    fn whole_image_without_roi_filter() {
        let h = MemoryHierarchy::new();
        let regions = enumerate(&h, None, 2.0, 100, 60, &cal());
        assert_eq!(regions.len(), 1);
        let (region, parent) = regions[0];
        assert_eq!((region.x, region.y, region.width, region.height), (0, 0, 100, 60));
        assert_eq!(parent, None);
        assert_eq!(region.pixel_size_um, 1.0);
    }

    #[test]
    fn matching_rois_give_clamped_bounding_boxes() {
        let mut h = MemoryHierarchy::new();
        let a = h.add(Annotation::with_classification(
            MultiPolygon::rectangle(10.2, 5.0, 20.5, 10.0),
            "Region*",
        ));
        h.add(Annotation::with_classification(
            MultiPolygon::rectangle(0.0, 0.0, 5.0, 5.0),
            "Tumor",
        ));
        let c = h.add(Annotation::with_classification(
            MultiPolygon::rectangle(90.0, 50.0, 30.0, 30.0),
            "Region*",
        ));
        h.add(Annotation::new(MultiPolygon::rectangle(0.0, 0.0, 5.0, 5.0)));

        let regions = enumerate(&h, Some("Region*"), 1.0, 100, 60, &cal());
        assert_eq!(regions.len(), 2);

        let (r, p) = regions[0];
        assert_eq!(p, Some(a));
        assert_eq!((r.x, r.y, r.width, r.height), (10, 5, 21, 10));

        let (r, p) = regions[1];
        assert_eq!(p, Some(c));
        assert_eq!((r.x, r.y, r.width, r.height), (90, 50, 10, 10));
    }

    #[test]
    fn empty_or_outside_rois_are_ignored() {
        let mut h = MemoryHierarchy::new();
        h.add(Annotation::with_classification(MultiPolygon::default(), "Region*"));
        h.add(Annotation::with_classification(
            MultiPolygon::rectangle(200.0, 200.0, 10.0, 10.0),
            "Region*",
        ));
        assert!(enumerate(&h, Some("Region*"), 1.0, 100, 60, &cal()).is_empty());
        assert!(enumerate(&h, Some("Other"), 1.0, 100, 60, &cal()).is_empty());
    }
}
