//! Classified annotation objects and their measurements.

use serde::{Deserialize, Serialize};
use stainseg_core::MultiPolygon;
use stainseg_ops::RegionStats;

use crate::host::{Hierarchy, HierarchyError, ObjectId};

pub const THRESHOLD_KEY: &str = "Threshold (IJ)";
pub const AREA_KEY: &str = "Area (IJ)";

pub fn mean_key(stain: &str) -> String {
    format!("Mean {stain} (IJ)")
}

pub fn min_key(stain: &str) -> String {
    format!("Min {stain} (IJ)")
}

pub fn max_key(stain: &str) -> String {
    format!("Max {stain} (IJ)")
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("annotation is locked")]
    Locked,
}

/// Ordered name → value list with unique names.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementList {
    entries: Vec<(String, f64)>,
}

impl MeasurementList {
    /// Set `name`, replacing an existing value in place.
    pub fn put(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Region object with geometry, classification and measurements.
///
/// Once locked, classification and measurements can no longer change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    geometry: MultiPolygon,
    classification: Option<String>,
    measurements: MeasurementList,
    locked: bool,
}

impl Annotation {
    pub fn new(geometry: MultiPolygon) -> Self {
        Self {
            geometry,
            classification: None,
            measurements: MeasurementList::default(),
            locked: false,
        }
    }

    pub fn with_classification(geometry: MultiPolygon, classification: impl Into<String>) -> Self {
        Self {
            classification: Some(classification.into()),
            ..Self::new(geometry)
        }
    }

    #[inline]
    pub fn geometry(&self) -> &MultiPolygon {
        &self.geometry
    }

    #[inline]
    pub fn classification(&self) -> Option<&str> {
        self.classification.as_deref()
    }

    #[inline]
    pub fn measurements(&self) -> &MeasurementList {
        &self.measurements
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn set_classification(
        &mut self,
        classification: impl Into<String>,
    ) -> Result<(), AnnotationError> {
        if self.locked {
            return Err(AnnotationError::Locked);
        }
        self.classification = Some(classification.into());
        Ok(())
    }

    pub fn put_measurement(
        &mut self,
        name: impl Into<String>,
        value: f64,
    ) -> Result<(), AnnotationError> {
        if self.locked {
            return Err(AnnotationError::Locked);
        }
        self.measurements.put(name, value);
        Ok(())
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }
}

/// Build the locked annotation for one thresholded region.
///
/// `geometry` must already be in full-resolution image coordinates; `stats`
/// describe the smoothed channel inside it.
pub fn build(
    geometry: MultiPolygon,
    stats: &RegionStats,
    stain_label: &str,
    threshold: f64,
    target_class: &str,
) -> Annotation {
    let mut measurements = MeasurementList::default();
    measurements.put(THRESHOLD_KEY, threshold);
    measurements.put(AREA_KEY, stats.area);
    measurements.put(mean_key(stain_label), stats.mean);
    measurements.put(min_key(stain_label), stats.min);
    measurements.put(max_key(stain_label), stats.max);

    Annotation {
        geometry,
        classification: Some(target_class.to_string()),
        measurements,
        locked: true,
    }
}

/// Insert below `parent` with an immediate children-changed update, or at top
/// level with the update left to the caller's batch.
pub fn insert<H: Hierarchy + ?Sized>(
    annotation: Annotation,
    hierarchy: &mut H,
    parent: Option<ObjectId>,
) -> Result<ObjectId, HierarchyError> {
    match parent {
        Some(parent) => hierarchy.insert(annotation, Some(parent), true),
        None => hierarchy.insert(annotation, None, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> RegionStats {
        RegionStats {
            pixel_count: 9,
            area: 20.25,
            mean: 1.5,
            min: 0.5,
            max: 2.5,
        }
    }

    #[test]
    fn build_records_measurements_in_order_and_locks() {
        let a = build(
            MultiPolygon::rectangle(0.0, 0.0, 3.0, 3.0),
            &stats(),
            "DAB",
            0.42,
            "Vessels",
        );
        let names: Vec<&str> = a.measurements().names().collect();
        assert_eq!(
            names,
            [
                "Threshold (IJ)",
                "Area (IJ)",
                "Mean DAB (IJ)",
                "Min DAB (IJ)",
                "Max DAB (IJ)"
            ]
        );
        assert_eq!(a.measurements().get(AREA_KEY), Some(20.25));
        assert_eq!(a.classification(), Some("Vessels"));
        assert!(a.is_locked());
    }

    #[test]
    fn locked_annotation_rejects_changes() {
        let mut a = build(MultiPolygon::default(), &stats(), "X", 0.0, "Vessels");
        assert_eq!(a.put_measurement("extra", 1.0), Err(AnnotationError::Locked));
        assert_eq!(a.set_classification("Other"), Err(AnnotationError::Locked));
        assert_eq!(a.measurements().len(), 5);
    }

    #[test]
    fn measurement_names_stay_unique() {
        let mut m = MeasurementList::default();
        m.put("a", 1.0);
        m.put("b", 2.0);
        m.put("a", 3.0);
        assert_eq!(m.len(), 2);
        assert_eq!(m.get("a"), Some(3.0));
        assert_eq!(m.names().collect::<Vec<_>>(), ["a", "b"]);
    }
}
