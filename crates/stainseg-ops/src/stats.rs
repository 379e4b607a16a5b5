//! Intensity statistics inside a geometry.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use stainseg_core::{MultiPolygon, ScalarImage};

/// Area and intensity summary of the pixels covered by a geometry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionStats {
    pub pixel_count: usize,
    /// `pixel_count` times the physical pixel area.
    pub area: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Measure `raster` over pixels whose centres lie inside `geometry`.
///
/// `geometry` is in raster pixel coordinates. Returns `None` when no pixel
/// centre is covered.
pub fn measure(
    raster: &ScalarImage,
    geometry: &MultiPolygon,
    pixel_area: f64,
) -> Option<RegionStats> {
    let b = geometry.bounds()?;
    let x0 = b.min_x.floor().max(0.0) as usize;
    let y0 = b.min_y.floor().max(0.0) as usize;
    let x1 = (b.max_x.ceil().max(0.0) as usize).min(raster.width);
    let y1 = (b.max_y.ceil().max(0.0) as usize).min(raster.height);

    let mut count = 0usize;
    let mut sum = 0f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for y in y0..y1 {
        for x in x0..x1 {
            let centre = Point2::new(x as f64 + 0.5, y as f64 + 0.5);
            if !geometry.contains(centre) {
                continue;
            }
            let v = f64::from(raster.get(x, y));
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
    }

    (count > 0).then(|| RegionStats {
        pixel_count: count,
        area: count as f64 * pixel_area,
        mean: sum / count as f64,
        min,
        max,
    })
}
