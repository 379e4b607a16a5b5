//! Removal of small fragments and small holes.

use nalgebra::Point2;
use stainseg_core::{MultiPolygon, Polygon, Ring};

/// Drop fragments and fill holes below physical-area thresholds.
///
/// Thresholds are in µm² and converted to px² with `pixel_size_um²`.
/// A polygon whose area (exterior minus holes) is strictly below the minimum
/// fragment area is discarded; then every hole strictly smaller than the
/// maximum hole area is filled, together with any polygon lying inside a
/// filled hole. With both thresholds at zero the geometry is returned
/// unchanged.
pub fn refine(
    geometry: &MultiPolygon,
    min_fragment_um2: f64,
    max_hole_um2: f64,
    pixel_size_um: f64,
) -> MultiPolygon {
    let px_area = pixel_size_um * pixel_size_um;
    let min_fragment_px = min_fragment_um2 / px_area;
    let max_hole_px = max_hole_um2 / px_area;

    let mut filled: Vec<Ring> = Vec::new();
    let polygons: Vec<Polygon> = geometry
        .polygons
        .iter()
        .filter(|poly| poly.area() >= min_fragment_px)
        .map(|poly| {
            let (holes, small): (Vec<Ring>, Vec<Ring>) = poly
                .holes
                .iter()
                .cloned()
                .partition(|hole| hole.area() >= max_hole_px);
            filled.extend(small);
            Polygon {
                exterior: poly.exterior.clone(),
                holes,
            }
        })
        .collect();

    let kept = polygons.len();
    let dropped = geometry.polygons.len() - kept;
    if dropped > 0 {
        log::debug!("refine dropped {dropped} fragment(s) below {min_fragment_px:.1} px²");
    }
    if filled.is_empty() {
        return MultiPolygon::new(polygons);
    }

    // Islands inside a filled hole are now covered by the enclosing polygon.
    let polygons: Vec<Polygon> = polygons
        .into_iter()
        .filter(|poly| {
            !interior_point(&poly.exterior)
                .is_some_and(|p| filled.iter().any(|hole| hole.contains(p)))
        })
        .collect();
    if polygons.len() < kept {
        log::debug!(
            "refine merged {} island(s) into filled holes",
            kept - polygons.len()
        );
    }
    MultiPolygon::new(polygons)
}

/// Point just inside an exterior ring, on the right-hand side of its first
/// edge. For pixel-edge rings this is the centre of a boundary pixel.
fn interior_point(ring: &Ring) -> Option<Point2<f64>> {
    let (&a, &b) = (ring.points.first()?, ring.points.get(1)?);
    let edge = b - a;
    let len = edge.norm();
    if len <= 0.0 {
        return None;
    }
    let dir = edge / len;
    let normal = nalgebra::Vector2::new(-dir.y, dir.x);
    let step = 0.5f64.min(0.5 * len);
    Some(a + dir * step + normal * step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contour::trace;
    use approx::assert_relative_eq;
    use stainseg_core::Mask;

    fn mask_with(w: usize, h: usize, on: impl Fn(usize, usize) -> bool) -> Mask {
        let mut m = Mask::new(w, h);
        for y in 0..h {
            for x in 0..w {
                m.set(x, y, on(x, y));
            }
        }
        m
    }

    fn sample_geometry() -> MultiPolygon {
        // 8x8 frame with a 2x2 hole plus a separate 1x1 speck.
        let m = mask_with(12, 10, |x, y| {
            let frame = (1..9).contains(&x) && (1..9).contains(&y);
            let hole = (4..6).contains(&x) && (4..6).contains(&y);
            (frame && !hole) || (x == 10 && y == 1)
        });
        MultiPolygon::new(trace(&m))
    }

    #[test]
    fn zero_thresholds_are_identity() {
        let g = sample_geometry();
        assert_eq!(refine(&g, 0.0, 0.0, 0.5), g);
    }

    #[test]
    fn trace_then_refine_keeps_blob_area() {
        let m = mask_with(10, 10, |x, y| (2..7).contains(&x) && (3..5).contains(&y));
        let g = refine(&MultiPolygon::new(trace(&m)), 0.0, 0.0, 1.0);
        assert_relative_eq!(g.area(), 10.0);
    }

    #[test]
    fn small_fragments_are_dropped_in_physical_units() {
        let g = sample_geometry();
        // Speck is 1 px = 4 µm² at 2 µm/px; frame is 60 px = 240 µm².
        let out = refine(&g, 5.0, 0.0, 2.0);
        assert_eq!(out.polygons.len(), 1);
        assert_relative_eq!(out.area(), 60.0);

        let none = refine(&g, 241.0, 0.0, 2.0);
        assert!(none.is_empty());
    }

    #[test]
    fn small_holes_are_filled() {
        let g = sample_geometry();
        // Hole is 4 px = 16 µm² at 2 µm/px.
        let kept = refine(&g, 0.0, 16.0, 2.0);
        assert_relative_eq!(kept.area(), 61.0);
        let filled = refine(&g, 0.0, 16.5, 2.0);
        assert_relative_eq!(filled.area(), 65.0);
        assert!(filled.polygons.iter().all(|p| p.holes.is_empty()));
    }

    #[test]
    fn filling_a_hole_absorbs_its_island() {
        let m = mask_with(5, 5, |x, y| {
            let border = x == 0 || y == 0 || x == 4 || y == 4;
            border || (x == 2 && y == 2)
        });
        let g = MultiPolygon::new(trace(&m));
        assert_eq!(g.polygons.len(), 2);

        let out = refine(&g, 0.0, 100.0, 1.0);
        assert_eq!(out.polygons.len(), 1);
        assert!(out.polygons[0].holes.is_empty());
        assert_relative_eq!(out.area(), 25.0);

        // Hole kept: the island stays a separate polygon.
        let kept = refine(&g, 0.0, 9.0, 1.0);
        assert_eq!(kept.polygons.len(), 2);
        assert_relative_eq!(kept.area(), 17.0);
    }
}
