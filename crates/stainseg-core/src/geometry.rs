use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    #[inline]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    fn union(self, other: Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// Closed vertex ring. The closing edge from the last vertex back to the
/// first is implicit.
///
/// Orientation is expressed in image coordinates (y pointing down): rings
/// that run clockwise on screen have positive [`Ring::signed_area`]. Traced
/// exteriors are positive and holes negative.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    pub points: Vec<Point2<f64>>,
}

impl Ring {
    pub fn new(points: Vec<Point2<f64>>) -> Self {
        Self { points }
    }

    /// Shoelace area, signed by orientation.
    pub fn signed_area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut acc = 0.0;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            acc += a.x * b.y - b.x * a.y;
        }
        0.5 * acc
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let first = self.points.first()?;
        let init = Bounds {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        Some(self.points.iter().fold(init, |b, p| Bounds {
            min_x: b.min_x.min(p.x),
            min_y: b.min_y.min(p.y),
            max_x: b.max_x.max(p.x),
            max_y: b.max_y.max(p.y),
        }))
    }

    /// Even-odd point-in-ring test.
    pub fn contains(&self, p: Point2<f64>) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[j];
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    fn map(&self, f: &impl Fn(Point2<f64>) -> Point2<f64>) -> Ring {
        Ring {
            points: self.points.iter().map(|&p| f(p)).collect(),
        }
    }
}

/// One connected piece: exterior ring plus zero or more holes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Ring,
    pub holes: Vec<Ring>,
}

impl Polygon {
    pub fn new(exterior: Ring, holes: Vec<Ring>) -> Self {
        Self { exterior, holes }
    }

    /// Exterior area minus hole areas.
    pub fn area(&self) -> f64 {
        let holes: f64 = self.holes.iter().map(Ring::area).sum();
        (self.exterior.area() - holes).max(0.0)
    }

    pub fn contains(&self, p: Point2<f64>) -> bool {
        self.exterior.contains(p) && !self.holes.iter().any(|h| h.contains(p))
    }

    #[inline]
    pub fn bounds(&self) -> Option<Bounds> {
        self.exterior.bounds()
    }
}

/// Collection of disjoint polygons forming one annotation geometry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiPolygon {
    pub polygons: Vec<Polygon>,
}

impl MultiPolygon {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }

    /// Axis-aligned rectangle `[x, x+w] x [y, y+h]` as a single polygon.
    pub fn rectangle(x: f64, y: f64, w: f64, h: f64) -> Self {
        let exterior = Ring::new(vec![
            Point2::new(x, y),
            Point2::new(x + w, y),
            Point2::new(x + w, y + h),
            Point2::new(x, y + h),
        ]);
        Self::new(vec![Polygon::new(exterior, Vec::new())])
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn area(&self) -> f64 {
        self.polygons.iter().map(Polygon::area).sum()
    }

    pub fn contains(&self, p: Point2<f64>) -> bool {
        self.polygons.iter().any(|poly| poly.contains(p))
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.polygons
            .iter()
            .filter_map(Polygon::bounds)
            .reduce(Bounds::union)
    }

    /// Apply a point transform to every vertex.
    ///
    /// Orientation-reversing transforms flip the sign convention of the rings.
    pub fn map_points(&self, f: impl Fn(Point2<f64>) -> Point2<f64>) -> MultiPolygon {
        MultiPolygon {
            polygons: self
                .polygons
                .iter()
                .map(|poly| Polygon {
                    exterior: poly.exterior.map(&f),
                    holes: poly.holes.iter().map(|h| h.map(&f)).collect(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(x: f64, y: f64, s: f64) -> Ring {
        Ring::new(vec![
            Point2::new(x, y),
            Point2::new(x + s, y),
            Point2::new(x + s, y + s),
            Point2::new(x, y + s),
        ])
    }

    #[test]
    fn screen_clockwise_ring_is_positive() {
        let r = square(0.0, 0.0, 2.0);
        assert_relative_eq!(r.signed_area(), 4.0);
        let mut rev = r.clone();
        rev.points.reverse();
        assert_relative_eq!(rev.signed_area(), -4.0);
    }

    #[test]
    fn polygon_with_hole_area_and_containment() {
        let mut hole = square(1.0, 1.0, 1.0);
        hole.points.reverse();
        let poly = Polygon::new(square(0.0, 0.0, 3.0), vec![hole]);
        assert_relative_eq!(poly.area(), 8.0);
        assert!(poly.contains(Point2::new(0.5, 0.5)));
        assert!(!poly.contains(Point2::new(1.5, 1.5)));
        assert!(!poly.contains(Point2::new(3.5, 0.5)));
    }

    #[test]
    fn map_points_scales_area_and_bounds() {
        let mp = MultiPolygon::rectangle(1.0, 2.0, 3.0, 4.0);
        let scaled = mp.map_points(|p| Point2::new(10.0 + 2.0 * p.x, 20.0 + 2.0 * p.y));
        assert_relative_eq!(scaled.area(), 48.0);
        let b = scaled.bounds().unwrap();
        assert_relative_eq!(b.min_x, 12.0);
        assert_relative_eq!(b.max_y, 32.0);
    }
}
