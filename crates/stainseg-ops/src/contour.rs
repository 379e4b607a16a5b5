//! Boundary tracing of binary masks into polygons.
//!
//! Boundaries follow pixel edges ("crack" tracing), so vertices sit on pixel
//! corners and a traced polygon's area equals its pixel count.
//!
//! Connectivity is fixed: foreground is 4-connected, background 8-connected.
//! Two foreground pixels touching only at a corner belong to different
//! polygons unless they are joined elsewhere. Every 4-connected foreground
//! component yields one [`Polygon`]; each background pocket fully enclosed by
//! it becomes a hole ring.
//!
//! Rings are oriented with the foreground on the right-hand side when walking
//! in image coordinates, which makes exteriors positive and holes negative
//! under [`Ring::signed_area`].

use std::collections::VecDeque;

use nalgebra::Point2;
use stainseg_core::{Mask, Polygon, Ring};

#[cfg(feature = "tracing")]
use tracing::instrument;

// Directions in screen order: right, down, left, up. `(d + 1) % 4` is a
// clockwise (right-hand) turn on screen.
const DX: [i64; 4] = [1, 0, -1, 0];
const DY: [i64; 4] = [0, 1, 0, -1];

/// Trace every 4-connected foreground component of `mask`.
///
/// Coordinates are raster pixel corners: pixel `(x, y)` spans
/// `[x, x+1] x [y, y+1]`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(mask), fields(width = mask.width, height = mask.height))
)]
pub fn trace(mask: &Mask) -> Vec<Polygon> {
    let (w, h) = (mask.width, mask.height);
    if w == 0 || h == 0 {
        return Vec::new();
    }

    let (labels, n_labels) = label_components(mask);
    if n_labels == 0 {
        return Vec::new();
    }

    let vw = w + 1;
    let mut visited = vec![0u8; vw * (h + 1)];
    let mut exteriors: Vec<Option<Ring>> = vec![None; n_labels];
    let mut holes: Vec<Vec<Ring>> = vec![Vec::new(); n_labels];

    for vy in 0..=h as i64 {
        for vx in 0..=w as i64 {
            for d in 0..4 {
                let v = vy as usize * vw + vx as usize;
                if visited[v] & (1 << d) != 0 {
                    continue;
                }
                let Some((px, py)) = edge_pixel(mask, vx, vy, d) else {
                    continue;
                };
                let label = labels[py as usize * w + px as usize] as usize - 1;
                let ring = follow(mask, &mut visited, vw, (vx, vy, d));
                if ring.signed_area() > 0.0 {
                    debug_assert!(exteriors[label].is_none(), "one exterior per component");
                    exteriors[label] = Some(ring);
                } else {
                    holes[label].push(ring);
                }
            }
        }
    }

    exteriors
        .into_iter()
        .zip(holes)
        .filter_map(|(ext, holes)| ext.map(|e| Polygon::new(e, holes)))
        .collect()
}

/// Foreground pixel owning the boundary edge leaving vertex `(vx, vy)` in
/// direction `d`, if that edge exists.
#[inline]
fn edge_pixel(mask: &Mask, vx: i64, vy: i64, d: usize) -> Option<(i64, i64)> {
    let (fg, bg) = match d {
        0 => ((vx, vy), (vx, vy - 1)),
        1 => ((vx - 1, vy), (vx, vy)),
        2 => ((vx - 1, vy - 1), (vx - 1, vy)),
        _ => ((vx, vy - 1), (vx - 1, vy - 1)),
    };
    (mask.get(fg.0, fg.1) && !mask.get(bg.0, bg.1)).then_some(fg)
}

/// Walk one closed boundary starting at `start`, marking its edges visited.
///
/// At each vertex the walk prefers a right turn, then straight, then left;
/// preferring the right turn keeps diagonal-only neighbours apart, which is
/// what makes the foreground 4-connected.
fn follow(mask: &Mask, visited: &mut [u8], vw: usize, start: (i64, i64, usize)) -> Ring {
    let mut corners = Vec::new();
    let mut dirs = Vec::new();
    let (mut x, mut y, mut d) = start;
    loop {
        visited[y as usize * vw + x as usize] |= 1 << d;
        corners.push((x, y));
        dirs.push(d);

        x += DX[d];
        y += DY[d];
        d = match [(d + 1) % 4, d, (d + 3) % 4]
            .into_iter()
            .find(|&c| edge_pixel(mask, x, y, c).is_some())
        {
            Some(next) => next,
            None => break,
        };
        if (x, y, d) == start {
            break;
        }
    }

    // Keep only corners where the direction changes.
    let n = dirs.len();
    let points = (0..n)
        .filter(|&i| dirs[(i + n - 1) % n] != dirs[i])
        .map(|i| Point2::new(corners[i].0 as f64, corners[i].1 as f64))
        .collect();
    Ring::new(points)
}

/// 4-connected component labels (0 = background, 1.. = components).
fn label_components(mask: &Mask) -> (Vec<u32>, usize) {
    let (w, h) = (mask.width, mask.height);
    let mut labels = vec![0u32; w * h];
    let mut next = 0u32;
    let mut queue = VecDeque::new();

    for start in 0..w * h {
        if !mask.data[start] || labels[start] != 0 {
            continue;
        }
        next += 1;
        labels[start] = next;
        queue.push_back(start);
        while let Some(i) = queue.pop_front() {
            let (x, y) = ((i % w) as i64, (i / w) as i64);
            for d in 0..4 {
                let (nx, ny) = (x + DX[d], y + DY[d]);
                if !mask.get(nx, ny) {
                    continue;
                }
                let j = ny as usize * w + nx as usize;
                if labels[j] == 0 {
                    labels[j] = next;
                    queue.push_back(j);
                }
            }
        }
    }
    (labels, next as usize)
}
