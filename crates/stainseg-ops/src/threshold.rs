//! Otsu automatic thresholding of scalar rasters.

use stainseg_core::{Mask, ScalarImage};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Number of histogram bins spanning the raster's value range.
pub const BINS: usize = 256;

/// Fixed-width histogram over `[min, max]` of the finite raster values.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    pub min: f32,
    pub max: f32,
    pub counts: Vec<u64>,
}

impl Histogram {
    /// Histogram of `raster`; `None` when it has no finite samples.
    pub fn of(raster: &ScalarImage) -> Option<Self> {
        let (min, max) = raster.finite_range()?;
        let mut counts = vec![0u64; BINS];
        let hist = Self { min, max, counts: Vec::new() };
        for &v in raster.data.iter().filter(|v| v.is_finite()) {
            counts[hist.bin(v)] += 1;
        }
        Some(Self { counts, ..hist })
    }

    /// Bin index of `v`. Monotone in `v`; the maximum lands in the last bin.
    #[inline]
    pub fn bin(&self, v: f32) -> usize {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0;
        }
        let b = ((v - self.min) / span * BINS as f32).floor();
        (b.max(0.0) as usize).min(BINS - 1)
    }
}

/// Between-class variance `w_b * w_f * (mu_b - mu_f)^2` for the split where
/// bins `0..=t` form the background.
pub fn between_class_variance(counts: &[u64], t: usize) -> f64 {
    let (mut w_b, mut sum_b) = (0f64, 0f64);
    let (mut w_all, mut sum_all) = (0f64, 0f64);
    for (i, &h) in counts.iter().enumerate() {
        let h = h as f64;
        w_all += h;
        sum_all += i as f64 * h;
        if i <= t {
            w_b += h;
            sum_b += i as f64 * h;
        }
    }
    let w_f = w_all - w_b;
    if w_b < 1.0 || w_f < 1.0 {
        return 0.0;
    }
    let m_b = sum_b / w_b;
    let m_f = (sum_all - sum_b) / w_f;
    w_b * w_f * (m_b - m_f) * (m_b - m_f)
}

/// Otsu split on a histogram: the background/foreground boundary bin `t`
/// maximising between-class variance. Ties keep the lowest `t`.
///
/// Returns `None` when fewer than two bins are populated.
pub fn otsu_split(counts: &[u64]) -> Option<usize> {
    let total: f64 = counts.iter().map(|&h| h as f64).sum();
    let mut sum_total = 0f64;
    for (i, &h) in counts.iter().enumerate() {
        sum_total += (i as f64) * (h as f64);
    }

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best: Option<(usize, f64)> = None;

    for (t, &h) in counts.iter().enumerate() {
        w_b += h as f64;
        sum_b += (t as f64) * (h as f64);
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }

        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;
        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if best.is_none_or(|(_, v)| var_between > v) {
            best = Some((t, var_between));
        }
    }

    best.map(|(t, _)| t)
}

/// Result of thresholding one raster.
#[derive(Clone, Debug, PartialEq)]
pub struct OtsuResult {
    /// Largest raster value on the background side; foreground is strictly above.
    pub value: f32,
    /// Histogram bin of the split.
    pub bin: usize,
    pub mask: Mask,
}

/// Otsu threshold with the dark-background convention: pixels strictly above
/// the threshold are foreground.
///
/// Returns `None` for rasters with no finite samples or a single value.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(raster), fields(width = raster.width, height = raster.height))
)]
pub fn threshold(raster: &ScalarImage) -> Option<OtsuResult> {
    let hist = Histogram::of(raster)?;
    let bin = otsu_split(&hist.counts)?;

    let value = raster
        .data
        .iter()
        .copied()
        .filter(|v| v.is_finite() && hist.bin(*v) <= bin)
        .fold(f32::NEG_INFINITY, f32::max);

    let mut mask = Mask::new(raster.width, raster.height);
    for (m, &v) in mask.data.iter_mut().zip(raster.data.iter()) {
        *m = v.is_finite() && v > value;
    }
    log::debug!(
        "otsu threshold {value:.4} (bin {bin}), {} foreground px",
        mask.count()
    );

    Some(OtsuResult { value, bin, mask })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_is_optimal_with_lowest_tie() {
        let mut counts = vec![0u64; BINS];
        counts[10] = 40;
        counts[11] = 10;
        counts[80] = 5;
        counts[200] = 30;
        counts[201] = 15;
        let t = otsu_split(&counts).unwrap();
        let best = between_class_variance(&counts, t);
        for alt in 0..BINS {
            let v = between_class_variance(&counts, alt);
            assert!(v <= best, "split {alt} beats {t}: {v} > {best}");
            if v == best {
                assert!(alt >= t, "tie at {alt} should resolve to lowest, got {t}");
            }
        }
    }

    #[test]
    fn bimodal_gap_ties_to_lowest_bin() {
        let mut counts = vec![0u64; BINS];
        counts[0] = 91;
        counts[255] = 9;
        assert_eq!(otsu_split(&counts), Some(0));
    }

    #[test]
    fn single_populated_bin_has_no_split() {
        let mut counts = vec![0u64; BINS];
        counts[7] = 12;
        assert_eq!(otsu_split(&counts), None);
    }

    #[test]
    fn uniform_raster_has_no_threshold() {
        let img = ScalarImage::new_fill(4, 4, 1.5);
        assert!(threshold(&img).is_none());
    }

    #[test]
    fn foreground_is_strictly_above_threshold() {
        let data = vec![0.1, 0.2, 0.15, 2.0, 2.1, 0.1, 1.9, 0.12, 0.11];
        let img = ScalarImage::from_vec(3, 3, data.clone()).unwrap();
        let res = threshold(&img).unwrap();
        for (i, &v) in data.iter().enumerate() {
            assert_eq!(res.mask.data[i], v > res.value);
        }
        assert_eq!(res.mask.count(), 3);
        assert!((res.value - 0.2).abs() < 1e-6);
    }
}
