//! Calibrated Gaussian smoothing.
//!
//! Conventions:
//! - kernel radius is `max(1, ceil(3 * sigma))`, weights normalised to unit sum,
//! - borders are replicated (clamp-to-edge),
//! - the 2D blur is separable: horizontal pass, then vertical pass.

use stainseg_core::ScalarImage;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Normalised 1D Gaussian kernel.
#[derive(Debug, Clone)]
pub struct GaussianKernel {
    pub sigma: f32,
    pub radius: usize,
    pub weights: Vec<f32>,
}

impl GaussianKernel {
    /// Build a kernel for `sigma` pixels; `None` unless `sigma` is finite and > 0.
    pub fn new(sigma: f32) -> Option<Self> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return None;
        }
        let radius = ((3.0 * sigma).ceil() as usize).max(1);
        let sigma2 = sigma * sigma;
        let mut weights: Vec<f32> = (0..=2 * radius)
            .map(|i| {
                let x = i as f32 - radius as f32;
                (-(x * x) / (2.0 * sigma2)).exp()
            })
            .collect();
        let sum: f32 = weights.iter().sum();
        for w in &mut weights {
            *w /= sum;
        }
        Some(Self {
            sigma,
            radius,
            weights,
        })
    }
}

/// Smooth `raster` with a Gaussian whose standard deviation is given in
/// physical units.
///
/// `sigma_px = sigma_um / pixel_size_um`; a non-positive `sigma_px` returns the
/// raster unchanged.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(raster), fields(width = raster.width, height = raster.height))
)]
pub fn blur(raster: &ScalarImage, sigma_um: f64, pixel_size_um: f64) -> ScalarImage {
    let sigma_px = sigma_um / pixel_size_um;
    if !sigma_px.is_finite() || sigma_px <= 0.0 {
        return raster.clone();
    }
    gaussian_blur_px(raster, sigma_px as f32)
}

/// Separable Gaussian blur with `sigma` in raster pixels.
pub fn gaussian_blur_px(raster: &ScalarImage, sigma: f32) -> ScalarImage {
    let Some(kernel) = GaussianKernel::new(sigma) else {
        return raster.clone();
    };
    let (w, h) = (raster.width, raster.height);
    if w == 0 || h == 0 {
        return raster.clone();
    }

    let mut tmp = vec![0.0f32; w * h];
    for (src, dst) in raster.data.chunks_exact(w).zip(tmp.chunks_exact_mut(w)) {
        convolve_clamp(src, &kernel, dst);
    }

    let mut out = vec![0.0f32; w * h];
    let mut column = vec![0.0f32; h];
    let mut column_out = vec![0.0f32; h];
    for x in 0..w {
        for (y, c) in column.iter_mut().enumerate() {
            *c = tmp[y * w + x];
        }
        convolve_clamp(&column, &kernel, &mut column_out);
        for (y, &v) in column_out.iter().enumerate() {
            out[y * w + x] = v;
        }
    }

    ScalarImage {
        width: w,
        height: h,
        data: out,
    }
}

fn convolve_clamp(signal: &[f32], kernel: &GaussianKernel, out: &mut [f32]) {
    let n = signal.len() as isize;
    let r = kernel.radius as isize;
    for (i, out_i) in out.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        for (k, &kv) in kernel.weights.iter().enumerate() {
            let idx = (i as isize + k as isize - r).clamp(0, n - 1);
            acc += signal[idx as usize] * kv;
        }
        *out_i = acc;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(w: usize, h: usize) -> ScalarImage {
        let data = (0..w * h).map(|i| (i % 7) as f32 * 0.5).collect();
        ScalarImage::from_vec(w, h, data).unwrap()
    }

    #[test]
    fn kernel_is_normalised_and_symmetric() {
        let k = GaussianKernel::new(1.3).unwrap();
        assert_eq!(k.radius, 4);
        let sum: f32 = k.weights.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
        for i in 0..k.radius {
            assert_relative_eq!(k.weights[i], k.weights[2 * k.radius - i]);
        }
        assert!(GaussianKernel::new(0.0).is_none());
    }

    #[test]
    fn zero_sigma_is_identity() {
        let img = ramp(9, 5);
        assert_eq!(blur(&img, 0.0, 0.5), img);
        assert_eq!(blur(&img, -2.0, 0.5), img);
    }

    #[test]
    fn constant_raster_is_preserved() {
        let img = ScalarImage::new_fill(6, 4, 2.5);
        let out = blur(&img, 3.0, 1.0);
        for v in out.data {
            assert_relative_eq!(v, 2.5, epsilon = 1e-5);
        }
    }

    #[test]
    fn sigma_is_converted_to_pixels() {
        let mut img = ScalarImage::new_fill(21, 21, 0.0);
        img.set(10, 10, 1.0);
        let phys = blur(&img, 4.0, 2.0);
        let px = gaussian_blur_px(&img, 2.0);
        assert_eq!(phys, px);
        let total: f32 = phys.data.iter().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-4);
        assert!(phys.get(10, 10) < 1.0);
        assert!(phys.get(10, 10) > phys.get(12, 10));
    }
}
