//! Scalar channel extraction from RGB rasters.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use stainseg_core::{RgbImageView, ScalarImage};

use crate::stains::StainProfile;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Reference white of the optical-density sum.
pub const DEFAULT_WHITE: [f64; 3] = [255.0; 3];

/// How a scalar channel is derived from RGB pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelMethod {
    /// Sum of per-channel optical densities.
    #[default]
    OpticalDensitySum,
    /// One channel of colour deconvolution against the stain profile.
    Deconvolution,
}

/// Reasons a region yields no scalar channel.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractSkip {
    #[error("an RGB brightfield stain profile is required")]
    StainsUnavailable,

    #[error("could not find stain with name `{name}`")]
    StainNotFound { name: String },

    #[error("stain profile is not invertible")]
    SingularProfile,

    #[error("region raster is empty")]
    EmptyRaster,
}

/// Optical density of one channel value against a reference white.
///
/// Zero intensities are clamped to 1 and values brighter than the reference
/// white give 0, so the result is always finite and non-negative.
#[inline]
pub fn optical_density(value: u8, white: f64) -> f64 {
    let v = f64::from(value.max(1));
    (-(v / white).log10()).max(0.0)
}

/// Derive the scalar channel for `method`.
///
/// `stains` is the run-wide profile (if the image has one) and `stain_name`
/// selects the deconvolved channel; the optical-density sum uses neither and
/// always measures against a 255 white. Skips are logged here and returned to the
/// caller, which ends the region without running later stages.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(rgb, stains), fields(width = rgb.width, height = rgb.height))
)]
pub fn extract(
    rgb: &RgbImageView<'_>,
    method: ChannelMethod,
    stains: Option<&StainProfile>,
    stain_name: &str,
) -> Result<ScalarImage, ExtractSkip> {
    if rgb.is_empty() {
        return Err(ExtractSkip::EmptyRaster);
    }
    match method {
        ChannelMethod::OpticalDensitySum => Ok(optical_density_sum(rgb, DEFAULT_WHITE)),
        ChannelMethod::Deconvolution => {
            let Some(profile) = stains else {
                let skip = ExtractSkip::StainsUnavailable;
                log::warn!("{skip}");
                return Err(skip);
            };
            let Some(index) = profile.stain_index(stain_name) else {
                let skip = ExtractSkip::StainNotFound {
                    name: stain_name.to_string(),
                };
                log::warn!("{skip}");
                return Err(skip);
            };
            deconvolve_channel(rgb, profile, index)
        }
    }
}

fn optical_density_sum(rgb: &RgbImageView<'_>, white: [f64; 3]) -> ScalarImage {
    let data = rgb
        .pixels()
        .map(|px| {
            let sum: f64 = px
                .iter()
                .zip(white.iter())
                .map(|(&v, &w)| optical_density(v, w))
                .sum();
            sum as f32
        })
        .collect();
    ScalarImage {
        width: rgb.width,
        height: rgb.height,
        data,
    }
}

fn deconvolve_channel(
    rgb: &RgbImageView<'_>,
    profile: &StainProfile,
    index: usize,
) -> Result<ScalarImage, ExtractSkip> {
    let unmix = profile.unmixing().map_err(|err| {
        log::warn!("cannot deconvolve with profile `{}`: {err}", profile.name);
        ExtractSkip::SingularProfile
    })?;
    let row = unmix.row(index).into_owned();
    let bg = profile.background;

    let data = rgb
        .pixels()
        .map(|px| {
            let od = Vector3::new(
                optical_density(px[0], bg[0]),
                optical_density(px[1], bg[1]),
                optical_density(px[2], bg[2]),
            );
            (row * od)[0] as f32
        })
        .collect();
    Ok(ScalarImage {
        width: rgb.width,
        height: rgb.height,
        data,
    })
}
