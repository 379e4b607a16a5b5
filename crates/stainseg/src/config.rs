//! Run configuration and its JSON form.

use serde::{Deserialize, Serialize};
use stainseg_ops::ChannelMethod;
use std::{fs, path::Path};

/// Errors found when validating a [`ThresholdConfig`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("downsample must be finite and >= 1 (got {0})")]
    Downsample(f64),

    #[error("gaussian sigma must be finite (got {0})")]
    Sigma(f64),

    #[error("{name} must be finite and >= 0 (got {value})")]
    Area { name: &'static str, value: f64 },

    #[error("target classification must not be empty")]
    EmptyTargetClass,

    #[error("stain name must not be empty")]
    EmptyStainName,

    #[error("roi classification filter must not be empty (use null for the whole image)")]
    EmptyRoi,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Everything a run needs, resolved before the first region is processed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Only annotations with this classification are processed; `None`
    /// processes the whole image as one region.
    pub roi: Option<String>,
    pub channel_method: ChannelMethod,
    /// Deconvolved channel to threshold; also names the measurements for
    /// either method.
    pub stain_name: String,
    /// Classification given to produced annotations.
    pub target_class: String,
    /// Fragments smaller than this (µm²) are discarded.
    pub min_fragment_um2: f64,
    /// Holes smaller than this (µm²) are filled.
    pub max_hole_um2: f64,
    /// Processing resolution relative to full resolution.
    pub downsample: f64,
    /// Gaussian smoothing strength in µm.
    pub gaussian_sigma_um: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            roi: Some("Region*".to_string()),
            channel_method: ChannelMethod::OpticalDensitySum,
            stain_name: "OpticalDensitySum".to_string(),
            target_class: "Vessels".to_string(),
            min_fragment_um2: 1000.0,
            max_hole_um2: 1000.0,
            downsample: 3.0,
            gaussian_sigma_um: 15.0,
        }
    }
}

impl ThresholdConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.downsample.is_finite() || self.downsample < 1.0 {
            return Err(ConfigError::Downsample(self.downsample));
        }
        if !self.gaussian_sigma_um.is_finite() {
            return Err(ConfigError::Sigma(self.gaussian_sigma_um));
        }
        for (name, value) in [
            ("min fragment area", self.min_fragment_um2),
            ("max hole area", self.max_hole_um2),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Area { name, value });
            }
        }
        if self.target_class.trim().is_empty() {
            return Err(ConfigError::EmptyTargetClass);
        }
        if self.stain_name.trim().is_empty() {
            return Err(ConfigError::EmptyStainName);
        }
        if self.roi.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::EmptyRoi);
        }
        Ok(())
    }

    /// Label used inside measurement names (`Mean <label> (IJ)`): the
    /// configured stain name, whichever channel method is used.
    pub fn stain_label(&self) -> &str {
        &self.stain_name
    }

    /// Load and validate a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ThresholdConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.stain_label(), "OpticalDensitySum");
    }

    #[test]
    fn rejects_out_of_range_values() {
        let cfg = ThresholdConfig {
            downsample: 0.5,
            ..ThresholdConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::Downsample(0.5)));

        let cfg = ThresholdConfig {
            max_hole_um2: -1.0,
            ..ThresholdConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Area { .. })));

        let cfg = ThresholdConfig {
            channel_method: ChannelMethod::Deconvolution,
            stain_name: String::new(),
            ..ThresholdConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyStainName));

        let cfg = ThresholdConfig {
            stain_name: " ".into(),
            ..ThresholdConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyStainName));

        let cfg = ThresholdConfig {
            roi: Some(String::new()),
            ..ThresholdConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyRoi));
    }

    #[test]
    fn od_sum_measurements_use_configured_stain_name() {
        let cfg = ThresholdConfig {
            stain_name: "Vessel OD".into(),
            ..ThresholdConfig::default()
        };
        assert_eq!(cfg.channel_method, ChannelMethod::OpticalDensitySum);
        assert_eq!(cfg.stain_label(), "Vessel OD");
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: ThresholdConfig = serde_json::from_str(
            r#"{ "roi": null, "channel_method": "Deconvolution", "stain_name": "DAB" }"#,
        )
        .unwrap();
        assert_eq!(cfg.roi, None);
        assert_eq!(cfg.channel_method, ChannelMethod::Deconvolution);
        assert_eq!(cfg.stain_label(), "DAB");
        assert_eq!(cfg.downsample, 3.0);
        assert_eq!(cfg.target_class, "Vessels");
    }

    #[test]
    fn json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threshold.json");
        let cfg = ThresholdConfig {
            roi: None,
            gaussian_sigma_um: 0.0,
            ..ThresholdConfig::default()
        };
        cfg.write_json(&path).unwrap();
        assert_eq!(ThresholdConfig::load_json(&path).unwrap(), cfg);
    }
}
