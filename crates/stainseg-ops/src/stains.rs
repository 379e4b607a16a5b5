//! Reference stain vectors for brightfield colour deconvolution.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Errors raised when building a [`StainProfile`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StainError {
    #[error("a stain profile needs between 1 and 3 stain vectors (got {0})")]
    StainCount(usize),

    #[error("stain vector `{0}` has zero or non-finite length")]
    DegenerateVector(String),

    #[error("background values must be finite and > 0")]
    InvalidBackground,

    #[error("stain vectors are linearly dependent")]
    Singular,
}

/// One named stain, as a unit optical-density direction in RGB.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StainVector {
    pub name: String,
    pub od: [f64; 3],
}

impl StainVector {
    /// Build a stain vector, normalising `od` to unit length.
    pub fn new(name: impl Into<String>, od: [f64; 3]) -> Result<Self, StainError> {
        let name = name.into();
        let v = Vector3::from(od);
        let norm = v.norm();
        if !norm.is_finite() || norm <= f64::EPSILON {
            return Err(StainError::DegenerateVector(name));
        }
        let n = v / norm;
        Ok(Self {
            name,
            od: [n.x, n.y, n.z],
        })
    }

    #[inline]
    fn vector(&self) -> Vector3<f64> {
        Vector3::from(self.od)
    }
}

/// Up to three stains plus the background (reference white) intensity.
///
/// A profile only exists for RGB brightfield images; image sources that are
/// not brightfield report no profile at all.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StainProfile {
    pub name: String,
    pub stains: Vec<StainVector>,
    pub background: [f64; 3],
    #[serde(skip)]
    unmix: Option<Matrix3<f64>>,
}

impl StainProfile {
    pub fn new(
        name: impl Into<String>,
        stains: Vec<StainVector>,
        background: [f64; 3],
    ) -> Result<Self, StainError> {
        if stains.is_empty() || stains.len() > 3 {
            return Err(StainError::StainCount(stains.len()));
        }
        if background.iter().any(|b| !b.is_finite() || *b <= 0.0) {
            return Err(StainError::InvalidBackground);
        }
        let unmix = unmixing_matrix(&stains)?;
        Ok(Self {
            name: name.into(),
            stains,
            background,
            unmix: Some(unmix),
        })
    }

    /// Haematoxylin + DAB with the default brightfield vectors.
    pub fn h_dab() -> Self {
        Self::from_defaults(
            "H-DAB default",
            &[
                ("Hematoxylin", [0.651, 0.701, 0.290]),
                ("DAB", [0.269, 0.568, 0.778]),
            ],
        )
    }

    /// Haematoxylin + eosin with the default brightfield vectors.
    pub fn h_e() -> Self {
        Self::from_defaults(
            "H&E default",
            &[
                ("Hematoxylin", [0.644211, 0.716556, 0.266844]),
                ("Eosin", [0.092789, 0.954111, 0.283111]),
            ],
        )
    }

    fn from_defaults(name: &str, vectors: &[(&str, [f64; 3])]) -> Self {
        let stains: Vec<StainVector> = vectors
            .iter()
            .filter_map(|(n, od)| StainVector::new(*n, *od).ok())
            .collect();
        let unmix = unmixing_matrix(&stains).ok();
        Self {
            name: name.to_string(),
            stains,
            background: [255.0; 3],
            unmix,
        }
    }

    /// Position of the stain called `name`, searching every vector.
    pub fn stain_index(&self, name: &str) -> Option<usize> {
        self.stains.iter().position(|s| s.name == name)
    }

    /// Matrix mapping an optical-density column vector to per-stain
    /// concentrations (row `i` belongs to stain `i`, the residual last).
    pub fn unmixing(&self) -> Result<Matrix3<f64>, StainError> {
        match self.unmix {
            Some(m) => Ok(m),
            None => unmixing_matrix(&self.stains),
        }
    }
}

/// Fill the stain matrix up to three rows and invert it.
///
/// A missing second stain is taken orthogonal to the first; a missing third
/// is the normalised cross product of the first two.
fn unmixing_matrix(stains: &[StainVector]) -> Result<Matrix3<f64>, StainError> {
    let first = stains.first().ok_or(StainError::StainCount(0))?.vector();
    let second = match stains.get(1) {
        Some(s) => s.vector(),
        None => {
            let helper = if first.x.abs() < 0.9 {
                Vector3::x()
            } else {
                Vector3::y()
            };
            first.cross(&helper).normalize()
        }
    };
    let third = match stains.get(2) {
        Some(s) => s.vector(),
        None => {
            let c = first.cross(&second);
            let n = c.norm();
            if n <= f64::EPSILON {
                return Err(StainError::Singular);
            }
            c / n
        }
    };

    // Rows are stains: od^T = c^T * M, so c = (M^-1)^T * od.
    let m = Matrix3::from_rows(&[first.transpose(), second.transpose(), third.transpose()]);
    let inv = m.try_inverse().ok_or(StainError::Singular)?;
    Ok(inv.transpose())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn vectors_are_normalised() {
        let s = StainVector::new("A", [3.0, 0.0, 4.0]).unwrap();
        assert_relative_eq!(s.od[0], 0.6);
        assert_relative_eq!(s.od[2], 0.8);
        assert!(matches!(
            StainVector::new("zero", [0.0; 3]),
            Err(StainError::DegenerateVector(_))
        ));
    }

    #[test]
    fn stain_index_searches_all_vectors() {
        let p = StainProfile::h_dab();
        assert_eq!(p.stain_index("Hematoxylin"), Some(0));
        assert_eq!(p.stain_index("DAB"), Some(1));
        assert_eq!(p.stain_index("Eosin"), None);
    }

    #[test]
    fn unmixing_recovers_pure_stain() {
        let p = StainProfile::h_e();
        let unmix = p.unmixing().unwrap();
        let eosin = Vector3::from(p.stains[1].od) * 0.7;
        let c = unmix * eosin;
        assert_relative_eq!(c[0], 0.0, epsilon = 1e-9);
        assert_relative_eq!(c[1], 0.7, epsilon = 1e-9);
        assert_relative_eq!(c[2], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn rejects_bad_profiles() {
        let a = StainVector::new("A", [1.0, 0.0, 0.0]).unwrap();
        assert_eq!(
            StainProfile::new("p", Vec::new(), [255.0; 3]).unwrap_err(),
            StainError::StainCount(0)
        );
        assert_eq!(
            StainProfile::new("p", vec![a.clone(), a.clone()], [255.0; 3]).unwrap_err(),
            StainError::Singular
        );
        assert_eq!(
            StainProfile::new("p", vec![a], [255.0, 0.0, 255.0]).unwrap_err(),
            StainError::InvalidBackground
        );
    }
}
