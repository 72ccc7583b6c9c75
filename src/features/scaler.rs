//! Z-score normalization fitted at training time

use serde::{Deserialize, Serialize};

use crate::{F1Error, Result};

/// Standard scaler over a named, ordered feature space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub features: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(features: Vec<String>, mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        let scaler = StandardScaler {
            features,
            mean,
            scale,
        };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Identity scaler (mean 0, scale 1) over the given features
    pub fn identity<S: AsRef<str>>(features: &[S]) -> Self {
        StandardScaler {
            features: features.iter().map(|f| f.as_ref().to_string()).collect(),
            mean: vec![0.0; features.len()],
            scale: vec![1.0; features.len()],
        }
    }

    /// Check the three vectors line up
    pub fn validate(&self) -> Result<()> {
        let dim = self.features.len();
        for (what, len) in [("scaler mean", self.mean.len()), ("scaler scale", self.scale.len())] {
            if len != dim {
                return Err(F1Error::ShapeMismatch {
                    what,
                    expected: dim,
                    got: len,
                });
            }
        }
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.features.len()
    }

    /// Position of a named feature
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f == name)
    }

    /// Scale one row laid out in `features` order
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.dim() {
            return Err(F1Error::ShapeMismatch {
                what: "scaler input",
                expected: self.dim(),
                got: row.len(),
            });
        }

        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| {
                // Constant columns were fitted with zero variance
                let s = if *s == 0.0 { 1.0 } else { *s };
                (x - m) / s
            })
            .collect())
    }
}
