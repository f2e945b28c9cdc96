//! Per-feature standardization
//!
//! Learns mean and population standard deviation per column and maps each value to
//! `(x - mean) / std`. Constant columns keep a unit scale so they map to zero.

use crate::error::StressError;
use crate::schema::FEATURE_COUNT;
use crate::types::FeatureVector;
use serde::{Deserialize, Serialize};

/// Fitted standard scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit on a row-major matrix
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, StressError> {
        let first = rows
            .first()
            .ok_or_else(|| StressError::TrainingFailure("Cannot fit scaler on empty data".to_string()))?;
        let width = first.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(StressError::SchemaMismatch {
                expected: width,
                got: bad.len(),
            });
        }

        let n = rows.len() as f64;
        let mut mean = vec![0.0; width];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut variance = vec![0.0; width];
        for row in rows {
            for ((v, x), m) in variance.iter_mut().zip(row).zip(&mean) {
                *v += (x - m) * (x - m);
            }
        }

        let scale = variance
            .into_iter()
            .map(|v| {
                let std = (v / n).sqrt();
                if std > f64::EPSILON && std.is_finite() {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        if mean.iter().any(|m| !m.is_finite()) {
            return Err(StressError::TrainingFailure(
                "Non-finite values in training data".to_string(),
            ));
        }

        Ok(Self { mean, scale })
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// Standardize one row
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, StressError> {
        if row.len() != self.width() {
            return Err(StressError::SchemaMismatch {
                expected: self.width(),
                got: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, StressError> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }

    pub fn transform_vector(&self, vector: &FeatureVector) -> Result<Vec<f64>, StressError> {
        if self.width() != FEATURE_COUNT {
            return Err(StressError::SchemaMismatch {
                expected: FEATURE_COUNT,
                got: self.width(),
            });
        }
        self.transform_row(vector.as_array())
    }
}
