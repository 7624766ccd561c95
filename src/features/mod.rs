//! Feature extraction: health records → vocabulary codes → standardized vectors.

mod encoder;
mod scaler;

pub use encoder::{CategoryCodes, Vocabulary};
pub use scaler::ScalerState;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Column order shared by training and inference.
pub const FEATURE_NAMES: [&str; 12] = [
    "Gender",
    "Age",
    "Occupation",
    "Sleep Duration",
    "Quality of Sleep",
    "Physical Activity Level",
    "Stress Level",
    "BMI Category",
    "Heart Rate",
    "Daily Steps",
    "Systolic",
    "Diastolic",
];

pub const FEATURE_DIM: usize = FEATURE_NAMES.len();

/// Numeric projection of a health record, in [`FEATURE_NAMES`] order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedRecord {
    pub record_id: String,
    pub values: Vec<f64>,
}

impl EncodedRecord {
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

/// Stack encoded rows into an `n × dim` matrix.
pub fn to_matrix(rows: &[EncodedRecord]) -> crate::Result<Array2<f64>> {
    let dim = rows.first().map(EncodedRecord::dim).unwrap_or(FEATURE_DIM);
    let mut flat = Vec::with_capacity(rows.len() * dim);
    for row in rows {
        if row.dim() != dim {
            return Err(crate::SleepyticsError::DimensionMismatch {
                expected: dim,
                got: row.dim(),
            });
        }
        flat.extend_from_slice(&row.values);
    }
    let len = flat.len();
    Array2::from_shape_vec((rows.len(), dim), flat).map_err(|_| crate::SleepyticsError::DimensionMismatch {
        expected: rows.len() * dim,
        got: len,
    })
}
