//! Per-column standardization with statistics fixed at fit time.

use crate::{Result, SleepyticsError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    mean: Array1<f64>,
    /// Population std; zero-variance columns are stored as 1.0
    std: Array1<f64>,
}

impl ScalerState {
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        let mean = x.mean_axis(Axis(0)).ok_or_else(|| {
            SleepyticsError::InsufficientData("cannot fit a scaler on zero rows".into())
        })?;
        let std = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON && s.is_finite() { s } else { 1.0 });
        Ok(Self { mean, std })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> ArrayView1<'_, f64> {
        self.mean.view()
    }

    pub fn std(&self) -> ArrayView1<'_, f64> {
        self.std.view()
    }

    pub fn transform(&self, row: &[f64]) -> Result<Array1<f64>> {
        self.check_dim(row.len())?;
        let row = ArrayView1::from(row);
        Ok((&row - &self.mean) / &self.std)
    }

    pub fn transform_matrix(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_dim(x.ncols())?;
        Ok((x - &self.mean) / &self.std)
    }

    fn check_dim(&self, got: usize) -> Result<()> {
        if got != self.dim() {
            return Err(SleepyticsError::DimensionMismatch {
                expected: self.dim(),
                got,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn training_columns_become_standard() {
        let x = array![
            [1.0, 10.0, 5.0],
            [2.0, 20.0, 5.0],
            [3.0, 60.0, 5.0],
            [6.0, 30.0, 5.0],
        ];
        let scaler = ScalerState::fit(&x).unwrap();
        let z = scaler.transform_matrix(&x).unwrap();
        for c in 0..2 {
            let col = z.column(c);
            assert_abs_diff_eq!(col.mean().unwrap(), 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(col.std(0.0), 1.0, epsilon = 1e-9);
        }
        // constant column: std treated as 1, values collapse to 0
        assert_eq!(scaler.std()[2], 1.0);
        assert!(z.column(2).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn row_transform_matches_matrix_transform() {
        let x = array![[1.0, 4.0], [3.0, 8.0]];
        let scaler = ScalerState::fit(&x).unwrap();
        let row = scaler.transform(&[3.0, 8.0]).unwrap();
        assert_abs_diff_eq!(row[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(row[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let scaler = ScalerState::fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        assert!(matches!(
            scaler.transform(&[1.0, 2.0, 3.0]),
            Err(SleepyticsError::DimensionMismatch { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn empty_matrix_is_insufficient() {
        let x = Array2::<f64>::zeros((0, 3));
        assert!(matches!(ScalerState::fit(&x), Err(SleepyticsError::InsufficientData(_))));
    }
}
