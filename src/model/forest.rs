//! Bagged ensemble of decision trees, deterministic for a given seed.

use super::tree::{DecisionTree, TreeParams};
use crate::{Result, SleepyticsError};
use ndarray::{Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Defaults to ⌊√d⌋ (at least 1) when unset
    pub max_features: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: Some(16),
            min_samples_split: 2,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_classes: usize,
    n_features: usize,
}

impl RandomForest {
    /// Fit on `x` (rows = samples) and class indices `y` in `0..n_classes`.
    pub fn fit(x: &Array2<f64>, y: &[usize], n_classes: usize, params: &ForestParams, seed: u64) -> Result<Self> {
        let (n, d) = x.dim();
        if n != y.len() {
            return Err(SleepyticsError::DimensionMismatch {
                expected: n,
                got: y.len(),
            });
        }
        if n == 0 || d == 0 || n_classes == 0 {
            return Err(SleepyticsError::InsufficientData(format!(
                "cannot fit a forest on {n} rows × {d} features"
            )));
        }
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(SleepyticsError::DimensionMismatch {
                expected: n_classes,
                got: bad + 1,
            });
        }

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split.max(2),
            max_features: params
                .max_features
                .unwrap_or_else(|| (d as f64).sqrt().floor() as usize)
                .clamp(1, d),
        };

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let trees: Vec<DecisionTree> = (0..params.n_trees.max(1))
            .map(|_| {
                let mut tree_rng = ChaCha8Rng::seed_from_u64(rng.gen());
                let bootstrap: Vec<usize> = (0..n).map(|_| tree_rng.gen_range(0..n)).collect();
                DecisionTree::fit(x, y, n_classes, bootstrap, tree_params, &mut tree_rng)
            })
            .collect();

        debug!(
            trees = trees.len(),
            max_depth = trees.iter().map(DecisionTree::depth).max().unwrap_or(0),
            max_features = tree_params.max_features,
            "random forest fitted"
        );

        Ok(Self {
            trees,
            n_classes,
            n_features: d,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean of the trees' leaf distributions; non-negative and sums to 1.
    pub fn predict_proba(&self, row: ArrayView1<'_, f64>) -> Result<Vec<f64>> {
        if row.len() != self.n_features {
            return Err(SleepyticsError::DimensionMismatch {
                expected: self.n_features,
                got: row.len(),
            });
        }
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (p, v) in proba.iter_mut().zip(tree.predict_proba(row)) {
                *p += v;
            }
        }
        let total: f64 = proba.iter().sum();
        if total > 0.0 {
            proba.iter_mut().for_each(|p| *p /= total);
        } else {
            proba.fill(1.0 / self.n_classes as f64);
        }
        Ok(proba)
    }

    /// Most probable class (lowest index on ties) with the full distribution.
    pub fn predict(&self, row: ArrayView1<'_, f64>) -> Result<(usize, Vec<f64>)> {
        let proba = self.predict_proba(row)?;
        let class = proba
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
            .0;
        Ok((class, proba))
    }
}
