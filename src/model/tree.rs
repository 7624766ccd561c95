//! CART decision tree with Gini impurity, stored as a flat node arena.

use ndarray::{Array2, ArrayView1};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or too small to split
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Features considered at each split
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        /// Class frequencies of the training samples reaching this leaf; sums to 1
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct Builder<'a, R> {
    x: &'a Array2<f64>,
    y: &'a [usize],
    n_classes: usize,
    params: TreeParams,
    rng: &'a mut R,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let t = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / t).powi(2)).sum::<f64>()
}

impl<'a, R: Rng> Builder<'a, R> {
    fn class_counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &i in samples {
            counts[self.y[i]] += 1;
        }
        counts
    }

    fn leaf(&mut self, counts: &[usize], total: usize) -> usize {
        let distribution = counts.iter().map(|&c| c as f64 / total as f64).collect();
        self.nodes.push(Node::Leaf { distribution });
        self.nodes.len() - 1
    }

    fn build(&mut self, samples: &mut [usize], depth: usize) -> usize {
        let total = samples.len();
        let counts = self.class_counts(samples);
        let parent_impurity = gini(&counts, total);
        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        if depth_reached || total < self.params.min_samples_split || parent_impurity == 0.0 {
            return self.leaf(&counts, total);
        }

        let Some(best) = self.best_split(samples, parent_impurity) else {
            return self.leaf(&counts, total);
        };

        let (feature, threshold) = (best.feature, best.threshold);
        let x = self.x;
        samples.sort_by(|&a, &b| {
            let la = x[[a, feature]] <= threshold;
            let lb = x[[b, feature]] <= threshold;
            lb.cmp(&la)
        });
        let n_left = samples.iter().filter(|&&i| x[[i, feature]] <= threshold).count();

        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { distribution: Vec::new() });
        let (left_samples, right_samples) = samples.split_at_mut(n_left);
        let left = self.build(left_samples, depth + 1);
        let right = self.build(right_samples, depth + 1);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn best_split(&mut self, samples: &[usize], parent_impurity: f64) -> Option<BestSplit> {
        let n_features = self.x.ncols();
        let k = self.params.max_features.clamp(1, n_features);
        // Visit features in random order; past the first `k`, keep going only
        // until some feature yields a valid split.
        let order = rand::seq::index::sample(&mut *self.rng, n_features, n_features).into_vec();

        let total = samples.len();
        let mut best: Option<BestSplit> = None;
        let mut column: Vec<(f64, usize)> = Vec::with_capacity(total);
        for (visited, feature) in order.into_iter().enumerate() {
            if visited >= k && best.is_some() {
                break;
            }
            column.clear();
            column.extend(samples.iter().map(|&i| (self.x[[i, feature]], self.y[i])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = vec![0usize; self.n_classes];
            let mut right = self.class_counts(samples);
            for pos in 0..total - 1 {
                let (value, class) = column[pos];
                left[class] += 1;
                right[class] -= 1;
                let next = column[pos + 1].0;
                if next <= value {
                    continue;
                }
                let n_left = pos + 1;
                let n_right = total - n_left;
                let impurity = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / total as f64;
                if impurity < best.as_ref().map_or(parent_impurity - 1e-12, |b| b.impurity) {
                    // Between adjacent floats the midpoint can round up to `next`.
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next || !threshold.is_finite() {
                        threshold = value;
                    }
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        impurity,
                    });
                }
            }
        }
        best
    }
}

impl DecisionTree {
    /// Grow a tree on `samples` (row indices into `x`, repeats allowed for bootstrap draws).
    pub fn fit<R: Rng>(
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        mut samples: Vec<usize>,
        params: TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut builder = Builder {
            x,
            y,
            n_classes,
            params,
            rng,
            nodes: Vec::new(),
        };
        if samples.is_empty() {
            builder.nodes.push(Node::Leaf {
                distribution: vec![1.0 / n_classes as f64; n_classes],
            });
        } else {
            builder.build(&mut samples, 0);
        }
        Self { nodes: builder.nodes }
    }

    /// Class distribution of the leaf `row` falls into.
    pub fn predict_proba(&self, row: ArrayView1<'_, f64>) -> &[f64] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn params(max_depth: Option<usize>) -> TreeParams {
        TreeParams {
            max_depth,
            min_samples_split: 2,
            max_features: 2,
        }
    }

    #[test]
    fn separable_data_gives_pure_leaves() {
        let x = array![[0.0, 5.0], [1.0, 5.0], [2.0, 5.0], [10.0, 5.0], [11.0, 5.0], [12.0, 5.0]];
        let y = [0, 0, 0, 1, 1, 1];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tree = DecisionTree::fit(&x, &y, 2, (0..6).collect(), params(None), &mut rng);
        assert_eq!(tree.predict_proba(array![1.5, 5.0].view()), &[1.0, 0.0]);
        assert_eq!(tree.predict_proba(array![9.0, 5.0].view()), &[0.0, 1.0]);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn depth_cap_produces_mixed_leaf() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = [0, 1, 0, 1];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tree = DecisionTree::fit(&x, &y, 2, (0..4).collect(), params(Some(0)), &mut rng);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict_proba(array![0.0].view()), &[0.5, 0.5]);
    }

    #[test]
    fn adjacent_float_values_still_separate() {
        let a = f64::from_bits(1.0f64.to_bits() + 1);
        let b = f64::from_bits(1.0f64.to_bits() + 2);
        let x = Array2::from_shape_vec((2, 1), vec![a, b]).unwrap();
        let y = [0, 1];
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let tree = DecisionTree::fit(&x, &y, 2, vec![0, 1], params(None), &mut rng);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.predict_proba(x.row(0)), &[1.0, 0.0]);
        assert_eq!(tree.predict_proba(x.row(1)), &[0.0, 1.0]);
    }

    #[test]
    fn leaf_distributions_sum_to_one() {
        let x = array![[0.0], [0.0], [1.0], [1.0], [1.0]];
        let y = [0, 1, 1, 2, 2];
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let tree = DecisionTree::fit(&x, &y, 3, (0..5).collect(), params(None), &mut rng);
        for v in [0.0, 1.0] {
            let p = tree.predict_proba(array![v].view());
            assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
    }
}
