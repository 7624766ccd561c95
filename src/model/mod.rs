//! Random-forest classifier over the standardized feature space.
//! Class indices follow [`crate::SleepDisorder`]; probabilities are soft votes of the trees.

mod forest;
mod tree;

pub use forest::{ForestParams, RandomForest};
pub use tree::{DecisionTree, Node, TreeParams};
