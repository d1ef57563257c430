//! Variance-reduction regression trees
//!
//! The building block for both tree ensembles. Splits minimize the summed
//! squared error of the two children; leaf values support the boosted
//! ensemble's L1/L2 shrinkage (both zero gives the plain mean). Growth is
//! fully deterministic for a fixed row/feature selection: candidate features
//! are scanned in order and a split is only replaced on a strict improvement.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Growth limits and leaf regularization for one tree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// L1 shrinkage applied to the leaf target sum.
    pub l1: f64,
    /// L2 term added to the leaf denominator.
    pub l2: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            l1: 0.0,
            l2: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// A fitted regression tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Node,
}

impl RegressionTree {
    /// Grow a tree over the given rows, considering only the given features.
    pub fn grow(
        x: &Array2<f64>,
        y: &Array1<f64>,
        rows: &[usize],
        features: &[usize],
        params: &TreeParams,
    ) -> Self {
        Self {
            root: grow_node(x, y, rows, features, params, 0),
        }
    }

    /// Predicted value for one feature row.
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Predictions for every row of a matrix.
    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        Array1::from_iter(x.rows().into_iter().map(|row| self.predict_row(row)))
    }
}

/// Leaf value with L1/L2 shrinkage on the target sum: with both at zero this
/// is the plain mean of the leaf targets.
fn leaf_value(y: &Array1<f64>, rows: &[usize], params: &TreeParams) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let sum: f64 = rows.iter().map(|&r| y[r]).sum();
    let shrunk = sum.signum() * (sum.abs() - params.l1).max(0.0);
    shrunk / (rows.len() as f64 + params.l2)
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
}

fn grow_node(
    x: &Array2<f64>,
    y: &Array1<f64>,
    rows: &[usize],
    features: &[usize],
    params: &TreeParams,
    depth: usize,
) -> Node {
    if depth >= params.max_depth || rows.len() < params.min_samples_split {
        return Node::Leaf {
            value: leaf_value(y, rows, params),
        };
    }

    let Some(best) = find_best_split(x, y, rows, features, params) else {
        return Node::Leaf {
            value: leaf_value(y, rows, params),
        };
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .partition(|&&r| x[[r, best.feature]] <= best.threshold);

    Node::Split {
        feature: best.feature,
        threshold: best.threshold,
        left: Box::new(grow_node(x, y, &left_rows, features, params, depth + 1)),
        right: Box::new(grow_node(x, y, &right_rows, features, params, depth + 1)),
    }
}

fn find_best_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    rows: &[usize],
    features: &[usize],
    params: &TreeParams,
) -> Option<BestSplit> {
    let n = rows.len();
    let mut best: Option<BestSplit> = None;

    for &feature in features {
        let mut pairs: Vec<(f64, f64)> = rows.iter().map(|&r| (x[[r, feature]], y[r])).collect();
        pairs.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        // Prefix sums over the sorted targets
        let mut sum_left = 0.0;
        let mut sq_left = 0.0;
        let total_sum: f64 = pairs.iter().map(|p| p.1).sum();
        let total_sq: f64 = pairs.iter().map(|p| p.1 * p.1).sum();

        for k in 1..n {
            sum_left += pairs[k - 1].1;
            sq_left += pairs[k - 1].1 * pairs[k - 1].1;

            // Only split between distinct feature values
            if pairs[k - 1].0 >= pairs[k].0 {
                continue;
            }
            if k < params.min_samples_leaf || n - k < params.min_samples_leaf {
                continue;
            }

            let nl = k as f64;
            let nr = (n - k) as f64;
            let sum_right = total_sum - sum_left;
            let sq_right = total_sq - sq_left;
            let sse = (sq_left - sum_left * sum_left / nl) + (sq_right - sum_right * sum_right / nr);

            let improves = match &best {
                None => true,
                Some(b) => sse < b.sse - 1e-12,
            };
            if improves {
                best = Some(BestSplit {
                    feature,
                    threshold: (pairs[k - 1].0 + pairs[k].0) / 2.0,
                    sse,
                });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn all_rows(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn test_constant_targets_give_mean_leaf() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![5.0, 5.0, 5.0, 5.0];
        let tree = RegressionTree::grow(&x, &y, &all_rows(4), &[0], &TreeParams::default());

        for row in x.rows() {
            assert_relative_eq!(tree.predict_row(row), 5.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_separable_step_function() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![0.0, 0.0, 0.0, 8.0, 8.0, 8.0];
        let tree = RegressionTree::grow(&x, &y, &all_rows(6), &[0], &TreeParams::default());

        assert_relative_eq!(tree.predict_row(array![2.0].view()), 0.0, epsilon = 1e-12);
        assert_relative_eq!(tree.predict_row(array![11.0].view()), 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_max_depth_zero_is_single_leaf() {
        let x = array![[1.0], [10.0]];
        let y = array![0.0, 10.0];
        let params = TreeParams {
            max_depth: 0,
            ..TreeParams::default()
        };
        let tree = RegressionTree::grow(&x, &y, &all_rows(2), &[0], &params);

        // Single leaf predicts the overall mean everywhere
        assert_relative_eq!(tree.predict_row(array![1.0].view()), 5.0, epsilon = 1e-12);
        assert_relative_eq!(tree.predict_row(array![10.0].view()), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_min_samples_leaf_blocks_tiny_splits() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 0.0, 0.0, 100.0];
        let params = TreeParams {
            min_samples_leaf: 2,
            ..TreeParams::default()
        };
        let tree = RegressionTree::grow(&x, &y, &all_rows(4), &[0], &params);

        // The outlier cannot be isolated into a leaf of size 1
        let pred = tree.predict_row(array![4.0].view());
        assert!(pred < 100.0);
    }

    #[test]
    fn test_l2_shrinks_leaf_values_toward_zero() {
        let x = array![[1.0], [2.0]];
        let y = array![10.0, 10.0];
        let plain = TreeParams {
            max_depth: 0,
            ..TreeParams::default()
        };
        let reg = TreeParams {
            max_depth: 0,
            l2: 2.0,
            ..TreeParams::default()
        };

        let t_plain = RegressionTree::grow(&x, &y, &all_rows(2), &[0], &plain);
        let t_reg = RegressionTree::grow(&x, &y, &all_rows(2), &[0], &reg);

        assert_relative_eq!(t_plain.predict_row(x.row(0)), 10.0, epsilon = 1e-12);
        // 20 / (2 + 2) = 5
        assert_relative_eq!(t_reg.predict_row(x.row(0)), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_l1_can_zero_out_small_leaves() {
        let x = array![[1.0]];
        let y = array![0.3];
        let params = TreeParams {
            max_depth: 0,
            l1: 0.5,
            ..TreeParams::default()
        };
        let tree = RegressionTree::grow(&x, &y, &all_rows(1), &[0], &params);
        assert_relative_eq!(tree.predict_row(x.row(0)), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_growth_is_deterministic() {
        let x = array![
            [3.0, 1.0],
            [1.0, 4.0],
            [4.0, 1.0],
            [1.0, 5.0],
            [5.0, 9.0],
            [9.0, 2.0]
        ];
        let y = array![3.0, 1.0, 4.0, 1.0, 5.0, 9.0];
        let a = RegressionTree::grow(&x, &y, &all_rows(6), &[0, 1], &TreeParams::default());
        let b = RegressionTree::grow(&x, &y, &all_rows(6), &[0, 1], &TreeParams::default());

        for row in x.rows() {
            assert_eq!(a.predict_row(row), b.predict_row(row));
        }
    }
}
