//! CART classification tree
//!
//! Greedy weighted-gini tree construction. Sample weights carry both the bootstrap
//! multiplicity and the class weight, so a sample that was not drawn simply has weight 0
//! and never reaches the builder.
//!
//! `min_samples_split` and `min_samples_leaf` count distinct rows. A row drawn three times
//! by the bootstrap counts once toward either limit; its multiplicity only shows up in the
//! weighted class counts.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Stopping and feature-sampling parameters for a single tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    /// Distinct rows a node needs before it may split
    pub min_samples_split: usize,
    /// Distinct rows each child must keep
    pub min_samples_leaf: usize,
    /// Features examined per split
    pub max_features: usize,
}

/// Tree node; children are indices into the node vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// Normalized weighted class distribution
        distribution: Vec<f64>,
    },
}

/// Fitted classification tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_classes: usize,
}

impl DecisionTree {
    /// Grow a tree on the samples with non-zero weight.
    ///
    /// Returns the tree and its unnormalized impurity decrease per feature.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        weights: &[f64],
        n_classes: usize,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> (DecisionTree, Vec<f64>) {
        let n_features = x.first().map(|r| r.len()).unwrap_or(0);
        let mut builder = TreeBuilder {
            x,
            y,
            weights,
            n_classes,
            n_features,
            params,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };

        let indices: Vec<usize> = (0..x.len()).filter(|&i| weights[i] > 0.0).collect();
        builder.build_node(indices, 0, rng);

        let tree = DecisionTree {
            nodes: builder.nodes,
            n_classes,
        };
        (tree, builder.importances)
    }

    /// Class distribution of the leaf the row falls into
    pub fn predict_proba(&self, row: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
                Node::Leaf { distribution } => return distribution,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                Node::Leaf { .. } => 0,
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Structural check used after deserialization
    pub(crate) fn is_well_formed(&self, n_features: usize) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().all(|node| match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    *feature < n_features
                        && threshold.is_finite()
                        && *left < self.nodes.len()
                        && *right < self.nodes.len()
                }
                Node::Leaf { distribution } => distribution.len() == self.n_classes,
            })
    }
}

/// Best split found at a node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Sum of squared class weights over child weight, both sides; higher is purer
    proxy: f64,
    left_weight: f64,
    left_impurity: f64,
    right_weight: f64,
    right_impurity: f64,
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [usize],
    weights: &'a [f64],
    n_classes: usize,
    n_features: usize,
    params: &'a TreeParams,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

const IMPURITY_EPSILON: f64 = 1e-12;

fn gini(counts: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / total) * (c / total)).sum::<f64>()
}

impl<'a> TreeBuilder<'a> {
    fn class_weights(&self, indices: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.n_classes];
        for &i in indices {
            counts[self.y[i]] += self.weights[i];
        }
        counts
    }

    fn push_leaf(&mut self, counts: &[f64], total: f64) -> usize {
        let distribution = if total > 0.0 {
            counts.iter().map(|c| c / total).collect()
        } else {
            vec![1.0 / self.n_classes as f64; self.n_classes]
        };
        self.nodes.push(Node::Leaf { distribution });
        self.nodes.len() - 1
    }

    fn build_node(&mut self, indices: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let counts = self.class_weights(&indices);
        let total: f64 = counts.iter().sum();
        let impurity = gini(&counts, total);

        let stop = self.params.max_depth.is_some_and(|d| depth >= d)
            || indices.len() < self.params.min_samples_split
            || indices.len() < 2 * self.params.min_samples_leaf
            || impurity <= IMPURITY_EPSILON;
        if stop {
            return self.push_leaf(&counts, total);
        }

        let split = match self.find_best_split(&indices, &counts, total, rng) {
            Some(split) => split,
            None => return self.push_leaf(&counts, total),
        };

        self.importances[split.feature] += total * impurity
            - split.left_weight * split.left_impurity
            - split.right_weight * split.right_impurity;

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[i][split.feature] <= split.threshold);

        // Reserve the slot, then patch child indices once they exist
        let current = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });
        let left = self.build_node(left_indices, depth + 1, rng);
        let right = self.build_node(right_indices, depth + 1, rng);
        self.nodes[current] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        current
    }

    fn find_best_split(
        &self,
        indices: &[usize],
        counts: &[f64],
        total: f64,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(rng);

        let min_leaf = self.params.min_samples_leaf;
        let mut best: Option<SplitCandidate> = None;
        let mut visited = 0;
        let mut sorted = indices.to_vec();
        let mut left = vec![0.0; self.n_classes];

        for &feature in &features {
            if visited >= self.params.max_features {
                break;
            }
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));
            let lo = self.x[sorted[0]][feature];
            let hi = self.x[sorted[sorted.len() - 1]][feature];
            // Constant features do not count toward max_features
            if hi <= lo {
                continue;
            }
            visited += 1;

            left.iter_mut().for_each(|c| *c = 0.0);
            let mut left_weight = 0.0;

            for pos in 0..sorted.len() - 1 {
                let i = sorted[pos];
                left[self.y[i]] += self.weights[i];
                left_weight += self.weights[i];

                let here = self.x[i][feature];
                let next = self.x[sorted[pos + 1]][feature];
                if next <= here {
                    continue;
                }
                let n_left = pos + 1;
                if n_left < min_leaf || sorted.len() - n_left < min_leaf {
                    continue;
                }

                let right_weight = total - left_weight;
                if left_weight <= 0.0 || right_weight <= 0.0 {
                    continue;
                }
                let mut sq_left = 0.0;
                let mut sq_right = 0.0;
                for c in 0..self.n_classes {
                    let l = left[c];
                    let r = counts[c] - l;
                    sq_left += l * l;
                    sq_right += r * r;
                }
                let proxy = sq_left / left_weight + sq_right / right_weight;

                if best.map_or(true, |b| proxy > b.proxy) {
                    let mut threshold = here + (next - here) / 2.0;
                    if threshold >= next {
                        threshold = here;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        proxy,
                        left_weight,
                        left_impurity: 1.0 - sq_left / (left_weight * left_weight),
                        right_weight,
                        right_impurity: 1.0 - sq_right / (right_weight * right_weight),
                    });
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;

    fn params(max_features: usize) -> TreeParams {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features,
        }
    }

    #[test]
    fn test_separable_data_is_learned() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y: Vec<usize> = (0..20).map(|i| if i < 10 { 0 } else { 1 }).collect();
        let w = vec![1.0; 20];
        let mut rng = StdRng::seed_from_u64(0);

        let (tree, imp) = DecisionTree::fit(&x, &y, &w, 2, &params(1), &mut rng);
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict_proba(&[3.0]), &[1.0, 0.0]);
        assert_eq!(tree.predict_proba(&[15.0]), &[0.0, 1.0]);
        // Root impurity 0.5 over weight 20, children pure
        assert!((imp[0] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_is_midpoint() {
        let x = vec![vec![1.0], vec![3.0]];
        let y = vec![0, 1];
        let w = vec![1.0, 1.0];
        let (tree, _) =
            DecisionTree::fit(&x, &y, &w, 2, &params(1), &mut StdRng::seed_from_u64(0));
        assert_eq!(tree.predict_proba(&[2.0]), &[1.0, 0.0]);
        assert_eq!(tree.predict_proba(&[2.01]), &[0.0, 1.0]);
    }

    #[test]
    fn test_zero_weight_samples_are_ignored() {
        let x = vec![vec![0.0], vec![1.0], vec![2.0]];
        let y = vec![0, 1, 1];
        let w = vec![1.0, 0.0, 2.0];
        let (tree, _) =
            DecisionTree::fit(&x, &y, &w, 2, &params(1), &mut StdRng::seed_from_u64(0));
        // Split falls between 0 and 2, not between 0 and 1
        assert_eq!(tree.predict_proba(&[0.9]), &[1.0, 0.0]);
        assert_eq!(tree.predict_proba(&[1.1]), &[0.0, 1.0]);
    }

    #[test]
    fn test_leaf_distribution_uses_weights() {
        let x = vec![vec![0.0], vec![0.0], vec![0.0]];
        let y = vec![0, 1, 1];
        let w = vec![2.0, 1.0, 1.0];
        let (tree, imp) =
            DecisionTree::fit(&x, &y, &w, 2, &params(1), &mut StdRng::seed_from_u64(0));
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(tree.predict_proba(&[0.0]), &[0.5, 0.5]);
        assert_eq!(imp, vec![0.0]);
    }

    #[test]
    fn test_min_samples_leaf_and_depth() {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 7) as f64]).collect();
        let y: Vec<usize> = (0..40).map(|i| (i * 7 % 3) as usize).collect();
        let w = vec![1.0; 40];
        let p = TreeParams {
            max_depth: Some(3),
            min_samples_split: 5,
            min_samples_leaf: 3,
            max_features: 2,
        };
        let (tree, _) = DecisionTree::fit(&x, &y, &w, 3, &p, &mut StdRng::seed_from_u64(9));
        assert!(tree.depth() <= 3);
        assert!(tree.is_well_formed(2));
        for row in &x {
            let proba = tree.predict_proba(row);
            assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_min_samples_count_distinct_rows_not_draws() {
        let x = vec![vec![0.0], vec![1.0], vec![2.0]];
        let y = vec![0, 1, 1];
        // Row 0 drawn three times: weight 3 but still one row
        let w = vec![3.0, 1.0, 1.0];
        let p = TreeParams {
            min_samples_leaf: 2,
            ..params(1)
        };
        let (tree, _) = DecisionTree::fit(&x, &y, &w, 2, &p, &mut StdRng::seed_from_u64(0));
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(tree.predict_proba(&[0.0]), &[0.6, 0.4]);

        let x = vec![vec![0.0], vec![1.0]];
        let y = vec![0, 1];
        let w = vec![3.0, 3.0];
        let p = TreeParams {
            min_samples_split: 3,
            ..params(1)
        };
        let (tree, _) = DecisionTree::fit(&x, &y, &w, 2, &p, &mut StdRng::seed_from_u64(0));
        assert_eq!(tree.leaf_count(), 1);

        let (tree, _) =
            DecisionTree::fit(&x, &y, &w, 2, &params(1), &mut StdRng::seed_from_u64(0));
        assert_eq!(tree.leaf_count(), 2);
    }
}
