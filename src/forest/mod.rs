//! Random forest classifier
//!
//! Bootstrap-aggregated CART trees with per-split feature subsampling, class
//! re-weighting, out-of-bag scoring and mean-decrease-in-impurity importances.
//!
//! Trees are grown in parallel with rayon. Each tree draws from its own RNG seeded from
//! the forest's `random_state`, and results are reduced in tree order, so a pinned seed
//! always yields the same forest.

pub mod tree;

pub use tree::{DecisionTree, Node, TreeParams};

use crate::error::StressError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Number of features examined at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
    Count(usize),
    Fraction(f64),
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match self {
            MaxFeatures::Sqrt => n.sqrt() as usize,
            MaxFeatures::Log2 => n.log2() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(k) => k,
            MaxFeatures::Fraction(f) => (f * n) as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Class re-weighting strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// Every sample weighs 1
    Uniform,
    /// Inverse class frequency over the full training set
    Balanced,
    /// Inverse class frequency over each tree's bootstrap sample
    BalancedSubsample,
}

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub class_weight: ClassWeight,
    pub bootstrap: bool,
    pub oob_score: bool,
    pub random_state: u64,
    /// Grow trees on the rayon pool
    pub parallel: bool,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            max_depth: Some(20),
            min_samples_split: 5,
            min_samples_leaf: 3,
            // The Sedang/Tinggi boundary needs sleep, screen time and notifications together
            max_features: MaxFeatures::All,
            class_weight: ClassWeight::BalancedSubsample,
            bootstrap: true,
            oob_score: true,
            random_state: 42,
            parallel: true,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<(), StressError> {
        if self.n_estimators == 0 {
            return Err(StressError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.max_depth == Some(0) {
            return Err(StressError::InvalidConfig(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(StressError::InvalidConfig(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(StressError::InvalidConfig(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if let MaxFeatures::Fraction(f) = self.max_features {
            if !(f > 0.0 && f <= 1.0) {
                return Err(StressError::InvalidConfig(format!(
                    "max_features fraction must be in (0, 1], got {f}"
                )));
            }
        }
        if self.oob_score && !self.bootstrap {
            return Err(StressError::InvalidConfig(
                "oob_score requires bootstrap".to_string(),
            ));
        }
        Ok(())
    }

    fn tree_params(&self, n_features: usize) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features.resolve(n_features),
        }
    }
}

/// Balanced class weights `n / (k * count_c)` over the given labels; absent classes get 0
fn balanced_weights(labels: impl Iterator<Item = usize>, n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0usize; n_classes];
    for y in labels {
        counts[y] += 1;
    }
    let n: usize = counts.iter().sum();
    let present = counts.iter().filter(|&&c| c > 0).count().max(1);
    counts
        .iter()
        .map(|&c| {
            if c == 0 {
                0.0
            } else {
                n as f64 / (present as f64 * c as f64)
            }
        })
        .collect()
}

/// One grown tree plus what the forest needs to reduce
struct GrownTree {
    tree: DecisionTree,
    importances: Vec<f64>,
    oob: Vec<(usize, Vec<f64>)>,
}

/// Fitted random forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    n_features: usize,
    n_classes: usize,
    trees: Vec<DecisionTree>,
    feature_importances: Vec<f64>,
    oob_score: Option<f64>,
}

impl RandomForest {
    /// Fit on scaled rows `x` with class indices `y` in `0..n_classes`
    pub fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        config: &ForestConfig,
    ) -> Result<Self, StressError> {
        config.validate()?;

        if x.is_empty() {
            return Err(StressError::TrainingFailure("Empty training set".to_string()));
        }
        if x.len() != y.len() {
            return Err(StressError::TrainingFailure(format!(
                "Feature rows ({}) and labels ({}) differ in length",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if n_features == 0 || x.iter().any(|r| r.len() != n_features) {
            return Err(StressError::TrainingFailure(
                "Feature rows must share a non-zero width".to_string(),
            ));
        }
        if x.iter().flatten().any(|v| !v.is_finite()) {
            return Err(StressError::TrainingFailure(
                "Non-finite feature value in training set".to_string(),
            ));
        }
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(StressError::TrainingFailure(format!(
                "Label {bad} outside 0..{n_classes}"
            )));
        }

        let params = config.tree_params(n_features);
        let n = x.len();

        let mut master = StdRng::seed_from_u64(config.random_state);
        let seeds: Vec<u64> = (0..config.n_estimators).map(|_| master.gen()).collect();

        let full_weights = match config.class_weight {
            ClassWeight::Balanced => balanced_weights(y.iter().copied(), n_classes),
            _ => vec![1.0; n_classes],
        };

        let grow = |seed: &u64| -> GrownTree {
            let mut rng = StdRng::seed_from_u64(*seed);

            let mut multiplicity = vec![0usize; n];
            if config.bootstrap {
                for _ in 0..n {
                    multiplicity[rng.gen_range(0..n)] += 1;
                }
            } else {
                multiplicity.iter_mut().for_each(|m| *m = 1);
            }

            let class_weights = match config.class_weight {
                ClassWeight::BalancedSubsample => balanced_weights(
                    (0..n).flat_map(|i| std::iter::repeat(y[i]).take(multiplicity[i])),
                    n_classes,
                ),
                _ => full_weights.clone(),
            };

            let weights: Vec<f64> = (0..n)
                .map(|i| multiplicity[i] as f64 * class_weights[y[i]])
                .collect();

            let (tree, importances) =
                DecisionTree::fit(x, y, &weights, n_classes, &params, &mut rng);

            let oob = if config.oob_score {
                (0..n)
                    .filter(|&i| multiplicity[i] == 0)
                    .map(|i| (i, tree.predict_proba(&x[i]).to_vec()))
                    .collect()
            } else {
                Vec::new()
            };

            GrownTree {
                tree,
                importances,
                oob,
            }
        };

        let grown: Vec<GrownTree> = if config.parallel {
            seeds.par_iter().map(grow).collect()
        } else {
            seeds.iter().map(grow).collect()
        };

        // Mean of per-tree normalized importances, renormalized
        let mut feature_importances = vec![0.0; n_features];
        for g in &grown {
            let total: f64 = g.importances.iter().sum();
            if total > 0.0 {
                for (acc, v) in feature_importances.iter_mut().zip(&g.importances) {
                    *acc += v / total;
                }
            }
        }
        let total: f64 = feature_importances.iter().sum();
        if total > 0.0 {
            feature_importances.iter_mut().for_each(|v| *v /= total);
        }

        let oob_score = if config.oob_score {
            let mut votes = vec![vec![0.0; n_classes]; n];
            for g in &grown {
                for (i, proba) in &g.oob {
                    for (acc, p) in votes[*i].iter_mut().zip(proba) {
                        *acc += p;
                    }
                }
            }
            let mut scored = 0usize;
            let mut correct = 0usize;
            for (i, v) in votes.iter().enumerate() {
                if v.iter().sum::<f64>() <= 0.0 {
                    continue;
                }
                scored += 1;
                if argmax(v) == y[i] {
                    correct += 1;
                }
            }
            if scored < n {
                log::warn!(
                    "{} samples were never out-of-bag; OOB estimate uses {} samples",
                    n - scored,
                    scored
                );
            }
            (scored > 0).then(|| correct as f64 / scored as f64)
        } else {
            None
        };

        log::debug!(
            "Grew {} trees ({} features, max_features={})",
            grown.len(),
            n_features,
            params.max_features
        );

        Ok(Self {
            config: config.clone(),
            n_features,
            n_classes,
            trees: grown.into_iter().map(|g| g.tree).collect(),
            feature_importances,
            oob_score,
        })
    }

    /// Mean class distribution over all trees
    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, StressError> {
        if row.len() != self.n_features {
            return Err(StressError::SchemaMismatch {
                expected: self.n_features,
                got: row.len(),
            });
        }
        if self.trees.is_empty() {
            return Err(StressError::ScoringFailure("Forest has no trees".to_string()));
        }
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in proba.iter_mut().zip(tree.predict_proba(row)) {
                *acc += p;
            }
        }
        let k = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= k);
        Ok(proba)
    }

    /// Most probable class index
    pub fn predict(&self, row: &[f64]) -> Result<usize, StressError> {
        Ok(argmax(&self.predict_proba(row)?))
    }

    /// Mean decrease in impurity per feature, summing to 1
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn oob_score(&self) -> Option<f64> {
        self.oob_score
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Structural check for deserialized forests
    pub fn is_well_formed(&self) -> bool {
        !self.trees.is_empty()
            && self.feature_importances.len() == self.n_features
            && self
                .trees
                .iter()
                .all(|t| t.n_classes() == self.n_classes && t.is_well_formed(self.n_features))
    }
}

/// Index of the largest value; ties resolve to the lowest index
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
