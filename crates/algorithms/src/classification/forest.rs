//! Random forest of CART trees with probability output
//!
//! Each tree is grown on a bootstrap bag of the training samples with Gini
//! splits over a random subset of `floor(sqrt(bands))` features per node.
//! Leaves keep the fraction of positive samples they received, and the
//! forest probability is the mean of those fractions over all trees.

use crate::maybe_rayon::*;
use moundscan_core::{CancelToken, Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::training::TrainingSet;

/// Class whose probability the forest reports
pub const POSITIVE_CLASS: u8 = 1;

/// Parameters for [`RandomForest::train`]
#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    /// Number of trees
    pub trees: usize,
    /// Minimum number of samples in a leaf
    pub min_leaf_population: usize,
    /// Bag size per tree as a fraction of the sample count (drawn with replacement)
    pub bag_fraction: f64,
    /// Maximum number of nodes per tree (unbounded when `None`)
    pub max_nodes: Option<usize>,
    /// Seed; tree `i` uses `seed + i`
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            trees: 128,
            min_leaf_population: 1,
            bag_fraction: 0.5,
            max_nodes: None,
            seed: 0,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> Result<()> {
        if self.trees == 0 {
            return Err(Error::invalid_param("trees", self.trees, "must be at least 1"));
        }
        if self.min_leaf_population == 0 {
            return Err(Error::invalid_param(
                "min_leaf_population",
                self.min_leaf_population,
                "must be at least 1",
            ));
        }
        if !(self.bag_fraction > 0.0 && self.bag_fraction <= 1.0) {
            return Err(Error::invalid_param("bag_fraction", self.bag_fraction, "must be in (0, 1]"));
        }
        if let Some(n) = self.max_nodes
            && n == 0
        {
            return Err(Error::invalid_param("max_nodes", n, "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        positive: f64,
    },
}

/// A single CART tree stored as a node arena; node 0 is the root
#[derive(Debug, Clone, PartialEq)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict(&self, values: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { positive } => return *positive,
                Node::Split { feature, threshold, left, right } => {
                    idx = if values[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Trained ensemble. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    bands: Vec<String>,
    trees: Vec<Tree>,
}

impl RandomForest {
    /// Grow the forest on a validated training set.
    ///
    /// Trees are grown in parallel and `cancel` is checked before each one.
    pub fn train(set: &TrainingSet, params: &ForestParams, cancel: &CancelToken) -> Result<Self> {
        params.validate()?;
        set.validate()?;

        let features = set.bands.len();
        let x: Vec<&[f64]> = set.samples.iter().map(|s| s.values.as_slice()).collect();
        let y: Vec<bool> = set.samples.iter().map(|s| s.class == POSITIVE_CLASS).collect();
        let grower = Grower {
            x: &x,
            y: &y,
            features,
            mtry: ((features as f64).sqrt().floor() as usize).max(1),
            params,
        };

        let trees = (0..params.trees)
            .into_par_iter()
            .map(|i| {
                cancel.check()?;
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(i as u64));
                Ok(grower.grow(&mut rng))
            })
            .collect::<Result<Vec<Tree>>>()?;

        Ok(Self {
            bands: set.bands.clone(),
            trees,
        })
    }

    /// Band order the forest expects
    pub fn bands(&self) -> &[String] {
        &self.bands
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Probability of [`POSITIVE_CLASS`] for one feature vector
    pub fn predict_proba(&self, values: &[f64]) -> Result<f64> {
        if values.len() != self.bands.len() {
            return Err(Error::invalid_param(
                "values",
                values.len(),
                format!("expected {} band values", self.bands.len()),
            ));
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(values)).sum();
        Ok(sum / self.trees.len() as f64)
    }
}

struct Grower<'a> {
    x: &'a [&'a [f64]],
    y: &'a [bool],
    features: usize,
    mtry: usize,
    params: &'a ForestParams,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl Grower<'_> {
    fn grow(&self, rng: &mut StdRng) -> Tree {
        let n = self.x.len();
        let bag = ((n as f64 * self.params.bag_fraction).round() as usize).max(1);
        let sample: Vec<usize> = (0..bag).map(|_| rng.gen_range(0..n)).collect();

        let max_nodes = self.params.max_nodes.unwrap_or(usize::MAX);
        let mut nodes = vec![Node::Leaf { positive: self.positive_fraction(&sample) }];
        let mut stack = vec![(0usize, sample)];

        while let Some((idx, members)) = stack.pop() {
            // A split adds two nodes
            if nodes.len() + 2 > max_nodes {
                continue;
            }
            let Some(best) = self.best_split(&members, rng) else {
                continue;
            };
            let (left, right): (Vec<usize>, Vec<usize>) = members
                .into_iter()
                .partition(|&i| self.x[i][best.feature] <= best.threshold);

            let left_idx = nodes.len();
            nodes.push(Node::Leaf { positive: self.positive_fraction(&left) });
            nodes.push(Node::Leaf { positive: self.positive_fraction(&right) });
            nodes[idx] = Node::Split {
                feature: best.feature,
                threshold: best.threshold,
                left: left_idx,
                right: left_idx + 1,
            };
            stack.push((left_idx + 1, right));
            stack.push((left_idx, left));
        }

        Tree { nodes }
    }

    fn positive_fraction(&self, members: &[usize]) -> f64 {
        if members.is_empty() {
            return 0.0;
        }
        members.iter().filter(|&&i| self.y[i]).count() as f64 / members.len() as f64
    }

    fn best_split(&self, members: &[usize], rng: &mut StdRng) -> Option<BestSplit> {
        let n = members.len();
        let min_leaf = self.params.min_leaf_population;
        if n < 2 * min_leaf {
            return None;
        }
        let positives = members.iter().filter(|&&i| self.y[i]).count();
        let parent = gini(positives, n);
        if parent <= 0.0 {
            return None;
        }

        let mut best: Option<BestSplit> = None;
        let mut order = members.to_vec();
        for feature in rand::seq::index::sample(rng, self.features, self.mtry) {
            order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left_pos = 0usize;
            for k in 1..n {
                if self.y[order[k - 1]] {
                    left_pos += 1;
                }
                let lo = self.x[order[k - 1]][feature];
                let hi = self.x[order[k]][feature];
                if lo == hi || k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let impurity = (k as f64 * gini(left_pos, k)
                    + (n - k) as f64 * gini(positives - left_pos, n - k))
                    / n as f64;
                if best.as_ref().is_none_or(|b| impurity < b.impurity) {
                    best = Some(BestSplit {
                        feature,
                        threshold: lo + (hi - lo) / 2.0,
                        impurity,
                    });
                }
            }
        }

        best.filter(|b| b.impurity < parent - 1e-12)
    }
}

fn gini(positives: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::training::TrainingSample;

    /// Positives sit high on bands a-c, band d is shared noise
    fn separable() -> TrainingSet {
        let mut samples = Vec::new();
        for i in 0..30 {
            let v = (i % 5) as f64 * 0.5;
            let noise = ((i * 7) % 11) as f64;
            samples.push(TrainingSample { class: 1, values: vec![6.0 + v, 7.0 - v, 9.0 + v, noise] });
            samples.push(TrainingSample { class: 0, values: vec![1.0 + v, 2.0 - v, 3.0 + v, noise] });
        }
        TrainingSet {
            bands: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            samples,
        }
    }

    #[test]
    fn test_separable_probabilities() {
        let forest = RandomForest::train(&separable(), &ForestParams::default(), &CancelToken::new()).unwrap();
        assert_eq!(forest.tree_count(), 128);
        let high = forest.predict_proba(&[7.0, 6.5, 10.0, 3.0]).unwrap();
        let low = forest.predict_proba(&[1.5, 1.5, 3.5, 3.0]).unwrap();
        assert!(high > 0.9, "high = {}", high);
        assert!(low < 0.1, "low = {}", low);
        assert!((0.0..=1.0).contains(&high) && (0.0..=1.0).contains(&low));
    }

    #[test]
    fn test_seed_is_deterministic() {
        let params = ForestParams { trees: 16, seed: 42, ..Default::default() };
        let a = RandomForest::train(&separable(), &params, &CancelToken::new()).unwrap();
        let b = RandomForest::train(&separable(), &params, &CancelToken::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_node_forest_is_class_prior() {
        let params = ForestParams { trees: 4, max_nodes: Some(1), bag_fraction: 1.0, ..Default::default() };
        let forest = RandomForest::train(&separable(), &params, &CancelToken::new()).unwrap();
        let p = forest.predict_proba(&[7.0, 6.5, 10.0, 3.0]).unwrap();
        let q = forest.predict_proba(&[1.0, 2.0, 3.0, 3.0]).unwrap();
        assert_eq!(p, q);
        assert!(p > 0.0 && p < 1.0);
    }

    #[test]
    fn test_cancelled_training() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = RandomForest::train(&separable(), &ForestParams::default(), &cancel).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_wrong_band_count() {
        let params = ForestParams { trees: 2, ..Default::default() };
        let forest = RandomForest::train(&separable(), &params, &CancelToken::new()).unwrap();
        assert!(forest.predict_proba(&[1.0]).is_err());
    }

    #[test]
    fn test_invalid_params() {
        let set = separable();
        let cancel = CancelToken::new();
        for params in [
            ForestParams { trees: 0, ..Default::default() },
            ForestParams { bag_fraction: 0.0, ..Default::default() },
            ForestParams { min_leaf_population: 0, ..Default::default() },
        ] {
            assert!(matches!(
                RandomForest::train(&set, &params, &cancel),
                Err(Error::InvalidParameter { .. })
            ));
        }
    }
}
