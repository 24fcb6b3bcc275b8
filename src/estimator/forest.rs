use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use super::{check_fit_input, check_predict_input, Regressor};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomForestConfig {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    pub random_state: u64,
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_leaf: 1,
            random_state: 42,
        }
    }
}

/// Bagged regression trees; the prediction is the mean over trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    pub config: RandomForestConfig,
    trees: Vec<RegressionTree>,
}

impl RandomForestRegressor {
    pub fn new(config: RandomForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        check_fit_input(&x, &y)?;
        if self.config.n_estimators == 0 {
            return Err(Error::Training("random forest needs at least one tree".into()));
        }

        let n = x.nrows();
        let params = TreeParams {
            max_depth: self.config.max_depth,
            min_samples_leaf: self.config.min_samples_leaf,
            ..TreeParams::default()
        };
        let mut rng = StdRng::seed_from_u64(self.config.random_state);

        let mut trees = Vec::with_capacity(self.config.n_estimators);
        for _ in 0..self.config.n_estimators {
            let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            trees.push(RegressionTree::fit(x, y, &bootstrap, &params));
        }
        self.trees = trees;
        tracing::debug!(trees = self.trees.len(), "random forest fitted");
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(Error::NotReady("random forest model is not fitted"));
        }
        check_predict_input(&x)?;
        let k = self.trees.len() as f64;
        Ok(x
            .outer_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / k)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn averages_trees_over_bootstrap_samples() {
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| if v < 15.0 { 80.0 } else { 95.0 });

        let mut rf = RandomForestRegressor::new(RandomForestConfig {
            n_estimators: 25,
            ..Default::default()
        });
        rf.fit(x.view(), y.view()).unwrap();
        assert_eq!(rf.n_trees(), 25);

        let pred = rf.predict(array![[2.0], [27.0]].view()).unwrap();
        assert!((pred[0] - 80.0).abs() < 1.0, "low side: {}", pred[0]);
        assert!((pred[1] - 95.0).abs() < 1.0, "high side: {}", pred[1]);
    }

    #[test]
    fn same_seed_same_forest() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| ((i * 7 + j * 3) % 11) as f64);
        let y = x.column(0).to_owned() * 2.0 - &x.column(1);
        let mut a = RandomForestRegressor::new(RandomForestConfig::default());
        let mut b = RandomForestRegressor::new(RandomForestConfig::default());
        a.fit(x.view(), y.view()).unwrap();
        b.fit(x.view(), y.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_trees_is_a_training_error() {
        let mut rf = RandomForestRegressor::new(RandomForestConfig {
            n_estimators: 0,
            ..Default::default()
        });
        let res = rf.fit(array![[1.0], [2.0]].view(), array![1.0, 2.0].view());
        assert!(matches!(res, Err(Error::Training(_))));
    }
}
