use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use super::{check_fit_input, check_predict_input, Regressor};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoostingConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Fraction of rows drawn (without replacement) for each stage.
    pub subsample: f64,
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            learning_rate: 0.1,
            max_depth: 3,
            subsample: 1.0,
            random_state: 42,
        }
    }
}

/// Least-squares gradient boosting: each stage fits a shallow tree to the
/// residuals of the running prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    pub config: GradientBoostingConfig,
    init: Option<f64>,
    stages: Vec<RegressionTree>,
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            init: None,
            stages: Vec::new(),
        }
    }

    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        check_fit_input(&x, &y)?;
        let cfg = &self.config;
        if !(cfg.learning_rate > 0.0) {
            return Err(Error::Training(format!(
                "learning_rate must be positive, got {}",
                cfg.learning_rate
            )));
        }
        if !(cfg.subsample > 0.0 && cfg.subsample <= 1.0) {
            return Err(Error::Training(format!(
                "subsample must be in (0, 1], got {}",
                cfg.subsample
            )));
        }

        let n = x.nrows();
        let init = y.mean().unwrap_or(0.0);
        let mut current = Array1::from_elem(n, init);
        let params = TreeParams {
            max_depth: Some(cfg.max_depth),
            ..TreeParams::default()
        };
        let mut rng = StdRng::seed_from_u64(cfg.random_state);
        let draw = ((cfg.subsample * n as f64).round() as usize).clamp(1, n);
        let all: Vec<usize> = (0..n).collect();

        let mut stages = Vec::with_capacity(cfg.n_estimators);
        for _ in 0..cfg.n_estimators {
            let residuals = &y - &current;
            let rows = if draw < n {
                let mut picked = sample(&mut rng, n, draw).into_vec();
                picked.sort_unstable();
                picked
            } else {
                all.clone()
            };
            let tree = RegressionTree::fit(x, residuals.view(), &rows, &params);
            for (i, row) in x.outer_iter().enumerate() {
                current[i] += cfg.learning_rate * tree.predict_row(row);
            }
            stages.push(tree);
        }

        self.init = Some(init);
        self.stages = stages;
        tracing::debug!(stages = self.stages.len(), init, "gradient boosting fitted");
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let init = self
            .init
            .ok_or(Error::NotReady("gradient boosting model is not fitted"))?;
        check_predict_input(&x)?;
        let lr = self.config.learning_rate;
        Ok(x
            .outer_iter()
            .map(|row| {
                init + self
                    .stages
                    .iter()
                    .map(|tree| lr * tree.predict_row(row))
                    .sum::<f64>()
            })
            .collect())
    }
}
