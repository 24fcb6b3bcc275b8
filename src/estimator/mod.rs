//! Regression estimators behind a fit/predict contract.
//!
//! Two tree ensembles are supported and selected through the [`Estimator`]
//! enum: least-squares gradient boosting and a bagged random forest.

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub mod boosting;
pub mod forest;
pub mod tree;

pub use boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use forest::{RandomForestConfig, RandomForestRegressor};

/// Anything that can be trained on a feature matrix and then predict.
pub trait Regressor {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()>;

    /// Fails with [`Error::NotReady`] until `fit` has succeeded.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EstimatorKind {
    GradientBoosting,
    RandomForest,
}

impl EstimatorKind {
    pub fn name(self) -> &'static str {
        match self {
            EstimatorKind::GradientBoosting => "GradientBoosting",
            EstimatorKind::RandomForest => "RandomForest",
        }
    }
}

/// Hyperparameters for both estimators, fixed at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorDefaults {
    pub gradient_boosting: GradientBoostingConfig,
    pub random_forest: RandomForestConfig,
}

impl EstimatorDefaults {
    pub fn build(&self, kind: EstimatorKind) -> Estimator {
        match kind {
            EstimatorKind::GradientBoosting => Estimator::GradientBoosting(
                GradientBoostingRegressor::new(self.gradient_boosting.clone()),
            ),
            EstimatorKind::RandomForest => {
                Estimator::RandomForest(RandomForestRegressor::new(self.random_forest.clone()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model")]
pub enum Estimator {
    GradientBoosting(GradientBoostingRegressor),
    RandomForest(RandomForestRegressor),
}

impl Estimator {
    pub fn kind(&self) -> EstimatorKind {
        match self {
            Estimator::GradientBoosting(_) => EstimatorKind::GradientBoosting,
            Estimator::RandomForest(_) => EstimatorKind::RandomForest,
        }
    }
}

impl Regressor for Estimator {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        match self {
            Estimator::GradientBoosting(m) => m.fit(x, y),
            Estimator::RandomForest(m) => m.fit(x, y),
        }
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        match self {
            Estimator::GradientBoosting(m) => m.predict(x),
            Estimator::RandomForest(m) => m.predict(x),
        }
    }
}

pub(crate) fn check_fit_input(x: &ArrayView2<'_, f64>, y: &ArrayView1<'_, f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(Error::Training("cannot fit on zero rows".into()));
    }
    if x.nrows() != y.len() {
        return Err(Error::Training(format!(
            "feature rows ({}) and target length ({}) differ",
            x.nrows(),
            y.len()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(Error::Training("training data contains non-finite values".into()));
    }
    Ok(())
}

pub(crate) fn check_predict_input(x: &ArrayView2<'_, f64>) -> Result<()> {
    if x.iter().any(|v| v.is_nan()) {
        return Err(Error::Schema("prediction input contains missing values".into()));
    }
    Ok(())
}
