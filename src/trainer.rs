use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{Settings, SplitConfig};
use crate::error::{Error, Result};
use crate::estimator::{EstimatorDefaults, EstimatorKind, Regressor};
use crate::features::{FeatureColumn, FeatureTable};
use crate::model::Pipeline;

/// Model inputs, in this order.
pub const TRAINING_FEATURES: [FeatureColumn; 4] = [
    FeatureColumn::Sector1Time,
    FeatureColumn::Sector2Time,
    FeatureColumn::Sector3Time,
    FeatureColumn::TyreLife,
];
pub const TARGET: FeatureColumn = FeatureColumn::LapTime;

/// Named feature columns over a dense matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(Error::Schema(format!(
                "{} column names for {} columns",
                columns.len(),
                values.ncols()
            )));
        }
        Ok(Self { columns, values })
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), rows),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub mae: f64,
    pub rmse: f64,
}

impl Metrics {
    pub fn evaluate(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> Self {
        let n = y_true.len().max(1) as f64;
        let (abs, sq) = y_true
            .iter()
            .zip(y_pred.iter())
            .fold((0.0, 0.0), |(abs, sq), (t, p)| {
                let e = t - p;
                (abs + e.abs(), sq + e * e)
            });
        Self {
            mae: abs / n,
            rmse: (sq / n).sqrt(),
        }
    }
}

/// Shuffled split of `n` row indices into (train, test). The test side
/// gets `ceil(test_size * n)` rows.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(Error::Training(format!("test_size must be in (0, 1), got {test_size}")));
    }
    let n_test = (test_size * n as f64).ceil() as usize;
    if n < 2 || n_test == 0 || n_test >= n {
        return Err(Error::Training(format!(
            "need at least two usable laps to split, got {n}"
        )));
    }
    let mut perm: Vec<usize> = (0..n).collect();
    perm.shuffle(&mut StdRng::seed_from_u64(seed));
    let test = perm[..n_test].to_vec();
    let train = perm[n_test..].to_vec();
    Ok((train, test))
}

pub struct ModelTrainer {
    estimators: EstimatorDefaults,
    split: SplitConfig,
    model_dir: PathBuf,
}

impl ModelTrainer {
    pub fn new(estimators: EstimatorDefaults, split: SplitConfig, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            estimators,
            split,
            model_dir: model_dir.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.estimators.clone(),
            settings.split.clone(),
            settings.model_dir.clone(),
        )
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Sector times and tyre life as features, lap time as target. Laps
    /// missing any of those values are skipped.
    pub fn prepare_data(&self, table: &FeatureTable) -> Result<(FeatureMatrix, Array1<f64>)> {
        for column in TRAINING_FEATURES.iter().chain(std::iter::once(&TARGET)) {
            table.require(*column)?;
        }

        let mut flat = Vec::with_capacity(table.len() * TRAINING_FEATURES.len());
        let mut target = Vec::with_capacity(table.len());
        let mut skipped = 0usize;
        for row in &table.rows {
            let values: Option<Vec<f64>> = TRAINING_FEATURES.iter().map(|c| row.numeric(*c)).collect();
            match values {
                Some(values) if values.iter().all(|v| v.is_finite()) => {
                    flat.extend(values);
                    target.push(row.lap_time_s);
                }
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::debug!(skipped, "laps with missing feature values left out");
        }

        let values = Array2::from_shape_vec((target.len(), TRAINING_FEATURES.len()), flat)
            .map_err(|e| Error::Schema(e.to_string()))?;
        let columns = TRAINING_FEATURES.iter().map(|c| c.name().to_string()).collect();
        Ok((FeatureMatrix::new(columns, values)?, Array1::from(target)))
    }

    /// Splits, fits scaler + estimator on the training part and scores the
    /// held-out part.
    pub fn train_model(
        &self,
        x: &FeatureMatrix,
        y: &Array1<f64>,
        kind: EstimatorKind,
    ) -> Result<(Pipeline, Metrics)> {
        if x.nrows() != y.len() {
            return Err(Error::Training(format!(
                "feature rows ({}) and target length ({}) differ",
                x.nrows(),
                y.len()
            )));
        }
        let (train, test) =
            train_test_split(x.nrows(), self.split.test_size, self.split.random_state)?;

        let x_train = x.select_rows(&train);
        let y_train = y.select(Axis(0), &train);
        let x_test = x.select_rows(&test);
        let y_test = y.select(Axis(0), &test);

        let mut pipeline = Pipeline::new(x.columns.clone(), self.estimators.build(kind));
        pipeline.fit(x_train.values.view(), y_train.view())?;

        let y_pred = pipeline.predict(x_test.values.view())?;
        let metrics = Metrics::evaluate(y_test.view(), y_pred.view());

        tracing::info!(
            "{} trained with MAE: {:.3}, RMSE: {:.3}",
            kind.name(),
            metrics.mae,
            metrics.rmse
        );
        Ok((pipeline, metrics))
    }

    /// Serializes the pipeline to `<model_dir>/<filename>`, overwriting.
    pub fn save_model(&self, pipeline: &Pipeline, filename: &str) -> Result<PathBuf> {
        let path = self.model_dir.join(filename);
        pipeline.save(&path)?;
        tracing::info!("Model saved to {}", path.display());
        Ok(path)
    }
}
