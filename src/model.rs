use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::{Error, Result};
use crate::estimator::{Estimator, Regressor};
use crate::scaler::StandardScaler;

/// Scaler + estimator fitted together. The scaler is fitted once on the
/// training rows and reapplied as-is before every prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    feature_names: Vec<String>, // authoritative input order
    scaler: Option<StandardScaler>,
    estimator: Estimator,
}

impl Pipeline {
    pub fn new(feature_names: Vec<String>, estimator: Estimator) -> Self {
        Self {
            feature_names,
            scaler: None,
            estimator,
        }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    pub fn scaler(&self) -> Option<&StandardScaler> {
        self.scaler.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.scaler.is_some()
    }

    /// Writes the pipeline as JSON, creating parent directories and
    /// overwriting any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::storage(parent, e))?;
        }
        let body = serde_json::to_vec(self)
            .map_err(|e| Error::Serialization(format!("failed to encode pipeline: {e}")))?;
        fs::write(path, body).map_err(|e| Error::storage(path, e))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let body = fs::read(path).map_err(|e| Error::storage(path, e))?;
        let pipeline: Pipeline = serde_json::from_slice(&body).map_err(|e| {
            Error::Serialization(format!("failed to parse pipeline {}: {e}", path.display()))
        })?;
        if !pipeline.is_fitted() {
            return Err(Error::NotReady("stored pipeline was never fitted"));
        }
        Ok(pipeline)
    }
}

impl Regressor for Pipeline {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        if !self.feature_names.is_empty() && x.ncols() != self.feature_names.len() {
            return Err(Error::Schema(format!(
                "feature length mismatch: got {}, expected {}",
                x.ncols(),
                self.feature_names.len()
            )));
        }
        let scaler = StandardScaler::fit(x)?;
        let scaled = scaler.transform(x)?;
        self.estimator.fit(scaled.view(), y)?;
        self.scaler = Some(scaler);
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let scaler = self
            .scaler
            .as_ref()
            .ok_or(Error::NotReady("pipeline is not fitted"))?;
        let scaled = scaler.transform(x)?;
        self.estimator.predict(scaled.view())
    }
}
