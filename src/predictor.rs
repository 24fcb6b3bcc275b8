use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::estimator::Regressor;
use crate::features::SectorAggregate;
use crate::model::Pipeline;

/// Inference inputs, in the order the fitted pipeline consumes them.
pub const PREDICTION_FEATURES: [&str; 4] = [
    "QualifyingTime (s)",
    "Sector1Time (s)",
    "Sector2Time (s)",
    "Sector3Time (s)",
];

const QUALIFYING_COLUMNS: [&str; 3] = ["Driver", "DriverCode", "QualifyingTime (s)"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualifyingEntry {
    #[serde(rename = "Driver")]
    pub driver: String,
    #[serde(rename = "DriverCode")]
    pub driver_code: String,
    #[serde(rename = "QualifyingTime (s)")]
    pub qualifying_time_s: f64,
}

impl QualifyingEntry {
    pub fn new(driver: &str, driver_code: &str, qualifying_time_s: f64) -> Self {
        Self {
            driver: driver.to_string(),
            driver_code: driver_code.to_string(),
            qualifying_time_s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub driver: String,
    pub predicted_race_time_s: f64,
}

/// Placeholder grid until a live qualifying feed is wired in.
pub fn example_qualifying() -> Vec<QualifyingEntry> {
    vec![
        QualifyingEntry::new("Verstappen", "VER", 90.123),
        QualifyingEntry::new("Hamilton", "HAM", 90.456),
        QualifyingEntry::new("Norris", "NOR", 90.789),
        QualifyingEntry::new("Leclerc", "LEC", 91.012),
        QualifyingEntry::new("Perez", "PER", 91.345),
    ]
}

/// Reads `Driver,DriverCode,QualifyingTime (s)` rows from a CSV file.
pub fn load_qualifying_csv(path: &Path) -> Result<Vec<QualifyingEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::from_csv(path, e))?;
    let headers = reader.headers().map_err(|e| Error::from_csv(path, e))?.clone();
    for column in QUALIFYING_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(Error::missing_column(column));
        }
    }
    reader
        .deserialize()
        .map(|row| row.map_err(|e| Error::from_csv(path, e)))
        .collect()
}

/// Holds at most one fitted model. Without one, every prediction fails
/// with [`Error::NotReady`].
pub struct RacePredictor<R = Pipeline> {
    model: Option<R>,
}

impl<R> Default for RacePredictor<R> {
    fn default() -> Self {
        Self { model: None }
    }
}

impl RacePredictor<Pipeline> {
    /// Loads the pipeline at `model_path` up front when one is given.
    pub fn new(model_path: Option<&Path>) -> Result<Self> {
        let mut predictor = Self::default();
        if let Some(path) = model_path {
            predictor.load_model(path)?;
        }
        Ok(predictor)
    }

    /// Replaces any held model with the pipeline stored at `path`.
    pub fn load_model(&mut self, path: &Path) -> Result<()> {
        let pipeline = Pipeline::load(path)?;
        if pipeline.feature_names() != PREDICTION_FEATURES {
            tracing::warn!(
                "pipeline features {:?} differ from inference features {:?}; matching by position",
                pipeline.feature_names(),
                PREDICTION_FEATURES
            );
        }
        tracing::info!(path = %path.display(), "loaded model");
        self.model = Some(pipeline);
        Ok(())
    }
}

impl<R: Regressor> RacePredictor<R> {
    pub fn with_model(model: R) -> Self {
        Self { model: Some(model) }
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    /// Left-joins qualifying rows to sector means on driver code (missing
    /// sector values become 0.0), predicts, and ranks ascending. Ties keep
    /// the qualifying order.
    pub fn predict_race(
        &self,
        qualifying: &[QualifyingEntry],
        sectors: &[SectorAggregate],
    ) -> Result<Vec<Prediction>> {
        let model = self
            .model
            .as_ref()
            .ok_or(Error::NotReady("no model loaded for predictions"))?;

        let by_driver: HashMap<&str, &SectorAggregate> =
            sectors.iter().map(|s| (s.driver.as_str(), s)).collect();

        let mut flat = Vec::with_capacity(qualifying.len() * PREDICTION_FEATURES.len());
        for entry in qualifying {
            let sector = by_driver.get(entry.driver_code.as_str());
            if sector.is_none() {
                tracing::warn!(
                    driver = %entry.driver,
                    code = %entry.driver_code,
                    "no historical sector data; using 0.0"
                );
            }
            let s = |pick: fn(&SectorAggregate) -> Option<f64>| {
                sector.and_then(|agg| pick(agg)).unwrap_or(0.0)
            };
            flat.extend([
                entry.qualifying_time_s,
                s(|a| a.sector1_s),
                s(|a| a.sector2_s),
                s(|a| a.sector3_s),
            ]);
        }

        let x = Array2::from_shape_vec((qualifying.len(), PREDICTION_FEATURES.len()), flat)
            .map_err(|e| Error::Schema(e.to_string()))?;
        let predicted = if qualifying.is_empty() {
            Vec::new()
        } else {
            model.predict(x.view())?.to_vec()
        };

        let mut ranked: Vec<Prediction> = qualifying
            .iter()
            .zip(predicted)
            .map(|(entry, t)| Prediction {
                driver: entry.driver.clone(),
                predicted_race_time_s: t,
            })
            .collect();
        ranked.sort_by(|a, b| a.predicted_race_time_s.total_cmp(&b.predicted_race_time_s));
        Ok(ranked)
    }
}

pub fn generate_report(predictions: &[Prediction]) -> String {
    let mut report = vec!["🏁 Formula 1 Race Predictions 🏁".to_string(), "=".repeat(40)];
    for (i, p) in predictions.iter().enumerate() {
        report.push(format!("{}. {}: {:.3}s", i + 1, p.driver, p.predicted_race_time_s));
    }
    report.join("\n")
}
