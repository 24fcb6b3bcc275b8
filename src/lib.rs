//! Formula 1 race prediction workflow.
//!
//! Session laps are fetched from a telemetry source, cleaned into per-lap
//! features, used to fit a scaled tree-ensemble regressor, and finally the
//! saved model ranks a qualifying grid by predicted race time.
//!
//! Session loader → feature builder → trainer (training path) or
//! predictor (inference path).

pub mod cache;
pub mod config;
pub mod error;
pub mod estimator;
pub mod features;
pub mod model;
pub mod openf1;
pub mod predictor;
pub mod scaler;
pub mod session;
pub mod trainer;
pub mod types;

pub use config::Settings;
pub use error::{Error, Result};
pub use estimator::{Estimator, EstimatorKind, Regressor};
pub use features::{FeatureTable, SectorAggregate};
pub use model::Pipeline;
pub use predictor::{generate_report, Prediction, QualifyingEntry, RacePredictor};
pub use session::{SessionLoader, TelemetrySource};
pub use trainer::{FeatureMatrix, Metrics, ModelTrainer};
pub use types::{LapRecord, LapTable, Session, SessionInfo, SessionType};
