use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use f1_race_predictor::config::{model_filename, DEFAULT_MODEL_FILE};
use f1_race_predictor::features::{process_lap_data, save_processed_data, sector_aggregates};
use f1_race_predictor::openf1::OpenF1Client;
use f1_race_predictor::predictor::{example_qualifying, generate_report, load_qualifying_csv};
use f1_race_predictor::{
    EstimatorKind, ModelTrainer, RacePredictor, SessionLoader, SessionType, Settings,
};

/// Formula 1 Race Predictor CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Year of historical race to analyze
    #[arg(long)]
    year: Option<i32>,

    /// Name of the race circuit
    #[arg(long)]
    race: Option<String>,

    /// Train a new model
    #[arg(long)]
    train: bool,

    /// Predict 2025 race results
    #[arg(long = "predict-2025")]
    predict_2025: bool,

    /// Path to trained model
    #[arg(long, env = "MODEL_PATH")]
    model_path: Option<PathBuf>,

    /// Regression algorithm to train
    #[arg(long, value_enum, default_value_t = EstimatorKind::GradientBoosting)]
    estimator: EstimatorKind,

    /// Session type code: R, Q, S, SQ, FP1, FP2, FP3
    #[arg(long, default_value = "R")]
    session: SessionType,

    /// Qualifying CSV with Driver, DriverCode and "QualifyingTime (s)" columns
    #[arg(long)]
    qualifying: Option<PathBuf>,

    /// Also write the processed laps under data/processed
    #[arg(long)]
    save_features: bool,

    /// JSON settings file
    #[arg(long, env = "F1_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    fn race_args(&self, mode: &str) -> Result<(i32, &str)> {
        match (self.year, self.race.as_deref()) {
            (Some(year), Some(race)) => Ok((year, race)),
            _ => anyhow::bail!("{mode} needs both --year and --race"),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    settings
        .ensure_dirs()
        .context("failed to create data/model/cache directories")?;

    if !cli.train && !cli.predict_2025 {
        tracing::warn!("nothing to do; pass --train and/or --predict-2025");
        return Ok(());
    }

    let loader = SessionLoader::new(OpenF1Client::from_settings(&settings)?);
    let trainer = ModelTrainer::from_settings(&settings);
    let mut predictor = RacePredictor::new(cli.model_path.as_deref())
        .context("failed to load the requested model")?;

    if cli.train {
        let (year, race) = cli.race_args("training")?;
        println!("Training model on {year} {race} data...");

        let session = loader.load_session_data(year, race, cli.session)?;
        let laps = process_lap_data(&session)?;
        if cli.save_features {
            let name = format!("laps_{}_{}.csv", year, race.replace(' ', "_"));
            save_processed_data(&laps, &name, &settings.data_dir)?;
        }

        let (x, y) = trainer.prepare_data(&laps)?;
        let (model, metrics) = trainer.train_model(&x, &y, cli.estimator)?;
        trainer.save_model(&model, &model_filename(year, race))?;
        println!("Model trained with MAE: {:.3}", metrics.mae);
    }

    if cli.predict_2025 {
        if cli.model_path.is_none() {
            let fallback = settings.model_dir.join(DEFAULT_MODEL_FILE);
            predictor
                .load_model(&fallback)
                .with_context(|| format!("failed to load default model {}", fallback.display()))?;
        }

        let (year, race) = cli.race_args("prediction")?;
        println!("Predicting 2025 {race} results...");

        // TODO: replace the placeholder grid with a live qualifying feed
        let qualifying = match &cli.qualifying {
            Some(path) => load_qualifying_csv(path)
                .with_context(|| format!("failed to read qualifying table {}", path.display()))?,
            None => example_qualifying(),
        };

        let session = loader.load_session_data(year, race, cli.session)?;
        let laps = process_lap_data(&session)?;
        let sectors = sector_aggregates(&laps)?;

        let predictions = predictor.predict_race(&qualifying, &sectors)?;
        println!("\n{}", generate_report(&predictions));
    }

    Ok(())
}
