//! End-to-end tests for the training and prediction paths
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::time::Duration;

use f1_race_predictor::config::{model_filename, SplitConfig};
use f1_race_predictor::estimator::EstimatorDefaults;
use f1_race_predictor::features::{process_lap_data, sector_aggregates};
use f1_race_predictor::predictor::{example_qualifying, QualifyingEntry};
use f1_race_predictor::session::StaticSource;
use f1_race_predictor::types::LapColumn;
use f1_race_predictor::{
    generate_report, EstimatorKind, LapRecord, LapTable, ModelTrainer, RacePredictor, Session,
    SessionInfo, SessionLoader, SessionType,
};

const DRIVERS: [(&str, u64); 5] = [
    ("VER", 0),
    ("HAM", 180),
    ("NOR", 260),
    ("LEC", 330),
    ("PER", 410),
];

/// 30 laps per driver. Sector times grow with tyre age; every first lap
/// has no lap time (standing start), like real timing feeds.
fn synthetic_session() -> Session {
    let mut rows = Vec::new();
    for (driver, offset) in DRIVERS {
        for lap in 1..=30u64 {
            let stint_lap = if lap <= 15 { lap } else { lap - 15 };
            let wobble = (lap * 37 + offset) % 90;
            let s1 = 24_800 + offset / 3 + stint_lap * 40 + wobble;
            let s2 = 29_100 + offset / 3 + stint_lap * 35 + (wobble * 7) % 60;
            let s3 = 36_300 + offset / 3 + stint_lap * 30 + (wobble * 3) % 50;
            rows.push(LapRecord {
                driver: driver.to_string(),
                lap_number: lap as u32,
                lap_time: (lap > 1).then(|| Duration::from_millis(s1 + s2 + s3)),
                sector1_time: Some(Duration::from_millis(s1)),
                sector2_time: Some(Duration::from_millis(s2)),
                sector3_time: Some(Duration::from_millis(s3)),
                compound: Some(if lap <= 15 { "MEDIUM" } else { "HARD" }.to_string()),
                tyre_life: Some(stint_lap as u32),
                position: None,
                pit_out_time: None,
                pit_in_time: None,
            });
        }
    }
    Session {
        info: SessionInfo {
            year: 2024,
            event_name: "Chinese Grand Prix".into(),
            session_name: "Race".into(),
        },
        laps: LapTable::new(
            [
                LapColumn::Driver,
                LapColumn::LapTime,
                LapColumn::Sector1Time,
                LapColumn::Sector2Time,
                LapColumn::Sector3Time,
                LapColumn::Compound,
                LapColumn::TyreLife,
            ],
            rows,
        ),
    }
}

fn loader() -> SessionLoader<StaticSource> {
    SessionLoader::new(StaticSource::new().with_session(
        2024,
        "China",
        SessionType::Race,
        synthetic_session(),
    ))
}

fn trainer(model_dir: &std::path::Path) -> ModelTrainer {
    ModelTrainer::new(EstimatorDefaults::default(), SplitConfig::default(), model_dir)
}

#[test]
fn test_training_pipeline() {
    println!("\n=== Test: Training Pipeline ===");
    let dir = tempfile::tempdir().unwrap();
    let trainer = trainer(&dir.path().join("models"));

    let session = loader().load_race(2024, "China").unwrap();
    let laps = process_lap_data(&session).unwrap();
    assert_eq!(laps.len(), 5 * 29, "first laps have no lap time and must be dropped");
    assert!(laps.rows.iter().all(|r| r.lap_time_s.is_finite()));

    let (x, y) = trainer.prepare_data(&laps).unwrap();
    assert_eq!(x.values.dim(), (145, 4));

    let (model, metrics) = trainer
        .train_model(&x, &y, EstimatorKind::GradientBoosting)
        .unwrap();
    println!("✓ MAE={:.3}s RMSE={:.3}s", metrics.mae, metrics.rmse);
    assert!(metrics.mae.is_finite() && metrics.mae >= 0.0);
    assert!(metrics.rmse.is_finite() && metrics.rmse >= 0.0);
    // lap time is the sum of the sector features; the fit should be tight
    assert!(metrics.mae < 1.0, "MAE unexpectedly high: {}", metrics.mae);

    let path = trainer
        .save_model(&model, &model_filename(2024, "China"))
        .unwrap();
    assert_eq!(path, dir.path().join("models/f1_model_2024_China.json"));
    assert!(path.is_file());
    println!("✓ Saved to {}", path.display());
}

#[test]
fn test_training_is_reproducible() {
    println!("\n=== Test: Reproducible Training ===");
    let dir = tempfile::tempdir().unwrap();
    let trainer = trainer(dir.path());
    let laps = process_lap_data(&synthetic_session()).unwrap();
    let (x, y) = trainer.prepare_data(&laps).unwrap();

    for kind in [EstimatorKind::GradientBoosting, EstimatorKind::RandomForest] {
        let (model_a, a) = trainer.train_model(&x, &y, kind).unwrap();
        let (model_b, b) = trainer.train_model(&x, &y, kind).unwrap();
        assert_eq!(a, b, "{kind:?} metrics differ between runs");
        assert_eq!(model_a, model_b);
        println!("✓ {kind:?}: MAE={:.4} twice", a.mae);
    }
}

#[test]
fn test_save_model_overwrites() {
    println!("\n=== Test: Save Overwrites ===");
    let dir = tempfile::tempdir().unwrap();
    let trainer = trainer(dir.path());
    let laps = process_lap_data(&synthetic_session()).unwrap();
    let (x, y) = trainer.prepare_data(&laps).unwrap();

    let (gb, _) = trainer.train_model(&x, &y, EstimatorKind::GradientBoosting).unwrap();
    let (rf, _) = trainer.train_model(&x, &y, EstimatorKind::RandomForest).unwrap();
    let path = trainer.save_model(&gb, "model.json").unwrap();
    trainer.save_model(&rf, "model.json").unwrap();

    let loaded = f1_race_predictor::Pipeline::load(&path).unwrap();
    assert_eq!(loaded.estimator().kind(), EstimatorKind::RandomForest);
    println!("✓ Second save replaced the first");
}

#[test]
fn test_prediction_pipeline() {
    println!("\n=== Test: Prediction Pipeline ===");
    let dir = tempfile::tempdir().unwrap();
    let trainer = trainer(dir.path());
    let session = loader().load_race(2024, "China").unwrap();
    let laps = process_lap_data(&session).unwrap();
    let (x, y) = trainer.prepare_data(&laps).unwrap();
    let (model, _) = trainer.train_model(&x, &y, EstimatorKind::GradientBoosting).unwrap();
    let path = trainer.save_model(&model, "f1_model_2024_China.json").unwrap();

    let predictor = RacePredictor::new(Some(path.as_path())).unwrap();
    assert!(predictor.is_ready());

    let sectors = sector_aggregates(&laps).unwrap();
    assert_eq!(sectors.len(), 5);

    let ranked = predictor.predict_race(&example_qualifying(), &sectors).unwrap();
    assert_eq!(ranked.len(), 5);
    for pair in ranked.windows(2) {
        assert!(pair[0].predicted_race_time_s <= pair[1].predicted_race_time_s);
    }

    let report = generate_report(&ranked);
    println!("{report}");
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines.len(), 2 + 5);
    assert!(lines[2].starts_with("1. "));
    assert!(lines[6].starts_with("5. ") && lines[6].ends_with('s'));
    println!("✓ Report rendered");
}

#[test]
fn test_unknown_driver_is_kept() {
    println!("\n=== Test: Unknown Driver Kept ===");
    let dir = tempfile::tempdir().unwrap();
    let trainer = trainer(dir.path());
    let laps = process_lap_data(&synthetic_session()).unwrap();
    let (x, y) = trainer.prepare_data(&laps).unwrap();
    let (model, _) = trainer.train_model(&x, &y, EstimatorKind::RandomForest).unwrap();

    let predictor = RacePredictor::with_model(model);
    let mut quali = example_qualifying();
    quali.push(QualifyingEntry::new("Newcomer", "NEW", 92.0));

    let ranked = predictor
        .predict_race(&quali, &sector_aggregates(&laps).unwrap())
        .unwrap();
    assert_eq!(ranked.len(), 6);
    assert!(ranked.iter().any(|p| p.driver == "Newcomer"));
    println!("✓ Newcomer ranked with zeroed sector history");
}

#[test]
fn test_predict_without_model_fails() {
    println!("\n=== Test: Not Ready ===");
    let predictor: RacePredictor = RacePredictor::default();
    let err = predictor.predict_race(&example_qualifying(), &[]).unwrap_err();
    assert!(matches!(err, f1_race_predictor::Error::NotReady(_)));
    println!("✓ {err}");
}

#[test]
fn test_missing_session_is_data_unavailable() {
    println!("\n=== Test: Missing Session ===");
    let err = loader().load_race(2023, "China").unwrap_err();
    assert!(matches!(err, f1_race_predictor::Error::DataUnavailable { .. }));
    println!("✓ {err}");
}
