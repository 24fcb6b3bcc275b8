use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::estimator::EstimatorDefaults;

pub const DEFAULT_OPENF1_URL: &str = "https://api.openf1.org/v1";

/// Model used for predictions when no `--model-path` is given.
pub const DEFAULT_MODEL_FILE: &str = "f1_model_2024_China.json";

/// Held-out split used when evaluating a freshly trained model.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SplitConfig {
    pub test_size: f64,
    pub random_state: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_state: 42,
        }
    }
}

/// Paths and hyperparameters, fixed at startup. Relative directories are
/// resolved against `base_dir`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub base_dir: PathBuf,
    pub data_dir: PathBuf,
    pub model_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub openf1_base_url: String,
    pub http_timeout_secs: u64,
    pub split: SplitConfig,
    pub estimators: EstimatorDefaults,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_base_dir(PathBuf::from("."))
    }
}

impl Settings {
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            model_dir: PathBuf::from("models"),
            cache_dir: PathBuf::from("f1_cache"),
            base_dir,
            openf1_base_url: DEFAULT_OPENF1_URL.to_string(),
            http_timeout_secs: 30,
            split: SplitConfig::default(),
            estimators: EstimatorDefaults::default(),
        }
    }

    /// Defaults, overridden by the JSON file at `path` when given. The base
    /// directory comes from `F1_BASE_DIR` unless the file sets one.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base_dir = std::env::var_os("F1_BASE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut settings = match path {
            Some(path) => {
                let data = fs::read_to_string(path).map_err(|e| Error::storage(path, e))?;
                let mut parsed: Settings = serde_json::from_str(&data).map_err(|e| {
                    Error::Serialization(format!("invalid config {}: {e}", path.display()))
                })?;
                if parsed.base_dir == Path::new(".") {
                    parsed.base_dir = base_dir;
                }
                parsed
            }
            None => Settings::with_base_dir(base_dir),
        };
        settings.resolve_dirs();
        Ok(settings)
    }

    fn resolve_dirs(&mut self) {
        for dir in [&mut self.data_dir, &mut self.model_dir, &mut self.cache_dir] {
            if dir.is_relative() {
                *dir = self.base_dir.join(&*dir);
            }
        }
    }

    /// Creates the data, model and cache directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.model_dir, &self.cache_dir] {
            fs::create_dir_all(dir).map_err(|e| Error::storage(dir, e))?;
        }
        Ok(())
    }
}

/// `f1_model_<year>_<race with spaces as underscores>.json`
pub fn model_filename(year: i32, race: &str) -> String {
    format!("f1_model_{}_{}.json", year, race.replace(' ', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_filename_replaces_spaces() {
        assert_eq!(model_filename(2024, "Abu Dhabi"), "f1_model_2024_Abu_Dhabi.json");
        assert_eq!(model_filename(2024, "China"), "f1_model_2024_China.json");
    }

    #[test]
    fn file_overrides_and_relative_dirs_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("settings.json");
        let base = dir.path().join("root");
        fs::write(
            &cfg,
            format!(
                r#"{{
                    "base_dir": {:?},
                    "model_dir": "trained",
                    "estimators": {{ "random_forest": {{ "n_estimators": 7 }} }}
                }}"#,
                base
            ),
        )
        .unwrap();

        let settings = Settings::load(Some(&cfg)).unwrap();
        assert_eq!(settings.model_dir, base.join("trained"));
        assert_eq!(settings.data_dir, base.join("data"));
        assert_eq!(settings.estimators.random_forest.n_estimators, 7);
        assert_eq!(settings.estimators.random_forest.random_state, 42);
        assert_eq!(settings.estimators.gradient_boosting.n_estimators, 200);
        assert_eq!(settings.split.test_size, 0.2);

        settings.ensure_dirs().unwrap();
        assert!(base.join("trained").is_dir());
        assert!(base.join("f1_cache").is_dir());
    }

    #[test]
    fn malformed_config_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("bad.json");
        fs::write(&cfg, "{ nope").unwrap();
        assert!(matches!(
            Settings::load(Some(&cfg)),
            Err(Error::Serialization(_))
        ));
    }
}
