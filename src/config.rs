//! Application configuration, loaded from a JSON file with defaults for anything missing.

use crate::model::ForestParams;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Data directory (encrypted store, cached artifact)
    pub data_dir: PathBuf,
    /// CSV dataset files, concatenated in order
    pub dataset_paths: Vec<PathBuf>,
    /// Where the trained artifact is persisted; relative paths resolve under `data_dir`
    pub artifact_path: Option<PathBuf>,
    /// Model fitting parameters
    pub training: TrainingConfig,
    /// Long-running service behaviour
    pub service: ServiceConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Seed for the split, bootstrap draws and feature sampling
    pub seed: u64,
    /// Holdout share (0.0–1.0)
    pub test_fraction: f64,
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub max_features: Option<usize>,
    /// Smallest dataset accepted for training
    pub min_rows: usize,
    /// Cap on rows used per training run (safety valve for large datasets)
    pub max_rows: Option<usize>,
    /// Rows generated when no dataset file is available
    pub sample_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Retrain period in `serve` mode; 0 disables periodic retraining
    pub retrain_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".sleepytics"),
            dataset_paths: vec![PathBuf::from("data/data.csv"), PathBuf::from("data/data2.csv")],
            artifact_path: Some(PathBuf::from("artifact.json")),
            training: TrainingConfig::default(),
            service: ServiceConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let forest = ForestParams::default();
        Self {
            seed: 42,
            test_fraction: 0.2,
            n_trees: forest.n_trees,
            max_depth: forest.max_depth,
            min_samples_split: forest.min_samples_split,
            max_features: forest.max_features,
            min_rows: 10,
            max_rows: None,
            sample_rows: 500,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            retrain_interval_secs: 3600,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl TrainingConfig {
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_trees: self.n_trees,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            max_features: self.max_features,
        }
    }
}

impl AppConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<AppConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store.db")
    }

    pub fn resolved_artifact_path(&self) -> Option<PathBuf> {
        self.artifact_path.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                self.data_dir.join(p)
            }
        })
    }
}
