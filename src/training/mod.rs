//! Training pipeline: vocabulary → seeded 80/20 split → scaler (train rows only) →
//! random forest → holdout diagnostics.

mod artifact;
mod report;

pub use artifact::{TrainedArtifact, TrainingMetadata};
pub use report::{AverageMetrics, ClassMetrics, DiagnosticReport};

use crate::config::TrainingConfig;
use crate::dataset::{HealthRecord, SleepDisorder};
use crate::features::{to_matrix, EncodedRecord, ScalerState, Vocabulary};
use crate::model::RandomForest;
use crate::{Result, SleepyticsError};
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{info, warn};

/// Result of one successful training run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: TrainedArtifact,
    pub report: DiagnosticReport,
}

impl TrainingOutcome {
    pub fn accuracy(&self) -> f64 {
        self.artifact.accuracy()
    }
}

pub struct TrainingPipeline {
    config: TrainingConfig,
}

fn insufficient(msg: impl Into<String>) -> SleepyticsError {
    SleepyticsError::InsufficientData(msg.into())
}

fn distinct_classes(labels: &[usize]) -> usize {
    labels.iter().collect::<BTreeSet<_>>().len()
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn train(&self, dataset: &[HealthRecord]) -> Result<TrainingOutcome> {
        let started = Instant::now();
        let seed = self.config.seed;
        let min_rows = self.config.min_rows.max(2);
        if dataset.len() < min_rows {
            return Err(insufficient(format!(
                "{} rows, need at least {min_rows}",
                dataset.len()
            )));
        }

        let vocabulary = Vocabulary::fit(dataset)?;
        let mut encoded: Vec<EncodedRecord> = Vec::with_capacity(dataset.len());
        let mut labels: Vec<usize> = Vec::with_capacity(dataset.len());
        for record in dataset {
            encoded.push(vocabulary.transform(record)?);
            labels.push(vocabulary.label(record)?.index());
        }
        if distinct_classes(&labels) < 2 {
            return Err(insufficient("dataset contains a single sleep disorder class"));
        }

        let mut order: Vec<usize> = (0..dataset.len()).collect();
        order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
        if let Some(cap) = self.config.max_rows {
            if order.len() > cap {
                warn!(rows = order.len(), cap, "dataset exceeds max_rows; truncating");
                order.truncate(cap);
            }
        }

        let fraction = self.config.test_fraction.clamp(0.0, 1.0);
        let n_test = (order.len() as f64 * fraction).ceil() as usize;
        if n_test == 0 || n_test >= order.len() {
            return Err(insufficient(format!(
                "{} rows cannot form non-empty train and test partitions at test_fraction {fraction}",
                order.len()
            )));
        }
        let (test_idx, train_idx) = order.split_at(n_test);

        let gather = |idx: &[usize]| -> (Vec<EncodedRecord>, Vec<usize>) {
            idx.iter().map(|&i| (encoded[i].clone(), labels[i])).unzip()
        };
        let (train_rows, y_train) = gather(train_idx);
        let (test_rows, y_test) = gather(test_idx);
        if distinct_classes(&y_train) < 2 {
            return Err(insufficient("training partition contains a single class"));
        }

        let x_train = to_matrix(&train_rows)?;
        let x_test = to_matrix(&test_rows)?;
        let scaler = ScalerState::fit(&x_train)?;
        let x_train = scaler.transform_matrix(&x_train)?;
        let x_test = scaler.transform_matrix(&x_test)?;

        info!(
            train = y_train.len(),
            test = y_test.len(),
            trees = self.config.n_trees,
            seed,
            "fitting random forest"
        );
        let model = RandomForest::fit(
            &x_train,
            &y_train,
            SleepDisorder::COUNT,
            &self.config.forest_params(),
            seed,
        )?;

        let mut y_pred = Vec::with_capacity(y_test.len());
        for row in x_test.rows() {
            y_pred.push(model.predict(row)?.0);
        }
        let report = DiagnosticReport::from_predictions(&y_test, &y_pred);
        report.log();

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(accuracy = report.accuracy, duration_ms, "training complete");

        let metadata = TrainingMetadata {
            trained_at: Utc::now(),
            seed,
            n_train: y_train.len(),
            n_test: y_test.len(),
            accuracy: report.accuracy,
            duration_ms,
        };
        Ok(TrainingOutcome {
            artifact: TrainedArtifact::new(vocabulary, scaler, model, metadata),
            report,
        })
    }
}
