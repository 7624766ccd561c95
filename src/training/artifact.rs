//! Immutable bundle of fitted vocabulary, scaler and forest; optionally persisted as JSON.

use crate::features::{ScalerState, Vocabulary, FEATURE_DIM};
use crate::model::RandomForest;
use crate::{Result, SleepyticsError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub trained_at: DateTime<Utc>,
    pub seed: u64,
    pub n_train: usize,
    pub n_test: usize,
    /// Holdout accuracy (0.0–1.0)
    pub accuracy: f64,
    pub duration_ms: u64,
}

/// No method takes `&mut self`: once built, an artifact never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedArtifact {
    vocabulary: Vocabulary,
    scaler: ScalerState,
    model: RandomForest,
    metadata: TrainingMetadata,
}

impl TrainedArtifact {
    pub(crate) fn new(
        vocabulary: Vocabulary,
        scaler: ScalerState,
        model: RandomForest,
        metadata: TrainingMetadata,
    ) -> Self {
        Self {
            vocabulary,
            scaler,
            model,
            metadata,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn scaler(&self) -> &ScalerState {
        &self.scaler
    }

    pub fn model(&self) -> &RandomForest {
        &self.model
    }

    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }

    pub fn accuracy(&self) -> f64 {
        self.metadata.accuracy
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::io::BufWriter::new(std::fs::File::create(path)?);
        serde_json::to_writer(file, self)?;
        info!(path = %path.display(), "artifact saved");
        Ok(())
    }

    /// Read a persisted artifact, rejecting one whose widths disagree with this build.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::io::BufReader::new(std::fs::File::open(path)?);
        let artifact: Self = serde_json::from_reader(file)?;
        for got in [artifact.scaler.dim(), artifact.model.n_features()] {
            if got != FEATURE_DIM {
                return Err(SleepyticsError::DimensionMismatch {
                    expected: FEATURE_DIM,
                    got,
                });
            }
        }
        info!(
            path = %path.display(),
            trained_at = %artifact.metadata.trained_at,
            accuracy = artifact.metadata.accuracy,
            "artifact loaded"
        );
        Ok(artifact)
    }
}
