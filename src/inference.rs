//! Single-record prediction against a published artifact. Read-only, so any
//! number of callers may share one `Arc<TrainedArtifact>`.

use crate::dataset::{HealthRecord, SleepDisorder};
use crate::training::TrainedArtifact;
use crate::{Result, SleepyticsError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub disorder: SleepDisorder,
    /// Aligned to [`SleepDisorder::ALL`]: Sleep Apnea, Insomnia, No Sleep Disorder
    pub probabilities: [f64; SleepDisorder::COUNT],
}

impl PredictionResult {
    pub fn label(&self) -> &'static str {
        self.disorder.label()
    }

    pub fn probability_of(&self, disorder: SleepDisorder) -> f64 {
        self.probabilities[disorder.index()]
    }

    /// Probability of the predicted class.
    pub fn confidence(&self) -> f64 {
        self.probability_of(self.disorder)
    }
}

/// Encode, scale and classify one record using only the artifact's fitted state.
pub fn predict_one(artifact: &TrainedArtifact, record: &HealthRecord) -> Result<PredictionResult> {
    let encoded = artifact.vocabulary().transform(record)?;
    let scaled = artifact.scaler().transform(encoded.as_slice())?;
    let (class, proba) = artifact.model().predict(scaled.view())?;

    let probabilities: [f64; SleepDisorder::COUNT] =
        proba
            .as_slice()
            .try_into()
            .map_err(|_| SleepyticsError::DimensionMismatch {
                expected: SleepDisorder::COUNT,
                got: proba.len(),
            })?;
    let disorder = SleepDisorder::from_index(class).ok_or(SleepyticsError::DimensionMismatch {
        expected: SleepDisorder::COUNT,
        got: class + 1,
    })?;
    tracing::debug!(record_id = %record.id, disorder = %disorder, "prediction");
    Ok(PredictionResult {
        disorder,
        probabilities,
    })
}
