//! Sleepytics — sleep-health tracking backend with sleep-disorder classification.
//!
//! Modular structure:
//! - [`dataset`] — Health records, dataset loading, synthetic sample data
//! - [`features`] — Categorical vocabulary encoding and standardization
//! - [`model`] — Random-forest classifier over the standardized feature space
//! - [`training`] — Train/test split, model fitting, holdout diagnostics
//! - [`inference`] — Single-record prediction against a trained artifact
//! - [`insights`] — Sleep diary summaries and habit recommendations
//! - [`storage`] — Encrypted local store for users and prediction logs
//! - [`context`] — Application context owning stores and the live artifact
//! - [`logging`] — Structured JSON logging

pub mod config;
pub mod context;
pub mod dataset;
pub mod features;
pub mod inference;
pub mod insights;
pub mod logging;
pub mod model;
pub mod storage;
pub mod training;

pub use config::AppConfig;
pub use context::AppContext;
pub use dataset::{HealthRecord, SleepDisorder};
pub use features::{EncodedRecord, ScalerState, Vocabulary};
pub use inference::{predict_one, PredictionResult};
pub use insights::{SleepAdvice, SleepInsights};
pub use logging::StructuredLogger;
pub use model::RandomForest;
pub use storage::{SecureStore, SleepLogEntry};
pub use training::{DiagnosticReport, TrainedArtifact, TrainingOutcome, TrainingPipeline};

/// Result type for Sleepytics operations
pub type Result<T> = std::result::Result<T, SleepyticsError>;

/// Main error type for Sleepytics
#[derive(Debug, thiserror::Error)]
pub enum SleepyticsError {
    #[error("invalid blood pressure {0:?}: expected \"systolic/diastolic\"")]
    InvalidBloodPressure(String),

    #[error("unseen category {value:?} in column {column}")]
    UnseenCategory { column: &'static str, value: String },

    #[error("insufficient training data: {0}")]
    InsufficientData(String),

    #[error("feature dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("no trained artifact has been published")]
    NoArtifact,

    #[error("invalid sleep log entry: {0}")]
    InvalidEntry(String),

    #[error("training task failed: {0}")]
    Training(String),

    #[error("storage operation failed: {0}")]
    Store(#[from] storage::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("dataset error: {0}")]
    Csv(#[from] csv::Error),
}
