//! Application context: owns the durable store and the live artifact.
//!
//! The artifact is published by swapping an `Arc`; readers take a snapshot and
//! never hold the lock while predicting, so retraining cannot disturb a
//! prediction already in flight.

use crate::config::AppConfig;
use crate::dataset::{load_or_generate, HealthRecord};
use crate::inference::{predict_one, PredictionResult};
use crate::insights::SleepInsights;
use crate::storage::{PredictionLogEntry, SecureStore, SleepLogEntry, StoreError, UserAccount};
use crate::training::{DiagnosticReport, TrainedArtifact, TrainingPipeline};
use crate::{Result, SleepyticsError};
use chrono::NaiveDate;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Outcome of a retrain that was published.
#[derive(Debug, Clone)]
pub struct Retrained {
    pub artifact: Arc<TrainedArtifact>,
    pub report: DiagnosticReport,
}

pub struct AppContext {
    config: AppConfig,
    store: SecureStore,
    pipeline: TrainingPipeline,
    artifact: RwLock<Option<Arc<TrainedArtifact>>>,
}

impl AppContext {
    pub fn new(config: AppConfig, store: SecureStore) -> Self {
        let pipeline = TrainingPipeline::new(config.training.clone());
        Self {
            config,
            store,
            pipeline,
            artifact: RwLock::new(None),
        }
    }

    /// Open the on-disk store under `data_dir` and pick up a persisted artifact if one exists.
    pub fn open(config: AppConfig, secret: &[u8]) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = SecureStore::open(&config.store_path(), secret)?;
        let ctx = Self::new(config, store);
        if let Some(path) = ctx.config.resolved_artifact_path() {
            if path.exists() {
                match TrainedArtifact::load(&path) {
                    Ok(artifact) => {
                        ctx.publish(artifact);
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "ignoring unusable artifact"),
                }
            }
        }
        Ok(ctx)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &SecureStore {
        &self.store
    }

    /// Snapshot of the live artifact.
    pub fn current_artifact(&self) -> Option<Arc<TrainedArtifact>> {
        self.artifact
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn publish(&self, artifact: TrainedArtifact) -> Arc<TrainedArtifact> {
        let artifact = Arc::new(artifact);
        *self
            .artifact
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::clone(&artifact));
        info!(
            accuracy = artifact.accuracy(),
            trained_at = %artifact.metadata().trained_at,
            "artifact published"
        );
        artifact
    }

    pub fn load_dataset(&self) -> Result<Vec<HealthRecord>> {
        let training = &self.config.training;
        load_or_generate(&self.config.dataset_paths, training.sample_rows, training.seed)
    }

    /// Train on `dataset`, persist when configured, then publish. On error the
    /// live artifact is left untouched.
    pub fn retrain(&self, dataset: &[HealthRecord]) -> Result<Retrained> {
        let outcome = self.pipeline.train(dataset)?;
        if let Some(path) = self.config.resolved_artifact_path() {
            if let Err(e) = outcome.artifact.save(&path) {
                warn!(path = %path.display(), error = %e, "failed to persist artifact");
            }
        }
        let artifact = self.publish(outcome.artifact);
        Ok(Retrained {
            artifact,
            report: outcome.report,
        })
    }

    /// Run [`AppContext::retrain`] on the blocking pool so serving tasks keep running.
    pub async fn retrain_async(self: Arc<Self>, dataset: Vec<HealthRecord>) -> Result<Retrained> {
        tokio::task::spawn_blocking(move || self.retrain(&dataset))
            .await
            .map_err(|e| SleepyticsError::Training(e.to_string()))?
    }

    /// Use the live artifact, training one first if none has been published.
    pub fn ensure_artifact(&self) -> Result<Arc<TrainedArtifact>> {
        if let Some(artifact) = self.current_artifact() {
            return Ok(artifact);
        }
        let dataset = self.load_dataset()?;
        Ok(self.retrain(&dataset)?.artifact)
    }

    /// Predict for `user` and append the result to the prediction log.
    pub fn predict(&self, user: &UserAccount, record: HealthRecord) -> Result<PredictionResult> {
        let artifact = self.current_artifact().ok_or(SleepyticsError::NoArtifact)?;
        let result = predict_one(&artifact, &record)?;
        let entry = PredictionLogEntry::new(user.username.clone(), record, &result);
        self.store.append_prediction(&entry)?;
        info!(
            user = %user.username,
            record_id = %entry.input.id,
            prediction = %result.disorder,
            confidence = result.confidence(),
            "prediction logged"
        );
        Ok(result)
    }

    pub fn login(&self, username: &str, password: &str) -> Result<Option<UserAccount>> {
        Ok(self.store.authenticate(username, password)?)
    }

    /// Self-registration; always creates a non-admin account.
    pub fn sign_up(&self, username: &str, password: &str) -> Result<UserAccount> {
        Ok(self.store.create_user(username, password, false)?)
    }

    pub fn create_account(
        &self,
        actor: &UserAccount,
        username: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<UserAccount> {
        require_admin(actor)?;
        Ok(self.store.create_user(username, password, is_admin)?)
    }

    pub fn list_users(&self, actor: &UserAccount) -> Result<Vec<UserAccount>> {
        require_admin(actor)?;
        Ok(self.store.list_users()?)
    }

    /// Validate and append a diary entry for `user`.
    pub fn log_sleep(&self, user: &UserAccount, entry: SleepLogEntry) -> Result<SleepLogEntry> {
        entry.validate()?;
        self.store.append_sleep_entry(&user.username, &entry)?;
        info!(user = %user.username, date = %entry.date, quality = entry.sleep_quality, "sleep logged");
        Ok(entry)
    }

    pub fn sleep_log(&self, user: &UserAccount) -> Result<Vec<SleepLogEntry>> {
        Ok(self.store.sleep_entries(&user.username)?)
    }

    /// Summary of `user`'s own diary; `None` until something has been logged.
    pub fn sleep_insights(&self, user: &UserAccount) -> Result<Option<SleepInsights>> {
        Ok(SleepInsights::from_entries(&self.sleep_log(user)?))
    }

    pub fn prediction_logs(&self, actor: &UserAccount, day: Option<NaiveDate>) -> Result<Vec<PredictionLogEntry>> {
        require_admin(actor)?;
        Ok(match day {
            Some(day) => self.store.predictions_on(day)?,
            None => self.store.all_predictions()?,
        })
    }

    pub fn prediction_distribution(
        &self,
        actor: &UserAccount,
        day: Option<NaiveDate>,
    ) -> Result<Vec<(crate::SleepDisorder, usize)>> {
        require_admin(actor)?;
        Ok(self.store.prediction_distribution(day)?)
    }
}

fn require_admin(actor: &UserAccount) -> Result<()> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(StoreError::Unauthorized(actor.username.clone()).into())
    }
}
