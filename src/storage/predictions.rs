//! Append-only prediction log. Input snapshots are stored encrypted.

use super::{SecureStore, StoreError};
use crate::dataset::{HealthRecord, SleepDisorder};
use crate::inference::PredictionResult;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub input: HealthRecord,
    pub prediction: SleepDisorder,
    pub probabilities: [f64; SleepDisorder::COUNT],
}

impl PredictionLogEntry {
    pub fn new(user: impl Into<String>, input: HealthRecord, result: &PredictionResult) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            user: user.into(),
            input,
            prediction: result.disorder,
            probabilities: result.probabilities,
        }
    }

    /// Highest class probability, as shown in the admin log summary.
    pub fn highest_probability(&self) -> f64 {
        self.probabilities.iter().copied().fold(0.0, f64::max)
    }
}

type Row = (String, i64, String, String, String, String);

impl SecureStore {
    pub fn append_prediction(&self, entry: &PredictionLogEntry) -> Result<(), StoreError> {
        let input_enc = self.seal(&serde_json::to_string(&entry.input)?)?;
        let probabilities = serde_json::to_string(&entry.probabilities)?;
        self.conn()?.execute(
            "INSERT INTO predictions (id, ts, day, username, input_enc, prediction, probabilities) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.id,
                entry.timestamp.timestamp_millis(),
                entry.timestamp.date_naive().format("%Y-%m-%d").to_string(),
                entry.user,
                input_enc,
                entry.prediction.label(),
                probabilities,
            ],
        )?;
        Ok(())
    }

    /// Entries logged on `day` (UTC), oldest first.
    pub fn predictions_on(&self, day: NaiveDate) -> Result<Vec<PredictionLogEntry>, StoreError> {
        self.query_predictions(Some(day))
    }

    pub fn all_predictions(&self) -> Result<Vec<PredictionLogEntry>, StoreError> {
        self.query_predictions(None)
    }

    /// Count per predicted class in canonical class order, optionally for one day.
    pub fn prediction_distribution(&self, day: Option<NaiveDate>) -> Result<Vec<(SleepDisorder, usize)>, StoreError> {
        let mut counts = [0usize; SleepDisorder::COUNT];
        for entry in self.query_predictions(day)? {
            counts[entry.prediction.index()] += 1;
        }
        Ok(SleepDisorder::ALL.iter().map(|&d| (d, counts[d.index()])).collect())
    }

    /// Retention: delete entries older than `ts` (epoch millis).
    pub fn prune_before(&self, ts: i64) -> Result<u64, StoreError> {
        let n = self
            .conn()?
            .execute("DELETE FROM predictions WHERE ts < ?1", params![ts])?;
        Ok(n as u64)
    }

    fn query_predictions(&self, day: Option<NaiveDate>) -> Result<Vec<PredictionLogEntry>, StoreError> {
        let rows: Vec<Row> = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(
                "SELECT id, ts, username, input_enc, prediction, probabilities FROM predictions \
                 WHERE (?1 IS NULL OR day = ?1) ORDER BY ts, id",
            )?;
            let day = day.map(|d| d.format("%Y-%m-%d").to_string());
            let mapped = stmt.query_map(params![day], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?))
            })?;
            let rows = mapped.collect::<Result<Vec<Row>, rusqlite::Error>>()?;
            rows
        };

        rows.into_iter()
            .map(|(id, ts, user, input_enc, prediction, probabilities)| -> Result<PredictionLogEntry, StoreError> {
                let input: HealthRecord = serde_json::from_str(&self.open_sealed(&input_enc)?)?;
                let prediction = SleepDisorder::from_label(&prediction)
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown prediction label {prediction:?}")))?;
                let timestamp = Utc
                    .timestamp_millis_opt(ts)
                    .single()
                    .ok_or_else(|| StoreError::Corrupt(format!("invalid timestamp {ts}")))?;
                Ok(PredictionLogEntry {
                    id,
                    timestamp,
                    user,
                    input,
                    prediction,
                    probabilities: serde_json::from_str(&probabilities)?,
                })
            })
            .collect()
    }
}
