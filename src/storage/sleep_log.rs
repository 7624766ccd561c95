//! Per-user sleep diary. Entries are sealed the same way as prediction inputs.

use super::{SecureStore, StoreError};
use crate::{Result, SleepyticsError};
use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlcoholIntake {
    #[default]
    None,
    Light,
    Moderate,
    Heavy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaffeineIntake {
    #[default]
    None,
    Low,
    Moderate,
    High,
}

/// One night in the diary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepLogEntry {
    pub date: NaiveDate,
    pub bedtime: NaiveTime,
    pub wake_time: NaiveTime,
    /// Hours, 0–12
    pub sleep_duration: f64,
    /// 1–10
    pub sleep_quality: u32,
    /// 1–10
    pub stress_level: u32,
    /// 1–10
    pub mood: u32,
    #[serde(default)]
    pub dream_recall: bool,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub alcohol_intake: AlcoholIntake,
    #[serde(default)]
    pub caffeine_intake: CaffeineIntake,
    /// Minutes of screen time before bed, 0–240
    #[serde(default)]
    pub screen_time_minutes: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

impl SleepLogEntry {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SleepyticsError::InvalidEntry(msg));
        if !(0.0..=12.0).contains(&self.sleep_duration) {
            return invalid(format!("sleep duration {} is outside 0–12 hours", self.sleep_duration));
        }
        for (name, value) in [
            ("sleep quality", self.sleep_quality),
            ("stress level", self.stress_level),
            ("mood", self.mood),
        ] {
            if !(1..=10).contains(&value) {
                return invalid(format!("{name} {value} is outside 1–10"));
            }
        }
        if self.screen_time_minutes > 240 {
            return invalid(format!("screen time {} exceeds 240 minutes", self.screen_time_minutes));
        }
        Ok(())
    }
}

impl SecureStore {
    /// Append an entry to `user`'s diary; returns the row id.
    pub fn append_sleep_entry(&self, user: &str, entry: &SleepLogEntry) -> std::result::Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let entry_enc = self.seal(&serde_json::to_string(entry)?)?;
        self.conn()?.execute(
            "INSERT INTO sleep_log (id, ts, day, username, entry_enc) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                Utc::now().timestamp_millis(),
                entry.date.format("%Y-%m-%d").to_string(),
                user,
                entry_enc,
            ],
        )?;
        Ok(id)
    }

    /// `user`'s entries by diary date, then insertion order.
    pub fn sleep_entries(&self, user: &str) -> std::result::Result<Vec<SleepLogEntry>, StoreError> {
        let sealed: Vec<String> = {
            let conn = self.conn()?;
            let mut stmt =
                conn.prepare("SELECT entry_enc FROM sleep_log WHERE username = ?1 ORDER BY day, rowid")?;
            let mapped = stmt.query_map(params![user], |r| r.get(0))?;
            let sealed = mapped.collect::<std::result::Result<Vec<String>, rusqlite::Error>>()?;
            sealed
        };
        sealed
            .iter()
            .map(|s| -> std::result::Result<SleepLogEntry, StoreError> {
                Ok(serde_json::from_str(&self.open_sealed(s)?)?)
            })
            .collect()
    }
}
