//! Health records and the labelled datasets they come from.
//! Column names follow the source sleep-health dataset so CSV files load as-is.

mod loader;
mod sample;

pub use loader::{load_dataset, load_or_generate};
pub use sample::{generate_sample_data, synthetic_label, OCCUPATIONS};

use crate::{Result, SleepyticsError};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One subject's observation, optionally labelled with a sleep disorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    #[serde(rename = "Person ID")]
    pub id: String,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Age")]
    pub age: u32,
    #[serde(rename = "Occupation")]
    pub occupation: String,
    /// Hours per night
    #[serde(rename = "Sleep Duration")]
    pub sleep_duration: f64,
    /// 1–10
    #[serde(rename = "Quality of Sleep")]
    pub sleep_quality: u32,
    /// 0–100
    #[serde(rename = "Physical Activity Level")]
    pub physical_activity: u32,
    /// 1–10
    #[serde(rename = "Stress Level")]
    pub stress_level: u32,
    #[serde(rename = "BMI Category")]
    pub bmi_category: String,
    /// "systolic/diastolic", e.g. "120/80"
    #[serde(rename = "Blood Pressure")]
    pub blood_pressure: String,
    #[serde(rename = "Heart Rate")]
    pub heart_rate: u32,
    #[serde(rename = "Daily Steps")]
    pub daily_steps: u32,
    /// Training label; absent on inference input. An empty cell is kept as `""`
    /// (no disorder), only a missing column is `None`.
    #[serde(
        rename = "Sleep Disorder",
        default,
        deserialize_with = "label_cell",
        skip_serializing_if = "Option::is_none"
    )]
    pub sleep_disorder: Option<String>,
}

fn label_cell<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Some(Option::<String>::deserialize(deserializer)?.unwrap_or_default()))
}

/// Fixed three-class label set. The discriminant is the class index used by
/// the classifier and the position in every probability vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SleepDisorder {
    #[serde(rename = "Sleep Apnea")]
    SleepApnea = 0,
    #[serde(rename = "Insomnia")]
    Insomnia = 1,
    #[serde(rename = "No Sleep Disorder", alias = "None")]
    None = 2,
}

impl SleepDisorder {
    pub const COUNT: usize = 3;
    pub const ALL: [SleepDisorder; Self::COUNT] =
        [SleepDisorder::SleepApnea, SleepDisorder::Insomnia, SleepDisorder::None];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            SleepDisorder::SleepApnea => "Sleep Apnea",
            SleepDisorder::Insomnia => "Insomnia",
            SleepDisorder::None => "No Sleep Disorder",
        }
    }

    /// Parse dataset label text. `"None"` and the empty string both mean no disorder.
    pub fn from_label(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Sleep Apnea" => Some(SleepDisorder::SleepApnea),
            "Insomnia" => Some(SleepDisorder::Insomnia),
            "None" | "No Sleep Disorder" | "" => Some(SleepDisorder::None),
            _ => None,
        }
    }

    /// Advice shown alongside a prediction.
    pub fn recommended_actions(self) -> &'static [&'static str] {
        match self {
            SleepDisorder::SleepApnea => &[
                "Consult a sleep specialist",
                "Maintain healthy weight",
                "Sleep on your side",
                "Consider CPAP",
            ],
            SleepDisorder::Insomnia => &[
                "Regular sleep schedule",
                "Relaxing routine",
                "Avoid caffeine/alcohol/screens",
                "Consider CBT-I",
            ],
            SleepDisorder::None => &[
                "Continue current practices",
                "Regular exercise",
                "Monitor sleep patterns",
            ],
        }
    }
}

impl fmt::Display for SleepDisorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parsed "systolic/diastolic" reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodPressure {
    pub systolic: i32,
    pub diastolic: i32,
}

impl BloodPressure {
    /// Split on `/` into exactly two integers; anything else is `InvalidBloodPressure`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || SleepyticsError::InvalidBloodPressure(raw.to_string());
        let mut parts = raw.split('/');
        let (Some(s), Some(d), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        let systolic = s.trim().parse::<i32>().map_err(|_| invalid())?;
        let diastolic = d.trim().parse::<i32>().map_err(|_| invalid())?;
        Ok(Self {
            systolic,
            diastolic,
        })
    }
}
