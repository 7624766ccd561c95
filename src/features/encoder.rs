//! Categorical vocabulary fitted once on training data and reused unchanged at inference.
//!
//! Codes are assigned in sorted order of the distinct observed values, so the
//! same set of values always produces the same codes regardless of row order.
//! The disorder label is not fitted: it uses the fixed [`SleepDisorder`] table.

use super::{EncodedRecord, FEATURE_DIM};
use crate::dataset::{BloodPressure, HealthRecord, SleepDisorder};
use crate::{Result, SleepyticsError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const GENDER: &str = "Gender";
pub const OCCUPATION: &str = "Occupation";
pub const BMI_CATEGORY: &str = "BMI Category";
pub const SLEEP_DISORDER: &str = "Sleep Disorder";

/// Sorted distinct values of one categorical column; a value's code is its index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCodes {
    values: Vec<String>,
}

impl CategoryCodes {
    fn fit<'a>(observed: impl Iterator<Item = &'a str>) -> Self {
        let set: BTreeSet<&str> = observed.collect();
        Self {
            values: set.into_iter().map(String::from).collect(),
        }
    }

    pub fn code(&self, column: &'static str, value: &str) -> Result<u32> {
        self.values
            .binary_search_by(|v| v.as_str().cmp(value))
            .map(|i| i as u32)
            .map_err(|_| SleepyticsError::UnseenCategory {
                column,
                value: value.to_string(),
            })
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub gender: CategoryCodes,
    pub occupation: CategoryCodes,
    pub bmi_category: CategoryCodes,
}

impl Vocabulary {
    pub fn fit(records: &[HealthRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(SleepyticsError::InsufficientData(
                "cannot fit a vocabulary on an empty dataset".into(),
            ));
        }
        Ok(Self {
            gender: CategoryCodes::fit(records.iter().map(|r| r.gender.as_str())),
            occupation: CategoryCodes::fit(records.iter().map(|r| r.occupation.as_str())),
            bmi_category: CategoryCodes::fit(records.iter().map(|r| r.bmi_category.as_str())),
        })
    }

    /// Encode one record; never refits.
    pub fn transform(&self, record: &HealthRecord) -> Result<EncodedRecord> {
        let bp = BloodPressure::parse(&record.blood_pressure)?;
        let values = vec![
            self.gender.code(GENDER, &record.gender)? as f64,
            record.age as f64,
            self.occupation.code(OCCUPATION, &record.occupation)? as f64,
            record.sleep_duration,
            record.sleep_quality as f64,
            record.physical_activity as f64,
            record.stress_level as f64,
            self.bmi_category.code(BMI_CATEGORY, &record.bmi_category)? as f64,
            record.heart_rate as f64,
            record.daily_steps as f64,
            bp.systolic as f64,
            bp.diastolic as f64,
        ];
        debug_assert_eq!(values.len(), FEATURE_DIM);
        Ok(EncodedRecord {
            record_id: record.id.clone(),
            values,
        })
    }

    /// Class of a labelled record, via the fixed label table.
    pub fn label(&self, record: &HealthRecord) -> Result<SleepDisorder> {
        let raw = record.sleep_disorder.as_deref().ok_or_else(|| {
            SleepyticsError::InsufficientData(format!("record {} has no sleep disorder label", record.id))
        })?;
        SleepDisorder::from_label(raw).ok_or_else(|| SleepyticsError::UnseenCategory {
            column: SLEEP_DISORDER,
            value: raw.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::generate_sample_data;

    fn record(gender: &str, occupation: &str, bmi: &str, bp: &str) -> HealthRecord {
        HealthRecord {
            id: "t".into(),
            gender: gender.into(),
            age: 40,
            occupation: occupation.into(),
            sleep_duration: 7.0,
            sleep_quality: 7,
            physical_activity: 50,
            stress_level: 5,
            bmi_category: bmi.into(),
            blood_pressure: bp.into(),
            heart_rate: 70,
            daily_steps: 8000,
            sleep_disorder: None,
        }
    }

    #[test]
    fn codes_are_sorted_and_independent_of_row_order() {
        let rows = vec![
            record("Male", "Teacher", "Obese", "120/80"),
            record("Female", "Doctor", "Normal", "120/80"),
            record("Male", "Nurse", "Overweight", "120/80"),
        ];
        let mut reversed = rows.clone();
        reversed.reverse();
        let a = Vocabulary::fit(&rows).unwrap();
        let b = Vocabulary::fit(&reversed).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.gender.code(GENDER, "Female").unwrap(), 0);
        assert_eq!(a.gender.code(GENDER, "Male").unwrap(), 1);
        assert_eq!(a.occupation.values(), ["Doctor", "Nurse", "Teacher"]);
    }

    #[test]
    fn transform_is_stable_and_fixed_width() {
        let data = generate_sample_data(100, 3);
        let vocab = Vocabulary::fit(&data).unwrap();
        let r = record("Female", "Lawyer", "Obese", "120/80");
        let first = vocab.transform(&r).unwrap();
        for _ in 0..5 {
            assert_eq!(vocab.transform(&r).unwrap(), first);
        }
        assert_eq!(first.dim(), FEATURE_DIM);
        assert_eq!(first.values[10], 120.0);
        assert_eq!(first.values[11], 80.0);
    }

    #[test]
    fn unseen_category_is_an_error() {
        let vocab = Vocabulary::fit(&[record("Male", "Doctor", "Normal", "120/80")]).unwrap();
        let err = vocab
            .transform(&record("Male", "Astronaut", "Normal", "120/80"))
            .unwrap_err();
        assert!(matches!(
            err,
            SleepyticsError::UnseenCategory { column: OCCUPATION, ref value } if value == "Astronaut"
        ));
    }

    #[test]
    fn malformed_blood_pressure_is_an_error() {
        let vocab = Vocabulary::fit(&[record("Male", "Doctor", "Normal", "120/80")]).unwrap();
        let err = vocab.transform(&record("Male", "Doctor", "Normal", "120-80")).unwrap_err();
        assert!(matches!(err, SleepyticsError::InvalidBloodPressure(_)));
    }

    #[test]
    fn labels_use_fixed_table() {
        let vocab = Vocabulary::fit(&[record("Male", "Doctor", "Normal", "120/80")]).unwrap();
        let mut r = record("Male", "Doctor", "Normal", "120/80");
        r.sleep_disorder = Some("Sleep Apnea".into());
        assert_eq!(vocab.label(&r).unwrap(), SleepDisorder::SleepApnea);
        r.sleep_disorder = Some("Narcolepsy".into());
        assert!(matches!(vocab.label(&r), Err(SleepyticsError::UnseenCategory { .. })));
        r.sleep_disorder = None;
        assert!(matches!(vocab.label(&r), Err(SleepyticsError::InsufficientData(_))));
    }
}
