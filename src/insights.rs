//! Sleep diary summaries: averages, a correlation table and habit recommendations.

use crate::storage::SleepLogEntry;
use chrono::Timelike;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Columns of [`SleepInsights::correlations`], in order.
pub const CORRELATION_COLUMNS: [&str; 4] = ["Sleep Duration", "Quality of Sleep", "Stress Level", "Mood"];

const N: usize = CORRELATION_COLUMNS.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SleepAdvice {
    /// More than 4 poor nights (quality below 5) in a log longer than a week
    ConsultSpecialist,
    /// Stress and quality strongly anti-correlated
    ManageStress,
    /// Bedtime hour varies by more than 2
    AdjustSleepWakeCycle,
}

impl SleepAdvice {
    pub fn message(self) -> &'static str {
        match self {
            SleepAdvice::ConsultSpecialist => "Consider consulting a sleep specialist",
            SleepAdvice::ManageStress => "Implement stress management techniques",
            SleepAdvice::AdjustSleepWakeCycle => "Optimize your sleep-wake cycle",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepInsights {
    pub entries: usize,
    pub avg_sleep_duration: f64,
    pub avg_sleep_quality: f64,
    pub avg_stress_level: f64,
    /// Pearson coefficients over [`CORRELATION_COLUMNS`]; `None` where undefined
    pub correlations: [[Option<f64>; N]; N],
    pub recommendations: Vec<SleepAdvice>,
}

impl SleepInsights {
    /// `None` for an empty diary.
    pub fn from_entries(entries: &[SleepLogEntry]) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        let table = columns(entries);
        let avg = |c: usize| table.column(c).mean().unwrap_or(0.0);

        let mut correlations = [[None; N]; N];
        for (i, row) in correlations.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = pearson(table.column(i), table.column(j));
            }
        }

        Some(Self {
            entries: entries.len(),
            avg_sleep_duration: avg(0),
            avg_sleep_quality: avg(1),
            avg_stress_level: avg(2),
            correlations,
            recommendations: recommend(entries),
        })
    }
}

fn columns(entries: &[SleepLogEntry]) -> Array2<f64> {
    let flat: Vec<f64> = entries
        .iter()
        .flat_map(|e| {
            [
                e.sleep_duration,
                e.sleep_quality as f64,
                e.stress_level as f64,
                e.mood as f64,
            ]
        })
        .collect();
    Array2::from_shape_vec((entries.len(), N), flat).unwrap_or_else(|_| Array2::zeros((0, N)))
}

/// Pearson correlation; `None` for fewer than two points or a constant series.
pub fn pearson(x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let dx = &x - x.mean()?;
    let dy = &y - y.mean()?;
    let denom = (dx.dot(&dx) * dy.dot(&dy)).sqrt();
    if !(denom > f64::EPSILON) {
        return None;
    }
    Some((dx.dot(&dy) / denom).clamp(-1.0, 1.0))
}

pub fn is_chronic_poor_sleeper(entries: &[SleepLogEntry]) -> bool {
    entries.len() > 7 && entries.iter().filter(|e| e.sleep_quality < 5).count() > 4
}

pub fn has_high_stress_correlation(entries: &[SleepLogEntry]) -> bool {
    if entries.len() <= 5 {
        return false;
    }
    let table = columns(entries);
    pearson(table.column(2), table.column(1)).is_some_and(|r| r < -0.5)
}

pub fn needs_circadian_adjustment(entries: &[SleepLogEntry]) -> bool {
    if entries.len() <= 3 {
        return false;
    }
    let hours = entries.iter().map(|e| e.bedtime.hour());
    match (hours.clone().min(), hours.max()) {
        (Some(lo), Some(hi)) => hi - lo > 2,
        _ => false,
    }
}

pub fn recommend(entries: &[SleepLogEntry]) -> Vec<SleepAdvice> {
    let mut advice = Vec::new();
    if is_chronic_poor_sleeper(entries) {
        advice.push(SleepAdvice::ConsultSpecialist);
    }
    if has_high_stress_correlation(entries) {
        advice.push(SleepAdvice::ManageStress);
    }
    if needs_circadian_adjustment(entries) {
        advice.push(SleepAdvice::AdjustSleepWakeCycle);
    }
    advice
}
