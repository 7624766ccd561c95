//! Holdout diagnostics: confusion matrix and per-class precision / recall / F1.

use crate::dataset::SleepDisorder;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

const K: usize = SleepDisorder::COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class: SleepDisorder,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub accuracy: f64,
    /// `confusion[actual][predicted]`, indexed by class
    pub confusion: [[usize; K]; K],
    pub per_class: Vec<ClassMetrics>,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl DiagnosticReport {
    /// Build from aligned actual / predicted class indices. Undefined ratios are 0.
    pub fn from_predictions(actual: &[usize], predicted: &[usize]) -> Self {
        let mut confusion = [[0usize; K]; K];
        for (&a, &p) in actual.iter().zip(predicted) {
            confusion[a][p] += 1;
        }
        let support = actual.len().min(predicted.len());
        let correct: usize = (0..K).map(|c| confusion[c][c]).sum();

        let per_class: Vec<ClassMetrics> = SleepDisorder::ALL
            .iter()
            .map(|&class| {
                let c = class.index();
                let tp = confusion[c][c];
                let predicted_c: usize = (0..K).map(|a| confusion[a][c]).sum();
                let actual_c: usize = confusion[c].iter().sum();
                let precision = ratio(tp, predicted_c);
                let recall = ratio(tp, actual_c);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    class,
                    precision,
                    recall,
                    f1,
                    support: actual_c,
                }
            })
            .collect();

        let macro_avg = AverageMetrics {
            precision: per_class.iter().map(|m| m.precision).sum::<f64>() / K as f64,
            recall: per_class.iter().map(|m| m.recall).sum::<f64>() / K as f64,
            f1: per_class.iter().map(|m| m.f1).sum::<f64>() / K as f64,
        };
        let weight = |f: fn(&ClassMetrics) -> f64| {
            if support == 0 {
                0.0
            } else {
                per_class.iter().map(|m| f(m) * m.support as f64).sum::<f64>() / support as f64
            }
        };
        let weighted_avg = AverageMetrics {
            precision: weight(|m| m.precision),
            recall: weight(|m| m.recall),
            f1: weight(|m| m.f1),
        };

        Self {
            accuracy: ratio(correct, support),
            confusion,
            per_class,
            macro_avg,
            weighted_avg,
            support,
        }
    }

    pub fn metrics_for(&self, class: SleepDisorder) -> &ClassMetrics {
        &self.per_class[class.index()]
    }

    /// Emit the report as structured log events.
    pub fn log(&self) {
        info!(
            accuracy = self.accuracy,
            support = self.support,
            confusion = ?self.confusion,
            "holdout evaluation"
        );
        for m in &self.per_class {
            info!(
                class = m.class.label(),
                precision = m.precision,
                recall = m.recall,
                f1 = m.f1,
                support = m.support,
                "class metrics"
            );
        }
    }
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Confusion Matrix (rows = actual, cols = predicted):")?;
        for row in &self.confusion {
            let cells: Vec<String> = row.iter().map(|c| format!("{c:>5}")).collect();
            writeln!(f, "[{}]", cells.join(""))?;
        }
        writeln!(f)?;
        writeln!(f, "{:>20} {:>10} {:>10} {:>10} {:>10}", "", "precision", "recall", "f1-score", "support")?;
        for m in &self.per_class {
            writeln!(
                f,
                "{:>20} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                m.class.label(),
                m.precision,
                m.recall,
                m.f1,
                m.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{:>20} {:>10} {:>10} {:>10.2} {:>10}", "accuracy", "", "", self.accuracy, self.support)?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>20} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, avg.precision, avg.recall, avg.f1, self.support
            )?;
        }
        Ok(())
    }
}
