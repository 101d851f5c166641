//! Held-out evaluation of a fitted classifier.

use hs_core::{Error, Result, Sentiment};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: Sentiment,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub per_class: Vec<ClassMetrics>,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    pub n_samples: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

/// Computes accuracy and per-class precision/recall/F1 for every label that
/// occurs in either `truth` or `predicted`.
pub fn evaluate(truth: &[Sentiment], predicted: &[Sentiment]) -> Result<EvaluationReport> {
    if truth.len() != predicted.len() {
        return Err(Error::Training(format!(
            "cannot evaluate {} predictions against {} labels",
            predicted.len(),
            truth.len()
        )));
    }

    let n = truth.len();
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();

    let per_class: Vec<ClassMetrics> = Sentiment::ALL
        .iter()
        .copied()
        .filter(|label| truth.contains(label) || predicted.contains(label))
        .map(|label| {
            let mut tp = 0;
            let mut fp = 0;
            let mut fn_count = 0;
            for (t, p) in truth.iter().zip(predicted) {
                match (*t == label, *p == label) {
                    (true, true) => tp += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_count += 1,
                    (false, false) => {}
                }
            }
            let precision = ratio(tp, tp + fp);
            let recall = ratio(tp, tp + fn_count);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics {
                label,
                precision,
                recall,
                f1,
                support: tp + fn_count,
            }
        })
        .collect();

    let k = per_class.len().max(1) as f64;
    let macro_avg = AverageMetrics {
        precision: per_class.iter().map(|m| m.precision).sum::<f64>() / k,
        recall: per_class.iter().map(|m| m.recall).sum::<f64>() / k,
        f1: per_class.iter().map(|m| m.f1).sum::<f64>() / k,
    };

    let weight = |f: fn(&ClassMetrics) -> f64| -> f64 {
        if n == 0 {
            return 0.0;
        }
        per_class.iter().map(|m| f(m) * m.support as f64).sum::<f64>() / n as f64
    };
    let weighted_avg = AverageMetrics {
        precision: weight(|m| m.precision),
        recall: weight(|m| m.recall),
        f1: weight(|m| m.f1),
    };

    Ok(EvaluationReport {
        accuracy: ratio(correct, n),
        per_class,
        macro_avg,
        weighted_avg,
        n_samples: n,
    })
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Model accuracy: {:.2}%", self.accuracy * 100.0)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for m in &self.per_class {
            writeln!(
                f,
                "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                m.label.as_str(),
                m.precision,
                m.recall,
                m.f1,
                m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.n_samples
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, avg.precision, avg.recall, avg.f1, self.n_samples
            )?;
        }
        Ok(())
    }
}
