// src/offline/compare.rs
//! Agreement between a reference and a predicted label file

use crate::error::OfflineError;
use crate::offline::io::LabeledSample;
use crate::utils::time::Timestamp;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Precision, recall and F1 for one label
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Reference samples carrying this label
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    /// Samples present in both files
    pub matched: usize,
    pub accuracy: f64,
    /// Sorted union of reference and predicted labels; indexes `confusion`
    pub labels: Vec<String>,
    /// `confusion[reference][predicted]` sample counts
    pub confusion: Vec<Vec<usize>>,
    pub per_class: Vec<ClassMetrics>,
}

impl ComparisonReport {
    pub fn class(&self, label: &str) -> Option<&ClassMetrics> {
        self.per_class.iter().find(|metrics| metrics.label == label)
    }

    pub fn count(&self, reference: &str, predicted: &str) -> usize {
        let row = self.labels.iter().position(|l| l == reference);
        let col = self.labels.iter().position(|l| l == predicted);
        match (row, col) {
            (Some(row), Some(col)) => self.confusion[row][col],
            _ => 0,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Inner-join the two label streams on timestamp and score the predictions.
///
/// Duplicate timestamps keep the last label of each stream.
pub fn compare_labels(
    reference: &[LabeledSample],
    predicted: &[LabeledSample],
) -> Result<ComparisonReport, OfflineError> {
    let predicted: BTreeMap<Timestamp, &str> = predicted
        .iter()
        .map(|sample| (sample.timestamp, sample.label.as_str()))
        .collect();
    let reference: BTreeMap<Timestamp, &str> = reference
        .iter()
        .map(|sample| (sample.timestamp, sample.label.as_str()))
        .collect();

    let pairs: Vec<(&str, &str)> = reference
        .iter()
        .filter_map(|(ts, truth)| predicted.get(ts).map(|guess| (*truth, *guess)))
        .collect();
    if pairs.is_empty() {
        return Err(OfflineError::Empty);
    }

    let labels: Vec<String> = pairs
        .iter()
        .flat_map(|(truth, guess)| [*truth, *guess])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();
    let index = |label: &str| labels.iter().position(|l| l == label).unwrap_or(0);

    let mut confusion = vec![vec![0usize; labels.len()]; labels.len()];
    for (truth, guess) in &pairs {
        confusion[index(truth)][index(guess)] += 1;
    }

    let correct: usize = (0..labels.len()).map(|i| confusion[i][i]).sum();
    let per_class = labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let true_positive = confusion[i][i];
            let support: usize = confusion[i].iter().sum();
            let predicted_count: usize = confusion.iter().map(|row| row[i]).sum();
            let precision = ratio(true_positive, predicted_count);
            let recall = ratio(true_positive, support);
            let f1 = if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            };
            ClassMetrics {
                label: label.clone(),
                precision,
                recall,
                f1,
                support,
            }
        })
        .collect();

    Ok(ComparisonReport {
        matched: pairs.len(),
        accuracy: ratio(correct, pairs.len()),
        labels,
        confusion,
        per_class,
    })
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Accuracy: {:.2}% over {} samples", self.accuracy * 100.0, self.matched)?;
        writeln!(f)?;
        writeln!(f, "Confusion matrix (rows: reference, columns: predicted):")?;
        for (label, row) in self.labels.iter().zip(&self.confusion) {
            let cells: Vec<String> = row.iter().map(|count| format!("{:>6}", count)).collect();
            writeln!(f, "{:>20} {}", label, cells.join(""))?;
        }
        writeln!(f)?;
        writeln!(f, "{:>20} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        for metrics in &self.per_class {
            writeln!(
                f,
                "{:>20} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                metrics.label, metrics.precision, metrics.recall, metrics.f1, metrics.support
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(entries: &[(i64, &str)]) -> Vec<LabeledSample> {
        entries.iter().map(|(ts, label)| LabeledSample::new(*ts, *label)).collect()
    }

    #[test]
    fn test_accuracy_over_shared_timestamps() {
        let reference = labels(&[(0, "A"), (1, "A"), (2, "B"), (3, "B"), (9, "B")]);
        let predicted = labels(&[(0, "A"), (1, "B"), (2, "B"), (3, "B"), (7, "A")]);
        let report = compare_labels(&reference, &predicted).unwrap();

        assert_eq!(report.matched, 4);
        assert_eq!(report.accuracy, 0.75);
        assert_eq!(report.labels, vec!["A", "B"]);
        assert_eq!(report.confusion, vec![vec![1, 1], vec![0, 2]]);
        assert_eq!(report.count("A", "B"), 1);
    }

    #[test]
    fn test_per_class_metrics() {
        let reference = labels(&[(0, "A"), (1, "A"), (2, "B"), (3, "B")]);
        let predicted = labels(&[(0, "A"), (1, "B"), (2, "B"), (3, "B")]);
        let report = compare_labels(&reference, &predicted).unwrap();

        let a = report.class("A").unwrap();
        assert_eq!((a.precision, a.recall, a.support), (1.0, 0.5, 2));
        assert!((a.f1 - 2.0 / 3.0).abs() < 1e-12);

        let b = report.class("B").unwrap();
        assert!((b.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(b.recall, 1.0);
    }

    #[test]
    fn test_predicted_only_label_has_zero_support() {
        let report = compare_labels(&labels(&[(0, "A")]), &labels(&[(0, "C")])).unwrap();
        assert_eq!(report.accuracy, 0.0);
        let c = report.class("C").unwrap();
        assert_eq!((c.support, c.precision, c.f1), (0, 0.0, 0.0));
    }

    #[test]
    fn test_no_overlap_is_error() {
        let result = compare_labels(&labels(&[(0, "A")]), &labels(&[(1, "A")]));
        assert!(matches!(result, Err(OfflineError::Empty)));
    }

    #[test]
    fn test_report_display() {
        let report = compare_labels(&labels(&[(0, "A"), (1, "B")]), &labels(&[(0, "A"), (1, "A")])).unwrap();
        let text = report.to_string();
        assert!(text.starts_with("Accuracy: 50.00% over 2 samples"));
        assert!(text.contains("precision"));
    }
}
