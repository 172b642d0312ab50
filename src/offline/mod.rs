// src/offline/mod.rs
//! Post-processing of finished recordings: alignment, smoothing, annotation

pub mod aligner;
pub mod annotation;
pub mod compare;
pub mod io;
pub mod smoother;

pub use aligner::{align, merge_files, AlignedRow, AlignedTable, GestureClassMap, MergeSummary};
pub use annotation::{annotate, ActionAnnotation, ActionLabel, ActionLabelSet, AnnotationExporter};
pub use compare::{compare_labels, ClassMetrics, ComparisonReport};
pub use io::{read_labels, read_table, write_labels, LabeledSample, TimedTable};
pub use smoother::{collapse_segments, LabelSegment, SegmentSmoother};

use crate::config::constants::annotation::ANNOTATIONS_CSV;
use crate::error::OfflineError;
use std::path::{Path, PathBuf};
use tracing::info;

/// Smooth a pose label file and write `action_annotations.csv` next to it
pub fn preprocess_file<P: AsRef<Path>>(path: P, smoother: &SegmentSmoother) -> Result<PathBuf, OfflineError> {
    let path = path.as_ref();
    let samples = read_labels(path)?;
    if samples.is_empty() {
        return Err(OfflineError::Empty);
    }

    let smoothed = smoother.smooth(&samples);
    let output = path
        .parent()
        .map_or_else(|| PathBuf::from(ANNOTATIONS_CSV), |dir| dir.join(ANNOTATIONS_CSV));
    write_labels(&output, &smoothed)?;

    info!(
        input = %path.display(),
        output = %output.display(),
        samples = samples.len(),
        segments = collapse_segments(&smoothed).len(),
        "preprocessed label file"
    );
    Ok(output)
}
