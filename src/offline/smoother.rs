// src/offline/smoother.rs
//! Majority-vote smoothing of per-sample pose labels into action segments

use crate::config::constants::{labels, smoothing};
use crate::config::SmoothingConfig;
use crate::offline::io::LabeledSample;
use crate::utils::time::Timestamp;
use rayon::prelude::*;
use tracing::debug;

/// Contiguous run of one label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSegment {
    pub label: String,
    pub first: Timestamp,
    pub last: Timestamp,
    pub samples: usize,
}

/// Cleans a noisy label stream in two passes: a sliding-window vote, then
/// pre-transition extension so the motion leading into a pose carries its label.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSmoother {
    window_ms: i64,
    pre_transition: usize,
    unknown_label: String,
    resting_label: String,
}

impl SegmentSmoother {
    pub fn new(window_ms: i64, pre_transition: usize) -> Self {
        Self {
            window_ms: window_ms.max(0),
            pre_transition,
            unknown_label: labels::DEFAULT_UNKNOWN_LABEL.to_string(),
            resting_label: labels::DEFAULT_RESTING_LABEL.to_string(),
        }
    }

    pub fn from_config(config: &SmoothingConfig) -> Self {
        Self::new(config.window_ms, config.pre_transition_samples)
            .with_labels(config.unknown_label.clone(), config.resting_label.clone())
    }

    pub fn with_labels(mut self, unknown: impl Into<String>, resting: impl Into<String>) -> Self {
        self.unknown_label = unknown.into();
        self.resting_label = resting.into();
        self
    }

    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    pub fn pre_transition(&self) -> usize {
        self.pre_transition
    }

    pub fn resting_label(&self) -> &str {
        &self.resting_label
    }

    /// Vote and extend. Input is sorted by timestamp first (stable).
    pub fn smooth(&self, samples: &[LabeledSample]) -> Vec<LabeledSample> {
        let mut ordered = samples.to_vec();
        ordered.sort_by_key(|sample| sample.timestamp);

        let mut voted = self.majority_vote(&ordered);
        self.extend_transitions(&mut voted);
        debug!(input = samples.len(), output = voted.len(), "smoothed label stream");
        voted
    }

    /// Replace each label with the most frequent label within `window_ms / 2` on
    /// either side. Samples closer than half a window to either end are dropped.
    ///
    /// `samples` must be sorted by timestamp.
    pub fn majority_vote(&self, samples: &[LabeledSample]) -> Vec<LabeledSample> {
        let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
            return Vec::new();
        };
        let half = self.window_ms / 2;
        let (first, last) = (first.timestamp, last.timestamp);
        let timestamps: Vec<Timestamp> = samples.iter().map(|s| s.timestamp).collect();

        samples
            .par_iter()
            .filter(|sample| sample.timestamp - first > half && sample.timestamp < last - half)
            .map(|sample| {
                let lo = timestamps.partition_point(|&ts| ts < sample.timestamp - half);
                let hi = timestamps.partition_point(|&ts| ts <= sample.timestamp + half);
                let winner = dominant_label(&samples[lo..hi]);
                let label = if winner == self.unknown_label {
                    self.resting_label.clone()
                } else {
                    winner.to_string()
                };
                LabeledSample::new(sample.timestamp, label)
            })
            .collect()
    }

    /// For every non-resting sample `i`, relabel samples `max(0, i - P)..i` with its
    /// label, in increasing `i`.
    pub fn extend_transitions(&self, samples: &mut [LabeledSample]) {
        let voted: Vec<String> = samples.iter().map(|s| s.label.clone()).collect();
        for (i, label) in voted.iter().enumerate() {
            if *label == self.resting_label {
                continue;
            }
            let start = i.saturating_sub(self.pre_transition);
            for sample in &mut samples[start..i] {
                sample.label.clone_from(label);
            }
        }
    }
}

impl Default for SegmentSmoother {
    fn default() -> Self {
        Self::new(smoothing::DEFAULT_WINDOW_MS, smoothing::DEFAULT_PRE_TRANSITION_SAMPLES)
    }
}

/// Most frequent label; ties go to the one seen first
fn dominant_label(window: &[LabeledSample]) -> &str {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for sample in window {
        match counts.iter().position(|(label, _)| *label == sample.label) {
            Some(index) => counts[index].1 += 1,
            None => counts.push((sample.label.as_str(), 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (label, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((label, count));
        }
    }
    best.map_or("", |(label, _)| label)
}

/// Group consecutive equal labels
pub fn collapse_segments(samples: &[LabeledSample]) -> Vec<LabelSegment> {
    let mut segments: Vec<LabelSegment> = Vec::new();
    for sample in samples {
        match segments.last_mut() {
            Some(segment) if segment.label == sample.label => {
                segment.last = sample.timestamp;
                segment.samples += 1;
            }
            _ => segments.push(LabelSegment {
                label: sample.label.clone(),
                first: sample.timestamp,
                last: sample.timestamp,
                samples: 1,
            }),
        }
    }
    segments
}
