// src/pose/classifier.rs
//! Nearest-neighbour pose classification by cosine similarity

use crate::config::constants::labels::{LABEL_NAMESPACE, UNKNOWN_NAME};
use crate::config::ClassifierConfig;
use crate::error::PoseError;
use crate::pose::library::PoseLibrary;
use crate::pose::vectorizer::PoseVector;
use std::fmt;

/// Classification outcome label
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoseLabel {
    Named(String),
    Unknown,
}

impl PoseLabel {
    pub fn is_unknown(&self) -> bool {
        matches!(self, PoseLabel::Unknown)
    }

    /// Namespaced form written to recordings, e.g. `Pose.Fist` or `Pose.Unknown`
    pub fn qualified(&self) -> String {
        match self {
            PoseLabel::Named(name) => format!("{}.{}", LABEL_NAMESPACE, name),
            PoseLabel::Unknown => format!("{}.{}", LABEL_NAMESPACE, UNKNOWN_NAME),
        }
    }
}

impl fmt::Display for PoseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoseLabel::Named(name) => f.write_str(name),
            PoseLabel::Unknown => f.write_str("unknown"),
        }
    }
}

/// Best match for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: PoseLabel,
    pub similarity: f32,
}

/// Cosine similarity; zero-magnitude inputs are rejected
pub fn cosine_similarity(input: &PoseVector, reference: &PoseVector) -> Result<f32, PoseError> {
    let input_norm = input.norm();
    if input_norm == 0.0 {
        return Err(PoseError::ZeroVector { which: "input" });
    }
    let reference_norm = reference.norm();
    if reference_norm == 0.0 {
        return Err(PoseError::ZeroVector { which: "reference" });
    }
    Ok(input.dot(reference) / (input_norm * reference_norm))
}

/// Stateless classifier; the library snapshot is supplied per call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseClassifier {
    threshold: f32,
}

impl PoseClassifier {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(config.similarity_threshold)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn classify(
        &self,
        vector: &PoseVector,
        library: &PoseLibrary,
    ) -> Result<ClassificationResult, PoseError> {
        let mut best: Option<(&str, f32)> = None;

        for (name, reference) in library.iter() {
            let similarity = cosine_similarity(vector, &reference.pose_vector)?;
            // Strict comparison keeps the first of equal maxima
            if best.map_or(true, |(_, current)| similarity > current) {
                best = Some((name, similarity));
            }
        }

        let result = match best {
            Some((name, similarity)) if similarity >= self.threshold => ClassificationResult {
                label: PoseLabel::Named(name.to_string()),
                similarity,
            },
            Some((_, similarity)) => ClassificationResult {
                label: PoseLabel::Unknown,
                similarity,
            },
            None => ClassificationResult {
                label: PoseLabel::Unknown,
                similarity: 0.0,
            },
        };
        Ok(result)
    }
}

impl Default for PoseClassifier {
    fn default() -> Self {
        Self::from_config(&ClassifierConfig::default())
    }
}
