// src/pose/vectorizer.rs
//! Palm-relative pose vectors
//!
//! Every bone segment is expressed as a unit direction in a frame rebuilt from the
//! palm on each sample, so the resulting vector does not change when the whole hand
//! is moved or rotated.

use crate::config::constants::pose::POSE_VECTOR_LEN;
use crate::error::PoseError;
use crate::hal::types::{Finger, Palm, PoseSample, Segment, Vec3};
use ndarray::{arr1, Array2};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fixed-length feature vector: 15 segments × 3 axes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseVector([f32; POSE_VECTOR_LEN]);

impl PoseVector {
    pub fn new(components: [f32; POSE_VECTOR_LEN]) -> Self {
        Self(components)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dot(&self, other: &PoseVector) -> f32 {
        self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum()
    }

    pub fn norm(&self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Direction of one segment inside the vector
    pub fn segment(&self, finger: Finger, segment: Segment) -> [f32; 3] {
        let offset = segment_offset(finger, segment);
        [self.0[offset], self.0[offset + 1], self.0[offset + 2]]
    }
}

impl TryFrom<Vec<f32>> for PoseVector {
    type Error = String;

    fn try_from(components: Vec<f32>) -> Result<Self, Self::Error> {
        let len = components.len();
        let array: [f32; POSE_VECTOR_LEN] = components
            .try_into()
            .map_err(|_| format!("expected {} components, got {}", POSE_VECTOR_LEN, len))?;
        Ok(Self(array))
    }
}

impl Serialize for PoseVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PoseVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let components = Vec::<f32>::deserialize(deserializer)?;
        PoseVector::try_from(components).map_err(serde::de::Error::custom)
    }
}

/// Vectorizer output: the comparable vector plus diagnostics excluded from comparison
#[derive(Debug, Clone, PartialEq)]
pub struct PoseDescriptor {
    pub vector: PoseVector,
    pub pinch_distance: f32,
    pub pinch_strength: f32,
    pub palm_orientation: [f32; 4],
    pub palm_position: [f32; 3],
}

fn segment_offset(finger: Finger, segment: Segment) -> usize {
    ((finger as usize) * Segment::ALL.len() + segment as usize) * 3
}

/// Orthonormal palm frame; columns are side, up and forward
fn palm_basis(palm: &Palm) -> Result<Array2<f32>, PoseError> {
    let forward = palm.direction.normalized().ok_or(PoseError::DegeneratePalm)?;
    let normal = palm.normal.normalized().ok_or(PoseError::DegeneratePalm)?;
    let side = forward.cross(normal).normalized().ok_or(PoseError::DegeneratePalm)?;
    let up = side.cross(forward);

    let mut basis = Array2::<f32>::zeros((3, 3));
    for (column, axis) in [side, up, forward].iter().enumerate() {
        for (row, value) in axis.to_array().iter().enumerate() {
            basis[[row, column]] = *value;
        }
    }
    Ok(basis)
}

/// Convert one hand sample into its palm-relative descriptor
pub fn vectorize(sample: &PoseSample) -> Result<PoseDescriptor, PoseError> {
    let basis = palm_basis(&sample.palm)?;
    let basis_t = basis.t();
    let origin = sample.palm.position;

    let mut components = [0.0f32; POSE_VECTOR_LEN];
    for finger in Finger::ALL {
        let digit = sample.digit(finger);
        for segment in Segment::ALL {
            let bone = digit
                .segment(segment)
                .ok_or(PoseError::MissingSegment { finger, segment })?;

            let displacement: Vec3 = (bone.next_joint - origin) - (bone.prev_joint - origin);
            let local = basis_t.dot(&arr1(&displacement.to_array()));
            let local = Vec3::new(local[0], local[1], local[2])
                .normalized()
                .ok_or(PoseError::DegenerateSegment { finger, segment })?;

            let offset = segment_offset(finger, segment);
            components[offset..offset + 3].copy_from_slice(&local.to_array());
        }
    }

    Ok(PoseDescriptor {
        vector: PoseVector(components),
        pinch_distance: sample.pinch_distance,
        pinch_strength: sample.pinch_strength,
        palm_orientation: sample.palm.orientation.to_array(),
        palm_position: sample.palm.position.to_array(),
    })
}
