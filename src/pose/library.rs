// src/pose/library.rs
//! Reference pose library
//!
//! A [`PoseLibrary`] is an immutable snapshot. Adding or removing a pose produces a
//! new snapshot, and [`LibraryStore`] swaps snapshots atomically so that an in-flight
//! classification keeps reading the snapshot it started with.

use crate::error::LibraryError;
use crate::pose::vectorizer::{PoseDescriptor, PoseVector};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// One named reference, as persisted in the library file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePose {
    pub pinch_distance: f32,
    pub pinch_strength: f32,
    pub palm_orientation: [f32; 4],
    pub palm_position: [f32; 3],
    pub pose_vector: PoseVector,
}

impl ReferencePose {
    /// Capture a live pose as a new reference
    pub fn from_descriptor(descriptor: &PoseDescriptor) -> Self {
        Self {
            pinch_distance: descriptor.pinch_distance,
            pinch_strength: descriptor.pinch_strength,
            palm_orientation: descriptor.palm_orientation,
            palm_position: descriptor.palm_position,
            pose_vector: descriptor.vector,
        }
    }

    pub fn from_vector(pose_vector: PoseVector) -> Self {
        Self {
            pinch_distance: 0.0,
            pinch_strength: 0.0,
            palm_orientation: [0.0, 0.0, 0.0, 1.0],
            palm_position: [0.0; 3],
            pose_vector,
        }
    }
}

/// Immutable name → reference snapshot, iterated in name order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseLibrary {
    poses: BTreeMap<String, ReferencePose>,
}

impl PoseLibrary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a whole library file; any invalid entry fails the load
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LibraryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LibraryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let library: PoseLibrary =
            serde_json::from_str(&content).map_err(|source| LibraryError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(name) = library.zero_vector_entry() {
            return Err(LibraryError::InvalidEntry {
                path: path.to_path_buf(),
                name: name.to_string(),
                reason: "pose_vector has zero magnitude".to_string(),
            });
        }

        info!(path = %path.display(), poses = library.len(), "loaded pose library");
        Ok(library)
    }

    /// Load every file in order; later files overwrite earlier names
    pub fn load_all<P: AsRef<Path>>(paths: &[P]) -> Result<Self, LibraryError> {
        paths
            .iter()
            .try_fold(Self::empty(), |library, path| library.merge_file(path))
    }

    /// New snapshot with the poses of another library file layered on top
    pub fn merge_file<P: AsRef<Path>>(&self, path: P) -> Result<Self, LibraryError> {
        Ok(self.merged(Self::load(path)?))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), LibraryError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|source| LibraryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| LibraryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), poses = self.len(), "saved pose library");
        Ok(())
    }

    /// New snapshot with `name` added or replaced
    pub fn with_pose(&self, name: &str, pose: ReferencePose) -> Result<Self, LibraryError> {
        if pose.pose_vector.norm() == 0.0 {
            return Err(LibraryError::ZeroVector { name: name.to_string() });
        }
        let mut poses = self.poses.clone();
        poses.insert(name.to_string(), pose);
        Ok(Self { poses })
    }

    /// New snapshot without `name`
    pub fn without_pose(&self, name: &str) -> Self {
        let mut poses = self.poses.clone();
        poses.remove(name);
        Self { poses }
    }

    /// New snapshot containing `other`'s poses on top of these
    pub fn merged(&self, other: PoseLibrary) -> Self {
        let mut poses = self.poses.clone();
        poses.extend(other.poses);
        Self { poses }
    }

    pub fn get(&self, name: &str) -> Option<&ReferencePose> {
        self.poses.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ReferencePose)> {
        self.poses.iter().map(|(name, pose)| (name.as_str(), pose))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.poses.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    fn zero_vector_entry(&self) -> Option<&str> {
        self.iter()
            .find(|(_, pose)| pose.pose_vector.norm() == 0.0)
            .map(|(name, _)| name)
    }
}

/// Shared holder of the current library snapshot
#[derive(Debug, Clone, Default)]
pub struct LibraryStore {
    current: Arc<RwLock<Arc<PoseLibrary>>>,
}

impl LibraryStore {
    pub fn new(library: PoseLibrary) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(library))),
        }
    }

    /// Snapshot for one classification; unaffected by later updates
    pub fn snapshot(&self) -> Arc<PoseLibrary> {
        Arc::clone(&self.current.read())
    }

    pub fn replace(&self, library: PoseLibrary) {
        *self.current.write() = Arc::new(library);
    }

    pub fn add(&self, name: &str, pose: ReferencePose) -> Result<(), LibraryError> {
        let mut guard = self.current.write();
        let updated = guard.with_pose(name, pose)?;
        *guard = Arc::new(updated);
        info!(pose = name, "added reference pose");
        Ok(())
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut guard = self.current.write();
        if guard.get(name).is_none() {
            return false;
        }
        let updated = guard.without_pose(name);
        *guard = Arc::new(updated);
        info!(pose = name, "removed reference pose");
        true
    }
}
