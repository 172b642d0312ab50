// src/pose/mod.rs
//! Pose vectorization, reference library and classification

pub mod classifier;
pub mod library;
pub mod vectorizer;
pub mod watcher;

pub use classifier::{cosine_similarity, ClassificationResult, PoseClassifier, PoseLabel};
pub use library::{LibraryStore, PoseLibrary, ReferencePose};
pub use vectorizer::{vectorize, PoseDescriptor, PoseVector};
pub use watcher::LibraryWatcher;
