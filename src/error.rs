// src/error.rs
//! Unified error handling for the capture pipeline
//!
//! Each concern owns a focused error enum; [`CaptureError`] unifies them so that
//! callers driving the whole pipeline can propagate with `?`. The variants follow the
//! recovery taxonomy used throughout the crate:
//!
//! - malformed input (bad telemetry, untracked bones, zero vectors) is recovered
//!   locally by dropping the sample,
//! - an unavailable device degrades the recording to pose-only mode,
//! - persistence and configuration failures halt the current operation only.

use crate::acquisition::channel::ChannelKind;
use crate::config::ConfigError;
use crate::hal::types::{Finger, Segment};
use crate::utils::time::Timestamp;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning a hand sample into a comparable vector
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    #[error("sample is missing the {finger} {segment} segment")]
    MissingSegment { finger: Finger, segment: Segment },

    #[error("the {finger} {segment} segment has zero length")]
    DegenerateSegment { finger: Finger, segment: Segment },

    #[error("palm direction and normal do not span a basis")]
    DegeneratePalm,

    #[error("cannot compare a zero-magnitude {which} vector")]
    ZeroVector { which: &'static str },
}

/// Reference library loading and mutation errors
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("cannot read pose library {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse pose library {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("pose library {path} has an invalid entry '{name}': {reason}")]
    InvalidEntry {
        path: PathBuf,
        name: String,
        reason: String,
    },

    #[error("reference pose '{name}' has a zero-magnitude vector")]
    ZeroVector { name: String },

    #[error("pose library watcher failed: {0}")]
    Watch(String),
}

/// Collaborator device errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("no {0} device found")]
    NotFound(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("control write failed: {0}")]
    ControlWrite(String),

    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    #[error("device stream closed")]
    Closed,
}

/// Recording session state violations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("a recording started at {started_at} is already active")]
    AlreadyActive { started_at: Timestamp },

    #[error("no recording is active")]
    NotActive,
}

/// Per-channel persistence failure
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("{channel} channel: cannot write {path}: {source}")]
    Io {
        channel: ChannelKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{channel} channel: cannot write {path}: {source}")]
    Csv {
        channel: ChannelKind,
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl PersistError {
    pub fn channel(&self) -> ChannelKind {
        match self {
            PersistError::Io { channel, .. } | PersistError::Csv { channel, .. } => *channel,
        }
    }

    pub fn path(&self) -> &PathBuf {
        match self {
            PersistError::Io { path, .. } | PersistError::Csv { path, .. } => path,
        }
    }
}

/// Offline post-processing input/output errors
#[derive(Error, Debug)]
pub enum OfflineError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path} line {line}: invalid timestamp '{value}'")]
    InvalidTimestamp {
        path: PathBuf,
        line: u64,
        value: String,
    },

    #[error("label '{label}' has no action mapping")]
    UnmappedLabel { label: String },

    #[error("no samples to process")]
    Empty,
}

/// How far an error is allowed to propagate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Drop the offending sample and continue
    Recoverable,
    /// Continue with reduced functionality
    Degraded,
    /// Abort the current operation, never the process
    OperationHalted,
}

/// Unified error type for the entire pipeline
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error(transparent)]
    Pose(#[from] PoseError),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Offline(#[from] OfflineError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CaptureError {
    pub fn severity(&self) -> Severity {
        match self {
            CaptureError::Pose(_) => Severity::Recoverable,
            CaptureError::Device(_) | CaptureError::Session(_) => Severity::Degraded,
            CaptureError::Library(_)
            | CaptureError::Persist(_)
            | CaptureError::Offline(_)
            | CaptureError::Config(_) => Severity::OperationHalted,
        }
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
