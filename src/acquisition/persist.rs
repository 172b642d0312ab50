// src/acquisition/persist.rs
//! Writing a finished recording to disk
//!
//! Each channel goes to its own file under `<output_dir>/<start timestamp>/`. Channels
//! are written independently: a failure is recorded in the [`FlushReport`] with its
//! channel and path, and the remaining channels are still attempted.

use crate::acquisition::channel::{ChannelKind, TimedChannel};
use crate::acquisition::session::SessionRecording;
use crate::config::constants::recording::TIMESTAMP_COLUMN;
use crate::config::RecordingConfig;
use crate::error::PersistError;
use crate::hal::types::VideoFrame;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Encodes the video channel of a recording
pub trait VideoEncoder: Send + Sync {
    /// File name inside the recording directory
    fn file_name(&self) -> &str;

    /// Encode frames in timestamp order at `fps`
    fn encode(&self, path: &Path, fps: u32, frames: &TimedChannel<VideoFrame>) -> std::io::Result<()>;
}

/// Geometry written next to a raw video stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawVideoHeader {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frames: usize,
    pub pixel_format: &'static str,
    pub timestamps: Vec<i64>,
}

/// Concatenated RGB8 frames plus a `<file>.json` sidecar describing them
#[derive(Debug, Clone)]
pub struct RawVideoEncoder {
    file_name: String,
}

impl RawVideoEncoder {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    pub fn sidecar_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".json");
        PathBuf::from(name)
    }
}

impl Default for RawVideoEncoder {
    fn default() -> Self {
        Self::new(ChannelKind::Video.file_name())
    }
}

impl VideoEncoder for RawVideoEncoder {
    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn encode(&self, path: &Path, fps: u32, frames: &TimedChannel<VideoFrame>) -> std::io::Result<()> {
        let (width, height) = frames
            .values()
            .next()
            .map(|frame| (frame.width, frame.height))
            .unwrap_or((0, 0));

        let mut out = BufWriter::new(File::create(path)?);
        let mut timestamps = Vec::with_capacity(frames.len());
        for (timestamp, frame) in frames.iter() {
            if (frame.width, frame.height) != (width, height) {
                warn!(timestamp, "skipping video frame with mismatched dimensions");
                continue;
            }
            out.write_all(&frame.pixels)?;
            timestamps.push(timestamp);
        }
        out.flush()?;

        // The sidecar describes only the frames present in the stream
        let header = RawVideoHeader {
            width,
            height,
            fps,
            frames: timestamps.len(),
            pixel_format: "rgb24",
            timestamps,
        };
        let sidecar = serde_json::to_vec_pretty(&header)?;
        std::fs::write(Self::sidecar_path(path), sidecar)
    }
}

/// Outcome of one flush
#[derive(Debug, Default)]
pub struct FlushReport {
    pub directory: PathBuf,
    pub written: Vec<(ChannelKind, PathBuf, usize)>,
    pub failures: Vec<PersistError>,
}

impl FlushReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn rows(&self, kind: ChannelKind) -> Option<usize> {
        self.written
            .iter()
            .find(|(channel, _, _)| *channel == kind)
            .map(|(_, _, rows)| *rows)
    }

    pub fn failed(&self, kind: ChannelKind) -> bool {
        self.failures.iter().any(|failure| failure.channel() == kind)
    }
}

/// Writes recordings below an output directory
pub struct SessionWriter {
    output_dir: PathBuf,
    encoder: Box<dyn VideoEncoder>,
}

impl SessionWriter {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
            encoder: Box::new(RawVideoEncoder::default()),
        }
    }

    pub fn from_config(config: &RecordingConfig) -> Self {
        Self::new(config.output_dir.clone())
    }

    pub fn with_encoder(mut self, encoder: Box<dyn VideoEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn session_dir(&self, recording: &SessionRecording) -> PathBuf {
        self.output_dir.join(recording.started_at.to_string())
    }

    /// Write every channel; never stops at the first failure
    pub fn flush(&self, recording: &SessionRecording) -> FlushReport {
        let directory = self.session_dir(recording);
        let mut report = FlushReport {
            directory: directory.clone(),
            ..Default::default()
        };

        if let Err(e) = std::fs::create_dir_all(&directory) {
            // Every channel below will report its own failure
            warn!(path = %directory.display(), error = %e, "cannot create recording directory");
        }

        for kind in ChannelKind::ALL {
            let (path, outcome) = match kind {
                ChannelKind::Video => {
                    let path = directory.join(self.encoder.file_name());
                    let outcome = self
                        .encoder
                        .encode(&path, recording.target_fps, &recording.video)
                        .map_err(|source| PersistError::Io {
                            channel: kind,
                            path: path.clone(),
                            source,
                        });
                    (path, outcome)
                }
                ChannelKind::Poses => label_file(&directory, kind, &recording.poses),
                ChannelKind::ManualLabels => label_file(&directory, kind, &recording.manual_labels),
                ChannelKind::Accel => vector_file(&directory, kind, &recording.accel),
                ChannelKind::Gyro => vector_file(&directory, kind, &recording.gyro),
                ChannelKind::Ppg => vector_file(&directory, kind, &recording.ppg),
            };

            match outcome {
                Ok(()) => report.written.push((kind, path, recording.row_count(kind))),
                Err(e) => {
                    error!(channel = %kind, path = %path.display(), error = %e, "channel flush failed");
                    report.failures.push(e);
                }
            }
        }

        info!(
            path = %directory.display(),
            written = report.written.len(),
            failed = report.failures.len(),
            "recording flushed"
        );
        report
    }
}

fn label_file(
    directory: &Path,
    kind: ChannelKind,
    channel: &TimedChannel<String>,
) -> (PathBuf, Result<(), PersistError>) {
    let path = directory.join(kind.file_name());
    let outcome = write_rows(&path, kind, channel.iter().map(|(ts, label)| {
        vec![ts.to_string(), label.clone()]
    }));
    (path, outcome)
}

fn vector_file(
    directory: &Path,
    kind: ChannelKind,
    channel: &TimedChannel<[f32; 3]>,
) -> (PathBuf, Result<(), PersistError>) {
    let path = directory.join(kind.file_name());
    let outcome = write_rows(&path, kind, channel.iter().map(|(ts, values)| {
        std::iter::once(ts.to_string())
            .chain(values.iter().map(f32::to_string))
            .collect()
    }));
    (path, outcome)
}

fn write_rows(
    path: &Path,
    kind: ChannelKind,
    rows: impl Iterator<Item = Vec<String>>,
) -> Result<(), PersistError> {
    let csv_error = |source: csv::Error| PersistError::Csv {
        channel: kind,
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    let header = std::iter::once(TIMESTAMP_COLUMN).chain(kind.value_columns().iter().copied());
    writer.write_record(header).map_err(csv_error)?;
    for row in rows {
        writer.write_record(&row).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| PersistError::Io {
        channel: kind,
        path: path.to_path_buf(),
        source,
    })
}
