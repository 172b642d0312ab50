// src/acquisition/mod.rs
//! Recording sessions: channel buffers, persistence and the capture loop

pub mod channel;
pub mod persist;
pub mod recorder;
pub mod session;

pub use channel::{ChannelKind, TimedChannel};
pub use persist::{FlushReport, RawVideoEncoder, SessionWriter, VideoEncoder};
pub use recorder::{Recorder, RecorderCommand, RecorderSummary};
pub use session::{FramePacer, RecordingSession, SessionHandle, SessionRecording, SessionState};
