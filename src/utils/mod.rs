//! Common utilities for the capture pipeline

pub mod time;

pub use time::{
    current_timestamp_millis,
    offset_seconds,
    MockTimeProvider,
    SystemTimeProvider,
    TimeProvider,
    Timestamp,
};
