// src/utils/time.rs
//! Wall-clock timestamps shared by every recorded channel.
//!
//! All channels of a recording are keyed by milliseconds since the Unix epoch so
//! that the offline aligner can join them without any clock translation.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Time provider trait for dependency injection and testing
pub trait TimeProvider: Send + Sync {
    fn now_millis(&self) -> Timestamp;
}

/// System time provider using actual system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> Timestamp {
        current_timestamp_millis()
    }
}

/// Mock time provider for deterministic testing
#[derive(Debug)]
pub struct MockTimeProvider {
    current_time: AtomicI64,
}

impl MockTimeProvider {
    pub fn new(initial_time_millis: Timestamp) -> Self {
        Self {
            current_time: AtomicI64::new(initial_time_millis),
        }
    }

    pub fn advance_by(&self, millis: i64) {
        self.current_time.fetch_add(millis, Ordering::Relaxed);
    }

    pub fn set_time(&self, millis: Timestamp) {
        self.current_time.store(millis, Ordering::Relaxed);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_millis(&self) -> Timestamp {
        self.current_time.load(Ordering::Relaxed)
    }
}

pub fn current_timestamp_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as Timestamp
}

/// Offset of `timestamp` from `origin`, in seconds.
pub fn offset_seconds(timestamp: Timestamp, origin: Timestamp) -> f64 {
    (timestamp - origin) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_time_provider() {
        let clock = MockTimeProvider::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);

        clock.advance_by(250);
        assert_eq!(clock.now_millis(), 1_250);

        clock.set_time(42);
        assert_eq!(clock.now_millis(), 42);
    }

    #[test]
    fn test_system_clock_is_epoch_millis() {
        let now = SystemTimeProvider.now_millis();
        // Somewhere after 2020-01-01
        assert!(now > 1_577_836_800_000);
    }

    #[test]
    fn test_offset_seconds() {
        assert_eq!(offset_seconds(1_500, 1_000), 0.5);
        assert_eq!(offset_seconds(1_000, 1_000), 0.0);
    }
}
