// src/telemetry/router.rs
//! Bounded per-tag delivery of decoded telemetry
//!
//! Device notification callbacks hold a [`TelemetryInlet`]; its only work is decoding
//! and a non-blocking enqueue. The capture loop owns the [`TelemetryRouter`] and drains
//! the queues into the recording session between frames.

use crate::acquisition::session::RecordingSession;
use crate::config::TelemetryConfig;
use crate::hal::types::{TelemetrySample, TelemetryTag};
use crate::telemetry::demux::decode_message;
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

const TAG_COUNT: usize = TelemetryTag::ALL.len();

fn slot(tag: TelemetryTag) -> usize {
    tag as usize
}

/// Per-tag delivery counters shared between inlets and the router
#[derive(Debug, Default)]
struct DeliveryCounters {
    delivered: [AtomicU64; TAG_COUNT],
    dropped: [AtomicU64; TAG_COUNT],
}

/// Snapshot of delivery counters for one tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub dropped: u64,
}

/// Producer side handed to device callbacks
#[derive(Debug, Clone)]
pub struct TelemetryInlet {
    senders: [Sender<TelemetrySample>; TAG_COUNT],
    counters: Arc<DeliveryCounters>,
}

impl TelemetryInlet {
    /// Decode a raw message and enqueue its samples; returns how many were accepted
    pub fn deliver(&self, message: &[u8]) -> usize {
        decode_message(message)
            .into_iter()
            .filter(|sample| self.push(*sample))
            .count()
    }

    /// Enqueue one sample without blocking; a full queue drops it
    pub fn push(&self, sample: TelemetrySample) -> bool {
        let index = slot(sample.tag);
        match self.senders[index].try_send(sample) {
            Ok(()) => {
                self.counters.delivered[index].fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                let dropped = self.counters.dropped[index].fetch_add(1, Ordering::Relaxed) + 1;
                // Rate-limit the warning to powers of two
                if dropped.is_power_of_two() {
                    warn!(tag = %sample.tag, dropped, "telemetry queue full, dropping samples");
                }
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Consumer side owned by the capture loop
#[derive(Debug)]
pub struct TelemetryRouter {
    inlet: TelemetryInlet,
    receivers: [Receiver<TelemetrySample>; TAG_COUNT],
}

impl TelemetryRouter {
    pub fn new(capacity: usize) -> Self {
        let (accel_tx, accel_rx) = bounded(capacity);
        let (gyro_tx, gyro_rx) = bounded(capacity);
        let (ppg_tx, ppg_rx) = bounded(capacity);

        Self {
            inlet: TelemetryInlet {
                senders: [accel_tx, gyro_tx, ppg_tx],
                counters: Arc::new(DeliveryCounters::default()),
            },
            receivers: [accel_rx, gyro_rx, ppg_rx],
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(config.queue_capacity)
    }

    pub fn inlet(&self) -> TelemetryInlet {
        self.inlet.clone()
    }

    pub fn pending(&self, tag: TelemetryTag) -> usize {
        self.receivers[slot(tag)].len()
    }

    pub fn stats(&self, tag: TelemetryTag) -> DeliveryStats {
        let index = slot(tag);
        DeliveryStats {
            delivered: self.inlet.counters.delivered[index].load(Ordering::Relaxed),
            dropped: self.inlet.counters.dropped[index].load(Ordering::Relaxed),
        }
    }

    /// Take everything queued so far, tag by tag, each in arrival order
    pub fn drain(&self) -> Vec<TelemetrySample> {
        self.receivers
            .iter()
            .flat_map(|receiver| receiver.try_iter())
            .collect()
    }

    /// Move queued samples into the session; returns how many it accepted
    pub fn drain_into(&self, session: &mut RecordingSession) -> usize {
        self.drain()
            .into_iter()
            .filter(|sample| session.record_telemetry(*sample))
            .count()
    }
}

impl Default for TelemetryRouter {
    fn default() -> Self {
        Self::from_config(&TelemetryConfig::default())
    }
}
