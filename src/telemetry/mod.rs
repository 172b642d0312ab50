// src/telemetry/mod.rs
//! Wireless telemetry decoding and delivery

pub mod demux;
pub mod router;

pub use demux::decode_message;
pub use router::{DeliveryStats, TelemetryInlet, TelemetryRouter};
