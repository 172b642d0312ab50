// src/telemetry/demux.rs
//! Tagged telemetry message decoding
//!
//! Wire format: `<tag>_<ts>,<v1>,<v2>,<v3>;<ts>,<v1>,<v2>,<v3>;...` where the first
//! character of the header selects the channel. Decoding never fails; malformed pieces
//! are dropped and logged at debug level.

use crate::config::constants::telemetry::{
    FIELD_SEPARATOR, MESSAGE_SEPARATOR, TUPLE_SEPARATOR, VALUES_PER_TUPLE,
};
use crate::hal::types::{TelemetrySample, TelemetryTag};
use crate::utils::time::Timestamp;
use tracing::debug;

/// Decode one raw message into zero or more samples, in arrival order
pub fn decode_message(message: &[u8]) -> Vec<TelemetrySample> {
    let Ok(text) = std::str::from_utf8(message) else {
        debug!(len = message.len(), "dropping non-UTF-8 telemetry message");
        return Vec::new();
    };

    let parts: Vec<&str> = text.trim().split(MESSAGE_SEPARATOR).collect();
    let [header, body] = parts.as_slice() else {
        debug!(parts = parts.len(), "dropping telemetry message with bad segment count");
        return Vec::new();
    };

    let Some(tag) = header.chars().next().and_then(TelemetryTag::from_header) else {
        debug!(header = *header, "dropping telemetry message with unknown tag");
        return Vec::new();
    };

    body.split(TUPLE_SEPARATOR)
        .filter(|tuple| !tuple.trim().is_empty())
        .filter_map(|tuple| {
            let sample = parse_tuple(tag, tuple);
            if sample.is_none() {
                debug!(%tag, tuple, "dropping malformed telemetry tuple");
            }
            sample
        })
        .collect()
}

fn parse_tuple(tag: TelemetryTag, tuple: &str) -> Option<TelemetrySample> {
    let fields: Vec<&str> = tuple.split(FIELD_SEPARATOR).map(str::trim).collect();
    if fields.len() != VALUES_PER_TUPLE + 1 {
        return None;
    }

    let timestamp: Timestamp = fields[0].parse().ok()?;
    let mut values = [0.0f32; VALUES_PER_TUPLE];
    for (value, field) in values.iter_mut().zip(&fields[1..]) {
        *value = field.parse().ok()?;
    }

    Some(TelemetrySample {
        timestamp,
        tag,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accel_message_yields_two_samples() {
        let samples = decode_message(b"A_0,1.0,2.0,3.0;10,1.1,2.1,3.1");

        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.tag == TelemetryTag::Accel));
        assert_eq!(samples[0].timestamp, 0);
        assert_eq!(samples[0].values, [1.0, 2.0, 3.0]);
        assert_eq!(samples[1].timestamp, 10);
        assert_eq!(samples[1].values, [1.1, 2.1, 3.1]);
    }

    #[test]
    fn test_header_selects_channel() {
        assert_eq!(decode_message(b"G_5,0,0,1")[0].tag, TelemetryTag::Gyro);
        assert_eq!(decode_message(b"PPG_5,100,200,300")[0].tag, TelemetryTag::Ppg);
    }

    #[test]
    fn test_short_tuple_is_dropped_alone() {
        let samples = decode_message(b"A_0,1.0,2.0;10,1.1,2.1,3.1");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].timestamp, 10);
    }

    #[test]
    fn test_unparseable_values_are_dropped() {
        let samples = decode_message(b"G_0,x,2.0,3.0;abc,1,2,3;20,1,2,3");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].timestamp, 20);
    }

    #[test]
    fn test_malformed_messages_yield_nothing() {
        assert!(decode_message(b"").is_empty());
        assert!(decode_message(b"A0,1,2,3").is_empty());
        assert!(decode_message(b"A_0,1,2,3_extra").is_empty());
        assert!(decode_message(b"X_0,1,2,3").is_empty());
        assert!(decode_message(b"_0,1,2,3").is_empty());
        assert!(decode_message(&[0xff, 0xfe, b'_']).is_empty());
    }

    #[test]
    fn test_trailing_separator_and_newline_tolerated() {
        let samples = decode_message(b"P_1,2,3,4;\n");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].values, [2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_arrival_order_preserved() {
        let samples = decode_message(b"A_30,0,0,0;10,0,0,0;20,0,0,0");
        let timestamps: Vec<_> = samples.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![30, 10, 20]);
    }
}
