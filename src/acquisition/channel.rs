// src/acquisition/channel.rs
//! Timestamp-keyed recording channels

use crate::config::constants::recording;
use crate::hal::types::TelemetryTag;
use crate::utils::time::Timestamp;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

/// The independently timestamped streams of one recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelKind {
    Video,
    Poses,
    ManualLabels,
    Accel,
    Gyro,
    Ppg,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 6] = [
        ChannelKind::Video,
        ChannelKind::Poses,
        ChannelKind::ManualLabels,
        ChannelKind::Accel,
        ChannelKind::Gyro,
        ChannelKind::Ppg,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            ChannelKind::Video => recording::VIDEO_FILE,
            ChannelKind::Poses => recording::POSES_FILE,
            ChannelKind::ManualLabels => recording::MANUAL_POSES_FILE,
            ChannelKind::Accel => recording::ACCEL_FILE,
            ChannelKind::Gyro => recording::GYRO_FILE,
            ChannelKind::Ppg => recording::PPG_FILE,
        }
    }

    pub fn from_tag(tag: TelemetryTag) -> Self {
        match tag {
            TelemetryTag::Accel => ChannelKind::Accel,
            TelemetryTag::Gyro => ChannelKind::Gyro,
            TelemetryTag::Ppg => ChannelKind::Ppg,
        }
    }

    /// Value column headers following the timestamp column
    pub fn value_columns(self) -> &'static [&'static str] {
        match self {
            ChannelKind::Video => &[],
            ChannelKind::Poses | ChannelKind::ManualLabels => &[recording::POSE_COLUMN],
            ChannelKind::Accel => &recording::ACCEL_COLUMNS,
            ChannelKind::Gyro => &recording::GYRO_COLUMNS,
            ChannelKind::Ppg => &recording::PPG_COLUMNS,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelKind::Video => "video",
            ChannelKind::Poses => "poses",
            ChannelKind::ManualLabels => "manual_poses",
            ChannelKind::Accel => "accel",
            ChannelKind::Gyro => "gyro",
            ChannelKind::Ppg => "ppg",
        };
        f.write_str(name)
    }
}

/// Ordered timestamp → value map; a duplicate timestamp overwrites the earlier value
#[derive(Debug, Clone, PartialEq)]
pub struct TimedChannel<T> {
    entries: BTreeMap<Timestamp, T>,
}

impl<T> TimedChannel<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Insert a value, returning the one it replaced
    pub fn insert(&mut self, timestamp: Timestamp, value: T) -> Option<T> {
        self.entries.insert(timestamp, value)
    }

    pub fn get(&self, timestamp: Timestamp) -> Option<&T> {
        self.entries.get(&timestamp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Move the contents out, leaving this channel empty
    pub fn take(&mut self) -> Self {
        Self {
            entries: std::mem::take(&mut self.entries),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Timestamp, &T)> + '_ {
        self.entries.iter().map(|(ts, value)| (*ts, value))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.entries.values()
    }

    pub fn first_timestamp(&self) -> Option<Timestamp> {
        self.entries.keys().next().copied()
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.entries.keys().next_back().copied()
    }
}

impl<T> Default for TimedChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(Timestamp, T)> for TimedChannel<T> {
    fn from_iter<I: IntoIterator<Item = (Timestamp, T)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for TimedChannel<T> {
    type Item = (Timestamp, T);
    type IntoIter = btree_map::IntoIter<Timestamp, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
