// src/offline/aligner.rs
//! Outer-join of independently timestamped channels with forward fill

use crate::acquisition::channel::TimedChannel;
use crate::config::constants::annotation::{GESTURE_COLUMN, UNMAPPED_GESTURE_CODE};
use crate::config::constants::recording::{POSE_COLUMN, TIMESTAMP_COLUMN};
use crate::error::OfflineError;
use crate::offline::io::{read_table, write_records, TimedTable};
use crate::utils::time::Timestamp;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};

/// One timestamp of the merged timeline, one cell per channel
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow<V> {
    pub timestamp: Timestamp,
    pub cells: Vec<Option<V>>,
}

/// Merged timeline; cell `i` of each row belongs to input channel `i`
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedTable<V> {
    channel_count: usize,
    rows: Vec<AlignedRow<V>>,
}

impl<V> AlignedTable<V> {
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn rows(&self) -> &[AlignedRow<V>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.rows.iter().map(|row| row.timestamp)
    }

    pub fn row_at(&self, timestamp: Timestamp) -> Option<&AlignedRow<V>> {
        self.rows
            .binary_search_by_key(&timestamp, |row| row.timestamp)
            .ok()
            .map(|index| &self.rows[index])
    }

    pub fn into_rows(self) -> Vec<AlignedRow<V>> {
        self.rows
    }
}

/// Merge `primary` and `secondaries` onto the union of their timestamps.
///
/// Each channel's cell carries its most recent value at or before the row's
/// timestamp, or `None` before the channel's first sample.
pub fn align<V: Clone>(primary: &TimedChannel<V>, secondaries: &[&TimedChannel<V>]) -> AlignedTable<V> {
    let channels: Vec<&TimedChannel<V>> = std::iter::once(primary)
        .chain(secondaries.iter().copied())
        .collect();

    let timeline: BTreeSet<Timestamp> = channels
        .iter()
        .flat_map(|channel| channel.iter().map(|(ts, _)| ts))
        .collect();

    let mut cursors: Vec<_> = channels.iter().map(|channel| channel.iter().peekable()).collect();
    let mut current: Vec<Option<V>> = vec![None; channels.len()];
    let mut rows = Vec::with_capacity(timeline.len());

    for timestamp in timeline {
        for (cursor, cell) in cursors.iter_mut().zip(current.iter_mut()) {
            while let Some((_, value)) = cursor.next_if(|(ts, _)| *ts <= timestamp) {
                *cell = Some(value.clone());
            }
        }
        rows.push(AlignedRow {
            timestamp,
            cells: current.clone(),
        });
    }

    debug!(channels = channels.len(), rows = rows.len(), "aligned channels");
    AlignedTable {
        channel_count: channels.len(),
        rows,
    }
}

/// Pose label to numeric gesture class used by the training data sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GestureClassMap {
    codes: HashMap<String, String>,
    fallback: String,
}

impl GestureClassMap {
    pub fn new() -> Self {
        Self {
            codes: HashMap::new(),
            fallback: UNMAPPED_GESTURE_CODE.to_string(),
        }
    }

    pub fn with_class(mut self, label: impl Into<String>, code: impl Into<String>) -> Self {
        self.codes.insert(label.into(), code.into());
        self
    }

    /// Code for `label`; unmapped labels get the fallback code
    pub fn code(&self, label: &str) -> &str {
        match self.codes.get(label) {
            Some(code) => code,
            None => {
                debug!(label, code = %self.fallback, "unmapped gesture label");
                &self.fallback
            }
        }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Default for GestureClassMap {
    fn default() -> Self {
        [
            ("Pose.Pinch", "0"),
            ("Pose.Fist", "1"),
            ("Pose.Flat", "2"),
            ("Pose.IndexTap", "3"),
            ("Pose.AllFingerTap", "4"),
            ("Pose.WristFlickUp", "5"),
            ("Pose.WristFlickDown", "6"),
            ("Pose.WristFlickIn", "7"),
            ("Pose.WristFlickOut", "8"),
            ("Pose.PinkyPinch", "9"),
            ("Pose.Resting", "98"),
            ("Pose.Unknown", "99"),
            ("", "99"),
        ]
        .into_iter()
        .fold(Self::new(), |map, (label, code)| map.with_class(label, code))
    }
}

/// Outcome of a file-level merge
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSummary {
    pub columns: Vec<String>,
    pub rows: usize,
}

/// Append a gesture column derived from the `Pose` column
fn with_gesture_column(path: &Path, mut table: TimedTable, classes: &GestureClassMap) -> Result<TimedTable, OfflineError> {
    let pose_index = table
        .columns
        .iter()
        .position(|column| column == POSE_COLUMN)
        .ok_or_else(|| OfflineError::MissingColumn {
            path: path.to_path_buf(),
            column: POSE_COLUMN.to_string(),
        })?;

    let rows = table
        .rows
        .take()
        .into_iter()
        .map(|(ts, mut values)| {
            let code = classes.code(values.get(pose_index).map_or("", String::as_str)).to_string();
            values.push(code);
            (ts, values)
        })
        .collect();

    table.rows = rows;
    table.columns.push(GESTURE_COLUMN.to_string());
    Ok(table)
}

/// Merge a pose label file and sensor files into one forward-filled CSV.
///
/// Columns are `Timestamp`, the label file's columns plus `Gesture`, then each
/// sensor file's columns in argument order. Cells before a file's first row stay empty.
pub fn merge_files<P, Q, R>(
    labels_path: P,
    sensor_paths: &[Q],
    output_path: R,
    classes: &GestureClassMap,
) -> Result<MergeSummary, OfflineError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
{
    let labels_path = labels_path.as_ref();
    let primary = with_gesture_column(labels_path, read_table(labels_path)?, classes)?;
    let sensors = sensor_paths
        .iter()
        .map(read_table)
        .collect::<Result<Vec<_>, _>>()?;

    let widths: Vec<usize> = std::iter::once(&primary)
        .chain(sensors.iter())
        .map(|table| table.columns.len())
        .collect();
    let columns: Vec<String> = std::iter::once(TIMESTAMP_COLUMN.to_string())
        .chain(primary.columns.iter().cloned())
        .chain(sensors.iter().flat_map(|table| table.columns.iter().cloned()))
        .collect();

    let secondary_rows: Vec<&TimedChannel<Vec<String>>> = sensors.iter().map(|table| &table.rows).collect();
    let table = align(&primary.rows, &secondary_rows);
    let row_count = table.len();

    let records = table.into_rows().into_iter().map(|row| {
        let mut record = Vec::with_capacity(columns.len());
        record.push(row.timestamp.to_string());
        for (cell, width) in row.cells.into_iter().zip(widths.iter()) {
            match cell {
                Some(values) => record.extend(values),
                None => record.extend(std::iter::repeat(String::new()).take(*width)),
            }
        }
        record
    });
    write_records(output_path.as_ref(), columns.clone(), records)?;

    info!(
        output = %output_path.as_ref().display(),
        rows = row_count,
        sensors = sensor_paths.len(),
        "merged label and sensor files"
    );
    Ok(MergeSummary {
        columns,
        rows: row_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn channel(entries: &[(Timestamp, &str)]) -> TimedChannel<String> {
        entries.iter().map(|(ts, v)| (*ts, v.to_string())).collect()
    }

    #[test]
    fn test_forward_fill_across_channels() {
        let x = channel(&[(0, "a"), (10, "b")]);
        let y = channel(&[(5, "1.0")]);
        let table = align(&x, &[&y]);

        assert_eq!(table.timestamps().collect::<Vec<_>>(), vec![0, 5, 10]);
        assert_eq!(table.row_at(0).unwrap().cells, vec![Some("a".to_string()), None]);
        assert_eq!(
            table.row_at(5).unwrap().cells,
            vec![Some("a".to_string()), Some("1.0".to_string())]
        );
        assert_eq!(
            table.row_at(10).unwrap().cells,
            vec![Some("b".to_string()), Some("1.0".to_string())]
        );
    }

    #[test]
    fn test_duplicate_timestamps_collapse() {
        let mut x = TimedChannel::new();
        x.insert(3, 1.0_f32);
        x.insert(3, 2.0_f32);
        let table = align(&x, &[]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].cells, vec![Some(2.0)]);
    }

    #[test]
    fn test_empty_primary_still_includes_secondary_rows() {
        let x: TimedChannel<String> = TimedChannel::new();
        let y = channel(&[(1, "p"), (2, "q")]);
        let table = align(&x, &[&y]);
        assert_eq!(table.channel_count(), 2);
        assert_eq!(table.rows()[1].cells, vec![None, Some("q".to_string())]);
    }

    #[test]
    fn test_gesture_codes() {
        let classes = GestureClassMap::default();
        assert_eq!(classes.code("Pose.Fist"), "1");
        assert_eq!(classes.code("Pose.Resting"), "98");
        assert_eq!(classes.code(""), "99");
        assert_eq!(classes.code("Pose.Wave"), "99");
    }

    #[test]
    fn test_merge_files_layout() {
        let dir = TempDir::new().unwrap();
        let labels = dir.path().join("poses.csv");
        let accel = dir.path().join("acc.csv");
        let out = dir.path().join("merged.csv");
        std::fs::write(&labels, "Timestamp,Pose\n0,Pose.Fist\n10,Pose.Flat\n").unwrap();
        std::fs::write(&accel, "Timestamp,Acc X,Acc Y,Acc Z\n5,1,2,3\n").unwrap();

        let summary = merge_files(&labels, &[&accel], &out, &GestureClassMap::default()).unwrap();
        assert_eq!(summary.rows, 3);

        let content = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Timestamp,Pose,Gesture,Acc X,Acc Y,Acc Z");
        assert_eq!(lines[1], "0,Pose.Fist,1,,,");
        assert_eq!(lines[2], "5,Pose.Fist,1,1,2,3");
        assert_eq!(lines[3], "10,Pose.Flat,2,1,2,3");
    }
}
