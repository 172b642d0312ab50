// src/offline/io.rs
//! CSV input and output for the offline tools

use crate::acquisition::channel::TimedChannel;
use crate::config::constants::recording::{POSE_COLUMN, TIMESTAMP_COLUMN};
use crate::error::OfflineError;
use crate::utils::time::Timestamp;
use csv::StringRecord;
use std::path::Path;
use tracing::debug;

/// One row of a per-timestamp label file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledSample {
    pub timestamp: Timestamp,
    pub label: String,
}

impl LabeledSample {
    pub fn new(timestamp: Timestamp, label: impl Into<String>) -> Self {
        Self {
            timestamp,
            label: label.into(),
        }
    }
}

/// A timestamped CSV file: the non-timestamp columns and their rows
#[derive(Debug, Clone, PartialEq)]
pub struct TimedTable {
    pub columns: Vec<String>,
    pub rows: TimedChannel<Vec<String>>,
}

fn open_reader(path: &Path) -> Result<(csv::Reader<std::fs::File>, StringRecord), OfflineError> {
    let mut reader = csv::Reader::from_path(path).map_err(|source| OfflineError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    let headers = reader
        .headers()
        .map_err(|source| OfflineError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    Ok((reader, headers))
}

fn column_index(path: &Path, headers: &StringRecord, column: &str) -> Result<usize, OfflineError> {
    headers
        .iter()
        .position(|header| header.trim() == column)
        .ok_or_else(|| OfflineError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        })
}

fn parse_timestamp(path: &Path, record: &StringRecord, index: usize) -> Result<Timestamp, OfflineError> {
    let raw = record.get(index).unwrap_or("").trim();
    // Aligned files written by other tools may carry a fractional part
    raw.parse::<Timestamp>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|v| v.fract() == 0.0).map(|v| v as Timestamp))
        .ok_or_else(|| OfflineError::InvalidTimestamp {
            path: path.to_path_buf(),
            line: record.position().map_or(0, |p| p.line()),
            value: raw.to_string(),
        })
}

/// Read a `Timestamp,Pose` file in file order
pub fn read_labels<P: AsRef<Path>>(path: P) -> Result<Vec<LabeledSample>, OfflineError> {
    let path = path.as_ref();
    let (mut reader, headers) = open_reader(path)?;
    let ts_index = column_index(path, &headers, TIMESTAMP_COLUMN)?;
    let label_index = column_index(path, &headers, POSE_COLUMN)?;

    let mut samples = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| OfflineError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        samples.push(LabeledSample {
            timestamp: parse_timestamp(path, &record, ts_index)?,
            label: record.get(label_index).unwrap_or("").to_string(),
        });
    }

    debug!(path = %path.display(), rows = samples.len(), "read label file");
    Ok(samples)
}

pub fn write_labels<P: AsRef<Path>>(path: P, samples: &[LabeledSample]) -> Result<(), OfflineError> {
    let path = path.as_ref();
    let csv_error = |source: csv::Error| OfflineError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    writer
        .write_record([TIMESTAMP_COLUMN, POSE_COLUMN])
        .map_err(csv_error)?;
    for sample in samples {
        writer
            .write_record([sample.timestamp.to_string().as_str(), sample.label.as_str()])
            .map_err(csv_error)?;
    }
    writer.flush().map_err(|source| OfflineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read any CSV with a `Timestamp` column; duplicate timestamps keep the last row
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<TimedTable, OfflineError> {
    let path = path.as_ref();
    let (mut reader, headers) = open_reader(path)?;
    let ts_index = column_index(path, &headers, TIMESTAMP_COLUMN)?;

    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != ts_index)
        .map(|(_, header)| header.trim().to_string())
        .collect();

    let mut rows = TimedChannel::new();
    for record in reader.records() {
        let record = record.map_err(|source| OfflineError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let timestamp = parse_timestamp(path, &record, ts_index)?;
        let values = record
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != ts_index)
            .map(|(_, value)| value.to_string())
            .collect();
        rows.insert(timestamp, values);
    }

    debug!(path = %path.display(), rows = rows.len(), columns = columns.len(), "read table");
    Ok(TimedTable { columns, rows })
}

pub(crate) fn write_records<P, I>(path: P, header: Vec<String>, rows: I) -> Result<(), OfflineError>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = Vec<String>>,
{
    let path = path.as_ref();
    let csv_error = |source: csv::Error| OfflineError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    writer.write_record(&header).map_err(csv_error)?;
    for row in rows {
        writer.write_record(&row).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| OfflineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_read_labels_in_file_order() {
        let file = csv_file("Timestamp,Pose\n10,Pose.Fist\n20,Pose.Resting\n");
        let samples = read_labels(file.path()).unwrap();
        assert_eq!(
            samples,
            vec![LabeledSample::new(10, "Pose.Fist"), LabeledSample::new(20, "Pose.Resting")]
        );
    }

    #[test]
    fn test_missing_column_is_reported() {
        let file = csv_file("Time,Pose\n10,Pose.Fist\n");
        match read_labels(file.path()) {
            Err(OfflineError::MissingColumn { column, .. }) => assert_eq!(column, "Timestamp"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_timestamp_reports_line() {
        let file = csv_file("Timestamp,Pose\n10,Pose.Fist\nsoon,Pose.Fist\n");
        match read_labels(file.path()) {
            Err(OfflineError::InvalidTimestamp { line, value, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_fractional_zero_timestamps_accepted() {
        let file = csv_file("Timestamp,Pose\n10.0,Pose.Fist\n");
        assert_eq!(read_labels(file.path()).unwrap()[0].timestamp, 10);
    }

    #[test]
    fn test_read_table_keeps_value_columns() {
        let file = csv_file("Acc X,Timestamp,Acc Y\n1.5,10,2.5\n3.5,5,4.5\n");
        let table = read_table(file.path()).unwrap();

        assert_eq!(table.columns, vec!["Acc X", "Acc Y"]);
        assert_eq!(table.rows.first_timestamp(), Some(5));
        assert_eq!(table.rows.get(10), Some(&vec!["1.5".to_string(), "2.5".to_string()]));
    }

    #[test]
    fn test_write_then_read_labels() {
        let file = NamedTempFile::new().unwrap();
        let samples = vec![LabeledSample::new(1, "Pose.Pinch"), LabeledSample::new(2, "Pose.Fist")];
        write_labels(file.path(), &samples).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.starts_with("Timestamp,Pose\n1,Pose.Pinch\n"));
        assert_eq!(read_labels(file.path()).unwrap(), samples);
    }
}
