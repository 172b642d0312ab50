//! Offline post-processing of a flushed recording

use handpose_core::acquisition::{RecordingSession, SessionWriter};
use handpose_core::hal::{TelemetrySample, TelemetryTag};
use handpose_core::offline::annotation::write_csv;
use handpose_core::offline::{
    align, collapse_segments, compare_labels, merge_files, preprocess_file, read_labels, read_table,
    AnnotationExporter, GestureClassMap, LabeledSample, SegmentSmoother,
};
use handpose_core::pose::{ClassificationResult, PoseLabel};
use handpose_core::TimedChannel;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn result(label: Option<&str>) -> ClassificationResult {
    ClassificationResult {
        label: label.map_or(PoseLabel::Unknown, |name| PoseLabel::Named(name.to_string())),
        similarity: 0.95,
    }
}

/// 6 s at 100 Hz: resting, a fist from 2.0 s to 3.0 s with noise, resting again
fn record(dir: &TempDir) -> PathBuf {
    let mut session = RecordingSession::new(30, "Pose.Resting");
    session.start(10_000).unwrap();
    for i in 0..600i64 {
        let ts = 10_000 + i * 10;
        let label = match i {
            200..=300 if i % 17 == 0 => None,
            200..=300 => Some("Fist"),
            _ if i % 23 == 0 => Some("Pinch"),
            _ => Some("Resting"),
        };
        session.record_pose(ts, &result(label));
        if i % 2 == 0 {
            session.record_telemetry(TelemetrySample {
                timestamp: ts + 5,
                tag: TelemetryTag::Accel,
                values: [i as f32, 0.0, 1.0],
            });
        }
    }
    let recording = session.stop(16_000).unwrap();
    let report = SessionWriter::new(dir.path()).flush(&recording);
    assert!(report.is_complete());
    report.directory
}

#[test]
fn smoothing_and_annotation_of_a_recording() {
    let dir = TempDir::new().unwrap();
    let recording = record(&dir);

    let smoothed_path = preprocess_file(recording.join("poses.csv"), &SegmentSmoother::default()).unwrap();
    let smoothed = read_labels(&smoothed_path).unwrap();

    let segments = collapse_segments(&smoothed);
    let labels: Vec<&str> = segments.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, vec!["Pose.Resting", "Pose.Fist", "Pose.Resting"]);
    // Sample 200 ties with the resting samples before it, so the vote starts at 201
    // and extension reaches 25 samples further back
    assert_eq!(segments[1].first, 10_000 + 176 * 10);
    assert_eq!(segments[1].last, 10_000 + 300 * 10);

    let annotations = AnnotationExporter::default()
        .export(&smoothed, recording.join("action_annotations.json"))
        .unwrap();
    assert_eq!(annotations.len(), 3);
    assert_eq!(annotations[1].action, 1);
    assert!(annotations.windows(2).all(|w| w[0].end == w[1].start));
    assert_eq!(annotations[0].start, 0.0);
    assert!((annotations[1].start - 1.7).abs() < 1e-9);

    let csv_path = recording.join("annotations.csv");
    write_csv(&csv_path, &annotations).unwrap();
    assert_eq!(fs::read_to_string(&csv_path).unwrap().lines().count(), 4);
}

#[test]
fn merged_file_forward_fills_sensor_columns() {
    let dir = TempDir::new().unwrap();
    let recording = record(&dir);
    let merged = dir.path().join("merged.csv");

    let summary = merge_files(
        recording.join("poses.csv"),
        &[recording.join("acc.csv")],
        &merged,
        &GestureClassMap::default(),
    )
    .unwrap();
    assert_eq!(summary.columns, vec!["Timestamp", "Pose", "Gesture", "Acc X", "Acc Y", "Acc Z"]);
    assert_eq!(summary.rows, 900);

    let table = read_table(&merged).unwrap();
    let first = table.rows.get(10_000).unwrap();
    assert_eq!((first[0].as_str(), first[1].as_str()), ("Pose.Pinch", "0"));
    assert_eq!(&first[2..], &["", "", ""]);
    // Pose row at 10 ms picks up the accel sample from 5 ms
    let later = table.rows.get(10_010).unwrap();
    assert_eq!(later[2], "0");
    let fist = table.rows.get(12_010).unwrap();
    assert_eq!((fist[0].as_str(), fist[1].as_str()), ("Pose.Fist", "1"));
}

#[test]
fn smoothed_labels_score_against_raw_labels() {
    let dir = TempDir::new().unwrap();
    let recording = record(&dir);
    let raw = read_labels(recording.join("poses.csv")).unwrap();
    let smoothed = SegmentSmoother::default().smooth(&raw);

    let report = compare_labels(&smoothed, &raw).unwrap();
    assert_eq!(report.matched, smoothed.len());
    assert!(report.accuracy > 0.85 && report.accuracy < 1.0);
    assert!(report.labels.contains(&"Pose.Unknown".to_string()));
    assert_eq!(report.class("Pose.Pinch").map(|c| c.support), Some(0));
}

#[test]
fn aligner_matches_documented_example() {
    let x: TimedChannel<String> = [(0, "a".to_string()), (10, "b".to_string())].into_iter().collect();
    let y: TimedChannel<String> = [(5, "1.0".to_string())].into_iter().collect();
    let table = align(&x, &[&y]);

    let rows: Vec<(i64, Vec<Option<&str>>)> = table
        .rows()
        .iter()
        .map(|row| (row.timestamp, row.cells.iter().map(|c| c.as_deref()).collect()))
        .collect();
    assert_eq!(
        rows,
        vec![
            (0, vec![Some("a"), None]),
            (5, vec![Some("a"), Some("1.0")]),
            (10, vec![Some("b"), Some("1.0")]),
        ]
    );
}

#[test]
fn label_files_round_trip_through_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("labels.csv");
    let samples = vec![LabeledSample::new(3, "Pose.Flat"), LabeledSample::new(1, "Pose.Fist")];
    handpose_core::offline::write_labels(&path, &samples).unwrap();
    assert_eq!(read_labels(&path).unwrap(), samples);
}
