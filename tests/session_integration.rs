//! Recording sessions end to end: interleaved streams, flush and the capture loop

use handpose_core::acquisition::{ChannelKind, Recorder, RecorderCommand, RecordingSession, SessionWriter};
use handpose_core::config::SystemConfig;
use handpose_core::hal::simulator::synthesize;
use handpose_core::hal::{
    Palm, Quat, SimulatedHand, SimulatedRenderer, SimulatedWatch, TelemetrySample, TelemetryTag, Vec3,
    VideoFrame,
};
use handpose_core::pose::{ClassificationResult, LibraryStore, PoseLabel, PoseLibrary, PoseVector, ReferencePose};
use handpose_core::telemetry::TelemetryRouter;
use handpose_core::{TimeProvider, Timestamp};
use proptest::prelude::*;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::Instant;

fn named(name: &str) -> ClassificationResult {
    ClassificationResult {
        label: PoseLabel::Named(name.to_string()),
        similarity: 0.97,
    }
}

fn data_lines(path: &std::path::Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(str::to_string)
        .collect()
}

#[test]
fn interleaved_streams_flush_every_row() {
    let dir = TempDir::new().unwrap();
    let router = TelemetryRouter::new(256);
    let inlet = router.inlet();
    let mut session = RecordingSession::new(30, "Pose.Resting");

    session.start(1_000).unwrap();
    let poses = 40;
    let mut accel_rows = 0;
    for i in 0..poses {
        let ts = 1_000 + i * 10;
        let label = if i % 2 == 0 { "Fist" } else { "Flat" };
        assert!(session.record_pose(ts, &named(label)));
        session.offer_frame(ts, VideoFrame::blank(4, 2));

        if i % 4 == 0 {
            let message = SimulatedWatch::encode_message(
                TelemetryTag::Accel,
                &[(ts + 1, [0.1, 0.2, 9.8]), (ts + 2, [0.1, 0.2, 9.7])],
            );
            accel_rows += inlet.deliver(message.as_bytes());
            router.drain_into(&mut session);
        }
        if i == 20 {
            session.set_manual_label("Pose.Fist");
        }
    }
    // Malformed parts are dropped without affecting the rest
    inlet.deliver(b"G_2000,1,2,3;oops;2001,4,5");
    router.drain_into(&mut session);

    let recording = session.stop(1_500).unwrap();
    let report = SessionWriter::new(dir.path()).flush(&recording);

    assert!(report.is_complete());
    assert_eq!(report.rows(ChannelKind::Poses), Some(poses as usize));
    assert_eq!(report.rows(ChannelKind::ManualLabels), Some(poses as usize));
    assert_eq!(report.rows(ChannelKind::Accel), Some(accel_rows));
    assert_eq!(report.rows(ChannelKind::Gyro), Some(1));
    assert_eq!(report.rows(ChannelKind::Ppg), Some(0));

    let pose_rows = data_lines(&report.directory.join("poses.csv"));
    assert_eq!(pose_rows.len(), poses as usize);
    assert_eq!(pose_rows[0], "1000,Pose.Fist");
    assert_eq!(pose_rows[1], "1010,Pose.Flat");

    let manual = data_lines(&report.directory.join("manual_poses.csv"));
    assert_eq!(manual[0], "1000,Pose.Resting");
    assert_eq!(manual.last().map(String::as_str), Some("1390,Pose.Fist"));

    let accel = fs::read_to_string(report.directory.join("acc.csv")).unwrap();
    assert!(accel.starts_with("Timestamp,Acc X,Acc Y,Acc Z\n1001,"));
    assert_eq!(data_lines(&report.directory.join("gyro.csv")), vec!["2000,1,2,3"]);
}

#[derive(Debug, Clone)]
enum Append {
    Pose(i64),
    Telemetry(TelemetryTag, i64),
}

/// Poses and tagged telemetry with distinct timestamps per channel, in shuffled order
fn appends() -> impl Strategy<Value = Vec<Append>> {
    (0i64..40, prop::collection::vec(0usize..3, 0..60)).prop_flat_map(|(poses, tags)| {
        let mut events: Vec<Append> = (0..poses).map(|i| Append::Pose(1_000 + i * 10)).collect();
        events.extend(
            tags.iter()
                .enumerate()
                .map(|(i, tag)| Append::Telemetry(TelemetryTag::ALL[*tag], 1_000 + i as i64 * 3)),
        );
        Just(events).prop_shuffle()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn row_counts_hold_for_any_interleaving(events in appends()) {
        let dir = TempDir::new().unwrap();
        let mut session = RecordingSession::new(30, "Pose.Resting");
        session.start(500).unwrap();

        let mut expected_poses = 0;
        let mut expected_telemetry = [0usize; 3];
        for event in &events {
            match *event {
                Append::Pose(ts) => {
                    prop_assert!(session.record_pose(ts, &named("Fist")));
                    expected_poses += 1;
                }
                Append::Telemetry(tag, ts) => {
                    let sample = TelemetrySample { timestamp: ts, tag, values: [1.0, 2.0, 3.0] };
                    prop_assert!(session.record_telemetry(sample));
                    expected_telemetry[tag as usize] += 1;
                }
            }
        }

        let recording = session.stop(5_000).unwrap();
        let report = SessionWriter::new(dir.path()).flush(&recording);
        prop_assert!(report.is_complete());
        prop_assert_eq!(report.rows(ChannelKind::Poses), Some(expected_poses));
        prop_assert_eq!(report.rows(ChannelKind::ManualLabels), Some(expected_poses));
        prop_assert_eq!(report.rows(ChannelKind::Accel), Some(expected_telemetry[0]));
        prop_assert_eq!(report.rows(ChannelKind::Gyro), Some(expected_telemetry[1]));
        prop_assert_eq!(report.rows(ChannelKind::Ppg), Some(expected_telemetry[2]));

        let pose_rows = data_lines(&report.directory.join("poses.csv"));
        prop_assert_eq!(pose_rows.len(), expected_poses);
        let timestamps: Vec<i64> = pose_rows
            .iter()
            .filter_map(|row| row.split(',').next())
            .filter_map(|ts| ts.parse().ok())
            .collect();
        prop_assert!(timestamps.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn appends_outside_a_recording_are_ignored() {
    let mut session = RecordingSession::new(30, "Pose.Resting");
    assert!(!session.record_pose(5, &named("Fist")));
    assert!(session.stop(6).is_err());

    session.start(10).unwrap();
    assert!(session.start(11).is_err());
    assert!(session.record_pose(12, &named("Fist")));
    let recording = session.stop(13).unwrap();
    assert_eq!(recording.poses.len(), 1);
    assert!(!session.record_pose(14, &named("Fist")));
}

#[test]
fn failing_channel_does_not_block_others() {
    let dir = TempDir::new().unwrap();
    let mut session = RecordingSession::new(30, "Pose.Resting");
    session.start(42).unwrap();
    session.record_pose(43, &named("Fist"));
    let recording = session.stop(44).unwrap();

    let writer = SessionWriter::new(dir.path());
    fs::create_dir_all(writer.session_dir(&recording).join("poses.csv")).unwrap();
    let report = writer.flush(&recording);

    assert!(report.failed(ChannelKind::Poses));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.rows(ChannelKind::ManualLabels), Some(1));
    assert!(report.directory.join("manual_poses.csv").is_file());
}

fn library() -> PoseLibrary {
    let mut flat = [0.0f32; 45];
    let mut curled = [0.0f32; 45];
    for (a, b) in flat.chunks_mut(3).zip(curled.chunks_mut(3)) {
        a.copy_from_slice(&[0.0, 0.0, 1.0]);
        b.copy_from_slice(&[0.0, -0.8, 0.6]);
    }
    PoseLibrary::empty()
        .with_pose("Flat", ReferencePose::from_vector(PoseVector::new(flat)))
        .and_then(|library| library.with_pose("Fist", ReferencePose::from_vector(PoseVector::new(curled))))
        .unwrap()
}

#[test]
fn simulated_hand_matches_its_reference() {
    let library = library();
    let palm = Palm::from_orientation(Vec3::new(0.0, 200.0, 0.0), Quat::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), 0.4));
    let sample = synthesize(library.get("Fist").unwrap(), palm);
    let descriptor = handpose_core::pose::vectorize(&sample).unwrap();
    let result = handpose_core::PoseClassifier::default()
        .classify(&descriptor.vector, &library)
        .unwrap();
    assert_eq!(result.label, PoseLabel::Named("Fist".into()));
}

/// Epoch clock driven by tokio's paused test clock
struct PausedClock {
    origin: Instant,
}

impl TimeProvider for PausedClock {
    fn now_millis(&self) -> Timestamp {
        1_700_000_000_000 + self.origin.elapsed().as_millis() as Timestamp
    }
}

#[tokio::test(start_paused = true)]
async fn recorder_writes_all_streams_from_simulators() {
    let dir = TempDir::new().unwrap();
    let clock: Arc<dyn TimeProvider> = Arc::new(PausedClock { origin: Instant::now() });
    let mut config = SystemConfig::default();
    config.recording.output_dir = dir.path().to_path_buf();
    config.recording.target_fps = 50;
    config.recording.connect_timeout_ms = 1_000;
    config.recording.control_timeout_ms = 200;

    let library = library();
    let hand = SimulatedHand::new(&library, 200).with_hold_frames(5).with_seed(7);
    let watch = SimulatedWatch::new()
        .with_connect_delay(Duration::from_millis(5))
        .with_rate(Duration::from_millis(4), 3)
        .with_time_provider(Arc::clone(&clock));
    let recorder = Recorder::new(hand, LibraryStore::new(library), &config)
        .with_time_provider(clock)
        .with_connector(Arc::new(watch.clone()))
        .with_renderer(Box::new(SimulatedRenderer::new(16, 8)));
    let session = recorder.session();

    let (tx, rx) = mpsc::channel(8);
    let running = tokio::spawn(recorder.run(rx));
    tx.send(RecorderCommand::ConnectTelemetry).await.unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    tx.send(RecorderCommand::SetManualLabel("Pose.Fist".into())).await.unwrap();
    tx.send(RecorderCommand::Start).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(session.is_active());
    tx.send(RecorderCommand::Shutdown).await.unwrap();

    let summary = running.await.unwrap().unwrap();
    assert_eq!(summary.recordings.len(), 1);
    let report = &summary.recordings[0];
    assert!(report.is_complete());
    for kind in [ChannelKind::Poses, ChannelKind::ManualLabels, ChannelKind::Accel, ChannelKind::Video] {
        assert!(report.rows(kind).unwrap() > 0, "{} is empty", kind);
    }
    assert_eq!(report.rows(ChannelKind::Poses), report.rows(ChannelKind::ManualLabels));
    assert!(report.rows(ChannelKind::Video).unwrap() <= report.rows(ChannelKind::Poses).unwrap());

    let labels = data_lines(&report.directory.join("poses.csv"));
    assert!(labels.iter().all(|line| line.ends_with(",Pose.Flat") || line.ends_with(",Pose.Fist")));
    assert!(!session.is_active());
}
