// src/config/constants.rs
//! System-wide configuration constants

/// Pose vector layout and classification
pub mod pose {
    pub const FINGER_COUNT: usize = 5;
    pub const SEGMENTS_PER_FINGER: usize = 3;
    pub const AXES: usize = 3;
    pub const POSE_VECTOR_LEN: usize = FINGER_COUNT * SEGMENTS_PER_FINGER * AXES;

    pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.9;
    pub const MIN_SIMILARITY_THRESHOLD: f32 = -1.0;
    pub const MAX_SIMILARITY_THRESHOLD: f32 = 1.0;
}

/// Label vocabulary shared by recordings and offline tools
pub mod labels {
    pub const LABEL_NAMESPACE: &str = "Pose";
    pub const UNKNOWN_NAME: &str = "Unknown";
    pub const RESTING_NAME: &str = "Resting";
    pub const DEFAULT_UNKNOWN_LABEL: &str = "Pose.Unknown";
    pub const DEFAULT_RESTING_LABEL: &str = "Pose.Resting";
}

/// Recording session constants
pub mod recording {
    pub const DEFAULT_OUTPUT_DIR: &str = "recordings";
    pub const DEFAULT_TARGET_FPS: u32 = 30;
    pub const MAX_TARGET_FPS: u32 = 240;
    pub const DEFAULT_FRAME_WIDTH: u32 = 1500;
    pub const DEFAULT_FRAME_HEIGHT: u32 = 600;
    pub const DEFAULT_CONTROL_TIMEOUT_MS: u64 = 2000;
    pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 15000;

    pub const VIDEO_FILE: &str = "recording.rgb";
    pub const ACCEL_FILE: &str = "acc.csv";
    pub const GYRO_FILE: &str = "gyro.csv";
    pub const PPG_FILE: &str = "ppg.csv";
    pub const POSES_FILE: &str = "poses.csv";
    pub const MANUAL_POSES_FILE: &str = "manual_poses.csv";

    pub const TIMESTAMP_COLUMN: &str = "Timestamp";
    pub const POSE_COLUMN: &str = "Pose";
    pub const ACCEL_COLUMNS: [&str; 3] = ["Acc X", "Acc Y", "Acc Z"];
    pub const GYRO_COLUMNS: [&str; 3] = ["Gyro X", "Gyro Y", "Gyro Z"];
    pub const PPG_COLUMNS: [&str; 3] = ["PPG Green", "PPG IR", "PPG Red"];
}

/// Telemetry delivery constants
pub mod telemetry {
    pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;
    pub const MIN_QUEUE_CAPACITY: usize = 16;
    pub const MESSAGE_SEPARATOR: char = '_';
    pub const TUPLE_SEPARATOR: char = ';';
    pub const FIELD_SEPARATOR: char = ',';
    pub const VALUES_PER_TUPLE: usize = 3;
}

/// Offline smoothing constants
pub mod smoothing {
    pub const DEFAULT_WINDOW_MS: i64 = 100;
    pub const DEFAULT_PRE_TRANSITION_SAMPLES: usize = 25;
}

/// Action annotation constants
pub mod annotation {
    pub const DEFAULT_OBJECT_ID: u32 = 0;
    pub const ANNOTATIONS_CSV: &str = "action_annotations.csv";
    pub const GESTURE_COLUMN: &str = "Gesture";
    pub const UNMAPPED_GESTURE_CODE: &str = "99";
}

/// Configuration file locations
pub mod paths {
    pub const SYSTEM_CONFIG_PATH: &str = "/etc/handpose/config.toml";
    pub const USER_CONFIG_DIR: &str = ".config/handpose";
    pub const DEFAULT_CONFIG_FILE: &str = "config/default.toml";
    pub const LOCAL_CONFIG_FILE: &str = "handpose.toml";
    pub const ENV_PREFIX: &str = "HANDPOSE_";
}
