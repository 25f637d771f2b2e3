use rollcall_core::DetectorSettings;
use std::path::PathBuf;

/// Runtime configuration, loaded from `ROLLCALL_*` environment variables.
pub struct Config {
    /// Camera index; the capture device is `/dev/video{index}`.
    pub camera_index: u32,
    /// Requested frame geometry (the driver may negotiate differently).
    pub frame_width: u32,
    pub frame_height: u32,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Path to the SeetaFace detection model file.
    pub model_path: PathBuf,
    /// Detection sensitivity parameters.
    pub detector: DetectorSettings,
    /// Minimum correlation for a positive identification.
    pub match_threshold: f32,
    /// Edge length of the square comparison canvas.
    pub canvas_size: u32,
    /// Frames discarded after stream start (camera AGC/AE settling).
    pub warmup_frames: usize,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        let db_path = std::env::var("ROLLCALL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("attendance.db"));

        let model_path = std::env::var("ROLLCALL_DETECTOR_MODEL")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                rollcall_core::default_model_dir().join("seeta_fd_frontal_v1.0.bin")
            });

        Self {
            camera_index: env_u32("ROLLCALL_CAMERA_INDEX", 0),
            frame_width: env_u32("ROLLCALL_FRAME_WIDTH", 640),
            frame_height: env_u32("ROLLCALL_FRAME_HEIGHT", 480),
            db_path,
            model_path,
            detector: DetectorSettings {
                scale_factor: env_f32("ROLLCALL_SCALE_FACTOR", 1.1),
                min_neighbors: env_u32("ROLLCALL_MIN_NEIGHBORS", 5),
                min_face_size: env_u32("ROLLCALL_MIN_FACE_SIZE", 30),
            },
            match_threshold: env_f32("ROLLCALL_MATCH_THRESHOLD", 0.6),
            canvas_size: env_u32("ROLLCALL_CANVAS_SIZE", 100),
            warmup_frames: env_usize("ROLLCALL_WARMUP_FRAMES", 4),
        }
    }

    /// Detection model path as a string, for the detector loader.
    pub fn detector_model_path(&self) -> String {
        self.model_path.to_string_lossy().into_owned()
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
