//! rollcall-core — reference gallery and frame-to-identity matching.
//!
//! Builds one canonical face template per enrolled identity from its
//! enrollment photo and scores live face crops against the whole gallery
//! with zero-mean normalized cross-correlation.

pub mod detector;
pub mod gallery;
pub mod imageops;
pub mod types;

pub use detector::{DetectorError, DetectorSettings, FaceDetector, SeetaDetector};
pub use gallery::Gallery;
pub use types::{
    CorrelationMatcher, Enrollment, FaceBox, FaceTemplate, MatchResult, Matcher, ReferenceEntry,
};

use std::path::PathBuf;

/// Default directory for the detection model file.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall/models")
}
