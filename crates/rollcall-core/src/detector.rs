//! Face detection capability.
//!
//! Detection is a seam, not an engine concern: anything that can turn a
//! grayscale frame into bounding boxes plugs in behind [`FaceDetector`].
//! The bundled implementation adapts the SeetaFace frontal cascade from
//! the `rustface` crate.

use crate::types::FaceBox;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} (download seeta_fd_frontal_v1.0.bin from the rustface repository)")]
    ModelNotFound(String),
    #[error("model load failed: {0}")]
    ModelLoad(String),
    #[error("detection failed: {0}")]
    DetectionFailed(String),
}

/// Detection sensitivity parameters, deployment-tunable.
#[derive(Debug, Clone, Copy)]
pub struct DetectorSettings {
    /// Step between pyramid scales, cascade-style (> 1.0).
    pub scale_factor: f32,
    /// Minimum supporting evidence required to keep a candidate box.
    pub min_neighbors: u32,
    /// Smallest face edge considered, in pixels.
    pub min_face_size: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 5,
            min_face_size: 30,
        }
    }
}

/// Anything that can detect faces in a grayscale frame.
///
/// Implementations must be deterministic for identical pixels and settings.
pub trait FaceDetector {
    fn detect(&mut self, gray: &[u8], width: u32, height: u32)
        -> Result<Vec<FaceBox>, DetectorError>;
}

/// SeetaFace frontal detector via the `rustface` crate.
pub struct SeetaDetector {
    inner: Box<dyn rustface::Detector>,
}

impl SeetaDetector {
    /// Load the SeetaFace model file and apply the sensitivity settings.
    ///
    /// The cascade-style settings map onto the SeetaFace knobs: the pyramid
    /// shrink factor is the inverse of the scale step, and the score
    /// threshold plays the min-neighbors role of rejecting weakly supported
    /// candidates.
    pub fn load(model_path: &str, settings: DetectorSettings) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let mut inner = rustface::create_detector(model_path)
            .map_err(|e| DetectorError::ModelLoad(e.to_string()))?;

        inner.set_min_face_size(settings.min_face_size);
        inner.set_score_thresh(f64::from(settings.min_neighbors));
        inner.set_pyramid_scale_factor((1.0 / settings.scale_factor).clamp(0.1, 0.99));
        inner.set_slide_window_step(4, 4);

        tracing::info!(
            path = model_path,
            scale_factor = settings.scale_factor,
            min_neighbors = settings.min_neighbors,
            min_face_size = settings.min_face_size,
            "SeetaFace detector loaded"
        );

        Ok(Self { inner })
    }
}

impl FaceDetector for SeetaDetector {
    fn detect(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceBox>, DetectorError> {
        let expected = width as usize * height as usize;
        if gray.len() < expected {
            return Err(DetectorError::DetectionFailed(format!(
                "frame buffer too short: expected {expected}, got {}",
                gray.len()
            )));
        }

        let mut image = rustface::ImageData::new(gray, width, height);
        let faces = self.inner.detect(&mut image);

        Ok(faces
            .iter()
            .map(|f| {
                let b = f.bbox();
                FaceBox {
                    x: b.x(),
                    y: b.y(),
                    width: b.width(),
                    height: b.height(),
                    score: f.score() as f32,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_model_file() {
        let err = SeetaDetector::load("/nonexistent/seeta.bin", DetectorSettings::default())
            .err()
            .unwrap();
        assert!(matches!(err, DetectorError::ModelNotFound(_)));
    }

    #[test]
    fn test_default_settings() {
        let s = DetectorSettings::default();
        assert!((s.scale_factor - 1.1).abs() < f32::EPSILON);
        assert_eq!(s.min_neighbors, 5);
        assert_eq!(s.min_face_size, 30);
    }
}
