use crate::imageops;
use serde::Serialize;
use std::path::PathBuf;

/// Bounding box for a detected face within a source frame.
#[derive(Debug, Clone, Serialize)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Detector score for this box (detector-defined scale).
    pub score: f32,
}

impl FaceBox {
    /// Box area in pixels, used to pick the canonical face in a photo.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Roster row visible to the engine: an active identity with a photo.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub identity_id: String,
    pub display_name: String,
    pub photo_path: PathBuf,
}

/// A face crop resampled onto a fixed square comparison canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceTemplate {
    side: u32,
    pixels: Vec<u8>,
}

impl FaceTemplate {
    /// Resample an arbitrary grayscale crop onto a `side` x `side` canvas.
    pub fn from_gray(gray: &[u8], width: u32, height: u32, side: u32) -> Self {
        Self {
            side,
            pixels: imageops::resize_bilinear(gray, width, height, side, side),
        }
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    /// Zero-mean normalized cross-correlation against another template.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar. A template with
    /// no pixel variance correlates at 0 with everything; templates built
    /// on different canvas sizes never match.
    pub fn correlation(&self, other: &FaceTemplate) -> f32 {
        if self.side != other.side || self.pixels.is_empty() {
            return 0.0;
        }

        let n = self.pixels.len() as f32;
        let mean_a = self.pixels.iter().map(|&p| f32::from(p)).sum::<f32>() / n;
        let mean_b = other.pixels.iter().map(|&p| f32::from(p)).sum::<f32>() / n;

        let mut cross = 0.0f32;
        let mut var_a = 0.0f32;
        let mut var_b = 0.0f32;

        for (&a, &b) in self.pixels.iter().zip(other.pixels.iter()) {
            let da = f32::from(a) - mean_a;
            let db = f32::from(b) - mean_b;
            cross += da * db;
            var_a += da * da;
            var_b += db * db;
        }

        let denom = (var_a * var_b).sqrt();
        if denom > 0.0 {
            cross / denom
        } else {
            0.0
        }
    }
}

/// One enrolled identity's canonical face, as held by the gallery.
#[derive(Debug, Clone)]
pub struct ReferenceEntry {
    pub identity_id: String,
    pub display_name: String,
    pub template: FaceTemplate,
}

/// Result of matching a probe template against the gallery.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub matched: bool,
    /// Best correlation observed across the gallery, in [-1, 1].
    /// Reported even when no entry clears the threshold.
    pub confidence: f32,
    /// Identity of the best match (if any cleared the threshold).
    pub identity_id: Option<String>,
    /// Display name of the best match (if any).
    pub display_name: Option<String>,
}

/// Strategy for comparing a probe template against a gallery of references.
pub trait Matcher {
    fn compare(&self, probe: &FaceTemplate, gallery: &[ReferenceEntry], threshold: f32)
        -> MatchResult;
}

/// Brute-force correlation matcher.
///
/// Scans the whole gallery with no early exit, tracking the maximum score.
/// Strict comparison: on equal scores the first entry in gallery order wins.
pub struct CorrelationMatcher;

impl Matcher for CorrelationMatcher {
    fn compare(
        &self,
        probe: &FaceTemplate,
        gallery: &[ReferenceEntry],
        threshold: f32,
    ) -> MatchResult {
        let mut best_score = f32::NEG_INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, entry) in gallery.iter().enumerate() {
            let score = probe.correlation(&entry.template);
            if score > best_score {
                best_score = score;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) if best_score > threshold => MatchResult {
                matched: true,
                confidence: best_score,
                identity_id: Some(gallery[idx].identity_id.clone()),
                display_name: Some(gallery[idx].display_name.clone()),
            },
            _ => MatchResult {
                matched: false,
                confidence: if best_score == f32::NEG_INFINITY {
                    0.0
                } else {
                    best_score
                },
                identity_id: None,
                display_name: None,
            },
        }
    }
}
