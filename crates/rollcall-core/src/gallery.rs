//! Reference gallery: one canonical face template per enrolled identity.

use crate::detector::FaceDetector;
use crate::imageops;
use crate::types::{
    CorrelationMatcher, Enrollment, FaceBox, FaceTemplate, MatchResult, Matcher, ReferenceEntry,
};

/// Immutable snapshot of canonical faces for all loadable enrollments.
///
/// Built in one pass and never mutated; a reload builds a fresh snapshot
/// and rebinds it, so readers never observe a half-populated gallery.
pub struct Gallery {
    entries: Vec<ReferenceEntry>,
    canvas_size: u32,
}

impl Gallery {
    /// An empty gallery on the given comparison canvas.
    pub fn empty(canvas_size: u32) -> Self {
        Self {
            entries: Vec::new(),
            canvas_size,
        }
    }

    /// Assemble a gallery from pre-built entries.
    pub fn from_entries(entries: Vec<ReferenceEntry>, canvas_size: u32) -> Self {
        Self {
            entries,
            canvas_size,
        }
    }

    /// Build a gallery from enrollment photos.
    ///
    /// Each photo is loaded, converted to grayscale, and run through the
    /// detector; the largest detected face becomes the identity's canonical
    /// template. Identities whose photo is missing, unreadable, or contains
    /// no detectable face are skipped with a diagnostic. Entry order is the
    /// enrollment iteration order.
    pub fn build(
        enrollments: &[Enrollment],
        detector: &mut dyn FaceDetector,
        canvas_size: u32,
    ) -> Self {
        let mut entries = Vec::new();

        for enrollment in enrollments {
            let photo = match image::open(&enrollment.photo_path) {
                Ok(img) => img.to_luma8(),
                Err(err) => {
                    tracing::warn!(
                        identity = %enrollment.identity_id,
                        photo = %enrollment.photo_path.display(),
                        error = %err,
                        "cannot read enrollment photo, skipping"
                    );
                    continue;
                }
            };

            let (width, height) = photo.dimensions();
            let gray = photo.into_raw();

            let boxes = match detector.detect(&gray, width, height) {
                Ok(boxes) => boxes,
                Err(err) => {
                    tracing::warn!(
                        identity = %enrollment.identity_id,
                        error = %err,
                        "detection failed on enrollment photo, skipping"
                    );
                    continue;
                }
            };

            let Some(face) = largest_box(&boxes) else {
                tracing::warn!(
                    identity = %enrollment.identity_id,
                    photo = %enrollment.photo_path.display(),
                    "no detectable face in enrollment photo, skipping"
                );
                continue;
            };

            let Some((crop, crop_w, crop_h)) = imageops::crop_box(&gray, width, height, face)
            else {
                tracing::warn!(
                    identity = %enrollment.identity_id,
                    "detected box lies outside the photo, skipping"
                );
                continue;
            };

            tracing::info!(
                identity = %enrollment.identity_id,
                name = %enrollment.display_name,
                face_width = crop_w,
                face_height = crop_h,
                "reference loaded"
            );

            entries.push(ReferenceEntry {
                identity_id: enrollment.identity_id.clone(),
                display_name: enrollment.display_name.clone(),
                template: FaceTemplate::from_gray(&crop, crop_w, crop_h, canvas_size),
            });
        }

        tracing::info!(count = entries.len(), "reference gallery built");

        Self {
            entries,
            canvas_size,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn canvas_size(&self) -> u32 {
        self.canvas_size
    }

    /// Entries in build order; recognition tie-breaks follow this order.
    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    /// Score a probe against every entry and return the best match above
    /// `threshold`, or an unmatched result carrying the best score seen.
    pub fn recognize(&self, probe: &FaceTemplate, threshold: f32) -> MatchResult {
        CorrelationMatcher.compare(probe, &self.entries, threshold)
    }
}

/// Largest box by pixel area; the first encountered wins ties.
fn largest_box(boxes: &[FaceBox]) -> Option<&FaceBox> {
    let mut best: Option<&FaceBox> = None;
    for b in boxes {
        if best.map_or(true, |cur| b.area() > cur.area()) {
            best = Some(b);
        }
    }
    best
}
