//! Live capture loop: camera frames through detection, recognition, and
//! the attendance ledger, one frame at a time.

use anyhow::Result;
use rollcall_core::{imageops, FaceBox, FaceDetector, FaceTemplate, Gallery, MatchResult};
use rollcall_hw::{Camera, Frame};
use rollcall_store::{RecordOutcome, Store};
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};

use crate::config::Config;

/// Operator commands accepted while the loop runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    ReloadGallery,
}

/// Non-blocking operator command source.
///
/// A reader thread turns stdin lines into commands; the capture loop polls
/// the channel once per frame and never blocks on input.
pub struct CommandPoller {
    rx: Receiver<Command>,
}

impl CommandPoller {
    /// Spawn the stdin reader thread.
    pub fn spawn_stdin() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::Builder::new()
            .name("rollcall-stdin".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    let command = match line.trim() {
                        "q" => Command::Quit,
                        "r" => Command::ReloadGallery,
                        "" => continue,
                        other => {
                            tracing::debug!(input = other, "ignoring unknown command");
                            continue;
                        }
                    };
                    if tx.send(command).is_err() {
                        break;
                    }
                }
            })
            .expect("failed to spawn stdin reader thread");

        Self { rx }
    }

    /// Wrap an existing channel as a command source.
    pub fn from_channel(rx: Receiver<Command>) -> Self {
        Self { rx }
    }

    /// Poll once without blocking; `None` means keep running.
    pub fn poll(&self) -> Option<Command> {
        match self.rx.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Per-box classification result, in detection order.
#[derive(Debug)]
pub struct FaceObservation {
    pub bbox: FaceBox,
    pub result: MatchResult,
    /// Ledger outcome for a matched face; `None` for unmatched faces and
    /// for write failures (already logged).
    pub attendance: Option<RecordOutcome>,
}

/// Everything a renderer needs to draw one processed frame.
#[derive(Debug)]
pub struct FrameReport {
    pub sequence: u32,
    pub face_count: usize,
    pub gallery_size: usize,
    pub observations: Vec<FaceObservation>,
}

/// Rendering seam. The loop classifies; presentation is external.
pub trait FrameSink {
    fn present(&mut self, report: &FrameReport);
}

/// Renders frame reports as structured log lines.
pub struct LogSink;

impl FrameSink for LogSink {
    fn present(&mut self, report: &FrameReport) {
        if report.face_count == 0 {
            tracing::trace!(
                seq = report.sequence,
                gallery = report.gallery_size,
                "no faces in frame"
            );
            return;
        }

        tracing::info!(
            seq = report.sequence,
            faces = report.face_count,
            gallery = report.gallery_size,
            "frame processed"
        );

        for obs in &report.observations {
            let label = obs.result.display_name.as_deref().unwrap_or("unknown");
            tracing::info!(
                x = obs.bbox.x,
                y = obs.bbox.y,
                w = obs.bbox.width,
                h = obs.bbox.height,
                label,
                matched = obs.result.matched,
                confidence = obs.result.confidence,
                "face"
            );
        }
    }
}

/// Run the capture loop until an operator quits or acquisition fails.
///
/// One frame per cycle: poll the operator channel, acquire (blocking),
/// detect once, then classify and record every face before the next frame
/// is touched. A reload rebuilds the gallery synchronously and rebinds the
/// snapshot; no frame is processed during the rebuild.
pub fn run_loop(
    camera: &Camera,
    detector: &mut dyn FaceDetector,
    store: &Store,
    mut gallery: Gallery,
    commands: &CommandPoller,
    sink: &mut dyn FrameSink,
    config: &Config,
) -> Result<()> {
    let mut frames = camera.frames()?;

    for _ in 0..config.warmup_frames {
        let _ = frames.next_frame();
    }

    tracing::info!(
        gallery = gallery.len(),
        "live capture running (type q to quit, r to reload the gallery)"
    );

    loop {
        match commands.poll() {
            Some(Command::Quit) => {
                tracing::info!("quit requested, stopping");
                break;
            }
            Some(Command::ReloadGallery) => {
                tracing::info!("reloading reference gallery");
                match store.active_enrollments() {
                    Ok(enrollments) => {
                        gallery = Gallery::build(&enrollments, detector, config.canvas_size);
                        if gallery.is_empty() {
                            tracing::warn!("reference gallery is empty after reload");
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "roster read failed, keeping current gallery");
                    }
                }
                continue;
            }
            None => {}
        }

        let frame = match frames.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                tracing::error!(error = %err, "frame acquisition failed, stopping");
                break;
            }
        };

        let report = process_frame(&frame, detector, &gallery, store, config.match_threshold);
        sink.present(&report);
    }

    Ok(())
}

/// Detect, classify, and record every face in one frame.
///
/// Nothing here terminates the loop: detector failures yield an empty
/// frame, ledger failures are logged and skipped.
pub fn process_frame(
    frame: &Frame,
    detector: &mut dyn FaceDetector,
    gallery: &Gallery,
    store: &Store,
    threshold: f32,
) -> FrameReport {
    let boxes = match detector.detect(&frame.data, frame.width, frame.height) {
        Ok(boxes) => boxes,
        Err(err) => {
            tracing::warn!(error = %err, "detection failed, skipping frame");
            Vec::new()
        }
    };

    let face_count = boxes.len();
    let mut observations = Vec::with_capacity(face_count);

    for bbox in boxes {
        let Some((crop, crop_w, crop_h)) =
            imageops::crop_box(&frame.data, frame.width, frame.height, &bbox)
        else {
            tracing::debug!(
                x = bbox.x,
                y = bbox.y,
                "detected box lies outside the frame, skipping"
            );
            continue;
        };

        let probe = FaceTemplate::from_gray(&crop, crop_w, crop_h, gallery.canvas_size());
        let result = gallery.recognize(&probe, threshold);

        let attendance = if result.matched {
            record_attendance(store, &result)
        } else {
            None
        };

        observations.push(FaceObservation {
            bbox,
            result,
            attendance,
        });
    }

    FrameReport {
        sequence: frame.sequence,
        face_count,
        gallery_size: gallery.len(),
        observations,
    }
}

/// Record attendance for a matched identity. Write failures are logged and
/// swallowed; the loop must survive them.
fn record_attendance(store: &Store, result: &MatchResult) -> Option<RecordOutcome> {
    let identity_id = result.identity_id.as_deref()?;

    match store.record_if_absent(identity_id, result.confidence) {
        Ok(RecordOutcome::Recorded) => {
            tracing::info!(
                identity = identity_id,
                name = result.display_name.as_deref().unwrap_or(identity_id),
                confidence = result.confidence,
                "attendance recorded"
            );
            Some(RecordOutcome::Recorded)
        }
        Ok(RecordOutcome::AlreadyRecorded) => {
            tracing::debug!(identity = identity_id, "attendance already recorded today");
            Some(RecordOutcome::AlreadyRecorded)
        }
        Err(err) => {
            tracing::warn!(identity = identity_id, error = %err, "attendance write failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{DetectorError, ReferenceEntry};

    struct FixedDetector {
        boxes: Vec<FaceBox>,
    }

    impl FaceDetector for FixedDetector {
        fn detect(
            &mut self,
            _gray: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<Vec<FaceBox>, DetectorError> {
            Ok(self.boxes.clone())
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(
            &mut self,
            _gray: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<Vec<FaceBox>, DetectorError> {
            Err(DetectorError::DetectionFailed("boom".to_string()))
        }
    }

    const SIDE: u32 = 40;

    fn pattern() -> Vec<u8> {
        (0..SIDE * SIDE).map(|i| ((i * 7) % 256) as u8).collect()
    }

    fn gallery_with(id: &str, pixels: &[u8]) -> Gallery {
        let entry = ReferenceEntry {
            identity_id: id.to_string(),
            display_name: format!("{id} name"),
            template: FaceTemplate::from_gray(pixels, SIDE, SIDE, 100),
        };
        Gallery::from_entries(vec![entry], 100)
    }

    fn frame_of(pixels: Vec<u8>) -> Frame {
        Frame {
            data: pixels,
            width: SIDE,
            height: SIDE,
            sequence: 1,
        }
    }

    fn full_frame_box() -> FaceBox {
        FaceBox {
            x: 0,
            y: 0,
            width: SIDE,
            height: SIDE,
            score: 1.0,
        }
    }

    #[test]
    fn test_match_records_then_suppresses_duplicate() {
        let store = Store::open_in_memory().unwrap();
        let gallery = gallery_with("s1", &pattern());
        let mut detector = FixedDetector { boxes: vec![full_frame_box()] };
        let frame = frame_of(pattern());

        let report = process_frame(&frame, &mut detector, &gallery, &store, 0.6);
        assert_eq!(report.face_count, 1);
        assert_eq!(report.gallery_size, 1);
        let obs = &report.observations[0];
        assert!(obs.result.matched);
        assert_eq!(obs.result.identity_id.as_deref(), Some("s1"));
        assert!(obs.result.confidence > 0.999);
        assert_eq!(obs.attendance, Some(RecordOutcome::Recorded));

        // The same face seen again on the same day is a normal duplicate.
        let report = process_frame(&frame, &mut detector, &gallery, &store, 0.6);
        assert_eq!(
            report.observations[0].attendance,
            Some(RecordOutcome::AlreadyRecorded)
        );

        let today = chrono::Local::now().date_naive();
        assert!(store.exists("s1", today).unwrap());
    }

    #[test]
    fn test_unrelated_face_writes_nothing() {
        let store = Store::open_in_memory().unwrap();
        let gallery = gallery_with("s1", &pattern());
        let mut detector = FixedDetector { boxes: vec![full_frame_box()] };

        // Inverted pixels correlate far below the threshold.
        let inverted: Vec<u8> = pattern().iter().map(|&p| 255 - p).collect();
        let report = process_frame(&frame_of(inverted), &mut detector, &gallery, &store, 0.6);

        let obs = &report.observations[0];
        assert!(!obs.result.matched);
        assert!(obs.result.confidence < 0.6);
        assert!(obs.attendance.is_none());

        let today = chrono::Local::now().date_naive();
        assert!(!store.exists("s1", today).unwrap());
    }

    #[test]
    fn test_detector_failure_yields_empty_frame() {
        let store = Store::open_in_memory().unwrap();
        let gallery = gallery_with("s1", &pattern());
        let mut detector = FailingDetector;

        let report = process_frame(&frame_of(pattern()), &mut detector, &gallery, &store, 0.6);
        assert_eq!(report.face_count, 0);
        assert!(report.observations.is_empty());
    }

    #[test]
    fn test_box_outside_frame_is_skipped() {
        let store = Store::open_in_memory().unwrap();
        let gallery = gallery_with("s1", &pattern());
        let outside = FaceBox { x: 500, y: 500, width: 40, height: 40, score: 1.0 };
        let mut detector = FixedDetector { boxes: vec![outside] };

        let report = process_frame(&frame_of(pattern()), &mut detector, &gallery, &store, 0.6);
        assert_eq!(report.face_count, 1);
        assert!(report.observations.is_empty());
    }

    #[test]
    fn test_observations_follow_detection_order() {
        let store = Store::open_in_memory().unwrap();
        let gallery = gallery_with("s1", &pattern());
        let first = FaceBox { x: 0, y: 0, width: 20, height: 20, score: 1.0 };
        let second = FaceBox { x: 20, y: 20, width: 20, height: 20, score: 1.0 };
        let mut detector = FixedDetector { boxes: vec![first, second] };

        let report = process_frame(&frame_of(pattern()), &mut detector, &gallery, &store, 0.6);
        assert_eq!(report.observations.len(), 2);
        assert_eq!(report.observations[0].bbox.x, 0);
        assert_eq!(report.observations[1].bbox.x, 20);
    }

    #[test]
    fn test_command_poller_drains_in_order() {
        let (tx, rx) = mpsc::channel();
        let poller = CommandPoller::from_channel(rx);

        assert_eq!(poller.poll(), None);
        tx.send(Command::ReloadGallery).unwrap();
        tx.send(Command::Quit).unwrap();
        assert_eq!(poller.poll(), Some(Command::ReloadGallery));
        assert_eq!(poller.poll(), Some(Command::Quit));
        assert_eq!(poller.poll(), None);
    }
}
