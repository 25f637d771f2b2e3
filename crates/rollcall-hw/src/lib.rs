//! rollcall-hw — hardware abstraction for camera capture.
//!
//! Provides V4L2-based webcam access with grayscale frame extraction.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, FrameStream, PixelFormat};
pub use frame::Frame;
