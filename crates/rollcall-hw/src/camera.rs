//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, Frame};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel, extract Y channel).
    Yuyv,
    /// 8-bit grayscale (1 byte/pixel, monochrome sensor output).
    Grey,
}

/// V4L2 camera device handle.
///
/// Opened by numeric index; the device node is `/dev/video{index}`.
/// Dropping the handle (or an active stream) releases the device.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open the camera at the configured index, requesting the given frame
    /// geometry. The driver may negotiate a different geometry; the
    /// negotiated values are what `width`/`height` report.
    pub fn open(index: u32, width: u32, height: u32) -> Result<Self, CameraError> {
        let device_path = format!("/dev/video{index}");
        let device = open_device(&device_path)?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        tracing::info!(
            device = %device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        let (negotiated, pixel_format) = negotiate_format(&device, width, height)?;
        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "negotiated format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path,
            fourcc: negotiated.fourcc,
            pixel_format,
        })
    }

    /// Capture a single frame, converting to grayscale. Used by the camera
    /// diagnostics path; the live loop uses [`Camera::frames`].
    pub fn read_frame(&self) -> Result<Frame, CameraError> {
        let mut stream = self.frames()?;
        stream.next_frame()
    }

    /// Start a blocking capture stream for frame-at-a-time acquisition.
    ///
    /// Dropping the stream (or the camera) releases the device buffers.
    pub fn frames(&self) -> Result<FrameStream<'_>, CameraError> {
        let stream =
            MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4).map_err(|e| {
                CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
            })?;

        Ok(FrameStream {
            stream,
            width: self.width,
            height: self.height,
            pixel_format: self.pixel_format,
        })
    }

    /// List V4L2 video capture devices, probing /dev/video0 through 15.
    pub fn list_devices() -> Vec<DeviceInfo> {
        (0..16)
            .filter_map(|i| {
                let path = format!("/dev/video{i}");
                let dev = Device::with_path(&path).ok()?;
                let caps = dev.query_caps().ok()?;
                caps.capabilities
                    .contains(v4l::capability::Flags::VIDEO_CAPTURE)
                    .then(|| DeviceInfo {
                        path,
                        name: caps.card,
                        driver: caps.driver,
                        bus: caps.bus,
                    })
            })
            .collect()
    }
}

fn open_device(device_path: &str) -> Result<Device, CameraError> {
    if !Path::new(device_path).exists() {
        return Err(CameraError::DeviceNotFound(device_path.to_string()));
    }
    Device::with_path(device_path).map_err(|e| {
        if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
            CameraError::DeviceBusy
        } else {
            CameraError::DeviceNotFound(format!("{device_path}: {e}"))
        }
    })
}

/// Request YUYV at the given geometry; accept GREY when the driver
/// negotiates it instead (monochrome sensors).
fn negotiate_format(
    device: &Device,
    width: u32,
    height: u32,
) -> Result<(v4l::Format, PixelFormat), CameraError> {
    let mut fmt = device
        .format()
        .map_err(|e| CameraError::FormatNegotiationFailed(format!("failed to get format: {e}")))?;
    fmt.fourcc = FourCC::new(b"YUYV");
    fmt.width = width;
    fmt.height = height;

    let negotiated = device
        .set_format(&fmt)
        .map_err(|e| CameraError::FormatNegotiationFailed(format!("failed to set format: {e}")))?;

    let pixel_format = if negotiated.fourcc == FourCC::new(b"YUYV") {
        PixelFormat::Yuyv
    } else if negotiated.fourcc == FourCC::new(b"GREY") {
        PixelFormat::Grey
    } else {
        return Err(CameraError::FormatNegotiationFailed(format!(
            "unsupported pixel format: {:?} (need YUYV or GREY)",
            negotiated.fourcc
        )));
    };

    Ok((negotiated, pixel_format))
}

/// Blocking frame source over an open camera.
pub struct FrameStream<'a> {
    stream: MmapStream<'a>,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
}

impl FrameStream<'_> {
    /// Block until the next frame arrives, returning it as grayscale.
    pub fn next_frame(&mut self) -> Result<Frame, CameraError> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

        let data = extract_gray(buf, self.width, self.height, self.pixel_format)?;

        Ok(Frame {
            data,
            width: self.width,
            height: self.height,
            sequence: meta.sequence,
        })
    }
}

/// Convert a raw capture buffer to grayscale based on the negotiated format.
fn extract_gray(
    buf: &[u8],
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
) -> Result<Vec<u8>, CameraError> {
    let pixels = (width * height) as usize;

    match pixel_format {
        PixelFormat::Grey => {
            if buf.len() < pixels {
                return Err(CameraError::CaptureFailed(format!(
                    "GREY buffer too short: expected {pixels}, got {}",
                    buf.len()
                )));
            }
            Ok(buf[..pixels].to_vec())
        }
        PixelFormat::Yuyv => frame::yuyv_to_grayscale(buf, width, height)
            .map_err(|e| CameraError::CaptureFailed(format!("YUYV conversion failed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_gray_grey_passthrough() {
        let buf: Vec<u8> = (0..8).collect();
        let gray = extract_gray(&buf, 4, 2, PixelFormat::Grey).unwrap();
        assert_eq!(gray, buf);
    }

    #[test]
    fn test_extract_gray_grey_short_buffer() {
        let buf = vec![0u8; 4];
        assert!(extract_gray(&buf, 4, 2, PixelFormat::Grey).is_err());
    }

    #[test]
    fn test_extract_gray_yuyv() {
        let buf: Vec<u8> = (0..16).collect();
        let gray = extract_gray(&buf, 4, 2, PixelFormat::Yuyv).unwrap();
        assert_eq!(gray, vec![0, 2, 4, 6, 8, 10, 12, 14]);
    }

    #[test]
    fn test_open_missing_device() {
        // Index 15 is vanishingly unlikely to exist on a test machine.
        match Camera::open(15, 640, 480) {
            Err(CameraError::DeviceNotFound(_)) | Err(CameraError::DeviceBusy) => {}
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => {} // a machine that actually has /dev/video15
        }
    }
}
