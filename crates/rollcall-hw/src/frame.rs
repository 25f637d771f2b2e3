//! Grayscale frame type and pixel-format conversion.

/// A captured grayscale camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Grayscale pixel data, row-major, width * height bytes.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Driver sequence number, for diagnostics.
    pub sequence: u32,
}

impl Frame {
    /// Mean pixel brightness (0.0-255.0), reported by camera diagnostics.
    pub fn avg_brightness(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.data.iter().map(|&b| u64::from(b)).sum();
        sum as f32 / self.data.len() as f32
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Extract the luma channel from a packed YUYV (4:2:2) buffer.
///
/// Each 4-byte group [Y0, U, Y1, V] carries two pixels; grayscale keeps
/// the Y bytes and drops the shared chroma.
pub fn yuyv_to_grayscale(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }
    Ok(yuyv[..expected].chunks_exact(2).map(|pair| pair[0]).collect())
}
