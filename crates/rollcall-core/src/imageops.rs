//! Grayscale pixel operations: region cropping and bilinear resampling.

use crate::types::FaceBox;

/// Extract the pixel region of a detected box from a grayscale frame.
///
/// The box is clamped to the frame bounds. Returns `None` when the clamped
/// region is empty or the buffer is shorter than the stated geometry.
pub fn crop_box(gray: &[u8], width: u32, height: u32, bbox: &FaceBox) -> Option<(Vec<u8>, u32, u32)> {
    let w = i64::from(width);
    let h = i64::from(height);
    if gray.len() < (w * h) as usize {
        return None;
    }

    let x0 = i64::from(bbox.x).clamp(0, w);
    let y0 = i64::from(bbox.y).clamp(0, h);
    let x1 = (i64::from(bbox.x) + i64::from(bbox.width)).clamp(0, w);
    let y1 = (i64::from(bbox.y) + i64::from(bbox.height)).clamp(0, h);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    let crop_w = (x1 - x0) as usize;
    let crop_h = (y1 - y0) as usize;
    let stride = w as usize;

    let mut out = Vec::with_capacity(crop_w * crop_h);
    for y in y0 as usize..y1 as usize {
        let row_start = y * stride + x0 as usize;
        out.extend_from_slice(&gray[row_start..row_start + crop_w]);
    }

    Some((out, crop_w as u32, crop_h as u32))
}

/// Resample a grayscale image to a new size with bilinear interpolation.
///
/// Samples at pixel centers, clamping at the edges. A degenerate source or
/// destination yields an all-zero buffer of the destination size.
pub fn resize_bilinear(src: &[u8], src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Vec<u8> {
    let sw = src_w as usize;
    let sh = src_h as usize;
    let dw = dst_w as usize;
    let dh = dst_h as usize;

    if sw == 0 || sh == 0 || dw == 0 || dh == 0 || src.len() < sw * sh {
        return vec![0u8; dw * dh];
    }

    let x_ratio = sw as f32 / dw as f32;
    let y_ratio = sh as f32 / dh as f32;
    let mut out = vec![0u8; dw * dh];

    let sample = |x: i32, y: i32| -> f32 {
        let xc = x.clamp(0, sw as i32 - 1) as usize;
        let yc = y.clamp(0, sh as i32 - 1) as usize;
        f32::from(src[yc * sw + xc])
    };

    for oy in 0..dh {
        let sy = (oy as f32 + 0.5) * y_ratio - 0.5;
        let y0 = sy.floor() as i32;
        let fy = sy - y0 as f32;

        for ox in 0..dw {
            let sx = (ox as f32 + 0.5) * x_ratio - 0.5;
            let x0 = sx.floor() as i32;
            let fx = sx - x0 as f32;

            let val = sample(x0, y0) * (1.0 - fx) * (1.0 - fy)
                + sample(x0 + 1, y0) * fx * (1.0 - fy)
                + sample(x0, y0 + 1) * (1.0 - fx) * fy
                + sample(x0 + 1, y0 + 1) * fx * fy;

            out[oy * dw + ox] = val.round().clamp(0.0, 255.0) as u8;
        }
    }

    out
}
