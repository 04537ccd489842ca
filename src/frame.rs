//! In-memory frame containers.
//!
//! Frames are transient: they live for one loop iteration, get converted to
//! single-channel grayscale, and are dropped once the encoded image is on
//! disk. Nothing here retains pixel data across captures.

use anyhow::{anyhow, Result};

/// One captured frame in packed RGB24.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Wrap raw RGB24 bytes, validating the buffer length against the
    /// declared dimensions.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))? as usize;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Convert to single-channel grayscale using Rec.601 luminance weights.
    pub fn to_gray(&self) -> GrayFrame {
        let mut gray = Vec::with_capacity(self.data.len() / 3);
        for rgb in self.data.chunks_exact(3) {
            let y = 0.299_f32 * rgb[0] as f32
                + 0.587_f32 * rgb[1] as f32
                + 0.114_f32 * rgb[2] as f32;
            gray.push(clamp_to_u8(y));
        }
        GrayFrame {
            data: gray,
            width: self.width,
            height: self.height,
        }
    }
}

/// One frame reduced to a single intensity channel.
#[derive(Clone, Debug)]
pub struct GrayFrame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl GrayFrame {
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
