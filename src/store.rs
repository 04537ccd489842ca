//! On-disk frame store.
//!
//! The store owns the output directory and the sequential filename scheme
//! `{prefix}_{index:04}{extension}`. Frames are written as grayscale JPEG.
//! Write failures are surfaced as errors; unlike a failed read, a failed
//! write aborts the run.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::path::{Path, PathBuf};

use crate::config::OutputSettings;
use crate::frame::GrayFrame;

pub struct FrameStore {
    dir: PathBuf,
    prefix: String,
    extension: String,
}

impl FrameStore {
    /// Open the store, creating the output directory if absent. Creation is
    /// idempotent: an existing directory is not an error.
    pub fn create(settings: &OutputSettings) -> Result<Self> {
        let dir = PathBuf::from(&settings.dir);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create output directory {}", dir.display()))?;
        Ok(Self {
            dir,
            prefix: settings.prefix.clone(),
            extension: settings.extension.clone(),
        })
    }

    /// Deterministic path for a frame index: `{prefix}_{index:04}{extension}`.
    pub fn frame_path(&self, index: u32) -> PathBuf {
        self.dir
            .join(format!("{}_{:04}{}", self.prefix, index, self.extension))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Encode a grayscale frame as JPEG and write it at the index's path.
    pub fn write_gray(&self, index: u32, frame: &GrayFrame) -> Result<PathBuf> {
        let path = self.frame_path(index);
        let mut encoded = Vec::new();
        JpegEncoder::new(&mut encoded)
            .encode(
                frame.pixels(),
                frame.width,
                frame.height,
                ExtendedColorType::L8,
            )
            .with_context(|| format!("encode frame {} as jpeg", index))?;
        std::fs::write(&path, encoded)
            .with_context(|| format!("write frame to {}", path.display()))?;
        Ok(path)
    }
}
