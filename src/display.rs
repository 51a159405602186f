//! Seam to the physical panel.
//!
//! The concrete e-ink driver lives outside this crate; the controller only
//! needs somewhere to stage a composed frame and a way to present it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use image::RgbaImage;
use tracing::info;

/// A panel that accepts fully-composed frames at its native resolution.
pub trait DisplayDevice: Send {
    /// Native panel resolution as (width, height).
    fn resolution(&self) -> (u32, u32);

    /// Stage a frame sized to the panel resolution.
    fn set_frame(&mut self, frame: RgbaImage);

    /// Push the staged frame to the physical panel.
    fn present(&mut self) -> Result<()>;
}

/// Development stand-in for the e-ink driver: writes every presented frame
/// to a PNG so the composition can be inspected on a host without a panel.
pub struct PreviewDisplay {
    width: u32,
    height: u32,
    output: PathBuf,
    staged: Option<RgbaImage>,
}

impl PreviewDisplay {
    #[must_use]
    pub fn new(width: u32, height: u32, output: PathBuf) -> Self {
        Self {
            width,
            height,
            output,
            staged: None,
        }
    }
}

impl DisplayDevice for PreviewDisplay {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_frame(&mut self, frame: RgbaImage) {
        self.staged = Some(frame);
    }

    fn present(&mut self) -> Result<()> {
        if let Some(frame) = self.staged.take() {
            frame
                .save(&self.output)
                .with_context(|| format!("writing preview frame to {}", self.output.display()))?;
            info!(path = %self.output.display(), "frame presented");
        }
        Ok(())
    }
}
