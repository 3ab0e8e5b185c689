use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{DriveError, DriveResult};
use crate::render::frame::FrameRGBA;
use anyhow::Context as _;
use std::path::{Path, PathBuf};

/// Writes each frame to `<dir>/frame-<n>.png`.
#[derive(Debug)]
pub struct PngSequenceSink {
    dir: PathBuf,
    overwrite: bool,
    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
    written: Vec<PathBuf>,
}

impl PngSequenceSink {
    /// Write into `dir`, creating it on `begin`. Existing files are overwritten.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            overwrite: true,
            cfg: None,
            last_idx: None,
            written: Vec::new(),
        }
    }

    /// Refuse to replace existing frame files.
    pub fn no_overwrite(mut self) -> Self {
        self.overwrite = false;
        self
    }

    /// Path a frame is written to.
    pub fn frame_path(&self, idx: FrameIndex) -> PathBuf {
        frame_file(&self.dir, idx)
    }

    /// Files written since the last `begin`.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

fn frame_file(dir: &Path, idx: FrameIndex) -> PathBuf {
    dir.join(format!("frame-{}.png", idx.0))
}

impl FrameSink for PngSequenceSink {
    fn begin(&mut self, cfg: SinkConfig) -> DriveResult<()> {
        if cfg.width == 0 || cfg.height == 0 {
            return Err(DriveError::validation(
                "png sink width/height must be non-zero",
            ));
        }
        std::fs::create_dir_all(&self.dir).with_context(|| {
            format!("failed to create output directory '{}'", self.dir.display())
        })?;
        self.cfg = Some(cfg);
        self.last_idx = None;
        self.written.clear();
        tracing::debug!(dir = %self.dir.display(), "png sequence started");
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> DriveResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| DriveError::encode("png sink not started"))?;
        if let Some(last) = self.last_idx
            && idx <= last
        {
            return Err(DriveError::encode(
                "png sink received out-of-order frame index",
            ));
        }
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(DriveError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        let path = frame_file(&self.dir, idx);
        if !self.overwrite && path.exists() {
            return Err(DriveError::validation(format!(
                "output file '{}' already exists",
                path.display()
            )));
        }
        let png = frame.to_png()?;
        std::fs::write(&path, png)
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        self.last_idx = Some(idx);
        self.written.push(path);
        Ok(())
    }

    fn end(&mut self) -> DriveResult<()> {
        if self.cfg.take().is_none() {
            return Err(DriveError::encode("png sink not started"));
        }
        tracing::debug!(frames = self.written.len(), "png sequence finished");
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/png.rs"]
mod tests;
