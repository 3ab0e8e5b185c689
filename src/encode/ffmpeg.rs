use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{DriveError, DriveResult};
use crate::foundation::math::mul_div255_u16;
use crate::render::frame::FrameRGBA;
use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

/// Where and how [`FfmpegSink`] writes its MP4.
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Destination `.mp4` file.
    pub out_path: PathBuf,
    /// Replace an existing file at `out_path`.
    pub overwrite: bool,
    /// Straight-alpha colour that translucent pixels are composited onto.
    pub bg_rgba: [u8; 4],
}

impl FfmpegSinkOpts {
    /// Overwriting MP4 output at `out_path` over an opaque black background.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            bg_rgba: [0, 0, 0, 255],
        }
    }
}

/// A running `ffmpeg` process fed through its stdin.
struct Encoder {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    cfg: SinkConfig,
    opaque: Vec<u8>,
}

/// H.264 MP4 sink backed by the system `ffmpeg` binary.
///
/// Frames are flattened to opaque RGBA8 and piped as `rawvideo`; ffmpeg converts to yuv420p.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,
    encoder: Option<Encoder>,
    last_idx: Option<FrameIndex>,
}

impl FfmpegSink {
    /// A sink that has not started its encoder yet.
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            encoder: None,
            last_idx: None,
        }
    }
}

/// Reject stream shapes that libx264 with yuv420p cannot take.
pub fn validate_config(cfg: &SinkConfig) -> DriveResult<()> {
    if cfg.fps.num == 0 || cfg.fps.den == 0 {
        return Err(DriveError::validation("encoder frame rate must be positive"));
    }
    if cfg.width == 0 || cfg.height == 0 {
        return Err(DriveError::validation(format!(
            "cannot encode an empty {}x{} canvas",
            cfg.width, cfg.height
        )));
    }
    if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
        return Err(DriveError::validation(format!(
            "yuv420p needs even dimensions, got {}x{}",
            cfg.width, cfg.height
        )));
    }
    Ok(())
}

/// Command line for one encode, without the program name.
pub(crate) fn encoder_args(cfg: &SinkConfig, opts: &FfmpegSinkOpts) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(24);
    let mut push = |items: &[&str]| args.extend(items.iter().map(OsString::from));
    push(&[if opts.overwrite { "-y" } else { "-n" }]);
    push(&["-loglevel", "error"]);
    // Input side. `-r` must precede `-i` for rawvideo.
    push(&["-f", "rawvideo", "-pix_fmt", "rgba"]);
    push(&["-s", &format!("{}x{}", cfg.width, cfg.height)]);
    push(&["-r", &format!("{}/{}", cfg.fps.num, cfg.fps.den)]);
    push(&["-i", "pipe:0"]);
    push(&["-an", "-c:v", "libx264", "-pix_fmt", "yuv420p"]);
    push(&["-movflags", "+faststart"]);
    args.push(opts.out_path.clone().into_os_string());
    args
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> DriveResult<()> {
        validate_config(&cfg)?;
        let out = &self.opts.out_path;
        ensure_parent_dir(out)?;
        if out.exists() && !self.opts.overwrite {
            return Err(DriveError::validation(format!(
                "refusing to replace '{}'",
                out.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(DriveError::encode(
                "MP4 output needs an `ffmpeg` executable on PATH",
            ));
        }

        let mut child = Command::new("ffmpeg")
            .args(encoder_args(&cfg, &self.opts))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DriveError::encode(format!("could not start ffmpeg: {e}")))?;

        let stdin = child.stdin.take();
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut log = Vec::new();
                pipe.read_to_end(&mut log)?;
                Ok::<_, std::io::Error>(log)
            })
        });
        if stdin.is_none() {
            let _ = child.kill();
            return Err(DriveError::encode("ffmpeg started without a stdin pipe"));
        }

        tracing::info!(
            out = %out.display(),
            width = cfg.width,
            height = cfg.height,
            fps_num = cfg.fps.num,
            fps_den = cfg.fps.den,
            "mp4 encode started"
        );
        self.encoder = Some(Encoder {
            child,
            stdin,
            stderr,
            cfg,
            opaque: vec![0u8; cfg.width as usize * cfg.height as usize * 4],
        });
        self.last_idx = None;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> DriveResult<()> {
        let Some(enc) = self.encoder.as_mut() else {
            return Err(DriveError::encode("push_frame called before begin"));
        };
        if self.last_idx.is_some_and(|last| idx.0 <= last.0) {
            return Err(DriveError::encode(format!(
                "frame {} arrived after frame {}",
                idx.0,
                self.last_idx.map_or(0, |l| l.0)
            )));
        }
        if (frame.width, frame.height) != (enc.cfg.width, enc.cfg.height) {
            return Err(DriveError::validation(format!(
                "frame {} is {}x{} but the stream is {}x{}",
                idx.0, frame.width, frame.height, enc.cfg.width, enc.cfg.height
            )));
        }
        if frame.data.len() != enc.opaque.len() {
            return Err(DriveError::validation(format!(
                "frame {} carries {} bytes, expected {}",
                idx.0,
                frame.data.len(),
                enc.opaque.len()
            )));
        }
        self.last_idx = Some(idx);

        flatten_to_opaque_rgba8(
            &mut enc.opaque,
            &frame.data,
            frame.premultiplied,
            self.opts.bg_rgba,
        )?;
        let Some(stdin) = enc.stdin.as_mut() else {
            return Err(DriveError::encode("encoder input already closed"));
        };
        stdin
            .write_all(&enc.opaque)
            .map_err(|e| DriveError::encode(format!("ffmpeg stopped reading frames: {e}")))
    }

    fn end(&mut self) -> DriveResult<()> {
        let Some(mut enc) = self.encoder.take() else {
            return Err(DriveError::encode("end called before begin"));
        };
        // Closing stdin is the end-of-stream signal.
        drop(enc.stdin.take());
        let status = enc
            .child
            .wait()
            .map_err(|e| DriveError::encode(format!("lost track of ffmpeg: {e}")))?;
        let log = match enc.stderr.take() {
            Some(reader) => reader
                .join()
                .map_err(|_| DriveError::encode("ffmpeg log reader panicked"))?
                .map_err(|e| DriveError::encode(format!("reading ffmpeg log: {e}")))?,
            None => Vec::new(),
        };
        if !status.success() {
            return Err(DriveError::encode(format!(
                "ffmpeg failed ({status}): {}",
                String::from_utf8_lossy(&log).trim()
            )));
        }
        tracing::info!(out = %self.opts.out_path.display(), "mp4 encode finished");
        Ok(())
    }
}

/// Composite RGBA8 pixels over `bg_rgba`, leaving every output pixel opaque.
pub(crate) fn flatten_to_opaque_rgba8(
    dst: &mut [u8],
    src: &[u8],
    src_is_premul: bool,
    bg_rgba: [u8; 4],
) -> DriveResult<()> {
    if dst.len() != src.len() || !src.len().is_multiple_of(4) {
        return Err(DriveError::validation(format!(
            "cannot flatten {} bytes into {}",
            src.len(),
            dst.len()
        )));
    }
    for (out, px) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let alpha = u16::from(px[3]);
        let uncovered = 255 - alpha;
        for ch in 0..3 {
            let fg = if src_is_premul {
                u16::from(px[ch])
            } else {
                mul_div255_u16(u16::from(px[ch]), alpha)
            };
            let bg = mul_div255_u16(u16::from(bg_rgba[ch]), uncovered);
            out[ch] = (fg + bg).min(255) as u8;
        }
        out[3] = 255;
    }
    Ok(())
}

/// Create the directory `path` will be written into.
pub fn ensure_parent_dir(path: &Path) -> DriveResult<()> {
    use anyhow::Context as _;
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
            .with_context(|| format!("creating '{}'", dir.display()))
            .map_err(DriveError::from),
        _ => Ok(()),
    }
}

/// Whether `ffmpeg -version` runs successfully.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
