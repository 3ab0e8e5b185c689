use crate::foundation::error::{DriveError, DriveResult};

/// Absolute 0-based frame index in composition timeline space.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct FrameIndex(pub u64);

impl std::fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open frame range `[start, end)` in timeline space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    /// Inclusive range start.
    pub start: FrameIndex,
    /// Exclusive range end.
    pub end: FrameIndex, // exclusive
}

impl FrameRange {
    /// Create a validated range with `start <= end`.
    pub fn new(start: FrameIndex, end: FrameIndex) -> DriveResult<Self> {
        if start.0 > end.0 {
            return Err(DriveError::validation("FrameRange start must be <= end"));
        }
        Ok(Self { start, end })
    }

    /// The full timeline `[0, duration)`.
    pub fn full(duration: u64) -> Self {
        Self {
            start: FrameIndex(0),
            end: FrameIndex(duration),
        }
    }

    /// Parse the CLI range syntax.
    ///
    /// `"a-b"` is inclusive on both ends (`"0-29"` is 30 frames); a bare `"n"` is one frame.
    pub fn parse(s: &str) -> DriveResult<Self> {
        fn num(part: &str, whole: &str) -> DriveResult<u64> {
            part.trim().parse::<u64>().map_err(|_| {
                DriveError::validation(format!(
                    "invalid frame range \"{whole}\" (expected \"N\" or \"START-END\")"
                ))
            })
        }

        let (start, last) = match s.split_once('-') {
            Some((a, b)) => (num(a, s)?, num(b, s)?),
            None => {
                let n = num(s, s)?;
                (n, n)
            }
        };
        if last < start {
            return Err(DriveError::validation(format!(
                "invalid frame range \"{s}\": end is before start"
            )));
        }
        Self::new(FrameIndex(start), FrameIndex(last.saturating_add(1)))
    }

    /// Number of frames contained in the range.
    pub fn len_frames(self) -> u64 {
        self.end.0.saturating_sub(self.start.0)
    }

    /// Return `true` when the range has no frames.
    pub fn is_empty(self) -> bool {
        self.start.0 == self.end.0
    }

    /// Return `true` when `f` is inside `[start, end)`.
    pub fn contains(self, f: FrameIndex) -> bool {
        self.start.0 <= f.0 && f.0 < self.end.0
    }

    /// Frames of this range owned by `worker` when dealt round-robin over `workers`.
    pub fn strided(self, worker: u64, workers: u64) -> impl Iterator<Item = FrameIndex> {
        let step = workers.max(1) as usize;
        (self.start.0.saturating_add(worker)..self.end.0)
            .step_by(step)
            .map(FrameIndex)
    }
}

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32, // must be > 0
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> DriveResult<Self> {
        if den == 0 {
            return Err(DriveError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(DriveError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Whole-number frame rate, as compositions report it.
    pub fn from_int(fps: u32) -> DriveResult<Self> {
        Self::new(fps, 1)
    }

    /// Rational for a frame rate reported as a plain number.
    ///
    /// Whole numbers map to `n/1`, NTSC rates (`29.97`, `23.976`, `59.94`) to `n*1000/1001`,
    /// anything else to a 1/1000 grid.
    pub fn from_f64(fps: f64) -> DriveResult<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(DriveError::validation(format!(
                "fps must be a positive number, got {fps}"
            )));
        }
        if fps > f64::from(u32::MAX) / 1001.0 {
            return Err(DriveError::validation(format!("fps {fps} is too large")));
        }
        let whole = fps.round();
        if (fps - whole).abs() < 1e-6 {
            return Self::from_int(whole as u32);
        }
        let ntsc = (fps * 1.001).round();
        if ntsc >= 1.0 && (fps * 1.001 - ntsc).abs() < 1e-3 {
            return Self::new(ntsc as u32 * 1000, 1001);
        }
        let num = (fps * 1000.0).round() as u32;
        let g = gcd(num, 1000);
        Self::new(num / g, 1000 / g)
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Create a canvas with non-zero dimensions.
    pub fn new(width: u32, height: u32) -> DriveResult<Self> {
        if width == 0 || height == 0 {
            return Err(DriveError::validation(format!(
                "canvas must be non-empty, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    /// Size in bytes of one tightly packed RGBA8 frame.
    pub fn rgba_len(self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        use crate::foundation::math::mul_div255_u16;

        let premul = |c: u8| mul_div255_u16(u16::from(c), u16::from(a)) as u8;
        Self {
            r: premul(r),
            g: premul(g),
            b: premul(b),
            a,
        }
    }

    /// Pixel bytes in RGBA order.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
