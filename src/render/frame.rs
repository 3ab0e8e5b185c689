use crate::foundation::core::{Canvas, Rgba8Premul};
use crate::foundation::error::{DriveError, DriveResult};
use crate::foundation::math::unpremul_channel;

/// A captured frame as RGBA8 pixels.
///
/// Frames produced by reeldrive are **premultiplied alpha**. The `premultiplied` flag makes this
/// explicit at API boundaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// A frame filled with one colour.
    pub fn filled(canvas: Canvas, color: Rgba8Premul) -> Self {
        let px = color.to_array();
        let mut data = Vec::with_capacity(canvas.rgba_len());
        for _ in 0..(canvas.width as usize * canvas.height as usize) {
            data.extend_from_slice(&px);
        }
        Self {
            width: canvas.width,
            height: canvas.height,
            data,
            premultiplied: true,
        }
    }

    /// Canvas matching this frame's size.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Read one pixel, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let px = self.data.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Mutable access to one pixel.
    pub(crate) fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut [u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        self.data.get_mut(i..i + 4)
    }

    /// Copy of the pixels with straight (non-premultiplied) alpha.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        if !self.premultiplied {
            return self.data.clone();
        }
        let mut out = self.data.clone();
        for px in out.chunks_exact_mut(4) {
            let a = px[3];
            px[0] = unpremul_channel(px[0], a);
            px[1] = unpremul_channel(px[1], a);
            px[2] = unpremul_channel(px[2], a);
        }
        out
    }

    /// Decode a PNG screenshot into a premultiplied frame.
    pub fn from_png(bytes: &[u8]) -> DriveResult<Self> {
        let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
            .map_err(|e| DriveError::serde(format!("invalid PNG screenshot: {e}")))?
            .to_rgba8();
        let (width, height) = img.dimensions();
        let mut data = img.into_raw();
        for px in data.chunks_exact_mut(4) {
            let c = Rgba8Premul::from_straight_rgba(px[0], px[1], px[2], px[3]);
            px.copy_from_slice(&c.to_array());
        }
        Ok(Self {
            width,
            height,
            data,
            premultiplied: true,
        })
    }

    /// Encode as PNG (straight alpha).
    pub fn to_png(&self) -> DriveResult<Vec<u8>> {
        let mut out = std::io::Cursor::new(Vec::new());
        image::write_buffer_with_format(
            &mut out,
            &self.to_straight_rgba8(),
            self.width,
            self.height,
            image::ExtendedColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|e| DriveError::encode(format!("PNG encode failed: {e}")))?;
        Ok(out.into_inner())
    }

    /// Check that `data` matches `width * height * 4`.
    pub fn validate(&self) -> DriveResult<()> {
        let expected = (self.width as usize) * (self.height as usize) * 4;
        if self.data.len() != expected {
            return Err(DriveError::validation(format!(
                "frame data length {} does not match {}x{} rgba8",
                self.data.len(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/frame.rs"]
mod tests;
