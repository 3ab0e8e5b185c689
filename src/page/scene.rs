use crate::foundation::color::parse_hex_color;
use crate::foundation::core::{Canvas, FrameIndex, Rgba8Premul};
use crate::foundation::error::{DriveError, DriveResult};
use crate::foundation::math::blend_over_premul;
use crate::page::assets::AssetCache;
use crate::render::frame::FrameRGBA;
use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inputs for rendering one frame.
///
/// Output must be a pure function of these fields: no wall-clock time, no randomness.
#[derive(Clone, Copy, Debug)]
pub struct SceneCtx<'a> {
    /// Output size.
    pub canvas: Canvas,
    /// Frame being rendered.
    pub frame: FrameIndex,
    /// Composition duration in frames.
    pub duration_in_frames: u64,
    /// Resolved props of the active composition.
    pub props: &'a Value,
    /// Assets settled for this frame.
    pub assets: &'a AssetCache,
}

/// Page content for one composition: the opaque rendering backend behind the protocol.
pub trait Scene: Send + Sync {
    /// Asset keys that must settle before `frame` can render.
    fn assets(&self, _frame: FrameIndex, _props: &Value) -> DriveResult<Vec<String>> {
        Ok(Vec::new())
    }

    /// Render one frame. Must produce exactly `ctx.canvas` pixels.
    fn render(&self, ctx: &SceneCtx<'_>) -> DriveResult<FrameRGBA>;
}

/// A colour literal (`#rrggbb`) or a `$propName` reference into resolved props.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorRef(pub String);

impl ColorRef {
    /// Resolve against props.
    pub fn resolve(&self, props: &Value) -> DriveResult<Rgba8Premul> {
        let raw = match self.0.strip_prefix('$') {
            Some(name) => props.get(name).and_then(Value::as_str).ok_or_else(|| {
                DriveError::validation(format!("color prop '{name}' is missing or not a string"))
            })?,
            None => self.0.as_str(),
        };
        parse_hex_color(raw).map_err(DriveError::validation)
    }

    fn is_prop_ref(&self) -> bool {
        self.0.starts_with('$')
    }
}

/// One drawing layer of a [`LayerScene`], composited in order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Layer {
    /// Fill the whole canvas.
    Fill {
        /// Fill colour.
        color: ColorRef,
    },
    /// Axis-aligned square rotated by `frame * degreesPerFrame` around its center.
    #[serde(rename_all = "camelCase")]
    Box {
        /// Box colour.
        color: ColorRef,
        /// Edge length in pixels.
        size: f64,
        /// Rotation speed.
        #[serde(default)]
        degrees_per_frame: f64,
        /// Center in pixels; canvas center when absent.
        #[serde(default)]
        center: Option<[f64; 2]>,
    },
    /// Bottom-aligned bar spanning `(frame + 1) / duration` of the canvas width.
    Progress {
        /// Bar colour.
        color: ColorRef,
        /// Bar height in pixels.
        #[serde(default = "default_bar_height")]
        height: u32,
    },
    /// Image asset drawn at `(x, y)`.
    Image {
        /// Bundle-relative asset key.
        asset: String,
        /// Left edge in pixels.
        #[serde(default)]
        x: i64,
        /// Top edge in pixels.
        #[serde(default)]
        y: i64,
    },
}

fn default_bar_height() -> u32 {
    8
}

fn default_background() -> ColorRef {
    ColorRef("#00000000".to_owned())
}

/// Procedural scene made of [`Layer`]s over a background colour.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerScene {
    /// Canvas clear colour.
    #[serde(default = "default_background")]
    pub background: ColorRef,
    /// Layers, bottom first.
    #[serde(default)]
    pub layers: Vec<Layer>,
}

impl Default for LayerScene {
    fn default() -> Self {
        Self {
            background: default_background(),
            layers: Vec::new(),
        }
    }
}

impl LayerScene {
    /// Check literal colours and geometry. Prop references are checked at render time.
    pub fn validate(&self) -> DriveResult<()> {
        let check = |c: &ColorRef| -> DriveResult<()> {
            if c.is_prop_ref() {
                return Ok(());
            }
            parse_hex_color(&c.0).map(|_| ()).map_err(DriveError::validation)
        };
        check(&self.background)?;
        for layer in &self.layers {
            match layer {
                Layer::Fill { color } | Layer::Progress { color, .. } => check(color)?,
                Layer::Box {
                    color,
                    size,
                    degrees_per_frame,
                    ..
                } => {
                    check(color)?;
                    if !size.is_finite() || *size <= 0.0 {
                        return Err(DriveError::validation("box size must be finite and > 0"));
                    }
                    if !degrees_per_frame.is_finite() {
                        return Err(DriveError::validation("box degreesPerFrame must be finite"));
                    }
                }
                Layer::Image { asset, .. } => {
                    crate::page::assets::normalize_rel_path(asset)
                        .map_err(|e| DriveError::validation(e.message()))?;
                }
            }
        }
        Ok(())
    }
}

impl Scene for LayerScene {
    fn assets(&self, _frame: FrameIndex, _props: &Value) -> DriveResult<Vec<String>> {
        Ok(self
            .layers
            .iter()
            .filter_map(|l| match l {
                Layer::Image { asset, .. } => Some(asset.clone()),
                _ => None,
            })
            .collect())
    }

    fn render(&self, ctx: &SceneCtx<'_>) -> DriveResult<FrameRGBA> {
        let mut frame = FrameRGBA::filled(ctx.canvas, self.background.resolve(ctx.props)?);
        for layer in &self.layers {
            match layer {
                Layer::Fill { color } => {
                    let c = color.resolve(ctx.props)?.to_array();
                    for px in frame.data.chunks_exact_mut(4) {
                        blend_over_premul(px, c);
                    }
                }
                Layer::Box {
                    color,
                    size,
                    degrees_per_frame,
                    center,
                } => {
                    let c = color.resolve(ctx.props)?.to_array();
                    let center = center.map_or_else(
                        || {
                            Point::new(
                                f64::from(ctx.canvas.width) / 2.0,
                                f64::from(ctx.canvas.height) / 2.0,
                            )
                        },
                        |[x, y]| Point::new(x, y),
                    );
                    let angle = (ctx.frame.0 as f64 * degrees_per_frame).to_radians();
                    draw_rotated_box(&mut frame, center, *size, angle, c);
                }
                Layer::Progress { color, height } => {
                    let c = color.resolve(ctx.props)?.to_array();
                    let duration = ctx.duration_in_frames.max(1);
                    let filled = ((ctx.frame.0 + 1).min(duration) * u64::from(ctx.canvas.width)
                        / duration) as u32;
                    let top = ctx.canvas.height.saturating_sub(*height);
                    for y in top..ctx.canvas.height {
                        for x in 0..filled {
                            if let Some(px) = frame.pixel_mut(x, y) {
                                blend_over_premul(px, c);
                            }
                        }
                    }
                }
                Layer::Image { asset, x, y } => {
                    let img = ctx.assets.get(asset).ok_or_else(|| {
                        DriveError::asset(format!("asset '{asset}' was not settled before render"))
                    })?;
                    blit(&mut frame, img, *x, *y);
                }
            }
        }
        Ok(frame)
    }
}

fn draw_rotated_box(frame: &mut FrameRGBA, center: Point, size: f64, angle: f64, color: [u8; 4]) {
    let to_canvas = Affine::translate(center.to_vec2()) * Affine::rotate(angle);
    let to_box = to_canvas.inverse();
    let half = size / 2.0;
    let reach = half * std::f64::consts::SQRT_2;

    let x0 = (center.x - reach).floor().max(0.0) as u32;
    let y0 = (center.y - reach).floor().max(0.0) as u32;
    let x1 = ((center.x + reach).ceil().max(0.0) as u32).min(frame.width);
    let y1 = ((center.y + reach).ceil().max(0.0) as u32).min(frame.height);

    for y in y0..y1 {
        for x in x0..x1 {
            let p = to_box * (Point::new(f64::from(x), f64::from(y)) + Vec2::new(0.5, 0.5));
            if p.x.abs() <= half
                && p.y.abs() <= half
                && let Some(px) = frame.pixel_mut(x, y)
            {
                blend_over_premul(px, color);
            }
        }
    }
}

fn blit(frame: &mut FrameRGBA, img: &crate::page::assets::DecodedImage, x: i64, y: i64) {
    for iy in 0..img.height {
        let ty = y + i64::from(iy);
        if ty < 0 || ty >= i64::from(frame.height) {
            continue;
        }
        for ix in 0..img.width {
            let tx = x + i64::from(ix);
            if tx < 0 || tx >= i64::from(frame.width) {
                continue;
            }
            let i = ((iy as usize) * (img.width as usize) + (ix as usize)) * 4;
            let Some(src) = img.data.get(i..i + 4) else {
                continue;
            };
            if let Some(px) = frame.pixel_mut(tx as u32, ty as u32) {
                blend_over_premul(px, [src[0], src[1], src[2], src[3]]);
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/page/scene.rs"]
mod tests;
