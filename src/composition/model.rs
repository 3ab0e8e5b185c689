use crate::composition::props::parse_props_object;
use crate::foundation::core::{Canvas, Fps, FrameRange};
use crate::foundation::error::{DriveError, DriveResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A renderable unit reported by a page during discovery.
///
/// Field order and names follow the wire format. Both props payloads are double-encoded JSON
/// strings and are kept byte-for-byte; use [`Composition::resolved_props`] to decode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frames per second; a plain JSON number on the wire (`30`, `29.97`).
    #[serde(with = "wire_fps")]
    pub fps: Fps,
    /// Total duration in frames.
    pub duration_in_frames: u64,
    /// Unique identifier within one discovery response.
    pub id: String,
    /// Default props merged with input props and calculated overrides.
    pub serialized_resolved_props_with_custom_schema: String,
    /// Default props as declared by the page content.
    pub serialized_default_props_with_custom_schema: String,
}

impl Composition {
    /// Check the numeric invariants and that both props payloads decode to objects.
    pub fn validate(&self) -> DriveResult<()> {
        if self.id.is_empty() {
            return Err(DriveError::validation("composition id must be non-empty"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(DriveError::validation(format!(
                "composition '{}' must have non-zero width/height, got {}x{}",
                self.id, self.width, self.height
            )));
        }
        Fps::new(self.fps.num, self.fps.den).map_err(|_| {
            DriveError::validation(format!("composition '{}' fps must be > 0", self.id))
        })?;
        if self.duration_in_frames == 0 {
            return Err(DriveError::validation(format!(
                "composition '{}' durationInFrames must be > 0",
                self.id
            )));
        }
        self.resolved_props()?;
        self.default_props()?;
        Ok(())
    }

    /// Decode the resolved props payload.
    pub fn resolved_props(&self) -> DriveResult<serde_json::Value> {
        parse_props_object(&self.serialized_resolved_props_with_custom_schema)
    }

    /// Decode the default props payload.
    pub fn default_props(&self) -> DriveResult<serde_json::Value> {
        parse_props_object(&self.serialized_default_props_with_custom_schema)
    }

    /// Output canvas.
    pub fn canvas(&self) -> DriveResult<Canvas> {
        Canvas::new(self.width, self.height)
    }

    /// Frame rate as a rational.
    pub fn frame_rate(&self) -> DriveResult<Fps> {
        Fps::new(self.fps.num, self.fps.den)
    }

    /// The whole timeline `[0, durationInFrames)`.
    pub fn frame_range(&self) -> FrameRange {
        FrameRange::full(self.duration_in_frames)
    }
}

/// Decode a discovery response (a JSON array of compositions).
///
/// Every composition is validated and ids must be unique.
pub fn parse_compositions(json: &str) -> DriveResult<Vec<Composition>> {
    let comps: Vec<Composition> = serde_json::from_str(json)
        .map_err(|e| DriveError::serde(format!("invalid composition list: {e}")))?;
    validate_composition_list(&comps)?;
    Ok(comps)
}

/// Validate each composition and the uniqueness of ids.
pub fn validate_composition_list(comps: &[Composition]) -> DriveResult<()> {
    let mut seen = HashSet::with_capacity(comps.len());
    for c in comps {
        c.validate()?;
        if !seen.insert(c.id.as_str()) {
            return Err(DriveError::validation(format!(
                "duplicate composition id '{}' in discovery response",
                c.id
            )));
        }
    }
    Ok(())
}

/// Everything a page needs to lock onto one composition.
///
/// This is the payload of `remotion_setBundleMode({ type: 'composition', ... })`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionDescriptor {
    /// Composition identifier.
    pub composition_name: String,
    /// Props payload (JSON-encoded object) the page validates before accepting the mode.
    pub serialized_resolved_props_with_schema: String,
    /// Duration in frames.
    pub composition_duration_in_frames: u64,
    /// Frames per second; a plain JSON number on the wire.
    #[serde(with = "wire_fps")]
    pub composition_fps: Fps,
    /// Height in pixels.
    pub composition_height: u32,
    /// Width in pixels.
    pub composition_width: u32,
}

impl CompositionDescriptor {
    /// Build a descriptor from a discovered composition.
    ///
    /// `props_override`, when set, replaces the resolved props payload verbatim. It must decode
    /// to a JSON object; schema validation happens page-side.
    pub fn from_composition(comp: &Composition, props_override: Option<&str>) -> DriveResult<Self> {
        let props = match props_override {
            Some(p) => {
                parse_props_object(p).map_err(|e| DriveError::schema(e.message()))?;
                p.to_owned()
            }
            None => comp.serialized_resolved_props_with_custom_schema.clone(),
        };
        let desc = Self {
            composition_name: comp.id.clone(),
            serialized_resolved_props_with_schema: props,
            composition_duration_in_frames: comp.duration_in_frames,
            composition_fps: comp.fps,
            composition_height: comp.height,
            composition_width: comp.width,
        };
        desc.validate()?;
        Ok(desc)
    }

    /// Check field invariants. Props are only checked for being a JSON object here.
    pub fn validate(&self) -> DriveResult<()> {
        if self.composition_name.is_empty() {
            return Err(DriveError::validation("compositionName must be non-empty"));
        }
        if self.composition_width == 0 || self.composition_height == 0 {
            return Err(DriveError::validation(format!(
                "composition '{}' must have non-zero width/height",
                self.composition_name
            )));
        }
        Fps::new(self.composition_fps.num, self.composition_fps.den)
            .map_err(|_| DriveError::validation("compositionFps must be > 0"))?;
        if self.composition_duration_in_frames == 0 {
            return Err(DriveError::validation(
                "compositionDurationInFrames must be > 0",
            ));
        }
        parse_props_object(&self.serialized_resolved_props_with_schema)
            .map_err(|e| DriveError::schema(e.message()))?;
        Ok(())
    }

    /// Output canvas.
    pub fn canvas(&self) -> DriveResult<Canvas> {
        Canvas::new(self.composition_width, self.composition_height)
    }

    /// Frame rate as a rational.
    pub fn frame_rate(&self) -> DriveResult<Fps> {
        Fps::new(self.composition_fps.num, self.composition_fps.den)
    }

    /// The whole timeline `[0, compositionDurationInFrames)`.
    pub fn frame_range(&self) -> FrameRange {
        FrameRange::full(self.composition_duration_in_frames)
    }
}

/// Frame rates cross the wire as plain JSON numbers.
pub(crate) mod wire_fps {
    use crate::foundation::core::Fps;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(fps: &Fps, s: S) -> Result<S::Ok, S::Error> {
        if fps.den == 1 {
            s.serialize_u32(fps.num)
        } else {
            s.serialize_f64(fps.as_f64())
        }
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Fps, D::Error> {
        let raw = f64::deserialize(d)?;
        Fps::from_f64(raw).map_err(|e| D::Error::custom(e.message()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/composition/model.rs"]
mod tests;
