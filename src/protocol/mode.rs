use crate::composition::model::CompositionDescriptor;
use crate::foundation::core::FrameIndex;
use serde::{Deserialize, Serialize};

/// Process-wide page state as set by `remotion_setBundleMode`.
///
/// Serialized with a `type` tag: `{"type":"evaluation"}` or
/// `{"type":"composition","compositionName":...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BundleMode {
    /// Idle and introspectable: discovery is valid, seeking is not.
    Evaluation,
    /// Locked onto one composition: seeking is valid, discovery is not.
    Composition(CompositionDescriptor),
}

impl BundleMode {
    /// Wire name of the variant.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Evaluation => "evaluation",
            Self::Composition(_) => "composition",
        }
    }

    /// Active descriptor in composition mode.
    pub fn descriptor(&self) -> Option<&CompositionDescriptor> {
        match self {
            Self::Evaluation => None,
            Self::Composition(d) => Some(d),
        }
    }
}

/// The frame currently rendered on a page in composition mode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameCursor {
    /// Rendered frame.
    pub frame: FrameIndex,
    /// Composition the frame belongs to.
    pub composition: String,
}

/// Acknowledgement returned once a seek has fully settled.
///
/// Returning it is the settlement signal: every asset the frame needed has loaded and the
/// frame is ready to capture.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekAck {
    /// Frame that is now rendered.
    pub frame: FrameIndex,
    /// Composition it belongs to.
    pub composition: String,
    /// Assets that had to be loaded for this seek (0 when all were cached).
    #[serde(default)]
    pub settled_assets: usize,
}

#[cfg(test)]
#[path = "../../tests/unit/protocol/mode.rs"]
mod tests;
