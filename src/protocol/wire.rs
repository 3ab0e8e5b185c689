use crate::foundation::core::FrameIndex;
use crate::foundation::error::{DriveError, DriveResult, ErrorKind};
use crate::protocol::mode::BundleMode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Global entry point for discovery.
pub const GET_STATIC_COMPOSITIONS: &str = "getStaticCompositions";
/// Global entry point for mode transitions.
pub const SET_BUNDLE_MODE: &str = "remotion_setBundleMode";
/// Global entry point for frame seeks.
pub const SET_FRAME: &str = "remotion_setFrame";

/// One command sent from the controller to a page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageCall {
    /// `getStaticCompositions()`: valid only in evaluation mode.
    GetStaticCompositions,
    /// `remotion_setBundleMode(mode)`: atomic transition.
    SetBundleMode(BundleMode),
    /// `remotion_setFrame(frame, composition)`: valid only in composition mode.
    SetFrame {
        /// Target frame.
        frame: FrameIndex,
        /// Composition the controller believes is active.
        composition: String,
    },
}

impl PageCall {
    /// Name of the page global this call invokes.
    pub fn global_name(&self) -> &'static str {
        match self {
            Self::GetStaticCompositions => GET_STATIC_COMPOSITIONS,
            Self::SetBundleMode(_) => SET_BUNDLE_MODE,
            Self::SetFrame { .. } => SET_FRAME,
        }
    }

    /// JavaScript invoking the page global, without the reply envelope.
    ///
    /// Arguments are embedded as JSON literals. The composition list is stringified in-page so
    /// the double-encoded props payloads reach the controller untouched.
    pub fn invocation(&self) -> DriveResult<String> {
        Ok(match self {
            Self::GetStaticCompositions => format!(
                "Promise.resolve(window.{GET_STATIC_COMPOSITIONS}()).then(cs => JSON.stringify(cs))"
            ),
            Self::SetBundleMode(mode) => {
                format!("window.{SET_BUNDLE_MODE}({})", serde_json::to_string(mode)?)
            }
            Self::SetFrame { frame, composition } => format!(
                "window.{SET_FRAME}({}, {})",
                frame.0,
                serde_json::to_string(composition)?
            ),
        })
    }

    /// Full script: the invocation wrapped in an async envelope resolving to a [`PageReply`].
    ///
    /// Evaluators must await the returned promise; its resolution is the settlement signal.
    pub fn to_script(&self) -> DriveResult<String> {
        Ok(format!(
            "(async () => {{ try {{ const value = await ({}); \
             return {{ ok: value === undefined ? null : value }}; }} \
             catch (e) {{ return {{ error: {{ kind: (e && e.kind) || 'internal', \
             message: String((e && e.message) || e) }} }}; }} }})()",
            self.invocation()?
        ))
    }
}

/// Machine-readable failure carried in a [`PageReply`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    /// Error code, see [`ErrorKind::as_str`].
    pub kind: String,
    /// Human-readable detail.
    pub message: String,
}

/// Reply envelope: `{"ok": value}` or `{"error": {"kind", "message"}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageReply {
    /// The call settled successfully.
    Ok(Value),
    /// The call was rejected.
    Error(WireError),
}

impl PageReply {
    /// Wrap a local result into an envelope.
    pub fn from_result(res: DriveResult<Value>) -> Self {
        match res {
            Ok(v) => Self::Ok(v),
            Err(e) => Self::Error(WireError {
                kind: e.kind().as_str().to_owned(),
                message: e.message(),
            }),
        }
    }

    /// Decode a raw evaluation result into an envelope.
    pub fn from_value(raw: Value) -> DriveResult<Self> {
        serde_json::from_value(raw)
            .map_err(|e| DriveError::serde(format!("malformed page reply envelope: {e}")))
    }

    /// Unwrap the envelope, rebuilding typed errors from their wire code.
    pub fn into_result(self) -> DriveResult<Value> {
        match self {
            Self::Ok(v) => Ok(v),
            Self::Error(e) => Err(DriveError::from_wire(
                ErrorKind::from_code(&e.kind),
                e.message,
            )),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/protocol/wire.rs"]
mod tests;
