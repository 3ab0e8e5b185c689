/// Convenience result type used across reeldrive.
pub type DriveResult<T> = Result<T, DriveError>;

/// Top-level error taxonomy for the driver protocol.
///
/// Every variant maps to a stable machine-readable [`ErrorKind`], which is what travels over a
/// page channel. The page never retries; retry policy belongs to the controller.
#[derive(thiserror::Error, Debug)]
pub enum DriveError {
    /// Resolved or default props failed validation against a composition schema.
    #[error("schema validation error: {0}")]
    SchemaValidation(String),

    /// Operation invoked in the wrong bundle mode.
    #[error("invalid mode: {0}")]
    InvalidMode(String),

    /// Seek targeted a composition that is not the active one.
    #[error("stale seek: {0}")]
    StaleSeek(String),

    /// Seek targeted a frame outside `[0, durationInFrames)`.
    #[error("frame out of range: {0}")]
    FrameOutOfRange(String),

    /// An asset required for a frame failed to load.
    #[error("asset settlement error: {0}")]
    AssetSettlement(String),

    /// A command did not settle before its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Invalid user-provided or composition data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors when serializing or deserializing wire data.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Errors raised by frame sinks (PNG writer, ffmpeg).
    #[error("encode error: {0}")]
    Encode(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Machine-readable error code carried in page replies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`DriveError::SchemaValidation`].
    SchemaValidation,
    /// See [`DriveError::InvalidMode`].
    InvalidMode,
    /// See [`DriveError::StaleSeek`].
    StaleSeek,
    /// See [`DriveError::FrameOutOfRange`].
    FrameOutOfRange,
    /// See [`DriveError::AssetSettlement`].
    AssetSettlement,
    /// See [`DriveError::Timeout`].
    Timeout,
    /// See [`DriveError::Validation`].
    Validation,
    /// See [`DriveError::Serde`].
    Serialization,
    /// See [`DriveError::Encode`].
    Encode,
    /// Anything else, including codes this version does not know.
    Internal,
}

impl ErrorKind {
    /// Stable wire code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SchemaValidation => "schema_validation",
            Self::InvalidMode => "invalid_mode",
            Self::StaleSeek => "stale_seek",
            Self::FrameOutOfRange => "frame_out_of_range",
            Self::AssetSettlement => "asset_settlement",
            Self::Timeout => "timeout",
            Self::Validation => "validation",
            Self::Serialization => "serialization",
            Self::Encode => "encode",
            Self::Internal => "internal",
        }
    }

    /// Parse a wire code. Unknown codes map to [`ErrorKind::Internal`].
    pub fn from_code(code: &str) -> Self {
        match code {
            "schema_validation" => Self::SchemaValidation,
            "invalid_mode" => Self::InvalidMode,
            "stale_seek" => Self::StaleSeek,
            "frame_out_of_range" => Self::FrameOutOfRange,
            "asset_settlement" => Self::AssetSettlement,
            "timeout" => Self::Timeout,
            "validation" => Self::Validation,
            "serialization" => Self::Serialization,
            "encode" => Self::Encode,
            _ => Self::Internal,
        }
    }
}

impl DriveError {
    /// Build a [`DriveError::SchemaValidation`] value.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaValidation(msg.into())
    }

    /// Build a [`DriveError::InvalidMode`] value.
    pub fn invalid_mode(msg: impl Into<String>) -> Self {
        Self::InvalidMode(msg.into())
    }

    /// Build a [`DriveError::StaleSeek`] value.
    pub fn stale_seek(msg: impl Into<String>) -> Self {
        Self::StaleSeek(msg.into())
    }

    /// Build a [`DriveError::FrameOutOfRange`] value.
    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::FrameOutOfRange(msg.into())
    }

    /// Build a [`DriveError::AssetSettlement`] value.
    pub fn asset(msg: impl Into<String>) -> Self {
        Self::AssetSettlement(msg.into())
    }

    /// Build a [`DriveError::Timeout`] value.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Build a [`DriveError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`DriveError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Build a [`DriveError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Machine-readable code for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SchemaValidation(_) => ErrorKind::SchemaValidation,
            Self::InvalidMode(_) => ErrorKind::InvalidMode,
            Self::StaleSeek(_) => ErrorKind::StaleSeek,
            Self::FrameOutOfRange(_) => ErrorKind::FrameOutOfRange,
            Self::AssetSettlement(_) => ErrorKind::AssetSettlement,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Serde(_) => ErrorKind::Serialization,
            Self::Encode(_) => ErrorKind::Encode,
            Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Message without the display prefix, as sent over the wire.
    pub fn message(&self) -> String {
        match self {
            Self::SchemaValidation(m)
            | Self::InvalidMode(m)
            | Self::StaleSeek(m)
            | Self::FrameOutOfRange(m)
            | Self::AssetSettlement(m)
            | Self::Timeout(m)
            | Self::Validation(m)
            | Self::Serde(m)
            | Self::Encode(m) => m.clone(),
            Self::Other(e) => format!("{e:#}"),
        }
    }

    /// Rebuild an error from a wire `(kind, message)` pair.
    pub fn from_wire(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::SchemaValidation => Self::SchemaValidation(message),
            ErrorKind::InvalidMode => Self::InvalidMode(message),
            ErrorKind::StaleSeek => Self::StaleSeek(message),
            ErrorKind::FrameOutOfRange => Self::FrameOutOfRange(message),
            ErrorKind::AssetSettlement => Self::AssetSettlement(message),
            ErrorKind::Timeout => Self::Timeout(message),
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::Serialization => Self::Serde(message),
            ErrorKind::Encode => Self::Encode(message),
            ErrorKind::Internal => Self::Other(anyhow::anyhow!(message)),
        }
    }
}

impl From<serde_json::Error> for DriveError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
