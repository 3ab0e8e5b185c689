//! Frame sinks.
//!
//! Sinks consume captured frames in timeline order and are fed by
//! [`render_range`](crate::render_range).

/// `ffmpeg`-based sink (MP4 output via system `ffmpeg`).
pub mod ffmpeg;
/// PNG image sequence sink.
pub mod png;
/// Generic frame sink trait and the in-memory sink.
pub mod sink;
