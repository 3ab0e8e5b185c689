//! Captured frames and multi-page render orchestration.

/// Captured RGBA8 frames.
pub mod frame;
/// Range rendering across page instances.
pub mod pipeline;
