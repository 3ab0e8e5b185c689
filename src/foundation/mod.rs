/// Frame, range, fps and canvas primitives.
pub mod core;
/// Error taxonomy shared by both sides of the protocol.
pub mod error;
/// Hex colour parsing into premultiplied RGBA8.
pub mod color;
pub(crate) mod math;
