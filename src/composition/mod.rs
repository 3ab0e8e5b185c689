//! Composition records as they cross the protocol boundary.

/// `Composition` and `CompositionDescriptor` wire records.
pub mod model;
/// Props payload helpers (merge, parse, serialize).
pub mod props;
/// Page-owned props schemas.
pub mod schema;
