//! Controller side of the protocol.

/// Typed client over a [`crate::PageChannel`].
pub mod client;
