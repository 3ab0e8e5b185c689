//! In-process page: the responder side of the protocol.
//!
//! A [`responder::PageResponder`] owns the single bundle-mode/frame-cursor state of one page,
//! serves discovery from a [`bundle::Bundle`], and renders frames through
//! [`scene::Scene`] implementations once their assets have settled.

/// Asset sources, per-composition cache and the settlement join.
pub mod assets;
/// Bundle content: registered compositions, schemas and scenes.
pub mod bundle;
/// The page state machine.
pub mod responder;
/// Deterministic procedural scenes.
pub mod scene;
