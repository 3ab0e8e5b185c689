//! The headless frame-rendering control protocol.
//!
//! A controller discovers compositions while the page is in evaluation mode, locks the page
//! onto one composition, then seeks frame by frame. Every command must settle before the next
//! is issued; pages are not safe to pipeline.

/// Page transport traits, deadlines and the script-evaluating channel.
pub mod channel;
/// Bundle mode and frame cursor.
pub mod mode;
/// Protocol calls, page scripts and the reply envelope.
pub mod wire;
