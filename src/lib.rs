//! reeldrive drives headless pages that render video compositions frame by frame.
//!
//! A page exposes three globals. A controller uses them to:
//!
//! - discover the page's compositions while it is in evaluation mode,
//! - lock the page onto one composition with a [`CompositionDescriptor`],
//! - seek frame by frame and capture the pixels once each frame has settled.
//!
//! [`Driver`] is the typed controller over any [`PageChannel`]. [`ScriptChannel`] speaks the
//! protocol to a browser through a [`ScriptEvaluator`]; [`PageResponder`] is an in-process page
//! that renders a [`Bundle`] of deterministic scenes. [`render_range`] spreads a frame range over
//! several pages and streams the frames into a [`FrameSink`] in timeline order.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Composition records, props and schemas.
pub mod composition;
/// Controller-side protocol client.
pub mod driver;
/// Frame sinks.
pub mod encode;
/// In-process page implementation.
pub mod page;
/// Protocol calls, modes and page transports.
pub mod protocol;
/// Captured frames and render orchestration.
pub mod render;

pub use crate::foundation::color::parse_hex_color;
pub use crate::foundation::core::{Canvas, Fps, FrameIndex, FrameRange, Rgba8Premul};
pub use crate::foundation::error::{DriveError, DriveResult, ErrorKind};

pub use crate::composition::model::{Composition, CompositionDescriptor};
pub use crate::composition::schema::{FieldKind, FieldSchema, PropsSchema};
pub use crate::driver::client::{Driver, DriverOpts};
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
pub use crate::encode::png::PngSequenceSink;
pub use crate::encode::sink::{FrameSink, InMemorySink, SinkConfig};
pub use crate::page::assets::{AssetSource, DecodedImage, FsAssetSource};
pub use crate::page::bundle::{Bundle, CompositionEntry};
pub use crate::page::responder::{BundleFactory, DiscoveryReport, PageResponder};
pub use crate::page::scene::{Layer, LayerScene, Scene, SceneCtx};
pub use crate::protocol::channel::{
    Deadline, PageChannel, PageFactory, ScriptChannel, ScriptEvaluator,
};
pub use crate::protocol::mode::{BundleMode, FrameCursor, SeekAck};
pub use crate::protocol::wire::{PageCall, PageReply, WireError};
pub use crate::render::frame::FrameRGBA;
pub use crate::render::pipeline::{RenderJob, RenderPlan, RenderStats, render_frame, render_range};
