use crate::foundation::error::{DriveError, DriveResult};
use crate::protocol::wire::{PageCall, PageReply};
use crate::render::frame::FrameRGBA;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Absolute point in time by which a command must settle. `Deadline::none()` never expires.
///
/// The protocol has no intrinsic timeout; the controller attaches one per command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// A deadline that never expires.
    pub fn none() -> Self {
        Self(None)
    }

    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self(Some(Instant::now() + timeout))
    }

    /// `Deadline::after` when a timeout is configured, else `Deadline::none`.
    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        timeout.map_or_else(Self::none, Self::after)
    }

    /// Time left, saturating at zero. `None` when unbounded.
    pub fn remaining(self) -> Option<Duration> {
        self.0.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// `true` once the deadline has passed.
    pub fn is_expired(self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }
}

/// Transport to one page instance.
///
/// A page is single-threaded: calls take `&mut self` and must not be pipelined. Each call
/// returns only once everything it triggered has settled.
pub trait PageChannel: Send {
    /// Issue a protocol call and return the page's `ok` value.
    fn call(&mut self, call: &PageCall, deadline: Deadline) -> DriveResult<Value>;

    /// Capture the pixels currently rendered for the frame cursor.
    fn capture(&mut self, deadline: Deadline) -> DriveResult<FrameRGBA>;
}

impl<C: PageChannel + ?Sized> PageChannel for Box<C> {
    fn call(&mut self, call: &PageCall, deadline: Deadline) -> DriveResult<Value> {
        (**self).call(call, deadline)
    }

    fn capture(&mut self, deadline: Deadline) -> DriveResult<FrameRGBA> {
        (**self).capture(deadline)
    }
}

/// Opens fresh, independent page instances (one per render worker).
pub trait PageFactory: Sync {
    /// Channel type of the opened pages.
    type Channel: PageChannel;

    /// Open a new page, loaded and ready for commands.
    fn open(&self) -> DriveResult<Self::Channel>;
}

/// Low-level automation hook into a browser-like page (e.g. a debugging-protocol session).
///
/// How scripts are physically delivered is up to the implementor.
pub trait ScriptEvaluator: Send {
    /// Evaluate `script`, await the promise it returns, and yield the resolved JSON value.
    fn evaluate(&mut self, script: &str, deadline: Deadline) -> DriveResult<Value>;

    /// Capture the visible viewport as PNG bytes.
    fn screenshot_png(&mut self, deadline: Deadline) -> DriveResult<Vec<u8>>;
}

/// [`PageChannel`] that speaks the protocol through page globals via a [`ScriptEvaluator`].
#[derive(Debug)]
pub struct ScriptChannel<E> {
    evaluator: E,
}

impl<E: ScriptEvaluator> ScriptChannel<E> {
    /// Wrap an evaluator.
    pub fn new(evaluator: E) -> Self {
        Self { evaluator }
    }

    /// Borrow the evaluator.
    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Unwrap the evaluator.
    pub fn into_inner(self) -> E {
        self.evaluator
    }
}

impl<E: ScriptEvaluator> PageChannel for ScriptChannel<E> {
    #[tracing::instrument(level = "debug", skip(self, call), fields(global = call.global_name()))]
    fn call(&mut self, call: &PageCall, deadline: Deadline) -> DriveResult<Value> {
        let script = call.to_script()?;
        let raw = self.evaluator.evaluate(&script, deadline)?;
        PageReply::from_value(raw)?.into_result()
    }

    fn capture(&mut self, deadline: Deadline) -> DriveResult<FrameRGBA> {
        let png = self.evaluator.screenshot_png(deadline)?;
        if png.is_empty() {
            return Err(DriveError::serde("page returned an empty screenshot"));
        }
        FrameRGBA::from_png(&png)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/protocol/channel.rs"]
mod tests;
