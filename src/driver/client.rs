use crate::composition::model::{
    Composition, CompositionDescriptor, parse_compositions, validate_composition_list,
};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{DriveError, DriveResult};
use crate::protocol::channel::{Deadline, PageChannel};
use crate::protocol::mode::{BundleMode, SeekAck};
use crate::protocol::wire::PageCall;
use crate::render::frame::FrameRGBA;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Options for a [`Driver`].
#[derive(Clone, Copy, Debug)]
pub struct DriverOpts {
    /// Per-command deadline. `None` waits indefinitely.
    pub command_timeout: Option<Duration>,
}

impl Default for DriverOpts {
    fn default() -> Self {
        Self {
            command_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Controller's view of the page mode, updated only after the page acknowledges.
#[derive(Clone, Debug, PartialEq, Eq)]
enum MirroredMode {
    /// No mode has been set yet by this driver.
    Unknown,
    Evaluation,
    Composition(CompositionDescriptor),
}

/// Typed protocol client driving one page.
///
/// Commands are issued one at a time and each waits for settlement. A command that misses its
/// deadline poisons the driver: the page may still be busy, so every later command fails with
/// a timeout and the caller is expected to abandon the page.
pub struct Driver<C> {
    channel: C,
    opts: DriverOpts,
    mode: MirroredMode,
    poisoned: bool,
}

impl<C: PageChannel> Driver<C> {
    /// Wrap a channel. The page mode is unknown until [`Driver::enter_evaluation`] or
    /// [`Driver::enter_composition`] succeeds.
    pub fn new(channel: C, opts: DriverOpts) -> Self {
        Self {
            channel,
            opts,
            mode: MirroredMode::Unknown,
            poisoned: false,
        }
    }

    /// Descriptor of the active composition, if in composition mode.
    pub fn active(&self) -> Option<&CompositionDescriptor> {
        match &self.mode {
            MirroredMode::Composition(d) => Some(d),
            _ => None,
        }
    }

    /// `true` after a command missed its deadline.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Borrow the underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Unwrap the underlying channel.
    pub fn into_inner(self) -> C {
        self.channel
    }

    fn deadline(&self) -> Deadline {
        Deadline::from_timeout(self.opts.command_timeout)
    }

    fn ensure_live(&self) -> DriveResult<()> {
        if self.poisoned {
            return Err(DriveError::timeout(
                "page missed an earlier deadline and must be abandoned",
            ));
        }
        Ok(())
    }

    fn settle<T>(&mut self, deadline: Deadline, what: &str, res: DriveResult<T>) -> DriveResult<T> {
        match res {
            Err(DriveError::Timeout(m)) => {
                self.poisoned = true;
                Err(DriveError::Timeout(m))
            }
            Ok(_) if deadline.is_expired() => {
                self.poisoned = true;
                Err(DriveError::timeout(format!("{what} settled after its deadline")))
            }
            other => other,
        }
    }

    fn command(&mut self, call: PageCall) -> DriveResult<Value> {
        self.ensure_live()?;
        let deadline = self.deadline();
        let started = Instant::now();
        let res = self.channel.call(&call, deadline);
        tracing::debug!(
            global = call.global_name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = res.is_ok(),
            "page command settled"
        );
        self.settle(deadline, call.global_name(), res)
    }

    /// Switch the page to evaluation mode, making discovery valid.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn enter_evaluation(&mut self) -> DriveResult<()> {
        self.command(PageCall::SetBundleMode(BundleMode::Evaluation))?;
        self.mode = MirroredMode::Evaluation;
        Ok(())
    }

    /// Enumerate the page's compositions. Requires evaluation mode.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn list_compositions(&mut self) -> DriveResult<Vec<Composition>> {
        if self.mode != MirroredMode::Evaluation {
            return Err(DriveError::invalid_mode(
                "discovery requires evaluation mode; call enter_evaluation first",
            ));
        }
        let v = self.command(PageCall::GetStaticCompositions)?;
        decode_composition_list(v)
    }

    /// Find one composition by id. Requires evaluation mode.
    pub fn find_composition(&mut self, id: &str) -> DriveResult<Composition> {
        let comps = self.list_compositions()?;
        let available = comps
            .iter()
            .map(|c| c.id.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        comps.into_iter().find(|c| c.id == id).ok_or_else(|| {
            DriveError::validation(format!(
                "no composition with id '{id}' (available: [{available}])"
            ))
        })
    }

    /// Lock the page onto one composition.
    ///
    /// On rejection the page keeps its previous mode, and so does this driver's view of it.
    #[tracing::instrument(
        level = "debug",
        skip(self, desc),
        fields(composition = %desc.composition_name)
    )]
    pub fn enter_composition(&mut self, desc: &CompositionDescriptor) -> DriveResult<()> {
        desc.validate()?;
        self.command(PageCall::SetBundleMode(BundleMode::Composition(desc.clone())))?;
        tracing::info!(
            composition = %desc.composition_name,
            width = desc.composition_width,
            height = desc.composition_height,
            frames = desc.composition_duration_in_frames,
            "entered composition mode"
        );
        self.mode = MirroredMode::Composition(desc.clone());
        Ok(())
    }

    /// Seek the active composition to `frame` and wait for settlement.
    pub fn seek(&mut self, frame: FrameIndex) -> DriveResult<SeekAck> {
        let name = self
            .active()
            .map(|d| d.composition_name.clone())
            .ok_or_else(|| DriveError::invalid_mode("seek requires composition mode"))?;
        self.seek_named(frame, &name)
    }

    /// Seek with an explicit composition name.
    ///
    /// The page rejects names that are not its active composition.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn seek_named(&mut self, frame: FrameIndex, composition: &str) -> DriveResult<SeekAck> {
        if self.active().is_none() {
            return Err(DriveError::invalid_mode("seek requires composition mode"));
        }
        let v = self.command(PageCall::SetFrame {
            frame,
            composition: composition.to_owned(),
        })?;
        if v.is_null() {
            return Ok(SeekAck {
                frame,
                composition: composition.to_owned(),
                settled_assets: 0,
            });
        }
        Ok(serde_json::from_value(v)?)
    }

    /// Capture the pixels of the current frame.
    pub fn capture(&mut self) -> DriveResult<FrameRGBA> {
        self.ensure_live()?;
        let desc = self
            .active()
            .cloned()
            .ok_or_else(|| DriveError::invalid_mode("capture requires composition mode"))?;
        let deadline = self.deadline();
        let res = self.channel.capture(deadline);
        let frame = self.settle(deadline, "capture", res)?;
        if frame.width != desc.composition_width || frame.height != desc.composition_height {
            return Err(DriveError::validation(format!(
                "captured {}x{} frame, composition '{}' is {}x{}",
                frame.width,
                frame.height,
                desc.composition_name,
                desc.composition_width,
                desc.composition_height
            )));
        }
        Ok(frame)
    }

    /// Seek then capture.
    pub fn render_frame(&mut self, frame: FrameIndex) -> DriveResult<FrameRGBA> {
        self.seek(frame)?;
        self.capture()
    }
}

/// Decode a discovery result: either the in-page stringified list or a JSON array.
pub fn decode_composition_list(v: Value) -> DriveResult<Vec<Composition>> {
    match v {
        Value::String(json) => parse_compositions(&json),
        Value::Array(_) => {
            let comps: Vec<Composition> = serde_json::from_value(v)?;
            validate_composition_list(&comps)?;
            Ok(comps)
        }
        other => Err(DriveError::serde(format!(
            "discovery returned neither a list nor a JSON string: {other}"
        ))),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/driver/client.rs"]
mod tests;
