use crate::composition::model::{Composition, CompositionDescriptor};
use crate::composition::props::{parse_props_object, serialize_props};
use crate::foundation::core::{Canvas, FrameIndex};
use crate::foundation::error::{DriveError, DriveResult};
use crate::page::assets::{AssetCache, AssetSource, FsAssetSource, settle};
use crate::page::bundle::{Bundle, CompositionEntry};
use crate::page::scene::SceneCtx;
use crate::protocol::channel::{Deadline, PageChannel, PageFactory};
use crate::protocol::mode::{BundleMode, FrameCursor, SeekAck};
use crate::protocol::wire::{PageCall, PageReply};
use crate::render::frame::FrameRGBA;
use serde_json::Value;
use std::sync::Arc;

/// A composition that discovery left out because its props did not validate.
#[derive(Debug)]
pub struct RejectedComposition {
    /// Composition id.
    pub id: String,
    /// Why it was rejected.
    pub error: DriveError,
}

/// Outcome of resolving every registered composition.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Valid compositions, in registration order.
    pub compositions: Vec<Composition>,
    /// Compositions excluded from discovery.
    pub rejected: Vec<RejectedComposition>,
}

/// Render state of the composition a page is locked onto.
#[derive(Debug)]
pub struct ActiveComposition {
    /// Descriptor the page was locked with.
    pub descriptor: CompositionDescriptor,
    /// Props decoded from the descriptor.
    pub props: Value,
    /// Output size from the descriptor.
    pub canvas: Canvas,
    /// Frame currently rendered.
    pub cursor: FrameCursor,
    entry: usize,
    frame: FrameRGBA,
    cache: AssetCache,
}

/// Page state. Exactly one value, owned by its [`PageResponder`].
#[derive(Debug)]
pub enum PageState {
    /// Discovery is valid, seeking is not.
    Evaluation,
    /// Locked onto one composition.
    Composition(Box<ActiveComposition>),
}

/// In-process page: answers protocol calls against a [`Bundle`].
pub struct PageResponder {
    bundle: Arc<Bundle>,
    input_props: Value,
    assets: Arc<dyn AssetSource>,
    state: PageState,
}

impl std::fmt::Debug for PageResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageResponder")
            .field("input_props", &self.input_props)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl PageResponder {
    /// A freshly loaded page in evaluation mode, loading assets from the bundle root.
    pub fn new(bundle: Arc<Bundle>, input_props: Value) -> Self {
        let assets: Arc<dyn AssetSource> = Arc::new(FsAssetSource::new(bundle.root()));
        Self::with_assets(bundle, input_props, assets)
    }

    /// Like [`PageResponder::new`] with a custom asset source.
    pub fn with_assets(
        bundle: Arc<Bundle>,
        input_props: Value,
        assets: Arc<dyn AssetSource>,
    ) -> Self {
        Self {
            bundle,
            input_props,
            assets,
            state: PageState::Evaluation,
        }
    }

    /// Current state.
    pub fn state(&self) -> &PageState {
        &self.state
    }

    /// Wire name of the current mode.
    pub fn mode_name(&self) -> &'static str {
        match self.state {
            PageState::Evaluation => "evaluation",
            PageState::Composition(_) => "composition",
        }
    }

    /// Frame cursor, in composition mode.
    pub fn cursor(&self) -> Option<&FrameCursor> {
        match &self.state {
            PageState::Evaluation => None,
            PageState::Composition(active) => Some(&active.cursor),
        }
    }

    /// Resolve props for every registered composition.
    ///
    /// Does not depend on the mode; [`PageResponder::get_static_compositions`] is the
    /// mode-checked protocol entry point.
    pub fn discover(&self) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        for entry in self.bundle.entries() {
            match describe(entry, &self.input_props) {
                Ok(c) => report.compositions.push(c),
                Err(error) => report.rejected.push(RejectedComposition {
                    id: entry.id.clone(),
                    error,
                }),
            }
        }
        report
    }

    /// `getStaticCompositions`: valid compositions in registration order.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn get_static_compositions(&self) -> DriveResult<Vec<Composition>> {
        if !matches!(self.state, PageState::Evaluation) {
            return Err(DriveError::invalid_mode(
                "getStaticCompositions is only valid in evaluation mode",
            ));
        }
        let report = self.discover();
        for r in &report.rejected {
            tracing::warn!(
                composition = %r.id,
                error = %r.error,
                "composition excluded from discovery"
            );
        }
        Ok(report.compositions)
    }

    /// `remotion_setBundleMode`. On error the previous state is kept.
    #[tracing::instrument(level = "debug", skip(self, mode), fields(mode = mode.name()))]
    pub fn set_bundle_mode(&mut self, mode: &BundleMode, deadline: Deadline) -> DriveResult<()> {
        match mode {
            BundleMode::Evaluation => {
                self.state = PageState::Evaluation;
                Ok(())
            }
            BundleMode::Composition(desc) => {
                let active = self.activate(desc, deadline)?;
                tracing::debug!(
                    composition = %desc.composition_name,
                    "page locked onto composition"
                );
                self.state = PageState::Composition(Box::new(active));
                Ok(())
            }
        }
    }

    fn activate(
        &self,
        desc: &CompositionDescriptor,
        deadline: Deadline,
    ) -> DriveResult<ActiveComposition> {
        desc.validate()?;
        let (entry_idx, entry) = self
            .bundle
            .entries()
            .iter()
            .enumerate()
            .find(|(_, e)| e.id == desc.composition_name)
            .ok_or_else(|| {
                DriveError::validation(format!(
                    "no composition named '{}' is registered",
                    desc.composition_name
                ))
            })?;
        let props = parse_props_object(&desc.serialized_resolved_props_with_schema)
            .map_err(|e| DriveError::schema(e.message()))?;
        entry.check_props(&props)?;
        let canvas = desc.canvas()?;

        let mut cache = AssetCache::default();
        let first = FrameIndex(0);
        let (frame, _) = render_at(
            entry,
            &self.assets,
            canvas,
            desc.composition_duration_in_frames,
            &props,
            first,
            &mut cache,
            deadline,
        )?;
        Ok(ActiveComposition {
            descriptor: desc.clone(),
            props,
            canvas,
            cursor: FrameCursor {
                frame: first,
                composition: desc.composition_name.clone(),
            },
            entry: entry_idx,
            frame,
            cache,
        })
    }

    /// `remotion_setFrame`. Returns once the frame's assets have settled and it is rendered.
    #[tracing::instrument(level = "trace", skip(self, deadline))]
    pub fn set_frame(
        &mut self,
        frame: FrameIndex,
        composition: &str,
        deadline: Deadline,
    ) -> DriveResult<SeekAck> {
        let PageState::Composition(active) = &mut self.state else {
            return Err(DriveError::invalid_mode(
                "remotion_setFrame is only valid in composition mode",
            ));
        };
        if active.cursor.composition != composition {
            return Err(DriveError::stale_seek(format!(
                "seek targets '{composition}' but the active composition is '{}'",
                active.cursor.composition
            )));
        }
        let duration = active.descriptor.composition_duration_in_frames;
        if frame.0 >= duration {
            return Err(DriveError::out_of_range(format!(
                "frame {frame} is outside [0, {duration}) of '{composition}'"
            )));
        }

        let entry = &self.bundle.entries()[active.entry];
        let (rendered, settled_assets) = render_at(
            entry,
            &self.assets,
            active.canvas,
            duration,
            &active.props,
            frame,
            &mut active.cache,
            deadline,
        )?;
        active.frame = rendered;
        active.cursor.frame = frame;
        Ok(SeekAck {
            frame,
            composition: composition.to_owned(),
            settled_assets,
        })
    }

    /// Pixels of the frame at the cursor.
    pub fn capture_frame(&self) -> DriveResult<FrameRGBA> {
        match &self.state {
            PageState::Evaluation => Err(DriveError::invalid_mode(
                "capture is only valid in composition mode",
            )),
            PageState::Composition(active) => Ok(active.frame.clone()),
        }
    }

    /// Answer one protocol call with a reply envelope, as a browser page would.
    pub fn handle(&mut self, call: &PageCall, deadline: Deadline) -> PageReply {
        let res = match call {
            PageCall::GetStaticCompositions => self
                .get_static_compositions()
                .and_then(|comps| Ok(Value::String(serde_json::to_string(&comps)?))),
            PageCall::SetBundleMode(mode) => {
                self.set_bundle_mode(mode, deadline).map(|()| Value::Null)
            }
            PageCall::SetFrame { frame, composition } => self
                .set_frame(*frame, composition, deadline)
                .and_then(|ack| Ok(serde_json::to_value(ack)?)),
        };
        PageReply::from_result(res)
    }
}

impl PageChannel for PageResponder {
    fn call(&mut self, call: &PageCall, deadline: Deadline) -> DriveResult<Value> {
        self.handle(call, deadline).into_result()
    }

    fn capture(&mut self, _deadline: Deadline) -> DriveResult<FrameRGBA> {
        self.capture_frame()
    }
}

fn describe(entry: &CompositionEntry, input_props: &Value) -> DriveResult<Composition> {
    entry.check_props(&entry.default_props)?;
    let resolved = entry.resolve_props(input_props)?;
    Ok(Composition {
        width: entry.canvas.width,
        height: entry.canvas.height,
        fps: entry.fps,
        duration_in_frames: entry.duration_in_frames,
        id: entry.id.clone(),
        serialized_resolved_props_with_custom_schema: serialize_props(&resolved)?,
        serialized_default_props_with_custom_schema: serialize_props(&entry.default_props)?,
    })
}

#[allow(clippy::too_many_arguments)]
fn render_at(
    entry: &CompositionEntry,
    assets: &Arc<dyn AssetSource>,
    canvas: Canvas,
    duration_in_frames: u64,
    props: &Value,
    frame: FrameIndex,
    cache: &mut AssetCache,
    deadline: Deadline,
) -> DriveResult<(FrameRGBA, usize)> {
    let keys = entry.scene().assets(frame, props)?;
    let settled = settle(assets, &keys, cache, deadline)?;
    let rendered = entry.scene().render(&SceneCtx {
        canvas,
        frame,
        duration_in_frames,
        props,
        assets: cache,
    })?;
    if rendered.canvas() != canvas {
        return Err(DriveError::validation(format!(
            "scene for '{}' rendered {}x{}, expected {}x{}",
            entry.id, rendered.width, rendered.height, canvas.width, canvas.height
        )));
    }
    Ok((rendered, settled))
}

/// Opens fresh [`PageResponder`]s over one shared bundle.
#[derive(Clone)]
pub struct BundleFactory {
    bundle: Arc<Bundle>,
    input_props: Value,
    assets: Arc<dyn AssetSource>,
}

impl BundleFactory {
    /// Pages load assets from the bundle root.
    pub fn new(bundle: Arc<Bundle>, input_props: Value) -> Self {
        let assets: Arc<dyn AssetSource> = Arc::new(FsAssetSource::new(bundle.root()));
        Self::with_assets(bundle, input_props, assets)
    }

    /// Pages share `assets` as their asset source.
    pub fn with_assets(
        bundle: Arc<Bundle>,
        input_props: Value,
        assets: Arc<dyn AssetSource>,
    ) -> Self {
        Self {
            bundle,
            input_props,
            assets,
        }
    }

    /// The shared bundle.
    pub fn bundle(&self) -> &Arc<Bundle> {
        &self.bundle
    }
}

impl PageFactory for BundleFactory {
    type Channel = PageResponder;

    fn open(&self) -> DriveResult<PageResponder> {
        Ok(PageResponder::with_assets(
            Arc::clone(&self.bundle),
            self.input_props.clone(),
            Arc::clone(&self.assets),
        ))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/page/responder.rs"]
mod tests;
