use crate::composition::model::wire_fps;
use crate::composition::props::{empty_props, merge_props};
use crate::composition::schema::PropsSchema;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{DriveError, DriveResult};
use crate::page::scene::{LayerScene, Scene};
use anyhow::Context as _;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name of the bundle manifest inside a bundle directory.
pub const BUNDLE_MANIFEST: &str = "bundle.json";

/// Hook computing final props from merged default + input props.
pub type CalculateProps = Arc<dyn Fn(&Value) -> DriveResult<Value> + Send + Sync>;

/// A composition registered by page content.
#[derive(Clone)]
pub struct CompositionEntry {
    /// Unique identifier.
    pub id: String,
    /// Output size.
    pub canvas: Canvas,
    /// Frames per second.
    pub fps: Fps,
    /// Duration in frames.
    pub duration_in_frames: u64,
    /// Props used when no input props override them.
    pub default_props: Value,
    /// Schema both default and resolved props must satisfy.
    pub schema: PropsSchema,
    scene: Arc<dyn Scene>,
    calculate: Option<CalculateProps>,
}

impl fmt::Debug for CompositionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositionEntry")
            .field("id", &self.id)
            .field("canvas", &self.canvas)
            .field("fps", &self.fps)
            .field("duration_in_frames", &self.duration_in_frames)
            .field("default_props", &self.default_props)
            .field("schema", &self.schema)
            .field("calculate", &self.calculate.is_some())
            .finish_non_exhaustive()
    }
}

impl CompositionEntry {
    /// Register `scene` under `id`, with empty default props and a permissive schema.
    pub fn new(
        id: impl Into<String>,
        canvas: Canvas,
        fps: Fps,
        duration_in_frames: u64,
        scene: Arc<dyn Scene>,
    ) -> Self {
        Self {
            id: id.into(),
            canvas,
            fps,
            duration_in_frames,
            default_props: empty_props(),
            schema: PropsSchema::permissive(),
            scene,
            calculate: None,
        }
    }

    /// Set default props.
    pub fn with_default_props(mut self, props: Value) -> Self {
        self.default_props = props;
        self
    }

    /// Set the props schema.
    pub fn with_schema(mut self, schema: PropsSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Set a hook applied after merging default and input props.
    pub fn with_calculate(
        mut self,
        f: impl Fn(&Value) -> DriveResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.calculate = Some(Arc::new(f));
        self
    }

    /// Scene rendering this composition.
    pub fn scene(&self) -> &Arc<dyn Scene> {
        &self.scene
    }

    /// Check the registration invariants.
    pub fn validate(&self) -> DriveResult<()> {
        if self.id.is_empty() {
            return Err(DriveError::validation("composition id must be non-empty"));
        }
        Canvas::new(self.canvas.width, self.canvas.height)?;
        Fps::new(self.fps.num, self.fps.den).map_err(|_| {
            DriveError::validation(format!("composition '{}' fps must be > 0", self.id))
        })?;
        if self.duration_in_frames == 0 {
            return Err(DriveError::validation(format!(
                "composition '{}' durationInFrames must be > 0",
                self.id
            )));
        }
        if !self.default_props.is_object() {
            return Err(DriveError::validation(format!(
                "composition '{}' defaultProps must be a JSON object",
                self.id
            )));
        }
        Ok(())
    }

    /// Validate props against this composition's schema.
    pub fn check_props(&self, props: &Value) -> DriveResult<()> {
        self.schema
            .validate(props)
            .map_err(|e| DriveError::schema(format!("composition '{}': {e}", self.id)))
    }

    /// Merge default and input props, apply the calculate hook, then validate.
    pub fn resolve_props(&self, input: &Value) -> DriveResult<Value> {
        let mut props = merge_props(&self.default_props, input);
        if let Some(calc) = &self.calculate {
            props = calc(&props)?;
        }
        self.check_props(&props)?;
        Ok(props)
    }
}

/// Page content: the compositions a page registers, plus the root assets resolve against.
#[derive(Debug, Default)]
pub struct Bundle {
    root: PathBuf,
    entries: Vec<CompositionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct BundleDef {
    #[serde(default)]
    compositions: Vec<CompositionDef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CompositionDef {
    id: String,
    width: u32,
    height: u32,
    #[serde(with = "wire_fps")]
    fps: Fps,
    duration_in_frames: u64,
    #[serde(default = "empty_props")]
    default_props: Value,
    #[serde(default = "PropsSchema::permissive")]
    schema: PropsSchema,
    #[serde(default)]
    scene: LayerScene,
}

impl Bundle {
    /// An empty bundle whose assets resolve against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: Vec::new(),
        }
    }

    /// Load `<dir>/bundle.json`.
    pub fn from_dir(dir: &Path) -> DriveResult<Self> {
        let path = dir.join(BUNDLE_MANIFEST);
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("read bundle manifest '{}'", path.display()))?;
        Self::from_json(&json, dir)
    }

    /// Parse a bundle manifest; assets resolve against `root`.
    pub fn from_json(json: &str, root: &Path) -> DriveResult<Self> {
        let def: BundleDef = serde_json::from_str(json)
            .map_err(|e| DriveError::serde(format!("invalid bundle manifest: {e}")))?;
        let mut bundle = Self::new(root);
        for c in def.compositions {
            c.scene.validate().map_err(|e| {
                DriveError::validation(format!("composition '{}' scene: {}", c.id, e.message()))
            })?;
            let entry = CompositionEntry::new(
                c.id,
                Canvas {
                    width: c.width,
                    height: c.height,
                },
                c.fps,
                c.duration_in_frames,
                Arc::new(c.scene),
            )
            .with_default_props(c.default_props)
            .with_schema(c.schema);
            bundle.register(entry)?;
        }
        Ok(bundle)
    }

    /// Register a composition. Ids must be unique; registration order is discovery order.
    pub fn register(&mut self, entry: CompositionEntry) -> DriveResult<()> {
        entry.validate()?;
        if self.get(&entry.id).is_some() {
            return Err(DriveError::validation(format!(
                "composition '{}' is registered twice",
                entry.id
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Builder-style [`Bundle::register`].
    pub fn with(mut self, entry: CompositionEntry) -> DriveResult<Self> {
        self.register(entry)?;
        Ok(self)
    }

    /// Registered compositions in discovery order.
    pub fn entries(&self) -> &[CompositionEntry] {
        &self.entries
    }

    /// Look up a composition by id.
    pub fn get(&self, id: &str) -> Option<&CompositionEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Directory assets resolve against.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
#[path = "../../tests/unit/page/bundle.rs"]
mod tests;
